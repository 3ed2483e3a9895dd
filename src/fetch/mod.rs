//! HTTP retrieval of raw source bodies.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::FetchError;

/// Issues a GET for `url` and returns the body.
///
/// # Errors
///
/// Fails with [`FetchError`] on an unparsable URL, a transport failure, or
/// any non-success status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let transport = |cause| FetchError::Transport {
        url: url.to_string(),
        cause,
    };

    let resp = client.execute(req).await.map_err(transport)?;
    if !resp.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: resp.status(),
        });
    }

    Ok(resp.bytes().await.map_err(transport)?.to_vec())
}
