//! Source fetcher: one sheet export in, tagged normalized rows out.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{ParseError, PipelineError};
use crate::fetch::{HttpClient, fetch_bytes};
use crate::normalize::normalize_key;
use crate::parser::parse_table;
use crate::record::{NormalizedRow, RawRow};

/// Retrieves one source, parses it, and normalizes every row's keys.
///
/// Rows are tagged with the source's class label and numbered from 1 in
/// source order.
///
/// # Errors
///
/// [`PipelineError::Fetch`] when retrieval fails, [`PipelineError::Parse`]
/// when the body is not readable CSV.
#[tracing::instrument(
    skip(client, source),
    fields(url = %source.url, class_label = %source.class_label)
)]
pub async fn fetch_source<C: HttpClient + ?Sized>(
    client: &C,
    source: &SourceConfig,
) -> Result<Vec<NormalizedRow>, PipelineError> {
    let fetch_start = Instant::now();
    let bytes = fetch_bytes(client, &source.url).await?;
    let elapsed = fetch_start.elapsed();
    if elapsed.as_secs() > 15 {
        warn!(elapsed_secs = elapsed.as_secs(), "Source fetch was slow");
    }
    debug!(bytes = bytes.len(), "Source body received, parsing");

    let raw = parse_table(&bytes).map_err(|cause| ParseError {
        url: source.url.clone(),
        cause,
    })?;
    let rows = normalize_rows(raw, &source.class_label);

    info!(rows = rows.len(), "Source loaded");
    Ok(rows)
}

/// Canonicalizes the keys of parsed rows and tags them with their origin.
///
/// When two headers normalize to the same key the later column wins.
pub fn normalize_rows(raw: Vec<RawRow>, class_label: &str) -> Vec<NormalizedRow> {
    raw.into_iter()
        .enumerate()
        .map(|(index, row)| NormalizedRow {
            fields: row
                .into_iter()
                .map(|(key, value)| (normalize_key(&key), value))
                .collect(),
            class_label: class_label.to_string(),
            sequence_number: index + 1,
        })
        .collect()
}
