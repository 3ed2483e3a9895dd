use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for source retrieval. Tests substitute canned responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
