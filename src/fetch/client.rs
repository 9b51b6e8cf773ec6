use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for feed downloads, so a caller can wrap or replace the
/// underlying client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
