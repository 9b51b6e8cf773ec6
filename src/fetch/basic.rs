use super::client::HttpClient;
use async_trait::async_trait;

use crate::config::DownloadConfig;

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    /// Client with the overall and connect timeouts from `config`.
    pub fn from_config(config: &DownloadConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
