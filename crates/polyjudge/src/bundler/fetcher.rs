use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::bundler::BundleError;

/// Downloads remote module source
pub trait ModuleFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, BundleError>> + Send;
}

/// Fetches modules over HTTP
#[derive(Debug, Clone)]
pub struct CdnFetcher {
    client: reqwest::Client,
}

impl CdnFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for CdnFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleFetcher for CdnFetcher {
    async fn fetch(&self, url: &str) -> Result<String, BundleError> {
        debug!(url, "fetching module");
        let fetch_error = |e: reqwest::Error| BundleError::Fetch {
            url: url.to_owned(),
            reason: e.to_string(),
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)
    }
}
