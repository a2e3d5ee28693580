use admintools_core::error::CallError;

/// Fetches one document by URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, CallError>;
}

#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, CallError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CallError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::RemoteFault {
                operation: url.to_string(),
                code: i64::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| CallError::transport(url, e))
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Serves canned documents by URL; unknown URLs answer 404.
    #[derive(Clone, Default)]
    pub struct MockFetcher {
        pages: Arc<HashMap<String, String>>,
        pub requested: Arc<Mutex<Vec<String>>>,
    }

    impl MockFetcher {
        pub fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: Arc::new(
                    pages
                        .iter()
                        .map(|(url, body)| (url.to_string(), body.to_string()))
                        .collect(),
                ),
                requested: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn urls(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for MockFetcher {
        async fn get_text(&self, url: &str) -> Result<String, CallError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| CallError::RemoteFault {
                operation: url.to_string(),
                code: 404,
                message: "Not Found".to_string(),
            })
        }
    }
}
