use admintools_core::error::CallError;
use admintools_core::rpc::{MethodCall, Value};

/// Sends one XML-RPC method call and returns the decoded result value.
#[async_trait::async_trait]
pub trait XmlRpcTransport: Send + Sync {
    async fn call(&self, url: &str, request: &MethodCall) -> Result<Value, CallError>;
}

/// XML-RPC over HTTP POST.
#[derive(Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl XmlRpcTransport for HttpTransport {
    async fn call(&self, url: &str, request: &MethodCall) -> Result<Value, CallError> {
        let label = request.label();

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(request.encode()?)
            .send()
            .await
            .map_err(|e| CallError::transport(&label, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CallError::transport(&label, e))?;

        // Faults come back as HTTP 200; anything else is a broken endpoint.
        if !status.is_success() {
            return Err(CallError::transport(&label, format!("HTTP {status}")));
        }

        request.decode(body.to_vec())
    }
}
