use super::{Fetch, FetchError, FetchRequest, FetchResponse};
use async_trait::async_trait;
use reqwest::{Client, Method};

/// Fetch primitive backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::Failed(format!("Invalid method '{}': {}", request.method, e)))?;

        let mut builder = self.client.request(method, &request.url);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(FetchResponse {
            status: Some(status),
            body: body.to_vec(),
        })
    }
}

fn map_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(error.to_string())
    } else {
        FetchError::Failed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_method_fails_before_sending() {
        let fetch = ReqwestFetch::new();
        let err = fetch
            .fetch(FetchRequest::new("NOT A METHOD", "http://127.0.0.1:9"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Failed(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let fetch = ReqwestFetch::new();
        let err = fetch
            .fetch(FetchRequest::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();

        assert!(!matches!(err, FetchError::Unavailable));
    }
}
