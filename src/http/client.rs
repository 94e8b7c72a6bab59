//! reqwest-backed [`HttpTransport`]

use super::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;

/// HTTP transport built per resource from its timeout and TLS policy
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, insecure_skip_tls_verify: bool) -> Result<Self, TransportError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_skip_tls_verify)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { http_client })
    }
}

fn to_header_pairs(headers: &Headers) -> Result<Vec<(HeaderName, HeaderValue)>, TransportError> {
    let mut pairs = Vec::new();
    for (name, values) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        for value in values {
            let header_value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            pairs.push((header_name.clone(), header_value));
        }
    }
    Ok(pairs)
}

fn from_header_map(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = value
            .to_str()
            .map_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned(), str::to_string);
        headers.entry(name.as_str().to_string()).or_default().push(value);
    }
    headers
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidMethod {
                method: request.method.clone(),
                message: e.to_string(),
            })?;

        let mut builder = self.http_client.request(method, &request.url);
        for (name, value) in to_header_pairs(&request.headers)? {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let send_error = |e: reqwest::Error| TransportError::Send {
            method: request.method.clone(),
            url: request.url.clone(),
            message: e.to_string(),
        };

        let response = builder.send().await.map_err(send_error)?;
        let status_code = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response.text().await.map_err(send_error)?;

        debug!(
            method = %request.method,
            url = %request.url,
            status_code,
            "HTTP request completed"
        );

        Ok(HttpResponse {
            status_code,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_pairs_keep_every_value() {
        let mut headers = Headers::new();
        headers.insert(
            "Accept".to_string(),
            vec!["application/json".to_string(), "text/plain".to_string()],
        );
        let pairs = to_header_pairs(&headers).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.as_str(), "accept");
    }

    #[test]
    fn test_header_pairs_reject_invalid_names() {
        let mut headers = Headers::new();
        headers.insert("bad header".to_string(), vec!["x".to_string()]);
        assert!(matches!(
            to_header_pairs(&headers),
            Err(TransportError::InvalidHeader { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_method_is_rejected() {
        let transport = ReqwestTransport::new(Duration::from_secs(1), false).unwrap();
        let request = HttpRequest {
            method: "NOT A METHOD".to_string(),
            url: "http://localhost".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            transport.send(&request).await,
            Err(TransportError::InvalidMethod { .. })
        ));
    }
}
