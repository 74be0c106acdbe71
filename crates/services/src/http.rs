//! Shared JSON-over-HTTP plumbing for the service clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use invsync_connector::CollaboratorError;

/// A reqwest client bound to one service's base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    service: &'static str,
    base_url: String,
    timeout_secs: u64,
    http: reqwest::Client,
}

impl ApiClient {
    /// Build a client. `verify_ssl = false` accepts self-signed certificates.
    pub fn new(
        service: &'static str,
        base_url: &str,
        headers: &[(&str, String)],
        timeout_secs: u64,
        verify_ssl: bool,
    ) -> Result<Self, CollaboratorError> {
        Url::parse(base_url).map_err(|e| CollaboratorError::Transport {
            service,
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in headers {
            let invalid = |e: String| CollaboratorError::Transport {
                service,
                message: format!("invalid header {name}: {e}"),
            };
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            default_headers.insert(header, value);
        }

        if !verify_ssl {
            tracing::warn!(service, "TLS certificate verification disabled");
        }
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| CollaboratorError::Transport {
                service,
                message: e.to_string(),
            })?;

        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            http,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Absolute URL for `path`; absolute URLs (pagination links) pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Send a prepared request and decode its JSON body. Empty bodies decode as `null`.
    pub async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value, CollaboratorError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!(service = self.service, path, status = status.as_u16(), "Response received");

        if !status.is_success() {
            tracing::error!(service = self.service, path, status = status.as_u16(), body = %body, "Request failed");
            return Err(status_error(self.service, path, status, body));
        }
        decode_body(self.service, &body)
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, CollaboratorError> {
        self.send(path, self.request(Method::GET, path).query(query)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, CollaboratorError> {
        self.send(path, self.request(Method::POST, path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, CollaboratorError> {
        self.send(path, self.request(Method::PATCH, path).json(body)).await
    }

    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<Value, CollaboratorError> {
        let request = self.request(Method::DELETE, path);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        self.send(path, request).await
    }

    fn transport_error(&self, e: reqwest::Error) -> CollaboratorError {
        if e.is_timeout() {
            CollaboratorError::Timeout {
                service: self.service,
                secs: self.timeout_secs,
            }
        } else if e.is_decode() {
            CollaboratorError::Decode {
                service: self.service,
                message: e.to_string(),
            }
        } else {
            CollaboratorError::Transport {
                service: self.service,
                message: e.to_string(),
            }
        }
    }
}

/// Map a non-success status to the matching error variant.
pub(crate) fn status_error(service: &'static str, path: &str, status: StatusCode, body: String) -> CollaboratorError {
    match status {
        StatusCode::NOT_FOUND => CollaboratorError::NotFound {
            service,
            path: path.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CollaboratorError::Auth {
            service,
            status: status.as_u16(),
        },
        _ => CollaboratorError::Http {
            service,
            status: status.as_u16(),
            body,
        },
    }
}

pub(crate) fn decode_body(service: &'static str, body: &str) -> Result<Value, CollaboratorError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| CollaboratorError::Decode {
        service,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_variants() {
        assert!(matches!(
            status_error("netbox", "/api/dcim/devices/9/", StatusCode::NOT_FOUND, String::new()),
            CollaboratorError::NotFound { path, .. } if path == "/api/dcim/devices/9/"
        ));
        assert!(matches!(
            status_error("xen", "/hosts", StatusCode::FORBIDDEN, String::new()),
            CollaboratorError::Auth { status: 403, .. }
        ));
        assert!(matches!(
            status_error("salt", "/minions", StatusCode::BAD_GATEWAY, "upstream".into()),
            CollaboratorError::Http { status: 502, body, .. } if body == "upstream"
        ));
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(decode_body("netbox", "  ").unwrap(), Value::Null);
        assert_eq!(decode_body("netbox", r#"{"id": 1}"#).unwrap()["id"], 1);
        assert!(matches!(decode_body("netbox", "<html>"), Err(CollaboratorError::Decode { .. })));
    }

    #[test]
    fn urls_join_and_pass_through() {
        let client = ApiClient::new("netbox", "https://nb.example.com/", &[], 5, true).unwrap();
        assert_eq!(client.url("/api/dcim/sites/"), "https://nb.example.com/api/dcim/sites/");
        assert_eq!(
            client.url("https://nb.example.com/api/dcim/sites/?offset=50"),
            "https://nb.example.com/api/dcim/sites/?offset=50"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("xen", "not a url", &[], 5, true),
            Err(CollaboratorError::Transport { .. })
        ));
    }
}
