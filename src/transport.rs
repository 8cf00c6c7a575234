use std::future::Future;

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::response::ApiResponse;

/// One outgoing request, fully described: everything the HTTP layer needs
/// and nothing it has to compute itself.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub method: Method,
    pub url: String,
    /// Bearer token attached as `Authorization: Token {token}`.
    pub token: Option<String>,
    /// Basic-auth credentials, used only for the login endpoint.
    pub basic_auth: Option<(String, String)>,
    /// Query parameters; repeated keys are sent repeated.
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl TransportCall {
    pub fn new(method: Method, url: String) -> Self {
        TransportCall {
            method,
            url,
            token: None,
            basic_auth: None,
            params: Vec::new(),
            body: None,
        }
    }
}

/// The HTTP capability the client is built on. Production code uses
/// [`HttpTransport`]; tests script responses through their own
/// implementation without touching a network.
///
/// Implementations only fail for transport-level faults (no response at
/// all); any status the service actually returned is a successful `send`.
pub trait Transport {
    fn send(&self, call: TransportCall) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// `reqwest`-backed transport. The inner client pools connections, so one
/// `HttpTransport` per logical session reuses sockets across requests and
/// releases them when dropped.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            http: reqwest::Client::new(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, call: TransportCall) -> impl Future<Output = Result<ApiResponse>> + Send {
        async move {
            let mut request = self.http.request(call.method, &call.url);
            if let Some(token) = &call.token {
                request = request.header(AUTHORIZATION, format!("Token {token}"));
            }
            if let Some((username, password)) = &call.basic_auth {
                request = request.basic_auth(username, Some(password));
            }
            if !call.params.is_empty() {
                request = request.query(&call.params);
            }
            if let Some(body) = &call.body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            Ok(ApiResponse::new(status, text))
        }
    }
}
