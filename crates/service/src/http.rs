use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

/// Boxed future so [`HttpClient`] stays dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const ACCEPT_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: None,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a status line: DNS, TLS, connect, timeout, or a
/// body read that broke off.
#[derive(Debug)]
pub struct TransportError {
    pub url: String,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.url.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.url, self.message)
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// The only way this workspace talks to the network.
///
/// A non-2xx status is still `Ok`; `Err` means no response was received.
pub trait HttpClient: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::with_source("", "failed to build HTTP client", e))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
        accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            if let Some(accept) = accept {
                request = request.header(reqwest::header::ACCEPT, accept);
            }
            let resp = request
                .send()
                .await
                .map_err(|e| TransportError::with_source(url, "HTTP request failed", e))?;

            let status = resp.status().as_u16();
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp
                .bytes()
                .await
                .map_err(|e| TransportError::with_source(url, "failed to read response", e))?;

            Ok(HttpResponse {
                status,
                content_type,
                body: body.to_vec(),
            })
        })
    }
}

/// Canned outcome for one URL of a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Status(u16),
    TransportFailure(String),
}

/// In-memory client answering from a fixed URL table, for offline runs.
///
/// Unknown URLs answer `404`. Every request is logged in arrival order.
#[derive(Debug)]
pub struct ScriptedClient {
    routes: HashMap<String, Scripted>,
    fallback: Scripted,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: Scripted::Status(404),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: impl Into<String>, outcome: Scripted) -> Self {
        self.routes.insert(url.into(), outcome);
        self
    }

    pub fn ok(self, url: impl Into<String>) -> Self {
        self.route(url, Scripted::Status(200))
    }

    pub fn fail(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.route(url, Scripted::TransportFailure(message.into()))
    }

    pub fn with_fallback(mut self, outcome: Scripted) -> Self {
        self.fallback = outcome;
        self
    }

    /// `(url, accept)` for every request seen so far.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        match self.requests.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|(url, _)| url).collect()
    }
}

impl HttpClient for ScriptedClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
        accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        if let Ok(mut log) = self.requests.lock() {
            log.push((url.to_string(), accept.map(str::to_string)));
        }
        let outcome = self.routes.get(url).unwrap_or(&self.fallback).clone();
        Box::pin(async move {
            match outcome {
                Scripted::Status(status) => Ok(HttpResponse::new(status, Vec::new())),
                Scripted::TransportFailure(message) => Err(TransportError::new(url, message)),
            }
        })
    }
}
