//! HTTP client abstraction for the device's web interface
//!
//! The synchronization engine only needs two operations against the device:
//! a plain GET of the status page and a form-encoded POST of one port's
//! settings. They are expressed as a small trait so the engine can be
//! driven by a fake in tests; `ReqwestClient` is the real implementation.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};

use crate::error::{HttpError, HttpResult};

/// Minimal view of an HTTP response: status code and body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Headers and body of one form-encoded POST submission.
#[derive(Debug, Clone, Copy)]
pub struct FormPost<'a> {
    pub content_type: &'a str,
    pub accept: &'a str,
    pub referer: &'a str,
    pub body: &'a str,
}

/// The HTTP operations the synchronization engine performs.
pub trait HttpClient {
    fn get(&self, url: &str) -> HttpResult<HttpResponse>;
    fn post_form(&self, url: &str, post: &FormPost<'_>) -> HttpResult<HttpResponse>;
}

/// Blocking reqwest-backed client.
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Transport { url: url.to_string(), message: e.to_string() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| HttpError::Transport { url: url.to_string(), message: e.to_string() })?;
        Ok(HttpResponse { status, body })
    }

    fn post_form(&self, url: &str, post: &FormPost<'_>) -> HttpResult<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, post.content_type)
            .header(ACCEPT, post.accept)
            .header(REFERER, post.referer)
            .body(post.body.to_string())
            .send()
            .map_err(|e| HttpError::Transport { url: url.to_string(), message: e.to_string() })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| HttpError::Transport { url: url.to_string(), message: e.to_string() })?;
        Ok(HttpResponse { status, body })
    }
}
