//! Plain HTTP downloads over `reqwest`'s blocking client.
//!
//! Also hosts the response handling shared with the WebHDFS client: status
//! mapping (404 to `SourceNotFound`, anything else unsuccessful to `Transport`) and body
//! collection.

use crate::config::HttpConfig;
use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use crate::io::cloud::traits::{CloudConfig, HttpIO};
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use std::time::Duration;

/// Build a blocking client with the section's timeout.
pub(crate) fn build_client(config: &dyn CloudConfig, redirects: Policy) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs()))
        .redirect(redirects)
        .build()
        .context_kind(ErrorKind::Transport, || "building HTTP client".into())
}

/// Send a request, mapping connection failures to `Transport`.
pub(crate) fn send(
    request: reqwest::blocking::RequestBuilder,
    what: &str,
) -> Result<Response> {
    request
        .send()
        .context_kind(ErrorKind::Transport, || format!("request for {what} failed"))
}

/// Reject unsuccessful statuses; the body (usually a provider error document) becomes
/// the error source.
pub(crate) fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let err = if status == StatusCode::NOT_FOUND {
        SeqError::not_found(what)
    } else {
        SeqError::transport(format!("{what}: HTTP {status}"))
    };
    Err(if body.is_empty() {
        err
    } else {
        err.with_source(body)
    })
}

/// Collect a successful response body.
pub(crate) fn read_body(response: Response, what: &str) -> Result<Vec<u8>> {
    let response = check_status(response, what)?;
    let bytes = response
        .bytes()
        .context_kind(ErrorKind::Transport, || format!("reading body of {what}"))?;
    Ok(bytes.to_vec())
}

/// [`HttpIO`] over a single GET with redirects disabled.
pub struct ReqwestHttpIO {
    client: Client,
}

impl ReqwestHttpIO {
    /// # Errors
    ///
    /// Returns `Transport` if the client cannot be built
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config, Policy::none())?,
        })
    }
}

impl HttpIO for ReqwestHttpIO {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = send(self.client.get(url), url)?;
        if response.status().is_redirection() {
            return Err(SeqError::transport(format!(
                "{url}: HTTP {} (redirects are not followed)",
                response.status()
            )));
        }
        let body = read_body(response, url)?;
        debug!("GET {url}: {} bytes", body.len());
        Ok(body)
    }
}
