//! Typed client for the backend's REST surface.
//!
//! Every call resolves to `Result<T, RequestError>`; the status code is
//! classified once, here, instead of at each call site.

pub mod account;
pub mod management;
pub mod services;
pub mod types;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::consts::TOKEN_COOKIE;

/// Why a request produced no value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    /// The resource existed once but is gone (e.g. no media for that date).
    #[error("gone")]
    Gone,
    #[error("request failed")]
    Other,
}

impl RequestError {
    /// Map a response status to its outcome. `Ok` for any 2xx.
    pub fn classify(status: StatusCode) -> Result<(), RequestError> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(RequestError::Unauthorized),
            StatusCode::CONFLICT => Err(RequestError::Conflict),
            StatusCode::GONE => Err(RequestError::Gone),
            _ => Err(RequestError::Other),
        }
    }
}

pub type ApiResult<T> = Result<T, RequestError>;

/// Thin wrapper over a [`reqwest::Client`] rooted at the backend URL.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// `token` is sent as the session cookie on every request.
    pub fn new(base: Url, token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("{TOKEN_COOKIE}={token}"))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.endpoint(path))
    }

    /// GET a JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_json(self.request(Method::GET, path), path).await
    }

    /// GET a plain-text body, trimmed.
    pub async fn get_text(&self, path: &str) -> ApiResult<String> {
        let resp = self.send(self.request(Method::GET, path), path).await?;
        let text = resp.text().await.map_err(|e| {
            debug!(path, error = %e, "failed to read response body");
            RequestError::Other
        })?;
        Ok(text.trim().to_string())
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send_json(self.request(Method::POST, path).json(body), path)
            .await
    }

    /// POST a JSON body, expecting no response body.
    pub async fn post_empty<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send(self.request(Method::POST, path).json(body), path)
            .await
            .map(drop)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> ApiResult<T> {
        let resp = self.send(req, path).await?;
        resp.json().await.map_err(|e| {
            debug!(path, error = %e, "failed to decode response");
            RequestError::Other
        })
    }

    async fn send(&self, req: RequestBuilder, path: &str) -> ApiResult<reqwest::Response> {
        let resp = req.send().await.map_err(|e| {
            debug!(path, error = %e, "request failed");
            RequestError::Other
        })?;
        let status = resp.status();
        RequestError::classify(status).inspect_err(|e| {
            debug!(path, %status, error = %e, "request rejected");
        })?;
        Ok(resp)
    }
}
