// Node API HTTP client
//
// Wraps `reqwest::Client` with node URL construction, token handling, and
// status mapping. Endpoint groups (auth, job, inspection, simulation, ...)
// are implemented as inherent methods in sibling files so this module stays
// focused on transport mechanics.

use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::endpoints::NodeEndpoints;
use crate::error::Error;
use crate::transport::TransportConfig;

const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for one node's REST API.
///
/// Holds the session token issued at login and attaches it verbatim as the
/// `Authorization` header on every token-bearing call. No call is retried.
pub struct NodeClient {
    http: reqwest::Client,
    endpoints: NodeEndpoints,
    token: RwLock<Option<SecretString>>,
    timeout_secs: u64,
}

impl NodeClient {
    /// Create a client for the node described by `endpoints`.
    pub fn new(endpoints: NodeEndpoints, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoints, transport))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoints: NodeEndpoints,
        transport: &TransportConfig,
    ) -> Self {
        Self {
            http,
            endpoints,
            token: RwLock::new(None),
            timeout_secs: transport.timeout.as_secs(),
        }
    }

    pub fn endpoints(&self) -> &NodeEndpoints {
        &self.endpoints
    }

    /// The underlying HTTP client (for flows that bypass the token).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Token ────────────────────────────────────────────────────────

    /// Current session token, if logged in.
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn set_token(&self, token: Option<SecretString>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Forget the session token without telling the node.
    pub fn clear_token(&self) {
        self.set_token(None);
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn node_url(&self, segments: &[&str]) -> Result<Url, Error> {
        self.endpoints.node_url(segments)
    }

    pub(crate) fn system_url(&self, segments: &[&str]) -> Result<Url, Error> {
        self.endpoints.system_url(segments)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET and decode a JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.authorized(self.http.get(url))?).await?;
        decode_json(resp).await
    }

    /// GET a system-level resource. These do not require a session.
    pub(crate) async fn get_json_public<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.http.get(url)).await?;
        decode_json(resp).await
    }

    /// GET and return the body as text.
    pub(crate) async fn get_text(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.authorized(self.http.get(url))?).await?;
        resp.text().await.map_err(|e| self.transport_error(e))
    }

    /// GET and return the raw body bytes.
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<Bytes, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.authorized(self.http.get(url))?).await?;
        resp.bytes().await.map_err(|e| self.transport_error(e))
    }

    /// PUT a plain-text body (often empty, for command endpoints).
    pub(crate) async fn put_text(&self, url: Url, body: &str) -> Result<(), Error> {
        debug!("PUT {}", url);
        let req = self
            .http
            .put(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .body(body.to_owned());
        self.send(self.authorized(req)?).await.map(drop)
    }

    /// PUT a JSON body.
    pub(crate) async fn put_json(&self, url: Url, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        debug!("PUT {}", url);
        let req = self.http.put(url).json(body);
        self.send(self.authorized(req)?).await.map(drop)
    }

    /// PUT raw bytes (image uploads).
    pub(crate) async fn put_bytes(&self, url: Url, body: Bytes) -> Result<(), Error> {
        debug!("PUT {}", url);
        let req = self
            .http
            .put(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
            .body(body);
        self.send(self.authorized(req)?).await.map(drop)
    }

    /// POST a JSON body.
    pub(crate) async fn post_json(&self, url: Url, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        debug!("POST {}", url);
        let req = self.http.post(url).json(body);
        self.send(self.authorized(req)?).await.map(drop)
    }

    /// PATCH a JSON body.
    pub(crate) async fn patch_json(&self, url: Url, body: &(impl Serialize + Sync)) -> Result<(), Error> {
        debug!("PATCH {}", url);
        let req = self.http.patch(url).json(body);
        self.send(self.authorized(req)?).await.map(drop)
    }

    /// DELETE a resource.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let req = self.http.delete(url);
        self.send(self.authorized(req)?).await.map(drop)
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    /// Attach the raw session token as the `Authorization` header.
    fn authorized(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        let token = guard.as_ref().ok_or(Error::MissingToken)?;
        let mut value =
            HeaderValue::from_str(token.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("token is not a valid header value: {e}"),
            })?;
        value.set_sensitive(true);
        Ok(req.header(AUTHORIZATION, value))
    }

    /// Send a request and map non-success statuses into errors.
    pub(crate) async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Error> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "token rejected or invalid credentials".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
            });
        }

        Ok(resp)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
