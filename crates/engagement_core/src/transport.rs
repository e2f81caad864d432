use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    cookie::{CookieStore, Jar},
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::error::ErrorPayload;
use tracing::debug;
use url::Url;

use crate::error::{EngagementError, TransportError};

pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    /// Sent as `X-CSRFToken` on state-mutating calls.
    pub csrf_token: Option<String>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            query: Vec::new(),
            form: Vec::new(),
            csrf_token: None,
        }
    }

    pub fn post(url: Url, form: Vec<(String, String)>, csrf_token: Option<String>) -> Self {
        Self {
            method: Method::Post,
            url,
            query: Vec::new(),
            form,
            csrf_token,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// What came back, after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub final_url: Url,
    pub redirected: bool,
    pub body: String,
}

impl HttpReply {
    pub fn redirected_to_login(&self, login: &Url) -> bool {
        if !self.redirected {
            return false;
        }
        let login_path = login.path().trim_end_matches('/');
        (!login_path.is_empty() && self.final_url.path().starts_with(login_path))
            || self.final_url.as_str().to_ascii_lowercase().contains("login")
    }
}

/// How an endpoint signals that the viewer must sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// 401 only; anything else is an ordinary failure.
    Unauthorized,
    /// 401 or a redirect that landed on the login page. A 403 on these
    /// endpoints carries structured permission errors instead.
    UnauthorizedOrLoginRedirect,
    /// 401, 403 or a login redirect, all treated the same.
    StatusOrLoginRedirect,
}

/// Maps a reply onto the error taxonomy. `Ok` means a 2xx that did not land
/// on the login page.
pub fn classify(
    reply: HttpReply,
    auth: AuthSignal,
    login: &Url,
) -> Result<HttpReply, EngagementError> {
    let status = reply.status;
    let auth_required = match auth {
        AuthSignal::Unauthorized => status == StatusCode::UNAUTHORIZED,
        AuthSignal::UnauthorizedOrLoginRedirect => {
            status == StatusCode::UNAUTHORIZED || reply.redirected_to_login(login)
        }
        AuthSignal::StatusOrLoginRedirect => {
            status == StatusCode::UNAUTHORIZED
                || status == StatusCode::FORBIDDEN
                || reply.redirected_to_login(login)
        }
    };
    if auth_required {
        return Err(EngagementError::AuthRequired);
    }

    if status.is_success() {
        return Ok(reply);
    }

    let payload = serde_json::from_str::<ErrorPayload>(&reply.body).unwrap_or_default();
    if payload.has_field_errors() {
        return Err(EngagementError::Validation {
            message: payload.consolidated().unwrap_or_default(),
            form: payload.form,
        });
    }

    Err(EngagementError::Server {
        status: Some(status.as_u16()),
        message: payload.error.or(payload.message),
    })
}

pub fn decode<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, EngagementError> {
    serde_json::from_str(&reply.body).map_err(|err| {
        debug!(
            "transport: undecodable body status={} url={} error={err}",
            reply.status, reply.final_url
        );
        EngagementError::malformed(reply.status.as_u16())
    })
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError>;

    /// Value of a session cookie visible to same-origin requests.
    fn cookie(&self, name: &str) -> Option<String>;
}

pub struct MissingTransport;

#[async_trait]
impl Transport for MissingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        Err(TransportError::Unavailable(format!(
            "no transport configured for {}",
            request.url
        )))
    }

    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Same-origin, credential-bearing transport backed by a shared cookie jar.
pub struct HttpTransport {
    http: Client,
    jar: Arc<Jar>,
    origin: Url,
}

impl HttpTransport {
    pub fn new(origin: Url, timeout: Duration) -> Result<Self, TransportError> {
        Self::with_jar(origin, timeout, Arc::new(Jar::default()))
    }

    pub fn with_jar(origin: Url, timeout: Duration, jar: Arc<Jar>) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REQUESTED_WITH_HEADER,
            HeaderValue::from_static(REQUESTED_WITH_VALUE),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()?;

        Ok(Self { http, jar, origin })
    }

    /// Seeds the jar, e.g. with a session cookie handed over by a browser.
    pub fn add_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.origin);
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        let requested = request.url.clone();
        let mut builder = match request.method {
            Method::Get => self.http.get(request.url),
            Method::Post => self.http.post(request.url).form(&request.form),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.csrf_token.as_deref().filter(|t| !t.is_empty()) {
            builder = builder.header(CSRF_HEADER, token);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(err)
            }
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let redirected = final_url.path() != requested.path() || final_url.host() != requested.host();
        let body = response.text().await?;

        Ok(HttpReply {
            status,
            final_url,
            redirected,
            body,
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let raw = header.to_str().ok()?;
        cookie::Cookie::split_parse(raw)
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
