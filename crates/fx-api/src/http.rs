//! reqwest-backed `ServicePager` for `GET /service`.
//!
//! The first page is `{api_base}/service`; every following page is the URL
//! from the previous response's `Link: <..>; rel="next"` header, which is
//! passed back in as the continuation token. A next link that resolves to a
//! different origin than `api_base` is refused, so the token never leaves
//! the API host.

use std::time::Duration;

use async_trait::async_trait;
use fx_types::{ApiError, ServicePage, ServicePager};
use reqwest::header::{ACCEPT, LINK};
use reqwest::Url;

use crate::TOKEN_HEADER;

/// Longest response body kept in `ApiError::Status`.
const MAX_ERROR_BODY: usize = 256;

pub struct HttpServicePager {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpServicePager {
    pub fn new(api_base: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = build_client(timeout)?;
        Ok(Self::with_client(client, api_base, token))
    }

    pub fn with_client(client: reqwest::Client, api_base: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn first_page(&self) -> String {
        format!("{}/service", self.base)
    }

    /// Resolve a continuation link against the first page URL and check it
    /// stays on the same origin.
    fn resolve_next(&self, link: &str) -> Result<String, ApiError> {
        let first = self.first_page();
        let base = Url::parse(&first)
            .map_err(|e| ApiError::Decode(format!("invalid api base {:?}: {e}", self.base)))?;
        let next = base
            .join(link)
            .map_err(|e| ApiError::Decode(format!("invalid next page link {link:?}: {e}")))?;
        if next.origin() != base.origin() {
            return Err(ApiError::Decode(format!(
                "next page link {link:?} leaves {}",
                self.base
            )));
        }
        Ok(next.into())
    }
}

#[async_trait]
impl ServicePager for HttpServicePager {
    async fn fetch_page(&self, token: Option<&str>) -> Result<ServicePage, ApiError> {
        let url = match token {
            None => self.first_page(),
            Some(link) => self.resolve_next(link)?,
        };
        let resp = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let next = resp
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(next_link);
        let body = resp.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        ServicePage::from_json(&body, next)
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fastly-exporter/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(transport)
}

pub(crate) fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Transport(format!("timeout: {e}"))
    } else {
        ApiError::Transport(e.to_string())
    }
}

pub(crate) fn status_error(code: u16, body: &[u8]) -> ApiError {
    let text = String::from_utf8_lossy(body);
    ApiError::Status {
        code,
        body: text.trim().chars().take(MAX_ERROR_BODY).collect(),
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header value.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_ascii_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        is_next.then(|| url.to_string())
    })
}
