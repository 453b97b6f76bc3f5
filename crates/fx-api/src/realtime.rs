//! reqwest-backed `RealtimeSource` for `GET /v1/channel/<id>/ts/<ts>`.

use std::time::Duration;

use async_trait::async_trait;
use fx_types::{ApiError, RealtimeResponse, RealtimeSource};
use reqwest::header::ACCEPT;

use crate::http::{build_client, status_error, transport};
use crate::TOKEN_HEADER;

pub struct HttpRealtimeClient {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpRealtimeClient {
    /// `timeout` must exceed the API's long-poll hold time.
    pub fn new(rt_base: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_client(timeout)?,
            base: rt_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn channel_url(&self, service_id: &str, ts: u64) -> String {
        format!("{}/v1/channel/{}/ts/{}", self.base, service_id, ts)
    }
}

#[async_trait]
impl RealtimeSource for HttpRealtimeClient {
    async fn fetch(&self, service_id: &str, ts: u64) -> Result<RealtimeResponse, ApiError> {
        let resp = self
            .client
            .get(self.channel_url(service_id, ts))
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        RealtimeResponse::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_url_layout() {
        let c = HttpRealtimeClient::new("https://rt.example.com/", "t", Duration::from_secs(5)).unwrap();
        assert_eq!(
            c.channel_url("AbC123", 1_700_000_000),
            "https://rt.example.com/v1/channel/AbC123/ts/1700000000"
        );
    }
}
