//! Request routing for the exporter's HTTP surface.

use std::collections::BTreeMap;

use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Body, Method, Request, Response, StatusCode};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::warn;

use crate::registry::Registry;

#[derive(Debug, Serialize)]
struct SdTarget {
    targets: Vec<String>,
    labels: BTreeMap<&'static str, String>,
}

impl Registry {
    /// `GET /`, `GET /sd`, `GET /metrics[?target=<id>]`.
    pub fn handle(&self, req: &Request<Body>) -> Response<Body> {
        let path = req.uri().path();
        if !matches!(path, "/" | "/sd" | "/metrics") {
            return plain(StatusCode::NOT_FOUND, "not found");
        }
        if req.method() != Method::GET {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }
        match path {
            "/" => self.index(),
            "/sd" => self.service_discovery(req),
            _ => self.metrics(req.uri().query()),
        }
    }

    fn index(&self) -> Response<Body> {
        let mut page = String::from(
            "<!DOCTYPE html>\n<html><head><title>Fastly exporter</title></head><body>\n\
             <h1>Fastly exporter</h1>\n<ul>\n\
             <li><a href=\"/metrics\">/metrics</a> (all services)</li>\n\
             <li><a href=\"/sd\">/sd</a> (service discovery)</li>\n</ul>\n<ul>\n",
        );
        for (id, name) in self.services() {
            let id = escape_html(&id);
            let name = escape_html(&name);
            page.push_str(&format!(
                "<li><a href=\"/metrics?target={id}\">{id}</a> {name}</li>\n"
            ));
        }
        page.push_str("</ul>\n</body></html>\n");
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(page))
            .unwrap_or_default()
    }

    fn service_discovery(&self, req: &Request<Body>) -> Response<Body> {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .unwrap_or_default()
            .to_string();
        let targets: Vec<SdTarget> = self
            .services()
            .into_iter()
            .map(|(id, name)| SdTarget {
                targets: vec![host.clone()],
                labels: BTreeMap::from([
                    ("__metrics_path__", "/metrics".to_string()),
                    ("__param_target", id.clone()),
                    ("service_id", id),
                    ("service_name", name),
                ]),
            })
            .collect();
        match serde_json::to_vec(&targets) {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap_or_default(),
            Err(e) => {
                warn!(error=%e, "service discovery encoding failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "encoding error")
            }
        }
    }

    fn metrics(&self, query: Option<&str>) -> Response<Body> {
        let target = query.and_then(target_param);
        match self.render(target.as_deref()) {
            Ok(buf) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, TextEncoder::new().format_type())
                .body(Body::from(buf))
                .unwrap_or_default(),
            Err(e) => {
                warn!(error=%e, "metrics encoding failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "encoding error")
            }
        }
    }
}

/// First non-empty `target` value in a query string.
fn target_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == "target" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn plain(status: StatusCode, msg: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(msg))
        .unwrap_or_default()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_param_decodes() {
        assert_eq!(target_param("target=AAA").as_deref(), Some("AAA"));
        assert_eq!(target_param("x=1&target=a%20b").as_deref(), Some("a b"));
        assert_eq!(target_param("target=").as_deref(), None);
        assert_eq!(target_param("other=AAA"), None);
    }

    #[test]
    fn escape_html_covers_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
