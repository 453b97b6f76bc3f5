//! Realtime stats payload.
//!
//! Shape of `GET /v1/channel/<service>/ts/<ts>`:
//! `{"Data":[{"datacenter":{"<dc>":{..}},"recorded":<unix>}],"Timestamp":<next>,"Error":""}`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RealtimeResponse {
    #[serde(default)]
    pub data: Vec<Datum>,
    /// Cursor for the next request.
    #[serde(default)]
    pub timestamp: u64,
    /// Non-empty when the API reports a problem inside a 200 response.
    #[serde(default)]
    pub error: String,
}

impl RealtimeResponse {
    pub fn from_json(body: &[u8]) -> Result<Self, crate::ApiError> {
        serde_json::from_slice(body).map_err(|e| crate::ApiError::Decode(e.to_string()))
    }
}

/// One second of stats, broken down by datacenter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Datum {
    #[serde(default)]
    pub datacenter: BTreeMap<String, Stats>,
    #[serde(default)]
    pub recorded: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub requests: u64,
    pub hits: u64,
    pub miss: u64,
    pub pass: u64,
    pub errors: u64,
    pub synth: u64,
    pub hits_time: f64,
    pub miss_time: f64,
    pub status_1xx: u64,
    pub status_2xx: u64,
    pub status_3xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub req_header_bytes: u64,
    pub req_body_bytes: u64,
    pub resp_header_bytes: u64,
    pub resp_body_bytes: u64,
    pub bereq_header_bytes: u64,
    pub bereq_body_bytes: u64,
    /// Everything not decoded above, including the per-code `status_NNN` keys.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl Stats {
    /// `(group, count)` pairs for the `status_Nxx` fields.
    pub fn status_groups(&self) -> [(&'static str, u64); 5] {
        [
            ("1xx", self.status_1xx),
            ("2xx", self.status_2xx),
            ("3xx", self.status_3xx),
            ("4xx", self.status_4xx),
            ("5xx", self.status_5xx),
        ]
    }

    /// `(code, count)` pairs for every `status_NNN` field with a numeric code.
    pub fn status_codes(&self) -> Vec<(&str, u64)> {
        self.other
            .iter()
            .filter_map(|(k, v)| {
                let code = k.strip_prefix("status_")?;
                if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Some((code, v.as_u64()?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "Data": [{
            "datacenter": {
                "NYC": {"requests": 12, "hits": 10, "miss": 2, "hits_time": 0.25,
                        "status_2xx": 11, "status_5xx": 1, "status_200": 11, "status_503": 1,
                        "status_xyz": 4, "edge_requests": 12}
            },
            "aggregated": {"requests": 12},
            "recorded": 1700000000
        }],
        "Timestamp": 1700000001,
        "AggregateDelay": 5,
        "Error": ""
    }"#;

    #[test]
    fn decodes_payload() {
        let r = RealtimeResponse::from_json(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(r.timestamp, 1_700_000_001);
        assert_eq!(r.data.len(), 1);
        let nyc = &r.data[0].datacenter["NYC"];
        assert_eq!(nyc.requests, 12);
        assert_eq!(nyc.hits, 10);
        assert!((nyc.hits_time - 0.25).abs() < f64::EPSILON);
        assert_eq!(nyc.status_groups()[1], ("2xx", 11));
    }

    #[test]
    fn picks_numeric_status_codes_only() {
        let r = RealtimeResponse::from_json(PAYLOAD.as_bytes()).unwrap();
        let codes = r.data[0].datacenter["NYC"].status_codes();
        assert_eq!(codes, vec![("200", 11), ("503", 1)]);
    }

    #[test]
    fn error_payload_without_data() {
        let r = RealtimeResponse::from_json(br#"{"Error":"No data"}"#).unwrap();
        assert!(r.data.is_empty());
        assert_eq!(r.error, "No data");
    }
}
