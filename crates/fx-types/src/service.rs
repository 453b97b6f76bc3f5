use serde::{Deserialize, Serialize};

/// Identity record for one remotely-hosted service.
///
/// Decoded straight from a listing API record; every other field of the
/// record is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Currently active configuration version.
    pub version: i64,
}

impl Service {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
        }
    }
}

/// One page returned by a [`crate::ServicePager`].
///
/// `next == None` means no more pages remain. An empty `services` list is a
/// valid page, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePage {
    pub services: Vec<Service>,
    pub next: Option<String>,
}

impl ServicePage {
    /// Decode a JSON array of service records.
    pub fn from_json(body: &[u8], next: Option<String>) -> Result<Self, crate::ApiError> {
        let services: Vec<Service> = serde_json::from_slice(body)
            .map_err(|e| crate::ApiError::Decode(e.to_string()))?;
        Ok(Self { services, next })
    }
}
