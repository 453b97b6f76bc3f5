//! Discovery cache over the paginated service listing.
//!
//! `refresh` drains every page first, then applies the ID allowlist, the name
//! filter and the shard in one pass, then publishes a new immutable snapshot
//! by swapping an `Arc` under a short write lock. Readers clone the `Arc`
//! under a read lock and never wait on network I/O. A failed or cancelled
//! refresh leaves the previous snapshot in place.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fx_common::Filter;
use fx_types::{ApiError, Service, ServicePager};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::Shard;

pub struct ServiceCacheConfig {
    pub pager: Arc<dyn ServicePager>,
    /// Exact service IDs to keep; empty keeps all.
    pub id_filter: HashSet<String>,
    pub name_filter: Filter,
    pub shard: Shard,
}

impl ServiceCacheConfig {
    pub fn new(pager: Arc<dyn ServicePager>) -> Self {
        Self {
            pager,
            id_filter: HashSet::new(),
            name_filter: Filter::default(),
            shard: Shard::default(),
        }
    }

    #[must_use]
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_filter = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_name_filter(mut self, filter: Filter) -> Self {
        self.name_filter = filter;
        self
    }

    #[must_use]
    pub fn with_shard(mut self, shard: Shard) -> Self {
        self.shard = shard;
        self
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    /// Ascending.
    ids: Vec<String>,
    meta: HashMap<String, (String, i64)>,
}

pub struct ServiceCache {
    pager: Arc<dyn ServicePager>,
    id_filter: HashSet<String>,
    name_filter: Filter,
    shard: Shard,
    current: RwLock<Arc<Snapshot>>,
}

impl ServiceCache {
    pub fn new(config: ServiceCacheConfig) -> Self {
        Self {
            pager: config.pager,
            id_filter: config.id_filter,
            name_filter: config.name_filter,
            shard: config.shard,
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Fetch every page, filter, and publish the result.
    ///
    /// Returns `ApiError::Cancelled` if `cancel` fires before the last page
    /// arrives, and `ApiError::Decode` if the listing hands back a
    /// continuation token it already gave. Any other page error is returned
    /// as-is. In every error case the published snapshot is unchanged.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        let mut fetched: Vec<Service> = Vec::new();
        let mut token: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                page = self.pager.fetch_page(token.as_deref()) => page?,
            };
            fetched.extend(page.services);
            match page.next {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(ApiError::Decode(format!("pagination loop at {next:?}")));
                    }
                    token = Some(next);
                }
                None => break,
            }
        }

        let next = Arc::new(self.build(fetched));
        *self.current.write() = next;
        Ok(())
    }

    fn build(&self, fetched: Vec<Service>) -> Snapshot {
        let meta: HashMap<String, (String, i64)> = fetched
            .into_iter()
            .filter(|s| self.includes(s))
            .map(|s| (s.id, (s.name, s.version)))
            .collect();
        let mut ids: Vec<String> = meta.keys().cloned().collect();
        ids.sort_unstable();
        Snapshot { ids, meta }
    }

    fn includes(&self, s: &Service) -> bool {
        (self.id_filter.is_empty() || self.id_filter.contains(&s.id))
            && self.name_filter.permit(&s.name)
            && self.shard.includes(&s.id)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// IDs of the current snapshot, ascending.
    pub fn service_ids(&self) -> Vec<String> {
        self.snapshot().ids.clone()
    }

    /// `(name, version)` of `id` in the current snapshot.
    pub fn metadata(&self, id: &str) -> Option<(String, i64)> {
        self.snapshot().meta.get(id).cloned()
    }

    /// Full records of the current snapshot, ordered by ID.
    pub fn services(&self) -> Vec<Service> {
        let snap = self.snapshot();
        snap.ids
            .iter()
            .filter_map(|id| {
                let (name, version) = snap.meta.get(id)?;
                Some(Service::new(id.clone(), name.clone(), *version))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
