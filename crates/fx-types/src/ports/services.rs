use async_trait::async_trait;

use crate::{ApiError, ServicePage};

/// Fetches one page of the paginated service listing.
///
/// `token` is `None` for the first page and the previous page's `next`
/// afterwards. Implementations must report transport and decode failures as
/// errors; an empty listing is an empty page.
#[async_trait]
pub trait ServicePager: Send + Sync {
    async fn fetch_page(&self, token: Option<&str>) -> Result<ServicePage, ApiError>;
}
