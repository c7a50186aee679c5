use crate::reading::Reading;
use crate::store::{ReadingStore, StorageError};

/// Latest reading for display. `None` means nothing has been received yet.
///
/// Read access is public; no authentication happens here.
pub async fn get_latest(
    store: &dyn ReadingStore,
    site: Option<&str>,
) -> Result<Option<Reading>, StorageError> {
    let site = site.map(str::trim).filter(|s| !s.is_empty());
    store.latest(site).await
}
