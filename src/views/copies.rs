use std::sync::Arc;

use futures::FutureExt;

use crate::bus::EventKind;
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{CopyRecord, CopyUpdate, NewCopy};
use crate::views::{Fetcher, Synced};

/// Admin copy management. Copy edits carry no bus event, so the manager
/// refreshes itself after each one; lending events also invalidate it since
/// borrows flip copy statuses.
pub struct CopyManager {
    feed: Synced<CopyRecord>,
}

impl CopyManager {
    /// Mount for every copy, or for the copies of one book.
    pub fn mount(engine: Arc<Engine>, book_id: Option<String>) -> Self {
        let fetch: Fetcher<CopyRecord> = Arc::new(move |engine: Arc<Engine>| {
            let book_id = book_id.clone();
            async move {
                engine
                    .authed_admin(|b, s| async move {
                        b.admin_copies(&s, book_id.as_deref()).await
                    })
                    .await
            }
            .boxed()
        });
        let collection = engine.store().scoped("copies");
        Self {
            feed: Synced::mount(engine, collection, &[EventKind::LendingChanged], fetch),
        }
    }

    pub async fn copies(&self) -> Result<Arc<Vec<CopyRecord>>> {
        self.feed.read().await
    }

    pub async fn add(&self, copy: &NewCopy) -> Result<Arc<Vec<CopyRecord>>> {
        self.feed.engine().add_copy(copy).await?;
        self.feed.refresh().await
    }

    pub async fn update(&self, copy_id: i64, update: &CopyUpdate) -> Result<Arc<Vec<CopyRecord>>> {
        self.feed.engine().update_copy(copy_id, update).await?;
        self.feed.refresh().await
    }

    pub async fn delete(&self, copy_id: i64) -> Result<Arc<Vec<CopyRecord>>> {
        self.feed.engine().delete_copy(copy_id).await?;
        self.feed.refresh().await
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::CopyStatus;
    use crate::views::testing::{library, signed_in};

    #[tokio::test]
    async fn test_copy_crud() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let manager = CopyManager::mount(Arc::clone(&admin), Some("B001".to_string()));
        assert_eq!(manager.copies().await.unwrap().len(), 2);

        let added = manager
            .add(&NewCopy {
                book_id: "B001".into(),
                copy_number: 3,
                status: CopyStatus::Available,
                location: "Annex".into(),
                acquired_date: "2024-01-01".into(),
                notes: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(added.len(), 3);

        let mut update = CopyUpdate::from(&added[2]);
        update.status = CopyStatus::Maintenance;
        let updated = manager.update(added[2].id, &update).await.unwrap();
        assert_eq!(updated[2].status, CopyStatus::Maintenance);

        let remaining = manager.delete(added[2].id).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_copy_number_keeps_list() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let manager = CopyManager::mount(Arc::clone(&admin), None);
        let before = manager.copies().await.unwrap().len();

        let err = manager
            .add(&NewCopy {
                book_id: "B001".into(),
                copy_number: 1,
                status: CopyStatus::Available,
                location: String::new(),
                acquired_date: String::new(),
                notes: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Business { status: 409, .. }));
        assert_eq!(manager.copies().await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_book_filter_is_per_manager() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let one_book = CopyManager::mount(Arc::clone(&admin), Some("B001".to_string()));
        let every_book = CopyManager::mount(Arc::clone(&admin), None);

        assert_eq!(one_book.copies().await.unwrap().len(), 2);
        assert_eq!(every_book.copies().await.unwrap().len(), 4);
        assert!(one_book.copies().await.unwrap().iter().all(|c| c.book_id == "B001"));
    }
}
