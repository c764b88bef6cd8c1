use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;

use crate::bus::EventKind;
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{Book, BookFilters, CopyRecord};
use crate::views::{Fetcher, Synced};

/// Catalog search results. Borrows and returns change availability, so the
/// list follows lending events.
pub struct CatalogView {
    feed: Synced<Book>,
    filters: Arc<Mutex<BookFilters>>,
}

impl CatalogView {
    pub fn mount(engine: Arc<Engine>, filters: BookFilters) -> Self {
        let filters = Arc::new(Mutex::new(filters));
        let current = Arc::clone(&filters);
        let fetch: Fetcher<Book> = Arc::new(move |engine: Arc<Engine>| {
            let filters = current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            async move {
                engine
                    .authed(|b, s| async move { b.list_books(&s, &filters).await })
                    .await
            }
            .boxed()
        });

        let collection = engine.store().scoped("catalog");
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::LendingChanged, EventKind::ReservationChanged],
                fetch,
            ),
            filters,
        }
    }

    pub async fn books(&self) -> Result<Arc<Vec<Book>>> {
        self.feed.read().await
    }

    /// Replace the filters and re-run the search.
    pub async fn search(&self, filters: BookFilters) -> Result<Arc<Vec<Book>>> {
        *self.filters.lock().unwrap_or_else(PoisonError::into_inner) = filters;
        self.feed.refresh().await
    }

    /// One title plus its copies, for the detail page.
    pub async fn detail(&self, book_id: &str) -> Result<(Book, Vec<CopyRecord>)> {
        let engine = self.feed.engine();
        let id = book_id.to_string();
        let book = engine
            .authed(|b, s| async move { b.get_book(&s, &id).await })
            .await?;
        let id = book_id.to_string();
        let copies = engine
            .authed(|b, s| async move { b.book_copies(&s, &id).await })
            .await?;
        Ok((book, copies))
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::fixed_now;
    use crate::views::Dashboard;
    use crate::views::testing::{library, signed_in};

    #[tokio::test]
    async fn test_search_and_availability() {
        let backend = library();
        let engine = signed_in(&backend, "user1", "pw").await;
        let catalog = CatalogView::mount(Arc::clone(&engine), BookFilters::default());
        assert_eq!(catalog.books().await.unwrap().len(), 3);

        let hits = catalog.search(BookFilters::search("tokio")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].available_copies, 1);

        engine.borrow_by_id("B003").await.unwrap();
        let hits = catalog.books().await.unwrap();
        assert_eq!(hits[0].available_copies, 0);

        let (book, copies) = catalog.detail("B003").await.unwrap();
        assert_eq!(book.id, "B003");
        assert_eq!(copies.len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_views_keep_their_own_results() {
        let backend = library();
        let admin = signed_in(&backend, "admin", "admin123").await;
        let search = CatalogView::mount(Arc::clone(&admin), BookFilters::search("tokio"));
        let everything = CatalogView::mount(Arc::clone(&admin), BookFilters::default());

        assert_eq!(search.books().await.unwrap().len(), 1);
        assert_eq!(everything.books().await.unwrap().len(), 3);
        assert_eq!(search.books().await.unwrap().len(), 1);

        Dashboard::mount(Arc::clone(&admin))
            .load_at(fixed_now())
            .await
            .unwrap();
        assert_eq!(search.books().await.unwrap()[0].id, "B003");
    }
}
