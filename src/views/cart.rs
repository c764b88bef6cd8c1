use std::sync::Arc;

use crate::bus::EventKind;
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{CartItem, total_price, total_quantity};
use crate::views::{Synced, fetcher};

/// Cart contents and the header badge.
pub struct CartView {
    feed: Synced<CartItem>,
}

impl CartView {
    pub fn mount(engine: Arc<Engine>) -> Self {
        let collection = engine.store().cart.clone();
        Self {
            feed: Synced::mount(
                engine,
                collection,
                &[EventKind::CartChanged],
                fetcher(|b, s| async move { b.cart(&s).await }),
            ),
        }
    }

    pub async fn items(&self) -> Result<Arc<Vec<CartItem>>> {
        self.feed.read().await
    }

    /// Number of books in the cart, from the latest snapshot.
    pub fn badge(&self) -> u32 {
        total_quantity(&self.feed.snapshot())
    }

    pub fn total_price(&self) -> f64 {
        total_price(&self.feed.snapshot())
    }

    pub fn feed(&self) -> &Synced<CartItem> {
        &self.feed
    }

    pub fn teardown(&self) {
        self.feed.teardown();
    }
}
