//! Gateway abstractions.
//!
//! Every service behind the gateway is reached through the [`Backend`] trait.
//! Two implementations exist:
//!
//! - [`HttpBackend`]: JSON over HTTP against a running gateway
//! - [`MemoryBackend`]: an in-process simulation of the services' rules, for
//!   tests and offline runs
//!
//! ## Service map
//!
//! ```text
//! /users          login, logout
//! /books          catalog search, single book, copies of a book
//! /borrows        borrow, return, active list, history, admin variants
//! /reservations   create, list, cancel
//! /notifications  list, unread count, mark read, mark all read, delete
//! /cart           list, add, remove, clear
//! /admin/copies   copy CRUD
//! ```

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    Book, BookFilters, CartItem, CopyRecord, CopyUpdate, LendingRecord, NewCopy, Notification,
    ReservationRecord,
};
use crate::session::{Credentials, LoginResponse, Session};

// Re-export for convenience
pub use http::HttpBackend;
pub use memory::{Failure, MemoryBackend};

/// Body of `POST /borrows/borrow` (and, with `user_id`, the admin variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub book_id: String,
    pub title: String,
    pub author: String,
}

impl From<&Book> for BorrowRequest {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
        }
    }
}

/// Response of a successful borrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(with = "crate::models::calendar_date")]
    pub due_date: NaiveDate,
}

/// Response of a successful reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReceipt {
    #[serde(default)]
    pub message: String,
    pub id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToCart {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub price: f64,
    #[serde(default)]
    pub cover_image: String,
}

impl From<&Book> for AddToCart {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            price: book.price,
            cover_image: book.cover_image.clone(),
        }
    }
}

/// Request/response contract of the gateway.
///
/// Implementations report a 401 as [`crate::error::AppError::Unauthorized`];
/// the session layer turns that into a global logout.
#[async_trait]
pub trait Backend: Send + Sync {
    // --- Users ---

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;

    async fn logout(&self, session: &Session) -> Result<()>;

    // --- Catalog ---

    async fn list_books(&self, session: &Session, filters: &BookFilters) -> Result<Vec<Book>>;

    async fn get_book(&self, session: &Session, book_id: &str) -> Result<Book>;

    async fn book_copies(&self, session: &Session, book_id: &str) -> Result<Vec<CopyRecord>>;

    // --- Borrowing ---

    async fn borrow_book(&self, session: &Session, request: &BorrowRequest)
    -> Result<BorrowReceipt>;

    async fn return_book(&self, session: &Session, book_id: &str) -> Result<()>;

    async fn active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>>;

    async fn borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>>;

    async fn admin_active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>>;

    async fn admin_borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>>;

    async fn admin_borrow(
        &self,
        session: &Session,
        user_id: &str,
        request: &BorrowRequest,
    ) -> Result<BorrowReceipt>;

    async fn admin_return(&self, session: &Session, borrow_id: i64) -> Result<()>;

    // --- Reservations ---

    async fn create_reservation(
        &self,
        session: &Session,
        book_id: &str,
    ) -> Result<ReservationReceipt>;

    async fn reservations(&self, session: &Session) -> Result<Vec<ReservationRecord>>;

    async fn cancel_reservation(&self, session: &Session, reservation_id: i64) -> Result<()>;

    // --- Notifications ---

    async fn notifications(&self, session: &Session) -> Result<Vec<Notification>>;

    async fn unread_count(&self, session: &Session) -> Result<u32>;

    async fn mark_read(&self, session: &Session, notification_id: i64) -> Result<()>;

    async fn mark_all_read(&self, session: &Session) -> Result<()>;

    async fn delete_notification(&self, session: &Session, notification_id: i64) -> Result<()>;

    // --- Cart ---

    async fn cart(&self, session: &Session) -> Result<Vec<CartItem>>;

    async fn add_to_cart(&self, session: &Session, item: &AddToCart) -> Result<()>;

    async fn remove_from_cart(&self, session: &Session, book_id: &str) -> Result<()>;

    async fn clear_cart(&self, session: &Session) -> Result<()>;

    // --- Admin copies ---

    async fn admin_copies(
        &self,
        session: &Session,
        book_id: Option<&str>,
    ) -> Result<Vec<CopyRecord>>;

    async fn admin_add_copy(&self, session: &Session, copy: &NewCopy) -> Result<()>;

    async fn admin_update_copy(
        &self,
        session: &Session,
        copy_id: i64,
        update: &CopyUpdate,
    ) -> Result<()>;

    async fn admin_delete_copy(&self, session: &Session, copy_id: i64) -> Result<()>;
}
