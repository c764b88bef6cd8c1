//! User-facing mutations.
//!
//! Each action:
//!
//! 1. claims an in-flight key for (action, entity), rejecting duplicates
//! 2. waits its turn on the lane of its entity kind, so actions on one kind
//!    apply in issue order
//! 3. calls the backend through [`Engine::authed`]
//! 4. publishes exactly one invalidation event if, and only if, the call
//!    succeeded

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{AddToCart, Backend, BorrowReceipt, BorrowRequest, ReservationReceipt};
use crate::bus::EventKind;
use crate::engine::Engine;
use crate::error::{AppError, Result};
use crate::models::{Book, CopyUpdate, NewCopy, ReservationRecord};
use crate::session::Session;

/// Entity kinds that actions serialise on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Cart,
    Lending,
    Reservation,
    Notification,
    Copy,
}

impl Entity {
    const COUNT: usize = 5;

    /// Event published after a successful action. Copy edits have none; the
    /// copy manager refreshes itself.
    pub fn event(&self) -> Option<EventKind> {
        match self {
            Self::Cart => Some(EventKind::CartChanged),
            Self::Lending => Some(EventKind::LendingChanged),
            Self::Reservation => Some(EventKind::ReservationChanged),
            Self::Notification => Some(EventKind::NotificationsChanged),
            Self::Copy => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Lending => "lending",
            Self::Reservation => "reservation",
            Self::Notification => "notification",
            Self::Copy => "copy",
        }
    }
}

/// Ordering lanes and in-flight keys.
pub struct ActionLedger {
    lanes: [tokio::sync::Mutex<()>; Entity::COUNT],
    in_flight: Mutex<HashSet<String>>,
}

/// Holds an in-flight key until dropped.
struct Claim<'a> {
    ledger: &'a ActionLedger,
    key: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.ledger.keys().remove(&self.key);
    }
}

impl ActionLedger {
    pub fn new() -> Self {
        Self {
            lanes: std::array::from_fn(|_| tokio::sync::Mutex::new(())),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lane(&self, entity: Entity) -> &tokio::sync::Mutex<()> {
        &self.lanes[entity as usize]
    }

    fn claim(&self, key: String) -> Result<Claim<'_>> {
        if !self.keys().insert(key.clone()) {
            return Err(AppError::in_flight(key));
        }
        Ok(Claim { ledger: self, key })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.keys().contains(key)
    }
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight key of an action.
pub fn action_key(entity: Entity, action: &str, target: &str) -> String {
    format!("{}:{}:{}", entity.as_str(), action, target)
}

impl Engine {
    async fn perform<T, F, Fut>(
        &self,
        entity: Entity,
        action: &str,
        target: &str,
        op: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<dyn Backend>, Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _claim = self.actions.claim(action_key(entity, action, target))?;
        let _lane = self.actions.lane(entity).lock().await;

        let result = self.authed(op).await;
        match &result {
            Ok(_) => {
                log::info!("{action} {target}: ok");
                if let Some(kind) = entity.event() {
                    self.bus.publish(kind);
                }
            }
            Err(e) => log::warn!("{action} {target}: {e}"),
        }
        result
    }

    /// Borrow one copy of `book`.
    pub async fn borrow(&self, book: &Book) -> Result<BorrowReceipt> {
        let request = BorrowRequest::from(book);
        self.perform(Entity::Lending, "borrow", &book.id, |b, s| async move {
            b.borrow_book(&s, &request).await
        })
        .await
    }

    /// Look the book up, then borrow it.
    pub async fn borrow_by_id(&self, book_id: &str) -> Result<BorrowReceipt> {
        let id = book_id.to_string();
        let book = self
            .authed(|b, s| async move { b.get_book(&s, &id).await })
            .await?;
        self.borrow(&book).await
    }

    /// Return the caller's active borrow of `book_id`.
    pub async fn return_book(&self, book_id: &str) -> Result<()> {
        let id = book_id.to_string();
        self.perform(Entity::Lending, "return", book_id, |b, s| async move {
            b.return_book(&s, &id).await
        })
        .await
    }

    /// Lend `book` to `user_id` on an administrator's behalf.
    pub async fn admin_borrow(&self, user_id: &str, book: &Book) -> Result<BorrowReceipt> {
        self.sessions.require()?.require_admin()?;
        let request = BorrowRequest::from(book);
        let user = user_id.to_string();
        let target = format!("{}/{}", user_id, book.id);
        self.perform(Entity::Lending, "admin-borrow", &target, |b, s| async move {
            b.admin_borrow(&s, &user, &request).await
        })
        .await
    }

    /// Close any active borrow by id.
    pub async fn admin_return(&self, borrow_id: i64) -> Result<()> {
        self.sessions.require()?.require_admin()?;
        self.perform(
            Entity::Lending,
            "admin-return",
            &borrow_id.to_string(),
            |b, s| async move { b.admin_return(&s, borrow_id).await },
        )
        .await
    }

    pub async fn reserve(&self, book_id: &str) -> Result<ReservationReceipt> {
        let id = book_id.to_string();
        self.perform(Entity::Reservation, "reserve", book_id, |b, s| async move {
            b.create_reservation(&s, &id).await
        })
        .await
    }

    /// Cancel an active reservation. Terminal ones are refused without a
    /// request.
    pub async fn cancel_reservation(&self, reservation: &ReservationRecord) -> Result<()> {
        if !reservation.is_cancellable() {
            return Err(AppError::NotCancellable {
                id: reservation.id,
                status: reservation.status.as_str().to_string(),
            });
        }
        let id = reservation.id;
        self.perform(
            Entity::Reservation,
            "cancel",
            &id.to_string(),
            |b, s| async move { b.cancel_reservation(&s, id).await },
        )
        .await
    }

    /// Cancel by id, looking the reservation up in the latest snapshot and
    /// re-fetching once if it is not there.
    pub async fn cancel_reservation_by_id(&self, reservation_id: i64) -> Result<()> {
        let find = |list: &[ReservationRecord]| {
            list.iter().find(|r| r.id == reservation_id).cloned()
        };
        let reservation = match find(&self.store.reservations.get()) {
            Some(r) => r,
            None => {
                let fresh = self
                    .store
                    .reservations
                    .refresh(self.authed(|b, s| async move { b.reservations(&s).await }))
                    .await?;
                find(&fresh).ok_or_else(|| AppError::business(404, "Reservation not found"))?
            }
        };
        self.cancel_reservation(&reservation).await
    }

    pub async fn add_to_cart(&self, book: &Book) -> Result<()> {
        let item = AddToCart::from(book);
        self.perform(Entity::Cart, "add", &book.id, |b, s| async move {
            b.add_to_cart(&s, &item).await
        })
        .await
    }

    pub async fn remove_from_cart(&self, book_id: &str) -> Result<()> {
        let id = book_id.to_string();
        self.perform(Entity::Cart, "remove", book_id, |b, s| async move {
            b.remove_from_cart(&s, &id).await
        })
        .await
    }

    pub async fn clear_cart(&self) -> Result<()> {
        self.perform(Entity::Cart, "clear", "all", |b, s| async move {
            b.clear_cart(&s).await
        })
        .await
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<()> {
        self.perform(
            Entity::Notification,
            "mark-read",
            &notification_id.to_string(),
            |b, s| async move { b.mark_read(&s, notification_id).await },
        )
        .await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.perform(Entity::Notification, "mark-all-read", "all", |b, s| async move {
            b.mark_all_read(&s).await
        })
        .await
    }

    pub async fn delete_notification(&self, notification_id: i64) -> Result<()> {
        self.perform(
            Entity::Notification,
            "delete",
            &notification_id.to_string(),
            |b, s| async move { b.delete_notification(&s, notification_id).await },
        )
        .await
    }

    pub async fn add_copy(&self, copy: &NewCopy) -> Result<()> {
        self.sessions.require()?.require_admin()?;
        let copy = copy.clone();
        let target = format!("{}#{}", copy.book_id, copy.copy_number);
        self.perform(Entity::Copy, "add-copy", &target, |b, s| async move {
            b.admin_add_copy(&s, &copy).await
        })
        .await
    }

    pub async fn update_copy(&self, copy_id: i64, update: &CopyUpdate) -> Result<()> {
        self.sessions.require()?.require_admin()?;
        let update = update.clone();
        self.perform(
            Entity::Copy,
            "update-copy",
            &copy_id.to_string(),
            |b, s| async move { b.admin_update_copy(&s, copy_id, &update).await },
        )
        .await
    }

    pub async fn delete_copy(&self, copy_id: i64) -> Result<()> {
        self.sessions.require()?.require_admin()?;
        self.perform(
            Entity::Copy,
            "delete-copy",
            &copy_id.to_string(),
            |b, s| async move { b.admin_delete_copy(&s, copy_id).await },
        )
        .await
    }
}
