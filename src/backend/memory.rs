//! In-process gateway simulation.
//!
//! Applies the same rules as the real services (copy bookkeeping, due dates,
//! reservation conflicts, admin checks) over plain vectors. Used by the tests
//! and by the CLI's `--offline` mode.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::backend::{AddToCart, Backend, BorrowReceipt, BorrowRequest, ReservationReceipt};
use crate::error::{AppError, Result};
use crate::models::{
    Book, BookFilters, CartItem, CopyRecord, CopyStatus, CopyUpdate, LendingRecord, LendingStatus,
    NewCopy, Notification, NotificationKind, ReservationRecord, ReservationStatus, latest_first,
    merge_item,
};
use crate::session::{Credentials, LoginResponse, Role, Session};

/// Loan period granted by the borrow service.
pub const LOAN_DAYS: i64 = 14;

/// Lifetime of a reservation.
pub const RESERVATION_DAYS: i64 = 7;

/// The notification service never returns more than this many rows.
pub const NOTIFICATION_PAGE: usize = 50;

/// A scripted failure for the next call of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Network,
    Unauthorized,
    Business(String),
    ServerFault,
}

impl Failure {
    fn into_error(self) -> AppError {
        match self {
            Self::Network => AppError::network("connection refused"),
            Self::Unauthorized => AppError::Unauthorized,
            Self::Business(message) => AppError::business(400, message),
            Self::ServerFault => AppError::server_fault(500, "internal error"),
        }
    }
}

struct Account {
    password: String,
    role: Role,
}

#[derive(Default)]
struct State {
    now: Option<DateTime<Utc>>,
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    books: Vec<Book>,
    copies: Vec<CopyRecord>,
    borrows: Vec<LendingRecord>,
    reservations: Vec<ReservationRecord>,
    notifications: Vec<Notification>,
    carts: HashMap<String, Vec<CartItem>>,
    next_id: i64,
    next_token: u64,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Resolve a bearer token to its user id.
    fn authenticate(&self, session: &Session) -> Result<String> {
        self.tokens
            .get(session.token())
            .cloned()
            .ok_or(AppError::Unauthorized)
    }

    fn authenticate_admin(&self, session: &Session) -> Result<String> {
        let user_id = self.authenticate(session)?;
        match self.accounts.get(&user_id) {
            Some(account) if account.role == Role::Admin => Ok(user_id),
            _ => Err(AppError::business(403, "admin access required")),
        }
    }

    fn book(&self, book_id: &str) -> Result<&Book> {
        self.books
            .iter()
            .find(|b| b.id == book_id)
            .ok_or_else(|| AppError::business(404, "Book not found"))
    }

    /// Recompute a book's counters from its copies.
    fn recount(&mut self, book_id: &str) {
        let total = self.copies.iter().filter(|c| c.book_id == book_id).count() as u32;
        let available = self
            .copies
            .iter()
            .filter(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            .count() as u32;
        if let Some(book) = self.books.iter_mut().find(|b| b.id == book_id) {
            book.total_copies = total;
            book.available_copies = available;
        }
    }

    fn push_copies(&mut self, book: &Book) {
        for n in 1..=book.total_copies {
            let id = self.next_id();
            let status = if n <= book.available_copies {
                CopyStatus::Available
            } else {
                CopyStatus::Borrowed
            };
            self.copies.push(CopyRecord {
                id,
                book_id: book.id.clone(),
                copy_number: n,
                status,
                location: "Main stacks".to_string(),
                acquired_date: String::new(),
                notes: String::new(),
                book_title: None,
                book_author: None,
            });
        }
    }

    fn lend(&mut self, user_id: &str, request: &BorrowRequest) -> Result<BorrowReceipt> {
        self.book(&request.book_id)?;
        let copy = self
            .copies
            .iter_mut()
            .find(|c| c.book_id == request.book_id && c.status == CopyStatus::Available)
            .ok_or_else(|| AppError::business(400, "No copy available for borrowing"))?;
        copy.status = CopyStatus::Borrowed;
        let copy_number = copy.copy_number;

        let now = self.now();
        let due_date = now.date_naive() + TimeDelta::days(LOAN_DAYS);
        let id = self.next_id();
        self.borrows.push(LendingRecord {
            id,
            user_id: user_id.to_string(),
            book_id: request.book_id.clone(),
            title: request.title.clone(),
            author: request.author.clone(),
            borrowed_at: now,
            due_date,
            returned_at: None,
            status: LendingStatus::Active,
        });

        for reservation in self.reservations.iter_mut().filter(|r| {
            r.user_id == user_id
                && r.book_id == request.book_id
                && r.status == ReservationStatus::Active
        }) {
            reservation.status = ReservationStatus::Fulfilled;
        }

        self.recount(&request.book_id);
        log::debug!(
            "User {} borrowed {} (copy {})",
            user_id,
            request.book_id,
            copy_number
        );
        Ok(BorrowReceipt {
            message: "Book borrowed".to_string(),
            due_date,
        })
    }

    /// Mark a lending returned and put one borrowed copy back on the shelf.
    fn settle(&mut self, index: usize) {
        let now = self.now();
        let book_id = {
            let record = &mut self.borrows[index];
            record.mark_returned(now);
            record.book_id.clone()
        };
        if let Some(copy) = self
            .copies
            .iter_mut()
            .find(|c| c.book_id == book_id && c.status == CopyStatus::Borrowed)
        {
            copy.status = CopyStatus::Available;
        }
        self.recount(&book_id);
    }

    fn decorate(&self, copy: &CopyRecord) -> CopyRecord {
        let book = self.books.iter().find(|b| b.id == copy.book_id);
        CopyRecord {
            book_title: book.map(|b| b.title.clone()),
            book_author: book.map(|b| b.author.clone()),
            ..copy.clone()
        }
    }

    fn copy_index(&self, copy_id: i64) -> Result<usize> {
        self.copies
            .iter()
            .position(|c| c.id == copy_id)
            .ok_or_else(|| AppError::business(404, "Copy not found"))
    }
}

/// In-memory [`Backend`].
///
/// Calls can be slowed down with [`MemoryBackend::set_latency`] and made to
/// fail with [`MemoryBackend::fail_next`]. Every call is counted per
/// operation name (the trait method name).
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    latency: Mutex<Option<Duration>>,
    failures: Mutex<HashMap<&'static str, VecDeque<Failure>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small library with an administrator, two members, five titles and
    /// some history.
    pub fn demo() -> Self {
        let now = Utc::now();
        let backend = Self::new()
            .with_user("admin", "admin123", Role::Admin)
            .with_user("user1", "password", Role::User)
            .with_user("user2", "password", Role::User)
            .with_book(sample_book("B001", "The Rust Programming Language", "Steve Klabnik", 3, 3))
            .with_book(sample_book("B002", "Programming Rust", "Jim Blandy", 2, 2))
            .with_book(sample_book("B003", "Rust for Rustaceans", "Jon Gjengset", 1, 1))
            .with_book(sample_book("B004", "Zero To Production", "Luca Palmieri", 2, 2))
            .with_book(sample_book("B005", "Rust Atomics and Locks", "Mara Bos", 1, 1));

        backend.seed_lending("user1", "B002", now - TimeDelta::days(20), None);
        backend.seed_lending(
            "user1",
            "B004",
            now - TimeDelta::days(45),
            Some(now - TimeDelta::days(35)),
        );
        backend.seed_lending("user2", "B003", now - TimeDelta::days(3), None);
        backend.seed_notification(
            "user1",
            NotificationKind::Overdue,
            "Overdue book",
            "Programming Rust is past its due date.",
        );
        backend.seed_notification(
            "user1",
            NotificationKind::Other("system".to_string()),
            "Welcome",
            "Your library account is ready.",
        );
        backend
    }

    pub fn with_user(self, id: &str, password: &str, role: Role) -> Self {
        lock(&self.state).accounts.insert(
            id.to_string(),
            Account {
                password: password.to_string(),
                role,
            },
        );
        self
    }

    /// Add a title. `total_copies` copy records are created, the first
    /// `available_copies` of them on the shelf.
    pub fn with_book(self, book: Book) -> Self {
        {
            let mut state = lock(&self.state);
            state.push_copies(&book);
            state.books.push(book);
        }
        self
    }

    /// Pin the service clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        lock(&self.state).now = Some(now);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Make the next call of `op` fail. Failures queue per operation.
    pub fn fail_next(&self, op: &'static str, failure: Failure) {
        lock(&self.failures).entry(op).or_default().push_back(failure);
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: &str) -> usize {
        lock(&self.calls).get(op).copied().unwrap_or(0)
    }

    /// Invalidate every issued token, as a server restart would.
    pub fn revoke_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Insert a lending record directly. A record without `returned_at` holds
    /// one copy of the book.
    pub fn seed_lending(
        &self,
        user_id: &str,
        book_id: &str,
        borrowed_at: DateTime<Utc>,
        returned_at: Option<DateTime<Utc>>,
    ) -> i64 {
        let mut state = lock(&self.state);
        let (title, author) = state
            .books
            .iter()
            .find(|b| b.id == book_id)
            .map(|b| (b.title.clone(), b.author.clone()))
            .unwrap_or_default();
        let id = state.next_id();
        state.borrows.push(LendingRecord {
            id,
            user_id: user_id.to_string(),
            book_id: book_id.to_string(),
            title,
            author,
            borrowed_at,
            due_date: borrowed_at.date_naive() + TimeDelta::days(LOAN_DAYS),
            returned_at,
            status: if returned_at.is_some() {
                LendingStatus::Returned
            } else {
                LendingStatus::Active
            },
        });
        if returned_at.is_none() {
            if let Some(copy) = state
                .copies
                .iter_mut()
                .find(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            {
                copy.status = CopyStatus::Borrowed;
            }
            state.recount(book_id);
        }
        id
    }

    /// Insert an unread notification created now.
    pub fn seed_notification(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> i64 {
        let mut state = lock(&self.state);
        let id = state.next_id();
        let created_at = state.now();
        state.notifications.push(Notification {
            id,
            user_id: user_id.to_string(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            related_id: None,
            is_read: false,
            created_at,
        });
        id
    }

    /// Count the call, apply latency, then pop a scripted failure if any.
    async fn enter(&self, op: &'static str) -> Result<()> {
        *lock(&self.calls).entry(op).or_default() += 1;

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = lock(&self.failures)
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => {
                log::debug!("Scripted failure for {op}: {failure:?}");
                Err(failure.into_error())
            }
            None => Ok(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

/// A book with the given counters and placeholder metadata.
pub fn sample_book(id: &str, title: &str, author: &str, total: u32, available: u32) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        publisher: String::new(),
        year: 2024,
        isbn: String::new(),
        description: String::new(),
        price: 30.0,
        cover_image: String::new(),
        total_copies: total,
        available_copies: available.min(total),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.enter("login").await?;
        let mut state = self.state();
        let role = match state.accounts.get(&credentials.id) {
            Some(account) if account.password == credentials.password => account.role,
            _ => return Err(AppError::Unauthorized),
        };
        state.next_token += 1;
        let token = format!("token-{}-{}", credentials.id, state.next_token);
        state.tokens.insert(token.clone(), credentials.id.clone());
        Ok(LoginResponse {
            token,
            user_id: credentials.id.clone(),
            role: role.as_str().to_string(),
        })
    }

    async fn logout(&self, session: &Session) -> Result<()> {
        self.enter("logout").await?;
        let mut state = self.state();
        state.authenticate(session)?;
        state.tokens.remove(session.token());
        Ok(())
    }

    async fn list_books(&self, session: &Session, filters: &BookFilters) -> Result<Vec<Book>> {
        self.enter("list_books").await?;
        let state = self.state();
        state.authenticate(session)?;
        Ok(state
            .books
            .iter()
            .filter(|b| filters.matches(b))
            .cloned()
            .collect())
    }

    async fn get_book(&self, session: &Session, book_id: &str) -> Result<Book> {
        self.enter("get_book").await?;
        let state = self.state();
        state.authenticate(session)?;
        state.book(book_id).cloned()
    }

    async fn book_copies(&self, session: &Session, book_id: &str) -> Result<Vec<CopyRecord>> {
        self.enter("book_copies").await?;
        let state = self.state();
        state.authenticate(session)?;
        state.book(book_id)?;
        Ok(state
            .copies
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn borrow_book(
        &self,
        session: &Session,
        request: &BorrowRequest,
    ) -> Result<BorrowReceipt> {
        self.enter("borrow_book").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        state.lend(&user_id, request)
    }

    async fn return_book(&self, session: &Session, book_id: &str) -> Result<()> {
        self.enter("return_book").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        let index = state
            .borrows
            .iter()
            .position(|r| r.user_id == user_id && r.book_id == book_id && !r.is_returned())
            .ok_or_else(|| AppError::business(404, "Book not found in your borrow list"))?;
        state.settle(index);
        Ok(())
    }

    async fn active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.enter("active_borrows").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        Ok(state
            .borrows
            .iter()
            .filter(|r| r.user_id == user_id && !r.is_returned())
            .cloned()
            .collect())
    }

    async fn borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.enter("borrow_history").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        let mut history: Vec<_> = state
            .borrows
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        Ok(history)
    }

    async fn admin_active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.enter("admin_active_borrows").await?;
        let state = self.state();
        state.authenticate_admin(session)?;
        Ok(state
            .borrows
            .iter()
            .filter(|r| !r.is_returned())
            .cloned()
            .collect())
    }

    async fn admin_borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.enter("admin_borrow_history").await?;
        let state = self.state();
        state.authenticate_admin(session)?;
        let mut history = state.borrows.clone();
        history.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        Ok(history)
    }

    async fn admin_borrow(
        &self,
        session: &Session,
        user_id: &str,
        request: &BorrowRequest,
    ) -> Result<BorrowReceipt> {
        self.enter("admin_borrow").await?;
        let mut state = self.state();
        state.authenticate_admin(session)?;
        if user_id.trim().is_empty() {
            return Err(AppError::business(400, "Invalid request"));
        }
        state.lend(user_id, request)
    }

    async fn admin_return(&self, session: &Session, borrow_id: i64) -> Result<()> {
        self.enter("admin_return").await?;
        let mut state = self.state();
        state.authenticate_admin(session)?;
        let index = state
            .borrows
            .iter()
            .position(|r| r.id == borrow_id && !r.is_returned())
            .ok_or_else(|| AppError::business(404, "Borrow record not found"))?;
        state.settle(index);
        Ok(())
    }

    async fn create_reservation(
        &self,
        session: &Session,
        book_id: &str,
    ) -> Result<ReservationReceipt> {
        self.enter("create_reservation").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        let book = state.book(book_id)?.clone();

        if book.is_available() {
            return Err(AppError::business(
                400,
                "Book is available, no reservation needed",
            ));
        }
        let duplicate = state.reservations.iter().any(|r| {
            r.user_id == user_id && r.book_id == book_id && r.status == ReservationStatus::Active
        });
        if duplicate {
            return Err(AppError::business(400, "Book already reserved"));
        }

        let now = state.now();
        let expires_at = now + TimeDelta::days(RESERVATION_DAYS);
        let id = state.next_id();
        state.reservations.push(ReservationRecord {
            id,
            user_id,
            book_id: book.id,
            title: book.title,
            author: book.author,
            reserved_at: now,
            expires_at,
            status: ReservationStatus::Active,
        });
        Ok(ReservationReceipt {
            message: "Book reserved".to_string(),
            id,
            expires_at,
        })
    }

    async fn reservations(&self, session: &Session) -> Result<Vec<ReservationRecord>> {
        self.enter("reservations").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        let mut list: Vec<_> = state
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
        Ok(list)
    }

    async fn cancel_reservation(&self, session: &Session, reservation_id: i64) -> Result<()> {
        self.enter("cancel_reservation").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        let reservation = state
            .reservations
            .iter_mut()
            .find(|r| {
                r.id == reservation_id
                    && r.user_id == user_id
                    && r.status == ReservationStatus::Active
            })
            .ok_or_else(|| AppError::business(404, "Reservation not found"))?;
        reservation.status = ReservationStatus::Cancelled;
        Ok(())
    }

    async fn notifications(&self, session: &Session) -> Result<Vec<Notification>> {
        self.enter("notifications").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        let own = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        Ok(latest_first(own, NOTIFICATION_PAGE))
    }

    async fn unread_count(&self, session: &Session) -> Result<u32> {
        self.enter("unread_count").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u32)
    }

    async fn mark_read(&self, session: &Session, notification_id: i64) -> Result<()> {
        self.enter("mark_read").await?;
        let mut state = self.state();
        state.authenticate(session)?;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| AppError::business(404, "Notification not found"))?;
        notification.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, session: &Session) -> Result<()> {
        self.enter("mark_all_read").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id)
        {
            notification.is_read = true;
        }
        Ok(())
    }

    async fn delete_notification(&self, session: &Session, notification_id: i64) -> Result<()> {
        self.enter("delete_notification").await?;
        let mut state = self.state();
        state.authenticate(session)?;
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != notification_id);
        if state.notifications.len() == before {
            return Err(AppError::business(404, "Notification not found"));
        }
        Ok(())
    }

    async fn cart(&self, session: &Session) -> Result<Vec<CartItem>> {
        self.enter("cart").await?;
        let state = self.state();
        let user_id = state.authenticate(session)?;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_to_cart(&self, session: &Session, item: &AddToCart) -> Result<()> {
        self.enter("add_to_cart").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        if item.book_id.trim().is_empty() {
            return Err(AppError::business(400, "Invalid request"));
        }
        let cart = state.carts.entry(user_id).or_default();
        merge_item(
            cart,
            CartItem {
                book_id: item.book_id.clone(),
                title: item.title.clone(),
                author: item.author.clone(),
                price: item.price,
                quantity: 1,
                cover_image: item.cover_image.clone(),
            },
        );
        Ok(())
    }

    async fn remove_from_cart(&self, session: &Session, book_id: &str) -> Result<()> {
        self.enter("remove_from_cart").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        if let Some(cart) = state.carts.get_mut(&user_id) {
            cart.retain(|i| i.book_id != book_id);
        }
        Ok(())
    }

    async fn clear_cart(&self, session: &Session) -> Result<()> {
        self.enter("clear_cart").await?;
        let mut state = self.state();
        let user_id = state.authenticate(session)?;
        state.carts.remove(&user_id);
        Ok(())
    }

    async fn admin_copies(
        &self,
        session: &Session,
        book_id: Option<&str>,
    ) -> Result<Vec<CopyRecord>> {
        self.enter("admin_copies").await?;
        let state = self.state();
        state.authenticate_admin(session)?;
        Ok(state
            .copies
            .iter()
            .filter(|c| book_id.is_none_or(|id| c.book_id == id))
            .map(|c| state.decorate(c))
            .collect())
    }

    async fn admin_add_copy(&self, session: &Session, copy: &NewCopy) -> Result<()> {
        self.enter("admin_add_copy").await?;
        let mut state = self.state();
        state.authenticate_admin(session)?;
        state.book(&copy.book_id)?;
        let taken = state
            .copies
            .iter()
            .any(|c| c.book_id == copy.book_id && c.copy_number == copy.copy_number);
        if taken {
            return Err(AppError::business(409, "Copy number already exists"));
        }
        let id = state.next_id();
        state.copies.push(CopyRecord {
            id,
            book_id: copy.book_id.clone(),
            copy_number: copy.copy_number,
            status: copy.status,
            location: copy.location.clone(),
            acquired_date: copy.acquired_date.clone(),
            notes: copy.notes.clone(),
            book_title: None,
            book_author: None,
        });
        state.recount(&copy.book_id);
        Ok(())
    }

    async fn admin_update_copy(
        &self,
        session: &Session,
        copy_id: i64,
        update: &CopyUpdate,
    ) -> Result<()> {
        self.enter("admin_update_copy").await?;
        let mut state = self.state();
        state.authenticate_admin(session)?;
        let index = state.copy_index(copy_id)?;
        let book_id = {
            let copy = &mut state.copies[index];
            copy.status = update.status;
            copy.location = update.location.clone();
            copy.acquired_date = update.acquired_date.clone();
            copy.notes = update.notes.clone();
            copy.book_id.clone()
        };
        state.recount(&book_id);
        Ok(())
    }

    async fn admin_delete_copy(&self, session: &Session, copy_id: i64) -> Result<()> {
        self.enter("admin_delete_copy").await?;
        let mut state = self.state();
        state.authenticate_admin(session)?;
        let index = state.copy_index(copy_id)?;
        if state.copies[index].status == CopyStatus::Borrowed {
            return Err(AppError::business(400, "A borrowed copy cannot be deleted"));
        }
        let removed = state.copies.remove(index);
        state.recount(&removed.book_id);
        Ok(())
    }
}

/// Fixed instant for tests: 2024-06-15 12:00 UTC.
#[cfg(test)]
pub(crate) fn fixed_now() -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
