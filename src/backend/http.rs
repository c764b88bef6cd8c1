//! HTTP gateway backend.
//!
//! JSON over HTTP with bearer authentication. Non-success statuses are sorted
//! into the error taxonomy by [`crate::utils::http::classify_status`].

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::backend::{AddToCart, Backend, BorrowReceipt, BorrowRequest, ReservationReceipt};
use crate::error::Result;
use crate::models::{
    Book, BookFilters, CartItem, CopyRecord, CopyUpdate, GatewayConfig, LendingRecord, NewCopy,
    Notification, ReservationRecord, UnreadCount,
};
use crate::session::{Credentials, LoginResponse, Session};
use crate::utils::http::{classify_status, classify_transport, create_async_client};
use crate::utils::url::{endpoint, parse_base};

/// Gateway backend speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

/// One request, before it is sent.
struct Call<'a> {
    method: Method,
    segments: &'a [&'a str],
    query: &'a [(&'a str, &'a str)],
    session: Option<&'a Session>,
    body: Option<Vec<u8>>,
}

impl<'a> Call<'a> {
    fn new(method: Method, segments: &'a [&'a str]) -> Self {
        Self {
            method,
            segments,
            query: &[],
            session: None,
            body: None,
        }
    }

    fn get(segments: &'a [&'a str]) -> Self {
        Self::new(Method::GET, segments)
    }

    fn post(segments: &'a [&'a str]) -> Self {
        Self::new(Method::POST, segments)
    }

    fn put(segments: &'a [&'a str]) -> Self {
        Self::new(Method::PUT, segments)
    }

    fn delete(segments: &'a [&'a str]) -> Self {
        Self::new(Method::DELETE, segments)
    }

    fn query(mut self, query: &'a [(&'a str, &'a str)]) -> Self {
        self.query = query;
        self
    }

    fn auth(mut self, session: &'a Session) -> Self {
        self.session = Some(session);
        self
    }

    fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }
}

impl HttpBackend {
    /// Create a backend for the configured gateway.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            base: parse_base(&config.base_url)?,
        })
    }

    /// Create a backend with an existing client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base: parse_base(base_url)?,
        })
    }

    /// Send a call and return the body of a successful response.
    async fn send(&self, call: Call<'_>) -> Result<String> {
        let url = endpoint(&self.base, call.segments, call.query)?;
        log::debug!("{} {}", call.method, url);

        let mut request = self
            .client
            .request(call.method.clone(), url.clone())
            .header(CONTENT_TYPE, "application/json");
        if let Some(session) = call.session {
            request = request.bearer_auth(session.token());
        }
        if let Some(body) = call.body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            log::debug!("{} {} -> {}", call.method, url, status);
            return Err(classify_status(status, &text));
        }
        Ok(text)
    }

    async fn fetch<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T> {
        let text = self.send(call).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Lists may come back as `null` when a service has nothing to return.
    async fn fetch_list<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<Vec<T>> {
        let text = self.send(call).await?;
        let list: Option<Vec<T>> = serde_json::from_str(&text)?;
        Ok(list.unwrap_or_default())
    }

    async fn execute(&self, call: Call<'_>) -> Result<()> {
        self.send(call).await.map(|_| ())
    }
}

#[derive(Serialize)]
struct AdminBorrowBody<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    request: &'a BorrowRequest,
}

#[derive(Serialize)]
struct ReservationBody<'a> {
    user_id: &'a str,
    book_id: &'a str,
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.fetch(Call::post(&["users", "login"]).json(credentials)?)
            .await
    }

    async fn logout(&self, session: &Session) -> Result<()> {
        self.execute(Call::post(&["users", "logout"]).auth(session))
            .await
    }

    async fn list_books(&self, session: &Session, filters: &BookFilters) -> Result<Vec<Book>> {
        let query = filters.query_pairs();
        self.fetch_list(Call::get(&["books"]).query(&query).auth(session))
            .await
    }

    async fn get_book(&self, session: &Session, book_id: &str) -> Result<Book> {
        self.fetch(Call::get(&["books", book_id]).auth(session)).await
    }

    async fn book_copies(&self, session: &Session, book_id: &str) -> Result<Vec<CopyRecord>> {
        self.fetch_list(Call::get(&["books", book_id, "copies"]).auth(session))
            .await
    }

    async fn borrow_book(
        &self,
        session: &Session,
        request: &BorrowRequest,
    ) -> Result<BorrowReceipt> {
        self.fetch(Call::post(&["borrows", "borrow"]).auth(session).json(request)?)
            .await
    }

    async fn return_book(&self, session: &Session, book_id: &str) -> Result<()> {
        self.execute(Call::post(&["borrows", "return", book_id]).auth(session))
            .await
    }

    async fn active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.fetch_list(Call::get(&["borrows"]).auth(session)).await
    }

    async fn borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.fetch_list(Call::get(&["borrows", "history"]).auth(session))
            .await
    }

    async fn admin_active_borrows(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.fetch_list(Call::get(&["borrows", "admin", "all"]).auth(session))
            .await
    }

    async fn admin_borrow_history(&self, session: &Session) -> Result<Vec<LendingRecord>> {
        self.fetch_list(Call::get(&["borrows", "admin", "history"]).auth(session))
            .await
    }

    async fn admin_borrow(
        &self,
        session: &Session,
        user_id: &str,
        request: &BorrowRequest,
    ) -> Result<BorrowReceipt> {
        let body = AdminBorrowBody { user_id, request };
        self.fetch(
            Call::post(&["borrows", "admin", "borrow"])
                .auth(session)
                .json(&body)?,
        )
        .await
    }

    async fn admin_return(&self, session: &Session, borrow_id: i64) -> Result<()> {
        let id = borrow_id.to_string();
        self.execute(Call::post(&["borrows", "admin", "return", &id]).auth(session))
            .await
    }

    async fn create_reservation(
        &self,
        session: &Session,
        book_id: &str,
    ) -> Result<ReservationReceipt> {
        let body = ReservationBody {
            user_id: session.user_id(),
            book_id,
        };
        self.fetch(Call::post(&["reservations"]).auth(session).json(&body)?)
            .await
    }

    async fn reservations(&self, session: &Session) -> Result<Vec<ReservationRecord>> {
        let query = [("user_id", session.user_id())];
        self.fetch_list(Call::get(&["reservations"]).query(&query).auth(session))
            .await
    }

    async fn cancel_reservation(&self, session: &Session, reservation_id: i64) -> Result<()> {
        let id = reservation_id.to_string();
        let query = [("user_id", session.user_id())];
        self.execute(
            Call::delete(&["reservations", &id])
                .query(&query)
                .auth(session),
        )
        .await
    }

    async fn notifications(&self, session: &Session) -> Result<Vec<Notification>> {
        let query = [("user_id", session.user_id())];
        self.fetch_list(Call::get(&["notifications"]).query(&query).auth(session))
            .await
    }

    async fn unread_count(&self, session: &Session) -> Result<u32> {
        let query = [("user_id", session.user_id())];
        let unread: UnreadCount = self
            .fetch(
                Call::get(&["notifications", "unread-count"])
                    .query(&query)
                    .auth(session),
            )
            .await?;
        Ok(unread.count)
    }

    async fn mark_read(&self, session: &Session, notification_id: i64) -> Result<()> {
        let id = notification_id.to_string();
        self.execute(Call::put(&["notifications", &id, "read"]).auth(session))
            .await
    }

    async fn mark_all_read(&self, session: &Session) -> Result<()> {
        let query = [("user_id", session.user_id())];
        self.execute(
            Call::put(&["notifications", "mark-all-read"])
                .query(&query)
                .auth(session),
        )
        .await
    }

    async fn delete_notification(&self, session: &Session, notification_id: i64) -> Result<()> {
        let id = notification_id.to_string();
        self.execute(Call::delete(&["notifications", &id]).auth(session))
            .await
    }

    async fn cart(&self, session: &Session) -> Result<Vec<CartItem>> {
        self.fetch_list(Call::get(&["cart"]).auth(session)).await
    }

    async fn add_to_cart(&self, session: &Session, item: &AddToCart) -> Result<()> {
        self.execute(Call::post(&["cart", "add"]).auth(session).json(item)?)
            .await
    }

    async fn remove_from_cart(&self, session: &Session, book_id: &str) -> Result<()> {
        self.execute(Call::delete(&["cart", "remove", book_id]).auth(session))
            .await
    }

    async fn clear_cart(&self, session: &Session) -> Result<()> {
        self.execute(Call::post(&["cart", "clear"]).auth(session))
            .await
    }

    async fn admin_copies(
        &self,
        session: &Session,
        book_id: Option<&str>,
    ) -> Result<Vec<CopyRecord>> {
        let filter;
        let query: &[(&str, &str)] = match book_id {
            Some(id) => {
                filter = [("book_id", id)];
                &filter
            }
            None => &[],
        };
        self.fetch_list(Call::get(&["admin", "copies"]).query(query).auth(session))
            .await
    }

    async fn admin_add_copy(&self, session: &Session, copy: &NewCopy) -> Result<()> {
        self.execute(Call::post(&["admin", "copies"]).auth(session).json(copy)?)
            .await
    }

    async fn admin_update_copy(
        &self,
        session: &Session,
        copy_id: i64,
        update: &CopyUpdate,
    ) -> Result<()> {
        let id = copy_id.to_string();
        self.execute(Call::put(&["admin", "copies", &id]).auth(session).json(update)?)
            .await
    }

    async fn admin_delete_copy(&self, session: &Session, copy_id: i64) -> Result<()> {
        let id = copy_id.to_string();
        self.execute(Call::delete(&["admin", "copies", &id]).auth(session))
            .await
    }
}
