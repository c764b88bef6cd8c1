// src/lib.rs

//! Lending client library
//!
//! Keeps a signed-in user's view of the library gateway (cart, borrows,
//! reservations, notifications and the admin dashboard) consistent after
//! every action, and polls the unread notification count while a session
//! is live.

pub mod actions;
pub mod analytics;
pub mod backend;
pub mod bus;
pub mod classify;
pub mod engine;
pub mod error;
pub mod gate;
pub mod models;
pub mod poll;
pub mod session;
pub mod store;
pub mod utils;
pub mod views;
