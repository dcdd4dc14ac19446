//! Sick Fits storefront library.
//!
//! Accounts, items, cart, and checkout behind a JSON API. The binary in
//! `main.rs` wires this library to `PostgreSQL`, SMTP, and the payment
//! gateway; tests wire it to in-memory doubles.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
