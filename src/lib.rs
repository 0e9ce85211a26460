//! Roomledger - student-housing booking core
//!
//! Keeps room inventory, booking lifecycle, gateway payments and resident
//! wallets consistent under concurrent requests, duplicate webhooks and
//! gateway timeouts. Exposed as a JSON API over axum.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{Result, ServiceError};
