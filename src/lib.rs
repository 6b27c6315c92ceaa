//! Offline replica of a Linkding bookmark collection.
//!
//! [`sync::SyncEngine`] keeps a local SQLite copy ([`db::Repository`]) in
//! step with the server through any [`services::RemoteApi`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
