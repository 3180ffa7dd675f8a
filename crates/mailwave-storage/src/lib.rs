//! Mailwave Storage - Database abstraction
//!
//! This crate provides the PostgreSQL storage layer for Mailwave:
//! connection pooling, models, and the repository traits the core
//! builds on.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
