//! MailChats Storage - users, campaigns and email statuses
//!
//! This crate provides the `Storage` trait with an in-memory backend
//! and a PostgreSQL backend built on sqlx repositories.

pub mod db;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use db::DatabasePool;
pub use memory::MemStorage;
pub use models::*;
pub use postgres::PgStorage;
pub use store::{create_storage, Storage};
