//! StudyHub record store
//!
//! The [`MaterialRepository`] trait and its Postgres and in-memory implementations.

pub mod db;

pub use db::{InMemoryMaterialRepository, MaterialRepository, PgMaterialRepository};
