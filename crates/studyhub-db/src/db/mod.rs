//! Database repositories for data access layer
//!
//! `material` holds the repository contract, `postgres` the sqlx implementation
//! and `memory` the process-local one used for development and tests.

pub mod material;
pub mod memory;
pub mod postgres;

pub use material::MaterialRepository;
pub use memory::InMemoryMaterialRepository;
pub use postgres::PgMaterialRepository;
