//! Data models for the application

mod identity;
mod material;

pub use identity::*;
pub use material::*;
