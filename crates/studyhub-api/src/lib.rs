//! StudyHub API Library
//!
//! HTTP handlers, authentication, the upload intake and the material
//! service, plus the setup code that wires them into a router.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;
mod telemetry;
pub mod utils;
mod validation;

pub mod auth;
pub mod error;
pub mod state;

pub use error::ErrorResponse;
