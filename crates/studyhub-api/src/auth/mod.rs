pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtValidator;
pub use models::{AuthUser, JwtClaims, MaybeUser};
