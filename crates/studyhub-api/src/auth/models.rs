use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use studyhub_core::models::Identity;
use studyhub_core::AppError;
use uuid::Uuid;

/// JWT claims issued by the login service
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(alias = "id")]
    pub sub: Uuid, // user_id
    pub role: String, // "admin" or "student"
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// Caller identity that must be present.
///
/// Reads what the auth middleware stored in the request extensions, so it
/// works alongside `Multipart` in the same handler.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Authentication required".to_string(),
                ))
            })
    }
}

/// Caller identity when one was presented.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Identity>().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use studyhub_core::models::UserRole;

    #[test]
    fn claims_accept_id_as_subject() {
        let user = Uuid::new_v4();
        let claims: JwtClaims = serde_json::from_value(serde_json::json!({
            "id": user,
            "role": "admin",
            "exp": 4_102_444_800i64,
        }))
        .unwrap();
        assert_eq!(claims.sub, user);
        assert!(claims.nbf.is_none());
    }

    #[tokio::test]
    async fn extractors_read_request_extensions() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: UserRole::Student,
        };
        let (mut parts, _) = Request::builder()
            .extension(identity)
            .body(())
            .unwrap()
            .into_parts();

        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, identity);
        let MaybeUser(found) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, Some(identity));

        let (mut anonymous, _) = Request::builder().body(()).unwrap().into_parts();
        assert!(AuthUser::from_request_parts(&mut anonymous, &()).await.is_err());
        let MaybeUser(found) = MaybeUser::from_request_parts(&mut anonymous, &()).await.unwrap();
        assert!(found.is_none());
    }
}
