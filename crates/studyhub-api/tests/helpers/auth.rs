use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;

/// Shared with the test config; at least 32 characters like production requires.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// A caller with a signed token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: Uuid,
    pub role: &'static str,
    pub token: String,
}

pub fn student() -> TestUser {
    test_user("student")
}

pub fn admin() -> TestUser {
    test_user("admin")
}

pub fn test_user(role: &'static str) -> TestUser {
    let user_id = Uuid::new_v4();
    let exp = chrono::Utc::now().timestamp() + 3600;
    TestUser {
        user_id,
        role,
        token: sign(json!({ "sub": user_id, "role": role, "exp": exp })),
    }
}

/// Token whose `exp` is already in the past.
pub fn expired_token() -> String {
    let exp = chrono::Utc::now().timestamp() - 60;
    sign(json!({ "sub": Uuid::new_v4(), "role": "student", "exp": exp }))
}

fn sign(claims: serde_json::Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}
