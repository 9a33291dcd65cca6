use crate::auth::jwt::JwtValidator;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use studyhub_core::AppError;

const TOKEN_COOKIE: &str = "token";

/// Where the caller's token came from, if anywhere.
#[derive(Debug, PartialEq, Eq)]
enum PresentedToken<'a> {
    None,
    Bearer(&'a str),
    Cookie(&'a str),
    Malformed,
}

/// Cookies ride along on cross-site requests, so they only authenticate reads.
fn cookie_allowed(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn presented_token<'a>(method: &Method, headers: &'a HeaderMap) -> PresentedToken<'a> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        return match value.to_str() {
            Ok(auth_header) => match auth_header.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => PresentedToken::Bearer(token.trim()),
                _ => PresentedToken::Malformed,
            },
            Err(_) => PresentedToken::Malformed,
        };
    }

    if !cookie_allowed(method) {
        return PresentedToken::None;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| PresentedToken::Cookie(value))
        .unwrap_or(PresentedToken::None)
}

/// Resolves the caller identity without requiring one.
///
/// A valid token stores an `Identity` in the request extensions. No token lets
/// the request through anonymously. A token that is present but invalid is
/// answered with 401 straight away. The `token` cookie is ignored on
/// POST, PATCH and DELETE; those need the `Authorization` header.
pub async fn auth_middleware(
    State(jwt): State<Arc<JwtValidator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match presented_token(request.method(), request.headers()) {
        PresentedToken::None => return next.run(request).await,
        PresentedToken::Malformed => {
            tracing::debug!("Rejected malformed authorization header");
            return HttpAppError(AppError::Unauthorized(
                "Invalid authorization header format".to_string(),
            ))
            .into_response();
        }
        PresentedToken::Bearer(token) | PresentedToken::Cookie(token) => token.to_string(),
    };

    match jwt.identify(&token) {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user_id, role = %identity.role, "Caller authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer abc.def.ghi"),
            (header::COOKIE, "token=from-cookie"),
        ]);
        assert_eq!(presented_token(&Method::GET, &map), PresentedToken::Bearer("abc.def.ghi"));
    }

    #[test]
    fn token_cookie_is_a_fallback() {
        let map = headers(&[(header::COOKIE, "theme=dark; token=xyz; lang=en")]);
        assert_eq!(presented_token(&Method::GET, &map), PresentedToken::Cookie("xyz"));

        let map = headers(&[(header::COOKIE, "theme=dark; token=")]);
        assert_eq!(presented_token(&Method::GET, &map), PresentedToken::None);
    }

    #[test]
    fn non_bearer_header_is_malformed() {
        let map = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(presented_token(&Method::GET, &map), PresentedToken::Malformed);

        let map = headers(&[(header::AUTHORIZATION, "Bearer ")]);
        assert_eq!(presented_token(&Method::GET, &map), PresentedToken::Malformed);
    }

    #[test]
    fn cookie_ignored_on_mutating_methods() {
        let map = headers(&[(header::COOKIE, "token=xyz")]);
        for method in [Method::POST, Method::PATCH, Method::DELETE, Method::PUT] {
            assert_eq!(presented_token(&method, &map), PresentedToken::None);
        }
        assert_eq!(presented_token(&Method::HEAD, &map), PresentedToken::Cookie("xyz"));

        let map = headers(&[
            (header::AUTHORIZATION, "Bearer abc.def.ghi"),
            (header::COOKIE, "token=xyz"),
        ]);
        assert_eq!(
            presented_token(&Method::POST, &map),
            PresentedToken::Bearer("abc.def.ghi")
        );
    }

    #[test]
    fn nothing_presented() {
        assert_eq!(presented_token(&Method::GET, &HeaderMap::new()), PresentedToken::None);
    }
}
