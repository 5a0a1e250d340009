//! Caller identity, injected by the upstream gateway as request headers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::domain::status::{Actor, Role};
use crate::error::OrderError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Any authenticated caller.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Actor);

/// An authenticated caller with the admin role.
#[derive(Clone, Copy, Debug)]
pub struct AdminUser(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, OrderError> {
    let user_id = header(headers, USER_ID_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or(OrderError::Unauthenticated)?;
    let role = header(headers, USER_ROLE_HEADER)
        .and_then(|v| v.parse::<Role>().ok())
        .ok_or(OrderError::Unauthenticated)?;
    Ok(Actor { user_id, role })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = OrderError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Self)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = OrderError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = actor_from_headers(&parts.headers)?;
        if !actor.is_admin() {
            return Err(OrderError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_actor_from_headers() {
        let actor = actor_from_headers(&headers(&[(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "vendor")])).unwrap();
        assert_eq!(actor, Actor { user_id: 42, role: Role::Vendor });
    }

    #[test]
    fn test_missing_or_invalid_headers_are_unauthenticated() {
        for pairs in [
            &[][..],
            &[(USER_ID_HEADER, "42")][..],
            &[(USER_ID_HEADER, "abc"), (USER_ROLE_HEADER, "admin")][..],
            &[(USER_ID_HEADER, "0"), (USER_ROLE_HEADER, "admin")][..],
            &[(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "root")][..],
        ] {
            assert!(matches!(actor_from_headers(&headers(pairs)), Err(OrderError::Unauthenticated)));
        }
    }
}
