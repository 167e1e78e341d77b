//! Caller identity asserted by the upstream identity provider.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};

use crate::{error::AppError, state::Identity};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

fn identity_from_parts(parts: &Parts) -> Option<Identity> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(Identity::new)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_parts(parts)
            .ok_or_else(|| AppError::Unauthorized("missing or empty X-User-Id header".into()))
    }
}

impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(identity_from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/lobbies");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_trimmed_user_id() {
        assert_eq!(
            identity_from_parts(&parts(Some(" U1 "))),
            Some(Identity::new("U1"))
        );
    }

    #[test]
    fn blank_or_missing_header_is_anonymous() {
        assert_eq!(identity_from_parts(&parts(Some("  "))), None);
        assert_eq!(identity_from_parts(&parts(None)), None);
    }
}
