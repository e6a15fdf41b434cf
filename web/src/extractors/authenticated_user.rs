use crate::error::{Error, WebErrorKind};
use crate::AppState;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use hub::{Identity, UserId};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};

/// The identity behind a verified bearer token.
pub(crate) struct AuthenticatedUser(pub Identity);

/// Claims carried by the HS256 tokens the login service issues.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) role: String,
    pub(crate) exp: u64,
}

#[derive(Deserialize)]
struct TokenParams {
    token: Option<String>,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    // Browsers cannot set headers on a WebSocket upgrade, so the token may also
    // arrive as the `token` query parameter.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            debug!("Request to {} without a bearer token", parts.uri.path());
            Error::new(WebErrorKind::Unauthenticated)
        })?;

        let secret = state.config.jwt_secret().ok_or_else(|| {
            error!("JWT_SECRET is not configured, rejecting authenticated request");
            Error::new(WebErrorKind::Config)
        })?;

        let identity = verify(&token, secret)?;
        trace!("Authenticated user {}", identity.user_id);

        Ok(AuthenticatedUser(identity))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        return value
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
    }

    Query::<TokenParams>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(params)| params.token)
        .filter(|token| !token.is_empty())
}

pub(crate) fn verify(token: &str, secret: &str) -> Result<Identity, Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(Identity {
        user_id: data.claims.user_id,
        username: data.claims.username,
        role: data.claims.role,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};

    pub(crate) const SECRET: &str = "test-secret";

    pub(crate) fn token_for(user_id: UserId, role: &str) -> String {
        let claims = Claims {
            user_id,
            username: format!("user-{user_id}"),
            role: role.to_string(),
            exp: get_current_timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_bearer_token_from_authorization_header() {
        let parts = parts(
            Request::builder()
                .uri("/ws")
                .header(AUTHORIZATION, "Bearer abc.def.ghi")
                .body(())
                .unwrap(),
        );

        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_from_query_parameter() {
        let parts = parts(Request::builder().uri("/ws?token=abc").body(()).unwrap());

        assert_eq!(bearer_token(&parts).as_deref(), Some("abc"));
    }

    #[test]
    fn test_non_bearer_authorization_is_rejected() {
        let parts = parts(
            Request::builder()
                .uri("/ws?token=abc")
                .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(())
                .unwrap(),
        );

        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_verify_extracts_identity() {
        let identity = verify(&token_for(12, "supervisor"), SECRET).unwrap();

        assert_eq!(identity.user_id, 12);
        assert_eq!(identity.username, "user-12");
        assert_eq!(identity.role, "supervisor");
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let err = verify(&token_for(12, "supervisor"), "other-secret").unwrap_err();

        assert_eq!(err.error_kind, WebErrorKind::Unauthenticated);
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let claims = Claims {
            user_id: 1,
            username: "late".to_string(),
            role: "operator".to_string(),
            exp: get_current_timestamp() - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = verify(&token, SECRET).unwrap_err();
        assert_eq!(err.error_kind, WebErrorKind::Unauthenticated);
    }
}
