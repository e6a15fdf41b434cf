use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hub::error::{Error as HubError, ErrorKind as HubErrorKind};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced to HTTP callers. Delivery outcomes never end up here; only
/// authentication, authorization and the hub being unavailable do.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// Missing, malformed, expired or badly signed bearer token.
    Unauthenticated,
    /// Authenticated, but the role does not allow the operation.
    Forbidden,
    /// The hub's dispatch loop is not accepting commands.
    Unavailable,
    /// The server is missing required configuration.
    Config,
    Other,
}

impl Error {
    pub(crate) fn new(error_kind: WebErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            WebErrorKind::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
            }
            WebErrorKind::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN").into_response(),
            WebErrorKind::Unavailable => {
                error!("Hub unavailable: {:?}", self.source);
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
            }
            WebErrorKind::Config | WebErrorKind::Other => {
                error!("Internal error {:?}: {:?}", self.error_kind, self.source);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl From<HubError> for Error {
    fn from(err: HubError) -> Self {
        let error_kind = match err.error_kind {
            HubErrorKind::HubClosed => WebErrorKind::Unavailable,
            HubErrorKind::Transport | HubErrorKind::Encode => WebErrorKind::Other,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        debug!("Rejecting bearer token: {err}");

        Error {
            source: Some(Box::new(err)),
            error_kind: WebErrorKind::Unauthenticated,
        }
    }
}
