//! Error types for the `hub` crate.
//!
//! Delivery outcomes are never reported as errors: a client that cannot keep up
//! is evicted, not surfaced to producers. What remains is the hub having stopped
//! and the failures a pump sees on its own connection.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The dispatch loop is gone and no longer accepts commands.
    HubClosed,
    /// Reading from or writing to a connection failed.
    Transport,
    /// An envelope could not be serialized.
    Encode,
}

impl Error {
    pub fn hub_closed() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::HubClosed,
        }
    }

    pub(crate) fn transport<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Hub Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Hub Error: {:?}", self.error_kind),
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Encode,
        }
    }
}
