//! This module holds typed parameters for endpoint inputs.
//!
//! By using typed parameters the inputs are validated (by type) before they
//! are turned into domain events.

pub(crate) mod notification;
