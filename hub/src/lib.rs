//! Real-time WebSocket fan-out for authenticated users.
//!
//! This crate tracks live WebSocket connections and pushes event envelopes to
//! all of them, to every connection of one user, or to every connection whose
//! owner holds a given role.
//!
//! # Architecture
//!
//! - **Many connections per user**: a user may be connected from several tabs
//!   or devices at once; each connection is a separate client under the same
//!   user id.
//! - **Single writer**: one dispatch loop owns every registry mutation and
//!   handles register, unregister and broadcast commands in arrival order.
//! - **Bounded queues, never blocking**: each client has a fixed-capacity
//!   outbound queue. The loop only ever tries to enqueue; a client whose queue
//!   is full is evicted instead of slowing everybody else down.
//! - **Ephemeral messages**: delivery is best-effort and at-most-once. A client
//!   that is offline or evicted misses what was sent meanwhile.
//!
//! # Message Flow
//!
//! 1. The `/ws` handler authenticates the bearer token and builds a [`Client`]
//! 2. The client is submitted with [`Hub::register`]; the hub answers with a
//!    `connected` envelope
//! 3. The handler starts the outbound and inbound pumps ([`pump::spawn`])
//! 4. Producers publish domain events; [`HubEventHandler`] turns them into
//!    messages and submits them to the hub
//! 5. The loop stamps each message and enqueues it for every matching client
//! 6. When a socket fails, the inbound pump submits [`Hub::unregister`]; the hub
//!    closes the queue and the outbound pump sends the close frame
//!
//! # Example: Sending an event
//!
//! ```rust,ignore
//! use hub::message::Envelope;
//!
//! app_state
//!     .hub
//!     .broadcast_to_role("supervisor", Envelope::new("alert").with_field("line", 3))
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - `client`: Client identity, lifecycle state and outbound queue
//! - `dispatch`: The `Hub` handle and its dispatch loop
//! - `registry`: Per-user client registry and presence queries
//! - `message`: Envelope and scope definitions
//! - `pump`: Per-connection outbound and inbound tasks
//! - `domain_event_handler`: Domain event to hub message translation

pub mod client;
pub mod dispatch;
pub mod domain_event_handler;
pub mod error;
pub mod message;
pub mod pump;
pub mod registry;

pub use client::{Client, ClientKey, ClientQueue, ClientState, Identity, UserId};
pub use dispatch::{Dispatcher, Hub};
pub use domain_event_handler::HubEventHandler;
pub use registry::Presence;
