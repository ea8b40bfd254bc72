//! Core types for the ticketing client
//!
//! This module defines the data structures shared by the transport, session and
//! realtime layers.
//!
//! # Architecture
//!
//! - [`constants`] - Header names, storage keys, endpoints and event names
//! - [`session`] - Persisted user profile and session snapshot
//! - [`envelope`] - Session-derived request fields and the typed request envelope
//! - [`realtime`] - Connection states and events delivered to realtime handlers
//!
//! # Examples
//!
//! ## Building a request envelope
//!
//! ```
//! use ticketing_core::types::{ExtraParamsProfile, RequestEnvelope, UserProfile};
//! use serde_json::json;
//!
//! # fn example() -> ticketing_core::Result<()> {
//! let user = UserProfile::new("abc").with_region("NG");
//! let extras = ExtraParamsProfile::general().extras_for(Some(&user));
//!
//! let body = json!({"eventId": 42});
//! let envelope = RequestEnvelope::new(extras, body.as_object().cloned().unwrap_or_default());
//! let payload = envelope.into_payload()?;
//! assert_eq!(payload["username"], "abc");
//! assert_eq!(payload["eventId"], 42);
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod envelope;
pub mod realtime;
pub mod session;

// Re-export commonly used types
pub use constants::{client_identity, endpoints, events, headers, storage_keys};
pub use envelope::{ExtraParamsProfile, RequestEnvelope, SessionExtras};
pub use realtime::{ChannelEvent, ConnectionState, PaymentStatusRecord};
pub use session::{SessionState, UserProfile};
