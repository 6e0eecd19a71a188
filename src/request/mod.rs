//! State requests: operation kinds, payloads, responses and envelopes.
//!
//! The operation-kind set is closed: every kind is matched exhaustively by
//! stores and validated against the state kind and payload shape before a
//! request is accepted.

mod envelope;
mod types;

pub use envelope::RequestEnvelope;
pub use types::{PayloadShape, RequestPayload, RequestType, StateResponse};
