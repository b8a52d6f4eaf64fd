//! Outbound webhook delivery engine.
//!
//! This module provides:
//! - Envelope construction ([`Payload`])
//! - HMAC-SHA256 signing and verification ([`sign`], [`verify`])
//! - Single-attempt delivery with health tracking ([`Deliverer`])
//! - The health state machine ([`HealthPolicy`])
//! - The caller-driven retry schedule ([`RetrySchedule`])
//! - The HTTP client seam ([`HttpClient`], [`ReqwestClient`])

mod client;
mod delivery;
mod error;
mod health;
mod http;
mod payload;
mod schedule;
mod signature;

#[cfg(test)]
mod client_tests;
#[cfg(test)]
mod delivery_tests;

pub use client::{DEFAULT_TIMEOUT, MAX_RESPONSE_BODY, ReqwestClient, USER_AGENT};
pub use delivery::{ATTEMPT_HEADER, Deliverer, DeliveryRequest, WEBHOOK_ID_HEADER};
pub use error::{DeliveryError, FailureCause, HttpError, PayloadError};
pub use health::{HealthPolicy, Outcome};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use payload::Payload;
pub use schedule::RetrySchedule;
pub use signature::{SIGNATURE_HEADER, SIGNATURE_PREFIX, sign, verify};
