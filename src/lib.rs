//! Hookcast: outbound webhook delivery
//!
//! A library for delivering HMAC-signed event notifications to
//! subscriber endpoints, tracking each endpoint's health, and
//! scheduling redelivery of failed attempts.

pub mod config;
pub mod dispatch;
pub mod model;
pub mod store;
pub mod time;
pub mod webhook;
