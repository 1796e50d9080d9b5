//! Async client for the tenant configuration API.
//!
//! This crate owns the transport layer of the sasesync workspace:
//!
//! - **[`TenantClient`]** — JSON REST client for one tenant's
//!   configuration surface under `/config/v1/`. API-key auth, offset/limit
//!   pagination, structured error decoding.
//! - **[`RateGate`]** — pause/resume signal the client closes while a
//!   429 back-off is in effect. The push engine awaits it between calls.
//! - **[`TransportConfig`]** — TLS mode and timeout shared by all
//!   constructed HTTP clients.
//!
//! The crate knows nothing about dependency graphs or push plans;
//! `sasesync-core` builds those on top.

pub mod client;
pub mod error;
pub mod gate;
pub mod transport;

pub use client::{Page, TenantClient};
pub use error::Error;
pub use gate::RateGate;
pub use transport::{TlsMode, TransportConfig};
