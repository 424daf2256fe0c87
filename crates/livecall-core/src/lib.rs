//! livecall-core: shared library for a paid, time-limited video call
//! marketplace.
//!
//! # Architecture (Clean Architecture)
//!
//! - **domain**: accounts, billing values, call lifecycle, wire messages,
//!   error taxonomy (no I/O).
//! - **application**: use cases + port traits (approval workflow, presence,
//!   ledger operations, session manager, call session engine).
//! - **adapters**: in-memory store and ledger, JSON persistence, secret
//!   hashing (Argon2 / SHA-256), QUIC (Quinn) server and client.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
