//! HTTP surface of the buslive relay.
//!
//! The cache/broadcast core lives in `buslive-core`; this crate wires it to
//! axum: configuration, router assembly and the serve loop.

pub mod api;
pub mod server;
