//! # Desktop Bridge
//!
//! Desktop implementations of the host capabilities declared in
//! `bridge-traits`. Streaming service adapters live with their own API
//! clients; this crate only provides what the core needs from the host.
//!
//! - [`ReqwestHttpClient`] - cover art downloads over `reqwest` with retry

pub mod http;

pub use http::ReqwestHttpClient;
