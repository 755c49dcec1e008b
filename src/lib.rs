//! Filter Proxy - policy-gated reverse proxy
//!
//! Core library: rule compilation and evaluation, redirect rewriting and the
//! HTTP forwarding they plug into.

pub mod config;
pub mod http;
pub mod policy;
pub mod proxy;
pub mod server;
