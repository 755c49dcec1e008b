//! Reverse proxy functionality
//!
//! This module gates requests through the access policy, forwards allowed
//! ones to the single upstream target and rewrites redirects on the way back.

pub mod gateway;
pub mod redirect;
pub mod upstream;

pub use gateway::Gateway;
pub use redirect::{HostPort, RedirectRewriter};
pub use upstream::{ForwardError, ProxyHandler};
