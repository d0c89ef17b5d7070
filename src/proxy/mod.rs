//! HTTP proxy pipeline: inbound API surface, cache lookup, coalesced
//! upstream fetches, and streaming passthrough.

pub mod pipeline;
pub mod server;
pub mod sweep;
pub mod upstream;

pub use server::{build_router, start_server, AppState};
pub use upstream::{HttpUpstream, UpstreamFetcher, UpstreamResponse, UpstreamStream};
