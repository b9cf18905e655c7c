//! Forwarding gateway

mod forward;
mod headers;
mod router;
mod server;

pub use forward::{Forwarder, TargetError};
pub use headers::strip_hop_by_hop;
pub use router::{AppState, create_router};
pub use server::Gateway;
