//! Channel session: the sans-IO multiplexer, its router, and the async
//! manager and client handle that drive it over a transport.

pub mod client;
pub mod manager;
pub mod multiplexer;
pub mod router;

pub use client::MuxClient;
pub use manager::{Command, ConnectionManager};
pub use multiplexer::Multiplexer;
pub use router::{DropReason, MessageRouter, Route};
