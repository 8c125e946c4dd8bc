//! Remote procedure call surface of the bridge: framing, allow-listed dispatch, server loop
//! and a small client.

pub mod client;
pub mod io;
mod methods;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tracer;

pub use client::{request_shutdown, RpcClient};
pub use registry::MethodRegistry;
pub use server::RpcServer;
