//! RPC module: pending-request correlation and the caller-side glue.

mod client;
mod pending;

pub use client::{Inbound, RpcClient};
pub use pending::{PendingRequests, ResponseHandle, DEFAULT_REQUEST_TIMEOUT};
