//! Remote method invocation over WebSocket.
//!
//! ARCHITECTURE
//! ============
//! - `object`: per-instance method tables built at registration time.
//! - `registry`: shared identifier → object table.
//! - `dispatch`: resolves one call envelope against the registry.
//! - `routes`: loopback listener and one WebSocket session per connection.
//! - `shared`: sample objects exposed by the `netcall-server` binary.
//! - `config`: environment configuration for the binary.

pub mod config;
pub mod dispatch;
pub mod object;
pub mod registry;
pub mod routes;
pub mod shared;
