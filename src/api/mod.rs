//! Clients for external backends.

pub mod hosted;

pub use hosted::HostedBackend;
