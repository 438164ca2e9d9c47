//! HTTP transport for the resilient client

pub mod transport;

pub use transport::{ReqwestTransport, ReqwestTransportBuilder};
