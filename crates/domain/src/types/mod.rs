//! Values exchanged between the client and its transport.

pub mod kind;
pub mod request;
pub mod response;

pub use kind::OperationKind;
pub use request::{ApiRequest, HttpMethod, RequestBody};
pub use response::{ApiResponse, ResponseStatus};
