//! Transport outcome of one request.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a request as seen by the client.
///
/// `RequestNotMade` means no response was obtained (connection refused,
/// DNS failure, timeout). It is what distinguishes a connectivity loss from
/// a definite answer by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    RequestNotMade,
    Http(u16),
}

impl ResponseStatus {
    pub const OK: Self = Self::Http(200);
    pub const CREATED: Self = Self::Http(201);
    pub const NO_CONTENT: Self = Self::Http(204);

    /// `true` when the server answered at all.
    pub fn is_response(self) -> bool {
        matches!(self, Self::Http(_))
    }

    pub fn code(self) -> Option<u16> {
        match self {
            Self::RequestNotMade => None,
            Self::Http(code) => Some(code),
        }
    }

    /// Cache encoding; `0` stands for `RequestNotMade`.
    pub fn to_wire(self) -> u16 {
        self.code().unwrap_or(0)
    }

    pub fn from_wire(value: u16) -> Self {
        if value == 0 {
            Self::RequestNotMade
        } else {
            Self::Http(value)
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestNotMade => write!(f, "request not made"),
            Self::Http(code) => write!(f, "HTTP {}", code),
        }
    }
}

/// Status plus raw body returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: ResponseStatus,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status: ResponseStatus::Http(code), body: body.into() }
    }

    /// Response for a request that never reached the server.
    pub fn not_made() -> Self {
        Self { status: ResponseStatus::RequestNotMade, body: Vec::new() }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Propagates the `serde_json` decoding error.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
