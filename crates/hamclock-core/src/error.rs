//! Error taxonomy shared by the scheduler and its collaborators.
//!
//! None of these abort a scheduler pass; the owning state machine handles
//! them and logs.

/// Per-peer connection failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkError {
    /// Host, port or identity is empty; the attempt is skipped silently.
    ConfigMissing,
    /// The transport refused or failed the connect.
    ConnectFailure,
    /// The connect did not complete within its bound.
    ConnectTimeout,
    /// The peer closed or a write failed while connected.
    UnexpectedDisconnect,
}

impl LinkError {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::ConnectFailure => "connect_failure",
            Self::ConnectTimeout => "connect_timeout",
            Self::UnexpectedDisconnect => "unexpected_disconnect",
        }
    }
}

/// Failures reported by a feed refresh trigger.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedError {
    ConfigMissing,
    NetworkUnavailable,
}

/// Persisted configuration record failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordError {
    BadMagic,
    UnsupportedVersion(u8),
    Truncated,
    Checksum,
    FieldTooLong,
    InvalidUtf8,
}

/// HTTP surface failures, each mapped to a 4xx response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApiError {
    MalformedRequest,
    InvalidJson,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    InvalidScreen,
    ValueTooLong,
}

impl ApiError {
    pub const fn status(self) -> u16 {
        match self {
            Self::MalformedRequest
            | Self::InvalidJson
            | Self::InvalidScreen
            | Self::ValueTooLong => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::MalformedRequest => "Malformed request",
            Self::InvalidJson => "Invalid JSON",
            Self::NotFound => "Not found",
            Self::MethodNotAllowed => "Method not allowed",
            Self::PayloadTooLarge => "Payload too large",
            Self::InvalidScreen => "Invalid screen",
            Self::ValueTooLong => "Value too long",
        }
    }
}
