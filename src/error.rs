use thiserror::Error;

/// Classified geolocation failures, mirroring the platform error codes.
/// All of them are recoverable; the caller decides whether to retry or
/// prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationErrorKind {
    /// No geolocation capability on this platform.
    NotSupported,
    /// The user denied the location permission.
    PermissionDenied,
    /// The platform could not produce a position fix.
    PositionUnavailable,
    /// The position request exceeded the platform timeout.
    Timeout,
    /// Registering the continuous watch failed.
    StartFailed,
}

impl std::fmt::Display for GeolocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GeolocationErrorKind::NotSupported => "geolocation not supported",
            GeolocationErrorKind::PermissionDenied => "location access denied",
            GeolocationErrorKind::PositionUnavailable => "location unavailable",
            GeolocationErrorKind::Timeout => "location request timeout",
            GeolocationErrorKind::StartFailed => "failed to start location tracking",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Geolocation error: {0}")]
    Geolocation(GeolocationErrorKind),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed payload: {0}")]
    Parse(String),
}

impl ClientError {
    /// True when the failure came back as HTTP 401: the session is gone
    /// regardless of which call noticed it.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }
}

impl From<GeolocationErrorKind> for ClientError {
    fn from(kind: GeolocationErrorKind) -> Self {
        ClientError::Geolocation(kind)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
