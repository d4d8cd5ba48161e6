//! Error types for ls3 with S3-compatible error codes.

use thiserror::Error as ThisError;

/// A specialized `Result` type for ls3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// S3-compatible error codes.
///
/// The set is closed: every error the server can emit on the wire is
/// one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3ErrorCode {
    /// Access denied by policy or filesystem permissions.
    AccessDenied,
    /// The server credentials store could not be read.
    AccountProblem,
    /// The `Authorization` header could not be parsed.
    AuthorizationHeaderMalformed,
    /// The request body hash does not match `x-amz-content-sha256`.
    BadDigest,
    /// A pre-signed URL is past its expiry.
    ExpiredToken,
    /// Unclassified server-side failure.
    InternalError,
    /// The AWS access key ID does not exist in our records.
    InvalidAccessKeyId,
    /// An invalid request argument, e.g. a bad `max-keys` value.
    InvalidArgument,
    /// The bucket exists but cannot be served in its current state.
    InvalidBucketState,
    /// An unclassified error occurred accessing an object.
    InvalidObjectState,
    /// The requested range cannot be satisfied.
    InvalidRange,
    /// A request the server cannot interpret, e.g. the wrong signature
    /// version or an unrecognized hostname.
    InvalidRequest,
    /// The credential scope in the request is malformed.
    InvalidSecurity,
    /// The security token in the request is invalid.
    InvalidToken,
    /// The server failed to XML-encode its own response.
    MalformedXML,
    /// The request method is not allowed against this resource.
    MethodNotAllowed,
    /// A required security header is missing.
    MissingSecurityHeader,
    /// The specified bucket does not exist.
    NoSuchBucket,
    /// The specified object key does not exist.
    NoSuchKey,
    /// The computed request signature does not match the provided one.
    SignatureDoesNotMatch,
}

impl S3ErrorCode {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::AccessDenied
            | Self::AccountProblem
            | Self::InvalidAccessKeyId
            | Self::InvalidObjectState
            | Self::InvalidSecurity
            | Self::SignatureDoesNotMatch => 403,
            Self::AuthorizationHeaderMalformed
            | Self::BadDigest
            | Self::ExpiredToken
            | Self::InvalidArgument
            | Self::InvalidRequest
            | Self::InvalidToken
            | Self::MalformedXML
            | Self::MissingSecurityHeader => 400,
            Self::InvalidRange => 416,
            Self::NoSuchBucket | Self::NoSuchKey => 404,
            Self::InvalidBucketState => 409,
            Self::MethodNotAllowed => 405,
            Self::InternalError => 500,
        }
    }

    /// Returns the HTTP status code as an [`http::StatusCode`].
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(self.http_status())
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns the S3 error code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::AccountProblem => "AccountProblem",
            Self::AuthorizationHeaderMalformed => "AuthorizationHeaderMalformed",
            Self::BadDigest => "BadDigest",
            Self::ExpiredToken => "ExpiredToken",
            Self::InternalError => "InternalError",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketState => "InvalidBucketState",
            Self::InvalidObjectState => "InvalidObjectState",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidSecurity => "InvalidSecurity",
            Self::InvalidToken => "InvalidToken",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingSecurityHeader => "MissingSecurityHeader",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
        }
    }
}

impl std::fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 API error carrying a code, a user-facing message, and an
/// optional resource.
///
/// Two errors compare equal when their codes are equal, so a wrapped
/// or re-built error can still be recognized in tests and in provider
/// fallthrough logic.
#[derive(Debug, Clone, ThisError)]
#[error("[{}] {}: {message}", code.http_status(), code.as_str())]
pub struct Error {
    /// The S3 error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error (bucket name, key, etc.).
    pub resource: Option<String>,
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Error {}

impl Error {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), resource: None }
    }

    /// Attaches the resource that caused the error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// The canonical policy denial.
    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(S3ErrorCode::AccessDenied, "You do not have permission to access this resource.")
    }

    /// Classifies an I/O error raised while accessing an object.
    ///
    /// Missing files map to `NoSuchKey`, permission errors to
    /// `AccessDenied`, and anything else to `InvalidObjectState`.
    #[must_use]
    pub fn from_object_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                Self::new(S3ErrorCode::NoSuchKey, "The specified object key does not exist.")
            }
            std::io::ErrorKind::PermissionDenied => Self::new(
                S3ErrorCode::AccessDenied,
                "You do not have permission to access this object.",
            ),
            _ => Self::new(
                S3ErrorCode::InvalidObjectState,
                "An undefined permanent error occurred accessing this object.",
            ),
        }
    }

    /// Wraps an opaque error as `InvalidRequest`.
    #[must_use]
    pub fn from_opaque(err: impl std::fmt::Display) -> Self {
        Self::new(S3ErrorCode::InvalidRequest, err.to_string())
    }
}
