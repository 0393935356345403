//! Error types for Curate

use thiserror::Error;

/// Top-level error type for Curate
#[derive(Debug, Error)]
pub enum CurateError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Suggestion error: {0}")]
    Suggestion(#[from] SuggestionError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    ContentType(#[from] ParseContentTypeError),
}

/// Unknown content type name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown content type: {0}")]
pub struct ParseContentTypeError(pub String);

/// Errors from a document store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

/// Errors from a blob store
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Blob too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io(err.to_string())
    }
}

/// Errors from a form-field suggestion service
#[derive(Debug, Clone, Error)]
pub enum SuggestionError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("timeout")]
    Timeout,

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("rate limited")]
    RateLimited,

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("missing api key: ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("content type not supported: {0}")]
    Unsupported(String),
}

impl SuggestionError {
    /// Whether the failure is transient; callers surface it once and do not retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Errors from an auth provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Session not found or expired")]
    InvalidSession,

    #[error("Auth backend error: {0}")]
    Backend(String),
}

/// Result type alias for Curate operations
pub type CurateResult<T> = Result<T, CurateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::not_found("Reels", "abc");
        assert_eq!(format!("{}", err), "Document not found: Reels/abc");
    }

    #[test]
    fn test_blob_error_display() {
        let err = BlobError::TooLarge { size: 20, limit: 10 };
        let msg = format!("{}", err);
        assert!(msg.contains("20"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_suggestion_transience() {
        assert!(SuggestionError::Timeout.is_transient());
        assert!(
            SuggestionError::Http {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!SuggestionError::InvalidApiKey.is_transient());
        assert!(!SuggestionError::Malformed("x".into()).is_transient());
    }

    #[test]
    fn test_conversion_into_umbrella() {
        let err: CurateError = AuthError::InvalidSession.into();
        assert!(matches!(err, CurateError::Auth(AuthError::InvalidSession)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let blob: BlobError = io.into();
        assert!(matches!(blob, BlobError::Io(_)));
    }
}
