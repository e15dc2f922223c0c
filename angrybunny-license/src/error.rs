//! Error types shared across the licensing crates.

use thiserror::Error;

/// Local licensing errors.
///
/// These cover validation and store-level failures. Remote-authority
/// failures have their own taxonomy in `angrybunny-remote` because callers
/// must branch on transport failure vs. an authoritative rejection.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The key does not match the `AB-<16 hex>-<4 hex>` pattern.
    #[error("invalid license key format")]
    InvalidKeyFormat,

    /// No license record exists for the given key.
    #[error("license key not found")]
    NotFound,

    /// The license exists but is revoked or otherwise not active.
    #[error("license is not active")]
    NotActive,

    /// All activation slots for the license are taken.
    #[error("site limit reached for this license (limit {limit})")]
    SiteLimitReached {
        /// The record's site limit at the time of the attempt.
        limit: u32,
    },

    /// The site URL is not among the license's activations.
    #[error("site not found in license activations")]
    SiteNotRegistered,

    /// The durable store failed. Not recovered locally; callers abort.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored record blob could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
