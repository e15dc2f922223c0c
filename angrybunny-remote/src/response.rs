//! Parsing of authority responses.
//!
//! The authority's `error` field is free text on the wire; it is mapped to
//! the closed [`AuthorityCode`] set here, at the client boundary, so the
//! state machine never pattern-matches raw strings. Unknown codes collapse
//! into [`AuthorityCode::Unknown`].

use angrybunny_license::{ActivationsLeft, EntitlementStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// The authority's reason for a negative answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityCode {
    /// The key has expired.
    Expired,
    /// The key was disabled or revoked by the vendor.
    Disabled,
    /// The key was never issued.
    Missing,
    /// The key is not active for the calling site.
    SiteInactive,
    /// The key belongs to a different product.
    ItemNameMismatch,
    /// Every activation slot is taken.
    NoActivationsLeft,
    /// Anything the client does not recognize.
    Unknown,
}

impl AuthorityCode {
    /// Maps a wire code onto the closed set.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "expired" => Self::Expired,
            "disabled" | "revoked" => Self::Disabled,
            "missing" => Self::Missing,
            "invalid" | "site_inactive" => Self::SiteInactive,
            "item_name_mismatch" => Self::ItemNameMismatch,
            "no_activations_left" => Self::NoActivationsLeft,
            _ => Self::Unknown,
        }
    }

    /// The user-facing message for this rejection.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Expired => "Your license key has expired.",
            Self::Disabled => "Your license key has been disabled.",
            Self::Missing => "Invalid license key.",
            Self::SiteInactive => "Your license is not active for this URL.",
            Self::ItemNameMismatch => "This license key does not belong to this product.",
            Self::NoActivationsLeft => "Your license key has reached its activation limit.",
            Self::Unknown => "An error occurred, please try again.",
        }
    }
}

/// A parsed authority response. Optional fields default per the data model;
/// a minimal `{"success":false}` payload is acceptable.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityResponse {
    /// Whether the authority accepted the operation.
    pub success: bool,
    /// License status string, e.g. `"valid"` or `"expired"`.
    #[serde(default)]
    pub license: String,
    /// Key echoed back by the authority, when present.
    #[serde(default)]
    pub license_key: Option<String>,
    /// Expiry as reported, e.g. `"2027-03-01 23:59:59"` or `"lifetime"`.
    #[serde(default)]
    pub expires: Option<String>,
    /// Rejection reason, present when `success` is false.
    #[serde(default, deserialize_with = "de_error_code")]
    pub error: Option<AuthorityCode>,
    /// Remaining activation slots.
    #[serde(default)]
    pub activations_left: ActivationsLeft,
    /// Customer email on file.
    #[serde(default)]
    pub customer_email: String,
    /// Customer name on file.
    #[serde(default)]
    pub customer_name: String,
    /// Upstream payment reference.
    #[serde(default)]
    pub payment_id: Option<i64>,
    /// Upstream activation limit, 0 when unknown or unlimited.
    #[serde(default)]
    pub license_limit: u32,
}

impl AuthorityResponse {
    /// The license status mapped onto the closed set. Unknown strings are
    /// treated as invalid, never as valid.
    #[must_use]
    pub fn status(&self) -> EntitlementStatus {
        match self.license.as_str() {
            "valid" => EntitlementStatus::Valid,
            "expired" => EntitlementStatus::Expired,
            "disabled" | "revoked" => EntitlementStatus::Disabled,
            "inactive" | "deactivated" | "" => EntitlementStatus::Inactive,
            _ => EntitlementStatus::Invalid,
        }
    }

    /// Returns true if the authority confirmed the key valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status() == EntitlementStatus::Valid
    }

    /// The expiry as a UTC timestamp. `None` for lifetime licenses or
    /// unparseable values.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires.as_deref()?;
        if raw == "lifetime" {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

fn de_error_code<'de, D>(deserializer: D) -> Result<Option<AuthorityCode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|code| AuthorityCode::from_code(&code)))
}
