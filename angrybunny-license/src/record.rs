//! Self-issued license records (server role).
//!
//! A [`LicenseRecord`] tracks one license key and the bounded set of site
//! URLs activated against it. All site mutation goes through
//! [`LicenseRecord::activate_site`] / [`LicenseRecord::deactivate_site`],
//! which uphold the two record invariants: `sites.len() <= site_limit` at
//! all times, and a site URL appears at most once.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of sites a fresh license may be activated on.
pub const DEFAULT_SITE_LIMIT: u32 = 1;

/// Default validity of a fresh license.
const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Status of a self-issued license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// License may be validated and activated.
    Active,
    /// License is revoked. Terminal: no further site mutation is permitted.
    Revoked,
}

/// One self-issued license and its activated sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// The license key. Immutable once created.
    pub key: String,
    /// Current status.
    pub status: RecordStatus,
    /// When the license was created.
    pub created_at: DateTime<Utc>,
    /// When the license expires.
    pub expires_at: DateTime<Utc>,
    /// Maximum number of distinct sites that may hold an activation.
    pub site_limit: u32,
    /// Activated site URLs. Ordered by activation, no duplicates.
    pub sites: Vec<String>,
    /// Owner contact email.
    #[serde(default)]
    pub owner_email: String,
    /// Owner display name.
    #[serde(default)]
    pub owner_name: String,
}

impl LicenseRecord {
    /// Creates a record with the documented defaults: active, created now,
    /// expires in one year, site limit 1, no sites.
    #[must_use]
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            status: RecordStatus::Active,
            created_at: now,
            expires_at: now + Duration::days(DEFAULT_VALIDITY_DAYS),
            site_limit: DEFAULT_SITE_LIMIT,
            sites: Vec::new(),
            owner_email: String::new(),
            owner_name: String::new(),
        }
    }

    /// Returns true if the license status permits activation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Returns true if the license has expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns true if `site_url` holds an activation slot.
    #[must_use]
    pub fn has_site(&self, site_url: &str) -> bool {
        let normalized = normalize_site_url(site_url);
        self.sites.iter().any(|s| s == &normalized)
    }

    /// Number of activation slots in use.
    #[must_use]
    pub fn sites_active(&self) -> u32 {
        self.sites.len() as u32
    }

    /// Returns true if the license is active, unexpired as of `now`, and
    /// activated for `site_url`. This is the `validate` predicate.
    #[must_use]
    pub fn valid_for_site(&self, site_url: &str, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired_at(now) && self.has_site(site_url)
    }

    /// Adds `site_url` to the activation set.
    ///
    /// Idempotent: re-activating a site already present succeeds without a
    /// duplicate entry. Fails closed on a non-active record or a full
    /// activation set.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NotActive`] if the record is revoked,
    /// [`LicenseError::SiteLimitReached`] if no slot is free.
    pub fn activate_site(&mut self, site_url: &str) -> LicenseResult<()> {
        if !self.is_active() {
            return Err(LicenseError::NotActive);
        }
        let normalized = normalize_site_url(site_url);
        if self.sites.contains(&normalized) {
            return Ok(());
        }
        if self.sites_active() >= self.site_limit {
            return Err(LicenseError::SiteLimitReached {
                limit: self.site_limit,
            });
        }
        self.sites.push(normalized);
        Ok(())
    }

    /// Removes `site_url` from the activation set.
    ///
    /// Revocation is terminal in both directions: a revoked record rejects
    /// removal just like it rejects activation.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NotActive`] if the record is revoked,
    /// [`LicenseError::SiteNotRegistered`] if the site holds no slot. This
    /// is a domain failure, not a crash; the record is left unchanged.
    pub fn deactivate_site(&mut self, site_url: &str) -> LicenseResult<()> {
        if !self.is_active() {
            return Err(LicenseError::NotActive);
        }
        let normalized = normalize_site_url(site_url);
        match self.sites.iter().position(|s| s == &normalized) {
            Some(idx) => {
                self.sites.remove(idx);
                Ok(())
            }
            None => Err(LicenseError::SiteNotRegistered),
        }
    }

    /// Flips the record to revoked. Terminal.
    pub fn revoke(&mut self) {
        self.status = RecordStatus::Revoked;
    }
}

/// Canonical form of a site URL for storage and comparison: surrounding
/// whitespace and trailing slashes removed. Comparison is otherwise exact.
#[must_use]
pub fn normalize_site_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
