//! This installation's own license state (client role).
//!
//! [`MyEntitlement`] records what the remote authority last told us plus the
//! trial and grace-period timestamps. Whether the installation is entitled
//! right now is computed on every query from those fields; nothing persists
//! a "current state", so a process restart or a long sleep cannot leave a
//! stale answer behind.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Last-known license status as reported by the remote authority.
///
/// The authority's free-text status strings are mapped onto this closed set
/// at the wire boundary; nothing downstream matches raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    /// No license stored, or explicitly deactivated.
    #[default]
    #[serde(alias = "deactivated")]
    Inactive,
    /// The authority confirmed the key valid.
    Valid,
    /// The authority reported the key expired.
    Expired,
    /// The authority disabled or revoked the key.
    #[serde(alias = "revoked")]
    Disabled,
    /// Any other negative answer (wrong site, unknown key, ...).
    #[serde(alias = "site_inactive")]
    Invalid,
}

/// Activation slots remaining on the upstream license.
///
/// Serialized the way the authority reports it: a number, or the literal
/// string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationsLeft {
    /// A concrete number of slots.
    Limited(u32),
    /// The authority reported `"unlimited"`.
    #[default]
    Unlimited,
}

impl Serialize for ActivationsLeft {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Limited(n) => serializer.serialize_u32(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for ActivationsLeft {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u32),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Self::Limited(n),
            Raw::Text(_) => Self::Unlimited,
        })
    }
}

/// The consuming site's own entitlement record.
///
/// Created implicitly with [`MyEntitlement::default`] on first access.
/// `trial_started_at` is set at most once per installation lifetime;
/// `grace_ends_at` is only meaningful while `status` is
/// [`EntitlementStatus::Expired`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MyEntitlement {
    /// The stored license key. Empty means unlicensed.
    pub key: String,
    /// Last-known status from the authority.
    pub status: EntitlementStatus,
    /// Upstream expiry, when known.
    pub expires_at: Option<DateTime<Utc>>,
    /// Remaining activation slots upstream.
    pub activations_left: ActivationsLeft,
    /// Customer email as reported by the authority.
    pub customer_email: String,
    /// Customer name as reported by the authority.
    pub customer_name: String,
    /// Upstream payment reference, if any.
    pub payment_id: String,
    /// Upstream activation limit, 0 when unknown.
    pub license_limit: u32,
    /// When the trial started. Set at most once.
    pub trial_started_at: Option<DateTime<Utc>>,
    /// When the trial ends.
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// End of the grace period entered from an expired license.
    pub grace_ends_at: Option<DateTime<Utc>>,
    /// Last successful reconciliation with the authority.
    pub last_check_at: Option<DateTime<Utc>>,
    /// Last time a notice was sent to the owner.
    pub last_notification_at: Option<DateTime<Utc>>,
}

impl MyEntitlement {
    /// Returns true if restricted functionality is authorized right now:
    /// an unelapsed trial, a valid license, or an unelapsed grace period.
    #[must_use]
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        self.trial_active(now) || self.status == EntitlementStatus::Valid || self.in_grace(now)
    }

    /// Returns true if a trial has started and has not yet elapsed.
    #[must_use]
    pub fn trial_active(&self, now: DateTime<Utc>) -> bool {
        match (self.trial_started_at, self.trial_ends_at) {
            (Some(_), Some(ends)) => now < ends,
            _ => false,
        }
    }

    /// Returns true if the trial has never started and no valid license
    /// exists, i.e. the next entitlement query should auto-start the trial.
    #[must_use]
    pub fn trial_pending(&self) -> bool {
        self.trial_started_at.is_none() && self.status != EntitlementStatus::Valid
    }

    /// Returns true while an expired license is inside its grace window.
    #[must_use]
    pub fn in_grace(&self, now: DateTime<Utc>) -> bool {
        self.status == EntitlementStatus::Expired
            && self.grace_ends_at.is_some_and(|ends| now < ends)
    }

    /// Days until the upstream expiry, rounded up. Zero or negative when
    /// already past. `None` when no expiry is known.
    #[must_use]
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        let expires = self.expires_at?;
        let secs = (expires - now).num_seconds();
        Some((secs + 86_399).div_euclid(86_400))
    }

    /// Starts the trial window. Callers must check [`Self::trial_pending`]
    /// first; a trial that already ran is never restarted.
    pub fn begin_trial(&mut self, now: DateTime<Utc>, trial_days: i64) {
        self.trial_started_at = Some(now);
        self.trial_ends_at = Some(now + Duration::days(trial_days));
    }

    /// Opens the grace window ending `grace_days` from `now`.
    pub fn enter_grace(&mut self, now: DateTime<Utc>, grace_days: i64) {
        self.grace_ends_at = Some(now + Duration::days(grace_days));
    }

    /// Resets to the inactive defaults after an explicit deactivation.
    ///
    /// Trial timestamps survive the reset: the trial runs at most once per
    /// installation lifetime, so deactivating a license must not re-arm it.
    pub fn reset(&mut self) {
        let trial_started_at = self.trial_started_at;
        let trial_ends_at = self.trial_ends_at;
        *self = Self::default();
        self.trial_started_at = trial_started_at;
        self.trial_ends_at = trial_ends_at;
    }

    /// Returns true if a notice was sent within `throttle` of `now`.
    #[must_use]
    pub fn recently_notified(&self, now: DateTime<Utc>, throttle: Duration) -> bool {
        self.last_notification_at
            .is_some_and(|last| now - last < throttle)
    }
}
