//! The license lifecycle state machine.
//!
//! [`LicenseManager`] answers the one question the rest of the system asks
//! ("is this installation entitled right now?") and performs the three
//! remote-backed operations: `activate`, `deactivate` and the daily
//! `check_license` reconciliation.
//!
//! Entitlement is never stored; it is recomputed on every query from the
//! persisted timestamps and the last-known authority status, so the answer
//! cannot drift across process restarts. The lifecycle is:
//!
//! none → trial (auto-started on first query) → active (key validated)
//! → grace (authority says expired while we thought valid) → expired,
//! with renewal from any terminal state via `activate`.
//!
//! Every remote failure is translated into an [`ActionResult`] here; no
//! error type from the network layer crosses into callers.

mod notify;

pub use notify::{LogNotifier, Notice, Notifier};

use angrybunny_license::{EntitlementStatus, LicenseResult, MyEntitlement};
use angrybunny_remote::{AuthorityClient, AuthorityCode, AuthorityResponse};
use angrybunny_store::EntitlementStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle constants with their documented defaults.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// This site's own URL, sent with every authority call.
    pub site_url: String,
    /// Best-effort environment tag (`production`, `staging`, ...).
    pub environment: String,
    /// Installed product version, sent with update checks.
    pub installed_version: String,
    /// Trial length in days.
    pub trial_days: i64,
    /// Grace period length in days.
    pub grace_days: i64,
    /// How many days before expiry the expiring-soon notice fires.
    pub expiry_notice_days: i64,
    /// Minimum gap between repeated notices.
    pub notification_throttle: Duration,
}

impl ManagerConfig {
    /// Config for the given site with the default constants: 7-day trial,
    /// 7-day grace, 7-day expiry notice window, 24-hour notice throttle.
    #[must_use]
    pub fn for_site(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            environment: "production".to_string(),
            installed_version: env!("CARGO_PKG_VERSION").to_string(),
            trial_days: 7,
            grace_days: 7,
            expiry_notice_days: 7,
            notification_throttle: Duration::hours(24),
        }
    }
}

/// Outcome of a user-triggered license operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    /// Whether the operation took effect.
    pub success: bool,
    /// User-facing explanation.
    pub message: String,
}

impl ActionResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The state machine over this installation's entitlement.
pub struct LicenseManager {
    store: Arc<EntitlementStore>,
    client: AuthorityClient,
    notifier: Arc<dyn Notifier>,
    config: ManagerConfig,
}

impl LicenseManager {
    /// Creates a manager over the given store and authority client.
    pub fn new(
        store: Arc<EntitlementStore>,
        client: AuthorityClient,
        notifier: Arc<dyn Notifier>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            client,
            notifier,
            config,
        }
    }

    /// Whether restricted functionality is authorized right now.
    ///
    /// On the first ungranted query of a fresh installation (no trial ever
    /// started, no valid license) the trial auto-starts; the trial runs at
    /// most once per installation lifetime.
    ///
    /// # Errors
    ///
    /// Only on store failure; never on the entitlement record being absent.
    pub fn is_entitled(&self) -> LicenseResult<bool> {
        let now = Utc::now();
        let mut started_trial = false;
        let ent = self.store.update_entitlement(|mut ent| {
            if ent.trial_pending() {
                ent.begin_trial(now, self.config.trial_days);
                ent.last_notification_at = Some(now);
                started_trial = true;
            }
            Ok(ent)
        })?;

        if started_trial {
            info!(ends = ?ent.trial_ends_at, "no license present, starting trial");
            if let Some(ends) = ent.trial_ends_at {
                self.notifier.notify(&Notice::TrialStarted { ends });
            }
        }
        Ok(ent.is_entitled(now))
    }

    /// A copy of the current entitlement record (for display surfaces).
    pub fn entitlement(&self) -> LicenseResult<MyEntitlement> {
        self.store.my_entitlement()
    }

    /// Activates `key` against the remote authority and, on a valid answer,
    /// overwrites the local entitlement with the returned fields.
    ///
    /// Transport failure and authority rejection both leave local state
    /// untouched.
    pub async fn activate(&self, key: &str) -> ActionResult {
        let key = key.trim();
        if key.is_empty() {
            return ActionResult::fail("No license key provided.");
        }

        let resp = match self
            .client
            .activate(key, &self.config.site_url, &self.config.environment)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "license activation did not reach the authority");
                return ActionResult::fail(e.to_string());
            }
        };

        if !resp.is_valid() {
            let code = resp.error.unwrap_or(AuthorityCode::Unknown);
            info!(?code, "authority rejected activation");
            return ActionResult::fail(code.user_message());
        }

        let now = Utc::now();
        let applied = self.store.update_entitlement(|mut ent| {
            apply_authority_fields(&mut ent, key, &resp);
            ent.grace_ends_at = None;
            ent.last_check_at = Some(now);
            Ok(ent)
        });
        match applied {
            Ok(_) => {
                info!("license activated");
                ActionResult::ok("License activated successfully.")
            }
            Err(e) => ActionResult::fail(e.to_string()),
        }
    }

    /// Releases the remote activation slot and resets the local entitlement.
    ///
    /// The local reset happens regardless of the remote call's outcome:
    /// local access is always revocable even when the authority is
    /// unreachable.
    pub async fn deactivate(&self) -> ActionResult {
        let ent = match self.store.my_entitlement() {
            Ok(ent) => ent,
            Err(e) => return ActionResult::fail(e.to_string()),
        };
        if ent.key.is_empty() {
            return ActionResult::fail("No license key found.");
        }

        if let Err(e) = self
            .client
            .deactivate(&ent.key, &self.config.site_url, &self.config.environment)
            .await
        {
            warn!(error = %e, "remote deactivation not confirmed, resetting locally anyway");
        }

        match self.store.update_entitlement(|mut ent| {
            ent.reset();
            Ok(ent)
        }) {
            Ok(_) => {
                info!("license deactivated");
                ActionResult::ok("License deactivated successfully.")
            }
            Err(e) => ActionResult::fail(e.to_string()),
        }
    }

    /// The daily reconciliation against the remote authority.
    ///
    /// On transport failure nothing is mutated: stale local data is
    /// preferred over a false negative from a flaky network. A valid→
    /// expired transition opens the grace window. A successful check within
    /// the expiry notice window fires a throttled expiring-soon notice, and
    /// an update-metadata refresh runs in the background while entitled.
    pub async fn check_license(&self) -> ActionResult {
        let now = Utc::now();
        let ent = match self.store.my_entitlement() {
            Ok(ent) => ent,
            Err(e) => return ActionResult::fail(e.to_string()),
        };
        if ent.key.is_empty() {
            return ActionResult::fail("No license key found.");
        }

        let resp = match self
            .client
            .check_status(&ent.key, &self.config.site_url, &self.config.environment)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "license check did not reach the authority");
                return ActionResult::fail(e.to_string());
            }
        };

        if !resp.is_valid() {
            return self.apply_invalid_check(now, &resp);
        }

        let mut expiring_soon = false;
        let applied = self.store.update_entitlement(|mut ent| {
            let key = ent.key.clone();
            apply_authority_fields(&mut ent, &key, &resp);
            ent.grace_ends_at = None;
            ent.last_check_at = Some(now);
            if let Some(days) = ent.days_until_expiry(now) {
                if days > 0
                    && days <= self.config.expiry_notice_days
                    && !ent.recently_notified(now, self.config.notification_throttle)
                {
                    ent.last_notification_at = Some(now);
                    expiring_soon = true;
                }
            }
            Ok(ent)
        });

        let updated = match applied {
            Ok(ent) => ent,
            Err(e) => return ActionResult::fail(e.to_string()),
        };

        if expiring_soon {
            self.notifier.notify(&Notice::ExpiringSoon {
                expires: updated.expires_at,
            });
        }
        if updated.is_entitled(now) {
            self.spawn_update_refresh(updated.key.clone());
        }
        ActionResult::ok("License status checked successfully.")
    }

    /// Applies a negative check result: grace entry on a fresh expiry,
    /// status downgrade, throttled expired notice once grace is gone.
    fn apply_invalid_check(&self, now: DateTime<Utc>, resp: &AuthorityResponse) -> ActionResult {
        let code = resp.error.unwrap_or(AuthorityCode::Unknown);
        let mut entered_grace = false;
        let mut fully_expired = false;

        let applied = self.store.update_entitlement(|mut ent| {
            let was_valid = ent.status == EntitlementStatus::Valid;
            if was_valid && code == AuthorityCode::Expired {
                ent.enter_grace(now, self.config.grace_days);
                ent.last_notification_at = Some(now);
                entered_grace = true;
            }
            ent.status = resp.status();
            ent.last_check_at = Some(now);
            if !entered_grace
                && ent.status == EntitlementStatus::Expired
                && !ent.in_grace(now)
                && !ent.recently_notified(now, self.config.notification_throttle)
            {
                ent.last_notification_at = Some(now);
                fully_expired = true;
            }
            Ok(ent)
        });

        let updated = match applied {
            Ok(ent) => ent,
            Err(e) => return ActionResult::fail(e.to_string()),
        };

        if entered_grace {
            if let Some(ends) = updated.grace_ends_at {
                info!(ends = %ends, "license expired, entering grace period");
                self.notifier.notify(&Notice::GraceStarted { ends });
            }
        } else if fully_expired {
            self.notifier.notify(&Notice::Expired);
        }
        ActionResult::fail(code.user_message())
    }

    /// Fire-and-forget refresh of the update metadata. Failures are logged
    /// and dropped; update checks must never block or fail a license check.
    fn spawn_update_refresh(&self, key: String) {
        let client = self.client.clone();
        let store = Arc::clone(&self.store);
        let site_url = self.config.site_url.clone();
        let version = self.config.installed_version.clone();
        tokio::spawn(async move {
            match client.get_version(&key, &site_url, &version).await {
                Ok(payload) if payload.get("new_version").is_some() => {
                    if let Err(e) = store.set_update_metadata(&payload.to_string()) {
                        debug!(error = %e, "failed to store update metadata");
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "update metadata refresh failed"),
            }
        });
    }
}

/// Copies the authority's answer into the entitlement record.
fn apply_authority_fields(ent: &mut MyEntitlement, key: &str, resp: &AuthorityResponse) {
    ent.key = resp
        .license_key
        .clone()
        .unwrap_or_else(|| key.to_string());
    ent.status = resp.status();
    ent.expires_at = resp.expires_at();
    ent.activations_left = resp.activations_left;
    ent.customer_email = resp.customer_email.clone();
    ent.customer_name = resp.customer_name.clone();
    ent.payment_id = resp.payment_id.map(|id| id.to_string()).unwrap_or_default();
    ent.license_limit = resp.license_limit;
}
