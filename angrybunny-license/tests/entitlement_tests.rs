use angrybunny_license::{ActivationsLeft, EntitlementStatus, MyEntitlement};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn default_is_inactive_and_unentitled() {
    let ent = MyEntitlement::default();
    assert_eq!(ent.status, EntitlementStatus::Inactive);
    assert!(ent.key.is_empty());
    assert!(ent.trial_pending());
    assert!(!ent.is_entitled(Utc::now()));
}

// ── Trial ────────────────────────────────────────────────────────

#[test]
fn trial_grants_entitlement_until_it_ends() {
    let now = Utc::now();
    let mut ent = MyEntitlement::default();
    ent.begin_trial(now, 7);
    assert!(!ent.trial_pending());
    assert!(ent.trial_active(now));
    assert!(ent.is_entitled(now + Duration::days(6)));
    assert!(!ent.is_entitled(now + Duration::days(8)));
}

#[test]
fn valid_license_suppresses_trial_pending() {
    let mut ent = MyEntitlement::default();
    ent.status = EntitlementStatus::Valid;
    assert!(!ent.trial_pending());
}

#[test]
fn elapsed_trial_does_not_rearm() {
    let now = Utc::now();
    let mut ent = MyEntitlement::default();
    ent.begin_trial(now - Duration::days(30), 7);
    assert!(!ent.trial_active(now));
    // Once started, a trial is never pending again.
    assert!(!ent.trial_pending());
}

// ── Grace ────────────────────────────────────────────────────────

#[test]
fn grace_keeps_entitlement_until_window_closes() {
    let now = Utc::now();
    let mut ent = MyEntitlement {
        status: EntitlementStatus::Expired,
        ..Default::default()
    };
    ent.enter_grace(now, 7);
    assert!(ent.in_grace(now));
    assert!(ent.is_entitled(now + Duration::days(6)));
    assert!(!ent.is_entitled(now + Duration::days(7) + Duration::seconds(1)));
}

#[test]
fn grace_window_is_status_gated() {
    let now = Utc::now();
    let mut ent = MyEntitlement::default();
    ent.enter_grace(now, 7);
    // grace_ends_at without Expired status grants nothing.
    assert!(!ent.in_grace(now));
}

#[test]
fn grace_does_not_oscillate_after_elapsing() {
    let now = Utc::now();
    let mut ent = MyEntitlement {
        status: EntitlementStatus::Expired,
        ..Default::default()
    };
    ent.enter_grace(now - Duration::days(8), 7);
    assert!(!ent.is_entitled(now));
    assert!(!ent.is_entitled(now + Duration::days(1)));
}

// ── Expiry math ──────────────────────────────────────────────────

#[test]
fn days_until_expiry_rounds_up() {
    let now = Utc::now();
    let mut ent = MyEntitlement::default();
    ent.expires_at = Some(now + Duration::hours(36));
    assert_eq!(ent.days_until_expiry(now), Some(2));

    ent.expires_at = Some(now - Duration::hours(2));
    assert_eq!(ent.days_until_expiry(now), Some(0));

    ent.expires_at = None;
    assert_eq!(ent.days_until_expiry(now), None);
}

// ── Reset ────────────────────────────────────────────────────────

#[test]
fn reset_clears_license_but_keeps_trial_history() {
    let now = Utc::now();
    let mut ent = MyEntitlement {
        key: "AB-0123456789abcdef-dead".to_string(),
        status: EntitlementStatus::Valid,
        customer_email: "c@example.com".to_string(),
        ..Default::default()
    };
    ent.begin_trial(now - Duration::days(30), 7);
    ent.reset();

    assert!(ent.key.is_empty());
    assert_eq!(ent.status, EntitlementStatus::Inactive);
    assert!(ent.customer_email.is_empty());
    // Trial ran once already; reset must not re-arm it.
    assert!(ent.trial_started_at.is_some());
    assert!(!ent.trial_pending());
}

// ── Notification throttle ────────────────────────────────────────

#[test]
fn recently_notified_honors_throttle() {
    let now = Utc::now();
    let mut ent = MyEntitlement::default();
    assert!(!ent.recently_notified(now, Duration::hours(24)));

    ent.last_notification_at = Some(now - Duration::hours(2));
    assert!(ent.recently_notified(now, Duration::hours(24)));

    ent.last_notification_at = Some(now - Duration::hours(25));
    assert!(!ent.recently_notified(now, Duration::hours(24)));
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn status_aliases_from_authority_strings() {
    let s: EntitlementStatus = serde_json::from_str("\"revoked\"").unwrap();
    assert_eq!(s, EntitlementStatus::Disabled);
    let s: EntitlementStatus = serde_json::from_str("\"site_inactive\"").unwrap();
    assert_eq!(s, EntitlementStatus::Invalid);
    let s: EntitlementStatus = serde_json::from_str("\"valid\"").unwrap();
    assert_eq!(s, EntitlementStatus::Valid);
}

#[test]
fn activations_left_parses_both_forms() {
    let a: ActivationsLeft = serde_json::from_str("3").unwrap();
    assert_eq!(a, ActivationsLeft::Limited(3));
    let a: ActivationsLeft = serde_json::from_str("\"unlimited\"").unwrap();
    assert_eq!(a, ActivationsLeft::Unlimited);
}

#[test]
fn entitlement_json_roundtrip() {
    let now = Utc::now();
    let mut ent = MyEntitlement {
        key: "AB-0123456789abcdef-dead".to_string(),
        status: EntitlementStatus::Valid,
        activations_left: ActivationsLeft::Unlimited,
        ..Default::default()
    };
    ent.begin_trial(now, 7);
    let json = serde_json::to_string(&ent).unwrap();
    let restored: MyEntitlement = serde_json::from_str(&json).unwrap();
    assert_eq!(ent, restored);
}
