use angrybunny_license::{
    normalize_site_url, LicenseError, LicenseRecord, RecordStatus, DEFAULT_SITE_LIMIT,
};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

fn fresh(limit: u32) -> LicenseRecord {
    let mut rec = LicenseRecord::new("AB-0123456789abcdef-dead", Utc::now());
    rec.site_limit = limit;
    rec
}

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn new_record_defaults() {
    let now = Utc::now();
    let rec = LicenseRecord::new("AB-0123456789abcdef-dead", now);
    assert_eq!(rec.status, RecordStatus::Active);
    assert_eq!(rec.site_limit, DEFAULT_SITE_LIMIT);
    assert_eq!(rec.created_at, now);
    assert_eq!(rec.expires_at, now + Duration::days(365));
    assert!(rec.sites.is_empty());
    assert!(rec.owner_email.is_empty());
}

// ── Activation ───────────────────────────────────────────────────

#[test]
fn activate_adds_site() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    assert_eq!(rec.sites, vec!["https://a.example"]);
    assert!(rec.has_site("https://a.example"));
}

#[test]
fn activate_is_idempotent() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    rec.activate_site("https://a.example").unwrap();
    assert_eq!(rec.sites.len(), 1);
}

#[test]
fn activate_respects_site_limit() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    let err = rec.activate_site("https://b.example").unwrap_err();
    assert!(matches!(err, LicenseError::SiteLimitReached { limit: 1 }));
    assert_eq!(rec.sites, vec!["https://a.example"]);
}

#[test]
fn activate_fills_every_slot_up_to_limit() {
    let mut rec = fresh(3);
    for url in ["https://a.example", "https://b.example", "https://c.example"] {
        rec.activate_site(url).unwrap();
    }
    assert_eq!(rec.sites_active(), 3);
    assert!(matches!(
        rec.activate_site("https://d.example"),
        Err(LicenseError::SiteLimitReached { limit: 3 })
    ));
}

#[test]
fn activate_normalizes_trailing_slash() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example/").unwrap();
    // Same site with and without the slash is one activation.
    rec.activate_site("https://a.example").unwrap();
    assert_eq!(rec.sites, vec!["https://a.example"]);
}

#[test]
fn revoked_record_rejects_activation() {
    let mut rec = fresh(2);
    rec.revoke();
    assert!(matches!(
        rec.activate_site("https://a.example"),
        Err(LicenseError::NotActive)
    ));
    assert!(rec.sites.is_empty());
}

// ── Deactivation ─────────────────────────────────────────────────

#[test]
fn deactivate_removes_site() {
    let mut rec = fresh(2);
    rec.activate_site("https://a.example").unwrap();
    rec.activate_site("https://b.example").unwrap();
    rec.deactivate_site("https://a.example").unwrap();
    assert_eq!(rec.sites, vec!["https://b.example"]);
}

#[test]
fn deactivate_absent_site_is_domain_failure() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    let err = rec.deactivate_site("https://b.example").unwrap_err();
    assert!(matches!(err, LicenseError::SiteNotRegistered));
    assert_eq!(rec.sites, vec!["https://a.example"]);
}

#[test]
fn revoked_record_rejects_deactivation() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    rec.revoke();
    // Revocation is terminal: no mutation in either direction.
    assert!(matches!(
        rec.deactivate_site("https://a.example"),
        Err(LicenseError::NotActive)
    ));
    assert_eq!(rec.sites, vec!["https://a.example"]);
}

#[test]
fn deactivate_frees_a_slot() {
    let mut rec = fresh(1);
    rec.activate_site("https://a.example").unwrap();
    rec.deactivate_site("https://a.example").unwrap();
    rec.activate_site("https://b.example").unwrap();
    assert_eq!(rec.sites, vec!["https://b.example"]);
}

// ── Validation predicate ─────────────────────────────────────────

#[test]
fn valid_for_activated_site() {
    let now = Utc::now();
    let mut rec = LicenseRecord::new("AB-0123456789abcdef-dead", now);
    rec.activate_site("https://a.example").unwrap();
    assert!(rec.valid_for_site("https://a.example", now));
    assert!(!rec.valid_for_site("https://b.example", now));
}

#[test]
fn expired_record_is_not_valid() {
    let now = Utc::now();
    let mut rec = LicenseRecord::new("AB-0123456789abcdef-dead", now - Duration::days(400));
    rec.activate_site("https://a.example").unwrap();
    assert!(rec.is_expired_at(now));
    assert!(!rec.valid_for_site("https://a.example", now));
}

#[test]
fn revoked_record_is_not_valid() {
    let now = Utc::now();
    let mut rec = LicenseRecord::new("AB-0123456789abcdef-dead", now);
    rec.activate_site("https://a.example").unwrap();
    rec.revoke();
    assert!(!rec.valid_for_site("https://a.example", now));
}

// ── Serde / normalization ────────────────────────────────────────

#[test]
fn record_json_roundtrip() {
    let mut rec = fresh(2);
    rec.owner_email = "owner@example.com".to_string();
    rec.activate_site("https://a.example").unwrap();
    let json = serde_json::to_string(&rec).unwrap();
    let restored: LicenseRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(rec, restored);
}

#[test]
fn status_serializes_lowercase() {
    let json = serde_json::to_string(&RecordStatus::Revoked).unwrap();
    assert_eq!(json, "\"revoked\"");
}

#[test]
fn normalize_trims_and_strips_slashes() {
    assert_eq!(normalize_site_url(" https://a.example/ "), "https://a.example");
    assert_eq!(normalize_site_url("https://a.example//"), "https://a.example");
    assert_eq!(normalize_site_url("https://a.example/blog"), "https://a.example/blog");
}
