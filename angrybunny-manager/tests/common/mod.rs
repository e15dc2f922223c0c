//! Shared test helpers for manager tests.

#![allow(dead_code)]

use angrybunny_manager::{LicenseManager, ManagerConfig, Notice, Notifier};
use angrybunny_remote::{AuthorityClient, AuthorityConfig};
use angrybunny_store::EntitlementStore;
use std::sync::{Arc, Mutex};

pub const KEY: &str = "AB-0123456789abcdef-dead";
pub const SITE: &str = "https://me.example";

/// Notifier that records every notice for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn taken(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// Builds a manager over an in-memory store talking to `endpoint`.
pub fn manager_for(
    endpoint: &str,
) -> (LicenseManager, Arc<EntitlementStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(EntitlementStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let client = AuthorityClient::with_timeout(
        AuthorityConfig {
            endpoint: endpoint.to_string(),
            item_id: 123,
            item_name: "Angry Bunny Security Scanner Pro".to_string(),
        },
        std::time::Duration::from_secs(2),
    )
    .unwrap();
    let manager = LicenseManager::new(
        Arc::clone(&store),
        client,
        notifier.clone(),
        ManagerConfig::for_site(SITE),
    );
    (manager, store, notifier)
}

/// An authority response body for a valid license expiring at `expires`.
pub fn valid_body(expires: &str) -> String {
    format!(
        r#"{{
            "success": true,
            "license": "valid",
            "license_key": "{KEY}",
            "expires": "{expires}",
            "activations_left": 2,
            "customer_email": "c@example.com",
            "customer_name": "Casey",
            "payment_id": 99,
            "license_limit": 3
        }}"#
    )
}

/// An authority rejection body with the given license status and error code.
pub fn rejected_body(license: &str, error: &str) -> String {
    format!(r#"{{"success":false,"license":"{license}","error":"{error}"}}"#)
}
