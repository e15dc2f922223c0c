//! HTTP activation gateway for self-issued licenses.
//!
//! Remote client sites call these endpoints to validate, activate and
//! deactivate against this site's licenses. Every route requires the
//! shared-secret header `X-Angry-Bunny-API-Key`; the comparison goes
//! through SHA-256 digests so its timing does not depend on the secret.
//!
//! `validate` deliberately answers every failure with the same generic
//! message: disclosing *why* a key is not valid (unknown vs. revoked vs.
//! over limit) would hand unauthenticated-looking callers a key-guessing
//! oracle. The mutating routes return specific messages, since their
//! callers already hold the shared secret and need actionable errors.
//!
//! The capacity check and site append inside `activate` run inside one
//! [`EntitlementStore::upsert_license`]-style transaction, so two racing
//! activations for the same key can never push the site count past the
//! limit.

use angrybunny_license::{is_well_formed, KeyCodec, LicenseError, LicenseRecord, LicenseResult};
use angrybunny_store::EntitlementStore;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "X-Angry-Bunny-API-Key";

/// Shared state behind the router.
#[derive(Clone)]
pub struct GatewayState {
    store: Arc<EntitlementStore>,
    codec: KeyCodec,
    api_key_digest: [u8; 32],
}

impl GatewayState {
    /// Builds gateway state over the store, provisioning the API key and
    /// codec salt on first run.
    ///
    /// # Errors
    ///
    /// Only on store failure.
    pub fn new(store: Arc<EntitlementStore>) -> LicenseResult<Self> {
        let api_key = store.api_key()?;
        let codec = KeyCodec::new(store.key_salt()?);
        Ok(Self {
            store,
            codec,
            api_key_digest: digest(&api_key),
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(presented) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        // Digest comparison: constant-time in the stored secret.
        digest(presented) == self.api_key_digest
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Request body shared by the site-facing license routes.
#[derive(Debug, Deserialize)]
pub struct LicenseRequest {
    /// The license key being exercised.
    pub license_key: String,
    /// The client site the operation is for.
    pub site_url: String,
}

/// Request body for owner-side license generation.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Activation slots for the new license.
    #[serde(default = "default_site_limit")]
    pub site_limit: u32,
    /// Owner contact email.
    #[serde(default)]
    pub owner_email: String,
    /// Owner display name.
    #[serde(default)]
    pub owner_name: String,
}

fn default_site_limit() -> u32 {
    angrybunny_license::DEFAULT_SITE_LIMIT
}

/// Request body for owner-side revocation.
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// The key to revoke.
    pub license_key: String,
}

/// Usage metadata returned on success.
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageData {
    /// License expiry.
    pub expires: DateTime<Utc>,
    /// Activation slot count.
    pub site_limit: u32,
    /// Slots in use.
    pub sites_active: u32,
}

/// Wire shape of every gateway response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// User-facing message.
    pub message: String,
    /// Usage metadata, present on successful license operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UsageData>,
    /// The generated key, present only on `generate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

/// One row of the owner-side license listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseSummary {
    /// The license key.
    pub key: String,
    /// Owner display name.
    pub owner_name: String,
    /// Owner contact email.
    pub owner_email: String,
    /// `active` or `revoked`.
    pub status: String,
    /// Slots in use.
    pub sites_active: u32,
    /// Activation slot count.
    pub site_limit: u32,
    /// License expiry.
    pub expires: DateTime<Utc>,
}

impl ApiResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            license_key: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            license_key: None,
        }
    }

    fn with_usage(mut self, record: &LicenseRecord) -> Self {
        self.data = Some(UsageData {
            expires: record.expires_at,
            site_limit: record.site_limit,
            sites_active: record.sites_active(),
        });
        self
    }
}

type Reply = (StatusCode, Json<ApiResponse>);

fn forbidden() -> Reply {
    (
        StatusCode::FORBIDDEN,
        Json(ApiResponse::fail("Invalid API key")),
    )
}

fn rejected(err: &LicenseError) -> Reply {
    let status = match err {
        LicenseError::Storage(_) | LicenseError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(ApiResponse::fail(err.to_string())))
}

/// Builds the gateway router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/angry-bunny/v1/license/validate", post(validate_license))
        .route("/angry-bunny/v1/license/activate", post(activate_license))
        .route("/angry-bunny/v1/license/deactivate", post(deactivate_license))
        .route("/angry-bunny/v1/license/generate", post(generate_license))
        .route("/angry-bunny/v1/license/revoke", post(revoke_license))
        .route("/angry-bunny/v1/licenses", get(list_licenses))
        .with_state(state)
}

async fn validate_license(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<LicenseRequest>,
) -> Reply {
    if !state.authorized(&headers) {
        return forbidden();
    }

    // Uniform generic failure: no distinction between unknown, revoked,
    // expired or unregistered-site keys.
    let not_valid = || {
        (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::fail("License is not valid")),
        )
    };

    if !is_well_formed(&req.license_key) {
        return not_valid();
    }
    let record = match state.store.get_license(req.license_key.trim()) {
        Ok(Some(record)) => record,
        Ok(None) => return not_valid(),
        Err(err) => return rejected(&err),
    };
    if !record.valid_for_site(&req.site_url, Utc::now()) {
        return not_valid();
    }
    (
        StatusCode::OK,
        Json(ApiResponse::ok("License is valid").with_usage(&record)),
    )
}

async fn activate_license(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<LicenseRequest>,
) -> Reply {
    if !state.authorized(&headers) {
        return forbidden();
    }
    if !is_well_formed(&req.license_key) {
        return rejected(&LicenseError::InvalidKeyFormat);
    }

    // Read, capacity check and append happen under the store's record
    // transaction; concurrent activations for one key serialize here.
    let result = state.store.update_license(req.license_key.trim(), |mut record| {
        record.activate_site(&req.site_url)?;
        Ok(record)
    });

    match result {
        Ok(record) => {
            info!(key = %record.key, site = %req.site_url, "site activated");
            (
                StatusCode::OK,
                Json(ApiResponse::ok("License activated successfully").with_usage(&record)),
            )
        }
        Err(err) => rejected(&err),
    }
}

async fn deactivate_license(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<LicenseRequest>,
) -> Reply {
    if !state.authorized(&headers) {
        return forbidden();
    }

    let result = state.store.update_license(req.license_key.trim(), |mut record| {
        record.deactivate_site(&req.site_url)?;
        Ok(record)
    });

    match result {
        Ok(record) => {
            info!(key = %record.key, site = %req.site_url, "site deactivated");
            (
                StatusCode::OK,
                Json(ApiResponse::ok("License deactivated successfully").with_usage(&record)),
            )
        }
        Err(err) => rejected(&err),
    }
}

async fn generate_license(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Reply {
    if !state.authorized(&headers) {
        return forbidden();
    }
    if req.site_limit == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("Site limit must be at least 1")),
        );
    }

    let key = state.codec.generate();
    let result = state.store.upsert_license(&key, |mut record| {
        record.site_limit = req.site_limit;
        record.owner_email = req.owner_email.clone();
        record.owner_name = req.owner_name.clone();
        Ok(record)
    });

    match result {
        Ok(record) => {
            info!(key = %record.key, limit = record.site_limit, "license generated");
            let mut resp = ApiResponse::ok("License generated successfully").with_usage(&record);
            resp.license_key = Some(record.key);
            (StatusCode::OK, Json(resp))
        }
        Err(err) => rejected(&err),
    }
}

async fn revoke_license(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(req): Json<RevokeRequest>,
) -> Reply {
    if !state.authorized(&headers) {
        return forbidden();
    }

    let result = state.store.update_license(req.license_key.trim(), |mut record| {
        record.revoke();
        Ok(record)
    });

    match result {
        Ok(record) => {
            warn!(key = %record.key, "license revoked");
            (
                StatusCode::OK,
                Json(ApiResponse::ok("License revoked successfully")),
            )
        }
        Err(err) => rejected(&err),
    }
}

async fn list_licenses(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<Vec<LicenseSummary>>, Reply> {
    if !state.authorized(&headers) {
        return Err(forbidden());
    }

    let records = state.store.list_licenses().map_err(|e| rejected(&e))?;
    let summaries = records
        .into_iter()
        .map(|r| LicenseSummary {
            owner_name: r.owner_name.clone(),
            owner_email: r.owner_email.clone(),
            status: match r.status {
                angrybunny_license::RecordStatus::Active => "active".to_string(),
                angrybunny_license::RecordStatus::Revoked => "revoked".to_string(),
            },
            sites_active: r.sites_active(),
            site_limit: r.site_limit,
            expires: r.expires_at,
            key: r.key,
        })
        .collect();
    Ok(Json(summaries))
}
