//! License records, entitlement math, and the key codec for Angry Bunny.
//!
//! This crate holds the two durable record types and everything that can be
//! computed from them without touching storage or the network:
//! - [`LicenseRecord`]: a self-issued license (server role) with its bounded
//!   set of activated sites
//! - [`MyEntitlement`]: this installation's own license state (client role),
//!   including trial and grace-period timestamps
//! - [`KeyCodec`]: generation and syntactic validation of `AB-` license keys
//!
//! Entitlement is always recomputed from stored timestamps and the last-known
//! remote status; there is no persisted "current state" field to drift.

mod entitlement;
mod error;
mod key;
mod record;

pub use entitlement::{ActivationsLeft, EntitlementStatus, MyEntitlement};
pub use error::{LicenseError, LicenseResult};
pub use key::{is_well_formed, KeyCodec, KEY_PREFIX};
pub use record::{normalize_site_url, LicenseRecord, RecordStatus, DEFAULT_SITE_LIMIT};
