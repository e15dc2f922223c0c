//! Owner-facing notices about license lifecycle events.
//!
//! Delivery (email, dashboard banner) lives outside this engine; the
//! [`Notifier`] trait is the seam. The default implementation just logs.

use chrono::{DateTime, Utc};
use tracing::info;

/// A human-relevant lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The free trial has started.
    TrialStarted {
        /// When the trial ends.
        ends: DateTime<Utc>,
    },
    /// The license expires within the notice window.
    ExpiringSoon {
        /// Upstream expiry, when known.
        expires: Option<DateTime<Utc>>,
    },
    /// The license expired and the grace period has begun.
    GraceStarted {
        /// When the grace period ends.
        ends: DateTime<Utc>,
    },
    /// The license is expired with no grace remaining.
    Expired,
}

/// Sink for lifecycle notices.
pub trait Notifier: Send + Sync {
    /// Delivers one notice. Implementations must not block for long; the
    /// scheduler has already throttled repeats.
    fn notify(&self, notice: &Notice);
}

/// Notifier that records notices in the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::TrialStarted { ends } => {
                info!(ends = %ends, "pro trial started");
            }
            Notice::ExpiringSoon { expires: Some(at) } => {
                info!(expires = %at, "license expiring soon, renew to keep pro features");
            }
            Notice::ExpiringSoon { expires: None } => {
                info!("license expiring soon, renew to keep pro features");
            }
            Notice::GraceStarted { ends } => {
                info!(ends = %ends, "license expired, grace period started");
            }
            Notice::Expired => {
                info!("license expired, pro features disabled");
            }
        }
    }
}
