use crate::models::OfferKey;
use dispatch_shared::events::Decision;
use std::fmt;

/// User-facing feedback produced by the store, shown as a toast by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DecisionAcknowledged {
        key: OfferKey,
        decision: Decision,
        ok: bool,
        message: Option<String>,
    },
    DecisionTimedOut {
        key: OfferKey,
        decision: Decision,
    },
    DecisionUndelivered {
        key: OfferKey,
        decision: Decision,
        reason: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::DecisionAcknowledged { key, decision, ok: true, message } => {
                let verb = match decision {
                    Decision::Accept => "accepted",
                    Decision::Reject => "rejected",
                };
                write!(f, "Job {} {}", key.job_id, verb)?;
                if let Some(message) = message {
                    write!(f, ": {}", message)?;
                }
                Ok(())
            }
            Notice::DecisionAcknowledged { key, decision, ok: false, message } => write!(
                f,
                "Could not {} job {}: {}",
                decision,
                key.job_id,
                message.as_deref().unwrap_or("server declined")
            ),
            Notice::DecisionTimedOut { key, decision } => write!(
                f,
                "No answer from server for {} on job {}, tap again to retry",
                decision, key.job_id
            ),
            Notice::DecisionUndelivered { key, decision, reason } => write!(
                f,
                "Could not send {} for job {} ({}), tap again to retry",
                decision, key.job_id, reason
            ),
        }
    }
}

/// Presentation side effects driven by queue transitions.
///
/// Kept behind a trait so the store runs without any audio or UI attached.
pub trait AlertSink: Send + Sync {
    /// The queue went from empty to non-empty.
    fn start_ring(&self);

    /// The queue became empty.
    fn stop_ring(&self);

    fn notify(&self, notice: Notice);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlerts;

impl AlertSink for NoopAlerts {
    fn start_ring(&self) {}

    fn stop_ring(&self) {}

    fn notify(&self, _notice: Notice) {}
}
