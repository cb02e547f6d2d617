use dispatch_shared::events::{JobAlertEvent, JobAlertExpiredEvent};
use dispatch_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `(jobId, attemptIndex)`: the unique identity of one offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OfferKey {
    pub job_id: String,
    pub attempt_index: u32,
}

impl OfferKey {
    pub fn new(job_id: impl Into<String>, attempt_index: u32) -> Self {
        Self {
            job_id: job_id.into(),
            attempt_index,
        }
    }
}

impl fmt::Display for OfferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.job_id, self.attempt_index)
    }
}

impl FromStr for OfferKey {
    type Err = String;

    /// Parses `J1:0`. Job ids may themselves contain `:`, so split on the last one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (job_id, attempt) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected <jobId>:<attempt>, got {}", s))?;
        if job_id.is_empty() {
            return Err(format!("missing job id in {}", s));
        }
        let attempt_index = attempt
            .parse::<u32>()
            .map_err(|_| format!("invalid attempt index in {}", s))?;
        Ok(Self::new(job_id, attempt_index))
    }
}

impl From<&JobAlertExpiredEvent> for OfferKey {
    fn from(event: &JobAlertExpiredEvent) -> Self {
        Self::new(event.job_id.clone(), event.attempt_index)
    }
}

/// Offer status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Submitting,
    Resolved,
}

/// A job proposed to the mechanic for one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub job_id: String,
    pub attempt_index: u32,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub customer_name: Option<Masked<String>>,
    #[serde(default)]
    pub customer_phone: Option<Masked<String>>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    deadline: i64,
    pub status: OfferStatus,
    #[serde(default)]
    pub remaining_seconds: u64,
    #[serde(default)]
    pub received_at: i64,
}

impl Offer {
    /// Build a pending offer from a push event.
    ///
    /// The deadline is fixed here: an explicit `expiresAt` wins, otherwise
    /// `now + slaSeconds`, otherwise `now + default_sla_seconds`.
    pub fn from_alert(event: JobAlertEvent, now_ms: i64, default_sla_seconds: u64) -> Self {
        let deadline = event
            .expires_at
            .as_ref()
            .and_then(|e| e.epoch_millis())
            .unwrap_or_else(|| {
                let sla = event.sla_seconds.unwrap_or(default_sla_seconds);
                now_ms.saturating_add((sla as i64).saturating_mul(1000))
            });

        let mut offer = Self {
            job_id: event.job_id,
            attempt_index: event.attempt_index,
            issue: event.issue,
            eta: event.eta,
            customer_name: event.customer_name,
            customer_phone: event.customer_phone,
            vehicle_type: event.vehicle_type,
            deadline,
            status: OfferStatus::Pending,
            remaining_seconds: 0,
            received_at: now_ms,
        };
        offer.refresh(now_ms);
        offer
    }

    pub fn key(&self) -> OfferKey {
        OfferKey::new(self.job_id.clone(), self.attempt_index)
    }

    pub fn matches(&self, key: &OfferKey) -> bool {
        self.attempt_index == key.attempt_index && self.job_id == key.job_id
    }

    /// Absolute expiry in epoch milliseconds. Set once at ingestion.
    pub fn deadline(&self) -> i64 {
        self.deadline
    }

    /// `max(0, ceil((deadline - now) / 1000))`
    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        let left = self.deadline.saturating_sub(now_ms);
        if left <= 0 {
            0
        } else {
            ((left + 999) / 1000) as u64
        }
    }

    /// Recompute the derived countdown and return it.
    pub fn refresh(&mut self, now_ms: i64) -> u64 {
        self.remaining_seconds = self.remaining_at(now_ms);
        self.remaining_seconds
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_at(now_ms) == 0
    }

    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }
}
