use crate::models::{Offer, OfferKey, OfferStatus};
use dispatch_shared::events::{Decision, JobAlertEvent, JobResponse};
use std::collections::VecDeque;

/// Result of feeding one `job_alert` payload into the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted(OfferKey),
    Duplicate(OfferKey),
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub expired: Vec<OfferKey>,
    pub pending: usize,
}

/// Where an unacknowledged offer ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Back to pending with a refreshed countdown.
    Pending,
    /// The deadline passed while the decision was in flight; the offer was dropped.
    Expired,
    /// Not in the queue or not submitting.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub kept: usize,
    pub dropped: usize,
}

/// The offer queue state machine. No I/O and no clock: every time-dependent
/// call takes `now_ms` so it can be driven deterministically.
///
/// Most recent offer first. The queue is expected to hold a handful of entries,
/// so lookups are linear.
#[derive(Debug, Default)]
pub struct OfferQueue {
    offers: VecDeque<Offer>,
    default_sla_seconds: u64,
}

impl OfferQueue {
    pub fn new(default_sla_seconds: u64) -> Self {
        Self {
            offers: VecDeque::new(),
            default_sla_seconds,
        }
    }

    /// Parse a raw payload and ingest it. Payloads without a usable `jobId` never enter the queue.
    pub fn ingest_payload(&mut self, payload: &serde_json::Value, now_ms: i64) -> IngestOutcome {
        match serde_json::from_value::<JobAlertEvent>(payload.clone()) {
            Ok(event) => self.ingest(event, now_ms),
            Err(e) => IngestOutcome::Malformed(e.to_string()),
        }
    }

    pub fn ingest(&mut self, event: JobAlertEvent, now_ms: i64) -> IngestOutcome {
        let key = OfferKey::new(event.job_id.clone(), event.attempt_index);
        if self.position(&key).is_some() {
            return IngestOutcome::Duplicate(key);
        }

        let offer = Offer::from_alert(event, now_ms, self.default_sla_seconds);
        self.offers.push_front(offer);
        IngestOutcome::Inserted(key)
    }

    /// Remove an offer whatever its status. Returns the removed offer, if any.
    pub fn expire(&mut self, key: &OfferKey) -> Option<Offer> {
        let idx = self.position(key)?;
        self.offers.remove(idx)
    }

    /// Refresh every pending countdown and drop the ones that reached zero.
    ///
    /// Offers in `Submitting` keep their slot until the decision completes or is reverted.
    pub fn tick(&mut self, now_ms: i64) -> TickReport {
        let mut expired = Vec::new();

        self.offers.retain_mut(|offer| {
            if offer.status != OfferStatus::Pending {
                return true;
            }
            if offer.refresh(now_ms) == 0 {
                expired.push(offer.key());
                false
            } else {
                true
            }
        });

        TickReport {
            expired,
            pending: self.pending_count(),
        }
    }

    /// Transition: Pending → Submitting. Produces the `job_response` payload to send.
    pub fn begin_decision(
        &mut self,
        key: &OfferKey,
        decision: Decision,
        now_ms: i64,
    ) -> Result<JobResponse, QueueError> {
        let offer = self.get_mut(key)?;

        if offer.status != OfferStatus::Pending {
            return Err(QueueError::NotPending {
                key: key.to_string(),
                status: offer.status,
            });
        }
        if offer.is_expired(now_ms) {
            return Err(QueueError::Expired(key.to_string()));
        }

        offer.status = OfferStatus::Submitting;
        Ok(JobResponse {
            job_id: offer.job_id.clone(),
            attempt_index: offer.attempt_index,
            response: decision,
        })
    }

    /// Transition: Submitting → Resolved, and drop the offer from the queue.
    pub fn complete_decision(&mut self, key: &OfferKey) -> Option<Offer> {
        let mut offer = self.expire(key)?;
        offer.status = OfferStatus::Resolved;
        Some(offer)
    }

    /// Transition: Submitting → Pending after an unacknowledged submission,
    /// or out of the queue if the deadline passed meanwhile.
    pub fn revert_decision(&mut self, key: &OfferKey, now_ms: i64) -> RevertOutcome {
        let Some(idx) = self.position(key) else {
            return RevertOutcome::Missing;
        };
        let offer = &mut self.offers[idx];
        if offer.status != OfferStatus::Submitting {
            return RevertOutcome::Missing;
        }

        offer.status = OfferStatus::Pending;
        if offer.refresh(now_ms) == 0 {
            self.offers.remove(idx);
            return RevertOutcome::Expired;
        }
        RevertOutcome::Pending
    }

    /// Rebuild the queue from persisted offers.
    ///
    /// Passed deadlines are dropped, in-flight submissions fall back to pending
    /// and duplicate keys keep their first (most recent) entry.
    pub fn restore(&mut self, persisted: Vec<Offer>, now_ms: i64) -> RestoreReport {
        let total = persisted.len();
        self.offers.clear();

        for mut offer in persisted {
            if offer.status == OfferStatus::Resolved || offer.is_expired(now_ms) {
                continue;
            }
            if self.position(&offer.key()).is_some() {
                continue;
            }
            offer.status = OfferStatus::Pending;
            offer.refresh(now_ms);
            self.offers.push_back(offer);
        }

        RestoreReport {
            kept: self.offers.len(),
            dropped: total - self.offers.len(),
        }
    }

    pub fn get(&self, key: &OfferKey) -> Option<&Offer> {
        self.offers.iter().find(|o| o.matches(key))
    }

    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.offers.iter()
    }

    /// Offers the mechanic can act on, most recent first.
    pub fn visible(&self) -> Vec<Offer> {
        self.offers.iter().filter(|o| o.is_pending()).cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.offers.iter().filter(|o| o.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    fn position(&self, key: &OfferKey) -> Option<usize> {
        self.offers.iter().position(|o| o.matches(key))
    }

    fn get_mut(&mut self, key: &OfferKey) -> Result<&mut Offer, QueueError> {
        self.offers
            .iter_mut()
            .find(|o| o.matches(key))
            .ok_or_else(|| QueueError::NotFound(key.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Offer not found: {0}")]
    NotFound(String),

    #[error("Offer {key} is {status:?}, not pending")]
    NotPending { key: String, status: OfferStatus },

    #[error("Offer {0} has expired")]
    Expired(String),
}
