pub mod alerts;
pub mod countdown;
pub mod feed;
pub mod models;
pub mod queue;
pub mod store;

pub use alerts::{AlertSink, NoopAlerts, Notice};
pub use countdown::{CountdownHandle, CountdownScheduler};
pub use feed::OfferFeed;
pub use models::{Offer, OfferKey, OfferStatus};
pub use queue::{IngestOutcome, OfferQueue, QueueError, RestoreReport, RevertOutcome, TickReport};
pub use store::{DecisionOutcome, OfferStore, StoreSettings, STORAGE_NAMESPACE};
