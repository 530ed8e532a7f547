mod aggregator;
mod context;
mod enrich;
mod lister;
mod remediate;
mod router;
mod runner;
mod tracker;

pub use aggregator::Aggregator;
pub use context::{SharedQueue, SweepContext};
pub use enrich::{EnrichmentPool, enrich_record};
pub use lister::{Lister, ScanStats};
pub use remediate::{RemediationPool, remediate_record};
pub use router::route;
pub use runner::SweepRunner;
pub use tracker::{CompletionTracker, Completion, ScanGuard};
