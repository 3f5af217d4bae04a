// src/analysis/mod.rs
// Signal-to-decision stages, in pipeline order.
pub mod artifact;
pub mod batcher;
pub mod features;
pub mod classifier;
pub mod aggregate;
pub mod trend;
pub mod ledger;
pub use aggregate::{aggregate, BatchResult, ConfidenceMode, EegStats};
pub use artifact::{ArtifactFilter, ArtifactSettings, FilterStats};
pub use batcher::{Batch, Batcher};
pub use classifier::{Classifier, EmotionClassifier};
pub use ledger::{SessionCounters, SessionLedger, SnapshotHandle};
pub use trend::TrendTracker;
