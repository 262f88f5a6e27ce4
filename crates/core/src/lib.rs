pub mod engine;
pub mod notifier;
pub mod source;

pub use engine::{ArbitrationEngine, EngineTimings};
pub use notifier::DecisionNotifier;
pub use source::{DecisionSource, SourceError};
