pub mod traits;

pub use traits::{DecisionListener, DialogError, DialogShower, FallbackPrompt};
