//! History events: wire records and their normalized form

mod kind;
mod normalize;
mod raw;

pub use kind::EventKind;
pub use normalize::{normalize, DataPair, LifecycleState, NormalizeError, NormalizedEvent};
pub use raw::RawHistoryEvent;
