//! Replay context: the ordered history of one run

mod store;

pub use store::HistoryStore;
