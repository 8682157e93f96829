pub mod memory;
pub mod risk;
pub mod store;
pub mod summary;

pub use memory::MemoryStore;
pub use risk::{RiskKind, RISK_LIMIT, STAGNATION_DAYS};
pub use store::{ProjectStore, RiskStore, UserStore};
pub use summary::summarize;
