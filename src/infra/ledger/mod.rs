//! Reference ledger host: versioned state, block journal and event delivery.

pub mod events;
pub mod journal;
pub mod memory;

pub use events::{CommittedEvent, DEFAULT_EVENT_CAPACITY, EventQueue};
pub use memory::{CommitReceipt, MemoryLedger, Transaction};
