//! Event bus abstraction for saga choreography.
//!
//! Topics are append-only logs split into partitions; the partition of an
//! event is chosen from its key, so events sharing a key are delivered in
//! publication order. Every consumer group sees every event of a topic at
//! least once. A failing handler never acknowledges its event: the bus
//! retries it with backoff and, once the retry budget is spent, parks it in
//! the dead-letter list.

pub mod bus;
pub mod dead_letter;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod retry;

pub use bus::{EventBus, EventHandler, Offset};
pub use dead_letter::DeadLetter;
pub use envelope::{EventEnvelope, EventId};
pub use error::{BusError, HandlerError, Result};
pub use memory::InMemoryEventBus;
pub use retry::RetryPolicy;
