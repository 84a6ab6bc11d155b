//! Events emitted by the consensus orchestrator as a Thread progresses
//! through its phases, published over a broadcast [`EventBus`] for
//! transports to stream to clients (§6 "Emitted events").

pub mod bus;
pub mod types;

pub use bus::{
    EventBus, EventBusError, EventBusExt, EventBusResult, EventFilter, FilteredReceiver,
    SharedEventBus,
};
pub use types::{ConsensusEvent, EventId};
