//! Domain model (ids, envelopes, steps, states, errors).

pub mod chain;
pub mod errors;
pub mod event;
pub mod feature;
pub mod filter;
pub mod ids;
pub mod payload;
pub mod state;
pub mod step;

pub use chain::NextPayloads;
pub use errors::{ConfigurationError, ErrorKind, ValidationError};
pub use event::extract_event_records;
pub use feature::Feature;
pub use filter::ChainFilter;
pub use ids::PayloadId;
pub use payload::{MAX_PAYLOAD_LENGTH, PayloadError, ProcessPayload, TransportPayload, upload_payload};
pub use state::{StateEnum, StateItem, WorkflowEvent};
pub use step::ProcessStep;
