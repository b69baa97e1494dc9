//! Application services: the I/O around the pure calculators and the order
//! state machine in `milletchain-core`.

pub mod orders;
pub mod scoring;

pub use orders::{OrderWorkflow, StatusUpdate, UpdateStatusCommand};
pub use scoring::ScoringService;
