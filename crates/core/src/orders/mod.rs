pub mod lifecycle;
pub mod machine;

pub use lifecycle::{MarketplaceLifecycle, OrderLifecycle};
pub use machine::{OrderStateMachine, TransitionError, TransitionOutcome, TransitionRequest};
