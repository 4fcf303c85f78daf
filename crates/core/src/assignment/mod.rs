pub mod engine;
pub mod states;

pub use engine::{AssignmentEngine, AssignmentTransitionError};
pub use states::{AssignmentAction, AssignmentEvent, ReasonInput, TransitionOutcome};
