pub mod assignment;
pub mod config;
pub mod domain;
pub mod errors;

pub use assignment::{
    AssignmentAction, AssignmentEngine, AssignmentEvent, AssignmentTransitionError, ReasonInput,
    TransitionOutcome,
};
pub use domain::lead::{LeadRecord, LeadState, NewLead, Outcome, ResultCell, RowIndex};
pub use domain::session::{Operator, OperatorId, OperatorSession};
pub use domain::stats::LeadStats;
pub use errors::{ApplicationError, DomainError, InterfaceError};
