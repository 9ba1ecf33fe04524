//! The problem model: variables in their original/transformed duality, constraints with their
//! handler-owned payloads, and the local-bound state with its backtracking trail.

mod constraint;
mod domain;
mod problem;
mod variable;

pub use constraint::Cons;
pub use constraint::ConsData;
pub use constraint::ConsFlags;
pub use constraint::ConsId;
pub use domain::BoundEvent;
pub use domain::BoundReason;
pub use domain::BoundType;
pub use domain::DomainState;
pub use domain::TightenOutcome;
pub use problem::ObjSense;
pub use problem::Problem;
pub use variable::BranchDirection;
pub use variable::VarId;
pub use variable::VarStatus;
pub use variable::VarType;
pub use variable::Variable;
