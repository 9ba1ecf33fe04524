//! Error codes and solve statuses.
//!
//! The two are deliberately separate axes: an operation either succeeds or fails with an
//! [`Error`], while limit conditions (time, nodes, gap, solutions) and the mathematical outcome
//! of a solve are reported through [`SolveStatus`]. Hitting a limit is not an error.

use thiserror::Error;

use crate::engine::stage::Stage;

/// Result type used throughout the solver.
pub type GourdResult<T> = Result<T, Error>;

/// Errors that can occur when operating the solver.
#[derive(Error, Debug)]
pub enum Error {
    /// The operation is not legal in the current lifecycle stage; the stage is unchanged.
    #[error("operation '{operation}' is not legal in stage {stage:?}")]
    InvalidCall {
        operation: &'static str,
        stage: Stage,
    },

    /// No problem has been created yet.
    #[error("no problem exists")]
    NoProblem,

    /// The LP oracle reported a numerical failure.
    #[error("LP solve failed: {0}")]
    LpError(String),

    /// Input data is out of range, NaN, or otherwise malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A plugin callback returned a result it is not allowed to return.
    #[error("invalid result from plugin '{plugin}': {reason}")]
    InvalidResult { plugin: String, reason: String },

    /// A plugin with the given name is not registered.
    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    /// A parameter with the given name is not declared.
    #[error("unknown parameter '{0}'")]
    ParameterUnknown(String),

    /// The parameter exists but has a different type.
    #[error("parameter '{0}' has the wrong type")]
    ParameterWrongType(String),

    /// The value violates the declared bounds of the parameter.
    #[error("invalid value for parameter '{name}': {value}")]
    ParameterWrongVal { name: String, value: String },

    /// A name that must be unique is already taken.
    #[error("key '{0}' already exists")]
    KeyAlreadyExisting(String),

    /// The branch-and-bound tree reached its maximal depth.
    #[error("maximal branching depth level exceeded")]
    MaxDepthLevel,

    /// Branching was requested but no branching candidate exists.
    #[error("no branching could be created")]
    BranchError,

    /// Reading from a file failed.
    #[error("read error: {0}")]
    ReadError(String),

    /// Writing to a file failed.
    #[error("write error: {0}")]
    WriteError(String),

    /// The given file does not exist.
    #[error("file not found: {0}")]
    NoFile(String),

    /// The output file could not be created.
    #[error("cannot create file: {0}")]
    FileCreateError(String),
}

/// The outcome of the solving process, orthogonal to [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SolveStatus {
    /// The solving status is not yet known.
    #[default]
    Unknown,
    /// The user interrupted the solving process.
    UserInterrupt,
    /// The node limit was reached.
    NodeLimit,
    /// The total-node limit (including restarts) was reached.
    TotalNodeLimit,
    /// The stalling-node limit (nodes since last incumbent) was reached.
    StallNodeLimit,
    /// The time limit was reached.
    TimeLimit,
    /// The memory limit was reached.
    MemLimit,
    /// The gap limit was reached.
    GapLimit,
    /// The solution-count limit was reached.
    SolLimit,
    /// The improving-solution-count limit was reached.
    BestSolLimit,
    /// The problem was solved to proven optimality.
    Optimal,
    /// The problem was proven infeasible.
    Infeasible,
    /// The problem was proven unbounded.
    Unbounded,
    /// The problem is either infeasible or unbounded.
    InfeasibleOrUnbounded,
}

impl SolveStatus {
    /// Whether the status corresponds to a limit condition rather than a conclusion.
    pub fn is_limit(self) -> bool {
        matches!(
            self,
            SolveStatus::NodeLimit
                | SolveStatus::TotalNodeLimit
                | SolveStatus::StallNodeLimit
                | SolveStatus::TimeLimit
                | SolveStatus::MemLimit
                | SolveStatus::GapLimit
                | SolveStatus::SolLimit
                | SolveStatus::BestSolLimit
        )
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SolveStatus::Unknown => "unknown",
            SolveStatus::UserInterrupt => "user interrupt",
            SolveStatus::NodeLimit => "node limit reached",
            SolveStatus::TotalNodeLimit => "total node limit reached",
            SolveStatus::StallNodeLimit => "stall node limit reached",
            SolveStatus::TimeLimit => "time limit reached",
            SolveStatus::MemLimit => "memory limit reached",
            SolveStatus::GapLimit => "gap limit reached",
            SolveStatus::SolLimit => "solution limit reached",
            SolveStatus::BestSolLimit => "solution improvement limit reached",
            SolveStatus::Optimal => "optimal solution found",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::InfeasibleOrUnbounded => "infeasible or unbounded",
        };
        write!(f, "{text}")
    }
}
