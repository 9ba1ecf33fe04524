//! The twelve-state lifecycle of a solver instance.
//!
//! Every public operation of [`crate::Solver`] declares the set of stages in which it is legal;
//! calling it outside that set fails with [`crate::results::Error::InvalidCall`] and leaves the
//! stage unchanged.

use crate::results::Error;
use crate::results::GourdResult;

/// The lifecycle stage of a solver instance.
///
/// The transition graph is fixed:
/// ```text
/// Init -> Problem -> Transforming -> Transformed
///      -> InitPresolve -> Presolving -> ExitPresolve -> Presolved
///      -> InitSolve -> Solving -> Solved -> ExitSolve -> FreeTrans -> Problem|Free
/// ```
/// A restart collapses `Solving -> ExitSolve -> FreeTrans -> Transformed` without returning to
/// `Problem`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Stage {
    /// The instance exists but no problem has been created.
    #[default]
    Init,
    /// The original problem is being built.
    Problem,
    /// The original problem is being copied into its transformed twin.
    Transforming,
    /// The transformed problem exists and can be modified.
    Transformed,
    /// Presolving is being initialised.
    InitPresolve,
    /// Presolving rounds are running.
    Presolving,
    /// Presolving is being finalised.
    ExitPresolve,
    /// The problem is presolved and ready for the search.
    Presolved,
    /// The search data structures are being initialised.
    InitSolve,
    /// The branch-and-bound search is running.
    Solving,
    /// The search has concluded.
    Solved,
    /// The search data structures are being torn down.
    ExitSolve,
    /// The transformed problem is being discarded.
    FreeTrans,
    /// The instance is deallocated and unusable.
    Free,
}

impl Stage {
    /// Whether the transformed problem exists in this stage.
    pub fn has_transformed_problem(self) -> bool {
        matches!(
            self,
            Stage::Transforming
                | Stage::Transformed
                | Stage::InitPresolve
                | Stage::Presolving
                | Stage::ExitPresolve
                | Stage::Presolved
                | Stage::InitSolve
                | Stage::Solving
                | Stage::Solved
                | Stage::ExitSolve
        )
    }

    /// Whether plugins may still be registered.
    pub fn allows_plugin_registration(self) -> bool {
        matches!(self, Stage::Init | Stage::Problem)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Guards the stage preconditions of public operations.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StageMachine {
    stage: Stage,
}

impl StageMachine {
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Fails with [`Error::InvalidCall`] unless the current stage is in `legal`.
    pub(crate) fn require(&self, operation: &'static str, legal: &[Stage]) -> GourdResult<()> {
        if legal.contains(&self.stage) {
            Ok(())
        } else {
            Err(Error::InvalidCall {
                operation,
                stage: self.stage,
            })
        }
    }

    /// Performs a transition along the fixed graph.
    ///
    /// Transitions are only initiated from inside the driver, so an illegal edge is a programming
    /// error rather than a user error.
    pub(crate) fn advance(&mut self, to: Stage) {
        let legal = matches!(
            (self.stage, to),
            (Stage::Init, Stage::Problem)
                | (Stage::Problem, Stage::Transforming)
                | (Stage::Transforming, Stage::Transformed)
                | (Stage::Transformed, Stage::InitPresolve)
                | (Stage::InitPresolve, Stage::Presolving)
                | (Stage::Presolving, Stage::ExitPresolve)
                | (Stage::ExitPresolve, Stage::Presolved)
                | (Stage::Presolved, Stage::InitSolve)
                | (Stage::InitSolve, Stage::Solving)
                | (Stage::Solving, Stage::Solved)
                | (Stage::Solving, Stage::ExitSolve)
                | (Stage::Solved, Stage::ExitSolve)
                | (Stage::ExitSolve, Stage::FreeTrans)
                | (Stage::FreeTrans, Stage::Problem)
                | (Stage::FreeTrans, Stage::Transformed)
                | (Stage::Problem, Stage::Free)
                | (Stage::Init, Stage::Free)
        );
        gourd_assert_simple!(legal, "illegal stage transition {:?} -> {to:?}", self.stage);

        self.stage = to;
    }
}

use crate::gourd_assert_simple;
