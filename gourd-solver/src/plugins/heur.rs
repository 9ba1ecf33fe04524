//! The primal heuristic interface.

use enumset::EnumSet;
use enumset::EnumSetType;

use super::ctx::PluginCtx;
use super::registry::Named;
use crate::primal::Solution;
use crate::results::GourdResult;

/// When during node processing a heuristic wants to run.
#[derive(EnumSetType, Debug)]
pub enum HeurTiming {
    BeforeNode,
    DuringLpLoop,
    AfterLpLoop,
    AfterLpNode,
    AfterPseudoNode,
    AfterNode,
}

/// Outcome of a heuristic call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeurResult {
    DidNotRun,
    DidNotFind,
    FoundSol,
}

pub trait Heuristic: Named {
    fn timing(&self) -> EnumSet<HeurTiming>;

    /// Every how many depth levels the heuristic runs (-1 disables, 0 root only).
    fn freq(&self) -> i32 {
        1
    }

    /// Offset added to the depth before the frequency check.
    fn freq_offset(&self) -> i32 {
        0
    }

    /// Whether the heuristic wants to run at this depth.
    fn should_run(&self, depth: usize) -> bool {
        let freq = self.freq();
        match freq {
            -1 => false,
            0 => depth == 0,
            _ => (depth as i32 + self.freq_offset()) % freq == 0,
        }
    }

    /// Runs the heuristic; candidate solutions are returned in transformed space and checked
    /// by the driver before entering the pool.
    fn exec(&mut self, ctx: &mut PluginCtx<'_>)
        -> GourdResult<(HeurResult, Vec<Solution>)>;
}
