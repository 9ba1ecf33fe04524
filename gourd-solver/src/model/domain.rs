use super::ConsId;
use super::VarId;
use super::Variable;
use crate::basic_types::Trail;
use crate::containers::KeyedVec;
use crate::gourd_assert_moderate;
use crate::num::Tolerances;

/// Which of the two bounds of a variable an event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundType {
    Lower,
    Upper,
}

/// Why a local bound was changed.
///
/// Branching decisions are resolved no further during conflict analysis; inferences carry the
/// responsible plugin so its `resolve_propagation` callback can be asked for the premises.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundReason {
    /// An unconditional change (branching decision or probing assumption).
    Branching,
    /// Deduced by a constraint of the given id.
    ConsInference(ConsId),
    /// Deduced by the propagator plugin of the given name.
    PropInference(String),
}

/// One reversible local-bound change.
#[derive(Clone, Debug)]
pub struct BoundEvent {
    pub var: VarId,
    pub bound: BoundType,
    pub old: f64,
    pub new: f64,
    pub reason: BoundReason,
    /// Trail frame (= depth level) the change was recorded in.
    pub frame: usize,
}

/// Outcome of a bound-tightening request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TightenOutcome {
    /// The bound was changed.
    Tightened,
    /// The requested bound was not strictly tighter; nothing happened.
    Unchanged,
    /// The change empties the domain; it was recorded for conflict analysis, and the caller
    /// must cut off the current node (backtracking reverts the change).
    Infeasible,
}

/// The local-bound state of the transformed problem together with the trail that makes every
/// change reversible.
///
/// Trail frames correspond to depth levels of the active branch-and-bound path (and to probing
/// nodes while probing is active); backtracking to a frame restores every local bound to its
/// state at that depth.
#[derive(Clone, Debug, Default)]
pub struct DomainState {
    trail: Trail<BoundEvent>,
}

impl DomainState {
    pub fn push_frame(&mut self) {
        self.trail.push_frame();
    }

    pub fn current_frame(&self) -> usize {
        self.trail.current_frame()
    }

    /// Undoes all bound changes above the given frame.
    pub fn backtrack_to(&mut self, frame: usize, vars: &mut KeyedVec<VarId, Variable>) {
        for event in self.trail.backtrack_to(frame) {
            let var = &mut vars[event.var];
            match event.bound {
                BoundType::Lower => {
                    gourd_assert_moderate!(var.lb_local == event.new);
                    var.lb_local = event.old;
                }
                BoundType::Upper => {
                    gourd_assert_moderate!(var.ub_local == event.new);
                    var.ub_local = event.old;
                }
            }
        }
    }

    /// The whole chronological record of the current path.
    pub fn events(&self) -> &[BoundEvent] {
        &self.trail
    }

    /// The events recorded at the given frame.
    pub fn events_at_frame(&self, frame: usize) -> &[BoundEvent] {
        self.trail.entries_at_frame(frame)
    }

    /// Unconditionally sets the local lower bound (a branching decision in conflict analysis).
    pub fn chg_lb_local(
        &mut self,
        vars: &mut KeyedVec<VarId, Variable>,
        var: VarId,
        new_lb: f64,
        reason: BoundReason,
    ) {
        let old = vars[var].lb_local;
        if old == new_lb {
            return;
        }
        self.trail.push(BoundEvent {
            var,
            bound: BoundType::Lower,
            old,
            new: new_lb,
            reason,
            frame: self.trail.current_frame(),
        });
        vars[var].lb_local = new_lb;
    }

    /// Unconditionally sets the local upper bound.
    pub fn chg_ub_local(
        &mut self,
        vars: &mut KeyedVec<VarId, Variable>,
        var: VarId,
        new_ub: f64,
        reason: BoundReason,
    ) {
        let old = vars[var].ub_local;
        if old == new_ub {
            return;
        }
        self.trail.push(BoundEvent {
            var,
            bound: BoundType::Upper,
            old,
            new: new_ub,
            reason,
            frame: self.trail.current_frame(),
        });
        vars[var].ub_local = new_ub;
    }

    /// Tightens the local lower bound if the adjusted value is strictly tighter.
    pub fn tighten_lb_local(
        &mut self,
        vars: &mut KeyedVec<VarId, Variable>,
        tol: &Tolerances,
        var: VarId,
        new_lb: f64,
        reason: BoundReason,
    ) -> TightenOutcome {
        let new_lb = vars[var].adjusted_lb(tol, new_lb);
        if !tol.is_gt(new_lb, vars[var].lb_local) {
            return TightenOutcome::Unchanged;
        }
        let infeasible = tol.is_feas_lt(vars[var].ub_local, new_lb);
        self.chg_lb_local(vars, var, new_lb, reason);
        if infeasible {
            TightenOutcome::Infeasible
        } else {
            TightenOutcome::Tightened
        }
    }

    /// Tightens the local upper bound if the adjusted value is strictly tighter.
    pub fn tighten_ub_local(
        &mut self,
        vars: &mut KeyedVec<VarId, Variable>,
        tol: &Tolerances,
        var: VarId,
        new_ub: f64,
        reason: BoundReason,
    ) -> TightenOutcome {
        let new_ub = vars[var].adjusted_ub(tol, new_ub);
        if !tol.is_lt(new_ub, vars[var].ub_local) {
            return TightenOutcome::Unchanged;
        }
        let infeasible = tol.is_feas_lt(new_ub, vars[var].lb_local);
        self.chg_ub_local(vars, var, new_ub, reason);
        if infeasible {
            TightenOutcome::Infeasible
        } else {
            TightenOutcome::Tightened
        }
    }

    /// The most recent event that produced the current bound of the variable, if any.
    pub fn producing_event(&self, var: VarId, bound: BoundType) -> Option<&BoundEvent> {
        self.trail
            .iter()
            .rev()
            .find(|event| event.var == var && event.bound == bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarType;

    fn setup() -> (DomainState, KeyedVec<VarId, Variable>, VarId, Tolerances) {
        let mut vars = KeyedVec::default();
        let x = vars.push(Variable::new("x", 0.0, 10.0, 1.0, VarType::Integer));
        (DomainState::default(), vars, x, Tolerances::default())
    }

    #[test]
    fn non_improving_tightening_is_a_no_op() {
        let (mut domain, mut vars, x, tol) = setup();

        let outcome = domain.tighten_lb_local(&mut vars, &tol, x, -5.0, BoundReason::Branching);
        assert_eq!(TightenOutcome::Unchanged, outcome);
        assert_eq!(0.0, vars[x].lb_local);
        assert!(domain.events().is_empty());
    }

    #[test]
    fn tightening_rounds_discrete_bounds() {
        let (mut domain, mut vars, x, tol) = setup();

        let outcome = domain.tighten_lb_local(&mut vars, &tol, x, 2.3, BoundReason::Branching);
        assert_eq!(TightenOutcome::Tightened, outcome);
        assert_eq!(3.0, vars[x].lb_local);
    }

    #[test]
    fn crossing_bounds_is_reported_infeasible_but_recorded() {
        let (mut domain, mut vars, x, tol) = setup();

        let _ = domain.tighten_ub_local(&mut vars, &tol, x, 4.0, BoundReason::Branching);
        let outcome = domain.tighten_lb_local(&mut vars, &tol, x, 6.0, BoundReason::Branching);
        assert_eq!(TightenOutcome::Infeasible, outcome);
        assert_eq!(2, domain.events().len());
    }

    #[test]
    fn backtracking_restores_bounds_bitwise() {
        let (mut domain, mut vars, x, tol) = setup();

        domain.push_frame();
        let _ = domain.tighten_lb_local(&mut vars, &tol, x, 5.0, BoundReason::Branching);
        domain.push_frame();
        let _ = domain.tighten_ub_local(&mut vars, &tol, x, 7.0, BoundReason::Branching);

        domain.backtrack_to(0, &mut vars);
        assert_eq!(0.0, vars[x].lb_local);
        assert_eq!(10.0, vars[x].ub_local);
    }

    #[test]
    fn producing_event_finds_the_latest_change() {
        let (mut domain, mut vars, x, tol) = setup();

        let _ = domain.tighten_lb_local(&mut vars, &tol, x, 2.0, BoundReason::Branching);
        let _ = domain.tighten_lb_local(
            &mut vars,
            &tol,
            x,
            4.0,
            BoundReason::PropInference("probe".into()),
        );

        let event = domain.producing_event(x, BoundType::Lower).unwrap();
        assert_eq!(4.0, event.new);
        assert_eq!(BoundReason::PropInference("probe".into()), event.reason);
    }
}
