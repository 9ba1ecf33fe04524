//! Conflict analysis.
//!
//! When propagation or an LP proves the focus node infeasible, the responsible bounds are
//! collected and resolved backwards over the bound-change trail until the first unique
//! implication point of the conflicting depth level is reached. The resulting set of bounds
//! is handed to the conflict handlers, which turn it into globally reusable constraints.

use crate::containers::KeyedVec;
use crate::model::BoundEvent;
use crate::model::BoundReason;
use crate::model::BoundType;
use crate::model::DomainState;
use crate::model::VarId;
use crate::model::Variable;
use crate::results::Error;
use crate::results::GourdResult;

/// One bound participating in a conflict: "`var` having this bound contributed to the
/// infeasibility".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConflictBound {
    pub var: VarId,
    pub bound: BoundType,
    pub value: f64,
}

/// The result of a successful analysis: the negation of these bounds is valid from
/// `validdepth` on.
#[derive(Clone, Debug)]
pub struct ConflictSet {
    pub bounds: Vec<ConflictBound>,
    pub validdepth: usize,
    /// Depth level the conflict occurred at.
    pub conflict_depth: usize,
}

/// Asks the plugin that inferred a bound change for its premises.
///
/// `Ok(None)` means the plugin cannot reconstruct the inference; the analysis is then
/// abandoned without a conflict set.
pub type Resolver<'a> = dyn FnMut(&BoundEvent) -> GourdResult<Option<Vec<ConflictBound>>> + 'a;

/// The working state of one conflict analysis pass.
#[derive(Debug, Default)]
pub struct ConflictAnalysis {
    initialized: bool,
    queue: Vec<ConflictBound>,
    pub n_calls: u64,
    pub n_conflict_sets: u64,
}

impl ConflictAnalysis {
    /// Analysis is pointless at the root: there are no decisions to learn from.
    pub fn is_applicable(&self, domain: &DomainState) -> bool {
        domain.current_frame() > 0
    }

    /// Starts collecting conflicting bounds; any previous collection is discarded.
    pub fn init(&mut self, domain: &DomainState) -> GourdResult<()> {
        if !self.is_applicable(domain) {
            return Err(Error::InvalidCall {
                operation: "init_conflict_analysis",
                stage: crate::Stage::Solving,
            });
        }
        self.queue.clear();
        self.initialized = true;
        self.n_calls += 1;
        Ok(())
    }

    fn require_initialized(&self, operation: &'static str) -> GourdResult<()> {
        if !self.initialized {
            return Err(Error::InvalidCall {
                operation,
                stage: crate::Stage::Solving,
            });
        }
        Ok(())
    }

    /// Adds the current local lower bound of the variable to the conflict.
    pub fn add_conflict_lb(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
    ) -> GourdResult<()> {
        self.add_conflict_lb_relaxed(vars, var, vars[var].lb_local)
    }

    /// Adds a (possibly weaker) lower bound of the variable to the conflict. Relaxed bounds
    /// produce more general conflict constraints.
    pub fn add_conflict_lb_relaxed(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
        value: f64,
    ) -> GourdResult<()> {
        self.require_initialized("add_conflict_lb")?;
        let value = value.min(vars[var].lb_local);
        self.push_bound(ConflictBound {
            var,
            bound: BoundType::Lower,
            value,
        });
        Ok(())
    }

    /// Adds the current local upper bound of the variable to the conflict.
    pub fn add_conflict_ub(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
    ) -> GourdResult<()> {
        self.add_conflict_ub_relaxed(vars, var, vars[var].ub_local)
    }

    pub fn add_conflict_ub_relaxed(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
        value: f64,
    ) -> GourdResult<()> {
        self.require_initialized("add_conflict_ub")?;
        let value = value.max(vars[var].ub_local);
        self.push_bound(ConflictBound {
            var,
            bound: BoundType::Upper,
            value,
        });
        Ok(())
    }

    /// Adds whichever bound of the variable was given.
    pub fn add_conflict_bd(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
        bound: BoundType,
    ) -> GourdResult<()> {
        match bound {
            BoundType::Lower => self.add_conflict_lb(vars, var),
            BoundType::Upper => self.add_conflict_ub(vars, var),
        }
    }

    /// Adds the fixed side of a binary variable to the conflict.
    pub fn add_conflict_binvar(
        &mut self,
        vars: &KeyedVec<VarId, Variable>,
        var: VarId,
    ) -> GourdResult<()> {
        self.require_initialized("add_conflict_binvar")?;
        if vars[var].lb_local > 0.5 {
            self.add_conflict_lb(vars, var)
        } else if vars[var].ub_local < 0.5 {
            self.add_conflict_ub(vars, var)
        } else {
            Err(Error::InvalidData(format!(
                "binary variable {} is not fixed in the conflict",
                vars[var].name
            )))
        }
    }

    /// Keeps only the tightest queued bound per variable and side.
    fn push_bound(&mut self, bound: ConflictBound) {
        if let Some(existing) = self
            .queue
            .iter_mut()
            .find(|entry| entry.var == bound.var && entry.bound == bound.bound)
        {
            existing.value = match bound.bound {
                BoundType::Lower => existing.value.max(bound.value),
                BoundType::Upper => existing.value.min(bound.value),
            };
        } else {
            self.queue.push(bound);
        }
    }

    /// Trail position of the event that produced the queued bound, or `None` if the bound
    /// already holds globally.
    fn producing_position(&self, domain: &DomainState, bound: &ConflictBound) -> Option<usize> {
        domain
            .events()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, event)| {
                event.var == bound.var
                    && event.bound == bound.bound
                    && match bound.bound {
                        BoundType::Lower => event.new >= bound.value && event.old < bound.value,
                        BoundType::Upper => event.new <= bound.value && event.old > bound.value,
                    }
            })
            .map(|(pos, _)| pos)
    }

    /// Resolves the collected bounds to the first unique implication point.
    ///
    /// Returns `Ok(None)` when a plugin could not reconstruct one of its inferences.
    pub fn analyze(
        &mut self,
        domain: &DomainState,
        resolver: &mut Resolver<'_>,
        validdepth: usize,
    ) -> GourdResult<Option<ConflictSet>> {
        self.require_initialized("analyze_conflict")?;
        self.initialized = false;
        let conflict_depth = domain.current_frame();

        // Resolution terminates because every step strictly decreases the producing trail
        // position being resolved; cap it anyway.
        let max_steps = domain.events().len() + self.queue.len() + 1;
        for _ in 0..=max_steps {
            // Deepest frame among the queued bounds; globally valid bounds never resolve.
            let deepest = self
                .queue
                .iter()
                .filter_map(|bound| {
                    self.producing_position(domain, bound)
                        .map(|pos| domain.events()[pos].frame)
                })
                .max();
            let Some(deepest) = deepest else {
                // Everything holds globally: the problem is infeasible from validdepth on.
                break;
            };

            let at_deepest: Vec<usize> = self
                .queue
                .iter()
                .enumerate()
                .filter_map(|(idx, bound)| {
                    let pos = self.producing_position(domain, bound)?;
                    (domain.events()[pos].frame == deepest).then_some(idx)
                })
                .collect();
            if at_deepest.len() == 1 {
                // First UIP of the deepest contributing level reached.
                break;
            }

            // Resolve the chronologically latest bound of the deepest frame.
            let (resolve_idx, pos) = at_deepest
                .iter()
                .map(|&idx| {
                    let pos = self
                        .producing_position(domain, &self.queue[idx])
                        .unwrap_or(0);
                    (idx, pos)
                })
                .max_by_key(|&(_, pos)| pos)
                .ok_or_else(|| Error::InvalidData("empty conflict queue".into()))?;
            let event = &domain.events()[pos];
            if matches!(event.reason, BoundReason::Branching) {
                // Several branching bounds at one frame (probing assumptions); they all stay.
                break;
            }
            let Some(premises) = resolver(event)? else {
                return Ok(None);
            };
            let _ = self.queue.swap_remove(resolve_idx);
            for premise in premises {
                self.push_bound(premise);
            }
        }

        if self.queue.is_empty() {
            return Ok(None);
        }
        self.n_conflict_sets += 1;
        Ok(Some(ConflictSet {
            bounds: std::mem::take(&mut self.queue),
            validdepth,
            conflict_depth,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarType;
    use crate::num::Tolerances;

    fn binary(name: &str) -> Variable {
        Variable::new(name, 0.0, 1.0, 0.0, VarType::Binary)
    }

    struct Setup {
        domain: DomainState,
        vars: KeyedVec<VarId, Variable>,
        x: VarId,
        y: VarId,
        z: VarId,
        w: VarId,
    }

    /// Frame 1: branch x >= 1, infer y >= 1 from x. Frame 2: branch z >= 1, infer w >= 1
    /// from z and y.
    fn two_level_conflict() -> Setup {
        let tol = Tolerances::default();
        let mut vars = KeyedVec::default();
        let x = vars.push(binary("x"));
        let y = vars.push(binary("y"));
        let z = vars.push(binary("z"));
        let w = vars.push(binary("w"));
        let mut domain = DomainState::default();

        domain.push_frame();
        let _ = domain.tighten_lb_local(&mut vars, &tol, x, 1.0, BoundReason::Branching);
        let _ = domain.tighten_lb_local(
            &mut vars,
            &tol,
            y,
            1.0,
            BoundReason::PropInference("imply".into()),
        );
        domain.push_frame();
        let _ = domain.tighten_lb_local(&mut vars, &tol, z, 1.0, BoundReason::Branching);
        let _ = domain.tighten_lb_local(
            &mut vars,
            &tol,
            w,
            1.0,
            BoundReason::PropInference("imply".into()),
        );

        Setup {
            domain,
            vars,
            x,
            y,
            z,
            w,
        }
    }

    #[test]
    fn not_applicable_at_the_root() {
        let analysis = ConflictAnalysis::default();
        let domain = DomainState::default();
        assert!(!analysis.is_applicable(&domain));
    }

    #[test]
    fn adding_bounds_requires_initialization() {
        let mut analysis = ConflictAnalysis::default();
        let setup = two_level_conflict();
        assert!(analysis.add_conflict_lb(&setup.vars, setup.x).is_err());
    }

    #[test]
    fn resolution_stops_at_the_first_uip() {
        let setup = two_level_conflict();
        let mut analysis = ConflictAnalysis::default();
        analysis.init(&setup.domain).unwrap();
        analysis.add_conflict_lb(&setup.vars, setup.w).unwrap();
        analysis.add_conflict_lb(&setup.vars, setup.z).unwrap();

        let (y, z, x) = (setup.y, setup.z, setup.x);
        let mut resolver = |event: &BoundEvent| {
            // The inference of w used z and y; the inference of y used x.
            let premises = if event.var == setup.w {
                vec![
                    ConflictBound {
                        var: z,
                        bound: BoundType::Lower,
                        value: 1.0,
                    },
                    ConflictBound {
                        var: y,
                        bound: BoundType::Lower,
                        value: 1.0,
                    },
                ]
            } else {
                vec![ConflictBound {
                    var: x,
                    bound: BoundType::Lower,
                    value: 1.0,
                }]
            };
            Ok(Some(premises))
        };

        let set = analysis
            .analyze(&setup.domain, &mut resolver, 0)
            .unwrap()
            .unwrap();

        // w resolves into {z, y}; z then is the lone frame-2 bound, so resolution stops.
        assert_eq!(2, set.bounds.len());
        assert!(set
            .bounds
            .iter()
            .any(|b| b.var == setup.z && b.bound == BoundType::Lower));
        assert!(set
            .bounds
            .iter()
            .any(|b| b.var == setup.y && b.bound == BoundType::Lower));
        assert_eq!(2, set.conflict_depth);
    }

    #[test]
    fn unresolvable_inferences_abandon_the_analysis() {
        let setup = two_level_conflict();
        let mut analysis = ConflictAnalysis::default();
        analysis.init(&setup.domain).unwrap();
        analysis.add_conflict_lb(&setup.vars, setup.w).unwrap();
        analysis.add_conflict_lb(&setup.vars, setup.z).unwrap();

        let mut resolver = |_: &BoundEvent| Ok(None);
        let set = analysis
            .analyze(&setup.domain, &mut resolver, 0)
            .unwrap();
        assert!(set.is_none());
    }

    #[test]
    fn duplicate_bounds_keep_the_tightest_value() {
        let setup = two_level_conflict();
        let mut analysis = ConflictAnalysis::default();
        analysis.init(&setup.domain).unwrap();
        analysis
            .add_conflict_lb_relaxed(&setup.vars, setup.w, 0.5)
            .unwrap();
        analysis.add_conflict_lb(&setup.vars, setup.w).unwrap();
        assert_eq!(1, analysis.queue.len());
        assert_eq!(1.0, analysis.queue[0].value);
    }

    #[test]
    fn binvar_requires_a_fixing() {
        let setup = two_level_conflict();
        let mut analysis = ConflictAnalysis::default();
        analysis.init(&setup.domain).unwrap();
        // w is fixed to 1, so the lower bound is added; an unfixed variable errors.
        analysis.add_conflict_binvar(&setup.vars, setup.w).unwrap();
        let mut vars = KeyedVec::default();
        let free = vars.push(binary("free"));
        assert!(analysis.add_conflict_binvar(&vars, free).is_err());
    }
}
