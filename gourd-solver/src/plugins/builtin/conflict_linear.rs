//! Conflict handler that encodes conflict sets over binaries as linear constraints.
//!
//! A conflict set says "these bounds cannot all hold". When every participating variable is
//! binary, its negation is the set-covering row `sum(flipped literals) >= 1`, which the
//! linear handler then separates and propagates like any other constraint.

use super::linear::LinearConsData;
use crate::conflict::ConflictSet;
use crate::model::BoundType;
use crate::model::Cons;
use crate::model::ConsFlags;
use crate::plugins::ConflictHdlr;
use crate::plugins::Named;
use crate::plugins::PluginCtx;
use crate::results::GourdResult;

pub const NAME: &str = "logicor";

#[derive(Debug, Default)]
pub struct LinearConflictHdlr {
    pub n_constraints: u64,
}

impl Named for LinearConflictHdlr {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "turns binary conflict sets into covering constraints"
    }
}

impl ConflictHdlr for LinearConflictHdlr {
    fn exec(
        &mut self,
        ctx: &mut PluginCtx<'_>,
        conflict: &ConflictSet,
    ) -> GourdResult<Option<Cons>> {
        let mut terms = Vec::with_capacity(conflict.bounds.len());
        let mut lhs = 1.0;
        for bound in &conflict.bounds {
            if !ctx.trans.vars[bound.var].is_binary() {
                return Ok(None);
            }
            match bound.bound {
                // "x >= 1 participated" negates to "x = 0 helps": term (1 - x).
                BoundType::Lower => {
                    terms.push((bound.var, -1.0));
                    lhs -= 1.0;
                }
                // "x <= 0 participated" negates to "x = 1 helps": term x.
                BoundType::Upper => terms.push((bound.var, 1.0)),
            }
        }
        if terms.is_empty() {
            return Ok(None);
        }
        self.n_constraints += 1;
        let flags = ConsFlags {
            initial: false,
            separate: true,
            enforce: true,
            check: false,
            propagate: true,
            local: conflict.validdepth > 0,
            modifiable: false,
            dynamic: true,
            removable: true,
            stickingatnode: false,
        };
        let mut cons = Cons::new(
            &format!("conflict_{}", self.n_constraints),
            super::linear::NAME,
            flags,
            Box::new(LinearConsData {
                terms,
                lhs,
                rhs: f64::INFINITY,
            }),
        );
        cons.validdepth = conflict.validdepth;
        Ok(Some(cons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictBound;
    use crate::lp::Lp;
    use crate::model::DomainState;
    use crate::model::Problem;
    use crate::model::VarStatus;
    use crate::model::VarType;
    use crate::model::Variable;
    use crate::num::Tolerances;
    use crate::primal::Primal;

    #[test]
    fn binary_conflicts_become_covering_rows() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut ids = Vec::new();
        for name in ["a", "b"] {
            let mut var = Variable::new(name, 0.0, 1.0, 0.0, VarType::Binary);
            var.status = VarStatus::Loose;
            ids.push(trans.add_var(var));
        }
        let mut domain = DomainState::default();
        let mut lp = Lp::default();
        let primal = Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 2,
        };

        // a fixed to 1 and b fixed to 0 cannot both hold.
        let conflict = ConflictSet {
            bounds: vec![
                ConflictBound {
                    var: ids[0],
                    bound: BoundType::Lower,
                    value: 1.0,
                },
                ConflictBound {
                    var: ids[1],
                    bound: BoundType::Upper,
                    value: 0.0,
                },
            ],
            validdepth: 0,
            conflict_depth: 2,
        };
        let mut hdlr = LinearConflictHdlr::default();
        let cons = hdlr.exec(&mut ctx, &conflict).unwrap().unwrap();

        let data = cons.data.downcast_ref::<LinearConsData>().unwrap();
        // (1 - a) + b >= 1, i.e. -a + b >= 0.
        assert_eq!(vec![(ids[0], -1.0), (ids[1], 1.0)], data.terms);
        assert_eq!(0.0, data.lhs);
        assert!(!cons.flags.local);
    }

    #[test]
    fn non_binary_conflicts_are_declined() {
        let tol = Tolerances::default();
        let mut trans = Problem::new("t", true);
        let mut var = Variable::new("i", 0.0, 10.0, 0.0, VarType::Integer);
        var.status = VarStatus::Loose;
        let i = trans.add_var(var);
        let mut domain = DomainState::default();
        let mut lp = Lp::default();
        let primal = Primal::default();
        let mut ctx = PluginCtx {
            tol: &tol,
            trans: &mut trans,
            domain: &mut domain,
            lp: &mut lp,
            primal: &primal,
            depth: 1,
        };

        let conflict = ConflictSet {
            bounds: vec![ConflictBound {
                var: i,
                bound: BoundType::Lower,
                value: 5.0,
            }],
            validdepth: 0,
            conflict_depth: 1,
        };
        let mut hdlr = LinearConflictHdlr::default();
        assert!(hdlr.exec(&mut ctx, &conflict).unwrap().is_none());
    }
}
