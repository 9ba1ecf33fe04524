use fnv::FnvHashMap;

use super::Cons;
use super::ConsId;
use super::VarId;
use super::VarStatus;
use super::Variable;
use crate::containers::KeyedVec;
use crate::results::Error;
use crate::results::GourdResult;

/// The optimisation direction of a problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ObjSense {
    #[default]
    Minimize,
    Maximize,
}

/// A problem instance: the original one built by the user, or its transformed twin the search
/// operates on.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    pub name: String,
    pub objsense: ObjSense,
    /// Constant added to the (transformed) objective, accumulated by fixings and aggregations.
    pub obj_offset: f64,
    pub vars: KeyedVec<VarId, Variable>,
    pub conss: KeyedVec<ConsId, Cons>,
    var_names: FnvHashMap<String, VarId>,
    cons_names: FnvHashMap<String, ConsId>,
    pub transformed: bool,
}

impl Problem {
    pub fn new(name: &str, transformed: bool) -> Problem {
        Problem {
            name: name.into(),
            transformed,
            ..Problem::default()
        }
    }

    pub fn add_var(&mut self, var: Variable) -> VarId {
        let name = var.name.clone();
        let id = self.vars.push(var);
        let _ = self.var_names.insert(name, id);
        id
    }

    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.var_names.get(name).copied()
    }

    pub fn add_cons(&mut self, cons: Cons) -> GourdResult<ConsId> {
        if self.cons_names.contains_key(&cons.name) {
            return Err(Error::KeyAlreadyExisting(cons.name));
        }
        let name = cons.name.clone();
        let id = self.conss.push(cons);
        let _ = self.cons_names.insert(name, id);
        Ok(id)
    }

    pub fn find_cons(&self, name: &str) -> Option<ConsId> {
        self.cons_names.get(name).copied()
    }

    /// Marks the constraint deleted; physical removal happens at stage boundaries.
    pub fn del_cons(&mut self, cons: ConsId) {
        let _ = self.cons_names.remove(&self.conss[cons].name.clone());
        self.conss[cons].deleted = true;
        self.conss[cons].active = false;
    }

    pub fn n_vars(&self) -> usize {
        self.vars.iter().filter(|var| !var.deleted).count()
    }

    pub fn n_conss(&self) -> usize {
        self.conss.iter().filter(|cons| !cons.deleted).count()
    }

    pub fn active_cons_ids(&self) -> Vec<ConsId> {
        self.conss
            .keys()
            .filter(|&id| self.conss[id].active && !self.conss[id].deleted)
            .collect()
    }

    /// Ids of variables with active status (loose or column).
    pub fn active_var_ids(&self) -> Vec<VarId> {
        self.vars
            .keys()
            .filter(|&id| !self.vars[id].deleted && self.vars[id].status.is_active())
            .collect()
    }

    /// Fixes a variable; the objective contribution moves into the offset.
    pub fn fix_var(&mut self, var: VarId, value: f64) {
        self.obj_offset += self.vars[var].obj * value;
        self.vars[var].status = VarStatus::Fixed(value);
    }

    /// Aggregates `var := scalar * other + constant`.
    ///
    /// The aggregation graph must stay acyclic; an aggregation that would close a cycle is
    /// rejected at construction.
    pub fn aggregate_var(
        &mut self,
        var: VarId,
        other: VarId,
        scalar: f64,
        constant: f64,
    ) -> GourdResult<()> {
        if var == other || self.reaches(other, var) {
            return Err(Error::InvalidData(format!(
                "aggregating {} onto {} would create a cycle",
                self.vars[var].name, self.vars[other].name
            )));
        }
        self.vars[var].status = VarStatus::Aggregated {
            var: other,
            scalar,
            constant,
        };
        Ok(())
    }

    /// Multi-aggregates `var := sum_i scalars[i] * vars[i] + constant`.
    pub fn multiaggregate_var(
        &mut self,
        var: VarId,
        terms: Vec<(VarId, f64)>,
        constant: f64,
    ) -> GourdResult<()> {
        for &(term_var, _) in &terms {
            if term_var == var || self.reaches(term_var, var) {
                return Err(Error::InvalidData(format!(
                    "multi-aggregating {} would create a cycle",
                    self.vars[var].name
                )));
            }
        }
        self.vars[var].status = VarStatus::MultiAggregated {
            vars: terms,
            constant,
        };
        Ok(())
    }

    /// Whether the aggregation graph contains a path from `from` to `to`.
    fn reaches(&self, from: VarId, to: VarId) -> bool {
        if from == to {
            return true;
        }
        match &self.vars[from].status {
            VarStatus::Aggregated { var, .. } | VarStatus::Negated { var, .. } => {
                self.reaches(*var, to)
            }
            VarStatus::MultiAggregated { vars, .. } => {
                vars.iter().any(|&(var, _)| self.reaches(var, to))
            }
            _ => false,
        }
    }

    /// Resolves the value of a (possibly aggregated) variable given values for active variables.
    pub fn resolve_value(&self, var: VarId, active_value: &dyn Fn(VarId) -> f64) -> f64 {
        match &self.vars[var].status {
            VarStatus::Original | VarStatus::Loose | VarStatus::Column => active_value(var),
            VarStatus::Fixed(value) => *value,
            VarStatus::Aggregated {
                var: other,
                scalar,
                constant,
            } => scalar * self.resolve_value(*other, active_value) + constant,
            VarStatus::MultiAggregated { vars, constant } => {
                vars.iter()
                    .map(|&(other, scalar)| scalar * self.resolve_value(other, active_value))
                    .sum::<f64>()
                    + constant
            }
            VarStatus::Negated { var: other, constant } => {
                constant - self.resolve_value(*other, active_value)
            }
        }
    }

    /// Proactively compresses multi-aggregations so every term refers to an active or fixed
    /// variable, avoiding repeated resolution walks.
    pub fn flatten_aggregation_graph(&mut self) -> GourdResult<()> {
        for id in self.vars.keys().collect::<Vec<_>>() {
            if let VarStatus::MultiAggregated { vars, constant } = self.vars[id].status.clone() {
                let mut flat: FnvHashMap<VarId, f64> = FnvHashMap::default();
                let mut offset = constant;
                let mut stack: Vec<(VarId, f64)> = vars;
                let mut steps = 0usize;
                while let Some((term_var, scalar)) = stack.pop() {
                    steps += 1;
                    if steps > self.vars.len() * self.vars.len() {
                        return Err(Error::InvalidData(
                            "aggregation graph resolution did not terminate".into(),
                        ));
                    }
                    match &self.vars[term_var].status {
                        VarStatus::Original | VarStatus::Loose | VarStatus::Column => {
                            *flat.entry(term_var).or_insert(0.0) += scalar;
                        }
                        VarStatus::Fixed(value) => offset += scalar * value,
                        VarStatus::Aggregated {
                            var,
                            scalar: inner,
                            constant,
                        } => {
                            offset += scalar * constant;
                            stack.push((*var, scalar * inner));
                        }
                        VarStatus::MultiAggregated { vars, constant } => {
                            offset += scalar * constant;
                            for &(var, inner) in vars {
                                stack.push((var, scalar * inner));
                            }
                        }
                        VarStatus::Negated { var, constant } => {
                            offset += scalar * constant;
                            stack.push((*var, -scalar));
                        }
                    }
                }
                self.vars[id].status = VarStatus::MultiAggregated {
                    vars: flat.into_iter().collect(),
                    constant: offset,
                };
            }
        }
        Ok(())
    }

    /// The objective value of an assignment of the active variables, including the offset.
    pub fn obj_value(&self, active_value: &dyn Fn(VarId) -> f64) -> f64 {
        self.vars
            .keys()
            .filter(|&id| {
                let var = &self.vars[id];
                !var.deleted && (var.status == VarStatus::Original || var.status.is_active())
            })
            .map(|id| self.vars[id].obj * active_value(id))
            .sum::<f64>()
            + self.obj_offset
    }

    /// Physically removes constraints marked deleted. Called at stage boundaries.
    pub(crate) fn compress_deleted(&mut self) {
        // Ids must stay stable, so deleted entries are kept as inactive tombstones; only the
        // name index is cleaned.
        let dead: Vec<String> = self
            .conss
            .iter()
            .filter(|cons| cons.deleted)
            .map(|cons| cons.name.clone())
            .collect();
        for name in dead {
            let _ = self.cons_names.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarType;

    fn var(name: &str) -> Variable {
        let mut var = Variable::new(name, 0.0, 10.0, 1.0, VarType::Continuous);
        var.status = VarStatus::Loose;
        var
    }

    #[test]
    fn aggregation_cycles_are_rejected() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(var("x"));
        let y = prob.add_var(var("y"));

        prob.aggregate_var(x, y, 2.0, 1.0).unwrap();
        assert!(prob.aggregate_var(y, x, 0.5, 0.0).is_err());
        assert!(prob.aggregate_var(x, x, 1.0, 0.0).is_err());
    }

    #[test]
    fn resolution_walks_the_aggregation_dag() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(var("x"));
        let y = prob.add_var(var("y"));
        let z = prob.add_var(var("z"));

        // y = 2x + 1, z = 3y - 2 = 6x + 1
        prob.aggregate_var(y, x, 2.0, 1.0).unwrap();
        prob.aggregate_var(z, y, 3.0, -2.0).unwrap();

        let value = prob.resolve_value(z, &|id| if id == x { 2.0 } else { 0.0 });
        assert_eq!(13.0, value);
    }

    #[test]
    fn flattening_compresses_nested_multiaggregations() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(var("x"));
        let y = prob.add_var(var("y"));
        let w = prob.add_var(var("w"));
        let v = prob.add_var(var("v"));

        prob.aggregate_var(w, x, 2.0, 0.0).unwrap();
        prob.multiaggregate_var(v, vec![(w, 1.0), (y, 1.0)], 3.0)
            .unwrap();
        prob.flatten_aggregation_graph().unwrap();

        let VarStatus::MultiAggregated { vars, constant } = &prob.vars[v].status else {
            panic!("expected a multi-aggregation");
        };
        assert_eq!(3.0, *constant);
        let mut terms = vars.clone();
        terms.sort_by_key(|&(id, _)| id);
        assert_eq!(vec![(x, 2.0), (y, 1.0)], terms);

        // The flattened form resolves to the same value.
        let value = prob.resolve_value(v, &|id| if id == x { 1.0 } else { 4.0 });
        assert_eq!(9.0, value);
    }

    #[test]
    fn fixing_moves_objective_into_offset() {
        let mut prob = Problem::new("p", true);
        let x = prob.add_var(var("x"));
        prob.fix_var(x, 4.0);
        assert_eq!(4.0, prob.obj_offset);
        assert_eq!(4.0, prob.obj_value(&|_| 0.0));
    }
}
