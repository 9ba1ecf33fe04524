use crate::num::Tolerances;
use crate::storage_key;

storage_key!(VarId, "x");

/// The type of a variable; discrete types carry integrality-rounded bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarType {
    /// A 0-1 variable.
    Binary,
    /// A general integer variable.
    Integer,
    /// A variable that is continuous but provably integral in every optimal solution.
    ImplInt,
    /// A continuous variable.
    Continuous,
}

impl VarType {
    pub fn is_discrete(self) -> bool {
        matches!(self, VarType::Binary | VarType::Integer | VarType::ImplInt)
    }
}

/// Preferred branching direction of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BranchDirection {
    Downwards,
    Upwards,
    #[default]
    Auto,
}

/// The aggregation status of a transformed variable.
///
/// Aggregations form a DAG over variable indices (never back-pointers); resolving a value is a
/// flattening walk that terminates because the graph is acyclic by construction.
#[derive(Clone, Debug, PartialEq)]
pub enum VarStatus {
    /// An original-problem variable.
    Original,
    /// An active transformed variable not (yet) part of the LP.
    Loose,
    /// An active transformed variable with an LP column.
    Column,
    /// Fixed to a single value.
    Fixed(f64),
    /// `self = scalar * var + constant` with `var` active.
    Aggregated {
        var: VarId,
        scalar: f64,
        constant: f64,
    },
    /// `self = sum_i scalars[i] * vars[i] + constant`.
    MultiAggregated {
        vars: Vec<(VarId, f64)>,
        constant: f64,
    },
    /// `self = constant - var`.
    Negated { var: VarId, constant: f64 },
}

impl VarStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, VarStatus::Loose | VarStatus::Column)
    }
}

/// Per-direction pseudocost record of a variable.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pseudocost {
    sum_objdelta_per_frac: f64,
    count: f64,
}

impl Pseudocost {
    pub fn update(&mut self, objdelta: f64, frac: f64) {
        if frac.abs() > f64::EPSILON {
            self.sum_objdelta_per_frac += objdelta / frac;
            self.count += 1.0;
        }
    }

    /// The average objective gain per unit of fractionality, or the given fallback when the
    /// variable was never branched on in this direction.
    pub fn value_or(&self, fallback: f64) -> f64 {
        if self.count > 0.0 {
            self.sum_objdelta_per_frac / self.count
        } else {
            fallback
        }
    }

    pub fn count(&self) -> f64 {
        self.count
    }
}

/// A problem variable.
///
/// Original and transformed variables live in the variable arenas of their respective
/// [`super::Problem`]s; the twin links are ids, not references.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub var_type: VarType,
    pub obj: f64,
    pub status: VarStatus,

    pub lb_global: f64,
    pub ub_global: f64,
    pub lb_local: f64,
    pub ub_local: f64,
    /// Lazy bounds are guaranteed by constraints and omitted from the LP.
    pub lb_lazy: Option<f64>,
    pub ub_lazy: Option<f64>,

    /// On an original variable: the transformed twin, created lazily during transformation.
    pub transformed_twin: Option<VarId>,
    /// On a transformed variable: the original it descends from (if not created during solve).
    pub orig_var: Option<VarId>,

    pub branch_priority: i32,
    pub branch_factor: f64,
    pub branch_direction: BranchDirection,

    pub nlocks_down: i32,
    pub nlocks_up: i32,

    pub pseudocost_down: Pseudocost,
    pub pseudocost_up: Pseudocost,
    pub ninferences_down: u64,
    pub ninferences_up: u64,
    pub ncutoffs_down: u64,
    pub ncutoffs_up: u64,
    pub conflict_length_sum: f64,
    pub vsids: f64,

    pub deleted: bool,
}

impl Variable {
    /// Creates a variable, rounding bounds of discrete types and auto-promoting an integer
    /// variable with 0-1 bounds to binary.
    pub fn new(name: &str, mut lb: f64, mut ub: f64, obj: f64, mut var_type: VarType) -> Variable {
        let tol = Tolerances::default();
        if var_type.is_discrete() {
            lb = if tol.is_neg_infinity(lb) { lb } else { lb.ceil() };
            ub = if tol.is_infinity(ub) { ub } else { ub.floor() };
        }
        if var_type == VarType::Integer && lb >= 0.0 && ub <= 1.0 {
            var_type = VarType::Binary;
        }

        Variable {
            name: name.into(),
            var_type,
            obj,
            status: VarStatus::Original,
            lb_global: lb,
            ub_global: ub,
            lb_local: lb,
            ub_local: ub,
            lb_lazy: None,
            ub_lazy: None,
            transformed_twin: None,
            orig_var: None,
            branch_priority: 0,
            branch_factor: 1.0,
            branch_direction: BranchDirection::Auto,
            nlocks_down: 0,
            nlocks_up: 0,
            pseudocost_down: Pseudocost::default(),
            pseudocost_up: Pseudocost::default(),
            ninferences_down: 0,
            ninferences_up: 0,
            ncutoffs_down: 0,
            ncutoffs_up: 0,
            conflict_length_sum: 0.0,
            vsids: 0.0,
            deleted: false,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.var_type == VarType::Binary
    }

    /// Whether the variable is fixed in the local domain.
    pub fn is_locally_fixed(&self, tol: &Tolerances) -> bool {
        tol.is_eq(self.lb_local, self.ub_local)
    }

    /// Adds to the rounding-lock counters. Negative deltas remove locks.
    pub fn add_locks(&mut self, down: i32, up: i32) {
        self.nlocks_down += down;
        self.nlocks_up += up;
        gourd_assert_simple!(self.nlocks_down >= 0 && self.nlocks_up >= 0);
    }

    /// Whether rounding the variable downwards can render some constraint infeasible.
    pub fn may_round_down(&self) -> bool {
        self.nlocks_down == 0
    }

    pub fn may_round_up(&self) -> bool {
        self.nlocks_up == 0
    }

    /// Rounds a candidate bound value for the type of this variable.
    pub fn adjusted_lb(&self, tol: &Tolerances, lb: f64) -> f64 {
        if self.var_type.is_discrete() && !tol.is_neg_infinity(lb) {
            tol.feas_ceil(lb)
        } else {
            lb
        }
    }

    pub fn adjusted_ub(&self, tol: &Tolerances, ub: f64) -> f64 {
        if self.var_type.is_discrete() && !tol.is_infinity(ub) {
            tol.feas_floor(ub)
        } else {
            ub
        }
    }
}

use crate::gourd_assert_simple;
