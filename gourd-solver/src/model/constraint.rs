use downcast_rs::impl_downcast;
use downcast_rs::Downcast;

use crate::storage_key;

storage_key!(ConsId, "c");

/// The ten Boolean flags of a constraint.
///
/// The combination `check && !enforce` asserts that the constraint is redundant on every
/// feasible LP/pseudo solution; the caller is responsible for that property.
#[derive(Clone, Copy, Debug)]
pub struct ConsFlags {
    /// Relax the constraint into the initial LP.
    pub initial: bool,
    /// Separate the constraint during LP processing.
    pub separate: bool,
    /// Enforce the constraint during node processing.
    pub enforce: bool,
    /// Check the constraint for feasibility of candidate solutions.
    pub check: bool,
    /// Propagate the constraint during domain propagation.
    pub propagate: bool,
    /// The constraint is only valid in the subtree it was added in.
    pub local: bool,
    /// The constraint may be modified during solving (e.g. by pricing); its rows must not be
    /// used in cut aggregation.
    pub modifiable: bool,
    /// The constraint is subject to aging.
    pub dynamic: bool,
    /// The constraint may be removed from the LP relaxation again.
    pub removable: bool,
    /// The constraint stays at the node it was added to and is never moved up.
    pub stickingatnode: bool,
}

impl Default for ConsFlags {
    fn default() -> Self {
        ConsFlags {
            initial: true,
            separate: true,
            enforce: true,
            check: true,
            propagate: true,
            local: false,
            modifiable: false,
            dynamic: false,
            removable: false,
            stickingatnode: false,
        }
    }
}

/// The handler-owned payload of a constraint.
///
/// Only the constraint handler that created the payload knows how to interpret it; the driver
/// moves it around as an opaque box and hands it back through [`Downcast`].
pub trait ConsData: Downcast + std::fmt::Debug {
    /// Creates an independent copy of the payload (used by node-local copies, transformation,
    /// and the instance-copy operation).
    fn duplicate(&self) -> Box<dyn ConsData>;
}

impl_downcast!(ConsData);

/// A constraint of the problem.
#[derive(Debug)]
pub struct Cons {
    pub name: String,
    /// Name of the owning constraint handler.
    pub hdlr: String,
    pub flags: ConsFlags,
    /// Age: number of successive times the constraint was irrelevant at the focus node.
    pub age: f64,
    /// Depth from which on the constraint is valid; 0 for globally valid constraints.
    pub validdepth: usize,
    pub active: bool,
    pub enabled: bool,
    pub deleted: bool,
    /// Whether a propagation pass is forced irrespective of age.
    pub propagate_marked: bool,
    pub data: Box<dyn ConsData>,
}

impl Clone for Cons {
    fn clone(&self) -> Self {
        Cons {
            name: self.name.clone(),
            hdlr: self.hdlr.clone(),
            flags: self.flags,
            age: self.age,
            validdepth: self.validdepth,
            active: self.active,
            enabled: self.enabled,
            deleted: self.deleted,
            propagate_marked: self.propagate_marked,
            data: self.data.duplicate(),
        }
    }
}

impl Cons {
    pub fn new(name: &str, hdlr: &str, flags: ConsFlags, data: Box<dyn ConsData>) -> Cons {
        Cons {
            name: name.into(),
            hdlr: hdlr.into(),
            flags,
            age: 0.0,
            validdepth: 0,
            active: true,
            enabled: true,
            deleted: false,
            propagate_marked: false,
            data,
        }
    }

    /// Whether the constraint should take part in propagation at the focus node.
    pub fn should_propagate(&self) -> bool {
        self.active
            && self.enabled
            && !self.deleted
            && (self.flags.propagate || self.propagate_marked)
    }

    pub fn incr_age(&mut self) {
        self.age += 1.0;
    }

    pub fn reset_age(&mut self) {
        self.age = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct DummyData;

    impl ConsData for DummyData {
        fn duplicate(&self) -> Box<dyn ConsData> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn marked_constraints_propagate_even_without_the_flag() {
        let mut flags = ConsFlags::default();
        flags.propagate = false;
        let mut cons = Cons::new("c", "dummy", flags, Box::new(DummyData));
        assert!(!cons.should_propagate());

        cons.propagate_marked = true;
        assert!(cons.should_propagate());
    }

    #[test]
    fn disabled_constraints_do_not_propagate() {
        let mut cons = Cons::new("c", "dummy", ConsFlags::default(), Box::new(DummyData));
        assert!(cons.should_propagate());
        cons.enabled = false;
        assert!(!cons.should_propagate());
    }
}
