//! The event system.
//!
//! Event handlers and internal components register filters for classes of state changes;
//! the driver dispatches matching events synchronously at well-defined points. Filter slots
//! are reused after drops, so catch/drop cycles do not grow the tables.

use enumset::EnumSet;
use enumset::EnumSetType;

use crate::lp::RowId;
use crate::model::VarId;
use crate::results::Error;
use crate::results::GourdResult;

/// The classes of events a filter can select.
#[derive(EnumSetType, Debug)]
pub enum EventType {
    VarAdded,
    VarDeleted,
    VarFixed,
    ObjChanged,
    GlbChanged,
    GubChanged,
    LbTightened,
    LbRelaxed,
    UbTightened,
    UbRelaxed,
    RowAdded,
    RowDeleted,
    RowSideChanged,
    NodeFocused,
    NodeFeasible,
    NodeInfeasible,
    NodeBranched,
    FirstLpSolved,
    LpSolved,
    PoorSolFound,
    BestSolFound,
}

/// Event classes that refer to a specific variable.
pub fn var_events() -> EnumSet<EventType> {
    EventType::VarFixed
        | EventType::ObjChanged
        | EventType::GlbChanged
        | EventType::GubChanged
        | EventType::LbTightened
        | EventType::LbRelaxed
        | EventType::UbTightened
        | EventType::UbRelaxed
}

/// Event classes that refer to a specific row.
pub fn row_events() -> EnumSet<EventType> {
    EventType::RowDeleted | EventType::RowSideChanged
}

/// One concrete event instance.
#[derive(Clone, Debug)]
pub enum Event {
    Var {
        event: EventType,
        var: VarId,
        old: f64,
        new: f64,
    },
    Row {
        event: EventType,
        row: RowId,
    },
    Node {
        event: EventType,
        depth: usize,
    },
    Lp {
        event: EventType,
    },
    Sol {
        event: EventType,
        obj: f64,
    },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match *self {
            Event::Var { event, .. }
            | Event::Row { event, .. }
            | Event::Node { event, .. }
            | Event::Lp { event }
            | Event::Sol { event, .. } => event,
        }
    }
}

/// A registered interest of an event handler.
#[derive(Clone, Debug)]
struct FilterEntry {
    mask: EnumSet<EventType>,
    /// Name of the event handler plugin to notify.
    handler: String,
    /// Scope restriction for variable/row events.
    var: Option<VarId>,
    row: Option<RowId>,
}

/// Position of a filter entry, handed back by catch operations and consumed by drops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterPos(usize);

/// The global event filter table.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    entries: Vec<Option<FilterEntry>>,
    free: Vec<usize>,
}

impl EventFilter {
    fn insert(&mut self, entry: FilterEntry) -> FilterPos {
        match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                FilterPos(slot)
            }
            None => {
                self.entries.push(Some(entry));
                FilterPos(self.entries.len() - 1)
            }
        }
    }

    /// Registers interest in global events.
    pub fn catch(&mut self, mask: EnumSet<EventType>, handler: &str) -> FilterPos {
        self.insert(FilterEntry {
            mask,
            handler: handler.into(),
            var: None,
            row: None,
        })
    }

    /// Registers interest in events of one variable.
    pub fn catch_var(
        &mut self,
        var: VarId,
        mask: EnumSet<EventType>,
        handler: &str,
    ) -> GourdResult<FilterPos> {
        if !var_events().is_superset(mask) {
            return Err(Error::InvalidData(
                "variable filters only accept variable event classes".into(),
            ));
        }
        Ok(self.insert(FilterEntry {
            mask,
            handler: handler.into(),
            var: Some(var),
            row: None,
        }))
    }

    /// Registers interest in events of one row.
    pub fn catch_row(
        &mut self,
        row: RowId,
        mask: EnumSet<EventType>,
        handler: &str,
    ) -> GourdResult<FilterPos> {
        if !row_events().is_superset(mask) {
            return Err(Error::InvalidData(
                "row filters only accept row event classes".into(),
            ));
        }
        Ok(self.insert(FilterEntry {
            mask,
            handler: handler.into(),
            var: None,
            row: Some(row),
        }))
    }

    /// Removes a previously registered filter; its slot is recycled.
    pub fn drop_filter(&mut self, pos: FilterPos) -> GourdResult<()> {
        match self.entries.get_mut(pos.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(pos.0);
                Ok(())
            }
            _ => Err(Error::InvalidData("dropping an unregistered filter".into())),
        }
    }

    pub fn n_active(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Names of the handlers whose filters match the event, in registration order.
    pub fn matching_handlers(&self, event: &Event) -> Vec<String> {
        let event_type = event.event_type();
        self.entries
            .iter()
            .flatten()
            .filter(|entry| {
                if !entry.mask.contains(event_type) {
                    return false;
                }
                match (event, entry.var, entry.row) {
                    (Event::Var { var, .. }, Some(filter_var), _) => *var == filter_var,
                    (Event::Row { row, .. }, _, Some(filter_row)) => *row == filter_row,
                    (_, None, None) => true,
                    _ => false,
                }
            })
            .map(|entry| entry.handler.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::StorageKey;

    #[test]
    fn global_filters_match_by_mask() {
        let mut filter = EventFilter::default();
        let _ = filter.catch(EventType::BestSolFound | EventType::PoorSolFound, "log");
        let _ = filter.catch(EventType::NodeBranched.into(), "tree");

        let event = Event::Sol {
            event: EventType::BestSolFound,
            obj: 1.0,
        };
        assert_eq!(vec!["log".to_owned()], filter.matching_handlers(&event));
    }

    #[test]
    fn var_filters_are_scoped_to_their_variable() {
        let mut filter = EventFilter::default();
        let x = VarId::create_from_index(0);
        let y = VarId::create_from_index(1);
        let _ = filter
            .catch_var(x, EventType::LbTightened.into(), "watcher")
            .unwrap();

        let on_y = Event::Var {
            event: EventType::LbTightened,
            var: y,
            old: 0.0,
            new: 1.0,
        };
        assert!(filter.matching_handlers(&on_y).is_empty());

        let on_x = Event::Var {
            event: EventType::LbTightened,
            var: x,
            old: 0.0,
            new: 1.0,
        };
        assert_eq!(vec!["watcher".to_owned()], filter.matching_handlers(&on_x));
    }

    #[test]
    fn var_filters_reject_non_var_classes() {
        let mut filter = EventFilter::default();
        let x = VarId::create_from_index(0);
        assert!(filter
            .catch_var(x, EventType::NodeFocused.into(), "watcher")
            .is_err());
    }

    #[test]
    fn dropped_slots_are_reused() {
        let mut filter = EventFilter::default();
        let a = filter.catch(EventType::LpSolved.into(), "a");
        let _ = filter.catch(EventType::LpSolved.into(), "b");

        filter.drop_filter(a).unwrap();
        assert_eq!(1, filter.n_active());
        assert!(filter.drop_filter(a).is_err());

        let c = filter.catch(EventType::LpSolved.into(), "c");
        assert_eq!(a, c);
        assert_eq!(2, filter.n_active());
    }
}
