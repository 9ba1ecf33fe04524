//! The event handler interface.

use super::registry::Named;
use crate::events::Event;
use crate::results::GourdResult;

/// Reacts to events it registered filters for.
///
/// Execution is synchronous at the point the event is emitted; handlers must not mutate
/// solver state from the callback, only their own bookkeeping.
pub trait EventHdlr: Named {
    fn exec(&mut self, event: &Event) -> GourdResult<()>;
}
