//! The generic plugin registry.
//!
//! Every plugin kind is stored in one of these: a priority-ordered list of boxed trait
//! objects with stable ordering among equal priorities (registration order breaks ties).

use crate::results::Error;
use crate::results::GourdResult;

/// Minimal identity every plugin carries.
pub trait Named {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Initial call priority; higher runs earlier.
    fn priority(&self) -> i32 {
        0
    }
}

struct Entry<P: ?Sized> {
    priority: i32,
    order: usize,
    plugin: Box<P>,
}

pub struct Registry<P: ?Sized> {
    entries: Vec<Entry<P>>,
    next_order: usize,
}

impl<P: ?Sized> Default for Registry<P> {
    fn default() -> Self {
        Registry {
            entries: Vec::new(),
            next_order: 0,
        }
    }
}

impl<P: ?Sized + Named> Registry<P> {
    /// Adds a plugin; names must be unique within one registry.
    pub fn include(&mut self, plugin: Box<P>) -> GourdResult<()> {
        if self.find(plugin.name()).is_some() {
            return Err(Error::KeyAlreadyExisting(plugin.name().to_owned()));
        }
        let entry = Entry {
            priority: plugin.priority(),
            order: self.next_order,
            plugin,
        };
        self.next_order += 1;
        self.entries.push(entry);
        self.sort();
        Ok(())
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));
    }

    pub fn find(&self, name: &str) -> Option<&P> {
        self.entries
            .iter()
            .find(|entry| entry.plugin.name() == name)
            .map(|entry| entry.plugin.as_ref())
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut P> {
        self.entries
            .iter_mut()
            .find(|entry| entry.plugin.name() == name)
            .map(|entry| entry.plugin.as_mut())
    }

    /// Changes the call priority of a registered plugin and re-sorts.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> GourdResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.plugin.name() == name)
            .ok_or(Error::PluginNotFound(name.to_owned()))?;
        entry.priority = priority;
        self.sort();
        Ok(())
    }

    pub fn priority_of(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|entry| entry.plugin.name() == name)
            .map(|entry| entry.priority)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plugins in call order.
    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.entries.iter().map(|entry| entry.plugin.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.entries.iter_mut().map(|entry| entry.plugin.as_mut())
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|plugin| plugin.name().to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        name: &'static str,
        priority: i32,
    }

    impl Named for Fake {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    fn fake(name: &'static str, priority: i32) -> Box<Fake> {
        Box::new(Fake { name, priority })
    }

    #[test]
    fn call_order_is_priority_then_registration() {
        let mut registry: Registry<Fake> = Registry::default();
        registry.include(fake("low", -10)).unwrap();
        registry.include(fake("first", 5)).unwrap();
        registry.include(fake("second", 5)).unwrap();

        assert_eq!(vec!["first", "second", "low"], registry.names());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry: Registry<Fake> = Registry::default();
        registry.include(fake("a", 0)).unwrap();
        assert!(registry.include(fake("a", 1)).is_err());
    }

    #[test]
    fn priority_changes_resort() {
        let mut registry: Registry<Fake> = Registry::default();
        registry.include(fake("a", 0)).unwrap();
        registry.include(fake("b", 1)).unwrap();
        registry.set_priority("a", 2).unwrap();

        assert_eq!(vec!["a", "b"], registry.names());
        assert_eq!(Some(2), registry.priority_of("a"));
        assert!(registry.set_priority("missing", 0).is_err());
    }
}
