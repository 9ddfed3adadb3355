use std::collections::HashMap;

use crate::net::EventKey;

/// Event key to callback table, shared by client and server rooms with
/// different callback types.
pub struct HandlerRegistry<H> {
    handlers: HashMap<EventKey, H>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Returns the handler it replaced, if any.
    pub fn insert(&mut self, event: EventKey, handler: H) -> Option<H> {
        self.handlers.insert(event, handler)
    }

    pub fn get_mut(&mut self, event: &EventKey) -> Option<&mut H> {
        self.handlers.get_mut(event)
    }

    pub fn remove(&mut self, event: &EventKey) -> Option<H> {
        self.handlers.remove(event)
    }

    pub fn contains(&self, event: &EventKey) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_registration_replaces() {
        let mut registry: HandlerRegistry<&'static str> = HandlerRegistry::new();
        assert!(registry.insert(EventKey::Numeric(1), "first").is_none());
        assert_eq!(registry.insert(EventKey::Numeric(1), "second"), Some("first"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_mut(&EventKey::Numeric(1)), Some(&mut "second"));
    }

    #[test]
    fn numeric_and_named_keys_are_distinct() {
        let mut registry = HandlerRegistry::new();
        registry.insert(EventKey::Numeric(1), 1);
        registry.insert(EventKey::Named("1".into()), 2);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get_mut(&EventKey::Numeric(1)), Some(&mut 1));
        assert_eq!(registry.get_mut(&EventKey::Named("1".into())), Some(&mut 2));

        assert_eq!(registry.remove(&EventKey::Numeric(1)), Some(1));
        assert!(!registry.contains(&EventKey::Numeric(1)));
        assert!(!registry.is_empty());
    }
}
