//! Effect collaborators: apply resolved values to stage elements.
//!
//! The core never inspects what an effect does; it hands over one resolved
//! number per progress update. Effects that fail (typically a missing named
//! property) are logged and isolated to their own rule — the rest of the
//! section proceeds.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::stage::Stage;

/// A value application, one per concrete rule kind.
pub trait Effect: fmt::Debug {
    /// Apply a resolved value to the target element.
    fn apply(&self, stage: &mut Stage, element: &str, value: f64) -> Result<()>;
}

/// Shared effect handle held by rules and tasks.
pub type EffectRef = Rc<dyn Effect>;

/// The narrow "settable named property" effect: writes the value to one
/// named property of the element.
#[derive(Debug, Clone)]
pub struct SetProperty {
    property: String,
}

impl SetProperty {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }
}

impl Effect for SetProperty {
    fn apply(&self, stage: &mut Stage, element: &str, value: f64) -> Result<()> {
        match stage.get_mut(element) {
            Some(el) => el.set_property(&self.property, value),
            None => Err(crate::error::StageError::UnknownElement(
                element.to_string(),
            )),
        }
    }
}

/// Name-keyed effect lookup, injected wherever declarative specs are turned
/// into runtime rules. Deliberately not process-wide: each composition scope
/// owns its registry.
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    effects: HashMap<String, EffectRef>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `set:<edge>` effects for the frame edges and
    /// a `set:opacity` effect, the common cases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for name in ["left", "top", "right", "bottom", "opacity"] {
            registry.register(format!("set:{name}"), Rc::new(SetProperty::new(name)));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, effect: EffectRef) {
        self.effects.insert(name.into(), effect);
    }

    pub fn get(&self, name: &str) -> Option<EffectRef> {
        self.effects.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
