//! The stage: a registry of tree-structured visual elements.
//!
//! The stage is the geometry provider for playback. It knows each element's
//! measured extent, live frame, and parent/child links, captures the layout
//! snapshots rules resolve against, and exposes the narrow "settable named
//! property" surface effects apply values through.

use std::collections::HashMap;

use cadence_core::{Rect, Size};

use crate::error::{Result, StageError};
use crate::snapshot::{LayoutSnapshot, SnapshotRegistry};

/// One visual element on the stage.
#[derive(Debug, Clone)]
pub struct StageElement {
    id: String,
    parent: Option<String>,
    children: Vec<String>,
    measured: Size,
    frame: Rect,
    properties: HashMap<String, f64>,
}

impl StageElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            children: Vec::new(),
            measured: Size::ZERO,
            frame: Rect::ZERO,
            properties: HashMap::new(),
        }
    }

    pub fn with_measured(mut self, measured: Size) -> Self {
        self.measured = measured;
        self
    }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = frame;
        self
    }

    /// Declare a settable named property with its current value.
    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn measured(&self) -> Size {
        self.measured
    }

    pub fn set_measured(&mut self, measured: Size) {
        self.measured = measured;
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
    }

    /// Read a named property. The four frame edges (`left`, `top`, `right`,
    /// `bottom`) are always readable.
    pub fn property(&self, name: &str) -> Option<f64> {
        match name {
            "left" => Some(self.frame.left),
            "top" => Some(self.frame.top),
            "right" => Some(self.frame.right),
            "bottom" => Some(self.frame.bottom),
            _ => self.properties.get(name).copied(),
        }
    }

    /// Set a named property.
    ///
    /// The frame edges are always settable; any other name must have been
    /// declared, otherwise the set fails (the caller decides how to degrade).
    pub fn set_property(&mut self, name: &str, value: f64) -> Result<()> {
        match name {
            "left" => self.frame.left = value,
            "top" => self.frame.top = value,
            "right" => self.frame.right = value,
            "bottom" => self.frame.bottom = value,
            _ => match self.properties.get_mut(name) {
                Some(slot) => *slot = value,
                None => {
                    return Err(StageError::UnknownProperty {
                        element: self.id.clone(),
                        property: name.to_string(),
                    });
                }
            },
        }
        Ok(())
    }
}

/// Registry of elements plus the snapshot registry expressions consult.
#[derive(Debug, Default)]
pub struct Stage {
    elements: HashMap<String, StageElement>,
    snapshots: SnapshotRegistry,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, linking it under `parent` when given.
    pub fn insert(&mut self, mut element: StageElement, parent: Option<&str>) -> Result<()> {
        if let Some(parent_id) = parent {
            let Some(parent_el) = self.elements.get_mut(parent_id) else {
                return Err(StageError::UnknownElement(parent_id.to_string()));
            };
            parent_el.children.push(element.id.clone());
            element.parent = Some(parent_id.to_string());
        }
        self.elements.insert(element.id.clone(), element);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&StageElement> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut StageElement> {
        self.elements.get_mut(id)
    }

    /// Measured extent of an element; zero when unknown.
    pub fn measured(&self, id: &str) -> Size {
        self.elements.get(id).map(|e| e.measured).unwrap_or_default()
    }

    /// Capture a snapshot of an element's current frame.
    pub fn capture(&self, id: &str) -> Option<LayoutSnapshot> {
        self.elements
            .get(id)
            .map(|e| LayoutSnapshot::from_rect(e.frame))
    }

    /// Capture a snapshot of an element's parent frame. Elements without a
    /// parent get a zero-rect snapshot.
    pub fn capture_parent(&self, id: &str) -> LayoutSnapshot {
        self.elements
            .get(id)
            .and_then(|e| e.parent.as_deref())
            .and_then(|pid| self.capture(pid))
            .unwrap_or_else(|| LayoutSnapshot::from_rect(Rect::ZERO))
    }

    /// Register an element's snapshot for cross-element expression
    /// references.
    pub fn register_snapshot(&mut self, id: impl Into<String>, snapshot: LayoutSnapshot) {
        self.snapshots.register(id, snapshot);
    }

    pub fn snapshots(&self) -> &SnapshotRegistry {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut SnapshotRegistry {
        &mut self.snapshots
    }
}
