//! Layout snapshots: resolved rectangles for parent / target / original
//! geometry.
//!
//! A snapshot starts out with each edge either a concrete number, a named
//! size constant, or a pending [`SizeExpr`]. [`LayoutSnapshot::prepare`]
//! resolves all four edges against live measurements; after that the
//! snapshot is read-only for the frame and every derived quantity (width,
//! height, centers) is a pure function of the edges.
//!
//! [`LayoutSnapshot::get`] is the canonical eight-way translation from a
//! [`Gravity`] to a number; rules and the expression evaluator both depend
//! on it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use cadence_core::{Rect, Size};

use crate::expr::{EvalContext, SizeConstant, SizeExpr};

/// Directional selector used to read a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    Left,
    Top,
    Right,
    Bottom,
    CenterHorizontal,
    CenterVertical,
    FillHorizontal,
    FillVertical,
}

/// Axis a gravity reads along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Gravity {
    pub fn axis(&self) -> Axis {
        match self {
            Self::Left | Self::Right | Self::CenterHorizontal | Self::FillHorizontal => {
                Axis::Horizontal
            }
            Self::Top | Self::Bottom | Self::CenterVertical | Self::FillVertical => Axis::Vertical,
        }
    }

    /// Symbolic name, used by expression `describe` output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Top => "top",
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::CenterHorizontal => "center_horizontal",
            Self::CenterVertical => "center_vertical",
            Self::FillHorizontal => "fill_horizontal",
            Self::FillVertical => "fill_vertical",
        }
    }
}

/// One of the four snapshot edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Top, Edge::Right, Edge::Bottom];

    /// The gravity matching this edge's own direction.
    pub fn gravity(&self) -> Gravity {
        match self {
            Self::Left => Gravity::Left,
            Self::Top => Gravity::Top,
            Self::Right => Gravity::Right,
            Self::Bottom => Gravity::Bottom,
        }
    }
}

/// Pending source of one snapshot edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeSource {
    /// Concrete number, kept as-is.
    Value { value: f64 },
    /// Named size constant, resolved like an expression constant.
    Constant { constant: SizeConstant },
    /// Live expression, evaluated with the edge's own gravity.
    Expr { expr: SizeExpr },
}

impl From<f64> for EdgeSource {
    fn from(value: f64) -> Self {
        Self::Value { value }
    }
}

impl From<SizeConstant> for EdgeSource {
    fn from(constant: SizeConstant) -> Self {
        Self::Constant { constant }
    }
}

impl From<SizeExpr> for EdgeSource {
    fn from(expr: SizeExpr) -> Self {
        Self::Expr { expr }
    }
}

impl Default for EdgeSource {
    fn default() -> Self {
        Self::Value { value: 0.0 }
    }
}

/// A resolvable rectangle for one geometry of interest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    left: EdgeSource,
    top: EdgeSource,
    right: EdgeSource,
    bottom: EdgeSource,
    resolved: Option<Rect>,
}

impl LayoutSnapshot {
    /// Snapshot with all edges at zero, not yet resolved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of an already-known rectangle; resolved immediately.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            left: rect.left.into(),
            top: rect.top.into(),
            right: rect.right.into(),
            bottom: rect.bottom.into(),
            resolved: Some(rect),
        }
    }

    /// Set one edge's source. Clears any previous resolution.
    pub fn set(&mut self, edge: Edge, source: impl Into<EdgeSource>) {
        let slot = match edge {
            Edge::Left => &mut self.left,
            Edge::Top => &mut self.top,
            Edge::Right => &mut self.right,
            Edge::Bottom => &mut self.bottom,
        };
        *slot = source.into();
        self.resolved = None;
    }

    /// Builder-style edge assignment.
    pub fn with(mut self, edge: Edge, source: impl Into<EdgeSource>) -> Self {
        self.set(edge, source);
        self
    }

    /// Whether all four edges hold concrete values.
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Resolve all four edges against live measurements.
    ///
    /// Expressions evaluate with their edge's own gravity; named constants
    /// go through the same resolution as expression constants; plain values
    /// pass through. The sibling snapshots (`parent`, `target`, `original`)
    /// must already be prepared when an edge expression references them.
    pub fn prepare(
        &mut self,
        measured: Size,
        parent: Option<&LayoutSnapshot>,
        target: Option<&LayoutSnapshot>,
        original: Option<&LayoutSnapshot>,
        registry: Option<&SnapshotRegistry>,
    ) {
        let ctx = EvalContext {
            measured,
            parent_size: parent.map(LayoutSnapshot::size).unwrap_or_default(),
            parent,
            target,
            original,
            registry,
        };

        let mut rect = Rect::ZERO;
        for edge in Edge::ALL {
            let value = {
                let slot = match edge {
                    Edge::Left => &mut self.left,
                    Edge::Top => &mut self.top,
                    Edge::Right => &mut self.right,
                    Edge::Bottom => &mut self.bottom,
                };
                match slot {
                    EdgeSource::Value { value } => *value,
                    EdgeSource::Constant { constant } => constant.resolve(&ctx, edge.gravity()),
                    EdgeSource::Expr { expr } => expr.evaluate(&ctx, edge.gravity()),
                }
            };
            match edge {
                Edge::Left => rect.left = value,
                Edge::Top => rect.top = value,
                Edge::Right => rect.right = value,
                Edge::Bottom => rect.bottom = value,
            }
        }
        self.resolved = Some(rect);
    }

    /// Read the snapshot through the eight-way gravity mapping.
    ///
    /// Edges read the edge; centers read the midpoint; fills read the
    /// extent. Reading an unprepared snapshot degrades to 0.0 with a
    /// warning rather than panicking.
    pub fn get(&self, gravity: Gravity) -> f64 {
        let Some(rect) = self.resolved else {
            tracing::warn!(gravity = gravity.name(), "snapshot read before prepare");
            return 0.0;
        };
        match gravity {
            Gravity::Left => rect.left,
            Gravity::Right => rect.right,
            Gravity::Top => rect.top,
            Gravity::Bottom => rect.bottom,
            Gravity::CenterHorizontal => rect.center_x(),
            Gravity::CenterVertical => rect.center_y(),
            Gravity::FillHorizontal => rect.width(),
            Gravity::FillVertical => rect.height(),
        }
    }

    /// The resolved rectangle, if prepared.
    pub fn rect(&self) -> Option<Rect> {
        self.resolved
    }

    /// Resolved extent; zero before prepare.
    pub fn size(&self) -> Size {
        self.resolved.map(|r| r.size()).unwrap_or_default()
    }
}

/// Registry of resolved snapshots keyed by element id, consulted by
/// element-relative expression operands.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRegistry {
    snapshots: HashMap<String, LayoutSnapshot>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the snapshot for an element.
    pub fn register(&mut self, element: impl Into<String>, snapshot: LayoutSnapshot) {
        self.snapshots.insert(element.into(), snapshot);
    }

    pub fn get(&self, element: &str) -> Option<&LayoutSnapshot> {
        self.snapshots.get(element)
    }

    pub fn remove(&mut self, element: &str) -> Option<LayoutSnapshot> {
        self.snapshots.remove(element)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.snapshots.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
