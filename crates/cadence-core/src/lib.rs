//! cadence-core: shared geometry primitives for the cadence workspace.

mod geometry;
pub use geometry::{Point, Rect, Size};
