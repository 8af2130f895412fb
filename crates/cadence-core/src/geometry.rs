use serde::{Deserialize, Serialize};

/// A point in 2D space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A measured extent (width and height).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle stored by its four edges.
///
/// Edge storage (rather than origin + extent) keeps edge reads and writes
/// symmetric; width/height/centers are derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    /// Build a rect from its four edges.
    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rect from an origin and a size.
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + size.width,
            bottom: origin.y + size.height,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Translate the rect by the given deltas.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_derived_quantities() {
        let rect = Rect::from_edges(10.0, 20.0, 110.0, 70.0);
        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 50.0);
        assert_eq!(rect.center_x(), 60.0);
        assert_eq!(rect.center_y(), 45.0);
        assert_eq!(rect.size(), Size::new(100.0, 50.0));
        assert_eq!(rect.origin(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_rect_from_origin_size() {
        let rect = Rect::from_origin_size(Point::new(5.0, 5.0), Size::new(30.0, 40.0));
        assert_eq!(rect.right, 35.0);
        assert_eq!(rect.bottom, 45.0);
    }

    #[test]
    fn test_rect_offset() {
        let rect = Rect::from_edges(0.0, 0.0, 10.0, 10.0).offset(3.0, -2.0);
        assert_eq!(rect.left, 3.0);
        assert_eq!(rect.top, -2.0);
        assert_eq!(rect.right, 13.0);
        assert_eq!(rect.bottom, 8.0);
        assert_eq!(rect.width(), 10.0);
    }
}
