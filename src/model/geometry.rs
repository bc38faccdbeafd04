/// a pointer position in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// axis-aligned box. The constructors guarantee `left <= right` and `top <= bottom`; a box built
/// from a literal with the edges swapped has zero width or height
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::from_corners(Point::new(left, top), Point::new(right, bottom))
    }

    /// normalizes two opposite corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }

    /// strict overlap on both axes, so boxes that only share an edge don't count
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// this box moved so that `origin` becomes (0, 0)
    pub fn relative_to(&self, origin: Point) -> Rect {
        Rect {
            left: self.left - origin.x,
            top: self.top - origin.y,
            right: self.right - origin.x,
            bottom: self.bottom - origin.y,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// keeps a point relative to this box's origin inside `[0, width] x [0, height]`
    pub fn clamp_relative(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0.0, self.width()),
            point.y.clamp(0.0, self.height()),
        )
    }
}
