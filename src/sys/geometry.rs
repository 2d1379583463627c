//! Pixel-space geometry used throughout the tree.
//!
//! Values are `f64` so that proportional shares can be computed without
//! intermediate rounding; the layout engine snaps final edges to whole pixels.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Point { x, y } }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Size { width, height } }

    pub fn is_empty(&self) -> bool { self.width <= 0.0 || self.height <= 0.0 }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            origin: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn min(&self) -> Point { self.origin }

    pub fn max(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width,
            self.origin.y + self.size.height,
        )
    }

    pub fn mid(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn is_degenerate(&self) -> bool { self.size.is_empty() }

    /// Shrinks the rectangle by the given amount on each side. The result may
    /// have negative extents; callers check [`Rect::is_degenerate`].
    pub fn inset(&self, top: f64, left: f64, bottom: f64, right: f64) -> Rect {
        Rect::new(
            self.origin.x + left,
            self.origin.y + top,
            self.size.width - left - right,
            self.size.height - top - bottom,
        )
    }

    /// A zero-area rectangle anchored at this rectangle's origin.
    pub fn collapsed(&self) -> Rect { Rect::new(self.origin.x, self.origin.y, 0.0, 0.0) }

    /// Returns a rectangle of `size` centred on this one.
    pub fn centered(&self, size: Size) -> Rect {
        let mid = self.mid();
        Rect::new(
            (mid.x - size.width / 2.0).floor(),
            (mid.y - size.height / 2.0).floor(),
            size.width,
            size.height,
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_degenerate() {
            return *other;
        }
        if other.is_degenerate() {
            return *self;
        }
        let min_x = f64::min(self.min().x, other.min().x);
        let min_y = f64::min(self.min().y, other.min().y);
        let max_x = f64::max(self.max().x, other.max().x);
        let max_y = f64::max(self.max().y, other.max().y);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

pub trait Round {
    fn round(&self) -> Self;
}

impl Round for Rect {
    fn round(&self) -> Self {
        let min_rounded = self.min().round();
        let max_rounded = self.max().round();
        Rect {
            origin: min_rounded,
            size: Size {
                width: max_rounded.x - min_rounded.x,
                height: max_rounded.y - min_rounded.y,
            },
        }
    }
}

impl Round for Point {
    fn round(&self) -> Self { Point::new(self.x.round(), self.y.round()) }
}

impl Round for Size {
    fn round(&self) -> Self { Size::new(self.width.round(), self.height.round()) }
}

pub trait IsWithin {
    fn is_within(&self, how_much: f64, other: Self) -> bool;
}

impl IsWithin for Rect {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.origin.is_within(how_much, other.origin) && self.size.is_within(how_much, other.size)
    }
}

impl IsWithin for Point {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.x.is_within(how_much, other.x) && self.y.is_within(how_much, other.y)
    }
}

impl IsWithin for Size {
    fn is_within(&self, how_much: f64, other: Self) -> bool {
        self.width.is_within(how_much, other.width) && self.height.is_within(how_much, other.height)
    }
}

impl IsWithin for f64 {
    fn is_within(&self, how_much: f64, other: Self) -> bool { (self - other).abs() < how_much }
}

/// Equality up to sub-pixel noise.
pub trait SameAs: IsWithin + Sized {
    fn same_as(&self, other: Self) -> bool { self.is_within(0.5, other) }
}

impl SameAs for Rect {}
impl SameAs for Point {}
impl SameAs for Size {}

pub trait RectExt {
    fn intersection(&self, other: &Self) -> Self;
    fn contains(&self, point: Point) -> bool;
    fn contains_rect(&self, other: Self) -> bool;
    fn area(&self) -> f64;
    /// Moves `self` (without resizing it, unless it is larger) so that it lies
    /// inside `bounds`.
    fn clamp_within(&self, bounds: &Self) -> Self;
}

impl RectExt for Rect {
    fn intersection(&self, other: &Self) -> Self {
        let min_x = f64::max(self.min().x, other.min().x);
        let max_x = f64::min(self.max().x, other.max().x);
        let min_y = f64::max(self.min().y, other.min().y);
        let max_y = f64::min(self.max().y, other.max().y);
        Rect::new(
            min_x,
            min_y,
            f64::max(max_x - min_x, 0.),
            f64::max(max_y - min_y, 0.),
        )
    }

    fn contains(&self, point: Point) -> bool {
        (self.min().x..=self.max().x).contains(&point.x)
            && (self.min().y..=self.max().y).contains(&point.y)
    }

    fn contains_rect(&self, other: Self) -> bool {
        self.min().x <= other.min().x
            && self.min().y <= other.min().y
            && self.max().x >= other.max().x
            && self.max().y >= other.max().y
    }

    fn area(&self) -> f64 { self.size.width * self.size.height }

    fn clamp_within(&self, bounds: &Self) -> Self {
        let width = self.size.width.min(bounds.size.width);
        let height = self.size.height.min(bounds.size.height);
        let x = self.origin.x.clamp(bounds.min().x, bounds.max().x - width);
        let y = self.origin.y.clamp(bounds.min().y, bounds.max().y - height);
        Rect::new(x, y, width, height)
    }
}
