//! Shared geometry types.

use std::ops::{Mul, Sub};

use skia_safe::{ISize, Rect};

/// 2D object position.
#[derive(PartialEq, Eq, Copy, Clone, Default, Debug)]
pub struct Point<T = i32> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T> From<(T, T)> for Point<T> {
    fn from((x, y): (T, T)) -> Self {
        Self { x, y }
    }
}

impl<T: Sub<Output = T>> Sub<Point<T>> for Point<T> {
    type Output = Self;

    fn sub(mut self, other: Point<T>) -> Self {
        self.x = self.x - other.x;
        self.y = self.y - other.y;
        self
    }
}

impl Mul<f64> for Point<f64> {
    type Output = Point<f64>;

    fn mul(mut self, scale: f64) -> Self {
        self.x *= scale;
        self.y *= scale;
        self
    }
}

impl Point<f64> {
    /// Check if the point lies inside a rectangle.
    pub fn within(&self, rect: &Rect) -> bool {
        let (x, y) = (self.x as f32, self.y as f32);
        x >= rect.left && x < rect.right && y >= rect.top && y < rect.bottom
    }
}

/// 2D object size.
#[derive(PartialEq, Eq, Copy, Clone, Default, Debug)]
pub struct Size<T = u32> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub fn new(width: T, height: T) -> Self {
        Self { width, height }
    }
}

impl<T> From<(T, T)> for Size<T> {
    fn from((width, height): (T, T)) -> Self {
        Self { width, height }
    }
}

impl From<Size> for Size<f32> {
    fn from(size: Size) -> Self {
        Self { width: size.width as f32, height: size.height as f32 }
    }
}

impl From<Size> for ISize {
    fn from(size: Size) -> Self {
        ISize { width: size.width as i32, height: size.height as i32 }
    }
}

impl Mul<f64> for Size {
    type Output = Self;

    fn mul(mut self, scale: f64) -> Self {
        self.width = (self.width as f64 * scale).round() as u32;
        self.height = (self.height as f64 * scale).round() as u32;
        self
    }
}

impl Size {
    /// Check if the size covers any area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_rounds() {
        assert_eq!(Size::new(361, 720) * 1.5, Size::new(542, 1080));
        assert_eq!(Point::new(2., 4.) * 0.5, Point::new(1., 2.));
    }

    #[test]
    fn point_within_rect() {
        let rect = Rect::from_xywh(10., 10., 20., 20.);
        assert!(Point::new(15., 29.).within(&rect));
        assert!(!Point::new(31., 15.).within(&rect));
    }
}
