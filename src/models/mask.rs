// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Mask shape data structures.
//!
//! This module defines the core data structures for representing
//! mask regions: polygons, rectangles, circles, and ellipses.
//! Coordinates are normalized (0.0 to 1.0) relative to the frame.

use serde::{Deserialize, Serialize};

/// A 2D point with normalized coordinates (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A circle described by its center and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// An ellipse described by its center, per-axis radii, and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "radiusX")]
    pub radius_x: f64,
    #[serde(rename = "radiusY")]
    pub radius_y: f64,
    pub rotation: f64,
}

/// A mask region shape.
///
/// Serializes to the persisted document form used by session files and
/// mask exports: `{"type": "rectangle", "rect": {...}}` and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MaskShape {
    Polygon { points: Vec<Point> },
    Rectangle { rect: Rect },
    Circle { circle: Circle },
    Ellipse { ellipse: Ellipse },
}

impl MaskShape {
    /// Short name of the shape variant, as used in documents and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MaskShape::Polygon { .. } => "polygon",
            MaskShape::Rectangle { .. } => "rectangle",
            MaskShape::Circle { .. } => "circle",
            MaskShape::Ellipse { .. } => "ellipse",
        }
    }

    /// Whether two shapes are of the same variant.
    pub fn same_kind(&self, other: &MaskShape) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Convenience constructor for a rectangle mask.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        MaskShape::Rectangle {
            rect: Rect {
                x,
                y,
                width,
                height,
            },
        }
    }

    /// Convenience constructor for a polygon mask.
    pub fn polygon(points: Vec<Point>) -> Self {
        MaskShape::Polygon { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_document_form() {
        let shape = MaskShape::rectangle(0.1, 0.2, 0.3, 0.4);
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["rect"]["width"], 0.3);

        let back: MaskShape = serde_json::from_value(json).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn test_ellipse_field_names() {
        let shape = MaskShape::Ellipse {
            ellipse: Ellipse {
                x: 0.5,
                y: 0.5,
                radius_x: 0.2,
                radius_y: 0.1,
                rotation: 45.0,
            },
        };
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["ellipse"]["radiusX"], 0.2);
        assert_eq!(json["ellipse"]["radiusY"], 0.1);
    }

    #[test]
    fn test_same_kind() {
        let a = MaskShape::rectangle(0.0, 0.0, 1.0, 1.0);
        let b = MaskShape::rectangle(0.5, 0.5, 0.1, 0.1);
        let c = MaskShape::polygon(vec![Point::new(0.0, 0.0)]);
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&c));
    }
}
