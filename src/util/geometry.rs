// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions for mask shapes.
//!
//! This module provides the pure interpolation engine used to derive a
//! mask's shape at an arbitrary point on a video's timeline from sparse
//! keyframes, plus bounds and difference computations over the shape
//! variants. All functions are total: they degrade to the best available
//! shape instead of failing.

use crate::models::keyframe::MaskKeyframe;
use crate::models::mask::{Circle, Ellipse, MaskShape, Point, Rect};

/// Linear interpolation between two scalars.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Compute the mask shape at `time` (in frame units) from a keyframe set.
///
/// Returns `None` only when the set is empty. Selection picks the latest
/// keyframe at or before `time`; if none exists the chronologically first
/// keyframe is used as-is. When a later keyframe exists the result is the
/// linear interpolation between the selected pair; past the last keyframe
/// the selected shape is returned unmodified (no extrapolation).
pub fn shape_at(keyframes: &[MaskKeyframe], time: f64) -> Option<MaskShape> {
    if keyframes.is_empty() {
        return None;
    }

    let mut sorted: Vec<&MaskKeyframe> = keyframes.iter().collect();
    sorted.sort_by_key(|kf| kf.frame);

    let current = match sorted.iter().rev().find(|kf| (kf.frame as f64) <= time) {
        Some(kf) => *kf,
        // Before the first keyframe: fall back to it rather than vanish.
        None => return Some(sorted[0].shape.clone()),
    };

    let next = match sorted.iter().find(|kf| (kf.frame as f64) > time) {
        Some(kf) => *kf,
        None => return Some(current.shape.clone()),
    };

    let t0 = current.frame as f64;
    let t1 = next.frame as f64;
    let progress = (time - t0) / (t1 - t0);
    Some(interpolate_shapes(&current.shape, &next.shape, progress))
}

/// Interpolate between two shapes by `progress` (clamped to [0, 1]).
///
/// Cross-variant interpolation is undefined and returns the source shape.
pub fn interpolate_shapes(a: &MaskShape, b: &MaskShape, progress: f64) -> MaskShape {
    let t = progress.clamp(0.0, 1.0);

    match (a, b) {
        (MaskShape::Polygon { points: p1 }, MaskShape::Polygon { points: p2 }) => {
            // Pair points positionally; trailing unmatched points are dropped.
            let len = p1.len().min(p2.len());
            let points = (0..len)
                .map(|i| Point {
                    x: lerp(p1[i].x, p2[i].x, t),
                    y: lerp(p1[i].y, p2[i].y, t),
                })
                .collect();
            MaskShape::Polygon { points }
        }
        (MaskShape::Rectangle { rect: r1 }, MaskShape::Rectangle { rect: r2 }) => {
            MaskShape::Rectangle {
                rect: Rect {
                    x: lerp(r1.x, r2.x, t),
                    y: lerp(r1.y, r2.y, t),
                    width: lerp(r1.width, r2.width, t),
                    height: lerp(r1.height, r2.height, t),
                },
            }
        }
        (MaskShape::Circle { circle: c1 }, MaskShape::Circle { circle: c2 }) => {
            MaskShape::Circle {
                circle: Circle {
                    x: lerp(c1.x, c2.x, t),
                    y: lerp(c1.y, c2.y, t),
                    radius: lerp(c1.radius, c2.radius, t),
                },
            }
        }
        (MaskShape::Ellipse { ellipse: e1 }, MaskShape::Ellipse { ellipse: e2 }) => {
            MaskShape::Ellipse {
                ellipse: Ellipse {
                    x: lerp(e1.x, e2.x, t),
                    y: lerp(e1.y, e2.y, t),
                    radius_x: lerp(e1.radius_x, e2.radius_x, t),
                    radius_y: lerp(e1.radius_y, e2.radius_y, t),
                    rotation: lerp(e1.rotation, e2.rotation, t),
                },
            }
        }
        _ => a.clone(),
    }
}

/// Axis-aligned bounding box of a shape.
///
/// Returns `None` for a polygon with no points. Ellipse bounds ignore
/// rotation and use the per-axis radii.
pub fn bounds_of(shape: &MaskShape) -> Option<Rect> {
    match shape {
        MaskShape::Polygon { points } => {
            if points.is_empty() {
                return None;
            }
            let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
            let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
            let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
            Some(Rect {
                x: min_x,
                y: min_y,
                width: max_x - min_x,
                height: max_y - min_y,
            })
        }
        MaskShape::Rectangle { rect } => Some(*rect),
        MaskShape::Circle { circle } => Some(Rect {
            x: circle.x - circle.radius,
            y: circle.y - circle.radius,
            width: circle.radius * 2.0,
            height: circle.radius * 2.0,
        }),
        MaskShape::Ellipse { ellipse } => Some(Rect {
            x: ellipse.x - ellipse.radius_x,
            y: ellipse.y - ellipse.radius_y,
            width: ellipse.radius_x * 2.0,
            height: ellipse.radius_y * 2.0,
        }),
    }
}

/// Pairwise difference between two shapes, in [0, 1].
///
/// 1.0 (maximal) when the variants differ, or when polygons differ in
/// point count. Polygons compare by mean point distance, rectangles by
/// combined position/size delta. Circles and ellipses have no metric and
/// compare as 0.0.
pub fn difference_of(a: &MaskShape, b: &MaskShape) -> f64 {
    match (a, b) {
        (MaskShape::Polygon { points: p1 }, MaskShape::Polygon { points: p2 }) => {
            if p1.len() != p2.len() {
                return 1.0;
            }
            if p1.is_empty() {
                return 0.0;
            }
            let total: f64 = p1
                .iter()
                .zip(p2.iter())
                .map(|(a, b)| a.distance_to(b))
                .sum();
            (total / p1.len() as f64).min(1.0)
        }
        (MaskShape::Rectangle { rect: r1 }, MaskShape::Rectangle { rect: r2 }) => {
            let pos_diff = ((r1.x - r2.x).powi(2) + (r1.y - r2.y).powi(2)).sqrt();
            let size_diff = (r1.width - r2.width).abs() + (r1.height - r2.height).abs();
            ((pos_diff + size_diff) / 4.0).min(1.0)
        }
        (MaskShape::Circle { .. }, MaskShape::Circle { .. }) => 0.0,
        (MaskShape::Ellipse { .. }, MaskShape::Ellipse { .. }) => 0.0,
        _ => 1.0,
    }
}

/// Keyframes within `[start, end]` (frame units), sorted ascending.
pub fn keyframes_in_range(keyframes: &[MaskKeyframe], start: f64, end: f64) -> Vec<&MaskKeyframe> {
    let mut in_range: Vec<&MaskKeyframe> = keyframes
        .iter()
        .filter(|kf| {
            let f = kf.frame as f64;
            f >= start && f <= end
        })
        .collect();
    in_range.sort_by_key(|kf| kf.frame);
    in_range
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kf(frame: u32, shape: MaskShape) -> MaskKeyframe {
        MaskKeyframe {
            id: format!("kf-{frame}"),
            frame,
            shape,
            captured_at: frame as i64,
        }
    }

    fn rect_at(v: f64) -> MaskShape {
        MaskShape::rectangle(v, v, v + 0.1, v + 0.1)
    }

    #[test]
    fn test_shape_at_empty_set() {
        assert!(shape_at(&[], 0.0).is_none());
    }

    #[test]
    fn test_shape_at_exact_keyframe_no_drift() {
        let frames = vec![kf(0, rect_at(0.0)), kf(10, rect_at(0.2)), kf(20, rect_at(0.5))];
        for frame in [0u32, 10, 20] {
            let shape = shape_at(&frames, frame as f64).unwrap();
            let expected = frames.iter().find(|k| k.frame == frame).unwrap();
            assert_eq!(shape, expected.shape, "drift at control point {frame}");
        }
    }

    #[test]
    fn test_shape_at_before_first_falls_back() {
        let frames = vec![kf(5, rect_at(0.3)), kf(10, rect_at(0.6))];
        let shape = shape_at(&frames, 1.0).unwrap();
        assert_eq!(shape, rect_at(0.3));
    }

    #[test]
    fn test_shape_at_after_last_no_extrapolation() {
        let frames = vec![kf(0, rect_at(0.0)), kf(10, rect_at(0.2))];
        let shape = shape_at(&frames, 100.0).unwrap();
        assert_eq!(shape, rect_at(0.2));
    }

    #[test]
    fn test_rectangle_midpoint_interpolation() {
        let frames = vec![
            kf(0, MaskShape::rectangle(0.0, 0.0, 0.2, 0.2)),
            kf(10, MaskShape::rectangle(0.2, 0.2, 0.4, 0.4)),
        ];
        let shape = shape_at(&frames, 5.0).unwrap();
        match shape {
            MaskShape::Rectangle { rect } => {
                assert!((rect.x - 0.1).abs() < 1e-9);
                assert!((rect.y - 0.1).abs() < 1e-9);
                assert!((rect.width - 0.3).abs() < 1e-9);
                assert!((rect.height - 0.3).abs() < 1e-9);
            }
            other => panic!("expected rectangle, got {other:?}"),
        }
    }

    #[test]
    fn test_interpolation_endpoints() {
        let a = MaskShape::rectangle(0.0, 0.0, 0.2, 0.2);
        let b = MaskShape::rectangle(1.0, 1.0, 0.8, 0.8);
        assert_eq!(interpolate_shapes(&a, &b, 0.0), a);
        assert_eq!(interpolate_shapes(&a, &b, 1.0), b);
    }

    #[test]
    fn test_interpolation_progress_clamped() {
        let a = MaskShape::rectangle(0.0, 0.0, 0.2, 0.2);
        let b = MaskShape::rectangle(1.0, 1.0, 0.8, 0.8);
        assert_eq!(interpolate_shapes(&a, &b, -2.0), a);
        assert_eq!(interpolate_shapes(&a, &b, 3.0), b);
    }

    #[test]
    fn test_cross_variant_returns_source() {
        let a = MaskShape::rectangle(0.0, 0.0, 0.2, 0.2);
        let b = MaskShape::Circle {
            circle: Circle {
                x: 0.5,
                y: 0.5,
                radius: 0.1,
            },
        };
        assert_eq!(interpolate_shapes(&a, &b, 0.5), a);
    }

    #[test]
    fn test_polygon_pairs_to_min_length() {
        let a = MaskShape::polygon(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        let b = MaskShape::polygon(vec![Point::new(1.0, 1.0), Point::new(0.0, 1.0)]);
        match interpolate_shapes(&a, &b, 0.5) {
            MaskShape::Polygon { points } => {
                assert_eq!(points.len(), 2);
                assert!((points[0].x - 0.5).abs() < 1e-9);
                assert!((points[0].y - 0.5).abs() < 1e-9);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_circle_interpolation_is_linear() {
        let a = MaskShape::Circle {
            circle: Circle {
                x: 0.0,
                y: 0.0,
                radius: 0.1,
            },
        };
        let b = MaskShape::Circle {
            circle: Circle {
                x: 1.0,
                y: 1.0,
                radius: 0.3,
            },
        };
        match interpolate_shapes(&a, &b, 0.25) {
            MaskShape::Circle { circle } => {
                assert!((circle.x - 0.25).abs() < 1e-9);
                assert!((circle.radius - 0.15).abs() < 1e-9);
            }
            other => panic!("expected circle, got {other:?}"),
        }
    }

    #[test]
    fn test_bounds_polygon() {
        let shape = MaskShape::polygon(vec![
            Point::new(0.1, 0.2),
            Point::new(0.5, 0.1),
            Point::new(0.3, 0.6),
        ]);
        let bounds = bounds_of(&shape).unwrap();
        assert!((bounds.x - 0.1).abs() < 1e-9);
        assert!((bounds.y - 0.1).abs() < 1e-9);
        assert!((bounds.width - 0.4).abs() < 1e-9);
        assert!((bounds.height - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_empty_polygon_is_none() {
        assert!(bounds_of(&MaskShape::polygon(vec![])).is_none());
    }

    #[test]
    fn test_bounds_circle() {
        let shape = MaskShape::Circle {
            circle: Circle {
                x: 0.5,
                y: 0.5,
                radius: 0.2,
            },
        };
        let bounds = bounds_of(&shape).unwrap();
        assert!((bounds.x - 0.3).abs() < 1e-9);
        assert!((bounds.width - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_difference_cross_variant_is_maximal() {
        let a = MaskShape::rectangle(0.0, 0.0, 0.2, 0.2);
        let b = MaskShape::polygon(vec![Point::new(0.0, 0.0)]);
        assert_eq!(difference_of(&a, &b), 1.0);
    }

    #[test]
    fn test_difference_polygon_point_count_mismatch() {
        let a = MaskShape::polygon(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        let b = MaskShape::polygon(vec![Point::new(0.0, 0.0)]);
        assert_eq!(difference_of(&a, &b), 1.0);
    }

    #[test]
    fn test_difference_identical_shapes() {
        let a = MaskShape::rectangle(0.1, 0.1, 0.2, 0.2);
        assert_eq!(difference_of(&a, &a.clone()), 0.0);

        let p = MaskShape::polygon(vec![Point::new(0.2, 0.2), Point::new(0.8, 0.8)]);
        assert_eq!(difference_of(&p, &p.clone()), 0.0);
    }

    #[test]
    fn test_keyframes_in_range() {
        let frames = vec![kf(0, rect_at(0.0)), kf(10, rect_at(0.1)), kf(25, rect_at(0.2))];
        let in_range = keyframes_in_range(&frames, 5.0, 25.0);
        let picked: Vec<u32> = in_range.iter().map(|k| k.frame).collect();
        assert_eq!(picked, vec![10, 25]);
    }
}
