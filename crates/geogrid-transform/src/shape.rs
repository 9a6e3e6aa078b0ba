//! Planar shapes and their transformation by an [`AffineMatrix`].
//!
//! A rectangular shape keeps its kind only when the matrix preserves it;
//! any other case is converted to a [`Path`](Shape::Path).

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::affine::AffineMatrix;

/// Control-point distance that makes a cubic Bézier approximate a quarter circle.
const KAPPA: f64 = 0.552_284_749_8;

/// Axis-aligned rectangle given by its minimum corner and size.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    MoveTo(Point2<f64>),
    LineTo(Point2<f64>),
    CubicTo(Point2<f64>, Point2<f64>, Point2<f64>),
    Close,
}

impl PathSegment {
    fn map(self, m: &AffineMatrix) -> PathSegment {
        match self {
            PathSegment::MoveTo(p) => PathSegment::MoveTo(m.apply(p)),
            PathSegment::LineTo(p) => PathSegment::LineTo(m.apply(p)),
            PathSegment::CubicTo(a, b, c) => PathSegment::CubicTo(m.apply(a), m.apply(b), m.apply(c)),
            PathSegment::Close => PathSegment::Close,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Rectangle(Rect),
    /// Ellipse inscribed in its frame.
    Ellipse(Rect),
    /// Rectangle with elliptic corners of diameters `arc_width` and `arc_height`.
    RoundRectangle {
        frame: Rect,
        arc_width: f64,
        arc_height: f64,
    },
    Path(Vec<PathSegment>),
}

impl Shape {
    /// Bounding box of the shape's outline or control points.
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Rectangle(r) | Shape::Ellipse(r) => *r,
            Shape::RoundRectangle { frame, .. } => *frame,
            Shape::Path(segments) => {
                let mut xmin = f64::INFINITY;
                let mut ymin = f64::INFINITY;
                let mut xmax = f64::NEG_INFINITY;
                let mut ymax = f64::NEG_INFINITY;
                for p in segments.iter().flat_map(segment_points) {
                    xmin = xmin.min(p.x);
                    ymin = ymin.min(p.y);
                    xmax = xmax.max(p.x);
                    ymax = ymax.max(p.y);
                }
                if xmin > xmax {
                    return Rect::default();
                }
                Rect::from_corners(xmin, ymin, xmax, ymax)
            }
        }
    }

    /// The outline as a path in the shape's own coordinates.
    pub fn to_path(&self) -> Vec<PathSegment> {
        match self {
            Shape::Rectangle(r) => rect_path(r),
            Shape::Ellipse(r) => ellipse_path(r),
            Shape::RoundRectangle {
                frame,
                arc_width,
                arc_height,
            } => round_rect_path(frame, *arc_width, *arc_height),
            Shape::Path(segments) => segments.clone(),
        }
    }
}

/// Transform `shape` by `m`, returning a new shape.
///
/// Rectangles stay rectangles when `m` keeps them axis-aligned, including
/// quadrant rotations. Ellipses and round rectangles keep their kind only
/// when `m` has no shear or rotation. Everything else becomes a path.
pub fn transform_shape(m: &AffineMatrix, shape: &Shape) -> Shape {
    match shape {
        Shape::Rectangle(r) if m.is_axis_aligned() => Shape::Rectangle(m.transform_rect(r)),
        Shape::Ellipse(r) if has_no_shear(m) => Shape::Ellipse(m.transform_rect(r)),
        Shape::RoundRectangle {
            frame,
            arc_width,
            arc_height,
        } if has_no_shear(m) => Shape::RoundRectangle {
            frame: m.transform_rect(frame),
            arc_width: (arc_width * m.scale_x).abs(),
            arc_height: (arc_height * m.scale_y).abs(),
        },
        other => Shape::Path(other.to_path().into_iter().map(|s| s.map(m)).collect()),
    }
}

/// Transform `shape` by `m` in place.
pub fn transform_shape_mut(m: &AffineMatrix, shape: &mut Shape) {
    if let Shape::Path(segments) = shape {
        for s in segments.iter_mut() {
            *s = s.map(m);
        }
        return;
    }
    *shape = transform_shape(m, shape);
}

fn has_no_shear(m: &AffineMatrix) -> bool {
    m.shear_x == 0.0 && m.shear_y == 0.0
}

fn segment_points(s: &PathSegment) -> Vec<Point2<f64>> {
    match *s {
        PathSegment::MoveTo(p) | PathSegment::LineTo(p) => vec![p],
        PathSegment::CubicTo(a, b, c) => vec![a, b, c],
        PathSegment::Close => Vec::new(),
    }
}

fn rect_path(r: &Rect) -> Vec<PathSegment> {
    vec![
        PathSegment::MoveTo(Point2::new(r.min_x(), r.min_y())),
        PathSegment::LineTo(Point2::new(r.max_x(), r.min_y())),
        PathSegment::LineTo(Point2::new(r.max_x(), r.max_y())),
        PathSegment::LineTo(Point2::new(r.min_x(), r.max_y())),
        PathSegment::Close,
    ]
}

fn ellipse_path(r: &Rect) -> Vec<PathSegment> {
    let c = r.center();
    let (rx, ry) = (0.5 * r.width, 0.5 * r.height);
    let (kx, ky) = (KAPPA * rx, KAPPA * ry);
    let p = |x: f64, y: f64| Point2::new(c.x + x, c.y + y);
    vec![
        PathSegment::MoveTo(p(rx, 0.0)),
        PathSegment::CubicTo(p(rx, ky), p(kx, ry), p(0.0, ry)),
        PathSegment::CubicTo(p(-kx, ry), p(-rx, ky), p(-rx, 0.0)),
        PathSegment::CubicTo(p(-rx, -ky), p(-kx, -ry), p(0.0, -ry)),
        PathSegment::CubicTo(p(kx, -ry), p(rx, -ky), p(rx, 0.0)),
        PathSegment::Close,
    ]
}

fn round_rect_path(r: &Rect, arc_width: f64, arc_height: f64) -> Vec<PathSegment> {
    let ax = (0.5 * arc_width.abs()).min(0.5 * r.width.abs());
    let ay = (0.5 * arc_height.abs()).min(0.5 * r.height.abs());
    let (kx, ky) = ((1.0 - KAPPA) * ax, (1.0 - KAPPA) * ay);
    let (x0, y0, x1, y1) = (r.min_x(), r.min_y(), r.max_x(), r.max_y());
    let p = Point2::new;
    vec![
        PathSegment::MoveTo(p(x0 + ax, y0)),
        PathSegment::LineTo(p(x1 - ax, y0)),
        PathSegment::CubicTo(p(x1 - kx, y0), p(x1, y0 + ky), p(x1, y0 + ay)),
        PathSegment::LineTo(p(x1, y1 - ay)),
        PathSegment::CubicTo(p(x1, y1 - ky), p(x1 - kx, y1), p(x1 - ax, y1)),
        PathSegment::LineTo(p(x0 + ax, y1)),
        PathSegment::CubicTo(p(x0 + kx, y1), p(x0, y1 - ky), p(x0, y1 - ay)),
        PathSegment::LineTo(p(x0, y0 + ay)),
        PathSegment::CubicTo(p(x0, y0 + ky), p(x0 + kx, y0), p(x0 + ax, y0)),
        PathSegment::Close,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rectangle_survives_scale_and_quadrant_rotation() {
        let r = Shape::Rectangle(Rect::new(1.0, 2.0, 3.0, 4.0));
        let scaled = transform_shape(&AffineMatrix::scale(2.0, -1.0), &r);
        assert_eq!(scaled, Shape::Rectangle(Rect::new(2.0, -6.0, 6.0, 4.0)));

        let quarter = AffineMatrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        match transform_shape(&quarter, &r) {
            Shape::Rectangle(out) => {
                assert_relative_eq!(out.x, -6.0);
                assert_relative_eq!(out.y, 1.0);
                assert_relative_eq!(out.width, 4.0);
                assert_relative_eq!(out.height, 3.0);
            }
            other => panic!("expected a rectangle, got {other:?}"),
        }
    }

    #[test]
    fn rectangle_becomes_path_under_rotation() {
        let r = Shape::Rectangle(Rect::new(0.0, 0.0, 1.0, 1.0));
        let out = transform_shape(&AffineMatrix::rotation(0.3), &r);
        let Shape::Path(segments) = out else {
            panic!("expected a path");
        };
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[4], PathSegment::Close);
    }

    #[test]
    fn ellipse_keeps_kind_without_shear() {
        let e = Shape::Ellipse(Rect::new(0.0, 0.0, 2.0, 2.0));
        let out = transform_shape(&AffineMatrix::translation(5.0, 5.0), &e);
        assert_eq!(out, Shape::Ellipse(Rect::new(5.0, 5.0, 2.0, 2.0)));

        let quarter = AffineMatrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        assert!(matches!(transform_shape(&quarter, &e), Shape::Path(_)));
    }

    #[test]
    fn round_rectangle_scales_its_arcs() {
        let rr = Shape::RoundRectangle {
            frame: Rect::new(0.0, 0.0, 10.0, 10.0),
            arc_width: 2.0,
            arc_height: 4.0,
        };
        let out = transform_shape(&AffineMatrix::scale(2.0, -0.5), &rr);
        assert_eq!(
            out,
            Shape::RoundRectangle {
                frame: Rect::new(0.0, -5.0, 20.0, 5.0),
                arc_width: 4.0,
                arc_height: 2.0,
            }
        );
    }

    #[test]
    fn in_place_path_transform() {
        let mut path = Shape::Path(vec![
            PathSegment::MoveTo(Point2::new(0.0, 0.0)),
            PathSegment::LineTo(Point2::new(1.0, 0.0)),
        ]);
        transform_shape_mut(&AffineMatrix::translation(1.0, 2.0), &mut path);
        assert_eq!(path.bounds(), Rect::new(1.0, 2.0, 1.0, 0.0));
    }
}
