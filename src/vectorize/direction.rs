//! Contour winding correction.
//!
//! Outer contours wind counter-clockwise and counters (holes) clockwise
//! in y-up space, the convention the rest of the crate assumes.

use kurbo::{BezPath, ParamCurve, PathEl, Point, Shape};

use crate::geom::{point_in_polygon, polygon_area};

/// Points sampled along each segment when testing containment.
const SAMPLES_PER_SEGMENT: usize = 8;

/// Wind `path` counter-clockwise (`ccw`) or clockwise in y-up space.
pub fn orient(path: &BezPath, ccw: bool) -> BezPath {
    if path.elements().is_empty() || (path.area() > 0.0) == ccw {
        path.clone()
    } else {
        reverse_path(path)
    }
}

/// Orient each contour by how deeply it is nested.
///
/// A contour inside an even number of others is an outer contour
/// (CCW), odd is a hole (CW). Independent shapes side by side are all
/// outer. Use this for outlines of unknown origin; traced contours
/// already know which side their ink is on.
pub fn fix_directions(paths: &[BezPath]) -> Vec<BezPath> {
    let polygons: Vec<Vec<Point>> = paths.iter().map(sample_outline).collect();
    let areas: Vec<f64> = polygons.iter().map(|p| polygon_area(p).abs()).collect();

    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let depth = (0..paths.len())
                .filter(|&j| j != i && areas[j] > areas[i] && encloses(&polygons[j], &polygons[i]))
                .count();
            orient(path, depth % 2 == 0)
        })
        .collect()
}

/// Most of `inner` lies inside `outer`. A single test point is not
/// enough: a counter can touch its outline at an extremum, and the
/// centroid of a ring falls in its own hole.
fn encloses(outer: &[Point], inner: &[Point]) -> bool {
    let inside = inner.iter().filter(|&&p| point_in_polygon(p, outer)).count();
    2 * inside > inner.len()
}

/// A polygon following the contour, curves included.
fn sample_outline(path: &BezPath) -> Vec<Point> {
    path.segments()
        .flat_map(|seg| (0..SAMPLES_PER_SEGMENT).map(move |k| seg.eval(k as f64 / SAMPLES_PER_SEGMENT as f64)))
        .collect()
}

/// The same contour traversed the other way round.
pub fn reverse_path(path: &BezPath) -> BezPath {
    let mut start = Point::ZERO;
    // Each segment's end point and what leads up to it.
    let mut segments: Vec<(Point, Seg)> = Vec::new();
    let mut closed = false;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => start = p,
            PathEl::LineTo(p) => segments.push((p, Seg::Line)),
            PathEl::QuadTo(a, p) => segments.push((p, Seg::Quad(a))),
            PathEl::CurveTo(a, b, p) => segments.push((p, Seg::Curve(a, b))),
            PathEl::ClosePath => closed = true,
        }
    }

    let mut out = BezPath::new();
    let Some(&(last, _)) = segments.last() else {
        out.move_to(start);
        if closed {
            out.close_path();
        }
        return out;
    };

    out.move_to(last);
    for i in (0..segments.len()).rev() {
        let target = if i == 0 { start } else { segments[i - 1].0 };
        match segments[i].1 {
            Seg::Line => out.line_to(target),
            Seg::Quad(a) => out.quad_to(a, target),
            Seg::Curve(a, b) => out.curve_to(b, a, target),
        }
    }
    if closed {
        out.close_path();
    }
    out
}

#[derive(Clone, Copy)]
enum Seg {
    Line,
    Quad(Point),
    Curve(Point, Point),
}
