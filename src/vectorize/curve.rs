//! Corner detection and cubic fitting over an optimal polygon.
//!
//! The polygon is split at corners (alpha >= alphamax), at
//! straight-to-curved transitions and at extrema of curved runs; each
//! section becomes one line or one cubic. Adjacent cubics that join
//! smoothly are then merged while the merged curve stays within
//! `opttolerance` of the originals.

use std::collections::BTreeSet;

use kurbo::{
    fit_to_bezpath_opt, simplify::SimplifyBezPath, BezPath, CubicBez, ParamCurve,
    ParamCurveNearest, PathEl, Point, Vec2,
};

use super::polygon::Polygon;
use crate::config::TracingSettings;

/// Smoothing passes over each section before fitting.
const SMOOTH_ITERATIONS: usize = 3;

/// Accuracy (pixels) of the whole-contour fit used for cornerless shapes.
const CLOSED_FIT_ACCURACY: f64 = 0.5;

/// Alpha below which a vertex reads as straight when looking for
/// straight-to-curved transitions.
const STRAIGHT_ALPHA: f64 = 0.3;

/// Transitions closer than this many vertices to a kept split are dropped.
const MIN_SPLIT_GAP: usize = 3;

/// Minimum protrusion (pixels) for an interior vertex to count as an
/// extremum, and the same as a fraction of the section's chord.
const MIN_PROTRUSION_ABS: f64 = 2.0;
const MIN_PROTRUSION_REL: f64 = 0.05;

/// Samples per curve when checking a merge.
const MERGE_SAMPLES: usize = 8;

/// Length (source pixels) below which a polygon edge may be a corner
/// cut off by resampling and blur.
const CORNER_SPAN: f64 = 1.5;

/// Minimum turn (cosine) between the two edges around a cut corner: 60 degrees.
const CORNER_MAX_COS: f64 = 0.5;

/// Knobs for turning a polygon into curves.
#[derive(Debug, Clone, Copy)]
pub struct CurveParams {
    /// Vertices with alpha >= this are corners.
    pub alphamax: f64,
    /// Maximum deviation (pixels) of a merged curve. 0 disables merging.
    pub opttolerance: f64,
    pub smooth_iterations: usize,
    /// Edges shorter than this (traced pixels) between two long edges
    /// are treated as a rounded-off corner. 0 disables the repair.
    pub corner_span: f64,
}

impl CurveParams {
    pub fn from_settings(settings: &TracingSettings) -> Self {
        Self {
            alphamax: settings.alphamax,
            opttolerance: settings.opttolerance.max(0.0),
            smooth_iterations: SMOOTH_ITERATIONS,
            corner_span: CORNER_SPAN * settings.upscale_amount.max(1.0) + 2.0 * f64::from(settings.smoothing.max(0.0)),
        }
    }
}

/// Convert one polygon to a closed path of lines and cubics.
pub fn polygon_to_bezpath(poly: &Polygon, params: &CurveParams) -> BezPath {
    let v = &restore_corners(&poly.vertices, params.corner_span);
    let m = v.len();
    if m < 3 {
        return BezPath::new();
    }

    let alphas: Vec<f64> = (0..m)
        .map(|j| alpha(v[(j + m - 1) % m], v[j], v[(j + 1) % m]))
        .collect();
    let splits = split_points(v, &alphas, params);

    if splits.is_empty() {
        let smoothed = laplacian_smooth(v, params.smooth_iterations, true);
        return fit_smooth_closed(&smoothed);
    }

    let mut path = BezPath::new();
    path.move_to(v[splits[0]]);
    for (si, &start) in splits.iter().enumerate() {
        let end = splits[(si + 1) % splits.len()];
        let section = extract_cyclic(v, start, end);
        if section.len() <= 2 {
            path.line_to(v[end]);
            continue;
        }
        let smoothed = laplacian_smooth(&section, params.smooth_iterations, false);
        if is_straight(&smoothed) {
            path.line_to(v[end]);
        } else {
            let c = fit_single_cubic(&smoothed);
            path.curve_to(c.p1, c.p2, c.p3);
        }
    }
    path.close_path();

    let path = snap_and_merge_lines(&path);
    merge_curves(&path, params.opttolerance)
}

/// Replace short runs of edges cutting across a corner with the corner
/// itself: the intersection of the long edges on either side.
///
/// Upscaling and blur round a right angle into a chamfer of one or two
/// short edges, and none of its vertices reaches `alphamax` on its own.
fn restore_corners(v: &[Point], span: f64) -> Vec<Point> {
    let m = v.len();
    if m < 5 || span <= 0.0 {
        return v.to_vec();
    }
    let edge = |j: usize| v[(j + 1) % m] - v[j % m];
    let short: Vec<bool> = (0..m).map(|j| edge(j).hypot() < span).collect();
    let Some(first_long) = short.iter().position(|&s| !s) else {
        return v.to_vec();
    };

    // Vertex index → replacement (Some) or removal (None).
    let mut replaced: Vec<Option<Option<Point>>> = vec![None; m];
    let mut run: Option<usize> = None;
    for k in 1..=m {
        let j = (first_long + k) % m;
        if short[j] {
            run.get_or_insert(j);
            continue;
        }
        let Some(start) = run.take() else {
            continue;
        };
        // Short edges start..j, vertices start..=j, long edges on both sides.
        let edges = (j + m - start) % m;
        if let Some(corner) = cut_corner(v, start, j, edges, span) {
            for i in 0..=edges {
                replaced[(start + i) % m] = Some(None);
            }
            replaced[start] = Some(Some(corner));
        }
    }

    let out: Vec<Point> = (0..m)
        .filter_map(|i| match replaced[i] {
            None => Some(v[i]),
            Some(corner) => corner,
        })
        .collect();
    if out.len() < 3 {
        return v.to_vec();
    }
    out
}

/// The corner point for the short run `v[start]..=v[end]`, if the run
/// really is a cut corner.
fn cut_corner(v: &[Point], start: usize, end: usize, edges: usize, span: f64) -> Option<Point> {
    let m = v.len();
    if edges == 0 || edges > 2 {
        return None;
    }
    let before = v[start] - v[(start + m - 1) % m];
    let after = v[(end + 1) % m] - v[end];
    let run_len: f64 = (0..edges).map(|i| v[(start + i + 1) % m].distance(v[(start + i) % m])).sum();
    if run_len > 2.0 * span || before.hypot() < 2.0 * span || after.hypot() < 2.0 * span {
        return None;
    }
    if before.dot(after) / (before.hypot() * after.hypot()) > CORNER_MAX_COS {
        return None;
    }
    let denom = before.cross(after);
    if denom.abs() < 1e-10 {
        return None;
    }
    let t = (v[end] - v[start]).cross(after) / denom;
    let corner = v[start] + before * t;
    (corner.distance(v[start]) <= 2.0 * span && corner.distance(v[end]) <= 2.0 * span).then_some(corner)
}

/// Corners, straight/curved transitions, and extrema of curved runs.
fn split_points(v: &[Point], alphas: &[f64], params: &CurveParams) -> Vec<usize> {
    let m = v.len();
    let corners: BTreeSet<usize> = (0..m).filter(|&j| alphas[j] >= params.alphamax).collect();

    let cyclic_gap = |a: usize, b: usize| {
        let d = a.abs_diff(b);
        d.min(m - d)
    };
    let transitions = curvature_transitions(alphas)
        .into_iter()
        .filter(|&t| corners.iter().all(|&c| cyclic_gap(t, c) > MIN_SPLIT_GAP));

    let mut base: Vec<usize> = corners.iter().copied().chain(transitions).collect();
    base.sort_unstable();
    base.dedup();
    let base = thin_splits(base, m, &corners);

    if base.is_empty() {
        return contour_extrema(v);
    }

    let mut splits = base.clone();
    for (si, &start) in base.iter().enumerate() {
        let end = base[(si + 1) % base.len()];
        let section = extract_cyclic(v, start, end);
        if section.len() > 2 {
            let smoothed = laplacian_smooth(&section, params.smooth_iterations, false);
            if !is_straight(&smoothed) {
                splits.extend(section_extrema(v, start, end));
            }
        }
    }
    splits.sort_unstable();
    splits.dedup();
    splits
}

/// Drop non-corner splits within [`MIN_SPLIT_GAP`] of the previous kept one.
fn thin_splits(sorted: Vec<usize>, total: usize, corners: &BTreeSet<usize>) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(sorted.len());
    for idx in sorted {
        match kept.last() {
            Some(&last) if idx - last <= MIN_SPLIT_GAP && !corners.contains(&idx) => {}
            _ => kept.push(idx),
        }
    }
    if let (Some(&first), Some(&last)) = (kept.first(), kept.last()) {
        if kept.len() > 1 && total - last + first <= MIN_SPLIT_GAP && !corners.contains(&last) {
            kept.pop();
        }
    }
    kept
}

/// Indices where the 5-vertex average of alpha crosses [`STRAIGHT_ALPHA`].
fn curvature_transitions(alphas: &[f64]) -> Vec<usize> {
    let m = alphas.len();
    if m < 5 {
        return Vec::new();
    }
    let averaged: Vec<f64> = (0..m)
        .map(|j| (0..5).map(|k| alphas[(j + m - 2 + k) % m]).sum::<f64>() / 5.0)
        .collect();
    (0..m)
        .filter(|&j| {
            let prev = averaged[(j + m - 1) % m] < STRAIGHT_ALPHA;
            let cur = averaged[j] < STRAIGHT_ALPHA;
            prev != cur
        })
        .collect()
}

/// Leftmost, rightmost, lowest and highest vertices of a cornerless contour.
fn contour_extrema(v: &[Point]) -> Vec<usize> {
    if v.len() < 4 {
        return Vec::new();
    }
    let pick = |better: fn(Point, Point) -> bool| {
        (1..v.len()).fold(0, |best, j| if better(v[j], v[best]) { j } else { best })
    };
    let mut out = vec![
        pick(|a, b| a.x < b.x),
        pick(|a, b| a.x > b.x),
        pick(|a, b| a.y < b.y),
        pick(|a, b| a.y > b.y),
    ];
    out.sort_unstable();
    out.dedup();
    out
}

/// Interior vertices of `start..end` that stick out past both ends by
/// a meaningful amount, at most one per direction.
fn section_extrema(v: &[Point], start: usize, end: usize) -> Vec<usize> {
    let total = v.len();
    let (s, e) = (v[start], v[end]);
    let (base_min_x, base_max_x) = (s.x.min(e.x), s.x.max(e.x));
    let (base_min_y, base_max_y) = (s.y.min(e.y), s.y.max(e.y));
    let min_protrusion = MIN_PROTRUSION_ABS.min(s.distance(e) * MIN_PROTRUSION_REL).max(0.5);

    // (value, index) of the most extreme vertex in each direction.
    let mut min_x = (base_min_x, None);
    let mut max_x = (base_max_x, None);
    let mut min_y = (base_min_y, None);
    let mut max_y = (base_max_y, None);
    let mut i = (start + 1) % total;
    while i != end {
        let p = v[i];
        if p.x < min_x.0 {
            min_x = (p.x, Some(i));
        }
        if p.x > max_x.0 {
            max_x = (p.x, Some(i));
        }
        if p.y < min_y.0 {
            min_y = (p.y, Some(i));
        }
        if p.y > max_y.0 {
            max_y = (p.y, Some(i));
        }
        i = (i + 1) % total;
    }

    let mut out: Vec<usize> = [
        (base_min_x - min_x.0, min_x.1),
        (max_x.0 - base_max_x, max_x.1),
        (base_min_y - min_y.0, min_y.1),
        (max_y.0 - base_max_y, max_y.1),
    ]
    .into_iter()
    .filter_map(|(protrusion, idx)| idx.filter(|_| protrusion >= min_protrusion))
    .collect();
    out.sort_unstable();
    out.dedup();
    out
}

// ── Fitting ─────────────────────────────────────────────

fn fit_smooth_closed(points: &[Point]) -> BezPath {
    let mut polyline = BezPath::new();
    let Some((&first, rest)) = points.split_first() else {
        return polyline;
    };
    polyline.move_to(first);
    for &p in rest {
        polyline.line_to(p);
    }
    polyline.close_path();
    fit_to_bezpath_opt(
        &SimplifyBezPath::new(polyline.elements().iter().copied()),
        CLOSED_FIT_ACCURACY,
    )
}

/// One cubic through a run of points. Handle directions follow the end
/// tangents (snapped to horizontal/vertical when close); handle length
/// is the best of a few fractions of the chord.
fn fit_single_cubic(points: &[Point]) -> CubicBez {
    let n = points.len();
    let (p0, p3) = (points[0], points[n - 1]);
    let line = CubicBez::new(p0, p0.lerp(p3, 1.0 / 3.0), p0.lerp(p3, 2.0 / 3.0), p3);
    if n <= 2 {
        return line;
    }
    let t0 = points[1] - points[0];
    let t1 = points[n - 1] - points[n - 2];
    if t0.hypot() < 1e-10 || t1.hypot() < 1e-10 {
        return line;
    }
    let u0 = snap_tangent(t0 / t0.hypot());
    let u1 = snap_tangent(t1 / t1.hypot());

    let chord = p0.distance(p3);
    [0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5]
        .iter()
        .map(|&f| CubicBez::new(p0, p0 + u0 * (chord * f), p3 - u1 * (chord * f), p3))
        .map(|c| (polyline_deviation(&c, points), c))
        .fold(None, |best: Option<(f64, CubicBez)>, cand| match best {
            Some(b) if b.0 <= cand.0 => Some(b),
            _ => Some(cand),
        })
        .map_or(line, |(_, c)| c)
}

/// Largest distance from interior points to the curve, pairing point
/// `i` with parameter `i / (n - 1)`.
fn polyline_deviation(c: &CubicBez, points: &[Point]) -> f64 {
    let n = points.len();
    if n <= 2 {
        return 0.0;
    }
    (1..n - 1)
        .map(|i| c.eval(i as f64 / (n - 1) as f64).distance(points[i]))
        .fold(0.0, f64::max)
}

/// Within ~30 degrees of an axis: snap to it.
fn snap_tangent(u: Vec2) -> Vec2 {
    const TAN_30: f64 = 0.577;
    let (ax, ay) = (u.x.abs(), u.y.abs());
    if ax > ay && ay / ax < TAN_30 {
        Vec2::new(u.x.signum(), 0.0)
    } else if ay > ax && ax / ay < TAN_30 {
        Vec2::new(0.0, u.y.signum())
    } else {
        u
    }
}

/// Average each point with its neighbours. Open runs keep their ends.
fn laplacian_smooth(points: &[Point], iterations: usize, closed: bool) -> Vec<Point> {
    let n = points.len();
    if iterations == 0 || n < 3 {
        return points.to_vec();
    }
    let range = if closed { 0..n } else { 1..n - 1 };
    let mut pts = points.to_vec();
    for _ in 0..iterations {
        let prev = pts.clone();
        for i in range.clone() {
            let a = prev[(i + n - 1) % n].to_vec2();
            let b = prev[i].to_vec2();
            let c = prev[(i + 1) % n].to_vec2();
            pts[i] = ((a + b + c) / 3.0).to_point();
        }
    }
    pts
}

/// Straight enough for a line: deviation from the chord within 2% of
/// its length, and never less than 3 pixels of slack.
fn is_straight(points: &[Point]) -> bool {
    let n = points.len();
    let (a, b) = (points[0], points[n - 1]);
    collinear_deviation(points) <= (a.distance(b) * 0.02).max(3.0)
}

fn collinear_deviation(points: &[Point]) -> f64 {
    let n = points.len();
    if n <= 2 {
        return 0.0;
    }
    let (a, b) = (points[0], points[n - 1]);
    let chord = b - a;
    let len = chord.hypot();
    if len < 1e-10 {
        return points.iter().map(|p| p.distance(a)).fold(0.0, f64::max);
    }
    points[1..n - 1]
        .iter()
        .map(|&p| (p - a).cross(chord).abs() / len)
        .fold(0.0, f64::max)
}

/// Vertices `start..=end`, wrapping. `start == end` yields the full cycle.
fn extract_cyclic(points: &[Point], start: usize, end: usize) -> Vec<Point> {
    let total = points.len();
    let mut out = vec![points[start]];
    let mut i = (start + 1) % total;
    loop {
        out.push(points[i]);
        if i == end {
            break;
        }
        i = (i + 1) % total;
    }
    out
}

/// Corner measure at `vj`: how far it sits off the chord `vi`→`vk`,
/// relative to the axis-snapped normal, rescaled so 4/3 is the smoothest.
fn alpha(vi: Point, vj: Point, vk: Point) -> f64 {
    let chord = vk - vi;
    let dpara = (vj - vi).cross(chord);
    let normal = Vec2::new(-sign(chord.y), sign(chord.x));
    let ddenom = normal.y * chord.x - normal.x * chord.y;
    if ddenom.abs() < 1e-10 {
        return 4.0 / 3.0;
    }
    let dd = (dpara / ddenom).abs();
    let a = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
    a / 0.75
}

/// Like `f64::signum`, but 0 for zero.
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ── Line cleanup ────────────────────────────────────────

/// Snap nearly horizontal/vertical lines to the axis, then merge runs
/// of lines that continue along the same axis.
fn snap_and_merge_lines(path: &BezPath) -> BezPath {
    // A line counts as H/V when its minor delta is under 25% of the major.
    const HV_RATIO: f64 = 0.25;

    let mut snapped: Vec<PathEl> = Vec::with_capacity(path.elements().len());
    let mut cursor = Point::ZERO;
    for &el in path.elements() {
        match el {
            PathEl::LineTo(p) => {
                let (dx, dy) = ((p.x - cursor.x).abs(), (p.y - cursor.y).abs());
                let p = if dx > 0.0 && dy > 0.0 && dx / dy < HV_RATIO {
                    Point::new(cursor.x, p.y)
                } else if dx > 0.0 && dy > 0.0 && dy / dx < HV_RATIO {
                    Point::new(p.x, cursor.y)
                } else {
                    p
                };
                cursor = p;
                snapped.push(PathEl::LineTo(p));
            }
            PathEl::MoveTo(p) | PathEl::CurveTo(_, _, p) | PathEl::QuadTo(_, p) => {
                cursor = p;
                snapped.push(el);
            }
            PathEl::ClosePath => snapped.push(el),
        }
    }

    let mut out = BezPath::new();
    let mut cursor = Point::ZERO;
    let mut i = 0;
    while i < snapped.len() {
        let el = snapped[i];
        if let PathEl::LineTo(p) = el {
            let horizontal = (p.y - cursor.y).abs() < 1e-6;
            let vertical = (p.x - cursor.x).abs() < 1e-6;
            let mut end = p;
            if horizontal || vertical {
                while let Some(&PathEl::LineTo(next)) = snapped.get(i + 1) {
                    let same_axis = if horizontal {
                        (next.y - end.y).abs() < 1e-6
                    } else {
                        (next.x - end.x).abs() < 1e-6
                    };
                    if !same_axis {
                        break;
                    }
                    end = next;
                    i += 1;
                }
            }
            out.line_to(end);
            cursor = end;
        } else {
            if let PathEl::MoveTo(p) | PathEl::CurveTo(_, _, p) | PathEl::QuadTo(_, p) = el {
                cursor = p;
            }
            out.push(el);
        }
        i += 1;
    }
    out
}

// ── Curve merging ───────────────────────────────────────

/// Greedily merge runs of smoothly joined cubics that bend the same
/// way, as long as one cubic stays within `tolerance` of every curve
/// it replaces.
fn merge_curves(path: &BezPath, tolerance: f64) -> BezPath {
    if tolerance <= 0.0 {
        return path.clone();
    }
    let mut out = BezPath::new();
    // The merged curve under construction and the curves it replaces.
    let mut pending: Option<(CubicBez, Vec<CubicBez>)> = None;
    let mut cursor = Point::ZERO;

    let flush = |out: &mut BezPath, pending: &mut Option<(CubicBez, Vec<CubicBez>)>| {
        if let Some((c, _)) = pending.take() {
            out.curve_to(c.p1, c.p2, c.p3);
        }
    };

    for &el in path.elements() {
        match el {
            PathEl::CurveTo(a, b, p) => {
                let next = CubicBez::new(cursor, a, b, p);
                pending = Some(match pending.take() {
                    Some((merged, mut parts)) => match try_merge(&merged, &parts, &next, tolerance) {
                        Some(joined) => {
                            parts.push(next);
                            (joined, parts)
                        }
                        None => {
                            out.curve_to(merged.p1, merged.p2, merged.p3);
                            (next, vec![next])
                        }
                    },
                    None => (next, vec![next]),
                });
                cursor = p;
            }
            other => {
                flush(&mut out, &mut pending);
                if let PathEl::MoveTo(p) | PathEl::LineTo(p) | PathEl::QuadTo(_, p) = other {
                    cursor = p;
                }
                out.push(other);
            }
        }
    }
    flush(&mut out, &mut pending);
    out
}

/// One cubic replacing `merged` followed by `next`, or `None` when the
/// join has a kink, the bend flips, or the fit is too loose.
fn try_merge(merged: &CubicBez, parts: &[CubicBez], next: &CubicBez, tolerance: f64) -> Option<CubicBez> {
    let in_dir = merged.p3 - merged.p2;
    let out_dir = next.p1 - next.p0;
    if in_dir.hypot() < 1e-9 || out_dir.hypot() < 1e-9 {
        return None;
    }
    let cos = in_dir.dot(out_dir) / (in_dir.hypot() * out_dir.hypot());
    if cos < 0.99 {
        return None;
    }
    if bend(merged) * bend(next) <= 0.0 {
        return None;
    }

    let start = merged.p1 - merged.p0;
    let end = next.p3 - next.p2;
    if start.hypot() < 1e-9 || end.hypot() < 1e-9 {
        return None;
    }
    let (u0, u1) = (start / start.hypot(), end / end.hypot());
    let samples: Vec<Point> = parts
        .iter()
        .chain(std::iter::once(next))
        .flat_map(|c| (1..MERGE_SAMPLES).map(move |i| c.eval(i as f64 / MERGE_SAMPLES as f64)))
        .chain(parts.iter().skip(1).chain(std::iter::once(next)).map(|c| c.p0))
        .collect();

    let chord = merged.p0.distance(next.p3);
    let mut best: Option<(f64, CubicBez)> = None;
    for fa in [0.2, 0.3, 0.4, 0.5, 0.6, 0.7] {
        for fb in [0.2, 0.3, 0.4, 0.5, 0.6, 0.7] {
            let c = CubicBez::new(merged.p0, merged.p0 + u0 * (chord * fa), next.p3 - u1 * (chord * fb), next.p3);
            let dev = samples
                .iter()
                .map(|&s| c.nearest(s, 1e-6).distance_sq)
                .fold(0.0, f64::max)
                .sqrt();
            if best.as_ref().map_or(true, |(d, _)| dev < *d) {
                best = Some((dev, c));
            }
        }
    }
    best.filter(|(dev, _)| *dev <= tolerance).map(|(_, c)| c)
}

/// Signed turn from the start tangent to the end tangent.
fn bend(c: &CubicBez) -> f64 {
    let a = c.p1 - c.p0;
    let b = c.p3 - c.p2;
    let a = if a.hypot() < 1e-9 { c.p2 - c.p0 } else { a };
    let b = if b.hypot() < 1e-9 { c.p3 - c.p1 } else { b };
    a.cross(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    fn circle_polygon(n: usize, r: f64) -> Polygon {
        Polygon {
            vertices: (0..n)
                .map(|i| {
                    let t = i as f64 / n as f64 * std::f64::consts::TAU;
                    Point::new(50.0 + r * t.cos(), 50.0 + r * t.sin())
                })
                .collect(),
            outer: true,
        }
    }

    fn params() -> CurveParams {
        CurveParams::from_settings(&TracingSettings::default())
    }

    #[test]
    fn square_keeps_sharp_corners() {
        let poly = Polygon {
            vertices: vec![
                Point::new(0.0, 0.0),
                Point::new(80.0, 0.0),
                Point::new(80.0, 80.0),
                Point::new(0.0, 80.0),
            ],
            outer: true,
        };
        let path = polygon_to_bezpath(&poly, &params());
        assert!(path.elements().iter().all(|el| !matches!(el, PathEl::CurveTo(..))));
        assert!((path.area().abs() - 6400.0).abs() < 1e-6);
    }

    #[test]
    fn chamfered_corners_are_restored() {
        // An 80 px square whose corners were shaved off by blur.
        let poly = Polygon {
            vertices: vec![
                Point::new(2.0, 0.0),
                Point::new(78.0, 0.0),
                Point::new(80.0, 2.0),
                Point::new(80.0, 78.0),
                Point::new(78.0, 80.0),
                Point::new(2.0, 80.0),
                Point::new(0.0, 78.0),
                Point::new(0.0, 2.0),
            ],
            outer: true,
        };
        let path = polygon_to_bezpath(&poly, &params());
        assert!(path.elements().iter().all(|el| !matches!(el, PathEl::CurveTo(..))), "{path:?}");
        assert!((path.area().abs() - 6400.0).abs() < 1e-6);

        let keep_chamfers = CurveParams {
            corner_span: 0.0,
            ..params()
        };
        let shaved = polygon_to_bezpath(&poly, &keep_chamfers);
        assert!(shaved.area().abs() < 6400.0 - 1.0);
    }

    #[test]
    fn circle_becomes_curves() {
        let no_merge = CurveParams {
            opttolerance: 0.0,
            ..params()
        };
        let path = polygon_to_bezpath(&circle_polygon(40, 30.0), &no_merge);
        let curves = path.elements().iter().filter(|el| matches!(el, PathEl::CurveTo(..))).count();
        assert!(curves >= 2, "{path:?}");
        let expected = std::f64::consts::PI * 900.0;
        assert!((path.area().abs() - expected).abs() / expected < 0.05);
    }

    #[test]
    fn alpha_separates_corners_from_curves() {
        let corner = alpha(Point::new(0.0, 0.0), Point::new(40.0, 0.0), Point::new(40.0, 40.0));
        let flat = alpha(Point::new(0.0, 0.0), Point::new(20.0, 0.2), Point::new(40.0, 0.0));
        assert!(corner > 1.2);
        assert!(flat < 0.1);
    }

    #[test]
    fn merging_joins_split_arc() {
        // A quarter circle split in two at its midpoint.
        let k = 0.5522847498 * 50.0;
        let quarter = CubicBez::new((50.0, 0.0), (50.0, k), (k, 50.0), (0.0, 50.0));
        let (a, b) = quarter.subdivide();
        let mut path = BezPath::new();
        path.move_to(a.p0);
        path.curve_to(a.p1, a.p2, a.p3);
        path.curve_to(b.p1, b.p2, b.p3);
        path.line_to((0.0, 0.0));
        path.close_path();

        let merged = merge_curves(&path, 0.5);
        let curves = merged.elements().iter().filter(|el| matches!(el, PathEl::CurveTo(..))).count();
        assert_eq!(curves, 1);
        assert_eq!(merge_curves(&path, 0.0), path);
    }

    #[test]
    fn merging_keeps_kinks() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.curve_to((10.0, 10.0), (20.0, 10.0), (30.0, 0.0));
        path.curve_to((40.0, 10.0), (50.0, 10.0), (60.0, 0.0));
        path.close_path();
        assert_eq!(merge_curves(&path, 5.0), path);
    }
}
