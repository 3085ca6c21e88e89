//! Shared geometry utilities.

use kurbo::{BezPath, PathEl, Point};

/// Shoelace area of a closed polygon. Positive = counter-clockwise (y-up).
pub fn polygon_area(points: &[Point]) -> f64 {
    let Some(&last) = points.last() else {
        return 0.0;
    };
    let (twice, _) = points.iter().fold((0.0, last), |(acc, prev), &p| (acc + prev.x * p.y - p.x * prev.y, p));
    twice / 2.0
}

/// Signed area of one contour, measured on its on-curve points only.
pub fn signed_area(path: &BezPath) -> f64 {
    polygon_area(&on_curve_points(path))
}

/// Ray-casting point-in-polygon test.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Extract on-curve points from a BezPath as a polygon.
pub fn on_curve_points(path: &BezPath) -> Vec<Point> {
    path.elements()
        .iter()
        .filter_map(|el| match *el {
            PathEl::MoveTo(p)
            | PathEl::LineTo(p)
            | PathEl::CurveTo(_, _, p)
            | PathEl::QuadTo(_, p) => Some(p),
            PathEl::ClosePath => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccw_square_has_positive_area() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        path.line_to((0.0, 10.0));
        path.close_path();
        assert_eq!(signed_area(&path), 100.0);
        let mut reversed = on_curve_points(&path);
        reversed.reverse();
        assert_eq!(polygon_area(&reversed), -100.0);
        let poly = on_curve_points(&path);
        assert!(point_in_polygon(Point::new(5.0, 5.0), &poly));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &poly));
    }
}
