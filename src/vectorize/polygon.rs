//! Optimal polygon approximation of a pixel boundary.
//!
//! Finds the polygon with the fewest vertices whose edges stay within
//! half a pixel of the boundary, breaks ties by least squared error,
//! then nudges each vertex to its best sub-pixel position.
//!
//! 1. Prefix sums give line-fit statistics for any run in O(1).
//! 2. For every point, the furthest point reachable by a straight edge.
//! 3. Dynamic programming over those reaches.
//! 4. Vertex refinement against the two adjacent fitted lines.

use kurbo::Point;

use super::decompose::PixelContour;

/// Moments of a run of boundary points, relative to the first point.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    x: f64,
    y: f64,
    xx: f64,
    xy: f64,
    yy: f64,
}

impl std::ops::Sub for Moments {
    type Output = Moments;
    fn sub(self, o: Moments) -> Moments {
        Moments {
            x: self.x - o.x,
            y: self.y - o.y,
            xx: self.xx - o.xx,
            xy: self.xy - o.xy,
            yy: self.yy - o.yy,
        }
    }
}

impl std::ops::Add for Moments {
    type Output = Moments;
    fn add(self, o: Moments) -> Moments {
        Moments {
            x: self.x + o.x,
            y: self.y + o.y,
            xx: self.xx + o.xx,
            xy: self.xy + o.xy,
            yy: self.yy + o.yy,
        }
    }
}

/// Cyclic prefix sums over a closed boundary.
struct PrefixSums {
    sums: Vec<Moments>,
    origin: (i32, i32),
}

impl PrefixSums {
    fn new(pt: &[(i32, i32)]) -> Self {
        let origin = pt[0];
        let mut sums = Vec::with_capacity(pt.len() + 1);
        let mut acc = Moments::default();
        sums.push(acc);
        for &(px, py) in pt {
            let x = (px - origin.0) as f64;
            let y = (py - origin.1) as f64;
            acc = acc
                + Moments {
                    x,
                    y,
                    xx: x * x,
                    xy: x * y,
                    yy: y * y,
                };
            sums.push(acc);
        }
        Self { sums, origin }
    }

    fn len(&self) -> usize {
        self.sums.len() - 1
    }

    /// Moments of the cyclic run `i..=j` and its step count (`j - i`,
    /// wrapping). `None` for an empty run.
    fn run(&self, i: usize, j: usize) -> Option<(Moments, f64)> {
        let n = self.len();
        let jn = j % n;
        let (moments, steps) = if jn >= i {
            (self.sums[jn + 1] - self.sums[i], jn - i)
        } else {
            (self.sums[jn + 1] - self.sums[i] + self.sums[n], jn + n - i)
        };
        (steps > 0).then_some((moments, steps as f64))
    }
}

/// Optimal polygon of one boundary, vertices in pixel-corner space.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub vertices: Vec<Point>,
    pub outer: bool,
}

/// Fit the optimal polygon to a boundary.
pub fn optimal_polygon(contour: &PixelContour) -> Polygon {
    let pt = &contour.points;
    if pt.len() < 4 {
        return Polygon {
            vertices: pt.iter().map(|&(x, y)| Point::new(x as f64, y as f64)).collect(),
            outer: contour.outer,
        };
    }

    let sums = PrefixSums::new(pt);
    let reach = straight_reach(pt);
    let indices = best_polygon(pt, &reach, &sums);
    Polygon {
        vertices: refine_vertices(pt, &indices, &sums),
        outer: contour.outer,
    }
}

// ── Straight runs ────────────────────────────────────────

/// For every point, the furthest later point such that the boundary
/// between them stays within half a pixel of one straight line.
///
/// Walks forward keeping two constraint vectors that bound the set of
/// admissible directions; a run ends when all four axis directions
/// have been seen or a point falls outside the wedge.
fn straight_reach(pt: &[(i32, i32)]) -> Vec<usize> {
    let n = pt.len();

    // Next index at which the boundary has moved on both axes.
    let mut next_corner = vec![0usize; n];
    let mut k = 0usize;
    for i in (0..n).rev() {
        if pt[i].0 != pt[k % n].0 && pt[i].1 != pt[k % n].1 {
            k = i + 1;
        }
        next_corner[i] = k;
    }

    let mut pivot = vec![0usize; n];
    for i in (0..n).rev() {
        let mut seen = [false; 4];
        let mut constraint = [(0i32, 0i32); 2];

        let i1 = (i + 1) % n;
        seen[direction_index(pt[i1].0 - pt[i].0, pt[i1].1 - pt[i].1)] = true;

        let mut k = next_corner[i];
        let mut k1 = i;
        loop {
            let step = (sign(pt[k % n].0 - pt[k1 % n].0), sign(pt[k % n].1 - pt[k1 % n].1));
            seen[direction_index(step.0, step.1)] = true;
            if seen.iter().all(|&s| s) {
                pivot[i] = k1 % n;
                break;
            }

            let cur = (pt[k % n].0 - pt[i].0, pt[k % n].1 - pt[i].1);
            if cross(constraint[0], cur) < 0 || cross(constraint[1], cur) > 0 {
                pivot[i] = exit_point(pt, &constraint, k, k1, i);
                break;
            }

            if cur.0.abs() > 1 || cur.1.abs() > 1 {
                let lo = (
                    cur.0 + if cur.1 >= 0 && (cur.1 > 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 <= 0 && (cur.0 < 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if cross(constraint[0], lo) >= 0 {
                    constraint[0] = lo;
                }
                let hi = (
                    cur.0 + if cur.1 <= 0 && (cur.1 < 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 >= 0 && (cur.0 > 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if cross(constraint[1], hi) <= 0 {
                    constraint[1] = hi;
                }
            }

            k1 = k;
            k = next_corner[k1 % n];
            if !cyclic(k % n, i, k1 % n) {
                pivot[i] = exit_point(pt, &constraint, k, k1, i);
                break;
            }
        }
    }

    // Make the reach monotone, then repair the wrap-around.
    let mut reach = vec![0usize; n];
    let mut j = pivot[n - 1];
    reach[n - 1] = j;
    for i in (0..n - 1).rev() {
        if cyclic(i + 1, pivot[i], j) {
            j = pivot[i];
        }
        reach[i] = j;
    }
    let mut i = n - 1;
    while cyclic((i + 1) % n, j, reach[i]) {
        reach[i] = j;
        if i == 0 {
            break;
        }
        i -= 1;
    }

    reach
}

/// Index where the straight run from `i` leaves the wedge, found by
/// stepping from `k1` in the direction of `k`.
fn exit_point(pt: &[(i32, i32)], constraint: &[(i32, i32); 2], k: usize, k1: usize, i: usize) -> usize {
    let n = pt.len();
    let step = (sign(pt[k % n].0 - pt[k1 % n].0), sign(pt[k % n].1 - pt[k1 % n].1));
    let cur = (pt[k1 % n].0 - pt[i].0, pt[k1 % n].1 - pt[i].1);
    let a = cross(constraint[0], cur);
    let b = cross(constraint[0], step);
    let c = cross(constraint[1], cur);
    let d = cross(constraint[1], step);

    let mut j = i64::from(i32::MAX);
    if b < 0 {
        j = floor_div(a, -b);
    }
    if d > 0 {
        j = j.min(floor_div(-c, d));
    }
    (k1 as i64 + j).rem_euclid(n as i64) as usize
}

// ── Dynamic programming ─────────────────────────────────

/// Boundary indices of the optimal polygon: fewest segments, then
/// least total penalty.
fn best_polygon(pt: &[(i32, i32)], reach: &[usize], sums: &PrefixSums) -> Vec<usize> {
    let n = pt.len();

    // Furthest index each point may connect to, unwrapped.
    let clip0: Vec<usize> = (0..n)
        .map(|i| {
            let prev = if i == 0 { n - 1 } else { i - 1 };
            let mut c = (reach[prev] as i64 - 1).rem_euclid(n as i64) as usize;
            if c == i {
                c = (i + 1) % n;
            }
            if c < i {
                n
            } else {
                c
            }
        })
        .collect();

    // Earliest index that can connect to each point.
    let mut clip1 = vec![0usize; n + 1];
    let mut j = 1usize;
    for (i, &c) in clip0.iter().enumerate() {
        while j <= c {
            clip1[j] = i;
            j += 1;
        }
    }

    // Greedy walks forward and backward bound the DP window per segment.
    let mut seg0 = vec![0usize; n + 1];
    let mut i = 0usize;
    let mut m = 0usize;
    while i < n {
        seg0[m] = i;
        i = clip0[i];
        m += 1;
    }
    seg0[m] = n;

    let mut seg1 = vec![0usize; m + 1];
    let mut i = n;
    for j in (1..=m).rev() {
        seg1[j] = i;
        i = clip1[i];
    }

    let mut pen = vec![-1.0f64; n + 1];
    let mut prev = vec![0usize; n + 1];
    pen[0] = 0.0;
    for j in 1..=m {
        for i in seg1[j]..=seg0[j] {
            let mut best = -1.0f64;
            let (hi, lo) = (seg0[j - 1], clip1[i]);
            if hi >= lo {
                for k in (lo..=hi).rev() {
                    if pen[k] < 0.0 {
                        continue;
                    }
                    let candidate = pen[k] + penalty(pt, sums, k, i);
                    if best < 0.0 || candidate < best {
                        prev[i] = k;
                        best = candidate;
                    }
                }
            }
            pen[i] = best;
        }
    }

    let mut indices = vec![0usize; m];
    let mut i = n;
    for slot in indices.iter_mut().rev() {
        i = prev[i];
        *slot = i;
    }
    indices
}

/// RMS distance of the run `i..j` from the chord between its ends.
fn penalty(pt: &[(i32, i32)], sums: &PrefixSums, i: usize, j: usize) -> f64 {
    let Some((s, k)) = sums.run(i, j) else {
        return 0.0;
    };
    let jn = j % pt.len();
    let (x0, y0) = sums.origin;

    let px = (pt[i].0 + pt[jn].0) as f64 / 2.0 - x0 as f64;
    let py = (pt[i].1 + pt[jn].1) as f64 / 2.0 - y0 as f64;
    let ey = (pt[jn].0 - pt[i].0) as f64;
    let ex = -(pt[jn].1 - pt[i].1) as f64;

    let a = (s.xx - 2.0 * s.x * px) / k + px * px;
    let b = (s.xy - s.x * py - s.y * px) / k + px * py;
    let c = (s.yy - 2.0 * s.y * py) / k + py * py;

    (ex * ex * a + 2.0 * ex * ey * b + ey * ey * c).max(0.0).sqrt()
}

// ── Vertex refinement ───────────────────────────────────

/// Squared distance to a line as a quadratic form in (x, y, 1).
#[derive(Debug, Clone, Copy, Default)]
struct QuadForm([[f64; 3]; 3]);

impl QuadForm {
    fn for_line(center: Point, dir: (f64, f64)) -> Self {
        let len2 = dir.0 * dir.0 + dir.1 * dir.1;
        if len2 < 1e-10 {
            return Self::default();
        }
        let v = [dir.1, -dir.0, -(dir.1 * center.x - dir.0 * center.y)];
        let mut q = [[0.0; 3]; 3];
        for (r, row) in q.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = v[r] * v[c] / len2;
            }
        }
        Self(q)
    }

    fn eval(&self, x: f64, y: f64) -> f64 {
        let p = [x, y, 1.0];
        let mut total = 0.0;
        for r in 0..3 {
            for c in 0..3 {
                total += p[r] * self.0[r][c] * p[c];
            }
        }
        total
    }

    /// Minimiser inside the unit box centred on `s`.
    fn minimize_near(&self, s: Point) -> Point {
        let q = &self.0;
        let det = q[0][0] * q[1][1] - q[0][1] * q[1][0];
        if det.abs() >= 1e-10 {
            let w = Point::new(
                (-q[0][2] * q[1][1] + q[1][2] * q[0][1]) / det,
                (q[0][2] * q[1][0] - q[1][2] * q[0][0]) / det,
            );
            if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
                return w;
            }
        } else {
            return s;
        }

        // Best point on the box boundary.
        let (lo_x, hi_x, lo_y, hi_y) = (s.x - 0.5, s.x + 0.5, s.y - 0.5, s.y + 0.5);
        let mut best = s;
        let mut best_val = self.eval(s.x, s.y);
        let mut consider = |x: f64, y: f64| {
            let v = self.eval(x, y);
            if v < best_val {
                best_val = v;
                best = Point::new(x, y);
            }
        };
        for x in [lo_x, hi_x] {
            if q[1][1].abs() > 1e-10 {
                consider(x, (-(q[1][0] * x + q[1][2]) / q[1][1]).clamp(lo_y, hi_y));
            }
            consider(x, lo_y);
            consider(x, hi_y);
        }
        for y in [lo_y, hi_y] {
            if q[0][0].abs() > 1e-10 {
                consider((-(q[0][1] * y + q[0][2]) / q[0][0]).clamp(lo_x, hi_x), y);
            }
        }
        best
    }
}

impl std::ops::Add for QuadForm {
    type Output = QuadForm;
    fn add(self, o: QuadForm) -> QuadForm {
        let mut q = self.0;
        for (r, row) in q.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell += o.0[r][c];
            }
        }
        QuadForm(q)
    }
}

/// Move each vertex (within half a pixel) to the point closest to both
/// adjacent best-fit lines.
fn refine_vertices(pt: &[(i32, i32)], indices: &[usize], sums: &PrefixSums) -> Vec<Point> {
    let m = indices.len();
    (0..m)
        .map(|i| {
            let before = indices[(i + m - 1) % m];
            let here = indices[i];
            let after = indices[(i + 1) % m];
            let (ca, da) = fit_line(pt, sums, before, here);
            let (cb, db) = fit_line(pt, sums, here, after);
            let q = QuadForm::for_line(ca, da) + QuadForm::for_line(cb, db);
            q.minimize_near(Point::new(pt[here].0 as f64, pt[here].1 as f64))
        })
        .collect()
}

/// Centroid and principal direction of the run `a..b`.
fn fit_line(pt: &[(i32, i32)], sums: &PrefixSums, a: usize, b: usize) -> (Point, (f64, f64)) {
    let Some((s, k)) = sums.run(a, b) else {
        return (Point::new(pt[a].0 as f64, pt[a].1 as f64), (1.0, 0.0));
    };
    let (x0, y0) = sums.origin;
    let center = Point::new(s.x / k + x0 as f64, s.y / k + y0 as f64);

    let a_cov = (s.xx - s.x * s.x / k) / k;
    let b_cov = (s.xy - s.x * s.y / k) / k;
    let c_cov = (s.yy - s.y * s.y / k) / k;

    // Eigenvector of the larger eigenvalue.
    let lambda = (a_cov + c_cov + ((a_cov - c_cov).powi(2) + 4.0 * b_cov * b_cov).sqrt()) / 2.0;
    let (a2, c2) = (a_cov - lambda, c_cov - lambda);
    let (dx, dy) = if a2.abs() >= c2.abs() { (-b_cov, a2) } else { (-c2, b_cov) };
    let len = dx.hypot(dy);
    let dir = if len > 1e-10 { (dx / len, dy / len) } else { (1.0, 0.0) };
    (center, dir)
}

// ── Helpers ─────────────────────────────────────────────

/// 0 = west, 1 = south, 2 = north, 3 = east.
fn direction_index(dx: i32, dy: i32) -> usize {
    ((3 + 3 * dx + dy) / 2) as usize
}

fn cross(a: (i32, i32), b: (i32, i32)) -> i64 {
    a.0 as i64 * b.1 as i64 - a.1 as i64 * b.0 as i64
}

fn sign(x: i32) -> i32 {
    x.signum()
}

fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

/// Whether `b` lies in the cyclic half-open interval `[a, c)`.
fn cyclic(a: usize, b: usize, c: usize) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}
