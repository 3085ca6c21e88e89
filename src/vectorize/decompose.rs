//! Boundary extraction on the pixel-corner grid.
//!
//! Paths run between pixels, not through their centres, and every
//! traced boundary has its interior XOR-flipped so nested shapes are
//! found in raster order as alternating outer / hole contours.

use image::GrayImage;

/// A closed boundary on the pixel-corner grid (y-up, (0, 0) is the
/// bottom-left corner of the image).
#[derive(Debug, Clone)]
pub struct PixelContour {
    pub points: Vec<(i32, i32)>,
    /// True for an ink boundary, false for a hole.
    pub outer: bool,
}

impl PixelContour {
    /// Signed enclosed area in square pixels (shoelace).
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();
        twice as f64 / 2.0
    }
}

/// Working copy of the ink mask, stored bottom row first.
struct InkGrid {
    cells: Vec<bool>,
    width: i32,
    height: i32,
}

impl InkGrid {
    fn new(binary: &GrayImage) -> Self {
        let (w, h) = binary.dimensions();
        let (width, height) = (w as i32, h as i32);
        let mut cells = vec![false; (w as usize) * (h as usize)];
        for (x, y, px) in binary.enumerate_pixels() {
            let row = height - 1 - y as i32;
            cells[(row * width + x as i32) as usize] = px.0[0] > 0;
        }
        Self { cells, width, height }
    }

    fn get(&self, x: i32, y: i32) -> bool {
        (0..self.width).contains(&x)
            && (0..self.height).contains(&y)
            && self.cells[(y * self.width + x) as usize]
    }

    /// Flip every cell of row `y` from column `x` to the right edge.
    fn flip_row_from(&mut self, x: i32, y: i32) {
        if !(0..self.height).contains(&y) {
            return;
        }
        let row = (y * self.width) as usize;
        for cell in &mut self.cells[row + x.max(0) as usize..row + self.width as usize] {
            *cell = !*cell;
        }
    }
}

/// Extract every closed boundary of the ink in `binary` (non-zero = ink).
///
/// Contours come out in raster order (top row first), each outer
/// boundary before the holes it contains. Every path runs
/// counter-clockwise; [`PixelContour::outer`] tells outlines from holes.
pub fn decompose(binary: &GrayImage) -> Vec<PixelContour> {
    let original = InkGrid::new(binary);
    let mut grid = InkGrid::new(binary);
    let mut contours = Vec::new();

    for y in (0..grid.height).rev() {
        for x in 0..grid.width {
            if !grid.get(x, y) {
                continue;
            }
            // Still set in the untouched mask: ink. Otherwise a hole
            // that an enclosing boundary flipped on.
            let outer = original.get(x, y);
            let contour = follow(&grid, x, y + 1, outer);
            flip_interior(&mut grid, &contour);
            contours.push(contour);
        }
    }

    contours
}

/// Walk one boundary from corner (x0, y0), heading down the left edge
/// of the pixel below-right of it, with set cells on the left.
/// Ambiguous diagonal crossings turn right.
fn follow(grid: &InkGrid, x0: i32, y0: i32, outer: bool) -> PixelContour {
    let mut points = Vec::new();
    let (mut x, mut y) = (x0, y0);
    let (mut dx, mut dy) = (0i32, -1i32);

    loop {
        points.push((x, y));
        x += dx;
        y += dy;
        if (x, y) == (x0, y0) {
            break;
        }

        // The two cells ahead: right and left of the direction of travel.
        let right = grid.get(x + (dx + dy - 1) / 2, y + (dy - dx - 1) / 2);
        let left = grid.get(x + (dx - dy - 1) / 2, y + (dy + dx - 1) / 2);

        (dx, dy) = match (right, left) {
            (true, _) => (dy, -dx),
            (false, false) => (-dy, dx),
            (false, true) => (dx, dy),
        };
    }

    PixelContour { points, outer }
}

/// Invert everything enclosed by `contour`: each vertical step toggles
/// its row to the right edge, and pairs of toggles cancel outside.
fn flip_interior(grid: &mut InkGrid, contour: &PixelContour) {
    let Some(&(_, last_y)) = contour.points.last() else {
        return;
    };
    let mut prev_y = last_y;
    for &(x, y) in &contour.points {
        if y != prev_y {
            grid.flip_row_from(x, y.min(prev_y));
        }
        prev_y = y;
    }
}
