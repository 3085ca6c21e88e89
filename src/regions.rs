//! Connected-component region detection on a binary character sheet.
//!
//! 1. 4-connected flood fill labels every ink component (bbox + pixel count).
//! 2. Components that are too small, too large, too elongated or too
//!    sparse are discarded as noise or frame artifacts.
//! 3. Survivors are ordered into reading order: rows, then left-to-right.
//! 4. Stacked parts of one glyph (the dot of an `i`, accents) are merged.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Binary pixels brighter than this are ink.
const INK_LEVEL: u8 = 127;

/// An axis-aligned pixel rectangle with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelBox {
    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x) + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y) + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) as f64 / 2.0,
            (self.min_y + self.max_y) as f64 / 2.0,
        )
    }

    pub fn max_dimension(&self) -> u32 {
        self.width().max(self.height())
    }

    pub fn union(&self, other: &PixelBox) -> PixelBox {
        PixelBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Intersect with a `width` x `height` image. `None` when the box is
    /// inverted or lies entirely outside.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelBox> {
        if self.max_x < self.min_x || self.max_y < self.min_y {
            return None;
        }
        if width == 0 || height == 0 || self.min_x >= width || self.min_y >= height {
            return None;
        }
        Some(PixelBox {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x.min(width - 1),
            max_y: self.max_y.min(height - 1),
        })
    }
}

impl fmt::Display for PixelBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})-({}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// The area of a source bitmap that holds one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Rect(PixelBox),
    /// Ordered polygon vertices in source pixel coordinates.
    Polygon(Vec<(f64, f64)>),
}

/// A character's location on a sheet plus the code point it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRegion {
    pub id: String,
    /// Index into the request's bitmap list.
    pub bitmap: usize,
    pub boundary: Boundary,
    /// Unassigned for freshly detected regions.
    #[serde(default)]
    pub codepoint: Option<char>,
}

impl CharacterRegion {
    pub fn rect(id: impl Into<String>, bitmap: usize, bounds: PixelBox, codepoint: char) -> Self {
        Self {
            id: id.into(),
            bitmap,
            boundary: Boundary::Rect(bounds),
            codepoint: Some(codepoint),
        }
    }
}

/// A labelled ink component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub bounds: PixelBox,
    pub pixel_count: u64,
}

impl Component {
    /// Ink pixels per bounding-box pixel.
    pub fn density(&self) -> f64 {
        self.pixel_count as f64 / self.bounds.area() as f64
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.bounds.width() as f64 / self.bounds.height() as f64
    }

    fn merge(&self, other: &Component) -> Component {
        Component {
            bounds: self.bounds.union(&other.bounds),
            pixel_count: self.pixel_count + other.pixel_count,
        }
    }

    /// Unassigned region covering this component's box.
    pub fn to_region(&self, id: impl Into<String>, bitmap: usize) -> CharacterRegion {
        CharacterRegion {
            id: id.into(),
            bitmap,
            boundary: Boundary::Rect(self.bounds),
            codepoint: None,
        }
    }
}

/// Filtering and ordering thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum width and height in pixels.
    pub min_size: u32,
    /// Maximum bounding-box area as a fraction of the image area. Area,
    /// not width or height: a glyph cropped tightly still spans most of
    /// its own image along both axes.
    pub max_fraction: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_density: f64,
    /// Components whose vertical centers differ by less than this share a row.
    pub row_tolerance: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_size: 5,
            max_fraction: 0.6,
            min_aspect: 0.1,
            max_aspect: 10.0,
            min_density: 0.1,
            row_tolerance: 10.0,
        }
    }
}

/// Label 4-connected ink components in raster order.
pub fn label_components(binary: &GrayImage) -> Vec<Component> {
    let (w, h) = binary.dimensions();
    let (w, h) = (w as usize, h as usize);
    let ink: Vec<bool> = binary.pixels().map(|p| p.0[0] > INK_LEVEL).collect();
    let mut visited = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();

    for start in 0..w * h {
        if !ink[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut bounds = PixelBox {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
        };
        let mut count = 0u64;

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            count += 1;
            bounds.min_x = bounds.min_x.min(x as u32);
            bounds.min_y = bounds.min_y.min(y as u32);
            bounds.max_x = bounds.max_x.max(x as u32);
            bounds.max_y = bounds.max_y.max(y as u32);

            let mut visit = |n: usize| {
                if ink[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }

        components.push(Component {
            bounds,
            pixel_count: count,
        });
    }

    components
}

/// Whether a component looks like (part of) a glyph.
pub fn passes_filters(c: &Component, image_w: u32, image_h: u32, params: &DetectionParams) -> bool {
    let (w, h) = (c.bounds.width(), c.bounds.height());
    if w < params.min_size || h < params.min_size {
        return false;
    }
    let image_area = image_w as f64 * image_h as f64;
    if c.bounds.area() as f64 > image_area * params.max_fraction {
        return false;
    }
    let aspect = c.aspect_ratio();
    if aspect < params.min_aspect || aspect > params.max_aspect {
        return false;
    }
    c.density() >= params.min_density
}

/// Sort into reading order: rows by vertical center, then left to right.
pub fn reading_order(components: &mut [Component], row_tolerance: f64) {
    components.sort_by(|a, b| a.bounds.center().1.total_cmp(&b.bounds.center().1));

    let mut row_start = 0;
    while row_start < components.len() {
        let anchor = components[row_start].bounds.center().1;
        let mut row_end = row_start + 1;
        while row_end < components.len()
            && components[row_end].bounds.center().1 - anchor < row_tolerance
        {
            row_end += 1;
        }
        components[row_start..row_end]
            .sort_by(|a, b| a.bounds.center().0.total_cmp(&b.bounds.center().0));
        row_start = row_end;
    }
}

/// Pieces of one glyph. Either their centres lie within half the larger
/// part's max dimension, or they are stacked: the smaller part sits
/// horizontally within the larger part's extent and the vertical gap is
/// at most that same half dimension (the dot over a tall stem).
fn belong_together(a: &Component, b: &Component) -> bool {
    let (large, small) = if (a.bounds.max_dimension(), a.pixel_count) >= (b.bounds.max_dimension(), b.pixel_count) {
        (a, b)
    } else {
        (b, a)
    };
    let reach = large.bounds.max_dimension() as f64 / 2.0;
    let (lx, ly) = large.bounds.center();
    let (sx, sy) = small.bounds.center();
    if (lx - sx).hypot(ly - sy) <= reach {
        return true;
    }

    if sx < large.bounds.min_x as f64 || sx > large.bounds.max_x as f64 {
        return false;
    }
    let gap = if small.bounds.max_y < large.bounds.min_y {
        (large.bounds.min_y - small.bounds.max_y) as f64
    } else if small.bounds.min_y > large.bounds.max_y {
        (small.bounds.min_y - large.bounds.max_y) as f64
    } else {
        0.0
    };
    gap <= reach
}

/// Merge multi-part glyphs. A merge that would drop the union's density
/// below `min_density` is not performed.
fn merge_parts(components: &mut Vec<Component>, min_density: f64) {
    let mut i = 0;
    while i < components.len() {
        let mut merged_any = false;
        let mut j = i + 1;
        while j < components.len() {
            if belong_together(&components[i], &components[j]) {
                let merged = components[i].merge(&components[j]);
                if merged.density() >= min_density {
                    tracing::debug!(
                        "merging {} into {}",
                        components[j].bounds,
                        components[i].bounds
                    );
                    components[i] = merged;
                    components.remove(j);
                    merged_any = true;
                    continue;
                }
            }
            j += 1;
        }
        // A grown box may now reach parts that were skipped earlier.
        if !merged_any {
            i += 1;
        }
    }
}

/// Full detection pass: label → filter → order → merge → re-order.
pub fn detect_regions(binary: &GrayImage, params: &DetectionParams) -> Vec<Component> {
    let (w, h) = binary.dimensions();
    let labelled = label_components(binary);
    let total = labelled.len();
    let mut components: Vec<Component> = labelled
        .into_iter()
        .filter(|c| passes_filters(c, w, h, params))
        .collect();
    reading_order(&mut components, params.row_tolerance);
    merge_parts(&mut components, params.min_density);
    reading_order(&mut components, params.row_tolerance);
    tracing::info!(
        "detected {} regions ({} components labelled)",
        components.len(),
        total
    );
    components
}
