//! Map traced pixel-space outlines into font units.
//!
//! One [`NormalizationTransform`] is computed per glyph from the tight
//! bounds of every anchor and control point, then applied to all of
//! them. Partial transforms would bend curves and can make contours
//! self-intersect, so nothing else in the crate scales outlines.

use kurbo::{Affine, Point, Rect};

use crate::vectorize::direction;
use crate::outline::{GlyphOutline, PathCommand, RawCommand};

/// Vertical axis convention of the incoming coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YAxis {
    /// Image convention: y grows downward (traced path data).
    Down,
    /// Font convention: y grows upward.
    Up,
}

/// Where the glyph should land vertically in font units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeTarget {
    /// Height the ink bounds are scaled to.
    pub height: f64,
    /// Y of the bottom of the ink bounds after scaling.
    pub bottom: f64,
}

impl NormalizeTarget {
    /// Default frame: the nominal cap height (70% of the em) on the baseline.
    pub fn cap_height(units_per_em: u16) -> Self {
        Self {
            height: 0.7 * units_per_em as f64,
            bottom: 0.0,
        }
    }
}

/// Uniform scale, optional vertical flip, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationTransform {
    pub scale: f64,
    pub flip_y: bool,
    pub translate: (f64, f64),
}

impl NormalizationTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        flip_y: false,
        translate: (0.0, 0.0),
    };

    /// Transform mapping `bounds` to x = 0 at the left edge and to
    /// `target` vertically.
    ///
    /// Returns `None` for bounds with no height.
    pub fn fit(bounds: Rect, target: NormalizeTarget, axis: YAxis) -> Option<Self> {
        let height = bounds.height();
        if !(height > 0.0) || !height.is_finite() || !(target.height > 0.0) {
            return None;
        }
        let scale = target.height / height;
        let tx = -bounds.x0 * scale;
        let (flip_y, ty) = match axis {
            // y' = (y1 - y) * s + bottom
            YAxis::Down => (true, bounds.y1 * scale + target.bottom),
            // y' = (y - y0) * s + bottom
            YAxis::Up => (false, target.bottom - bounds.y0 * scale),
        };
        Some(Self {
            scale,
            flip_y,
            translate: (tx, ty),
        })
    }

    pub fn apply(&self, p: Point) -> Point {
        let y = if self.flip_y { -p.y } else { p.y };
        Point::new(p.x * self.scale + self.translate.0, y * self.scale + self.translate.1)
    }

    pub fn to_affine(&self) -> Affine {
        let sy = if self.flip_y { -self.scale } else { self.scale };
        Affine::new([self.scale, 0.0, 0.0, sy, self.translate.0, self.translate.1])
    }
}

/// A normalised glyph plus what happened on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub outline: GlyphOutline,
    pub transform: NormalizationTransform,
    pub warnings: Vec<String>,
}

/// Resolve a raw stream (absolute and relative forms) into typed
/// absolute commands. Commands with the wrong operand count or an
/// unknown letter are dropped with a warning.
pub fn resolve_commands(raw: &[RawCommand]) -> (Vec<PathCommand>, Vec<String>) {
    let mut out = Vec::with_capacity(raw.len());
    let mut warnings = Vec::new();
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;

    for cmd in raw {
        let Some(arity) = RawCommand::arity(cmd.op) else {
            warnings.push(format!("dropped unknown command '{}'", cmd.op));
            continue;
        };
        if cmd.args.len() != arity || cmd.args.iter().any(|a| !a.is_finite()) {
            warnings.push(format!(
                "dropped '{}' with {} operands (expected {})",
                cmd.op,
                cmd.args.len(),
                arity
            ));
            continue;
        }
        let relative = cmd.op.is_ascii_lowercase();
        let base = if relative { current } else { Point::ZERO };
        let pt = |i: usize| Point::new(base.x + cmd.args[i], base.y + cmd.args[i + 1]);
        match cmd.op.to_ascii_uppercase() {
            'M' => {
                let p = pt(0);
                out.push(PathCommand::MoveTo(p));
                current = p;
                start = p;
            }
            'L' => {
                let p = pt(0);
                out.push(PathCommand::LineTo(p));
                current = p;
            }
            'H' => {
                let x = if relative { current.x + cmd.args[0] } else { cmd.args[0] };
                let p = Point::new(x, current.y);
                out.push(PathCommand::LineTo(p));
                current = p;
            }
            'V' => {
                let y = if relative { current.y + cmd.args[0] } else { cmd.args[0] };
                let p = Point::new(current.x, y);
                out.push(PathCommand::LineTo(p));
                current = p;
            }
            'C' => {
                let (a, b, p) = (pt(0), pt(2), pt(4));
                out.push(PathCommand::CurveTo(a, b, p));
                current = p;
            }
            'Z' => {
                out.push(PathCommand::Close);
                current = start;
            }
            _ => unreachable!("arity() only accepts M L H V C Z"),
        }
    }

    for w in &warnings {
        tracing::warn!("{w}");
    }
    (out, warnings)
}

/// Normalise an outline already in typed form.
pub fn normalize_outline(outline: &GlyphOutline, target: NormalizeTarget, axis: YAxis) -> Normalized {
    let Some(bounds) = outline.control_bounds() else {
        return Normalized {
            outline: GlyphOutline::empty(),
            transform: NormalizationTransform::IDENTITY,
            warnings: Vec::new(),
        };
    };
    match NormalizationTransform::fit(bounds, target, axis) {
        Some(transform) => {
            let mapped = outline.transformed(transform.to_affine());
            // Source winding conventions vary (and a flip mirrors them):
            // re-derive outer/hole direction from nesting.
            let mapped = GlyphOutline::from_bezpaths(&direction::fix_directions(&mapped.contours()));
            Normalized {
                outline: mapped,
                transform,
                warnings: Vec::new(),
            }
        }
        None => Normalized {
            outline: GlyphOutline::empty(),
            transform: NormalizationTransform::IDENTITY,
            warnings: vec!["outline has no height; treated as blank".to_string()],
        },
    }
}

/// Parse, bound, scale and place a raw command stream.
pub fn normalize(raw: &[RawCommand], target: NormalizeTarget, axis: YAxis) -> Normalized {
    let (commands, mut warnings) = resolve_commands(raw);
    let outline = GlyphOutline::from_commands(commands);
    let mut normalized = normalize_outline(&outline, target, axis);
    warnings.append(&mut normalized.warnings);
    normalized.warnings = warnings;
    normalized
}
