//! Glyph outlines and the path-command streams they are built from.
//!
//! Two representations:
//!
//! - [`RawCommand`]: an SVG-style command letter plus its operands, as
//!   produced by the tracer or read from path-data text. Upper-case
//!   letters are absolute, lower-case relative to the current point.
//! - [`PathCommand`]: the closed, typed form every later stage works on.
//!   Coordinates are absolute.


use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};

use crate::geom::signed_area;

/// Decimal places written to path data.
const PATH_DATA_PRECISION: usize = 3;

/// One typed drawing command with absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CurveTo(Point, Point, Point),
    Close,
}

/// A raw command as it appears in a traced stream or path-data text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    pub op: char,
    pub args: Vec<f64>,
}

impl RawCommand {
    pub fn new(op: char, args: impl Into<Vec<f64>>) -> Self {
        Self { op, args: args.into() }
    }

    /// Operands one instance of `op` consumes, `None` for unknown letters.
    pub fn arity(op: char) -> Option<usize> {
        match op.to_ascii_uppercase() {
            'M' | 'L' => Some(2),
            'H' | 'V' => Some(1),
            'C' => Some(6),
            'Z' => Some(0),
            _ => None,
        }
    }
}

/// Render a raw command stream as compact path-data text.
///
/// Formatting is fixed so identical streams give byte-identical text.
pub fn to_path_data(commands: &[RawCommand]) -> String {
    let mut out = String::new();
    for (i, cmd) in commands.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(cmd.op);
        for arg in &cmd.args {
            out.push(' ');
            write_number(&mut out, *arg);
        }
    }
    out
}

fn write_number(out: &mut String, value: f64) {
    let scale = 10f64.powi(PATH_DATA_PRECISION as i32);
    let mut rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        // No "-0".
        rounded = 0.0;
    }
    let text = format!("{rounded:.prec$}", prec = PATH_DATA_PRECISION);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    out.push_str(text);
}

/// Tokenise path-data text into raw commands.
///
/// Implicit repetition (`L 1 2 3 4`) is split into one command per
/// operand group; a `M` followed by extra pairs continues as `L`, as in SVG.
/// A trailing group with too few operands is kept as-is so the
/// normaliser can report and drop it.
pub fn parse_path_data(text: &str) -> Vec<RawCommand> {
    let mut commands = Vec::new();
    let mut op: Option<char> = None;
    let mut args: Vec<f64> = Vec::new();

    let flush = |commands: &mut Vec<RawCommand>, op: Option<char>, args: &mut Vec<f64>| {
        let Some(op) = op else {
            args.clear();
            return;
        };
        match RawCommand::arity(op) {
            Some(0) | None => commands.push(RawCommand::new(op, std::mem::take(args))),
            Some(n) => {
                if args.is_empty() {
                    commands.push(RawCommand::new(op, Vec::new()));
                    return;
                }
                let mut current = op;
                for chunk in args.chunks(n) {
                    commands.push(RawCommand::new(current, chunk.to_vec()));
                    current = match current {
                        'M' => 'L',
                        'm' => 'l',
                        other => other,
                    };
                }
                args.clear();
            }
        }
    };

    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_ascii_alphabetic() && c != 'e' && c != 'E' {
            flush(&mut commands, op, &mut args);
            op = Some(c);
            chars.next();
        } else if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() {
            let mut end = start;
            let mut seen_dot = false;
            let mut seen_exp = false;
            let mut first = true;
            while let Some(&(i, d)) = chars.peek() {
                let accept = if first {
                    d == '-' || d == '+' || d == '.' || d.is_ascii_digit()
                } else if d.is_ascii_digit() {
                    true
                } else if d == '.' && !seen_dot && !seen_exp {
                    true
                } else if (d == 'e' || d == 'E') && !seen_exp {
                    seen_exp = true;
                    true
                } else {
                    (d == '-' || d == '+') && matches!(text[..i].chars().last(), Some('e' | 'E'))
                };
                if !accept {
                    break;
                }
                if d == '.' {
                    seen_dot = true;
                }
                first = false;
                end = i + d.len_utf8();
                chars.next();
            }
            match text[start..end].parse::<f64>() {
                Ok(v) if v.is_finite() => args.push(v),
                _ => tracing::warn!("ignoring malformed number {:?} in path data", &text[start..end]),
            }
        } else {
            chars.next();
        }
    }
    flush(&mut commands, op, &mut args);
    commands
}

/// Winding direction of a closed contour (y-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    /// Outer boundary (positive signed area).
    CounterClockwise,
    /// Hole.
    Clockwise,
}

/// A glyph outline: closed contours in absolute coordinates.
///
/// Outer contours wind counter-clockwise, holes clockwise (nonzero fill).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphOutline {
    commands: Vec<PathCommand>,
}

impl GlyphOutline {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from typed commands, closing any contour left open.
    pub fn from_commands(commands: Vec<PathCommand>) -> Self {
        let mut closed = Vec::with_capacity(commands.len() + 1);
        let mut open = false;
        for cmd in commands {
            match cmd {
                PathCommand::MoveTo(_) => {
                    if open {
                        closed.push(PathCommand::Close);
                    }
                    open = true;
                }
                PathCommand::Close => {
                    if !open {
                        continue;
                    }
                    open = false;
                }
                PathCommand::LineTo(_) | PathCommand::CurveTo(..) => {
                    if !open {
                        // Drawing without a current contour: skip.
                        continue;
                    }
                }
            }
            closed.push(cmd);
        }
        if open {
            closed.push(PathCommand::Close);
        }
        Self { commands: closed }
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// One BezPath per contour.
    pub fn contours(&self) -> Vec<BezPath> {
        let mut paths = Vec::new();
        let mut current = BezPath::new();
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) => {
                    current = BezPath::new();
                    current.move_to(p);
                }
                PathCommand::LineTo(p) => current.line_to(p),
                PathCommand::CurveTo(a, b, p) => current.curve_to(a, b, p),
                PathCommand::Close => {
                    current.close_path();
                    paths.push(std::mem::take(&mut current));
                }
            }
        }
        paths
    }

    pub fn contour_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PathCommand::MoveTo(_)))
            .count()
    }

    pub fn windings(&self) -> Vec<Winding> {
        self.contours()
            .iter()
            .map(|c| {
                if signed_area(c) >= 0.0 {
                    Winding::CounterClockwise
                } else {
                    Winding::Clockwise
                }
            })
            .collect()
    }

    pub fn to_bezpath(&self) -> BezPath {
        let mut path = BezPath::new();
        for cmd in &self.commands {
            path.push(command_to_el(*cmd));
        }
        path
    }

    pub fn from_bezpaths(paths: &[BezPath]) -> Self {
        let mut commands = Vec::new();
        for path in paths {
            for el in path.elements() {
                match *el {
                    PathEl::MoveTo(p) => commands.push(PathCommand::MoveTo(p)),
                    PathEl::LineTo(p) => commands.push(PathCommand::LineTo(p)),
                    PathEl::CurveTo(a, b, p) => commands.push(PathCommand::CurveTo(a, b, p)),
                    PathEl::QuadTo(q, p) => {
                        // Exact degree elevation.
                        let start = last_point(&commands).unwrap_or(q);
                        let a = start + (q - start) * (2.0 / 3.0);
                        let b = p + (q - p) * (2.0 / 3.0);
                        commands.push(PathCommand::CurveTo(a, b, p));
                    }
                    PathEl::ClosePath => commands.push(PathCommand::Close),
                }
            }
        }
        Self::from_commands(commands)
    }

    /// Tight bounds over every anchor and control point.
    pub fn control_bounds(&self) -> Option<Rect> {
        let mut bounds: Option<Rect> = None;
        for cmd in &self.commands {
            for p in command_points(cmd) {
                bounds = Some(match bounds {
                    None => Rect::from_points(p, p),
                    Some(r) => r.union_pt(p),
                });
            }
        }
        bounds
    }

    /// Bounds of the rendered curves.
    pub fn bounds(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_bezpath().bounding_box())
    }

    /// Filled area under the nonzero rule with canonical winding.
    pub fn area(&self) -> f64 {
        self.contours().iter().map(|c| c.area()).sum()
    }

    /// Apply one affine transform to every anchor and control handle.
    pub fn transformed(&self, affine: Affine) -> Self {
        let map = |p: Point| affine * p;
        Self {
            commands: self
                .commands
                .iter()
                .map(|cmd| match *cmd {
                    PathCommand::MoveTo(p) => PathCommand::MoveTo(map(p)),
                    PathCommand::LineTo(p) => PathCommand::LineTo(map(p)),
                    PathCommand::CurveTo(a, b, p) => PathCommand::CurveTo(map(a), map(b), map(p)),
                    PathCommand::Close => PathCommand::Close,
                })
                .collect(),
        }
    }

    /// Raw stream with an absolute `M`, relative `l`/`c`, and `z`.
    pub fn to_raw(&self) -> Vec<RawCommand> {
        let mut raw = Vec::with_capacity(self.commands.len());
        let mut current = Point::ZERO;
        let mut start = Point::ZERO;
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) => {
                    raw.push(RawCommand::new('M', [p.x, p.y]));
                    current = p;
                    start = p;
                }
                PathCommand::LineTo(p) => {
                    raw.push(RawCommand::new('l', [p.x - current.x, p.y - current.y]));
                    current = p;
                }
                PathCommand::CurveTo(a, b, p) => {
                    raw.push(RawCommand::new(
                        'c',
                        [
                            a.x - current.x,
                            a.y - current.y,
                            b.x - current.x,
                            b.y - current.y,
                            p.x - current.x,
                            p.y - current.y,
                        ],
                    ));
                    current = p;
                }
                PathCommand::Close => {
                    raw.push(RawCommand::new('z', Vec::new()));
                    current = start;
                }
            }
        }
        raw
    }
}

fn command_to_el(cmd: PathCommand) -> PathEl {
    match cmd {
        PathCommand::MoveTo(p) => PathEl::MoveTo(p),
        PathCommand::LineTo(p) => PathEl::LineTo(p),
        PathCommand::CurveTo(a, b, p) => PathEl::CurveTo(a, b, p),
        PathCommand::Close => PathEl::ClosePath,
    }
}

fn command_points(cmd: &PathCommand) -> Vec<Point> {
    match *cmd {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => vec![p],
        PathCommand::CurveTo(a, b, p) => vec![a, b, p],
        PathCommand::Close => Vec::new(),
    }
}

fn last_point(commands: &[PathCommand]) -> Option<Point> {
    commands.iter().rev().find_map(|c| match *c {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) | PathCommand::CurveTo(_, _, p) => Some(p),
        PathCommand::Close => None,
    })
}
