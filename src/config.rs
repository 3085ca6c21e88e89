//! Request settings: tracing knobs, font metadata, spacing adjustments.
//!
//! All structs deserialize from partial JSON (missing fields fall back
//! to the defaults) so presets and job files stay short.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FontError;

/// Tracing parameters in one struct.
/// Serializable for saving presets, adjustable at runtime for preview sliders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    // -- Bitmap stage --
    /// Resample factor applied to each region before thresholding (>= 1).
    pub upscale_amount: f64,
    /// Gaussian blur sigma applied after upscaling. 0 = off.
    pub smoothing: f32,
    /// Threshold method for converting to binary.
    pub threshold: ThresholdMethod,
    /// If true, swap foreground/background after thresholding
    /// (light ink on a dark sheet).
    pub invert: bool,

    // -- Contour stage --
    /// Contours enclosing fewer pixels than this are speckles and dropped.
    pub turdsize: f64,

    // -- Curve stage --
    /// Corner threshold. Vertices with alpha >= alphamax are corners.
    /// 0.5 keeps nearly every turn sharp, 1.5 rounds almost everything.
    pub alphamax: f64,
    /// Maximum deviation (pixels) allowed when merging adjacent curve
    /// segments into one. 0 = no merging.
    pub opttolerance: f64,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            upscale_amount: 2.0,
            smoothing: 1.0,
            threshold: ThresholdMethod::Otsu,
            invert: false,
            turdsize: 9.0,
            alphamax: 1.2,
            opttolerance: 0.55,
        }
    }
}

/// Threshold method for converting a grayscale image to binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    /// Fixed brightness threshold (0-255). Pixels at or below it are ink.
    Fixed(u8),
    /// Otsu's method (automatic).
    Otsu,
}

/// Naming data carried into the `name` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetadata {
    pub family: String,
    pub style: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub version: String,
    pub copyright: Option<String>,
    /// Creation time in Unix seconds. Fixed by default so identical
    /// requests encode to identical bytes.
    pub created: i64,
}

impl Default for FontMetadata {
    fn default() -> Self {
        Self {
            family: "Untitled".to_string(),
            style: "Regular".to_string(),
            author: None,
            description: None,
            version: "1.000".to_string(),
            copyright: None,
            created: 0,
        }
    }
}

impl FontMetadata {
    /// PostScript name: family and style with everything outside
    /// printable ASCII (and the PostScript delimiters) removed.
    pub fn postscript_name(&self) -> String {
        let clean = |s: &str| -> String {
            s.chars()
                .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
                .collect()
        };
        let family = clean(&self.family);
        let family = if family.is_empty() { "Untitled".to_string() } else { family };
        let style = clean(&self.style);
        let mut name = if style.is_empty() {
            family
        } else {
            format!("{family}-{style}")
        };
        name.truncate(63);
        name
    }

    pub fn full_name(&self) -> String {
        if self.style.is_empty() || self.style == "Regular" {
            self.family.clone()
        } else {
            format!("{} {}", self.family, self.style)
        }
    }
}

/// Caller-supplied spacing tweaks, applied by the glyph assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontAdjustments {
    /// Added to every advance width (font units).
    pub letter_spacing: f64,
    /// Vertical shift applied to every outline (font units).
    pub baseline_offset: f64,
    /// Advance width scale in percent (100 = unchanged).
    pub char_width_percent: f64,
    /// Advance of the `space` glyph. Defaults to the computed word spacing.
    pub word_spacing: Option<f64>,
    /// Per-character (x, y) outline offsets, clamped to +/- `MAX_OFFSET`.
    pub positions: BTreeMap<char, (f64, f64)>,
    /// Per-pair kerning overrides keyed by the two-character pair ("AV").
    pub kerning: BTreeMap<String, f64>,
}

impl Default for FontAdjustments {
    fn default() -> Self {
        Self {
            letter_spacing: 0.0,
            baseline_offset: 0.0,
            char_width_percent: 100.0,
            word_spacing: None,
            positions: BTreeMap::new(),
            kerning: BTreeMap::new(),
        }
    }
}

/// Output container/outline flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// sfnt with quadratic `glyf` outlines.
    #[default]
    TrueType,
    /// sfnt with cubic `CFF ` outlines.
    OpenTypeCff,
    /// WOFF 1.0 wrapping the TrueType flavour.
    Woff,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::TrueType => "ttf",
            OutputFormat::OpenTypeCff => "otf",
            OutputFormat::Woff => "woff",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ttf" | "truetype" => Ok(OutputFormat::TrueType),
            "otf" | "cff" | "opentype" => Ok(OutputFormat::OpenTypeCff),
            "woff" => Ok(OutputFormat::Woff),
            other => Err(FontError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = FontError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.extension().to_string()
    }
}

/// Request-wide options that are not tracing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub units_per_em: u16,
    pub format: OutputFormat,
    /// Worker threads for per-region tracing. `None` = rayon's default.
    pub workers: Option<usize>,
    /// Pick each glyph's normalisation frame from its character class
    /// (x-height lowercase, descenders, ...) instead of cap height for all.
    pub proportional_case: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            units_per_em: 1000,
            format: OutputFormat::TrueType,
            workers: None,
            proportional_case: true,
        }
    }
}
