use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use img2font::{
    CharacterRegion, DetectionParams, FontAdjustments, FontMetadata, GenerationOptions, GenerationRequest, OutputFormat,
    PixelBox, SourceBitmap, ThresholdMethod, TracingSettings,
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "img2font", about = "Bitmap character sheets to TrueType, OpenType and WOFF fonts")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Find character regions on a sheet and print them as JSON
    Detect {
        /// Sheet image (PNG, JPEG, BMP)
        image: PathBuf,
        #[command(flatten)]
        bitmap: BitmapArgs,
        /// Minimum region width and height in pixels
        #[arg(long, default_value = "5")]
        min_size: u32,
    },
    /// Trace a single-glyph image and print its path data
    Trace {
        /// Glyph image (PNG, JPEG, BMP)
        image: PathBuf,
        #[command(flatten)]
        bitmap: BitmapArgs,
        /// Corner threshold; lower keeps more corners sharp
        #[arg(long, default_value = "1.2")]
        alphamax: f64,
        /// Speckle size in pixels; smaller contours are dropped
        #[arg(long, default_value = "9")]
        turdsize: f64,
        /// Curve merge tolerance in pixels (0 = off)
        #[arg(long, default_value = "0.55")]
        opttolerance: f64,
    },
    /// Build a font from a JSON job file and print the summary
    Build {
        /// Job file: full job object or legacy `[{"char": "A", "path": "A.png"}]` list
        job: PathBuf,
        /// Output font path (defaults to the job file name with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: ttf, otf, woff (overrides the job file)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
}

#[derive(clap::Args)]
struct BitmapArgs {
    /// Fixed brightness threshold (0-255). Overrides Otsu auto-detection.
    #[arg(long)]
    threshold: Option<u8>,
    /// Light ink on a dark background
    #[arg(long)]
    invert: bool,
}

impl BitmapArgs {
    fn apply(&self, settings: &mut TracingSettings) {
        settings.invert = self.invert;
        settings.threshold = match self.threshold {
            Some(t) => ThresholdMethod::Fixed(t),
            None => ThresholdMethod::Otsu,
        };
    }
}

/// A full job: sheets plus the regions mapped onto them.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Job {
    /// Image paths, relative to the job file.
    sheets: Vec<PathBuf>,
    regions: Vec<CharacterRegion>,
    #[serde(default)]
    settings: TracingSettings,
    #[serde(default)]
    metadata: FontMetadata,
    #[serde(default)]
    adjustments: FontAdjustments,
    #[serde(default)]
    options: GenerationOptions,
}

#[derive(Deserialize)]
struct CharmapEntry {
    #[serde(rename = "char")]
    ch: char,
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobFile {
    Job(Job),
    Charmap(Vec<CharmapEntry>),
}

fn load_bitmap(path: &Path) -> anyhow::Result<SourceBitmap> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    SourceBitmap::decode(&bytes).with_context(|| format!("decoding {}", path.display()))
}

/// Resolve a job file into a request; image paths are relative to the file.
fn load_job(path: &Path) -> anyhow::Result<GenerationRequest> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let job: JobFile = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    match job {
        JobFile::Job(job) => {
            let bitmaps = job
                .sheets
                .iter()
                .map(|sheet| load_bitmap(&base.join(sheet)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(GenerationRequest {
                bitmaps,
                regions: job.regions,
                settings: job.settings,
                metadata: job.metadata,
                adjustments: job.adjustments,
                options: job.options,
            })
        }
        JobFile::Charmap(entries) => {
            if entries.is_empty() {
                bail!("{}: charmap is empty", path.display());
            }
            let mut request = GenerationRequest::default();
            for (i, entry) in entries.iter().enumerate() {
                let bitmap = load_bitmap(&base.join(&entry.path))?;
                let whole = PixelBox {
                    min_x: 0,
                    min_y: 0,
                    max_x: bitmap.width().saturating_sub(1),
                    max_y: bitmap.height().saturating_sub(1),
                };
                request.regions.push(CharacterRegion::rect(i.to_string(), i, whole, entry.ch));
                request.bitmaps.push(bitmap);
            }
            Ok(request)
        }
    }
}

fn cmd_detect(image: &Path, bitmap: &BitmapArgs, min_size: u32) -> anyhow::Result<()> {
    let sheet = load_bitmap(image)?;
    let mut settings = TracingSettings::default();
    bitmap.apply(&mut settings);
    let params = DetectionParams {
        min_size,
        ..DetectionParams::default()
    };
    let regions = img2font::detect(&sheet, 0, &settings, &params);
    info!(regions = regions.len(), "detected");
    println!("{}", serde_json::to_string_pretty(&regions)?);
    Ok(())
}

fn cmd_trace(image: &Path, settings: &TracingSettings) -> anyhow::Result<()> {
    let glyph = load_bitmap(image)?;
    let traced = img2font::trace_bitmap(&glyph, settings)?;
    info!(contours = traced.contour_count(), width = traced.width, height = traced.height, "traced");
    println!("{}", traced.path_data);
    Ok(())
}

fn cmd_build(job: &Path, output: Option<PathBuf>, format: Option<OutputFormat>) -> anyhow::Result<()> {
    let mut request = load_job(job)?;
    if let Some(format) = format {
        request.options.format = format;
    }
    let output = output.unwrap_or_else(|| job.with_extension(request.options.format.extension()));

    let font = img2font::generate(&request)?;
    std::fs::write(&output, &font.data).with_context(|| format!("writing {}", output.display()))?;
    info!(path = %output.display(), bytes = font.data.len(), "wrote font");
    println!("{}", serde_json::to_string_pretty(&font.summary)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Cmd::Detect { image, bitmap, min_size } => cmd_detect(&image, &bitmap, min_size),
        Cmd::Trace {
            image,
            bitmap,
            alphamax,
            turdsize,
            opttolerance,
        } => {
            let mut settings = TracingSettings {
                alphamax,
                turdsize,
                opttolerance,
                ..TracingSettings::default()
            };
            bitmap.apply(&mut settings);
            cmd_trace(&image, &settings)
        }
        Cmd::Build { job, output, format } => cmd_build(&job, output, format),
    }
}
