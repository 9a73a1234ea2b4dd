//! Run orchestration: validate → scan → transform → layout → compose → write.
//!
//! The per-image transforms fan out over rayon's global pool. Results come
//! back through an order-preserving `collect` into `Result<Vec<_>, _>`, which
//! is both the join barrier and the fail-fast point: the first error stops
//! the collection and nothing is composed or written.
//!
//! Progress is reported as [`PackEvent`]s over an optional channel, so the
//! caller decides how (and whether) to display it.
//!
//! ## Output
//!
//! The canvas is encoded in memory and written atomically. When a manifest
//! path is given, a JSON placement manifest is written after the image:
//!
//! ```text
//! {
//!   "output": "/abs/collage.png",
//!   "layout": { "image_count": 3, "columns": 2, "rows": 2, "cell_size": 16, ... },
//!   "images": [
//!     { "index": 0, "source": "/abs/in/a.png", "format": "png", "row": 0, "column": 0,
//!       "x": 0, "y": 0, "width": 16, "height": 16 },
//!     ...
//!   ]
//! }
//! ```

use crate::compose::{ComposeError, OutputFormat, compose, write_atomic};
use crate::config::{self, Color, ConfigError, TransformConfig};
use crate::imaging::{
    BackendError, GridLayout, ImageBackend, LayoutError, RustBackend, compute_layout, transform,
};
use crate::scan::{ScanError, SkippedFile, scan};
use crate::types::{ImageCandidate, ImageFormatTag, PixelBuffer};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("No supported images found in `{0}`")]
    NoImages(PathBuf),
    #[error("{0}")]
    Scan(#[from] ScanError),
    #[error("Failed to process `{path}`: {source}")]
    Transform {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("Layout failed: {0}")]
    Layout(#[from] LayoutError),
    #[error("Composition failed: {0}")]
    Compose(#[from] ComposeError),
    #[error("Failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Progress events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PackEvent {
    /// Input folder classified.
    Scanned { accepted: usize, skipped: usize },
    /// A file was left out of the collage.
    Skipped { path: PathBuf, reason: String },
    /// One image finished all of its stages. `processed` counts completions,
    /// so it is not tied to the image's grid position.
    ImageProcessed {
        processed: usize,
        total: usize,
        path: PathBuf,
    },
    /// All tiles are on the canvas.
    Composed {
        width: u32,
        height: u32,
        rows: u32,
        columns: u32,
    },
    /// The collage is on disk at its final path.
    Written { path: PathBuf },
    /// The placement manifest is on disk.
    ManifestWritten { path: PathBuf },
}

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct PackRequest {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub columns: u32,
    pub transform: TransformConfig,
    /// Fill for empty trailing cells.
    pub background: Color,
    /// Where to write the JSON placement manifest, if anywhere.
    pub manifest: Option<PathBuf>,
}

impl PackRequest {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        columns: u32,
        transform: TransformConfig,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            columns,
            transform,
            background: Color::TRANSPARENT,
            manifest: None,
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    /// Check everything that can be checked without reading any image.
    ///
    /// Returns the encoder picked for the output path.
    pub fn validate(&self) -> Result<OutputFormat, ConfigError> {
        config::validate_columns(self.columns)?;
        let format = OutputFormat::from_path(&self.output).ok_or_else(|| {
            ConfigError::UnsupportedOutputFormat(
                self.output
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })?;

        if !self.input_dir.is_dir() {
            return Err(ConfigError::InvalidInputDir(self.input_dir.clone()));
        }
        check_destination(&self.output)?;
        if let Some(manifest) = &self.manifest {
            check_destination(manifest)?;
            if manifest == &self.output {
                return Err(ConfigError::Validation(
                    "manifest path must differ from the output path".into(),
                ));
            }
        }
        Ok(format)
    }
}

/// The parent directory must exist and the path itself must not be a directory.
fn check_destination(path: &Path) -> Result<(), ConfigError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() || path.is_dir() {
        return Err(ConfigError::InvalidOutputPath(path.to_path_buf()));
    }
    Ok(())
}

/// Summary of a successful run.
#[derive(Debug)]
pub struct PackOutcome {
    /// Absolute path of the written collage.
    pub output: PathBuf,
    pub layout: GridLayout,
    pub image_count: usize,
    pub skipped: Vec<SkippedFile>,
}

/// JSON manifest describing where each source image was placed.
#[derive(Debug, Serialize)]
pub struct PlacementManifest {
    pub output: PathBuf,
    pub layout: GridLayout,
    pub images: Vec<Placement>,
}

#[derive(Debug, Serialize)]
pub struct Placement {
    pub index: usize,
    pub source: PathBuf,
    pub format: ImageFormatTag,
    pub row: u32,
    pub column: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlacementManifest {
    pub fn new(output: &Path, layout: &GridLayout, candidates: &[ImageCandidate]) -> Self {
        let images = candidates
            .iter()
            .map(|candidate| {
                let (row, column) = layout.cell_position(candidate.index);
                let (x, y) = layout.cell_origin(candidate.index);
                Placement {
                    index: candidate.index,
                    source: candidate.path.clone(),
                    format: candidate.format,
                    row,
                    column,
                    x,
                    y,
                    width: layout.cell_size,
                    height: layout.cell_size,
                }
            })
            .collect();
        Self {
            output: output.to_path_buf(),
            layout: *layout,
            images,
        }
    }
}

/// Run with the production backend.
pub fn pack(
    request: &PackRequest,
    events: Option<Sender<PackEvent>>,
) -> Result<PackOutcome, PackError> {
    pack_with_backend(&RustBackend::new(), request, events)
}

/// Run with a specific backend (allows testing with mock).
pub fn pack_with_backend(
    backend: &impl ImageBackend,
    request: &PackRequest,
    events: Option<Sender<PackEvent>>,
) -> Result<PackOutcome, PackError> {
    let format = request.validate()?;
    let emit = |event: PackEvent| {
        if let Some(tx) = &events {
            // A gone receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    };

    let output = std::path::absolute(&request.output).map_err(ConfigError::from)?;
    let mut exclude = vec![
        output.clone(),
        std::path::absolute(request.input_dir.join(config::CONFIG_FILENAME))
            .map_err(ConfigError::from)?,
    ];
    if let Some(manifest) = &request.manifest {
        exclude.push(std::path::absolute(manifest).map_err(ConfigError::from)?);
    }

    let scanned = scan(&request.input_dir, &exclude)?;
    emit(PackEvent::Scanned {
        accepted: scanned.accepted.len(),
        skipped: scanned.skipped.len(),
    });
    for skipped in &scanned.skipped {
        emit(PackEvent::Skipped {
            path: skipped.path.clone(),
            reason: skipped.reason.clone(),
        });
    }
    if scanned.accepted.is_empty() {
        return Err(PackError::NoImages(request.input_dir.clone()));
    }

    // Computed before any tile is allocated.
    let layout = compute_layout(
        scanned.accepted.len(),
        request.columns,
        request.transform.cell_size(),
    )?
    .with_background(request.background);

    let buffers = transform_all(backend, &scanned.accepted, &request.transform, &emit)?;
    let canvas = compose(&buffers, &layout)?;
    emit(PackEvent::Composed {
        width: layout.canvas_width,
        height: layout.canvas_height,
        rows: layout.rows,
        columns: layout.columns,
    });

    let bytes = canvas.encode(format)?;
    write_atomic(&output, &bytes).map_err(|source| PackError::Write {
        path: output.clone(),
        source,
    })?;
    emit(PackEvent::Written {
        path: output.clone(),
    });

    if let Some(manifest_path) = &request.manifest {
        let manifest = PlacementManifest::new(&output, &layout, &scanned.accepted);
        let json = serde_json::to_string_pretty(&manifest)?;
        write_atomic(manifest_path, json.as_bytes()).map_err(|source| PackError::Write {
            path: manifest_path.clone(),
            source,
        })?;
        emit(PackEvent::ManifestWritten {
            path: manifest_path.clone(),
        });
    }

    Ok(PackOutcome {
        output,
        layout,
        image_count: buffers.len(),
        skipped: scanned.skipped,
    })
}

/// Transform every candidate in parallel, preserving input order.
///
/// Stops at the first failure. Once any image has failed, no further
/// progress is reported even if other workers finish.
fn transform_all(
    backend: &impl ImageBackend,
    candidates: &[ImageCandidate],
    config: &TransformConfig,
    emit: &(impl Fn(PackEvent) + Sync),
) -> Result<Vec<PixelBuffer>, PackError> {
    let total = candidates.len();
    let processed = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);

    candidates
        .par_iter()
        .map(|candidate| match transform(backend, candidate, config) {
            Ok(buffer) => {
                if !failed.load(Ordering::SeqCst) {
                    let processed = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    emit(PackEvent::ImageProcessed {
                        processed,
                        total,
                        path: candidate.path.clone(),
                    });
                }
                Ok(buffer)
            }
            Err(source) => {
                failed.store(true, Ordering::SeqCst);
                Err(PackError::Transform {
                    path: candidate.path.clone(),
                    source,
                })
            }
        })
        .collect()
}
