//! CLI output formatting.
//!
//! # Output Format
//!
//! ```text
//! Found 5 images (1 skipped)
//! [SKIPPED]: `/photos/notes.txt` (unsupported file format)
//! [Processed]: 1 of 5 (20%)
//! [Processed]: 2 of 5 (40%)
//! ...
//! Composed 2x3 grid (32x48 px)
//! Packed image `/out/collage.png` was successfully created!
//! ```
//!
//! Fatal errors go to stderr as `[ERROR]: <reason>`.
//!
//! # Architecture
//!
//! Each event has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to the terminal. Format
//! functions are pure: no I/O, no side effects.

use crate::pipeline::{PackEvent, PackOutcome};
use std::error::Error;
use std::path::Path;

/// Completion percentage, rounded to the nearest integer.
fn percent(processed: usize, total: usize) -> usize {
    if total == 0 {
        return 100;
    }
    (processed * 100 + total / 2) / total
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Warning line for a file left out of the collage.
pub fn format_skipped(path: &Path, reason: &str) -> String {
    format!("[SKIPPED]: `{}` ({})", path.display(), reason)
}

/// Format a single pack event as display lines.
pub fn format_pack_event(event: &PackEvent) -> Vec<String> {
    match event {
        PackEvent::Scanned { accepted, skipped } => {
            let mut line = format!("Found {}", plural(*accepted, "image"));
            if *skipped > 0 {
                line.push_str(&format!(" ({skipped} skipped)"));
            }
            vec![line]
        }
        PackEvent::Skipped { path, reason } => vec![format_skipped(path, reason)],
        PackEvent::ImageProcessed {
            processed, total, ..
        } => vec![format!(
            "[Processed]: {} of {} ({}%)",
            processed,
            total,
            percent(*processed, *total)
        )],
        PackEvent::Composed {
            width,
            height,
            rows,
            columns,
        } => vec![format!(
            "Composed {columns}x{rows} grid ({width}x{height} px)"
        )],
        PackEvent::Written { path } => vec![format!(
            "Packed image `{}` was successfully created!",
            path.display()
        )],
        PackEvent::ManifestWritten { path } => {
            vec![format!("Placement manifest written to `{}`", path.display())]
        }
    }
}

/// Print a pack event. `[SKIPPED]` warnings go to stderr, the rest to stdout.
pub fn print_pack_event(event: &PackEvent) {
    for line in format_pack_event(event) {
        match event {
            PackEvent::Skipped { .. } => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Fatal error line, followed by one indented line per underlying cause
/// not already part of the message.
pub fn format_error(err: &dyn Error) -> Vec<String> {
    let message = err.to_string();
    let mut lines = vec![format!("[ERROR]: {message}")];
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.contains(&text) {
            lines.push(format!("    Reason: {text}"));
        }
        cause = inner.source();
    }
    lines
}

pub fn print_error(err: &dyn Error) {
    for line in format_error(err) {
        eprintln!("{}", line);
    }
}

/// Final summary after a successful run.
pub fn format_summary(outcome: &PackOutcome) -> Vec<String> {
    let layout = &outcome.layout;
    let mut lines = vec![format!(
        "Packed {} into {}x{} cells of {}px",
        plural(outcome.image_count, "image"),
        layout.columns,
        layout.rows,
        layout.cell_size
    )];
    let empty = layout.capacity() - outcome.image_count as u64;
    if empty > 0 {
        lines.push(format!("    Empty cells: {} ({})", empty, layout.background));
    }
    if !outcome.skipped.is_empty() {
        lines.push(format!("    Skipped: {}", plural(outcome.skipped.len(), "file")));
    }
    lines
}

pub fn print_summary(outcome: &PackOutcome) {
    for line in format_summary(outcome) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::imaging::compute_layout;
    use crate::imaging::BackendError;
    use crate::pipeline::PackError;
    use crate::scan::SkippedFile;
    use std::path::PathBuf;

    // =========================================================================
    // Event formatting tests
    // =========================================================================

    #[test]
    fn format_progress_rounds_percentage() {
        let event = PackEvent::ImageProcessed {
            processed: 1,
            total: 3,
            path: PathBuf::from("/in/a.png"),
        };
        assert_eq!(format_pack_event(&event), vec!["[Processed]: 1 of 3 (33%)"]);

        let event = PackEvent::ImageProcessed {
            processed: 2,
            total: 3,
            path: PathBuf::from("/in/b.png"),
        };
        assert_eq!(format_pack_event(&event), vec!["[Processed]: 2 of 3 (67%)"]);
    }

    #[test]
    fn format_progress_complete() {
        let event = PackEvent::ImageProcessed {
            processed: 5,
            total: 5,
            path: PathBuf::from("/in/e.png"),
        };
        assert_eq!(format_pack_event(&event), vec!["[Processed]: 5 of 5 (100%)"]);
    }

    #[test]
    fn format_skipped_file() {
        let event = PackEvent::Skipped {
            path: PathBuf::from("/in/notes.txt"),
            reason: "unsupported file format".to_string(),
        };
        assert_eq!(
            format_pack_event(&event),
            vec!["[SKIPPED]: `/in/notes.txt` (unsupported file format)"]
        );
    }

    #[test]
    fn format_scanned_counts() {
        let event = PackEvent::Scanned {
            accepted: 1,
            skipped: 0,
        };
        assert_eq!(format_pack_event(&event), vec!["Found 1 image"]);

        let event = PackEvent::Scanned {
            accepted: 4,
            skipped: 2,
        };
        assert_eq!(format_pack_event(&event), vec!["Found 4 images (2 skipped)"]);
    }

    #[test]
    fn format_composed_grid() {
        let event = PackEvent::Composed {
            width: 32,
            height: 48,
            rows: 3,
            columns: 2,
        };
        assert_eq!(
            format_pack_event(&event),
            vec!["Composed 2x3 grid (32x48 px)"]
        );
    }

    #[test]
    fn format_written() {
        let event = PackEvent::Written {
            path: PathBuf::from("/out/collage.png"),
        };
        assert_eq!(
            format_pack_event(&event),
            vec!["Packed image `/out/collage.png` was successfully created!"]
        );
    }

    // =========================================================================
    // Error formatting tests
    // =========================================================================

    #[test]
    fn format_config_error() {
        let err = PackError::Config(ConfigError::CellSizeTooSmall(2));
        assert_eq!(
            format_error(&err),
            vec!["[ERROR]: CellSize must be at least 4 (got 2)"]
        );
    }

    #[test]
    fn format_error_does_not_repeat_included_cause() {
        let err = PackError::Transform {
            path: PathBuf::from("/in/bad.png"),
            source: BackendError::Decode("truncated".to_string()),
        };
        assert_eq!(
            format_error(&err),
            vec!["[ERROR]: Failed to process `/in/bad.png`: Decode failed: truncated"]
        );
    }

    #[test]
    fn format_error_lists_hidden_causes() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "Failed to pack images")
            }
        }
        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }
        let err = Outer(std::io::Error::other("disk full"));
        assert_eq!(
            format_error(&err),
            vec!["[ERROR]: Failed to pack images", "    Reason: disk full"]
        );
    }

    // =========================================================================
    // Summary tests
    // =========================================================================

    #[test]
    fn format_summary_full_grid() {
        let outcome = PackOutcome {
            output: PathBuf::from("/out/a.png"),
            layout: compute_layout(4, 2, 16).unwrap(),
            image_count: 4,
            skipped: vec![],
        };
        assert_eq!(
            format_summary(&outcome),
            vec!["Packed 4 images into 2x2 cells of 16px"]
        );
    }

    #[test]
    fn format_summary_with_empty_cells_and_skips() {
        let outcome = PackOutcome {
            output: PathBuf::from("/out/a.png"),
            layout: compute_layout(10, 4, 8).unwrap(),
            image_count: 10,
            skipped: vec![SkippedFile {
                path: PathBuf::from("/in/x.txt"),
                reason: "unsupported file format".to_string(),
            }],
        };
        let lines = format_summary(&outcome);
        assert_eq!(lines[0], "Packed 10 images into 4x3 cells of 8px");
        assert_eq!(lines[1], "    Empty cells: 2 (#00000000)");
        assert_eq!(lines[2], "    Skipped: 1 file");
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(0, 0), 100);
    }
}
