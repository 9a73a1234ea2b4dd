use clap::{Args, Parser};
use imgpacker::config::{self, Color, ConfigError, PackConfig, TransformConfig, TransformFlags};
use imgpacker::output;
use imgpacker::pipeline::{self, PackRequest};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "imgpacker")]
#[command(about = "Tile every image in a folder into a single collage")]
#[command(long_about = "\
Tile every image in a folder into a single collage

Each supported image (JPEG, PNG, WebP, TIFF, GIF, SVG) is resized to a
CellSize x CellSize square and placed left-to-right, top-to-bottom in a grid
with the given number of columns. Files are placed in path order.

Stages run in a fixed order, whatever order the flags are given in:

  flatten -> blur -> sharpen -> median -> flip -> flop
  -> resize to CellSize
  -> blur -> sharpen -> median

Example:
  imgpacker --sharpen-after 32 10 sheet.png ./images

Settings can also come from an imgpacker.toml in the input folder (or
--config). Run 'imgpacker --print-config' for a documented template.")]
#[command(version)]
struct Cli {
    /// Side of each square cell in pixels (at least 4)
    #[arg(value_name = "CELL_SIZE", required_unless_present = "print_config")]
    cell_size: Option<u32>,

    /// Number of columns in the grid (at least 1)
    #[arg(value_name = "COLUMNS", required_unless_present = "print_config")]
    columns: Option<u32>,

    /// Output image (.png, .tif, .tiff or .webp)
    #[arg(value_name = "OUTPUT_FILE", required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// Folder to read images from
    #[arg(value_name = "INPUT_FOLDER", default_value = ".")]
    input: PathBuf,

    #[command(flatten)]
    transforms: TransformArgs,

    /// Config file (default: imgpacker.toml in the input folder, if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fill for empty cells, as #RRGGBB or #RRGGBBAA
    #[arg(long, value_name = "COLOR")]
    background: Option<Color>,

    /// Maximum parallel workers (default: number of CPU cores)
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Also write a JSON manifest of where each image was placed
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Print a stock imgpacker.toml with all options documented
    #[arg(long)]
    print_config: bool,
}

/// Stage switches. Each one only adds to what the config file enables.
#[derive(Args, Clone, Copy)]
struct TransformArgs {
    /// Flatten transparency against an opaque background
    #[arg(long, alias = "flattenAlpha")]
    flatten_alpha: bool,
    /// Blur images BEFORE resizing
    #[arg(long, alias = "blurBefore")]
    blur_before: bool,
    /// Blur images AFTER resizing
    #[arg(long, alias = "blurAfter")]
    blur_after: bool,
    /// Sharpen images BEFORE resizing
    #[arg(long, alias = "sharpenBefore")]
    sharpen_before: bool,
    /// Sharpen images AFTER resizing
    #[arg(long, alias = "sharpenAfter")]
    sharpen_after: bool,
    /// Median-filter images BEFORE resizing
    #[arg(long, alias = "medianBefore")]
    median_before: bool,
    /// Median-filter images AFTER resizing
    #[arg(long, alias = "medianAfter")]
    median_after: bool,
    /// Mirror images top-to-bottom
    #[arg(long, alias = "flipVertical")]
    flip_vertical: bool,
    /// Mirror images left-to-right
    #[arg(long, alias = "flopHorizontal")]
    flop_horizontal: bool,
}

impl TransformArgs {
    fn flags(self) -> TransformFlags {
        TransformFlags {
            flatten_alpha: self.flatten_alpha,
            blur_before: self.blur_before,
            blur_after: self.blur_after,
            sharpen_before: self.sharpen_before,
            sharpen_after: self.sharpen_after,
            median_before: self.median_before,
            median_after: self.median_after,
            flip_vertical: self.flip_vertical,
            flop_horizontal: self.flop_horizontal,
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&*err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.print_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    let (Some(cell_size), Some(columns), Some(output_path)) =
        (cli.cell_size, cli.columns, cli.output)
    else {
        return Err("Invalid number of arguments".into());
    };

    // Range checks come before reading anything from disk.
    config::validate_cell_size(cell_size)?;
    config::validate_columns(columns)?;

    // Output format, input folder and destinations are checked before the
    // config file is read.
    let transform = TransformConfig::new(cell_size, cli.transforms.flags())?;
    let mut request = PackRequest::new(&cli.input, output_path, columns, transform);
    if let Some(manifest) = cli.manifest {
        request = request.with_manifest(manifest);
    }
    request.validate()?;

    let mut pack_config = load_pack_config(cli.config.as_deref(), &cli.input)?;
    if let Some(threads) = cli.threads {
        pack_config.processing.max_processes = Some(threads);
    }
    let flags = pack_config.transforms.union(cli.transforms.flags());
    request.transform = TransformConfig::with_filters(cell_size, flags, pack_config.filters)?;
    request.background = cli.background.unwrap_or(pack_config.canvas.background);

    init_thread_pool(&pack_config.processing);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_pack_event(&event);
        }
    });
    let result = pipeline::pack(&request, Some(tx));
    printer.join().map_err(|_| "output thread panicked")?;

    output::print_summary(&result?);
    Ok(())
}

/// Explicit `--config` file, else `imgpacker.toml` in the input folder.
fn load_pack_config(explicit: Option<&Path>, input: &Path) -> Result<PackConfig, ConfigError> {
    match explicit {
        Some(path) => config::load_config(path),
        None => config::load_config_in(input),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of CPU cores: the thread count can be lowered, not raised.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_args(args: &[&str]) -> Result<(), Box<dyn Error>> {
        run(Cli::try_parse_from(std::iter::once("imgpacker").chain(args.iter().copied())).unwrap())
    }

    /// Input folder holding an `imgpacker.toml` that cannot be parsed.
    fn input_with_broken_config() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("in")).unwrap();
        fs::write(
            tmp.path().join("in").join(config::CONFIG_FILENAME),
            "[canvas\nbackground = ",
        )
        .unwrap();
        tmp
    }

    fn path_arg(tmp: &TempDir, name: &str) -> String {
        tmp.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn output_format_checked_before_config_file() {
        let tmp = input_with_broken_config();
        let err = run_args(&["8", "2", &path_arg(&tmp, "out.jpg"), &path_arg(&tmp, "in")])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnsupportedOutputFormat(ext)) if ext == "jpg"
        ));
    }

    #[test]
    fn missing_input_checked_before_explicit_config() {
        let tmp = TempDir::new().unwrap();
        let err = run_args(&[
            "8",
            "2",
            &path_arg(&tmp, "out.png"),
            &path_arg(&tmp, "missing"),
            "--config",
            &path_arg(&tmp, "missing.toml"),
        ])
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidInputDir(_))
        ));
    }

    #[test]
    fn broken_config_reported_once_arguments_are_valid() {
        let tmp = input_with_broken_config();
        let err = run_args(&["8", "2", &path_arg(&tmp, "out.png"), &path_arg(&tmp, "in")])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Toml(_))
        ));
        assert!(!tmp.path().join("out.png").exists());
    }
}
