//! fullgrad CLI: render full-gradient saliency maps from recorded tensors.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fullgrad_core::backend::NdArray;
use fullgrad_core::{Mode, Seed, Step};
use fullgrad_monitor::{SaliencyStepHandler, StepPoller, WatchConfig};
use fullgrad_store::{synthetic_store, write_npy_dir, NpyDirStore, SyntheticSpec, TensorStore};

/// Backend used for saliency computation.
type Backend = NdArray;

#[derive(Parser)]
#[command(name = "fullgrad")]
#[command(author, version)]
#[command(about = "Full-gradient saliency maps from recorded model tensors")]
#[command(long_about = "fullgrad: builds full-gradient saliency maps from tensors recorded during
model evaluation (input image, gradients, batch-norm parameters) and renders them
as heatmap overlays.

EXAMPLES:
  # Write a small synthetic recording
  fullgrad synth --out ./recording --steps 3 --size 64

  # List recorded steps and tensors
  fullgrad steps --store ./recording

  # Render one step
  fullgrad render --store ./recording --step 2 --out ./saliency

  # Render steps as they arrive, giving up after ten minutes
  fullgrad watch --store ./recording --interval-ms 2000 --timeout-secs 600")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recorded steps and tensor names
    Steps {
        /// Recording directory
        #[arg(long, value_name = "DIR")]
        store: PathBuf,

        /// Mode to list: train, eval, global
        #[arg(long, default_value = "eval")]
        mode: Mode,
    },
    /// Render the saliency maps of one step
    Render {
        /// Recording directory
        #[arg(long, value_name = "DIR")]
        store: PathBuf,

        /// Step to render
        #[arg(long, value_name = "N")]
        step: u64,

        /// Mode the step was recorded under
        #[arg(long)]
        mode: Option<Mode>,

        /// Output directory for figures
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// JSON watch configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Render steps as they are recorded until the job ends
    Watch {
        /// Recording directory
        #[arg(long, value_name = "DIR")]
        store: PathBuf,

        /// Mode to watch
        #[arg(long)]
        mode: Option<Mode>,

        /// Output directory for figures
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Milliseconds between polls
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,

        /// JSON watch configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Write a synthetic recording
    Synth {
        /// Output recording directory
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        /// Number of steps
        #[arg(long, default_value = "3", value_name = "N")]
        steps: u64,

        /// Image height and width
        #[arg(long, default_value = "224", value_name = "PX")]
        size: usize,

        /// Images per step
        #[arg(long, default_value = "1", value_name = "N")]
        batch: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Steps { store, mode } => handle_steps(&store, mode),
        Commands::Render {
            store,
            step,
            mode,
            out,
            config,
        } => {
            let config = load_config(config.as_deref(), mode, out)?;
            handle_render(&store, Step::new(step), config)
        }
        Commands::Watch {
            store,
            mode,
            out,
            interval_ms,
            timeout_secs,
            config,
        } => {
            let mut config = load_config(config.as_deref(), mode, out)?;
            if let Some(ms) = interval_ms {
                config.poll.interval = Duration::from_millis(ms);
            }
            if let Some(secs) = timeout_secs {
                config.poll.timeout = Some(Duration::from_secs(secs));
            }
            handle_watch(&store, config)
        }
        Commands::Synth {
            out,
            steps,
            size,
            batch,
            seed,
        } => handle_synth(&out, steps, size, batch, seed),
    }
}

/// Load the configuration file, if any, and apply command-line overrides.
fn load_config(path: Option<&Path>, mode: Option<Mode>, out: Option<PathBuf>) -> Result<WatchConfig> {
    let mut config = match path {
        Some(path) => WatchConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WatchConfig::default(),
    };
    if let Some(mode) = mode {
        config.poll.mode = mode;
    }
    if let Some(out) = out {
        config.render.output_dir = out;
    }
    Ok(config)
}

fn open_store(path: &Path) -> Result<NpyDirStore> {
    NpyDirStore::open(path).with_context(|| format!("Failed to open store {}", path.display()))
}

fn handle_steps(path: &Path, mode: Mode) -> Result<()> {
    let store = open_store(path)?;
    let steps = store.steps(mode)?;

    println!("Store: {}", path.display());
    println!("Job ended: {}", store.loaded_all_steps());
    println!("\n{} steps ({}):", steps.len(), mode);
    for chunk in steps.chunks(8) {
        let line: Vec<String> = chunk.iter().map(|s| format!("{:<10}", s.to_string())).collect();
        println!("  {}", line.join(""));
    }

    let names = store.tensor_names()?;
    println!("\n{} tensors:", names.len());
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

fn handle_render(path: &Path, step: Step, config: WatchConfig) -> Result<()> {
    let store = open_store(path)?;
    let mode = config.poll.mode;
    if !store.steps(mode)?.contains(&step) {
        bail!("Step {} is not recorded under {}", step, mode);
    }

    let mut handler = SaliencyStepHandler::<Backend>::from_config(&config, Default::default());
    let written = handler
        .render_step(&store, step, mode)
        .with_context(|| format!("Failed to render step {}", step))?;

    for png in written {
        println!("{}", png.display());
    }
    Ok(())
}

fn handle_watch(path: &Path, config: WatchConfig) -> Result<()> {
    let store = open_store(path)?;
    let mut handler = SaliencyStepHandler::<Backend>::from_config(&config, Default::default());

    let report = StepPoller::new(config.poll.clone()).run(&store, &mut handler)?;

    println!(
        "Rendered {} steps in {} polls ({} figures in {})",
        report.rendered.len(),
        report.polls,
        handler.written().len(),
        config.render.output_dir.display()
    );
    if !report.skipped.is_empty() {
        let skipped: Vec<String> = report.skipped.iter().map(ToString::to_string).collect();
        println!("Never fully recorded: {}", skipped.join(", "));
    }
    Ok(())
}

fn handle_synth(out: &Path, steps: u64, size: usize, batch: usize, seed: u64) -> Result<()> {
    if size < 4 {
        bail!("Image size must be at least 4, got {}", size);
    }
    let spec = SyntheticSpec {
        n_steps: steps,
        batch,
        ..SyntheticSpec::small(size)
    };
    let store = synthetic_store(&spec, Seed::new(seed));
    write_npy_dir(&store, out)?;

    println!(
        "Wrote {} steps of {}x{}x{}x{} images to {}",
        steps,
        batch,
        3,
        size,
        size,
        out.display()
    );
    Ok(())
}
