mod app;
mod headless;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use engram_map::{MapConfig, RecordSource};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file with an array of memory records.
    #[arg(long, conflicts_with = "demo")]
    records: Option<PathBuf>,
    /// Generate this many synthetic records instead of reading a file.
    #[arg(long)]
    demo: Option<usize>,
    /// Embedding width of generated demo records.
    #[arg(long, default_value_t = 32)]
    dimension: usize,
    #[arg(long)]
    threshold: Option<f32>,
    #[arg(long)]
    max_nodes: Option<usize>,
    /// Comma-separated kinds to show, e.g. `memory,dream`.
    #[arg(long, value_delimiter = ',')]
    kinds: Vec<String>,
    /// JSON map config; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Run the simulation without a window and log frame stats.
    #[arg(long)]
    headless: bool,
    #[arg(long, default_value_t = 600)]
    frames: u64,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn map_config(&self) -> Result<MapConfig> {
        let mut config = match &self.config {
            Some(path) => MapConfig::load(path)?,
            None => MapConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(max_nodes) = self.max_nodes {
            config.max_nodes = max_nodes;
        }
        if !self.kinds.is_empty() {
            config.kinds = self.kinds.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }

    fn source(&self, config: &MapConfig) -> RecordSource {
        match &self.records {
            Some(path) => RecordSource::File(path.clone()),
            None => RecordSource::Demo {
                count: self.demo.unwrap_or(200),
                dimension: self.dimension,
                seed: config.seed.unwrap_or(7),
            },
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.map_config().context("failed to load map config")?;
    let source = args.source(&config);

    if args.headless {
        return headless::run(&source, &config, args.frames);
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "engram-map",
        options,
        Box::new(move |cc| Ok(Box::new(app::MemoryMapApp::new(cc, source, config)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
