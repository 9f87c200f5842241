use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rb_annotations::{export_dataset, get_export_stats, ExportOptions, ExportStats};
use rb_cli::annotate;
use rb_cli::config::{AppConfig, LoggingConfig};
use rb_cli::dimensions::probe_dimensions;
use rb_cli::files::DatasetDir;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rb", about = "region bounding-box annotator for ShareGPT image datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "annotator.toml", global = true)]
    config: PathBuf,

    /// Dataset directory (contains dataset.json and images/).
    #[arg(short, long, default_value = ".", global = true)]
    dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the dataset directory is usable and exit.
    Validate,
    /// Print annotation progress statistics.
    Stats,
    /// Splice annotated boxes back into the dataset and write the export file.
    Export {
        /// Also export items that have no annotation yet.
        #[arg(long)]
        include_unannotated: bool,
        /// Output filename inside the dataset directory.
        #[arg(long)]
        output: Option<String>,
    },
    /// Annotate the dataset interactively in the terminal.
    Annotate,
}

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error reading config: {err:#}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    let dir = DatasetDir::new(&cli.dir);
    let result = match cli.command {
        Command::Validate => run_validate(&dir),
        Command::Stats => run_stats(&dir),
        Command::Export {
            include_unannotated,
            output,
        } => run_export(&dir, &config, include_unannotated, output),
        Command::Annotate => annotate::run(&dir, &config),
    };

    if let Err(err) = result {
        eprintln!("{} {err:#}", "Error:".red());
        std::process::exit(1);
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_validate(dir: &DatasetDir) -> Result<(), anyhow::Error> {
    dir.validate()?;
    let items = dir.read_dataset()?;
    println!(
        "Dataset directory valid: {} ({} items)",
        dir.root().display(),
        items.len()
    );
    Ok(())
}

fn run_stats(dir: &DatasetDir) -> Result<(), anyhow::Error> {
    dir.validate()?;
    let items = dir.read_dataset()?;
    let annotations = dir.load_annotations()?.unwrap_or_default();

    print_stats(&get_export_stats(&items, &annotations));
    Ok(())
}

fn print_stats(stats: &ExportStats) {
    println!("{}", "Annotation progress".bold());
    println!("  images:            {}", stats.total_images);
    println!("  fully annotated:   {}", stats.annotated_images);
    println!("  skipped:           {}", stats.skipped_images);
    println!("  regions:           {}", stats.total_regions);
    println!("  boxed regions:     {}", stats.annotated_regions);
    println!(
        "  completion:        {}",
        format!("{}%", stats.completion_percentage).green()
    );
}

fn run_export(
    dir: &DatasetDir,
    config: &AppConfig,
    include_unannotated: bool,
    output: Option<String>,
) -> Result<(), anyhow::Error> {
    dir.validate()?;
    let items = dir.read_dataset()?;
    let annotations = dir.load_annotations()?.unwrap_or_default();
    let dimensions = probe_dimensions(dir, &items);

    let options = ExportOptions {
        include_unannotated: include_unannotated || config.export.include_unannotated,
    };
    let exported = export_dataset(&items, &annotations, &dimensions, options);

    let filename = output.unwrap_or_else(|| config.export.filename.clone());
    let path = dir.write_export(&exported, &filename)?;

    println!(
        "Exported {} of {} items to {}",
        exported.len(),
        items.len(),
        path.display()
    );
    print_stats(&get_export_stats(&items, &annotations));
    Ok(())
}
