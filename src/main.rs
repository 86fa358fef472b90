mod collection;
mod config;
mod converter;
mod error;
mod exif_reader;
mod exposure;
mod metadata;
mod pipeline;
mod schema;
mod sidecar;
mod walker;
mod web_server;

use crate::config::AppConfig;
use crate::converter::OutputFormat;
use crate::pipeline::ProcessOptions;
use crate::sidecar::MetadataService;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "portfolio", about = "Photography portfolio pipeline and metadata server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a photo into responsive variants and write its sidecar.
    Process {
        input_path: PathBuf,
        #[command(flatten)]
        conversion: ConversionArgs,
        #[arg(long)]
        thumbnail_width: Option<u32>,
        #[arg(long)]
        collection_width: Option<u32>,
        #[arg(long)]
        display_width: Option<u32>,
        /// Also generate 400w, 800w and 1600w variants.
        #[arg(long)]
        responsive: bool,
        #[arg(long)]
        no_sharpen: bool,
    },
    /// Build a collection YAML from converted photos.
    GenerateYaml {
        input_dir: PathBuf,
        #[arg(long)]
        collection_name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        output_file: Option<PathBuf>,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Convert one photo and print its collection entry.
    QuickAdd {
        image_path: PathBuf,
        #[arg(long)]
        title: String,
    },
    /// Convert new raw photos and append them to an existing collection.
    AddToCollection {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        base_url: Option<String>,
        #[command(flatten)]
        conversion: ConversionArgs,
    },
    /// Serve sidecars, images and the render API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug)]
struct ConversionArgs {
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,
    /// Compression effort, 0-9; higher is smaller but slower.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    effort: Option<u8>,
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

impl ConversionArgs {
    fn apply(&self, options: &mut ProcessOptions) {
        if let Some(dir) = &self.output_dir {
            options.output_dir = dir.clone();
        }
        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        if let Some(effort) = self.effort {
            options.effort = effort;
        }
        if let Some(format) = self.format {
            options.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::new()?;

    // Initialize env_logger based on config.log_level
    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting portfolio");

    match cli.command {
        Command::Process {
            input_path,
            conversion,
            thumbnail_width,
            collection_width,
            display_width,
            responsive,
            no_sharpen,
        } => {
            if let Some(w) = thumbnail_width {
                config.pipeline.thumbnail_width = w;
            }
            if let Some(w) = collection_width {
                config.pipeline.collection_width = w;
            }
            if let Some(w) = display_width {
                config.pipeline.display_width = w;
            }
            let mut options = ProcessOptions::from_config(&config);
            conversion.apply(&mut options);
            options.responsive |= responsive;
            options.sharpen &= !no_sharpen;

            let report =
                tokio::task::spawn_blocking(move || pipeline::process_photo(&input_path, &options)).await??;
            info!(
                "Processed {}: {} variant(s), sidecar {:?}",
                report.stem,
                report.variants.len(),
                report.sidecar
            );
        }
        Command::GenerateYaml {
            input_dir,
            collection_name,
            description,
            output_file,
            base_url,
        } => {
            let base_url = base_url.unwrap_or_else(|| config.pipeline.image_base_url.clone());
            pipeline::generate_yaml(
                &config,
                &input_dir,
                &collection_name,
                &description,
                output_file.as_deref(),
                &base_url,
            )
            .await?;
        }
        Command::QuickAdd { image_path, title } => {
            tokio::task::spawn_blocking(move || pipeline::quick_add(&config, &image_path, &title)).await??;
        }
        Command::AddToCollection {
            collection,
            base_url,
            conversion,
        } => {
            let base_url = base_url.unwrap_or_else(|| config.pipeline.image_base_url.clone());
            let mut options = ProcessOptions::from_config(&config);
            conversion.apply(&mut options);
            pipeline::add_to_collection(&config, &collection, &base_url, options, config.num_workers).await?;
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.web_port = port;
            }
            let service = MetadataService::from_config(&config.metadata, &config.pipeline.output_directory)?;
            // Run the web server in the foreground
            if let Err(e) = web_server::start_web_server(Arc::new(config), Arc::new(service)).await {
                log::error!("Web server error: {}", e);
            }
        }
    }

    info!("portfolio finished");

    Ok(())
}
