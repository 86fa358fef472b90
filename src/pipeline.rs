use crate::collection::{load_collection, photo_id, write_collection, CollectionGenerator, PhotoEntry};
use crate::config::AppConfig;
use crate::converter::{file_stem, ImageConverter, OutputFormat, Variant};
use crate::error::AppError;
use crate::exif_reader::read_photo_metadata;
use crate::metadata::PhotoMetadata;
use crate::sidecar::{sidecar_location, FileSource, MetadataService};
use crate::walker;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Conversion settings for one run; defaults come from `[pipeline]`.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub quality: u8,
    pub effort: u8,
    pub sharpen: bool,
    pub sizes: Vec<(String, u32)>,
    pub responsive: bool,
}

impl ProcessOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.pipeline.output_directory),
            format: config.pipeline.output_format,
            quality: config.pipeline.quality,
            effort: config.pipeline.effort,
            sharpen: config.pipeline.sharpen,
            sizes: config.size_presets(),
            responsive: config.pipeline.responsive,
        }
    }

    fn converter(&self) -> ImageConverter {
        ImageConverter::new(self.quality, self.effort, self.sharpen)
    }
}

#[derive(Debug)]
pub struct ProcessReport {
    pub stem: String,
    pub metadata: PhotoMetadata,
    pub variants: Vec<Variant>,
    pub sidecar: PathBuf,
}

/// Extracts EXIF, writes every variant and the `-metadata.json` sidecar.
pub fn process_photo(input: &Path, options: &ProcessOptions) -> Result<ProcessReport, AppError> {
    if !input.exists() {
        return Err(AppError::NotFound(format!("File not found: {:?}", input)));
    }
    let stem = file_stem(input)?;
    log::info!("Processing {:?}", input);

    let metadata = read_photo_metadata(input)?;
    log::info!(
        "Metadata extracted: camera {} {}, date {}",
        metadata.camera_make.as_deref().unwrap_or("-"),
        metadata.camera_model.as_deref().unwrap_or("-"),
        metadata.date_taken.as_deref().unwrap_or("-")
    );
    log_capture_settings(&metadata);

    let variants = options.converter().generate_responsive_sizes(
        input,
        &options.output_dir,
        options.format,
        &options.sizes,
        options.responsive,
    )?;
    for variant in &variants {
        let size_kb = std::fs::metadata(&variant.path)
            .map(|m| m.len() as f64 / 1024.0)
            .unwrap_or_default();
        log::info!("  {:12} -> {:?} ({:.1} KB)", variant.name, variant.path, size_kb);
    }

    let sidecar = write_sidecar(&options.output_dir, &stem, &metadata)?;
    log::info!("Metadata saved to {:?}", sidecar);

    Ok(ProcessReport {
        stem,
        metadata,
        variants,
        sidecar,
    })
}

fn log_capture_settings(metadata: &PhotoMetadata) {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    log::debug!(
        "Exposure mode {}, metering {}, bias {}",
        show(&metadata.exposure_mode),
        show(&metadata.metering_mode),
        show(&metadata.exposure_bias)
    );
    log::debug!(
        "Contrast {}, saturation {}, sharpness {}",
        show(&metadata.contrast),
        show(&metadata.saturation),
        show(&metadata.sharpness)
    );
    if let (Some(width), Some(height)) = (metadata.image_width, metadata.image_height) {
        log::debug!("Recorded dimensions {}x{}", width, height);
    }
}

pub fn write_sidecar(output_dir: &Path, stem: &str, metadata: &PhotoMetadata) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(output_dir)?;
    let path = PathBuf::from(sidecar_location(&output_dir.to_string_lossy(), stem));
    let json = serde_json::to_string_pretty(&metadata.to_sidecar())?;
    std::fs::write(&path, json)?;
    Ok(path)
}

fn sidecar_service(directory: &Path) -> MetadataService {
    MetadataService::new(Arc::new(FileSource), directory.to_string_lossy().to_string())
}

async fn load_photo_metadata(service: &MetadataService, stem: &str) -> PhotoMetadata {
    match service.lookup(stem).await {
        Ok(sidecar) => {
            log::debug!("Metadata loaded for {}", stem);
            PhotoMetadata::from(sidecar.as_ref())
        }
        Err(e) if e.is_not_found() => {
            log::info!("No sidecar for {}, using placeholders", stem);
            PhotoMetadata::default()
        }
        Err(e) => {
            log::warn!("Ignoring sidecar for {}: {}", stem, e);
            PhotoMetadata::default()
        }
    }
}

/// Builds a collection from every converted photo in `input_dir`. Titles
/// default to the image stem.
pub async fn generate_yaml(
    config: &AppConfig,
    input_dir: &Path,
    collection_name: &str,
    description: &str,
    output_file: Option<&Path>,
    base_url: &str,
) -> Result<PathBuf, AppError> {
    if !input_dir.exists() {
        return Err(AppError::NotFound(format!("Directory not found: {:?}", input_dir)));
    }

    let extension = config.pipeline.output_format.extension();
    let stems = walker::find_converted_stems(input_dir, extension)?;
    if stems.is_empty() {
        return Err(AppError::NotFound(format!("No images found in {:?}", input_dir)));
    }
    log::info!("Found {} images", stems.len());

    let service = sidecar_service(input_dir);
    service.prefetch(&stems).await;

    let generator = CollectionGenerator::new(base_url, &config.pipeline.collections_directory, extension);
    let mut photos = Vec::with_capacity(stems.len());
    for (i, stem) in stems.iter().enumerate() {
        let metadata = load_photo_metadata(&service, stem).await;
        photos.push(generator.create_photo_entry(&photo_id(i as u32 + 1), stem, &metadata, stem));
    }

    let path = generator.generate_collection(collection_name, description, photos, output_file)?;
    log::info!("Collection YAML generated: {:?} ({} photos)", path, stems.len());
    Ok(path)
}

/// Processes a single photo with the configured defaults and returns its
/// collection entry without writing any collection.
pub fn quick_add(config: &AppConfig, image: &Path, title: &str) -> Result<PhotoEntry, AppError> {
    let options = ProcessOptions::from_config(config);
    let report = process_photo(image, &options)?;

    let generator = CollectionGenerator::new(
        &config.pipeline.image_base_url,
        &config.pipeline.collections_directory,
        options.format.extension(),
    );
    let entry = generator.create_photo_entry(
        &format!("photo-{}", report.stem),
        title,
        &report.metadata,
        &report.stem,
    );

    log::info!("Photo entry created: id {}, title {}", entry.id, entry.title);
    if let Some(metadata) = &entry.metadata {
        log::info!("  Camera: {}, Date: {}", metadata.camera, metadata.date_taken);
    }
    Ok(entry)
}

/// Converts raw photos that have no thumbnail yet, then appends every
/// converted photo the collection does not reference. Returns how many
/// entries were added.
pub async fn add_to_collection(
    config: &AppConfig,
    slug: &str,
    base_url: &str,
    options: ProcessOptions,
    num_workers: usize,
) -> Result<usize, AppError> {
    let generator = CollectionGenerator::new(
        base_url,
        &config.pipeline.collections_directory,
        options.format.extension(),
    );
    let collection_path = generator.collection_path(slug);
    let mut collection = load_collection(&collection_path)?;

    let raw_dir = PathBuf::from(&config.pipeline.raw_directory);
    let raw_images = walker::find_source_images(&raw_dir, &config.pipeline.allowed_extensions)?;
    if raw_images.is_empty() {
        return Err(AppError::NotFound(format!("No raw images found in {:?}", raw_dir)));
    }

    let extension = options.format.extension();
    let unconverted: Vec<PathBuf> = raw_images
        .into_iter()
        .filter(|raw| match file_stem(raw) {
            Ok(stem) => !options
                .output_dir
                .join(format!("{}-thumbnail.{}", stem, extension))
                .exists(),
            Err(_) => false,
        })
        .collect();

    if unconverted.is_empty() {
        log::info!("No new images to process");
    } else {
        log::info!("Found {} new image(s) to process", unconverted.len());
        let options = options.clone();
        let processed =
            tokio::task::spawn_blocking(move || convert_all(unconverted, &options, num_workers)).await??;
        log::info!("Processed {} image(s)", processed);
    }

    let converted = walker::find_converted_stems(&options.output_dir, extension)?;
    if converted.is_empty() {
        return Err(AppError::NotFound(format!(
            "No images found in {:?}",
            options.output_dir
        )));
    }
    log::info!("Collection has {} photos", collection.photos.len());

    let new_stems: Vec<String> = converted
        .into_iter()
        .filter(|stem| !collection.references(stem))
        .collect();
    if new_stems.is_empty() {
        log::info!("No new images to add");
        return Ok(0);
    }
    log::info!("Found {} new image(s) to add", new_stems.len());

    let service = sidecar_service(&options.output_dir);
    let mut next = collection.next_photo_number();
    for stem in &new_stems {
        let metadata = load_photo_metadata(&service, stem).await;
        let entry = generator.create_photo_entry(&photo_id(next), stem, &metadata, stem);
        log::info!("  {} -> {}", stem, entry.id);
        collection.photos.push(entry);
        next += 1;
    }

    write_collection(&collection_path, &collection)?;
    log::info!(
        "Collection updated: {} photo(s) added to {:?}",
        new_stems.len(),
        collection_path
    );
    Ok(new_stems.len())
}

/// Converts `paths` on a dedicated pool. A photo that fails is logged and
/// skipped so the rest of the batch still lands.
fn convert_all(paths: Vec<PathBuf>, options: &ProcessOptions, num_workers: usize) -> Result<usize, AppError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers.max(1))
        .build()
        .map_err(|e| AppError::Generic(format!("Failed to build worker pool: {}", e)))?;
    log::info!("Starting image processing with {} workers", num_workers.max(1));

    let processed = pool.install(|| {
        paths
            .par_iter()
            .filter(|path| match process_photo(path, options) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Failed to process image {:?}: {}", path, e);
                    false
                }
            })
            .count()
    });
    Ok(processed)
}
