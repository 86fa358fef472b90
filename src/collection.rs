//! YAML collection files read by the static frontend.

use crate::error::AppError;
use crate::metadata::PhotoMetadata;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};

const UNKNOWN: &str = "Unknown";

/// A collection file. Keys this tool does not manage are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<PhotoEntry>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// One photo in a collection. Hand-written entries may carry only some of
/// these fields; missing ones stay missing on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryMetadata {
    pub camera: String,
    pub lens: String,
    pub settings: Settings,
    pub location: String,
    #[serde(rename = "dateTaken")]
    pub date_taken: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub iso: Vec<u32>,
    pub aperture: String,
    pub shutter: String,
    #[serde(rename = "focalLength")]
    pub focal_length: String,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl Collection {
    /// Whether any entry already points at variants of `stem`.
    pub fn references(&self, stem: &str) -> bool {
        let needle = format!("/{}-", stem);
        self.photos.iter().any(|p| p.image.contains(&needle))
    }

    /// One past the highest `photo-NNN` id, starting at 1.
    pub fn next_photo_number(&self) -> u32 {
        self.photos
            .iter()
            .filter_map(|p| p.id.strip_prefix("photo-"))
            .filter_map(|n| n.split('-').next())
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }
}

pub fn photo_id(number: u32) -> String {
    format!("photo-{:03}", number)
}

/// `Tokyo Nights` -> `tokyo-nights`
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

pub struct CollectionGenerator {
    base_url: String,
    collections_dir: PathBuf,
    image_extension: String,
}

impl CollectionGenerator {
    pub fn new(base_url: &str, collections_dir: impl Into<PathBuf>, image_extension: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collections_dir: collections_dir.into(),
            image_extension: image_extension.to_string(),
        }
    }

    pub fn collection_path(&self, slug: &str) -> PathBuf {
        self.collections_dir.join(format!("{}.yaml", slug))
    }

    fn variant_url(&self, stem: &str, size: &str) -> String {
        format!("{}/{}-{}.{}", self.base_url, stem, size, self.image_extension)
    }

    pub fn create_photo_entry(
        &self,
        photo_id: &str,
        title: &str,
        metadata: &PhotoMetadata,
        image_stem: &str,
    ) -> PhotoEntry {
        let make = metadata.camera_make.as_deref().unwrap_or("").trim();
        let model = metadata.camera_model.as_deref().unwrap_or("").trim();
        let camera = format!("{} {}", make, model).trim().to_string();

        PhotoEntry {
            id: photo_id.to_string(),
            title: title.to_string(),
            image: self.variant_url(image_stem, "display"),
            collection: self.variant_url(image_stem, "collection"),
            thumbnail: self.variant_url(image_stem, "thumbnail"),
            metadata: Some(EntryMetadata {
                camera: if camera.is_empty() { UNKNOWN.to_string() } else { camera },
                lens: metadata.lens.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                settings: Settings {
                    iso: vec![metadata.iso.as_ref().and_then(|i| i.primary()).unwrap_or(0)],
                    aperture: format_aperture(metadata.aperture.as_deref()),
                    shutter: format_shutter_speed(metadata.shutter_speed.as_deref()),
                    focal_length: format_focal_length(metadata.focal_length_35mm.as_deref()),
                    extra: Mapping::new(),
                },
                location: metadata
                    .location
                    .clone()
                    .unwrap_or_else(|| "Unknown Location".to_string()),
                date_taken: metadata.date_taken.clone().unwrap_or_default(),
                extra: Mapping::new(),
            }),
            extra: Mapping::new(),
        }
    }

    /// Writes the collection to `output_file`, or to
    /// `{collections_dir}/{slug}.yaml` when none is given.
    pub fn generate_collection(
        &self,
        collection_name: &str,
        description: &str,
        photos: Vec<PhotoEntry>,
        output_file: Option<&Path>,
    ) -> Result<PathBuf, AppError> {
        let collection = Collection {
            collection: collection_name.to_string(),
            description: description.to_string(),
            photos,
            extra: Mapping::new(),
        };
        let path = output_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.collection_path(&slugify(collection_name)));

        write_collection(&path, &collection)?;
        Ok(path)
    }
}

pub fn load_collection(path: &Path) -> Result<Collection, AppError> {
    if !path.exists() {
        return Err(AppError::NotFound(format!(
            "Collection file not found: {:?}",
            path
        )));
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

pub fn write_collection(path: &Path, collection: &Collection) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(collection)?;
    fs::write(path, yaml)?;
    log::debug!(
        "Wrote collection {} with {} photos to {:?}",
        collection.collection,
        collection.photos.len(),
        path
    );
    Ok(())
}

/// Parses `2.8`, `[14/5]`, `f/2.8` as a number, or a `n/d` fraction.
fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    match value.split_once('/') {
        Some((num, denom)) => {
            let denom: f64 = denom.trim().parse().ok()?;
            if denom == 0.0 {
                return None;
            }
            Some(num.trim().parse::<f64>().ok()? / denom)
        }
        None => value.parse().ok(),
    }
}

/// `f/{:.1}` from a stored f-number.
pub fn format_aperture(value: Option<&str>) -> String {
    value
        .map(|v| v.trim().trim_start_matches("f/"))
        .and_then(parse_number)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| format!("f/{:.1}", v))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `1/n` for fractions of a second, `{n}s` for long exposures.
pub fn format_shutter_speed(value: Option<&str>) -> String {
    let Some(raw) = value else {
        return UNKNOWN.to_string();
    };
    let stripped = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if let Some(denom) = stripped.strip_prefix("1/") {
        if denom.trim().parse::<u64>().is_ok() {
            return stripped.to_string();
        }
    }
    match parse_number(stripped).filter(|v| v.is_finite() && *v > 0.0) {
        Some(v) if v >= 1.0 => format!("{}s", v as u64),
        Some(v) => format!("1/{}", (1.0 / v).round() as u64),
        None => UNKNOWN.to_string(),
    }
}

pub fn format_focal_length(value: Option<&str>) -> String {
    value
        .map(|v| v.trim().trim_end_matches("mm"))
        .and_then(parse_number)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| format!("{}mm", v as u64))
        .unwrap_or_else(|| UNKNOWN.to_string())
}
