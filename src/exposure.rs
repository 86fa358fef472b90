//! Caption strings for the exposure panel under each photo.

use crate::metadata::ImageMetadata;
use std::collections::BTreeMap;

/// Display label to caption text. Only fields present in the metadata get
/// an entry.
pub type ExposureLabels = BTreeMap<&'static str, String>;

pub fn format_exposure(metadata: &ImageMetadata) -> ExposureLabels {
    let mut labels = ExposureLabels::new();

    if let Some(camera) = metadata.camera_name() {
        labels.insert("camera", camera);
    }
    if let Some(lens) = &metadata.lens {
        labels.insert("lens", lens.clone());
    }
    if let Some(iso) = metadata.iso.as_ref().and_then(|iso| iso.primary()) {
        labels.insert("iso", format!("ISO {}", iso));
    }
    if let Some(aperture) = &metadata.aperture {
        labels.insert("aperture", with_prefix(aperture, "f/"));
    }
    if let Some(shutter) = &metadata.shutter_speed {
        labels.insert("shutter", with_prefix(shutter, "1/"));
    }
    if let Some(focal) = &metadata.focal_length_35mm {
        labels.insert("focal_length", with_suffix(focal, "mm"));
    }
    if let Some(date) = &metadata.date_taken {
        labels.insert("date", exif_date(date));
    }

    labels
}

fn with_prefix(value: &str, prefix: &str) -> String {
    if value.starts_with(prefix) {
        value.to_string()
    } else {
        format!("{}{}", prefix, value)
    }
}

fn with_suffix(value: &str, suffix: &str) -> String {
    if value.ends_with(suffix) {
        value.to_string()
    } else {
        format!("{}{}", value, suffix)
    }
}

/// `2024:01:15 05:43:33` -> `2024-01-15`
fn exif_date(value: &str) -> String {
    let date = value.split(' ').next().unwrap_or_default();
    date.replace(':', "-")
}
