// src/metadata.rs

use serde::{de, Deserialize, Deserializer, Serialize};

/// ISO as recorded by the camera: one value, or several for bracketed
/// and multi-exposure captures.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum IsoValue {
    Single(u32),
    Multiple(Vec<u32>),
}

/// Wire form accepted for `iso`. Some writers emit `3200.0`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIso {
    Single(f64),
    Multiple(Vec<f64>),
}

fn iso_number(value: f64) -> Result<u32, String> {
    if (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value.round() as u32)
    } else {
        Err(format!("ISO value out of range: {}", value))
    }
}

impl<'de> Deserialize<'de> for IsoValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let iso = match RawIso::deserialize(deserializer)? {
            RawIso::Single(v) => IsoValue::Single(iso_number(v).map_err(de::Error::custom)?),
            RawIso::Multiple(values) => IsoValue::Multiple(
                values
                    .into_iter()
                    .map(iso_number)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(de::Error::custom)?,
            ),
        };
        Ok(iso)
    }
}

impl IsoValue {
    /// The value shown to visitors. Sequences report their first entry.
    pub fn primary(&self) -> Option<u32> {
        match self {
            IsoValue::Single(v) => Some(*v),
            IsoValue::Multiple(values) => values.first().copied(),
        }
    }
}

/// Sidecar record served as `{stem}-metadata.json`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default)]
    pub iso: Option<IsoValue>,
    #[serde(default)]
    pub aperture: Option<String>,
    #[serde(default)]
    pub shutter_speed: Option<String>,
    #[serde(default)]
    pub focal_length_35mm: Option<String>,
    #[serde(default)]
    pub date_taken: Option<String>,
}

impl ImageMetadata {
    /// Make and model joined by a space, skipping whichever is missing.
    pub fn camera_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.camera_make.as_deref(), self.camera_model.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Everything the pipeline pulls out of a source photo's EXIF block.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,

    pub date_taken: Option<String>,
    pub location: Option<String>,

    pub focal_length_35mm: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<IsoValue>,

    pub exposure_mode: Option<String>,
    pub metering_mode: Option<String>,
    pub exposure_bias: Option<String>,

    pub contrast: Option<String>,
    pub saturation: Option<String>,
    pub sharpness: Option<String>,

    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}

impl PhotoMetadata {
    /// Projection written next to the converted images. Make and model fall
    /// back to "Unknown" so the frontend always has a camera line.
    pub fn to_sidecar(&self) -> ImageMetadata {
        ImageMetadata {
            camera_make: Some(
                self.camera_make
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            camera_model: Some(
                self.camera_model
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            lens: self.lens.clone(),
            iso: self.iso.clone(),
            aperture: self.aperture.clone(),
            shutter_speed: self.shutter_speed.clone(),
            focal_length_35mm: self.focal_length_35mm.clone(),
            date_taken: self.date_taken.clone(),
        }
    }
}

impl From<&ImageMetadata> for PhotoMetadata {
    fn from(sidecar: &ImageMetadata) -> Self {
        PhotoMetadata {
            camera_make: sidecar.camera_make.clone(),
            camera_model: sidecar.camera_model.clone(),
            lens: sidecar.lens.clone(),
            date_taken: sidecar.date_taken.clone(),
            focal_length_35mm: sidecar.focal_length_35mm.clone(),
            aperture: sidecar.aperture.clone(),
            shutter_speed: sidecar.shutter_speed.clone(),
            iso: sidecar.iso.clone(),
            ..Default::default()
        }
    }
}
