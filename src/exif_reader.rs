use crate::error::AppError;
use crate::metadata::{IsoValue, PhotoMetadata};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads the capture metadata of a source photo. Files without an EXIF
/// block produce an empty record.
pub fn read_photo_metadata(path: &Path) -> Result<PhotoMetadata, AppError> {
    log::trace!("Extracting EXIF data for image: {:?}", path);
    let file = File::open(path)?;
    let mut buf_reader = BufReader::new(file);

    let exif = match Reader::new().read_from_container(&mut buf_reader) {
        Ok(exif) => exif,
        Err(exif::Error::Io(e)) => return Err(AppError::Io(e)),
        Err(e) => {
            log::debug!("No EXIF data found for {:?}: {}", path, e);
            return Ok(PhotoMetadata::default());
        }
    };

    let metadata = from_exif(&exif);
    log::trace!("Extracted metadata for {:?}: {:?}", path, metadata);
    Ok(metadata)
}

fn from_exif(exif: &Exif) -> PhotoMetadata {
    PhotoMetadata {
        camera_make: ascii(exif, Tag::Make),
        camera_model: ascii(exif, Tag::Model),
        lens: ascii(exif, Tag::LensModel),
        date_taken: ascii(exif, Tag::DateTimeOriginal),
        location: None,
        focal_length_35mm: field(exif, Tag::FocalLengthIn35mmFilm)
            .and_then(|v| v.get_uint(0))
            .map(|v| v.to_string()),
        aperture: rational(exif, Tag::FNumber).and_then(|(n, d)| f_number(n, d)),
        shutter_speed: rational(exif, Tag::ExposureTime).and_then(|(n, d)| exposure_time(n, d)),
        iso: iso(exif),
        exposure_mode: display(exif, Tag::ExposureMode),
        metering_mode: display(exif, Tag::MeteringMode),
        exposure_bias: display(exif, Tag::ExposureBiasValue),
        contrast: display(exif, Tag::Contrast),
        saturation: display(exif, Tag::Saturation),
        sharpness: display(exif, Tag::Sharpness),
        image_width: field(exif, Tag::PixelXDimension).and_then(|v| v.get_uint(0)),
        image_height: field(exif, Tag::PixelYDimension).and_then(|v| v.get_uint(0)),
    }
}

fn field(exif: &Exif, tag: Tag) -> Option<&Value> {
    exif.get_field(tag, In::PRIMARY).map(|f| &f.value)
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match field(exif, tag)? {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational(exif: &Exif, tag: Tag) -> Option<(u32, u32)> {
    match field(exif, tag)? {
        Value::Rational(values) => values.first().map(|r| (r.num, r.denom)),
        _ => None,
    }
}

fn display(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().with_unit(exif).to_string())
}

fn iso(exif: &Exif) -> Option<IsoValue> {
    let value = field(exif, Tag::PhotographicSensitivity)?;
    let values: Vec<u32> = value.iter_uint()?.collect();
    match values.as_slice() {
        [] => None,
        [single] => Some(IsoValue::Single(*single)),
        _ => Some(IsoValue::Multiple(values)),
    }
}

/// `14/5` -> `2.8`, `4/1` -> `4`
pub fn f_number(num: u32, denom: u32) -> Option<String> {
    if denom == 0 {
        return None;
    }
    let value = num as f64 / denom as f64;
    let text = format!("{:.1}", value);
    Some(text.trim_end_matches(".0").to_string())
}

/// Shutter value in the `1/N` form the sidecar readers expect.
///
/// `10/1250` -> `1/125`, `3/10` -> `1/3`. Exposures of a second or more
/// keep the reciprocal as a decimal: `1/1`, `2/1` -> `1/0.5`.
pub fn exposure_time(num: u32, denom: u32) -> Option<String> {
    if denom == 0 || num == 0 {
        return None;
    }
    let divisor = gcd(num, denom);
    let (num, denom) = (num / divisor, denom / divisor);
    if num < denom {
        let reciprocal = (denom as f64 / num as f64).round() as u64;
        Some(format!("1/{}", reciprocal))
    } else if num == denom {
        Some("1/1".to_string())
    } else {
        let reciprocal = format!("{:.4}", denom as f64 / num as f64);
        let reciprocal = reciprocal.trim_end_matches('0').trim_end_matches('.');
        Some(format!("1/{}", reciprocal))
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
