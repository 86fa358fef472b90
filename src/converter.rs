use crate::error::AppError;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Widths for the `srcset` variants added on request.
pub const RESPONSIVE_WIDTHS: [(&str, u32); 3] = [("400w", 400), ("800w", 800), ("1600w", 1600)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Avif,
    Webp,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// One written variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ImageConverter {
    quality: u8,
    effort: u8,
    sharpen: bool,
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new(85, 7, true)
    }
}

impl ImageConverter {
    /// `quality` is clamped to 1..=100 and `effort` to 0..=9; higher effort
    /// trades encoding time for smaller AVIF files.
    pub fn new(quality: u8, effort: u8, sharpen: bool) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            effort: effort.min(9),
            sharpen,
        }
    }

    fn avif_speed(&self) -> u8 {
        (10 - self.effort).clamp(1, 10)
    }

    /// Scales `photo` to `width` (height follows the aspect ratio), applies
    /// the optional sharpen pass and writes it in `format`.
    pub fn resize_and_convert(
        &self,
        photo: &Path,
        width: u32,
        output_path: Option<&Path>,
        format: OutputFormat,
    ) -> Result<PathBuf, AppError> {
        ensure_exists(photo)?;
        if width == 0 {
            return Err(AppError::Generic(format!(
                "Target width for {:?} must be positive",
                photo
            )));
        }

        let output_path = match output_path {
            Some(p) => p.to_path_buf(),
            None => {
                let stem = file_stem(photo)?;
                photo.with_file_name(format!("{}-{}w.{}", stem, width, format.extension()))
            }
        };

        log::trace!("Opening image for resize: {:?}", photo);
        let image = image::open(photo)?;
        let height = scaled_height(image.width(), image.height(), width);
        log::debug!(
            "Resizing {:?} from {}x{} to {}x{}",
            photo,
            image.width(),
            image.height(),
            width,
            height
        );

        let mut resized = image.resize_exact(width, height, FilterType::Lanczos3);
        if self.sharpen {
            // Mild unsharp mask; the threshold leaves flat areas like sky alone.
            resized = resized.unsharpen(1.0, 2);
        }

        self.encode(&resized, &output_path, format)?;
        Ok(output_path)
    }

    /// Writes `{stem}-{name}.{ext}` into `output_dir` for every entry in
    /// `sizes`, plus the fixed responsive widths when `responsive` is set.
    pub fn generate_responsive_sizes(
        &self,
        photo: &Path,
        output_dir: &Path,
        format: OutputFormat,
        sizes: &[(String, u32)],
        responsive: bool,
    ) -> Result<Vec<Variant>, AppError> {
        ensure_exists(photo)?;
        std::fs::create_dir_all(output_dir)?;
        let stem = file_stem(photo)?;

        let mut targets: Vec<(String, u32)> = sizes.to_vec();
        if responsive {
            targets.extend(RESPONSIVE_WIDTHS.iter().map(|(n, w)| (n.to_string(), *w)));
        }

        let mut variants = Vec::with_capacity(targets.len());
        for (name, width) in targets {
            let output_path = output_dir.join(format!("{}-{}.{}", stem, name, format.extension()));
            let path = self
                .resize_and_convert(photo, width, Some(&output_path), format)
                .map_err(|e| AppError::Generic(format!("Failed to generate {} size: {}", name, e)))?;
            log::debug!("Generated {} variant at {:?}", name, path);
            variants.push(Variant { name, path });
        }

        Ok(variants)
    }

    fn encode(&self, image: &DynamicImage, path: &Path, format: OutputFormat) -> Result<(), AppError> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let writer = BufWriter::new(File::create(path)?);
        match format {
            OutputFormat::Avif => rgb.write_with_encoder(AvifEncoder::new_with_speed_quality(
                writer,
                self.avif_speed(),
                self.quality,
            ))?,
            OutputFormat::Webp => rgb.write_with_encoder(WebPEncoder::new_lossless(writer))?,
            OutputFormat::Jpeg => {
                rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, self.quality))?
            }
        }
        Ok(())
    }
}

fn ensure_exists(photo: &Path) -> Result<(), AppError> {
    if photo.exists() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Input image not found: {:?}", photo)))
    }
}

pub fn file_stem(path: &Path) -> Result<String, AppError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Generic(format!("No file stem in {:?}", path)))
}

fn scaled_height(src_width: u32, src_height: u32, width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let height = (src_height as f64 * width as f64 / src_width as f64).round() as u32;
    height.max(1)
}
