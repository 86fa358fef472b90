use crate::converter::OutputFormat;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub web_port: u16,
    pub num_workers: usize,
    pub site: SiteConfig,
    pub metadata: MetadataConfig,
    pub pipeline: PipelineConfig,
}

/// Identity emitted in every structured-data block.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    pub photographer: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetadataConfig {
    /// "file" reads sidecars from the output directory, "http" fetches them.
    pub source: String,
    pub base_url: String,
    pub origin: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_directory: String,
    pub output_directory: String,
    pub collections_directory: String,
    pub image_base_url: String,
    pub allowed_extensions: HashSet<String>,
    pub output_format: OutputFormat,
    pub quality: u8,
    pub effort: u8,
    pub sharpen: bool,
    pub thumbnail_width: u32,
    pub collection_width: u32,
    pub display_width: u32,
    pub responsive: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            web_port: 8080,
            num_workers: 4,
            site: SiteConfig::default(),
            metadata: MetadataConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Portfolio".into(),
            url: "http://localhost:8080".into(),
            photographer: "Photographer".into(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            source: "file".into(),
            base_url: "/metadata".into(),
            origin: "http://127.0.0.1:8080".into(),
            timeout_seconds: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_directory: "pipeline_artifacts/raw".into(),
            output_directory: "pipeline_artifacts/converted".into(),
            collections_directory: "src/data/collections".into(),
            image_base_url: "/photos".into(),
            allowed_extensions: ["dng", "jpg", "jpeg", "png", "tif", "tiff", "nef", "raw"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_format: OutputFormat::Avif,
            quality: 85,
            effort: 7,
            sharpen: true,
            thumbnail_width: 350,
            collection_width: 700,
            display_width: 1400,
            responsive: false,
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("PORTFOLIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Named widths for the three layout slots, in generation order.
    pub fn size_presets(&self) -> Vec<(String, u32)> {
        vec![
            ("thumbnail".to_string(), self.pipeline.thumbnail_width),
            ("collection".to_string(), self.pipeline.collection_width),
            ("display".to_string(), self.pipeline.display_width),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(source: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap()
    }

    #[test]
    fn empty_source_uses_defaults() {
        let config = from_toml("");
        assert_eq!(config.web_port, 8080);
        assert_eq!(config.metadata.base_url, "/metadata");
        assert_eq!(config.metadata.source, "file");
        assert_eq!(config.pipeline.quality, 85);
        assert_eq!(config.pipeline.effort, 7);
        assert_eq!(config.pipeline.output_format, OutputFormat::Avif);
        assert!(config.pipeline.allowed_extensions.contains("dng"));
    }

    #[test]
    fn nested_values_override_defaults() {
        let config = from_toml(
            r#"
            log_level = "debug"

            [site]
            photographer = "Jane Doe"

            [metadata]
            source = "http"
            origin = "https://photos.example.com"

            [pipeline]
            output_format = "webp"
            display_width = 2000
            "#,
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.site.photographer, "Jane Doe");
        assert_eq!(config.site.name, "Portfolio");
        assert_eq!(config.metadata.source, "http");
        assert_eq!(config.metadata.base_url, "/metadata");
        assert_eq!(config.pipeline.output_format, OutputFormat::Webp);
        assert_eq!(config.pipeline.display_width, 2000);
        assert_eq!(config.pipeline.thumbnail_width, 350);
    }

    #[test]
    fn size_presets_follow_layout_order() {
        let presets = AppConfig::default().size_presets();
        let names: Vec<&str> = presets.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["thumbnail", "collection", "display"]);
        assert_eq!(presets[2].1, 1400);
    }
}
