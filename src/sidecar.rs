use crate::config::MetadataConfig;
use crate::error::{AppError, FetchError, MetadataError};
use crate::metadata::ImageMetadata;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "/metadata";

/// Where sidecar JSON comes from. Implementations return the raw body;
/// parsing happens in [`MetadataService`].
#[async_trait]
pub trait SidecarSource: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<String, FetchError>;
}

/// Fetches sidecars over HTTP. Relative locations such as
/// `/metadata/x-metadata.json` are resolved against `origin`.
pub struct HttpSource {
    client: reqwest::Client,
    origin: Url,
}

impl HttpSource {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, AppError> {
        log::debug!("Creating sidecar HTTP client for origin: {}", origin);
        let origin = Url::parse(origin)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, origin })
    }

    pub fn from_config(config: &MetadataConfig) -> Result<Self, AppError> {
        Self::new(&config.origin, Duration::from_secs(config.timeout_seconds))
    }
}

#[async_trait]
impl SidecarSource for HttpSource {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        let url = self
            .origin
            .join(location)
            .map_err(|e| FetchError::transport(location, e))?;
        log::trace!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(location, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::NotFound {
                location: location.to_string(),
                status: Some(status.as_u16()),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transport(location, e))
    }
}

/// Reads sidecars from disk; the location is treated as a path.
#[derive(Default)]
pub struct FileSource;

#[async_trait]
impl SidecarSource for FileSource {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        let path = PathBuf::from(location);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound {
                location: location.to_string(),
                status: None,
            }),
            Err(e) => Err(FetchError::transport(location, e)),
        }
    }
}

/// Process-lifetime store of retrieved sidecars, keyed by image stem.
/// Entries are never refreshed; failed lookups are never stored.
#[derive(Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<ImageMetadata>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stem: &str) -> Option<Arc<ImageMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(stem)
            .cloned()
    }

    /// Last writer wins. Both writers fetched the same immutable file, so
    /// the value is the same either way.
    pub fn insert(&self, stem: &str, metadata: Arc<ImageMetadata>) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(stem.to_string(), metadata);
    }

    #[cfg(test)]
    pub fn contains(&self, stem: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(stem)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }

    #[cfg(test)]
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Retrieves sidecar metadata through a [`SidecarSource`] and remembers
/// every successful result for as long as the service lives.
pub struct MetadataService {
    source: Arc<dyn SidecarSource>,
    base_url: String,
    cache: MetadataCache,
}

impl MetadataService {
    pub fn new(source: Arc<dyn SidecarSource>, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            cache: MetadataCache::new(),
        }
    }

    /// Builds the service the way the server and the pipeline share it:
    /// "http" fetches from the configured origin, anything else reads the
    /// pipeline's output directory.
    pub fn from_config(config: &MetadataConfig, output_directory: &str) -> Result<Self, AppError> {
        if config.source == "http" {
            log::info!(
                "Reading sidecars over HTTP from {}{}",
                config.origin,
                config.base_url
            );
            let source = HttpSource::from_config(config)?;
            Ok(Self::new(Arc::new(source), config.base_url.clone()))
        } else {
            log::info!("Reading sidecars from directory {}", output_directory);
            Ok(Self::new(Arc::new(FileSource), output_directory))
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[cfg(test)]
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Metadata for `stem`, or `None` when it is missing or unreadable.
    /// Never fails; the reason is logged instead.
    pub async fn get_metadata(&self, stem: &str) -> Option<Arc<ImageMetadata>> {
        self.get_metadata_from(stem, &self.base_url).await
    }

    pub async fn get_metadata_from(&self, stem: &str, base_url: &str) -> Option<Arc<ImageMetadata>> {
        absent_on_failure(stem, self.lookup_from(stem, base_url).await)
    }

    /// Same as [`get_metadata`](Self::get_metadata) but reports why nothing
    /// came back.
    pub async fn lookup(&self, stem: &str) -> Result<Arc<ImageMetadata>, MetadataError> {
        self.lookup_from(stem, &self.base_url).await
    }

    pub async fn lookup_from(
        &self,
        stem: &str,
        base_url: &str,
    ) -> Result<Arc<ImageMetadata>, MetadataError> {
        if !is_valid_identifier(stem) {
            return Err(MetadataError::InvalidIdentifier(stem.to_string()));
        }

        if let Some(cached) = self.cache.get(stem) {
            log::trace!("Metadata cache hit for {}", stem);
            return Ok(cached);
        }

        let location = sidecar_location(base_url, stem);
        log::debug!("Fetching metadata for {} from {}", stem, location);

        let body = self
            .source
            .fetch(&location)
            .await
            .map_err(|e| MetadataError::from_fetch(stem, e))?;

        let metadata: ImageMetadata =
            serde_json::from_str(&body).map_err(|source| MetadataError::Parse {
                stem: stem.to_string(),
                source,
            })?;

        let metadata = Arc::new(metadata);
        self.cache.insert(stem, metadata.clone());
        Ok(metadata)
    }

    /// Warms the cache for several stems at once. Returns how many resolved.
    pub async fn prefetch<S: AsRef<str>>(&self, stems: &[S]) -> usize {
        let results = join_all(stems.iter().map(|s| self.get_metadata(s.as_ref()))).await;
        let found = results.iter().filter(|r| r.is_some()).count();
        log::debug!("Prefetched metadata for {}/{} images", found, stems.len());
        found
    }
}

fn absent_on_failure(
    stem: &str,
    result: Result<Arc<ImageMetadata>, MetadataError>,
) -> Option<Arc<ImageMetadata>> {
    match result {
        Ok(metadata) => Some(metadata),
        Err(e) if e.is_not_found() => {
            log::warn!("No metadata found for {}", stem);
            None
        }
        Err(e) => {
            log::error!("Error loading metadata for {}: {}", stem, e);
            None
        }
    }
}

/// Stems and slugs become file names, so they must be a single path
/// segment.
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && !id.contains("..")
        && !id.contains(|c: char| c == '/' || c == '\\' || c.is_control())
}

/// `{base}/{stem}-metadata.json`
pub fn sidecar_location(base_url: &str, stem: &str) -> String {
    format!("{}/{}-metadata.json", base_url.trim_end_matches('/'), stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::IsoValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source that counts how often it is asked.
    struct StubSource {
        bodies: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(bodies: &[(&str, &str)]) -> Self {
            Self {
                bodies: bodies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SidecarSource for StubSource {
        async fn fetch(&self, location: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .get(location)
                .cloned()
                .ok_or_else(|| FetchError::NotFound {
                    location: location.to_string(),
                    status: Some(404),
                })
        }
    }

    fn service_with(source: Arc<StubSource>) -> MetadataService {
        MetadataService::new(source, DEFAULT_BASE_URL)
    }

    #[test]
    fn location_joins_base_and_stem() {
        assert_eq!(
            sidecar_location("/metadata", "R0012110"),
            "/metadata/R0012110-metadata.json"
        );
        assert_eq!(
            sidecar_location("https://cdn.example.com/meta/", "a"),
            "https://cdn.example.com/meta/a-metadata.json"
        );
    }

    #[tokio::test]
    async fn successful_fetch_is_cached_and_not_repeated() {
        let source = Arc::new(StubSource::new(&[(
            "/metadata/tokyo-metadata.json",
            r#"{"camera_make": "Ricoh", "iso": [200]}"#,
        )]));
        let service = service_with(source.clone());

        let first = service.get_metadata("tokyo").await.unwrap();
        let second = service.get_metadata("tokyo").await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.iso, Some(IsoValue::Multiple(vec![200])));
        assert!(service.cache().contains("tokyo"));
    }

    #[tokio::test]
    async fn cached_entry_short_circuits_the_source() {
        let source = Arc::new(StubSource::new(&[]));
        let service = service_with(source.clone());
        let seeded = Arc::new(ImageMetadata {
            lens: Some("28mm".into()),
            ..Default::default()
        });
        service.cache().insert("seeded", seeded.clone());

        let found = service.get_metadata("seeded").await;

        assert_eq!(found, Some(seeded));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn missing_sidecar_is_absent_and_not_cached() {
        let source = Arc::new(StubSource::new(&[]));
        let service = service_with(source.clone());

        assert!(service.get_metadata("ghost").await.is_none());
        assert!(service.get_metadata("ghost").await.is_none());

        assert_eq!(source.calls(), 2);
        assert!(service.cache().is_empty());
        assert!(service.lookup("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn malformed_body_is_absent_and_not_cached() {
        let source = Arc::new(StubSource::new(&[(
            "/metadata/broken-metadata.json",
            "{not json",
        )]));
        let service = service_with(source.clone());

        assert!(service.get_metadata("broken").await.is_none());
        assert!(service.cache().is_empty());
        assert!(matches!(
            service.lookup("broken").await,
            Err(MetadataError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn empty_identifier_is_rejected_without_fetching() {
        let source = Arc::new(StubSource::new(&[]));
        let service = service_with(source.clone());

        assert!(matches!(
            service.lookup("").await,
            Err(MetadataError::InvalidIdentifier(_))
        ));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn identifiers_cannot_leave_the_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("converted");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(dir.path().join("secret-metadata.json"), r#"{"lens": "hidden"}"#).unwrap();
        let service = MetadataService::new(Arc::new(FileSource), base.to_string_lossy().to_string());

        for stem in ["../secret", "..\\secret", "a/b", "..", "a\nb"] {
            assert!(
                matches!(service.lookup(stem).await, Err(MetadataError::InvalidIdentifier(_))),
                "{:?}",
                stem
            );
            assert!(service.get_metadata(stem).await.is_none());
        }
        assert!(service.cache().is_empty());
    }

    #[test]
    fn plain_stems_are_valid_identifiers() {
        assert!(is_valid_identifier("R0012110"));
        assert!(is_valid_identifier("tokyo-nights"));
        assert!(is_valid_identifier("DSC_0001.edit"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a..b"));
        assert!(!is_valid_identifier("/etc/passwd"));
    }

    #[tokio::test]
    async fn explicit_base_overrides_default() {
        let source = Arc::new(StubSource::new(&[("/other/a-metadata.json", "{}")]));
        let service = service_with(source.clone());

        assert!(service.get_metadata_from("a", "/other/").await.is_some());
        assert!(service.get_metadata("a").await.is_some());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn prefetch_counts_resolved_stems() {
        let source = Arc::new(StubSource::new(&[
            ("/metadata/a-metadata.json", "{}"),
            ("/metadata/b-metadata.json", r#"{"lens": "50mm"}"#),
        ]));
        let service = service_with(source.clone());

        let found = service.prefetch(&["a", "b", "c"]).await;

        assert_eq!(found, 2);
        assert!(service.cache().contains("a"));
        assert!(service.cache().contains("b"));
        assert!(!service.cache().contains("c"));
    }

    #[tokio::test]
    async fn clearing_the_cache_forces_a_refetch() {
        let source = Arc::new(StubSource::new(&[("/metadata/a-metadata.json", "{}")]));
        let service = service_with(source.clone());

        service.get_metadata("a").await;
        service.cache().clear();
        service.get_metadata("a").await;

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn file_source_reads_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dune-metadata.json"),
            r#"{"camera_model": "X100V", "date_taken": "2024:01:15 05:43:33"}"#,
        )
        .unwrap();
        let base = dir.path().to_string_lossy().to_string();
        let service = MetadataService::new(Arc::new(FileSource), base);

        let found = service.get_metadata("dune").await.unwrap();
        assert_eq!(found.camera_model.as_deref(), Some("X100V"));

        let missing = service.lookup("absent").await.unwrap_err();
        assert!(matches!(
            missing,
            MetadataError::NotFound { status: None, .. }
        ));
    }

    #[tokio::test]
    async fn http_source_fetches_once_per_stem() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metadata/R0012110-metadata.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"camera_make": "RICOH IMAGING COMPANY, LTD.", "camera_model": "RICOH GR III"}"#)
            .expect(1)
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let service = MetadataService::new(Arc::new(source), DEFAULT_BASE_URL);

        let first = service.get_metadata("R0012110").await.unwrap();
        service.get_metadata("R0012110").await.unwrap();

        mock.assert_async().await;
        assert_eq!(first.camera_model.as_deref(), Some("RICOH GR III"));
    }

    #[tokio::test]
    async fn http_error_status_is_not_found_and_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metadata/missing-metadata.json")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let service = MetadataService::new(Arc::new(source), DEFAULT_BASE_URL);

        let err = service.lookup("missing").await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::NotFound {
                status: Some(404),
                ..
            }
        ));
        assert!(service.get_metadata("missing").await.is_none());

        mock.assert_async().await;
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn http_malformed_json_is_absent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/metadata/bad-metadata.json")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let source = HttpSource::new(&server.url(), Duration::from_secs(5)).unwrap();
        let service = MetadataService::new(Arc::new(source), DEFAULT_BASE_URL);

        assert!(service.get_metadata("bad").await.is_none());
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn http_transport_failure_is_absent() {
        // Nothing listens on port 9 on a test host.
        let source = HttpSource::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let service = MetadataService::new(Arc::new(source), DEFAULT_BASE_URL);

        assert!(matches!(
            service.lookup("any").await,
            Err(MetadataError::Transport { .. })
        ));
        assert!(service.get_metadata("any").await.is_none());
    }
}
