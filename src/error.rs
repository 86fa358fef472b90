use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use exif::Error as ExifError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use tokio::task::JoinError;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Tokio join error: {0}")]
    Join(#[from] JoinError),

    #[error("Generic error: {0}")]
    Generic(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Walkdir(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Image(_) => StatusCode::BAD_REQUEST,
            AppError::Exif(_) => StatusCode::BAD_REQUEST,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Url(_) => StatusCode::BAD_REQUEST,
            AppError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Generic(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Failure reported by a [`SidecarSource`](crate::sidecar::SidecarSource)
/// before any parsing happens.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("sidecar not present at {location} (status: {status:?})")]
    NotFound {
        location: String,
        status: Option<u16>,
    },

    #[error("failed to read {location}: {source}")]
    Transport {
        location: String,
        #[source]
        source: BoxedSource,
    },
}

impl FetchError {
    pub fn transport(location: &str, source: impl Into<BoxedSource>) -> Self {
        FetchError::Transport {
            location: location.to_string(),
            source: source.into(),
        }
    }
}

/// Why a metadata lookup produced nothing.
///
/// `NotFound` is an expected outcome for photos without a sidecar; the
/// remaining variants are faults. Callers that only care about presence use
/// [`MetadataService::get_metadata`](crate::sidecar::MetadataService::get_metadata),
/// which folds all of them into `None`.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("invalid image identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("no metadata for {stem} (status: {status:?})")]
    NotFound { stem: String, status: Option<u16> },

    #[error("could not fetch metadata for {stem}: {source}")]
    Transport {
        stem: String,
        #[source]
        source: BoxedSource,
    },

    #[error("malformed metadata for {stem}: {source}")]
    Parse {
        stem: String,
        #[source]
        source: SerdeJsonError,
    },
}

impl MetadataError {
    pub fn from_fetch(stem: &str, err: FetchError) -> Self {
        match err {
            FetchError::NotFound { status, .. } => MetadataError::NotFound {
                stem: stem.to_string(),
                status,
            },
            FetchError::Transport { source, .. } => MetadataError::Transport {
                stem: stem.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound { .. })
    }
}
