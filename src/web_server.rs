use crate::collection::load_collection;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::exposure::{format_exposure, ExposureLabels};
use crate::metadata::ImageMetadata;
use crate::schema::{PhotographSchema, SchemaBuilder};
use crate::sidecar::{is_valid_identifier, MetadataService, DEFAULT_BASE_URL};
use actix_web::{web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use url::Url;

#[derive(Deserialize, Debug)]
struct PhotoQuery {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Serialize, Debug)]
struct PhotoView {
    stem: String,
    found: bool,
    exposure: ExposureLabels,
    schema: PhotographSchema,
}

/// Resolves site-relative paths like `/photos/x.avif` against the site URL;
/// absolute URLs pass through.
fn absolute_url(site_url: &str, path: &str) -> Result<String, AppError> {
    Ok(Url::parse(site_url)?.join(path)?.to_string())
}

fn checked_identifier(id: String) -> Result<String, AppError> {
    if is_valid_identifier(&id) {
        Ok(id)
    } else {
        Err(AppError::BadRequest(format!("invalid identifier {:?}", id)))
    }
}

fn mount_point<'a>(configured: &'a str, fallback: &'a str) -> &'a str {
    if configured.starts_with('/') {
        configured.trim_end_matches('/')
    } else {
        fallback
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn get_photo(
    path: web::Path<String>,
    query: web::Query<PhotoQuery>,
    service: web::Data<MetadataService>,
    schema: web::Data<SchemaBuilder>,
    app_config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let stem = checked_identifier(path.into_inner())?;
    log::debug!("Received request for photo: {}", stem);

    let found = service.get_metadata(&stem).await;
    let empty = ImageMetadata::default();
    let metadata = found.as_deref().unwrap_or(&empty);

    let pipeline = &app_config.pipeline;
    let image_path = format!(
        "{}/{}-display.{}",
        pipeline.image_base_url.trim_end_matches('/'),
        stem,
        pipeline.output_format.extension()
    );
    let image_url = absolute_url(&app_config.site.url, &image_path)?;
    let title = query.title.clone().unwrap_or_else(|| stem.clone());

    let view = PhotoView {
        found: found.is_some(),
        exposure: format_exposure(metadata),
        schema: schema.image_schema(&image_url, &title, metadata, query.description.as_deref()),
        stem,
    };
    Ok(HttpResponse::Ok().json(view))
}

async fn get_collection(
    path: web::Path<String>,
    schema: web::Data<SchemaBuilder>,
    app_config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let slug = checked_identifier(path.into_inner())?;
    log::debug!("Received request for collection: {}", slug);

    let file = Path::new(&app_config.pipeline.collections_directory).join(format!("{}.yaml", slug));
    let collection = tokio::task::spawn_blocking(move || load_collection(&file)).await??;

    let site_url = &app_config.site.url;
    let image_urls = collection
        .photos
        .iter()
        .map(|p| absolute_url(site_url, &p.image))
        .collect::<Result<Vec<_>, _>>()?;
    let collection_url = absolute_url(site_url, &format!("/collections/{}", slug))?;

    let gallery = schema.collection_schema(
        &collection.collection,
        &collection.description,
        &image_urls,
        &collection_url,
    );
    Ok(HttpResponse::Ok().json(gallery))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, config: &AppConfig) {
    let output_dir = config.pipeline.output_directory.clone();
    let metadata_mount = mount_point(&config.metadata.base_url, DEFAULT_BASE_URL);
    let image_mount = mount_point(&config.pipeline.image_base_url, "/photos");

    cfg.service(web::resource("/health").to(health))
        .service(web::resource("/api/photos/{stem}").to(get_photo))
        .service(web::resource("/api/collections/{slug}").to(get_collection))
        .service(actix_files::Files::new(metadata_mount, &output_dir))
        .service(actix_files::Files::new(image_mount, &output_dir));
}

pub async fn start_web_server(config: Arc<AppConfig>, service: Arc<MetadataService>) -> std::io::Result<()> {
    let port = config.web_port;
    log::info!("Metadata sidecars resolve under {}", service.base_url());
    let schema_data = web::Data::new(SchemaBuilder::new(&config.site));
    let config_data = web::Data::from(config);
    let service_data = web::Data::from(service);

    log::info!("Starting web server on port: {}", port);
    log::debug!(
        "Serving sidecars and images from {}",
        config_data.pipeline.output_directory
    );

    HttpServer::new(move || {
        let routes_config = config_data.clone();
        App::new()
            .app_data(config_data.clone())
            .app_data(service_data.clone())
            .app_data(schema_data.clone())
            .configure(|cfg| configure_routes(cfg, &routes_config))
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
