//! schema.org JSON-LD blocks embedded in photo and collection pages.

use crate::config::SiteConfig;
use crate::metadata::ImageMetadata;
use serde::Serialize;

const SCHEMA_CONTEXT: &str = "https://schema.org";
const GALLERY_PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Person {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebSite {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Instrument {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkExample {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub instrument: Instrument,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhotographSchema {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(rename = "dateCreated", skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    pub creator: Person,
    #[serde(rename = "copyrightHolder")]
    pub copyright_holder: Person,
    #[serde(rename = "workExample", skip_serializing_if = "Option::is_none")]
    pub work_example: Option<WorkExample>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageObject {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    #[serde(rename = "contentUrl")]
    pub content_url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageGallerySchema {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub url: String,
    pub creator: Person,
    #[serde(rename = "isPartOf")]
    pub is_part_of: WebSite,
    pub image: Vec<String>,
    #[serde(rename = "associatedMedia")]
    pub associated_media: Vec<ImageObject>,
}

/// Photographer and site identity shared by every block.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    photographer: Person,
    site: WebSite,
}

impl SchemaBuilder {
    pub fn new(site: &SiteConfig) -> Self {
        Self {
            photographer: Person {
                kind: "Person",
                name: site.photographer.clone(),
                url: site.url.clone(),
            },
            site: WebSite {
                kind: "WebSite",
                name: site.name.clone(),
                url: site.url.clone(),
            },
        }
    }

    /// `Photograph` block. `description` falls back to `title`; the camera
    /// block only appears when the model is known.
    pub fn image_schema(
        &self,
        image_url: &str,
        title: &str,
        metadata: &ImageMetadata,
        description: Option<&str>,
    ) -> PhotographSchema {
        PhotographSchema {
            context: SCHEMA_CONTEXT,
            kind: "Photograph",
            name: title.to_string(),
            description: description.unwrap_or(title).to_string(),
            image: image_url.to_string(),
            date_created: metadata.date_taken.clone(),
            creator: self.photographer.clone(),
            copyright_holder: self.photographer.clone(),
            work_example: camera_block(metadata),
        }
    }

    pub fn collection_schema(
        &self,
        name: &str,
        description: &str,
        image_urls: &[String],
        collection_url: &str,
    ) -> ImageGallerySchema {
        let associated_media = image_urls
            .iter()
            .enumerate()
            .map(|(i, url)| ImageObject {
                kind: "ImageObject",
                content_url: url.clone(),
                name: format!("Photo {}", i + 1),
            })
            .collect();

        ImageGallerySchema {
            context: SCHEMA_CONTEXT,
            kind: "ImageGallery",
            name: name.to_string(),
            description: description.to_string(),
            url: collection_url.to_string(),
            creator: self.photographer.clone(),
            is_part_of: self.site.clone(),
            image: image_urls
                .iter()
                .take(GALLERY_PREVIEW_LIMIT)
                .cloned()
                .collect(),
            associated_media,
        }
    }
}

fn camera_block(metadata: &ImageMetadata) -> Option<WorkExample> {
    metadata.camera_model.as_ref()?;
    let name = metadata.camera_name()?;
    Some(WorkExample {
        kind: "CreativeWork",
        instrument: Instrument {
            kind: "Product",
            name,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new(&SiteConfig {
            name: "Light & Shade".into(),
            url: "https://photos.example.com".into(),
            photographer: "Jane Doe".into(),
        })
    }

    #[test]
    fn image_schema_without_model_has_no_work_example() {
        let metadata = ImageMetadata {
            camera_make: Some("Canon".into()),
            date_taken: Some("2024:01:15 05:43:33".into()),
            ..Default::default()
        };
        let schema = builder().image_schema("/photos/a-display.avif", "Dawn", &metadata, None);
        let json = serde_json::to_value(&schema).unwrap();

        assert!(json.get("workExample").is_none());
        assert_eq!(json["@type"], "Photograph");
        assert_eq!(json["@context"], "https://schema.org");
        assert_eq!(json["description"], "Dawn");
        assert_eq!(json["dateCreated"], "2024:01:15 05:43:33");
        assert_eq!(json["creator"]["name"], "Jane Doe");
    }

    #[test]
    fn image_schema_with_model_names_the_instrument() {
        let metadata = ImageMetadata {
            camera_make: Some("Canon".into()),
            camera_model: Some("EOS R5".into()),
            ..Default::default()
        };
        let schema = builder().image_schema(
            "/photos/a-display.avif",
            "Dawn",
            &metadata,
            Some("Morning over the bay"),
        );
        let json = serde_json::to_value(&schema).unwrap();

        assert_eq!(json["workExample"]["instrument"]["name"], "Canon EOS R5");
        assert_eq!(json["description"], "Morning over the bay");
        assert!(json.get("dateCreated").is_none());
    }

    #[test]
    fn instrument_name_omits_missing_make() {
        let metadata = ImageMetadata {
            camera_model: Some("X100V".into()),
            ..Default::default()
        };
        let schema = builder().image_schema("/x.avif", "X", &metadata, None);
        assert_eq!(schema.work_example.unwrap().instrument.name, "X100V");
    }

    #[test]
    fn collection_schema_limits_preview_images() {
        let urls: Vec<String> = (1..=7).map(|i| format!("/photos/{}-display.avif", i)).collect();
        let schema = builder().collection_schema(
            "Tokyo",
            "Night walks",
            &urls,
            "https://photos.example.com/collections/tokyo",
        );

        assert_eq!(schema.image, urls[..5].to_vec());
        assert_eq!(schema.associated_media.len(), 7);
        for (i, media) in schema.associated_media.iter().enumerate() {
            assert_eq!(media.name, format!("Photo {}", i + 1));
            assert_eq!(media.content_url, urls[i]);
        }

        let json: Value = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["@type"], "ImageGallery");
        assert_eq!(json["isPartOf"]["name"], "Light & Shade");
        assert_eq!(json["associatedMedia"][6]["@type"], "ImageObject");
    }

    #[test]
    fn empty_collection_has_empty_lists() {
        let schema = builder().collection_schema("Empty", "", &[], "/collections/empty");
        assert!(schema.image.is_empty());
        assert!(schema.associated_media.is_empty());
    }
}
