//! Catalogued visual assets and their provenance.
//!
//! Assets are produced by the ingestion tooling and are read-only here. The
//! wire form is camelCase; the snake_case and legacy marketplace names written
//! by older catalog exports are accepted as aliases.

use serde::{Deserialize, Serialize};

/// License attached to an asset by the marketplace.
///
/// Older exports carry bare license names, newer ones carry objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum License {
    Named(String),
    Detailed {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

/// Provenance block used for compliance display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Marketplace page of the asset
    #[serde(
        default,
        alias = "source_url",
        alias = "freepik_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,

    /// Title as listed on the marketplace
    #[serde(
        default,
        alias = "freepik_title",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    #[serde(default)]
    pub licenses: Vec<License>,

    /// Online preview image
    #[serde(
        default,
        alias = "preview_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_url: Option<String>,

    /// Preview image on local disk
    #[serde(
        default,
        alias = "local_preview_path",
        alias = "local_preview",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_preview_path: Option<String>,

    /// Whether the marketplace lookup resolved this asset
    #[serde(default, alias = "freepik_resolved")]
    pub resolved: bool,
}

/// Where the URL bound to a scene element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    Marketplace,
    Local,
    Unknown,
}

impl AssetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetSource::Marketplace => "marketplace",
            AssetSource::Local => "local",
            AssetSource::Unknown => "unknown",
        }
    }
}

impl Provenance {
    /// Best available URL by priority `preview_url > local_preview_path > source_url`.
    ///
    /// Empty strings count as absent.
    pub fn best_url(&self) -> Option<(&str, AssetSource)> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.trim().is_empty())
        }

        non_empty(&self.preview_url)
            .map(|url| (url, AssetSource::Marketplace))
            .or_else(|| non_empty(&self.local_preview_path).map(|p| (p, AssetSource::Local)))
            .or_else(|| non_empty(&self.source_url).map(|url| (url, AssetSource::Unknown)))
    }
}

/// A catalogued visual resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AssetRecord")]
pub struct Asset {
    /// Unique within a collection
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub style: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Precomputed embedding; empty when the catalog did not ship one
    #[serde(default, alias = "embedding", skip_serializing_if = "Vec::is_empty")]
    pub vector: Vec<f32>,

    #[serde(flatten)]
    pub provenance: Provenance,
}

/// Flat wire record for [`Asset`].
///
/// Field aliases are not honored inside flattened structs, so the provenance
/// names are read here and regrouped afterwards.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    style: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "embedding")]
    vector: Vec<f32>,
    #[serde(default, alias = "source_url", alias = "freepik_url")]
    source_url: Option<String>,
    #[serde(default, alias = "freepik_title")]
    title: Option<String>,
    #[serde(default)]
    licenses: Vec<License>,
    #[serde(default, alias = "preview_url")]
    preview_url: Option<String>,
    #[serde(default, alias = "local_preview_path", alias = "local_preview")]
    local_preview_path: Option<String>,
    #[serde(default, alias = "freepik_resolved")]
    resolved: bool,
}

impl From<AssetRecord> for Asset {
    fn from(record: AssetRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            category: record.category,
            style: record.style,
            tags: record.tags,
            vector: record.vector,
            provenance: Provenance {
                source_url: record.source_url,
                title: record.title,
                licenses: record.licenses,
                preview_url: record.preview_url,
                local_preview_path: record.local_preview_path,
                resolved: record.resolved,
            },
        }
    }
}

impl Asset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Text that represents this asset for embedding.
    ///
    /// `name description tags... category style`, skipping empty parts.
    pub fn embedding_text(&self) -> String {
        let tags = self.tags.join(" ");
        [
            self.name.as_str(),
            self.description.as_str(),
            tags.as_str(),
            self.category.as_str(),
            self.style.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Copy of this asset without its embedding, as stored in index payloads.
    pub fn without_vector(&self) -> Self {
        Self {
            vector: Vec::new(),
            ..self.clone()
        }
    }

    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.provenance.preview_url = Some(url.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_url_priority() {
        let mut prov = Provenance {
            source_url: Some("https://market/page".into()),
            local_preview_path: Some("/tmp/a.png".into()),
            preview_url: Some("https://cdn/a.png".into()),
            ..Default::default()
        };
        assert_eq!(
            prov.best_url(),
            Some(("https://cdn/a.png", AssetSource::Marketplace))
        );

        prov.preview_url = Some(String::new());
        assert_eq!(prov.best_url(), Some(("/tmp/a.png", AssetSource::Local)));

        prov.local_preview_path = None;
        assert_eq!(
            prov.best_url(),
            Some(("https://market/page", AssetSource::Unknown))
        );

        prov.source_url = Some("  ".into());
        assert_eq!(prov.best_url(), None);
    }

    #[test]
    fn test_embedding_text_skips_empty_parts() {
        let asset = Asset {
            id: "ring_basic".into(),
            name: "Ring".into(),
            description: String::new(),
            category: "structure".into(),
            style: "dreamy".into(),
            tags: vec!["ferris".into(), "wheel".into()],
            ..Default::default()
        };
        assert_eq!(asset.embedding_text(), "Ring ferris wheel structure dreamy");
    }

    #[test]
    fn test_legacy_catalog_fields() {
        let json = r#"{
            "id": "crystal_basic",
            "name": "Crystal",
            "freepik_url": "https://www.freepik.com/crystal",
            "freepik_title": "Glass crystal 3d",
            "freepik_resolved": true,
            "preview_url": "https://img/crystal.png",
            "local_preview": "previews/crystal.png",
            "licenses": [{"type": "freemium", "url": "https://lic"}, "standard"],
            "embedding": [0.5, 0.5]
        }"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(
            asset.provenance.source_url.as_deref(),
            Some("https://www.freepik.com/crystal")
        );
        assert_eq!(asset.provenance.title.as_deref(), Some("Glass crystal 3d"));
        assert!(asset.provenance.resolved);
        assert_eq!(
            asset.provenance.local_preview_path.as_deref(),
            Some("previews/crystal.png")
        );
        assert_eq!(asset.provenance.licenses.len(), 2);
        assert_eq!(
            asset.provenance.licenses[1],
            License::Named("standard".into())
        );
        assert_eq!(asset.vector, vec![0.5, 0.5]);
    }

    #[test]
    fn test_wire_form_is_camel_case() {
        let asset = Asset::new("a1", "Sphere").with_preview_url("https://x/a.png");
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value["previewUrl"], "https://x/a.png");
        assert!(value.get("vector").is_none());
        assert!(value.get("preview_url").is_none());
    }

    #[test]
    fn test_minimal_asset_parses() {
        let asset: Asset =
            serde_json::from_str(r#"{"id":"ring_basic","previewUrl":"https://x/a.png"}"#)
                .unwrap();
        assert_eq!(asset.id, "ring_basic");
        assert!(asset.name.is_empty());
        assert!(!asset.provenance.resolved);
    }
}
