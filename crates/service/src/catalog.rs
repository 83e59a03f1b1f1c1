use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tiling::{ConfigError, TileSource, TileUrlTemplate};

pub const DEFAULT_BASEMAP: &str = "osm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasemapPreset {
    pub key: String,
    /// Display name.
    pub name: String,
    /// XYZ template; may carry one `{1-4}` style host range.
    pub url_template: String,
    #[serde(default)]
    pub attribution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnknownKey(String),
    InvalidTemplate { key: String, reason: ConfigError },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::UnknownKey(key) => write!(f, "unknown basemap '{key}'"),
            CatalogError::InvalidTemplate { key, reason } => {
                write!(f, "basemap '{key}' has an invalid url template: {reason}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Named basemap presets, keyed by a short id such as `osm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasemapCatalog {
    presets: BTreeMap<String, BasemapPreset>,
}

impl Default for BasemapCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BasemapCatalog {
    pub fn empty() -> Self {
        Self {
            presets: BTreeMap::new(),
        }
    }

    /// OpenStreetMap and Gaode (AutoNavi) street maps.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.insert(BasemapPreset {
            key: "osm".to_string(),
            name: "OpenStreetMap".to_string(),
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: Some("© OpenStreetMap contributors".to_string()),
        });
        catalog.insert(BasemapPreset {
            key: "gaode".to_string(),
            name: "Gaode".to_string(),
            url_template:
                "http://wprd0{1-4}.is.autonavi.com/appmaptile?lang=zh_cn&size=1&style=7&x={x}&y={y}&z={z}"
                    .to_string(),
            attribution: Some("© AutoNavi".to_string()),
        });
        catalog
    }

    /// Adds or replaces a preset. Returns the one it replaced.
    pub fn insert(&mut self, preset: BasemapPreset) -> Option<BasemapPreset> {
        self.presets.insert(preset.key.clone(), preset)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Result<&BasemapPreset, CatalogError> {
        self.presets
            .get(key)
            .ok_or_else(|| CatalogError::UnknownKey(key.to_string()))
    }

    /// Resolves `key` to a Web Mercator XYZ source.
    pub fn source(&self, key: &str) -> Result<TileSource, CatalogError> {
        let preset = self.get(key)?;
        let template = TileUrlTemplate::new(preset.url_template.as_str()).map_err(|reason| {
            CatalogError::InvalidTemplate {
                key: key.to_string(),
                reason,
            }
        })?;
        let source = TileSource::xyz(preset.name.as_str(), template);
        Ok(match &preset.attribution {
            Some(text) => source.with_attribution(text.as_str()),
            None => source,
        })
    }
}
