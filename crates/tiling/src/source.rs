use crate::address::TileAddress;
use crate::grid::TileGrid;
use crate::template::TileUrlTemplate;

/// Spatial reference id used for export requests (Web Mercator).
const WEB_MERCATOR_WKID: u32 = 3857;

/// How a source turns a tile address into a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Pre-rendered tiles behind a URL template.
    Template(TileUrlTemplate),
    /// A dynamic map service rendering each tile through its `export` operation,
    /// addressed by the tile's projected bounding box.
    ArcGisExport { service_url: String },
}

/// Everything needed to request tiles for one layer: its pyramid and its endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub name: String,
    pub grid: TileGrid,
    pub endpoint: Endpoint,
    pub attribution: Option<String>,
}

impl TileSource {
    pub fn xyz(name: impl Into<String>, template: TileUrlTemplate) -> Self {
        Self::templated(name, template, TileGrid::web_mercator())
    }

    pub fn templated(name: impl Into<String>, template: TileUrlTemplate, grid: TileGrid) -> Self {
        Self {
            name: name.into(),
            grid,
            endpoint: Endpoint::Template(template),
            attribution: None,
        }
    }

    pub fn arcgis_export(name: impl Into<String>, service_url: &str, grid: TileGrid) -> Self {
        Self {
            name: name.into(),
            grid,
            endpoint: Endpoint::ArcGisExport {
                service_url: service_url.trim_end_matches('/').to_string(),
            },
            attribution: None,
        }
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    /// Request URL for `addr`, or `None` if the level is not in this source's grid.
    pub fn tile_url(&self, addr: TileAddress) -> Option<String> {
        match &self.endpoint {
            Endpoint::Template(template) => {
                self.grid.resolution(addr.z)?;
                Some(template.expand(addr))
            }
            Endpoint::ArcGisExport { service_url } => {
                let extent = self.grid.tile_extent(addr)?;
                let size = self.grid.tile_size();
                Some(format!(
                    "{service_url}/export?F=image&FORMAT=PNG32&TRANSPARENT=true\
                     &BBOX={},{},{},{}&BBOXSR={WEB_MERCATOR_WKID}&IMAGESR={WEB_MERCATOR_WKID}\
                     &SIZE={size},{size}&DPI=90",
                    extent.xmin, extent.ymin, extent.xmax, extent.ymax
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, TileSource};
    use crate::address::TileAddress;
    use crate::grid::TileGrid;
    use crate::template::TileUrlTemplate;

    #[test]
    fn templated_source_rejects_unknown_levels() {
        let src = TileSource::xyz(
            "osm",
            TileUrlTemplate::new("https://tile.openstreetmap.org/{z}/{x}/{y}.png").unwrap(),
        );
        assert!(src.tile_url(TileAddress::new(23, 0, 0)).is_some());
        assert!(src.tile_url(TileAddress::new(24, 0, 0)).is_none());
    }

    #[test]
    fn export_source_requests_the_tile_bbox() {
        let grid = TileGrid::web_mercator();
        let src = TileSource::arcgis_export("rest", "https://example.test/MapServer/", grid.clone());
        assert!(matches!(src.endpoint, Endpoint::ArcGisExport { .. }));

        let addr = TileAddress::new(1, 1, 0);
        let url = src.tile_url(addr).unwrap();
        let extent = grid.tile_extent(addr).unwrap();
        assert!(url.starts_with("https://example.test/MapServer/export?F=image"));
        assert!(url.contains(&format!(
            "BBOX={},{},{},{}",
            extent.xmin, extent.ymin, extent.xmax, extent.ymax
        )));
        assert!(url.contains("&SIZE=256,256"));
        assert!(url.contains("&BBOXSR=3857&IMAGESR=3857"));
    }
}
