use std::collections::{HashMap, HashSet};

use foundation::bounds::{ProjectedExtent, ProjectedPoint};
use foundation::math::DomainError;
use foundation::time::Time;
use futures_util::stream::{FuturesUnordered, StreamExt};
use layers::{LayerHandle, LayerStack};
use runtime::{Event, EventBus, Frame};
use service::{
    CatalogError, HttpClient, HttpResponse, INITIAL_ZOOM, MetadataError, Notice, Notifier,
    ProbeResult, ProbeStatus, ServiceMetadata, ServiceProbe, TracingNotifier, TransportError,
    summarize,
};
use tiling::{ConfigError, TileAddress, TileSource};
use tracing::{debug, error, info, warn};
use viewport::{ViewState, ViewportController, ViewportError, ViewportSize};

use crate::config::{Backdrop, SessionConfig};
use crate::tiles::{TileEvent, TileOutcome, TileRequest, TileState, TileStats};

#[derive(Debug)]
pub enum SessionError {
    Metadata(MetadataError),
    Grid(ConfigError),
    Projection(DomainError),
    Viewport(ViewportError),
    Catalog(CatalogError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Metadata(e) => write!(f, "{e}"),
            SessionError::Grid(e) => write!(f, "{e}"),
            SessionError::Projection(e) => write!(f, "{e}"),
            SessionError::Viewport(e) => write!(f, "{e}"),
            SessionError::Catalog(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Metadata(e) => Some(e),
            SessionError::Grid(e) => Some(e),
            SessionError::Projection(e) => Some(e),
            SessionError::Viewport(e) => Some(e),
            SessionError::Catalog(e) => Some(e),
        }
    }
}

impl From<MetadataError> for SessionError {
    fn from(e: MetadataError) -> Self {
        SessionError::Metadata(e)
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Grid(e)
    }
}

impl From<DomainError> for SessionError {
    fn from(e: DomainError) -> Self {
        SessionError::Projection(e)
    }
}

impl From<ViewportError> for SessionError {
    fn from(e: ViewportError) -> Self {
        SessionError::Viewport(e)
    }
}

impl From<CatalogError> for SessionError {
    fn from(e: CatalogError) -> Self {
        SessionError::Catalog(e)
    }
}

/// Outcome of requesting the single tile used to validate the URL layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSpotCheck {
    pub address: TileAddress,
    pub url: String,
    pub status: ProbeStatus,
    pub content_type: Option<String>,
    pub bytes: usize,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub layers: usize,
    pub tiles: TileStats,
}

/// The map: one view, one layer stack, one clock.
///
/// Nothing here is shared. Async operations hold `&mut self` across their
/// awaits and re-check layer handles after every completion.
pub struct MapSession<N: Notifier = TracingNotifier> {
    config: SessionConfig,
    viewport: ViewportController,
    layers: LayerStack,
    overlay: Option<LayerHandle>,
    basemap: String,
    backdrop: Backdrop,
    frame: Frame,
    tile_events: EventBus<TileEvent>,
    tile_states: HashMap<(LayerHandle, TileAddress), TileState>,
    tile_stats: TileStats,
    notifier: N,
}

impl MapSession<TracingNotifier> {
    pub fn open(config: SessionConfig) -> Result<Self, SessionError> {
        Self::open_with_notifier(config, TracingNotifier)
    }
}

impl<N: Notifier> MapSession<N> {
    /// Validates the service metadata, builds the grid, centers the view on
    /// the dataset and installs the configured base map.
    pub fn open_with_notifier(config: SessionConfig, notifier: N) -> Result<Self, SessionError> {
        let metadata = &config.metadata;
        metadata.validate()?;
        if let Some(tolerance_m) = config.extent_tolerance_m {
            metadata.check_extent_consistency(tolerance_m)?;
        }
        let grid = metadata.tile_grid()?;
        let initial = ViewState::new(metadata.initial_center()?, INITIAL_ZOOM);
        let mut viewport = ViewportController::new(grid, config.viewport, initial)?;
        if config.constrain_view {
            viewport = viewport.with_extent_constraint(metadata.web_mercator_extent);
        }

        let mut layers = LayerStack::new();
        layers.set_base(config.catalog.source(&config.basemap)?);

        info!(
            service = %metadata.service_url,
            basemap = %config.basemap,
            zoom = viewport.view().zoom,
            "map session opened"
        );
        Ok(Self {
            basemap: config.basemap.clone(),
            config,
            viewport,
            layers,
            overlay: None,
            backdrop: Backdrop::default(),
            frame: Frame::start(),
            tile_events: EventBus::new(),
            tile_states: HashMap::new(),
            tile_stats: TileStats::default(),
            notifier,
        })
    }

    pub fn close(self) -> SessionSummary {
        let summary = SessionSummary {
            frames: self.frame.index,
            layers: self.layers.len(),
            tiles: self.tile_stats,
        };
        info!(frames = summary.frames, tiles = %summary.tiles, "map session closed");
        summary
    }

    pub fn metadata(&self) -> &ServiceMetadata {
        &self.config.metadata
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn overlay(&self) -> Option<LayerHandle> {
        self.overlay
    }

    pub fn basemap_key(&self) -> &str {
        &self.basemap
    }

    pub fn backdrop(&self) -> Backdrop {
        self.backdrop
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn view(&self) -> ViewState {
        self.viewport.view()
    }

    pub fn visible_extent(&self) -> ProjectedExtent {
        self.viewport.visible_extent()
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn now(&self) -> Time {
        self.frame.time
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn tile_stats(&self) -> TileStats {
        self.tile_stats
    }

    pub fn tile_state(&self, layer: LayerHandle, address: TileAddress) -> Option<TileState> {
        self.tile_states.get(&(layer, address)).copied()
    }

    pub fn drain_tile_events(&mut self) -> Vec<Event<TileEvent>> {
        self.tile_events.drain()
    }

    /// Advances the clock by `dt_ms` and steps any view animation.
    /// Returns `true` while the view is still animating.
    pub fn tick(&mut self, dt_ms: u64) -> bool {
        self.frame = self.frame.advance(dt_ms);
        self.viewport.update(self.frame.time)
    }

    pub fn pan_to(&mut self, center: ProjectedPoint) {
        let now = self.now();
        self.viewport.pan_to(center, now);
    }

    pub fn zoom_to(&mut self, zoom: f64) {
        let now = self.now();
        self.viewport.zoom_to(zoom, now);
    }

    pub fn resize(&mut self, size: ViewportSize) -> Result<(), SessionError> {
        Ok(self.viewport.set_viewport_size(size)?)
    }

    pub fn set_layer_visible(&mut self, layer: LayerHandle, visible: bool) -> bool {
        match self.layers.get_mut(layer) {
            Some(l) => {
                l.style.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_layer_opacity(&mut self, layer: LayerHandle, opacity: f32) -> bool {
        match self.layers.get_mut(layer) {
            Some(l) => {
                l.style.set_opacity(opacity);
                true
            }
            None => false,
        }
    }

    /// Swaps the base map for catalog entry `key`, leaving overlays alone.
    pub fn switch_base_map(&mut self, key: &str) -> Result<LayerHandle, SessionError> {
        let source = match self.config.catalog.source(key) {
            Ok(source) => source,
            Err(e) => {
                self.notifier
                    .notify(Notice::error(format!("base map switch failed: {e}")));
                return Err(e.into());
            }
        };
        let name = source.name.clone();
        let handle = self.layers.set_base(source);
        self.basemap = key.to_string();
        info!(key, %name, "switched base map");
        Ok(handle)
    }

    /// Adds the service's cached tiles as the overlay and fits the view to
    /// the service extent.
    pub fn load_overlay(&mut self) -> Result<LayerHandle, SessionError> {
        let source = self.config.metadata.tile_source().map_err(SessionError::from);
        self.install_overlay(source)
    }

    /// Same as [`load_overlay`](Self::load_overlay) but renders tiles through
    /// the service's dynamic `export` endpoint.
    pub fn load_arcgis_overlay(&mut self) -> Result<LayerHandle, SessionError> {
        let source = self.config.metadata.export_source().map_err(SessionError::from);
        self.install_overlay(source)
    }

    fn install_overlay(
        &mut self,
        source: Result<TileSource, SessionError>,
    ) -> Result<LayerHandle, SessionError> {
        match self.try_install_overlay(source) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                error!(error = %e, "overlay load failed");
                self.notifier
                    .notify(Notice::error(format!("overlay load failed: {e}")));
                Err(e)
            }
        }
    }

    fn try_install_overlay(
        &mut self,
        source: Result<TileSource, SessionError>,
    ) -> Result<LayerHandle, SessionError> {
        let source = source?;
        let target = self.config.metadata.web_mercator_extent;
        let fit = self.config.load_fit;
        // Reject an unusable fit before any layer changes.
        self.viewport.fit_view(&target, &fit)?;

        if self.config.exclusive_overlay {
            self.layers.clear_all();
        } else if let Some(previous) = self.overlay.take() {
            self.layers.remove_overlay(previous);
        }
        self.forget_removed_tiles();

        let name = source.name.clone();
        let handle = self.layers.add_overlay(source);
        self.overlay = Some(handle);
        self.backdrop = Backdrop::Black;

        let now = self.now();
        self.viewport.fit(&target, &fit, now)?;
        self.notifier
            .notify(Notice::success(format!("overlay '{name}' loaded")));
        Ok(handle)
    }

    /// Removes the overlay. Returns whether there was one.
    pub fn clear_overlay(&mut self) -> bool {
        let removed = self
            .overlay
            .take()
            .is_some_and(|handle| self.layers.remove_overlay(handle));
        if removed {
            self.forget_removed_tiles();
            self.notifier.notify(Notice::success("overlay cleared"));
        } else {
            self.notifier.notify(Notice::info("no overlay to clear"));
        }
        removed
    }

    /// Puts the selected base map back beneath the overlay, unless a base map
    /// is already present.
    pub fn restore_base_map(&mut self) -> Result<Option<LayerHandle>, SessionError> {
        if self.layers.base().is_some() {
            self.notifier.notify(Notice::info("base map already present"));
            return Ok(None);
        }
        let source = match self.config.catalog.source(&self.basemap) {
            Ok(source) => source,
            Err(e) => {
                self.notifier
                    .notify(Notice::error(format!("base map restore failed: {e}")));
                return Err(e.into());
            }
        };
        let name = source.name.clone();
        let handle = self.layers.set_base(source);
        self.backdrop = Backdrop::White;
        info!(%name, "restored base map");
        self.notifier
            .notify(Notice::success(format!("restored {name} base map")));
        Ok(Some(handle))
    }

    /// Fits the view back to the full service extent.
    pub fn reset_view(&mut self) -> Result<ViewState, SessionError> {
        let target = self.config.metadata.web_mercator_extent;
        let fit = self.config.reset_fit;
        let now = self.now();
        match self.viewport.fit(&target, &fit, now) {
            Ok(view) => {
                self.notifier
                    .notify(Notice::info("view reset to the service extent"));
                Ok(view)
            }
            Err(e) => {
                self.notifier
                    .notify(Notice::error(format!("view reset failed: {e}")));
                Err(e.into())
            }
        }
    }

    /// Probes the service endpoints one after another and reports `n/m succeeded`.
    pub async fn test_connection(&mut self, client: &dyn HttpClient) -> Vec<ProbeResult> {
        let targets = self.config.metadata.probe_targets();
        info!(count = targets.len(), "testing service connection");
        let results = ServiceProbe::new(client).probe(&targets).await;
        let summary = summarize(&results);
        if summary.all_failed() {
            self.notifier
                .notify(Notice::error("service connection test failed"));
        } else {
            self.notifier
                .notify(Notice::success(format!("service connection test: {summary}")));
        }
        results
    }

    /// Requests one known tile straight from the URL template.
    pub async fn spot_check_tile(&self, client: &dyn HttpClient) -> TileSpotCheck {
        let metadata = &self.config.metadata;
        let address = metadata.spot_check_tile();
        let url = metadata.tile_template().expand(address);
        info!(%url, "spot-checking tile");
        match client.get(&url, None).await {
            Ok(resp) => {
                info!(
                    status = resp.status,
                    content_type = resp.content_type.as_deref().unwrap_or("-"),
                    bytes = resp.body.len(),
                    "tile spot-check response"
                );
                TileSpotCheck {
                    address,
                    url,
                    status: ProbeStatus::Http(resp.status),
                    content_type: resp.content_type,
                    bytes: resp.body.len(),
                }
            }
            Err(e) => {
                error!(error = %e, "tile spot-check failed");
                TileSpotCheck {
                    address,
                    url,
                    status: ProbeStatus::Error,
                    content_type: None,
                    bytes: 0,
                }
            }
        }
    }

    /// Tiles needed by every painted overlay for the current view.
    pub fn visible_tile_requests(&self) -> Vec<TileRequest> {
        let extent = self.viewport.visible_extent();
        let resolution = self.viewport.resolution();
        let mut requests = Vec::new();
        for layer in self.layers.overlays().filter(|l| l.style.is_painted()) {
            let grid = &layer.source.grid;
            let z = grid.level_for_resolution(resolution);
            let Some(range) = grid.tiles_covering(&extent, z) else {
                continue;
            };
            for address in range.iter() {
                if let Some(url) = layer.source.tile_url(address) {
                    requests.push(TileRequest {
                        layer: layer.handle(),
                        address,
                        url,
                    });
                }
            }
        }
        requests
    }

    /// Marks every not-yet-seen visible tile as loading and emits `Started`.
    ///
    /// Loaded or failed tiles that left the view are forgotten first, so the
    /// state map stays bounded by the visible set plus what is in flight.
    pub fn start_tile_loads(&mut self) -> Vec<TileRequest> {
        let frame = self.frame;
        let requests = self.visible_tile_requests();
        let visible: HashSet<_> = requests.iter().map(|r| (r.layer, r.address)).collect();
        let before = self.tile_states.len();
        self.tile_states
            .retain(|key, state| *state == TileState::Loading || visible.contains(key));
        let evicted = before - self.tile_states.len();
        if evicted > 0 {
            debug!(evicted, "forgot tiles outside the view");
        }

        let mut started = Vec::new();
        for request in requests {
            let key = (request.layer, request.address);
            if self.tile_states.contains_key(&key) {
                continue;
            }
            self.tile_states.insert(key, TileState::Loading);
            self.tile_events.emit(
                frame,
                TileEvent::Started {
                    layer: request.layer,
                    address: request.address,
                },
            );
            self.tile_stats.started += 1;
            debug!(layer = %request.layer, tile = %request.address, "tile load started");
            started.push(request);
        }
        started
    }

    /// Records the response for a started tile.
    ///
    /// Only a tile currently in `Loading` gets an event. A result for a removed
    /// layer, or for a tile that was never started or already finished, is
    /// dropped and counted as discarded.
    pub fn finish_tile_load(
        &mut self,
        request: &TileRequest,
        result: Result<HttpResponse, TransportError>,
    ) -> TileOutcome {
        let (layer, address) = (request.layer, request.address);
        if !self.layers.contains(layer) {
            self.tile_states.remove(&(layer, address));
            debug!(%layer, tile = %address, "discarding tile for removed layer");
            self.tile_stats.record(TileOutcome::Discarded);
            return TileOutcome::Discarded;
        }
        if self.tile_states.get(&(layer, address)) != Some(&TileState::Loading) {
            debug!(%layer, tile = %address, "discarding result for a tile not loading");
            self.tile_stats.record(TileOutcome::Discarded);
            return TileOutcome::Discarded;
        }

        let (outcome, event) = match result {
            Ok(resp) if resp.is_success() => (
                TileOutcome::Completed,
                TileEvent::Completed {
                    layer,
                    address,
                    bytes: resp.body.len(),
                },
            ),
            Ok(resp) => {
                warn!(%layer, tile = %address, status = resp.status, "tile load failed");
                (
                    TileOutcome::Failed,
                    TileEvent::Failed {
                        layer,
                        address,
                        reason: format!("HTTP {}", resp.status),
                    },
                )
            }
            Err(e) => {
                warn!(%layer, tile = %address, error = %e, "tile load failed");
                (
                    TileOutcome::Failed,
                    TileEvent::Failed {
                        layer,
                        address,
                        reason: e.to_string(),
                    },
                )
            }
        };
        let state = match outcome {
            TileOutcome::Completed => TileState::Loaded,
            _ => TileState::Failed,
        };
        self.tile_states.insert((layer, address), state);
        self.tile_events.emit(self.frame, event);
        self.tile_stats.record(outcome);
        outcome
    }

    /// Fetches every newly visible overlay tile concurrently on the current task.
    ///
    /// The session stays borrowed until the whole batch settles, so the view
    /// and layers cannot change meanwhile. Callers that need to tick or remove
    /// layers while tiles are in flight drive [`start_tile_loads`](Self::start_tile_loads)
    /// and [`finish_tile_load`](Self::finish_tile_load) themselves.
    pub async fn fetch_tiles(&mut self, client: &dyn HttpClient) -> TileStats {
        let requests = self.start_tile_loads();
        let mut batch = TileStats {
            started: requests.len(),
            ..TileStats::default()
        };
        let mut pending: FuturesUnordered<_> = requests
            .into_iter()
            .map(|request| async move {
                let result = client.get(&request.url, None).await;
                (request, result)
            })
            .collect();
        while let Some((request, result)) = pending.next().await {
            batch.record(self.finish_tile_load(&request, result));
        }
        if batch.started > 0 {
            info!(%batch, "tile batch finished");
        }
        batch
    }

    fn forget_removed_tiles(&mut self) {
        let layers = &self.layers;
        self.tile_states.retain(|key, _| layers.contains(key.0));
    }
}

#[cfg(test)]
mod tests {
    use super::{MapSession, SessionError};
    use crate::config::{Backdrop, SessionConfig};
    use crate::tiles::{TileEvent, TileOutcome, TileState};
    use foundation::bounds::ProjectedPoint;
    use layers::LayerRole;
    use pretty_assertions::assert_eq;
    use service::{
        HttpResponse, MetadataError, Notice, NoticeLevel, ProbeStatus, Scripted, ScriptedClient,
        TransportError,
    };
    use std::collections::HashMap;
    use viewport::ViewportSize;

    fn open(config: SessionConfig) -> MapSession<Vec<Notice>> {
        MapSession::open_with_notifier(config, Vec::new()).unwrap()
    }

    fn last_notice(session: &MapSession<Vec<Notice>>) -> &Notice {
        session.notifier().last().unwrap()
    }

    fn names(session: &MapSession<Vec<Notice>>) -> Vec<String> {
        session
            .layers()
            .layers()
            .iter()
            .map(|l| l.name().to_string())
            .collect()
    }

    #[test]
    fn opens_on_the_dataset_with_the_selected_base_map() {
        let session = open(SessionConfig::default());
        assert_eq!(names(&session), vec!["OpenStreetMap"]);
        assert_eq!(session.backdrop(), Backdrop::White);
        assert_eq!(session.overlay(), None);

        let bounds = session.metadata().web_mercator_extent;
        assert!(bounds.contains_point(session.view().center));
        assert!(session.view().zoom >= 12.0);
        assert!(
            bounds
                .expanded(1e-6, 1e-6, 1e-6, 1e-6)
                .contains_extent(&session.visible_extent())
        );
    }

    #[test]
    fn open_fails_on_unknown_basemap() {
        let result = MapSession::open_with_notifier(
            SessionConfig::default().with_basemap("bing"),
            Vec::<Notice>::new(),
        );
        assert!(matches!(result, Err(SessionError::Catalog(_))));
    }

    #[test]
    fn open_flags_disagreeing_extents() {
        let mut config = SessionConfig::default();
        config.metadata.web_mercator_extent.ymin -= 100.0;
        let result = MapSession::open_with_notifier(config.clone(), Vec::<Notice>::new());
        assert!(matches!(
            result,
            Err(SessionError::Metadata(MetadataError::ExtentMismatch { .. }))
        ));

        config.extent_tolerance_m = None;
        assert!(MapSession::open_with_notifier(config, Vec::<Notice>::new()).is_ok());
    }

    #[test]
    fn loading_the_overlay_is_exclusive_and_animates_the_fit() {
        let mut session = open(SessionConfig::default());
        let handle = session.load_overlay().unwrap();

        assert_eq!(names(&session), vec!["GF2_data_3857"]);
        assert_eq!(session.overlay(), Some(handle));
        assert_eq!(session.backdrop(), Backdrop::Black);
        assert!(session.viewport().is_animating());
        assert_eq!(last_notice(&session).level, NoticeLevel::Success);

        assert!(session.tick(500));
        assert!(!session.tick(500));
        let bounds = session.metadata().web_mercator_extent;
        assert!(
            bounds
                .expanded(1e-6, 1e-6, 1e-6, 1e-6)
                .contains_extent(&session.visible_extent())
        );
    }

    #[test]
    fn non_exclusive_overlay_keeps_the_base_map() {
        let mut config = SessionConfig::default().without_animation();
        config.exclusive_overlay = false;
        let mut session = open(config);
        let first = session.load_overlay().unwrap();
        let second = session.load_arcgis_overlay().unwrap();

        assert_eq!(names(&session), vec!["OpenStreetMap", "GF2_data_3857 (export)"]);
        assert!(!session.layers().contains(first));
        assert_eq!(session.overlay(), Some(second));
        assert!(!session.viewport().is_animating());
    }

    #[test]
    fn clear_overlay_twice_reports_nothing_left() {
        let mut session = open(SessionConfig::default());
        session.load_overlay().unwrap();

        assert!(session.clear_overlay());
        assert_eq!(last_notice(&session), &Notice::success("overlay cleared"));
        assert!(!session.clear_overlay());
        assert_eq!(last_notice(&session), &Notice::info("no overlay to clear"));
        assert!(session.layers().is_empty());
    }

    #[test]
    fn restore_base_map_goes_beneath_the_overlay_once() {
        let mut session = open(SessionConfig::default().with_basemap("gaode"));
        session.load_overlay().unwrap();
        assert!(session.layers().base().is_none());

        assert!(session.restore_base_map().unwrap().is_some());
        assert_eq!(names(&session), vec!["Gaode", "GF2_data_3857"]);
        assert_eq!(session.backdrop(), Backdrop::White);

        assert_eq!(session.restore_base_map().unwrap(), None);
        assert_eq!(last_notice(&session), &Notice::info("base map already present"));
        assert_eq!(session.layers().len(), 2);
    }

    #[test]
    fn switching_base_map_leaves_overlays_in_place() {
        let mut config = SessionConfig::default();
        config.exclusive_overlay = false;
        let mut session = open(config);
        let overlay = session.load_overlay().unwrap();
        session.switch_base_map("gaode").unwrap();

        assert_eq!(names(&session), vec!["Gaode", "GF2_data_3857"]);
        assert_eq!(session.basemap_key(), "gaode");
        assert_eq!(session.layers().layers()[1].handle(), overlay);
        assert_eq!(session.layers().layers()[0].role(), LayerRole::Base);

        assert!(matches!(
            session.switch_base_map("nope"),
            Err(SessionError::Catalog(_))
        ));
        assert_eq!(last_notice(&session).level, NoticeLevel::Error);
        assert_eq!(session.basemap_key(), "gaode");
    }

    #[test]
    fn reset_supersedes_a_running_fit() {
        let mut session = open(SessionConfig::default());
        session.pan_to(ProjectedPoint::new(12090000.0, 3830000.0));
        session.zoom_to(17.0);
        session.load_overlay().unwrap();
        session.tick(300);
        let mid = session.view();

        session.reset_view().unwrap();
        let anim = *session.viewport().animation().unwrap();
        assert_eq!(anim.from, mid);
        assert_eq!(anim.duration_ms, 800);
        assert_eq!(
            last_notice(&session),
            &Notice::info("view reset to the service extent")
        );

        session.tick(900);
        assert!(!session.viewport().is_animating());
        assert_eq!(session.view(), anim.to);
    }

    #[tokio::test]
    async fn connection_test_reports_partial_success() {
        let mut session = open(SessionConfig::default());
        let targets = session.metadata().probe_targets();
        let client = ScriptedClient::new()
            .ok(&targets[0])
            .fail(&targets[1], "tls handshake")
            .ok(&targets[2]);

        let results = session.test_connection(&client).await;
        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["MapServer", "MapServer?f=jsapi", "MapServer?f=json"]);
        assert_eq!(results[1].status, ProbeStatus::Error);
        assert_eq!(
            last_notice(&session),
            &Notice::success("service connection test: 2/3 succeeded")
        );
        assert_eq!(client.requested_urls(), targets);
    }

    #[tokio::test]
    async fn connection_test_with_no_successes_is_an_error_notice() {
        let mut session = open(SessionConfig::default());
        let client = ScriptedClient::new().with_fallback(Scripted::TransportFailure("offline".into()));
        let results = session.test_connection(&client).await;
        assert_eq!(results.len(), 3);
        assert_eq!(last_notice(&session), &Notice::error("service connection test failed"));
    }

    #[tokio::test]
    async fn spot_check_requests_row_before_column() {
        let session = open(SessionConfig::default());
        let client = ScriptedClient::new().with_fallback(Scripted::Status(200));
        let check = session.spot_check_tile(&client).await;
        assert!(check.url.ends_with("/MapServer/tile/12/1654/3285"));
        assert_eq!(check.status, ProbeStatus::Http(200));
    }

    #[tokio::test]
    async fn tile_fetches_report_start_before_outcome() {
        let mut session = open(SessionConfig::default().without_animation());
        let overlay = session.load_overlay().unwrap();
        let requests = session.visible_tile_requests();
        assert!(!requests.is_empty());
        assert!(requests.iter().all(|r| r.layer == overlay));
        assert!(requests.iter().all(|r| r.url.contains("/tile/")));

        let broken = requests[0].address;
        let client = ScriptedClient::new()
            .with_fallback(Scripted::Status(200))
            .fail(&requests[0].url, "reset by peer");
        let stats = session.fetch_tiles(&client).await;

        assert_eq!(stats.started, requests.len());
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, requests.len() - 1);
        assert_eq!(session.tile_state(overlay, broken), Some(TileState::Failed));

        let mut seen: HashMap<_, Vec<&'static str>> = HashMap::new();
        for event in session.drain_tile_events() {
            let kind = match event.payload {
                TileEvent::Started { .. } => "started",
                TileEvent::Completed { .. } => "completed",
                TileEvent::Failed { .. } => "failed",
            };
            seen.entry(event.payload.key()).or_default().push(kind);
        }
        assert_eq!(seen.len(), requests.len());
        for kinds in seen.values() {
            assert_eq!(kinds.len(), 2);
            assert_eq!(kinds[0], "started");
        }

        // Already-seen tiles, failed ones included, are not fetched again.
        let again = session.fetch_tiles(&client).await;
        assert_eq!(again.started, 0);
    }

    #[test]
    fn results_for_a_removed_overlay_are_discarded() {
        let mut session = open(SessionConfig::default().without_animation());
        let overlay = session.load_overlay().unwrap();
        let started = session.start_tile_loads();
        assert!(!started.is_empty());
        session.drain_tile_events();

        session.clear_overlay();
        let outcome = session.finish_tile_load(&started[0], Ok(HttpResponse::new(200, vec![1, 2])));
        assert_eq!(outcome, TileOutcome::Discarded);
        let outcome = session.finish_tile_load(
            started.last().unwrap(),
            Err(TransportError::new("u", "late")),
        );
        assert_eq!(outcome, TileOutcome::Discarded);

        assert!(session.drain_tile_events().is_empty());
        assert_eq!(session.tile_state(overlay, started[0].address), None);
        assert_eq!(session.tile_stats().discarded, 2);
    }

    #[test]
    fn outcomes_without_a_loading_tile_are_dropped() {
        let mut session = open(SessionConfig::default().without_animation());
        let overlay = session.load_overlay().unwrap();
        let request = session.visible_tile_requests().remove(0);

        // Never started.
        let outcome = session.finish_tile_load(&request, Ok(HttpResponse::new(200, vec![1])));
        assert_eq!(outcome, TileOutcome::Discarded);
        assert!(session.drain_tile_events().is_empty());
        assert_eq!(session.tile_state(overlay, request.address), None);

        // Started once, finished twice.
        let started = session.start_tile_loads();
        let first = started
            .iter()
            .find(|r| r.address == request.address)
            .unwrap()
            .clone();
        session.drain_tile_events();
        let ok = || Ok(HttpResponse::new(200, vec![1, 2, 3]));
        assert_eq!(session.finish_tile_load(&first, ok()), TileOutcome::Completed);
        assert_eq!(session.finish_tile_load(&first, ok()), TileOutcome::Discarded);
        assert_eq!(
            session.finish_tile_load(&first, Err(TransportError::new("u", "late"))),
            TileOutcome::Discarded
        );

        let events: Vec<TileEvent> = session
            .drain_tile_events()
            .into_iter()
            .map(|e| e.payload)
            .collect();
        assert_eq!(
            events,
            vec![TileEvent::Completed {
                layer: overlay,
                address: request.address,
                bytes: 3,
            }]
        );
        assert_eq!(session.tile_state(overlay, request.address), Some(TileState::Loaded));
        let stats = session.tile_stats();
        assert_eq!((stats.completed, stats.failed, stats.discarded), (1, 0, 3));
    }

    #[test]
    fn settled_tiles_outside_the_view_are_forgotten() {
        let mut config = SessionConfig::default().without_animation();
        config.constrain_view = false;
        let mut session = open(config);
        let overlay = session.load_overlay().unwrap();
        let started = session.start_tile_loads();
        assert!(started.len() >= 2);
        let (done, in_flight) = (&started[0], &started[1]);
        session.finish_tile_load(done, Ok(HttpResponse::new(200, vec![])));

        session.pan_to(ProjectedPoint::new(-12_000_000.0, -3_000_000.0));
        let moved = session.start_tile_loads();
        assert!(!moved.is_empty());
        assert!(moved.iter().all(|r| r.address != done.address));

        // The finished tile is gone; the one still in flight can complete.
        assert_eq!(session.tile_state(overlay, done.address), None);
        assert_eq!(session.tile_state(overlay, in_flight.address), Some(TileState::Loading));
        assert_eq!(
            session.finish_tile_load(in_flight, Ok(HttpResponse::new(200, vec![]))),
            TileOutcome::Completed
        );
    }

    #[test]
    fn hidden_overlays_request_nothing() {
        let mut session = open(SessionConfig::default().without_animation());
        let overlay = session.load_overlay().unwrap();
        assert!(session.set_layer_opacity(overlay, 0.0));
        assert!(session.visible_tile_requests().is_empty());
        session.set_layer_opacity(overlay, 1.0);
        session.set_layer_visible(overlay, false);
        assert!(session.visible_tile_requests().is_empty());
    }

    #[test]
    fn padding_wider_than_the_viewport_leaves_layers_untouched() {
        let config = SessionConfig::default().with_viewport(ViewportSize::new(80, 80));
        let mut session = open(config);
        let before = names(&session);
        assert!(matches!(
            session.load_overlay(),
            Err(SessionError::Viewport(_))
        ));
        assert_eq!(names(&session), before);
        assert_eq!(last_notice(&session).level, NoticeLevel::Error);
    }

    #[test]
    fn close_reports_totals() {
        let mut session = open(SessionConfig::default());
        session.tick(16);
        session.tick(16);
        let summary = session.close();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.layers, 1);
    }
}
