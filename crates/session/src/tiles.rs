use layers::LayerHandle;
use tiling::TileAddress;

/// One tile to fetch for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub layer: LayerHandle,
    pub address: TileAddress,
    pub url: String,
}

/// Per-tile load reporting, stamped with the frame it happened in.
///
/// For any one `(layer, address)`, `Started` always precedes its `Completed`
/// or `Failed`. Nothing is promised about ordering between tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileEvent {
    Started {
        layer: LayerHandle,
        address: TileAddress,
    },
    Completed {
        layer: LayerHandle,
        address: TileAddress,
        bytes: usize,
    },
    Failed {
        layer: LayerHandle,
        address: TileAddress,
        reason: String,
    },
}

impl TileEvent {
    pub fn key(&self) -> (LayerHandle, TileAddress) {
        match *self {
            TileEvent::Started { layer, address }
            | TileEvent::Completed { layer, address, .. }
            | TileEvent::Failed { layer, address, .. } => (layer, address),
        }
    }
}

/// What the renderer should draw for a tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileState {
    Loading,
    Loaded,
    /// Drawn empty. No lower-resolution stand-in is used.
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    Completed,
    Failed,
    /// The layer was removed while the request was in flight.
    Discarded,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TileStats {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub discarded: usize,
}

impl TileStats {
    pub fn record(&mut self, outcome: TileOutcome) {
        match outcome {
            TileOutcome::Completed => self.completed += 1,
            TileOutcome::Failed => self.failed += 1,
            TileOutcome::Discarded => self.discarded += 1,
        }
    }

    pub fn merge(&mut self, other: TileStats) {
        self.started += other.started;
        self.completed += other.completed;
        self.failed += other.failed;
        self.discarded += other.discarded;
    }
}

impl std::fmt::Display for TileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} started, {} completed, {} failed, {} discarded",
            self.started, self.completed, self.failed, self.discarded
        )
    }
}
