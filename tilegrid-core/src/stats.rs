//! Aggregate statistics over the region grid.

/// Snapshot of the grid-wide counters the UI synchronises against.
///
/// `download_size` is meaningful only once the engine reports that download
/// sizes are available; until then selected regions may carry a zero size
/// and the sum undercounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexStats {
    /// Regions with data present locally.
    pub loaded: u32,
    /// Regions with a pending download selection.
    pub download: u32,
    /// Regions with a pending removal selection.
    pub remove: u32,
    /// Regions with a download job in flight.
    pub downloading: u32,
    /// Total bytes the pending download selections would fetch.
    pub download_size: u64,
}
