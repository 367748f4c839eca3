//! Listener seam for UI state synchronisation.

use crate::region::{RegionAction, RegionCoordinate};
use crate::stats::IndexStats;

/// Observer of region index state changes.
///
/// Notification is a synchronous fan-out on whatever thread triggered the
/// event: handlers must be fast and must not panic, and must not call back
/// into the index. All methods default to no-ops so implementers subscribe
/// only to the events they care about.
pub trait MapStateListener {
    /// Download sizes became available; selections now carry real costs.
    fn on_sizes_available(&self) {}

    /// A counter in [`IndexStats`] changed outside of a selection.
    fn on_stats_changed(&self) {}

    /// Hillshade size accounting was switched on or off.
    fn on_hillshade_accounting_changed(&self, enabled: bool) {
        let _ = enabled;
    }

    /// A region's pending selection changed.
    fn on_region_selected(
        &self,
        coordinate: RegionCoordinate,
        action: RegionAction,
        stats: IndexStats,
    ) {
        let _ = (coordinate, action, stats);
    }
}
