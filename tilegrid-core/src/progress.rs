//! Progress reporting seam for long-running store operations.

/// Receives partial-completion callbacks from imports and removals.
///
/// Imports report `started` with the total row count, one `progress` call
/// per copied row with a strictly increasing count, and `finished` exactly
/// once regardless of success. Removals report coarse percentage
/// milestones instead of per-row counts.
pub trait ProgressSink {
    /// The operation begins; `total` is the unit count `progress` counts
    /// towards.
    fn started(&self, total: u64);

    /// `completed` units are done.
    fn progress(&self, completed: u64);

    /// The operation ended, successfully or not.
    fn finished(&self);
}
