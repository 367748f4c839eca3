//! Region grid geometry and per-region state.
//!
//! The world is a fixed [`GRID_EXTENT`]×[`GRID_EXTENT`] grid of regions.
//! Each region carries a [`RegionStatus`] record describing what is present
//! locally, what is available for download, and the user's pending
//! selection. The global basemap is addressed through the
//! [`RegionKey::Basemap`] sentinel and never occupies a grid cell.

use std::fmt;

use thiserror::Error;

use crate::jobs::JobId;

/// Number of regions along each axis of the world grid.
pub const GRID_EXTENT: u8 = 128;

/// Lowest zoom level at which a region owns tile rows.
pub const MIN_TILE_ZOOM: u8 = 8;

/// Highest zoom level at which a region owns tile rows.
pub const MAX_TILE_ZOOM: u8 = 14;

/// Highest zoom level at which a region owns hillshade tile rows.
pub const MAX_HILLSHADE_TILE_ZOOM: u8 = 12;

/// Identifies one cell of the world grid.
///
/// Both components are validated to lie in `[0, GRID_EXTENT)`. The basemap
/// sentinel is deliberately not representable here; use [`RegionKey`] where
/// the basemap row must be addressed alongside grid cells.
///
/// # Examples
/// ```
/// use tilegrid_core::RegionCoordinate;
///
/// let coordinate = RegionCoordinate::new(3, 5)?;
/// assert_eq!(coordinate.x(), 3);
/// assert_eq!(coordinate.y(), 5);
/// assert_eq!(coordinate.to_string(), "3-5");
/// # Ok::<(), tilegrid_core::RegionCoordinateError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionCoordinate {
    x: u8,
    y: u8,
}

/// Errors returned by [`RegionCoordinate::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionCoordinateError {
    /// One of the components fell outside the grid.
    #[error("region coordinate ({x}, {y}) lies outside the {extent}x{extent} grid", extent = GRID_EXTENT)]
    OutOfRange {
        /// Column supplied by the caller.
        x: u8,
        /// Row supplied by the caller.
        y: u8,
    },
}

impl RegionCoordinate {
    /// Validates and constructs a [`RegionCoordinate`].
    pub fn new(x: u8, y: u8) -> Result<Self, RegionCoordinateError> {
        if x >= GRID_EXTENT || y >= GRID_EXTENT {
            return Err(RegionCoordinateError::OutOfRange { x, y });
        }
        Ok(Self { x, y })
    }

    /// Construct a coordinate from untrusted wide integers, as read from a
    /// persisted row. Returns `None` when either component does not fit the
    /// grid (including the basemap sentinel).
    pub fn from_raw(x: i64, y: i64) -> Option<Self> {
        let x = u8::try_from(x).ok()?;
        let y = u8::try_from(y).ok()?;
        Self::new(x, y).ok()
    }

    /// Column of the region, in `[0, GRID_EXTENT)`.
    pub fn x(self) -> u8 {
        self.x
    }

    /// Row of the region, in `[0, GRID_EXTENT)`.
    pub fn y(self) -> u8 {
        self.y
    }

    /// Dense row-major index of this cell, in `[0, GRID_EXTENT²)`.
    pub fn index(self) -> usize {
        (usize::from(self.x) << 7) + usize::from(self.y)
    }

    /// Iterate over every coordinate of the grid in row-major order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..GRID_EXTENT).flat_map(|x| (0..GRID_EXTENT).map(move |y| Self { x, y }))
    }

    /// The rectangle of tile columns and rows this region covers at `zoom`.
    ///
    /// At zoom `z` the region spans `2^(z-7)` tiles along each axis, so the
    /// covered columns are `[x << s, ((x + 1) << s) - 1]` with `s = z - 7`,
    /// and likewise for rows. Returns `None` outside
    /// [`MIN_TILE_ZOOM`]`..=`[`MAX_TILE_ZOOM`].
    ///
    /// # Examples
    /// ```
    /// use tilegrid_core::RegionCoordinate;
    ///
    /// let rect = RegionCoordinate::new(3, 5)?.tile_rect(8).expect("zoom 8 is valid");
    /// assert_eq!((rect.min_column, rect.max_column), (6, 7));
    /// assert_eq!((rect.min_row, rect.max_row), (10, 11));
    /// # Ok::<(), tilegrid_core::RegionCoordinateError>(())
    /// ```
    pub fn tile_rect(self, zoom: u8) -> Option<TileRect> {
        if !(MIN_TILE_ZOOM..=MAX_TILE_ZOOM).contains(&zoom) {
            return None;
        }
        let shift = zoom - 7;
        let min_column = u32::from(self.x) << shift;
        let min_row = u32::from(self.y) << shift;
        Some(TileRect {
            zoom,
            min_column,
            max_column: ((u32::from(self.x) + 1) << shift) - 1,
            min_row,
            max_row: ((u32::from(self.y) + 1) << shift) - 1,
        })
    }
}

impl fmt::Display for RegionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

/// Addresses a persisted bookkeeping row: either a grid cell or the
/// world-wide basemap sentinel stored as `(-1, -1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKey {
    /// The low-detail basemap covering the whole world.
    Basemap,
    /// One cell of the world grid.
    Region(RegionCoordinate),
}

impl RegionKey {
    /// Column as persisted, `-1` for the basemap.
    pub fn column(self) -> i64 {
        match self {
            Self::Basemap => -1,
            Self::Region(coordinate) => i64::from(coordinate.x()),
        }
    }

    /// Row as persisted, `-1` for the basemap.
    pub fn row(self) -> i64 {
        match self {
            Self::Basemap => -1,
            Self::Region(coordinate) => i64::from(coordinate.y()),
        }
    }
}

impl From<RegionCoordinate> for RegionKey {
    fn from(coordinate: RegionCoordinate) -> Self {
        Self::Region(coordinate)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basemap => f.write_str("basemap"),
            Self::Region(coordinate) => coordinate.fmt(f),
        }
    }
}

/// A rectangle of tile addresses at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// Zoom level the rectangle applies to.
    pub zoom: u8,
    /// First covered tile column.
    pub min_column: u32,
    /// Last covered tile column.
    pub max_column: u32,
    /// First covered tile row.
    pub min_row: u32,
    /// Last covered tile row.
    pub max_row: u32,
}

impl TileRect {
    /// Whether the tile at `(column, row)` falls inside the rectangle.
    pub fn contains(&self, column: u32, row: u32) -> bool {
        (self.min_column..=self.max_column).contains(&column)
            && (self.min_row..=self.max_row).contains(&row)
    }
}

/// A user's pending, uncommitted choice for a region.
///
/// Selections are applied in bulk by the engine's commit step; cancelling an
/// in-flight download is a transient command, not a stored action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionAction {
    /// Nothing pending.
    #[default]
    None,
    /// Queue the region for download on the next commit.
    Download,
    /// Queue the region for removal on the next commit.
    Remove,
}

impl fmt::Display for RegionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Download => f.write_str("download"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// Live state of one region of the world grid.
///
/// A cell with `created == 0` holds no local data; removed regions revert to
/// that state and stay addressable. The `download_*` fields describe what the
/// remote index offers and may be zero until a manifest lookup populates
/// them; the engine-wide size-availability flags say when the sizes can be
/// trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionStatus {
    /// Version stamp of the data present locally; 0 means none.
    pub created: u16,
    /// Version stamp of the package available for download.
    pub download_created: u16,
    /// Size in bytes of the package available for download.
    pub download_size: u64,
    /// Download job currently in flight for the main package, if any.
    pub downloading: Option<JobId>,
    /// Version stamp of the hillshade data present locally; 0 means none.
    pub hillshade_version: u16,
    /// Version stamp of the hillshade package available for download.
    pub hillshade_download_version: u16,
    /// Size in bytes of the hillshade package available for download.
    pub hillshade_download_size: u64,
    /// Download job currently in flight for the hillshade package, if any.
    pub hillshade_downloading: Option<JobId>,
    /// Pending, not-yet-committed user selection.
    pub action: RegionAction,
}

impl RegionStatus {
    /// Whether the region holds downloaded data.
    pub fn is_loaded(&self) -> bool {
        self.created > 0
    }

    /// Whether either package of the region is being downloaded.
    pub fn is_downloading(&self) -> bool {
        self.downloading.is_some() || self.hillshade_downloading.is_some()
    }

    /// Whether the remote index offers newer main data than is present.
    pub fn is_outdated(&self) -> bool {
        self.created == 0 || self.created < self.download_created
    }

    /// Whether the remote index offers newer hillshade data than is present.
    pub fn is_hillshade_outdated(&self) -> bool {
        self.hillshade_download_version > self.hillshade_version
    }
}
