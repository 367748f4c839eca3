//! Deterministic URL construction for package and index downloads.
//!
//! Package URLs are derived from the base endpoint, the package kind, and
//! the region coordinate; nothing about them is negotiated at runtime, so
//! a download can be re-requested from bookkeeping alone.

use std::fmt;
use std::ops::Deref;

use tilegrid_core::RegionCoordinate;
use url::Url;

/// Endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://tiles.tilegrid.org";

/// Base URL of the tile package endpoint.
///
/// Construction trims trailing slashes and falls back to
/// [`DEFAULT_BASE_URL`] when the supplied value is empty.
///
/// # Examples
/// ```
/// use tilegrid_data::BaseUrl;
///
/// let url = BaseUrl::new("https://tiles.example.org/");
/// assert_eq!(url.as_ref(), "https://tiles.example.org");
/// assert_eq!(BaseUrl::new("").as_ref(), tilegrid_data::DEFAULT_BASE_URL);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Construct a sanitised [`BaseUrl`] from an owned or borrowed string.
    pub fn new(value: impl Into<String>) -> Self {
        let raw = value.into();
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            Self(DEFAULT_BASE_URL.to_owned())
        } else {
            Self(trimmed.to_owned())
        }
    }

    /// Consume the wrapper and return the inner [`String`].
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl From<&str> for BaseUrl {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for BaseUrl {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// URL of a region's main tile package.
pub(crate) fn map_package_url(
    base: &BaseUrl,
    coordinate: RegionCoordinate,
) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{base}/maps/{column}/{coordinate}.tiles",
        column = coordinate.x()
    ))
}

/// URL of a region's hillshade package.
pub(crate) fn hillshade_package_url(
    base: &BaseUrl,
    coordinate: RegionCoordinate,
) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{base}/hillshades/{column}/{coordinate}.hillshade",
        column = coordinate.x()
    ))
}

/// URL of the world basemap package.
pub(crate) fn basemap_url(base: &BaseUrl) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{base}/maps/basemap.tiles"))
}

/// URL of the published region index manifest.
pub fn region_index_url(base: &BaseUrl) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{base}/maps/index.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn coordinate(x: u8, y: u8) -> RegionCoordinate {
        RegionCoordinate::new(x, y).expect("test coordinate should be valid")
    }

    #[rstest]
    fn package_urls_encode_kind_and_coordinate() {
        let base = BaseUrl::new("https://tiles.example.org");
        assert_eq!(
            map_package_url(&base, coordinate(3, 5))
                .expect("valid url")
                .as_str(),
            "https://tiles.example.org/maps/3/3-5.tiles"
        );
        assert_eq!(
            hillshade_package_url(&base, coordinate(3, 5))
                .expect("valid url")
                .as_str(),
            "https://tiles.example.org/hillshades/3/3-5.hillshade"
        );
        assert_eq!(
            basemap_url(&base).expect("valid url").as_str(),
            "https://tiles.example.org/maps/basemap.tiles"
        );
        assert_eq!(
            region_index_url(&base).expect("valid url").as_str(),
            "https://tiles.example.org/maps/index.json"
        );
    }

    #[rstest]
    #[case("https://tiles.example.org///", "https://tiles.example.org")]
    #[case("", DEFAULT_BASE_URL)]
    #[case("/", DEFAULT_BASE_URL)]
    fn base_url_is_sanitised(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(BaseUrl::new(raw).as_ref(), expected);
    }
}
