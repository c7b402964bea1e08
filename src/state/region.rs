//! Regions used to clip statistics queries.
//!
//! Regions come from a static list of `[name, minx, maxx, miny, maxy,
//! channel]` tuples, where `channel` addresses the region's band in the
//! mask raster.

use super::subject::{Subject, SubscriptionId};
use geo_types::{coord, Rect};
use serde::Deserialize;

/// Reference into the mask raster that cuts out a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionMask {
    pub channel: u32,
}

/// A bounding extent with an optional raster mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub extent: Rect<f64>,
    pub mask: Option<RegionMask>,
}

impl Region {
    /// Creates a region from its bounds. Min/max are normalized.
    pub fn new(name: impl Into<String>, minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            name: name.into(),
            extent: Rect::new(coord! { x: minx, y: miny }, coord! { x: maxx, y: maxy }),
            mask: None,
        }
    }

    pub fn with_mask(mut self, channel: u32) -> Self {
        self.mask = Some(RegionMask { channel });
        self
    }

    pub fn width(&self) -> f64 {
        self.extent.width()
    }

    pub fn height(&self) -> f64 {
        self.extent.height()
    }

    /// `[minx, miny, maxx, maxy]`
    pub fn bbox(&self) -> [f64; 4] {
        let min = self.extent.min();
        let max = self.extent.max();
        [min.x, min.y, max.x, max.y]
    }
}

#[derive(Deserialize)]
struct RegionRow(String, f64, f64, f64, f64, u32);

impl From<RegionRow> for Region {
    fn from(row: RegionRow) -> Self {
        let RegionRow(name, minx, maxx, miny, maxy, channel) = row;
        Region::new(name, minx, miny, maxx, maxy).with_mask(channel)
    }
}

/// The selectable regions plus the current selection.
#[derive(Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    selected: Subject<Option<Region>>,
}

impl RegionCatalog {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            selected: Subject::new(None),
        }
    }

    /// Parses a JSON array of `[name, minx, maxx, miny, maxy, channel]` rows.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<RegionRow> = serde_json::from_str(json)?;
        let regions: Vec<Region> = rows.into_iter().map(Region::from).collect();
        log::info!("Loaded {} region(s)", regions.len());
        Ok(Self::new(regions))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn find(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Regions whose name contains `search` (case-insensitive).
    pub fn filter(&self, search: &str) -> Vec<&Region> {
        let search = search.trim().to_lowercase();
        if search.is_empty() {
            return self.regions.iter().collect();
        }
        self.regions
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&search))
            .collect()
    }

    pub fn selected(&self) -> Option<Region> {
        self.selected.get()
    }

    pub fn select(&self, region: Region) {
        log::debug!("Region selected: {}", region.name);
        self.selected.set(Some(region));
    }

    pub fn clear_selection(&self) {
        self.selected.set(None);
    }

    pub fn subscribe(&self, listener: impl Fn(&Option<Region>) + 'static) -> SubscriptionId {
        self.selected.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = r#"[
        ["Germany", 5.87, 15.04, 47.27, 55.06, 55],
        ["Ghana", -3.24, 1.19, 4.74, 11.17, 89]
    ]"#;

    #[test]
    fn test_rows_map_to_regions() {
        let catalog = RegionCatalog::from_json(ROWS).unwrap();
        let germany = catalog.find("Germany").unwrap();

        assert_eq!(germany.bbox(), [5.87, 47.27, 15.04, 55.06]);
        assert_eq!(germany.mask, Some(RegionMask { channel: 55 }));
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let catalog = RegionCatalog::from_json(ROWS).unwrap();
        let found = catalog.filter("GH");
        let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Ghana"]);
        assert_eq!(catalog.filter("").len(), 2);
    }

    #[test]
    fn test_bounds_are_normalized() {
        let region = Region::new("r", 10.0, 5.0, -10.0, -5.0);
        assert_eq!(region.width(), 20.0);
        assert_eq!(region.height(), 10.0);
        assert_eq!(region.bbox(), [-10.0, -5.0, 10.0, 5.0]);
    }

    #[test]
    fn test_selection_replays() {
        let catalog = RegionCatalog::from_json(ROWS).unwrap();
        let region = catalog.find("Ghana").cloned().unwrap();
        catalog.select(region);

        let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
        let sink = seen.clone();
        catalog.subscribe(move |r| *sink.borrow_mut() = r.as_ref().map(|r| r.name.clone()));
        assert_eq!(seen.borrow().as_deref(), Some("Ghana"));
    }
}
