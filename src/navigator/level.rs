//! Facet levels of the catalog hierarchy.

use super::NavigatorError;
use crate::catalog::{EbvClass, EbvDataset, EbvSubgroupValue};

/// Index of the class level.
pub const CLASS_LEVEL: usize = 0;
/// Index of the EBV name level.
pub const NAME_LEVEL: usize = 1;
/// Index of the dataset level.
pub const DATASET_LEVEL: usize = 2;
/// Index of the first subgroup level.
pub const FIRST_SUBGROUP_LEVEL: usize = 3;

/// Position in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetLevel {
    Class,
    Name,
    Dataset,
    /// 0-based index into the dataset's subgroups.
    Subgroup(usize),
}

impl FacetLevel {
    pub fn from_index(index: usize) -> Self {
        match index {
            CLASS_LEVEL => FacetLevel::Class,
            NAME_LEVEL => FacetLevel::Name,
            DATASET_LEVEL => FacetLevel::Dataset,
            n => FacetLevel::Subgroup(n - FIRST_SUBGROUP_LEVEL),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            FacetLevel::Class => CLASS_LEVEL,
            FacetLevel::Name => NAME_LEVEL,
            FacetLevel::Dataset => DATASET_LEVEL,
            FacetLevel::Subgroup(n) => FIRST_SUBGROUP_LEVEL + n,
        }
    }

    /// Kind of value this level holds.
    pub fn kind(&self) -> &'static str {
        match self {
            FacetLevel::Class => "class",
            FacetLevel::Name => "name",
            FacetLevel::Dataset => "dataset",
            FacetLevel::Subgroup(_) => "subgroup value",
        }
    }

    pub fn accepts(&self, value: &FacetValue) -> bool {
        self.kind() == value.kind()
    }
}

/// A selectable value at some level.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetValue {
    Class(EbvClass),
    Name(String),
    Dataset(EbvDataset),
    Subgroup(EbvSubgroupValue),
}

impl FacetValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FacetValue::Class(_) => "class",
            FacetValue::Name(_) => "name",
            FacetValue::Dataset(_) => "dataset",
            FacetValue::Subgroup(_) => "subgroup value",
        }
    }

    /// Text shown in option lists and matched by filters.
    pub fn label(&self) -> &str {
        match self {
            FacetValue::Class(class) => &class.name,
            FacetValue::Name(name) => name,
            FacetValue::Dataset(dataset) => &dataset.name,
            FacetValue::Subgroup(value) => value.display_label(),
        }
    }

    /// Returns true if the label contains `filter`, ignoring case.
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim().to_lowercase();
        filter.is_empty() || self.label().to_lowercase().contains(&filter)
    }
}

/// Load state of a level's option list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LevelStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// The fetch failed. Not retried; selecting the parent again refetches.
    Failed(NavigatorError),
}

impl LevelStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LevelStatus::Loading)
    }

    pub fn error(&self) -> Option<&NavigatorError> {
        match self {
            LevelStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Options, filter and selection of one level.
#[derive(Debug, Clone)]
pub struct LevelState {
    pub name: String,
    pub options: Option<Vec<FacetValue>>,
    pub filter: String,
    pub selected: Option<FacetValue>,
    pub status: LevelStatus,
    /// Generation the level was last reset in; fetches for this level
    /// carry it so late answers can be recognized.
    pub(crate) epoch: u64,
}

impl LevelState {
    pub fn new(name: impl Into<String>, epoch: u64) -> Self {
        Self {
            name: name.into(),
            options: None,
            filter: String::new(),
            selected: None,
            status: LevelStatus::Idle,
            epoch,
        }
    }

    /// Clears everything but the name.
    pub(crate) fn reset(&mut self, epoch: u64) {
        self.options = None;
        self.filter.clear();
        self.selected = None;
        self.status = LevelStatus::Idle;
        self.epoch = epoch;
    }

    pub(crate) fn set_options(&mut self, options: Vec<FacetValue>) {
        self.options = Some(options);
        self.status = LevelStatus::Loaded;
    }

    pub fn option_count(&self) -> usize {
        self.options.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Options matching the current filter.
    pub fn visible_options(&self) -> Vec<&FacetValue> {
        self.options
            .iter()
            .flatten()
            .filter(|option| option.matches(&self.filter))
            .collect()
    }
}
