//! Cascading catalog navigator.
//!
//! This module provides:
//! - The ordered facet levels (class, name, dataset, subgroups) and their
//!   option lists
//! - [`FacetNavigator`], the selection state machine that fetches the next
//!   level whenever a level is set and invalidates everything below it
//! - Opening a dataset directly by catalog id

mod autoload;
mod facets;
mod level;

pub use facets::FacetNavigator;
pub use level::{
    FacetLevel, FacetValue, LevelState, LevelStatus, CLASS_LEVEL, DATASET_LEVEL,
    FIRST_SUBGROUP_LEVEL, NAME_LEVEL,
};

use crate::catalog::CatalogError;
use crate::raster::{DescriptorError, RasterSourceDescriptor};
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by the navigator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigatorError {
    #[error("level {level} does not exist ({levels} level(s) available)")]
    LevelOutOfRange { level: usize, levels: usize },

    #[error("level {level} cannot be set before the level above it")]
    PrefixNotSet { level: usize },

    #[error("level {level} expects a {expected}, got a {found}")]
    KindMismatch {
        level: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("cannot build raster source: {0}")]
    Descriptor(#[from] DescriptorError),

    /// A dataset refers to a catalog entry that does not exist.
    #[error("unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },

    #[error("subgroup '{0}' has no values")]
    EmptySubgroup(String),

    /// The dataset detail and the subgroup list disagree.
    #[error("dataset lists {values} subgroup(s) with values but has {subgroups} subgroup(s)")]
    SubgroupMismatch { subgroups: usize, values: usize },
}

/// Notifications for whoever consumes the navigator's output.
#[derive(Debug, Clone)]
pub enum NavigatorEvent {
    /// Selections below `level` were cleared.
    Invalidated { level: usize },
    /// The path is fully resolved.
    Resolved(Rc<RasterSourceDescriptor>),
    /// A fetch or descriptor build failed.
    Failed(NavigatorError),
}
