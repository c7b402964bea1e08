//! Time-series statistics for a resolved raster source.
//!
//! This module provides:
//! - [`QueryPipelineBuilder`], which turns a raster source, a region and
//!   the available time steps into one statistics query per step
//! - The [`StatisticsService`] seam and its mapping service implementation
//! - [`PlotSeriesAssembler`], which folds the ordered results into points

mod assembler;
mod query;
mod service;

pub use assembler::{PlotDataPoint, PlotSeriesAssembler, PlotSettings};
pub use query::{
    OrderedQuerySequence, PlotQuery, QueryPipelineBuilder, ResultStream, QUERY_PROJECTION,
};
pub use service::{
    LayerStatistics, MappingStatisticsService, QueryError, RasterStatistics, StatisticsService,
};

use thiserror::Error;

/// Reasons a plot cannot be started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlotError {
    #[error("no EBV layer has been added")]
    NoRasterLayer,

    #[error("no region selected")]
    NoRegion,

    #[error("no time steps available")]
    NoTimeSteps,
}
