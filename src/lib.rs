#![warn(clippy::all)]

//! EBV Analyzer core.
//!
//! Drives a cascading catalog navigator over EBV raster datasets
//! (class → name → dataset → subgroups), builds the raster source for a
//! fully resolved selection and runs per-time-step statistics queries
//! whose results are folded into an ordered plot series.
//!
//! Rendering, transport and session handling stay with the host: the
//! crate talks to the network through [`catalog::Transport`] and hands
//! finished descriptors and series to whoever draws them.

pub mod catalog;
pub mod config;
pub mod navigator;
pub mod plot;
pub mod raster;
pub mod state;
pub mod url_state;
pub mod workbench;

pub use catalog::{CatalogClient, CatalogError, Transport, TransportError};
pub use config::AppConfig;
pub use navigator::{FacetLevel, FacetNavigator, FacetValue, NavigatorEvent};
pub use plot::{PlotDataPoint, PlotSeriesAssembler, QueryPipelineBuilder};
pub use raster::{RasterSourceDescriptor, SourceDescriptorBuilder};
pub use state::{Region, TimeStep, TimeStepRegistry};
pub use workbench::EbvWorkbench;
