//! Application state shared between the navigator, the map and the plot.
//!
//! State is held in replaying subjects so the host can subscribe to the
//! pieces it renders and receive the latest value right away.

mod layer;
mod region;
pub mod subject;
pub mod time_steps;

pub use layer::{LayerState, MapLayer};
pub use region::{Region, RegionCatalog, RegionMask};
pub use subject::{Subject, SubscriptionId};
pub use time_steps::{DeltaUnit, TimeStep, TimeStepRegistry};
