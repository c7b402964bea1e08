//! Raster sources and the operator graph built on top of them.

mod descriptor;
mod operator;
mod unit;

pub use descriptor::{
    ChannelOption, DescriptorError, RasterChannel, RasterSourceDescriptor, SourceDescriptorBuilder,
    Symbology,
};
pub use operator::{
    ChannelConfig, Coords, DataType, GdalChannel, GdalParams, GdalSource, Operator, Provenance,
    ResultType,
};
pub use unit::{round_significant, Interpolation, Unit};
