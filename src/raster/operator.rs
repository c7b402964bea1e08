//! Processing graph sent to the mapping service.
//!
//! Operators form a tree: every node owns its raster inputs, so a query
//! is a single value that can be shared across time steps and serialized
//! with one dispatch over the node kind.

use super::unit::Unit;
use serde::Serialize;
use serde_json::{json, Value};

/// Pixel data type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    Byte,
    Float64,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::Float64 => "Float64",
        }
    }
}

/// What an operator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Raster,
    Plot,
}

/// Band selection of a GDAL source, with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelConfig {
    #[serde(rename = "channelNumber")]
    pub channel_number: u32,
    #[serde(rename = "displayValue")]
    pub display_value: String,
}

/// Citation details carried along with a source.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Provenance {
    pub citation: String,
    pub license: String,
    pub uri: String,
}

/// One band of a NetCDF-backed GDAL source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GdalChannel {
    pub channel: u32,
    pub datatype: DataType,
    pub unit: Unit,
    pub file_name: String,
    pub netcdf_subdataset: String,
}

/// Inline dataset description for sources not registered on the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GdalParams {
    pub channels: Vec<GdalChannel>,
    pub time_start: String,
    pub time_end: String,
    pub channel_start_time_list: Vec<String>,
    pub file_name: String,
    pub coords: Coords,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coords {
    pub crs: String,
}

/// Leaf operator reading a raster through GDAL.
#[derive(Debug, Clone, PartialEq)]
pub struct GdalSource {
    pub source_name: String,
    pub channel_config: ChannelConfig,
    pub transform: bool,
    pub gdal_params: Option<GdalParams>,
    pub crs: String,
    pub data_type: DataType,
    pub unit: Unit,
}

/// A node in the processing tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    GdalSource(GdalSource),
    /// Reprojects its input into `dest_crs`.
    Projection {
        dest_crs: String,
        source: Box<Operator>,
    },
    /// Per-pixel expression over raster inputs named `A`, `B`, ...
    Expression {
        expression: String,
        data_type: DataType,
        unit: Unit,
        sources: Vec<Operator>,
    },
    /// Aggregate statistics over its raster inputs.
    Statistics {
        raster_width: u32,
        raster_height: u32,
        sources: Vec<Operator>,
    },
}

impl Operator {
    pub fn result_type(&self) -> ResultType {
        match self {
            Operator::Statistics { .. } => ResultType::Plot,
            _ => ResultType::Raster,
        }
    }

    /// CRS of the operator output.
    pub fn projection(&self) -> &str {
        match self {
            Operator::GdalSource(source) => &source.crs,
            Operator::Projection { dest_crs, .. } => dest_crs,
            Operator::Expression { sources, .. } | Operator::Statistics { sources, .. } => {
                let first = sources.first();
                first.map(Operator::projection).unwrap_or_default()
            }
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Operator::GdalSource(source) => Some(source.data_type),
            Operator::Projection { source, .. } => source.data_type(),
            Operator::Expression { data_type, .. } => Some(*data_type),
            Operator::Statistics { .. } => None,
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Operator::GdalSource(source) => Some(&source.unit),
            Operator::Projection { source, .. } => source.unit(),
            Operator::Expression { unit, .. } => Some(unit),
            Operator::Statistics { .. } => None,
        }
    }

    /// Raster inputs of this node.
    pub fn sources(&self) -> &[Operator] {
        match self {
            Operator::GdalSource(_) => &[],
            Operator::Projection { source, .. } => std::slice::from_ref(source.as_ref()),
            Operator::Expression { sources, .. } | Operator::Statistics { sources, .. } => sources,
        }
    }

    /// Wraps the operator in a projection unless it already outputs `crs`.
    pub fn reprojected(self, crs: &str) -> Operator {
        if self.projection() == crs {
            self
        } else {
            Operator::Projection {
                dest_crs: crs.to_string(),
                source: Box::new(self),
            }
        }
    }

    /// JSON form understood by the mapping service.
    pub fn to_query(&self) -> Value {
        match self {
            Operator::GdalSource(source) => {
                let mut params = json!({
                    "sourcename": source.source_name,
                    "channel": source.channel_config.channel_number,
                    "transform": source.transform,
                });
                if let Some(gdal_params) = &source.gdal_params {
                    params["gdal_params"] = json!(gdal_params);
                }
                json!({ "type": "gdal_source", "params": params })
            }
            Operator::Projection { dest_crs, source } => json!({
                "type": "projection",
                "params": {
                    "src_projection": source.projection(),
                    "dest_projection": dest_crs,
                },
                "sources": { "raster": [source.to_query()] },
            }),
            Operator::Expression {
                expression,
                data_type,
                unit,
                sources,
            } => json!({
                "type": "expression",
                "params": {
                    "expression": expression,
                    "datatype": data_type.as_str(),
                    "unit": unit,
                },
                "sources": { "raster": sources.iter().map(Operator::to_query).collect::<Vec<_>>() },
            }),
            Operator::Statistics {
                raster_width,
                raster_height,
                sources,
            } => json!({
                "type": "statistics",
                "params": {
                    "raster_width": raster_width,
                    "raster_height": raster_height,
                },
                "sources": { "raster": sources.iter().map(Operator::to_query).collect::<Vec<_>>() },
            }),
        }
    }
}
