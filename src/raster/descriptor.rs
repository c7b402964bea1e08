//! Raster source descriptor for a fully resolved selection.
//!
//! The builder turns the selected dataset, its subgroup path and the data
//! loading info into an immutable [`RasterSourceDescriptor`]: one channel
//! per time point, time bounds, CRS and physical unit. Updating a
//! descriptor means building a new one.

use super::operator::{
    ChannelConfig, Coords, DataType, GdalChannel, GdalParams, GdalSource, Operator, Provenance,
};
use super::unit::Unit;
use crate::catalog::{DataLoadingInfo, EbvDataset, EbvSubgroup, EbvSubgroupValue};
use crate::config::AppConfig;
use crate::state::time_steps::{format_iso, time_from_unix, DeltaUnit, TimeStep};
use chrono::Duration;
use thiserror::Error;

/// Pixel type of EBV NetCDF layers.
const EBV_DATA_TYPE: DataType = DataType::Float64;

/// Subgroup whose selected value names the measurement.
const METRIC_SUBGROUP: &str = "metric";

/// Number of colour steps suggested for the layer.
const COLORMAP_BREAKPOINTS: u32 = 16;

/// Errors raised while building a descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("data loading info has no time points")]
    NoTimePoints,

    #[error("time points are not strictly increasing")]
    UnorderedTimePoints,

    #[error("time point {0} is out of range")]
    InvalidTimePoint(i64),

    #[error("path selects {values} value(s) for {subgroups} subgroup(s)")]
    IncompletePath { subgroups: usize, values: usize },
}

/// One band of the descriptor, tied to a time point.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterChannel {
    /// 1-based band index in the NetCDF subdataset.
    pub channel: u32,
    pub data_type: DataType,
    /// ISO-8601 UTC start time of the band.
    pub time_label: String,
}

/// Entry of the channel picker shown next to the layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOption {
    /// 0-based position in the channel list.
    pub channel_number: usize,
    pub display_value: String,
}

/// Colouring hint handed to the map renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbology {
    pub colormap: String,
    pub min: f64,
    pub max: f64,
    pub breakpoints: u32,
}

/// Immutable description of an EBV raster source.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSourceDescriptor {
    /// Layer title (the EBV name).
    pub layer_name: String,
    /// Dataset name, also used as citation.
    pub source_name: String,
    pub file_path: String,
    /// `/`-prefixed path of the selected subgroup values.
    pub subdataset: String,
    pub channels: Vec<RasterChannel>,
    pub time_start: String,
    pub time_end: String,
    pub crs: String,
    pub unit: Unit,
    pub provenance: Provenance,
    pub channel_options: Vec<ChannelOption>,
    pub delta_unit: DeltaUnit,
    pub time_steps: Vec<TimeStep>,
    pub symbology: Symbology,
}

impl RasterSourceDescriptor {
    /// Channel shown before the user picks one.
    pub fn initial_channel(&self) -> ChannelConfig {
        ChannelConfig {
            channel_number: 0,
            display_value: self
                .channels
                .first()
                .map(|c| c.time_label.clone())
                .unwrap_or_else(|| "no time available".to_string()),
        }
    }

    /// GDAL source operator reading this dataset.
    pub fn operator(&self) -> Operator {
        Operator::GdalSource(GdalSource {
            source_name: self.source_name.clone(),
            channel_config: self.initial_channel(),
            transform: false,
            gdal_params: Some(GdalParams {
                channels: self
                    .channels
                    .iter()
                    .map(|c| GdalChannel {
                        channel: c.channel,
                        datatype: c.data_type,
                        unit: self.unit.clone(),
                        file_name: self.file_path.clone(),
                        netcdf_subdataset: self.subdataset.clone(),
                    })
                    .collect(),
                time_start: self.time_start.clone(),
                time_end: self.time_end.clone(),
                channel_start_time_list: self
                    .channels
                    .iter()
                    .map(|c| c.time_label.clone())
                    .collect(),
                file_name: self.file_path.clone(),
                coords: Coords {
                    crs: self.crs.clone(),
                },
                provenance: self.provenance.clone(),
            }),
            crs: self.crs.clone(),
            data_type: EBV_DATA_TYPE,
            unit: self.unit.clone(),
        })
    }
}

/// Builds descriptors with the configured defaults.
#[derive(Debug, Clone)]
pub struct SourceDescriptorBuilder {
    default_crs: String,
    colormap: String,
}

impl Default for SourceDescriptorBuilder {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SourceDescriptorBuilder {
    pub fn new(default_crs: impl Into<String>, colormap: impl Into<String>) -> Self {
        Self {
            default_crs: default_crs.into(),
            colormap: colormap.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.default_crs.clone(), config.colormap.clone())
    }

    /// Builds the descriptor of a fully resolved path.
    ///
    /// `values[i]` is the value selected for `subgroups[i]`.
    pub fn build(
        &self,
        dataset: &EbvDataset,
        layer_name: &str,
        subgroups: &[EbvSubgroup],
        values: &[EbvSubgroupValue],
        info: &DataLoadingInfo,
    ) -> Result<RasterSourceDescriptor, DescriptorError> {
        if info.time_points.is_empty() {
            return Err(DescriptorError::NoTimePoints);
        }
        if !info.has_ordered_time_points() {
            return Err(DescriptorError::UnorderedTimePoints);
        }
        if subgroups.len() != values.len() {
            return Err(DescriptorError::IncompletePath {
                subgroups: subgroups.len(),
                values: values.len(),
            });
        }

        let times = info
            .time_points
            .iter()
            .map(|&secs| time_from_unix(secs).ok_or(DescriptorError::InvalidTimePoint(secs)))
            .collect::<Result<Vec<_>, _>>()?;
        let labels: Vec<String> = times.iter().map(format_iso).collect();

        // Fixed one-day pad after the last channel, whatever the delta unit.
        let last = info.time_points[info.time_points.len() - 1];
        let end = times
            .last()
            .and_then(|t| t.checked_add_signed(Duration::days(1)))
            .ok_or(DescriptorError::InvalidTimePoint(last))?;

        let crs = info
            .crs()
            .map(str::to_string)
            .unwrap_or_else(|| self.default_crs.clone());

        let measurement = subgroups
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(METRIC_SUBGROUP))
            .map(|idx| values[idx].name.clone())
            .unwrap_or_else(|| Unit::DEFAULT_MEASUREMENT.to_string());
        let unit = Unit::continuous(measurement, info.unit_range[0], info.unit_range[1]);

        let subdataset = format!(
            "/{}",
            values
                .iter()
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join("/")
        );

        let channels = labels
            .iter()
            .enumerate()
            .map(|(i, label)| RasterChannel {
                channel: i as u32 + 1,
                data_type: EBV_DATA_TYPE,
                time_label: label.clone(),
            })
            .collect();

        let channel_options = labels
            .iter()
            .enumerate()
            .map(|(i, label)| ChannelOption {
                channel_number: i,
                display_value: label.clone(),
            })
            .collect();

        let delta_unit = DeltaUnit::parse(&info.delta_unit);
        let time_steps = times
            .iter()
            .map(|&t| TimeStep::new(t, delta_unit))
            .collect();

        log::info!(
            "Built raster source for {}{} ({} channel(s), {})",
            dataset.dataset_path,
            subdataset,
            labels.len(),
            crs
        );

        Ok(RasterSourceDescriptor {
            layer_name: layer_name.to_string(),
            source_name: dataset.name.clone(),
            file_path: dataset.dataset_path.clone(),
            subdataset,
            channels,
            time_start: labels[0].clone(),
            time_end: format_iso(&end),
            crs,
            symbology: Symbology {
                colormap: self.colormap.clone(),
                min: unit.min,
                max: unit.max,
                breakpoints: COLORMAP_BREAKPOINTS,
            },
            unit,
            provenance: Provenance {
                citation: dataset.name.clone(),
                license: dataset.license.clone(),
                uri: String::new(),
            },
            channel_options,
            delta_unit,
            time_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> EbvDataset {
        EbvDataset {
            id: "1".to_string(),
            name: "Dataset-A".to_string(),
            author: String::new(),
            description: String::new(),
            license: "CC-BY".to_string(),
            dataset_path: "/d/A".to_string(),
        }
    }

    fn subgroup(name: &str) -> EbvSubgroup {
        EbvSubgroup {
            name: name.to_string(),
            description: String::new(),
        }
    }

    fn value(name: &str) -> EbvSubgroupValue {
        EbvSubgroupValue {
            name: name.to_string(),
            label: name.to_uppercase(),
            description: String::new(),
        }
    }

    fn info(points: Vec<i64>) -> DataLoadingInfo {
        DataLoadingInfo {
            time_points: points,
            delta_unit: "year".to_string(),
            crs_code: None,
            unit_range: [0.01234, 345.6],
        }
    }

    #[test]
    fn test_metric_path_descriptor() {
        let builder = SourceDescriptorBuilder::default();
        let descriptor = builder
            .build(
                &dataset(),
                "Temperature",
                &[subgroup("Metric"), subgroup("Year")],
                &[value("mean"), value("2020")],
                &info(vec![1577836800, 1609459200]),
            )
            .unwrap();

        assert_eq!(descriptor.channels.len(), 2);
        assert_eq!(descriptor.channels[0].channel, 1);
        assert_eq!(descriptor.channels[1].channel, 2);
        assert_eq!(descriptor.subdataset, "/mean/2020");
        assert_eq!(descriptor.time_start, "2020-01-01T00:00:00Z");
        assert_eq!(descriptor.time_end, "2021-01-02T00:00:00Z");
        assert_eq!(descriptor.unit.measurement, "mean");
        assert_eq!(descriptor.unit.min, 0.012);
        assert_eq!(descriptor.unit.max, 350.0);
        assert_eq!(descriptor.crs, "EPSG:4326");
        assert_eq!(descriptor.channel_options[1].channel_number, 1);
        assert_eq!(
            descriptor.channel_options[1].display_value,
            "2021-01-01T00:00:00Z"
        );
        assert_eq!(descriptor.time_steps[1].display_label, "2021");
        assert_eq!(descriptor.provenance.license, "CC-BY");
    }

    #[test]
    fn test_defaults_without_metric_or_crs() {
        let descriptor = SourceDescriptorBuilder::default()
            .build(
                &dataset(),
                "Temperature",
                &[subgroup("entity")],
                &[value("all")],
                &info(vec![0]),
            )
            .unwrap();

        assert_eq!(descriptor.unit.measurement, "raw");
        assert_eq!(descriptor.crs, "EPSG:4326");
    }

    #[test]
    fn test_declared_crs_wins() {
        let mut info = info(vec![0]);
        info.crs_code = Some("EPSG:3035".to_string());
        let descriptor = SourceDescriptorBuilder::new("EPSG:4326", "COOLWARM")
            .build(&dataset(), "x", &[], &[], &info)
            .unwrap();
        assert_eq!(descriptor.crs, "EPSG:3035");
        assert_eq!(descriptor.subdataset, "/");
    }

    #[test]
    fn test_single_time_point_gets_one_day_bound() {
        let descriptor = SourceDescriptorBuilder::default()
            .build(&dataset(), "x", &[], &[], &info(vec![1609459200]))
            .unwrap();

        assert_eq!(descriptor.channels.len(), 1);
        assert_eq!(descriptor.time_start, "2021-01-01T00:00:00Z");
        assert_eq!(descriptor.time_end, "2021-01-02T00:00:00Z");
        assert_eq!(
            descriptor.initial_channel().display_value,
            "2021-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_guards() {
        let builder = SourceDescriptorBuilder::default();
        assert_eq!(
            builder.build(&dataset(), "x", &[], &[], &info(vec![])),
            Err(DescriptorError::NoTimePoints)
        );
        assert_eq!(
            builder.build(&dataset(), "x", &[], &[], &info(vec![5, 2])),
            Err(DescriptorError::UnorderedTimePoints)
        );
        assert_eq!(
            builder.build(&dataset(), "x", &[subgroup("a")], &[], &info(vec![1])),
            Err(DescriptorError::IncompletePath {
                subgroups: 1,
                values: 0
            })
        );
    }

    #[test]
    fn test_operator_carries_all_channels() {
        let descriptor = SourceDescriptorBuilder::default()
            .build(
                &dataset(),
                "x",
                &[subgroup("metric")],
                &[value("mean")],
                &info(vec![10, 20, 30]),
            )
            .unwrap();

        let query = descriptor.operator().to_query();
        let params = &query["params"]["gdal_params"];
        assert_eq!(params["channels"].as_array().unwrap().len(), 3);
        assert_eq!(params["channels"][2]["channel"], 3);
        assert_eq!(params["channels"][0]["netcdf_subdataset"], "/mean");
        assert_eq!(params["coords"]["crs"], "EPSG:4326");
        assert_eq!(query["params"]["sourcename"], "Dataset-A");
    }
}
