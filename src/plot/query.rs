//! Per-time-step statistics queries.
//!
//! One query is built per time step, all sharing a single statistics
//! operator. Execution is strictly sequential: the next query is only sent
//! once the previous result has been yielded, so a result's position in
//! the stream is the position of its time step.

use super::service::{LayerStatistics, QueryError, StatisticsService};
use crate::config::AppConfig;
use crate::raster::{ChannelConfig, DataType, GdalSource, Operator, RasterSourceDescriptor, Unit};
use crate::state::{Region, TimeStep};
use futures_util::stream::{self, LocalBoxStream};
use futures_util::StreamExt;
use std::rc::Rc;

/// CRS statistics are computed in, also the CRS of the region masks.
pub const QUERY_PROJECTION: &str = "EPSG:4326";

/// Per-pixel expression keeping source values inside the mask.
const MASK_EXPRESSION: &str = "B != 0 ? A : NAN";

/// Ordered stream of statistics results.
pub type ResultStream = LocalBoxStream<'static, Result<LayerStatistics, QueryError>>;

/// Statistics request for one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotQuery {
    /// Position of the time step in the submitted list.
    pub index: usize,
    pub time_step: TimeStep,
    pub operator: Rc<Operator>,
    /// `[minx, miny, maxx, maxy]`
    pub extent: [f64; 4],
    pub projection: String,
    /// `(width, height)` of the statistics raster.
    pub resolution: (u32, u32),
}

/// Queries in time-step order.
#[derive(Debug, Clone)]
pub struct OrderedQuerySequence {
    queries: Vec<PlotQuery>,
}

impl OrderedQuerySequence {
    pub fn queries(&self) -> &[PlotQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Runs the queries one after the other.
    ///
    /// A query is only dispatched once the stream has yielded the result
    /// of the one before it. Dropping the stream cancels the rest.
    pub fn execute(self, service: Rc<dyn StatisticsService>) -> ResultStream {
        log::debug!("Executing {} statistics quer(ies)", self.queries.len());
        stream::iter(self.queries)
            .then(move |query| service.statistics(&query))
            .boxed_local()
    }
}

/// Builds statistics queries for a raster source clipped to a region.
#[derive(Debug, Clone)]
pub struct QueryPipelineBuilder {
    max_resolution: u32,
    mask_source_name: String,
}

impl Default for QueryPipelineBuilder {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl QueryPipelineBuilder {
    pub fn new(max_resolution: u32, mask_source_name: impl Into<String>) -> Self {
        Self {
            max_resolution: max_resolution.max(1),
            mask_source_name: mask_source_name.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_query_resolution, config.mask_source_name.clone())
    }

    /// One query per time step, in input order.
    pub fn build(
        &self,
        source: &RasterSourceDescriptor,
        region: &Region,
        time_steps: &[TimeStep],
    ) -> OrderedQuerySequence {
        let resolution = self.resolution(region.width(), region.height());
        let operator = Rc::new(self.statistics_operator(source, region, resolution));
        let extent = region.bbox();

        let queries = time_steps
            .iter()
            .enumerate()
            .map(|(index, step)| PlotQuery {
                index,
                time_step: step.clone(),
                operator: operator.clone(),
                extent,
                projection: QUERY_PROJECTION.to_string(),
                resolution,
            })
            .collect();

        log::debug!(
            "Built statistics queries for {} at {}x{}",
            region.name,
            resolution.0,
            resolution.1
        );
        OrderedQuerySequence { queries }
    }

    /// Statistics raster size for an extent of `width` x `height`.
    ///
    /// The longer side gets the full budget, the shorter one is scaled by
    /// the aspect ratio and rounded up. Sides never drop below one pixel.
    pub fn resolution(&self, width: f64, height: f64) -> (u32, u32) {
        let (width, height) = (width.abs(), height.abs());
        let mut request_width = self.max_resolution;
        let mut request_height = self.max_resolution;

        if width > height {
            request_height = scale(self.max_resolution, height / width);
        } else if height > width {
            request_width = scale(self.max_resolution, width / height);
        }
        (request_width.max(1), request_height.max(1))
    }

    /// Statistics over the source, clipped by the region mask if it has one.
    pub fn statistics_operator(
        &self,
        source: &RasterSourceDescriptor,
        region: &Region,
        (raster_width, raster_height): (u32, u32),
    ) -> Operator {
        let primary = source.operator();
        let input = match region.mask {
            Some(mask) => {
                let mask_source = Operator::GdalSource(GdalSource {
                    source_name: self.mask_source_name.clone(),
                    channel_config: ChannelConfig {
                        channel_number: mask.channel,
                        display_value: region.name.clone(),
                    },
                    transform: false,
                    gdal_params: None,
                    crs: QUERY_PROJECTION.to_string(),
                    data_type: DataType::Byte,
                    unit: Unit::raw(),
                });
                Operator::Expression {
                    expression: MASK_EXPRESSION.to_string(),
                    data_type: primary.data_type().unwrap_or(DataType::Float64),
                    unit: source.unit.clone(),
                    sources: vec![primary.reprojected(mask_source.projection()), mask_source],
                }
            }
            None => primary.reprojected(QUERY_PROJECTION),
        };

        Operator::Statistics {
            raster_width,
            raster_height,
            sources: vec![input],
        }
    }
}

fn scale(max: u32, ratio: f64) -> u32 {
    (max as f64 * ratio).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataLoadingInfo, EbvDataset, EbvSubgroup, EbvSubgroupValue};
    use crate::raster::{ResultType, SourceDescriptorBuilder};
    use crate::state::DeltaUnit;

    fn descriptor(crs: Option<&str>) -> RasterSourceDescriptor {
        let dataset = EbvDataset {
            id: "1".to_string(),
            name: "Dataset-A".to_string(),
            author: String::new(),
            description: String::new(),
            license: String::new(),
            dataset_path: "/d/A".to_string(),
        };
        let info = DataLoadingInfo {
            time_points: vec![1577836800, 1609459200, 1640995200],
            delta_unit: "year".to_string(),
            crs_code: crs.map(str::to_string),
            unit_range: [0.0, 10.0],
        };
        SourceDescriptorBuilder::default()
            .build(
                &dataset,
                "Temperature",
                &[EbvSubgroup {
                    name: "metric".to_string(),
                    description: String::new(),
                }],
                &[EbvSubgroupValue {
                    name: "mean".to_string(),
                    label: String::new(),
                    description: String::new(),
                }],
                &info,
            )
            .unwrap()
    }

    #[test]
    fn test_resolution_follows_aspect_ratio() {
        let builder = QueryPipelineBuilder::default();
        assert_eq!(builder.resolution(20.0, 10.0), (1024, 512));
        assert_eq!(builder.resolution(10.0, 20.0), (512, 1024));
        assert_eq!(builder.resolution(3.0, 1.0), (1024, 342));
        assert_eq!(builder.resolution(5.0, 5.0), (1024, 1024));
    }

    #[test]
    fn test_degenerate_extent_keeps_one_pixel() {
        let builder = QueryPipelineBuilder::default();
        assert_eq!(builder.resolution(10.0, 0.0), (1024, 1));
        assert_eq!(builder.resolution(0.0, 0.0), (1024, 1024));
    }

    #[test]
    fn test_one_query_per_step_in_order() {
        let source = descriptor(None);
        let region = Region::new("Box", 0.0, 0.0, 20.0, 10.0);
        let steps = vec![
            source.time_steps[2].clone(),
            source.time_steps[0].clone(),
            source.time_steps[0].clone(),
        ];

        let sequence = QueryPipelineBuilder::default().build(&source, &region, &steps);

        assert_eq!(sequence.len(), 3);
        let labels: Vec<_> = sequence
            .queries()
            .iter()
            .map(|q| q.time_step.display_label.as_str())
            .collect();
        assert_eq!(labels, vec!["2022", "2020", "2020"]);
        assert_eq!(sequence.queries()[1].index, 1);
        assert_eq!(sequence.queries()[0].resolution, (1024, 512));
        assert_eq!(sequence.queries()[0].extent, [0.0, 0.0, 20.0, 10.0]);
        assert!(Rc::ptr_eq(
            &sequence.queries()[0].operator,
            &sequence.queries()[2].operator
        ));
    }

    #[test]
    fn test_masked_region_builds_clip_expression() {
        let source = descriptor(Some("EPSG:3035"));
        let region = Region::new("Ghana", -3.24, 4.74, 1.19, 11.17).with_mask(89);
        let builder = QueryPipelineBuilder::default();

        let operator = builder.statistics_operator(&source, &region, (512, 1024));
        assert_eq!(operator.result_type(), ResultType::Plot);

        let Operator::Expression {
            expression,
            data_type,
            sources,
            ..
        } = &operator.sources()[0]
        else {
            panic!("expected expression");
        };
        assert_eq!(expression, "B != 0 ? A : NAN");
        assert_eq!(*data_type, DataType::Float64);

        // Primary source reprojected to the mask CRS.
        assert!(matches!(
            &sources[0],
            Operator::Projection { dest_crs, .. } if dest_crs == "EPSG:4326"
        ));
        let query = sources[1].to_query();
        assert_eq!(
            query["params"]["sourcename"],
            "ne_10m_admin_0_countries_as_raster"
        );
        assert_eq!(query["params"]["channel"], 89);
        assert_eq!(sources[1].data_type(), Some(DataType::Byte));
    }

    #[test]
    fn test_unmasked_region_skips_expression() {
        let source = descriptor(None);
        let region = Region::new("Box", 0.0, 0.0, 1.0, 1.0);
        let builder = QueryPipelineBuilder::default();
        let operator = builder.statistics_operator(&source, &region, (1, 1));

        assert!(matches!(operator.sources()[0], Operator::GdalSource(_)));
        assert_eq!(operator.projection(), QUERY_PROJECTION);
    }

    #[test]
    fn test_steps_keep_labels_of_unit() {
        let source = descriptor(None);
        assert_eq!(source.delta_unit, DeltaUnit::Year);
        assert_eq!(source.time_steps[0].display_label, "2020");
    }
}
