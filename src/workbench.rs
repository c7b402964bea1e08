//! Top-level wiring of the EBV analyzer.
//!
//! The workbench owns the navigator, the shared state and the plot
//! assembler. The host calls [`EbvWorkbench::update`] once per frame; it
//! applies finished catalog fetches, publishes resolved layers and time
//! steps, and advances a running plot.

use crate::catalog::{CatalogClient, Transport};
use crate::config::AppConfig;
use crate::navigator::{FacetNavigator, NavigatorEvent};
use crate::plot::{
    MappingStatisticsService, PlotError, PlotSeriesAssembler, PlotSettings, QueryPipelineBuilder,
    StatisticsService,
};
use crate::raster::RasterSourceDescriptor;
use crate::state::{LayerState, MapLayer, Region, RegionCatalog, TimeStepRegistry};
use crate::url_state;
use std::rc::Rc;

pub struct EbvWorkbench {
    config: AppConfig,
    navigator: FacetNavigator,
    time_steps: TimeStepRegistry,
    layers: LayerState,
    regions: RegionCatalog,
    pipeline: QueryPipelineBuilder,
    statistics: Rc<dyn StatisticsService>,
    assembler: PlotSeriesAssembler,
    /// The EBV layer currently on the map.
    ebv_layer: Option<Rc<RasterSourceDescriptor>>,
}

impl EbvWorkbench {
    pub fn new(config: AppConfig, transport: Rc<dyn Transport>) -> Self {
        let client = CatalogClient::from_config(&config, transport.clone());
        let statistics = Rc::new(MappingStatisticsService::from_config(&config, transport));
        Self {
            navigator: FacetNavigator::from_config(&config, client),
            time_steps: TimeStepRegistry::default(),
            layers: LayerState::new(),
            regions: RegionCatalog::default(),
            pipeline: QueryPipelineBuilder::from_config(&config),
            statistics,
            assembler: PlotSeriesAssembler::new(),
            ebv_layer: None,
            config,
        }
    }

    /// Replaces the selectable regions.
    pub fn with_regions(mut self, regions: RegionCatalog) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_statistics_service(mut self, service: Rc<dyn StatisticsService>) -> Self {
        self.statistics = service;
        self
    }

    /// Opens `dataset_id` if given, otherwise loads the class list.
    pub fn start(&mut self, dataset_id: Option<&str>) {
        match dataset_id {
            Some(id) => self.navigator.open_dataset(id),
            None => self.navigator.load_classes(),
        }
    }

    /// Starts from the dataset id in the page URL, if any.
    pub fn start_from_url(&mut self) {
        let params = url_state::parse_from_url();
        self.start(params.dataset_id.as_deref());
    }

    /// Per-frame tick. Returns true if anything changed.
    pub fn update(&mut self) -> bool {
        let fetched = self.navigator.poll_completions();
        let handled = self.handle_events();
        let plotted = self.assembler.poll();
        fetched > 0 || handled > 0 || plotted > 0
    }

    /// Waits for the navigator's fetches and a running plot to finish.
    pub async fn settle(&mut self) {
        self.navigator.settle().await;
        self.handle_events();
        self.assembler.run().await;
    }

    fn handle_events(&mut self) -> usize {
        let events = self.navigator.drain_events();
        let count = events.len();
        for event in events {
            match event {
                NavigatorEvent::Invalidated { .. } => self.drop_ebv_layer(),
                NavigatorEvent::Resolved(descriptor) => self.show_ebv(descriptor),
                NavigatorEvent::Failed(error) => log::warn!("Catalog navigation failed: {}", error),
            }
        }
        count
    }

    /// Publishes a resolved raster source to the map and the time registry.
    fn show_ebv(&mut self, descriptor: Rc<RasterSourceDescriptor>) {
        self.layers.clear_layers();
        self.time_steps
            .set_time_format_from_unit(&descriptor.delta_unit.to_string());
        self.time_steps
            .set_available_steps(descriptor.time_steps.clone());
        if let Some(first) = descriptor.time_steps.first() {
            self.time_steps.set_current(first.time);
        }

        self.layers.add_layer(MapLayer::Raster(descriptor.clone()));
        self.layers
            .replace_region_layer(self.regions.selected().as_ref());
        self.ebv_layer = Some(descriptor);
    }

    fn drop_ebv_layer(&mut self) {
        self.assembler.cancel();
        if self.ebv_layer.take().is_some() {
            self.time_steps.clear();
        }
    }

    /// Removes every layer and everything derived from the EBV layer.
    ///
    /// The navigator keeps its selection, so a resolved path can be put
    /// back with [`EbvWorkbench::show_selected`].
    pub fn clear_layers(&mut self) {
        self.layers.clear_layers();
        self.drop_ebv_layer();
        self.time_steps.clear();
    }

    /// Publishes the navigator's resolved raster source again. Returns
    /// false if the path is not fully resolved.
    pub fn show_selected(&mut self) -> bool {
        match self.navigator.descriptor() {
            Some(descriptor) => {
                self.show_ebv(descriptor);
                true
            }
            None => false,
        }
    }

    /// Selects a region and puts its mask layer on top of the map.
    pub fn select_region(&mut self, region: Region) {
        self.regions.select(region);
        self.layers
            .replace_region_layer(self.regions.selected().as_ref());
    }

    pub fn is_plot_disabled(&self) -> bool {
        self.ebv_layer.is_none() || self.regions.selected().is_none()
    }

    /// Starts the statistics series of the EBV layer over the selected
    /// region, replacing any series still running.
    pub fn plot(&mut self) -> Result<(), PlotError> {
        let descriptor = self.ebv_layer.clone().ok_or(PlotError::NoRasterLayer)?;
        let region = self.regions.selected().ok_or(PlotError::NoRegion)?;
        let steps = self
            .time_steps
            .available_steps()
            .filter(|steps| !steps.is_empty())
            .ok_or(PlotError::NoTimeSteps)?;

        log::info!(
            "Plotting {} over {} ({} time step(s))",
            descriptor.layer_name,
            region.name,
            steps.len()
        );
        let settings = PlotSettings::new(&descriptor.unit, steps.len());
        let sequence = self.pipeline.build(&descriptor, &region, &steps);
        let results = sequence.execute(self.statistics.clone());
        self.assembler.start(settings, &steps, results);
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn navigator(&self) -> &FacetNavigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut FacetNavigator {
        &mut self.navigator
    }

    pub fn time_steps(&self) -> &TimeStepRegistry {
        &self.time_steps
    }

    pub fn layers(&self) -> &LayerState {
        &self.layers
    }

    pub fn regions(&self) -> &RegionCatalog {
        &self.regions
    }

    pub fn assembler(&self) -> &PlotSeriesAssembler {
        &self.assembler
    }

    pub fn ebv_layer(&self) -> Option<Rc<RasterSourceDescriptor>> {
        self.ebv_layer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::{param, ScriptedTransport};
    use crate::catalog::{EbvClass, EbvDataset, EbvSubgroupValue};
    use serde_json::json;

    const REGIONS: &str = r#"[["Box", 0.0, 20.0, 0.0, 10.0, 7]]"#;

    fn script(transport: &ScriptedTransport) {
        transport.respond(
            "datasets",
            &[("ebv_name", "Temperature")],
            json!({"datasets": [{"id": "1", "name": "Dataset-A", "dataset_path": "/d/A"}]}),
        );
        transport.respond(
            "subgroups",
            &[("ebv_path", "/d/A")],
            json!({"subgroups": [{"name": "Metric"}]}),
        );
        transport.respond(
            "subgroup_values",
            &[("ebv_path", "/d/A")],
            json!({"values": [{"name": "mean", "label": "Mean"}]}),
        );
        transport.respond(
            "data_loading_info",
            &[("ebv_path", "/d/A"), ("ebv_entity_path", "mean")],
            json!({
                "time_points": [1577836800, 1609459200, 1640995200],
                "delta_unit": "year",
                "unit_range": [0, 10]
            }),
        );
    }

    fn workbench(transport: Rc<ScriptedTransport>) -> EbvWorkbench {
        EbvWorkbench::new(AppConfig::default().with_session_token("token"), transport)
            .with_regions(RegionCatalog::from_json(REGIONS).unwrap())
    }

    fn resolve(bench: &mut EbvWorkbench) {
        let nav = bench.navigator_mut();
        nav.select_class(EbvClass {
            name: "Climate".to_string(),
            ebv_names: vec!["Temperature".to_string()],
        })
        .unwrap();
        nav.select_name("Temperature").unwrap();
        nav.poll_completions();
        nav.select_dataset(EbvDataset {
            id: "1".to_string(),
            name: "Dataset-A".to_string(),
            author: String::new(),
            description: String::new(),
            license: String::new(),
            dataset_path: "/d/A".to_string(),
        })
        .unwrap();
        nav.poll_completions();
        nav.select_subgroup_value(
            0,
            EbvSubgroupValue {
                name: "mean".to_string(),
                label: "Mean".to_string(),
                description: String::new(),
            },
        )
        .unwrap();
        bench.update();
    }

    fn select_box(bench: &mut EbvWorkbench) {
        let region = bench.regions().find("Box").cloned().unwrap();
        bench.select_region(region);
    }

    #[test]
    fn test_resolution_publishes_layer_and_time_steps() {
        let transport = ScriptedTransport::new();
        script(&transport);
        let mut bench = workbench(transport);
        select_box(&mut bench);

        resolve(&mut bench);

        let layers = bench.layers().layers();
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], MapLayer::Raster(_)));
        assert!(layers[1].is_region_mask());

        assert_eq!(bench.time_steps().step_count(), 3);
        assert_eq!(bench.time_steps().current_label(), "2020");
        assert!(!bench.is_plot_disabled());
    }

    #[test]
    fn test_plot_runs_queries_in_order() {
        let transport = ScriptedTransport::new();
        script(&transport);
        transport.respond(
            "plot",
            &[("time", "2020-01-01T00:00:00Z")],
            json!({"data": {"rasters": [{"mean": 1.0}]}}),
        );
        transport.hold("plot", &[("time", "2021-01-01T00:00:00Z")]);
        transport.respond(
            "plot",
            &[("time", "2022-01-01T00:00:00Z")],
            json!({"data": {"rasters": [{"mean": 3.0}]}}),
        );
        let mut bench = workbench(transport.clone());
        select_box(&mut bench);
        resolve(&mut bench);

        bench.plot().unwrap();
        bench.update();

        // The third query waits for the second.
        assert_eq!(transport.requests_of("plot").len(), 2);
        assert_eq!(bench.assembler().points().len(), 1);
        assert!(bench.assembler().is_ongoing());

        let second = json!({"data": {"rasters": [{"mean": 2.0}]}});
        assert!(transport.release("2021-01-01", second));
        bench.update();

        let points = bench.assembler().points();
        let values: Vec<_> = points.iter().map(|p| p.value).collect();
        let labels: Vec<_> = points.iter().map(|p| p.time_label.as_str()).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(labels, vec!["2020", "2021", "2022"]);
        assert!(!bench.assembler().is_ongoing());

        let settings = bench.assembler().settings().unwrap();
        assert_eq!(settings.x_limits, [0, 2]);
        assert_eq!(settings.y_label, "Mean value of »mean«");

        let first = &transport.requests_of("plot")[0];
        assert_eq!(param(first, "bbox"), Some("0,0,20,10"));
        let query = param(first, "query").unwrap();
        let query: serde_json::Value = serde_json::from_str(query).unwrap();
        assert_eq!(query["params"]["raster_width"], 1024);
        assert_eq!(query["params"]["raster_height"], 512);
        assert_eq!(query["sources"]["raster"][0]["type"], "expression");
    }

    #[test]
    fn test_invalidation_cancels_running_plot() {
        let transport = ScriptedTransport::new();
        script(&transport);
        transport.hold("plot", &[]);
        let mut bench = workbench(transport.clone());
        select_box(&mut bench);
        resolve(&mut bench);

        bench.plot().unwrap();
        bench.update();
        assert!(bench.assembler().is_ongoing());

        bench.navigator_mut().select_name("Precipitation").unwrap();
        bench.update();

        assert!(!bench.assembler().is_ongoing());
        assert!(bench.ebv_layer().is_none());
        assert_eq!(bench.time_steps().step_count(), 0);
        let late = json!({"data": {"rasters": [{"mean": 1.0}]}});
        assert!(!transport.release("plot", late));
        assert!(bench.is_plot_disabled());
    }

    #[test]
    fn test_plot_preconditions() {
        let transport = ScriptedTransport::new();
        script(&transport);
        let mut bench = workbench(transport);

        assert_eq!(bench.plot(), Err(PlotError::NoRasterLayer));
        resolve(&mut bench);
        assert_eq!(bench.plot(), Err(PlotError::NoRegion));
        assert!(bench.is_plot_disabled());
    }

    #[test]
    fn test_clear_layers_drops_ebv_layer() {
        let transport = ScriptedTransport::new();
        script(&transport);
        let mut bench = workbench(transport);
        resolve(&mut bench);

        bench.clear_layers();

        assert!(bench.layers().is_empty());
        assert!(bench.ebv_layer().is_none());
        assert!(bench.time_steps().available_steps().is_none());
    }

    #[test]
    fn test_cleared_selection_can_be_shown_again() {
        let transport = ScriptedTransport::new();
        script(&transport);
        let mut bench = workbench(transport.clone());
        assert!(!bench.show_selected());
        resolve(&mut bench);
        let requests = transport.requests().len();

        bench.clear_layers();
        assert!(bench.navigator().is_fully_resolved());
        assert!(bench.is_plot_disabled());

        assert!(bench.show_selected());

        let layers = bench.layers().layers();
        assert_eq!(layers.len(), 1);
        assert!(matches!(layers[0], MapLayer::Raster(_)));
        assert!(bench.ebv_layer().is_some());
        assert_eq!(bench.time_steps().step_count(), 3);
        assert_eq!(bench.time_steps().current_label(), "2020");
        assert_eq!(transport.requests().len(), requests);
    }

    #[test]
    fn test_region_layer_is_shown_without_ebv_layer() {
        let transport = ScriptedTransport::new();
        script(&transport);
        let mut bench = workbench(transport);

        select_box(&mut bench);

        let layers = bench.layers().layers();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name(), "Box");
        assert!(layers[0].is_region_mask());
        assert!(bench.is_plot_disabled());

        resolve(&mut bench);

        let layers = bench.layers().layers();
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], MapLayer::Raster(_)));
        assert!(layers[1].is_region_mask());
        assert!(!bench.is_plot_disabled());
    }

    #[test]
    fn test_start_opens_dataset_by_id() {
        let transport = ScriptedTransport::new();
        script(&transport);
        transport.respond(
            "classes",
            &[],
            json!({"classes": [{"name": "Climate", "ebv_names": ["Temperature"]}]}),
        );
        transport.respond(
            "dataset",
            &[("id", "1")],
            json!({
                "dataset": {
                    "title": "Dataset-A",
                    "ebv": {"ebv_class": "Climate", "ebv_name": "Temperature"}
                },
                "subgroups_and_values": [{"name": "Metric", "values": [{"name": "mean"}]}]
            }),
        );
        let mut bench = workbench(transport);

        bench.start(Some("1"));
        pollster::block_on(bench.settle());

        assert!(bench.ebv_layer().is_some());
        assert_eq!(bench.time_steps().step_count(), 3);
    }
}
