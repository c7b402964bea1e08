//! Layers published to the map.

use super::region::Region;
use super::subject::{Subject, SubscriptionId};
use crate::raster::{RasterSourceDescriptor, Unit};
use std::rc::Rc;

/// A layer handed to the map renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    /// EBV raster with one channel per time step.
    Raster(Rc<RasterSourceDescriptor>),
    /// Outline of the selected region, drawn from the region mask raster.
    RegionMask(Region),
}

impl MapLayer {
    pub fn name(&self) -> &str {
        match self {
            MapLayer::Raster(descriptor) => &descriptor.layer_name,
            MapLayer::RegionMask(region) => &region.name,
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            MapLayer::Raster(descriptor) => descriptor.unit.clone(),
            MapLayer::RegionMask(_) => Unit::mask(),
        }
    }

    pub fn is_region_mask(&self) -> bool {
        matches!(self, MapLayer::RegionMask(_))
    }
}

/// Published layers, bottom to top.
#[derive(Clone, Default)]
pub struct LayerState {
    layers: Subject<Vec<MapLayer>>,
}

impl LayerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> Vec<MapLayer> {
        self.layers.get()
    }

    pub fn len(&self) -> usize {
        self.layers.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest EBV raster layer, if any.
    pub fn raster(&self) -> Option<Rc<RasterSourceDescriptor>> {
        self.layers.with(|layers| {
            layers.iter().rev().find_map(|layer| match layer {
                MapLayer::Raster(descriptor) => Some(descriptor.clone()),
                MapLayer::RegionMask(_) => None,
            })
        })
    }

    pub fn add_layer(&self, layer: MapLayer) {
        log::debug!("Adding layer '{}'", layer.name());
        let mut layers = self.layers.get();
        layers.push(layer);
        self.layers.set(layers);
    }

    pub fn clear_layers(&self) {
        if !self.is_empty() {
            log::debug!("Clearing {} layer(s)", self.len());
        }
        self.layers.set(Vec::new());
    }

    /// Swaps the region layer for `region`, keeping it on top. `None`
    /// only removes the current one.
    pub fn replace_region_layer(&self, region: Option<&Region>) {
        let mut layers = self.layers.get();
        layers.retain(|layer| !layer.is_region_mask());
        if let Some(region) = region {
            layers.push(MapLayer::RegionMask(region.clone()));
        }
        self.layers.set(layers);
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<MapLayer>) + 'static) -> SubscriptionId {
        self.layers.subscribe(listener)
    }
}
