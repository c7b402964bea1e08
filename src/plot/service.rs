//! Statistics service used by plot queries.

use super::query::PlotQuery;
use crate::catalog::{RequestParameters, Transport, TransportError};
use crate::config::AppConfig;
use crate::state::time_steps::format_iso;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use std::rc::Rc;
use thiserror::Error;

/// Mapping service answering statistics requests.
const PLOT_SERVICE: &str = "plot";

/// Errors raised by a statistics query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("statistics request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed statistics response: {0}")]
    Decode(String),

    #[error("statistics rejected by mapping service: {0}")]
    Service(String),

    /// The response carried no raster statistics.
    #[error("statistics response contains no rasters")]
    EmptyResult,
}

/// Statistics of one raster.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RasterStatistics {
    #[serde(default)]
    pub count: u64,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    #[serde(default)]
    pub nan_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct StatisticsData {
    rasters: Vec<RasterStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlotResult {
    #[serde(rename = "type", default)]
    kind: String,
    data: StatisticsData,
}

/// Result of one statistics query.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStatistics {
    pub rasters: Vec<RasterStatistics>,
}

impl LayerStatistics {
    pub fn new(rasters: Vec<RasterStatistics>) -> Result<Self, QueryError> {
        if rasters.is_empty() {
            return Err(QueryError::EmptyResult);
        }
        Ok(Self { rasters })
    }

    /// Mean of the first raster; NaN when everything was masked out.
    pub fn mean(&self) -> f64 {
        self.rasters
            .first()
            .and_then(|r| r.mean)
            .unwrap_or(f64::NAN)
    }

    /// Parses a statistics response body.
    pub fn from_json(body: &str) -> Result<Self, QueryError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))?;
        if value.get("result") == Some(&serde_json::Value::Bool(false)) {
            let message = value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(QueryError::Service(message.to_string()));
        }

        let result: PlotResult =
            serde_json::from_value(value).map_err(|e| QueryError::Decode(e.to_string()))?;
        if !result.kind.is_empty() && result.kind != "LayerStatistics" {
            log::warn!("Unexpected statistics result type '{}'", result.kind);
        }
        Self::new(result.data.rasters)
    }
}

/// Executes a single statistics query.
pub trait StatisticsService {
    fn statistics(
        &self,
        query: &PlotQuery,
    ) -> LocalBoxFuture<'static, Result<LayerStatistics, QueryError>>;
}

/// Statistics over the mapping service's `plot` endpoint.
pub struct MappingStatisticsService {
    base_url: String,
    session_token: String,
    transport: Rc<dyn Transport>,
}

impl MappingStatisticsService {
    pub fn new(
        base_url: impl Into<String>,
        session_token: impl Into<String>,
        transport: Rc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            session_token: session_token.into(),
            transport,
        }
    }

    pub fn from_config(config: &AppConfig, transport: Rc<dyn Transport>) -> Self {
        Self::new(
            config.mapping_url.clone(),
            config.session_token.clone(),
            transport,
        )
    }

    /// URL of the statistics request for `query`.
    pub fn url_for(&self, query: &PlotQuery) -> String {
        let [minx, miny, maxx, maxy] = query.extent;
        RequestParameters::new(PLOT_SERVICE)
            .with("sessiontoken", self.session_token.as_str())
            .with("query", query.operator.to_query().to_string())
            .with("time", format_iso(&query.time_step.time))
            .with("bbox", format!("{},{},{},{}", minx, miny, maxx, maxy))
            .with("crs", query.projection.as_str())
            .to_url(&self.base_url)
    }
}

impl StatisticsService for MappingStatisticsService {
    fn statistics(
        &self,
        query: &PlotQuery,
    ) -> LocalBoxFuture<'static, Result<LayerStatistics, QueryError>> {
        let index = query.index;
        let response = self.transport.get(&self.url_for(query));
        async move {
            let started = web_time::Instant::now();
            let body = response.await?;
            log::debug!(
                "Statistics query {} answered in {:.0}ms",
                index,
                started.elapsed().as_secs_f64() * 1000.0
            );
            LayerStatistics::from_json(&body)
        }
        .boxed_local()
    }
}
