//! Typed catalog client.
//!
//! The client is stateless apart from its endpoint and session token:
//! each call builds the request URL eagerly and returns a `'static`
//! future, so the caller decides when to poll it and may drop it to
//! cancel the request.

use super::request::CatalogRequest;
use super::transport::{Transport, TransportError};
use super::types::*;
use crate::config::AppConfig;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by catalog requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("{request} request failed: {source}")]
    Transport {
        request: &'static str,
        #[source]
        source: TransportError,
    },

    /// The body did not match the expected response shape.
    #[error("malformed {request} response: {message}")]
    Decode {
        request: &'static str,
        message: String,
    },

    /// The service answered with `"result": false`.
    #[error("{request} rejected by catalog: {message}")]
    Service {
        request: &'static str,
        message: String,
    },
}

/// Request/response adapter for the catalog service.
#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    session_token: String,
    transport: Rc<dyn Transport>,
}

impl CatalogClient {
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

    /// Creates a client for the configured mapping endpoint.
    pub fn from_config(config: &AppConfig, transport: Rc<dyn Transport>) -> Self {
        Self::new(
            config.mapping_url.clone(),
            config.session_token.clone(),
            transport,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn transport(&self) -> Rc<dyn Transport> {
        self.transport.clone()
    }

    /// URL a request is sent to.
    pub fn url_for(&self, request: &CatalogRequest) -> String {
        request
            .to_parameters(&self.session_token)
            .to_url(&self.base_url)
    }

    /// Sends a request and decodes the body as `T`.
    pub fn request<T>(
        &self,
        request: CatalogRequest,
    ) -> LocalBoxFuture<'static, Result<T, CatalogError>>
    where
        T: DeserializeOwned + 'static,
    {
        let kind = request.kind();
        let url = self.url_for(&request);
        log::debug!("Catalog request: {}", request);

        let response = self.transport.get(&url);
        async move {
            let started = web_time::Instant::now();
            let body = response.await.map_err(|source| CatalogError::Transport {
                request: kind,
                source,
            })?;
            log::debug!(
                "Catalog {} answered in {:.0}ms ({} bytes)",
                kind,
                started.elapsed().as_secs_f64() * 1000.0,
                body.len()
            );
            decode_body(kind, &body)
        }
        .boxed_local()
    }

    pub fn classes(&self) -> LocalBoxFuture<'static, Result<Vec<EbvClass>, CatalogError>> {
        self.request::<ClassesResponse>(CatalogRequest::Classes)
            .map(|r| r.map(|body| body.classes))
            .boxed_local()
    }

    pub fn datasets(
        &self,
        ebv_name: &str,
    ) -> LocalBoxFuture<'static, Result<Vec<EbvDataset>, CatalogError>> {
        self.request::<DatasetsResponse>(CatalogRequest::Datasets {
            ebv_name: ebv_name.to_string(),
        })
        .map(|r| r.map(|body| body.datasets))
        .boxed_local()
    }

    pub fn subgroups(
        &self,
        ebv_path: &str,
    ) -> LocalBoxFuture<'static, Result<Vec<EbvSubgroup>, CatalogError>> {
        self.request::<SubgroupsResponse>(CatalogRequest::Subgroups {
            ebv_path: ebv_path.to_string(),
        })
        .map(|r| r.map(|body| body.subgroups))
        .boxed_local()
    }

    pub fn subgroup_values(
        &self,
        ebv_path: &str,
        ebv_subgroup: &str,
        ebv_group_path: &str,
    ) -> LocalBoxFuture<'static, Result<Vec<EbvSubgroupValue>, CatalogError>> {
        self.request::<SubgroupValuesResponse>(CatalogRequest::SubgroupValues {
            ebv_path: ebv_path.to_string(),
            ebv_subgroup: ebv_subgroup.to_string(),
            ebv_group_path: ebv_group_path.to_string(),
        })
        .map(|r| r.map(|body| body.values))
        .boxed_local()
    }

    pub fn data_loading_info(
        &self,
        ebv_path: &str,
        ebv_entity_path: &str,
    ) -> LocalBoxFuture<'static, Result<DataLoadingInfo, CatalogError>> {
        self.request::<DataLoadingInfo>(CatalogRequest::DataLoadingInfo {
            ebv_path: ebv_path.to_string(),
            ebv_entity_path: ebv_entity_path.to_string(),
        })
    }

    pub fn dataset(
        &self,
        id: &str,
    ) -> LocalBoxFuture<'static, Result<DatasetResponse, CatalogError>> {
        let id = id.to_string();
        self.request::<DatasetResponse>(CatalogRequest::Dataset { id })
    }
}

/// Decodes a response body, surfacing `"result": false` as a service error.
fn decode_body<T: DeserializeOwned>(kind: &'static str, body: &str) -> Result<T, CatalogError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| CatalogError::Decode {
            request: kind,
            message: e.to_string(),
        })?;

    if value.get("result") == Some(&serde_json::Value::Bool(false)) {
        let message = value
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(CatalogError::Service {
            request: kind,
            message,
        });
    }

    serde_json::from_value(value).map_err(|e| CatalogError::Decode {
        request: kind,
        message: e.to_string(),
    })
}
