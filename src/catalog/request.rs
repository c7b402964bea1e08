//! Catalog request kinds and their query-string encoding.

use std::fmt;

/// Service name the mapping backend routes catalog requests to.
pub const CATALOG_SERVICE: &str = "geo_bon_catalog";

/// One catalog request with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRequest {
    Classes,
    Datasets {
        ebv_name: String,
    },
    Subgroups {
        ebv_path: String,
    },
    SubgroupValues {
        ebv_path: String,
        ebv_subgroup: String,
        ebv_group_path: String,
    },
    DataLoadingInfo {
        ebv_path: String,
        ebv_entity_path: String,
    },
    /// Catalog entry plus every subgroup with its values.
    Dataset {
        id: String,
    },
}

impl CatalogRequest {
    /// Wire name of the request.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogRequest::Classes => "classes",
            CatalogRequest::Datasets { .. } => "datasets",
            CatalogRequest::Subgroups { .. } => "subgroups",
            CatalogRequest::SubgroupValues { .. } => "subgroup_values",
            CatalogRequest::DataLoadingInfo { .. } => "data_loading_info",
            CatalogRequest::Dataset { .. } => "dataset",
        }
    }

    /// Request parameters in wire order.
    pub fn parameters(&self) -> Vec<(&'static str, &str)> {
        match self {
            CatalogRequest::Classes => Vec::new(),
            CatalogRequest::Datasets { ebv_name } => vec![("ebv_name", ebv_name.as_str())],
            CatalogRequest::Subgroups { ebv_path } => vec![("ebv_path", ebv_path.as_str())],
            CatalogRequest::SubgroupValues {
                ebv_path,
                ebv_subgroup,
                ebv_group_path,
            } => vec![
                ("ebv_path", ebv_path.as_str()),
                ("ebv_subgroup", ebv_subgroup.as_str()),
                ("ebv_group_path", ebv_group_path.as_str()),
            ],
            CatalogRequest::DataLoadingInfo {
                ebv_path,
                ebv_entity_path,
            } => vec![
                ("ebv_path", ebv_path.as_str()),
                ("ebv_entity_path", ebv_entity_path.as_str()),
            ],
            CatalogRequest::Dataset { id } => vec![("id", id.as_str())],
        }
    }

    /// Encodes the request as a mapping message body.
    pub fn to_parameters(&self, session_token: &str) -> RequestParameters {
        let mut params = RequestParameters::new(CATALOG_SERVICE)
            .with("request", self.kind())
            .with("sessiontoken", session_token);
        for (key, value) in self.parameters() {
            params = params.with(key, value);
        }
        params
    }
}

impl fmt::Display for CatalogRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        for (key, value) in self.parameters() {
            write!(f, " {}={:?}", key, value)?;
        }
        Ok(())
    }
}

/// Ordered key/value pairs of a mapping service request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParameters {
    pairs: Vec<(String, String)>,
}

impl RequestParameters {
    /// Starts a message body for the given mapping service.
    pub fn new(service: &str) -> Self {
        Self {
            pairs: vec![("service".to_string(), service.to_string())],
        }
    }

    /// Appends a parameter.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    /// Looks up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Percent-encoded `key=value&...` string.
    pub fn to_message_body(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full request URL below `base_url`.
    pub fn to_url(&self, base_url: &str) -> String {
        let separator = if base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", base_url, separator, self.to_message_body())
    }
}

/// Joins subgroup value names into a group/entity path (`a/b/c`).
pub fn join_path<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join("/")
}

/// Percent-encodes everything except RFC 3986 unreserved characters.
fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
