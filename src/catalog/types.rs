//! Response types of the catalog service.
//!
//! Field names follow the wire format so the structs deserialize straight
//! from the response body.

use serde::{Deserialize, Deserializer, Serialize};

/// An EBV class and the variable names it groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbvClass {
    pub name: String,
    #[serde(default)]
    pub ebv_names: Vec<String>,
}

/// A dataset published for one EBV name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbvDataset {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license: String,
    /// Path of the NetCDF file on the mapping server.
    pub dataset_path: String,
}

/// A dataset-specific dimension, e.g. "metric" or "entity".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbvSubgroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One selectable value of a subgroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbvSubgroupValue {
    /// Path segment used in group/entity paths.
    pub name: String,
    /// Human-readable label shown in option lists.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl EbvSubgroupValue {
    /// Label for display, falling back to the name when the label is empty.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Metadata of a fully selected path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLoadingInfo {
    /// UNIX seconds, one per raster channel.
    pub time_points: Vec<i64>,
    pub delta_unit: String,
    #[serde(default)]
    pub crs_code: Option<String>,
    pub unit_range: [f64; 2],
}

impl DataLoadingInfo {
    /// Declared CRS code; an empty string counts as absent.
    pub fn crs(&self) -> Option<&str> {
        self.crs_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    /// Returns true if time points are non-empty and strictly increasing.
    pub fn has_ordered_time_points(&self) -> bool {
        !self.time_points.is_empty() && self.time_points.windows(2).all(|w| w[0] < w[1])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassesResponse {
    pub classes: Vec<EbvClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<EbvDataset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgroupsResponse {
    pub subgroups: Vec<EbvSubgroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgroupValuesResponse {
    pub values: Vec<EbvSubgroupValue>,
}

/// Class and name a dataset is filed under.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EbvReference {
    pub ebv_class: String,
    pub ebv_name: String,
}

/// Catalog entry returned by the `dataset` request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetDetail {
    /// Matches [`EbvDataset::name`] in the dataset listing.
    pub title: String,
    pub ebv: EbvReference,
}

/// A subgroup together with all of its values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubgroupWithValues {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub values: Vec<EbvSubgroupValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetResponse {
    pub dataset: DatasetDetail,
    pub subgroups_and_values: Vec<SubgroupWithValues>,
}

/// Dataset ids are strings in newer catalogs and integers in older ones.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
