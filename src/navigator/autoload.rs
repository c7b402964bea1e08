//! Loading a complete selection path from a dataset id.
//!
//! The `dataset` request names the class, EBV name and every subgroup with
//! its values. The remaining requests fill in the option lists of the
//! upper levels and the loading info for the first value of each
//! subgroup, so the navigator can install the whole path at once.

use super::NavigatorError;
use crate::catalog::{
    join_path, CatalogClient, DataLoadingInfo, EbvClass, EbvDataset, EbvSubgroup, EbvSubgroupValue,
};
use futures_util::future::try_join;

/// Everything needed to install a resolved path.
#[derive(Debug, Clone)]
pub(crate) struct LoadedPath {
    pub classes: Vec<EbvClass>,
    pub class: EbvClass,
    pub ebv_name: String,
    pub datasets: Vec<EbvDataset>,
    pub dataset: EbvDataset,
    pub subgroups: Vec<EbvSubgroup>,
    /// Option list per subgroup, in subgroup order.
    pub value_options: Vec<Vec<EbvSubgroupValue>>,
    /// First value of every subgroup.
    pub values: Vec<EbvSubgroupValue>,
    pub info: DataLoadingInfo,
}

pub(crate) async fn load_path(
    client: CatalogClient,
    id: String,
) -> Result<LoadedPath, NavigatorError> {
    let detail = client.dataset(&id).await?;
    let reference = detail.dataset.ebv;
    log::info!(
        "Opening dataset {} ({} / {})",
        id,
        reference.ebv_class,
        reference.ebv_name
    );

    let (classes, datasets) =
        try_join(client.classes(), client.datasets(&reference.ebv_name)).await?;

    let class = classes
        .iter()
        .find(|c| c.name == reference.ebv_class)
        .cloned()
        .ok_or_else(|| NavigatorError::UnknownReference {
            kind: "class",
            name: reference.ebv_class.clone(),
        })?;
    let dataset = datasets
        .iter()
        .find(|d| d.name == detail.dataset.title)
        .cloned()
        .ok_or_else(|| NavigatorError::UnknownReference {
            kind: "dataset",
            name: detail.dataset.title.clone(),
        })?;

    let subgroups = client.subgroups(&dataset.dataset_path).await?;
    if subgroups.len() != detail.subgroups_and_values.len() {
        return Err(NavigatorError::SubgroupMismatch {
            subgroups: subgroups.len(),
            values: detail.subgroups_and_values.len(),
        });
    }

    let mut value_options = Vec::with_capacity(detail.subgroups_and_values.len());
    let mut values = Vec::with_capacity(detail.subgroups_and_values.len());
    for group in detail.subgroups_and_values {
        let first = group
            .values
            .first()
            .cloned()
            .ok_or_else(|| NavigatorError::EmptySubgroup(group.name.clone()))?;
        values.push(first);
        value_options.push(group.values);
    }

    let entity_path = join_path(values.iter().map(|v| v.name.as_str()));
    let info = client
        .data_loading_info(&dataset.dataset_path, &entity_path)
        .await?;

    Ok(LoadedPath {
        classes,
        class,
        ebv_name: reference.ebv_name,
        datasets,
        dataset,
        subgroups,
        value_options,
        values,
        info,
    })
}
