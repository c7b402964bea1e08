//! Selection state machine over the facet levels.
//!
//! Setting a level clears every deeper level synchronously and then issues
//! the fetch for the next one. Fetches are kept as futures in a
//! `FuturesUnordered` owned by the navigator; the host drives them with
//! [`FacetNavigator::poll_completions`] from its update loop or awaits them
//! with [`FacetNavigator::settle`]. Invalidation drops the futures of the
//! cleared levels, and every completion is checked against the generation
//! it was issued under before it may touch state.

use super::autoload::{load_path, LoadedPath};
use super::level::{
    FacetLevel, FacetValue, LevelState, LevelStatus, CLASS_LEVEL, DATASET_LEVEL,
    FIRST_SUBGROUP_LEVEL, NAME_LEVEL,
};
use super::{NavigatorError, NavigatorEvent};
use crate::catalog::{
    join_path, CatalogClient, CatalogError, DataLoadingInfo, EbvClass, EbvDataset, EbvSubgroup,
    EbvSubgroupValue,
};
use crate::config::AppConfig;
use crate::raster::{RasterSourceDescriptor, SourceDescriptorBuilder};
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// What a fetch fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchTarget {
    /// Option list of a level.
    Level(usize),
    /// Subgroup list of the selected dataset.
    Subgroups,
    /// Data loading info of the complete path.
    Info,
    /// A whole path opened by dataset id.
    Path,
}

enum Completion {
    Classes(Result<Vec<EbvClass>, CatalogError>),
    Datasets(Result<Vec<EbvDataset>, CatalogError>),
    Subgroups(Result<Vec<EbvSubgroup>, CatalogError>),
    SubgroupValues(Result<Vec<EbvSubgroupValue>, CatalogError>),
    Info(Result<DataLoadingInfo, CatalogError>),
    Path(Box<Result<LoadedPath, NavigatorError>>),
}

struct Finished {
    target: FetchTarget,
    stamp: u64,
    completion: Completion,
}

/// An in-flight fetch tagged with its target and generation.
struct PendingFetch {
    target: FetchTarget,
    stamp: u64,
    future: LocalBoxFuture<'static, Completion>,
}

impl Future for PendingFetch {
    type Output = Finished;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Finished> {
        let target = self.target;
        let stamp = self.stamp;
        self.future.poll_unpin(cx).map(|completion| Finished {
            target,
            stamp,
            completion,
        })
    }
}

/// Cascading selection over class, name, dataset and subgroup levels.
pub struct FacetNavigator {
    client: CatalogClient,
    builder: SourceDescriptorBuilder,
    search_threshold: usize,
    levels: Vec<LevelState>,
    subgroups: Option<Vec<EbvSubgroup>>,
    /// Status of the subgroup list, loading info and opened paths.
    path_status: LevelStatus,
    info: Option<DataLoadingInfo>,
    resolved: Option<Rc<RasterSourceDescriptor>>,
    generation: u64,
    pending: FuturesUnordered<PendingFetch>,
    events: VecDeque<NavigatorEvent>,
}

impl FacetNavigator {
    pub fn new(
        client: CatalogClient,
        builder: SourceDescriptorBuilder,
        search_threshold: usize,
    ) -> Self {
        Self {
            client,
            builder,
            search_threshold,
            levels: vec![
                LevelState::new("EBV Class", 0),
                LevelState::new("EBV Name", 0),
                LevelState::new("EBV Dataset", 0),
            ],
            subgroups: None,
            path_status: LevelStatus::Idle,
            info: None,
            resolved: None,
            generation: 0,
            pending: FuturesUnordered::new(),
            events: VecDeque::new(),
        }
    }

    pub fn from_config(config: &AppConfig, client: CatalogClient) -> Self {
        Self::new(
            client,
            SourceDescriptorBuilder::from_config(config),
            config.search_threshold,
        )
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn levels(&self) -> &[LevelState] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> Option<&LevelState> {
        self.levels.get(level)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn selected(&self, level: usize) -> Option<&FacetValue> {
        self.levels.get(level).and_then(|l| l.selected.as_ref())
    }

    pub fn options(&self, level: usize) -> Option<&[FacetValue]> {
        self.levels.get(level).and_then(|l| l.options.as_deref())
    }

    /// Options of `level` that pass its filter.
    pub fn visible_options(&self, level: usize) -> Vec<&FacetValue> {
        self.levels
            .get(level)
            .map(LevelState::visible_options)
            .unwrap_or_default()
    }

    pub fn status(&self, level: usize) -> Option<&LevelStatus> {
        self.levels.get(level).map(|l| &l.status)
    }

    /// Status of the subgroup list and loading info fetches.
    pub fn path_status(&self) -> &LevelStatus {
        &self.path_status
    }

    pub fn subgroups(&self) -> Option<&[EbvSubgroup]> {
        self.subgroups.as_deref()
    }

    pub fn selected_dataset(&self) -> Option<&EbvDataset> {
        match self.selected(DATASET_LEVEL) {
            Some(FacetValue::Dataset(dataset)) => Some(dataset),
            _ => None,
        }
    }

    pub fn data_loading_info(&self) -> Option<&DataLoadingInfo> {
        self.info.as_ref()
    }

    /// Descriptor of the resolved path.
    pub fn descriptor(&self) -> Option<Rc<RasterSourceDescriptor>> {
        self.resolved.clone()
    }

    /// Returns true if the level has enough options to offer a search box.
    pub fn is_searchable(&self, level: usize) -> bool {
        self.levels
            .get(level)
            .map(|l| l.option_count() > self.search_threshold)
            .unwrap_or(false)
    }

    /// Returns true while any fetch is in flight.
    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns true once every subgroup has a value and the loading info
    /// has arrived.
    pub fn is_fully_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Events since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<NavigatorEvent> {
        self.events.drain(..).collect()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Fetches the class list.
    pub fn load_classes(&mut self) {
        self.levels[CLASS_LEVEL].status = LevelStatus::Loading;
        let future = self.client.classes().map(Completion::Classes);
        self.issue(FetchTarget::Level(CLASS_LEVEL), future.boxed_local());
    }

    pub fn select_class(&mut self, class: EbvClass) -> Result<bool, NavigatorError> {
        self.set_level(CLASS_LEVEL, FacetValue::Class(class))
    }

    pub fn select_name(&mut self, name: impl Into<String>) -> Result<bool, NavigatorError> {
        self.set_level(NAME_LEVEL, FacetValue::Name(name.into()))
    }

    pub fn select_dataset(&mut self, dataset: EbvDataset) -> Result<bool, NavigatorError> {
        self.set_level(DATASET_LEVEL, FacetValue::Dataset(dataset))
    }

    /// Selects a value of the subgroup at `index` (0-based).
    pub fn select_subgroup_value(
        &mut self,
        index: usize,
        value: EbvSubgroupValue,
    ) -> Result<bool, NavigatorError> {
        self.set_level(FIRST_SUBGROUP_LEVEL + index, FacetValue::Subgroup(value))
    }

    /// Sets the selection at `level`.
    ///
    /// Returns `Ok(false)` without side effects if `value` is already
    /// selected there. Otherwise clears every deeper level and starts the
    /// fetch for the next one.
    pub fn set_level(&mut self, level: usize, value: FacetValue) -> Result<bool, NavigatorError> {
        if level >= self.levels.len() {
            return Err(NavigatorError::LevelOutOfRange {
                level,
                levels: self.levels.len(),
            });
        }
        if level > CLASS_LEVEL && self.levels[level - 1].selected.is_none() {
            return Err(NavigatorError::PrefixNotSet { level });
        }
        let kind = FacetLevel::from_index(level);
        if !kind.accepts(&value) {
            return Err(NavigatorError::KindMismatch {
                level,
                expected: kind.kind(),
                found: value.kind(),
            });
        }
        if self.levels[level].selected.as_ref() == Some(&value) {
            return Ok(false);
        }

        log::debug!("Level {} set to '{}'", level, value.label());
        self.levels[level].selected = Some(value.clone());
        self.invalidate_from(level);

        match value {
            FacetValue::Class(class) => {
                let names = class.ebv_names.into_iter().map(FacetValue::Name).collect();
                self.levels[NAME_LEVEL].set_options(names);
            }
            FacetValue::Name(name) => {
                self.levels[DATASET_LEVEL].status = LevelStatus::Loading;
                let future = self.client.datasets(&name).map(Completion::Datasets);
                self.issue(FetchTarget::Level(DATASET_LEVEL), future.boxed_local());
            }
            FacetValue::Dataset(dataset) => {
                self.path_status = LevelStatus::Loading;
                let future = self
                    .client
                    .subgroups(&dataset.dataset_path)
                    .map(Completion::Subgroups);
                self.issue(FetchTarget::Subgroups, future.boxed_local());
            }
            FacetValue::Subgroup(_) => {
                if level + 1 < self.levels.len() {
                    self.fetch_subgroup_values(level + 1);
                } else {
                    self.fetch_loading_info();
                }
            }
        }
        Ok(true)
    }

    /// Sets the filter of `level`. An empty filter shows all options.
    pub fn filter_options(&mut self, level: usize, text: &str) -> Result<(), NavigatorError> {
        let levels = self.levels.len();
        let state = self
            .levels
            .get_mut(level)
            .ok_or(NavigatorError::LevelOutOfRange { level, levels })?;
        state.filter = text.to_string();
        Ok(())
    }

    /// Clears every level below `level` and all derived state, and drops
    /// the fetches that would fill them.
    pub fn invalidate_from(&mut self, level: usize) {
        self.generation += 1;
        let generation = self.generation;

        let pending = std::mem::take(&mut self.pending);
        let before = pending.len();
        for fetch in pending {
            if matches!(fetch.target, FetchTarget::Level(target) if target <= level) {
                self.pending.push(fetch);
            }
        }
        let dropped = before - self.pending.len();
        if dropped > 0 {
            log::debug!(
                "Cancelled {} in-flight fetch(es) below level {}",
                dropped,
                level
            );
        }

        if level <= DATASET_LEVEL {
            self.levels.truncate(FIRST_SUBGROUP_LEVEL);
            self.subgroups = None;
        }
        for state in self.levels.iter_mut().skip(level + 1) {
            state.reset(generation);
        }

        self.info = None;
        if self.resolved.take().is_some() {
            log::debug!("Dropped resolved raster source");
        }
        self.path_status = match self.subgroups {
            Some(_) => LevelStatus::Loaded,
            None => LevelStatus::Idle,
        };
        self.events.push_back(NavigatorEvent::Invalidated { level });
    }

    /// Opens a dataset by catalog id, replacing the current path once all
    /// of its metadata has arrived.
    pub fn open_dataset(&mut self, id: &str) {
        log::info!("Loading dataset {} by id", id);
        self.invalidate_from(CLASS_LEVEL);
        self.levels[CLASS_LEVEL].selected = None;
        self.path_status = LevelStatus::Loading;

        let future = load_path(self.client.clone(), id.to_string())
            .map(|result| Completion::Path(Box::new(result)));
        self.issue(FetchTarget::Path, future.boxed_local());
    }

    // ========================================================================
    // Completions
    // ========================================================================

    /// Applies every fetch that has already finished. Never blocks.
    ///
    /// Returns the number of completions handled, stale ones included.
    pub fn poll_completions(&mut self) -> usize {
        let mut handled = 0;
        while let Some(Some(finished)) = self.pending.next().now_or_never() {
            self.apply(finished);
            handled += 1;
        }
        handled
    }

    /// Waits until no fetch is in flight, applying completions as they
    /// arrive.
    pub async fn settle(&mut self) {
        while let Some(finished) = self.pending.next().await {
            self.apply(finished);
        }
    }

    fn issue(&mut self, target: FetchTarget, future: LocalBoxFuture<'static, Completion>) {
        let stamp = match target {
            FetchTarget::Level(level) => self.levels[level].epoch,
            _ => self.generation,
        };
        self.pending.push(PendingFetch {
            target,
            stamp,
            future,
        });
    }

    fn is_current(&self, target: FetchTarget, stamp: u64) -> bool {
        match target {
            FetchTarget::Level(level) => self.levels.get(level).map(|l| l.epoch) == Some(stamp),
            _ => self.generation == stamp,
        }
    }

    fn apply(&mut self, finished: Finished) {
        let Finished {
            target,
            stamp,
            completion,
        } = finished;

        if !self.is_current(target, stamp) {
            log::debug!(
                "Discarding stale {:?} response (generation {})",
                target,
                stamp
            );
            return;
        }

        match (target, completion) {
            (FetchTarget::Level(level), Completion::Classes(result)) => {
                self.fill_level(level, result, FacetValue::Class)
            }
            (FetchTarget::Level(level), Completion::Datasets(result)) => {
                self.fill_level(level, result, FacetValue::Dataset)
            }
            (FetchTarget::Level(level), Completion::SubgroupValues(result)) => {
                self.fill_level(level, result, FacetValue::Subgroup)
            }
            (FetchTarget::Subgroups, Completion::Subgroups(result)) => match result {
                Ok(subgroups) => self.install_subgroups(subgroups),
                Err(error) => self.fail_path(error.into()),
            },
            (FetchTarget::Info, Completion::Info(result)) => match result {
                Ok(info) => self.resolve(info),
                Err(error) => self.fail_path(error.into()),
            },
            (FetchTarget::Path, Completion::Path(result)) => match *result {
                Ok(path) => self.install_path(path),
                Err(error) => self.fail_path(error),
            },
            (target, _) => log::warn!("Unexpected completion for {:?}", target),
        }
    }

    fn fill_level<T>(
        &mut self,
        level: usize,
        result: Result<Vec<T>, CatalogError>,
        wrap: fn(T) -> FacetValue,
    ) {
        match result {
            Ok(items) => {
                log::debug!("Level {} has {} option(s)", level, items.len());
                self.levels[level].set_options(items.into_iter().map(wrap).collect());
            }
            Err(error) => {
                log::warn!("Loading options of level {} failed: {}", level, error);
                let error = NavigatorError::from(error);
                self.levels[level].status = LevelStatus::Failed(error.clone());
                self.events.push_back(NavigatorEvent::Failed(error));
            }
        }
    }

    fn fail_path(&mut self, error: NavigatorError) {
        log::warn!("Resolving the selected path failed: {}", error);
        self.path_status = LevelStatus::Failed(error.clone());
        self.events.push_back(NavigatorEvent::Failed(error));
    }

    fn install_subgroups(&mut self, subgroups: Vec<EbvSubgroup>) {
        log::debug!("Dataset has {} subgroup(s)", subgroups.len());
        self.levels.truncate(FIRST_SUBGROUP_LEVEL);
        for subgroup in &subgroups {
            self.levels
                .push(LevelState::new(subgroup.name.clone(), self.generation));
        }
        let empty = subgroups.is_empty();
        self.subgroups = Some(subgroups);

        if empty {
            self.fetch_loading_info();
        } else {
            self.path_status = LevelStatus::Loaded;
            self.fetch_subgroup_values(FIRST_SUBGROUP_LEVEL);
        }
    }

    /// Requests the options of subgroup `level`, keyed by the values
    /// selected above it.
    fn fetch_subgroup_values(&mut self, level: usize) {
        let Some(dataset) = self.selected_dataset() else {
            return;
        };
        let subgroups = self.subgroups.as_deref().unwrap_or_default();
        let Some(subgroup) = subgroups.get(level - FIRST_SUBGROUP_LEVEL) else {
            return;
        };
        let group_path = join_path(self.selected_values().iter().map(|v| v.name.as_str()));

        let future = self
            .client
            .subgroup_values(&dataset.dataset_path, &subgroup.name, &group_path)
            .map(Completion::SubgroupValues);
        self.levels[level].status = LevelStatus::Loading;
        self.issue(FetchTarget::Level(level), future.boxed_local());
    }

    fn fetch_loading_info(&mut self) {
        let Some(dataset) = self.selected_dataset() else {
            return;
        };
        let entity_path = join_path(self.selected_values().iter().map(|v| v.name.as_str()));

        let future = self
            .client
            .data_loading_info(&dataset.dataset_path, &entity_path)
            .map(Completion::Info);
        self.path_status = LevelStatus::Loading;
        self.issue(FetchTarget::Info, future.boxed_local());
    }

    /// Selected subgroup values, in level order, up to the first gap.
    fn selected_values(&self) -> Vec<&EbvSubgroupValue> {
        self.levels
            .iter()
            .skip(FIRST_SUBGROUP_LEVEL)
            .map_while(|l| match &l.selected {
                Some(FacetValue::Subgroup(value)) => Some(value),
                _ => None,
            })
            .collect()
    }

    fn layer_name(&self) -> &str {
        match self.selected(NAME_LEVEL) {
            Some(FacetValue::Name(name)) => name,
            _ => "",
        }
    }

    fn resolve(&mut self, info: DataLoadingInfo) {
        let Some(dataset) = self.selected_dataset() else {
            return;
        };
        let subgroups = self.subgroups.as_deref().unwrap_or_default();
        let values: Vec<EbvSubgroupValue> = self.selected_values().into_iter().cloned().collect();

        match self
            .builder
            .build(dataset, self.layer_name(), subgroups, &values, &info)
        {
            Ok(descriptor) => {
                log::info!(
                    "Resolved {} with {} time step(s)",
                    descriptor.file_path,
                    descriptor.time_steps.len()
                );
                let descriptor = Rc::new(descriptor);
                self.info = Some(info);
                self.path_status = LevelStatus::Loaded;
                self.resolved = Some(descriptor.clone());
                self.events.push_back(NavigatorEvent::Resolved(descriptor));
            }
            Err(error) => self.fail_path(error.into()),
        }
    }

    fn install_path(&mut self, path: LoadedPath) {
        let LoadedPath {
            classes,
            class,
            ebv_name,
            datasets,
            dataset,
            subgroups,
            value_options,
            values,
            info,
        } = path;
        let generation = self.generation;
        let names = class.ebv_names.clone();

        let class_options = classes.into_iter().map(FacetValue::Class).collect();
        self.levels[CLASS_LEVEL].set_options(class_options);
        self.levels[CLASS_LEVEL].selected = Some(FacetValue::Class(class));
        let name_options = names.into_iter().map(FacetValue::Name).collect();
        self.levels[NAME_LEVEL].set_options(name_options);
        self.levels[NAME_LEVEL].selected = Some(FacetValue::Name(ebv_name));
        let dataset_options = datasets.into_iter().map(FacetValue::Dataset).collect();
        self.levels[DATASET_LEVEL].set_options(dataset_options);
        self.levels[DATASET_LEVEL].selected = Some(FacetValue::Dataset(dataset));

        // Subgroup and value lists have equal length.
        self.levels.truncate(FIRST_SUBGROUP_LEVEL);
        for ((subgroup, options), value) in subgroups.iter().zip(value_options).zip(values) {
            let mut state = LevelState::new(subgroup.name.clone(), generation);
            let options = options.into_iter().map(FacetValue::Subgroup).collect();
            state.set_options(options);
            state.selected = Some(FacetValue::Subgroup(value));
            self.levels.push(state);
        }
        self.subgroups = Some(subgroups);

        self.resolve(info);
    }
}
