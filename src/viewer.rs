//!
//! Viewer application state
//! ------------------------
//! Owns the resolved configuration, the table loader and the result cache.
//! Hosts (HTTP server, CLI) hold one `ViewerState` for the process and call
//! `page` once per render: the table comes from the cache (loaded and
//! normalized on first use), everything derived from it is recomputed.

use std::sync::Arc;

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::info;

use crate::cache::{ResultCache, TableKey};
use crate::chart::{build_chart, ChartOutcome};
use crate::config::ViewerConfig;
use crate::error::AppResult;
use crate::frame::{dataframe_to_json, TableView};
use crate::normalize::normalize;
use crate::selection::{default_selection, entity_universe, Selection};
use crate::storage::{DuckDbLoader, TableLoader};

/// Everything a host needs for one render.
#[derive(Debug, Clone)]
pub struct Page {
    pub table: Arc<DataFrame>,
    pub entities: Entities,
    pub chart: ChartOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entities {
    pub universe: Vec<String>,
    pub default_selection: Selection,
}

pub struct ViewerState {
    config: ViewerConfig,
    loader: Box<dyn TableLoader>,
    cache: ResultCache,
}

impl ViewerState {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_loader(config, Box::new(DuckDbLoader))
    }

    pub fn with_loader(config: ViewerConfig, loader: Box<dyn TableLoader>) -> Self {
        Self { config, loader, cache: ResultCache::new() }
    }

    pub fn config(&self) -> &ViewerConfig { &self.config }
    pub fn cache(&self) -> &ResultCache { &self.cache }

    pub fn key(&self) -> TableKey {
        TableKey::new(self.config.store_path.clone(), self.config.table_name.clone())
    }

    /// The normalized table for the configured key, loading it on first use.
    pub fn table(&self) -> AppResult<Arc<DataFrame>> {
        let key = self.key();
        self.cache.get_or_load(&key, || {
            let raw = self.loader.load(&key)?;
            normalize(&raw, &self.config.columns)
        })
    }

    pub fn entities(&self) -> AppResult<Entities> {
        let table = self.table()?;
        entities_for(&table, &self.config)
    }

    /// Chart for `selection`, or for the default selection when `None`.
    pub fn chart(&self, selection: Option<&Selection>) -> AppResult<ChartOutcome> {
        Ok(self.page(selection.cloned())?.chart)
    }

    pub fn page(&self, selection: Option<Selection>) -> AppResult<Page> {
        let table = self.table()?;
        let entities = entities_for(&table, &self.config)?;
        let selection = selection.unwrap_or_else(|| entities.default_selection.clone());
        let chart = build_chart(&table, &selection, &self.config.columns)?;
        Ok(Page { table, entities, chart })
    }

    pub fn table_view(&self) -> AppResult<TableView> {
        let table = self.table()?;
        Ok(TableView::from_frame(&table))
    }

    pub fn table_json(&self) -> AppResult<serde_json::Value> {
        let table = self.table()?;
        Ok(dataframe_to_json(&table))
    }

    /// Explicit invalidation hook: the next render reloads from the store.
    pub fn invalidate(&self) -> bool {
        let key = self.key();
        let removed = self.cache.invalidate(&key);
        info!(target: "token_viewer::viewer", "cache invalidated: key='{}' removed={}", key, removed);
        removed
    }
}

fn entities_for(table: &DataFrame, config: &ViewerConfig) -> AppResult<Entities> {
    let universe = entity_universe(table, &config.columns.entity)?;
    let default_selection = default_selection(&universe, config.default_selection_size);
    Ok(Entities { universe, default_selection })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use polars::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        frame: Option<DataFrame>,
    }

    impl TableLoader for CountingLoader {
        fn load(&self, _key: &TableKey) -> AppResult<DataFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.frame.clone().ok_or_else(|| AppError::data_source("store_not_found", "no store"))
        }
    }

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("name".into(), &["f", "e", "d", "c", "b", "a", "a"]).into_column(),
            Series::new("timestamp".into(), &["2024-01-01"; 7]).into_column(),
            Series::new("grad_pert".into(), &[1i64, 2, 3, 4, 5, 6, 7]).into_column(),
        ])
        .unwrap()
    }

    fn state(frame: Option<DataFrame>) -> (ViewerState, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader { calls: calls.clone(), frame };
        (ViewerState::with_loader(ViewerConfig::default(), Box::new(loader)), calls)
    }

    #[test]
    fn repeated_renders_query_once() {
        let (st, calls) = state(Some(frame()));
        st.page(None).unwrap();
        st.page(Some(Selection::from_names(["a"]))).unwrap();
        st.entities().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cached_table_is_normalized() {
        let (st, _) = state(Some(frame()));
        let t = st.table().unwrap();
        assert!(crate::normalize::is_datetime(t.column("timestamp").unwrap().dtype()));
        assert_eq!(t.column("grad_pert").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn default_page_uses_first_five_names() {
        let (st, _) = state(Some(frame()));
        let page = st.page(None).unwrap();
        assert_eq!(page.entities.universe, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(page.entities.default_selection, Selection::from_names(["a", "b", "c", "d", "e"]));
        let charted: Vec<&str> = page.chart.series().iter().map(|s| s.entity.as_str()).collect();
        assert_eq!(charted, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn invalidate_triggers_a_fresh_load() {
        let (st, calls) = state(Some(frame()));
        st.table().unwrap();
        assert!(st.invalidate());
        st.table().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn load_failure_surfaces_and_is_retried_next_render() {
        let (st, calls) = state(None);
        assert!(st.page(None).unwrap_err().is_data_source());
        assert!(st.page(None).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
