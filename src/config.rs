use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Configuration supplied when opening a [`crate::Graph`].
///
/// Loadable from TOML; every field has a default so partial files work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Prefix of every backing table name.
    pub graph_name: String,
    /// Create missing tables on open.
    pub create: bool,
    /// Drop and recreate all tables on open.
    pub clear: bool,
    /// Skip the lookups that keep element ids unique. Allows duplicate ids in
    /// exchange for fewer store reads.
    pub skip_existence_checks: bool,
    /// Treat every property key as indexed.
    pub auto_index: bool,
    /// Disable named indexes entirely.
    pub indexable_graph_disabled: bool,
    /// Require both endpoints to be live before an edge is written.
    pub check_edge_endpoints: bool,
    /// Property keys loaded together with the existence check.
    pub preload_properties: Vec<String>,
    /// Parallelism hint passed to batch scans.
    pub query_threads: usize,
    /// Buffered mutation count that triggers an automatic flush.
    pub max_buffered_mutations: usize,
    /// Vertex cache capacity. `None` is unbounded, `Some(0)` disables it.
    pub vertex_cache_capacity: Option<usize>,
    /// Edge cache capacity. `None` is unbounded, `Some(0)` disables it.
    pub edge_cache_capacity: Option<usize>,
    /// Row split points applied to tables created on open.
    pub splits: Vec<String>,
    /// Visibility labels passed to every scan.
    pub authorizations: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_name: "graph".into(),
            create: true,
            clear: false,
            skip_existence_checks: false,
            auto_index: false,
            indexable_graph_disabled: false,
            check_edge_endpoints: false,
            preload_properties: Vec::new(),
            query_threads: 3,
            max_buffered_mutations: 10_000,
            vertex_cache_capacity: None,
            edge_cache_capacity: None,
            splits: Vec::new(),
            authorizations: Vec::new(),
        }
    }
}

impl GraphConfig {
    /// Creates a configuration with defaults for the given graph name.
    pub fn new(graph_name: impl Into<String>) -> Self {
        Self {
            graph_name: graph_name.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| GraphError::Config(err.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| GraphError::Config(format!("read {}: {err}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Enables or disables table creation on open.
    pub fn create(mut self, enabled: bool) -> Self {
        self.create = enabled;
        self
    }

    /// Enables or disables clearing tables on open.
    pub fn clear(mut self, enabled: bool) -> Self {
        self.clear = enabled;
        self
    }

    /// Enables or disables existence checks on create and lookup.
    pub fn skip_existence_checks(mut self, skip: bool) -> Self {
        self.skip_existence_checks = skip;
        self
    }

    /// Enables or disables indexing of every property key.
    pub fn auto_index(mut self, enabled: bool) -> Self {
        self.auto_index = enabled;
        self
    }

    /// Enables or disables named indexes.
    pub fn indexable_graph_disabled(mut self, disabled: bool) -> Self {
        self.indexable_graph_disabled = disabled;
        self
    }

    /// Enables or disables endpoint checks when adding edges.
    pub fn check_edge_endpoints(mut self, enabled: bool) -> Self {
        self.check_edge_endpoints = enabled;
        self
    }

    /// Sets the properties loaded eagerly by element lookups.
    pub fn preload_properties<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload_properties = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the batch scan parallelism hint.
    pub fn query_threads(mut self, threads: usize) -> Self {
        self.query_threads = threads;
        self
    }

    /// Sets the automatic flush threshold.
    pub fn max_buffered_mutations(mut self, count: usize) -> Self {
        self.max_buffered_mutations = count;
        self
    }

    /// Sets the vertex cache capacity.
    pub fn vertex_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.vertex_cache_capacity = capacity;
        self
    }

    /// Sets the edge cache capacity.
    pub fn edge_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.edge_cache_capacity = capacity;
        self
    }

    /// Sets the split points for newly created tables.
    pub fn splits<I, S>(mut self, splits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.splits = splits.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the scan authorizations.
    pub fn authorizations<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorizations = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Checks the configuration before any table is touched.
    pub fn validate(&self) -> Result<()> {
        validate_table_component("graph name", &self.graph_name).map_err(GraphError::Config)?;
        if self.query_threads == 0 {
            return Err(GraphError::Config("query_threads must be positive".into()));
        }
        if self.max_buffered_mutations == 0 {
            return Err(GraphError::Config(
                "max_buffered_mutations must be positive".into(),
            ));
        }
        if let Some(key) = self.preload_properties.iter().find(|k| k.is_empty()) {
            return Err(GraphError::Config(format!(
                "preloaded property key {key:?} is empty"
            )));
        }
        Ok(())
    }

    /// Table holding vertex rows.
    pub fn vertex_table(&self) -> String {
        format!("{}_vertex", self.graph_name)
    }

    /// Table holding edge rows.
    pub fn edge_table(&self) -> String {
        format!("{}_edge", self.graph_name)
    }

    /// Key-index table for vertices.
    pub fn vertex_key_index_table(&self) -> String {
        format!("{}_vertex_key_index", self.graph_name)
    }

    /// Key-index table for edges.
    pub fn edge_key_index_table(&self) -> String {
        format!("{}_edge_key_index", self.graph_name)
    }

    /// Registry of named indexes.
    pub fn index_names_table(&self) -> String {
        format!("{}_index_names", self.graph_name)
    }

    /// Registry of automatically indexed keys.
    pub fn indexed_keys_table(&self) -> String {
        format!("{}_indexed_keys", self.graph_name)
    }

    /// Backing table of a named index.
    pub fn named_index_table(&self, index_name: &str) -> String {
        format!("{}_index_{}", self.graph_name, index_name)
    }

    /// Every fixed table of the graph, excluding named index tables.
    pub fn table_names(&self) -> Vec<String> {
        vec![
            self.vertex_table(),
            self.edge_table(),
            self.vertex_key_index_table(),
            self.edge_key_index_table(),
            self.index_names_table(),
            self.indexed_keys_table(),
        ]
    }

    pub(crate) fn split_rows(&self) -> Vec<Vec<u8>> {
        self.splits.iter().map(|s| s.as_bytes().to_vec()).collect()
    }
}

/// Table names only carry ASCII letters, digits, and underscores.
pub(crate) fn validate_table_component(what: &str, name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} can not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!(
            "{what} {name:?} may only contain ASCII letters, digits, and underscores"
        ));
    }
    Ok(())
}
