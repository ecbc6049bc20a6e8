use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use super::Graph;
use crate::config::validate_table_component;
use crate::element::Element;
use crate::encoding::validate_property_key;
use crate::error::{GraphError, Result};
use crate::model::{ElementKind, PropertyValue};
use crate::tables::KeyIndexTable;

/// Which property keys of one element kind carry key-index entries.
pub(crate) enum KeyIndexPolicy {
    All,
    Keys(FxHashSet<String>),
}

impl KeyIndexPolicy {
    pub(crate) fn covers(&self, key: &str) -> bool {
        match self {
            KeyIndexPolicy::All => true,
            KeyIndexPolicy::Keys(keys) => keys.contains(key),
        }
    }
}

impl Graph {
    pub(crate) fn key_index_policy(&self, kind: ElementKind) -> Result<KeyIndexPolicy> {
        if self.inner.config.auto_index {
            return Ok(KeyIndexPolicy::All);
        }
        Ok(KeyIndexPolicy::Keys(
            self.inner.indexed_keys.keys(kind)?.into_iter().collect(),
        ))
    }

    pub(crate) fn is_key_indexed(&self, kind: ElementKind, key: &str) -> Result<bool> {
        Ok(self.inner.config.auto_index || self.inner.indexed_keys.contains(key, kind)?)
    }

    /// Starts indexing `key` for `kind` and rebuilds its entries from a full
    /// scan of the element table.
    pub fn create_key_index(&self, key: &str, kind: ElementKind) -> Result<()> {
        validate_property_key(key)?;
        let inner = &self.inner;
        if inner.indexed_keys.contains(key, kind)? {
            return Err(GraphError::KeyIndexAlreadyExists {
                key: key.to_owned(),
                kind,
            });
        }
        inner.indexed_keys.add(key, kind)?;
        inner.writer.checked_flush()?;
        let index = self.key_index(kind);
        let entries = self.element_table(kind).scan_property_raw(key)?;
        let rebuilt = entries.len();
        for (id, raw) in entries {
            index.put_raw(raw, key, &id)?;
        }
        inner.writer.checked_flush()?;
        info!(key, %kind, entries = rebuilt, "key index created");
        Ok(())
    }

    /// Stops indexing `key` for `kind` and deletes its entries. Dropping a
    /// key that is not indexed is a no-op.
    pub fn drop_key_index(&self, key: &str, kind: ElementKind) -> Result<()> {
        validate_property_key(key)?;
        let inner = &self.inner;
        inner.indexed_keys.remove(key, kind)?;
        inner.writer.checked_flush()?;
        let removed = self.key_index(kind).drop_key(key)?;
        info!(key, %kind, removed, "key index dropped");
        Ok(())
    }

    /// Keys currently indexed for `kind`.
    pub fn indexed_keys(&self, kind: ElementKind) -> Result<Vec<String>> {
        self.inner.indexed_keys.keys(kind)
    }

    fn ensure_indexable(&self) -> Result<()> {
        if self.inner.config.indexable_graph_disabled {
            return Err(GraphError::Unsupported("named indexes are disabled"));
        }
        Ok(())
    }

    /// Registers a named index and allocates its backing table.
    pub fn create_index(&self, name: &str, kind: ElementKind) -> Result<Index> {
        self.ensure_indexable()?;
        validate_table_component("index name", name).map_err(GraphError::InvalidArgument)?;
        let inner = &self.inner;
        let table = inner.config.named_index_table(name);
        if inner.config.table_names().contains(&table) {
            return Err(GraphError::InvalidArgument(format!(
                "index name {name:?} collides with a graph table"
            )));
        }
        if inner.index_names.kind_of(name)?.is_some() {
            return Err(GraphError::IndexAlreadyExists(name.to_owned()));
        }
        if inner.store.table_exists(&table) {
            debug!(table = %table, "removing unregistered index table");
            inner.store.delete_table(&table)?;
        }
        inner.store.create_table(&table)?;
        inner.index_names.register(name, kind)?;
        inner.writer.checked_flush()?;
        info!(index = name, %kind, "named index created");
        Ok(Index::new(self.clone(), name, kind))
    }

    /// Looks a named index up. Fails with [`GraphError::IndexKindMismatch`]
    /// when it was registered for the other element kind.
    pub fn index(&self, name: &str, kind: ElementKind) -> Result<Option<Index>> {
        self.ensure_indexable()?;
        match self.inner.index_names.kind_of(name)? {
            None => Ok(None),
            Some(actual) if actual != kind => Err(GraphError::IndexKindMismatch {
                name: name.to_owned(),
                expected: kind,
                actual,
            }),
            Some(_) => Ok(Some(Index::new(self.clone(), name, kind))),
        }
    }

    /// Every registered named index.
    pub fn indices(&self) -> Result<Vec<Index>> {
        self.ensure_indexable()?;
        Ok(self
            .inner
            .index_names
            .all()?
            .into_iter()
            .map(|(name, kind)| Index::new(self.clone(), &name, kind))
            .collect())
    }

    /// Unregisters a named index and deletes its backing table.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.ensure_indexable()?;
        let inner = &self.inner;
        let kind = inner
            .index_names
            .kind_of(name)?
            .ok_or_else(|| GraphError::IndexNotFound(name.to_owned()))?;
        inner.index_names.unregister(name, kind)?;
        inner.writer.checked_flush()?;
        let table = inner.config.named_index_table(name);
        if inner.store.table_exists(&table) {
            inner.store.delete_table(&table)?;
        }
        info!(index = name, %kind, "named index dropped");
        Ok(())
    }

    /// Queues removal of `id` from every named index of its kind.
    pub(crate) fn remove_from_named_indexes(&self, kind: ElementKind, id: &str) -> Result<()> {
        if self.inner.config.indexable_graph_disabled {
            return Ok(());
        }
        for (name, index_kind) in self.inner.index_names.all()? {
            if index_kind == kind {
                let removed = self.named_table(&name).remove_element(id)?;
                if removed > 0 {
                    debug!(index = %name, element = id, removed, "named index entries queued for removal");
                }
            }
        }
        Ok(())
    }

    /// Resolves an index hit to a live element, checking the existence
    /// marker even when existence checks are skipped.
    fn resolve_live(&self, kind: ElementKind, id: &str) -> Result<Option<Element>> {
        Ok(match kind {
            ElementKind::Vertex => self.load_vertex(id)?.map(Element::Vertex),
            ElementKind::Edge => self.load_edge(id)?.map(Element::Edge),
        })
    }

    /// Index lookup with self-healing: entries whose element is gone are
    /// skipped and deleted.
    pub(crate) fn lookup_indexed(
        &self,
        kind: ElementKind,
        index: &KeyIndexTable,
        key: &str,
        value: &PropertyValue,
    ) -> Result<Vec<Element>> {
        let mut found = Vec::new();
        let mut stale = 0usize;
        for id in index.lookup(key, value)? {
            match self.resolve_live(kind, &id)? {
                Some(element) => found.push(element),
                None => {
                    warn!(index = index.name(), key, element = %id, "skipping stale index entry");
                    index.remove_entry(key, value, &id)?;
                    stale += 1;
                }
            }
        }
        if stale > 0 {
            self.inner.writer.checked_flush()?;
        }
        Ok(found)
    }
}

/// Handle on a named index.
///
/// Entries are added and removed explicitly; property writes never touch
/// a named index.
#[derive(Clone)]
pub struct Index {
    graph: Graph,
    name: String,
    kind: ElementKind,
    table: KeyIndexTable,
}

impl Index {
    fn new(graph: Graph, name: &str, kind: ElementKind) -> Self {
        let table = graph.named_table(name);
        Self {
            graph,
            name: name.to_owned(),
            kind,
            table,
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element kind the index holds.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    fn check(&self, key: &str, element: Option<&Element>) -> Result<()> {
        if key.is_empty() {
            return Err(GraphError::InvalidArgument("index key can not be empty".into()));
        }
        match element {
            Some(element) if element.kind() != self.kind => Err(GraphError::IndexKindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                actual: element.kind(),
            }),
            _ => Ok(()),
        }
    }

    /// Adds `element` under `key` = `value`.
    pub fn put(&self, key: &str, value: impl Into<PropertyValue>, element: &Element) -> Result<()> {
        self.check(key, Some(element))?;
        self.table.put_entry(key, &value.into(), element.id())?;
        self.graph.flush()
    }

    /// Live elements stored under `key` = `value`.
    pub fn get(&self, key: &str, value: impl Into<PropertyValue>) -> Result<Vec<Element>> {
        self.check(key, None)?;
        self.graph
            .lookup_indexed(self.kind, &self.table, key, &value.into())
    }

    /// Number of entries under `key` = `value`, stale ones included.
    pub fn count(&self, key: &str, value: impl Into<PropertyValue>) -> Result<usize> {
        self.check(key, None)?;
        Ok(self.table.lookup(key, &value.into())?.len())
    }

    /// Removes `element` from `key` = `value`.
    pub fn remove(&self, key: &str, value: impl Into<PropertyValue>, element: &Element) -> Result<()> {
        self.check(key, Some(element))?;
        self.table.remove_entry(key, &value.into(), element.id())?;
        self.graph.flush()
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
