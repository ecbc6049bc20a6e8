use super::BaseTable;
use crate::encoding::{self, EMPTY};
use crate::error::Result;
use crate::model::ElementKind;
use crate::store::{Mutation, RowRange, ScanSpec};

/// Rows keyed by a name with one family per element kind. Presence of the
/// (row, kind) pair is the whole record.
#[derive(Clone)]
struct KindRegistry {
    base: BaseTable,
}

impl KindRegistry {
    fn add(&self, name: &str, kind: ElementKind) -> Result<()> {
        let mut mutation = Mutation::new(name);
        mutation.put(kind.tag().as_bytes(), EMPTY, EMPTY);
        self.base.add_mutation(mutation)
    }

    fn remove(&self, name: &str, kind: ElementKind) -> Result<()> {
        let mut mutation = Mutation::new(name);
        mutation.delete(kind.tag().as_bytes(), EMPTY);
        self.base.add_mutation(mutation)
    }

    fn kinds_of(&self, name: &str) -> Result<Vec<ElementKind>> {
        Ok(self
            .base
            .scan(ScanSpec::range(RowRange::exact(name)))?
            .iter()
            .filter_map(|cell| ElementKind::from_tag(&cell.key.family))
            .collect())
    }

    fn entries(&self) -> Result<Vec<(String, ElementKind)>> {
        let mut out = Vec::new();
        for cell in self.base.scan(ScanSpec::range(RowRange::All))? {
            if let Some(kind) = ElementKind::from_tag(&cell.key.family) {
                out.push((encoding::decode_id(&cell.key.row)?, kind));
            }
        }
        Ok(out)
    }
}

/// Keys under automatic key indexing, per element kind.
#[derive(Clone)]
pub(crate) struct IndexedKeysTable {
    registry: KindRegistry,
}

impl IndexedKeysTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self {
            registry: KindRegistry { base },
        }
    }

    pub(crate) fn add(&self, key: &str, kind: ElementKind) -> Result<()> {
        self.registry.add(key, kind)
    }

    pub(crate) fn remove(&self, key: &str, kind: ElementKind) -> Result<()> {
        self.registry.remove(key, kind)
    }

    pub(crate) fn contains(&self, key: &str, kind: ElementKind) -> Result<bool> {
        Ok(self.registry.kinds_of(key)?.contains(&kind))
    }

    pub(crate) fn keys(&self, kind: ElementKind) -> Result<Vec<String>> {
        Ok(self
            .registry
            .entries()?
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(key, _)| key)
            .collect())
    }
}

/// Registered named indexes and the element kind each one holds.
#[derive(Clone)]
pub(crate) struct IndexNamesTable {
    registry: KindRegistry,
}

impl IndexNamesTable {
    pub(crate) fn new(base: BaseTable) -> Self {
        Self {
            registry: KindRegistry { base },
        }
    }

    pub(crate) fn register(&self, name: &str, kind: ElementKind) -> Result<()> {
        self.registry.add(name, kind)
    }

    pub(crate) fn unregister(&self, name: &str, kind: ElementKind) -> Result<()> {
        self.registry.remove(name, kind)
    }

    /// Kind the index was registered with, if any.
    pub(crate) fn kind_of(&self, name: &str) -> Result<Option<ElementKind>> {
        Ok(self.registry.kinds_of(name)?.into_iter().next())
    }

    pub(crate) fn all(&self) -> Result<Vec<(String, ElementKind)>> {
        self.registry.entries()
    }
}
