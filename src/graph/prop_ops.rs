use std::collections::BTreeSet;

use tracing::trace;

use super::Graph;
use crate::element::PropertyCache;
use crate::encoding::validate_property_key;
use crate::error::{GraphError, Result};
use crate::model::{ElementKind, PropertyValue};

impl Graph {
    /// Handle-cached value first, then a point read.
    pub(crate) fn element_property(
        &self,
        kind: ElementKind,
        id: &str,
        cached: &PropertyCache,
        key: &str,
    ) -> Result<Option<PropertyValue>> {
        validate_property_key(key)?;
        if let Some(value) = cached.get(key) {
            return Ok(Some(value));
        }
        self.element_table(kind).read_property(id, key)
    }

    /// Writes the property and, when `key` is indexed, swaps the old
    /// key-index entry for the new one. All three mutations are flushed
    /// together. Fails with [`GraphError::NotFound`] once the element is
    /// gone, so no property cell outlives the existence marker. With
    /// existence checks skipped that read is not made.
    pub(crate) fn set_element_property(
        &self,
        kind: ElementKind,
        id: &str,
        cached: &PropertyCache,
        key: &str,
        value: PropertyValue,
    ) -> Result<()> {
        validate_property_key(key)?;
        let table = self.element_table(kind);
        self.ensure_live(kind, id)?;
        if self.is_key_indexed(kind, key)? {
            let index = self.key_index(kind);
            if let Some(old) = table.read_property(id, key)? {
                index.remove_entry(key, &old, id)?;
            }
            index.put_entry(key, &value, id)?;
        }
        table.write_property(id, key, &value)?;
        self.inner.writer.checked_flush()?;
        trace!(%kind, id, key, "property set");
        cached.insert(key, value);
        Ok(())
    }

    /// Deletes the property and its key-index entry. Returns the value that
    /// was stored, if any. Fails with [`GraphError::NotFound`] once the
    /// element is gone.
    pub(crate) fn remove_element_property(
        &self,
        kind: ElementKind,
        id: &str,
        cached: &PropertyCache,
        key: &str,
    ) -> Result<Option<PropertyValue>> {
        validate_property_key(key)?;
        let table = self.element_table(kind);
        self.ensure_live(kind, id)?;
        cached.remove(key);
        let Some(old) = table.read_property(id, key)? else {
            return Ok(None);
        };
        table.clear_property(id, key)?;
        if self.is_key_indexed(kind, key)? {
            self.key_index(kind).remove_entry(key, &old, id)?;
        }
        self.inner.writer.checked_flush()?;
        trace!(%kind, id, key, "property removed");
        Ok(Some(old))
    }

    fn ensure_live(&self, kind: ElementKind, id: &str) -> Result<()> {
        if self.inner.config.skip_existence_checks || self.element_table(kind).exists(id)? {
            return Ok(());
        }
        Err(GraphError::not_found(kind, id))
    }

    pub(crate) fn element_property_keys(&self, kind: ElementKind, id: &str) -> Result<BTreeSet<String>> {
        self.element_table(kind).read_property_keys(id)
    }
}
