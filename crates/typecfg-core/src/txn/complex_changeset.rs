//! Changes to the properties of one complex instance within one transaction

use std::collections::BTreeMap;
use std::sync::Arc;

use super::change::Replace;
use super::transaction::Transaction;
use crate::errors::{Result, TypeCfgError};
use crate::model::{
    values_equal, ComplexData, ComplexType, InstanceId, InstanceStore, RefSlot, Slot, Value,
    ValueState,
};

/// What a changeset holds for one property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEntry {
    /// The slot gets a new value and/or state
    Replace(Replace),
    /// The slot keeps its value; the referenced instance has its own changeset
    Nested(InstanceId),
}

#[derive(Debug, Clone)]
pub struct ComplexChangeset {
    owner: InstanceId,
    type_: Arc<ComplexType>,
    /// Keyed by property index, so iteration follows declaration order
    entries: BTreeMap<usize, PropertyEntry>,
}

impl ComplexChangeset {
    pub(crate) fn new(owner: InstanceId, type_: Arc<ComplexType>) -> Self {
        Self {
            owner,
            type_,
            entries: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    pub fn complex_type(&self) -> &Arc<ComplexType> {
        &self.type_
    }

    pub fn entry(&self, index: usize) -> Option<&PropertyEntry> {
        self.entries.get(&index)
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &PropertyEntry)> {
        self.entries.iter().map(|(i, e)| (*i, e))
    }

    pub fn replace(&self, index: usize) -> Option<&Replace> {
        match self.entries.get(&index) {
            Some(PropertyEntry::Replace(r)) => Some(r),
            _ => None,
        }
    }

    pub(crate) fn replace_mut(&mut self, index: usize) -> Option<&mut Replace> {
        match self.entries.get_mut(&index) {
            Some(PropertyEntry::Replace(r)) => Some(r),
            _ => None,
        }
    }

    pub(crate) fn insert_replace(&mut self, index: usize, replace: Replace) {
        self.entries.insert(index, PropertyEntry::Replace(replace));
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<PropertyEntry> {
        self.entries.remove(&index)
    }

    /// Install a nested entry; never overwrites a `Replace`
    pub(crate) fn set_nested(&mut self, index: usize, child: InstanceId) -> bool {
        match self.entries.get(&index) {
            Some(PropertyEntry::Replace(_)) => false,
            _ => {
                self.entries.insert(index, PropertyEntry::Nested(child));
                true
            }
        }
    }

    /// Slot data after this changeset is applied over `base`
    pub(crate) fn stage<F>(&self, base: &ComplexData, nested_has_changes: F) -> ComplexData
    where
        F: Fn(InstanceId) -> bool,
    {
        let mut staged = base.clone();
        for (&index, entry) in &self.entries {
            match entry {
                PropertyEntry::Replace(r) => {
                    staged.slots[index] = Slot {
                        value: r.value.clone(),
                        state: r.state,
                    };
                }
                // The child instance is staged through its own changeset.
                PropertyEntry::Nested(child) => {
                    if nested_has_changes(*child) {
                        staged.slots[index].state = ValueState::Specified;
                    }
                }
            }
        }
        staged
    }
}

/// Read access to a complex changeset in the context of its transaction
pub struct ComplexChangesetView<'a> {
    pub(crate) changeset: &'a ComplexChangeset,
    pub(crate) txn: &'a Transaction,
    pub(crate) store: &'a InstanceStore,
}

impl<'a> ComplexChangesetView<'a> {
    pub fn owner(&self) -> InstanceId {
        self.changeset.owner
    }

    pub fn changeset(&self) -> &'a ComplexChangeset {
        self.changeset
    }

    /// The change recorded for `name`; `None` when unchanged
    ///
    /// # Errors
    ///
    /// `ArgumentInvalid` if the owner's type has no such property.
    pub fn get_change(&self, name: &str) -> Result<Option<&'a PropertyEntry>> {
        let index = self.changeset.type_.require_property(name)?;
        Ok(self
            .changeset
            .entries
            .get(&index)
            .filter(|e| self.entry_has_changes(e)))
    }

    pub fn has_change(&self, name: &str) -> Result<bool> {
        Ok(self.get_change(name)?.is_some())
    }

    /// The committed value of `name`
    pub fn get_old(&self, name: &str) -> Result<Option<Value>> {
        let index = self.changeset.type_.require_property(name)?;
        Ok(self.store.complex(self.changeset.owner)?.slots[index]
            .value
            .clone())
    }

    /// Names of changed properties in declaration order
    pub fn property_names(&self) -> Vec<&'a str> {
        let props = &self.changeset.type_.properties;
        self.changeset
            .entries
            .iter()
            .filter(|(_, e)| self.entry_has_changes(e))
            .map(|(i, _)| props[*i].name.as_str())
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.txn.has_changes(self.changeset.owner)
    }

    fn entry_has_changes(&self, entry: &PropertyEntry) -> bool {
        match entry {
            PropertyEntry::Replace(_) => true,
            PropertyEntry::Nested(child) => self.txn.has_changes(*child),
        }
    }
}

/// Set the value of one property of `owner`
///
/// `None` (or a null scalar) resets the property to its default.
pub(crate) fn set_element(
    store: &InstanceStore,
    txn: &mut Transaction,
    owner: InstanceId,
    index: usize,
    spec: Option<Value>,
    force_replace: bool,
) -> Result<()> {
    let data = store.complex(owner)?;
    let ty = Arc::clone(&data.type_);
    let property = &ty.properties[index];

    let initial = data.slots[index].clone();
    let ambient = txn.ambient_slot(store, owner, index)?;

    let (new_value, new_state) = match spec.filter(|v| !v.is_null()) {
        None => (property.default_value(), ValueState::Default),
        Some(v) => (property.value_type.cast(v, store)?, ValueState::Specified),
    };

    if !force_replace && ambient.same_as(new_state, new_value.as_ref()) {
        return Ok(());
    }

    if property.read_only {
        return Err(TypeCfgError::ReadOnlyProperty {
            type_id: ty.id.clone(),
            property: property.name.clone(),
        });
    }

    let slot = RefSlot::Property(index);

    let existing = txn
        .complex_changeset(owner)
        .and_then(|c| c.replace(index))
        .cloned();

    if let Some(existing) = existing {
        if initial.same_as(new_state, new_value.as_ref()) {
            txn.complex_changeset_mut(owner)?.remove(index);
            txn.adjust_ref_value(owner, slot, existing.value.as_ref(), -1);
            txn.adjust_ref_value(owner, slot, initial.value.as_ref(), 1);
            relink_nested(txn, owner, index, initial.value.as_ref())?;
            return Ok(());
        }

        let replace = txn
            .complex_changeset_mut(owner)?
            .replace_mut(index)
            .ok_or_else(|| TypeCfgError::internal("replace entry vanished"))?;
        replace.state = new_state;
        if values_equal(replace.value.as_ref(), new_value.as_ref()) {
            return Ok(());
        }
        let old = std::mem::replace(&mut replace.value, new_value.clone());
        txn.adjust_ref_value(owner, slot, old.as_ref(), -1);
        txn.adjust_ref_value(owner, slot, new_value.as_ref(), 1);
        return Ok(());
    }

    txn.ensure_changeset(store, owner)?;
    txn.complex_changeset_mut(owner)?.insert_replace(
        index,
        Replace {
            value: new_value.clone(),
            state: new_state,
        },
    );
    txn.adjust_ref_value(owner, slot, initial.value.as_ref(), -1);
    txn.adjust_ref_value(owner, slot, new_value.as_ref(), 1);
    Ok(())
}

/// Restore the nested link of a slot whose committed child is being edited
fn relink_nested(
    txn: &mut Transaction,
    owner: InstanceId,
    index: usize,
    value: Option<&Value>,
) -> Result<()> {
    if let Some(child) = value.and_then(Value::instance_id) {
        if txn.changeset(child).is_some() {
            txn.complex_changeset_mut(owner)?.set_nested(index, child);
        }
    }
    Ok(())
}

/// Copy the specified, writable properties of `source` onto `target`
pub(crate) fn copy_properties(
    store: &InstanceStore,
    txn: &mut Transaction,
    target: InstanceId,
    source: InstanceId,
) -> Result<()> {
    let ty = Arc::clone(&store.complex(target)?.type_);
    for (index, property) in ty.properties.iter().enumerate() {
        if property.read_only {
            continue;
        }
        let slot = txn.ambient_slot(store, source, index)?;
        if slot.state == ValueState::Specified {
            set_element(store, txn, target, index, slot.value, false)?;
        }
    }
    Ok(())
}

/// Drop primitive changes, recursively clearing nested changesets
pub(crate) fn clear_changes(
    store: &InstanceStore,
    txn: &mut Transaction,
    owner: InstanceId,
) -> Result<Vec<InstanceId>> {
    let entries: Vec<(usize, PropertyEntry)> = txn
        .complex_changeset(owner)
        .map(|c| c.entries().map(|(i, e)| (i, e.clone())).collect())
        .unwrap_or_default();
    let committed = store.complex(owner)?;

    let mut nested = Vec::new();
    for (index, entry) in entries {
        match entry {
            PropertyEntry::Nested(child) => nested.push(child),
            PropertyEntry::Replace(replace) => {
                let slot = RefSlot::Property(index);
                let initial = committed.slots[index].value.as_ref();
                txn.complex_changeset_mut(owner)?.remove(index);
                txn.adjust_ref_value(owner, slot, replace.value.as_ref(), -1);
                txn.adjust_ref_value(owner, slot, initial, 1);
                relink_nested(txn, owner, index, initial)?;
            }
        }
    }
    Ok(nested)
}
