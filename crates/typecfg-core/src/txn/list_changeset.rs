//! Changes to one list within one transaction
//!
//! A list changeset keeps the recorded op log and a projection of the
//! ambient elements, kept in step with the log as ops are recorded. At
//! commit the ops after the last `Clear` are replayed over the committed
//! elements (or over an empty list when a `Clear` was recorded).

use std::collections::{BTreeSet, HashMap, HashSet};

use super::change::{Comparer, ListChange};
use super::complex_changeset::copy_properties;
use super::transaction::Transaction;
use crate::errors::{Result, TypeCfgError};
use crate::model::{InstanceId, InstanceStore, ListData, RefEdge, RefSlot, Value};

/// A list element with its identity key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedElement {
    pub value: Value,
    pub key: String,
}

/// Options of [`Context::list_set`](super::Context::list_set)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListSetOptions {
    pub no_add: bool,
    pub no_remove: bool,
    pub no_update: bool,
    /// Insertion position of added elements; negative counts from the end.
    /// Defaults to the end of the list.
    pub index: Option<isize>,
}

#[derive(Debug, Clone)]
pub struct ListChangeset {
    owner: InstanceId,
    ops: Vec<ListChange>,
    projected: Vec<KeyedElement>,
    nested: BTreeSet<InstanceId>,
    ref_log: Vec<(RefEdge, i64)>,
}

impl ListChangeset {
    pub(crate) fn new(owner: InstanceId, committed: Vec<KeyedElement>) -> Self {
        Self {
            owner,
            ops: Vec::new(),
            projected: committed,
            nested: BTreeSet::new(),
            ref_log: Vec::new(),
        }
    }

    pub fn owner(&self) -> InstanceId {
        self.owner
    }

    /// Recorded ops, in order
    pub fn changes(&self) -> &[ListChange] {
        &self.ops
    }

    /// Elements whose own changesets are part of this transaction
    pub fn nested(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.nested.iter().copied()
    }

    pub(crate) fn ambient(&self) -> &[KeyedElement] {
        &self.projected
    }

    pub fn has_local_changes(&self) -> bool {
        !self.ops.is_empty()
    }

    pub(crate) fn set_nested(&mut self, child: InstanceId) {
        self.nested.insert(child);
    }

    /// Append an op, advance the projection and return its edge deltas
    pub(crate) fn record(&mut self, op: ListChange) -> Result<Vec<(RefEdge, i64)>> {
        let owner = self.owner;
        let edge = |value: &Value, delta: i64| {
            RefEdge::for_value(owner, RefSlot::Element, Some(value)).map(|e| (e, delta))
        };

        let deltas: Vec<(RefEdge, i64)> = match &op {
            ListChange::Add { element, .. } => edge(element, 1).into_iter().collect(),
            ListChange::RemoveOne { key, .. } => self
                .projected
                .iter()
                .find(|e| e.key == *key)
                .and_then(|e| edge(&e.value, -1))
                .into_iter()
                .collect(),
            ListChange::RemoveAt { elements, start } => {
                let (from, to) = slice_bounds(*start, elements.len(), self.projected.len());
                self.projected[from..to]
                    .iter()
                    .filter_map(|e| edge(&e.value, -1))
                    .collect()
            }
            ListChange::Clear => self
                .projected
                .iter()
                .filter_map(|e| edge(&e.value, -1))
                .collect(),
            ListChange::Update { .. } | ListChange::Sort { .. } => Vec::new(),
        };

        replay(&mut self.projected, &op)?;
        self.ops.push(op);
        self.ref_log.extend(deltas.iter().copied());
        Ok(deltas)
    }

    /// Drop every recorded op and return the inverse edge deltas
    pub(crate) fn clear_changes(&mut self, committed: Vec<KeyedElement>) -> Vec<(RefEdge, i64)> {
        let inverse = self
            .ref_log
            .drain(..)
            .rev()
            .map(|(edge, delta)| (edge, -delta))
            .collect();
        self.ops.clear();
        self.projected = committed;
        inverse
    }

    /// Ops a commit replays: those after the last `Clear`
    pub fn effective_changes(&self) -> (bool, &[ListChange]) {
        match self.ops.iter().rposition(|op| matches!(op, ListChange::Clear)) {
            Some(pos) => (true, &self.ops[pos + 1..]),
            None => (false, &self.ops),
        }
    }

    /// New list data for commit
    pub(crate) fn stage(&self, base: &ListData, committed: Vec<KeyedElement>) -> Result<ListData> {
        let (cleared, ops) = self.effective_changes();
        let mut elements = if cleared { Vec::new() } else { committed };
        for op in ops {
            replay(&mut elements, op)?;
        }
        Ok(ListData {
            element_type: base.element_type.clone(),
            elements: elements.into_iter().map(|e| e.value).collect(),
        })
    }
}

fn slice_bounds(start: usize, count: usize, len: usize) -> (usize, usize) {
    let from = start.min(len);
    (from, from.saturating_add(count).min(len))
}

/// Apply one op to a keyed element sequence
pub(crate) fn replay(elements: &mut Vec<KeyedElement>, op: &ListChange) -> Result<()> {
    match op {
        ListChange::Add {
            element,
            index,
            key,
        } => {
            if elements.iter().any(|e| e.key == *key) {
                return Err(TypeCfgError::conflict(format!(
                    "list already contains an element with key {}",
                    key
                )));
            }
            let at = (*index).min(elements.len());
            elements.insert(
                at,
                KeyedElement {
                    value: element.clone(),
                    key: key.clone(),
                },
            );
        }
        ListChange::RemoveOne { key, .. } => {
            if let Some(pos) = elements.iter().position(|e| e.key == *key) {
                elements.remove(pos);
            }
        }
        ListChange::RemoveAt {
            elements: removed,
            start,
        } => {
            let (from, to) = slice_bounds(*start, removed.len(), elements.len());
            elements.drain(from..to);
        }
        ListChange::Update { target, source } => {
            if let Value::Simple(_) = source {
                if let Some(e) = elements.iter_mut().find(|e| e.value.equals(target)) {
                    e.value = source.clone();
                }
            }
        }
        ListChange::Sort { comparer } => {
            elements.sort_by(|a, b| comparer(&a.value, &b.value));
        }
        ListChange::Clear => elements.clear(),
    }
    Ok(())
}

/// Insertion position for `index` in a list of `len` elements
pub(crate) fn resolve_index(index: Option<isize>, len: usize) -> usize {
    match index {
        None => len,
        Some(i) if i < 0 => (len as isize + i).max(0) as usize,
        Some(i) => (i as usize).min(len),
    }
}

fn cast_keyed(
    store: &InstanceStore,
    txn: &Transaction,
    list: InstanceId,
    values: Vec<Value>,
) -> Result<Vec<KeyedElement>> {
    let element_type = &store.list(list)?.element_type;
    let mut keyed = Vec::with_capacity(values.len());
    for value in values {
        if let Some(cast) = element_type.cast(value, store)? {
            let key = txn.key_of(store, &cast)?;
            keyed.push(KeyedElement { value: cast, key });
        }
    }
    Ok(keyed)
}

fn record_all(
    store: &InstanceStore,
    txn: &mut Transaction,
    list: InstanceId,
    ops: Vec<ListChange>,
) -> Result<()> {
    if ops.is_empty() {
        return Ok(());
    }
    txn.ensure_changeset(store, list)?;
    for op in ops {
        let deltas = txn.list_changeset_mut(list)?.record(op)?;
        for (edge, delta) in deltas {
            txn.adjust_ref(edge, delta);
        }
    }
    Ok(())
}

/// Decompose "make the list look like `fragment`" into primitive ops
pub(crate) fn set(
    store: &InstanceStore,
    txn: &mut Transaction,
    list: InstanceId,
    fragment: Vec<Value>,
    options: ListSetOptions,
) -> Result<()> {
    let candidates = cast_keyed(store, txn, list, fragment)?;
    let ambient = txn.ambient_elements(store, list)?;

    let mut present: HashMap<String, Value> = ambient
        .iter()
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect();
    let mut set_keys: HashSet<String> = HashSet::new();
    let mut index = resolve_index(options.index, ambient.len());
    let mut ops = Vec::new();
    let mut copies = Vec::new();

    for KeyedElement { value, key } in candidates {
        if let Some(existing) = present.get(&key) {
            if !options.no_update && *existing != value {
                if let (Value::Complex(target), Value::Complex(source)) = (existing, &value) {
                    copies.push((*target, *source));
                }
                ops.push(ListChange::Update {
                    target: existing.clone(),
                    source: value,
                });
            }
        } else if !options.no_add {
            ops.push(ListChange::Add {
                element: value.clone(),
                index,
                key: key.clone(),
            });
            index += 1;
            present.insert(key.clone(), value);
        }
        set_keys.insert(key);
    }

    if !options.no_remove {
        for element in ambient.iter().rev() {
            if !set_keys.contains(&element.key) {
                ops.push(ListChange::RemoveOne {
                    element: element.value.clone(),
                    key: element.key.clone(),
                });
            }
        }
    }

    record_all(store, txn, list, ops)?;
    for (target, source) in copies {
        copy_properties(store, txn, target, source)?;
    }
    Ok(())
}

pub(crate) fn remove(
    store: &InstanceStore,
    txn: &mut Transaction,
    list: InstanceId,
    values: Vec<Value>,
) -> Result<()> {
    let candidates = cast_keyed(store, txn, list, values)?;
    let ambient = txn.ambient_elements(store, list)?;

    let mut removed = HashSet::new();
    let ops = candidates
        .into_iter()
        .filter_map(|c| {
            let existing = ambient.iter().find(|e| e.key == c.key)?;
            removed.insert(c.key.clone()).then(|| ListChange::RemoveOne {
                element: existing.value.clone(),
                key: c.key,
            })
        })
        .collect();
    record_all(store, txn, list, ops)
}

pub(crate) fn remove_at(
    store: &InstanceStore,
    txn: &mut Transaction,
    list: InstanceId,
    start: usize,
    count: usize,
) -> Result<()> {
    let ambient = txn.ambient_elements(store, list)?;
    let (from, to) = slice_bounds(start, count, ambient.len());
    if from == to {
        return Ok(());
    }
    let elements = ambient[from..to].iter().map(|e| e.value.clone()).collect();
    record_all(
        store,
        txn,
        list,
        vec![ListChange::RemoveAt {
            elements,
            start: from,
        }],
    )
}

pub(crate) fn sort(
    store: &InstanceStore,
    txn: &mut Transaction,
    list: InstanceId,
    comparer: Comparer,
) -> Result<()> {
    if txn.ambient_elements(store, list)?.len() < 2 {
        return Ok(());
    }
    record_all(store, txn, list, vec![ListChange::Sort { comparer }])
}

pub(crate) fn clear(store: &InstanceStore, txn: &mut Transaction, list: InstanceId) -> Result<()> {
    if txn.ambient_elements(store, list)?.is_empty() {
        return Ok(());
    }
    record_all(store, txn, list, vec![ListChange::Clear])
}
