//! Transactions: changesets per owner plus a net reference-edge delta

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::complex_changeset::{self, ComplexChangeset, PropertyEntry};
use super::list_changeset::{KeyedElement, ListChangeset};
use crate::errors::{Result, TypeCfgError};
use crate::model::{
    instance::simple_key, Instance, InstanceId, InstanceStore, RefEdge, RefSlot, Slot, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Terminal outcome of a transaction; `Pending` while open
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionResult {
    Pending,
    Committed,
    Rejected(TypeCfgError),
}

impl TransactionResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionResult::Committed)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TransactionResult::Rejected(_))
    }

    pub fn error(&self) -> Option<&TypeCfgError> {
        match self {
            TransactionResult::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

/// The changes a transaction holds for one owner
#[derive(Debug, Clone)]
pub enum Changeset {
    Complex(ComplexChangeset),
    List(ListChangeset),
}

impl Changeset {
    pub fn owner(&self) -> InstanceId {
        match self {
            Changeset::Complex(c) => c.owner(),
            Changeset::List(l) => l.owner(),
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexChangeset> {
        match self {
            Changeset::Complex(c) => Some(c),
            Changeset::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListChangeset> {
        match self {
            Changeset::List(l) => Some(l),
            Changeset::Complex(_) => None,
        }
    }

    /// Owners of the nested changesets this one links to
    fn nested(&self) -> Vec<InstanceId> {
        match self {
            Changeset::Complex(c) => c
                .entries()
                .filter_map(|(_, e)| match e {
                    PropertyEntry::Nested(child) => Some(*child),
                    PropertyEntry::Replace(_) => None,
                })
                .collect(),
            Changeset::List(l) => l.nested().collect(),
        }
    }

    fn has_local_changes(&self) -> bool {
        match self {
            Changeset::Complex(c) => c
                .entries()
                .any(|(_, e)| matches!(e, PropertyEntry::Replace(_))),
            Changeset::List(l) => l.has_local_changes(),
        }
    }
}

/// Validated commit output, installed without further checks
pub(crate) struct Staged {
    pub instances: Vec<(InstanceId, Instance)>,
    pub refs: BTreeMap<RefEdge, u32>,
}

#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    changesets: BTreeMap<InstanceId, Changeset>,
    ref_delta: BTreeMap<RefEdge, i64>,
    pub(crate) scope_count: usize,
}

impl Transaction {
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            changesets: BTreeMap::new(),
            ref_delta: BTreeMap::new(),
            scope_count: 0,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn scope_count(&self) -> usize {
        self.scope_count
    }

    pub fn changeset(&self, owner: InstanceId) -> Option<&Changeset> {
        self.changesets.get(&owner)
    }

    pub fn changesets(&self) -> impl Iterator<Item = &Changeset> {
        self.changesets.values()
    }

    pub fn complex_changeset(&self, owner: InstanceId) -> Option<&ComplexChangeset> {
        self.changesets.get(&owner).and_then(Changeset::as_complex)
    }

    pub fn list_changeset(&self, owner: InstanceId) -> Option<&ListChangeset> {
        self.changesets.get(&owner).and_then(Changeset::as_list)
    }

    pub(crate) fn complex_changeset_mut(&mut self, owner: InstanceId) -> Result<&mut ComplexChangeset> {
        match self.changesets.get_mut(&owner) {
            Some(Changeset::Complex(c)) => Ok(c),
            _ => Err(TypeCfgError::internal(format!(
                "no complex changeset for {}",
                owner
            ))),
        }
    }

    pub(crate) fn list_changeset_mut(&mut self, owner: InstanceId) -> Result<&mut ListChangeset> {
        match self.changesets.get_mut(&owner) {
            Some(Changeset::List(l)) => Ok(l),
            _ => Err(TypeCfgError::internal(format!("no list changeset for {}", owner))),
        }
    }

    /// Pending edge multiplicity changes
    pub fn ref_delta(&self) -> &BTreeMap<RefEdge, i64> {
        &self.ref_delta
    }

    pub(crate) fn adjust_ref(&mut self, edge: RefEdge, delta: i64) {
        let entry = self.ref_delta.entry(edge).or_insert(0);
        *entry += delta;
        if *entry == 0 {
            self.ref_delta.remove(&edge);
        }
    }

    pub(crate) fn adjust_ref_value(
        &mut self,
        container: InstanceId,
        slot: RefSlot,
        value: Option<&Value>,
        delta: i64,
    ) {
        if let Some(edge) = RefEdge::for_value(container, slot, value) {
            self.adjust_ref(edge, delta);
        }
    }

    /// Edges to `child` as seen inside this transaction
    pub fn ambient_references_to(&self, store: &InstanceStore, child: InstanceId) -> Vec<RefEdge> {
        let mut edges: BTreeSet<RefEdge> = store.references_to(child).into_iter().collect();
        edges.extend(self.ref_delta.keys().filter(|e| e.child == child).copied());
        edges
            .into_iter()
            .filter(|e| {
                store.ref_count(e) as i64 + self.ref_delta.get(e).copied().unwrap_or(0) > 0
            })
            .collect()
    }

    /// True iff the owner's changeset, or any changeset it links to, holds
    /// a primitive change
    pub fn has_changes(&self, owner: InstanceId) -> bool {
        let mut visited = BTreeSet::new();
        self.has_changes_inner(owner, &mut visited)
    }

    fn has_changes_inner(&self, owner: InstanceId, visited: &mut BTreeSet<InstanceId>) -> bool {
        if !visited.insert(owner) {
            return false;
        }
        match self.changesets.get(&owner) {
            None => false,
            Some(cs) => {
                cs.has_local_changes()
                    || cs
                        .nested()
                        .into_iter()
                        .any(|child| self.has_changes_inner(child, visited))
            }
        }
    }

    /// Value and state of a property as seen inside this transaction
    pub fn ambient_slot(&self, store: &InstanceStore, owner: InstanceId, index: usize) -> Result<Slot> {
        if let Some(replace) = self.complex_changeset(owner).and_then(|c| c.replace(index)) {
            return Ok(Slot {
                value: replace.value.clone(),
                state: replace.state,
            });
        }
        let data = store.complex(owner)?;
        data.slots.get(index).cloned().ok_or_else(|| {
            TypeCfgError::argument_invalid("index", format!("{} has no property {}", owner, index))
        })
    }

    /// Elements of a list as seen inside this transaction
    pub fn ambient_elements(&self, store: &InstanceStore, list: InstanceId) -> Result<Vec<KeyedElement>> {
        match self.list_changeset(list) {
            Some(cs) => Ok(cs.ambient().to_vec()),
            None => committed_elements(store, list),
        }
    }

    /// List key of a value, reading keyed complexes through this transaction
    pub fn key_of(&self, store: &InstanceStore, value: &Value) -> Result<String> {
        if let Value::Complex(id) = value {
            let data = store.complex(*id)?;
            if let Some(k) = data.type_.key_index() {
                let slot = self.ambient_slot(store, *id, k)?;
                return Ok(slot
                    .value
                    .as_ref()
                    .and_then(Value::as_json)
                    .map(simple_key)
                    .unwrap_or_else(|| "null".to_string()));
            }
        }
        store.key_of(value)
    }

    /// Create the owner's changeset on first touch and link it into every
    /// container that references the owner, recursively.
    pub(crate) fn ensure_changeset(&mut self, store: &InstanceStore, owner: InstanceId) -> Result<()> {
        if self.changesets.contains_key(&owner) {
            return Ok(());
        }

        let changeset = match store.instance(owner)? {
            Instance::Complex(data) => {
                Changeset::Complex(ComplexChangeset::new(owner, data.type_.clone()))
            }
            Instance::List(_) => {
                Changeset::List(ListChangeset::new(owner, committed_elements(store, owner)?))
            }
        };
        self.changesets.insert(owner, changeset);

        for edge in self.ambient_references_to(store, owner) {
            self.ensure_changeset(store, edge.container)?;
            match (self.changesets.get_mut(&edge.container), edge.slot) {
                (Some(Changeset::Complex(c)), RefSlot::Property(index)) => {
                    c.set_nested(index, owner);
                }
                (Some(Changeset::List(l)), RefSlot::Element) => l.set_nested(owner),
                _ => {}
            }
        }
        Ok(())
    }

    /// Drop every primitive change of `owner` and the changesets it links to
    pub(crate) fn clear_changes(&mut self, store: &InstanceStore, owner: InstanceId) -> Result<()> {
        let mut visited = BTreeSet::new();
        let mut pending = vec![owner];
        while let Some(next) = pending.pop() {
            if !visited.insert(next) {
                continue;
            }
            let is_list = self.changesets.get(&next).map(|cs| cs.as_list().is_some());
            match is_list {
                Some(false) => {
                    pending.extend(complex_changeset::clear_changes(store, self, next)?);
                }
                Some(true) => {
                    let committed = committed_elements(store, next)?;
                    let cs = self.list_changeset_mut(next)?;
                    let nested: Vec<InstanceId> = cs.nested().collect();
                    let inverse = cs.clear_changes(committed);
                    for (edge, delta) in inverse {
                        self.adjust_ref(edge, delta);
                    }
                    pending.extend(nested);
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Owners ordered children first, containers last
    pub fn net_order(&self) -> Vec<InstanceId> {
        let mut order = Vec::with_capacity(self.changesets.len());
        let mut visited = BTreeSet::new();
        for &owner in self.changesets.keys() {
            self.visit_post_order(owner, &mut visited, &mut order);
        }
        order
    }

    fn visit_post_order(
        &self,
        owner: InstanceId,
        visited: &mut BTreeSet<InstanceId>,
        order: &mut Vec<InstanceId>,
    ) {
        if !visited.insert(owner) {
            return;
        }
        if let Some(cs) = self.changesets.get(&owner) {
            for child in cs.nested() {
                self.visit_post_order(child, visited, order);
            }
            order.push(owner);
        }
    }

    /// Validation phase of commit: compute every new instance state and
    /// the new edge multiset without touching the store.
    pub(crate) fn stage(&self, store: &InstanceStore) -> Result<Staged> {
        let mut instances = Vec::with_capacity(self.changesets.len());
        for owner in self.net_order() {
            let staged = match &self.changesets[&owner] {
                Changeset::Complex(c) => {
                    let base = store.complex(owner)?;
                    Instance::Complex(c.stage(base, |child| self.has_changes(child)))
                }
                Changeset::List(l) => {
                    let base = store.list(owner)?;
                    Instance::List(l.stage(base, committed_elements(store, owner)?)?)
                }
            };
            instances.push((owner, staged));
        }

        let mut refs = store.refs().clone();
        for (edge, delta) in &self.ref_delta {
            let count = refs.get(edge).copied().unwrap_or(0) as i64 + delta;
            if count < 0 {
                return Err(TypeCfgError::conflict(format!(
                    "reference count of {} -> {} would drop below zero",
                    edge.container, edge.child
                )));
            }
            if count == 0 {
                refs.remove(edge);
            } else {
                refs.insert(*edge, count as u32);
            }
        }

        Ok(Staged { instances, refs })
    }
}

pub(crate) fn committed_elements(store: &InstanceStore, list: InstanceId) -> Result<Vec<KeyedElement>> {
    store
        .list(list)?
        .elements
        .iter()
        .map(|value| {
            Ok(KeyedElement {
                key: store.key_of(value)?,
                value: value.clone(),
            })
        })
        .collect()
}
