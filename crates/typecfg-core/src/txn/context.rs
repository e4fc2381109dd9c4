use std::collections::BTreeMap;
use std::sync::Arc;

use super::change::Comparer;
use super::complex_changeset::{self, ComplexChangesetView};
use super::list_changeset::{self, ListChangeset, ListSetOptions};
use super::scope::ScopeFrame;
use super::transaction::{Changeset, Transaction, TransactionResult, TxnId};
use crate::errors::{Result, TypeCfgError};
use crate::model::{
    ComplexType, InstanceId, InstanceStore, RefEdge, Slot, Value, ValueType,
};

/// Options of [`Context::set_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Record a change even when the value equals the ambient value
    pub force_replace: bool,
}

/// Owner of the committed store, the open transactions and the scope stack
///
/// Reads go through the current transaction, if any. Every mutation runs in
/// a short-lived scope: it joins the current transaction, or commits on its
/// own when there is none.
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) store: InstanceStore,
    pub(crate) transactions: BTreeMap<TxnId, Transaction>,
    pub(crate) finished: BTreeMap<TxnId, TransactionResult>,
    pub(crate) scopes: Vec<ScopeFrame>,
    pub(crate) next_txn: u64,
    pub(crate) next_scope: u64,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state
    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn register_type(&mut self, ty: ComplexType) -> Result<Arc<ComplexType>> {
        self.store.register_type(ty)
    }

    /// Create a complex instance directly in committed state
    pub fn create_complex(&mut self, type_id: &str, values: Vec<(&str, Value)>) -> Result<InstanceId> {
        let values = values
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.store.create_complex(type_id, values)
    }

    /// Create a list instance directly in committed state
    pub fn create_list(&mut self, element_type: ValueType, values: Vec<Value>) -> Result<InstanceId> {
        self.store.create_list(element_type, values)
    }

    fn ambient(&self) -> Option<&Transaction> {
        self.current_transaction()
            .and_then(|t| self.transactions.get(&t))
    }

    // ----- reads -----

    /// Ambient value and state of a property
    pub fn slot(&self, owner: InstanceId, name: &str) -> Result<Slot> {
        let index = self.store.complex(owner)?.type_.require_property(name)?;
        match self.ambient() {
            Some(txn) => txn.ambient_slot(&self.store, owner, index),
            None => Ok(self.store.complex(owner)?.slots[index].clone()),
        }
    }

    /// Ambient value of a property
    pub fn get(&self, owner: InstanceId, name: &str) -> Result<Option<Value>> {
        self.slot(owner, name).map(|s| s.value)
    }

    /// Ambient elements of a list
    pub fn elements(&self, list: InstanceId) -> Result<Vec<Value>> {
        match self.ambient() {
            Some(txn) => Ok(txn
                .ambient_elements(&self.store, list)?
                .into_iter()
                .map(|e| e.value)
                .collect()),
            None => Ok(self.store.list(list)?.elements.clone()),
        }
    }

    /// Ambient container edges pointing at `child`
    pub fn references(&self, child: InstanceId) -> Vec<RefEdge> {
        match self.ambient() {
            Some(txn) => txn.ambient_references_to(&self.store, child),
            None => self.store.references_to(child),
        }
    }

    /// Ambient list key of a value
    pub fn key_of(&self, value: &Value) -> Result<String> {
        match self.ambient() {
            Some(txn) => txn.key_of(&self.store, value),
            None => self.store.key_of(value),
        }
    }

    pub fn changeset(&self, owner: InstanceId) -> Option<&Changeset> {
        self.ambient().and_then(|t| t.changeset(owner))
    }

    pub fn complex_changeset(&self, owner: InstanceId) -> Option<ComplexChangesetView<'_>> {
        let txn = self.ambient()?;
        let changeset = txn.complex_changeset(owner)?;
        Some(ComplexChangesetView {
            changeset,
            txn,
            store: &self.store,
        })
    }

    pub fn list_changeset(&self, owner: InstanceId) -> Option<&ListChangeset> {
        self.ambient().and_then(|t| t.list_changeset(owner))
    }

    // ----- mutations -----

    /// Set a property; `None` resets it to its default
    pub fn set(&mut self, owner: InstanceId, name: &str, value: impl Into<Option<Value>>) -> Result<()> {
        self.set_with(owner, name, value.into(), SetOptions::default())
    }

    /// Set a property
    ///
    /// # Errors
    ///
    /// - `ArgumentInvalid` if the type has no such property
    /// - `TypeMismatch` if the value does not cast to the property type
    /// - `ReadOnlyProperty` if the value would change a read-only property
    pub fn set_with(
        &mut self,
        owner: InstanceId,
        name: &str,
        value: Option<Value>,
        options: SetOptions,
    ) -> Result<()> {
        let index = self.store.complex(owner)?.type_.require_property(name)?;
        self.in_change_scope(|store, txn| {
            complex_changeset::set_element(store, txn, owner, index, value, options.force_replace)
        })
    }

    /// Discard the pending changes of an owner in the current transaction
    pub fn clear_changes(&mut self, owner: InstanceId) -> Result<()> {
        let Some(txn_id) = self.current_transaction() else {
            return Ok(());
        };
        match self.transactions.get_mut(&txn_id) {
            Some(txn) => txn.clear_changes(&self.store, owner),
            None => Ok(()),
        }
    }

    /// Make the list hold `fragment`, as allowed by `options`
    pub fn list_set(&mut self, list: InstanceId, fragment: Vec<Value>, options: ListSetOptions) -> Result<()> {
        self.in_change_scope(|store, txn| list_changeset::set(store, txn, list, fragment, options))
    }

    /// Append a value; an element with the same key is updated instead
    pub fn list_add(&mut self, list: InstanceId, value: Value) -> Result<()> {
        self.list_set(
            list,
            vec![value],
            ListSetOptions {
                no_remove: true,
                ..ListSetOptions::default()
            },
        )
    }

    /// Insert values at `index`; negative indexes count from the end
    pub fn list_insert(&mut self, list: InstanceId, values: Vec<Value>, index: isize) -> Result<()> {
        self.list_set(
            list,
            values,
            ListSetOptions {
                no_remove: true,
                index: Some(index),
                ..ListSetOptions::default()
            },
        )
    }

    /// Remove the elements with the keys of `values`; missing keys are ignored
    pub fn list_remove(&mut self, list: InstanceId, values: Vec<Value>) -> Result<()> {
        self.in_change_scope(|store, txn| list_changeset::remove(store, txn, list, values))
    }

    pub fn list_remove_at(&mut self, list: InstanceId, start: usize, count: usize) -> Result<()> {
        self.in_change_scope(|store, txn| list_changeset::remove_at(store, txn, list, start, count))
    }

    pub fn list_sort(&mut self, list: InstanceId, comparer: Comparer) -> Result<()> {
        self.in_change_scope(|store, txn| list_changeset::sort(store, txn, list, comparer))
    }

    pub fn list_clear(&mut self, list: InstanceId) -> Result<()> {
        self.in_change_scope(|store, txn| list_changeset::clear(store, txn, list))
    }

    /// Run one mutation in its own scope
    fn in_change_scope<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&InstanceStore, &mut Transaction) -> Result<T>,
    {
        // A scope whose transaction has finished accepts no more changes
        if let Some(txn) = self.scopes.last().and_then(|f| f.txn) {
            if !self.transactions.contains_key(&txn) {
                return Err(TypeCfgError::operation_invalid(format!(
                    "{} has already finished",
                    txn
                )));
            }
        }

        let scope = self.enter_transaction();
        let txn_id = self.scope_transaction(scope);
        let txn = match txn_id {
            Some(t) => self.transactions.get_mut(&t),
            None => None,
        };
        let outcome = match txn {
            Some(txn) => f(&self.store, txn),
            None => Err(TypeCfgError::internal("change scope has no transaction")),
        };

        let outcome = match outcome {
            Ok(value) => match self.accept(scope) {
                Ok(TransactionResult::Rejected(e)) => Err(e),
                Ok(_) => Ok(value),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.dispose(scope);
        outcome
    }
}
