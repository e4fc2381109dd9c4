//! Transaction scopes
//!
//! Scopes form a stack on the [`Context`]; the top one is current. A
//! transaction scope either starts a transaction (root) or joins the one
//! that is current when it is entered. A committed scope hides any current
//! transaction so reads inside it see committed state.
//!
//! Only the current scope may `accept`, `accept_will` or `reject`. Exiting
//! a scope that is not current is tolerated: it logs a warning unless the
//! exit is sloppy.

use std::fmt;
use std::time::Instant;

use super::context::Context;
use super::transaction::{Transaction, TransactionResult, TxnId};
use crate::errors::{Result, TypeCfgError};
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScopeFrame {
    pub id: ScopeId,
    /// `None` for committed scopes
    pub txn: Option<TxnId>,
    pub is_root: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitOptions {
    /// Suppress the warning for exiting a scope that is not current
    pub sloppy: bool,
}

impl Context {
    /// Enter a scope of the current transaction, or of a new one if there
    /// is none
    pub fn enter_transaction(&mut self) -> ScopeId {
        let joined = self.current_transaction();
        let (txn, is_root) = match joined {
            Some(txn) => (txn, false),
            None => {
                let txn = TxnId(self.next_txn);
                self.next_txn += 1;
                self.transactions.insert(txn, Transaction::new(txn));
                tracing::debug!(txn_id = %txn, "transaction started");
                (txn, true)
            }
        };
        if let Some(t) = self.transactions.get_mut(&txn) {
            t.scope_count += 1;
        }
        self.push_frame(Some(txn), is_root)
    }

    /// Enter a scope that sees committed state
    pub fn enter_committed(&mut self) -> ScopeId {
        self.push_frame(None, false)
    }

    fn push_frame(&mut self, txn: Option<TxnId>, is_root: bool) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.scopes.push(ScopeFrame { id, txn, is_root });
        id
    }

    fn frame(&self, scope: ScopeId) -> Option<&ScopeFrame> {
        self.scopes.iter().find(|f| f.id == scope)
    }

    /// Whether the scope has been entered and not yet exited
    pub fn is_inside(&self, scope: ScopeId) -> bool {
        self.frame(scope).is_some()
    }

    pub fn is_current(&self, scope: ScopeId) -> bool {
        self.scopes.last().is_some_and(|f| f.id == scope)
    }

    /// Whether the scope started its transaction
    pub fn is_root(&self, scope: ScopeId) -> bool {
        self.frame(scope).is_some_and(|f| f.is_root)
    }

    /// Current, root, and its transaction still open
    pub fn can_commit(&self, scope: ScopeId) -> bool {
        self.is_current(scope)
            && self
                .frame(scope)
                .is_some_and(|f| f.is_root && f.txn.is_some_and(|t| self.transactions.contains_key(&t)))
    }

    /// The transaction of a scope; `None` for committed or exited scopes
    pub fn scope_transaction(&self, scope: ScopeId) -> Option<TxnId> {
        self.frame(scope).and_then(|f| f.txn)
    }

    /// The open transaction of the current scope
    pub fn current_transaction(&self) -> Option<TxnId> {
        self.scopes
            .last()
            .and_then(|f| f.txn)
            .filter(|t| self.transactions.contains_key(t))
    }

    pub fn transaction(&self, txn: TxnId) -> Option<&Transaction> {
        self.transactions.get(&txn)
    }

    /// `Pending` while open; `None` for unknown ids
    pub fn transaction_result(&self, txn: TxnId) -> Option<TransactionResult> {
        if self.transactions.contains_key(&txn) {
            return Some(TransactionResult::Pending);
        }
        self.finished.get(&txn).cloned()
    }

    /// Leave a scope. Exiting an exited scope does nothing.
    ///
    /// Leaving the root scope of a transaction that is still open rejects it
    /// and closes every scope that joined it.
    pub fn exit(&mut self, scope: ScopeId, options: ExitOptions) {
        let Some(pos) = self.scopes.iter().position(|f| f.id == scope) else {
            return;
        };
        if pos + 1 != self.scopes.len() && !options.sloppy {
            tracing::warn!(
                scope_id = %scope,
                open_above = self.scopes.len() - pos - 1,
                "exiting a scope that is not current"
            );
        }

        let frame = self.scopes.remove(pos);
        let Some(txn) = frame.txn else {
            return;
        };
        let still_open = match self.transactions.get_mut(&txn) {
            Some(t) => {
                t.scope_count = t.scope_count.saturating_sub(1);
                true
            }
            None => false,
        };
        if frame.is_root && still_open {
            self.reject_transaction(
                txn,
                TypeCfgError::Rejected {
                    reason: "root scope exited without accepting".to_string(),
                },
            );
            self.scopes.retain(|f| f.txn != Some(txn));
        }
    }

    /// Sloppy exit
    pub fn dispose(&mut self, scope: ScopeId) {
        self.exit(scope, ExitOptions { sloppy: true });
    }

    fn require_current(&self, scope: ScopeId, op: &str) -> Result<ScopeFrame> {
        match self.frame(scope) {
            None => Err(TypeCfgError::operation_invalid(format!(
                "{}: scope {} has already exited",
                op, scope
            ))),
            Some(_) if !self.is_current(scope) => Err(TypeCfgError::operation_invalid(format!(
                "{}: scope {} is not the current scope",
                op, scope
            ))),
            Some(frame) => Ok(*frame),
        }
    }

    /// Accept the scope's work and exit it
    ///
    /// A root scope commits its transaction; any other scope only exits and
    /// reports the transaction's state: `Pending` while it is open, its
    /// recorded result once finished. A commit that fails validation rejects
    /// the transaction and reports `Rejected`.
    ///
    /// # Errors
    ///
    /// `OperationInvalid` if the scope is not current or has exited.
    pub fn accept(&mut self, scope: ScopeId) -> Result<TransactionResult> {
        let frame = self.require_current(scope, "accept")?;
        let result = match frame.txn {
            Some(txn) if frame.is_root && self.transactions.contains_key(&txn) => self.commit(txn),
            Some(txn) => self
                .transaction_result(txn)
                .unwrap_or(TransactionResult::Pending),
            None => TransactionResult::Pending,
        };
        self.dispose(scope);
        Ok(result)
    }

    /// Run the validation phase of the commit without applying anything
    ///
    /// The scope stays open. A failing validation rejects the transaction.
    pub fn accept_will(&mut self, scope: ScopeId) -> Result<TransactionResult> {
        let frame = self.require_current(scope, "accept_will")?;
        let Some(txn) = frame.txn.filter(|t| self.transactions.contains_key(t)) else {
            return Ok(frame
                .txn
                .and_then(|t| self.transaction_result(t))
                .unwrap_or(TransactionResult::Pending));
        };

        let validated = match self.transactions.get(&txn) {
            Some(t) => t.stage(&self.store).map(|_| ()),
            None => Ok(()),
        };
        match validated {
            Ok(()) => Ok(TransactionResult::Pending),
            Err(e) => Ok(self.reject_transaction(txn, e)),
        }
    }

    /// Reject the scope's transaction, leaving every owner untouched, and
    /// exit the scope
    pub fn reject(&mut self, scope: ScopeId, error: TypeCfgError) -> Result<TransactionResult> {
        let frame = self.require_current(scope, "reject")?;
        let result = match frame.txn {
            Some(txn) if self.transactions.contains_key(&txn) => {
                self.reject_transaction(txn, error)
            }
            Some(txn) => self
                .transaction_result(txn)
                .unwrap_or(TransactionResult::Rejected(error)),
            None => TransactionResult::Rejected(error),
        };
        self.dispose(scope);
        Ok(result)
    }

    /// Run `f` inside a new transaction scope
    ///
    /// If `f` fails while its scope is still current the transaction is
    /// rejected with that error. The scope is disposed exactly once and
    /// `f`'s own outcome is returned.
    pub fn using<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context, ScopeId) -> Result<T>,
    {
        let scope = self.enter_transaction();
        let outcome = f(self, scope);
        if let Err(e) = &outcome {
            if self.is_current(scope) {
                if let Err(reject_err) = self.reject(scope, e.clone()) {
                    tracing::warn!(
                        scope_id = %scope,
                        error = %reject_err,
                        "rejecting a failed scope did not succeed"
                    );
                }
            }
        }
        self.dispose(scope);
        outcome
    }

    /// Two-phase commit: stage everything, then install it
    pub(crate) fn commit(&mut self, txn: TxnId) -> TransactionResult {
        let changeset_count = self
            .transactions
            .get(&txn)
            .map(|t| t.changesets().count())
            .unwrap_or(0);
        log_op_start!("commit", txn_id = %txn, changeset_count = changeset_count);
        let start = Instant::now();

        let staged = match self.transactions.get(&txn) {
            Some(t) => t.stage(&self.store),
            None => Err(TypeCfgError::operation_invalid(format!("{} is not open", txn))),
        };

        match staged {
            Ok(staged) => {
                self.transactions.remove(&txn);
                self.store.install(staged.instances, staged.refs);
                self.finished.insert(txn, TransactionResult::Committed);
                log_op_end!(
                    "commit",
                    duration_ms = start.elapsed().as_millis() as u64,
                    txn_id = %txn
                );
                TransactionResult::Committed
            }
            Err(e) => {
                log_op_error!(
                    "commit",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    txn_id = %txn
                );
                self.reject_transaction(txn, e)
            }
        }
    }

    pub(crate) fn reject_transaction(&mut self, txn: TxnId, error: TypeCfgError) -> TransactionResult {
        log_op_start!("reject", txn_id = %txn);
        let start = Instant::now();

        let result = TransactionResult::Rejected(error);
        if self.transactions.remove(&txn).is_some() {
            self.finished.insert(txn, result.clone());
        }

        log_op_end!(
            "reject",
            duration_ms = start.elapsed().as_millis() as u64,
            txn_id = %txn
        );
        result
    }
}
