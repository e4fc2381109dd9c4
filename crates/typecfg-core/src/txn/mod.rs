//! Transactional mutation of typed containers
//!
//! Changes to complex and list instances are recorded per owner in
//! changesets owned by a transaction, and become visible in committed state
//! only when the root scope of that transaction accepts it. Commit is
//! validate-then-apply: every changeset is staged first, and nothing is
//! installed unless all of them stage cleanly.

pub mod change;
pub mod complex_changeset;
pub mod context;
pub mod list_changeset;
pub mod scope;
pub mod transaction;

pub use change::{ChangeKind, Comparer, ListChange, Replace};
pub use complex_changeset::{ComplexChangeset, ComplexChangesetView, PropertyEntry};
pub use context::{Context, SetOptions};
pub use list_changeset::{KeyedElement, ListChangeset, ListSetOptions};
pub use scope::{ExitOptions, ScopeId};
pub use transaction::{Changeset, Transaction, TransactionResult, TxnId};
