//! Typed container model
//!
//! Complex instances hold one slot per declared property; lists hold an
//! ordered sequence of elements unique by key. The committed state lives in
//! [`InstanceStore`]; transactional views are layered on top by `txn`.

pub mod instance;
pub mod types;
pub mod value;

pub use instance::{ComplexData, Instance, InstanceStore, ListData, RefEdge, RefSlot};
pub use types::{ComplexType, PropertyType, TypeRegistry, ValueType};
pub use value::{values_equal, InstanceId, Simple, Slot, Value, ValueState};
