//! Primitive changes recorded by changesets and applied at commit

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::model::{Value, ValueState};

/// The kinds of primitive change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Replace,
    Add,
    RemoveOne,
    RemoveAt,
    Update,
    Sort,
    Clear,
}

/// New value and state of one complex property
#[derive(Debug, Clone, PartialEq)]
pub struct Replace {
    pub value: Option<Value>,
    pub state: ValueState,
}

impl Replace {
    pub fn kind(&self) -> ChangeKind {
        ChangeKind::Replace
    }
}

/// Total-order comparator used by `Sort`
pub type Comparer = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// One list operation
#[derive(Clone)]
pub enum ListChange {
    /// Insert `element` at `index`; `key` must not be present
    Add {
        element: Value,
        index: usize,
        key: String,
    },
    /// Remove the element with `key`, if any
    RemoveOne { element: Value, key: String },
    /// Remove `elements.len()` elements starting at `start`
    RemoveAt { elements: Vec<Value>, start: usize },
    /// Replace `target`'s content with `source`'s, in place
    Update { target: Value, source: Value },
    Sort { comparer: Comparer },
    /// Drop every element; ops recorded before it no longer apply
    Clear,
}

impl ListChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ListChange::Add { .. } => ChangeKind::Add,
            ListChange::RemoveOne { .. } => ChangeKind::RemoveOne,
            ListChange::RemoveAt { .. } => ChangeKind::RemoveAt,
            ListChange::Update { .. } => ChangeKind::Update,
            ListChange::Sort { .. } => ChangeKind::Sort,
            ListChange::Clear => ChangeKind::Clear,
        }
    }
}

impl fmt::Debug for ListChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListChange::Add {
                element,
                index,
                key,
            } => f
                .debug_struct("Add")
                .field("element", element)
                .field("index", index)
                .field("key", key)
                .finish(),
            ListChange::RemoveOne { element, key } => f
                .debug_struct("RemoveOne")
                .field("element", element)
                .field("key", key)
                .finish(),
            ListChange::RemoveAt { elements, start } => f
                .debug_struct("RemoveAt")
                .field("elements", elements)
                .field("start", start)
                .finish(),
            ListChange::Update { target, source } => f
                .debug_struct("Update")
                .field("target", target)
                .field("source", source)
                .finish(),
            ListChange::Sort { .. } => f.write_str("Sort(..)"),
            ListChange::Clear => f.write_str("Clear"),
        }
    }
}
