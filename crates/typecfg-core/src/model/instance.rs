//! Committed instance storage
//!
//! The store is the baseline every transaction reads through: complex and
//! list instances by id, plus the multiset of reference edges between
//! containers and the instances they hold.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::{json_type_name, ComplexType, TypeRegistry, ValueType};
use super::value::{InstanceId, Slot, Value};
use crate::errors::{Result, TypeCfgError};

/// Where a container holds a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefSlot {
    /// Property index of a complex container
    Property(usize),
    /// Element of a list container
    Element,
}

/// A container → child reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefEdge {
    pub container: InstanceId,
    pub slot: RefSlot,
    pub child: InstanceId,
}

impl RefEdge {
    pub fn new(container: InstanceId, slot: RefSlot, child: InstanceId) -> Self {
        Self {
            container,
            slot,
            child,
        }
    }

    /// Edge for a value held at `slot`, if the value is an instance
    pub fn for_value(container: InstanceId, slot: RefSlot, value: Option<&Value>) -> Option<Self> {
        value
            .and_then(Value::instance_id)
            .map(|child| Self::new(container, slot, child))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexData {
    pub type_: Arc<ComplexType>,
    /// In property declaration order
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListData {
    pub element_type: ValueType,
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Complex(ComplexData),
    List(ListData),
}

/// Arena of committed instances
#[derive(Debug, Default)]
pub struct InstanceStore {
    types: TypeRegistry,
    instances: BTreeMap<InstanceId, Instance>,
    refs: BTreeMap<RefEdge, u32>,
    next_id: u64,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, ty: ComplexType) -> Result<Arc<ComplexType>> {
        self.types.register(ty)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance> {
        self.instances
            .get(&id)
            .ok_or_else(|| TypeCfgError::InstanceNotFound {
                instance_id: id.to_string(),
            })
    }

    pub fn complex(&self, id: InstanceId) -> Result<&ComplexData> {
        match self.instance(id)? {
            Instance::Complex(data) => Ok(data),
            Instance::List(data) => Err(TypeCfgError::type_mismatch(
                "complex",
                format!("list<{}>", data.element_type),
            )),
        }
    }

    pub fn list(&self, id: InstanceId) -> Result<&ListData> {
        match self.instance(id)? {
            Instance::List(data) => Ok(data),
            Instance::Complex(data) => Err(TypeCfgError::type_mismatch(
                "list",
                format!("complex<{}>", data.type_.id),
            )),
        }
    }

    /// Create a complex instance outside any transaction
    ///
    /// Unnamed properties take their defaults; list-typed properties with
    /// no value get a fresh empty list.
    pub fn create_complex(
        &mut self,
        type_id: &str,
        values: Vec<(String, Value)>,
    ) -> Result<InstanceId> {
        let ty = self.types.get(type_id)?;

        let mut slots: Vec<Slot> = ty
            .properties
            .iter()
            .map(|p| Slot::default_with(p.default_value()))
            .collect();

        for (name, value) in values {
            let index = ty.require_property(&name)?;
            let cast = ty.properties[index].value_type.cast(value, self)?;
            slots[index] = Slot::specified(cast);
        }

        for (index, property) in ty.properties.iter().enumerate() {
            if let (ValueType::List(element), None) = (&property.value_type, &slots[index].value) {
                let list = self.create_list((**element).clone(), Vec::new())?;
                slots[index].value = Some(Value::List(list));
            }
        }

        let id = self.allocate();
        for (index, slot) in slots.iter().enumerate() {
            if let Some(edge) = RefEdge::for_value(id, RefSlot::Property(index), slot.value.as_ref()) {
                self.add_ref(edge);
            }
        }
        self.instances.insert(id, Instance::Complex(ComplexData { type_: ty, slots }));
        Ok(id)
    }

    /// Create a list instance outside any transaction; later duplicates of
    /// a key are dropped.
    pub fn create_list(&mut self, element_type: ValueType, values: Vec<Value>) -> Result<InstanceId> {
        let mut elements: Vec<Value> = Vec::with_capacity(values.len());
        let mut keys = Vec::with_capacity(values.len());
        for value in values {
            if let Some(cast) = element_type.cast(value, self)? {
                let key = self.key_of(&cast)?;
                if !keys.contains(&key) {
                    keys.push(key);
                    elements.push(cast);
                }
            }
        }

        let id = self.allocate();
        for element in &elements {
            if let Some(edge) = RefEdge::for_value(id, RefSlot::Element, Some(element)) {
                self.add_ref(edge);
            }
        }
        self.instances.insert(
            id,
            Instance::List(ListData {
                element_type,
                elements,
            }),
        );
        Ok(id)
    }

    fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn add_ref(&mut self, edge: RefEdge) {
        *self.refs.entry(edge).or_insert(0) += 1;
    }

    /// Committed multiplicity of an edge
    pub fn ref_count(&self, edge: &RefEdge) -> u32 {
        self.refs.get(edge).copied().unwrap_or(0)
    }

    pub fn refs(&self) -> &BTreeMap<RefEdge, u32> {
        &self.refs
    }

    /// Committed edges pointing at `child`
    pub fn references_to(&self, child: InstanceId) -> Vec<RefEdge> {
        self.refs
            .keys()
            .filter(|e| e.child == child)
            .copied()
            .collect()
    }

    /// Identity key used by lists: canonical JSON for scalars, the key
    /// property for keyed complexes, the instance id otherwise.
    pub fn key_of(&self, value: &Value) -> Result<String> {
        match value {
            Value::Simple(s) => Ok(simple_key(&s.value)),
            Value::Complex(id) => {
                let data = self.complex(*id)?;
                match data.type_.key_index() {
                    Some(k) => Ok(match data.slots[k].value.as_ref().and_then(Value::as_json) {
                        Some(json) => simple_key(json),
                        None => "null".to_string(),
                    }),
                    None => Ok(id.to_string()),
                }
            }
            Value::List(id) => Ok(id.to_string()),
        }
    }

    /// Type name for error messages
    pub fn type_name_of(&self, value: &Value) -> String {
        match value {
            Value::Simple(s) => json_type_name(&s.value).to_string(),
            Value::Complex(id) => match self.complex(*id) {
                Ok(data) => format!("complex<{}>", data.type_.id),
                Err(_) => "complex".to_string(),
            },
            Value::List(id) => match self.list(*id) {
                Ok(data) => format!("list<{}>", data.element_type),
                Err(_) => "list".to_string(),
            },
        }
    }

    /// Swap in staged instances and the new edge multiset
    pub(crate) fn install(&mut self, instances: Vec<(InstanceId, Instance)>, refs: BTreeMap<RefEdge, u32>) {
        for (id, instance) in instances {
            self.instances.insert(id, instance);
        }
        self.refs = refs;
    }
}

pub(crate) fn simple_key(json: &serde_json::Value) -> String {
    json.to_string()
}
