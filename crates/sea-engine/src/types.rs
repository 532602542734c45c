//! Core graph primitives: entities, resources, flows, instances, roles and relations.

use crate::error::{Result, SeaError};
use crate::id::Id;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form attribute map. Values are stored as given and never interpreted.
pub type Attributes = HashMap<String, serde_json::Value>;

/// Attribute access shared by every graph primitive.
pub trait HasAttributes {
    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    /// Sets an attribute, replacing any previous value under `key`.
    fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes_mut().insert(key.into(), value);
    }

    /// Gets an attribute, or `None` if the key is absent.
    fn get_attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes().get(key)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SeaError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// A business actor or location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    /// Creates a new entity with a fresh id.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        require_non_empty("Entity name", &name)?;
        Ok(Self {
            id: Id::generate(),
            name,
            namespace: None,
            attributes: Attributes::new(),
        })
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Something that moves between entities, measured in a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Id,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Resource {
    /// Creates a new resource. Both name and unit must be non-empty.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let unit = unit.into();
        require_non_empty("Resource name", &name)?;
        require_non_empty("Resource unit", &unit)?;
        Ok(Self {
            id: Id::generate(),
            name,
            unit,
            namespace: None,
            attributes: Attributes::new(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A quantity of a resource moving from one entity to another.
///
/// Construction only checks that the ids are well formed; whether they
/// exist is checked when the flow is added to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub resource_id: Id,
    pub from_id: Id,
    pub to_id: Id,
    pub quantity: Decimal,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Flow {
    /// Creates a new flow from typed ids.
    pub fn new(resource_id: Id, from_id: Id, to_id: Id, quantity: Decimal) -> Self {
        Self {
            id: Id::generate(),
            resource_id,
            from_id,
            to_id,
            quantity,
            namespace: None,
            attributes: Attributes::new(),
        }
    }

    /// Creates a new flow from textual ids, failing on any malformed id.
    pub fn from_strs(resource_id: &str, from_id: &str, to_id: &str, quantity: Decimal) -> Result<Self> {
        Ok(Self::new(
            Id::parse(resource_id)?,
            Id::parse(from_id)?,
            Id::parse(to_id)?,
            quantity,
        ))
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A concrete holding of a resource by an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Id,
    pub resource_id: Id,
    pub entity_id: Id,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Instance {
    pub fn new(resource_id: Id, entity_id: Id) -> Self {
        Self {
            id: Id::generate(),
            resource_id,
            entity_id,
            namespace: None,
            attributes: Attributes::new(),
        }
    }

    /// Creates a new instance from textual ids.
    pub fn from_strs(resource_id: &str, entity_id: &str) -> Result<Self> {
        Ok(Self::new(Id::parse(resource_id)?, Id::parse(entity_id)?))
    }

    /// Sets the namespace. Independent of the resource's and the entity's namespaces.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A named role that relations connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        require_non_empty("Role name", &name)?;
        Ok(Self {
            id: Id::generate(),
            name,
            namespace: None,
            attributes: Attributes::new(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A predicate linking a subject role to an object role, optionally via a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: Id,
    pub name: String,
    pub subject_role_id: Id,
    pub predicate: String,
    pub object_role_id: Id,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub via_flow_id: Option<Id>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Relation {
    /// Creates a new relation. Role ids need not exist yet.
    pub fn new(
        name: impl Into<String>,
        subject_role_id: Id,
        predicate: impl Into<String>,
        object_role_id: Id,
    ) -> Result<Self> {
        let name = name.into();
        let predicate = predicate.into();
        require_non_empty("Relation name", &name)?;
        require_non_empty("Relation predicate", &predicate)?;
        Ok(Self {
            id: Id::generate(),
            name,
            subject_role_id,
            predicate,
            object_role_id,
            namespace: None,
            via_flow_id: None,
            attributes: Attributes::new(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_via_flow(mut self, flow_id: Id) -> Self {
        self.via_flow_id = Some(flow_id);
        self
    }
}

impl HasAttributes for Entity {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for Resource {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for Flow {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for Instance {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for Role {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for Relation {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}
