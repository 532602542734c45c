//! Evaluation context: resolves names, members and collections against a graph.
//!
//! Graph objects are exposed to expressions as JSON records. A record holds
//! the object's attributes plus its built-in fields (`id`, `name`,
//! `namespace`, and kind-specific ones such as `unit` or `quantity`).
//! Built-in fields shadow attributes of the same name.

use crate::graph::Graph;
use crate::types::{Attributes, Entity, Flow, Instance, Relation, Resource, Role};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Collection names available to quantifiers and aggregations.
pub const COLLECTIONS: [&str; 6] = ["entities", "resources", "flows", "instances", "roles", "relations"];

/// Name resolution state for one evaluation.
#[derive(Debug)]
pub struct EvaluationContext<'g> {
    graph: &'g Graph,
    bindings: Vec<(String, Value)>,
}

impl<'g> EvaluationContext<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            bindings: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Binds `name` to `value`, shadowing any outer binding.
    pub fn push_binding(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.push((name.into(), value));
    }

    pub fn pop_binding(&mut self) {
        self.bindings.pop();
    }

    fn binding(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    /// Resolves a variable. Dotted names read a field of a bound record.
    ///
    /// Returns `None` if the variable is unbound; a missing field is `Null`.
    pub fn resolve_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.binding(name) {
            return Some(value.clone());
        }
        let (head, path) = name.split_once('.')?;
        let record = self.binding(head)?;
        Some(field_path(record, path))
    }

    /// Resolves `object.member`.
    ///
    /// `object` is looked up first among bound variables, then as an entity,
    /// resource or role name. Returns `None` when the object does not exist;
    /// a missing member yields `Null`.
    pub fn resolve_member(&self, object: &str, member: &str) -> Option<Value> {
        let record = match self.binding(object) {
            Some(record) => record.clone(),
            None => match self.named_record(object) {
                Some(record) => record,
                None => {
                    debug!(object, member, "member access on unknown object");
                    return None;
                }
            },
        };
        let value = field_path(&record, member);
        if value.is_null() {
            debug!(object, member, "member access resolved to null");
        }
        Some(value)
    }

    fn named_record(&self, name: &str) -> Option<Value> {
        let graph = self.graph;
        if let Some(id) = graph.find_entity_by_name(name) {
            return graph.get_entity(&id).map(entity_record);
        }
        if let Some(id) = graph.find_resource_by_name(name) {
            return graph.get_resource(&id).map(resource_record);
        }
        if let Some(id) = graph.find_role_by_name(name) {
            return graph.get_role(&id).map(role_record);
        }
        None
    }

    /// Records of a named graph collection, in insertion order.
    pub fn collection(&self, name: &str) -> Option<Vec<Value>> {
        let graph = self.graph;
        let records = match name {
            "entities" => graph.all_entities().into_iter().map(entity_record).collect(),
            "resources" => graph.all_resources().into_iter().map(resource_record).collect(),
            "flows" => graph.all_flows().into_iter().map(|f| flow_record(graph, f)).collect(),
            "instances" => graph
                .all_instances()
                .into_iter()
                .map(|i| instance_record(graph, i))
                .collect(),
            "roles" => graph.all_roles().into_iter().map(role_record).collect(),
            "relations" => graph
                .all_relations()
                .into_iter()
                .map(|r| relation_record(graph, r))
                .collect(),
            _ => return None,
        };
        Some(records)
    }
}

/// Reads a dotted path inside a record. Missing steps give `Null`.
pub fn field_path(record: &Value, path: &str) -> Value {
    let mut current = record;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Converts a decimal to a JSON number, keeping integers exact.
pub fn decimal_to_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return json!(i);
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

fn base_record(attributes: &Attributes) -> Map<String, Value> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn namespace_value(namespace: &Option<String>) -> Value {
    namespace.as_ref().map(|ns| json!(ns)).unwrap_or(Value::Null)
}

pub fn entity_record(entity: &Entity) -> Value {
    let mut record = base_record(&entity.attributes);
    record.insert("id".into(), json!(entity.id.to_string()));
    record.insert("name".into(), json!(entity.name));
    record.insert("namespace".into(), namespace_value(&entity.namespace));
    Value::Object(record)
}

pub fn resource_record(resource: &Resource) -> Value {
    let mut record = base_record(&resource.attributes);
    record.insert("id".into(), json!(resource.id.to_string()));
    record.insert("name".into(), json!(resource.name));
    record.insert("unit".into(), json!(resource.unit));
    record.insert("namespace".into(), namespace_value(&resource.namespace));
    Value::Object(record)
}

pub fn role_record(role: &Role) -> Value {
    let mut record = base_record(&role.attributes);
    record.insert("id".into(), json!(role.id.to_string()));
    record.insert("name".into(), json!(role.name));
    record.insert("namespace".into(), namespace_value(&role.namespace));
    Value::Object(record)
}

pub fn flow_record(graph: &Graph, flow: &Flow) -> Value {
    let mut record = base_record(&flow.attributes);
    record.insert("id".into(), json!(flow.id.to_string()));
    record.insert("resource_id".into(), json!(flow.resource_id.to_string()));
    record.insert("from_id".into(), json!(flow.from_id.to_string()));
    record.insert("to_id".into(), json!(flow.to_id.to_string()));
    record.insert("quantity".into(), decimal_to_value(flow.quantity));
    record.insert("namespace".into(), namespace_value(&flow.namespace));
    let resource = graph.get_resource(&flow.resource_id);
    record.insert("resource".into(), json!(resource.map(|r| r.name.as_str())));
    record.insert("unit".into(), json!(resource.map(|r| r.unit.as_str())));
    record.insert("from".into(), json!(graph.get_entity(&flow.from_id).map(|e| e.name.as_str())));
    record.insert("to".into(), json!(graph.get_entity(&flow.to_id).map(|e| e.name.as_str())));
    Value::Object(record)
}

pub fn instance_record(graph: &Graph, instance: &Instance) -> Value {
    let mut record = base_record(&instance.attributes);
    record.insert("id".into(), json!(instance.id.to_string()));
    record.insert("resource_id".into(), json!(instance.resource_id.to_string()));
    record.insert("entity_id".into(), json!(instance.entity_id.to_string()));
    record.insert("namespace".into(), namespace_value(&instance.namespace));
    record.insert(
        "resource".into(),
        json!(graph.get_resource(&instance.resource_id).map(|r| r.name.as_str())),
    );
    record.insert(
        "entity".into(),
        json!(graph.get_entity(&instance.entity_id).map(|e| e.name.as_str())),
    );
    Value::Object(record)
}

pub fn relation_record(graph: &Graph, relation: &Relation) -> Value {
    let mut record = base_record(&relation.attributes);
    record.insert("id".into(), json!(relation.id.to_string()));
    record.insert("name".into(), json!(relation.name));
    record.insert("predicate".into(), json!(relation.predicate));
    record.insert("subject_role_id".into(), json!(relation.subject_role_id.to_string()));
    record.insert("object_role_id".into(), json!(relation.object_role_id.to_string()));
    record.insert(
        "via_flow_id".into(),
        json!(relation.via_flow_id.map(|id| id.to_string())),
    );
    record.insert("namespace".into(), namespace_value(&relation.namespace));
    record.insert(
        "subject".into(),
        json!(graph.get_role(&relation.subject_role_id).map(|r| r.name.as_str())),
    );
    record.insert(
        "object".into(),
        json!(graph.get_role(&relation.object_role_id).map(|r| r.name.as_str())),
    );
    Value::Object(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HasAttributes;

    fn graph() -> Graph {
        let mut graph = Graph::new();
        let mut warehouse = Entity::new("Warehouse").unwrap().with_namespace("logistics");
        warehouse.set_attribute("capacity", json!(500));
        let store = Entity::new("Store").unwrap();
        let goods = Resource::new("Goods", "kg").unwrap();
        let flow = Flow::new(goods.id, warehouse.id, store.id, Decimal::new(125, 1));
        graph.add_entity(warehouse).unwrap();
        graph.add_entity(store).unwrap();
        graph.add_resource(goods).unwrap();
        graph.add_flow(flow).unwrap();
        graph
    }

    #[test]
    fn test_member_access_on_entity() {
        let graph = graph();
        let ctx = EvaluationContext::new(&graph);
        assert_eq!(ctx.resolve_member("Warehouse", "capacity"), Some(json!(500)));
        assert_eq!(ctx.resolve_member("Warehouse", "namespace"), Some(json!("logistics")));
        assert_eq!(ctx.resolve_member("Goods", "unit"), Some(json!("kg")));
        assert_eq!(ctx.resolve_member("Warehouse", "missing"), Some(Value::Null));
        assert_eq!(ctx.resolve_member("NonExistent", "attr"), None);
    }

    #[test]
    fn test_flow_records() {
        let graph = graph();
        let ctx = EvaluationContext::new(&graph);
        let flows = ctx.collection("flows").unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0]["quantity"], json!(12.5));
        assert_eq!(flows[0]["from"], json!("Warehouse"));
        assert_eq!(flows[0]["unit"], json!("kg"));
        assert!(ctx.collection("widgets").is_none());
    }

    #[test]
    fn test_bindings_shadow_and_dotted_variables() {
        let graph = graph();
        let mut ctx = EvaluationContext::new(&graph);
        assert_eq!(ctx.resolve_variable("f"), None);
        ctx.push_binding("f", json!({"quantity": 3, "meta": {"tag": "x"}}));
        assert_eq!(ctx.resolve_variable("f.quantity"), Some(json!(3)));
        assert_eq!(ctx.resolve_variable("f.meta.tag"), Some(json!("x")));
        assert_eq!(ctx.resolve_variable("f.nope"), Some(Value::Null));
        assert_eq!(ctx.resolve_member("f", "quantity"), Some(json!(3)));
        ctx.pop_binding();
        assert_eq!(ctx.resolve_variable("f.quantity"), None);
    }

    #[test]
    fn test_decimal_to_value() {
        assert_eq!(decimal_to_value(Decimal::from(5000)), json!(5000));
        assert_eq!(decimal_to_value(Decimal::new(-25, 1)), json!(-2.5));
    }
}
