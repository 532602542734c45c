//! The graph store.
//!
//! A [`Graph`] owns every entity, resource, flow, instance, role and relation
//! of a model. Collections are insertion-ordered maps keyed by id, and
//! removal preserves the order of the remaining items. Ids are unique across all collections; inserting an id that is
//! already present is rejected. Every mutation validates before it changes
//! anything, so a failed call leaves the graph untouched.
//!
//! The graph also carries its own evaluation mode flag, read by the policy
//! evaluator. Two graphs never share that flag.

use crate::decision::{EvaluationResult, ValidationReport};
use crate::error::{Result, SeaError};
use crate::evaluator;
use crate::id::Id;
use crate::policy::{Policy, PolicyPack};
use crate::types::{Attributes, Entity, Flow, HasAttributes, Instance, Relation, Resource, Role};
use indexmap::IndexMap;
use tracing::debug;

/// A typed business graph.
#[derive(Debug, Clone)]
pub struct Graph {
    entities: IndexMap<Id, Entity>,
    resources: IndexMap<Id, Resource>,
    flows: IndexMap<Id, Flow>,
    instances: IndexMap<Id, Instance>,
    roles: IndexMap<Id, Role>,
    relations: IndexMap<Id, Relation>,
    use_three_valued_logic: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates an empty graph in three-valued evaluation mode.
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            resources: IndexMap::new(),
            flows: IndexMap::new(),
            instances: IndexMap::new(),
            roles: IndexMap::new(),
            relations: IndexMap::new(),
            use_three_valued_logic: true,
        }
    }

    /// Parses DSL source into a new graph.
    pub fn parse(source: &str) -> Result<Self> {
        crate::parser::parse_to_graph(source)
    }

    /// Prints the graph as DSL source that parses back into an equivalent graph.
    pub fn to_source(&self) -> String {
        crate::printer::print_graph(self)
    }

    /// Returns the kind of object holding `id`, if any.
    pub fn kind_of(&self, id: &Id) -> Option<&'static str> {
        if self.entities.contains_key(id) {
            Some("entity")
        } else if self.resources.contains_key(id) {
            Some("resource")
        } else if self.flows.contains_key(id) {
            Some("flow")
        } else if self.instances.contains_key(id) {
            Some("instance")
        } else if self.roles.contains_key(id) {
            Some("role")
        } else if self.relations.contains_key(id) {
            Some("relation")
        } else {
            None
        }
    }

    fn ensure_new_id(&self, id: &Id) -> Result<()> {
        match self.kind_of(id) {
            Some(existing) => {
                debug!(%id, existing, "rejected duplicate id");
                Err(SeaError::DuplicateId {
                    id: id.to_string(),
                    existing: existing.to_string(),
                })
            }
            None => Ok(()),
        }
    }

    fn ensure_present(&self, present: bool, kind: &str, id: &Id) -> Result<()> {
        if present {
            Ok(())
        } else {
            Err(SeaError::Validation(format!("{} not found: {}", kind, id)))
        }
    }

    // ----- insertion -----

    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        self.ensure_new_id(&entity.id)?;
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        self.ensure_new_id(&resource.id)?;
        self.resources.insert(resource.id, resource);
        Ok(())
    }

    /// Adds a flow. Its resource and both endpoint entities must be present.
    pub fn add_flow(&mut self, flow: Flow) -> Result<()> {
        self.ensure_new_id(&flow.id)?;
        self.ensure_present(self.has_resource(&flow.resource_id), "Resource", &flow.resource_id)?;
        self.ensure_present(self.has_entity(&flow.from_id), "Source entity", &flow.from_id)?;
        self.ensure_present(self.has_entity(&flow.to_id), "Target entity", &flow.to_id)?;
        self.flows.insert(flow.id, flow);
        Ok(())
    }

    /// Adds an instance. Its resource and entity must be present.
    pub fn add_instance(&mut self, instance: Instance) -> Result<()> {
        self.ensure_new_id(&instance.id)?;
        self.ensure_present(self.has_resource(&instance.resource_id), "Resource", &instance.resource_id)?;
        self.ensure_present(self.has_entity(&instance.entity_id), "Entity", &instance.entity_id)?;
        self.instances.insert(instance.id, instance);
        Ok(())
    }

    pub fn add_role(&mut self, role: Role) -> Result<()> {
        self.ensure_new_id(&role.id)?;
        self.roles.insert(role.id, role);
        Ok(())
    }

    /// Adds a relation. Both roles and the via-flow, if any, must be present.
    pub fn add_relation(&mut self, relation: Relation) -> Result<()> {
        self.ensure_new_id(&relation.id)?;
        self.ensure_present(self.has_role(&relation.subject_role_id), "Subject role", &relation.subject_role_id)?;
        self.ensure_present(self.has_role(&relation.object_role_id), "Object role", &relation.object_role_id)?;
        if let Some(flow_id) = &relation.via_flow_id {
            self.ensure_present(self.has_flow(flow_id), "Flow", flow_id)?;
        }
        self.relations.insert(relation.id, relation);
        Ok(())
    }

    // ----- removal -----

    /// Removes an entity that no flow or instance refers to.
    pub fn remove_entity(&mut self, id: &Id) -> Result<Entity> {
        let mut referrers: Vec<String> = self
            .flows
            .values()
            .filter(|f| f.from_id == *id || f.to_id == *id)
            .map(|f| f.id.to_string())
            .collect();
        referrers.extend(
            self.instances
                .values()
                .filter(|i| i.entity_id == *id)
                .map(|i| i.id.to_string()),
        );
        Self::ensure_unreferenced("Entity", id, &referrers)?;
        self.entities
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Entity not found: {}", id)))
    }

    /// Removes a resource that no flow or instance refers to.
    pub fn remove_resource(&mut self, id: &Id) -> Result<Resource> {
        let mut referrers: Vec<String> = self
            .flows
            .values()
            .filter(|f| f.resource_id == *id)
            .map(|f| f.id.to_string())
            .collect();
        referrers.extend(
            self.instances
                .values()
                .filter(|i| i.resource_id == *id)
                .map(|i| i.id.to_string()),
        );
        Self::ensure_unreferenced("Resource", id, &referrers)?;
        self.resources
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Resource not found: {}", id)))
    }

    /// Removes a flow that no relation routes through.
    pub fn remove_flow(&mut self, id: &Id) -> Result<Flow> {
        let referrers: Vec<String> = self
            .relations
            .values()
            .filter(|r| r.via_flow_id.as_ref() == Some(id))
            .map(|r| r.id.to_string())
            .collect();
        Self::ensure_unreferenced("Flow", id, &referrers)?;
        self.flows
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Flow not found: {}", id)))
    }

    pub fn remove_instance(&mut self, id: &Id) -> Result<Instance> {
        self.instances
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Instance not found: {}", id)))
    }

    /// Removes a role that no relation refers to.
    pub fn remove_role(&mut self, id: &Id) -> Result<Role> {
        let referrers: Vec<String> = self
            .relations
            .values()
            .filter(|r| r.subject_role_id == *id || r.object_role_id == *id)
            .map(|r| r.id.to_string())
            .collect();
        Self::ensure_unreferenced("Role", id, &referrers)?;
        self.roles
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Role not found: {}", id)))
    }

    pub fn remove_relation(&mut self, id: &Id) -> Result<Relation> {
        self.relations
            .shift_remove(id)
            .ok_or_else(|| SeaError::Validation(format!("Relation not found: {}", id)))
    }

    fn ensure_unreferenced(kind: &str, id: &Id, referrers: &[String]) -> Result<()> {
        if referrers.is_empty() {
            Ok(())
        } else {
            Err(SeaError::Validation(format!(
                "{} {} is still referenced by {}",
                kind,
                id,
                referrers.join(", ")
            )))
        }
    }

    // ----- lookup -----

    pub fn has_entity(&self, id: &Id) -> bool {
        self.entities.contains_key(id)
    }

    pub fn has_resource(&self, id: &Id) -> bool {
        self.resources.contains_key(id)
    }

    pub fn has_flow(&self, id: &Id) -> bool {
        self.flows.contains_key(id)
    }

    pub fn has_instance(&self, id: &Id) -> bool {
        self.instances.contains_key(id)
    }

    pub fn has_role(&self, id: &Id) -> bool {
        self.roles.contains_key(id)
    }

    pub fn has_relation(&self, id: &Id) -> bool {
        self.relations.contains_key(id)
    }

    pub fn get_entity(&self, id: &Id) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_resource(&self, id: &Id) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn get_flow(&self, id: &Id) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn get_instance(&self, id: &Id) -> Option<&Instance> {
        self.instances.get(id)
    }

    pub fn get_role(&self, id: &Id) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn get_relation(&self, id: &Id) -> Option<&Relation> {
        self.relations.get(id)
    }

    /// Sets an attribute on the object holding `id`, whatever its kind.
    /// Ids and references stay fixed once an object is in the graph.
    pub fn set_attribute(&mut self, id: &Id, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        let attributes = self
            .attributes_mut(id)
            .ok_or_else(|| SeaError::Validation(format!("Object not found: {}", id)))?;
        attributes.insert(key.into(), value);
        Ok(())
    }

    /// Removes an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, id: &Id, key: &str) -> Result<Option<serde_json::Value>> {
        let attributes = self
            .attributes_mut(id)
            .ok_or_else(|| SeaError::Validation(format!("Object not found: {}", id)))?;
        Ok(attributes.remove(key))
    }

    fn attributes_mut(&mut self, id: &Id) -> Option<&mut Attributes> {
        if let Some(e) = self.entities.get_mut(id) {
            return Some(e.attributes_mut());
        }
        if let Some(r) = self.resources.get_mut(id) {
            return Some(r.attributes_mut());
        }
        if let Some(f) = self.flows.get_mut(id) {
            return Some(f.attributes_mut());
        }
        if let Some(i) = self.instances.get_mut(id) {
            return Some(i.attributes_mut());
        }
        if let Some(r) = self.roles.get_mut(id) {
            return Some(r.attributes_mut());
        }
        self.relations.get_mut(id).map(|r| r.attributes_mut())
    }

    /// Returns the id of the first entity (in insertion order) named `name`.
    pub fn find_entity_by_name(&self, name: &str) -> Option<Id> {
        self.entities.values().find(|e| e.name == name).map(|e| e.id)
    }

    pub fn find_resource_by_name(&self, name: &str) -> Option<Id> {
        self.resources.values().find(|r| r.name == name).map(|r| r.id)
    }

    pub fn find_role_by_name(&self, name: &str) -> Option<Id> {
        self.roles.values().find(|r| r.name == name).map(|r| r.id)
    }

    pub fn all_entities(&self) -> Vec<&Entity> {
        self.entities.values().collect()
    }

    pub fn all_resources(&self) -> Vec<&Resource> {
        self.resources.values().collect()
    }

    pub fn all_flows(&self) -> Vec<&Flow> {
        self.flows.values().collect()
    }

    pub fn all_instances(&self) -> Vec<&Instance> {
        self.instances.values().collect()
    }

    pub fn all_roles(&self) -> Vec<&Role> {
        self.roles.values().collect()
    }

    pub fn all_relations(&self) -> Vec<&Relation> {
        self.relations.values().collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.len()
            + self.resources.len()
            + self.flows.len()
            + self.instances.len()
            + self.roles.len()
            + self.relations.len()
            == 0
    }

    // ----- adjacency -----

    /// Flows leaving `id`, in insertion order.
    pub fn flows_from(&self, id: &Id) -> Vec<&Flow> {
        self.flows.values().filter(|f| f.from_id == *id).collect()
    }

    /// Flows arriving at `id`, in insertion order.
    pub fn flows_to(&self, id: &Id) -> Vec<&Flow> {
        self.flows.values().filter(|f| f.to_id == *id).collect()
    }

    /// Entities that send flows to `id`. Each entity appears once.
    pub fn upstream_entities(&self, id: &Id) -> Vec<&Entity> {
        let mut seen = Vec::new();
        for flow in self.flows_to(id) {
            if !seen.contains(&flow.from_id) {
                seen.push(flow.from_id);
            }
        }
        seen.iter().filter_map(|i| self.entities.get(i)).collect()
    }

    /// Entities that receive flows from `id`. Each entity appears once.
    pub fn downstream_entities(&self, id: &Id) -> Vec<&Entity> {
        let mut seen = Vec::new();
        for flow in self.flows_from(id) {
            if !seen.contains(&flow.to_id) {
                seen.push(flow.to_id);
            }
        }
        seen.iter().filter_map(|i| self.entities.get(i)).collect()
    }

    // ----- evaluation -----

    /// Selects three-valued (`true`) or two-valued (`false`) evaluation.
    pub fn set_evaluation_mode(&mut self, use_three_valued_logic: bool) {
        self.use_three_valued_logic = use_three_valued_logic;
    }

    pub fn use_three_valued_logic(&self) -> bool {
        self.use_three_valued_logic
    }

    /// Decodes a JSON or YAML policy document and evaluates it.
    pub fn evaluate_policy(&self, document: &str) -> Result<EvaluationResult> {
        let policy = crate::policy::parse_policy(document)?;
        self.evaluate(&policy)
    }

    /// Evaluates a policy under this graph's evaluation mode.
    pub fn evaluate(&self, policy: &Policy) -> Result<EvaluationResult> {
        evaluator::evaluate_policy(self, policy)
    }

    /// Evaluates every policy of a pack and collects their violations.
    pub fn validate(&self, pack: &PolicyPack) -> ValidationReport {
        evaluator::validate_pack(self, pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn supply_chain() -> (Graph, Id, Id, Id, Id) {
        let mut graph = Graph::new();
        let supplier = Entity::new("Supplier").unwrap();
        let dc = Entity::new("Distribution Center").unwrap();
        let store = Entity::new("Retail Store").unwrap();
        let goods = Resource::new("Electronics", "units").unwrap();
        let (s, d, r, g) = (supplier.id, dc.id, store.id, goods.id);
        graph.add_entity(supplier).unwrap();
        graph.add_entity(dc).unwrap();
        graph.add_entity(store).unwrap();
        graph.add_resource(goods).unwrap();
        graph.add_flow(Flow::new(g, s, d, Decimal::from(5000))).unwrap();
        graph.add_flow(Flow::new(g, d, r, Decimal::from(3000))).unwrap();
        (graph, s, d, r, g)
    }

    #[test]
    fn test_counts_and_adjacency() {
        let (graph, s, d, r, _) = supply_chain();
        assert_eq!(graph.entity_count(), 3);
        assert_eq!(graph.resource_count(), 1);
        assert_eq!(graph.flow_count(), 2);

        let incoming = graph.flows_to(&d);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].quantity, Decimal::from(5000));
        let outgoing = graph.flows_from(&d);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].quantity, Decimal::from(3000));

        assert_eq!(graph.upstream_entities(&d)[0].id, s);
        assert_eq!(graph.downstream_entities(&d)[0].id, r);
    }

    #[test]
    fn test_duplicate_id_rejected_across_kinds() {
        let mut graph = Graph::new();
        let entity = Entity::new("A").unwrap();
        let mut role = Role::new("A").unwrap();
        role.id = entity.id;
        graph.add_entity(entity.clone()).unwrap();
        assert!(matches!(graph.add_entity(entity), Err(SeaError::DuplicateId { .. })));
        assert!(matches!(graph.add_role(role), Err(SeaError::DuplicateId { .. })));
        assert_eq!(graph.entity_count(), 1);
        assert_eq!(graph.role_count(), 0);
    }

    #[test]
    fn test_flow_requires_known_endpoints() {
        let mut graph = Graph::new();
        let resource = Resource::new("Cash", "USD").unwrap();
        let rid = resource.id;
        graph.add_resource(resource).unwrap();
        let flow = Flow::new(rid, Id::generate(), Id::generate(), Decimal::ONE);
        assert!(graph.add_flow(flow).is_err());
        assert_eq!(graph.flow_count(), 0);
    }

    #[test]
    fn test_find_by_name_first_match() {
        let mut graph = Graph::new();
        let first = Entity::new("Depot").unwrap().with_namespace("a");
        let second = Entity::new("Depot").unwrap().with_namespace("b");
        let first_id = first.id;
        graph.add_entity(first).unwrap();
        graph.add_entity(second).unwrap();
        assert_eq!(graph.find_entity_by_name("Depot"), Some(first_id));
        assert_eq!(graph.find_entity_by_name("Nowhere"), None);
    }

    #[test]
    fn test_remove_referenced_entity_fails_atomically() {
        let (mut graph, s, _, r, _) = supply_chain();
        assert!(graph.remove_entity(&s).is_err());
        assert_eq!(graph.entity_count(), 3);

        let flow_id = graph.flows_to(&r)[0].id;
        graph.remove_flow(&flow_id).unwrap();
        let removed = graph.remove_entity(&r).unwrap();
        assert_eq!(removed.name, "Retail Store");
        assert_eq!(graph.entity_count(), 2);
        assert!(graph.get_entity(&s).is_some());
        assert_eq!(graph.all_entities()[1].name, "Distribution Center");
    }

    #[test]
    fn test_evaluation_mode_is_per_graph() {
        let mut a = Graph::new();
        let b = Graph::new();
        assert!(a.use_three_valued_logic());
        a.set_evaluation_mode(false);
        assert!(!a.use_three_valued_logic());
        assert!(b.use_three_valued_logic());
    }

    #[test]
    fn test_attribute_update_after_insert() {
        let (mut graph, s, _, _, g) = supply_chain();
        graph.set_attribute(&s, "rating", serde_json::json!("A")).unwrap();
        graph.set_attribute(&g, "hazardous", serde_json::json!(false)).unwrap();
        assert_eq!(
            graph.get_entity(&s).unwrap().get_attribute("rating"),
            Some(&serde_json::json!("A"))
        );
        assert_eq!(graph.get_entity(&s).unwrap().id, s);
        assert_eq!(graph.find_entity_by_name("Supplier"), Some(s));

        let old = graph.remove_attribute(&s, "rating").unwrap();
        assert_eq!(old, Some(serde_json::json!("A")));
        assert!(graph.get_entity(&s).unwrap().get_attribute("rating").is_none());

        let missing = Id::generate();
        assert!(graph.set_attribute(&missing, "x", serde_json::json!(1)).is_err());
    }

    #[test]
    fn test_removal_keeps_insertion_order() {
        let mut graph = Graph::new();
        let ids: Vec<Id> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| {
                let entity = Entity::new(*name).unwrap();
                let id = entity.id;
                graph.add_entity(entity).unwrap();
                id
            })
            .collect();
        graph.remove_entity(&ids[1]).unwrap();
        let names: Vec<&str> = graph.all_entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "D"]);
        assert_eq!(graph.get_entity(&ids[3]).unwrap().name, "D");
        assert!(!graph.has_entity(&ids[1]));
        assert!(graph.remove_entity(&ids[1]).is_err());
    }

    #[test]
    fn test_instance_requires_resource_and_entity() {
        let (mut graph, s, _, _, g) = supply_chain();
        let no_entity = Instance::new(g, Id::generate());
        assert!(graph.add_instance(no_entity).is_err());
        let no_resource = Instance::new(Id::generate(), s);
        assert!(graph.add_instance(no_resource).is_err());
        assert_eq!(graph.instance_count(), 0);

        let instance = Instance::new(g, s);
        let instance_id = instance.id;
        graph.add_instance(instance).unwrap();
        assert!(graph.has_instance(&instance_id));

        let err = graph.remove_resource(&g).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(graph.resource_count(), 1);

        let removed = graph.remove_instance(&instance_id).unwrap();
        assert_eq!(removed.entity_id, s);
        assert_eq!(graph.instance_count(), 0);
        assert!(graph.remove_instance(&instance_id).is_err());
    }

    #[test]
    fn test_referenced_role_cannot_be_removed() {
        let mut graph = Graph::new();
        let buyer = Role::new("Buyer").unwrap();
        let seller = Role::new("Seller").unwrap();
        let (b, sl) = (buyer.id, seller.id);
        graph.add_role(buyer).unwrap();
        graph.add_role(seller).unwrap();

        let dangling = Relation::new("Broken", b, "pays", Id::generate()).unwrap();
        assert!(graph.add_relation(dangling).is_err());

        let relation = Relation::new("Payment", b, "pays", sl).unwrap();
        let relation_id = relation.id;
        graph.add_relation(relation).unwrap();

        assert!(graph.remove_role(&sl).is_err());
        assert_eq!(graph.role_count(), 2);
        graph.remove_relation(&relation_id).unwrap();
        graph.remove_role(&sl).unwrap();
        assert_eq!(graph.role_count(), 1);
    }
}
