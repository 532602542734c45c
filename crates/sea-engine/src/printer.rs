//! Renders a graph back into DSL source.
//!
//! Output order is entities, resources, flows, instances, roles, relations,
//! so every name is declared before it is referenced. Attributes and ids have
//! no DSL form and are not printed. References are written by name, and the
//! parser resolves a name to its first declaration.

use crate::graph::Graph;
use crate::id::Id;
use crate::types::Relation;
use std::fmt;

/// Display adapter printing a graph as DSL source.
pub struct SourcePrinter<'g> {
    graph: &'g Graph,
}

impl<'g> SourcePrinter<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    fn relation(&self, f: &mut fmt::Formatter<'_>, relation: &Relation) -> fmt::Result {
        let role_name = |id: &Id| self.graph.get_role(id).map(|r| r.name.as_str()).unwrap_or_default();
        write!(f, "Relation {}", quoted(&relation.name))?;
        namespace(f, relation.namespace.as_deref())?;
        writeln!(f)?;
        writeln!(f, "  subject: {}", quoted(role_name(&relation.subject_role_id)))?;
        writeln!(f, "  predicate: {}", quoted(&relation.predicate))?;
        writeln!(f, "  object: {}", quoted(role_name(&relation.object_role_id)))?;
        let via = relation
            .via_flow_id
            .as_ref()
            .and_then(|id| self.graph.get_flow(id))
            .and_then(|flow| self.graph.get_resource(&flow.resource_id));
        if let Some(resource) = via {
            writeln!(f, "  via: flow {}", quoted(&resource.name))?;
        }
        Ok(())
    }
}

impl fmt::Display for SourcePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph;
        let mut sections = 0;
        let mut section = |f: &mut fmt::Formatter<'_>, empty: bool| -> fmt::Result {
            if !empty {
                if sections > 0 {
                    writeln!(f)?;
                }
                sections += 1;
            }
            Ok(())
        };

        section(f, graph.entity_count() == 0)?;
        for entity in graph.all_entities() {
            write!(f, "Entity {}", quoted(&entity.name))?;
            namespace(f, entity.namespace.as_deref())?;
            writeln!(f)?;
        }

        section(f, graph.resource_count() == 0)?;
        for resource in graph.all_resources() {
            write!(f, "Resource {} {}", quoted(&resource.name), word(&resource.unit))?;
            namespace(f, resource.namespace.as_deref())?;
            writeln!(f)?;
        }

        section(f, graph.flow_count() == 0)?;
        for flow in graph.all_flows() {
            let (Some(resource), Some(from), Some(to)) = (
                graph.get_resource(&flow.resource_id),
                graph.get_entity(&flow.from_id),
                graph.get_entity(&flow.to_id),
            ) else {
                continue;
            };
            writeln!(
                f,
                "Flow {} from {} to {} quantity {}",
                quoted(&resource.name),
                quoted(&from.name),
                quoted(&to.name),
                flow.quantity
            )?;
        }

        section(f, graph.instance_count() == 0)?;
        for instance in graph.all_instances() {
            let (Some(resource), Some(entity)) = (
                graph.get_resource(&instance.resource_id),
                graph.get_entity(&instance.entity_id),
            ) else {
                continue;
            };
            write!(f, "Instance {} at {}", quoted(&resource.name), quoted(&entity.name))?;
            namespace(f, instance.namespace.as_deref())?;
            writeln!(f)?;
        }

        section(f, graph.role_count() == 0)?;
        for role in graph.all_roles() {
            write!(f, "Role {}", quoted(&role.name))?;
            namespace(f, role.namespace.as_deref())?;
            writeln!(f)?;
        }

        section(f, graph.relation_count() == 0)?;
        for relation in graph.all_relations() {
            self.relation(f, relation)?;
        }
        Ok(())
    }
}

/// Prints a graph as DSL source.
pub fn print_graph(graph: &Graph) -> String {
    SourcePrinter::new(graph).to_string()
}

fn namespace(f: &mut fmt::Formatter<'_>, namespace: Option<&str>) -> fmt::Result {
    match namespace {
        Some(ns) => write!(f, " in {}", word(ns)),
        None => Ok(()),
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// A bare identifier when the lexer would read it as one, quoted otherwise.
fn word(s: &str) -> String {
    let mut chars = s.chars();
    let bare = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if bare {
        s.to_string()
    } else {
        quoted(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const MODEL: &str = r#"
Entity "Supplier" in supply_chain
Entity "Distribution Center" in logistics
Resource "Electronics" units in products
Resource "Cash" "US dollars"
Flow "Electronics" from "Supplier" to "Distribution Center" quantity 5000
Flow "Cash" from "Distribution Center" to "Supplier" quantity -12.50
Instance "Electronics" at "Distribution Center" in stock
Role "Payer"
Role "Payee" in finance
Relation "Payment"
  subject: "Payer"
  predicate: "pays \"net 30\""
  object: "Payee"
  via: flow "Cash"
"#;

    #[test]
    fn test_print_layout() {
        let graph = Graph::parse("Entity \"A\"\nEntity \"B\" in x\nResource \"R\" kg\nFlow \"R\" from \"A\" to \"B\" quantity 2.5").unwrap();
        assert_eq!(
            print_graph(&graph),
            "Entity \"A\"\nEntity \"B\" in x\n\nResource \"R\" kg\n\nFlow \"R\" from \"A\" to \"B\" quantity 2.5\n"
        );
        assert_eq!(print_graph(&Graph::new()), "");
    }

    #[test]
    fn test_round_trip_preserves_the_model() {
        let graph = Graph::parse(MODEL).unwrap();
        let printed = print_graph(&graph);
        let reparsed = Graph::parse(&printed).unwrap();

        assert_eq!(reparsed.entity_count(), 2);
        assert_eq!(reparsed.resource_count(), 2);
        assert_eq!(reparsed.flow_count(), 2);
        assert_eq!(reparsed.instance_count(), 1);
        assert_eq!(reparsed.role_count(), 2);
        assert_eq!(reparsed.relation_count(), 1);

        let names = |g: &Graph| g.all_entities().iter().map(|e| (e.name.clone(), e.namespace.clone())).collect::<Vec<_>>();
        assert_eq!(names(&graph), names(&reparsed));

        let cash = reparsed.all_resources()[1];
        assert_eq!(cash.unit, "US dollars");
        let quantities: Vec<Decimal> = reparsed.all_flows().iter().map(|f| f.quantity).collect();
        assert_eq!(quantities, vec![Decimal::from(5000), Decimal::new(-1250, 2)]);

        let instance = reparsed.all_instances()[0];
        assert_eq!(instance.namespace.as_deref(), Some("stock"));
        assert_eq!(Some(instance.entity_id), reparsed.find_entity_by_name("Distribution Center"));

        let relation = reparsed.all_relations()[0];
        assert_eq!(relation.predicate, "pays \"net 30\"");
        assert_eq!(relation.via_flow_id, Some(reparsed.all_flows()[1].id));

        assert_eq!(print_graph(&reparsed), printed);
    }
}
