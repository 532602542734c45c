//! DSL parser.
//!
//! One statement per logical line; `Relation` statements continue on the
//! following `subject:` / `predicate:` / `object:` / `via:` lines.
//!
//! ```text
//! Entity "<name>" [in <namespace>]
//! Resource "<name>" <unit> [in <namespace>]
//! Flow "<resource>" from "<entity>" to "<entity>" quantity <number>
//! Instance "<resource>" at "<entity>" [in <namespace>]
//! Role "<name>" [in <namespace>]
//! Relation "<name>" [in <namespace>]
//!   subject: "<role>"
//!   predicate: "<text>"
//!   object: "<role>"
//!   [via: flow "<resource>"]
//! ```
//!
//! Names used by `Flow`, `Instance` and `Relation` must be declared earlier in the same
//! source. `//` and `#` start comments. Parsing builds a fresh graph and only
//! returns it when every statement succeeded.

use crate::error::{Result, SeaError};
use crate::graph::Graph;
use crate::id::Id;
use crate::types::{Entity, Flow, Instance, Relation, Resource, Role};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

const TOKEN_PATTERN: &str = r#"^\s*(?:(?P<comment>//.*|#.*)|"(?P<string>(?:[^"\\]|\\.)*)"|(?P<number>[-+]?\d+(?:\.\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_.\-]*)|(?P<colon>:)|(?P<other>\S))"#;

const CLAUSES: [&str; 4] = ["subject", "predicate", "object", "via"];

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Str(String),
    Number(String),
    Ident(String),
    Colon,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    column: usize,
}

/// A tokenized source line.
#[derive(Debug)]
struct Line<'a> {
    number: usize,
    text: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Line<'a> {
    fn error(&self, column: usize, message: impl Into<String>) -> SeaError {
        SeaError::Syntax {
            line: self.number,
            column,
            message: message.into(),
            text: self.text.trim().to_string(),
        }
    }

    fn keyword(&self) -> Option<&str> {
        match self.tokens.first().map(|t| &t.kind) {
            Some(TokenKind::Ident(word)) => Some(word.as_str()),
            _ => None,
        }
    }
}

struct Lexer {
    regex: Regex,
}

impl Lexer {
    fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(TOKEN_PATTERN)?,
        })
    }

    fn tokenize<'a>(&self, number: usize, text: &'a str) -> Result<Line<'a>> {
        let mut line = Line {
            number,
            text,
            tokens: Vec::new(),
        };
        let mut pos = 0;
        while pos < text.len() && !text[pos..].trim().is_empty() {
            let caps = match self.regex.captures(&text[pos..]) {
                Some(caps) => caps,
                None => break,
            };
            let whole = match caps.get(0) {
                Some(whole) => whole,
                None => break,
            };
            let start = pos + whole.as_str().len() - whole.as_str().trim_start().len();
            let column = text[..start].chars().count() + 1;
            pos += whole.end();

            let kind = if caps.name("comment").is_some() {
                break;
            } else if let Some(s) = caps.name("string") {
                TokenKind::Str(s.as_str().replace("\\\"", "\"").replace("\\\\", "\\"))
            } else if let Some(n) = caps.name("number") {
                TokenKind::Number(n.as_str().to_string())
            } else if let Some(i) = caps.name("ident") {
                TokenKind::Ident(i.as_str().to_string())
            } else if caps.name("colon").is_some() {
                TokenKind::Colon
            } else {
                let other = caps.name("other").map(|m| m.as_str()).unwrap_or_default();
                let message = if other == "\"" {
                    "unterminated string".to_string()
                } else {
                    format!("unexpected character '{}'", other)
                };
                return Err(line.error(column, message));
            };
            line.tokens.push(Token { kind, column });
        }
        Ok(line)
    }
}

/// Cursor over the tokens of one logical statement.
struct Cursor<'l, 'a> {
    line: &'l Line<'a>,
    pos: usize,
}

impl<'l, 'a> Cursor<'l, 'a> {
    fn new(line: &'l Line<'a>) -> Self {
        Self { line, pos: 0 }
    }

    fn column(&self) -> usize {
        self.line
            .tokens
            .get(self.pos)
            .map(|t| t.column)
            .unwrap_or_else(|| self.line.text.trim_end().chars().count() + 1)
    }

    fn next(&mut self) -> Option<&'l Token> {
        let token = self.line.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.line.tokens.get(self.pos).map(|t| &t.kind),
            Some(TokenKind::Ident(word)) if word == keyword
        )
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let column = self.column();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(word)) if word == keyword => Ok(()),
            _ => Err(self.line.error(column, format!("expected '{}'", keyword))),
        }
    }

    fn expect_colon(&mut self) -> Result<()> {
        let column = self.column();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Colon) => Ok(()),
            _ => Err(self.line.error(column, "expected ':'")),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String> {
        let column = self.column();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => Ok(s.clone()),
            _ => Err(self.line.error(column, format!("expected quoted {}", what))),
        }
    }

    /// A quoted string or a bare identifier.
    fn expect_word(&mut self, what: &str) -> Result<String> {
        let column = self.column();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) | Some(TokenKind::Ident(s)) => Ok(s.clone()),
            _ => Err(self.line.error(column, format!("expected {}", what))),
        }
    }

    fn expect_number(&mut self) -> Result<Decimal> {
        let column = self.column();
        match self.next().map(|t| &t.kind) {
            Some(TokenKind::Number(n)) => Decimal::from_str(n.trim_start_matches('+'))
                .map_err(|e| self.line.error(column, format!("invalid number '{}': {}", n, e))),
            _ => Err(self.line.error(column, "expected a number")),
        }
    }

    fn optional_namespace(&mut self) -> Result<Option<String>> {
        if self.peek_keyword("in") {
            self.pos += 1;
            Ok(Some(self.expect_word("namespace")?))
        } else {
            Ok(None)
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.line.tokens.get(self.pos) {
            None => Ok(()),
            Some(t) => Err(self.line.error(t.column, "unexpected trailing input")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Entity {
        name: String,
        namespace: Option<String>,
        line: usize,
    },
    Resource {
        name: String,
        unit: String,
        namespace: Option<String>,
        line: usize,
    },
    Flow {
        resource: String,
        from: String,
        to: String,
        quantity: Decimal,
        line: usize,
    },
    Instance {
        resource: String,
        entity: String,
        namespace: Option<String>,
        line: usize,
    },
    Role {
        name: String,
        namespace: Option<String>,
        line: usize,
    },
    Relation {
        name: String,
        namespace: Option<String>,
        subject: String,
        predicate: String,
        object: String,
        via_flow: Option<String>,
        line: usize,
    },
}

/// Parses DSL source into a new graph.
pub fn parse_to_graph(source: &str) -> Result<Graph> {
    let statements = parse_statements(source)?;
    let mut builder = GraphBuilder::default();
    for statement in statements {
        builder.apply(statement)?;
    }
    debug!(
        entities = builder.graph.entity_count(),
        resources = builder.graph.resource_count(),
        flows = builder.graph.flow_count(),
        instances = builder.graph.instance_count(),
        roles = builder.graph.role_count(),
        relations = builder.graph.relation_count(),
        "parsed source"
    );
    Ok(builder.graph)
}

fn parse_statements(source: &str) -> Result<Vec<Statement>> {
    let lexer = Lexer::new()?;
    let lines = source
        .lines()
        .enumerate()
        .map(|(i, text)| lexer.tokenize(i + 1, text))
        .collect::<Result<Vec<_>>>()?;

    let mut statements = Vec::new();
    let mut iter = lines.iter().filter(|l| !l.tokens.is_empty()).peekable();
    while let Some(line) = iter.next() {
        let mut cursor = Cursor::new(line);
        let keyword = match line.keyword() {
            Some(keyword) => keyword,
            None => return Err(line.error(cursor.column(), "expected a statement keyword")),
        };
        cursor.pos = 1;
        let statement = match keyword {
            "Entity" => {
                let name = cursor.expect_string("entity name")?;
                let namespace = cursor.optional_namespace()?;
                cursor.expect_end()?;
                Statement::Entity {
                    name,
                    namespace,
                    line: line.number,
                }
            }
            "Resource" => {
                let name = cursor.expect_string("resource name")?;
                let unit = cursor.expect_word("unit")?;
                let namespace = cursor.optional_namespace()?;
                cursor.expect_end()?;
                Statement::Resource {
                    name,
                    unit,
                    namespace,
                    line: line.number,
                }
            }
            "Flow" => {
                let resource = cursor.expect_string("resource name")?;
                cursor.expect_keyword("from")?;
                let from = cursor.expect_string("source entity name")?;
                cursor.expect_keyword("to")?;
                let to = cursor.expect_string("target entity name")?;
                cursor.expect_keyword("quantity")?;
                let quantity = cursor.expect_number()?;
                cursor.expect_end()?;
                Statement::Flow {
                    resource,
                    from,
                    to,
                    quantity,
                    line: line.number,
                }
            }
            "Instance" => {
                let resource = cursor.expect_string("resource name")?;
                cursor.expect_keyword("at")?;
                let entity = cursor.expect_string("entity name")?;
                let namespace = cursor.optional_namespace()?;
                cursor.expect_end()?;
                Statement::Instance {
                    resource,
                    entity,
                    namespace,
                    line: line.number,
                }
            }
            "Role" => {
                let name = cursor.expect_string("role name")?;
                let namespace = cursor.optional_namespace()?;
                cursor.expect_end()?;
                Statement::Role {
                    name,
                    namespace,
                    line: line.number,
                }
            }
            "Relation" => {
                let name = cursor.expect_string("relation name")?;
                let namespace = cursor.optional_namespace()?;
                let mut clauses = RelationClauses::default();
                clauses.read(&mut cursor)?;
                while let Some(next) = iter.peek() {
                    if !next.keyword().is_some_and(|k| CLAUSES.contains(&k)) {
                        break;
                    }
                    let mut continuation = Cursor::new(*next);
                    clauses.read(&mut continuation)?;
                    iter.next();
                }
                clauses.finish(name, namespace, line)?
            }
            other if CLAUSES.contains(&other) => {
                return Err(line.error(1, format!("'{}:' clause outside a Relation", other)))
            }
            other => {
                let column = line.tokens.first().map(|t| t.column).unwrap_or(1);
                return Err(line.error(column, format!("unknown statement '{}'", other)));
            }
        };
        statements.push(statement);
    }
    Ok(statements)
}

#[derive(Debug, Default)]
struct RelationClauses {
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
    via_flow: Option<String>,
}

impl RelationClauses {
    /// Reads every `clause: value` pair left on the cursor.
    fn read(&mut self, cursor: &mut Cursor<'_, '_>) -> Result<()> {
        while cursor.pos < cursor.line.tokens.len() {
            let column = cursor.column();
            let clause = match cursor.next().map(|t| &t.kind) {
                Some(TokenKind::Ident(word)) if CLAUSES.contains(&word.as_str()) => word.clone(),
                _ => return Err(cursor.line.error(column, "expected a relation clause")),
            };
            cursor.expect_colon()?;
            let slot = match clause.as_str() {
                "subject" => &mut self.subject,
                "predicate" => &mut self.predicate,
                "object" => &mut self.object,
                _ => {
                    cursor.expect_keyword("flow")?;
                    &mut self.via_flow
                }
            };
            if slot.is_some() {
                return Err(cursor.line.error(column, format!("duplicate '{}' clause", clause)));
            }
            *slot = Some(cursor.expect_string(&clause)?);
        }
        Ok(())
    }

    fn finish(self, name: String, namespace: Option<String>, line: &Line<'_>) -> Result<Statement> {
        let missing = |clause: &str| line.error(1, format!("Relation \"{}\" is missing '{}:'", name, clause));
        let subject = self.subject.ok_or_else(|| missing("subject"))?;
        let predicate = self.predicate.ok_or_else(|| missing("predicate"))?;
        let object = self.object.ok_or_else(|| missing("object"))?;
        Ok(Statement::Relation {
            name,
            namespace,
            subject,
            predicate,
            object,
            via_flow: self.via_flow,
            line: line.number,
        })
    }
}

/// Applies statements to a fresh graph, resolving names as it goes.
#[derive(Default)]
struct GraphBuilder {
    graph: Graph,
    declared: HashSet<(&'static str, String, Option<String>)>,
}

impl GraphBuilder {
    fn declare(&mut self, kind: &'static str, name: &str, namespace: &Option<String>, line: usize) -> Result<()> {
        if !self.declared.insert((kind, name.to_string(), namespace.clone())) {
            return Err(SeaError::DuplicateDeclaration {
                kind: kind.to_string(),
                name: name.to_string(),
                line,
            });
        }
        Ok(())
    }

    fn resolve(found: Option<Id>, kind: &str, name: &str, line: usize) -> Result<Id> {
        found.ok_or_else(|| SeaError::UnresolvedReference {
            kind: kind.to_string(),
            name: name.to_string(),
            line,
        })
    }

    fn apply(&mut self, statement: Statement) -> Result<()> {
        debug!(?statement, "applying statement");
        match statement {
            Statement::Entity { name, namespace, line } => {
                self.declare("entity", &name, &namespace, line)?;
                let mut entity = Entity::new(name)?;
                entity.namespace = namespace;
                self.graph.add_entity(entity)
            }
            Statement::Resource {
                name,
                unit,
                namespace,
                line,
            } => {
                self.declare("resource", &name, &namespace, line)?;
                let mut resource = Resource::new(name, unit)?;
                resource.namespace = namespace;
                self.graph.add_resource(resource)
            }
            Statement::Flow {
                resource,
                from,
                to,
                quantity,
                line,
            } => {
                let resource_id = Self::resolve(self.graph.find_resource_by_name(&resource), "resource", &resource, line)?;
                let from_id = Self::resolve(self.graph.find_entity_by_name(&from), "entity", &from, line)?;
                let to_id = Self::resolve(self.graph.find_entity_by_name(&to), "entity", &to, line)?;
                self.graph.add_flow(Flow::new(resource_id, from_id, to_id, quantity))
            }
            Statement::Instance {
                resource,
                entity,
                namespace,
                line,
            } => {
                let resource_id = Self::resolve(self.graph.find_resource_by_name(&resource), "resource", &resource, line)?;
                let entity_id = Self::resolve(self.graph.find_entity_by_name(&entity), "entity", &entity, line)?;
                let mut instance = Instance::new(resource_id, entity_id);
                instance.namespace = namespace;
                self.graph.add_instance(instance)
            }
            Statement::Role { name, namespace, line } => {
                self.declare("role", &name, &namespace, line)?;
                let mut role = Role::new(name)?;
                role.namespace = namespace;
                self.graph.add_role(role)
            }
            Statement::Relation {
                name,
                namespace,
                subject,
                predicate,
                object,
                via_flow,
                line,
            } => {
                self.declare("relation", &name, &namespace, line)?;
                let subject_id = Self::resolve(self.graph.find_role_by_name(&subject), "role", &subject, line)?;
                let object_id = Self::resolve(self.graph.find_role_by_name(&object), "role", &object, line)?;
                let mut relation = Relation::new(name, subject_id, predicate, object_id)?;
                relation.namespace = namespace;
                if let Some(resource) = via_flow {
                    let flow_id = self
                        .graph
                        .all_flows()
                        .into_iter()
                        .find(|f| {
                            self.graph
                                .get_resource(&f.resource_id)
                                .is_some_and(|r| r.name == resource)
                        })
                        .map(|f| f.id);
                    relation.via_flow_id = Some(Self::resolve(flow_id, "flow", &resource, line)?);
                }
                self.graph.add_relation(relation)
            }
        }
    }
}
