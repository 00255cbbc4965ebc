//! Conversion of search results into typed entities.
//!
//! Fetch and neighbor responses look like
//! `{"result": [{"_id": "...", "_source": {<entity document>}}, ...]}`.

use serde_json::Value;
use trueno_core::ComponentType;

use crate::client::DriverError;
use crate::component::AsComponent;
use crate::edge::Edge;
use crate::graph::Graph;
use crate::vertex::Vertex;

/// A fetched entity of whichever type was asked for.
#[derive(Debug, Clone)]
pub enum Entity {
    Graph(Graph),
    Vertex(Vertex),
    Edge(Edge),
}

impl Entity {
    pub fn kind(&self) -> ComponentType {
        match self {
            Self::Graph(_) => ComponentType::Graph,
            Self::Vertex(_) => ComponentType::Vertex,
            Self::Edge(_) => ComponentType::Edge,
        }
    }

    pub fn id(&self) -> Option<String> {
        match self {
            Self::Graph(g) => g.id(),
            Self::Vertex(v) => v.id().map(str::to_string),
            Self::Edge(e) => e.id().map(str::to_string),
        }
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_vertex(self) -> Option<Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_edge(self) -> Option<Edge> {
        match self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_graph(self) -> Option<Graph> {
        match self {
            Self::Graph(g) => Some(g),
            _ => None,
        }
    }
}

/// Convert every record of `response` into an entity of `kind`.
/// Vertices and edges are attached to `graph`.
pub(crate) fn entities(
    procedure: &str,
    kind: ComponentType,
    response: &Value,
    graph: &Graph,
) -> Result<Vec<Entity>, DriverError> {
    let records = response
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| DriverError::protocol(procedure, "result is not a list of records"))?;

    tracing::debug!(procedure, kind = %kind, records = records.len(), "Converting records");

    records
        .iter()
        .map(|record| {
            let doc = source_document(procedure, record)?;
            let entity = match kind {
                ComponentType::Vertex => Entity::Vertex(Vertex::from_document(doc, Some(graph))?),
                ComponentType::Edge => Entity::Edge(Edge::from_document(doc, Some(graph))?),
                ComponentType::Graph => {
                    Entity::Graph(Graph::from_document(graph.client().clone(), doc)?)
                }
                other => {
                    return Err(DriverError::InvalidComponent {
                        found: other,
                        operation: "record conversion",
                    })
                }
            };
            Ok(entity)
        })
        .collect()
}

/// The entity document of one record: `_source` (or the record itself when
/// it has none), with `_id` copied into `id` if the document lacks an id.
fn source_document(procedure: &str, record: &Value) -> Result<Value, DriverError> {
    let mut doc = record.get("_source").unwrap_or(record).clone();
    let Some(fields) = doc.as_object_mut() else {
        return Err(DriverError::protocol(procedure, "record is not an object"));
    };

    let has_id = match fields.get("id") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    if !has_id {
        if let Some(server_id) = record.get("_id") {
            fields.insert("id".to_string(), server_id.clone());
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_document_fills_id() {
        let doc = source_document(
            "ex_fetch",
            &json!({"_id": "AV1", "_source": {"label": "paper", "id": ""}}),
        )
        .unwrap();
        assert_eq!(doc["id"], "AV1");

        let doc = source_document(
            "ex_fetch",
            &json!({"_id": "AV1", "_source": {"id": "own"}}),
        )
        .unwrap();
        assert_eq!(doc["id"], "own");
    }

    #[test]
    fn test_source_document_rejects_scalars() {
        assert!(matches!(
            source_document("ex_fetch", &json!({"_source": 3})),
            Err(DriverError::Protocol { .. })
        ));
    }
}
