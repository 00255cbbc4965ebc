//! Edges between two vertices.
//!
//! An edge is identified by the id the server assigns. The `(source, target)`
//! pair is a lookup key only: two edges may connect the same vertices.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trueno_core::{ComponentType, Envelope};

use crate::client::DriverError;
use crate::component::sealed::ComponentMut;
use crate::component::{
    destroy_member, lenient_partition, persist_member, string_or_number, AsComponent, Component,
    ComponentDocument, Persisted,
};
use crate::graph::{Graph, GraphRef};
use crate::procedures;
use crate::records;
use crate::vertex::Vertex;

#[derive(Debug, Clone)]
pub struct Edge {
    component: Component,
    graph: Option<GraphRef>,
    source: String,
    target: String,
    partition: u32,
}

#[derive(Serialize, Deserialize)]
struct EdgeDocument {
    #[serde(flatten)]
    base: ComponentDocument,
    #[serde(default, deserialize_with = "string_or_number")]
    source: String,
    #[serde(default, deserialize_with = "string_or_number")]
    target: String,
    #[serde(default, deserialize_with = "lenient_partition")]
    partition: u32,
}

impl Edge {
    pub fn new() -> Self {
        Self {
            component: Component::new(ComponentType::Edge),
            graph: None,
            source: String::new(),
            target: String::new(),
            partition: 0,
        }
    }

    pub(crate) fn attached(graph: &Graph) -> Self {
        let mut edge = Self::new();
        edge.set_graph(graph);
        edge
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// `(source, target)` once both are set.
    pub fn endpoint_key(&self) -> Option<(&str, &str)> {
        if self.source.is_empty() || self.target.is_empty() {
            return None;
        }
        Some((&self.source, &self.target))
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn set_partition(&mut self, partition: u32) {
        self.partition = partition;
    }

    pub fn graph(&self) -> Option<Graph> {
        self.graph.as_ref().and_then(GraphRef::upgrade)
    }

    pub fn set_graph(&mut self, graph: &Graph) {
        self.graph = Some(graph.downgrade());
    }

    fn parent(&self) -> Result<Graph, DriverError> {
        self.graph().ok_or(DriverError::MissingGraph {
            kind: ComponentType::Edge,
        })
    }

    /// Store the edge. Both endpoints must be set. In batch mode the write is
    /// queued and the result is `Value::Null`.
    pub async fn persist(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        graph.member_label()?;
        if self.endpoint_key().is_none() {
            tracing::warn!(from = %self.source, to = %self.target, "Edge endpoints not set");
            return Err(DriverError::MissingEndpoints);
        }

        match persist_member(&graph, ComponentType::Edge, self.to_document()?).await? {
            Persisted::Queued => Ok(Value::Null),
            Persisted::Stored(result) => {
                self.component.adopt_id(procedures::PERSIST, &result)?;
                self.component.set_stale(false);
                Ok(result)
            }
        }
    }

    pub async fn destroy(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        graph.member_label()?;
        let id = self.component.require_id()?.to_string();
        let result = destroy_member(&graph, ComponentType::Edge, &id, None).await?;
        self.component.set_stale(true);
        Ok(result)
    }

    /// The two vertices this edge connects, as stored on the server.
    pub async fn vertices(&self) -> Result<Vec<Vertex>, DriverError> {
        let graph = self.parent()?;
        let label = graph.member_label()?;
        let id = self.component.require_id()?;

        let payload = json!({ "graph": label, "id": id });
        let result = graph
            .client()
            .call(procedures::VERTICES, Envelope::with_payload(payload))
            .await?;

        records::entities(procedures::VERTICES, ComponentType::Vertex, &result, &graph)?
            .into_iter()
            .map(|entity| {
                entity
                    .into_vertex()
                    .ok_or_else(|| DriverError::protocol(procedures::VERTICES, "expected vertices"))
            })
            .collect()
    }

    pub fn to_document(&self) -> Result<Value, DriverError> {
        Ok(serde_json::to_value(EdgeDocument {
            base: self.component.to_document(),
            source: self.source.clone(),
            target: self.target.clone(),
            partition: self.partition,
        })?)
    }

    pub fn from_document(doc: Value, graph: Option<&Graph>) -> Result<Self, DriverError> {
        let doc: EdgeDocument = serde_json::from_value(doc)?;
        Ok(Self {
            component: Component::from_document(ComponentType::Edge, doc.base),
            graph: graph.map(Graph::downgrade),
            source: doc.source,
            target: doc.target,
            partition: doc.partition,
        })
    }
}

impl Default for Edge {
    fn default() -> Self {
        Self::new()
    }
}

impl AsComponent for Edge {
    fn component(&self) -> &Component {
        &self.component
    }
}

impl ComponentMut for Edge {
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
}
