//! Vertices and their neighborhood queries.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trueno_core::{ComponentType, Direction, Envelope, Filter};

use crate::client::DriverError;
use crate::component::sealed::ComponentMut;
use crate::component::{
    destroy_member, lenient_partition, persist_member, AsComponent, Component, ComponentDocument,
    Persisted,
};
use crate::graph::{Graph, GraphRef};
use crate::procedures;
use crate::records::{self, Entity};

/// A graph vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    component: Component,
    graph: Option<GraphRef>,
    partition: u32,
}

#[derive(Serialize, Deserialize)]
struct VertexDocument {
    #[serde(flatten)]
    base: ComponentDocument,
    #[serde(default, deserialize_with = "lenient_partition")]
    partition: u32,
}

impl Vertex {
    /// A detached vertex. Attach it with [`Vertex::set_graph`] before any
    /// remote operation.
    pub fn new() -> Self {
        Self {
            component: Component::new(ComponentType::Vertex),
            graph: None,
            partition: 0,
        }
    }

    pub(crate) fn attached(graph: &Graph) -> Self {
        let mut vertex = Self::new();
        vertex.set_graph(graph);
        vertex
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
            kind: ComponentType::Vertex,
        })
    }

    // ── Persistence ───────────────────────────────────────────────

    /// Store the vertex. In batch mode the write is queued on the parent
    /// graph and the result is `Value::Null`; otherwise the id reported by
    /// the server replaces the local one.
    pub async fn persist(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        match persist_member(&graph, ComponentType::Vertex, self.to_document()?).await? {
            Persisted::Queued => Ok(Value::Null),
            Persisted::Stored(result) => {
                self.component.adopt_id(procedures::PERSIST, &result)?;
                self.component.set_stale(false);
                Ok(result)
            }
        }
    }

    /// Delete the vertex on the server. The local value stays usable and is
    /// marked stale.
    pub async fn destroy(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        graph.member_label()?;
        let id = self.component.require_id()?.to_string();
        let result = destroy_member(&graph, ComponentType::Vertex, &id, None).await?;
        self.component.set_stale(true);
        Ok(result)
    }

    // ── Neighborhood ──────────────────────────────────────────────

    /// Vertices or edges adjacent to this vertex in `direction`.
    pub async fn neighbors(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
        direction: Direction,
    ) -> Result<Vec<Entity>, DriverError> {
        let result = self
            .adjacency(procedures::NEIGHBORS, kind, filter, direction)
            .await?;
        let graph = self.parent()?;
        records::entities(procedures::NEIGHBORS, kind, &result, &graph)
    }

    pub async fn in_neighbors(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Vec<Entity>, DriverError> {
        self.neighbors(kind, filter, Direction::In).await
    }

    pub async fn out_neighbors(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Vec<Entity>, DriverError> {
        self.neighbors(kind, filter, Direction::Out).await
    }

    /// Number of adjacent vertices or edges in `direction`; returns the raw
    /// response document.
    pub async fn degree(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
        direction: Direction,
    ) -> Result<Value, DriverError> {
        self.adjacency(procedures::DEGREE, kind, filter, direction)
            .await
    }

    pub async fn in_degree(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Value, DriverError> {
        self.degree(kind, filter, Direction::In).await
    }

    pub async fn out_degree(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Value, DriverError> {
        self.degree(kind, filter, Direction::Out).await
    }

    async fn adjacency(
        &self,
        procedure: &'static str,
        kind: ComponentType,
        filter: Option<&Filter>,
        direction: Direction,
    ) -> Result<Value, DriverError> {
        if !matches!(kind, ComponentType::Vertex | ComponentType::Edge) {
            return Err(DriverError::InvalidComponent {
                found: kind,
                operation: procedure,
            });
        }
        let graph = self.parent()?;
        let label = graph.member_label()?;
        let id = self.component.require_id()?;

        let mut payload = json!({
            "graph": label,
            "id": id,
            "dir": direction,
            "cmp": kind,
        });
        if let Some(filter) = filter {
            payload["ftr"] = filter.to_value()?;
        }
        graph
            .client()
            .call(procedure, Envelope::with_payload(payload))
            .await
    }

    // ── Wire form ─────────────────────────────────────────────────

    pub fn to_document(&self) -> Result<Value, DriverError> {
        Ok(serde_json::to_value(VertexDocument {
            base: self.component.to_document(),
            partition: self.partition,
        })?)
    }

    pub fn from_document(doc: Value, graph: Option<&Graph>) -> Result<Self, DriverError> {
        let doc: VertexDocument = serde_json::from_value(doc)?;
        Ok(Self {
            component: Component::from_document(ComponentType::Vertex, doc.base),
            graph: graph.map(Graph::downgrade),
            partition: doc.partition,
        })
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new()
    }
}

impl AsComponent for Vertex {
    fn component(&self) -> &Component {
        &self.component
    }
}

impl ComponentMut for Vertex {
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
}
