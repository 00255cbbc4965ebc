//! The graph handle: graph-level remote operations, batch mode, and the
//! factory for vertices, edges and compute jobs.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trueno_core::{Algorithm, ComponentType, Envelope, Filter};

use crate::client::{DriverError, RpcClient};
use crate::component::{AsComponent, Component, ComponentDocument, ComponentRef};
use crate::compute::Compute;
use crate::edge::Edge;
use crate::procedures;
use crate::records::{self, Entity};
use crate::vertex::Vertex;

/// One queued mutation, sent as part of an `ex_bulk` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: String,
    pub content: Value,
}

#[derive(Debug, Default)]
struct Batch {
    open: bool,
    operations: Vec<Operation>,
}

#[derive(Debug, Default)]
struct Registry {
    vertices: Vec<ComponentRef>,
    edges: Vec<ComponentRef>,
}

struct GraphInner {
    client: RpcClient,
    component: RwLock<Component>,
    batch: Mutex<Batch>,
    registry: Mutex<Registry>,
}

/// A named graph on the remote service.
///
/// Clone is cheap (inner Arc); clones share attributes, batch queue and
/// registry. Vertices, edges and compute jobs created from a graph hold a
/// [`GraphRef`] back to it.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

/// Non-owning link from an entity to its graph.
#[derive(Clone)]
pub struct GraphRef(Weak<GraphInner>);

impl GraphRef {
    pub fn upgrade(&self) -> Option<Graph> {
        self.0.upgrade().map(|inner| Graph { inner })
    }
}

impl fmt::Debug for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.upgrade().map(|g| g.label());
        f.debug_tuple("GraphRef").field(&label).finish()
    }
}

impl Graph {
    pub fn new(client: RpcClient, label: impl Into<String>) -> Self {
        let mut component = Component::new(ComponentType::Graph);
        component.set_label(label);
        Self::from_component(client, component)
    }

    fn from_component(client: RpcClient, component: Component) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                client,
                component: RwLock::new(component),
                batch: Mutex::new(Batch::default()),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.inner.client
    }

    pub fn downgrade(&self) -> GraphRef {
        GraphRef(Arc::downgrade(&self.inner))
    }

    /// Whether both handles refer to the same graph object.
    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Attributes ────────────────────────────────────────────────

    /// A copy of the graph's current identity and attributes.
    pub fn snapshot(&self) -> Component {
        self.inner.component.read().clone()
    }

    pub fn id(&self) -> Option<String> {
        self.inner.component.read().id().map(str::to_string)
    }

    pub fn set_id(&self, id: impl Into<String>) {
        self.inner.component.write().set_id(id);
    }

    pub fn label(&self) -> String {
        self.inner.component.read().label().to_string()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        self.inner.component.write().set_label(label);
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner.component.read().property(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.component.write().set_property(key, value);
    }

    pub fn remove_property(&self, key: &str) -> Result<Value, DriverError> {
        self.inner.component.write().remove_property(key)
    }

    pub fn computed(&self, algorithm: &str, property: &str) -> Option<Value> {
        self.inner
            .component
            .read()
            .computed(algorithm, property)
            .cloned()
    }

    pub fn set_computed(
        &self,
        algorithm: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.inner
            .component
            .write()
            .set_computed(algorithm, property, value);
    }

    pub fn remove_computed(&self, algorithm: &str, property: &str) -> Result<Value, DriverError> {
        self.inner
            .component
            .write()
            .remove_computed(algorithm, property)
    }

    pub fn meta(&self, key: &str) -> Option<Value> {
        self.inner.component.read().meta(key).cloned()
    }

    pub fn set_meta(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.component.write().set_meta(key, value);
    }

    pub fn remove_meta(&self, key: &str) -> Result<Value, DriverError> {
        self.inner.component.write().remove_meta(key)
    }

    pub fn is_stale(&self) -> bool {
        self.inner.component.read().is_stale()
    }

    /// Check that the graph has a label and make it the graph's id.
    pub fn validate_graph_label(&self) -> Result<String, DriverError> {
        let mut component = self.inner.component.write();
        if component.label().is_empty() {
            tracing::warn!("Graph label is not set");
            return Err(DriverError::MissingLabel);
        }
        let label = component.label().to_string();
        component.set_id(label.clone());
        Ok(label)
    }

    /// The label members address the graph by. Unlike
    /// [`Graph::validate_graph_label`] this leaves the graph's id alone.
    pub(crate) fn member_label(&self) -> Result<String, DriverError> {
        let label = self.label();
        if label.is_empty() {
            tracing::warn!("Graph label is not set");
            return Err(DriverError::MissingLabel);
        }
        Ok(label)
    }

    // ── Factory ───────────────────────────────────────────────────

    pub fn filter(&self) -> Filter {
        Filter::new()
    }

    pub fn add_vertex(&self) -> Vertex {
        let vertex = Vertex::attached(self);
        self.inner
            .registry
            .lock()
            .vertices
            .push(vertex.reference());
        vertex
    }

    pub fn add_edge(&self) -> Edge {
        let edge = Edge::attached(self);
        self.inner
            .registry
            .lock()
            .edges
            .push(edge.reference());
        edge
    }

    /// An edge with both endpoints set.
    pub fn add_edge_between(&self, source: impl Into<String>, target: impl Into<String>) -> Edge {
        let mut edge = self.add_edge();
        edge.set_source(source);
        edge.set_target(target);
        edge
    }

    pub fn compute(&self, algorithm: Algorithm) -> Compute {
        let mut compute = Compute::attached(self);
        compute.set_algorithm(algorithm);
        compute
    }

    /// References of the vertices created through [`Graph::add_vertex`].
    pub fn vertices(&self) -> Vec<ComponentRef> {
        self.inner.registry.lock().vertices.clone()
    }

    /// References of the edges created through [`Graph::add_edge`].
    pub fn edges(&self) -> Vec<ComponentRef> {
        self.inner.registry.lock().edges.clone()
    }

    // ── Batch mode ────────────────────────────────────────────────

    /// Start queueing persists instead of sending them.
    pub fn open_batch(&self) {
        self.inner.batch.lock().open = true;
        tracing::debug!(graph = %self.label(), "Batch opened");
    }

    pub fn is_batch_open(&self) -> bool {
        self.inner.batch.lock().open
    }

    /// Flush the queue with [`Graph::bulk`]. Batch mode ends once the flush
    /// succeeds.
    pub async fn close_batch(&self) -> Result<Value, DriverError> {
        let result = self.bulk().await?;
        self.inner.batch.lock().open = false;
        Ok(result)
    }

    /// Append an operation to the queue. Never sends anything.
    pub fn push_operation(&self, op: impl Into<String>, content: Value) {
        let op = op.into();
        tracing::trace!(graph = %self.label(), op = %op, "Operation queued");
        self.inner.batch.lock().operations.push(Operation { op, content });
    }

    pub fn pending_operations(&self) -> Vec<Operation> {
        self.inner.batch.lock().operations.clone()
    }

    /// Queue `content` if batch mode is open, in one critical section.
    /// Hands `content` back when it is not.
    pub(crate) fn try_enqueue(&self, op: &str, content: Value) -> Result<(), Value> {
        let mut batch = self.inner.batch.lock();
        if !batch.open {
            return Err(content);
        }
        batch.operations.push(Operation {
            op: op.to_string(),
            content,
        });
        Ok(())
    }

    /// Send every queued operation in one `ex_bulk` call.
    ///
    /// An empty queue resolves to `{"took": 0, "errors": false, "items": []}`
    /// without touching the connection. The queue is taken in one critical
    /// section, so a concurrent flush finds it empty. On failure the taken
    /// operations go back to the front, ahead of anything queued meanwhile.
    pub async fn bulk(&self) -> Result<Value, DriverError> {
        let operations = std::mem::take(&mut self.inner.batch.lock().operations);
        if operations.is_empty() {
            tracing::debug!(graph = %self.label(), "Nothing to flush");
            return Ok(json!({ "took": 0, "errors": false, "items": [] }));
        }
        let label = match self.validate_graph_label() {
            Ok(label) => label,
            Err(e) => {
                self.restore_operations(operations);
                return Err(e);
            }
        };

        let flushed = operations.len();
        let payload = json!({ "graph": label, "operations": operations });
        tracing::debug!(graph = %label, operations = flushed, "Flushing batch");

        match self
            .client()
            .call(procedures::BULK, Envelope::with_payload(payload))
            .await
        {
            Ok(result) => {
                self.inner.batch.lock().open = false;
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(graph = %label, error = %e, "Batch flush failed, queue kept");
                self.restore_operations(operations);
                Err(e)
            }
        }
    }

    /// Put operations taken by a failed flush back ahead of the queue.
    fn restore_operations(&self, operations: Vec<Operation>) {
        let mut batch = self.inner.batch.lock();
        let queued = std::mem::replace(&mut batch.operations, operations);
        batch.operations.extend(queued);
    }

    // ── Remote operations ─────────────────────────────────────────

    /// Fetch the vertices, edges or graphs matching `filter`.
    pub async fn fetch(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Vec<Entity>, DriverError> {
        let result = self.query(procedures::FETCH, kind, filter).await?;
        records::entities(procedures::FETCH, kind, &result, self)
    }

    /// Count the components of `kind` matching `filter`; returns the raw
    /// response document.
    pub async fn count(
        &self,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Value, DriverError> {
        self.query(procedures::COUNT, kind, filter).await
    }

    async fn query(
        &self,
        procedure: &'static str,
        kind: ComponentType,
        filter: Option<&Filter>,
    ) -> Result<Value, DriverError> {
        if !kind.is_queryable() {
            return Err(DriverError::InvalidComponent {
                found: kind,
                operation: procedure,
            });
        }
        let label = self.validate_graph_label()?;

        let mut payload = json!({ "graph": label, "type": kind });
        if let Some(filter) = filter {
            payload["ftr"] = filter.to_value()?;
        }
        self.client()
            .call(procedure, Envelope::with_payload(payload))
            .await
    }

    /// Create the graph on the server.
    pub async fn create(&self) -> Result<Value, DriverError> {
        let label = self.validate_graph_label()?;
        let payload = json!({
            "graph": label,
            "type": ComponentType::Graph,
            "obj": self.document()?,
        });
        let result = self
            .client()
            .call(procedures::CREATE, Envelope::with_payload(payload))
            .await?;
        self.inner
            .component
            .write()
            .adopt_id(procedures::CREATE, &result)?;
        tracing::info!(graph = %label, "Graph created");
        Ok(result)
    }

    /// Open an existing graph.
    pub async fn open(&self) -> Result<Value, DriverError> {
        let label = self.validate_graph_label()?;
        let payload = json!({
            "graph": label,
            "type": ComponentType::Graph,
            "mask": true,
            "obj": self.document()?,
        });
        self.client()
            .call(procedures::OPEN, Envelope::with_payload(payload))
            .await
    }

    /// Persist the graph's own attributes. Queued when batch mode is open,
    /// in which case the result is `Value::Null`.
    pub async fn persist(&self) -> Result<Value, DriverError> {
        let label = self.validate_graph_label()?;
        let payload = json!({
            "graph": label,
            "type": ComponentType::Graph,
            "obj": self.document()?,
        });
        let payload = match self.try_enqueue(procedures::PERSIST, payload) {
            Ok(()) => return Ok(Value::Null),
            Err(payload) => payload,
        };

        let result = self
            .client()
            .call(procedures::PERSIST, Envelope::with_payload(payload))
            .await?;
        let mut component = self.inner.component.write();
        component.adopt_id(procedures::PERSIST, &result)?;
        component.set_stale(false);
        Ok(result)
    }

    /// Destroy the graph, or with `kind` set, the graph's components of
    /// that type matching `filter`.
    pub async fn destroy(
        &self,
        kind: Option<ComponentType>,
        filter: Option<&Filter>,
    ) -> Result<Value, DriverError> {
        let label = self.validate_graph_label()?;
        let target = match kind {
            Some(kind) if !kind.is_queryable() => {
                return Err(DriverError::InvalidComponent {
                    found: kind,
                    operation: procedures::DESTROY,
                });
            }
            Some(kind) => kind,
            None => ComponentType::Graph,
        };
        let id = self
            .inner
            .component
            .read()
            .require_id()?
            .to_string();

        let ftr = match filter {
            Some(filter) => filter.to_value()?,
            None => json!([]),
        };
        let payload = json!({
            "graph": label,
            "type": target,
            "obj": { "id": id },
            "ftr": ftr,
        });
        let result = self
            .client()
            .call(procedures::DESTROY, Envelope::with_payload(payload))
            .await?;
        if target == ComponentType::Graph {
            self.inner.component.write().set_stale(true);
            tracing::debug!(graph = %label, "Graph destroyed");
        }
        Ok(result)
    }

    // ── Wire form ─────────────────────────────────────────────────

    fn document(&self) -> Result<Value, DriverError> {
        Ok(serde_json::to_value(self.inner.component.read().to_document())?)
    }

    pub fn to_document(&self) -> Result<Value, DriverError> {
        self.document()
    }

    /// Build a graph handle from a `{id, label, prop, comp, meta}` document.
    pub fn from_document(client: RpcClient, doc: Value) -> Result<Self, DriverError> {
        let doc: ComponentDocument = serde_json::from_value(doc)?;
        Ok(Self::from_component(
            client,
            Component::from_document(ComponentType::Graph, doc),
        ))
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let component = self.inner.component.read();
        f.debug_struct("Graph")
            .field("label", &component.label())
            .field("id", &component.id())
            .field("batch_open", &self.is_batch_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AckHandler, EventHandler, Transport};
    use trueno_core::DriverConfig;

    struct Offline;

    impl Transport for Offline {
        fn connect(&self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn on(&self, _event: &str, _handler: EventHandler) {}
        fn emit(&self, _event: &str, _payload: Value, _ack: AckHandler) -> anyhow::Result<()> {
            anyhow::bail!("offline")
        }
        fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn graph(label: &str) -> Graph {
        RpcClient::new(Arc::new(Offline), DriverConfig::default()).graph(label)
    }

    #[test]
    fn test_validate_label_assigns_id() {
        let g = graph("citations");
        assert_eq!(g.id(), None);
        assert_eq!(g.validate_graph_label().unwrap(), "citations");
        assert_eq!(g.id().as_deref(), Some("citations"));

        let unnamed = graph("");
        assert!(matches!(
            unnamed.validate_graph_label(),
            Err(DriverError::MissingLabel)
        ));
    }

    #[test]
    fn test_registry_tracks_created_entities() {
        let g = graph("citations");
        let v = g.add_vertex();
        let e = g.add_edge_between("1", "2");
        let _c = g.compute(Algorithm::PageRank);

        assert_eq!(g.vertices(), vec![v.reference()]);
        assert_eq!(g.edges(), vec![e.reference()]);
    }

    #[test]
    fn test_push_operation_queues_without_batch_flag() {
        let g = graph("citations");
        g.push_operation("ex_persist", json!({"k": 1}));
        assert!(!g.is_batch_open());
        assert_eq!(
            g.pending_operations(),
            vec![Operation {
                op: "ex_persist".into(),
                content: json!({"k": 1})
            }]
        );
    }

    #[test]
    fn test_try_enqueue_respects_flag() {
        let g = graph("citations");
        assert_eq!(g.try_enqueue("ex_persist", json!(1)), Err(json!(1)));
        g.open_batch();
        assert_eq!(g.try_enqueue("ex_persist", json!(2)), Ok(()));
        assert_eq!(g.pending_operations().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_without_label_keeps_queue() {
        let g = graph("");
        g.open_batch();
        g.push_operation("ex_persist", json!({"k": 1}));
        assert!(matches!(g.bulk().await, Err(DriverError::MissingLabel)));
        assert_eq!(g.pending_operations().len(), 1);
        assert!(g.is_batch_open());
    }

    #[test]
    fn test_clones_share_state() {
        let g = graph("citations");
        let h = g.clone();
        h.set_property("owner", "lab");
        assert_eq!(g.property("owner"), Some(json!("lab")));
        assert!(g.ptr_eq(&h));
        assert_eq!(g.downgrade().upgrade().map(|x| x.label()), Some("citations".into()));
    }

    #[test]
    fn test_document_round_trip() {
        let g = graph("citations");
        g.set_property("version", 2);
        g.set_meta("owner", "lab");
        let doc = g.to_document().unwrap();
        assert_eq!(doc["label"], "citations");
        assert_eq!(doc["prop"]["version"], 2);

        let back = Graph::from_document(g.client().clone(), doc).unwrap();
        assert_eq!(back.label(), "citations");
        assert_eq!(back.meta("owner"), Some(json!("lab")));
    }
}
