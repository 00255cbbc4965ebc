//! State shared by every graph entity, and the helpers entities use to
//! persist and destroy themselves.
//!
//! Entities embed a [`Component`] and expose it through [`AsComponent`],
//! which forwards the attribute accessors. There is no base-class chain:
//! each entity owns its own extra fields and wire document.
//!
//! Mutable access to the embedded component stays inside the crate, so an
//! entity's type is fixed once it is built:
//!
//! ```compile_fail
//! use trueno_driver::{AsComponent, Component, ComponentType, Vertex};
//!
//! let mut v = Vertex::new();
//! *v.component_mut() = Component::new(ComponentType::Edge);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use trueno_core::{ComponentType, Envelope, Filter};
use uuid::Uuid;

use crate::client::DriverError;
use crate::graph::Graph;
use crate::procedures;

/// Stable client-side handle of an entity, independent of its server id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef(pub Uuid);

impl ComponentRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComponentRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and attributes of a graph entity.
///
/// `properties` are user data, `computed` holds algorithm outputs keyed by
/// algorithm name and then property name, `meta` is system metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    reference: ComponentRef,
    kind: ComponentType,
    id: Option<String>,
    label: String,
    properties: Map<String, Value>,
    computed: BTreeMap<String, Map<String, Value>>,
    meta: Map<String, Value>,
    stale: bool,
}

impl Component {
    pub(crate) fn new(kind: ComponentType) -> Self {
        Self {
            reference: ComponentRef::new(),
            kind,
            id: None,
            label: String::new(),
            properties: Map::new(),
            computed: BTreeMap::new(),
            meta: Map::new(),
            stale: false,
        }
    }

    pub fn reference(&self) -> ComponentRef {
        self.reference
    }

    pub fn kind(&self) -> ComponentType {
        self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Set the id. An empty string clears it.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = (!id.is_empty()).then_some(id);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    // ── Properties ────────────────────────────────────────────────

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &str) -> Result<Value, DriverError> {
        self.properties
            .remove(key)
            .ok_or_else(|| DriverError::PropertyNotFound(key.to_string()))
    }

    // ── Computed ──────────────────────────────────────────────────

    pub fn computed_properties(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.computed
    }

    pub fn computed(&self, algorithm: &str, property: &str) -> Option<&Value> {
        self.computed.get(algorithm).and_then(|m| m.get(property))
    }

    pub fn set_computed(
        &mut self,
        algorithm: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.computed
            .entry(algorithm.into())
            .or_default()
            .insert(property.into(), value.into());
    }

    /// Remove one computed property. The algorithm entry goes away with its
    /// last property.
    pub fn remove_computed(&mut self, algorithm: &str, property: &str) -> Result<Value, DriverError> {
        let not_found = || DriverError::ComputedNotFound {
            algorithm: algorithm.to_string(),
            property: property.to_string(),
        };
        let entry = self.computed.get_mut(algorithm).ok_or_else(not_found)?;
        let value = entry.remove(property).ok_or_else(not_found)?;
        if entry.is_empty() {
            self.computed.remove(algorithm);
        }
        Ok(value)
    }

    // ── Meta ──────────────────────────────────────────────────────

    pub fn meta_attributes(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn remove_meta(&mut self, key: &str) -> Result<Value, DriverError> {
        self.meta
            .remove(key)
            .ok_or_else(|| DriverError::MetaNotFound(key.to_string()))
    }

    /// Set once the entity was destroyed on the server; cleared by the next
    /// successful persist.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn set_stale(&mut self, stale: bool) {
        self.stale = stale;
    }

    // ── Wire form ─────────────────────────────────────────────────

    pub(crate) fn to_document(&self) -> ComponentDocument {
        ComponentDocument {
            id: self.id.clone().unwrap_or_default(),
            label: self.label.clone(),
            prop: self.properties.clone(),
            comp: self.computed.clone(),
            meta: self.meta.clone(),
        }
    }

    pub(crate) fn from_document(kind: ComponentType, doc: ComponentDocument) -> Self {
        let mut component = Self::new(kind);
        component.set_id(doc.id);
        component.label = doc.label;
        component.properties = doc.prop;
        component.computed = doc.comp;
        component.meta = doc.meta;
        component
    }

    /// Take the id the server reported in a persist response.
    ///
    /// An entity that already has an id keeps it when the response carries
    /// none; an entity without one fails.
    pub(crate) fn adopt_id(&mut self, procedure: &str, response: &Value) -> Result<(), DriverError> {
        match returned_id(response) {
            Some(id) => {
                tracing::debug!(kind = %self.kind, id = %id, "Assigned id");
                self.set_id(id);
                Ok(())
            }
            None if self.has_id() => Ok(()),
            None => Err(DriverError::protocol(procedure, "response carries no id")),
        }
    }

    pub(crate) fn require_id(&self) -> Result<&str, DriverError> {
        self.id().ok_or(DriverError::MissingId { kind: self.kind })
    }
}

pub(crate) mod sealed {
    use super::Component;

    pub trait ComponentMut {
        fn component_mut(&mut self) -> &mut Component;
    }
}

/// Uniform attribute access for every entity type. Implemented by the
/// entities of this crate only.
pub trait AsComponent: sealed::ComponentMut {
    fn component(&self) -> &Component;

    fn reference(&self) -> ComponentRef {
        self.component().reference()
    }

    fn kind(&self) -> ComponentType {
        self.component().kind()
    }

    fn id(&self) -> Option<&str> {
        self.component().id()
    }

    fn set_id(&mut self, id: impl Into<String>) {
        self.component_mut().set_id(id);
    }

    fn label(&self) -> &str {
        self.component().label()
    }

    fn set_label(&mut self, label: impl Into<String>) {
        self.component_mut().set_label(label);
    }

    fn property(&self, key: &str) -> Option<&Value> {
        self.component().property(key)
    }

    fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.component_mut().set_property(key, value);
    }

    fn remove_property(&mut self, key: &str) -> Result<Value, DriverError> {
        self.component_mut().remove_property(key)
    }

    fn computed(&self, algorithm: &str, property: &str) -> Option<&Value> {
        self.component().computed(algorithm, property)
    }

    fn set_computed(
        &mut self,
        algorithm: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.component_mut().set_computed(algorithm, property, value);
    }

    fn remove_computed(&mut self, algorithm: &str, property: &str) -> Result<Value, DriverError> {
        self.component_mut().remove_computed(algorithm, property)
    }

    fn meta(&self, key: &str) -> Option<&Value> {
        self.component().meta(key)
    }

    fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.component_mut().set_meta(key, value);
    }

    fn remove_meta(&mut self, key: &str) -> Result<Value, DriverError> {
        self.component_mut().remove_meta(key)
    }

    fn is_stale(&self) -> bool {
        self.component().is_stale()
    }
}

/// `{"id", "label", "prop", "comp", "meta"}` as exchanged with the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct ComponentDocument {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub prop: Map<String, Value>,
    #[serde(default)]
    pub comp: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// Ids and endpoint references may come back as numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        other => id_text(&other)
            .ok_or_else(|| D::Error::custom(format!("expected a string or number, got {other}"))),
    }
}

/// Partitions may come back as numbers, numeric strings, or empty.
pub(crate) fn lenient_partition<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid partition {n}"))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid partition '{s}'"))),
        other => Err(D::Error::custom(format!("invalid partition {other}"))),
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The id reported by a persist response, from `result._id`/`result.id`
/// or from the first array element that carries one.
fn returned_id(response: &Value) -> Option<String> {
    fn from_object(v: &Value) -> Option<String> {
        ["_id", "id"]
            .iter()
            .filter_map(|k| v.get(k))
            .filter_map(id_text)
            .find(|id| !id.is_empty())
    }

    match response.get("result")? {
        Value::Array(items) => items.iter().find_map(from_object),
        other => from_object(other),
    }
}

/// Outcome of persisting a member entity.
pub(crate) enum Persisted {
    /// Appended to the parent graph's batch queue.
    Queued,
    /// Sent and acknowledged; carries the response.
    Stored(Value),
}

/// Send (or queue) an `ex_persist` for a vertex, edge or compute.
pub(crate) async fn persist_member(
    graph: &Graph,
    kind: ComponentType,
    obj: Value,
) -> Result<Persisted, DriverError> {
    let label = graph.member_label()?;
    let payload = json!({ "graph": label, "type": kind, "obj": obj });

    let payload = match graph.try_enqueue(procedures::PERSIST, payload) {
        Ok(()) => {
            tracing::trace!(graph = %label, kind = %kind, "Persist queued");
            return Ok(Persisted::Queued);
        }
        Err(payload) => payload,
    };

    let response = graph
        .client()
        .call(procedures::PERSIST, Envelope::with_payload(payload))
        .await?;
    Ok(Persisted::Stored(response))
}

/// Send an `ex_destroy` for one identified entity.
pub(crate) async fn destroy_member(
    graph: &Graph,
    kind: ComponentType,
    id: &str,
    filter: Option<&Filter>,
) -> Result<Value, DriverError> {
    let label = graph.member_label()?;
    let ftr = match filter {
        Some(filter) => filter.to_value()?,
        None => json!([]),
    };
    let payload = json!({
        "graph": label,
        "type": kind,
        "obj": { "id": id },
        "ftr": ftr,
    });
    graph
        .client()
        .call(procedures::DESTROY, Envelope::with_payload(payload))
        .await
}
