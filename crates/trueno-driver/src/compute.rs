//! Compute jobs run by the service's analytics cluster.
//!
//! Deploying returns a job id; polling [`Compute::job_status`] until the
//! status is terminal is up to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use trueno_core::{Algorithm, ComponentType, Envelope};

use crate::client::DriverError;
use crate::component::sealed::ComponentMut;
use crate::component::{
    destroy_member, persist_member, AsComponent, Component, ComponentDocument, Persisted,
};
use crate::graph::{Graph, GraphRef};
use crate::procedures;

#[derive(Debug, Clone)]
pub struct Compute {
    component: Component,
    graph: Option<GraphRef>,
    algorithm: Algorithm,
    parameters: Map<String, Value>,
    job_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ComputeDocument {
    #[serde(flatten)]
    base: ComponentDocument,
    #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,
}

impl Compute {
    pub fn new() -> Self {
        Self {
            component: Component::new(ComponentType::Compute),
            graph: None,
            algorithm: Algorithm::None,
            parameters: Map::new(),
            job_id: None,
        }
    }

    pub(crate) fn attached(graph: &Graph) -> Self {
        let mut compute = Self::new();
        compute.set_graph(graph);
        compute
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn set_parameters(&mut self, parameters: Map<String, Value>) {
        self.parameters = parameters;
    }

    /// Id of the last deployed job.
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn graph(&self) -> Option<Graph> {
        self.graph.as_ref().and_then(GraphRef::upgrade)
    }

    pub fn set_graph(&mut self, graph: &Graph) {
        self.graph = Some(graph.downgrade());
    }

    fn parent(&self) -> Result<Graph, DriverError> {
        self.graph().ok_or(DriverError::MissingGraph {
            kind: ComponentType::Compute,
        })
    }

    /// Submit the job. The job id from the response is kept and can be read
    /// back with [`Compute::job_id`].
    pub async fn deploy(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        let label = graph.member_label()?;
        if self.component.label().is_empty() {
            self.component.set_label(label.clone());
        }
        let own_label = self.component.label().to_string();
        self.component.set_id(own_label);

        let payload = json!({
            "graph": label,
            "algorithmType": self.algorithm,
            "subgraph": "schema",
            "parameters": self.parameters,
        });
        tracing::debug!(graph = %label, algorithm = %self.algorithm, "Deploying compute job");

        let result = graph
            .client()
            .call(procedures::COMPUTE, Envelope::with_payload(payload))
            .await?;

        let job_id = result
            .get("result")
            .and_then(|r| r.get("jobId"))
            .or_else(|| result.get("jobId"))
            .and_then(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| DriverError::protocol(procedures::COMPUTE, "response carries no jobId"))?;

        tracing::info!(graph = %label, job_id = %job_id, "Compute job deployed");
        self.job_id = Some(job_id);
        Ok(result)
    }

    /// Current status document of a job. See
    /// [`trueno_core::JobStatus::from_document`] to read the status out.
    pub async fn job_status(&self, job_id: &str) -> Result<Value, DriverError> {
        self.job_call(procedures::COMPUTE_JOB_STATUS, job_id).await
    }

    pub async fn job_result(&self, job_id: &str) -> Result<Value, DriverError> {
        self.job_call(procedures::COMPUTE_JOB_RESULT, job_id).await
    }

    async fn job_call(&self, procedure: &str, job_id: &str) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        graph.member_label()?;
        graph
            .client()
            .call(procedure, Envelope::with_payload(json!({ "jobId": job_id })))
            .await
    }

    pub async fn persist(&mut self) -> Result<Value, DriverError> {
        let graph = self.parent()?;
        match persist_member(&graph, ComponentType::Compute, self.to_document()?).await? {
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
        let result = destroy_member(&graph, ComponentType::Compute, &id, None).await?;
        self.component.set_stale(true);
        Ok(result)
    }

    pub fn to_document(&self) -> Result<Value, DriverError> {
        Ok(serde_json::to_value(ComputeDocument {
            base: self.component.to_document(),
            job_id: self.job_id.clone(),
        })?)
    }
}

impl Default for Compute {
    fn default() -> Self {
        Self::new()
    }
}

impl AsComponent for Compute {
    fn component(&self) -> &Component {
        &self.component
    }
}

impl ComponentMut for Compute {
    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }
}
