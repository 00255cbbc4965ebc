//! Trueno driver: an async client for the Trueno graph-processing service.
//!
//! Everything goes through one [`RpcClient`] wrapping a [`Transport`]. Each
//! operation on a [`Graph`], [`Vertex`], [`Edge`] or [`Compute`] builds a
//! payload, sends it as a named procedure call and interprets the
//! acknowledgment. Graphs can also queue persists client-side and flush them
//! in one bulk call.

pub mod client;
pub mod component;
pub mod compute;
pub mod edge;
pub mod graph;
pub mod procedures;
pub mod records;
pub mod transport;
pub mod vertex;

pub use client::{DriverError, ErrorClass, RpcClient};
pub use component::{AsComponent, Component, ComponentRef};
pub use compute::Compute;
pub use edge::Edge;
pub use graph::{Graph, GraphRef, Operation};
pub use records::Entity;
pub use transport::{AckHandler, EventHandler, Transport};
pub use vertex::Vertex;

pub use trueno_core::{
    Algorithm, ComponentType, Direction, DriverConfig, Envelope, Filter, JobStatus, RangeOp,
    Status,
};

pub type Result<T, E = DriverError> = std::result::Result<T, E>;
