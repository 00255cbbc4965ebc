//! Names of the remote procedures exposed by the service.

pub const CREATE: &str = "ex_create";
pub const OPEN: &str = "ex_open";
pub const PERSIST: &str = "ex_persist";
pub const DESTROY: &str = "ex_destroy";
pub const FETCH: &str = "ex_fetch";
pub const COUNT: &str = "ex_count";
pub const BULK: &str = "ex_bulk";
pub const NEIGHBORS: &str = "ex_neighbors";
pub const DEGREE: &str = "ex_degree";
pub const VERTICES: &str = "ex_vertices";
pub const COMPUTE: &str = "ex_compute";
pub const COMPUTE_JOB_STATUS: &str = "ex_computeJobStatus";
pub const COMPUTE_JOB_RESULT: &str = "ex_computeJobResult";
