pub(crate) mod grading_backend;
pub(crate) mod session_registry;
pub(crate) mod session_runtime;
