//! YAML-driven compression workflows
//!
//! Ties the crate together: a [`WorkflowSpec`] describes a model, a
//! sparsity configuration, a schedule, and an optional quantization
//! stage; [`run_workflow`] executes it and saves the artifacts.

mod run;
mod spec;

pub use run::{run_workflow, MaskPolicy, WorkflowReport};
pub use spec::{
    KernelSpec, LayerSpec, ModelSpec, PolicySpec, QuantSpec, ScheduleSpec, WorkflowSpec,
};
