//! # runtime-tools
//!
//! A concrete [`runtime_core::ToolRegistry`]: [`DefaultToolRegistry`], built
//! via [`ToolRegistryBuilder`], holding a fixed map of [`ToolHandler`]s
//! keyed by name. Ships the one tool the runtime makes real —
//! [`builtin::SetOutputTool`] — and the scaffolding for adding more without
//! touching the executor.

pub mod builtin;
pub mod registry;

pub use builtin::SetOutputTool;
pub use registry::{DefaultToolRegistry, ToolHandler, ToolRegistryBuilder};
