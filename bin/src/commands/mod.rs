//! CLI command implementations.

pub(crate) mod history;
pub(crate) mod periods;
pub(crate) mod run;
