//! Plan model, parser and queries
//!
//! This module turns the JSON rendered by `show -json` into a typed
//! [`PlanModel`] and answers questions about individual resource changes.
//!
//! # Example
//!
//! ```ignore
//! use plancheck::plan::{resource_change_exists, PlanParser};
//!
//! let model = PlanParser::new().parse_file(Path::new("plan.json"))?;
//! assert!(resource_change_exists(&model, "module.postgresql.azurerm_postgresql_server.main"));
//! ```

mod parser;
mod query;
mod types;

pub use parser::{PlanParser, SUPPORTED_FORMAT_VERSIONS};
pub use query::{
    get_output_change, get_planned_values, get_resource_change, planned_value_exists,
    require_action, require_resource_change, resource_change_exists,
};
pub use types::{
    Action, ActionSet, ChangeKind, OutputChange, PlanModel, PlanSummary, ResourceAddress,
    ResourceChange, ResourceMode,
};
