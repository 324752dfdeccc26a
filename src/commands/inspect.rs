use anyhow::{Context as _, Result};
use std::path::Path;

use super::print_changes;
use crate::context::Context;
use crate::plan::{self, PlanParser, ResourceChange};

/// Handles the 'inspect' command - reads an existing `show -json` document
pub struct InspectCommand;

impl InspectCommand {
    /// Execute the inspect command
    pub fn execute(ctx: &Context, plan_json: &Path, address: Option<&str>) -> Result<()> {
        let model = PlanParser::new()
            .parse_file(plan_json)
            .with_context(|| format!("Failed to read plan {}", plan_json.display()))?;

        ctx.output.section("Plan");
        ctx.output.key_value("Format version", &model.format_version);
        if let Some(version) = &model.terraform_version {
            ctx.output.key_value("Tool version", version);
        }
        if model.errored {
            ctx.output
                .warning("The tool reported errors while producing this plan");
        }

        match address {
            Some(address) => {
                let change = plan::require_resource_change(&model, address)?;
                Self::show_change(ctx, change)?;
            }
            None => {
                ctx.output.blank();
                print_changes(ctx.output.as_ref(), &model);
            }
        }

        Ok(())
    }

    fn show_change(ctx: &Context, change: &ResourceChange) -> Result<()> {
        ctx.output.blank();
        ctx.output.resource_change(change);
        ctx.output.key_value("Actions", &change.actions.to_string());

        if let Some(provider) = &change.provider_name {
            ctx.output.key_value("Provider", provider);
        }
        if let Some(reason) = &change.action_reason {
            ctx.output.key_value("Reason", reason);
        }
        if let Some(after) = &change.after {
            ctx.output.key_value("After", &serde_json::to_string_pretty(after)?);
        }

        Ok(())
    }
}
