use anyhow::Result;
use std::collections::BTreeMap;

use super::CommandContext;

pub struct WorkflowsCommand;

impl WorkflowsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine().await?;
        let registry = engine.registry();

        let mut listing: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for workflow_type in registry.workflow_types() {
            let definition = registry.get(workflow_type)?;
            let steps = definition
                .step_names()
                .into_iter()
                .map(String::from)
                .collect();
            listing.insert(workflow_type.to_string(), steps);
        }

        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        for (workflow_type, steps) in &listing {
            println!("🧭 {workflow_type}");
            for (index, step) in steps.iter().enumerate() {
                println!("   {}. {step}", index + 1);
            }
        }
        Ok(())
    }
}
