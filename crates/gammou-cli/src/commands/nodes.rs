//! Node listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use anyhow::Result;
use clap::Args;
use gammou_core::{NodeCategory, NodeRegistry};

#[derive(Args)]
pub struct NodesArgs {
    /// Show details for a specific node id
    #[arg(value_name = "NODE")]
    node: Option<String>,
}

const CATEGORIES: [NodeCategory; 4] = [
    NodeCategory::Source,
    NodeCategory::Math,
    NodeCategory::Control,
    NodeCategory::Routing,
];

pub fn run(args: NodesArgs) -> Result<()> {
    let registry = NodeRegistry::new();

    if let Some(id) = &args.node {
        let descriptor = registry
            .descriptor(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown node: {}", id))?;
        let node = (descriptor.create)(48000.0);

        println!("{}", descriptor.name);
        println!("{}", "=".repeat(descriptor.name.len()));
        println!();
        println!("{}", descriptor.description);
        println!();
        println!("  Category:  {}", descriptor.category.name());
        println!("  Inputs:    {}", node.input_count());
        println!("  Outputs:   {}", node.output_count());
        println!("  State:     {} cells", node.state_size());
        return Ok(());
    }

    println!("Available Nodes");
    println!("===============");
    for category in CATEGORIES {
        let mut entries = registry.in_category(category).peekable();
        if entries.peek().is_none() {
            continue;
        }
        println!();
        println!("{}:", category.name());
        println!("  {:10}  {:12}  {}", "ID", "Name", "Description");
        for d in entries {
            println!("  {:10}  {:12}  {}", d.id, d.name, d.description);
        }
    }
    Ok(())
}
