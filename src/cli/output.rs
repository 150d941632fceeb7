use colored::Colorize;
use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostics, Severity};
use crate::form::{FormModel, ReconciliationPlan};

pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        let label = match diagnostic.severity {
            Severity::Error => "error".bright_red().bold(),
            Severity::Warning => "warning".bright_yellow().bold(),
        };
        match &diagnostic.attribute_path {
            Some(path) => println!("{}: {} ({})", label, diagnostic.summary.bold(), path.dimmed()),
            None => println!("{}: {}", label, diagnostic.summary.bold()),
        }
        if !diagnostic.detail.is_empty() {
            println!("  {}", diagnostic.detail);
        }
    }
}

pub fn print_plan(action: &str, plan: &ReconciliationPlan) {
    println!("{} {}", "Planned:".bright_white().bold(), action.bright_cyan().bold());

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for request in &plan.requests {
        *counts.entry(request.kind()).or_default() += 1;
    }
    for (kind, count) in counts {
        println!("  {:>3} × {}", count, kind);
    }
    if !plan.pending_navigation.is_empty() {
        println!(
            "  navigation resolved after creation for: {}",
            plan.pending_navigation.join(", ")
        );
    }
}

pub fn print_no_changes() {
    println!("{} No changes. The form matches its definition.", "✓".bright_green().bold());
}

pub fn print_form(verb: &str, state: &FormModel) {
    let id = state.id.as_deref().unwrap_or("(unknown)");
    println!("{} Form {} {}", "✓".bright_green().bold(), id.bright_green().bold(), verb);
    if let Some(uri) = &state.responder_uri {
        println!("  responder: {}", uri);
    }
    if let Some(uri) = &state.edit_uri {
        println!("  edit:      {}", uri);
    }
    println!("  items:     {}", state.items.len());
}
