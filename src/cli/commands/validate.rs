use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::{files, output};
use crate::form::validate;

pub fn validate_command(form_path: &Path) -> Result<()> {
    let form = files::load_form(form_path)?;
    let diagnostics = validate::validate(&form);
    output::print_diagnostics(&diagnostics);

    if diagnostics.has_error() {
        anyhow::bail!(
            "{:?} is invalid ({} errors)",
            form_path,
            diagnostics.errors().count()
        );
    }

    println!(
        "{} {:?} is valid ({} items)",
        "✓".bright_green().bold(),
        form_path,
        form.items.len()
    );
    Ok(())
}
