use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::cli::files::{self, StateFile};
use crate::cli::output;
use crate::form::{FormModel, FormReconciler, LifecycleResponse, ReconciliationPlan};

/// Persist whatever state came back, then surface diagnostics
fn finish(response: &LifecycleResponse, state_file: &StateFile, what: &str) -> Result<()> {
    state_file.store(response.state.as_ref())?;
    output::print_diagnostics(&response.diagnostics);

    if response.has_error() {
        anyhow::bail!(
            "{} failed with {} errors",
            what,
            response.diagnostics.errors().count()
        );
    }
    Ok(())
}

/// Refresh the tracked form, if any. `None` means there is nothing remote.
async fn current_state(
    reconciler: &FormReconciler,
    cancel: &CancellationToken,
    prior: Option<FormModel>,
) -> Result<Option<FormModel>> {
    let Some(prior) = prior else {
        return Ok(None);
    };
    let response = reconciler.read(cancel, &prior).await;
    output::print_diagnostics(&response.diagnostics);
    if response.has_error() {
        anyhow::bail!("refresh of form {} failed", prior.id.as_deref().unwrap_or("(unknown)"));
    }
    if response.state.is_none() {
        info!("Tracked form is gone remotely; it will be recreated");
    }
    Ok(response.state)
}

fn require_state(state_file: &StateFile) -> Result<FormModel> {
    state_file
        .load()?
        .with_context(|| format!("No form is tracked in {:?}", state_file.path()))
}

pub async fn plan_command(session: &Session, cancel: &CancellationToken, form_path: &Path, state_path: &Path) -> Result<()> {
    let mut desired = files::load_form(form_path)?;
    let reconciler = session.reconciler();

    let diagnostics = reconciler.validate(&desired);
    output::print_diagnostics(&diagnostics);
    if diagnostics.has_error() {
        anyhow::bail!("{:?} is invalid", form_path);
    }

    let state_file = StateFile::new(state_path);
    let current = current_state(&reconciler, cancel, state_file.load()?).await?;
    reconciler.modify_plan(&mut desired, current.as_ref());

    match current {
        None => output::print_plan("create", &ReconciliationPlan::for_create(&desired)?),
        Some(state) if state == desired => output::print_no_changes(),
        Some(state) => {
            let form_id = state.id.as_deref().context("State has no form ID")?;
            let remote = session
                .forms
                .get(cancel, form_id)
                .await
                .with_context(|| format!("Failed to read form {}", form_id))?;
            output::print_plan("update", &ReconciliationPlan::for_update(&desired, &remote)?);
        }
    }
    Ok(())
}

pub async fn apply_command(session: &Session, cancel: &CancellationToken, form_path: &Path, state_path: &Path) -> Result<()> {
    let mut desired = files::load_form(form_path)?;
    let state_file = StateFile::new(state_path);
    let reconciler = session.reconciler().with_state_sink(Arc::new(state_file.clone()));

    let prior = state_file.load()?;
    let tracked = prior.is_some();
    let current = current_state(&reconciler, cancel, prior).await?;
    if tracked {
        state_file.store(current.as_ref())?;
    }

    reconciler.modify_plan(&mut desired, current.as_ref());
    let response = match &current {
        None => reconciler.create(cancel, &desired).await,
        Some(state) if *state == desired => {
            output::print_no_changes();
            return Ok(());
        }
        Some(state) => reconciler.update(cancel, &desired, state).await,
    };

    finish(&response, &state_file, "apply")?;
    if let Some(state) = &response.state {
        output::print_form(if current.is_some() { "updated" } else { "created" }, state);
    }
    Ok(())
}

pub async fn refresh_command(session: &Session, cancel: &CancellationToken, state_path: &Path) -> Result<()> {
    let state_file = StateFile::new(state_path);
    let prior = require_state(&state_file)?;

    let response = session.reconciler().read(cancel, &prior).await;
    finish(&response, &state_file, "refresh")?;
    match &response.state {
        Some(state) => output::print_form("refreshed", state),
        None => println!("Form no longer exists; removed it from {:?}", state_file.path()),
    }
    Ok(())
}

pub async fn import_command(
    session: &Session,
    cancel: &CancellationToken,
    form_id: &str,
    state_path: &Path,
) -> Result<()> {
    let state_file = StateFile::new(state_path);
    if let Some(existing) = state_file.load()? {
        anyhow::bail!(
            "{:?} already tracks form {}",
            state_file.path(),
            existing.id.as_deref().unwrap_or("(unknown)")
        );
    }

    let reconciler = session.reconciler();
    let imported = reconciler.import(form_id);
    let Some(stub) = imported.state else {
        output::print_diagnostics(&imported.diagnostics);
        anyhow::bail!("import of {:?} failed", form_id);
    };

    let response = reconciler.read(cancel, &stub).await;
    if response.state.is_none() && !response.has_error() {
        anyhow::bail!("Form {} does not exist", form_id);
    }
    finish(&response, &state_file, "import")?;
    if let Some(state) = &response.state {
        output::print_form("imported", state);
    }
    Ok(())
}

pub async fn destroy_command(session: &Session, cancel: &CancellationToken, state_path: &Path) -> Result<()> {
    let state_file = StateFile::new(state_path);
    let prior = require_state(&state_file)?;

    let response = session.reconciler().delete(cancel, &prior).await;
    finish(&response, &state_file, "destroy")?;
    output::print_form("deleted", &prior);
    Ok(())
}

pub async fn batch_update_command(
    session: &Session,
    cancel: &CancellationToken,
    form_id: &str,
    requests_path: &Path,
    required_revision_id: Option<&str>,
) -> Result<()> {
    let requests_json = fs::read_to_string(requests_path)
        .with_context(|| format!("Failed to read requests file: {:?}", requests_path))?;

    let response = session
        .reconciler()
        .raw_batch_update(cancel, form_id, &requests_json, required_revision_id)
        .await;
    output::print_diagnostics(&response.diagnostics);
    if response.diagnostics.has_error() {
        anyhow::bail!("batch update of form {} failed", form_id);
    }

    println!(
        "Applied batch to form {}: {} replies, revision {}",
        form_id,
        response.reply_count,
        response.revision_id.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
