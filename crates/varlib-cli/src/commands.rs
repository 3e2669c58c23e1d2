//! Subcommand handlers.
//!
//! Each handler returns `Ok(false)` when the operation ran but some items
//! failed, so the process can exit non-zero without an error trace.

use crate::{Command, KeepRoot};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use varlib_core::duplicates::{default_decisions, forced_decisions};
use varlib_core::{
    BatchOutcome, CancellationToken, Decisions, DuplicateGroup, MostRecentlyModified,
    OperationKind, PackageEngine, PackageStatus, ProgressCallback, ResolutionDecision, Role,
    VarError,
};

pub async fn dispatch(
    engine: &PackageEngine,
    command: Command,
    json: bool,
    cancel: &CancellationToken,
) -> Result<bool> {
    match command {
        Command::Duplicates { names } => list_duplicates(engine, &names, json),
        Command::Dedupe {
            names,
            keep,
            dry_run,
        } => dedupe(engine, &names, keep, dry_run, json, cancel).await,
        Command::Load { names, with_deps } => {
            let outcome = engine
                .load(&names, with_deps, Some(progress_logger()), Some(cancel))
                .await?;
            report_batch(&outcome, OperationKind::Load, json)
        }
        Command::Unload { names, with_deps } => {
            let outcome = engine
                .unload(&names, with_deps, Some(progress_logger()), Some(cancel))
                .await?;
            report_batch(&outcome, OperationKind::Unload, json)
        }
        Command::Archive { names } => {
            let outcome = engine
                .archive(&names, Some(progress_logger()), Some(cancel))
                .await?;
            report_batch(&outcome, OperationKind::Archive, json)
        }
        Command::Status { names } => show_status(engine, names, json).await,
    }
}

fn list_duplicates(engine: &PackageEngine, names: &[String], json: bool) -> Result<bool> {
    let groups = engine.find_duplicates(names);
    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(true);
    }

    if groups.is_empty() {
        println!("No duplicates found");
        return Ok(true);
    }
    for group in &groups {
        println!("{}", group.file_name);
        for instance in &group.instances {
            println!(
                "  [{}] {} ({} bytes, modified {})",
                instance.role.label(),
                instance.path.display(),
                instance.size,
                instance.modified.format("%Y-%m-%d %H:%M")
            );
        }
    }
    println!("{} duplicate groups", groups.len());
    Ok(true)
}

async fn dedupe(
    engine: &PackageEngine,
    names: &[String],
    keep: Option<KeepRoot>,
    dry_run: bool,
    json: bool,
    cancel: &CancellationToken,
) -> Result<bool> {
    let groups = engine.find_duplicates(names);
    if groups.is_empty() {
        println!("No duplicates found");
        return Ok(true);
    }
    let decisions = keep_decisions(&groups, keep);

    if dry_run {
        let plan = match engine
            .plan_duplicates(&groups, decisions, &MostRecentlyModified)
            .await
        {
            Ok(plan) => plan,
            Err(VarError::NothingSelected) => {
                println!("Nothing to resolve");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };
        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            for path in &plan.keep {
                println!("keep    {}", path.display());
            }
            for path in &plan.delete {
                println!("delete  {}", path.display());
            }
        }
        return Ok(true);
    }

    let outcome = engine
        .resolve_duplicates(&groups, decisions, &MostRecentlyModified, Some(cancel))
        .await?;
    let summary = outcome.summary();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "summary": summary, "outcome": outcome }))?
        );
    } else {
        println!("{}", summary);
        for message in &summary.messages {
            println!("  {}", message);
        }
        if outcome.cancelled {
            println!("Cancelled before every duplicate was removed");
        }
    }
    Ok(!summary.has_failures())
}

fn keep_decisions(groups: &[DuplicateGroup], keep: Option<KeepRoot>) -> Decisions {
    match keep {
        None => default_decisions(groups),
        Some(KeepRoot::Loaded) => forced_decisions(groups, &Role::Loaded),
        Some(KeepRoot::Available) => forced_decisions(groups, &Role::Available),
        Some(KeepRoot::External) => {
            let mut decisions = default_decisions(groups);
            for group in groups {
                if let Some(role) = group.roles().into_iter().find(Role::is_external) {
                    decisions.insert(group.key(), ResolutionDecision::keep(role));
                }
            }
            decisions
        }
    }
}

fn progress_logger() -> ProgressCallback {
    Arc::new(|done: usize, total: usize, name: &str| {
        info!("[{}/{}] {}", done, total, name);
    })
}

fn report_batch(outcome: &BatchOutcome, kind: OperationKind, json: bool) -> Result<bool> {
    let summary = outcome.summary(kind);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "summary": summary, "outcome": outcome }))?
        );
    } else {
        println!("{}", summary);
        for message in &summary.messages {
            println!("  {}", message);
        }
        if outcome.cancelled {
            println!("Cancelled before every package was processed");
        }
    }
    Ok(!summary.has_failures())
}

async fn show_status(engine: &PackageEngine, names: Vec<String>, json: bool) -> Result<bool> {
    let names = if names.is_empty() {
        engine.refresh_status(true).await;
        engine.base_names()
    } else {
        names
    };

    let statuses: BTreeMap<String, PackageStatus> =
        engine.statuses(&names).await.into_iter().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(true);
    }
    for (name, status) in &statuses {
        let display = engine.status_display(status);
        println!("{:<48} {}", name, display.label);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use varlib_core::FileInstance;

    fn group(roles: &[Role]) -> DuplicateGroup {
        let instances = roles
            .iter()
            .map(|role| {
                FileInstance::new(
                    PathBuf::from(format!("/{}/A.Foo.1.var", role.label())),
                    role.clone(),
                    10,
                    Utc::now(),
                )
            })
            .collect();
        DuplicateGroup {
            base_name: "A.Foo".into(),
            file_name: "A.Foo.1.var".into(),
            instances,
        }
    }

    #[test]
    fn test_keep_decisions_default_prefers_loaded() {
        let groups = vec![group(&[Role::Loaded, Role::Available])];
        let decisions = keep_decisions(&groups, None);
        assert_eq!(
            decisions[&groups[0].key()].kept_role(),
            Some(&Role::Loaded)
        );
    }

    #[test]
    fn test_keep_external_uses_first_external_copy() {
        let groups = vec![group(&[Role::Loaded, Role::External("nas".into())])];
        let decisions = keep_decisions(&groups, Some(KeepRoot::External));

        assert_eq!(
            decisions[&groups[0].key()].kept_role(),
            Some(&Role::External("nas".into()))
        );
    }

    #[test]
    fn test_keep_available_falls_back_when_missing() {
        let groups = vec![group(&[Role::Loaded, Role::External("nas".into())])];
        let decisions = keep_decisions(&groups, Some(KeepRoot::Available));
        assert_eq!(
            decisions[&groups[0].key()].kept_role(),
            Some(&Role::Loaded)
        );
    }
}
