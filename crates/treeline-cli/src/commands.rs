use colored::Colorize;
use serde_json::json;
use treeline_refs::{dependency_token, resolve, ReleasePrepError};
use treeline_sdk::{
    EngineConfig, NodeId, Owner, PropagationReport, ReleasePayload, ReleasePlan, ReleaseNr, SdkError,
    TrackingUpdate, TreeNode, TreeNodeInfo, TreeNodeReferenceTracking, TreeNodeType,
    VersionNr, VersionPayload,
};

use crate::cli::*;
use crate::scenario::Scenario;

pub fn run_command(cli: Cli, config: EngineConfig) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Resolve(args) => cmd_resolve(args, format),
        Command::Simulate(args) => cmd_simulate(args, config, format),
        Command::PrepareRelease(args) => cmd_prepare_release(args, config, format),
        Command::Config => cmd_config(&config, format),
    }
}

fn cli_owner() -> Owner {
    Owner::new("cli", "treeline cli")
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_resolve(args: ResolveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let node = TreeNode::new(NodeId::new("target")?, TreeNodeType::GraphModel, "target");
    let current = VersionNr::new(args.current_version);
    let mut target = TreeNodeInfo::unreleased(&node, current);
    if let Some(release) = args.latest_release {
        let released = args.released_version.map(VersionNr::new).unwrap_or(current);
        target = target.with_release(ReleaseNr::new(release), released);
    }

    let reference = TreeNodeReferenceTracking {
        node_id: node.id.clone(),
        tracking: args.mode.into(),
        release_nr: args.reference_release.map(ReleaseNr::new),
        version_nr: args.known_version.map(VersionNr::new),
    };
    let update = resolve(&target, &reference, reference.version_nr);
    let source = treeline_refs::effective_source(&reference, &target);
    let resolved = match update {
        Some(update) => reference.clone().applied(update),
        None => reference.clone(),
    };
    let token = dependency_token(&resolved);

    if format == OutputFormat::Json {
        return print_json(&json!({
            "update": update,
            "source": source,
            "dependency": token,
        }));
    }
    match update {
        Some(TrackingUpdate::Release(nr)) => {
            println!("{} move to release {}", "→".yellow().bold(), nr.to_string().yellow())
        }
        Some(TrackingUpdate::Version(nr)) => {
            println!("{} move to version {}", "→".yellow().bold(), nr.to_string().yellow())
        }
        None => println!("{} up to date", "✓".green().bold()),
    }
    if let Some(source) = source {
        println!("  Source: {}", source.to_string().cyan());
    }
    println!("  Dependency: {}", token.bold());
    Ok(())
}

fn cmd_simulate(args: SimulateArgs, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let engine = Scenario::load(&args.scenario)?.build(config)?;

    let (headline, propagation, value) = match args.action {
        Action::Version => {
            let releasable = engine.info(&args.node)?.node_type.is_releasable();
            let payload = VersionPayload::new(cli_owner(), args.message, releasable);
            let outcome = engine.record_version(&args.node, &payload)?;
            let headline = format!("Saved {} {}", args.node, outcome.version.version_nr);
            let value = serde_json::to_value(&outcome)?;
            (headline, outcome.propagation, value)
        }
        Action::Release => {
            let mut payload = ReleasePayload::by(cli_owner()).with_tags(args.tag);
            if !args.message.is_empty() {
                payload = payload.with_description(args.message);
            }
            let outcome = engine.release(&args.node, &payload, &args.pin)?;
            let headline = format!(
                "Released {} {} ({} process pin(s))",
                args.node, outcome.release.release_nr, outcome.pinned
            );
            let value = serde_json::to_value(&outcome)?;
            (headline, outcome.propagation, value)
        }
    };

    if format == OutputFormat::Json {
        return print_json(&value);
    }
    println!("{} {}", "✓".green().bold(), headline);
    print_report(&propagation);
    Ok(())
}

fn print_report(report: &PropagationReport) {
    for applied in &report.applied {
        println!(
            "  {} {} → {}",
            "updated".green(),
            applied.referrer.to_string().bold(),
            applied.update.to_string().yellow()
        );
    }
    for node in &report.advanced {
        println!("  {} {}", "advanced".cyan(), node);
    }
    for node in &report.skipped_revisits {
        println!("  {} {} (already advanced)", "skipped".dimmed(), node);
    }
    for node in &report.truncated {
        println!("  {} {} (depth limit)", "truncated".yellow(), node);
    }
    for failure in &report.failures {
        let at = failure
            .referrer
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| failure.node.to_string());
        println!("  {} {}: {}", "failed".red().bold(), at, failure.error);
    }
    if report.cancelled {
        println!("  {}", "cancelled".red());
    }
    println!("  {} update(s), {} unchanged", report.applied.len(), report.unchanged);
}

fn cmd_prepare_release(
    args: PrepareReleaseArgs,
    config: EngineConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let engine = Scenario::load(&args.scenario)?.build(config)?;
    match engine.prepare_release(&args.node, &args.pin) {
        Ok(plan) if format == OutputFormat::Json => print_json(&plan),
        Ok(plan) => {
            print_plan(&plan);
            Ok(())
        }
        Err(SdkError::ReleasePrep(err)) => {
            print_prep_error(&err);
            anyhow::bail!("{} cannot be released yet", args.node)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_plan(plan: &ReleasePlan) {
    println!(
        "{} {} {} can be released",
        "✓".green().bold(),
        plan.node.to_string().bold(),
        plan.version_nr
    );
    for pin in &plan.pins {
        println!(
            "  {} {} → {} {}",
            "pin".cyan(),
            pin.referrer,
            pin.tracking.node_id,
            dependency_token(&pin.tracking).yellow()
        );
    }
}

fn print_prep_error(err: &ReleasePrepError) {
    eprintln!("{} {}", "✗".red().bold(), err);
    match err {
        ReleasePrepError::NotPinnable { processes, .. } => {
            for p in processes {
                eprintln!("  {} tracks {} ({})", p.referrer.to_string().bold(), p.target, p.tracking);
            }
        }
        ReleasePrepError::NeedsPinning { suggestions, .. } => {
            for s in suggestions {
                eprintln!(
                    "  suggest {}",
                    format!("--pin {}={}@{}", s.process_id, s.graph_model_id, s.release_nr.get()).yellow()
                );
            }
        }
        _ => {}
    }
}

fn cmd_config(config: &EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
