use std::path::Path;

use anyhow::Context as _;
use colored::{ColoredString, Colorize};
use serde_json::json;

use schemix_diff::{normalize_nullable, ConflictDetector};
use schemix_merge::{ConflictReport, MergeConfig, MergeEngine};
use schemix_types::{Conflict, Document, MergeResult, Severity, Tree};

use crate::cli::*;

struct Context {
    engine: MergeEngine,
    format: OutputFormat,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => MergeConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MergeConfig::default(),
    };
    let ctx = Context {
        engine: MergeEngine::new(config)?,
        format: cli.format,
    };
    match cli.command {
        Command::Check(args) => cmd_check(&ctx, args),
        Command::Diff(args) => cmd_diff(&ctx, args),
        Command::Merge(args) => cmd_merge(&ctx, args),
        Command::Apply(args) => cmd_apply(&ctx, args),
        Command::Get(args) => cmd_get(&ctx, args),
        Command::Set(args) => cmd_set(&ctx, args),
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

fn read_tree(path: &Path) -> anyhow::Result<Tree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tree = if is_yaml(path) {
        serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    Ok(tree)
}

fn write_tree(path: &Path, tree: &Tree) -> anyhow::Result<()> {
    let text = if is_yaml(path) {
        serde_yaml::to_string(tree)?
    } else {
        serde_json::to_string_pretty(tree)? + "\n"
    };
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    Ok(Document::detect(name, read_tree(path)?))
}

fn load_documents(paths: &[std::path::PathBuf]) -> anyhow::Result<Vec<Document>> {
    paths.iter().map(|p| load_document(p)).collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{severity:>8}");
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.cyan(),
        Severity::Info => label.dimmed(),
    }
}

fn print_conflicts(conflicts: &[Conflict]) {
    for c in conflicts {
        let path = if c.path.is_empty() { "/" } else { c.path.as_str() };
        let decided = if c.is_resolved() {
            format!(" [{}]", c.resolution).green().to_string()
        } else {
            String::new()
        };
        println!(
            "{} {} {}{}",
            severity_label(c.severity),
            path.bold(),
            c.kind.to_string().dimmed(),
            decided
        );
        println!("         {}", c.description);
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(ctx: &Context, result: &MergeResult) -> anyhow::Result<()> {
    if ctx.format == OutputFormat::Json {
        return print_json(result);
    }
    if !result.is_compatible {
        println!("{} Documents are not compatible", "✗".red().bold());
        print_conflicts(&result.conflicts);
        return Ok(());
    }
    for step in &result.steps {
        println!(
            "  step {}: {} → {}  ({} patch ops, {} conflicts)",
            step.step_number,
            step.from_document.bold(),
            step.to_document.bold(),
            step.patch_count,
            step.conflict_count
        );
    }
    for warning in &result.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }
    print_conflicts(&result.conflicts);
    let s = &result.summary;
    println!(
        "{} {}: {} conflicts ({} resolved, {} unresolved), {} added, {} components",
        "✓".green().bold(),
        result.name.bold(),
        s.total,
        s.resolved,
        s.unresolved,
        s.added,
        s.merged_components
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_check(ctx: &Context, args: CheckArgs) -> anyhow::Result<()> {
    let docs = load_documents(&args.files)?;
    let report = ctx.engine.check_compatibility(&docs);
    if ctx.format == OutputFormat::Json {
        return print_json(&report);
    }
    match &report.reason {
        None => println!("{} {} documents are compatible", "✓".green().bold(), docs.len()),
        Some(reason) => println!("{} {}", "✗ incompatible:".red().bold(), reason),
    }
    Ok(())
}

fn cmd_diff(ctx: &Context, args: DiffArgs) -> anyhow::Result<()> {
    let base = normalize_nullable(&read_tree(&args.base)?);
    let incoming = normalize_nullable(&read_tree(&args.incoming)?);
    let detector = ConflictDetector::with_default_phases()
        .with_array_expansion(ctx.engine.config().link_array_items);
    let conflicts = detector.detect(&base, &incoming, 1);
    if ctx.format == OutputFormat::Json {
        return print_json(&conflicts);
    }
    if conflicts.is_empty() {
        println!("No conflicts.");
    } else {
        print_conflicts(&conflicts);
    }
    Ok(())
}

fn cmd_merge(ctx: &Context, args: MergeArgs) -> anyhow::Result<()> {
    let docs = load_documents(&args.files)?;
    let result = ctx.engine.merge(&docs, &args.name);
    if let Some(path) = &args.output {
        write_tree(path, &result.merged_tree)?;
    }
    if let Some(path) = &args.report {
        let report = ConflictReport::from_result(&result, &docs);
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    print_result(ctx, &result)
}

fn cmd_apply(ctx: &Context, args: ApplyArgs) -> anyhow::Result<()> {
    let docs = load_documents(&args.files)?;
    let text = std::fs::read_to_string(&args.report)
        .with_context(|| format!("failed to read {}", args.report.display()))?;
    let report = ConflictReport::from_json(&text)
        .with_context(|| format!("invalid report {}", args.report.display()))?;

    let merged = ctx.engine.merge(&docs, &args.name);
    let imported = ctx.engine.import_decisions(&merged, &report);
    let result = ctx.engine.regenerate_from_step(&docs, &args.name, &imported, 1);

    match &args.output {
        Some(path) => {
            write_tree(path, &result.merged_tree)?;
            print_result(ctx, &result)
        }
        None => print_json(&result.merged_tree),
    }
}

fn cmd_get(ctx: &Context, args: GetArgs) -> anyhow::Result<()> {
    let tree = read_tree(&args.file)?;
    let value = MergeEngine::get_value(&tree, &args.path);
    match (value, ctx.format) {
        (Some(value), _) => print_json(&value),
        (None, OutputFormat::Json) => print_json(&json!(null)),
        (None, OutputFormat::Text) => anyhow::bail!("no value at {}", args.path),
    }
}

fn cmd_set(_ctx: &Context, args: SetArgs) -> anyhow::Result<()> {
    let tree = read_tree(&args.file)?;
    let value: Tree = serde_json::from_str(&args.value)
        .with_context(|| format!("value is not valid JSON: {}", args.value))?;
    let next = MergeEngine::set_value(&tree, &args.path, value)?;
    match &args.output {
        Some(path) => write_tree(path, &next),
        None => print_json(&next),
    }
}
