use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use field_sweep::diff::{print_diff, DiffStats};
use field_sweep::orchestrator::{
    plan_one, remove_all, PlannedChange, ProgressSink, RemovalOutcome,
};
use field_sweep::rules::removal_rule;
use field_sweep::scanner::{find_dependencies, CancelToken, Dependency};
use field_sweep::state::{get_state_dir, list_runs, revert_run, RunLog};

#[derive(Parser)]
#[command(name = "field-sweep")]
#[command(about = "Find and surgically remove Salesforce custom field usages across your metadata source")]
#[command(long_about = "Scans a Salesforce source tree (layouts, flexipages, Apex, LWC/Aura source,\n\
validation rules, flows, field and object definitions) for every file that\n\
mentions a field, then removes the owning XML fragment where that is safe.\n\
\n\
Only page layouts are edited automatically: the <layoutItems> wrapper whose\n\
<field> equals the target is excised and the file rewritten with everything\n\
else intact. Flexipages and all other types are reported for manual cleanup;\n\
the tool never guesses at structure it cannot remove safely.")]
#[command(after_help = "Examples:\n\
  field-sweep scan --field Account.MyField__c --paths force-app\n\
  field-sweep remove --field Account.MyField__c --paths force-app\n\
  field-sweep remove --field Account.MyField__c --paths force-app --apply\n\
  field-sweep history\n\
  field-sweep revert a1b2c3d")]
#[command(version)]
struct Cli {
    /// Use project-local state directory (.field-sweep) instead of the system data dir
    #[arg(long, global = true)]
    local_state: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every file that mentions the field, classified by metadata type
    Scan {
        /// Field API name to look for (e.g. Account.MyField__c)
        #[arg(short, long)]
        field: String,

        /// Paths to scan: directories, files, or glob patterns
        #[arg(short, long, num_args = 1.., default_value = ".")]
        paths: Vec<PathBuf>,

        /// Exclude paths matching these patterns (can be used multiple times)
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,

        /// Output format: "text" or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Remove the field's XML fragments where a safe rule exists (dry-run by default)
    #[command(after_help = "Dry-run prints a unified diff of every file that would change.\n\
Re-run with --apply to write the changes; every rewritten file is backed up\n\
first and the run can be undone with 'field-sweep revert <RUN_ID>'.")]
    Remove {
        /// Field API name to remove
        #[arg(short, long)]
        field: String,

        /// Paths to scan: directories, files, or glob patterns
        #[arg(short, long, num_args = 1.., default_value = ".")]
        paths: Vec<PathBuf>,

        /// Exclude paths matching these patterns (can be used multiple times)
        #[arg(long, num_args = 0..)]
        exclude: Vec<String>,

        /// Restrict removal to these scanned files (default: all supported hits)
        #[arg(long, num_args = 0..)]
        file: Vec<PathBuf>,

        /// Apply changes (default is dry-run)
        #[arg(long)]
        apply: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show past removal runs
    History,

    /// Restore the files touched by a removal run from their backups
    Revert {
        /// Run id as printed by 'remove --apply' or 'history'
        run_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            field,
            paths,
            exclude,
            format,
        } => {
            let deps = find_dependencies(&paths, &field, &exclude, &CancelToken::new())?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&deps)?),
                "text" => print_scan_report(&field, &deps),
                other => anyhow::bail!("Invalid format: {other}. Valid values are 'text' or 'json'"),
            }
        }

        Commands::Remove {
            field,
            paths,
            exclude,
            file,
            apply,
            yes,
        } => {
            let mut deps = find_dependencies(&paths, &field, &exclude, &CancelToken::new())?;
            if !file.is_empty() {
                deps.retain(|dep| file.iter().any(|f| dep.path == *f || dep.path.ends_with(f)));
            }
            if deps.is_empty() {
                println!("No usages of {field} found.");
                return Ok(());
            }

            if apply {
                apply_removal(&field, &deps, yes, cli.local_state)?;
            } else {
                dry_run(&field, &deps)?;
            }
        }

        Commands::History => {
            let state_dir = get_state_dir(cli.local_state)?;
            let runs = list_runs(&state_dir)?;
            if runs.is_empty() {
                println!("No removal runs recorded.");
            }
            for run in runs {
                println!(
                    "{}  {}  {:?}  {} file(s)  field: {}",
                    run.run_id,
                    run.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                    run.status,
                    run.files.len(),
                    run.field
                );
            }
        }

        Commands::Revert { run_id } => {
            let state_dir = get_state_dir(cli.local_state)?;
            let restored = revert_run(&state_dir, &run_id)?;
            println!("✓ Restored {restored} file(s) from run {run_id}");
        }
    }

    Ok(())
}

fn print_scan_report(field: &str, deps: &[Dependency]) {
    if deps.is_empty() {
        println!("No usages of {field} found.");
        return;
    }

    let mut by_type: BTreeMap<String, Vec<&Dependency>> = BTreeMap::new();
    for dep in deps {
        by_type.entry(dep.doc_type.to_string()).or_default().push(dep);
    }

    println!("Usages of {field}: {} file(s)\n", deps.len());
    for (doc_type, group) in &by_type {
        let removable = group
            .iter()
            .filter(|d| removal_rule(d.doc_type).is_some())
            .count();
        let note = if removable > 0 {
            "auto-removable"
        } else {
            "manual cleanup"
        };
        println!("{doc_type} ({}) [{note}]", group.len());
        for dep in group {
            println!("    {}", dep.path.display());
        }
    }
}

fn dry_run(field: &str, deps: &[Dependency]) -> Result<()> {
    let mut total_stats = DiffStats::default();
    let mut would_change = 0usize;
    let mut manual = 0usize;

    for dep in deps {
        match plan_one(dep, field) {
            PlannedChange::Rewrite { old, new } => {
                would_change += 1;
                let stats = print_diff(&dep.path, &old, &new);
                total_stats.add(&stats);
            }
            PlannedChange::Unsupported => {
                manual += 1;
                println!(
                    "⚠️  {} ({}): no safe removal rule, clean up manually",
                    dep.path.display(),
                    dep.doc_type
                );
            }
            PlannedChange::NotModified => {
                println!(
                    "    {} ({}): mentioned but no removable fragment",
                    dep.path.display(),
                    dep.doc_type
                );
            }
            PlannedChange::Failed(reason) => {
                eprintln!("✗ {}: {reason}", dep.path.display());
            }
        }
    }

    total_stats.print_summary();
    if would_change > 0 {
        println!("\nDry run: {would_change} file(s) would change. Re-run with --apply to write.");
    }
    if manual > 0 {
        println!("{manual} file(s) need manual cleanup.");
    }
    Ok(())
}

fn apply_removal(field: &str, deps: &[Dependency], yes: bool, local_state: bool) -> Result<()> {
    if !yes {
        let prompt = format!(
            "Remove field \"{field}\" from {} file(s)? This rewrites files in place.",
            deps.len()
        );
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let state_dir = get_state_dir(local_state)?;
    let mut run = RunLog::begin(state_dir, field).context("Failed to start removal run")?;

    let mut sink = ConsoleSink::default();
    let report = remove_all(deps, field, &CancelToken::new(), &mut sink, Some(&mut run));
    let run_id = run.commit()?;

    println!(
        "\nFinished. Processed: {}. Removed: {}. Unchanged: {}. Unsupported: {}. Failed: {}.",
        report.processed, report.removed, report.not_modified, report.unsupported, report.failed
    );
    if let Some(run_id) = run_id {
        println!("Undo with: field-sweep revert {run_id}");
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes"))
}

#[derive(Default)]
struct ConsoleSink {
    total: usize,
    current: usize,
}

impl ProgressSink for ConsoleSink {
    fn batch_started(&mut self, total: usize) {
        self.total = total;
    }

    fn file_processed(&mut self, dep: &Dependency, outcome: &RemovalOutcome) {
        self.current += 1;
        let prefix = format!("[{}/{}]", self.current, self.total);
        match outcome {
            RemovalOutcome::Removed => {
                println!("{prefix} ✓ Removed from {}", dep.path.display())
            }
            RemovalOutcome::NotModified => {
                println!("{prefix}   No removable fragment in {}", dep.path.display())
            }
            RemovalOutcome::Unsupported => println!(
                "{prefix} ⚠️  {} ({}): manual cleanup required",
                dep.path.display(),
                dep.doc_type
            ),
            RemovalOutcome::Failed(reason) => {
                eprintln!("{prefix} ✗ {}: {reason}", dep.path.display())
            }
        }
    }
}
