#![forbid(unsafe_code)]

use std::error::Error;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use multibuild_config::{BuildConfig, ConfigStore, FileConfigStore};
use multibuild_engine::{
    shell_runner, BuildObserver, BuildOutcome, BuildPlan, ChangeImpactResolver, Pipeline,
    PathOwnershipResolver,
};
use multibuild_git::GitCli;
use multibuild_unit::{BuildUnitId, PreferredOrder};
use multibuild_util::fs::{absolutize, marker_pattern};
use multibuild_util::process::OutputLine;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "multibuild",
    about = "Build only the units touched by a range of commits"
)]
#[command(version)]
struct Cli {
    /// Path to multibuild.toml (defaults to the current directory, then the executable's)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug detail to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the units owning files changed between two revisions
    Find {
        /// Older revision
        from: String,
        /// Newer revision
        to: String,
        /// Repository directory to diff in
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// File-name glob identifying a unit
        #[arg(long, default_value = "*.sln")]
        marker: String,
    },
    /// Show what `run` would build, without building
    Plan {
        #[command(flatten)]
        range: RangeArgs,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build the impacted units in order, stopping at the first failure
    Run {
        #[command(flatten)]
        range: RangeArgs,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Write a starter multibuild.toml in the current directory
    Init,
}

/// Either two explicit revisions or a branch to compare the current one with.
#[derive(Debug, Args)]
struct RangeArgs {
    /// Older revision
    #[arg(required_unless_present = "branch", conflicts_with = "branch")]
    from: Option<String>,
    /// Newer revision
    #[arg(required_unless_present = "branch", conflicts_with = "branch")]
    to: Option<String>,
    /// Compare the head of the current branch with the head of this branch
    #[arg(long, short = 'b')]
    branch: Option<String>,
}

impl RangeArgs {
    /// The `(from, to)` revisions to diff, resolved in `dir`.
    fn resolve(&self, dir: &Path) -> Result<(String, String), Box<dyn Error>> {
        if let Some(branch) = &self.branch {
            let git = GitCli::new();
            let current = git.current_branch(dir).unwrap_or_else(|e| {
                tracing::debug!("no current branch, using HEAD: {e}");
                "HEAD".to_owned()
            });
            let from = git.rev_parse(&current, dir)?;
            let to = git.rev_parse(branch, dir)?;
            eprintln!(
                "   Comparing `{current}` ({}) with `{branch}` ({})",
                short_hash(&from),
                short_hash(&to)
            );
            return Ok((from, to));
        }
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => Ok((from.clone(), to.clone())),
            _ => Err("expected <FROM> <TO> or --branch <BRANCH>".into()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Command::Find {
            from,
            to,
            dir,
            marker,
        } => cmd_find(&from, &to, &dir, &marker),
        Command::Plan { range, json } => cmd_plan(config, &range, json),
        Command::Run { range, yes } => cmd_run(config, &range, yes),
        Command::Init => cmd_init(),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins unless `--verbose` asks for debug output.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<(BuildConfig, PreferredOrder), Box<dyn Error>> {
    let store = FileConfigStore::locate(explicit)?;
    let config = store.load_build_config()?;
    let preferred = store.load_preferred_order(&config.working_directory)?;
    eprintln!("     Loaded {}", store.config_path().display());
    Ok((config, preferred))
}

fn cmd_find(from: &str, to: &str, dir: &Path, marker: &str) -> CliResult {
    let root = absolutize(dir)?;
    let ownership = PathOwnershipResolver::ascent(&root, marker_pattern(marker)?);
    let git = GitCli::new();
    let units = ChangeImpactResolver::new(&git, &ownership).resolve(from, to)?;

    if units.is_empty() {
        eprintln!("    No units contain changed files between {from} and {to}");
        return Ok(());
    }
    eprintln!("     Found {} unit(s) with changes", units.len());
    for unit in &units {
        println!("{unit}");
    }
    Ok(())
}

fn cmd_plan(config: Option<&Path>, range: &RangeArgs, json: bool) -> CliResult {
    let (config, preferred) = load_config(config)?;
    let (from, to) = range.resolve(&config.working_directory)?;
    let git = GitCli::new();
    let runner = shell_runner(&config);
    let plan = Pipeline::new(&config, &preferred, &git, &runner).plan(&from, &to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

fn cmd_run(config: Option<&Path>, range: &RangeArgs, yes: bool) -> CliResult {
    let (config, preferred) = load_config(config)?;
    let (from, to) = range.resolve(&config.working_directory)?;
    let git = GitCli::new();
    let runner = shell_runner(&config);
    let pipeline = Pipeline::new(&config, &preferred, &git, &runner);

    let plan = pipeline.plan(&from, &to)?;
    eprint!("{}", render_plan(&plan));
    if plan.is_empty() {
        eprintln!("    Nothing to build");
        return Ok(());
    }

    if !yes && !confirm(plan.sequence.len())? {
        eprintln!("    Cancelled");
        return Ok(());
    }

    let mut observer = ConsoleObserver;
    let report = pipeline.run(&plan, &mut observer)?;

    match report.halt() {
        None => {
            eprintln!("    Finished {} unit(s)", report.outcomes().len());
            Ok(())
        }
        Some(halt) => {
            let skipped = plan.sequence.len().saturating_sub(report.outcomes().len());
            Err(format!(
                "build of {} {}; {skipped} remaining unit(s) not built",
                halt.unit, halt.cause
            )
            .into())
        }
    }
}

fn cmd_init() -> CliResult {
    let cwd = std::env::current_dir()?;
    let path = multibuild_engine::init_config(&cwd)?;
    eprintln!("    Created {}", path.display());
    eprintln!();
    eprintln!("  Next:");
    eprintln!("    edit `command` and `marker` for your repository");
    eprintln!("    multibuild plan <FROM> <TO>");
    Ok(())
}

fn confirm(count: usize) -> Result<bool, Box<dyn Error>> {
    let answer = dialoguer::Confirm::new()
        .with_prompt(format!("Build {count} unit(s)?"))
        .default(false)
        .interact()
        .map_err(|e| format!("cannot prompt for confirmation ({e}); pass --yes to skip it"))?;
    Ok(answer)
}

/// Human-readable plan: impacted units, forced units, then the build order.
fn render_plan(plan: &BuildPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Changes {}..{}", plan.from, plan.to);

    if plan.impacted.is_empty() {
        let _ = writeln!(out, "  no units contain changed files");
    } else {
        let _ = writeln!(out, "Impacted units ({}):", plan.impacted.len());
        for unit in &plan.impacted {
            let _ = writeln!(out, "  {unit}");
        }
    }

    if !plan.forced.is_empty() {
        let _ = writeln!(out, "Always built ({}):", plan.forced.len());
        for unit in &plan.forced {
            let _ = writeln!(out, "  {unit}");
        }
    }

    if !plan.sequence.is_empty() {
        let _ = writeln!(out, "Build order:");
        for (index, unit) in plan.sequence.iter().enumerate() {
            let _ = writeln!(out, "  {}. {unit}", index + 1);
        }
    }
    out
}

fn short_hash(hash: &str) -> &str {
    hash.get(..10).unwrap_or(hash)
}

/// Status lines on stderr, build output passed through to the matching stream.
struct ConsoleObserver;

impl BuildObserver for ConsoleObserver {
    fn unit_started(&mut self, index: usize, total: usize, unit: &BuildUnitId, command: &str) {
        eprintln!("   Building [{}/{total}] {unit}", index + 1);
        tracing::debug!("running `{command}`");
    }

    fn output(&mut self, _unit: &BuildUnitId, line: &OutputLine) {
        match line {
            OutputLine::Stdout(text) => {
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(stdout, "{text}");
            }
            OutputLine::Stderr(text) => eprintln!("{text}"),
        }
    }

    fn unit_finished(&mut self, outcome: &BuildOutcome) {
        if outcome.succeeded {
            eprintln!("      Built {}", outcome.unit.file_name());
        } else {
            eprintln!(
                "     Failed {} (exit code {})",
                outcome.unit.file_name(),
                outcome.exit_code
            );
        }
    }
}
