//! mesos-install - Mesos base install provisioner
//!
//! Usage:
//!   mesos-install apply -a node.json       # Provision this host
//!   mesos-install plan -a node.json        # Show what apply would do
//!   mesos-install attributes -a node.json  # Print resolved node attributes

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mesos_install_core::config::{AttributeOverrides, NodeAttributes, Settings, SettingsStore};
use mesos_install_core::context::ProvisionContext;
use mesos_install_core::ensure::{RunMode, RunReport};
use mesos_install_core::types::{InitVariant, PlatformFamily};
use mesos_install_core::workflow::{Workflow, resolve_node};

#[derive(Parser)]
#[command(name = "mesos-install")]
#[command(about = "Mesos base install provisioner", long_about = None)]
struct Cli {
    /// Settings file (defaults to /etc/mesos-install/config.toml, then the
    /// user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Host root under which all absolute paths are resolved
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision this host
    Apply(RunArgs),

    /// Evaluate guards and report what apply would do, without changing anything
    Plan(RunArgs),

    /// Print the resolved node attributes as JSON
    Attributes(NodeArgs),
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    node: NodeArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct NodeArgs {
    /// Node attributes JSON file
    #[arg(short, long)]
    attributes: Option<PathBuf>,

    /// Override the platform family (detected from /etc/os-release otherwise)
    #[arg(long)]
    platform_family: Option<PlatformArg>,

    /// Override mesos.version
    #[arg(long)]
    mesos_version: Option<String>,

    /// Override mesos.init
    #[arg(long)]
    init: Option<InitArg>,

    /// Add a recipe to the run list (repeatable)
    #[arg(long = "recipe")]
    recipes: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Debian,
    Rhel,
}

impl From<PlatformArg> for PlatformFamily {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Debian => PlatformFamily::Debian,
            PlatformArg::Rhel => PlatformFamily::Rhel,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InitArg {
    Systemd,
    #[value(name = "sysvinit_debian")]
    SysvinitDebian,
    Upstart,
}

impl From<InitArg> for InitVariant {
    fn from(value: InitArg) -> Self {
        match value {
            InitArg::Systemd => InitVariant::Systemd,
            InitArg::SysvinitDebian => InitVariant::SysvinitDebian,
            InitArg::Upstart => InitVariant::Upstart,
        }
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesos_install=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(Cli::parse()) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config, cli.root)?;

    match cli.command {
        Commands::Apply(args) => run_workflow(settings, args, RunMode::Apply),
        Commands::Plan(args) => run_workflow(settings, args, RunMode::Plan),
        Commands::Attributes(args) => run_attributes(settings, args),
    }
}

fn load_settings(config: Option<PathBuf>, root: Option<PathBuf>) -> Result<Settings> {
    let store = SettingsStore::discover(config)?;
    if let Some(path) = store.config_path() {
        tracing::debug!(path = %path.display(), "loading settings");
    }
    let mut settings = store.load()?;
    if let Some(root) = root {
        settings.root = root;
    }
    Ok(settings)
}

fn load_attributes(args: NodeArgs) -> Result<NodeAttributes> {
    let mut attributes = match &args.attributes {
        Some(path) => NodeAttributes::load(path)?,
        None => NodeAttributes::default(),
    };
    attributes.apply_overrides(AttributeOverrides {
        platform_family: args.platform_family.map(Into::into),
        version: args.mesos_version,
        init: args.init.map(Into::into),
        recipes: args.recipes,
    });
    Ok(attributes)
}

fn run_workflow(settings: Settings, args: RunArgs, mode: RunMode) -> Result<()> {
    let ctx = ProvisionContext::new(settings);
    let node = resolve_node(&ctx, load_attributes(args.node)?)?;

    let report = Workflow::new(node).run(&ctx, mode)?;

    match args.format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn run_attributes(settings: Settings, args: NodeArgs) -> Result<()> {
    let ctx = ProvisionContext::new(settings);
    let node = resolve_node(&ctx, load_attributes(args)?)?;
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}

fn print_table(report: &RunReport) {
    println!("{:<20} {:<36} {:<10} Reason", "Phase", "Step", "Outcome");
    println!("{}", "-".repeat(90));

    for record in &report.steps {
        println!(
            "{:<20} {:<36} {:<10} {}",
            record.phase,
            record.step,
            record.outcome.as_str(),
            record.reason.as_deref().unwrap_or("")
        );
    }

    println!();
    let verb = match report.mode {
        RunMode::Apply => "changed",
        RunMode::Plan => "would change",
    };
    let changes = report.steps.iter().filter(|r| r.outcome.is_change()).count();
    println!("{} of {} steps {}", changes, report.steps.len(), verb);
}

fn print_json(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
