use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sigscope_gdscript::GdScriptProvider;
use sigscope_graph::{file_topology, CommunityDetector, DetectorOptions, UnusedSignalDetector};
use sigscope_scanner::{AnalysisOutcome, ScanMode, SessionOptions, SignalSession};
use std::path::PathBuf;
use std::sync::Arc;

mod report;

#[derive(Parser)]
#[command(name = "sigscope")]
#[command(about = "Signal usage analysis for GDScript projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project and rebuild its signal graph
    Scan(ScanArgs),

    /// Report signals that are never emitted, never connected, or both
    Unused(UnusedArgs),

    /// Group files that talk to each other through signals
    Clusters(ScanArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Re-parse every file instead of only changed ones
    #[arg(long)]
    full: bool,

    /// Output JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct UnusedArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Also report names that are emitted or connected but never declared
    #[arg(long)]
    include_undeclared: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Scan(args) => run_scan(args).await?,
        Commands::Unused(args) => run_unused(args).await?,
        Commands::Clusters(args) => run_clusters(args).await?,
    }

    Ok(())
}

async fn analyze(args: &ScanArgs) -> Result<AnalysisOutcome> {
    let provider = Arc::new(GdScriptProvider::new());
    let mut session = SignalSession::open(&args.path, provider, SessionOptions::default())
        .await
        .with_context(|| format!("Failed to open project {}", args.path.display()))?;

    let mode = if args.full {
        ScanMode::Full
    } else {
        ScanMode::Incremental
    };
    session.analyze(mode).await.context("Signal analysis failed")
}

/// Scan the project and summarize the graph
async fn run_scan(args: ScanArgs) -> Result<()> {
    let outcome = analyze(&args).await?;

    if args.json {
        let output = report::ScanOutput {
            stats: &outcome.stats,
            graph: &outcome.graph.metadata,
            errors: &outcome.errors,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!(
            "{}",
            report::render_scan(&outcome.stats, &outcome.graph.metadata, &outcome.errors)
        );
    }
    Ok(())
}

async fn run_unused(args: UnusedArgs) -> Result<()> {
    let outcome = analyze(&args.scan).await?;
    let detector = UnusedSignalDetector::new(DetectorOptions {
        include_undeclared: args.include_undeclared,
        ..DetectorOptions::default()
    });
    let unused = detector.detect_unused(&outcome.graph);

    if args.scan.json {
        println!("{}", serde_json::to_string_pretty(&unused)?);
    } else {
        print!("{}", report::render_unused(&unused));
    }
    Ok(())
}

async fn run_clusters(args: ScanArgs) -> Result<()> {
    let outcome = analyze(&args).await?;
    let topology = file_topology(&outcome.graph);
    let clusters = CommunityDetector::new().detect_communities(&topology.nodes, &topology.edges);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
    } else {
        print!("{}", report::render_clusters(&clusters));
    }
    Ok(())
}
