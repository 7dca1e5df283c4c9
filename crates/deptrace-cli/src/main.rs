//! deptrace - build and run a tracer-instrumented Ethereum toolchain
//!
//! ## Commands
//!
//! - `build`: patch and build `node`, `lib`, `toolchain` or `all` into one
//!   output directory
//! - `run`: start the instrumented node from a runtime config, optionally with
//!   the trace viewer
//! - `pull`: update the go-ethereum checkout

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use deptrace_build::{
    BuildDriver, BuildReport, Layout, ProcessRunner, TargetBuilder, TargetGraph, TargetSelector,
};
use deptrace_core::{config, GitIndex, ResolvedConfig};
use deptrace_launch::{Companion, LaunchOptions, NodeExit};

#[derive(Parser)]
#[command(name = "deptrace")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and run a tracer-instrumented geth / foundry toolchain", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and reports
    #[arg(long, global = true)]
    json: bool,

    /// Checkout root holding tracer/, go-ethereum/ and foundry/
    #[arg(long, global = true, env = "DEPTRACE_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch and build a target and everything it depends on
    Build {
        /// One of node, lib, toolchain, all
        #[arg(default_value = "all")]
        target: String,

        /// Output directory (default: <root>/build)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run the instrumented node as a development chain
    Run {
        /// Runtime config (JSON); read from stdin when omitted
        config: Option<PathBuf>,

        /// Start the trace viewer and open it in a browser
        #[arg(long)]
        view: bool,

        /// geth binary (default: <root>/build/geth)
        #[arg(long)]
        node_bin: Option<PathBuf>,

        /// Address for the node's HTTP-RPC server
        #[arg(long)]
        http_addr: Option<String>,

        /// Delete the on-disk store after the node exits
        #[arg(long)]
        ephemeral: bool,
    },

    /// Pull the latest go-ethereum sources
    Pull,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    deptrace_core::init_tracing(cli.json, level);

    let layout = Layout::from_root(&cli.root);

    match cli.command {
        Commands::Build { target, out } => {
            let layout = match out {
                Some(out) => layout.with_out_dir(out),
                None => layout,
            };
            cmd_build(layout, &target, cli.json).await
        }
        Commands::Run {
            config,
            view,
            node_bin,
            http_addr,
            ephemeral,
        } => {
            let resolved = read_config(config.as_deref())?;
            let options = launch_options(&layout, node_bin, view, http_addr, ephemeral);
            cmd_run(&options, &resolved).await
        }
        Commands::Pull => cmd_pull(layout).await,
    }
}

fn builder(layout: Layout) -> TargetBuilder {
    TargetBuilder::new(layout, Arc::new(ProcessRunner), Arc::new(GitIndex))
}

async fn cmd_build(layout: Layout, target: &str, json: bool) -> Result<()> {
    // Parsed here rather than by clap so an unknown name exits 1, not 2
    let selector: TargetSelector = target.parse()?;

    info!(root = %layout.root.display(), out = %layout.out_dir.display(), "build layout");
    let driver = BuildDriver::new(TargetGraph::standard(), builder(layout));
    let report = driver
        .run(selector)
        .await
        .with_context(|| format!("build of `{selector}` failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    println!("Built {} in {} ms", report.selector, report.duration_ms);
    for target in &report.targets {
        println!("  {} ({} ms)", target.target, target.duration_ms);
        for artifact in &target.artifacts {
            match &artifact.sha256 {
                Some(digest) => {
                    let short = &digest[..12.min(digest.len())];
                    println!("    {}  {}", artifact.path.display(), short);
                }
                None => println!("    {}", artifact.path.display()),
            }
        }
    }
}

/// Load from `path`, or from stdin resolved against the working directory.
fn read_config(path: Option<&Path>) -> Result<ResolvedConfig> {
    match path {
        Some(path) => config::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read config from stdin")?;
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            Ok(config::parse(&text, &cwd)?)
        }
    }
}

/// Node and viewer come from the build output unless `--node-bin` says otherwise.
fn launch_options(
    layout: &Layout,
    node_bin: Option<PathBuf>,
    view: bool,
    http_addr: Option<String>,
    ephemeral: bool,
) -> LaunchOptions {
    let node_bin =
        node_bin.unwrap_or_else(|| layout.out_dir.join(deptrace_build::artifact::NODE_BINARY));
    let companion = view.then(|| {
        let webview = layout.out_dir.join(deptrace_build::artifact::WEBVIEW);
        Companion::webview(webview.join("app.py"))
    });

    let mut options = LaunchOptions::new(node_bin).ephemeral(ephemeral);
    if let Some(addr) = http_addr {
        options = options.with_http_addr(addr);
    }
    if let Some(companion) = companion {
        options = options.with_companion(companion);
    }
    options
}

async fn cmd_run(options: &LaunchOptions, config: &ResolvedConfig) -> Result<()> {
    info!(
        engine = config.engine(),
        output = config.output().unwrap_or(""),
        node = %options.node_bin.display(),
        "launching node"
    );
    match deptrace_launch::launch(options, config).await? {
        NodeExit::Exited(status) => info!(%status, "node finished"),
        NodeExit::Interrupted => info!("stopped by interrupt"),
    }
    Ok(())
}

async fn cmd_pull(layout: Layout) -> Result<()> {
    let repo = layout.node_repo.clone();
    builder(layout)
        .pull_node()
        .await
        .with_context(|| format!("git pull failed in {}", repo.display()))?;
    println!("Updated {}", repo.display());
    Ok(())
}
