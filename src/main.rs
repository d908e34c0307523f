// Ideaflow - blog idea generation workflow
// License: Apache-2.0

use clap::{Parser, Subcommand};
use ideaflow::config::Config;
use ideaflow::ideas::{get_products, IdeaPipeline};
use ideaflow::provider::factory::create_provider;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "ideaflow",
    about = "Ideaflow - generate blog post ideas for a list of products with a local LLM",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow once and print the ideas
    Run {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
        /// Base URL of the OpenAI-compatible API (e.g. http://localhost:11434/v1)
        #[arg(long)]
        api_base: Option<String>,
        /// Model name
        #[arg(short, long)]
        model: Option<String>,
        /// Maximum number of concurrent generation requests
        #[arg(long)]
        max_active_tasks: Option<usize>,
    },
    /// Print the products the workflow would generate ideas for
    Products {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    ideaflow::logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            config,
            api_base,
            model,
            max_active_tasks,
        }) => {
            run_cmd(config, api_base, model, max_active_tasks).await;
        }
        Some(Commands::Products { config }) => {
            products_cmd(config);
        }
        Some(Commands::Version) => {
            version_cmd();
        }
        None => {
            run_cmd(None, None, None, None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run_cmd(
    config_path: Option<String>,
    api_base: Option<String>,
    model: Option<String>,
    max_active_tasks: Option<usize>,
) {
    let mut cfg = load_config(config_path.as_deref());
    if let Some(base) = api_base {
        cfg.model.api_base = base;
    }
    if let Some(name) = model {
        cfg.model.name = name;
    }
    if let Some(n) = max_active_tasks {
        cfg.workflow.max_active_tasks = n;
    }

    if let Err(e) = cfg.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let provider = match create_provider(&cfg) {
        Ok(p) => Arc::from(p),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = IdeaPipeline::new(provider, cfg);
    let mut stdout = std::io::stdout();
    if let Err(e) = pipeline.run(&mut stdout).await {
        eprintln!("Workflow failed: {:#}", e);
        std::process::exit(1);
    }
}

fn products_cmd(config_path: Option<String>) {
    let cfg = load_config(config_path.as_deref());
    for (map_index, product) in get_products(&cfg.workflow).iter().enumerate() {
        match product {
            Some(p) => println!("[{}] {}", map_index, p.name()),
            None => println!("[{}] (missing, will be skipped)", map_index),
        }
    }
}

fn version_cmd() {
    println!("ideaflow v{}", ideaflow::VERSION);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load the config or exit with status 1. A missing file yields defaults.
fn load_config(path: Option<&str>) -> Config {
    match Config::load_from(path.map(Path::new)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
