//! Command-line front end for the ragroute engine.
//!
//! Queries run against an in-memory index loaded from a JSON corpus. Chat
//! and rerank providers come from the `[providers]` section of the config.

mod corpus;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use ragroute_core::{EngineConfig, OrchestrationEngine, OrchestrationError, Query};
use ragroute_retrieval::InMemoryIndex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use corpus::load_corpus;

/// Route, retrieve and fuse passages for a question.
#[derive(Debug, Parser)]
#[command(name = "ragroute", version, about)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Start from a preset instead of the defaults; ignored with --config
    #[arg(long, value_enum, global = true)]
    pub preset: Option<Preset>,

    /// Corpus to index: a JSON array of documents, or JSON lines
    #[arg(long, value_name = "PATH", global = true)]
    pub corpus: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Routed strategies only: no agent, no rerank, 5s budget
    Fast,
    /// Agent, rerank and every strategy enabled with a longer budget
    Thorough,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retrieve context for a question
    Query(QueryArgs),

    /// Show how a question would be routed without running it
    Route(RouteArgs),

    /// List the tools the planning agent may call
    Tools(JsonArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Overall timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Keep only results whose metadata matches, e.g. `--filter path=docs/retry.md`
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filter: Vec<(String, String)>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct RouteArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Validate the configuration and exit without printing it
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = self.load_config()?;
        match self.command {
            Command::Config(ref args) => run_config(&config, args),
            Command::Route(ref args) => {
                let engine = self.engine(config)?;
                run_route(&engine, args)
            }
            Command::Tools(ref args) => {
                let engine = self.engine(config)?;
                run_tools(&engine, args)
            }
            Command::Query(ref args) => {
                if let Some(seconds) = args.timeout {
                    config.timeout_seconds = seconds;
                }
                if let Some(limit) = args.limit {
                    config.max_results = limit;
                }
                let engine = self.engine(config)?;
                run_query(&engine, args).await
            }
        }
    }

    fn load_config(&self) -> Result<EngineConfig> {
        let config = match (&self.config, self.preset) {
            (Some(path), preset) => {
                if preset.is_some() {
                    warn!("--preset is ignored when --config is given");
                }
                EngineConfig::load(path)?
            }
            (None, Some(Preset::Fast)) => EngineConfig::fast(),
            (None, Some(Preset::Thorough)) => EngineConfig::thorough(),
            (None, None) => EngineConfig::default(),
        };
        Ok(config)
    }

    fn engine(&self, config: EngineConfig) -> Result<OrchestrationEngine> {
        let path = self
            .corpus
            .as_ref()
            .context("No corpus given. Pass --corpus <PATH> with a JSON document list.")?;
        let documents = load_corpus(path)?;
        info!("Loaded {} document(s) from {}", documents.len(), path.display());

        let engine = OrchestrationEngine::builder(config)
            .in_memory(Arc::new(InMemoryIndex::new(documents)))
            .with_configured_providers()?
            .build()?;
        Ok(engine)
    }
}

async fn run_query(engine: &OrchestrationEngine, args: &QueryArgs) -> Result<()> {
    let mut query = Query::new(args.query.as_str()).with_max_results(engine.config().max_results);
    for (key, value) in &args.filter {
        query = query.with_filter(key.as_str(), value.as_str());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = match engine.query_with(query, cancel).await {
        Ok(outcome) => outcome,
        Err(OrchestrationError::Cancelled) => {
            eprintln!("{} Query cancelled", "✗".red());
            std::process::exit(130);
        }
        Err(err) => return Err(err.into()),
    };

    if args.json {
        println!("{}", output::format_outcome_json(&args.query, &outcome)?);
        return Ok(());
    }

    if outcome.stats.timed_out {
        eprintln!(
            "{} Timed out after {:?}",
            "!".yellow(),
            engine.config().timeout()
        );
    }
    println!("{}", output::format_outcome_human(&args.query, &outcome));
    Ok(())
}

fn run_route(engine: &OrchestrationEngine, args: &RouteArgs) -> Result<()> {
    let decision = engine.route(&Query::new(args.query.as_str()));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!("{}", output::format_route_human(&decision));
    }
    Ok(())
}

fn run_tools(engine: &OrchestrationEngine, args: &JsonArgs) -> Result<()> {
    let tools = engine.tools().list_tools();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("{}", output::format_tools_human(&tools));
    if !engine.agent_available() {
        println!(
            "\n{} No chat provider configured; the planning agent is disabled.",
            "▶".bright_blue()
        );
    }
    Ok(())
}

fn run_config(config: &EngineConfig, args: &ConfigArgs) -> Result<()> {
    config.validate()?;
    if args.check {
        println!("{} Configuration is valid", "✓".green());
    } else {
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("path = docs/retry.md"),
            Ok(("path".to_string(), "docs/retry.md".to_string()))
        );
        assert!(parse_filter("path").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn test_preset_wins_only_without_config() {
        let cli = Cli::parse_from(["ragroute", "--preset", "fast", "config"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config, EngineConfig::fast());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ragroute", "route", "README.md", "--corpus", "c.json"]);
        assert_eq!(cli.corpus, Some(PathBuf::from("c.json")));
        assert!(matches!(cli.command, Command::Route(RouteArgs { json: false, .. })));
    }
}
