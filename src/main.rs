use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repoquery::query_compiler::{CompileMode, Param};
use repoquery::{CompilerConfig, QueryDefinition, StaticCatalog};
use std::path::PathBuf;
use std::sync::Arc;

/// RepoQuery - compile declarative query definitions to SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a query definition and print the SQL with its bind values
    Compile {
        /// Catalog YAML (tables and link types)
        #[arg(long)]
        catalog: PathBuf,

        /// Query definition YAML
        #[arg(long)]
        query: PathBuf,

        /// Compiler config YAML; REPOQUERY_* environment variables otherwise
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the max date sentinel (`%Y-%m-%d %H:%M:%S`)
        #[arg(long)]
        max_date: Option<String>,

        /// Override the accepted link statuses (repeatable)
        #[arg(long = "link-status")]
        link_statuses: Vec<String>,

        /// Join repository and type tables instead of the views
        #[arg(long)]
        physical: bool,

        /// Project geometry columns
        #[arg(long)]
        geometry: bool,

        /// Print `{"sql": ..., "params": [...]}` instead of plain text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to WARN, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match Cli::parse().command {
        Command::Compile {
            catalog,
            query,
            config,
            max_date,
            link_statuses,
            physical,
            geometry,
            json,
        } => {
            let mut config = match config {
                Some(path) => CompilerConfig::from_yaml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => CompilerConfig::from_env().context("reading REPOQUERY_* environment")?,
            };
            if let Some(max_date) = max_date {
                config.max_date = max_date;
            }
            if !link_statuses.is_empty() {
                config.link_statuses = link_statuses;
            }
            let env = Arc::new(config.build_env().context("invalid compiler config")?);

            let catalog = StaticCatalog::from_yaml_file(&catalog)
                .with_context(|| format!("loading catalog {}", catalog.display()))?;
            let definition = QueryDefinition::from_yaml_file(&query)
                .with_context(|| format!("loading query {}", query.display()))?;
            let graph = definition
                .build(&catalog, &config, env)
                .context("building query graph")?;

            let compiled = graph
                .compile_query(CompileMode::new(physical, geometry))
                .context("compiling query")?;
            log::info!(
                "Compiled {} node(s) into {} bind value(s)",
                graph.len(),
                compiled.params.len()
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&compiled)?);
            } else {
                println!("{}", compiled.sql);
                print_params(&compiled.params);
            }
        }
    }
    Ok(())
}

fn print_params(params: &[Param]) {
    if params.is_empty() {
        return;
    }
    println!();
    for (i, param) in params.iter().enumerate() {
        println!("-- ${} = {}", i + 1, param);
    }
}
