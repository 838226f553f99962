use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use joingraph::{
    config::MapperConfig,
    domain::{company_shape, Company, CompanyMapper},
    entity_mapper::{assemble_with_stats, into_owned, DeduplicatingMapper},
    RowShape,
};
use serde_json::{Map, Value};

/// Joingraph - rebuild a company graph from flat join rows
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding an array of flat rows (reads stdin when omitted)
    #[arg(long)]
    rows: Option<PathBuf>,

    /// YAML mapper configuration (falls back to JOINGRAPH_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Return a company again for every row that repeats its id
    #[arg(long)]
    keep_duplicates: bool,

    /// Print compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize logger - defaults to WARN level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MapperConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MapperConfig::from_env().context("reading JOINGRAPH_* environment")?,
    };
    if cli.keep_duplicates {
        config.suppress_duplicates = false;
    }

    let input = match &cli.rows {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading rows from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading rows from stdin")?;
            buffer
        }
    };
    let rows: Vec<Map<String, Value>> =
        serde_json::from_str(&input).context("rows must be a JSON array of objects")?;

    let shape = company_shape(RowShape::with_config(&config))?;
    let cursors = shape.materialize_all(&rows)?;

    let mut mapper = DeduplicatingMapper::builder(CompanyMapper)
        .primary_key(|company: &Company| company.id)
        .config(&config)
        .build()?;
    let (companies, stats) = assemble_with_stats(cursors, &mut mapper)?;
    log::info!(
        "Mapped {} rows into {} companies ({} duplicate rows)",
        stats.rows,
        stats.entities,
        stats.duplicates
    );

    // Release the identity cache so handles unwrap without cloning
    drop(mapper);
    let companies = into_owned(companies);

    let output = if cli.compact {
        serde_json::to_string(&companies)?
    } else {
        serde_json::to_string_pretty(&companies)?
    };
    println!("{}", output);
    Ok(())
}
