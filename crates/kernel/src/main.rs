//! Strainer command-line front end.
//!
//! Binds a repository to one table, queues the criteria given on the
//! command line and runs one read against PostgreSQL. Results are printed
//! as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use strainer_kernel::config::Config;
use strainer_kernel::criteria::{CriteriaCatalog, CriteriaDeclaration, CriteriaEntry};
use strainer_kernel::repository::{ModelDefinition, ModelRegistry, Repository, Storage};
use strainer_kernel::{db, value};

/// Run criteria-refined queries against one table.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Table the repository is bound to.
    #[arg(long)]
    table: String,

    /// Primary key column.
    #[arg(long, default_value = "id")]
    key: String,

    /// Criteria to queue, in order: `NAME` or `NAME={json config}`.
    #[arg(long = "criteria", value_name = "NAME[=JSON]")]
    criteria: Vec<String>,

    /// Bypass the criteria pipeline.
    #[arg(long)]
    skip_criteria: bool,

    /// Criteria declaration file; overrides CRITERIA_FILE.
    #[arg(long)]
    criteria_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the SQL produced by the queued criteria without running it.
    Explain,
    /// Rows after applying criteria.
    Get {
        #[arg(long, value_delimiter = ',', default_value = "*")]
        columns: Vec<String>,
    },
    /// Rows for the unrefined query.
    All {
        #[arg(long, value_delimiter = ',', default_value = "*")]
        columns: Vec<String>,
    },
    /// One page of rows after applying criteria.
    Paginate {
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, value_delimiter = ',', default_value = "*")]
        columns: Vec<String>,
    },
    /// Row by primary key.
    Find {
        key: String,
        #[arg(long, value_delimiter = ',', default_value = "*")]
        columns: Vec<String>,
    },
    /// Sum of a column over the refined rows.
    Sum { column: String },
}

#[derive(Serialize)]
struct Explained {
    sql: String,
    outcome: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let catalog = Arc::new(load_catalog(
        args.criteria_file.as_ref().or(config.criteria_file.as_ref()),
    )?);

    // Explain never touches the database.
    let storage: Arc<dyn Storage> = Arc::new(match args.command {
        Command::Explain => db::create_lazy_storage(&config)?,
        _ => db::create_storage(&config)
            .await
            .context("failed to initialize storage")?,
    });
    info!(table = %args.table, "storage ready");

    let mut models = ModelRegistry::new();
    models.register(&args.table, ModelDefinition::new(&args.table, &args.key));

    let mut repository = Repository::new(storage, &models, &args.table)?
        .with_catalog(catalog)
        .with_max_per_page(config.max_per_page);

    for raw in &args.criteria {
        repository.push_criteria(parse_criteria(raw)?);
    }
    repository.skip_criteria(args.skip_criteria);

    let output = match args.command {
        Command::Explain => {
            let outcome = repository.apply_criteria()?;
            serde_json::to_value(Explained {
                sql: repository.to_sql(),
                outcome: format!("{outcome:?}"),
            })?
        }
        Command::Get { columns } => {
            serde_json::to_value(repository.get(&column_refs(&columns)).await?)?
        }
        Command::All { columns } => {
            serde_json::to_value(repository.all(&column_refs(&columns)).await?)?
        }
        Command::Paginate {
            per_page,
            page,
            columns,
        } => {
            let per_page = per_page.unwrap_or(config.default_per_page);
            serde_json::to_value(
                repository
                    .paginate(per_page, page, &column_refs(&columns))
                    .await?,
            )?
        }
        Command::Find { key, columns } => serde_json::to_value(
            repository
                .find(value::parse_key(&key), &column_refs(&columns))
                .await?,
        )?,
        Command::Sum { column } => repository.sum(&column).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Build the catalog, adding declarations from `path` when given.
fn load_catalog(path: Option<&PathBuf>) -> Result<CriteriaCatalog> {
    let mut catalog = CriteriaCatalog::new();

    if let Some(path) = path {
        let declaration = CriteriaDeclaration::from_file(path)?;
        let warnings =
            catalog.apply_declarations(vec![(path.display().to_string(), declaration)]);
        info!(
            path = %path.display(),
            declared = catalog.extension_names().len(),
            rejected = warnings.len(),
            "criteria declarations loaded"
        );
    }

    Ok(catalog)
}

/// Parse `NAME` or `NAME={json}` into a named entry.
fn parse_criteria(raw: &str) -> Result<CriteriaEntry> {
    let (name, config) = match raw.split_once('=') {
        Some((name, json)) => (
            name,
            serde_json::from_str(json)
                .with_context(|| format!("invalid JSON config for criteria '{name}'"))?,
        ),
        None => (raw, serde_json::Value::Null),
    };

    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "criteria name must not be empty");
    Ok(CriteriaEntry::named(name, config))
}

fn column_refs(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("strainer=info,strainer_kernel=info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
