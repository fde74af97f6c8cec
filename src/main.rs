use anyhow::{Context, Result};
use tracing::{error, info};

use lakehouse_adapter::config::Config;
use lakehouse_adapter::{logging, CatalogSource, Credentials, SchemaService};

/// Lists the configured schema through the catalog API and prints the
/// discovered relations as JSON
#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    logging::init(&config.logging)?;

    let credentials = Credentials::new(config.target.clone())?;
    let schema = credentials
        .schema()
        .context("LAKEHOUSE_SCHEMA must be set to probe a schema")?
        .to_string();

    info!("Probing {} for schema {}", credentials.identity(), schema);

    let service = SchemaService::new(&credentials, &config.catalog)?;
    let relations = service
        .list_relations(credentials.catalog(), &schema)
        .await
        .map_err(|e| {
            error!("Failed to list relations: {}", e);
            e
        })?;

    info!("Found {} relations", relations.len());
    println!("{}", serde_json::to_string_pretty(&relations)?);

    Ok(())
}
