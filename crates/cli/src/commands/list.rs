use anyhow::Result;
use tidemark_core::{Catalog, Config, Migrator};

pub async fn run(config: &Config) -> Result<()> {
    let catalog = Catalog::load(&config.migrations_dir)?;
    if catalog.is_empty() {
        println!(
            "No migrations found in {}",
            config.migrations_dir.display()
        );
        return Ok(());
    }

    let db = config.connect().await?;
    let migrator = Migrator::new(db, &config.ledger_collection);
    let plan = migrator.plan(&catalog).await?;

    println!();
    println!("Available Migrations");
    println!("====================");
    for entry in catalog.entries() {
        let marker = if plan.applied.contains(&entry.id) {
            "✓ applied"
        } else {
            "○ pending"
        };
        println!("  {marker}  {}  {}", entry.id, entry.description);
    }
    println!();
    Ok(())
}
