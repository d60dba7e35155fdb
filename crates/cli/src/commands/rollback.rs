use anyhow::Result;
use inquire::Confirm;
use tidemark_core::{Catalog, Config, MigrationId, Migrator};

pub async fn run(config: &Config, target: Option<&str>, yes: bool) -> Result<()> {
    let catalog = Catalog::load(&config.migrations_dir)?;
    let target: Option<MigrationId> = target.map(str::parse).transpose()?;

    if !yes {
        let prompt = match &target {
            Some(id) => format!("Revert migration {id}?"),
            None => "Revert the most recently applied migration?".to_string(),
        };
        if !Confirm::new(&prompt).with_default(false).prompt()? {
            println!("Aborted");
            return Ok(());
        }
    }

    let db = config.connect().await?;
    let migrator = Migrator::new(db, &config.ledger_collection);
    let report = migrator.rollback(&catalog, target.as_ref()).await?;

    println!("✅ Reverted {}", report.reverted);
    Ok(())
}
