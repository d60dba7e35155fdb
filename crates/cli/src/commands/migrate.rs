use anyhow::Result;
use tidemark_core::{Catalog, Config, Migrator};

pub async fn run(config: &Config) -> Result<()> {
    let catalog = Catalog::load(&config.migrations_dir)?;
    let db = config.connect().await?;
    let migrator = Migrator::new(db, &config.ledger_collection);

    let plan = migrator.plan(&catalog).await?;
    if plan.is_up_to_date() {
        println!("No pending migrations");
        return Ok(());
    }
    println!("Pending migrations: {}", plan.pending.len());

    let report = migrator.migrate(&catalog).await?;
    for id in &report.applied {
        println!("  ✓ {id}");
    }

    if let Some(failure) = report.failed {
        println!("  ✗ {}", failure.id);
        println!();
        println!(
            "⚠️  Stopped after {} of {} migration(s); re-run `tidemark migrate` once the failure is fixed",
            report.applied.len(),
            plan.pending.len()
        );
        return Err(failure.error.into());
    }

    println!();
    println!("✅ Applied {} migration(s)", report.applied.len());
    Ok(())
}
