use anyhow::Result;
use tidemark_core::{scaffold_migration, Config};

pub async fn run(config: &Config, description: &str) -> Result<()> {
    let (id, path) = scaffold_migration(&config.migrations_dir, description)?;

    println!("✅ Created migration {id}");
    println!("   File: {}", path.display());
    println!("   Fill in the `upgrade` and `downgrade` command lists, then run `tidemark migrate`");
    Ok(())
}
