use engine::GroupCtx;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "khata={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.store.database).await?;
    let engine = engine::Engine::builder().database(db).build().await?;

    let group = engine
        .ensure_group(&settings.group.user, &settings.group.name)
        .await?;
    let ctx = GroupCtx::new(settings.group.user.clone(), group.id.clone());
    tracing::info!(group = %group.name, group_id = %group.id, "group ready");

    let mut snapshots = engine.subscribe(&ctx).await?;
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            tracing::info!(
                revision = snapshot.revision,
                savings = %snapshot.balances.savings,
                overdraft = %snapshot.balances.overdraft,
                outstanding = %snapshot.balances.outstanding_loans,
                members = snapshot.members,
                transactions = snapshot.transactions,
                "ledger updated"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
