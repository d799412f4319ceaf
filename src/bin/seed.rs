use shopp_storefront::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();
    let config = AppConfig::from_env()?;

    // Ensure migrations are applied.
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;

    let inserted = seed_items(&pool).await?;
    tracing::info!(inserted, "seed completed");
    Ok(())
}

async fn seed_items(pool: &sqlx::PgPool) -> anyhow::Result<u64> {
    // (name, mrp, price, stock)
    let items: [(&str, i64, i64, i32); 6] = [
        ("Sona Masoori Rice 5kg", 420, 389, 40),
        ("Chakki Atta 10kg", 480, 449, 25),
        ("Toor Dal 1kg", 180, 162, 60),
        ("Sugar 1kg", 52, 48, 120),
        ("Sunflower Oil 1L", 175, 158, 80),
        ("Tea Powder 500g", 290, 265, 35),
    ];

    let mut inserted = 0;
    for (name, mrp, price, stock) in items {
        let result = sqlx::query(
            r#"
            INSERT INTO items (id, name, mrp, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(name)
        .bind(mrp)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
