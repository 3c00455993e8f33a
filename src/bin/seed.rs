use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use serde_json::json;
use steth_store_api::{
    config::AppConfig,
    db::{DbPool, create_pool},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "Store Admin", "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "Sample Customer", "user@example.com", "user123", "user").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    // Seeded accounts skip the OTP step.
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role, is_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_verified = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_products(pool: &DbPool) -> anyhow::Result<()> {
    let scrub_sizes = json!(["XS", "S", "M", "L", "XL"]);
    let products = vec![
        (
            "Classic Scrub Set",
            "Four-way stretch top and jogger pants",
            4500.0,
            "scrubs",
            json!(["Navy", "Wine", "Ceil Blue"]),
            scrub_sizes.clone(),
            60,
        ),
        (
            "Lab Coat",
            "Full-length coat with three pockets",
            3200.0,
            "coats",
            json!(["White"]),
            scrub_sizes,
            40,
        ),
        (
            "Stethoscope Name Tag",
            "Engraved tag that clips onto the tubing",
            650.0,
            "accessories",
            json!(["Silver", "Rose Gold"]),
            json!([]),
            150,
        ),
    ];

    for (name, description, price, category, colors, sizes, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category, colors, sizes, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(category)
        .bind(colors)
        .bind(sizes)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
