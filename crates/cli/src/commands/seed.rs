//! Demo data seeding for local development.
//!
//! Registers a handful of users, two sellers' catalog items, and one
//! institute, and grants each member a starting balance so checkouts work
//! immediately.
//!
//! # Environment Variables
//!
//! - `STRIDE_DATABASE_URL` - `PostgreSQL` connection string

use chrono::Utc;

use stride_api::db::PgStore;
use stride_core::{ItemKind, Points, SellerId, StockLevel, UserId};
use stride_engine::LedgerStore;
use stride_engine::store::{NewCatalogItem, NewInstitute};

use super::{CliError, require_secret};

/// Admin user registered by the seed; `token issue --user 1 --role admin`
/// matches it.
const ADMIN_USER: UserId = UserId::new(1);

/// Demo member balance.
const STARTING_BALANCE: Points = Points::new(500);

pub async fn run() -> Result<(), CliError> {
    let database_url = require_secret("STRIDE_DATABASE_URL")?;
    let pool = stride_api::db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);
    let now = Utc::now();

    store.ensure_user(ADMIN_USER, now).await?;
    for id in 2..=4 {
        let member = UserId::new(id);
        store.ensure_user(member, now).await?;
        store
            .commit_grant(ADMIN_USER, member, STARTING_BALANCE, "seed balance", now)
            .await?;
    }
    tracing::info!("Seeded admin user 1 and members 2-4");

    let items = [
        NewCatalogItem {
            seller_id: SellerId::new(1),
            kind: ItemKind::Reward,
            unit_cost: Points::new(50),
            stock: StockLevel::Bounded(25),
        },
        NewCatalogItem {
            seller_id: SellerId::new(1),
            kind: ItemKind::Product,
            unit_cost: Points::new(30),
            stock: StockLevel::Unbounded,
        },
        NewCatalogItem {
            seller_id: SellerId::new(2),
            kind: ItemKind::Reward,
            unit_cost: Points::new(120),
            stock: StockLevel::Bounded(5),
        },
        NewCatalogItem {
            seller_id: SellerId::new(2),
            kind: ItemKind::Product,
            unit_cost: Points::new(80),
            stock: StockLevel::Unbounded,
        },
    ];
    for item in items {
        let created = store.insert_catalog_item(item).await?;
        tracing::info!(item = %created.id, seller = %created.seller_id, "seeded catalog item");
    }

    let institute = store
        .insert_institute(NewInstitute {
            name: "Clean Rivers Fund".to_owned(),
            points_goal: Points::new(10_000),
        })
        .await?;
    tracing::info!(institute = %institute.id, "seeded institute");

    Ok(())
}
