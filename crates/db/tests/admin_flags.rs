//! Admin flag mirror round-trips. Needs a PostgreSQL server via
//! `DATABASE_URL`, so these are ignored by default:
//! `cargo test -p scout-db -- --ignored`.

use scout_db::repositories::AdminFlagRepo;
use sqlx::PgPool;
use uuid::Uuid;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn upsert_then_find(pool: PgPool) {
    let id = Uuid::new_v4();
    let inserted = AdminFlagRepo::upsert(&pool, id, "a@scout.test", true)
        .await
        .expect("upsert should succeed");
    assert!(inserted.is_admin);

    let found = AdminFlagRepo::find(&pool, id)
        .await
        .expect("query should succeed")
        .expect("row should exist");
    assert_eq!(found.email, "a@scout.test");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
async fn upsert_overwrites_flag(pool: PgPool) {
    let id = Uuid::new_v4();
    AdminFlagRepo::upsert(&pool, id, "b@scout.test", true)
        .await
        .expect("first upsert");
    AdminFlagRepo::upsert(&pool, id, "b@scout.test", false)
        .await
        .expect("second upsert");

    let admins = AdminFlagRepo::list_admins(&pool).await.expect("list");
    assert!(admins.iter().all(|a| a.user_id != id));
}
