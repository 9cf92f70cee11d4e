//! Demo data seeder
//!
//! Run with: cargo run --bin seed --release -- --records 10000

use std::time::Instant;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use finintel::domain::{DataSource, NewFinancialRecord};
use finintel::repository::{FinancialRecordRepository, PgRepository, TenantRepository};

const TENANT_COUNT: usize = 5;
const TRAILING_MONTHS: u32 = 24;
const BATCH_SIZE: usize = 500;

fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

/// First and last instant-of-day of the month `offset` months before `now`.
fn month_bounds(now: DateTime<Utc>, offset: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?.checked_sub_months(Months::new(offset))?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;

    Some((
        Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?),
        Utc.from_utc_datetime(&last.and_hms_opt(0, 0, 0)?),
    ))
}

fn generate(tenants: &[Uuid], total: usize, now: DateTime<Utc>) -> anyhow::Result<Vec<NewFinancialRecord>> {
    let mut rng = rand::thread_rng();
    let mut records = Vec::with_capacity(total);

    for i in 0..total {
        let (period_start, period_end) = month_bounds(now, (i as u32) % TRAILING_MONTHS)
            .ok_or_else(|| anyhow::anyhow!("month arithmetic out of range"))?;

        let revenue: f64 = rng.gen_range(30_000.0..220_000.0);
        let expenses: f64 = rng.gen_range(revenue * 0.45..revenue * 0.85);

        records.push(NewFinancialRecord::new(
            tenants[i % tenants.len()],
            period_start,
            period_end,
            money(revenue),
            money(expenses),
            DataSource::ALL[i % DataSource::ALL.len()],
        ));
    }

    Ok(records)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let total: usize = args
        .iter()
        .position(|a| a == "--records")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Seeding {} financial records across {} tenants", total, TENANT_COUNT);
    println!("Connecting to database...");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let repository = PgRepository::new(pool.clone());

    let mut tenant_ids = Vec::with_capacity(TENANT_COUNT);
    for n in 1..=TENANT_COUNT {
        let tenant = repository
            .upsert(&format!("tenant-{}", n), &format!("Tenant {}", n))
            .await?;
        tenant_ids.push(tenant.id);
    }

    let records = generate(&tenant_ids, total, Utc::now())?;

    let start = Instant::now();
    let mut inserted = 0u64;
    for chunk in records.chunks(BATCH_SIZE) {
        inserted += repository.insert_records(chunk).await?;
        println!("Inserted {} records...", inserted);
    }

    let duration = start.elapsed();
    println!();
    println!("=== Seed Results ===");
    println!("Records inserted: {}", inserted);
    println!("Duration: {:?}", duration);

    pool.close().await;
    Ok(())
}
