use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};

use crate::model::tenant::TenantId;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static USERNAME_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// HR usernames are unique per tenant, so entries are keyed `client:username`.
#[inline]
pub fn key(tenant: TenantId, username: &str) -> String {
    format!("{}:{}", tenant, username.trim().to_lowercase())
}

/// Check if a username might exist in the tenant (false positives possible)
pub fn might_exist(tenant: TenantId, username: &str) -> bool {
    USERNAME_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&key(tenant, username))
}

pub fn insert(tenant: TenantId, username: &str) {
    USERNAME_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&key(tenant, username));
}

/// Warm up the filter from every HR employee, streamed in batches
pub async fn warmup_username_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (u64, String)>("SELECT client_id, username FROM hr_employees")
            .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (client_id, username) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(key(TenantId::new(client_id), &username));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Username filter warmup complete: {} employees", total);
    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = USERNAME_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    for k in keys {
        filter.add(k);
    }
}
