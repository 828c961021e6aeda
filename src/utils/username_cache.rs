use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::tenant::TenantId;
use crate::utils::username_filter::key;

/// Only taken usernames are stored; a miss says nothing.
pub static USERNAME_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

pub async fn mark_taken(tenant: TenantId, username: &str) {
    USERNAME_CACHE.insert(key(tenant, username), true).await;
}

pub async fn is_taken(tenant: TenantId, username: &str) -> bool {
    USERNAME_CACHE
        .get(&key(tenant, username))
        .await
        .unwrap_or(false)
}

async fn batch_mark(keys: &[String]) {
    let futures: Vec<_> = keys
        .iter()
        .map(|k| USERNAME_CACHE.insert(k.clone(), true))
        .collect();

    futures::future::join_all(futures).await;
}

/// Load usernames of employees created in the last `days` days (batched)
pub async fn warmup_username_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (u64, String)>(
        r#"
        SELECT client_id, username
        FROM hr_employees
        WHERE created_at >= NOW() - INTERVAL ? DAY
        ORDER BY created_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let (client_id, username) = row?;
        batch.push(key(TenantId::new(client_id), &username));
        total_count += 1;

        if batch.len() >= batch_size {
            batch_mark(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_mark(&batch).await;
    }

    log::info!(
        "Username cache warmup complete: {} recent employees (last {} days)",
        total_count,
        days
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn taken_usernames_are_remembered_per_tenant() {
        let tenant = TenantId::new(4242);
        assert!(!is_taken(tenant, "cache-test").await);
        mark_taken(tenant, "Cache-Test").await;
        assert!(is_taken(tenant, "cache-test").await);
        assert!(!is_taken(TenantId::new(4243), "cache-test").await);
    }
}
