use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use once_cell::sync::Lazy;

use crate::model::statutory_rules::RuleSet;

/// Active rule set per jurisdiction. Entries expire on their own so a rule
/// change made outside this process is picked up within the TTL; publishing
/// through this process invalidates immediately.
pub static RULES_CACHE: Lazy<Cache<String, Arc<RuleSet>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(64) // a handful of jurisdictions at most
        .time_to_live(Duration::from_secs(300))
        .build()
});

pub async fn get(jurisdiction: &str) -> Option<Arc<RuleSet>> {
    RULES_CACHE.get(jurisdiction).await
}

pub async fn store(rules: &RuleSet) {
    RULES_CACHE
        .insert(rules.jurisdiction.clone(), Arc::new(rules.clone()))
        .await;
}

/// Drop the cached entry after a publish so the next read sees the new
/// version.
pub async fn invalidate(jurisdiction: &str) {
    RULES_CACHE.invalidate(jurisdiction).await;
    log::info!("Rules cache invalidated for jurisdiction {}", jurisdiction);
}
