pub mod rules_cache;
