/// Benchmark for catalog cache performance
///
/// This benchmark demonstrates the performance of the bounded adaptive cache
/// and the name resolution cache. It measures the throughput of repeated
/// name lookups against a populated catalog and the cost of the coarse
/// invalidation that DDL triggers.

use rellite::cache::{BoundedCache, CacheSettings};
use rellite::catalog::{Catalog, ObjectKind, SchemaObject};
use std::time::Instant;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    println!("=== Catalog Cache Throughput Benchmark ===\n");
    println!("Testing name resolution cache performance...\n");

    // Setup - create an in-memory catalog with a realistic object population
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();

    println!("📋 Setup: Creating test tables across schemas...");
    for i in 0..5 {
        for j in 0..3 {
            let name = format!("schema_{}.table_{}", i, j);
            session
                .create_object(
                    SchemaObject::new(0, &name, ObjectKind::BaseTable).persistent(),
                )
                .expect("Failed to create table");
        }
    }
    println!("  Created 5 schemas with 3 tables each (15 total tables)\n");

    // Benchmark: Repeated unrooted lookups (served from the cache after the
    // first store probe)
    println!("📊 Benchmark: resolve_name() - Repeated Calls");
    let lookup_start = Instant::now();
    let iterations = 10_000;

    for i in 0..iterations {
        let suffix = format!("table_{}", i % 3);
        let _candidates = catalog.resolve_name(&suffix, true);
    }

    let lookup_duration = lookup_start.elapsed();
    let lookup_ops_per_sec = iterations as f64 / lookup_duration.as_secs_f64();
    println!("  Iterations: {}", iterations);
    println!("  Time: {:?}", lookup_duration);
    println!("  Throughput: {:.0} lookups/sec", lookup_ops_per_sec);
    println!();

    // Benchmark: DDL invalidation cost (each create clears the cache, the
    // following lookup repopulates it)
    println!("📊 Benchmark: Cache Invalidation on CREATE");
    let invalidation_start = Instant::now();

    for i in 0..10 {
        let name = format!("schema_0.invalidation_{}", i);
        session
            .create_object(SchemaObject::new(0, &name, ObjectKind::BaseTable).persistent())
            .expect("Failed to create table");
        let _candidates = catalog.resolve_name("table_0", true);
    }

    let invalidation_duration = invalidation_start.elapsed();
    println!("  Created 10 tables with a lookup after each");
    println!("  Time: {:?}", invalidation_duration);
    println!("  Average per create+lookup: {:?}", invalidation_duration / 10);
    println!();

    // Benchmark: Raw bounded cache under a skewed access pattern
    println!("📊 Benchmark: BoundedCache - Skewed References");
    let settings = CacheSettings::default();
    let mut cache: BoundedCache<u32, u64> = BoundedCache::with_settings(
        1024,
        settings.cutoff_fraction,
        settings.correlated_reference_period,
    )
    .expect("Failed to build cache");

    let raw_start = Instant::now();
    let raw_iterations = 100_000u32;
    for i in 0..raw_iterations {
        // 90% of references land in a hot set a quarter the cache size.
        let key = if i % 10 == 0 { i % 8192 } else { i % 256 };
        if cache.try_get(&key).is_none() {
            cache.reference(key, u64::from(i));
        }
    }
    let raw_duration = raw_start.elapsed();
    let raw_ops_per_sec = raw_iterations as f64 / raw_duration.as_secs_f64();
    let raw_stats = cache.stats();
    println!("  Iterations: {}", raw_iterations);
    println!("  Time: {:?}", raw_duration);
    println!("  Throughput: {:.0} references/sec", raw_ops_per_sec);
    println!(
        "  Hits: {}  Misses: {}  Evictions: {}",
        raw_stats.hits, raw_stats.misses, raw_stats.evictions
    );
    println!();

    // Summary
    let name_stats = catalog.name_cache().stats();
    println!("=== Summary ===");
    println!("With name resolution caching:");
    println!("  resolve_name(): {:.0} lookups/sec", lookup_ops_per_sec);
    println!(
        "  Cache counters: {} hits, {} misses, {} clears",
        name_stats.name_hits, name_stats.name_misses, name_stats.clears
    );
    println!();
    println!("✅ Repeated lookups are served from the cache; DDL pays a");
    println!("   coarse clear and the next lookup repopulates.");
    println!();
    println!("Expected behavior:");
    println!("  - First lookup: Probes the store index, caches the candidates");
    println!("  - Subsequent lookups: Return cached candidates");
    println!("  - DDL operations: Clear the cache, forcing refresh on next access");
}
