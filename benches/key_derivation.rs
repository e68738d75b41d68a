//! Benchmarks for cache key derivation and the read-through hit path
//!
//! This benchmark measures:
//! - Canonicalization and hashing of flat and nested query descriptions
//! - Tag propagation through eager loads
//! - A cached read served from the in-memory store

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use model_cache::query::{Operator, QueryDescription};
use model_cache::{CacheMediator, CachingConfig, KeyDeriver};

fn simple_query() -> QueryDescription {
    QueryDescription::new("Author").where_eq("name", "Anna")
}

fn filtered_query() -> QueryDescription {
    QueryDescription::new("Book")
        .select(["id", "title", "author_id"])
        .where_eq("published", true)
        .where_op("price", Operator::Lt, 40)
        .where_in("genre", ["sf", "fantasy", "horror"])
        .where_between("year", 1960, 2020)
        .or_where_group(|q| q.where_null("deleted_at").where_column("updated_at", Operator::Gt, "created_at"))
        .order_by_desc("year")
        .for_page(3, 25)
}

fn nested_query() -> QueryDescription {
    QueryDescription::new("Book")
        .with_constrained("author", "Author", |a| {
            a.where_eq("active", true)
                .with_constrained("profile", "Profile", |p| p.where_not_null("bio"))
        })
        .with("publisher", "Publisher")
        .where_has("reviews", "Review", |r| r.where_op("stars", Operator::GtEq, 4))
        .doesnt_have("recalls", "Recall")
        .limit(50)
}

fn bench_derive(c: &mut Criterion) {
    let config = CachingConfig::new().with_namespace("bench").with_environment("bench");
    let deriver = KeyDeriver::new(&config);
    let mut group = c.benchmark_group("key_derivation");

    for (name, query) in [
        ("simple", simple_query()),
        ("filtered", filtered_query()),
        ("nested", nested_query()),
    ] {
        group.bench_with_input(BenchmarkId::new("derive", name), &query, |b, q| {
            b.iter(|| deriver.derive(black_box(q)).unwrap())
        });
    }

    group.finish();
}

fn bench_read_through_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let cache = CacheMediator::in_memory(CachingConfig::new()).unwrap();
    let query = filtered_query();
    let rows: Vec<u64> = (0..100).collect();

    rt.block_on(async {
        let _: Vec<u64> = cache
            .read_through(&query, || async { Ok::<_, model_cache::Error>(rows.clone()) })
            .await
            .unwrap();
    });

    c.bench_function("read_through_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let hit: Vec<u64> = cache
                .read_through(black_box(&query), || async {
                    Ok::<_, model_cache::Error>(Vec::new())
                })
                .await
                .unwrap();
            hit
        })
    });
}

criterion_group!(benches, bench_derive, bench_read_through_hit);
criterion_main!(benches);
