use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use allot::config::Config;
use allot::index::IntervalIndex;
use allot::model::*;
use allot::store::InMemoryStore;
use allot::utilization::{ResourceCapacity, UtilizationCache};
use allot::value::{SchedulingSession, SecurityToken, ValueAllocationTask, ValueSpace};

const HOUR: Ms = 3_600_000;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    let ms = |d: Duration| d.as_secs_f64() * 1000.0;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        ms(avg),
        ms(percentile(latencies, 50.0)),
        ms(percentile(latencies, 95.0)),
        ms(percentile(latencies, 99.0)),
        ms(latencies[latencies.len() - 1]),
    );
}

fn reservation(resource_id: Ulid, i: i64) -> UtilizationRecord {
    UtilizationRecord {
        id: Ulid::new(),
        resource_id,
        kind: ReservationKind::Room {
            license_count: 1 + (i % 5) as u32,
        },
        span: Span::new(i * HOUR, i * HOUR + (1 + i % 7) * HOUR),
    }
}

fn phase1_index_insert() -> IntervalIndex<Ms, UtilizationRecord> {
    let n = 20_000;
    let resource = Ulid::new();
    let mut index = IntervalIndex::new();
    let start = Instant::now();
    for i in 0..n {
        let r = reservation(resource, i);
        let span = r.span;
        index.insert(r, span.start, span.end);
    }
    let elapsed = start.elapsed();
    println!(
        "  {n} inserts in {:.2}s = {:.0} ops/sec, {} boundaries",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64(),
        index.boundary_count()
    );
    index
}

fn phase2_index_query(index: &IntervalIndex<Ms, UtilizationRecord>) {
    let n = 5_000;
    let mut latencies = Vec::with_capacity(n);
    for i in 0..n as i64 {
        let start = (i * 7 % 20_000) * HOUR;
        let t = Instant::now();
        let segments = index.query_buckets(start, start + 24 * HOUR);
        std::hint::black_box(segments.iter().map(|s| s.bucket.weight()).max());
        latencies.push(t.elapsed());
    }
    print_latency("24h bucket query", &mut latencies);
}

async fn phase3_allocation() {
    let store = Arc::new(InMemoryStore::new());
    let config = Config {
        rng_seed: Some(1),
        ..Config::default()
    };
    let task = ValueAllocationTask::new(store.clone(), store.clone(), config);
    let space = ValueSpace::with_patterns(Ulid::new(), Ulid::new(), &["{digit:3}"])
        .expect("valid pattern");
    let mut session = SchedulingSession::new(SecurityToken::new("bench"));

    let n = 2_000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n as i64 {
        // Two-hour slots, one hour apart: every request overlaps its neighbours.
        let s = (i % 500) * HOUR;
        let t = Instant::now();
        match task.allocate(&mut session, &space, s, s + 2 * HOUR, None).await {
            Ok(decision) => {
                store.commit(&decision);
            }
            Err(e) => println!("  allocation {i} failed: {e}"),
        }
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    println!(
        "  {n} allocations in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("allocate + commit", &mut latencies);
}

async fn phase4_cache_readers() {
    let store = Arc::new(InMemoryStore::new());
    let capacities: Vec<ResourceCapacity> = (0..10)
        .map(|i| ResourceCapacity {
            resource_id: Ulid::new(),
            name: format!("mcu-{i}"),
            kind: CapacityKind::Room,
            license_count: 50,
        })
        .collect();
    for c in &capacities {
        for i in 0..2_000 {
            store.insert_reservation(reservation(c.resource_id, i));
        }
    }
    let cache = Arc::new(UtilizationCache::new(store.clone(), capacities, &Config::default()));

    let n_readers = 10;
    let reads_per_reader = 200;
    let mut handles = Vec::new();
    for r in 0..n_readers {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader as i64 {
                // Windows drift forward so the cache keeps extending.
                let start = ((r as i64) * 3 + i) * 24 * HOUR % (1_500 * HOUR);
                let t = Instant::now();
                let _ = cache
                    .get_utilization(Span::new(start, start + 7 * 24 * HOUR), 24 * HOUR)
                    .await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap_or_default());
    }
    println!("  {} storage fetches", store.reservation_fetches().len());
    print_latency("weekly utilization query", &mut all);
}

#[tokio::main]
async fn main() {
    println!("=== allot stress benchmark ===\n");

    println!("[phase 1] index insert throughput");
    let index = phase1_index_insert();

    println!("\n[phase 2] index query latency");
    phase2_index_query(&index);

    println!("\n[phase 3] sequential allocation");
    phase3_allocation().await;

    println!("\n[phase 4] concurrent utilization readers");
    phase4_cache_readers().await;

    println!("\n=== done ===");
}
