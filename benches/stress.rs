use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(format!("bench_{}", Ulid::new()))
        .user("stayd")
        .password("stayd");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

/// Nightly dates starting 2026-01-01: day(0) = '2026-01-01'.
fn day(i: i64) -> String {
    (NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Days::new(i as u64)).to_string()
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

/// Create a homestay with one room in this connection's tenant.
async fn setup_room(client: &tokio_postgres::Client) -> Ulid {
    let hid = Ulid::new();
    let rid = Ulid::new();
    client
        .batch_execute(&format!("INSERT INTO homestays (id) VALUES ('{hid}')"))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO rooms (id, homestay_id) VALUES ('{rid}', '{hid}')"
        ))
        .await
        .unwrap();
    rid
}

async fn insert_booking(client: &tokio_postgres::Client, rid: Ulid, night: i64) {
    let bid = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out) \
             VALUES ('{bid}', '{rid}', '{}', '{}')",
            day(night),
            day(night + 1)
        ))
        .await
        .unwrap();
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let rid = setup_room(&client).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        insert_booking(&client, rid, i as i64).await;
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!(
        "  {n} bookings in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            // Each task uses its own tenant (unique dbname from connect())
            let client = connect(&host, port).await;
            let rid = setup_room(&client).await;
            for j in 0..n_per_task {
                insert_booking(&client, rid, j as i64).await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(host: &str, port: u16) {
    // Writer tasks: continuously add bookings in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let rid = setup_room(&client).await;
            let mut i = 0i64;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let bid = Ulid::new();
                let _ = client
                    .batch_execute(&format!(
                        "INSERT INTO bookings (id, room_id, check_in, check_out) \
                         VALUES ('{bid}', '{rid}', '{}', '{}')",
                        day(i),
                        day(i + 1)
                    ))
                    .await;
                i += 1;
            }
        }));
    }

    // Reader tasks: query a year of availability over a busy calendar
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let rid = setup_room(&client).await;
            // Every other night booked so the free set is non-trivial
            for i in 0..50 {
                insert_booking(&client, rid, i * 2).await;
            }

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client
                    .batch_execute(&format!(
                        "SELECT * FROM availability WHERE room_id = '{rid}' \
                         AND start >= '2026-01-01' AND \"end\" <= '2026-12-31'"
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let rid = setup_room(&client).await;
            for i in 0..ops_per_conn {
                insert_booking(&client, rid, i as i64).await;
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("STAYD_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("STAYD_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid STAYD_PORT");

    println!("=== stayd stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
