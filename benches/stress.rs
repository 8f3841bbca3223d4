use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, Local, NaiveDate};
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

/// Bookable days per room under the default policy: today+1 ..= today+30.
const BOOKABLE_DAYS: u64 = 30;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname("innkeep")
        .user("innkeep")
        .password(std::env::var("INNKEEP_PASSWORD").unwrap_or_else(|_| "innkeep".into()));

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
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

fn day(offset: u64) -> NaiveDate {
    Local::now().date_naive() + Days::new(offset)
}

async fn create_room(client: &tokio_postgres::Client, name: &str) -> Ulid {
    let id = Ulid::new();
    client
        .batch_execute(&format!("INSERT INTO rooms (id, name) VALUES ('{id}', '{name}')"))
        .await
        .unwrap();
    id
}

fn place_sql(room: Ulid, email: &str, offset: u64) -> String {
    let id = Ulid::new();
    let d = day(offset);
    format!(
        "INSERT INTO reservations (id, room_id, customer_email, check_in, check_out) \
         VALUES ('{id}', '{room}', '{email}', '{d}', '{d}')"
    )
}

/// Fill every bookable day of a fresh room, one guest per night.
async fn fill_room(client: &tokio_postgres::Client, room: Ulid, latencies: &mut Vec<Duration>) {
    for offset in 1..=BOOKABLE_DAYS {
        let t = Instant::now();
        client
            .batch_execute(&place_sql(room, &format!("guest{offset}@example.com"), offset))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let n_rooms = 50;
    let mut latencies = Vec::new();
    let start = Instant::now();

    for i in 0..n_rooms {
        let room = create_room(&client, &format!("seq-{i}")).await;
        fill_room(&client, room, &mut latencies).await;
    }

    let elapsed = start.elapsed();
    let n = latencies.len();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} reservations in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let rooms_per_task = 20;

    let start = Instant::now();
    let mut handles = Vec::new();

    for t in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let mut latencies = Vec::new();
            for r in 0..rooms_per_task {
                let room = create_room(&client, &format!("conc-{t}-{r}")).await;
                fill_room(&client, room, &mut latencies).await;
            }
            latencies.len()
        }));
    }

    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {rooms_per_task} rooms = {total} reservations in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended(host: &str, port: u16) {
    let setup = connect(host, port).await;
    let room = create_room(&setup, "contended").await;
    drop(setup);

    let n_tasks = 20;
    let accepted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    for t in 0..n_tasks {
        let host = host.to_string();
        let accepted = accepted.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            for offset in 1..=BOOKABLE_DAYS {
                match client
                    .batch_execute(&place_sql(room, &format!("racer{t}@example.com"), offset))
                    .await
                {
                    Ok(()) => accepted.fetch_add(1, Ordering::Relaxed),
                    Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
                };
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let ok = accepted.load(Ordering::Relaxed);
    let rej = rejected.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} clients racing for {BOOKABLE_DAYS} nights: {ok} accepted, {rej} rejected in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    assert!(ok <= BOOKABLE_DAYS as usize, "room was double booked");
}

async fn phase4_dry_run_under_load(host: &str, port: u16) {
    let setup = connect(host, port).await;
    let room = create_room(&setup, "dry-run").await;
    let mut ignored = Vec::new();
    fill_room(&setup, room, &mut ignored).await;
    drop(setup);

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let mut i = 0;
            while !stop.load(Ordering::Relaxed) {
                let wroom = create_room(&client, &format!("writer-{w}-{i}")).await;
                for offset in 1..=BOOKABLE_DAYS {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let _ = client
                        .batch_execute(&place_sql(wroom, &format!("w{offset}@example.com"), offset))
                        .await;
                }
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let offset = 1 + (i as u64 % BOOKABLE_DAYS);
                let (ci, co) = (day(offset), day(offset + 1));
                let t = Instant::now();
                client
                    .simple_query(&format!(
                        "SELECT * FROM admission WHERE room_id = '{room}' AND customer_email = 'reader{r}@example.com' \
                         AND check_in = '{ci}' AND check_out = '{co}'"
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

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("admission dry run", &mut all_latencies);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("INNKEEP_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("INNKEEP_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid INNKEEP_PORT");

    println!("=== innkeep stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] contended room");
    phase3_contended(&host, port).await;

    println!("\n[phase 4] dry-run latency under write load");
    phase4_dry_run_under_load(&host, port).await;

    println!("\n=== benchmark complete ===");
}
