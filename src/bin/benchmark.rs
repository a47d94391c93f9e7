//! Throughput and latency benchmarks for a running PolyVault server
//!
//! Compares workloads spread over distinct keys, which only contend on their
//! own entries, against workloads hammering one shared key.

use clap::Parser;
use polyvault::{Client, Reply};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "polyvault-benchmark", about = "PolyVault load generator")]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:6369")]
    addr: String,

    /// Operations per client
    #[arg(long, default_value_t = 1000)]
    ops: usize,
}

#[derive(Debug)]
struct BenchmarkResults {
    operation: String,
    total_operations: usize,
    duration: Duration,
    ops_per_second: f64,
    avg_latency_ms: f64,
    p95_latency_ms: f64,
    p99_latency_ms: f64,
}

impl BenchmarkResults {
    fn new(operation: String, duration: Duration, latencies: &mut [Duration]) -> Self {
        latencies.sort();

        let total_operations = latencies.len();
        let millis = |d: &Duration| d.as_secs_f64() * 1000.0;
        let percentile = |p: f64| {
            let index = (total_operations as f64 * p) as usize;
            latencies.get(index).map(millis).unwrap_or(0.0)
        };

        Self {
            operation,
            total_operations,
            duration,
            ops_per_second: total_operations as f64 / duration.as_secs_f64(),
            avg_latency_ms: latencies.iter().map(millis).sum::<f64>()
                / total_operations.max(1) as f64,
            p95_latency_ms: percentile(0.95),
            p99_latency_ms: percentile(0.99),
        }
    }

    fn print(&self) {
        println!("=== {} ===", self.operation);
        println!("Total operations: {}", self.total_operations);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        println!("Average latency: {:.2}ms", self.avg_latency_ms);
        println!("P95 latency: {:.2}ms", self.p95_latency_ms);
        println!("P99 latency: {:.2}ms", self.p99_latency_ms);
        println!();
    }
}

/// Which keys the clients of one run push to.
#[derive(Debug, Clone, Copy)]
enum KeySpread {
    /// Every client owns its own list.
    PerClient,
    /// All clients push to the same list.
    Shared,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let run_id = std::process::id();

    println!("PolyVault Benchmarks against {}", args.addr);
    println!();

    for num_clients in [1, 10, 50] {
        for spread in [KeySpread::PerClient, KeySpread::Shared] {
            let results = run_push_pop(&args.addr, run_id, num_clients, args.ops, spread).await?;
            results.print();
        }
    }

    Ok(())
}

/// Each client alternates rpush and lpop on its target list.
async fn run_push_pop(
    addr: &str,
    run_id: u32,
    num_clients: usize,
    ops_per_client: usize,
    spread: KeySpread,
) -> Result<BenchmarkResults, Box<dyn std::error::Error>> {
    let mut handles = Vec::with_capacity(num_clients);
    let start = Instant::now();

    for client_id in 0..num_clients {
        let addr = addr.to_string();
        let key = match spread {
            KeySpread::PerClient => format!("bench:{}:{}:{}", run_id, num_clients, client_id),
            KeySpread::Shared => format!("bench:{}:{}:shared", run_id, num_clients),
        };

        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&addr).await?;
            let mut latencies = Vec::with_capacity(ops_per_client);

            for i in 0..ops_per_client {
                let op_start = Instant::now();
                let reply = if i % 2 == 0 {
                    client.command("rpush", &key, &["payload"]).await?
                } else {
                    client.command("lpop", &key, &[]).await?
                };
                latencies.push(op_start.elapsed());

                if let Reply::Error(e) = reply {
                    return Err(polyvault::PolyVaultError::Server(e));
                }
            }

            client.close().await?;
            Ok(latencies)
        }));
    }

    let mut all_latencies = Vec::with_capacity(num_clients * ops_per_client);
    for handle in handles {
        all_latencies.extend(handle.await??);
    }

    Ok(BenchmarkResults::new(
        format!("rpush/lpop, {} clients, {:?} keys", num_clients, spread),
        start.elapsed(),
        &mut all_latencies,
    ))
}
