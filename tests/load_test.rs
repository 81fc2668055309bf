//! Load testing for the proxy.

use std::time::{Duration, Instant};

mod common;

use common::{start_backend, start_proxy, MockResponse};

#[tokio::test]
async fn test_load_performance() {
    // 1. Setup mock backends: A is quick but always failing, B answers after a short delay
    let backend_a = start_backend(MockResponse::new(503, "overloaded")).await;
    let backend_b = start_backend(
        MockResponse::new(200, "Hello from backend").delay(Duration::from_millis(5)),
    )
    .await;

    // 2. Start proxy with small read-ahead buffers so the pool is exercised
    let proxy = start_proxy(&backend_a.url(), &backend_b.url(), 4096).await;

    // 3. Run load test
    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success()
                        && matches!(res.text().await.as_deref(), Ok("Hello from backend"))
                    {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should be won by B");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("Buffer pool:    {:?}", proxy.pool.stats());
    println!("-------------------------\n");

    assert!(proxy.wait_for_buffers().await, "read-ahead buffers leaked under load");
    assert!(proxy.pool.stats().reuses > 0, "buffers should be reused across requests");
}
