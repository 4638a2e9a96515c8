//! Bounded-concurrency resolution coordinator.
//!
//! One resolution task per channel, at most `concurrency` in flight.
//! Results come back in completion order; each future carries its own
//! record, so no bookkeeping map is needed and a slow or failed task never
//! blocks its siblings. Callers re-sort by persistent number afterwards.

use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::info;

use crate::models::{ChannelRecord, ResolvedChannel};

/// Resolve every numbered record through `resolve`, one attempt each.
///
/// Generic over the resolve function so the coordinator can be exercised
/// without a network.
pub async fn resolve_all<F, Fut>(
    records: Vec<(u32, ChannelRecord)>,
    concurrency: usize,
    resolve: F,
) -> Vec<ResolvedChannel>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<String>>,
{
    let total = records.len();
    let mut done = 0usize;
    let mut resolved = Vec::with_capacity(total);

    let mut results = stream::iter(records.into_iter().map(|(number, record)| {
        let fut = resolve(record.stream_token.clone());
        async move { (number, record, fut.await) }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some((number, record, m3u8_url)) = results.next().await {
        done += 1;
        let status = if m3u8_url.is_some() { "✓" } else { "✗" };
        info!("[{}/{}] {} channel #{}: {}", done, total, status, number, record.name);

        resolved.push(ResolvedChannel {
            number,
            name: record.name,
            stream_id: record.stream_token,
            logo: record.logo,
            m3u8_url,
        });
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn record(name: &str, token: &str) -> ChannelRecord {
        ChannelRecord {
            name: name.to_string(),
            logo: format!("http://example.com/{}.png", token),
            stream_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn one_result_per_input_record() {
        let records = vec![(1, record("A", "10")), (2, record("B", "20"))];
        let resolved = resolve_all(records, 8, |token| async move {
            Some(format!("http://cdn.example.com/{}.m3u8", token))
        })
        .await;

        assert_eq!(resolved.len(), 2);
        let mut numbers: Vec<u32> = resolved.iter().map(|c| c.number).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn results_keep_their_originating_record() {
        let records = vec![(5, record("Five", "50")), (1, record("One", "11"))];
        let resolved = resolve_all(records, 2, |token| async move {
            if token == "50" {
                Some("http://cdn.example.com/five.m3u8".to_string())
            } else {
                None
            }
        })
        .await;

        let five = resolved.iter().find(|c| c.number == 5).unwrap();
        assert_eq!(five.name, "Five");
        assert_eq!(five.stream_id, "50");
        assert!(five.m3u8_url.is_some());

        let one = resolved.iter().find(|c| c.number == 1).unwrap();
        assert_eq!(one.m3u8_url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_task_does_not_block_siblings() {
        let records = vec![
            (1, record("Fast", "1")),
            (2, record("Hung", "2")),
            (3, record("Slow", "3")),
        ];

        let resolved = resolve_all(records, 8, |token| async move {
            match token.as_str() {
                // Simulates a request that never completes; the per-request
                // timeout is what ends it.
                "2" => timeout(Duration::from_secs(5), sleep(Duration::from_secs(3600)))
                    .await
                    .ok()
                    .map(|_| unreachable!("sleep outlives timeout")),
                "3" => {
                    sleep(Duration::from_millis(200)).await;
                    Some("http://cdn.example.com/slow.m3u8".to_string())
                }
                _ => Some("http://cdn.example.com/fast.m3u8".to_string()),
            }
        })
        .await;

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved.iter().find(|c| c.number == 2).unwrap().m3u8_url, None);
        assert!(resolved.iter().find(|c| c.number == 1).unwrap().m3u8_url.is_some());
        assert!(resolved.iter().find(|c| c.number == 3).unwrap().m3u8_url.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_budget_bounds_in_flight_tasks() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let records: Vec<(u32, ChannelRecord)> = (1..=6)
            .map(|n| (n, record(&format!("C{}", n), &n.to_string())))
            .collect();

        let resolved = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            resolve_all(records, 2, move |_token| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    None
                }
            })
            .await
        };

        assert_eq!(resolved.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let records = vec![(1, record("A", "10"))];
        let resolved = resolve_all(records, 0, |_| async { None }).await;
        assert_eq!(resolved.len(), 1);
    }
}
