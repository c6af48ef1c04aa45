//! # Integration Tests
//!
//! End-to-end scenarios across config_loader, stream_sink and the reference
//! destinations. Time-dependent scenarios run on tokio's paused clock.

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, Destination, DestinationConfig, DestinationKind, DestinationRole, Event,
        RecordFailure, SecondaryConfig, SinkConfig, WriteOutcome,
    };
    use stream_sink::{create_destination, EventSinkBuilder};
    use tokio::time::Instant;

    type Responder = Box<dyn Fn(usize, &[Event]) -> WriteOutcome + Send + Sync>;

    struct Request {
        at: Instant,
        events: Vec<Event>,
        outcome: WriteOutcome,
    }

    struct ScriptedInner {
        name: &'static str,
        up: AtomicBool,
        responder: Option<Responder>,
        requests: Mutex<Vec<Request>>,
    }

    /// In-memory destination that records every request
    ///
    /// Without a responder, writes and probes succeed exactly while `up` is
    /// set. With one, the responder decides every write and probes succeed
    /// while `up` is set.
    #[derive(Clone)]
    struct Scripted(Arc<ScriptedInner>);

    impl Scripted {
        fn build(name: &'static str, up: bool, responder: Option<Responder>) -> Self {
            Self(Arc::new(ScriptedInner {
                name,
                up: AtomicBool::new(up),
                responder,
                requests: Mutex::new(Vec::new()),
            }))
        }

        fn up(name: &'static str) -> Self {
            Self::build(name, true, None)
        }

        fn down(name: &'static str) -> Self {
            Self::build(name, false, None)
        }

        fn responding(
            name: &'static str,
            responder: impl Fn(usize, &[Event]) -> WriteOutcome + Send + Sync + 'static,
        ) -> Self {
            Self::build(name, true, Some(Box::new(responder)))
        }

        fn set_up(&self, up: bool) {
            self.0.up.store(up, Ordering::SeqCst);
        }

        fn sizes(&self) -> Vec<usize> {
            let requests = self.0.requests.lock().unwrap();
            requests.iter().map(|r| r.events.len()).collect()
        }

        fn times(&self) -> Vec<Instant> {
            let requests = self.0.requests.lock().unwrap();
            requests.iter().map(|r| r.at).collect()
        }

        fn request(&self, call: usize) -> Vec<Event> {
            self.0.requests.lock().unwrap()[call].events.clone()
        }

        /// Payloads the destination acknowledged, in acknowledgement order
        fn accepted(&self) -> Vec<Bytes> {
            let requests = self.0.requests.lock().unwrap();
            let mut accepted = Vec::new();
            for request in requests.iter() {
                if let WriteOutcome::Partial(results) = &request.outcome {
                    for (event, result) in request.events.iter().zip(results) {
                        if result.is_ok() {
                            accepted.push(event.payload.clone());
                        }
                    }
                }
            }
            accepted
        }
    }

    impl Destination for Scripted {
        fn name(&self) -> &str {
            self.0.name
        }

        async fn write(&self, events: &[Event]) -> WriteOutcome {
            let mut requests = self.0.requests.lock().unwrap();
            let outcome = match &self.0.responder {
                Some(responder) => responder(requests.len(), events),
                None if self.0.up.load(Ordering::SeqCst) => WriteOutcome::success(events.len()),
                None => WriteOutcome::total_failure("service unavailable"),
            };
            requests.push(Request {
                at: Instant::now(),
                events: events.to_vec(),
                outcome: outcome.clone(),
            });
            outcome
        }

        async fn probe(&self) -> Result<(), ContractError> {
            if self.0.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ContractError::destination_unreachable(self.0.name, "probe failed"))
            }
        }
    }

    fn config() -> SinkConfig {
        let mut config =
            SinkConfig::with_primary(DestinationConfig::new("good", DestinationKind::Log));
        config.buffer.byte_limit = 10_000;
        config.buffer.record_limit = 100;
        config.buffer.time_limit_ms = 60_000;
        config.backoff.min_backoff_ms = 10;
        config.backoff.max_backoff_ms = 100;
        config.backoff.max_retries = 2;
        config.startup.check_interval_ms = 50;
        config.shutdown.grace_period_ms = 5_000;
        config
    }

    fn with_secondary(mut config: SinkConfig, max_records: usize, max_bytes: usize) -> SinkConfig {
        let mut secondary =
            SecondaryConfig::new(DestinationConfig::new("overflow", DestinationKind::Log));
        secondary.max_records_per_request = max_records;
        secondary.max_bytes_per_request = max_bytes;
        config.secondary = Some(secondary);
        config
    }

    fn payloads(n: usize, size: usize) -> Vec<Bytes> {
        (0..n)
            .map(|i| {
                let mut payload = format!("{i:04}").into_bytes();
                payload.resize(size.max(4), b'.');
                Bytes::from(payload)
            })
            .collect()
    }

    async fn let_probes_run() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// 2 of 5 events rejected: only those 2 come back, after min backoff
    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_retried_after_min_backoff() {
        let primary = Scripted::responding("good", |call, events| {
            if call == 0 {
                WriteOutcome::Partial(
                    (0..events.len())
                        .map(|i| match i {
                            1 | 3 => Err(RecordFailure::new(
                                "ProvisionedThroughputExceededException",
                                "Rate exceeded for shard shardId-000000000001",
                            )),
                            _ => Ok(()),
                        })
                        .collect(),
                )
            } else {
                WriteOutcome::success(events.len())
            }
        });
        let mut config = config();
        config.backoff.min_backoff_ms = 1_000;
        config.backoff.max_backoff_ms = 60_000;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .build()
            .unwrap();

        let events = payloads(5, 16);
        sink.store_raw_events(events.clone(), "key");
        sink.flush();
        let report = sink.shutdown().await;

        assert!(report.drained);
        assert_eq!(primary.sizes(), vec![5, 2]);
        let retried: Vec<Bytes> = primary.request(1).into_iter().map(|e| e.payload).collect();
        assert_eq!(retried, vec![events[1].clone(), events[3].clone()]);

        let times = primary.times();
        assert!(times[1] - times[0] >= Duration::from_millis(1_000));

        let mut accepted = primary.accepted();
        accepted.sort();
        assert_eq!(accepted, events);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_to_secondary_after_exhausted_retries() {
        let primary = Scripted::responding("good", |_, _| WriteOutcome::total_failure("timeout"));
        let secondary = Scripted::up("overflow");
        let sink = EventSinkBuilder::new(with_secondary(config(), 10, 10_000), primary.clone())
            .secondary(secondary.clone())
            .build()
            .unwrap();
        let_probes_run().await;
        assert!(sink.destination_healthy(DestinationRole::Primary));

        let events = payloads(4, 8);
        sink.store_raw_events(events.clone(), "key");
        sink.flush();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(primary.sizes(), vec![4, 4, 4]);
        assert_eq!(secondary.accepted(), events);
        assert!(!sink.destination_healthy(DestinationRole::Primary));
        assert!(sink.destination_healthy(DestinationRole::Secondary));
        assert!(sink.is_healthy());

        let report = sink.shutdown().await;
        assert_eq!(report.metrics[0].1.failover_count, 1);
        assert_eq!(report.metrics[1].1.records_succeeded, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_secondary_retries_indefinitely_at_max_backoff() {
        let primary = Scripted::responding("good", |call, events| {
            if call < 6 {
                WriteOutcome::total_failure("unavailable")
            } else {
                WriteOutcome::success(events.len())
            }
        });
        let mut config = config();
        config.backoff.max_retries = 1;
        config.backoff.max_backoff_ms = 1_000;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .build()
            .unwrap();

        sink.store_raw_events(payloads(3, 8), "key");
        sink.flush();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let times = primary.times();
        assert_eq!(times.len(), 7);
        // After the first exhaustion every attempt waits at least max backoff
        for pair in times[1..].windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1_000));
        }
        assert_eq!(primary.accepted().len(), 3);

        sink.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_requests_respect_limits() {
        let primary = Scripted::down("good");
        let secondary = Scripted::up("overflow");
        let sink = EventSinkBuilder::new(with_secondary(config(), 4, 100), primary.clone())
            .secondary(secondary.clone())
            .build()
            .unwrap();
        let_probes_run().await;
        assert!(!sink.destination_healthy(DestinationRole::Primary));

        // Record ceiling
        sink.store_raw_events(payloads(10, 10), "key");
        sink.flush();
        // Byte ceiling: three 30 byte events per request
        sink.store_raw_events(payloads(7, 30), "key");
        sink.flush();
        let report = sink.shutdown().await;

        assert!(report.drained);
        assert!(primary.sizes().is_empty());
        assert_eq!(secondary.sizes(), vec![4, 4, 2, 3, 3, 1]);
        assert_eq!(report.metrics[1].1.request_count, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_residual_events() {
        let primary = Scripted::up("good");
        let mut config = config();
        config.buffer.time_limit_ms = 1_000;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .build()
            .unwrap();

        sink.store_raw_events(payloads(2, 8), "key");
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(primary.sizes().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(primary.sizes(), vec![2]);
        assert_eq!(sink.pending_len(), 0);

        sink.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_threshold_splits_batches() {
        let primary = Scripted::up("good");
        let mut config = config();
        config.buffer.byte_limit = 250;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .build()
            .unwrap();

        for payload in payloads(3, 100) {
            sink.store_raw_events([payload], "key");
        }
        assert_eq!(sink.pending_len(), 1);

        sink.shutdown().await;
        assert_eq!(primary.sizes(), vec![2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_events() {
        let primary = Scripted::up("good");
        let sink = EventSinkBuilder::new(config(), primary.clone())
            .build()
            .unwrap();

        sink.store_raw_events(payloads(3, 8), "key");
        assert!(primary.sizes().is_empty());

        let report = sink.shutdown().await;
        assert!(report.drained);
        assert_eq!(primary.accepted(), payloads(3, 8));
        assert_eq!(report.metrics[0].0, "good");
        assert_eq!(report.metrics[0].1.records_succeeded, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_healthy_follows_probes() {
        let primary = Scripted::down("good");
        let secondary = Scripted::down("overflow");
        let sink = EventSinkBuilder::new(with_secondary(config(), 10, 10_000), primary.clone())
            .secondary(secondary.clone())
            .build()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!sink.is_healthy());

        secondary.set_up(true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(sink.is_healthy());
        assert!(!sink.destination_healthy(DestinationRole::Primary));
        assert!(sink.destination_healthy(DestinationRole::Secondary));

        sink.shutdown().await;
    }

    /// Both destinations fail, events bounce between them until one recovers
    #[tokio::test(start_paused = true)]
    async fn test_ping_pong_until_recovery() {
        let primary = Scripted::up("good");
        let secondary = Scripted::up("overflow");
        let mut config = with_secondary(config(), 10, 10_000);
        config.backoff.max_retries = 1;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .secondary(secondary.clone())
            .build()
            .unwrap();
        let_probes_run().await;

        primary.set_up(false);
        secondary.set_up(false);
        let events = payloads(5, 8);
        sink.store_raw_events(events.clone(), "key");
        sink.flush();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!sink.is_healthy());
        assert!(primary.sizes().len() >= 4);
        assert!(secondary.sizes().len() >= 4);
        assert!(primary.accepted().is_empty());

        primary.set_up(true);
        let report = sink.shutdown().await;

        assert!(report.drained);
        assert_eq!(primary.accepted(), events);
        assert!(secondary.accepted().is_empty());
        assert!(report.metrics[0].1.failover_count >= 2);
        assert!(report.metrics[1].1.failover_count >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_abandons_pending_retries() {
        let primary = Scripted::down("good");
        let mut config = config();
        config.backoff.min_backoff_ms = 10_000;
        config.backoff.max_backoff_ms = 20_000;
        config.shutdown.grace_period_ms = 1_000;
        let sink = EventSinkBuilder::new(config, primary.clone())
            .build()
            .unwrap();

        sink.store_raw_events(payloads(2, 8), "key");
        let started = Instant::now();
        let report = sink.shutdown().await;

        assert!(!report.drained);
        assert!(started.elapsed() <= Duration::from_millis(1_000));
        assert_eq!(primary.sizes(), vec![2]);
    }

    fn read_jsonl(path: &Path) -> Vec<Bytes> {
        if !path.exists() {
            return Vec::new();
        }
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<Event>(line).unwrap().payload)
            .collect()
    }

    /// Config file → file destinations: oversized events end up on the secondary
    #[tokio::test]
    async fn test_config_to_file_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let primary_dir = dir.path().join("primary");
        let secondary_dir = dir.path().join("secondary");
        let toml = format!(
            r#"
[buffer]
record_limit = 10
time_limit_ms = 60000

[backoff]
min_backoff_ms = 5
max_backoff_ms = 20
max_retries = 2

[startup]
check_interval_ms = 10

[shutdown]
grace_period_ms = 5000

[primary]
name = "good"
kind = "file"
params = {{ base_path = "{}", max_record_bytes = "8" }}

[secondary]
name = "overflow"
kind = "file"
params = {{ base_path = "{}" }}
max_records_per_request = 2
"#,
            primary_dir.display(),
            secondary_dir.display()
        );

        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let primary = create_destination(&config.primary).unwrap();
        let secondary =
            create_destination(&config.secondary.as_ref().unwrap().destination).unwrap();
        let sink = EventSinkBuilder::new(config, primary)
            .secondary(secondary)
            .build()
            .unwrap();

        // Wait until the primary probe has passed so the batch is routed there
        while !sink.destination_healthy(DestinationRole::Primary) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        sink.store_raw_events(["small", "tiny", "this one is too large", "ok"], "key");
        let report = sink.shutdown().await;
        assert!(report.drained);

        assert_eq!(
            read_jsonl(&primary_dir.join("good.jsonl")),
            vec![
                Bytes::from_static(b"small"),
                Bytes::from_static(b"tiny"),
                Bytes::from_static(b"ok")
            ]
        );
        assert_eq!(
            read_jsonl(&secondary_dir.join("overflow.jsonl")),
            vec![Bytes::from_static(b"this one is too large")]
        );
        assert_eq!(report.metrics[0].1.failover_count, 1);
    }
}
