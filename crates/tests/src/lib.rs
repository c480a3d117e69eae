//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到运行时组件的装配测试
//! - 读取 → 切分 → 投递 → 健康更新的端到端场景（内存队列 + mock 后端）

#[cfg(test)]
mod contract_tests {
    use contracts::{BackendId, Email};

    #[test]
    fn test_payload_envelope() {
        let payload = r#"{"email":{"fromEmail":"noreply@example.com","fromName":"Shop","toEmail":"ann@example.com","toName":"","subject":"Order","body":"Shipped"}}"#;
        let email = Email::from_payload("m-1", payload).unwrap();

        assert_eq!(email.from_header(), "Shop <noreply@example.com>");
        assert_eq!(email.to_header(), "ann@example.com");
        assert_eq!(BackendId::A.to_string(), "a");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use collaborators::{build_backend, MemoryQueue, MemoryQueueConfig, MockBackend, Timed};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BackendId, DeliveryBackend, Email, MockBehavior, QueueClient};
    use dispatcher::{
        create_dispatcher, DispatchReport, Dispatcher, DispatcherConfig, HealthThresholds,
        SplitPlan,
    };
    use ingestion::{QueueReader, ReaderConfig};

    type MockRelay = (
        QueueReader<MemoryQueue>,
        Dispatcher<MockBackend, MockBackend, MemoryQueue>,
    );

    fn email(n: usize) -> Email {
        Email {
            from_email: "noreply@example.com".into(),
            from_name: "Relay".into(),
            to_email: format!("user{n}@example.com"),
            to_name: format!("User {n}"),
            subject: format!("Message {n}"),
            body: "hello".into(),
        }
    }

    fn fill(queue: &MemoryQueue, name: &str, n: usize) {
        for i in 0..n {
            queue.enqueue_email(name, &email(i)).unwrap();
        }
    }

    fn mock_relay(
        queue: &Arc<MemoryQueue>,
        queues: &[&str],
        a: &Arc<MockBackend>,
        b: &Arc<MockBackend>,
        thresholds: HealthThresholds,
    ) -> MockRelay {
        let reader = QueueReader::new(
            queue.clone(),
            ReaderConfig::new(queues.iter().map(|q| q.to_string()).collect()),
        );
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                thresholds,
                ..Default::default()
            },
            a.clone(),
            b.clone(),
            queue.clone(),
        );
        (reader, dispatcher)
    }

    async fn iterate<A, B, Q>(
        reader: &QueueReader<Q>,
        dispatcher: &mut Dispatcher<A, B, Q>,
    ) -> DispatchReport
    where
        A: DeliveryBackend + Sync + 'static,
        B: DeliveryBackend + Sync + 'static,
        Q: QueueClient + Sync + 'static,
    {
        let batch = reader.read_batch().await;
        dispatcher.dispatch(batch).await
    }

    /// Batch of 4 with both backends healthy: two items each
    #[tokio::test]
    async fn test_even_split_when_both_healthy() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::new("a"));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) =
            mock_relay(&queue, &["q"], &a, &b, HealthThresholds::default());
        fill(&queue, "q", 4);

        let report = iterate(&reader, &mut dispatcher).await;

        assert_eq!(report.plan, SplitPlan { to_a: 2, to_b: 2 });
        assert_eq!(a.delivered_count(), 2);
        assert_eq!(b.delivered_count(), 2);
        assert_eq!(queue.deleted_count("q"), 4);
    }

    /// Single item with A unhealthy and B healthy goes through B
    #[tokio::test]
    async fn test_single_item_avoids_unhealthy_a() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::with_behavior("a", MockBehavior::Error));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) = mock_relay(
            &queue,
            &["q"],
            &a,
            &b,
            HealthThresholds {
                healthy: 3,
                unhealthy: 0,
            },
        );

        fill(&queue, "q", 1);
        let report = iterate(&reader, &mut dispatcher).await;
        assert_eq!(report.plan, SplitPlan { to_a: 1, to_b: 0 });
        assert!(!dispatcher.health(BackendId::A).is_healthy);

        // the failed item was made visible again and is retried through B
        let report = iterate(&reader, &mut dispatcher).await;
        assert_eq!(report.plan, SplitPlan { to_a: 0, to_b: 1 });
        assert_eq!(b.delivered_count(), 1);
        assert_eq!(queue.deleted_count("q"), 1);
    }

    /// unhealthy_threshold = 2: demoted after the 3rd failing iteration
    #[tokio::test]
    async fn test_demotion_waits_for_streak() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::with_behavior("a", MockBehavior::Reject));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) =
            mock_relay(&queue, &["q"], &a, &b, HealthThresholds::default());

        for iteration in 1..=3 {
            fill(&queue, "q", 2);
            let report = iterate(&reader, &mut dispatcher).await;
            assert!(report.a.failures > 0);

            let healthy = dispatcher.health(BackendId::A).is_healthy;
            assert_eq!(healthy, iteration < 3, "iteration {iteration}");
        }
    }

    /// Batch of 5 with B unhealthy: B gets one canary item
    #[tokio::test]
    async fn test_canary_to_unhealthy_b() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::new("a"));
        let b = Arc::new(MockBackend::with_behavior("b", MockBehavior::Error));
        let (reader, mut dispatcher) = mock_relay(
            &queue,
            &["q"],
            &a,
            &b,
            HealthThresholds {
                healthy: 0,
                unhealthy: 0,
            },
        );

        fill(&queue, "q", 2);
        iterate(&reader, &mut dispatcher).await;
        assert!(!dispatcher.health(BackendId::B).is_healthy);

        // one item came back from B; top up to five
        fill(&queue, "q", 4);
        b.set_behavior(MockBehavior::Accept);
        let report = iterate(&reader, &mut dispatcher).await;

        assert_eq!(report.plan, SplitPlan { to_a: 4, to_b: 1 });
        assert!(dispatcher.health(BackendId::B).is_healthy);
        assert_eq!(queue.visible_len("q") + queue.in_flight_len("q"), 0);
    }

    /// Unparseable item is deleted and does not count as a failure
    #[tokio::test]
    async fn test_poison_message_dropped() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::new("a"));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) = mock_relay(
            &queue,
            &["q"],
            &a,
            &b,
            HealthThresholds {
                healthy: 0,
                unhealthy: 0,
            },
        );
        queue.enqueue("q", r#"{"email": "not an object"}"#).unwrap();

        let report = iterate(&reader, &mut dispatcher).await;

        assert_eq!(report.a.poison, 1);
        assert_eq!(report.a.failures, 0);
        assert!(dispatcher.health(BackendId::A).is_healthy);
        assert_eq!(queue.deleted_count("q"), 1);
        assert_eq!(a.attempts(), 0);
    }

    #[tokio::test]
    async fn test_drains_every_queue_and_skips_broken_ones() {
        let queue = Arc::new(MemoryQueue::with_config(
            ["transactional", "bulk", "broken"],
            MemoryQueueConfig {
                fail_attributes: HashSet::from(["broken".to_string()]),
                ..Default::default()
            },
        ));
        let a = Arc::new(MockBackend::new("a"));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) = mock_relay(
            &queue,
            &["transactional", "bulk", "broken"],
            &a,
            &b,
            HealthThresholds::default(),
        );
        fill(&queue, "transactional", 23);
        fill(&queue, "bulk", 7);
        fill(&queue, "broken", 3);

        let report = iterate(&reader, &mut dispatcher).await;

        assert_eq!(report.plan.total(), 30);
        assert_eq!(a.delivered_count() + b.delivered_count(), 30);
        assert_eq!(queue.visible_len("broken"), 3);
        assert_eq!(reader.metrics().snapshot().queues_skipped, 1);
    }

    /// Every email is eventually delivered even with a flaky backend
    #[tokio::test]
    async fn test_at_least_once_with_flaky_backend() {
        let queue = Arc::new(MemoryQueue::new(["q"]));
        let a = Arc::new(MockBackend::failing_every("a", 2));
        let b = Arc::new(MockBackend::new("b"));
        let (reader, mut dispatcher) =
            mock_relay(&queue, &["q"], &a, &b, HealthThresholds::default());
        fill(&queue, "q", 40);

        for _ in 0..20 {
            iterate(&reader, &mut dispatcher).await;
            if queue.visible_len("q") == 0 && queue.in_flight_len("q") == 0 {
                break;
            }
        }

        assert_eq!(queue.deleted_count("q"), 40);
        let delivered: HashSet<String> = a
            .delivered()
            .into_iter()
            .chain(b.delivered())
            .map(|email| email.to_email)
            .collect();
        assert_eq!(delivered.len(), 40);
    }

    /// Components built from a config file, with timeouts around every call
    #[tokio::test(start_paused = true)]
    async fn test_relay_from_config() {
        let config = ConfigLoader::load_from_str(
            r#"
queue_urls = ["outbound"]
client_timeout_secs = 1

[backend_a]
name = "sendgrid"
kind = "log"

[backend_b]
name = "ses"
kind = "mock"
behavior = "fail_every"
fail_every = 3
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let timeout = config.client_timeout();
        let queue = Arc::new(Timed::new(MemoryQueue::new(&config.queue_urls), timeout));
        let backend_a = Arc::new(Timed::new(build_backend(&config.backend_a), timeout));
        let backend_b = Arc::new(Timed::new(build_backend(&config.backend_b), timeout));
        fill(queue.inner(), "outbound", 12);

        let reader = QueueReader::new(queue.clone(), ReaderConfig::from(&config));
        let mut dispatcher = create_dispatcher(&config, backend_a, backend_b, queue.clone());

        let report = iterate(&reader, &mut dispatcher).await;

        assert_eq!(report.plan, SplitPlan { to_a: 6, to_b: 6 });
        assert_eq!(report.a.delivered, 6);
        assert_eq!(report.b.failed, 2);
        assert_eq!(dispatcher.backend_name(BackendId::B), "ses");
        assert_eq!(queue.inner().visible_len("outbound"), 2);
        assert_eq!(queue.timeout(), Duration::from_secs(1));
    }
}
