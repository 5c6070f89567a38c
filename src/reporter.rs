//! The long-lived flush / health-check loop.
//!
//! Both timers feed one merged stream and are handled strictly one at a time,
//! so a flush never sees the connection mid-replacement and a reconnect never
//! races a write. A slow flush delays a pending health check (and vice versa).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ReporterConfig;
use crate::error::{SetupError, TransportError};
use crate::influx::{Connection, Connector, HttpConnector, PingInfo, PointAggregator, Tags};
use crate::metrics::Registry;

/// How often the connection is probed, independent of the flush interval.
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// How long a probe may take before the connection is presumed dead.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Alive(PingInfo),
    /// Probe failed; a fresh connection replaced the old one.
    Reconnected,
    /// Probe failed and so did reconnecting; the old connection is kept.
    ReconnectFailed,
}

#[derive(Debug, Clone, Copy)]
enum Tick {
    Flush,
    Ping,
}

/// Owns the outbound connection and periodically ships the registry.
pub struct Reporter<C: Connector> {
    registry: Arc<Registry>,
    connector: C,
    connection: C::Connection,
    aggregator: PointAggregator,
    interval: Duration,
}

impl Reporter<HttpConnector> {
    /// Build an HTTP reporter from a validated config.
    pub fn from_config(registry: Arc<Registry>, config: &ReporterConfig) -> Result<Self, SetupError> {
        let connector =
            HttpConnector::new(&config.url, config.username.clone(), config.password.clone())?;
        let aggregator = PointAggregator::new(&config.database, &config.prefix, Tags::new());
        Ok(Self::new(registry, connector, aggregator, config.interval())?.with_tags(config.tags.clone()))
    }
}

impl<C: Connector> Reporter<C> {
    /// Opens the first connection. Failing here aborts startup.
    pub fn new(
        registry: Arc<Registry>,
        connector: C,
        aggregator: PointAggregator,
        interval: Duration,
    ) -> Result<Self, SetupError> {
        if interval.is_zero() {
            return Err(SetupError::ZeroInterval);
        }
        let connection = connector.connect()?;

        Ok(Self {
            registry,
            connector,
            connection,
            aggregator,
            interval,
        })
    }

    /// Replace the tag set attached to every measurement, keeping database
    /// and prefix.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.aggregator = self.aggregator.with_tags(tags);
        self
    }

    pub fn connection(&self) -> &C::Connection {
        &self.connection
    }

    /// Drain the registry and write one batch. Returns the number of
    /// measurements sent; an empty registry sends nothing.
    pub async fn flush(&mut self) -> Result<usize, TransportError> {
        let timestamp = Utc::now();
        let batch = self.aggregator.aggregate(&self.registry, timestamp);
        if batch.is_empty() {
            tracing::debug!("registry is empty, nothing to send");
            return Ok(0);
        }

        self.connection.write(&batch).await?;
        Ok(batch.len())
    }

    /// Probe the connection and replace it if the probe fails.
    pub async fn check_connection(&mut self) -> Health {
        let probe = time::timeout(PING_TIMEOUT, self.connection.ping(PING_TIMEOUT)).await;
        let err = match probe {
            Ok(Ok(info)) => {
                tracing::trace!(rtt = ?info.rtt, version = ?info.version, "ping ok");
                return Health::Alive(info);
            }
            Ok(Err(err)) => err,
            Err(_) => TransportError::Timeout(PING_TIMEOUT),
        };

        tracing::warn!(error = %err, "ping failed, recreating InfluxDB connection");
        match self.connector.connect() {
            Ok(connection) => {
                self.connection = connection;
                tracing::info!("InfluxDB connection recreated");
                Health::Reconnected
            }
            Err(err) => {
                tracing::error!(error = %err, "reconnect failed, keeping old connection until next ping");
                Health::ReconnectFailed
            }
        }
    }

    /// Run forever. Errors are logged and never end the loop.
    pub async fn run(mut self) {
        tracing::info!(
            interval = ?self.interval,
            database = self.aggregator.database(),
            prefix = self.aggregator.prefix(),
            "reporter started"
        );

        let mut ticks = ticker(self.interval, Tick::Flush).merge(ticker(PING_INTERVAL, Tick::Ping));
        while let Some(tick) = ticks.next().await {
            match tick {
                Tick::Flush => self.on_flush().await,
                Tick::Ping => {
                    self.check_connection().await;
                }
            }
        }
    }

    async fn on_flush(&mut self) {
        let span = tracing::debug_span!("flush", flush_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            match self.flush().await {
                Ok(sent) => tracing::debug!(measurements = sent, took = ?started.elapsed(), "flushed"),
                Err(err) => tracing::error!(error = %err, "flush failed, batch dropped"),
            }
        }
        .instrument(span)
        .await
    }
}

/// Ticks every `period`, first one `period` from now. Late ticks are dropped.
fn ticker(period: Duration, tick: Tick) -> impl Stream<Item = Tick> + Unpin {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    IntervalStream::new(interval).map(move |_| tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influx::Batch;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted fake of the transport, shared between connector and
    /// connections so tests can flip failures on and off.
    #[derive(Default)]
    struct Script {
        fail_ping: bool,
        fail_connect: bool,
        fail_write: bool,
        /// Ping never answers.
        hang_ping: bool,
        connects: usize,
        pings: usize,
        /// `(connection id, batch)` for every attempted write.
        writes: Vec<(usize, Batch)>,
    }

    #[derive(Clone, Default)]
    struct FakeConnector(Arc<Mutex<Script>>);

    struct FakeConnection {
        id: usize,
        script: Arc<Mutex<Script>>,
    }

    impl Connector for FakeConnector {
        type Connection = FakeConnection;

        fn connect(&self) -> Result<FakeConnection, TransportError> {
            let mut s = self.0.lock();
            if s.fail_connect {
                return Err(TransportError::Status {
                    status: 503,
                    body: "refused".into(),
                });
            }
            s.connects += 1;
            Ok(FakeConnection {
                id: s.connects,
                script: self.0.clone(),
            })
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn ping(&self, _timeout: Duration) -> Result<PingInfo, TransportError> {
            let hang = {
                let mut s = self.script.lock();
                s.pings += 1;
                if s.fail_ping {
                    return Err(TransportError::Timeout(PING_TIMEOUT));
                }
                s.hang_ping
            };
            if hang {
                std::future::pending::<()>().await;
            }
            Ok(PingInfo {
                rtt: Duration::from_millis(1),
                version: Some("1.8.10".into()),
            })
        }

        async fn write(&self, batch: &Batch) -> Result<(), TransportError> {
            let mut s = self.script.lock();
            s.writes.push((self.id, batch.clone()));
            if s.fail_write {
                return Err(TransportError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn reporter(connector: FakeConnector) -> Reporter<FakeConnector> {
        let registry = Arc::new(Registry::new());
        registry
            .get_or_register_meter("endpoint.reqs")
            .unwrap()
            .mark(3);
        let tags = Tags::from([("service".to_string(), "foo".to_string())]);
        let aggregator = PointAggregator::new("metrics", "namespace", tags);
        Reporter::new(registry, connector, aggregator, Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn flush_writes_one_batch() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());

        assert_eq!(reporter.flush().await.unwrap(), 1);

        let s = connector.0.lock();
        assert_eq!(s.writes.len(), 1);
        let batch = &s.writes[0].1;
        assert_eq!(batch.database, "metrics");
        assert!(batch.get("namespace_endpoint").is_some());
    }

    #[tokio::test]
    async fn with_tags_applies_to_every_flush() {
        let connector = FakeConnector::default();
        let registry = Arc::new(Registry::new());
        registry.get_or_register_counter("endpoint.reqs").unwrap().inc(1);
        registry.get_or_register_counter("queue.depth").unwrap().inc(2);

        let aggregator = PointAggregator::new("metrics", "namespace", Tags::new());
        let mut reporter = Reporter::new(registry, connector.clone(), aggregator, Duration::from_secs(10))
            .unwrap()
            .with_tags(Tags::from([("host".to_string(), "a1".to_string())]));

        assert_eq!(reporter.flush().await.unwrap(), 2);

        let s = connector.0.lock();
        let batch = &s.writes[0].1;
        assert_eq!(batch.database, "metrics");
        for name in ["namespace_endpoint", "namespace_queue"] {
            let m = batch.get(name).unwrap();
            assert_eq!(m.tags.get("host").map(String::as_str), Some("a1"));
            assert_eq!(m.tags.len(), 1);
        }
    }

    #[tokio::test]
    async fn empty_registry_sends_nothing() {
        let connector = FakeConnector::default();
        let aggregator = PointAggregator::new("metrics", "", Tags::new());
        let mut reporter = Reporter::new(
            Arc::new(Registry::new()),
            connector.clone(),
            aggregator,
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(reporter.flush().await.unwrap(), 0);
        assert!(connector.0.lock().writes.is_empty());
    }

    #[tokio::test]
    async fn failed_write_drops_the_batch() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());
        connector.0.lock().fail_write = true;

        assert!(reporter.flush().await.is_err());

        connector.0.lock().fail_write = false;
        assert!(reporter.flush().await.is_ok());
        // Nothing is retried: exactly one write per flush.
        assert_eq!(connector.0.lock().writes.len(), 2);
    }

    #[test]
    fn setup_errors_abort_construction() {
        let connector = FakeConnector::default();
        connector.0.lock().fail_connect = true;
        let aggregator = PointAggregator::new("db", "", Tags::new());
        let err = Reporter::new(
            Arc::new(Registry::new()),
            connector,
            aggregator.clone(),
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SetupError::Connect(_)));

        let err = Reporter::new(
            Arc::new(Registry::new()),
            FakeConnector::default(),
            aggregator,
            Duration::ZERO,
        )
        .err()
        .unwrap();
        assert!(matches!(err, SetupError::ZeroInterval));
    }

    #[tokio::test]
    async fn healthy_ping_keeps_connection() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());

        let health = reporter.check_connection().await;
        assert!(matches!(health, Health::Alive(ref info) if info.version.as_deref() == Some("1.8.10")));
        assert_eq!(reporter.connection().id, 1);
        assert_eq!(connector.0.lock().connects, 1);
    }

    #[tokio::test]
    async fn failed_ping_replaces_connection_before_next_flush() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());
        connector.0.lock().fail_ping = true;

        assert_eq!(reporter.check_connection().await, Health::Reconnected);
        reporter.flush().await.unwrap();

        assert_eq!(connector.0.lock().writes[0].0, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_ping_gives_up_after_ping_timeout() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());
        connector.0.lock().hang_ping = true;

        let started = time::Instant::now();
        assert_eq!(reporter.check_connection().await, Health::Reconnected);

        let waited = started.elapsed();
        assert!(waited >= PING_TIMEOUT, "gave up after {waited:?}");
        assert!(waited < PING_TIMEOUT + Duration::from_millis(10), "gave up after {waited:?}");
        assert_eq!(reporter.connection().id, 2);
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_old_connection_and_retries() {
        let connector = FakeConnector::default();
        let mut reporter = reporter(connector.clone());
        {
            let mut s = connector.0.lock();
            s.fail_ping = true;
            s.fail_connect = true;
        }

        assert_eq!(reporter.check_connection().await, Health::ReconnectFailed);
        assert_eq!(reporter.check_connection().await, Health::ReconnectFailed);
        assert_eq!(reporter.connection().id, 1);

        connector.0.lock().fail_connect = false;
        assert_eq!(reporter.check_connection().await, Health::Reconnected);
        assert_eq!(reporter.connection().id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_every_failure() {
        let connector = FakeConnector::default();
        let reporter = reporter(connector.clone());
        {
            let mut s = connector.0.lock();
            s.fail_ping = true;
            s.fail_connect = true;
            s.fail_write = true;
        }

        let handle = tokio::spawn(reporter.run());
        time::sleep(Duration::from_secs(21)).await;

        {
            let s = connector.0.lock();
            // Flushes at 10s and 20s, probes every 5s.
            assert_eq!(s.writes.len(), 2);
            assert_eq!(s.pings, 4);
            assert_eq!(s.connects, 1);
        }
        assert!(!handle.is_finished());

        connector.0.lock().fail_connect = false;
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.0.lock().connects, 2);
        assert!(!handle.is_finished());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn first_ticks_fire_one_period_in() {
        let connector = FakeConnector::default();
        let reporter = reporter(connector.clone());

        let handle = tokio::spawn(reporter.run());
        time::sleep(Duration::from_secs(4)).await;
        {
            let s = connector.0.lock();
            assert_eq!(s.pings, 0);
            assert!(s.writes.is_empty());
        }

        time::sleep(Duration::from_secs(7)).await;
        {
            let s = connector.0.lock();
            assert_eq!(s.pings, 2);
            assert_eq!(s.writes.len(), 1);
        }
        handle.abort();
    }
}
