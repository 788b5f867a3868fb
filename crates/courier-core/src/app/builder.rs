//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! Config から全コンポーネントを組み立てる。seams (transport, clock,
//! decider, attempt sink) はテスト用に差し替え可能。
//! 起動時検証は Fail-fast: 不正な設定は `build()` で止める。

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::maintenance::{spawn_retention, spawn_sampler};
use crate::classify::{SourceFilter, parse_ranges};
use crate::config::{ConfigError, CourierConfig};
use crate::dlq::DeadLetterStore;
use crate::domain::{Decider, PolicyError, TenantId};
use crate::executor::{Deliverer, WorkerBoard, WorkerPool};
use crate::http::{self, AppState};
use crate::impls::{HttpTransport, InMemoryPolicyStore, InMemorySettings, TracingAttemptSink};
use crate::ingress::IngressService;
use crate::metrics::QueueMetrics;
use crate::ports::{
    AttemptSink, Clock, DeliveryTransport, IdGenerator, SystemClock, TransportError,
    UlidGenerator,
};
use crate::queue::{DeliveryQueue, InMemoryQueue};
use crate::retry::RetryOrchestrator;

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid policy for tenant {tenant}: {source}")]
    TenantPolicy {
        tenant: TenantId,
        #[source]
        source: PolicyError,
    },

    #[error("failed to create HTTP client: {0}")]
    Transport(#[from] TransportError),
}

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config).build().await?;
/// let running = app.start();
/// axum::serve(listener, app.router()).await?;
/// running.shutdown().await;
/// ```
pub struct AppBuilder {
    config: CourierConfig,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn DeliveryTransport>>,
    decider: Option<Arc<dyn Decider>>,
    sink: Option<Arc<dyn AttemptSink>>,
}

impl AppBuilder {
    pub fn new(config: CourierConfig) -> Self {
        Self {
            config,
            clock: None,
            transport: None,
            decider: None,
            sink: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn DeliveryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn with_attempt_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// # 検証
    /// - config 全体の `validate()`
    /// - allow-list の CIDR
    /// - tenant ごとの seed policy
    pub async fn build(self) -> Result<App, BuildError> {
        let config = self.config;
        config.validate()?;
        let ranges = parse_ranges(&config.ingress.allowed_ranges).map_err(ConfigError::Invalid)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport: Arc<dyn DeliveryTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };
        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(RetryOrchestrator::default()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingAttemptSink));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

        let settings = match &config.ingress.dev_fallback_url {
            Some(url) => InMemorySettings::new().with_dev_fallback(url.clone()),
            None => InMemorySettings::new(),
        };
        let policies = InMemoryPolicyStore::with_default(config.delivery.default_policy.clone());
        for route in &config.tenants {
            match route.event_type {
                Some(event_type) => {
                    settings
                        .register_for(
                            route.tenant.clone(),
                            route.environment,
                            event_type,
                            route.url.clone(),
                        )
                        .await
                }
                None => {
                    settings
                        .register(route.tenant.clone(), route.environment, route.url.clone())
                        .await
                }
            }
            if let Some(policy) = &route.policy {
                policies
                    .insert(route.tenant.clone(), route.environment, policy.clone())
                    .await
                    .map_err(|source| BuildError::TenantPolicy {
                        tenant: route.tenant.clone(),
                        source,
                    })?;
            }
        }
        let policies = Arc::new(policies);

        let queue: Arc<dyn DeliveryQueue> =
            Arc::new(InMemoryQueue::with_clock(&config.queue, Arc::clone(&clock)));
        let dlq = Arc::new(DeadLetterStore::new(
            config.dlq.clone(),
            Arc::clone(&queue),
            Arc::clone(&ids),
            Arc::clone(&clock),
        ));
        let board = Arc::new(WorkerBoard::new(config.workers.count));
        let metrics = Arc::new(QueueMetrics::new(
            config.metrics.clone(),
            Arc::clone(&queue),
            Arc::clone(&dlq),
            Arc::clone(&board),
            Arc::clone(&clock),
        ));
        let ingress = Arc::new(IngressService::new(
            SourceFilter::new(ranges),
            Arc::new(settings),
            policies.clone(),
            Arc::clone(&queue),
            Arc::clone(&ids),
            Arc::clone(&clock),
        ));

        let deliverer = Deliverer {
            queue: Arc::clone(&queue),
            policies: policies.clone(),
            transport,
            decider,
            dlq: Arc::clone(&dlq),
            sink,
            ids,
            clock: Arc::clone(&clock),
        };

        tracing::info!(
            workers = config.workers.count,
            max_depth = config.queue.max_depth,
            tenants = config.tenants.len(),
            "courier assembled"
        );

        Ok(App {
            state: AppState {
                ingress,
                metrics,
                dlq,
                policies,
                clock,
            },
            queue,
            deliverer,
            board,
            config,
        })
    }
}

/// App は組み立て済みのコンポーネント一式。
/// ワーカーは `start()` を呼ぶまで動かない。
pub struct App {
    config: CourierConfig,
    state: AppState,
    queue: Arc<dyn DeliveryQueue>,
    deliverer: Deliverer,
    board: Arc<WorkerBoard>,
}

impl App {
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn queue(&self) -> Arc<dyn DeliveryQueue> {
        Arc::clone(&self.queue)
    }

    pub fn router(&self) -> Router {
        http::router(self.state.clone())
    }

    /// worker pool と housekeeping ループを起動する。
    pub fn start(&self) -> Running {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = WorkerPool::spawn(
            self.config.workers.count,
            self.deliverer.clone(),
            Arc::clone(&self.board),
        );
        let mut loops: Vec<JoinHandle<()>> =
            spawn_retention(Arc::clone(&self.state.dlq), shutdown_rx.clone())
                .into_iter()
                .collect();
        loops.extend(spawn_sampler(Arc::clone(&self.state.metrics), shutdown_rx));
        Running {
            pool,
            shutdown_tx,
            loops,
            queue: Arc::clone(&self.queue),
        }
    }
}

/// 起動中のバックグラウンドタスクへのハンドル
pub struct Running {
    pool: WorkerPool,
    shutdown_tx: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
    queue: Arc<dyn DeliveryQueue>,
}

impl Running {
    /// 停止順序: dequeue を止める → 実行中の attempt を待つ → キューを閉じる → ループを止める。
    /// キューに残っている job は破棄される。
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.pool.request_shutdown();
        self.pool.shutdown_and_join().await;
        self.queue.shutdown().await;
        for handle in self.loops {
            let _ = handle.await;
        }
        tracing::info!("courier stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantRoute;
    use crate::classify::sample_payment_result;
    use crate::domain::{Environment, RetryPolicy};
    use crate::ingress::{IngressOutcome, IngressRequest};
    use crate::ports::{DeliveryRequest, DeliveryResponse};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// 500 を返す前に少し待つ transport
    struct SlowFailure {
        started: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl DeliveryTransport for SlowFailure {
        async fn post(&self, _: DeliveryRequest) -> Result<DeliveryResponse, TransportError> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(DeliveryResponse {
                status: 500,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        let app = AppBuilder::new(CourierConfig::default()).build().await;
        assert!(app.is_ok());
    }

    #[tokio::test]
    async fn test_build_rejects_bad_ranges() {
        let mut config = CourierConfig::default();
        config.ingress.allowed_ranges = vec!["not-a-cidr".into()];
        let app = AppBuilder::new(config).build().await;
        assert!(matches!(app, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }

    #[tokio::test]
    async fn test_build_seeds_tenant_policies() {
        let mut config = CourierConfig::default();
        config.tenants.push(TenantRoute {
            tenant: TenantId::new("acme"),
            environment: Environment::Staging,
            event_type: None,
            url: "http://acme.test".into(),
            policy: Some(RetryPolicy {
                max_retries: 7,
                ..RetryPolicy::default()
            }),
        });

        let app = AppBuilder::new(config).build().await.unwrap();
        let policy = app
            .state()
            .policies
            .get_or_create(&TenantId::new("acme"), Environment::Staging)
            .await
            .unwrap();
        assert_eq!(policy.max_retries, 7);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let app = AppBuilder::new(CourierConfig::default()).build().await.unwrap();
        let running = app.start();
        running.shutdown().await;
        assert!(app.queue().counts().await.depth() == 0);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_in_flight_retry_out_of_dlq() {
        let mut config = CourierConfig::default();
        config.workers.count = 1;
        config.metrics.sample_interval_secs = 0;
        config.tenants.push(TenantRoute {
            tenant: TenantId::new("acme"),
            environment: Environment::Dev,
            event_type: None,
            url: "http://acme.test/hook".into(),
            policy: None,
        });
        let started = Arc::new(Notify::new());
        let app = AppBuilder::new(config)
            .with_transport(Arc::new(SlowFailure {
                started: Arc::clone(&started),
            }))
            .build()
            .await
            .unwrap();
        let running = app.start();

        let outcome = app
            .state()
            .ingress
            .accept(IngressRequest {
                tenant_id: TenantId::new("acme"),
                environment: Environment::Dev,
                source_addr: None,
                payload: sample_payment_result(),
                hint: None,
            })
            .await;
        assert!(matches!(outcome, IngressOutcome::Queued { .. }));

        started.notified().await;
        running.shutdown().await;

        assert_eq!(app.state().dlq.len().await, 0);
    }
}
