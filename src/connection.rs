//! Connection handle: one backend plus the hooks around it

use crate::backend::Backend;
use crate::cache::ResultCache;
use crate::container::Container;
use crate::database::adapter::DatabaseAdapter;
use crate::database::{BackendKind, ConnectionConfig, MySqlAdapter, PostgresAdapter, SqliteAdapter};
use crate::document::{DocumentBackend, MongoDriver};
use crate::error::Result;
use crate::interceptor::{Operation, QueryEvent, QueryInterceptor, QueryOutcome};
use crate::query::QuerySpec;
use crate::sql::SqlBackend;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Shared handle to a backend
///
/// Cloning is cheap; clones share the backend, its pool, the interceptors and
/// the cache.
#[derive(Clone)]
pub struct Connection {
    backend: Arc<dyn Backend>,
    interceptors: Vec<Arc<dyn QueryInterceptor>>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl Connection {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            interceptors: Vec::new(),
            cache: None,
        }
    }

    /// Open the pool or client described by `config`
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let name = config.backend.as_str();

        let backend: Arc<dyn Backend> = match config.backend {
            BackendKind::MongoDb => {
                let driver = MongoDriver::connect(config).await?;
                Arc::new(
                    DocumentBackend::new(Arc::new(driver))
                        .with_namespace(config.namespace.clone())
                        .with_primary_key(config.key_field()),
                )
            }
            kind => {
                let adapter: Arc<dyn DatabaseAdapter> = match kind {
                    BackendKind::Sqlite => Arc::new(SqliteAdapter::connect(name, config).await?),
                    BackendKind::Postgres => {
                        Arc::new(PostgresAdapter::connect(name, config).await?)
                    }
                    _ => Arc::new(MySqlAdapter::connect(name, config).await?),
                };
                Arc::new(
                    SqlBackend::new(adapter)
                        .with_namespace(config.namespace.clone())
                        .with_primary_key(config.key_field()),
                )
            }
        };

        log::info!(
            "Connected {} backend{}",
            name,
            if config.namespace.is_empty() {
                String::new()
            } else {
                format!(" with namespace '{}'", config.namespace)
            }
        );
        Ok(Self::new(backend))
    }

    /// Add an interceptor; they run in the order they were added
    pub fn with_interceptor(mut self, interceptor: Arc<dyn QueryInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Store for the `*_and_cache` terminals
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Handle on one table or collection
    pub fn container(&self, name: impl Into<String>) -> Container {
        Container::new(self.clone(), name)
    }

    /// Tables or collections under this connection's namespace
    pub async fn container_names(&self) -> Result<Vec<String>> {
        self.backend.container_names().await
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn namespace(&self) -> &str {
        self.backend.namespace()
    }

    pub fn primary_key(&self) -> &str {
        self.backend.primary_key()
    }

    pub fn cache(&self) -> Option<&Arc<dyn ResultCache>> {
        self.cache.as_ref()
    }

    pub async fn ping(&self) -> Result<bool> {
        self.backend.ping().await
    }

    /// Run `call` between the interceptors' `before` and `after` hooks
    pub(crate) async fn intercept<T, F>(
        &self,
        container: &str,
        operation: Operation,
        spec: Option<&QuerySpec>,
        call: F,
        outcome: fn(&T) -> QueryOutcome<'static>,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.interceptors.is_empty() {
            return call.await;
        }

        let event = QueryEvent {
            backend: self.backend.name(),
            container,
            operation,
            spec,
        };
        for interceptor in &self.interceptors {
            interceptor.before(&event);
        }

        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        let summary = match &result {
            Ok(value) => outcome(value),
            Err(e) => QueryOutcome::Failed(e),
        };
        for interceptor in &self.interceptors {
            interceptor.after(&event, &summary, elapsed);
        }
        result
    }

    /// Report a result served from the cache
    pub(crate) fn notify_cached(&self, container: &str, operation: Operation, spec: &QuerySpec) {
        let event = QueryEvent {
            backend: self.backend.name(),
            container,
            operation,
            spec: Some(spec),
        };
        for interceptor in &self.interceptors {
            interceptor.before(&event);
            interceptor.after(&event, &QueryOutcome::Cached, Default::default());
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.name())
            .field("namespace", &self.backend.namespace())
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("cache", &self.cache.is_some())
            .finish()
    }
}
