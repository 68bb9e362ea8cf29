//! Registry facade: named command lookup, execution, and hot reload.

use crate::command::{HttpCommand, MetricsHook};
use crate::descriptor::{Api, Config};
use crate::error::{ErrorCode, GoxError, GoxHttpError};
use crate::request::GoxRequest;
use crate::resilient::{BreakerOverrides, ResilientCommand};
use crate::response::GoxResponse;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Command variants the registry dispatches to.
///
/// Reload logic switches on the variant: a plain command is replaced
/// outright, a resilient command only swaps its wrapped plain command so the
/// breaker keeps its identity and statistics.
#[derive(Clone)]
enum Command {
    Plain(Arc<HttpCommand>),
    Resilient(Arc<ResilientCommand>),
}

impl Command {
    async fn execute(&self, request: &GoxRequest) -> Result<GoxResponse, GoxHttpError> {
        match self {
            Command::Plain(command) => command.execute(request).await,
            Command::Resilient(command) => command.execute(request).await,
        }
    }
}

#[derive(Clone)]
struct Entry {
    command: Command,
    timeout: Duration,
}

struct ContextInner {
    config: RwLock<Config>,
    registry: RwLock<HashMap<String, Entry>>,
    overrides: BreakerOverrides,
    metrics: Option<MetricsHook>,
}

/// The public entry point: execute named APIs and hot-swap their definitions.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone)]
pub struct GoxHttpContext {
    inner: Arc<ContextInner>,
}

impl GoxHttpContext {
    /// Build a context from a descriptor set with default breaker settings.
    pub fn new(config: Config) -> Result<Self, GoxError> {
        Self::builder(config).build()
    }

    /// Start building a context with overrides or hooks.
    pub fn builder(config: Config) -> GoxHttpContextBuilder {
        GoxHttpContextBuilder {
            config,
            overrides: BreakerOverrides::default(),
            metrics: None,
        }
    }

    /// Execute the named API with `request`, bounded by its composed timeout.
    pub async fn execute(
        &self,
        api: &str,
        request: &GoxRequest,
    ) -> Result<GoxResponse, GoxHttpError> {
        let entry = self.inner.registry.read().get(api).cloned();
        let Some(entry) = entry else {
            return Err(GoxHttpError::new(
                ErrorCode::CommandNotFound,
                400,
                format!("command to execute not found: name={api}"),
            ));
        };

        debug!(api, timeout_ms = entry.timeout.as_millis() as u64, "executing api");
        match tokio::time::timeout(entry.timeout, entry.command.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(GoxHttpError::new(
                ErrorCode::RequestTimeoutOnClient,
                408,
                format!("request timeout on client: api={api}"),
            )),
        }
    }

    /// Asynchronous variant of [`execute`](Self::execute); the classified
    /// result is delivered once on the returned channel.
    pub fn execute_async(
        &self,
        api: &str,
        request: GoxRequest,
    ) -> oneshot::Receiver<Result<GoxResponse, GoxHttpError>> {
        let (tx, rx) = oneshot::channel();
        let context = self.clone();
        let api = api.to_string();
        tokio::spawn(async move {
            let result = context.execute(&api, &request).await;
            let _ = tx.send(result);
        });
        rx
    }

    /// Hot-swap one API's command from an updated descriptor.
    ///
    /// The swap is all-or-nothing per name: a failure to resolve the server
    /// or build the command leaves the previous entry untouched. In-flight
    /// calls keep the command snapshot they started with.
    pub fn reload_api(&self, api: Api) -> Result<(), GoxError> {
        if api.name.is_empty() {
            return Err(GoxError::InvalidDescriptor(
                "api name must not be empty".to_string(),
            ));
        }
        let mut api = api;
        api.apply_defaults();
        let name = api.name.clone();

        let mut config = self.inner.config.write();
        let server = config.find_server_by_name(&api.server)?.clone();

        let mut registry = self.inner.registry.write();
        let timeout = Duration::from_millis(api.timeout_with_retry_included());

        // All fallible work happens before the config or registry is touched,
        // so a failed reload leaves both exactly as they were
        match registry.get(&name).map(|entry| entry.command.clone()) {
            Some(Command::Resilient(resilient)) => {
                // Swap only the wrapped command so breaker stats survive
                let inner = HttpCommand::new(&server, &api, self.inner.metrics.clone())?;
                resilient.update_command(inner);
                registry.insert(
                    name.clone(),
                    Entry {
                        command: Command::Resilient(resilient),
                        timeout,
                    },
                );
            }
            Some(Command::Plain(_)) => {
                let inner = HttpCommand::new(&server, &api, self.inner.metrics.clone())?;
                registry.insert(
                    name.clone(),
                    Entry {
                        command: Command::Plain(Arc::new(inner)),
                        timeout,
                    },
                );
            }
            None => {
                let command = build_command(&server, &api, &self.inner.overrides, &self.inner.metrics)?;
                registry.insert(name.clone(), Entry { command, timeout });
            }
        }
        config.apis.insert(name.clone(), api);

        info!(api = %name, "api reloaded");
        Ok(())
    }
}

/// Builder for [`GoxHttpContext`].
pub struct GoxHttpContextBuilder {
    config: Config,
    overrides: BreakerOverrides,
    metrics: Option<MetricsHook>,
}

impl GoxHttpContextBuilder {
    /// Set per-API breaker overrides.
    pub fn overrides(mut self, overrides: BreakerOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set a metrics callback invoked once per call.
    pub fn metrics_hook(mut self, hook: MetricsHook) -> Self {
        self.metrics = Some(hook);
        self
    }

    /// Build the context, constructing a command per configured API.
    pub fn build(self) -> Result<GoxHttpContext, GoxError> {
        let mut config = self.config;
        config.setup_defaults();

        let mut registry = HashMap::new();
        for api in config.apis.values() {
            let server = config.find_server_by_name(&api.server)?;
            let command = build_command(server, api, &self.overrides, &self.metrics)?;
            registry.insert(
                api.name.clone(),
                Entry {
                    command,
                    timeout: Duration::from_millis(api.timeout_with_retry_included()),
                },
            );
        }
        info!(apis = registry.len(), "gox http context ready");

        Ok(GoxHttpContext {
            inner: Arc::new(ContextInner {
                config: RwLock::new(config),
                registry: RwLock::new(registry),
                overrides: self.overrides,
                metrics: self.metrics,
            }),
        })
    }
}

fn build_command(
    server: &crate::descriptor::Server,
    api: &Api,
    overrides: &BreakerOverrides,
    metrics: &Option<MetricsHook>,
) -> Result<Command, GoxError> {
    let inner = HttpCommand::new(server, api, metrics.clone())?;
    if api.disable_circuit {
        Ok(Command::Plain(Arc::new(inner)))
    } else {
        Ok(Command::Resilient(Arc::new(ResilientCommand::new(
            inner, api, overrides,
        ))))
    }
}
