use crate::endpoint::{EndpointCall, HandlerError, HandlerResult, JsonEndpoint};
use crate::runtime_config::RuntimeConfig;
use may::coroutine;
use may::sync::mpsc;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A request on its way to an endpoint coroutine.
pub struct DispatchRequest {
    pub call: EndpointCall,
    /// Channel for sending the handler result back to the dispatcher
    pub reply_tx: mpsc::Sender<HandlerResult>,
}

/// Channel into one endpoint coroutine.
pub type EndpointSender = mpsc::Sender<DispatchRequest>;

/// Why a request never produced a handler result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("no endpoint registered as {0:?}")]
    NotRegistered(String),
    /// The endpoint coroutine is gone or dropped the reply.
    #[error("endpoint {0:?} is not responding")]
    Unavailable(String),
}

/// Routes requests to endpoint coroutines by name.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: HashMap<String, EndpointSender>,
    allow_headers: HashMap<String, &'static str>,
    stack_size: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Empty dispatcher using the stack size from [`RuntimeConfig::from_env`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_stack_size(RuntimeConfig::from_env().stack_size)
    }

    #[must_use]
    pub fn with_stack_size(stack_size: usize) -> Self {
        Dispatcher {
            handlers: HashMap::new(),
            allow_headers: HashMap::new(),
            stack_size,
        }
    }

    /// Spawn a coroutine accepting requests for `endpoint` and register it
    /// under its name. Each request then runs on its own coroutine.
    ///
    /// A previously registered endpoint with the same name is replaced; its
    /// channel closes and its coroutine exits.
    ///
    /// Handler panics are caught inside the coroutine and reported back as
    /// server errors, so one failing handler never takes the endpoint down.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if the coroutine could not be started. The
    /// endpoint is not registered in that case.
    pub fn register(&mut self, endpoint: JsonEndpoint) -> io::Result<()> {
        let (tx, rx) = mpsc::channel::<DispatchRequest>();
        let name = endpoint.name().to_string();
        let allow = endpoint.allowed_methods();
        let endpoint = Arc::new(endpoint);
        let stack_size = self.stack_size;
        let coroutine_name: Arc<str> = Arc::from(name.as_str());

        // SAFETY: may::coroutine::Builder::spawn() is unsafe because coroutines
        // must not block the worker thread with non-coroutine primitives or keep
        // thread-local references across yields. The closure owns all of its
        // state (Send + 'static) and only blocks on may channels.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("endpoint:{name}"))
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(endpoint = %coroutine_name, stack_size, "Endpoint coroutine start");
                    for req in rx.iter() {
                        spawn_request(&coroutine_name, &endpoint, stack_size, req);
                    }
                    debug!(endpoint = %coroutine_name, "Endpoint coroutine exit");
                })
        };

        if let Err(e) = spawned {
            error!(
                endpoint = %name,
                error = %e,
                stack_size,
                "Failed to spawn endpoint coroutine"
            );
            return Err(e);
        }

        if self.handlers.insert(name.clone(), tx).is_some() {
            warn!(endpoint = %name, "Replaced existing endpoint - old coroutine will exit");
        }
        // Leaked once per registration; may_minihttp only takes 'static headers.
        let allow_header: &'static str = Box::leak(format!("Allow: {allow}").into_boxed_str());
        self.allow_headers.insert(name.clone(), allow_header);

        info!(
            endpoint = %name,
            methods = %allow,
            total_endpoints = self.handlers.len(),
            "Endpoint registered"
        );
        Ok(())
    }

    /// Names of all registered endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// The `Allow:` header line for `name`, listing its methods.
    #[must_use]
    pub fn allow_header(&self, name: &str) -> Option<&'static str> {
        self.allow_headers.get(name).copied()
    }

    /// Send `call` to the endpoint registered as `name` and wait for its
    /// result.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotRegistered`] for unknown names and
    /// [`DispatchError::Unavailable`] if the endpoint coroutine has exited.
    pub fn dispatch(&self, name: &str, call: EndpointCall) -> Result<HandlerResult, DispatchError> {
        let Some(tx) = self.handlers.get(name) else {
            error!(
                endpoint = %name,
                available = ?self.endpoints(),
                "Endpoint not found"
            );
            return Err(DispatchError::NotRegistered(name.to_string()));
        };

        let request_id = call.request_id;
        let (reply_tx, reply_rx) = mpsc::channel();
        let start = Instant::now();

        if tx.send(DispatchRequest { call, reply_tx }).is_err() {
            error!(
                request_id = %request_id,
                endpoint = %name,
                "Failed to send request to endpoint"
            );
            return Err(DispatchError::Unavailable(name.to_string()));
        }

        match reply_rx.recv() {
            Ok(result) => {
                debug!(
                    request_id = %request_id,
                    endpoint = %name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Endpoint result received"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    endpoint = %name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Endpoint channel closed - endpoint may have crashed"
                );
                Err(DispatchError::Unavailable(name.to_string()))
            }
        }
    }
}

/// Run one request on its own coroutine so a blocking handler only holds up
/// its own caller.
fn spawn_request(
    name: &Arc<str>,
    endpoint: &Arc<JsonEndpoint>,
    stack_size: usize,
    req: DispatchRequest,
) {
    let request_id = req.call.request_id;
    let name_for_request = Arc::clone(name);
    let endpoint = Arc::clone(endpoint);

    // SAFETY: same contract as the endpoint coroutine; the request coroutine
    // owns its clones and blocks only on may primitives.
    let spawned = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || serve(&name_for_request, &endpoint, req))
    };
    if let Err(e) = spawned {
        // The reply channel is dropped with the request; the caller sees the
        // endpoint as unavailable.
        error!(
            request_id = %request_id,
            endpoint = %name,
            error = %e,
            "Failed to spawn request coroutine"
        );
    }
}

fn serve(name: &str, endpoint: &JsonEndpoint, req: DispatchRequest) {
    let DispatchRequest { call, reply_tx } = req;
    let request_id = call.request_id;
    let start = Instant::now();

    debug!(
        request_id = %request_id,
        endpoint = %name,
        method = %call.method,
        path = %call.path,
        "Endpoint execution start"
    );

    let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| endpoint.call(call))) {
        Ok(result) => result,
        Err(panic) => {
            let panic_message = panic_message(panic.as_ref());
            error!(
                request_id = %request_id,
                endpoint = %name,
                panic_message = %panic_message,
                "Handler panicked"
            );
            Err(HandlerError::Server(anyhow::anyhow!(
                "handler panicked: {panic_message}"
            )))
        }
    };

    debug!(
        request_id = %request_id,
        endpoint = %name,
        execution_time_ms = start.elapsed().as_millis() as u64,
        "Endpoint execution complete"
    );

    if reply_tx.send(result).is_err() {
        warn!(request_id = %request_id, endpoint = %name, "Caller went away before the result was ready");
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
