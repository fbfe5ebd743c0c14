use anyhow::Context;
use clap::Parser;
use jsonroute::config::AppConfig;
use jsonroute::logging::{init_logging, LogFormat};
use jsonroute::params::ParamSpec;
use jsonroute::runtime_config::RuntimeConfig;
use jsonroute::server::{AppService, HttpServer};
use jsonroute::shutdown::wait_on_shutdown;
use jsonroute::{run_limited, HandlerError, JsonEndpoint};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Demo JSON service
#[derive(Parser)]
#[command(name = "jsonroute")]
#[command(about = "Serve the jsonroute demo endpoints", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "JSONROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    addr: Option<String>,

    /// Serve files from this directory when no route matches
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// `json` or `pretty`
    #[arg(long)]
    log_format: Option<String>,

    /// Seconds to wait for pending requests on shutdown
    #[arg(long)]
    shutdown_timeout: Option<u64>,
}

fn build_service(config: &AppConfig) -> anyhow::Result<AppService> {
    let mut service = AppService::new();

    service.add_route(
        "/echo$",
        JsonEndpoint::new("echo")
            .param("id", ParamSpec::string().required())?
            .get(|req| Ok(json!({ "id": req.args.get_str("id") }))),
    )?;

    service.add_route(
        r"/hotels/(?P<hotel_id>\d+)/info$",
        JsonEndpoint::new("hotel_info")
            .param("lang", ParamSpec::lang().default("en"))?
            .param("rooms", ParamSpec::bounded_int(Some(1), Some(10)).default(1))?
            .get(|req| {
                Ok(json!({
                    "hotel_id": req.path_args.get("hotel_id"),
                    "lang": req.args.get_str("lang"),
                    "rooms": req.args.get_int("rooms"),
                }))
            }),
    )?;

    service.add_route(
        "/squares$",
        JsonEndpoint::new("squares")
            .param("n", ParamSpec::bounded_int(Some(0), Some(100)).required())?
            .get(|req| {
                let n = req.args.get_int("n").unwrap_or_default();
                let jobs = (0..n).map(|i| move || Ok::<_, HandlerError>(i * i));
                let squares = run_limited(jobs, 4).map_err(|e| e.error)?;
                Ok(json!({ "squares": squares }))
            }),
    )?;

    if let Some(dir) = &config.static_dir {
        service.set_static_dir(dir);
    }
    Ok(service)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    if let Some(dir) = cli.static_dir {
        config.static_dir = Some(dir);
    }
    if let Some(secs) = cli.shutdown_timeout {
        config.shutdown_timeout_secs = secs;
    }
    config.log.apply_env();
    if let Some(format) = cli.log_format.as_deref() {
        config.log.format = LogFormat::parse(format);
    }
    init_logging(&config.log)?;

    let runtime = RuntimeConfig::from_env();
    may::config().set_stack_size(runtime.stack_size);
    info!(stack_size = runtime.stack_size, "Coroutine stack size");

    let service = build_service(&config)?;
    for (pattern, endpoint) in service.routes() {
        info!(pattern = %pattern, endpoint = %endpoint, "Route");
    }
    let in_flight = service.in_flight();

    let handle = HttpServer(service)
        .start(config.addr.as_str())
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    handle.wait_ready()?;
    info!(addr = %handle.local_addr(), "Ready");

    wait_on_shutdown(handle, &in_flight, config.shutdown_timeout())?;
    info!("Shutdown complete");
    Ok(())
}
