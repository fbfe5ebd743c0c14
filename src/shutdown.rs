//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections, then waits
//! for requests still being handled, up to a timeout.
//!
//! ```rust,no_run
//! use jsonroute::server::{AppService, HttpServer};
//! use jsonroute::shutdown::wait_on_shutdown;
//! use std::time::Duration;
//!
//! let service = AppService::new();
//! let in_flight = service.in_flight();
//! let handle = HttpServer(service).start("0.0.0.0:8080").unwrap();
//! wait_on_shutdown(handle, &in_flight, Duration::from_secs(30)).unwrap();
//! ```

use crate::server::ServerHandle;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Counts requests currently being handled.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one request as running until the guard is dropped.
    #[must_use = "the request counts as finished once the guard is dropped"]
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decrements the [`InFlight`] counter on drop.
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait until no request is in flight or `timeout` passes.
///
/// Returns `true` if all requests finished in time.
pub fn drain(in_flight: &InFlight, timeout: Duration) -> bool {
    let start = Instant::now();
    let mut last_progress = start;
    loop {
        let pending = in_flight.count();
        if pending == 0 {
            info!("No pending requests, shutting down");
            return true;
        }
        if start.elapsed() >= timeout {
            warn!(pending, timeout_secs = timeout.as_secs_f64(), "Timeout reached, abandoning requests");
            return false;
        }
        if last_progress.elapsed() >= PROGRESS_INTERVAL {
            info!(pending, "Requests still running, waiting");
            last_progress = Instant::now();
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Block until SIGINT or SIGTERM, stop the server and drain pending
/// requests for at most `timeout`.
///
/// # Errors
///
/// Returns an error if the signal handlers can't be installed.
#[cfg(unix)]
pub fn wait_on_shutdown(handle: ServerHandle, in_flight: &InFlight, timeout: Duration) -> io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown requested");
    }
    handle.stop();
    info!(pending = in_flight.count(), "Stopped accepting connections");
    drain(in_flight, timeout);
    Ok(())
}

/// Without Unix signals the server runs until its coroutine ends.
///
/// # Errors
///
/// Returns an error if the server coroutine panicked.
#[cfg(not(unix))]
pub fn wait_on_shutdown(handle: ServerHandle, in_flight: &InFlight, timeout: Duration) -> io::Result<()> {
    handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "server coroutine panicked"))?;
    drain(in_flight, timeout);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_track_requests() {
        let in_flight = InFlight::new();
        let a = in_flight.enter();
        let b = in_flight.enter();
        assert_eq!(in_flight.count(), 2);
        drop(a);
        assert_eq!(in_flight.count(), 1);
        drop(b);
        assert_eq!(in_flight.count(), 0);
    }

    #[test]
    fn test_drain_returns_when_idle() {
        assert!(drain(&InFlight::new(), Duration::from_secs(5)));
    }

    #[test]
    fn test_drain_waits_for_pending_request() {
        let in_flight = InFlight::new();
        let guard = in_flight.enter();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            drop(guard);
        });
        assert!(drain(&in_flight, Duration::from_secs(5)));
        worker.join().unwrap();
    }

    #[test]
    fn test_drain_times_out() {
        let in_flight = InFlight::new();
        let _guard = in_flight.enter();
        let start = Instant::now();
        assert!(!drain(&in_flight, Duration::from_millis(120)));
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
