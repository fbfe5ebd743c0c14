use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Maximum request headers parsed per request.
pub const MAX_HEADERS: usize = 32;

const READY_ATTEMPTS: u32 = 100;
const READY_POLL: Duration = Duration::from_millis(5);

/// Runs an [`HttpService`] on `may_minihttp`.
pub struct HttpServer<T>(pub T);

/// Handle to a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the listener accepts connections.
    ///
    /// # Errors
    ///
    /// `TimedOut` if it isn't accepting after roughly half a second.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..READY_ATTEMPTS {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(READY_POLL);
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections. Requests already being served keep
    /// running on their own coroutines.
    pub fn stop(self) {
        // SAFETY: cancel() is unsafe in may because the target coroutine is
        // unwound at its next yield point. The accept loop holds no locks or
        // borrowed state, and we own the only handle to it.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "Server stopped");
    }

    /// Block until the server coroutine exits.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the server coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving.
    ///
    /// Port `0` picks a free port; [`ServerHandle::local_addr`] reports the
    /// one actually used.
    ///
    /// # Errors
    ///
    /// Fails if the address doesn't resolve or can't be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let addr = resolve_port(addr)?;
        let handle = HttpServerWithHeaders::<_, MAX_HEADERS>(self.0).start(addr)?;
        info!(addr = %addr, "Server listening");
        Ok(ServerHandle { addr, handle })
    }
}

/// `may_minihttp` binds internally and doesn't expose the bound address, so
/// an ephemeral port is chosen up front.
fn resolve_port(addr: SocketAddr) -> io::Result<SocketAddr> {
    if addr.port() != 0 {
        return Ok(addr);
    }
    let listener = TcpListener::bind(addr)?;
    listener.local_addr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_port_keeps_explicit_port() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(resolve_port(addr).unwrap(), addr);
    }

    #[test]
    fn test_resolve_port_picks_free_port() {
        let resolved = resolve_port("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(resolved.port(), 0);
        assert_eq!(resolved.ip().to_string(), "127.0.0.1");
    }
}
