#![allow(dead_code)]

pub mod test_server {
    use jsonroute::server::{AppService, HttpServer, ServerHandle};
    use std::net::SocketAddr;
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Start `service` on a free local port and wait until it accepts.
    pub fn start_service(service: AppService) -> (ServerHandle, SocketAddr) {
        setup_may_runtime();
        let handle = HttpServer(service).start("127.0.0.1:0").unwrap();
        handle.wait_ready().unwrap();
        let addr = handle.local_addr();
        (handle, addr)
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    /// Write `req` and read until one full response (headers plus
    /// `Content-Length` bytes) arrived, or the socket stays idle for 2s.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = Vec::new();
        while !is_complete(&buf) {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn is_complete(buf: &[u8]) -> bool {
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]);
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= head_end + 4 + content_length
    }

    pub fn get(addr: &SocketAddr, target: &str) -> String {
        send_request(addr, &format!("GET {target} HTTP/1.1\r\nHost: x\r\n\r\n"))
    }

    pub fn post(addr: &SocketAddr, target: &str, content_type: &str, body: &str) -> String {
        send_request(
            addr,
            &format!(
                "POST {target} HTTP/1.1\r\nHost: x\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            ),
        )
    }

    /// Parsed status line, headers (lowercase names) and body.
    pub struct Parts {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Parts {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn content_type(&self) -> &str {
            self.header("content-type").unwrap_or("")
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body)
                .unwrap_or_else(|e| panic!("invalid JSON body {:?}: {e}", self.body))
        }
    }

    pub fn parse_parts(resp: &str) -> Parts {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_ascii_lowercase(), val.trim().to_string()));
            }
        }
        Parts {
            status,
            headers,
            body: body.to_string(),
        }
    }
}
