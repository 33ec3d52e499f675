//! DNS resolution.
//!
//! [`DnsResolver`] is the narrow capability the lookup checks need.
//! [`UdpResolver`] implements it by asking one configured server directly,
//! bypassing the host's resolver configuration and caches.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use converge_core::{ConvergeError, LookupKind, Result};

use crate::wire::{self, RecordType, WireError};

/// Resolves names to host addresses or TXT strings.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Returns the IPv4 and IPv6 addresses of `name`.
    ///
    /// # Errors
    /// Returns a resolve error if the lookup failed or found no address.
    async fn lookup_host(&self, name: &str) -> Result<Vec<String>>;

    /// Returns the TXT strings of `name`.
    ///
    /// # Errors
    /// Returns a resolve error if the lookup failed or found no record.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>>;

    /// Dispatches to the lookup of the given kind.
    async fn lookup(&self, kind: LookupKind, name: &str) -> Result<Vec<String>> {
        match kind {
            LookupKind::Host => self.lookup_host(name).await,
            LookupKind::Txt => self.lookup_txt(name).await,
        }
    }
}

/// Resolver querying a single DNS server over UDP.
#[derive(Debug)]
pub struct UdpResolver {
    server: String,
    timeout: Duration,
    next_id: AtomicU16,
}

impl UdpResolver {
    /// Per-query receive timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Creates a resolver for the server at `host:port`.
    ///
    /// A bare host or address gets port 53.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        let server = with_default_port(server.into());
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        Self {
            server,
            timeout: Self::DEFAULT_TIMEOUT,
            next_id: AtomicU16::new((seed ^ std::process::id()) as u16),
        }
    }

    /// Sets the per-query receive timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the server endpoint.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    async fn server_addr(&self, name: &str) -> Result<SocketAddr> {
        tokio::net::lookup_host(self.server.as_str())
            .await
            .map_err(|e| ConvergeError::resolve(name, format!("bad server {}: {e}", self.server)))?
            .next()
            .ok_or_else(|| {
                ConvergeError::resolve(name, format!("server {} has no address", self.server))
            })
    }

    /// Sends one query and waits for the matching response.
    ///
    /// A response truncated over UDP is fetched again over TCP.
    async fn query(&self, name: &str, rtype: RecordType) -> Result<Vec<String>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = wire::encode_query(id, name, rtype).map_err(|e| wire_error(name, &e))?;
        let server = self.server_addr(name).await?;

        let response = self.exchange_udp(name, server, id, &request).await?;
        let decoded = match wire::decode_answers(id, &response, rtype) {
            Err(WireError::Truncated) => {
                tracing::debug!(dns_name = name, rtype = ?rtype, "udp answer truncated, retrying over tcp");
                let response = self.exchange_tcp(name, server, &request).await?;
                wire::decode_answers(id, &response, rtype)
            }
            other => other,
        };
        match decoded {
            Ok(answers) => {
                tracing::trace!(dns_name = name, rtype = ?rtype, answers = ?answers, "dns answer");
                Ok(answers)
            }
            Err(WireError::NxDomain) => Ok(Vec::new()),
            Err(e) => Err(wire_error(name, &e)),
        }
    }

    async fn exchange_udp(
        &self,
        name: &str,
        server: SocketAddr,
        id: u16,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        let bind: SocketAddr = if server.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(server).await?;
        socket.send(request).await?;

        let mut buf = vec![0u8; usize::from(wire::EDNS_PAYLOAD_SIZE)];
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let len = tokio::time::timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| self.no_response(name))??;
            // skip stale answers to earlier queries on a reused port
            if buf[..len].starts_with(&id.to_be_bytes()) {
                buf.truncate(len);
                return Ok(buf);
            }
        }
    }

    /// Exchanges one message over TCP, each direction framed by a two-byte
    /// big-endian length.
    async fn exchange_tcp(&self, name: &str, server: SocketAddr, request: &[u8]) -> Result<Vec<u8>> {
        let exchange = async {
            let mut stream = TcpStream::connect(server).await?;
            let mut framed = Vec::with_capacity(request.len() + 2);
            framed.extend_from_slice(&(request.len() as u16).to_be_bytes());
            framed.extend_from_slice(request);
            stream.write_all(&framed).await?;

            let mut len = [0u8; 2];
            stream.read_exact(&mut len).await?;
            let mut response = vec![0u8; usize::from(u16::from_be_bytes(len))];
            stream.read_exact(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| self.no_response(name))?
            .map_err(|e| ConvergeError::resolve(name, format!("tcp exchange with {}: {e}", self.server)))
    }

    fn no_response(&self, name: &str) -> ConvergeError {
        ConvergeError::resolve(
            name,
            format!("no response from {} within {:?}", self.server, self.timeout),
        )
    }
}

fn wire_error(name: &str, e: &WireError) -> ConvergeError {
    ConvergeError::resolve(name, e.to_string())
}

fn with_default_port(server: String) -> String {
    if server.parse::<SocketAddr>().is_ok() {
        return server;
    }
    if server.parse::<std::net::IpAddr>().is_ok() {
        return if server.contains(':') {
            format!("[{server}]:53")
        } else {
            format!("{server}:53")
        };
    }
    if server.contains(':') {
        server
    } else {
        format!("{server}:53")
    }
}

#[async_trait]
impl DnsResolver for UdpResolver {
    async fn lookup_host(&self, name: &str) -> Result<Vec<String>> {
        let v4 = self.query(name, RecordType::A).await;
        let v6 = self.query(name, RecordType::Aaaa).await;
        let addrs = match (v4, v6) {
            (Ok(mut addrs), Ok(v6)) => {
                addrs.extend(v6);
                addrs
            }
            // one family answering is enough
            (Ok(addrs), Err(e)) | (Err(e), Ok(addrs)) if !addrs.is_empty() => {
                tracing::debug!(dns_name = name, error = %e, "partial host lookup");
                addrs
            }
            (Err(e), _) | (_, Err(e)) => return Err(e),
        };
        if addrs.is_empty() {
            return Err(ConvergeError::resolve(name, "no such host"));
        }
        Ok(addrs)
    }

    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>> {
        let records = self.query(name, RecordType::Txt).await?;
        if records.is_empty() {
            return Err(ConvergeError::resolve(name, "no such host"));
        }
        Ok(records)
    }
}
