//! Shared pool of HTTPS connections to the gateway.
//!
//! The pool owns one lazily built blocking `reqwest` client (whose connection
//! pool keeps idle connections and reaps them after the idle timeout) and a
//! set of connection slots bounding how many requests can be in flight at
//! once. Every request holds a [`Lease`] on one slot from the moment it is
//! sent until its response body is finished or dropped.

use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::ConnectionPolicy;
use crate::error::LocalError;
use crate::headers::Headers;
use crate::transport::{OutgoingRequest, RawResponse, Transport};

#[derive(Debug, Default)]
struct SlotState {
    in_use: usize,
    closed: bool,
}

#[derive(Debug)]
struct Slots {
    capacity: usize,
    state: Mutex<SlotState>,
    freed: Condvar,
}

impl Slots {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut state = self.lock();
        state.in_use = state.in_use.saturating_sub(1);
        tracing::trace!(in_use = state.in_use, "connection released");
        drop(state);
        self.freed.notify_one();
    }
}

/// One checked-out connection slot.
///
/// The slot is returned exactly once, either by [`Lease::release`] or when
/// the lease is dropped.
#[derive(Debug)]
pub struct Lease {
    slots: Option<Arc<Slots>>,
}

impl Lease {
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(slots) = self.slots.take() {
            slots.release();
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.give_back();
    }
}

/// Bounded, shared connection pool for one endpoint.
pub struct ConnectionPool {
    policy: ConnectionPolicy,
    client: OnceLock<Client>,
    init: Mutex<()>,
    slots: Arc<Slots>,
}

impl ConnectionPool {
    /// Create a pool. The HTTP client itself is built on first use.
    pub fn new(policy: ConnectionPolicy) -> Result<Self, LocalError> {
        policy.validate()?;
        let slots = Arc::new(Slots {
            capacity: policy.max_pool_size,
            state: Mutex::new(SlotState::default()),
            freed: Condvar::new(),
        });

        Ok(Self {
            policy,
            client: OnceLock::new(),
            init: Mutex::new(()),
            slots,
        })
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// The shared HTTP client, built on the first call and returned
    /// unchanged afterwards.
    pub fn acquire_client(&self) -> Result<&Client, LocalError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let client = Client::builder()
            .pool_max_idle_per_host(self.policy.max_pool_size)
            .pool_idle_timeout(self.policy.idle_connection_timeout)
            .connect_timeout(self.policy.request_timeout)
            .timeout(self.policy.request_timeout)
            .build()
            .map_err(LocalError::ClientBuild)?;

        tracing::debug!(
            max_pool_size = self.policy.max_pool_size,
            request_timeout = ?self.policy.request_timeout,
            idle_connection_timeout = ?self.policy.idle_connection_timeout,
            "built pooled http client"
        );

        Ok(self.client.get_or_init(|| client))
    }

    /// Check out a connection slot, waiting up to the request timeout for
    /// one to free up.
    pub fn acquire(&self) -> Result<Lease, LocalError> {
        let waited = self.policy.request_timeout;
        let capacity = self.slots.capacity;

        let state = self.slots.lock();
        let (mut state, _) = self
            .slots
            .freed
            .wait_timeout_while(state, waited, |s| !s.closed && s.in_use >= capacity)
            .unwrap_or_else(PoisonError::into_inner);

        if state.closed {
            return Err(LocalError::PoolShutdown);
        }
        if state.in_use >= capacity {
            return Err(LocalError::PoolTimeout { waited });
        }

        state.in_use += 1;
        tracing::trace!(in_use = state.in_use, "connection acquired");

        Ok(Lease {
            slots: Some(self.slots.clone()),
        })
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.slots.lock().in_use
    }

    /// Refuse further leases. Outstanding leases still release normally.
    pub fn shutdown(&self) {
        self.slots.lock().closed = true;
        self.slots.freed.notify_all();
        tracing::debug!("connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.slots.lock().closed
    }
}

impl Transport for ConnectionPool {
    fn send(&self, request: OutgoingRequest) -> Result<RawResponse, LocalError> {
        let headers = to_header_map(&request.headers)?;
        let client = self.acquire_client()?;
        let lease = self.acquire()?;

        let method: http::Method = request.method.into();
        let mut req_builder = client.request(method, request.url).headers(headers);
        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = match req_builder.send() {
            Ok(response) => response,
            Err(e) => {
                lease.release();
                return Err(LocalError::Transport(Box::new(e)));
            }
        };

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        Ok(RawResponse::new(
            status,
            headers,
            PooledBody {
                response,
                lease: Some(lease),
            },
        ))
    }

    fn shutdown(&self) {
        ConnectionPool::shutdown(self);
    }
}

/// Response body that gives its slot back at end-of-stream or on drop.
struct PooledBody {
    response: Response,
    lease: Option<Lease>,
}

impl Read for PooledBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.response.read(buf)?;
        if n == 0 && !buf.is_empty() {
            if let Some(lease) = self.lease.take() {
                lease.release();
            }
        }
        Ok(n)
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, LocalError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::try_from(name.as_str())?;
        let header_value = HeaderValue::try_from(value.as_str())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn collect_headers(headers: &HeaderMap) -> Headers {
    let mut collected = Headers::with_capacity(headers.len());
    for (name, value) in headers {
        collected.insert(
            name.to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    collected
}
