// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The endpoint: datagram demultiplexing, the ingress batch loop, egress
//! scheduling and timer dispatch
//!
//! All processing happens on the caller's thread. `handle_rx` drains the
//! socket and runs every connection's ingress before any connection's
//! egress; `handle_timeout` fires idle and loss-detection alarms. The
//! caller sleeps until [`Endpoint::next_timeout`] or socket readability.

use crate::{
    connection::{ConnEvent, Connection, Handle, Id, Output, State, Table},
    io::{Datagram, PeerAddr, Socket},
    stream::StreamId,
    tls,
    tls::Provider,
    wire,
};
use bytes::Bytes;
use plume_quic_core::{
    endpoint::Type,
    random,
    time::{Clock, Timestamp},
    transport::parameters::TransportParameters,
};
use std::collections::VecDeque;
use tracing::{debug, trace};

#[cfg(test)]
mod tests;

/// The provider types an endpoint is built from
pub trait Config {
    type Clock: Clock;
    type Random: random::Generator;
    type Tls: tls::Provider;
    type Socket: Socket;
}

pub type Session<C> = <<C as Config>::Tls as tls::Provider>::Session;

/// Endpoint-level events, drained with [`Endpoint::poll_event`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A connection we initiated completed its handshake
    Connected(Handle),
    /// A connection we accepted completed its handshake
    Accepted(Handle),
    StreamReadable(Handle, StreamId),
    StreamFinished(Handle, StreamId),
    ConnectionClosed(Handle, crate::connection::Error),
}

pub struct Endpoint<C: Config> {
    clock: C::Clock,
    random: C::Random,
    tls: C::Tls,
    socket: C::Socket,
    params: TransportParameters,
    connections: Vec<Option<Connection<Session<C>>>>,
    free: Vec<usize>,
    table: Table,
    events: VecDeque<Event>,
}

impl<C: Config> Endpoint<C> {
    pub fn new(clock: C::Clock, random: C::Random, tls: C::Tls, socket: C::Socket) -> Self {
        Self {
            clock,
            random,
            tls,
            socket,
            params: TransportParameters::default(),
            connections: Vec::new(),
            free: Vec::new(),
            table: Table::new(),
            events: VecDeque::new(),
        }
    }

    pub fn with_params(mut self, params: TransportParameters) -> Self {
        self.params = params;
        self
    }

    /// Initiates a connection to `peer`; the hello goes out immediately
    pub fn connect(&mut self, peer: PeerAddr) -> Result<Handle, crate::connection::Error> {
        self.connect_with_version(peer, wire::SUPPORTED_VERSIONS[0])
    }

    /// Initiates a connection offering a specific version. Offering an
    /// unsupported or force-negotiation version exercises the retry path.
    pub fn connect_with_version(
        &mut self,
        peer: PeerAddr,
        version: wire::Version,
    ) -> Result<Handle, crate::connection::Error> {
        let now = self.clock.now();
        let cid = Id::generate(&mut self.random);
        let session = self.tls.new_session(Type::Client);
        let mut conn = Connection::new(Type::Client, cid, peer, version, self.params, session);
        conn.client_start()?;
        conn.rearm_idle_timer(now);

        let handle = self.insert(conn);
        let _ = self.table.insert_peer(peer, true, handle);
        let _ = self.table.insert_cid(cid, true, handle);
        debug!(cid = %cid, %peer, "connecting");

        self.flush(handle);
        Ok(handle)
    }

    /// Creates a server connection waiting in accept. The first long
    /// header datagram from an unknown peer binds to it.
    pub fn listen(&mut self) -> Handle {
        let session = self.tls.new_session(Type::Server);
        let conn = Connection::new(
            Type::Server,
            Id::new(0),
            PeerAddr::UNBOUND,
            wire::SUPPORTED_VERSIONS[0],
            self.params,
            session,
        );
        let handle = self.insert(conn);
        let _ = self.table.insert_peer(PeerAddr::UNBOUND, false, handle);
        debug!("listening");
        handle
    }

    #[inline]
    pub fn connection(&self, handle: Handle) -> Option<&Connection<Session<C>>> {
        self.connections.get(handle.0)?.as_ref()
    }

    #[inline]
    pub fn connection_mut(&mut self, handle: Handle) -> Option<&mut Connection<Session<C>>> {
        self.connections.get_mut(handle.0)?.as_mut()
    }

    /// Pops the next pending event
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Queues data on a stream and transmits
    pub fn write(&mut self, handle: Handle, stream: StreamId, data: Bytes, fin: bool) {
        if let Some(conn) = self.connection_mut(handle) {
            conn.write_stream(stream, data, fin);
        }
        self.flush(handle);
    }

    /// Pops ordered received data from a stream
    pub fn read(&mut self, handle: Handle, stream: StreamId) -> Option<Bytes> {
        self.connection_mut(handle)?.read_stream(stream)
    }

    /// Closes a connection; the close frame goes out immediately
    pub fn close(&mut self, handle: Handle, code: u64) {
        if let Some(conn) = self.connection_mut(handle) {
            conn.close(code);
        }
        self.flush(handle);
        self.reap(handle);
    }

    /// Drains and processes every pending datagram, then runs the
    /// deferred per-connection batch work.
    pub fn handle_rx(&mut self) {
        let now = self.clock.now();
        let datagrams = self.socket.poll_rx();
        let mut batch: Vec<Handle> = Vec::new();

        for datagram in datagrams {
            if let Some(handle) = self.route(datagram, now) {
                if !batch.contains(&handle) {
                    batch.push(handle);
                }
            }
        }

        // all ingress has completed; now rearm idle timers, feed the
        // handshake, and transmit where scheduled
        for handle in batch {
            let Some(conn) = self.connection_mut(handle) else {
                continue;
            };
            conn.had_rx = false;
            conn.rearm_idle_timer(now);

            let mut out = Output::default();
            conn.drive_tls(&mut out);
            self.apply_output(handle, out);

            if self
                .connection(handle)
                .is_some_and(|conn| conn.needs_tx)
            {
                self.flush(handle);
            }
            self.reap(handle);
        }
    }

    /// Routes one datagram to a connection and dispatches it
    fn route(&mut self, datagram: Datagram, now: Timestamp) -> Option<Handle> {
        let payload = datagram.payload;
        if payload.len() > wire::MAX_PKT_LEN {
            trace!(len = payload.len(), "dropping oversized datagram");
            return None;
        }
        let Ok(_header_len) = wire::header_len(&payload) else {
            trace!("dropping datagram with malformed header");
            return None;
        };
        let flags = wire::flags(&payload).ok()?;

        // routing key: connection id when the header carries one, the
        // peer tuple otherwise (or as fallback for an unknown id)
        let handle = if wire::has_cid(flags) {
            let cid = Id::new(wire::cid(&payload).ok()?);
            self.table
                .lookup_cid_any(cid)
                .or_else(|| self.table.lookup_peer_any(datagram.peer))
        } else {
            self.table.lookup_peer_any(datagram.peer)
        };

        let handle = match handle {
            Some(handle) => handle,
            None if wire::is_long(flags) => self.bind_accept_waiter(&payload, datagram.peer)?,
            None => {
                trace!(peer = %datagram.peer, "dropping datagram for unknown connection");
                return None;
            }
        };

        let fresh_cid = Id::generate(&mut self.random);
        let mut out = Output::default();
        let conn = self.connections.get_mut(handle.0)?.as_mut()?;
        conn.handle_datagram(now, payload, fresh_cid, &mut out);
        let had_rx = conn.had_rx;
        self.apply_output(handle, out);

        had_rx.then_some(handle)
    }

    /// Binds the server connection waiting in accept to a new peer
    fn bind_accept_waiter(&mut self, payload: &[u8], peer: PeerAddr) -> Option<Handle> {
        let handle = self.table.lookup_peer(PeerAddr::UNBOUND, false)?;
        let cid = Id::new(wire::cid(payload).ok()?);

        self.table.remove_peer(PeerAddr::UNBOUND, false);
        if self.table.insert_peer(peer, false, handle).is_err() {
            trace!(%peer, "accept collision, dropping");
            return None;
        }
        let _ = self.table.insert_cid(cid, false, handle);

        let conn = self.connections.get_mut(handle.0)?.as_mut()?;
        conn.bind_peer(peer);
        conn.adopt_cid(cid);
        debug!(%peer, %cid, "bound accept waiter");
        Some(handle)
    }

    /// Transmits a connection's pending flight
    fn flush(&mut self, handle: Handle) {
        let now = self.clock.now();
        let mut out = Output::default();
        let Some(conn) = self.connections.get_mut(handle.0).and_then(Option::as_mut) else {
            return;
        };
        let chain = conn.tx(now, false, None, &mut out);
        if !chain.is_empty() {
            self.socket.tx(chain);
        }
        self.apply_output(handle, out);
    }

    /// The earliest timer across all connections
    pub fn next_timeout(&self) -> Option<Timestamp> {
        self.connections
            .iter()
            .flatten()
            .filter_map(Connection::next_timeout)
            .min()
    }

    /// Fires every expired idle and loss-detection timer
    pub fn handle_timeout(&mut self) {
        let now = self.clock.now();
        let handles: Vec<Handle> = (0..self.connections.len())
            .filter(|&i| self.connections[i].is_some())
            .map(Handle)
            .collect();

        for handle in handles {
            let mut out = Output::default();
            let Some(conn) = self.connections.get_mut(handle.0).and_then(Option::as_mut) else {
                continue;
            };
            let request = conn.on_timeout(now, &mut out);
            if let Some(request) = request {
                let chain = conn.tx(now, request.rtx, request.limit, &mut out);
                if !chain.is_empty() {
                    self.socket.tx(chain);
                }
            }
            self.apply_output(handle, out);
            self.reap(handle);
        }
    }

    /// Applies a connection's side effects: index rekeys and events
    fn apply_output(&mut self, handle: Handle, out: Output) {
        if let Some((old, new)) = out.rekey_cid {
            let is_client = self
                .connection(handle)
                .map_or(false, |conn| conn.role().is_client());
            self.table.remove_cid(old, is_client);
            let _ = self.table.insert_cid(new, is_client, handle);
        }

        for event in out.events {
            let event = match event {
                ConnEvent::Connected => Event::Connected(handle),
                ConnEvent::Accepted => Event::Accepted(handle),
                ConnEvent::StreamReadable(id) => Event::StreamReadable(handle, id),
                ConnEvent::StreamFinished(id) => Event::StreamFinished(handle, id),
                ConnEvent::Closed(error) => Event::ConnectionClosed(handle, error),
            };
            self.events.push_back(event);
        }
    }

    /// Frees a connection once it reached its terminal state
    fn reap(&mut self, handle: Handle) {
        let closed = self
            .connection(handle)
            .is_some_and(|conn| conn.state() == State::Closed);
        if closed {
            debug!(handle = handle.0, "destroying closed connection");
            self.table.purge(handle);
            self.connections[handle.0] = None;
            self.free.push(handle.0);
        }
    }

    fn insert(&mut self, conn: Connection<Session<C>>) -> Handle {
        if let Some(slot) = self.free.pop() {
            self.connections[slot] = Some(conn);
            Handle(slot)
        } else {
            self.connections.push(Some(conn));
            Handle(self.connections.len() - 1)
        }
    }

    /// The clock shared with the caller's event loop
    #[inline]
    pub fn clock(&self) -> &C::Clock {
        &self.clock
    }

    /// The socket, for test harnesses that need to inspect traffic
    #[inline]
    pub fn socket_mut(&mut self) -> &mut C::Socket {
        &mut self.socket
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use crate::io::testing::Pipe;
    use plume_quic_core::{random::testing::Generator, time::testing::Clock};

    /// An endpoint wired from the in-memory test providers
    pub struct Testing;

    impl Config for Testing {
        type Clock = Clock;
        type Random = Generator;
        type Tls = crate::tls::testing::Provider;
        type Socket = Pipe;
    }

    /// A client/server endpoint pair over an in-memory pipe sharing one
    /// test clock view (each endpoint owns a clock advanced in lockstep
    /// by the harness).
    pub fn pair() -> (Endpoint<Testing>, Endpoint<Testing>) {
        let (a, b) = Pipe::pair();
        let client = Endpoint::new(
            Clock::default(),
            Generator { seed: 11 },
            crate::tls::testing::Provider,
            a,
        );
        let server = Endpoint::new(
            Clock::default(),
            Generator { seed: 211 },
            crate::tls::testing::Provider,
            b,
        );
        (client, server)
    }
}
