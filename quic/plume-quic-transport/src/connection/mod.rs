// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection lifecycle: version negotiation, handshake gating, frame
//! dispatch, acknowledgement processing and egress packet construction

pub mod id;
mod table;

pub use id::Id;
pub use table::{DuplicateKey, Handle, Table};

use crate::{
    frame::{self, Ack, Frame},
    io::PeerAddr,
    recovery::{PtoOutcome, Recovery},
    space::{PacketSpace, SentPacket},
    stream::{SendState, Stream, StreamId},
    tls,
    wire::{self, Version},
};
use bytes::{Bytes, BytesMut};
use plume_quic_core::{
    endpoint,
    frame::{Kind, KindSet},
    packet::number::{decode_packet_number, PacketNumberSpace},
    time::{Duration, Timestamp},
    transport::parameters::TransportParameters,
};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Connection lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Idle,
    /// Client sent its hello under a tentative version
    VersSent,
    /// Server rejected the offered version and owes a negotiation response
    VersRej,
    /// Version agreed, handshake in progress
    VersOk,
    Established,
    Closed,
}

/// Why a connection ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, displaydoc::Display)]
pub enum Error {
    /// the connection was closed locally
    Closed,
    /// the peer closed the connection with error code {code}
    Peer { code: u64 },
    /// the idle timer expired
    IdleTimeout,
    /// no version in common with the peer
    NoCommonVersion,
    /// the peer negotiated a version we never offered
    VersionMismatch,
    /// the handshake failed
    Handshake,
}

impl std::error::Error for Error {}

/// Connection-scoped signals surfaced to the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnEvent {
    /// The handshake completed on a connection we initiated
    Connected,
    /// The handshake completed on a connection we accepted
    Accepted,
    /// Ordered data (or a FIN) is ready to read
    StreamReadable(StreamId),
    /// Our FIN on the stream was acknowledged
    StreamFinished(StreamId),
    /// The connection reached its terminal state
    Closed(Error),
}

/// Side effects of packet processing the endpoint must apply
#[derive(Debug, Default)]
pub struct Output {
    pub events: Vec<ConnEvent>,
    /// The connection id index must be rekeyed from the first id (if any)
    /// to the second
    pub rekey_cid: Option<(Id, Id)>,
}

/// What a fired timer asks the endpoint to transmit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub rtx: bool,
    pub limit: Option<u8>,
}

#[derive(Debug)]
pub struct Connection<S: tls::Session> {
    role: endpoint::Type,
    cid: Id,
    peer: PeerAddr,
    state: State,
    /// The version the first flight offered
    version_initial: Version,
    /// The currently negotiated version
    version: Version,
    /// Every version this client has ever offered; a negotiation response
    /// is only honored if its tried-version is one of these
    offered_versions: Vec<Version>,
    tls: S,
    streams: BTreeMap<StreamId, Stream>,
    spaces: [PacketSpace; 3],
    pub recovery: Recovery,
    params: TransportParameters,
    /// Schedules egress at the end of the ingress batch
    pub needs_tx: bool,
    /// This connection saw ingress in the current batch
    pub had_rx: bool,
    /// A version-negotiation response is owed to the peer
    vneg_pending: bool,
    /// Lost control frames to re-emit
    tx_handshake_done: bool,
    tx_new_token: bool,
    /// Highest connection-id sequence handed to the peer; rewound when a
    /// NEW_CONNECTION_ID frame is lost
    max_cid_seq_out: u64,
    /// Set when a FIN of ours is acknowledged
    pub have_new_data: bool,
    token: Option<Bytes>,
    idle_deadline: Option<Timestamp>,
    /// A CONNECTION_CLOSE frame still to be sent
    pending_close: Option<u64>,
}

impl<S: tls::Session> Connection<S> {
    pub fn new(
        role: endpoint::Type,
        cid: Id,
        peer: PeerAddr,
        version: Version,
        params: TransportParameters,
        tls: S,
    ) -> Self {
        let mut conn = Self {
            role,
            cid,
            peer,
            state: State::Idle,
            version_initial: version,
            version,
            offered_versions: Vec::new(),
            tls,
            streams: BTreeMap::new(),
            spaces: [
                PacketSpace::new(PacketNumberSpace::Initial),
                PacketSpace::new(PacketNumberSpace::Handshake),
                PacketSpace::new(PacketNumberSpace::ApplicationData),
            ],
            recovery: Recovery::new(params.max_ack_delay, params.max_udp_payload),
            params,
            needs_tx: false,
            had_rx: false,
            vneg_pending: false,
            tx_handshake_done: false,
            tx_new_token: false,
            max_cid_seq_out: 0,
            have_new_data: false,
            token: None,
            idle_deadline: None,
            pending_close: None,
        };
        conn.streams
            .insert(StreamId::HANDSHAKE, Stream::new(StreamId::HANDSHAKE));
        conn
    }

    #[inline]
    pub fn role(&self) -> endpoint::Type {
        self.role
    }

    #[inline]
    pub fn cid(&self) -> Id {
        self.cid
    }

    #[inline]
    pub fn peer(&self) -> PeerAddr {
        self.peer
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// The version the first flight offered, before any negotiation
    #[inline]
    pub fn initial_version(&self) -> Version {
        self.version_initial
    }

    /// The address-validation token the server issued, if any
    #[inline]
    pub fn token(&self) -> Option<&Bytes> {
        self.token.as_ref()
    }

    /// Highest connection-id sequence number handed to the peer
    #[inline]
    pub fn max_cid_seq_out(&self) -> u64 {
        self.max_cid_seq_out
    }

    #[inline]
    pub fn is_established(&self) -> bool {
        self.state == State::Established
    }

    #[inline]
    pub fn spaces(&self) -> &[PacketSpace; 3] {
        &self.spaces
    }

    #[inline]
    pub fn stream(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    #[inline]
    pub fn stream_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    /// Binds a server connection waiting in accept to its first peer
    pub fn bind_peer(&mut self, peer: PeerAddr) {
        debug_assert!(self.peer.is_unbound());
        self.peer = peer;
    }

    /// Adopts the connection id the first routed packet carried (server
    /// accept path)
    pub fn adopt_cid(&mut self, cid: Id) {
        self.cid = cid;
    }

    /// Pops ordered received data from a stream
    pub fn read_stream(&mut self, id: StreamId) -> Option<Bytes> {
        self.streams.get_mut(&id)?.recv.read()
    }

    /// Direct access to the handshake session, for test harnesses
    #[cfg(any(test, feature = "testing"))]
    pub fn tls_mut(&mut self) -> &mut S {
        &mut self.tls
    }

    /// Queues the ClientHello and marks the connection for egress
    pub fn client_start(&mut self) -> Result<(), Error> {
        debug_assert!(self.role.is_client());
        self.offered_versions.push(self.version);
        let hello = self.tls.handshake(&[]).map_err(|_| Error::Handshake)?;
        let stream = self
            .streams
            .get_mut(&StreamId::HANDSHAKE)
            .expect("handshake stream exists");
        stream.send.write(Bytes::from(hello), false);
        self.needs_tx = true;
        Ok(())
    }

    /// Opens (or returns) an application stream
    pub fn open_stream(&mut self, id: StreamId) -> &mut Stream {
        self.streams.entry(id).or_insert_with(|| Stream::new(id))
    }

    /// Queues application data
    pub fn write_stream(&mut self, id: StreamId, data: Bytes, fin: bool) {
        self.open_stream(id).send.write(data, fin);
        if fin {
            self.open_stream(id).fin_queued = true;
        }
        self.needs_tx = true;
    }

    /// Requests an orderly close
    pub fn close(&mut self, code: u64) {
        if self.state == State::Closed {
            return;
        }
        self.pending_close = Some(code);
        self.needs_tx = true;
    }

    /// Moves the connection to its terminal state
    fn enter_closed(&mut self, error: Error, out: &mut Output) {
        if self.state == State::Closed {
            return;
        }
        debug!(cid = %self.cid, ?error, "connection closed");
        self.state = State::Closed;
        self.recovery.cancel_alarm();
        self.idle_deadline = None;
        out.events.push(ConnEvent::Closed(error));
    }

    /// Restarts the idle timer; called once per ingress batch
    pub fn rearm_idle_timer(&mut self, now: Timestamp) {
        if self.state != State::Closed {
            self.idle_deadline = Some(now + self.params.max_idle_timeout);
        }
    }

    /// The earliest pending timer
    pub fn next_timeout(&self) -> Option<Timestamp> {
        if self.state == State::Closed {
            return None;
        }
        match (self.idle_deadline, self.recovery.loss_alarm()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires expired timers. Returns an egress request when the loss
    /// detection alarm asks for retransmission or probes.
    pub fn on_timeout(&mut self, now: Timestamp, out: &mut Output) -> Option<TxRequest> {
        if self.state == State::Closed {
            return None;
        }

        if self.idle_deadline.is_some_and(|t| t <= now) {
            self.enter_closed(Error::IdleTimeout, out);
            return None;
        }

        if self.recovery.loss_alarm().is_some_and(|t| t <= now) {
            let outcome = self.recovery.on_loss_detection_timeout(
                &self.spaces,
                self.is_established(),
                self.tls.has_application_keys(),
            );
            debug!(cid = %self.cid, ?outcome, "loss detection alarm");
            match outcome {
                PtoOutcome::LossDetection => {
                    self.detect_all_lost(now, true, out);
                    self.needs_tx = true;
                    return Some(TxRequest {
                        rtx: false,
                        limit: None,
                    });
                }
                PtoOutcome::AntiDeadlockProbe | PtoOutcome::Probe => {
                    if outcome == PtoOutcome::AntiDeadlockProbe {
                        self.detect_all_lost(now, false, out);
                    }
                    self.needs_tx = true;
                    return Some(TxRequest {
                        rtx: true,
                        limit: outcome.tx_limit(),
                    });
                }
            }
        }
        None
    }

    fn detect_all_lost(&mut self, now: Timestamp, do_cc: bool, out: &mut Output) {
        for idx in 0..3 {
            let lost = {
                let space = &mut self.spaces[idx];
                self.recovery.detect_lost_packets(space, now, do_cc)
            };
            self.handle_lost(lost, out);
        }
    }

    /// Validates, unprotects and dispatches one routed datagram.
    ///
    /// `fresh_cid` is a pre-drawn random id, consumed if this packet makes
    /// a server pick its connection id.
    pub fn handle_datagram(
        &mut self,
        now: Timestamp,
        mut payload: BytesMut,
        fresh_cid: Id,
        out: &mut Output,
    ) {
        let Ok(flags) = wire::flags(&payload) else {
            return;
        };
        let Ok(header_len) = wire::header_len(&payload) else {
            trace!(cid = %self.cid, "dropping malformed datagram");
            return;
        };

        let is_vneg = wire::is_long(flags) && wire::long_type(flags) == wire::F_LH_TYPE_VNEG;
        if !is_vneg {
            // remove packet protection in place
            let Some(unprotected_len) = self.tls.open(&mut payload, header_len) else {
                trace!(cid = %self.cid, "dropping datagram: packet protection failure");
                return;
            };
            payload.truncate(unprotected_len);
        }

        self.had_rx = true;
        self.process_packet(now, &payload, fresh_cid, out);
    }

    /// Drives the state machine for one unprotected packet
    fn process_packet(&mut self, now: Timestamp, buf: &[u8], fresh_cid: Id, out: &mut Output) {
        let Ok(flags) = wire::flags(buf) else { return };

        match self.state {
            State::Idle | State::VersRej if self.role.is_server() => {
                self.server_first_flight(now, buf, flags, fresh_cid, out)
            }
            State::VersSent => self.client_vers_sent(now, buf, flags, out),
            State::VersOk => {
                let completes = !wire::is_long(flags)
                    || wire::long_type(flags) >= wire::F_LH_CLNT_CTXT;
                if completes {
                    self.state = State::Established;
                    debug!(cid = %self.cid, vers = format_args!("{:#010x}", self.version), "handshake complete");
                    if self.role.is_server() {
                        // tell the client it can drop its handshake space
                        self.tx_handshake_done = true;
                        self.needs_tx = true;
                    }
                    out.events.push(if self.role.is_client() {
                        ConnEvent::Connected
                    } else {
                        ConnEvent::Accepted
                    });
                }
                self.record_and_decode(now, buf, flags, out);
            }
            State::Established | State::Closed => {
                self.record_and_decode(now, buf, flags, out);
            }
            _ => {
                trace!(cid = %self.cid, state = ?self.state, "dropping unexpected packet");
            }
        }
    }

    /// Server path out of Idle/VersRej: either accept the offered version
    /// or schedule a version-negotiation response.
    fn server_first_flight(
        &mut self,
        now: Timestamp,
        buf: &[u8],
        flags: u8,
        fresh_cid: Id,
        out: &mut Output,
    ) {
        if buf.len() < wire::MIN_INI_LEN || !wire::is_long(flags) {
            trace!("dropping undersized or short-header first flight");
            return;
        }
        let Ok(version) = wire::vers(buf) else { return };

        self.version_initial = version;
        self.version = version;

        if !wire::is_supported(version) {
            debug!(vers = format_args!("{version:#010x}"), "rejecting offered version");
            self.state = State::VersRej;
            self.vneg_pending = true;
            self.needs_tx = true;
            // still track the packet number so the retry is not treated
            // as a duplicate
            self.record_packet_number(now, buf, flags);
            return;
        }

        // the offered version is acceptable: adopt a fresh random id and
        // initialize the handshake
        let old_cid = self.cid;
        self.cid = fresh_cid;
        out.rekey_cid = Some((old_cid, fresh_cid));
        self.tls.reset();
        self.state = State::VersOk;
        debug!(cid = %self.cid, vers = format_args!("{version:#010x}"), "accepted offered version");

        self.record_and_decode(now, buf, flags, out);
        self.needs_tx = true;
    }

    /// Client path while the hello is outstanding: either the server
    /// echoed a version-negotiation response or it accepted our version.
    fn client_vers_sent(&mut self, now: Timestamp, buf: &[u8], flags: u8, out: &mut Output) {
        let is_vneg = wire::is_long(flags) && wire::long_type(flags) == wire::F_LH_TYPE_VNEG;

        if !is_vneg {
            // the server accepted the offered version; its packets carry
            // the connection id it picked, which replaces ours
            if let Ok(peer_cid) = wire::cid(buf) {
                let peer_cid = Id::new(peer_cid);
                if peer_cid != self.cid {
                    out.rekey_cid = Some((self.cid, peer_cid));
                    self.cid = peer_cid;
                }
            }
            debug!(cid = %self.cid, "server accepted version");
            self.state = State::VersOk;
            self.record_and_decode(now, buf, flags, out);
            return;
        }

        let Ok(tried) = wire::vers(buf) else { return };
        if !self.offered_versions.contains(&tried) {
            // a negotiation response for a version this connection never
            // offered cannot be correlated with anything we sent
            warn!(tried = format_args!("{tried:#010x}"), "uncorrelated version negotiation");
            self.enter_closed(Error::VersionMismatch, out);
            return;
        }

        let Ok(server_versions) = wire::decode_vneg_payload(buf) else {
            return;
        };

        // scan our own priority list in order; the first version the
        // server also lists wins
        let chosen = wire::SUPPORTED_VERSIONS
            .iter()
            .copied()
            .find(|v| !wire::is_force_negotiation(*v) && server_versions.contains(v));

        let Some(chosen) = chosen else {
            warn!("no version in common with server");
            self.enter_closed(Error::NoCommonVersion, out);
            return;
        };

        debug!(vers = format_args!("{chosen:#010x}"), "retrying with negotiated version");
        self.version = chosen;
        self.offered_versions.push(chosen);

        // the first flight is void: reset the handshake, drop every sent
        // packet and its in-flight accounting, regenerate the hello
        self.tls.reset();
        self.recovery.discard_all_sent(&mut self.spaces);
        let hello = match self.tls.handshake(&[]) {
            Ok(hello) => hello,
            Err(_) => {
                self.enter_closed(Error::Handshake, out);
                return;
            }
        };
        let stream = self
            .streams
            .get_mut(&StreamId::HANDSHAKE)
            .expect("handshake stream exists");
        stream.send.truncate();
        stream.send.write(Bytes::from(hello), false);
        self.needs_tx = true;
    }

    /// Records the packet number for ACK generation and decodes frames
    fn record_and_decode(&mut self, now: Timestamp, buf: &[u8], flags: u8, out: &mut Output) {
        let Some(space_idx) = space_index_for_flags(flags) else {
            return;
        };
        if self.spaces[space_idx].abandoned {
            trace!(space = space_idx, "dropping packet for abandoned space");
            return;
        }
        if self.record_packet_number(now, buf, flags).is_none() {
            return;
        }

        let Ok(header_len) = wire::header_len(buf) else {
            return;
        };
        self.decode_frames(space_idx, &buf[header_len..], now, out);
    }

    /// Expands the truncated packet number and inserts it into the
    /// received set of its space
    fn record_packet_number(&mut self, now: Timestamp, buf: &[u8], flags: u8) -> Option<u64> {
        let space_idx = space_index_for_flags(flags)?;
        let truncated = wire::nr(buf).ok()?;
        let space = &mut self.spaces[space_idx];
        let nr = decode_packet_number(space.expected_packet_number(), truncated);
        space.recv.insert(nr, now);
        Some(nr)
    }

    /// Parses the payload and dispatches each frame. Decode errors are
    /// confined to this datagram.
    fn decode_frames(&mut self, space_idx: usize, payload: &[u8], now: Timestamp, out: &mut Output) {
        let frames = match frame::decode_frames(payload) {
            Ok(frames) => frames,
            Err(error) => {
                trace!(%error, "dropping undecodable payload");
                return;
            }
        };

        for f in &frames {
            let kind = f.kind();
            let space = &mut self.spaces[space_idx];
            space.rx_frames.insert(kind);
            if kind.is_ack_eliciting() {
                space.needs_ack = true;
                self.needs_tx = true;
            }
        }

        for f in frames {
            match f {
                Frame::Padding { .. } | Frame::Ping => {}
                Frame::Ack(ack) => self.process_ack(space_idx, &ack, now, out),
                Frame::Stream {
                    id,
                    offset,
                    fin,
                    data,
                } => {
                    let stream = self.streams.entry(id).or_insert_with(|| Stream::new(id));
                    stream.recv.insert(offset, data, fin);
                    if fin {
                        stream.on_peer_fin();
                    }
                    if id != StreamId::HANDSHAKE {
                        out.events.push(ConnEvent::StreamReadable(id));
                    }
                }
                Frame::NewToken { token } => {
                    self.token = Some(token);
                }
                Frame::ConnectionClose { code } => {
                    self.enter_closed(Error::Peer { code }, out);
                }
                Frame::HandshakeDone => {
                    // the server confirmed the handshake; its packets will
                    // never need the handshake space again
                    if self.role.is_client() && !self.spaces[1].abandoned {
                        self.recovery.abandon_space(&mut self.spaces[1]);
                    }
                }
            }
        }
    }

    /// Applies one ACK frame: dequeues covered packets, settles stream
    /// and congestion state, then runs loss detection.
    fn process_ack(&mut self, space_idx: usize, ack: &Ack, now: Timestamp, out: &mut Output) {
        let ack_delay = Duration::from_micros(ack.ack_delay_micros);

        let acked = {
            let space = &mut self.spaces[space_idx];
            self.recovery
                .on_ack_received(space, ack.largest, ack_delay, &ack.ranges, now)
        };

        for m in &acked {
            // stop acknowledging what this packet's ACK frame covered
            if let Some(ranges) = &m.acked_ranges {
                let space = &mut self.spaces[space_idx];
                for &(lo, hi) in ranges {
                    space.recv.remove_range(lo, hi);
                }
            }

            // settle the send unit this packet carried
            let mut grow = true;
            if let Some((stream_id, offset)) = m.stream {
                grow = self.mark_unit_acked(stream_id, offset, m, out);
            }
            self.recovery.on_packet_acked_cc(m, grow);

            // an acknowledged HANDSHAKE_DONE ends the server's use of the
            // handshake space
            if m.frames.contains(Kind::HandshakeDone)
                && self.role.is_server()
                && !self.spaces[1].abandoned
            {
                self.recovery.abandon_space(&mut self.spaces[1]);
            }
        }

        if !acked.is_empty() {
            let lost = {
                let space = &mut self.spaces[space_idx];
                self.recovery.on_ack_processed(space, now)
            };
            self.handle_lost(lost, out);
            self.maybe_tx();
        }
    }

    /// Marks the send unit behind an acknowledged packet. Returns `false`
    /// if the unit had already been acknowledged through another
    /// transmission, in which case the congestion window must not grow
    /// again.
    fn mark_unit_acked(
        &mut self,
        stream_id: StreamId,
        offset: u64,
        m: &SentPacket,
        out: &mut Output,
    ) -> bool {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return false;
        };
        let Some(buf) = stream.send.find_mut(offset) else {
            // already acknowledged and released (crypto streams)
            return false;
        };
        if buf.state == SendState::Acked {
            return false;
        }

        buf.state = SendState::Acked;
        stream.send.advance_una();
        if stream_id.is_crypto() {
            stream.send.release_acked_front();
        }

        if m.is_fin {
            stream.on_fin_acked();
            self.have_new_data = true;
            out.events.push(ConnEvent::StreamFinished(stream_id));
        }
        true
    }

    /// Re-flags control frames carried by lost packets and marks their
    /// send units for retransmission.
    fn handle_lost(&mut self, lost: Vec<SentPacket>, _out: &mut Output) {
        for m in lost {
            if m.frames.intersects(KindSet::RETRANSMITTABLE_CONTROL) {
                for kind in m.frames.iter() {
                    match kind {
                        Kind::NewToken => self.tx_new_token = true,
                        Kind::HandshakeDone => self.tx_handshake_done = true,
                        Kind::NewConnectionId => {
                            self.max_cid_seq_out = self.max_cid_seq_out.saturating_sub(1)
                        }
                        Kind::ResetStream | Kind::StopSending => {
                            if let Some((stream_id, _)) = m.stream {
                                if let Some(stream) = self.streams.get_mut(&stream_id) {
                                    stream.need_ctrl = true;
                                }
                            }
                        }
                        // DATA_BLOCKED and friends regenerate on their own
                        _ => {}
                    }
                }
            }

            if let Some((stream_id, offset)) = m.stream {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    if let Some(buf) = stream.send.find_mut(offset) {
                        // only the latest transmission demotes the unit
                        if buf.last_packet_number == Some(m.nr)
                            && buf.state == SendState::Inflight
                        {
                            buf.state = SendState::Lost;
                            stream.lost_count += 1;
                        }
                    }
                }
            }
            self.needs_tx = true;
        }
    }

    /// Schedules egress if the window has room for another packet
    fn maybe_tx(&mut self) {
        let has_pending = self.streams.values().any(|s| {
            s.send
                .iter_ready(false)
                .next()
                .is_some()
        });
        if has_pending
            && self
                .recovery
                .cc
                .has_window_for(self.params.max_udp_payload as u64)
        {
            self.needs_tx = true;
        }
    }

    /// Feeds drained handshake-stream data through the TLS session;
    /// called once per ingress batch.
    pub fn drive_tls(&mut self, out: &mut Output) {
        let Some(stream) = self.streams.get_mut(&StreamId::HANDSHAKE) else {
            return;
        };
        let input = stream.recv.drain();
        if input.is_empty() && self.state != State::Idle {
            return;
        }
        match self.tls.handshake(&input) {
            Ok(output) if !output.is_empty() => {
                stream.send.write(Bytes::from(output), false);
                self.needs_tx = true;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "handshake failure");
                self.enter_closed(Error::Handshake, out);
            }
        }
    }
}

/// Maps a packet's first byte to its packet-number space; version
/// negotiation packets have none.
fn space_index_for_flags(flags: u8) -> Option<usize> {
    if wire::is_long(flags) {
        match wire::long_type(flags) {
            wire::F_LH_TYPE_VNEG => None,
            wire::F_LH_CLNT_INI | wire::F_LH_SERV_CTXT => Some(0),
            _ => Some(1),
        }
    } else {
        Some(2)
    }
}

mod egress;
