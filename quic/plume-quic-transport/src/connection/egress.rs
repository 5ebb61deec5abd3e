// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Egress: stream scheduling, packet construction and recovery recording
//!
//! One send buffer becomes one packet. Streams are visited in ascending
//! id order; a pass is either fresh (unsent and lost buffers) or a
//! retransmission pass (probes repeating in-flight data under new packet
//! numbers). Spaces that still owe the peer an acknowledgement get an
//! ACK-only packet at the end of the flight.

use super::{Connection, Error, Output, State};
use crate::{
    frame::{self, Ack, Frame},
    io::Datagram,
    space::SentPacket,
    stream::{SendState, StreamId},
    tls,
    wire,
};
use bytes::BytesMut;
use plume_quic_core::time::Timestamp;
use tracing::trace;

impl<S: tls::Session> Connection<S> {
    /// Encodes and records one flight of packets.
    ///
    /// `rtx` selects a retransmission pass; `limit` caps the number of
    /// packets (probe timeouts send exactly one or two).
    pub fn tx(
        &mut self,
        now: Timestamp,
        rtx: bool,
        limit: Option<u8>,
        out: &mut Output,
    ) -> Vec<Datagram> {
        let mut chain: Vec<Datagram> = Vec::new();

        if self.state == State::Closed && self.pending_close.is_none() {
            return chain;
        }

        // a rejected version gets only the negotiation response
        if self.vneg_pending {
            self.vneg_pending = false;
            self.needs_tx = false;
            chain.push(self.encode_vneg());
            return chain;
        }

        // the client's first flight puts it into VersSent
        if self.role.is_client() && self.state == State::Idle {
            self.state = State::VersSent;
        }

        if let Some(code) = self.pending_close.take() {
            if let Some(datagram) = self.build_close_packet(code, now) {
                chain.push(datagram);
            }
            self.enter_closed(Error::Closed, out);
            self.needs_tx = false;
            return chain;
        }

        let mut budget = limit.map(usize::from);
        let mut sent_eliciting = false;

        let stream_ids: Vec<StreamId> = self.streams.keys().copied().collect();
        'streams: for stream_id in stream_ids {
            // a stream with nothing queued but a control frame owed gets
            // a zero-payload probe buffer
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                if stream.need_ctrl && stream.send.iter_ready(rtx).next().is_none() {
                    stream.need_ctrl = false;
                    stream.send.write(bytes::Bytes::new(), false);
                }
            }

            let offsets: Vec<u64> = self.streams[&stream_id]
                .send
                .iter_ready(rtx)
                .map(|buf| buf.offset)
                .collect();

            for offset in offsets {
                if budget == Some(0) {
                    break 'streams;
                }
                let space_idx = self.egress_space_for_stream(stream_id);
                if let Some(datagram) =
                    self.build_packet(space_idx, Some((stream_id, offset)), rtx, false, now)
                {
                    chain.push(datagram);
                    sent_eliciting = true;
                    if let Some(budget) = budget.as_mut() {
                        *budget -= 1;
                    }
                }
            }
        }

        // ACK-only flights for spaces still owing an acknowledgement
        for space_idx in 0..3 {
            if budget == Some(0) {
                break;
            }
            let space = &self.spaces[space_idx];
            if space.abandoned || !space.needs_ack || space.recv.is_empty() {
                continue;
            }
            if let Some(datagram) = self.build_packet(space_idx, None, false, false, now) {
                chain.push(datagram);
                if let Some(budget) = budget.as_mut() {
                    *budget -= 1;
                }
            }
        }

        // a pending HANDSHAKE_DONE rides an application packet of its own
        // when no data packet carried it
        if self.tx_handshake_done && self.is_established() && budget != Some(0) {
            if let Some(datagram) = self.build_packet(2, None, false, false, now) {
                chain.push(datagram);
                sent_eliciting = true;
                if let Some(budget) = budget.as_mut() {
                    *budget -= 1;
                }
            }
        }

        // probes must elicit an acknowledgement; send a PING if no data
        // went out
        if limit.is_some() && !sent_eliciting {
            let space_idx = self.probe_space();
            if let Some(datagram) = self.build_packet(space_idx, None, false, true, now) {
                chain.push(datagram);
            }
        }

        if !chain.is_empty() {
            self.recovery.set_loss_detection_timer(
                &self.spaces,
                self.is_established(),
                self.role.is_client(),
                now,
            );
        }
        self.needs_tx = false;
        chain
    }

    /// Builds, seals and records one packet.
    ///
    /// Carries the space's ACK (if owed), the given send unit (if any), a
    /// PING when `force_ping`, the pending HANDSHAKE_DONE, and padding on
    /// client initials.
    fn build_packet(
        &mut self,
        space_idx: usize,
        stream_ref: Option<(StreamId, u64)>,
        rtx: bool,
        force_ping: bool,
        now: Timestamp,
    ) -> Option<Datagram> {
        if self.spaces[space_idx].abandoned {
            return None;
        }

        let mut frames: Vec<Frame> = Vec::new();

        // acknowledge everything received in this space; the ack delay is
        // measured from the last insert into the largest interval
        let mut acked_ranges = None;
        {
            let space = &self.spaces[space_idx];
            if let Some(largest) = space.recv.max() {
                let touched = space
                    .recv
                    .find(largest)
                    .map(|iv| iv.touched)
                    .unwrap_or(now);
                let delay = now.saturating_duration_since(touched);
                if let Some(ack) = Ack::from_interval_set(&space.recv, delay.as_micros() as u64) {
                    acked_ranges = Some(ack.ranges.clone());
                    frames.push(Frame::Ack(ack));
                }
            }
        }

        let mut is_fin = false;
        let mut rtx_of = None;
        if let Some((stream_id, offset)) = stream_ref {
            let buf = self.streams.get(&stream_id)?.send.find(offset)?;
            is_fin = buf.fin;
            if rtx && buf.state == SendState::Inflight {
                rtx_of = buf.last_packet_number;
            }
            frames.push(Frame::Stream {
                id: stream_id,
                offset,
                fin: buf.fin,
                data: buf.data.clone(),
            });
        }

        if force_ping {
            frames.push(Frame::Ping);
        }

        // the server's handshake-completion signal rides an application
        // packet
        if space_idx == 2
            && self.role.is_server()
            && self.is_established()
            && self.tx_handshake_done
        {
            self.tx_handshake_done = false;
            frames.push(Frame::HandshakeDone);
        }

        // a lost NEW_TOKEN frame is repeated with the same token
        if space_idx == 2 && self.tx_new_token {
            self.tx_new_token = false;
            if let Some(token) = self.token.clone() {
                frames.push(Frame::NewToken { token });
            }
        }

        if frames.is_empty() {
            return None;
        }

        // header
        let long_type = self.egress_long_type(space_idx);
        let nr = self.spaces[space_idx].next_packet_number();
        let mut buf = Vec::with_capacity(64);
        match long_type {
            Some(packet_type) => wire::encode_long_header(
                &mut buf,
                packet_type,
                self.cid.as_u64(),
                nr as u32,
                self.version,
            ),
            None => wire::encode_short_header(&mut buf, self.cid.as_u64(), nr as u32),
        }
        let header_len = buf.len();
        frame::encode_frames(&frames, &mut buf);

        //= https://www.rfc-editor.org/rfc/rfc9000#section-14.1
        //# A client MUST expand the payload of all UDP datagrams carrying
        //# Initial packets to at least the smallest allowed maximum datagram
        //# size of 1200 bytes
        //
        // ack-only initials are exempt so they do not linger in the
        // in-flight accounting
        if self.role.is_client()
            && long_type == Some(wire::F_LH_CLNT_INI)
            && frame::kinds(&frames).is_ack_eliciting()
            && buf.len() < wire::MIN_INI_LEN
        {
            let padding = Frame::Padding {
                len: (wire::MIN_INI_LEN - buf.len()).saturating_sub(3) as u16,
            };
            frame::encode_frames(std::slice::from_ref(&padding), &mut buf);
            frames.push(padding);
        }

        let mut payload = BytesMut::from(&buf[..]);
        self.tls.seal(&mut payload, header_len);

        let kinds = frame::kinds(&frames);
        let ack_eliciting = kinds.is_ack_eliciting();
        let packet = SentPacket {
            nr,
            time_sent: now,
            udp_len: payload.len() as u16,
            is_long: long_type.is_some(),
            frames: kinds,
            ack_eliciting,
            in_flight: ack_eliciting || kinds.contains(plume_quic_core::frame::Kind::Padding),
            stream: stream_ref,
            is_fin,
            acked_ranges,
            retransmission: None,
            retransmission_of: rtx_of,
        };

        // link the retransmission chain forward
        let space = &mut self.spaces[space_idx];
        if let Some(old_nr) = rtx_of {
            if let Some(old) = space.sent.get_mut(&old_nr) {
                old.retransmission = Some(nr);
            }
        }

        self.recovery.on_packet_sent(space, packet, now);
        self.spaces[space_idx].needs_ack = false;

        // the send unit is now in flight under this packet number
        if let Some((stream_id, offset)) = stream_ref {
            if let Some(buf) = self
                .streams
                .get_mut(&stream_id)
                .and_then(|s| s.send.find_mut(offset))
            {
                buf.state = SendState::Inflight;
                buf.last_packet_number = Some(nr);
                buf.tx_count += 1;
            }
        }

        trace!(cid = %self.cid, nr, space = space_idx, len = payload.len(), "tx packet");
        Some(Datagram {
            peer: self.peer,
            payload,
        })
    }

    /// Encodes the server's version-negotiation response: a VNeg header
    /// echoing the version the client tried, carrying our version list.
    /// Not recorded for recovery; it consumes no packet number.
    fn encode_vneg(&self) -> Datagram {
        let mut buf = Vec::with_capacity(32);
        wire::encode_long_header(
            &mut buf,
            wire::F_LH_TYPE_VNEG,
            self.cid.as_u64(),
            0,
            self.version,
        );
        wire::encode_vneg_payload(&mut buf, wire::SUPPORTED_VERSIONS);
        trace!(cid = %self.cid, "tx version negotiation");
        Datagram {
            peer: self.peer,
            payload: BytesMut::from(&buf[..]),
        }
    }

    fn build_close_packet(&mut self, code: u64, now: Timestamp) -> Option<Datagram> {
        let space_idx = if self.is_established() { 2 } else { 0 };
        if self.spaces[space_idx].abandoned {
            return None;
        }

        let frames = vec![Frame::ConnectionClose { code }];
        let long_type = self.egress_long_type(space_idx);
        let nr = self.spaces[space_idx].next_packet_number();
        let mut buf = Vec::with_capacity(32);
        match long_type {
            Some(packet_type) => wire::encode_long_header(
                &mut buf,
                packet_type,
                self.cid.as_u64(),
                nr as u32,
                self.version,
            ),
            None => wire::encode_short_header(&mut buf, self.cid.as_u64(), nr as u32),
        }
        let header_len = buf.len();
        frame::encode_frames(&frames, &mut buf);

        let mut payload = BytesMut::from(&buf[..]);
        self.tls.seal(&mut payload, header_len);
        Some(Datagram {
            peer: self.peer,
            payload,
        })
    }

    /// The space a stream's data is sent in: handshake-stream flights ride
    /// long headers until the connection is established.
    fn egress_space_for_stream(&self, stream_id: StreamId) -> usize {
        if self.is_established() && !stream_id.is_crypto() {
            return 2;
        }
        if stream_id == StreamId::HANDSHAKE && !self.is_established() {
            match self.role {
                // the client's retries of its hello stay in Initial; its
                // handshake completion moves up a space
                plume_quic_core::endpoint::Type::Client => {
                    if self.state >= State::VersOk {
                        1
                    } else {
                        0
                    }
                }
                plume_quic_core::endpoint::Type::Server => 0,
            }
        } else {
            2
        }
    }

    /// The long-header type for a space, or `None` for short headers
    fn egress_long_type(&self, space_idx: usize) -> Option<u8> {
        let is_client = self.role.is_client();
        match space_idx {
            0 => Some(if is_client {
                wire::F_LH_CLNT_INI
            } else {
                wire::F_LH_SERV_CTXT
            }),
            1 => Some(if is_client {
                wire::F_LH_CLNT_CTXT
            } else {
                wire::F_LH_SERV_HSHK
            }),
            _ => None,
        }
    }

    /// The space a bare probe goes out in: the earliest one still waiting
    /// on an acknowledgement
    fn probe_space(&self) -> usize {
        for (idx, space) in self.spaces.iter().enumerate() {
            if !space.abandoned && space.sent.values().any(|m| m.ack_eliciting) {
                return idx;
            }
        }
        if self.is_established() {
            2
        } else {
            0
        }
    }
}
