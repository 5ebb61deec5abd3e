// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Stream state, outbound send units and inbound reassembly
//!
//! A stream's outbound side is a queue of send buffers. Each buffer is
//! one logical send unit: it is encoded into exactly one packet per
//! transmission and marked acknowledged exactly once, however many times
//! it was retransmitted. `out_una` points at the first buffer that has
//! not been acknowledged yet; everything before it is acknowledged.

use bytes::Bytes;
use core::fmt;
use std::collections::{BTreeMap, VecDeque};

/// A stream identifier. Negative ids are crypto streams; id 0 is the
/// legacy handshake stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(i64);

impl StreamId {
    pub const HANDSHAKE: Self = Self(0);

    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` for the handshake and crypto streams, whose
    /// buffers are released as soon as they are acknowledged
    #[inline]
    pub fn is_crypto(self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream lifecycle states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// Transmission state of one send buffer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendState {
    /// Never transmitted
    #[default]
    Unsent,
    /// Transmitted, neither acknowledged nor declared lost
    Inflight,
    /// Declared lost; eligible for retransmission in the next pass
    Lost,
    /// Acknowledged
    Acked,
}

impl SendState {
    /// Whether a buffer in this state belongs in a transmission pass. A
    /// fresh pass carries unsent and lost buffers; a retransmission pass
    /// repeats in-flight ones (and lost ones, so probes can carry them).
    #[inline]
    pub fn eligible(self, rtx: bool) -> bool {
        match self {
            Self::Acked => false,
            Self::Unsent => !rtx,
            Self::Inflight => rtx,
            Self::Lost => true,
        }
    }
}

/// One outbound send unit
#[derive(Clone, Debug)]
pub struct SendBuffer {
    pub offset: u64,
    pub data: Bytes,
    pub fin: bool,
    pub state: SendState,
    /// Packet number of the latest transmission
    pub last_packet_number: Option<u64>,
    pub tx_count: u32,
}

#[derive(Debug, Default)]
pub struct SendQueue {
    buffers: VecDeque<SendBuffer>,
    /// Index of the first un-acknowledged buffer
    out_una: usize,
    next_offset: u64,
}

impl SendQueue {
    /// Appends a send unit carrying `data`
    pub fn write(&mut self, data: Bytes, fin: bool) {
        let offset = self.next_offset;
        self.next_offset += data.len() as u64;
        self.buffers.push_back(SendBuffer {
            offset,
            data,
            fin,
            state: SendState::Unsent,
            last_packet_number: None,
            tx_count: 0,
        });
    }

    /// Returns `true` if any buffer still awaits acknowledgement
    #[inline]
    pub fn has_unacked(&self) -> bool {
        self.out_una < self.buffers.len()
    }

    /// Finds the buffer at `offset`, preferring one still awaiting
    /// acknowledgement (a zero-payload probe can share its offset with
    /// the data buffer written after it)
    pub fn find_mut(&mut self, offset: u64) -> Option<&mut SendBuffer> {
        let idx = self.find_index(offset)?;
        self.buffers.get_mut(idx)
    }

    /// Finds the buffer at `offset`
    pub fn find(&self, offset: u64) -> Option<&SendBuffer> {
        let idx = self.find_index(offset)?;
        self.buffers.get(idx)
    }

    fn find_index(&self, offset: u64) -> Option<usize> {
        let mut found = None;
        for (idx, buf) in self.buffers.iter().enumerate() {
            if buf.offset == offset {
                found = Some(idx);
                if buf.state != SendState::Acked {
                    break;
                }
            }
        }
        found
    }

    /// Iterates the buffers eligible for a transmission pass
    pub fn iter_ready(&self, rtx: bool) -> impl Iterator<Item = &SendBuffer> {
        self.buffers
            .iter()
            .skip(self.out_una)
            .filter(move |buf| buf.state.eligible(rtx))
    }

    /// Advances `out_una` over contiguously acknowledged buffers
    pub fn advance_una(&mut self) {
        while self
            .buffers
            .get(self.out_una)
            .is_some_and(|buf| buf.state == SendState::Acked)
        {
            self.out_una += 1;
        }
    }

    /// Drops acknowledged buffers from the queue front (crypto streams
    /// only; their payload is not needed once acknowledged)
    pub fn release_acked_front(&mut self) {
        while self
            .buffers
            .front()
            .is_some_and(|buf| buf.state == SendState::Acked)
        {
            self.buffers.pop_front();
            self.out_una = self.out_una.saturating_sub(1);
        }
    }

    /// Drops every buffer, sent or not. Used when a version-negotiation
    /// retry discards the outbound handshake flight.
    pub fn truncate(&mut self) {
        self.buffers.clear();
        self.out_una = 0;
        self.next_offset = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// The invariant behind `out_una`: all earlier buffers acknowledged,
    /// the buffer at `out_una` (if any) not.
    #[cfg(test)]
    fn check_una(&self) {
        for buf in self.buffers.iter().take(self.out_una) {
            assert_eq!(buf.state, SendState::Acked);
        }
        if let Some(buf) = self.buffers.get(self.out_una) {
            assert_ne!(buf.state, SendState::Acked);
        }
    }
}

/// Inbound reassembly buffer
#[derive(Debug, Default)]
pub struct RecvBuffer {
    segments: BTreeMap<u64, Bytes>,
    read_offset: u64,
    fin_offset: Option<u64>,
}

impl RecvBuffer {
    /// Stores a segment; exact duplicates are dropped
    pub fn insert(&mut self, offset: u64, data: Bytes, fin: bool) {
        if fin {
            self.fin_offset = Some(offset + data.len() as u64);
        }
        if offset >= self.read_offset && !data.is_empty() {
            self.segments.entry(offset).or_insert(data);
        }
    }

    /// Pops the next contiguous chunk, if any
    pub fn read(&mut self) -> Option<Bytes> {
        let (&offset, _) = self.segments.first_key_value()?;
        if offset > self.read_offset {
            return None;
        }
        let (offset, data) = self.segments.pop_first()?;
        // tolerate overlap with already-read data
        let skip = (self.read_offset - offset) as usize;
        if skip >= data.len() {
            return self.read();
        }
        let data = data.slice(skip..);
        self.read_offset += data.len() as u64;
        Some(data)
    }

    /// Drains everything contiguous into one buffer
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Returns `true` once the peer's FIN offset has been fully read
    pub fn is_finished(&self) -> bool {
        self.fin_offset == Some(self.read_offset)
    }

    #[inline]
    pub fn read_offset(&self) -> u64 {
        self.read_offset
    }
}

/// A bidirectional stream
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    state: State,
    pub send: SendQueue,
    pub recv: RecvBuffer,
    /// A control frame concerning this stream must be re-emitted
    pub need_ctrl: bool,
    /// A FIN has been handed to the send queue
    pub fin_queued: bool,
    pub lost_count: u64,
}

impl Stream {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            state: State::Open,
            send: SendQueue::default(),
            recv: RecvBuffer::default(),
            need_ctrl: false,
            fin_queued: false,
            lost_count: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Called when the peer's FIN is received
    pub fn on_peer_fin(&mut self) {
        self.state = match self.state {
            State::Open => State::HalfClosedRemote,
            State::HalfClosedLocal => State::Closed,
            other => other,
        };
    }

    /// Called when our FIN is acknowledged
    pub fn on_fin_acked(&mut self) {
        self.state = match self.state {
            State::Open => State::HalfClosedLocal,
            State::HalfClosedRemote => State::Closed,
            other => other,
        };
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn una_advances_over_contiguous_acks() {
        let mut queue = SendQueue::default();
        queue.write(data("aa"), false);
        queue.write(data("bb"), false);
        queue.write(data("cc"), false);

        // ack the middle buffer first: una must not move
        queue.find_mut(2).unwrap().state = SendState::Acked;
        queue.advance_una();
        assert_eq!(queue.out_una, 0);
        queue.check_una();

        queue.find_mut(0).unwrap().state = SendState::Acked;
        queue.advance_una();
        assert_eq!(queue.out_una, 2);
        queue.check_una();

        queue.find_mut(4).unwrap().state = SendState::Acked;
        queue.advance_una();
        assert_eq!(queue.out_una, 3);
        assert!(!queue.has_unacked());
    }

    #[test]
    fn offsets_accumulate() {
        let mut queue = SendQueue::default();
        queue.write(data("12345"), false);
        queue.write(data("678"), true);

        let offsets: Vec<u64> = queue.buffers.iter().map(|b| b.offset).collect();
        assert_eq!(offsets, [0, 5]);
        assert!(queue.buffers[1].fin);
    }

    #[test]
    fn release_front_keeps_una_consistent() {
        let mut queue = SendQueue::default();
        queue.write(data("aa"), false);
        queue.write(data("bb"), false);
        queue.find_mut(0).unwrap().state = SendState::Acked;
        queue.advance_una();
        assert_eq!(queue.out_una, 1);

        queue.release_acked_front();
        assert_eq!(queue.out_una, 0);
        assert_eq!(queue.len(), 1);
        queue.check_una();
    }

    #[test]
    fn reassembly_orders_segments() {
        let mut recv = RecvBuffer::default();
        recv.insert(5, data("world"), true);
        assert_eq!(recv.read(), None);

        recv.insert(0, data("hello"), false);
        assert_eq!(recv.drain(), b"helloworld");
        assert!(recv.is_finished());

        // duplicate delivery is ignored
        recv.insert(5, data("world"), true);
        assert_eq!(recv.read(), None);
    }

    #[test]
    fn fin_ack_transitions() {
        let mut stream = Stream::new(StreamId::new(4));
        assert_eq!(stream.state(), State::Open);

        stream.on_fin_acked();
        assert_eq!(stream.state(), State::HalfClosedLocal);

        stream.on_peer_fin();
        assert_eq!(stream.state(), State::Closed);

        // and the mirrored order
        let mut stream = Stream::new(StreamId::new(8));
        stream.on_peer_fin();
        assert_eq!(stream.state(), State::HalfClosedRemote);
        stream.on_fin_acked();
        assert_eq!(stream.state(), State::Closed);
    }
}
