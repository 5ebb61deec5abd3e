// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per packet-number-space state: the sent-packet registry, received
//! packet numbers and acknowledgement bookkeeping

use crate::stream::StreamId;
use plume_quic_core::{
    frame::KindSet,
    interval_set::IntervalSet,
    packet::number::PacketNumberSpace,
    time::Timestamp,
};
use std::collections::BTreeMap;

/// Metadata for one transmitted packet.
///
/// Every transmission is first-class: a retransmission gets its own entry
/// under its own packet number, linked to its predecessor through
/// `retransmission_of`. Entries are removed from the registry the moment
/// they are acknowledged or declared lost, so everything in the registry
/// is outstanding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentPacket {
    pub nr: u64,
    pub time_sent: Timestamp,
    /// UDP payload length
    pub udp_len: u16,
    pub is_long: bool,
    /// The frame kinds this packet carried
    pub frames: KindSet,
    pub ack_eliciting: bool,
    /// Counts against the congestion window
    pub in_flight: bool,
    /// The send unit (stream and buffer offset) this packet carried
    pub stream: Option<(StreamId, u64)>,
    pub is_fin: bool,
    /// The ranges covered by the ACK frame in this packet, if any; used
    /// to stop acknowledging them once this packet is itself acknowledged
    pub acked_ranges: Option<Vec<(u64, u64)>>,
    /// Packet number of the retransmission of this packet, if any
    pub retransmission: Option<u64>,
    /// Packet number of the transmission this one repeats, if any
    pub retransmission_of: Option<u64>,
}

impl SentPacket {
    #[inline]
    pub fn has_retransmission(&self) -> bool {
        self.retransmission.is_some()
    }

    #[inline]
    pub fn is_retransmission(&self) -> bool {
        self.retransmission_of.is_some()
    }
}

/// The state of one packet-number space.
#[derive(Debug)]
pub struct PacketSpace {
    pub space: PacketNumberSpace,
    /// Outstanding packets, ordered by packet number
    pub sent: BTreeMap<u64, SentPacket>,
    /// Packet numbers received from the peer; source of ACK frames
    pub recv: IntervalSet,
    /// Packet numbers of our packets the peer acknowledged or we declared
    /// lost
    pub acked_or_lost: IntervalSet,
    /// Largest of our packet numbers the peer has acknowledged
    pub largest_acked: Option<u64>,
    /// When the earliest outstanding packet will be declared lost
    pub loss_time: Option<Timestamp>,
    /// When the latest ack-eliciting packet was transmitted
    pub last_ae_tx_time: Option<Timestamp>,
    next_packet_number: u64,
    /// Frame kinds received in this space
    pub rx_frames: KindSet,
    /// An ack-eliciting packet arrived and has not been acknowledged yet
    pub needs_ack: bool,
    /// An abandoned space sends and accepts no further traffic
    pub abandoned: bool,
}

impl PacketSpace {
    pub fn new(space: PacketNumberSpace) -> Self {
        Self {
            space,
            sent: BTreeMap::new(),
            recv: IntervalSet::new(),
            acked_or_lost: IntervalSet::new(),
            largest_acked: None,
            loss_time: None,
            last_ae_tx_time: None,
            next_packet_number: 0,
            rx_frames: KindSet::new(),
            needs_ack: false,
            abandoned: false,
        }
    }

    /// Allocates the next outgoing packet number
    #[inline]
    pub fn next_packet_number(&mut self) -> u64 {
        let nr = self.next_packet_number;
        self.next_packet_number += 1;
        nr
    }

    /// The packet number the peer is expected to send next; the anchor
    /// for truncated packet-number expansion
    #[inline]
    pub fn expected_packet_number(&self) -> u64 {
        self.recv.max().map_or(0, |max| max + 1)
    }

    /// Ack-eliciting in-flight packets outstanding in this space
    pub fn ack_eliciting_outstanding(&self) -> usize {
        self.sent.values().filter(|m| m.ack_eliciting).count()
    }

    /// Drops all per-space state. The in-flight accounting of any
    /// outstanding packets must be released by the caller first.
    pub fn abandon(&mut self) {
        self.sent.clear();
        self.recv.clear();
        self.acked_or_lost.clear();
        self.largest_acked = None;
        self.loss_time = None;
        self.last_ae_tx_time = None;
        self.rx_frames = KindSet::new();
        self.needs_ack = false;
        self.abandoned = true;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use plume_quic_core::frame::Kind;

    /// A 1200-byte ack-eliciting in-flight packet
    pub(crate) fn sent_packet(nr: u64, time_sent: Timestamp) -> SentPacket {
        SentPacket {
            nr,
            time_sent,
            udp_len: 1200,
            is_long: false,
            frames: KindSet::of(&[Kind::Stream, Kind::Ack]),
            ack_eliciting: true,
            in_flight: true,
            stream: None,
            is_fin: false,
            acked_ranges: None,
            retransmission: None,
            retransmission_of: None,
        }
    }
}
