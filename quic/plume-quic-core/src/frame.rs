// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frame kinds and the per-packet kind bitset
//!
//! Recovery does not need decoded frames, only which kinds a packet
//! carried: whether it elicits an ACK, and which control frames must be
//! re-emitted if the packet is lost.

use core::fmt;

/// The kinds of frame a packet can carry.
///
/// Tags double as bit positions in [`KindSet`], so they must stay below 32.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Padding = 0x00,
    Ping = 0x01,
    Ack = 0x02,
    ResetStream = 0x04,
    StopSending = 0x05,
    NewToken = 0x07,
    Stream = 0x08,
    MaxData = 0x10,
    MaxStreamData = 0x11,
    MaxStreams = 0x12,
    DataBlocked = 0x14,
    StreamDataBlocked = 0x15,
    StreamsBlocked = 0x16,
    NewConnectionId = 0x18,
    RetireConnectionId = 0x19,
    ConnectionClose = 0x1c,
    HandshakeDone = 0x1e,
}

impl Kind {
    /// Returns `true` if a packet carrying this kind requires the peer to
    /// respond with an ACK
    #[inline]
    pub fn is_ack_eliciting(self) -> bool {
        !matches!(self, Kind::Ack | Kind::Padding | Kind::ConnectionClose)
    }
}

/// A set of [`Kind`]s, stored as a bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u32);

impl KindSet {
    /// Control frames that are re-emitted when the packet carrying them is
    /// declared lost.
    pub const RETRANSMITTABLE_CONTROL: Self = Self::of(&[
        Kind::ResetStream,
        Kind::StopSending,
        Kind::NewToken,
        Kind::DataBlocked,
        Kind::StreamDataBlocked,
        Kind::NewConnectionId,
        Kind::RetireConnectionId,
        Kind::HandshakeDone,
    ]);

    /// Creates an empty set
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a set from a list of kinds
    #[inline]
    pub const fn of(kinds: &[Kind]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1 << kinds[i] as u8;
            i += 1;
        }
        Self(bits)
    }

    /// Adds `kind` to the set
    #[inline]
    pub fn insert(&mut self, kind: Kind) {
        self.0 |= 1 << kind as u8;
    }

    /// Returns `true` if `kind` is in the set
    #[inline]
    pub const fn contains(self, kind: Kind) -> bool {
        self.0 & (1 << kind as u8) != 0
    }

    /// Returns `true` if any kind is in both sets
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no kinds are set
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if any contained kind elicits an ACK
    #[inline]
    pub fn is_ack_eliciting(self) -> bool {
        const NON_ELICITING: KindSet =
            KindSet::of(&[Kind::Ack, Kind::Padding, Kind::ConnectionClose]);
        self.0 & !NON_ELICITING.0 != 0
    }

    /// Iterates the kinds contained in the set
    pub fn iter(self) -> impl Iterator<Item = Kind> {
        const ALL: [Kind; 17] = [
            Kind::Padding,
            Kind::Ping,
            Kind::Ack,
            Kind::ResetStream,
            Kind::StopSending,
            Kind::NewToken,
            Kind::Stream,
            Kind::MaxData,
            Kind::MaxStreamData,
            Kind::MaxStreams,
            Kind::DataBlocked,
            Kind::StreamDataBlocked,
            Kind::StreamsBlocked,
            Kind::NewConnectionId,
            Kind::RetireConnectionId,
            Kind::ConnectionClose,
            Kind::HandshakeDone,
        ];
        ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Kind> for KindSet {
    fn from_iter<I: IntoIterator<Item = Kind>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}
