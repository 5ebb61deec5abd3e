// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Frame encoder/decoder
//!
//! A deliberately small TLV layout; only the frame kinds the pipeline
//! emits are encodable. ACK ranges are carried largest-first as
//! `(range, gap)` pairs, and the decoder's walk must stay in sync with
//! [`Ack::ranges`] reconstruction.

use crate::stream::StreamId;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use core::fmt;
use plume_quic_core::{
    frame::{Kind, KindSet},
    interval_set::IntervalSet,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The payload ended inside a frame
    Truncated,
    /// An unknown frame tag was encountered
    UnknownType(u8),
    /// A structurally invalid frame (inverted ACK range, bad length)
    Invalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated frame"),
            Self::UnknownType(tag) => write!(f, "unknown frame type {tag:#04x}"),
            Self::Invalid => write!(f, "invalid frame"),
        }
    }
}

impl std::error::Error for Error {}

/// An acknowledgement frame.
///
/// `ranges` lists the acknowledged intervals ascending; the largest range
/// always contains `largest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    pub largest: u64,
    pub ack_delay_micros: u64,
    pub ranges: Vec<(u64, u64)>,
}

impl Ack {
    /// Builds an ACK covering everything in `recv`
    pub fn from_interval_set(recv: &IntervalSet, ack_delay_micros: u64) -> Option<Self> {
        let largest = recv.max()?;
        Some(Self {
            largest,
            ack_delay_micros,
            ranges: recv.iter().map(|iv| (iv.lo, iv.hi)).collect(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Padding { len: u16 },
    Ping,
    Ack(Ack),
    Stream {
        id: StreamId,
        offset: u64,
        fin: bool,
        data: Bytes,
    },
    NewToken { token: Bytes },
    ConnectionClose { code: u64 },
    HandshakeDone,
}

impl Frame {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Padding { .. } => Kind::Padding,
            Self::Ping => Kind::Ping,
            Self::Ack(_) => Kind::Ack,
            Self::Stream { .. } => Kind::Stream,
            Self::NewToken { .. } => Kind::NewToken,
            Self::ConnectionClose { .. } => Kind::ConnectionClose,
            Self::HandshakeDone => Kind::HandshakeDone,
        }
    }
}

/// The kinds carried by a list of frames
pub fn kinds(frames: &[Frame]) -> KindSet {
    frames.iter().map(Frame::kind).collect()
}

/// Serializes `frames` onto the end of `buf`
pub fn encode_frames(frames: &[Frame], buf: &mut Vec<u8>) {
    for frame in frames {
        buf.push(frame.kind() as u8);
        match frame {
            Frame::Padding { len } => {
                buf.extend_from_slice(&len.to_be_bytes());
                buf.resize(buf.len() + *len as usize, 0);
            }
            Frame::Ping | Frame::HandshakeDone => {}
            Frame::Ack(ack) => encode_ack(ack, buf),
            Frame::Stream {
                id,
                offset,
                fin,
                data,
            } => {
                buf.extend_from_slice(&(id.as_i64() as u64).to_be_bytes());
                buf.extend_from_slice(&offset.to_be_bytes());
                buf.push(u8::from(*fin));
                buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
                buf.extend_from_slice(data);
            }
            Frame::NewToken { token } => {
                buf.extend_from_slice(&(token.len() as u32).to_be_bytes());
                buf.extend_from_slice(token);
            }
            Frame::ConnectionClose { code } => {
                buf.extend_from_slice(&code.to_be_bytes());
            }
        }
    }
}

fn encode_ack(ack: &Ack, buf: &mut Vec<u8>) {
    debug_assert!(!ack.ranges.is_empty());

    buf.extend_from_slice(&ack.largest.to_be_bytes());
    buf.extend_from_slice(&ack.ack_delay_micros.to_be_bytes());
    let extra = ack.ranges.len().saturating_sub(1) as u32;
    buf.extend_from_slice(&extra.to_be_bytes());

    // walk the ranges largest-first; each subsequent range is located by
    // the gap below the previous range's low end
    let mut prev_lo = None;
    for &(lo, hi) in ack.ranges.iter().rev() {
        if let Some(prev_lo) = prev_lo {
            debug_assert!(hi + 2 <= prev_lo, "adjacent ACK ranges");
            let gap: u64 = prev_lo - hi - 2;
            buf.extend_from_slice(&gap.to_be_bytes());
        }
        let range: u64 = hi - lo;
        buf.extend_from_slice(&range.to_be_bytes());
        prev_lo = Some(lo);
    }
}

/// Parses all frames in `buf`
pub fn decode_frames(buf: &[u8]) -> Result<Vec<Frame>, Error> {
    let mut decoder = Decoder { buf };
    let mut frames = Vec::new();

    while !decoder.is_empty() {
        let tag = decoder.u8()?;
        let frame = match tag {
            t if t == Kind::Padding as u8 => {
                let len = decoder.u16()?;
                decoder.skip(len as usize)?;
                Frame::Padding { len }
            }
            t if t == Kind::Ping as u8 => Frame::Ping,
            t if t == Kind::Ack as u8 => Frame::Ack(decode_ack(&mut decoder)?),
            t if t == Kind::Stream as u8 => {
                let id = StreamId::new(decoder.u64()? as i64);
                let offset = decoder.u64()?;
                let fin = decoder.u8()? != 0;
                let len = decoder.u32()? as usize;
                let data = Bytes::copy_from_slice(decoder.take(len)?);
                Frame::Stream {
                    id,
                    offset,
                    fin,
                    data,
                }
            }
            t if t == Kind::NewToken as u8 => {
                let len = decoder.u32()? as usize;
                let token = Bytes::copy_from_slice(decoder.take(len)?);
                Frame::NewToken { token }
            }
            t if t == Kind::ConnectionClose as u8 => Frame::ConnectionClose {
                code: decoder.u64()?,
            },
            t if t == Kind::HandshakeDone as u8 => Frame::HandshakeDone,
            t => return Err(Error::UnknownType(t)),
        };
        frames.push(frame);
    }

    Ok(frames)
}

// this is the same walk enc_ack writes - keep changes in sync
fn decode_ack(decoder: &mut Decoder) -> Result<Ack, Error> {
    let largest = decoder.u64()?;
    let ack_delay_micros = decoder.u64()?;
    let extra = decoder.u32()?;

    let mut ranges = Vec::with_capacity(extra as usize + 1);
    let mut lg = largest;
    for n in (0..=extra).rev() {
        let range = decoder.u64()?;
        let lo = lg.checked_sub(range).ok_or(Error::Invalid)?;
        ranges.push((lo, lg));
        if n > 0 {
            let gap = decoder.u64()?;
            lg = lo.checked_sub(gap + 2).ok_or(Error::Invalid)?;
        }
    }

    // produced largest-first; the rest of the stack wants ascending
    ranges.reverse();
    Ok(Ack {
        largest,
        ack_delay_micros,
        ranges,
    })
}

struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    #[inline]
    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(Error::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64, Error> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_quic_core::time::Timestamp;

    fn round_trip(frames: Vec<Frame>) {
        let mut buf = Vec::new();
        encode_frames(&frames, &mut buf);
        assert_eq!(decode_frames(&buf).unwrap(), frames);
    }

    #[test]
    fn frame_round_trips() {
        round_trip(vec![Frame::Ping, Frame::HandshakeDone]);
        round_trip(vec![Frame::Padding { len: 37 }]);
        round_trip(vec![Frame::ConnectionClose { code: 7 }]);
        round_trip(vec![Frame::NewToken {
            token: Bytes::from_static(b"tok"),
        }]);
        round_trip(vec![Frame::Stream {
            id: StreamId::new(4),
            offset: 1024,
            fin: true,
            data: Bytes::from_static(b"hello"),
        }]);
    }

    #[test]
    fn ack_round_trips_through_interval_set() {
        let mut recv = IntervalSet::new();
        let t = Timestamp::from_nanos(0);
        recv.insert_range(0, 3, t);
        recv.insert(7, t);
        recv.insert_range(10, 20, t);

        let ack = Ack::from_interval_set(&recv, 250).unwrap();
        assert_eq!(ack.largest, 20);
        round_trip(vec![Frame::Ack(ack.clone())]);

        // reparsing into a set yields an equal set
        let mut buf = Vec::new();
        encode_frames(&[Frame::Ack(ack)], &mut buf);
        let decoded = match &decode_frames(&buf).unwrap()[0] {
            Frame::Ack(ack) => ack.clone(),
            other => panic!("unexpected frame {other:?}"),
        };
        let mut reparsed = IntervalSet::new();
        for (lo, hi) in decoded.ranges {
            reparsed.insert_range(lo, hi, t);
        }
        assert_eq!(format!("{recv}"), format!("{reparsed}"));
    }

    #[test]
    fn empty_set_has_no_ack() {
        assert_eq!(Ack::from_interval_set(&IntervalSet::new(), 0), None);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_frames(&[0xff]), Err(Error::UnknownType(0xff)));
        // stream frame cut short
        let mut buf = Vec::new();
        encode_frames(
            &[Frame::Stream {
                id: StreamId::new(1),
                offset: 0,
                fin: false,
                data: Bytes::from_static(b"abcdef"),
            }],
            &mut buf,
        );
        assert_eq!(decode_frames(&buf[..buf.len() - 3]), Err(Error::Truncated));
    }
}
