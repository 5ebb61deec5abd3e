// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Packet-header field accessors and wire constants
//!
//! The header layout is the fixed early-draft shape: a long header is
//! `flags(1) | connection id(8) | packet number(4) | version(4)`, a short
//! header is `flags(1) | [connection id(8)] | packet number(4)`. All
//! accessors are length-checked; the framing of the protected payload
//! lives in [`crate::frame`].

use byteorder::{BigEndian, ByteOrder};
use core::fmt;

pub type Version = u32;

/// Smallest UDP payload a client's first flight may use
pub const MIN_INI_LEN: usize = 1200;

/// Largest datagram the endpoint accepts
pub const MAX_PKT_LEN: usize = 1472;

/// Long-header flag bit
pub const F_LONG_HDR: u8 = 0x80;

/// Short-header "connection id present" bit
pub const F_SH_CID: u8 = 0x40;

/// Long-header packet types
pub const F_LH_TYPE_VNEG: u8 = 0x01;
pub const F_LH_CLNT_INI: u8 = 0x02;
pub const F_LH_SERV_CTXT: u8 = 0x04;
pub const F_LH_CLNT_CTXT: u8 = 0x05;
pub const F_LH_SERV_HSHK: u8 = 0x06;

/// Versions this endpoint speaks, most preferred first. A client offers
/// `SUPPORTED_VERSIONS[0]` and scans this list in order when picking from
/// a server's version-negotiation response.
pub const SUPPORTED_VERSIONS: &[Version] = &[0xff00_0016, 0xff00_0014];

const LONG_HDR_LEN: usize = 1 + 8 + 4 + 4;
const SHORT_HDR_CID_LEN: usize = 1 + 8 + 4;
const SHORT_HDR_LEN: usize = 1 + 4;

/// A malformed or truncated packet header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Malformed;

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "malformed packet header")
    }
}

impl std::error::Error for Malformed {}

//= https://www.rfc-editor.org/rfc/rfc9000#section-6.3
//# Endpoints MUST ignore QUIC versions in a Version Negotiation packet
//# that have the pattern 0x?a?a?a?a.

/// Returns `true` for versions reserved to force version negotiation.
/// A server MUST reject these to keep the negotiation path exercised.
#[inline]
pub const fn is_force_negotiation(version: Version) -> bool {
    version & 0x0f0f_0f0f == 0x0a0a_0a0a
}

/// Returns `true` if the server is willing to speak `version`
#[inline]
pub fn is_supported(version: Version) -> bool {
    if is_force_negotiation(version) {
        return false;
    }
    SUPPORTED_VERSIONS.contains(&version)
}

/// The first byte of the packet
#[inline]
pub fn flags(buf: &[u8]) -> Result<u8, Malformed> {
    buf.first().copied().ok_or(Malformed)
}

/// Returns `true` if the packet has a long header
#[inline]
pub fn is_long(flags: u8) -> bool {
    flags & F_LONG_HDR != 0
}

/// The long-header packet type
#[inline]
pub fn long_type(flags: u8) -> u8 {
    flags & !F_LONG_HDR
}

/// Returns `true` if the header carries a connection id
#[inline]
pub fn has_cid(flags: u8) -> bool {
    is_long(flags) || flags & F_SH_CID != 0
}

/// The length of the packet header implied by its first byte
pub fn header_len(buf: &[u8]) -> Result<usize, Malformed> {
    let flags = flags(buf)?;
    let len = if is_long(flags) {
        LONG_HDR_LEN
    } else if flags & F_SH_CID != 0 {
        SHORT_HDR_CID_LEN
    } else {
        SHORT_HDR_LEN
    };

    if buf.len() < len {
        return Err(Malformed);
    }
    Ok(len)
}

/// The connection id, for headers that carry one
pub fn cid(buf: &[u8]) -> Result<u64, Malformed> {
    let flags = flags(buf)?;
    if !has_cid(flags) || buf.len() < 9 {
        return Err(Malformed);
    }
    Ok(BigEndian::read_u64(&buf[1..9]))
}

/// The truncated packet number
pub fn nr(buf: &[u8]) -> Result<u32, Malformed> {
    let flags = flags(buf)?;
    let at = if is_long(flags) || flags & F_SH_CID != 0 {
        9
    } else {
        1
    };
    if buf.len() < at + 4 {
        return Err(Malformed);
    }
    Ok(BigEndian::read_u32(&buf[at..at + 4]))
}

/// The version field of a long header
pub fn vers(buf: &[u8]) -> Result<Version, Malformed> {
    let flags = flags(buf)?;
    if !is_long(flags) || buf.len() < LONG_HDR_LEN {
        return Err(Malformed);
    }
    Ok(BigEndian::read_u32(&buf[13..17]))
}

/// Appends a long header to `buf`
pub fn encode_long_header(buf: &mut Vec<u8>, packet_type: u8, cid: u64, nr: u32, vers: Version) {
    debug_assert!(packet_type & F_LONG_HDR == 0);
    buf.push(F_LONG_HDR | packet_type);
    buf.extend_from_slice(&cid.to_be_bytes());
    buf.extend_from_slice(&nr.to_be_bytes());
    buf.extend_from_slice(&vers.to_be_bytes());
}

/// Appends a short header (with connection id) to `buf`
pub fn encode_short_header(buf: &mut Vec<u8>, cid: u64, nr: u32) {
    buf.push(F_SH_CID);
    buf.extend_from_slice(&cid.to_be_bytes());
    buf.extend_from_slice(&nr.to_be_bytes());
}

/// The version list carried by a version-negotiation packet
pub fn decode_vneg_payload(buf: &[u8]) -> Result<Vec<Version>, Malformed> {
    let header_len = header_len(buf)?;
    let payload = &buf[header_len..];
    if payload.len() % 4 != 0 {
        return Err(Malformed);
    }
    Ok(payload.chunks_exact(4).map(BigEndian::read_u32).collect())
}

/// Appends the server's version list to a version-negotiation packet
pub fn encode_vneg_payload(buf: &mut Vec<u8>, versions: &[Version]) {
    for version in versions {
        buf.extend_from_slice(&version.to_be_bytes());
    }
}
