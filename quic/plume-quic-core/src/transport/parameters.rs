// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection transport parameters
//!
//! Values advertised to (and learned from) the peer. The defaults are the
//! initial values in effect before the peer's parameters arrive.

use core::time::Duration;

/// The flow-control and timing parameters of one side of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportParameters {
    /// Idle interval after which the connection is closed
    pub max_idle_timeout: Duration,
    /// Connection-level flow control credit
    pub initial_max_data: u64,
    /// Per-stream flow control credit
    pub initial_max_stream_data: u64,
    /// Highest stream id the peer may open
    pub initial_max_stream_id: u64,
    /// The longest the peer intends to delay an acknowledgement
    pub max_ack_delay: Duration,
    /// Largest UDP payload the path is assumed to carry
    pub max_udp_payload: u16,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            max_idle_timeout: Duration::from_secs(10),
            initial_max_data: 0xFFFF,
            initial_max_stream_data: 0x1000,
            initial_max_stream_id: 0xFF,
            max_ack_delay: Duration::from_millis(25),
            max_udp_payload: 1472,
        }
    }
}
