// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The connection and endpoint machinery of a QUIC endpoint: packet
//! ingress/egress, the handshake state machine, streams, and loss
//! recovery.
//!
//! The cryptographic record layer, the UDP sockets and the event loop are
//! external collaborators, consumed through the traits in [`tls`] and
//! [`io`].

#![forbid(unsafe_code)]

pub mod connection;
pub mod endpoint;
pub mod frame;
pub mod io;
pub mod recovery;
pub mod space;
pub mod stream;
pub mod tls;
pub mod wire;
