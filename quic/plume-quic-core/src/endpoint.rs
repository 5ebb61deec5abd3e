// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// The role of an endpoint in a connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// The connection was initiated locally
    Client,
    /// The connection was accepted from a peer
    Server,
}

impl Type {
    /// Returns `true` if the endpoint is a QUIC client
    #[inline]
    pub fn is_client(self) -> bool {
        matches!(self, Self::Client)
    }

    /// Returns `true` if the endpoint is a QUIC server
    #[inline]
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// Returns the peer's role
    #[inline]
    pub fn peer_type(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }
}
