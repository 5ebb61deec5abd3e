// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The handshake and packet-protection interface consumed by the endpoint
//!
//! The actual key schedule, transcript and AEAD live outside this crate.
//! The connection only needs to feed stream-0 bytes through the handshake,
//! unprotect incoming payloads and protect outgoing ones.

use bytes::BytesMut;
use core::fmt;
use plume_quic_core::endpoint;

/// A fatal handshake failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeError(pub &'static str);

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "handshake failure: {}", self.0)
    }
}

impl std::error::Error for HandshakeError {}

/// Creates handshake sessions for new connections
pub trait Provider {
    type Session: Session;

    fn new_session(&mut self, role: endpoint::Type) -> Self::Session;
}

/// The per-connection handshake context.
pub trait Session {
    /// Discards all handshake state, as on a version-negotiation retry
    fn reset(&mut self);

    /// Advances the handshake, consuming inbound stream-0 bytes and
    /// producing outbound ones.
    ///
    /// The client's first call (with no input) produces the ClientHello.
    fn handshake(&mut self, input: &[u8]) -> Result<Vec<u8>, HandshakeError>;

    /// Removes packet protection in place and returns the unprotected
    /// length, or `None` if authentication failed.
    fn open(&mut self, payload: &mut BytesMut, header_len: usize) -> Option<usize>;

    /// Applies packet protection in place
    fn seal(&mut self, payload: &mut BytesMut, header_len: usize);

    /// Returns `true` once application (1-RTT) keys are installed.
    ///
    /// Until then, a probe timeout sends a single anti-deadlock probe
    /// instead of two.
    fn has_application_keys(&self) -> bool;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    /// Null-cipher provider: packets are not transformed, the handshake is
    /// a scripted two-flight exchange.
    #[derive(Debug, Default)]
    pub struct Provider;

    impl super::Provider for Provider {
        type Session = Session;

        fn new_session(&mut self, role: endpoint::Type) -> Session {
            Session {
                role,
                hello_sent: false,
                app_keys: false,
                open_failures: 0,
            }
        }
    }

    pub const CLIENT_HELLO: &[u8] = b"ClientHello";
    pub const SERVER_HELLO: &[u8] = b"ServerHello";
    pub const FINISHED: &[u8] = b"Finished";

    #[derive(Debug)]
    pub struct Session {
        role: endpoint::Type,
        hello_sent: bool,
        app_keys: bool,
        /// Number of upcoming `open` calls to fail, simulating AEAD damage
        pub open_failures: u32,
    }

    impl super::Session for Session {
        fn reset(&mut self) {
            self.hello_sent = false;
            self.app_keys = false;
        }

        fn handshake(&mut self, input: &[u8]) -> Result<Vec<u8>, HandshakeError> {
            match self.role {
                endpoint::Type::Client => {
                    if !self.hello_sent {
                        self.hello_sent = true;
                        return Ok(CLIENT_HELLO.to_vec());
                    }
                    if contains(input, SERVER_HELLO) && !self.app_keys {
                        self.app_keys = true;
                        return Ok(FINISHED.to_vec());
                    }
                    Ok(Vec::new())
                }
                endpoint::Type::Server => {
                    if contains(input, CLIENT_HELLO) && !self.hello_sent {
                        self.hello_sent = true;
                        return Ok(SERVER_HELLO.to_vec());
                    }
                    if contains(input, FINISHED) {
                        self.app_keys = true;
                    }
                    Ok(Vec::new())
                }
            }
        }

        fn open(&mut self, payload: &mut BytesMut, header_len: usize) -> Option<usize> {
            debug_assert!(header_len <= payload.len());
            if self.open_failures > 0 {
                self.open_failures -= 1;
                return None;
            }
            Some(payload.len())
        }

        fn seal(&mut self, _payload: &mut BytesMut, _header_len: usize) {}

        fn has_application_keys(&self) -> bool {
            self.app_keys
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn scripted_exchange() {
        use super::{Provider as _, Session as _};

        let mut provider = Provider;
        let mut client = provider.new_session(endpoint::Type::Client);
        let mut server = provider.new_session(endpoint::Type::Server);

        let ch = client.handshake(&[]).unwrap();
        assert_eq!(ch, CLIENT_HELLO);

        let sh = server.handshake(&ch).unwrap();
        assert_eq!(sh, SERVER_HELLO);
        assert!(!server.has_application_keys());

        let fin = client.handshake(&sh).unwrap();
        assert_eq!(fin, FINISHED);
        assert!(client.has_application_keys());

        assert!(server.handshake(&fin).unwrap().is_empty());
        assert!(server.has_application_keys());

        // a reset replays the exchange from the top
        client.reset();
        assert_eq!(client.handshake(&[]).unwrap(), CLIENT_HELLO);
    }
}
