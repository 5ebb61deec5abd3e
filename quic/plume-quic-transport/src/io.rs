// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The datagram socket interface consumed by the endpoint

use bytes::BytesMut;
use core::fmt;
use std::net::Ipv4Addr;

/// A peer's address tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl PeerAddr {
    /// The placeholder address of a server connection waiting in accept,
    /// before it is bound to a real peer.
    pub const UNBOUND: Self = Self {
        ip: Ipv4Addr::UNSPECIFIED,
        port: 0,
    };

    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Returns `true` if this is the accept placeholder
    #[inline]
    pub fn is_unbound(&self) -> bool {
        *self == Self::UNBOUND
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A single UDP datagram
#[derive(Clone, Debug)]
pub struct Datagram {
    pub peer: PeerAddr,
    pub payload: BytesMut,
}

/// The datagram socket the endpoint sends and receives through.
///
/// Implementations are expected to be non-blocking: `poll_rx` drains
/// whatever has arrived and returns, and `tx` hands the chain to the
/// network without waiting.
pub trait Socket {
    /// Drains all pending datagrams from the socket
    fn poll_rx(&mut self) -> Vec<Datagram>;

    /// Sends a chain of datagrams
    fn tx(&mut self, chain: Vec<Datagram>);

    /// Returns the payload ceiling for the socket's address family
    fn max_udp_payload(&self) -> u16;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::{Datagram, PeerAddr, Socket};
    use std::{cell::RefCell, collections::VecDeque, net::Ipv4Addr, rc::Rc};

    type Queue = Rc<RefCell<VecDeque<Datagram>>>;

    /// One end of an in-memory datagram pipe.
    #[derive(Clone)]
    pub struct Pipe {
        addr: PeerAddr,
        rx: Queue,
        tx: Queue,
        /// Number of outgoing datagrams to silently discard
        drop_next: Rc<RefCell<usize>>,
    }

    impl Pipe {
        /// Creates a connected pair of sockets
        pub fn pair() -> (Pipe, Pipe) {
            let a_to_b: Queue = Default::default();
            let b_to_a: Queue = Default::default();

            let a = Pipe {
                addr: PeerAddr::new(Ipv4Addr::new(10, 0, 0, 1), 4433),
                rx: b_to_a.clone(),
                tx: a_to_b.clone(),
                drop_next: Default::default(),
            };
            let b = Pipe {
                addr: PeerAddr::new(Ipv4Addr::new(10, 0, 0, 2), 4434),
                rx: a_to_b,
                tx: b_to_a,
                drop_next: Default::default(),
            };
            (a, b)
        }

        /// The address this end appears as to its peer
        pub fn local_addr(&self) -> PeerAddr {
            self.addr
        }

        /// Discards the next `n` outgoing datagrams, simulating loss
        pub fn drop_next(&self, n: usize) {
            *self.drop_next.borrow_mut() += n;
        }

        /// Returns the number of datagrams waiting to be received
        pub fn pending_rx(&self) -> usize {
            self.rx.borrow().len()
        }
    }

    impl Socket for Pipe {
        fn poll_rx(&mut self) -> Vec<Datagram> {
            self.rx.borrow_mut().drain(..).collect()
        }

        fn tx(&mut self, chain: Vec<Datagram>) {
            let mut tx = self.tx.borrow_mut();
            for mut datagram in chain {
                if *self.drop_next.borrow() > 0 {
                    *self.drop_next.borrow_mut() -= 1;
                    continue;
                }
                // the receiver sees the sender's address
                datagram.peer = self.addr;
                tx.push_back(datagram);
            }
        }

        fn max_udp_payload(&self) -> u16 {
            1472
        }
    }

    #[test]
    fn pipe_delivers_in_order() {
        let (mut a, mut b) = Pipe::pair();

        let datagram = |byte: u8| Datagram {
            peer: b.local_addr(),
            payload: bytes::BytesMut::from(&[byte][..]),
        };

        a.tx(vec![datagram(1), datagram(2)]);
        let received = b.poll_rx();
        assert_eq!(received.len(), 2);
        assert_eq!(&received[0].payload[..], &[1]);
        assert_eq!(&received[1].payload[..], &[2]);
        // sender address is stamped on delivery
        assert_eq!(received[0].peer, a.local_addr());
        assert!(b.poll_rx().is_empty());
    }

    #[test]
    fn pipe_drops_on_request() {
        let (mut a, mut b) = Pipe::pair();
        a.drop_next(1);

        let datagram = Datagram {
            peer: b.local_addr(),
            payload: bytes::BytesMut::from(&[7][..]),
        };
        a.tx(vec![datagram.clone(), datagram]);
        assert_eq!(b.poll_rx().len(), 1);
    }
}
