// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The two routing indexes over live connections
//!
//! Connections are owned by the endpoint's arena; both indexes store
//! arena handles only. Rekeying is remove-then-insert; keys are never
//! mutated in place.

use crate::{connection::Id, io::PeerAddr};
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// A stable index into the endpoint's connection arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) usize);

/// Keys order on address bytes first, then port, then the client flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PeerKey {
    addr: [u8; 4],
    port: u16,
    is_client: bool,
}

impl PeerKey {
    fn new(peer: PeerAddr, is_client: bool) -> Self {
        Self {
            addr: peer.ip.octets(),
            port: peer.port,
            is_client,
        }
    }
}

/// An insert collided with a live key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuplicateKey;

#[derive(Debug, Default)]
pub struct Table {
    by_peer: BTreeMap<PeerKey, Handle>,
    by_cid: HashMap<(Id, bool), Handle>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_peer(
        &mut self,
        peer: PeerAddr,
        is_client: bool,
        handle: Handle,
    ) -> Result<(), DuplicateKey> {
        let key = PeerKey::new(peer, is_client);
        if self.by_peer.contains_key(&key) {
            return Err(DuplicateKey);
        }
        self.by_peer.insert(key, handle);
        Ok(())
    }

    pub fn remove_peer(&mut self, peer: PeerAddr, is_client: bool) -> Option<Handle> {
        self.by_peer.remove(&PeerKey::new(peer, is_client))
    }

    pub fn lookup_peer(&self, peer: PeerAddr, is_client: bool) -> Option<Handle> {
        self.by_peer.get(&PeerKey::new(peer, is_client)).copied()
    }

    pub fn insert_cid(
        &mut self,
        cid: Id,
        is_client: bool,
        handle: Handle,
    ) -> Result<(), DuplicateKey> {
        if self.by_cid.contains_key(&(cid, is_client)) {
            return Err(DuplicateKey);
        }
        self.by_cid.insert((cid, is_client), handle);
        Ok(())
    }

    pub fn remove_cid(&mut self, cid: Id, is_client: bool) -> Option<Handle> {
        self.by_cid.remove(&(cid, is_client))
    }

    pub fn lookup_cid(&self, cid: Id, is_client: bool) -> Option<Handle> {
        self.by_cid.get(&(cid, is_client)).copied()
    }

    /// Looks a connection id up for either role, server connections first
    pub fn lookup_cid_any(&self, cid: Id) -> Option<Handle> {
        self.lookup_cid(cid, false).or_else(|| self.lookup_cid(cid, true))
    }

    /// Looks a peer tuple up for either role, server connections first
    pub fn lookup_peer_any(&self, peer: PeerAddr) -> Option<Handle> {
        self.lookup_peer(peer, false)
            .or_else(|| self.lookup_peer(peer, true))
    }

    /// Drops every index entry pointing at `handle`
    pub fn purge(&mut self, handle: Handle) {
        self.by_peer.retain(|_, h| *h != handle);
        self.by_cid.retain(|_, h| *h != handle);
    }
}
