// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The 64-bit connection id used as a routing key

use core::fmt;
use plume_quic_core::random;

/// Uniquely identifies a QUIC connection between two peers.
///
/// Chosen by the server once it accepts the client's version; random so
/// that off-path parties cannot guess routing keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Draws a fresh random id
    pub fn generate<R: random::Generator>(random: &mut R) -> Self {
        Self(random.gen_u64())
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_differ() {
        let mut random = random::testing::Generator::default();
        let a = Id::generate(&mut random);
        let b = Id::generate(&mut random);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_fixed_width_hex() {
        assert_eq!(format!("{}", Id::new(0xab)), "00000000000000ab");
    }
}
