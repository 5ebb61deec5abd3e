// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;

pub mod endpoint;
pub mod frame;
#[cfg(any(test, feature = "alloc"))]
pub mod interval_set;
pub mod packet;
pub mod random;
pub mod recovery;
pub mod time;
pub mod transport;
