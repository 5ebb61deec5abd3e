// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Loss recovery primitives: RTT estimation and congestion control

mod congestion_controller;
mod rtt_estimator;

pub use congestion_controller::NewReno;
pub use rtt_estimator::RttEstimator;

use core::time::Duration;

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
//# The RECOMMENDED value of the timer granularity (kGranularity) is 1 millisecond.
pub const K_GRANULARITY: Duration = Duration::from_millis(1);

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.2
//# When no previous RTT is available, the initial RTT
//# SHOULD be set to 333 milliseconds.
pub const K_INITIAL_RTT: Duration = Duration::from_millis(333);

//= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.1
//# The RECOMMENDED initial value for the packet reordering threshold
//# (kPacketThreshold) is 3, based on best practices for TCP loss
//# detection.
pub const K_PACKET_THRESHOLD: u64 = 3;

/// Divisor applied to the congestion window on a congestion event
pub const K_LOSS_REDUCTION_DIVISOR: u64 = 2;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.1
//# The RECOMMENDED value for kPersistentCongestionThreshold is 3.
pub const K_PERSISTENT_CONGESTION_THRESHOLD: u32 = 3;
