// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::K_LOSS_REDUCTION_DIVISOR,
    time::Timestamp,
};
use core::cmp::{max, min};

/// A NewReno congestion controller.
///
/// The window grows by one packet per ACKed packet in slow start and by
/// roughly one packet per window in congestion avoidance. A congestion
/// event halves the window and opens a recovery epoch; losses whose
/// packets were sent inside the epoch do not shrink the window again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewReno {
    /// Bytes in flight, counting packets that consume window budget
    bytes_in_flight: u64,
    /// The congestion window, in bytes
    congestion_window: u64,
    /// Slow start threshold
    slow_start_threshold: u64,
    /// The time the current recovery epoch started, if any
    recovery_start_time: Option<Timestamp>,
    /// Current maximum datagram size
    max_datagram_size: u16,
}

impl NewReno {
    /// Creates a controller for a path with the given datagram size
    pub fn new(max_datagram_size: u16) -> Self {
        Self {
            bytes_in_flight: 0,
            congestion_window: Self::initial_window(max_datagram_size),
            slow_start_threshold: u64::MAX,
            recovery_start_time: None,
            max_datagram_size,
        }
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
    //# Endpoints SHOULD use an initial congestion
    //# window of ten times the maximum datagram size (max_datagram_size),
    //# while limiting the window to the larger of 14,720 bytes or twice the
    //# maximum datagram size.
    #[inline]
    pub fn initial_window(max_datagram_size: u16) -> u64 {
        let mds = max_datagram_size as u64;
        min(10 * mds, max(2 * mds, 14_720))
    }

    //= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
    //# The RECOMMENDED value is 2 * max_datagram_size.
    #[inline]
    pub fn minimum_window(max_datagram_size: u16) -> u64 {
        2 * max_datagram_size as u64
    }

    /// Returns the congestion window in bytes
    #[inline]
    pub fn congestion_window(&self) -> u64 {
        self.congestion_window
    }

    /// Returns the slow start threshold in bytes
    #[inline]
    pub fn slow_start_threshold(&self) -> u64 {
        self.slow_start_threshold
    }

    /// Returns the bytes currently in flight
    #[inline]
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// Returns the current maximum datagram size
    #[inline]
    pub fn max_datagram_size(&self) -> u16 {
        self.max_datagram_size
    }

    /// Updates the maximum datagram size after path validation
    #[inline]
    pub fn set_max_datagram_size(&mut self, max_datagram_size: u16) {
        self.max_datagram_size = max_datagram_size;
    }

    /// Returns `true` if `bytes` more may be sent within the window
    #[inline]
    pub fn has_window_for(&self, bytes: u64) -> bool {
        self.bytes_in_flight + bytes <= self.congestion_window
    }

    /// Returns `true` if a packet sent at `time_sent` falls inside the
    /// current recovery epoch
    #[inline]
    pub fn in_recovery(&self, time_sent: Timestamp) -> bool {
        self.recovery_start_time
            .is_some_and(|start| time_sent <= start)
    }

    /// Called when an in-flight packet is sent
    #[inline]
    pub fn on_packet_sent(&mut self, bytes: u64) {
        self.bytes_in_flight += bytes;
    }

    /// Called when an in-flight packet is acknowledged.
    ///
    /// Grows the window unless the packet was sent during recovery.
    pub fn on_packet_acked(&mut self, time_sent: Timestamp, bytes: u64) {
        self.remove_from_flight(bytes);

        //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.2
        //# While a sender is in congestion recovery, the congestion window
        //# remains unchanged, irrespective of new losses or increases in the
        //# ECN-CE counter.
        if self.in_recovery(time_sent) {
            return;
        }

        if self.congestion_window < self.slow_start_threshold {
            //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.1
            //# While a sender is in slow start, the congestion window
            //# increases by the number of bytes acknowledged
            self.congestion_window += bytes;
        } else {
            // congestion avoidance: about one datagram per window round
            self.congestion_window +=
                self.max_datagram_size as u64 * bytes / self.congestion_window;
        }
    }

    /// Called when an in-flight packet is declared lost or its space is
    /// abandoned; no congestion reaction.
    #[inline]
    pub fn on_packet_discarded(&mut self, bytes: u64) {
        self.remove_from_flight(bytes);
    }

    /// Called once per loss burst with the send time of the largest lost
    /// packet.
    ///
    /// A no-op if that packet was sent inside the current recovery epoch.
    pub fn on_congestion_event(&mut self, time_sent: Timestamp, now: Timestamp) {
        //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.2
        //# A recovery period ends and the sender enters congestion avoidance
        //# when a packet sent during the recovery period is acknowledged.
        if self.in_recovery(time_sent) {
            return;
        }

        self.recovery_start_time = Some(now);
        self.congestion_window = max(
            self.congestion_window / K_LOSS_REDUCTION_DIVISOR,
            Self::minimum_window(self.max_datagram_size),
        );
        self.slow_start_threshold = self.congestion_window;
    }

    /// Collapses the window to the minimum after persistent congestion
    #[inline]
    pub fn on_persistent_congestion(&mut self) {
        self.congestion_window = Self::minimum_window(self.max_datagram_size);
    }

    #[inline]
    fn remove_from_flight(&mut self, bytes: u64) {
        debug_assert!(
            self.bytes_in_flight >= bytes,
            "in_flight underrun: {} < {}",
            self.bytes_in_flight,
            bytes
        );
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    const MDS: u16 = 1200;

    fn now() -> Timestamp {
        Timestamp::from_nanos(1_000_000_000)
    }

    #[test]
    fn initial_window_bounds() {
        assert_eq!(NewReno::initial_window(1200), 12_000);
        // large datagrams are clamped by the byte limit
        assert_eq!(NewReno::initial_window(9000), 18_000);
        // tiny datagrams still get ten packets
        assert_eq!(NewReno::initial_window(500), 5_000);
    }

    #[test]
    fn slow_start_grows_by_acked_bytes() {
        let mut cc = NewReno::new(MDS);
        let window = cc.congestion_window();

        cc.on_packet_sent(1200);
        cc.on_packet_acked(now(), 1200);
        assert_eq!(cc.congestion_window(), window + 1200);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn congestion_avoidance_growth() {
        let mut cc = NewReno::new(MDS);
        cc.slow_start_threshold = cc.congestion_window();
        let window = cc.congestion_window();

        cc.on_packet_sent(1200);
        cc.on_packet_acked(now(), 1200);
        assert_eq!(
            cc.congestion_window(),
            window + MDS as u64 * 1200 / window
        );
    }

    #[test]
    fn congestion_event_halves_once_per_epoch() {
        let mut cc = NewReno::new(MDS);
        let window = cc.congestion_window();

        let sent = now();
        let event = sent + Duration::from_millis(30);
        cc.on_congestion_event(sent, event);
        assert_eq!(cc.congestion_window(), window / 2);
        assert_eq!(cc.slow_start_threshold(), window / 2);

        // a second loss from the same epoch does not halve again
        cc.on_congestion_event(sent, event + Duration::from_millis(1));
        assert_eq!(cc.congestion_window(), window / 2);

        // a loss sent after the epoch started does
        cc.on_congestion_event(
            event + Duration::from_millis(5),
            event + Duration::from_millis(50),
        );
        assert_eq!(cc.congestion_window(), window / 4);
    }

    #[test]
    fn window_clamps_at_minimum() {
        let mut cc = NewReno::new(MDS);
        cc.congestion_window = 3_000;
        cc.on_congestion_event(now(), now() + Duration::from_millis(1));
        assert_eq!(cc.congestion_window(), NewReno::minimum_window(MDS));
    }

    #[test]
    fn no_growth_during_recovery() {
        let mut cc = NewReno::new(MDS);
        let sent = now();
        cc.on_packet_sent(1200);
        cc.on_congestion_event(sent, sent + Duration::from_millis(10));
        let window = cc.congestion_window();

        // the packet was sent before recovery started
        cc.on_packet_acked(sent, 1200);
        assert_eq!(cc.congestion_window(), window);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn window_budget() {
        let mut cc = NewReno::new(MDS);
        assert!(cc.has_window_for(cc.congestion_window()));
        cc.on_packet_sent(cc.congestion_window());
        assert!(!cc.has_window_for(1));
    }
}
