// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection recovery engine
//!
//! Ties the RTT estimator and the congestion controller to the three
//! packet-number spaces: records transmissions, dequeues acknowledgements,
//! declares losses by time and packet thresholds, and drives the loss
//! detection alarm.

use crate::space::{PacketSpace, SentPacket};
use plume_quic_core::{
    frame::Kind,
    packet::number::PacketNumberSpace,
    recovery::{NewReno, RttEstimator, K_GRANULARITY, K_PACKET_THRESHOLD},
    time::{Duration, Timestamp},
};
use tracing::{debug, trace};

/// The congestion state visible in logs; deltas against the previous
/// snapshot are reported after every recovery pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub in_flight: u64,
    pub cwnd: u64,
    /// `0` renders "no threshold yet"
    pub ssthresh: u64,
    pub srtt: Duration,
    pub rttvar: Duration,
}

/// What a fired loss-detection alarm asks the connection to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PtoOutcome {
    /// A loss time passed: run loss detection (with congestion control)
    /// and transmit whatever became eligible
    LossDetection,
    /// Application keys are not installed yet: send one probe and scan
    /// for losses without touching the congestion state
    AntiDeadlockProbe,
    /// Send two probe packets
    Probe,
}

impl PtoOutcome {
    /// The egress packet budget for this outcome, if capped
    pub fn tx_limit(self) -> Option<u8> {
        match self {
            Self::LossDetection => None,
            Self::AntiDeadlockProbe => Some(1),
            Self::Probe => Some(2),
        }
    }
}

#[derive(Debug)]
pub struct Recovery {
    pub rtt: RttEstimator,
    pub cc: NewReno,
    prev: Snapshot,
    /// Ack-eliciting packets in flight, across all spaces
    ae_in_flight: u32,
    pto_count: u32,
    /// Scheduled loss-detection alarm
    loss_alarm: Option<Timestamp>,
}

impl Recovery {
    pub fn new(max_ack_delay: Duration, max_datagram_size: u16) -> Self {
        Self {
            rtt: RttEstimator::new(max_ack_delay),
            cc: NewReno::new(max_datagram_size),
            prev: Snapshot::default(),
            ae_in_flight: 0,
            pto_count: 0,
            loss_alarm: None,
        }
    }

    #[inline]
    pub fn ae_in_flight(&self) -> u32 {
        self.ae_in_flight
    }

    #[inline]
    pub fn pto_count(&self) -> u32 {
        self.pto_count
    }

    #[inline]
    pub fn loss_alarm(&self) -> Option<Timestamp> {
        self.loss_alarm
    }

    /// Disarms the loss-detection alarm, as on close
    #[inline]
    pub fn cancel_alarm(&mut self) {
        self.loss_alarm = None;
    }

    /// Records a transmitted packet
    pub fn on_packet_sent(&mut self, space: &mut PacketSpace, mut packet: SentPacket, now: Timestamp) {
        debug_assert!(!space.abandoned, "tx in abandoned space");
        packet.time_sent = now;

        if packet.in_flight {
            if packet.ack_eliciting {
                space.last_ae_tx_time = Some(now);
                self.ae_in_flight += 1;
            }
            self.cc.on_packet_sent(packet.udp_len as u64);
        }

        space.sent.insert(packet.nr, packet);
    }

    /// Applies an ACK to the registry: advances `largest_acked`, samples
    /// the RTT off the largest newly acked packet, and dequeues every
    /// covered packet.
    ///
    /// The caller settles the congestion reaction per packet with
    /// [`Self::on_packet_acked_cc`], then finishes the pass with
    /// [`Self::on_ack_processed`].
    pub fn on_ack_received(
        &mut self,
        space: &mut PacketSpace,
        largest: u64,
        ack_delay: Duration,
        ranges: &[(u64, u64)],
        now: Timestamp,
    ) -> Vec<SentPacket> {
        space.largest_acked = Some(space.largest_acked.map_or(largest, |lg| lg.max(largest)));

        let mut newly: Vec<u64> = Vec::new();
        for &(lo, hi) in ranges {
            newly.extend(space.sent.range(lo..=hi).map(|(&nr, _)| nr));
        }
        newly.sort_unstable();

        if let Some(&largest_newly) = newly.last() {
            let any_eliciting = newly
                .iter()
                .any(|nr| space.sent.get(nr).is_some_and(|m| m.ack_eliciting));
            if any_eliciting {
                if let Some(m) = space.sent.get(&largest_newly) {
                    let sample = now.saturating_duration_since(m.time_sent);
                    self.rtt.update_rtt(
                        RttEstimator::effective_ack_delay(space.space, ack_delay),
                        sample,
                    );
                }
            }
        }

        let mut acked = Vec::with_capacity(newly.len());
        for nr in newly {
            let Some(m) = space.sent.remove(&nr) else {
                continue;
            };
            space.acked_or_lost.insert(nr, now);
            if m.in_flight && m.ack_eliciting {
                self.ae_in_flight = self.ae_in_flight.saturating_sub(1);
            }
            acked.push(m);
        }
        acked
    }

    /// Settles the congestion accounting for one acknowledged packet.
    ///
    /// `grow` is false when the packet's send unit was already
    /// acknowledged through another transmission; the bytes still leave
    /// the in-flight total, but the window does not grow twice for one
    /// logical transmission.
    pub fn on_packet_acked_cc(&mut self, packet: &SentPacket, grow: bool) {
        if !packet.in_flight {
            return;
        }
        if grow {
            self.cc.on_packet_acked(packet.time_sent, packet.udp_len as u64);
        } else {
            self.cc.on_packet_discarded(packet.udp_len as u64);
        }
    }

    /// Finishes an ACK pass: runs loss detection in the ACKed space and
    /// resets the PTO backoff.
    pub fn on_ack_processed(
        &mut self,
        space: &mut PacketSpace,
        now: Timestamp,
    ) -> Vec<SentPacket> {
        let lost = self.detect_lost_packets(space, now, true);
        self.pto_count = 0;
        lost
    }

    /// Declares packets in `space` lost by the time and packet-number
    /// thresholds and computes the space's next loss time.
    ///
    /// Returns the lost packets so the connection can re-flag control
    /// frames and mark stream send units for retransmission.
    pub fn detect_lost_packets(
        &mut self,
        space: &mut PacketSpace,
        now: Timestamp,
        do_cc: bool,
    ) -> Vec<SentPacket> {
        if space.abandoned {
            return Vec::new();
        }

        space.loss_time = None;
        let Some(largest_acked) = space.largest_acked else {
            return Vec::new();
        };

        //= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.2
        //# The time threshold is:
        //#
        //# max(kTimeThreshold * max(smoothed_rtt, latest_rtt), kGranularity)
        let loss_delay = self.rtt.loss_delay().max(K_GRANULARITY);

        // packets sent before this time are deemed lost
        let lost_send_time = now.checked_sub(loss_delay);

        let mut lost_numbers: Vec<u64> = Vec::new();
        let mut loss_time: Option<Timestamp> = None;
        for (&nr, m) in space.sent.iter() {
            if nr > largest_acked {
                break;
            }

            let by_time = lost_send_time.is_some_and(|t| m.time_sent <= t);
            //= https://www.rfc-editor.org/rfc/rfc9002#section-6.1.1
            //# kPacketThreshold packets
            let by_threshold = largest_acked >= nr + K_PACKET_THRESHOLD;

            if by_time || by_threshold {
                lost_numbers.push(nr);
            } else {
                let candidate = m.time_sent + loss_delay;
                loss_time = Some(loss_time.map_or(candidate, |t| t.min(candidate)));
            }
        }
        space.loss_time = loss_time;

        let mut lost = Vec::with_capacity(lost_numbers.len());
        let mut in_flight_lost = false;
        let mut largest_lost_time_sent: Option<Timestamp> = None;
        for nr in lost_numbers {
            let Some(m) = space.sent.remove(&nr) else {
                continue;
            };
            space.acked_or_lost.insert(nr, now);
            if m.in_flight {
                in_flight_lost = true;
                self.cc.on_packet_discarded(m.udp_len as u64);
                if m.ack_eliciting {
                    self.ae_in_flight = self.ae_in_flight.saturating_sub(1);
                }
                // the send time of the largest lost packet opens the
                // recovery epoch
                largest_lost_time_sent = Some(m.time_sent);
            }
            trace!(nr, space = ?space.space, "packet lost");
            lost.push(m);
        }

        if do_cc && in_flight_lost {
            if let Some(time_sent) = largest_lost_time_sent {
                self.congestion_event(time_sent, now);
            }
        }

        self.log_cc();
        lost
    }

    /// Halves the window once per recovery epoch
    pub fn congestion_event(&mut self, time_sent: Timestamp, now: Timestamp) {
        self.cc.on_congestion_event(time_sent, now);
        if self.in_persistent_congestion() {
            self.cc.on_persistent_congestion();
        }
    }

    // Persistent congestion detection is deliberately disabled; the
    // threshold is the RFC computation, the decision never fires.
    fn in_persistent_congestion(&self) -> bool {
        let _threshold = self.persistent_congestion_threshold();
        false
    }

    /// The duration of loss that would establish persistent congestion
    pub fn persistent_congestion_threshold(&self) -> Duration {
        use plume_quic_core::recovery::K_PERSISTENT_CONGESTION_THRESHOLD;
        (self.rtt.smoothed_rtt()
            + (4 * self.rtt.rttvar()).max(K_GRANULARITY)
            + self.rtt.max_ack_delay())
            * K_PERSISTENT_CONGESTION_THRESHOLD
    }

    /// Arms or disarms the loss-detection alarm.
    ///
    /// The earliest pending loss time wins; otherwise a probe timeout is
    /// armed off the latest ack-eliciting transmission, or the alarm is
    /// disarmed entirely when nothing ack-eliciting is outstanding and
    /// the peer no longer awaits address validation.
    pub fn set_loss_detection_timer(
        &mut self,
        spaces: &[PacketSpace; 3],
        established: bool,
        is_client: bool,
        now: Timestamp,
    ) {
        if let Some(loss_time) = Self::earliest(spaces, established, |s| s.loss_time) {
            self.loss_alarm = Some(loss_time);
            return;
        }

        if self.ae_in_flight == 0 && Self::peer_not_awaiting_addr_validation(spaces, is_client) {
            trace!("no ack-eliciting packets in flight, stopping alarm");
            self.loss_alarm = None;
            return;
        }

        let timeout = self.rtt.pto_period(self.pto_count);
        let base = Self::earliest(spaces, established, |s| s.last_ae_tx_time).unwrap_or(now);
        self.loss_alarm = Some(base + timeout);
    }

    /// Handles a fired loss-detection alarm
    pub fn on_loss_detection_timeout(
        &mut self,
        spaces: &[PacketSpace; 3],
        established: bool,
        have_application_keys: bool,
    ) -> PtoOutcome {
        self.loss_alarm = None;

        if Self::earliest(spaces, established, |s| s.loss_time).is_some() {
            return PtoOutcome::LossDetection;
        }

        //= https://www.rfc-editor.org/rfc/rfc9002#section-6.2.4
        //# An endpoint
        //# MAY send up to two full-sized datagrams containing ack-eliciting
        //# packets to avoid an expensive consecutive PTO expiration due to a
        //# single lost datagram or to transmit data from multiple packet number
        //# spaces.
        let outcome = if !have_application_keys {
            PtoOutcome::AntiDeadlockProbe
        } else {
            PtoOutcome::Probe
        };
        self.pto_count += 1;
        outcome
    }

    /// Releases the in-flight accounting of every outstanding packet and
    /// abandons the space.
    pub fn abandon_space(&mut self, space: &mut PacketSpace) {
        for m in space.sent.values() {
            if m.in_flight {
                self.cc.on_packet_discarded(m.udp_len as u64);
                if m.ack_eliciting {
                    self.ae_in_flight = self.ae_in_flight.saturating_sub(1);
                }
            }
        }
        space.abandon();
    }

    /// Drops every outstanding packet without declaring losses. Used when
    /// a version-negotiation retry discards the first flight.
    pub fn discard_all_sent(&mut self, spaces: &mut [PacketSpace; 3]) {
        for space in spaces.iter_mut() {
            for (_, m) in core::mem::take(&mut space.sent) {
                if m.in_flight {
                    self.cc.on_packet_discarded(m.udp_len as u64);
                    if m.ack_eliciting {
                        self.ae_in_flight = self.ae_in_flight.saturating_sub(1);
                    }
                }
            }
            space.loss_time = None;
            space.last_ae_tx_time = None;
        }
        self.pto_count = 0;
        self.loss_alarm = None;
        self.log_cc();
    }

    /// Emits the congestion-state delta since the previous snapshot
    pub fn log_cc(&mut self) {
        let cur = self.snapshot();
        if cur != self.prev {
            debug!(
                in_flight = cur.in_flight,
                cwnd = cur.cwnd,
                ssthresh = cur.ssthresh,
                srtt_us = cur.srtt.as_micros() as u64,
                rttvar_us = cur.rttvar.as_micros() as u64,
                prev_in_flight = self.prev.in_flight,
                prev_cwnd = self.prev.cwnd,
                "cc state"
            );
            self.prev = cur;
        }
    }

    /// The current congestion state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            in_flight: self.cc.bytes_in_flight(),
            cwnd: self.cc.congestion_window(),
            ssthresh: if self.cc.slow_start_threshold() == u64::MAX {
                0
            } else {
                self.cc.slow_start_threshold()
            },
            srtt: self.rtt.smoothed_rtt(),
            rttvar: self.rtt.rttvar(),
        }
    }

    fn earliest<F: Fn(&PacketSpace) -> Option<Timestamp>>(
        spaces: &[PacketSpace; 3],
        established: bool,
        field: F,
    ) -> Option<Timestamp> {
        spaces
            .iter()
            .filter(|s| !s.abandoned)
            // application-data timers only count once established
            .filter(|s| established || !matches!(s.space, PacketNumberSpace::ApplicationData))
            .filter_map(|s| field(s))
            .min()
    }

    /// A client keeps probing until an ACK arrives in the Initial or
    /// Handshake space, proving the server validated its address.
    fn peer_not_awaiting_addr_validation(spaces: &[PacketSpace; 3], is_client: bool) -> bool {
        if !is_client {
            return true;
        }
        spaces[PacketNumberSpace::Initial as usize]
            .rx_frames
            .contains(Kind::Ack)
            || spaces[PacketNumberSpace::Handshake as usize]
                .rx_frames
                .contains(Kind::Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::testing::sent_packet;
    use plume_quic_core::recovery::K_INITIAL_RTT;

    const MAX_ACK_DELAY: Duration = Duration::from_millis(25);
    const MDS: u16 = 1472;

    fn spaces() -> [PacketSpace; 3] {
        [
            PacketSpace::new(PacketNumberSpace::Initial),
            PacketSpace::new(PacketNumberSpace::Handshake),
            PacketSpace::new(PacketNumberSpace::ApplicationData),
        ]
    }

    fn recovery() -> Recovery {
        Recovery::new(MAX_ACK_DELAY, MDS)
    }

    fn now() -> Timestamp {
        Timestamp::from_nanos(10_000_000_000)
    }

    /// Packet-threshold loss: 10..=14 sent, only 14 acked, so 10 and 11
    /// cross the threshold and a single congestion event fires.
    #[test]
    fn loss_by_packet_threshold() {
        let mut recovery = recovery();
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);

        let t0 = now();
        for nr in 10..=14u64 {
            let packet = sent_packet(nr, t0);
            recovery.on_packet_sent(&mut space, packet, t0 + Duration::from_millis(nr as u64));
        }
        assert_eq!(recovery.cc.bytes_in_flight(), 5 * 1200);
        assert_eq!(recovery.ae_in_flight(), 5);

        let window_before = recovery.cc.congestion_window();
        let ack_time = t0 + Duration::from_millis(100);
        let acked = recovery.on_ack_received(
            &mut space,
            14,
            Duration::ZERO,
            &[(14, 14)],
            ack_time,
        );
        assert_eq!(acked.len(), 1);
        for m in &acked {
            recovery.on_packet_acked_cc(m, true);
        }

        let lost = recovery.on_ack_processed(&mut space, ack_time);
        let lost_numbers: Vec<u64> = lost.iter().map(|m| m.nr).collect();
        assert_eq!(lost_numbers, [10, 11]);

        // 14 acked, 10 and 11 lost: 12 and 13 remain in flight
        assert_eq!(recovery.cc.bytes_in_flight(), 2 * 1200);
        assert_eq!(recovery.ae_in_flight(), 2);
        // the counter always agrees with the registry
        assert_eq!(
            recovery.ae_in_flight() as usize,
            space.ack_eliciting_outstanding()
        );

        // one congestion event: the slow-start growth from the ACK, then a
        // single halving for both losses
        assert_eq!(recovery.cc.congestion_window(), (window_before + 1200) / 2);

        // the registry only holds outstanding packets
        let outstanding: Vec<u64> = space.sent.keys().copied().collect();
        assert_eq!(outstanding, [12, 13]);
    }

    /// Time-threshold loss: with srtt = latest = 100ms the loss delay is
    /// 112.5ms; a packet sent at t0 is lost once an ACK arrives at
    /// t0 + 200ms.
    #[test]
    fn loss_by_time_threshold() {
        let mut recovery = recovery();
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);

        let t0 = now();
        // seed the estimator with a 100ms sample
        recovery.rtt.update_rtt(Duration::ZERO, Duration::from_millis(100));
        assert_eq!(recovery.rtt.loss_delay(), Duration::from_micros(112_500));

        recovery.on_packet_sent(&mut space, sent_packet(20, t0), t0);
        recovery.on_packet_sent(
            &mut space,
            sent_packet(21, t0),
            t0 + Duration::from_millis(50),
        );

        let ack_time = t0 + Duration::from_millis(200);
        let acked =
            recovery.on_ack_received(&mut space, 21, Duration::ZERO, &[(21, 21)], ack_time);
        for m in &acked {
            recovery.on_packet_acked_cc(m, true);
        }
        let lost = recovery.on_ack_processed(&mut space, ack_time);

        // packet 20: send time t0 <= t0 + 200ms - 112.5ms
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].nr, 20);
    }

    /// A packet below the largest acked but within both thresholds sets
    /// the space's loss time instead of being declared lost.
    #[test]
    fn near_loss_sets_loss_time() {
        let mut recovery = recovery();
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);
        recovery.rtt.update_rtt(Duration::ZERO, Duration::from_millis(100));

        let t0 = now();
        recovery.on_packet_sent(&mut space, sent_packet(1, t0), t0);
        recovery.on_packet_sent(&mut space, sent_packet(2, t0), t0 + Duration::from_millis(1));

        let ack_time = t0 + Duration::from_millis(30);
        let acked =
            recovery.on_ack_received(&mut space, 2, Duration::ZERO, &[(2, 2)], ack_time);
        for m in &acked {
            recovery.on_packet_acked_cc(m, true);
        }
        let lost = recovery.on_ack_processed(&mut space, ack_time);

        assert!(lost.is_empty());
        assert_eq!(space.loss_time, Some(t0 + recovery.rtt.loss_delay()));
    }

    #[test]
    fn alarm_disarmed_with_nothing_in_flight() {
        let mut recovery = recovery();
        let mut spaces = spaces();

        // a client that has seen an Initial-space ACK
        spaces[0].rx_frames.insert(Kind::Ack);
        recovery.set_loss_detection_timer(&spaces, false, true, now());
        assert_eq!(recovery.loss_alarm(), None);

        // without that ACK the client keeps the alarm armed
        let spaces2 = self::spaces();
        recovery.set_loss_detection_timer(&spaces2, false, true, now());
        assert!(recovery.loss_alarm().is_some());

        // servers disarm unconditionally when nothing is outstanding
        recovery.set_loss_detection_timer(&spaces2, false, false, now());
        assert_eq!(recovery.loss_alarm(), None);

        // in-flight ack-eliciting data arms the alarm for anyone
        let t = now();
        recovery.on_packet_sent(&mut spaces[0], sent_packet(0, t), t);
        recovery.set_loss_detection_timer(&spaces, false, true, t);
        assert_eq!(recovery.loss_alarm(), Some(t + recovery.rtt.pto_period(0)));
    }

    #[test]
    fn pto_period_doubles_with_count() {
        let mut recovery = recovery();
        let mut spaces = spaces();
        let t = now();
        recovery.on_packet_sent(&mut spaces[0], sent_packet(0, t), t);

        // before any RTT sample the period is 2 * initial RTT
        recovery.set_loss_detection_timer(&spaces, false, false, t);
        assert_eq!(recovery.loss_alarm(), Some(t + 2 * K_INITIAL_RTT));

        // each unanswered probe doubles the arm time
        for (count, factor) in [(1u32, 4u32), (2, 8)] {
            let outcome =
                recovery.on_loss_detection_timeout(&spaces, false, true);
            assert_eq!(outcome, PtoOutcome::Probe);
            assert_eq!(recovery.pto_count(), count);

            recovery.set_loss_detection_timer(&spaces, false, false, t);
            assert_eq!(recovery.loss_alarm(), Some(t + factor * K_INITIAL_RTT));
        }
    }

    #[test]
    fn pto_without_application_keys_is_anti_deadlock() {
        let mut recovery = recovery();
        let mut spaces = spaces();
        let t = now();
        recovery.on_packet_sent(&mut spaces[0], sent_packet(0, t), t);

        let outcome = recovery.on_loss_detection_timeout(&spaces, false, false);
        assert_eq!(outcome, PtoOutcome::AntiDeadlockProbe);
        assert_eq!(outcome.tx_limit(), Some(1));
        assert_eq!(recovery.pto_count(), 1);

        let outcome = recovery.on_loss_detection_timeout(&spaces, false, true);
        assert_eq!(outcome, PtoOutcome::Probe);
        assert_eq!(outcome.tx_limit(), Some(2));
    }

    #[test]
    fn pending_loss_time_takes_priority_on_timeout() {
        let mut recovery = recovery();
        let mut spaces = spaces();
        spaces[0].loss_time = Some(now());

        let outcome = recovery.on_loss_detection_timeout(&spaces, false, true);
        assert_eq!(outcome, PtoOutcome::LossDetection);
        assert_eq!(outcome.tx_limit(), None);
        // loss detection does not consume a PTO backoff step
        assert_eq!(recovery.pto_count(), 0);
    }

    #[test]
    fn ack_resets_pto_count() {
        let mut recovery = recovery();
        let mut space = PacketSpace::new(PacketNumberSpace::Initial);
        let t = now();
        recovery.on_packet_sent(&mut space, sent_packet(0, t), t);
        recovery.pto_count = 3;

        let acked = recovery.on_ack_received(
            &mut space,
            0,
            Duration::ZERO,
            &[(0, 0)],
            t + Duration::from_millis(20),
        );
        assert_eq!(acked.len(), 1);
        recovery.on_ack_processed(&mut space, t + Duration::from_millis(20));
        assert_eq!(recovery.pto_count(), 0);
    }

    #[test]
    fn duplicate_ack_is_ignored() {
        let mut recovery = recovery();
        let mut space = PacketSpace::new(PacketNumberSpace::ApplicationData);
        let t = now();
        recovery.on_packet_sent(&mut space, sent_packet(0, t), t);

        let acked =
            recovery.on_ack_received(&mut space, 0, Duration::ZERO, &[(0, 0)], t);
        assert_eq!(acked.len(), 1);

        // the same range again dequeues nothing
        let acked =
            recovery.on_ack_received(&mut space, 0, Duration::ZERO, &[(0, 0)], t);
        assert!(acked.is_empty());
    }

    #[test]
    fn discard_all_sent_clears_accounting() {
        let mut recovery = recovery();
        let mut spaces = spaces();
        let t = now();
        recovery.on_packet_sent(&mut spaces[0], sent_packet(0, t), t);
        recovery.on_packet_sent(&mut spaces[0], sent_packet(1, t), t);
        assert_eq!(recovery.cc.bytes_in_flight(), 2 * 1200);

        recovery.discard_all_sent(&mut spaces);
        assert_eq!(recovery.cc.bytes_in_flight(), 0);
        assert_eq!(recovery.ae_in_flight(), 0);
        assert!(spaces[0].sent.is_empty());
    }
}
