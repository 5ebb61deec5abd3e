// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::{testing::pair, Event};
use crate::{connection::State, stream::StreamId, wire};
use bytes::Bytes;
use plume_quic_core::time::Duration;

/// Runs both endpoints' ingress until neither has pending datagrams
fn pump(client: &mut super::Endpoint<super::testing::Testing>, server: &mut super::Endpoint<super::testing::Testing>) {
    for _ in 0..20 {
        client.handle_rx();
        server.handle_rx();
    }
    assert_eq!(client.socket_mut().pending_rx(), 0, "client rx not drained");
    assert_eq!(server.socket_mut().pending_rx(), 0, "server rx not drained");
}

fn events(endpoint: &mut super::Endpoint<super::testing::Testing>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = endpoint.poll_event() {
        events.push(event);
    }
    events
}

#[test]
fn handshake_completes() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();

    let accept = server.listen();
    let handle = client.connect(peer).unwrap();
    pump(&mut client, &mut server);

    assert!(events(&mut client).contains(&Event::Connected(handle)));
    assert!(events(&mut server).contains(&Event::Accepted(accept)));

    let client_conn = client.connection(handle).unwrap();
    let server_conn = server.connection(accept).unwrap();
    assert_eq!(client_conn.state(), State::Established);
    assert_eq!(server_conn.state(), State::Established);

    // both sides settled on the server-chosen connection id
    assert_eq!(client_conn.cid(), server_conn.cid());
    assert_eq!(client_conn.version(), wire::SUPPORTED_VERSIONS[0]);

    // everything sent during the handshake was acknowledged
    for space in client_conn.spaces() {
        assert!(space.sent.values().all(|m| !m.ack_eliciting));
    }
}

#[test]
fn version_negotiation_retry_reaches_established() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();

    let accept = server.listen();
    // a force-negotiation version must be rejected by the server
    let handle = client.connect_with_version(peer, 0x1a2a_3a4a).unwrap();
    pump(&mut client, &mut server);

    assert!(events(&mut client).contains(&Event::Connected(handle)));
    assert!(events(&mut server).contains(&Event::Accepted(accept)));

    let client_conn = client.connection(handle).unwrap();
    // the retry settled on our top priority version
    assert_eq!(client_conn.version(), wire::SUPPORTED_VERSIONS[0]);
    assert_eq!(client_conn.state(), State::Established);
}

#[test]
fn data_transfer_and_fin_acknowledgement() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();

    let accept = server.listen();
    let handle = client.connect(peer).unwrap();
    pump(&mut client, &mut server);
    let _ = events(&mut client);
    let _ = events(&mut server);

    let stream = StreamId::new(4);
    client.write(handle, stream, Bytes::from_static(b"hello"), true);
    pump(&mut client, &mut server);

    // the server saw the data and its FIN
    assert!(events(&mut server)
        .iter()
        .any(|e| matches!(e, Event::StreamReadable(h, s) if *h == accept && *s == stream)));
    assert_eq!(server.read(accept, stream), Some(Bytes::from_static(b"hello")));
    assert!(server
        .connection(accept)
        .unwrap()
        .stream(stream)
        .unwrap()
        .recv
        .is_finished());

    // the server's ACK of the FIN advanced our stream state
    assert!(events(&mut client)
        .iter()
        .any(|e| matches!(e, Event::StreamFinished(h, s) if *h == handle && *s == stream)));
    let client_stream = client.connection(handle).unwrap().stream(stream).unwrap();
    assert_eq!(client_stream.state(), crate::stream::State::HalfClosedLocal);
    assert!(client.connection(handle).unwrap().have_new_data);
}

#[test]
fn lost_hello_is_probed_and_backoff_doubles() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();
    let accept = server.listen();

    // the first two hellos vanish on the wire
    client.socket_mut().drop_next(2);
    let handle = client.connect(peer).unwrap();
    server.handle_rx();
    assert!(events(&mut server).is_empty());

    // first probe timeout: a single anti-deadlock probe
    let first_alarm = client.next_timeout().expect("alarm armed");
    client.clock().set(first_alarm);
    client.handle_timeout();
    assert_eq!(client.connection(handle).unwrap().recovery.pto_count(), 1);

    // unanswered again: the arm interval doubles
    let second_alarm = client.next_timeout().expect("alarm re-armed");
    assert_eq!(
        second_alarm - first_alarm,
        4 * plume_quic_core::recovery::K_INITIAL_RTT
    );
    client.clock().set(second_alarm);
    client.handle_timeout();
    assert_eq!(client.connection(handle).unwrap().recovery.pto_count(), 2);

    // the third transmission survives and the handshake completes
    pump(&mut client, &mut server);
    assert!(events(&mut client).contains(&Event::Connected(handle)));
    assert!(events(&mut server).contains(&Event::Accepted(accept)));
    // an acknowledged probe resets the backoff
    assert_eq!(client.connection(handle).unwrap().recovery.pto_count(), 0);
}

#[test]
fn idle_timeout_closes_the_connection() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();
    server.listen();

    let handle = client.connect(peer).unwrap();
    pump(&mut client, &mut server);
    let _ = events(&mut client);

    client.clock().advance(Duration::from_secs(11));
    client.handle_timeout();

    assert!(events(&mut client).iter().any(|e| matches!(
        e,
        Event::ConnectionClosed(h, crate::connection::Error::IdleTimeout) if *h == handle
    )));
    // the connection was destroyed
    assert!(client.connection(handle).is_none());
}

#[test]
fn close_notifies_the_peer() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();
    let accept = server.listen();

    let handle = client.connect(peer).unwrap();
    pump(&mut client, &mut server);
    let _ = events(&mut server);

    client.close(handle, 42);
    assert!(client.connection(handle).is_none());
    pump(&mut client, &mut server);

    assert!(events(&mut server).iter().any(|e| matches!(
        e,
        Event::ConnectionClosed(h, crate::connection::Error::Peer { code: 42 }) if *h == accept
    )));
}

#[test]
fn handshake_done_retires_handshake_spaces() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();
    let accept = server.listen();
    let handle = client.connect(peer).unwrap();
    pump(&mut client, &mut server);

    // the client drops its handshake space on HANDSHAKE_DONE; the
    // server once the frame is acknowledged
    assert!(client.connection(handle).unwrap().spaces()[1].abandoned);
    assert!(server.connection(accept).unwrap().spaces()[1].abandoned);
}

#[test]
fn quiescent_after_handshake() {
    let (mut client, mut server) = pair();
    let peer = server.socket_mut().local_addr();
    server.listen();
    client.connect(peer).unwrap();
    pump(&mut client, &mut server);

    // one more round produces no traffic: acknowledgements of
    // acknowledgements are not themselves acknowledged
    client.handle_rx();
    server.handle_rx();
    assert_eq!(client.socket_mut().pending_rx(), 0);
    assert_eq!(server.socket_mut().pending_rx(), 0);
}
