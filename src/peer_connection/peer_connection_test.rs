use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::*;
use crate::api::APIBuilder;
use crate::sctp_transport::sctp_engine::SctpEngine;
use crate::data_channel::data_channel_state::RTCDataChannelState;
use crate::peer_connection::sdp::sdp_test::parse_sdp;
use crate::track::{MediaKind, MediaTrack};

pub(crate) mod mock_engines;

use mock_engines::{connected_api_pair, MockDtlsEngine, MockIceAgentFactory, MockSctpEngine};

pub(crate) async fn new_pair() -> Result<(Arc<RTCPeerConnection>, Arc<RTCPeerConnection>)> {
    let (api_a, api_b) = connected_api_pair();
    let pc_a = api_a.new_peer_connection(RTCConfiguration::default()).await?;
    let pc_b = api_b.new_peer_connection(RTCConfiguration::default()).await?;
    Ok((pc_a, pc_b))
}

/// Drives a full offer/answer exchange between the two connections.
pub(crate) async fn signal_pair(
    pc_offer: &Arc<RTCPeerConnection>,
    pc_answer: &Arc<RTCPeerConnection>,
) -> Result<()> {
    let offer = pc_offer.create_offer(None).await?;
    pc_offer.set_local_description(offer.clone()).await?;
    pc_answer.set_remote_description(offer).await?;

    let answer = pc_answer.create_answer(None).await?;
    pc_answer.set_local_description(answer.clone()).await?;
    pc_offer.set_remote_description(answer).await?;

    Ok(())
}

pub(crate) async fn until_connection_state(
    pc: &Arc<RTCPeerConnection>,
    state: RTCPeerConnectionState,
) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel::<()>(1);
    let tx = Arc::new(Mutex::new(Some(tx)));
    pc.on_peer_connection_state_change(Box::new(move |s| {
        let tx = Arc::clone(&tx);
        Box::pin(async move {
            if s == state {
                let mut tx = tx.lock().await;
                tx.take();
            }
        })
    }))
    .await;
    rx
}

async fn expect_closed(mut rx: mpsc::Receiver<()>, what: &str) {
    let result = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn test_full_offer_answer_with_audio_and_data() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    pc_a.add_track(MediaTrack::new("audio-track", "stream-a", MediaKind::Audio))
        .await?;
    let chat = pc_a.create_data_channel("chat", None).await?;

    // Local channel: ondatachannel must NOT fire on the creating side.
    let local_datachannel_fired = Arc::new(Mutex::new(false));
    {
        let fired = Arc::clone(&local_datachannel_fired);
        pc_a.on_data_channel(Box::new(move |_| {
            let fired = Arc::clone(&fired);
            Box::pin(async move {
                *fired.lock().await = true;
            })
        }))
        .await;
    }

    let (open_tx, open_rx) = mpsc::channel::<()>(1);
    {
        let open_tx = Arc::new(Mutex::new(Some(open_tx)));
        chat.on_open(Box::new(move || {
            Box::pin(async move {
                let mut open_tx = open_tx.lock().await;
                open_tx.take();
            })
        }))
        .await;
    }

    let (remote_channel_tx, remote_channel_rx) = mpsc::channel::<Arc<RTCDataChannel>>(1);
    {
        let remote_channel_tx = Arc::new(remote_channel_tx);
        pc_b.on_data_channel(Box::new(move |d| {
            let remote_channel_tx = Arc::clone(&remote_channel_tx);
            Box::pin(async move {
                let _ = remote_channel_tx.send(d).await;
            })
        }))
        .await;
    }

    let connected_a = until_connection_state(&pc_a, RTCPeerConnectionState::Connected).await;
    let connected_b = until_connection_state(&pc_b, RTCPeerConnectionState::Connected).await;

    let offer = pc_a.create_offer(None).await?;

    // Two m-sections bundled on one transport, offered actpass.
    let parsed = parse_sdp(&offer.sdp);
    assert_eq!(parsed.media_descriptions.len(), 2);
    assert_eq!(parsed.attribute("group").map(String::as_str), Some("BUNDLE 0 1"));
    assert_eq!(get_mid_value(&parsed.media_descriptions[0]), Some("0"));
    assert_eq!(get_mid_value(&parsed.media_descriptions[1]), Some("1"));
    for media in &parsed.media_descriptions {
        assert_eq!(media.attribute("setup"), Some(Some("actpass")));
    }

    pc_a.set_local_description(offer.clone()).await?;
    assert_eq!(pc_a.signaling_state(), RTCSignalingState::HaveLocalOffer);

    pc_b.set_remote_description(offer).await?;
    let answer = pc_b.create_answer(None).await?;

    // The answer mirrors mids and m-line order and answers active.
    let parsed_answer = parse_sdp(&answer.sdp);
    assert_eq!(parsed_answer.media_descriptions.len(), 2);
    assert_eq!(get_mid_value(&parsed_answer.media_descriptions[0]), Some("0"));
    assert_eq!(get_mid_value(&parsed_answer.media_descriptions[1]), Some("1"));
    assert_eq!(
        parsed_answer.media_descriptions[0].attribute("setup"),
        Some(Some("active"))
    );

    pc_b.set_local_description(answer.clone()).await?;
    pc_a.set_remote_description(answer).await?;
    assert_eq!(pc_a.signaling_state(), RTCSignalingState::Stable);

    expect_closed(connected_a, "offerer connected").await;
    expect_closed(connected_b, "answerer connected").await;

    // The answer carried setup:active, so the offerer is the DTLS
    // server and its in-band channel gets an odd stream id.
    let mut open_rx = open_rx;
    assert!(
        tokio::time::timeout(Duration::from_secs(5), open_rx.recv())
            .await
            .is_ok(),
        "timed out waiting for DCEP ACK driven onopen"
    );
    assert_eq!(chat.ready_state(), RTCDataChannelState::Open);
    assert_eq!(chat.id() % 2, 1);

    let mut remote_channel_rx = remote_channel_rx;
    let remote_channel =
        tokio::time::timeout(Duration::from_secs(5), remote_channel_rx.recv())
            .await
            .expect("timed out waiting for ondatachannel")
            .expect("channel");
    assert_eq!(remote_channel.label(), "chat");
    assert_eq!(remote_channel.ready_state(), RTCDataChannelState::Open);

    assert!(!*local_datachannel_fired.lock().await);

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_fingerprint_mismatch_fails_connection() -> Result<()> {
    let ice = MockIceAgentFactory::pair();
    let dtls = MockDtlsEngine::pair();
    let sctp = MockSctpEngine::new();

    // The engine on side A reports a certificate that cannot match the
    // fingerprint B advertised in its SDP.
    dtls.0
        .set_fixed_peer_certificate(Bytes::from_static(b"not the signaled certificate"));

    let api_a = APIBuilder::new()
        .with_ice_agent_factory(ice.0)
        .with_dtls_engine(dtls.0)
        .with_sctp_engine(Arc::clone(&sctp) as Arc<dyn SctpEngine + Send + Sync>)
        .build();
    let api_b = APIBuilder::new()
        .with_ice_agent_factory(ice.1)
        .with_dtls_engine(dtls.1)
        .with_sctp_engine(sctp)
        .build();

    let pc_a = api_a.new_peer_connection(RTCConfiguration::default()).await?;
    let pc_b = api_b.new_peer_connection(RTCConfiguration::default()).await?;

    let _chat = pc_a.create_data_channel("chat", None).await?;
    let failed_a = until_connection_state(&pc_a, RTCPeerConnectionState::Failed).await;

    signal_pair(&pc_a, &pc_b).await?;

    expect_closed(failed_a, "fingerprint mismatch to fail the connection").await;
    assert_eq!(pc_a.connection_state(), RTCPeerConnectionState::Failed);

    // No channel came up over the failed transport.
    assert_eq!(_chat.ready_state(), RTCDataChannelState::Connecting);

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_trickle_candidate_after_answer() -> Result<()> {
    let ice = MockIceAgentFactory::pair();
    let dtls = MockDtlsEngine::pair();
    let sctp = MockSctpEngine::new();

    let ice_factory_a = Arc::clone(&ice.0);

    let api_a = APIBuilder::new()
        .with_ice_agent_factory(ice.0)
        .with_dtls_engine(dtls.0)
        .with_sctp_engine(Arc::clone(&sctp) as Arc<dyn SctpEngine + Send + Sync>)
        .build();
    let api_b = APIBuilder::new()
        .with_ice_agent_factory(ice.1)
        .with_dtls_engine(dtls.1)
        .with_sctp_engine(sctp)
        .build();

    let pc_a = api_a.new_peer_connection(RTCConfiguration::default()).await?;
    let pc_b = api_b.new_peer_connection(RTCConfiguration::default()).await?;

    let _chat = pc_a.create_data_channel("chat", None).await?;
    let connected_a = until_connection_state(&pc_a, RTCPeerConnectionState::Connected).await;

    signal_pair(&pc_a, &pc_b).await?;

    pc_a.add_ice_candidate(RTCIceCandidateInit {
        candidate: "candidate:1 1 UDP 2130706431 192.0.2.1 52000 typ host".to_owned(),
        ..Default::default()
    })
    .await?;

    let agent = ice_factory_a.last_agent().await.expect("agent exists");
    let received = agent.received_remote_candidates().await;
    assert!(received
        .iter()
        .any(|c| c.address == "192.0.2.1" && c.port == 52000));

    // The connection establishes regardless; channels are unaffected.
    expect_closed(connected_a, "connected after trickle").await;

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_offer_rejected() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    pc_a.create_data_channel("chat", None).await?;
    let offer = pc_a.create_offer(None).await?;
    pc_a.set_local_description(offer).await?;
    assert_eq!(pc_a.signaling_state(), RTCSignalingState::HaveLocalOffer);

    // A colliding remote offer is rejected without touching state.
    let colliding = pc_b.create_offer(None).await?;
    let result = pc_a.set_remote_description(colliding).await;
    assert_eq!(result.unwrap_err(), Error::ErrWrongSdpTypeOfferAfterOffer);
    assert_eq!(pc_a.signaling_state(), RTCSignalingState::HaveLocalOffer);
    assert!(pc_a.remote_description().await.is_none());

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_empty_string_send_round_trip() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    let chat = pc_a.create_data_channel("chat", None).await?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<(bool, Bytes)>(1);
    {
        let msg_tx = Arc::new(msg_tx);
        pc_b.on_data_channel(Box::new(move |d| {
            let msg_tx = Arc::clone(&msg_tx);
            Box::pin(async move {
                let msg_tx = Arc::clone(&msg_tx);
                d.on_message(Box::new(move |msg| {
                    let msg_tx = Arc::clone(&msg_tx);
                    Box::pin(async move {
                        let _ = msg_tx.send((msg.is_string, msg.data)).await;
                    })
                }))
                .await;
            })
        }))
        .await;
    }

    let (open_tx, mut open_rx) = mpsc::channel::<()>(1);
    {
        let open_tx = Arc::new(Mutex::new(Some(open_tx)));
        chat.on_open(Box::new(move || {
            Box::pin(async move {
                open_tx.lock().await.take();
            })
        }))
        .await;
    }

    signal_pair(&pc_a, &pc_b).await?;

    assert!(
        tokio::time::timeout(Duration::from_secs(5), open_rx.recv())
            .await
            .is_ok(),
        "channel never opened"
    );

    chat.send_text("").await?;

    let (is_string, data) = tokio::time::timeout(Duration::from_secs(5), msg_rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("message");
    assert!(is_string);
    assert!(data.is_empty(), "empty string arrives as an empty payload");

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_create_data_channel_association_timeout() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    // Media-only session: no application section, so no association
    // comes up after DTLS and nothing will answer an INIT.
    pc_a.add_track(MediaTrack::new("audio-track", "stream-a", MediaKind::Audio))
        .await?;

    let connected_a = until_connection_state(&pc_a, RTCPeerConnectionState::Connected).await;
    signal_pair(&pc_a, &pc_b).await?;
    expect_closed(connected_a, "connected").await;

    let start = tokio::time::Instant::now();
    let result = pc_a.create_data_channel("late", None).await;
    let waited = start.elapsed();

    let err = result.expect_err("channel creation must fail");
    assert!(
        err.to_string().contains("SCTP association timed out"),
        "unexpected error: {err}"
    );
    assert!(waited >= Duration::from_millis(1900), "must wait the full window");

    // The failure is local to the channel; the connection stays up.
    assert_eq!(pc_a.connection_state(), RTCPeerConnectionState::Connected);

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_create_data_channel_before_connect_is_pending() -> Result<()> {
    let (pc_a, _pc_b) = new_pair().await?;

    // No transports are up; this must register and return immediately.
    let d = tokio::time::timeout(
        Duration::from_millis(100),
        pc_a.create_data_channel("early", None),
    )
    .await
    .expect("create_data_channel must not block")?;

    assert_eq!(d.ready_state(), RTCDataChannelState::Connecting);

    pc_a.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_create_answer_without_remote_description() -> Result<()> {
    let (pc_a, _pc_b) = new_pair().await?;

    let result = pc_a.create_answer(None).await;
    assert_eq!(result.unwrap_err(), Error::ErrNoRemoteDescription);

    pc_a.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_relay_policy_requires_ice_servers() -> Result<()> {
    let (api, _api_b) = connected_api_pair();

    let pc = api
        .new_peer_connection(RTCConfiguration {
            ice_transport_policy: crate::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy::Relay,
            ..Default::default()
        })
        .await?;

    // The agent cannot be created at all: relay-only needs somewhere
    // to relay through.
    let result = pc.create_offer(None).await;
    assert_eq!(
        result.unwrap_err(),
        Error::ErrICEServersRequiredForRelayPolicy
    );

    pc.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_negotiation_needed_debounce_and_suppression() -> Result<()> {
    let (pc_a, _pc_b) = new_pair().await?;

    let (fired_tx, mut fired_rx) = mpsc::channel::<()>(4);
    pc_a.on_negotiation_needed(Box::new(move || {
        let fired_tx = fired_tx.clone();
        Box::pin(async move {
            let _ = fired_tx.send(()).await;
        })
    }))
    .await;

    // A burst of mutations within the quiescence window coalesces into
    // one event.
    pc_a.add_track(MediaTrack::new("t1", "s", MediaKind::Audio))
        .await?;
    pc_a.add_track(MediaTrack::new("t2", "s", MediaKind::Video))
        .await?;
    pc_a.create_data_channel("chat", None).await?;

    assert!(
        tokio::time::timeout(Duration::from_secs(1), fired_rx.recv())
            .await
            .is_ok(),
        "debounced negotiationneeded never fired"
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(300), fired_rx.recv())
            .await
            .is_err(),
        "burst must coalesce into a single event"
    );

    // While an offer is pending the event is suppressed...
    let offer = pc_a.create_offer(None).await?;
    pc_a.set_local_description(offer).await?;
    pc_a.add_track(MediaTrack::new("t3", "s", MediaKind::Audio))
        .await?;
    assert!(
        tokio::time::timeout(Duration::from_millis(300), fired_rx.recv())
            .await
            .is_err(),
        "suppressed while signaling state is not stable"
    );

    pc_a.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_is_idempotent_and_absorbing() -> Result<()> {
    let (pc_a, _pc_b) = new_pair().await?;

    pc_a.close().await?;
    assert_eq!(pc_a.connection_state(), RTCPeerConnectionState::Closed);
    assert_eq!(pc_a.signaling_state(), RTCSignalingState::Closed);

    // Second close is a no-op.
    pc_a.close().await?;
    assert_eq!(pc_a.connection_state(), RTCPeerConnectionState::Closed);

    // Operations on a closed connection fail without changing state.
    assert_eq!(
        pc_a.create_offer(None).await.unwrap_err(),
        Error::ErrConnectionClosed
    );
    assert_eq!(
        pc_a.create_data_channel("late", None).await.unwrap_err(),
        Error::ErrConnectionClosed
    );
    assert_eq!(pc_a.connection_state(), RTCPeerConnectionState::Closed);

    Ok(())
}

#[tokio::test]
async fn test_ordered_channel_preserves_message_order() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    let chat = pc_a.create_data_channel("ordered", None).await?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<String>(64);
    {
        let msg_tx = Arc::new(msg_tx);
        pc_b.on_data_channel(Box::new(move |d| {
            let msg_tx = Arc::clone(&msg_tx);
            Box::pin(async move {
                let msg_tx = Arc::clone(&msg_tx);
                d.on_message(Box::new(move |msg| {
                    let msg_tx = Arc::clone(&msg_tx);
                    Box::pin(async move {
                        let _ =
                            msg_tx.send(String::from_utf8_lossy(&msg.data).into_owned()).await;
                    })
                }))
                .await;
            })
        }))
        .await;
    }

    let (open_tx, mut open_rx) = mpsc::channel::<()>(1);
    {
        let open_tx = Arc::new(Mutex::new(Some(open_tx)));
        chat.on_open(Box::new(move || {
            Box::pin(async move {
                open_tx.lock().await.take();
            })
        }))
        .await;
    }

    signal_pair(&pc_a, &pc_b).await?;
    assert!(
        tokio::time::timeout(Duration::from_secs(5), open_rx.recv())
            .await
            .is_ok()
    );

    for i in 0..20 {
        chat.send_text(format!("message-{i}")).await?;
    }

    for i in 0..20 {
        let got = tokio::time::timeout(Duration::from_secs(5), msg_rx.recv())
            .await
            .expect("timed out")
            .expect("message");
        assert_eq!(got, format!("message-{i}"));
    }

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_oversize_send_fails_synchronously() -> Result<()> {
    let (pc_a, pc_b) = new_pair().await?;

    let chat = pc_a.create_data_channel("big", None).await?;
    let (open_tx, mut open_rx) = mpsc::channel::<()>(1);
    {
        let open_tx = Arc::new(Mutex::new(Some(open_tx)));
        chat.on_open(Box::new(move || {
            Box::pin(async move {
                open_tx.lock().await.take();
            })
        }))
        .await;
    }

    signal_pair(&pc_a, &pc_b).await?;
    assert!(
        tokio::time::timeout(Duration::from_secs(5), open_rx.recv())
            .await
            .is_ok()
    );

    let oversize = Bytes::from(vec![0u8; 70_000]); // past the mock's 65536
    assert_eq!(
        chat.send(&oversize).await.unwrap_err(),
        Error::ErrOutboundPacketTooLarge
    );
    // The failure is synchronous and leaves the channel usable.
    assert_eq!(chat.ready_state(), RTCDataChannelState::Open);
    chat.send(&Bytes::from_static(b"still works")).await?;

    pc_a.close().await?;
    pc_b.close().await?;
    Ok(())
}
