use std::io::Cursor;

use sdp::description::session::SessionDescription;

use super::*;
use crate::peer_connection::peer_connection_test::new_pair;
use crate::track::{MediaKind, MediaTrack};

pub(crate) fn parse_sdp(raw: &str) -> SessionDescription {
    let mut reader = Cursor::new(raw.as_bytes());
    SessionDescription::unmarshal(&mut reader).expect("invalid test SDP")
}

const BASE_SESSION: &str = "v=0\r\n\
                            o=- 884433216 2 IN IP4 127.0.0.1\r\n\
                            s=-\r\n\
                            t=0 0\r\n";

fn with_media(media: &str) -> String {
    format!("{BASE_SESSION}{media}")
}

#[test]
fn test_extract_ice_details_folds_across_sections() -> Result<()> {
    let sdp = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=mid:0\r\n\
         a=ice-ufrag:frag\r\n\
         a=ice-pwd:password\r\n\
         a=candidate:1 1 udp 2130706431 10.0.0.5 40000 typ host\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=mid:1\r\n\
         a=ice-ufrag:frag\r\n\
         a=ice-pwd:password\r\n\
         a=candidate:2 1 udp 1694498815 192.0.2.7 3478 typ srflx raddr 10.0.0.5 rport 40000\r\n",
    );

    let (ufrag, pwd, candidates) = extract_ice_details(&parse_sdp(&sdp))?;
    assert_eq!(ufrag, "frag");
    assert_eq!(pwd, "password");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[1].typ, crate::ice_transport::ice_candidate_type::RTCIceCandidateType::Srflx);

    Ok(())
}

#[test]
fn test_extract_ice_details_missing_and_conflicting() {
    let missing_ufrag = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=ice-pwd:password\r\n",
    );
    assert_eq!(
        extract_ice_details(&parse_sdp(&missing_ufrag)).unwrap_err(),
        Error::ErrSessionDescriptionMissingIceUfrag
    );

    let missing_pwd = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=ice-ufrag:frag\r\n",
    );
    assert_eq!(
        extract_ice_details(&parse_sdp(&missing_pwd)).unwrap_err(),
        Error::ErrSessionDescriptionMissingIcePwd
    );

    let conflicting = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=ice-ufrag:frag-one\r\n\
         a=ice-pwd:password\r\n\
         m=video 9 UDP/TLS/RTP/SAVP 96\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=ice-ufrag:frag-two\r\n\
         a=ice-pwd:password\r\n",
    );
    assert_eq!(
        extract_ice_details(&parse_sdp(&conflicting)).unwrap_err(),
        Error::ErrSessionDescriptionConflictingIceUfrag
    );
}

#[test]
fn test_extract_fingerprint_cases() {
    let good = with_media(
        "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=fingerprint:sha-256 AA:BB:CC:DD\r\n",
    );
    let fp = extract_fingerprint(&parse_sdp(&good)).expect("fingerprint");
    assert_eq!(fp.algorithm, "sha-256");
    assert_eq!(fp.value, "aa:bb:cc:dd");

    let missing = with_media(
        "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n",
    );
    assert_eq!(
        extract_fingerprint(&parse_sdp(&missing)).unwrap_err(),
        Error::ErrDtlsFingerprintMissing
    );

    let unsupported_digest = with_media(
        "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=fingerprint:md5 AA:BB\r\n",
    );
    assert_eq!(
        extract_fingerprint(&parse_sdp(&unsupported_digest)).unwrap_err(),
        Error::ErrDtlsFingerprintDigestNotSupported
    );

    let malformed = with_media(
        "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=fingerprint:sha-256\r\n",
    );
    assert_eq!(
        extract_fingerprint(&parse_sdp(&malformed)).unwrap_err(),
        Error::ErrSessionDescriptionInvalidFingerprint
    );

    let conflicting = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=fingerprint:sha-256 AA:AA\r\n\
         m=video 9 UDP/TLS/RTP/SAVP 96\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=fingerprint:sha-256 BB:BB\r\n",
    );
    assert_eq!(
        extract_fingerprint(&parse_sdp(&conflicting)).unwrap_err(),
        Error::ErrSessionDescriptionConflictingFingerprints
    );
}

#[test]
fn test_extract_application_media_info() -> Result<()> {
    let modern = with_media(
        "m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=sctp-port:5999\r\n\
         a=max-message-size:131072\r\n",
    );
    let info = extract_application_media_info(&parse_sdp(&modern))?.expect("application section");
    assert_eq!(info.sctp_port, 5999);
    assert_eq!(info.max_message_size, Some(131072));

    // Legacy profile carries the port in the format list.
    let legacy = with_media(
        "m=application 54111 DTLS/SCTP 5000\r\n\
         c=IN IP4 0.0.0.0\r\n",
    );
    let info = extract_application_media_info(&parse_sdp(&legacy))?.expect("application section");
    assert_eq!(info.sctp_port, 5000);
    assert_eq!(info.max_message_size, None);

    let unsupported = with_media(
        "m=application 9 TCP/DTLS/SCTP webrtc-datachannel\r\n\
         c=IN IP4 0.0.0.0\r\n",
    );
    assert_eq!(
        extract_application_media_info(&parse_sdp(&unsupported)).unwrap_err(),
        Error::ErrDataChannelTransportNotSupported
    );

    let no_application = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0\r\n\
         c=IN IP4 0.0.0.0\r\n",
    );
    assert_eq!(
        extract_application_media_info(&parse_sdp(&no_application))?,
        None
    );

    Ok(())
}

#[test]
fn test_codecs_from_media_description() -> Result<()> {
    let sdp = with_media(
        "m=audio 9 UDP/TLS/RTP/SAVP 0 111\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=rtpmap:111 opus/48000/2\r\n\
         a=fmtp:111 minptime=10;useinbandfec=1\r\n",
    );
    let parsed = parse_sdp(&sdp);
    let codecs = codecs_from_media_description(&parsed.media_descriptions[0])?;

    assert_eq!(codecs.len(), 2);
    // Static payload type 0 resolves without an rtpmap.
    assert_eq!(codecs[0].payload_type, 0);
    assert_eq!(codecs[0].capability.mime_type, "audio/pcmu");
    assert_eq!(codecs[1].payload_type, 111);
    assert_eq!(codecs[1].capability.mime_type, "audio/opus");
    assert_eq!(codecs[1].capability.channels, 2);
    assert_eq!(codecs[1].capability.sdp_fmtp_line, "minptime=10;useinbandfec=1");

    Ok(())
}

#[test]
fn test_extmaps_and_direction_from_media_description() {
    let sdp = with_media(
        "m=video 9 UDP/TLS/RTP/SAVP 96\r\n\
         c=IN IP4 0.0.0.0\r\n\
         a=recvonly\r\n\
         a=extmap:3 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
         a=extmap:5/recvonly urn:3gpp:video-orientation\r\n",
    );
    let parsed = parse_sdp(&sdp);
    let media = &parsed.media_descriptions[0];

    assert_eq!(get_peer_direction(media), RTCRtpTransceiverDirection::Recvonly);

    let extmaps = extmaps_from_media_description(media);
    assert_eq!(extmaps.len(), 2);
    assert_eq!(extmaps[0].id, 3);
    assert_eq!(extmaps[0].uri, "urn:ietf:params:rtp-hdrext:sdes:mid");
    assert_eq!(extmaps[1].id, 5);
}

#[tokio::test]
async fn test_offer_marshal_parse_round_trip() -> crate::error::Result<()> {
    let (pc, _other) = new_pair().await?;

    pc.add_track(MediaTrack::new("audio", "stream", MediaKind::Audio))
        .await?;
    pc.create_data_channel("chat", None).await?;

    let offer = pc.create_offer(None).await?;

    // Parse ∘ serialize is the identity on anything we generate.
    let reparsed = parse_sdp(&offer.sdp);
    assert_eq!(reparsed.marshal(), offer.sdp);

    // Spot-check the attributes the wire format mandates.
    assert!(offer.sdp.contains("a=group:BUNDLE 0 1"));
    assert!(offer.sdp.contains("a=rtcp-mux"));
    assert!(offer.sdp.contains("a=setup:actpass"));
    assert!(offer.sdp.contains("a=ice-options:ice2,trickle"));
    assert!(offer.sdp.contains("a=sctp-port:5000"));
    assert!(offer.sdp.contains("a=max-message-size:262144"));
    assert!(offer.sdp.contains("webrtc-datachannel"));
    assert!(offer.sdp.contains("UDP/TLS/RTP/SAVP"));

    pc.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_session_id_stable_across_descriptions() -> crate::error::Result<()> {
    let (pc, _other) = new_pair().await?;

    pc.create_data_channel("chat", None).await?;

    let first = pc.create_offer(None).await?;
    let second = pc.create_offer(None).await?;

    let first_parsed = parse_sdp(&first.sdp);
    let second_parsed = parse_sdp(&second.sdp);

    assert_eq!(
        first_parsed.origin.session_id,
        second_parsed.origin.session_id
    );
    assert!(second_parsed.origin.session_version > first_parsed.origin.session_version);

    pc.close().await?;
    Ok(())
}

#[test]
fn test_update_sdp_origin() {
    let mut origin = Origin::default();

    let mut first = SessionDescription::new_jsep_session_description(false);
    update_sdp_origin(&mut origin, &mut first);
    assert_ne!(origin.session_id, 0);

    let mut second = SessionDescription::new_jsep_session_description(false);
    let second_random_id = second.origin.session_id;
    update_sdp_origin(&mut origin, &mut second);

    assert_eq!(second.origin.session_id, first.origin.session_id);
    assert_ne!(second.origin.session_id, second_random_id);
    assert_eq!(second.origin.session_version, first.origin.session_version + 1);
}
