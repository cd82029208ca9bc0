use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::ice_transport::ice_candidate_type::RTCIceCandidateType;
use crate::ice_transport::ice_protocol::RTCIceProtocol;

/// Represents an ICE candidate. A candidate is unique within a session
/// by its (address, port, component) triple.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub address: String,
    pub protocol: RTCIceProtocol,
    pub port: u16,
    pub typ: RTCIceCandidateType,
    pub component: u16,
    pub related_address: String,
    pub related_port: u16,
    pub username_fragment: Option<String>,
}

/// Used to (de)serialize a candidate line exchanged over signaling.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment")]
    pub username_fragment: Option<String>,
}

impl RTCIceCandidate {
    /// marshal returns the candidate-attribute value as emitted in SDP
    /// and trickled over signaling, without the leading "candidate:".
    pub fn marshal(&self) -> String {
        let mut val = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            self.typ
        );

        if !self.related_address.is_empty() {
            val += format!(" raddr {} rport {}", self.related_address, self.related_port).as_str();
        }

        if let Some(username_fragment) = &self.username_fragment {
            if !username_fragment.is_empty() {
                val += format!(" ufrag {username_fragment}").as_str();
            }
        }

        val
    }

    pub fn to_json(&self) -> Result<RTCIceCandidateInit> {
        Ok(RTCIceCandidateInit {
            candidate: format!("candidate:{}", self.marshal()),
            sdp_mid: Some("".to_owned()),
            sdp_mline_index: Some(0u16),
            username_fragment: self.username_fragment.clone(),
        })
    }
}

impl fmt::Display for RTCIceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}{}",
            self.protocol, self.typ, self.address, self.port, self.related_address,
        )
    }
}

/// unmarshal_candidate parses a candidate-attribute value. The leading
/// "candidate:" prefix, if present, must be stripped by the caller.
pub fn unmarshal_candidate(raw: &str) -> Result<RTCIceCandidate> {
    let split: Vec<&str> = raw.split_whitespace().collect();
    if split.len() < 8 {
        return Err(Error::new(format!(
            "attribute not long enough to be ICE candidate ({})",
            split.len()
        )));
    }

    // Foundation
    let foundation = split[0].to_owned();

    // Component
    let component: u16 = split[1]
        .parse()
        .map_err(|e| Error::new(format!("could not parse component: {e}")))?;

    // Protocol
    let protocol = RTCIceProtocol::from(split[2]);
    if protocol == RTCIceProtocol::Unspecified {
        return Err(Error::ErrICEProtocolUnknown);
    }

    // Priority
    let priority: u32 = split[3]
        .parse()
        .map_err(|e| Error::new(format!("could not parse priority: {e}")))?;

    // Address
    let address = split[4].to_owned();

    // Port
    let port: u16 = split[5]
        .parse()
        .map_err(|e| Error::new(format!("could not parse port: {e}")))?;

    if split[6] != "typ" {
        return Err(Error::new(format!("expected \"typ\" got {}", split[6])));
    }

    let typ = RTCIceCandidateType::from_raw(split[7])?;

    let mut candidate = RTCIceCandidate {
        foundation,
        component,
        protocol,
        priority,
        address,
        port,
        typ,
        ..Default::default()
    };

    if split.len() <= 8 {
        return Ok(candidate);
    }

    let extensions = &split[8..];
    let mut i = 0;
    while i + 1 < extensions.len() {
        let (key, value) = (extensions[i], extensions[i + 1]);
        match key {
            "raddr" => candidate.related_address = value.to_owned(),
            "rport" => {
                candidate.related_port = value
                    .parse()
                    .map_err(|e| Error::new(format!("could not parse rport: {e}")))?
            }
            "ufrag" => candidate.username_fragment = Some(value.to_owned()),
            // generation, network-cost and friends are informational only
            _ => {}
        }
        i += 2;
    }

    Ok(candidate)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unmarshal_host_candidate() -> Result<()> {
        let c = unmarshal_candidate("1 1 UDP 2130706431 192.0.2.1 52000 typ host")?;

        assert_eq!(c.foundation, "1");
        assert_eq!(c.component, 1);
        assert_eq!(c.protocol, RTCIceProtocol::Udp);
        assert_eq!(c.priority, 2130706431);
        assert_eq!(c.address, "192.0.2.1");
        assert_eq!(c.port, 52000);
        assert_eq!(c.typ, RTCIceCandidateType::Host);

        Ok(())
    }

    #[test]
    fn test_unmarshal_relay_candidate_with_related() -> Result<()> {
        let c = unmarshal_candidate(
            "4207374051 1 udp 16777215 198.51.100.7 3478 typ relay raddr 192.0.2.1 rport 61665 generation 0",
        )?;

        assert_eq!(c.typ, RTCIceCandidateType::Relay);
        assert_eq!(c.related_address, "192.0.2.1");
        assert_eq!(c.related_port, 61665);

        Ok(())
    }

    #[test]
    fn test_unmarshal_with_ufrag() -> Result<()> {
        let c =
            unmarshal_candidate("1 1 udp 2130706431 10.0.0.5 40000 typ host ufrag aBcD")?;
        assert_eq!(c.username_fragment.as_deref(), Some("aBcD"));
        Ok(())
    }

    #[test]
    fn test_unmarshal_rejects_garbage() {
        assert!(unmarshal_candidate("").is_err());
        assert!(unmarshal_candidate("1 1 udp 500 1.2.3.4 80 nottyp host").is_err());
        assert!(unmarshal_candidate("1 1 tcp 500 1.2.3.4 80 typ host").is_err());
        assert!(unmarshal_candidate("1 1 udp 500 1.2.3.4 80 typ teleport").is_err());
    }

    #[test]
    fn test_candidate_marshal_round_trip() -> Result<()> {
        let c = RTCIceCandidate {
            foundation: "udpcandidate".to_owned(),
            component: 1,
            protocol: RTCIceProtocol::Udp,
            priority: 2130706431,
            address: "192.0.2.1".to_owned(),
            port: 52000,
            typ: RTCIceCandidateType::Srflx,
            related_address: "10.0.0.5".to_owned(),
            related_port: 51000,
            username_fragment: None,
        };

        let parsed = unmarshal_candidate(&c.marshal())?;
        assert_eq!(parsed, c);

        Ok(())
    }
}
