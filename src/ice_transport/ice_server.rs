use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Describes a single STUN or TURN server that can be used by
/// the ICE agent to establish a connection with a peer.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl RTCIceServer {
    pub(crate) fn parse_url(&self, url_str: &str) -> Result<url::Url> {
        // stun:host:port is an opaque URL, normalize so the host parses
        let normalized = url_str.replacen(':', "://", 1);
        url::Url::parse(&normalized).map_err(|e| Error::new(format!("invalid ICE server URL: {e}")))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for url_str in &self.urls {
            let url = self.parse_url(url_str)?;
            match url.scheme() {
                "stun" | "stuns" => {}
                "turn" | "turns" => {
                    // https://www.w3.org/TR/webrtc/#set-the-configuration (step #11.3.2)
                    if self.username.is_empty() || self.credential.is_empty() {
                        return Err(Error::ErrNoTurnCredentials);
                    }
                }
                _ => {
                    return Err(Error::new(format!(
                        "unsupported ICE server scheme: {}",
                        url.scheme()
                    )))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_server_validate_success() {
        let tests = vec![
            RTCIceServer {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                ..Default::default()
            },
            RTCIceServer {
                urls: vec!["turn:turn.example.org:3478".to_owned()],
                username: "unittest".to_owned(),
                credential: "placeholder".to_owned(),
            },
        ];

        for server in tests {
            assert!(server.validate().is_ok());
        }
    }

    #[test]
    fn test_ice_server_validate_failure() {
        let tests = vec![
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    ..Default::default()
                },
                Error::ErrNoTurnCredentials,
            ),
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    username: "unittest".to_owned(),
                    credential: String::new(),
                },
                Error::ErrNoTurnCredentials,
            ),
        ];

        for (server, expected_err) in tests {
            let result = server.validate();
            if let Err(err) = result {
                assert_eq!(err, expected_err, "testCase: {server:?}");
            } else {
                panic!("expected error, but got ok");
            }
        }
    }
}
