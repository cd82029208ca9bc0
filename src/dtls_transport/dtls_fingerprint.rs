use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};

/// A fingerprint of a certificate, as advertised in SDP, used to
/// bind the DTLS handshake to the signaled identity.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCDtlsFingerprint {
    /// Hash function algorithm name, as registered in the
    /// 'Hash function Textual Names' registry.
    pub algorithm: String,

    /// Lowercase hex digest of the certificate, bytes separated by colons.
    pub value: String,
}

impl RTCDtlsFingerprint {
    /// Parses an `a=fingerprint` attribute value of the form
    /// `<algorithm> <hex>:<hex>:...`.
    pub(crate) fn try_from_attribute(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(Error::ErrSessionDescriptionInvalidFingerprint);
        }

        let digest = fields[1];
        if digest.is_empty()
            || !digest
                .split(':')
                .all(|pair| pair.len() == 2 && pair.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return Err(Error::ErrSessionDescriptionInvalidFingerprint);
        }

        Ok(RTCDtlsFingerprint {
            algorithm: fields[0].to_lowercase(),
            value: digest.to_lowercase(),
        })
    }

    /// Computes the digest of the DER certificate using this
    /// fingerprint's algorithm and compares case-insensitively.
    pub(crate) fn matches_certificate(&self, cert_der: &[u8]) -> Result<bool> {
        let computed = fingerprint_of(&self.algorithm, cert_der)?;
        Ok(computed.eq_ignore_ascii_case(&self.value))
    }
}

/// Renders the digest of `cert_der` under `algorithm` as colon separated
/// lowercase hex pairs. Only the SHA-2 family is supported.
pub(crate) fn fingerprint_of(algorithm: &str, cert_der: &[u8]) -> Result<String> {
    let digest: Vec<u8> = match algorithm.to_lowercase().as_str() {
        "sha-256" => Sha256::digest(cert_der).to_vec(),
        "sha-384" => Sha384::digest(cert_der).to_vec(),
        "sha-512" => Sha512::digest(cert_der).to_vec(),
        _ => return Err(Error::ErrDtlsFingerprintDigestNotSupported),
    };

    let pairs: Vec<String> = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(pairs.join(":"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fingerprint_parse() -> Result<()> {
        let fp = RTCDtlsFingerprint::try_from_attribute(
            "sha-256 1B:D2:AB:12:00:0D:07:9A:8E:B2:83:CC:E4:76:6C:DE:9C:C9:9B:C8:9C:12:B8:2F:21:3F:75:A8:4E:4B:87:4E",
        )?;
        assert_eq!(fp.algorithm, "sha-256");
        assert!(fp.value.starts_with("1b:d2:ab"));

        Ok(())
    }

    #[test]
    fn test_fingerprint_parse_rejects_malformed() {
        for raw in [
            "sha-256",
            "sha-256 xx:yy",
            "sha-256 1BD2AB",
            "sha-256 1B:D2:ABC",
            "",
        ] {
            assert!(
                RTCDtlsFingerprint::try_from_attribute(raw).is_err(),
                "should reject {raw:?}"
            );
        }
    }

    #[test]
    fn test_fingerprint_match_is_case_insensitive() -> Result<()> {
        let cert = b"not-actually-a-certificate";
        let value = fingerprint_of("sha-256", cert)?;

        let fp = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: value.to_uppercase(),
        };
        assert!(fp.matches_certificate(cert)?);

        // One flipped hex pair fails the match.
        let mut bad = value.clone();
        bad.replace_range(0..2, if &value[0..2] == "aa" { "ab" } else { "aa" });
        let fp = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: bad,
        };
        assert!(!fp.matches_certificate(cert)?);

        Ok(())
    }

    #[test]
    fn test_fingerprint_unknown_digest() {
        let fp = RTCDtlsFingerprint {
            algorithm: "md5".to_owned(),
            value: "aa:bb".to_owned(),
        };
        assert_eq!(
            fp.matches_certificate(b"cert").unwrap_err(),
            Error::ErrDtlsFingerprintDigestNotSupported
        );
    }
}
