use std::time::SystemTime;

use bytes::Bytes;
use rcgen::{CertificateParams, KeyPair};
use sha2::{Digest, Sha256};

use crate::dtls_transport::dtls_fingerprint::RTCDtlsFingerprint;
use crate::error::Result;
use crate::peer_connection::math_rand_alpha;

/// Certificate represents an x509Cert used to authenticate WebRTC
/// communications: the DTLS handshake presents it and the SDP carries
/// its fingerprint.
pub struct RTCCertificate {
    pub(crate) stats_id: String,
    certificate_der: Bytes,
    private_key_der: Bytes,
    expires: SystemTime,
}

/// Equals determines if two certificates are identical by comparing
/// only the leaf certificate.
impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.certificate_der == other.certificate_der
    }
}

impl RTCCertificate {
    /// Generates a new certificate from the given parameters, to be
    /// presented by DTLS to authenticate this peer.
    pub fn from_params(params: CertificateParams, key_pair: KeyPair) -> Result<Self> {
        let expires: SystemTime = params.not_after.into();
        let x509_cert = params.self_signed(&key_pair)?;

        Ok(RTCCertificate {
            stats_id: format!("certificate-{}", math_rand_alpha(16)),
            certificate_der: Bytes::from(x509_cert.der().to_vec()),
            private_key_der: Bytes::from(key_pair.serialize_der()),
            expires,
        })
    }

    /// Causes the creation of an X.509 certificate for the provided
    /// private key.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        let params = CertificateParams::new(vec![math_rand_alpha(16)])?;
        RTCCertificate::from_params(params, key_pair)
    }

    /// Creates a fresh certificate from a string containing PEM blocks
    /// for the x509 certificate; the key pair signs the regenerated
    /// certificate.
    #[cfg(feature = "pem")]
    pub fn from_pem(pem_str: &str, key_pair: KeyPair) -> Result<Self> {
        let params = CertificateParams::from_ca_cert_pem(pem_str)?;
        RTCCertificate::from_params(params, key_pair)
    }

    /// Serializes the certificate (not the private key) in PEM format.
    #[cfg(feature = "pem")]
    pub fn serialize_pem(&self) -> String {
        pem::encode(&pem::Pem::new(
            "CERTIFICATE".to_owned(),
            self.certificate_der.to_vec(),
        ))
    }

    /// Returns the timestamp after which this certificate is no longer
    /// valid.
    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    /// DER encoding of the leaf certificate.
    pub fn der(&self) -> Bytes {
        self.certificate_der.clone()
    }

    /// PKCS#8 DER encoding of the private key.
    pub(crate) fn private_key_der(&self) -> Bytes {
        self.private_key_der.clone()
    }

    /// Returns certificate fingerprints, one of which is computed with
    /// the digest algorithm used in the certificate signature.
    pub fn get_fingerprints(&self) -> Result<Vec<RTCDtlsFingerprint>> {
        let hashed = Sha256::digest(&self.certificate_der);
        let values: Vec<String> = hashed.iter().map(|x| format!("{x:02x}")).collect();

        Ok(vec![RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: values.join(":"),
        }])
    }
}
