//! TLS setup for MMTP connections.
//!
//! Mix nodes authenticate each other at the packet layer — a server's
//! identity is its RSA packet key and `keyid`, published through the
//! (out-of-scope) directory, not a certificate chain. The TLS layer
//! underneath exists for link confidentiality and to keep casual
//! traffic analysis from fingerprinting connections, not for identity;
//! mirroring the original server, both sides present a freshly
//! generated self-signed certificate and neither validates the other's
//! chain. [`crate::cert_cache::CertFingerprintCache`] is what actually
//! pins an address to "the same cert we saw last time" across
//! reconnects.

use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::server::{ClientCertVerified, ClientCertVerifier};
use rustls::{Certificate, ClientConfig, DistinguishedName, Error as RustlsError, PrivateKey, ServerConfig, ServerName};

use crate::error::{Result, TransportError};

/// A self-signed certificate and its matching private key, both DER
/// encoded, freshly minted per node (or per key-rotation epoch).
pub struct NodeIdentity {
    pub cert_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

impl NodeIdentity {
    /// Generate a fresh self-signed identity. `subject` is cosmetic —
    /// since nothing validates it, it only shows up in logs/tooling.
    pub fn generate(subject: &str) -> Result<Self> {
        let cert = rcgen::generate_simple_self_signed(vec![subject.to_string()])
            .map_err(|e| TransportError::Cert(e.to_string()))?;
        let cert_der = cert.serialize_der().map_err(|e| TransportError::Cert(e.to_string()))?;
        let key_der = cert.serialize_private_key_der();
        Ok(NodeIdentity { cert_der, key_der })
    }

    /// SHA-1 fingerprint of this identity's certificate, the form
    /// [`crate::cert_cache::CertFingerprintCache`] stores and compares.
    pub fn fingerprint(&self) -> [u8; 20] {
        crate::cert_cache::fingerprint(&self.cert_der)
    }
}

#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }
}

#[derive(Debug)]
struct AcceptAnyClientCert;

impl ClientCertVerifier for AcceptAnyClientCert {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn client_auth_root_subjects(&self) -> Option<&[DistinguishedName]> {
        Some(&[])
    }

    fn verify_client_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _now: SystemTime,
    ) -> std::result::Result<ClientCertVerified, RustlsError> {
        Ok(ClientCertVerified::assertion())
    }
}

/// Build the server side's TLS config: requires (but does not verify)
/// a client certificate, so the server side of the handshake is as
/// mutually authenticated at the TLS layer as the client side.
pub fn server_config(identity: &NodeIdentity) -> Result<ServerConfig> {
    let cert = Certificate(identity.cert_der.clone());
    let key = PrivateKey(identity.key_der.clone());
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_client_cert_verifier(Arc::new(AcceptAnyClientCert))
        .with_single_cert(vec![cert], key)?;
    Ok(config)
}

/// Build the client side's TLS config: presents our own certificate
/// (so the peer's client-cert-verifier is satisfied) and accepts
/// whatever certificate the server presents, deferring trust to
/// [`crate::cert_cache::CertFingerprintCache`] at a layer above.
pub fn client_config(identity: &NodeIdentity) -> Result<ClientConfig> {
    let cert = Certificate(identity.cert_der.clone());
    let key = PrivateKey(identity.key_der.clone());
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_single_cert(vec![cert], key)?;
    Ok(config)
}

/// Guards the server's TLS context behind a single mutex held only
/// during the atomic pointer swap, per spec.md §5: "the TLS server
/// context is the only object mutable from outside the reactor
/// thread."
pub struct ServerContext {
    current: std::sync::Mutex<Arc<ServerConfig>>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        ServerContext { current: std::sync::Mutex::new(Arc::new(config)) }
    }

    pub fn current(&self) -> Arc<ServerConfig> {
        self.current.lock().expect("server context mutex poisoned").clone()
    }

    /// Rotate to a new TLS context; only newly accepted connections see it.
    pub fn rotate(&self, config: ServerConfig) {
        *self.current.lock().expect("server context mutex poisoned") = Arc::new(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_produces_consistent_fingerprint() {
        let id = NodeIdentity::generate("test-node").unwrap();
        assert_eq!(id.fingerprint(), id.fingerprint());
    }

    #[test]
    fn distinct_identities_have_distinct_fingerprints() {
        let a = NodeIdentity::generate("a").unwrap();
        let b = NodeIdentity::generate("b").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn server_and_client_configs_build_without_error() {
        let id = NodeIdentity::generate("node").unwrap();
        server_config(&id).unwrap();
        client_config(&id).unwrap();
    }

    #[test]
    fn rotate_replaces_the_visible_context() {
        let id = NodeIdentity::generate("node").unwrap();
        let ctx = ServerContext::new(server_config(&id).unwrap());
        let first = ctx.current();
        let id2 = NodeIdentity::generate("node-2").unwrap();
        ctx.rotate(server_config(&id2).unwrap());
        let second = ctx.current();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
