//! TLS client configuration for https targets.

use std::sync::Arc;

/// Client config trusting the platform's native root certificates.
///
/// Certificates that fail to load are skipped; an empty store only breaks
/// https targets, never plain http ones.
pub fn load_client_config() -> Arc<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::warn!(error = %error, "Failed to load a native root certificate");
    }
    let (added, ignored) = root_store.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Arc::new(config)
}
