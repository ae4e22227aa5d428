//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

fn require_file(path: &Path, what: &str) -> Result<(), std::io::Error> {
    if path.exists() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{what} not found: {}", path.display()),
        ))
    }
}

/// Load the certificate chain and private key named by the listener config.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    let cert = Path::new(&config.cert_path);
    let key = Path::new(&config.key_path);
    require_file(cert, "Certificate file")?;
    require_file(key, "Private key file")?;

    tracing::info!(cert = %cert.display(), "Loading TLS certificate");
    RustlsConfig::from_pem_file(cert, key).await
}
