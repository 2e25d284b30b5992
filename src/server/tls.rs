//! HTTPS termination with rustls.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig as RustlsConfig;
use tokio_rustls::TlsAcceptor;

use crate::server::config::TlsConfig;
use crate::server::error::Error;

/// Build an acceptor from the PEM files named in `config`.
pub fn load_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, Error> {
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut BufReader::new(File::open(&config.cert_path)?))
            .collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(Error::TlsError(format!("no certificate in {}", config.cert_path.display())));
    }

    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut BufReader::new(File::open(&config.key_path)?))?
            .ok_or_else(|| Error::TlsError(format!("no private key in {}", config.key_path.display())))?;

    let server_config = RustlsConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::TlsError(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
