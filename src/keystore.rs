//! Loading certificates and locating issuers.
//!
//! Plain PEM/DER certificates load without a secret. Password-protected
//! PKCS#12 containers (`.p12`/`.pfx`, as issued by NCA) go through
//! [`load_store`]. Only the certificate bags are read; private keys are left
//! encrypted.

use std::path::Path;

use der::Decode;
use tracing::debug;
use x509_cert::Certificate;

use crate::certificate::render_name;
use crate::error::Error;

/// Decode a PEM chain (one or more `CERTIFICATE` blocks) or a single DER
/// certificate.
pub fn load_certificates(bytes: &[u8]) -> Result<Vec<Certificate>, Error> {
    let is_pem = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(false, |start| bytes[start..].starts_with(b"-----BEGIN"));

    let certs = if is_pem {
        Certificate::load_pem_chain(bytes)
            .map_err(|e| Error::CertificateFormat(format!("PEM certificate: {}", e)))?
    } else {
        vec![Certificate::from_der(bytes)
            .map_err(|e| Error::CertificateFormat(format!("DER certificate: {}", e)))?]
    };

    if certs.is_empty() {
        return Err(Error::CertificateFormat(
            "no certificates found".to_string(),
        ));
    }
    Ok(certs)
}

pub fn load_certificates_from_path(path: &Path) -> Result<Vec<Certificate>, Error> {
    let bytes = std::fs::read(path)?;
    load_certificates(&bytes)
}

/// Load exactly one certificate, the first of the blob.
pub fn load_certificate(bytes: &[u8]) -> Result<Certificate, Error> {
    load_certificates(bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::CertificateFormat("no certificates found".to_string()))
}

/// Open a PKCS#12 container with `password` and collect its certificates.
///
/// A failed integrity check (wrong password, unsupported MAC digest), an
/// unsupported encryption scheme or a malformed container is reported as
/// [`Error::CertificateFormat`].
pub fn load_store(bytes: &[u8], password: &str) -> Result<TrustStore, Error> {
    let pfx = p12::PFX::parse(bytes)
        .map_err(|e| Error::CertificateFormat(format!("PKCS#12 container: {:?}", e)))?;
    if !pfx.verify_mac(password) {
        return Err(Error::CertificateFormat(
            "PKCS#12 integrity check failed: wrong password or unsupported MAC".to_string(),
        ));
    }

    let bags = pfx
        .cert_x509_bags(password)
        .map_err(|e| Error::CertificateFormat(format!("PKCS#12 certificates: {:?}", e)))?;
    let certificates = bags
        .iter()
        .map(|der| {
            Certificate::from_der(der)
                .map_err(|e| Error::CertificateFormat(format!("PKCS#12 certificate: {}", e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if certificates.is_empty() {
        return Err(Error::CertificateFormat(
            "PKCS#12 container holds no certificates".to_string(),
        ));
    }
    debug!(count = certificates.len(), "Opened PKCS#12 store");
    Ok(TrustStore::new(certificates))
}

pub fn load_store_from_path(path: &Path, password: &str) -> Result<TrustStore, Error> {
    let bytes = std::fs::read(path)?;
    load_store(&bytes, password)
}

/// In-memory set of CA certificates used to find the issuer of a
/// certificate under check.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: Vec<Certificate>,
}

impl TrustStore {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::new(load_certificates(bytes)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let store = Self::new(load_certificates_from_path(path)?);
        debug!(path = %path.display(), count = store.len(), "Loaded trust store");
        Ok(store)
    }

    pub fn add(&mut self, cert: Certificate) {
        self.certificates.push(cert);
    }

    /// First certificate whose subject is the issuer name of `cert`.
    pub fn find_issuer(&self, cert: &Certificate) -> Option<&Certificate> {
        let issuer = &cert.tbs_certificate.issuer;
        let found = self
            .certificates
            .iter()
            .find(|candidate| candidate.tbs_certificate.subject == *issuer);
        if found.is_none() {
            debug!(issuer = %render_name(issuer), "Issuer not in trust store");
        }
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.certificates.iter()
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}
