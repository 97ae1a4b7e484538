//! OCSP client: request construction, transport and response evaluation.
//!
//! Every [`OcspClient::check`] draws a fresh nonce, sends one unsigned request
//! for a single certificate and refuses any response whose echoed nonce
//! differs from the one sent. Responder signatures are not verified.

use std::sync::Arc;

use der::asn1::{Any, OctetString};
use der::{Decode, Encode, Tag};
use spki::AlgorithmIdentifierOwned;
use tracing::{debug, warn};
use x509_cert::ext::Extension;
use x509_cert::Certificate;
use x509_ocsp::{
    CertId, OcspRequest, OcspResponse, OcspResponseStatus, Request, TbsRequest, Version,
};

use crate::certificate::serial_number_decimal;
use crate::crypto::{sha256, NonceSource};
use crate::error::Error;
use crate::types::ocsp::{
    BasicOcspResponse, CertStatus, ResponseData, RevokedInfo, ID_PKIX_OCSP_BASIC,
    ID_PKIX_OCSP_NONCE, ID_SHA256,
};
use crate::types::revocation::{OcspStatus, RevocationReason};

#[cfg(feature = "fetch")]
use crate::config::PkiConfig;
#[cfg(feature = "fetch")]
use crate::crypto::SecureNonceSource;

pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
pub const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

/// Delivers a DER-encoded request to a responder and returns the raw answer.
pub trait OcspTransport: Send + Sync {
    fn send(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, Error>;
}

/// HTTP POST transport backed by a pooled blocking client.
#[cfg(feature = "fetch")]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    pub fn new(timeout: std::time::Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::OcspTransport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "fetch")]
impl OcspTransport for HttpTransport {
    fn send(&self, url: &str, request: &[u8]) -> Result<Vec<u8>, Error> {
        use reqwest::header::{ACCEPT, CONTENT_TYPE};

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .header(ACCEPT, OCSP_RESPONSE_CONTENT_TYPE)
            .body(request.to_vec())
            .send()
            .map_err(|e| Error::OcspTransport(format!("Failed to reach {}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::OcspTransport(format!(
                "HTTP {} from {}",
                resp.status(),
                url
            )));
        }

        let body = resp.bytes().map_err(|e| {
            Error::OcspTransport(format!("Failed to read response from {}: {}", url, e))
        })?;
        Ok(body.to_vec())
    }
}

/// Checks certificate status against one OCSP responder.
pub struct OcspClient {
    responder_url: String,
    transport: Arc<dyn OcspTransport>,
    nonces: Arc<dyn NonceSource>,
}

impl OcspClient {
    pub fn new(
        responder_url: impl Into<String>,
        transport: Arc<dyn OcspTransport>,
        nonces: Arc<dyn NonceSource>,
    ) -> Self {
        Self {
            responder_url: responder_url.into(),
            transport,
            nonces,
        }
    }

    /// HTTP client for the configured responder with its own nonce source.
    #[cfg(feature = "fetch")]
    pub fn from_config(config: &PkiConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(config.ocsp_timeout())?;
        Ok(Self::new(
            config.ocsp_url.clone(),
            Arc::new(transport),
            Arc::new(SecureNonceSource::new()),
        ))
    }

    pub fn responder_url(&self) -> &str {
        &self.responder_url
    }

    /// Ask the responder for the status of `cert`, issued by `issuer`.
    pub fn check(&self, cert: &Certificate, issuer: &Certificate) -> Result<OcspStatus, Error> {
        let nonce = self.nonces.generate();
        let request = build_request(cert, issuer, &nonce)?;
        let der = request
            .to_der()
            .map_err(|e| Error::OcspEncoding(format!("request: {}", e)))?;

        debug!(
            url = %self.responder_url,
            serial = %serial_number_decimal(&cert.tbs_certificate.serial_number),
            "Sending OCSP request"
        );
        let response = self.transport.send(&self.responder_url, &der)?;
        let status = process_response(&response, &nonce)?;
        debug!(status = ?status.result(), "OCSP response accepted");
        Ok(status)
    }
}

/// Build a single-certificate request carrying `nonce`.
pub fn build_request(
    cert: &Certificate,
    issuer: &Certificate,
    nonce: &[u8],
) -> Result<OcspRequest, Error> {
    let encoding = |e: der::Error| Error::OcspEncoding(format!("request: {}", e));

    let issuer_name = issuer.tbs_certificate.subject.to_der().map_err(encoding)?;
    let issuer_key = issuer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();

    let req_cert = CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA256,
            parameters: Some(Any::new(Tag::Null, Vec::<u8>::new()).map_err(encoding)?),
        },
        issuer_name_hash: OctetString::new(sha256(&issuer_name)).map_err(encoding)?,
        issuer_key_hash: OctetString::new(sha256(issuer_key)).map_err(encoding)?,
        serial_number: cert.tbs_certificate.serial_number.clone(),
    };

    // extnValue holds the DER of an OCTET STRING wrapping the nonce
    let wrapped = OctetString::new(nonce)
        .and_then(|inner| inner.to_der())
        .map_err(encoding)?;
    let nonce_ext = Extension {
        extn_id: ID_PKIX_OCSP_NONCE,
        critical: false,
        extn_value: OctetString::new(wrapped).map_err(encoding)?,
    };

    Ok(OcspRequest {
        tbs_request: TbsRequest {
            version: Version::V1,
            requestor_name: None,
            request_list: vec![Request {
                req_cert,
                single_request_extensions: None,
            }],
            request_extensions: Some(vec![nonce_ext]),
        },
        optional_signature: None,
    })
}

/// Evaluate a DER-encoded response to a request that carried `nonce`.
pub fn process_response(response: &[u8], nonce: &[u8]) -> Result<OcspStatus, Error> {
    let encoding = |e: der::Error| Error::OcspEncoding(format!("response: {}", e));

    let response = OcspResponse::from_der(response).map_err(encoding)?;
    if response.response_status != OcspResponseStatus::Successful {
        debug!(status = ?response.response_status, "OCSP responder did not answer successfully");
        return Ok(OcspStatus::Unknown);
    }

    let bytes = response.response_bytes.ok_or_else(|| {
        Error::OcspEncoding("successful response without response bytes".to_string())
    })?;
    if bytes.response_type != ID_PKIX_OCSP_BASIC {
        return Err(Error::OcspEncoding(format!(
            "unsupported response type {}",
            bytes.response_type
        )));
    }

    let basic = BasicOcspResponse::from_der(bytes.response.as_bytes()).map_err(encoding)?;
    let data = basic.tbs_response_data;
    verify_nonce(&data, nonce)?;

    let single = data
        .responses
        .first()
        .ok_or_else(|| Error::OcspEncoding("response contains no statuses".to_string()))?;

    let status = match single.status() {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "Unreadable OCSP certificate status, treating as unknown");
            return Ok(OcspStatus::Unknown);
        }
    };

    Ok(match &status {
        CertStatus::Good(_) => OcspStatus::Active,
        CertStatus::Revoked(info) => OcspStatus::Revoked {
            revocation_time: info.revocation_time.to_datetime(),
            reason: reason_code(info),
        },
        CertStatus::Unknown(_) => OcspStatus::Unknown,
    })
}

/// RFC 5280 reason code of a revocation; missing or unreadable reasons and
/// codes outside the table read as 0 (unspecified).
fn reason_code(info: &RevokedInfo) -> u32 {
    match info.reason_value() {
        Some(code) if RevocationReason::from_code(code).is_some() => code,
        Some(code) => {
            warn!(code, "Unassigned OCSP revocation reason, using unspecified");
            0
        }
        None => {
            if info.revocation_reason.is_some() {
                warn!("Unreadable OCSP revocation reason, using unspecified");
            }
            0
        }
    }
}

fn verify_nonce(data: &ResponseData, sent: &[u8]) -> Result<(), Error> {
    let echoed = data
        .response_extensions
        .iter()
        .flatten()
        .find(|ext| ext.extn_id == ID_PKIX_OCSP_NONCE);

    let Some(ext) = echoed else {
        debug!("OCSP response carries no nonce");
        return Ok(());
    };

    let echoed = OctetString::from_der(ext.extn_value.as_bytes())
        .map_err(|e| Error::OcspEncoding(format!("response nonce: {}", e)))?;
    if echoed.as_bytes() != sent {
        return Err(Error::OcspNonceMismatch);
    }
    Ok(())
}
