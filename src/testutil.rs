//! Hand-built certificates, CRLs and OCSP responses for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use der::asn1::{Any, BitString, GeneralizedTime, ObjectIdentifier, OctetString, SetOfVec};
use der::oid::AssociatedOid;
use der::{Decode, Encode, Tag};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::{CrlReason, ExtendedKeyUsage, KeyUsage, KeyUsages};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

use crate::error::Error;
use crate::ocsp::OcspTransport;
use crate::types::ocsp::{
    BasicOcspResponse, CertStatus, OcspTime, ResponseData, RevokedInfo, SingleResponse,
    ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE, ID_SHA256,
};
use x509_ocsp::{
    CertId, OcspRequest, OcspResponse, OcspResponseStatus, ResponseBytes,
    Version as OcspVersion,
};

pub const SIGNATURE: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];

pub const NCA_NAME: &[(&str, &str)] = &[
    ("2.5.4.6", "KZ"),
    ("2.5.4.3", "ҰЛТТЫҚ КУӘЛАНДЫРУШЫ ОРТАЛЫҚ (RSA)"),
];

pub fn oid(s: &str) -> ObjectIdentifier {
    ObjectIdentifier::new(s).unwrap()
}

pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn generalized(at: DateTime<Utc>) -> GeneralizedTime {
    GeneralizedTime::from_unix_duration(Duration::from_secs(at.timestamp() as u64)).unwrap()
}

/// One single-valued RDN per pair, in DER order (least specific first).
pub fn name(rdns: &[(&str, &str)]) -> Name {
    RdnSequence(
        rdns.iter()
            .map(|(kind, value)| {
                let atv = AttributeTypeAndValue {
                    oid: oid(kind),
                    value: Any::new(Tag::Utf8String, value.as_bytes()).unwrap(),
                };
                RelativeDistinguishedName(SetOfVec::try_from(vec![atv]).unwrap())
            })
            .collect(),
    )
}

fn sha256_with_rsa() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: oid("1.2.840.113549.1.1.11"),
        parameters: None,
    }
}

pub struct CertBuilder {
    serial: Vec<u8>,
    subject: Name,
    issuer: Name,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: Vec<u8>,
    extensions: Vec<Extension>,
}

impl CertBuilder {
    pub fn new() -> Self {
        Self {
            serial: vec![0x12, 0x34],
            subject: name(&[("2.5.4.3", "TEST")]),
            issuer: name(NCA_NAME),
            not_before: utc(2020, 1, 1),
            not_after: utc(2030, 1, 1),
            public_key: vec![0x30, 0x03, 0x02, 0x01, 0x05],
            extensions: Vec::new(),
        }
    }

    pub fn serial(mut self, serial: &[u8]) -> Self {
        self.serial = serial.to_vec();
        self
    }

    pub fn subject(mut self, rdns: &[(&str, &str)]) -> Self {
        self.subject = name(rdns);
        self
    }

    pub fn issuer(mut self, rdns: &[(&str, &str)]) -> Self {
        self.issuer = name(rdns);
        self
    }

    pub fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn public_key(mut self, key: &[u8]) -> Self {
        self.public_key = key.to_vec();
        self
    }

    pub fn key_usage(self, usage: KeyUsage) -> Self {
        let der = usage.to_der().unwrap();
        self.raw_extension(KeyUsage::OID, der)
    }

    pub fn extended_key_usage(self, oids: &[&str]) -> Self {
        let eku = ExtendedKeyUsage(oids.iter().map(|s| oid(s)).collect());
        let der = eku.to_der().unwrap();
        self.raw_extension(ExtendedKeyUsage::OID, der)
    }

    pub fn raw_extension(mut self, extn_id: ObjectIdentifier, value: Vec<u8>) -> Self {
        self.extensions.push(Extension {
            extn_id,
            critical: false,
            extn_value: OctetString::new(value).unwrap(),
        });
        self
    }

    pub fn build(self) -> Certificate {
        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial).unwrap(),
            signature: sha256_with_rsa(),
            issuer: self.issuer,
            validity: Validity {
                not_before: Time::GeneralTime(generalized(self.not_before)),
                not_after: Time::GeneralTime(generalized(self.not_after)),
            },
            subject: self.subject,
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: oid("1.2.840.113549.1.1.1"),
                    parameters: Some(Any::new(Tag::Null, Vec::<u8>::new()).unwrap()),
                },
                subject_public_key: BitString::from_bytes(&self.public_key).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if self.extensions.is_empty() {
                None
            } else {
                Some(self.extensions)
            },
        };
        Certificate {
            tbs_certificate,
            signature_algorithm: sha256_with_rsa(),
            signature: BitString::from_bytes(&SIGNATURE).unwrap(),
        }
    }
}

/// Self-issued national CA certificate.
pub fn issuer_cert() -> Certificate {
    CertBuilder::new()
        .serial(&[0x01])
        .subject(NCA_NAME)
        .issuer(NCA_NAME)
        .public_key(&[0x30, 0x03, 0x02, 0x01, 0x07])
        .key_usage(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
        .validity(utc(2015, 1, 1), utc(2035, 1, 1))
        .build()
}

/// Subject certificate issued by [`issuer_cert`].
pub fn subject_cert() -> Certificate {
    CertBuilder::new()
        .subject(&[
            ("2.5.4.6", "KZ"),
            ("2.5.4.5", "IIN900101300123"),
            ("2.5.4.4", "ТЕСТОВ"),
            ("2.5.4.3", "ТЕСТОВ ТЕСТ"),
        ])
        .key_usage(KeyUsage(KeyUsages::DigitalSignature | KeyUsages::NonRepudiation))
        .extended_key_usage(&["1.2.398.3.3.4.1.1"])
        .build()
}

pub fn crl(
    issuer: &Name,
    revoked: &[(&[u8], DateTime<Utc>, Option<CrlReason>)],
) -> CertificateList {
    let entries: Vec<RevokedCert> = revoked
        .iter()
        .map(|(serial, at, reason)| RevokedCert {
            serial_number: SerialNumber::new(serial).unwrap(),
            revocation_date: Time::GeneralTime(generalized(*at)),
            crl_entry_extensions: reason.map(|r| {
                vec![Extension {
                    extn_id: CrlReason::OID,
                    critical: false,
                    extn_value: OctetString::new(r.to_der().unwrap()).unwrap(),
                }]
            }),
        })
        .collect();
    CertificateList {
        tbs_cert_list: TbsCertList {
            version: Version::V2,
            signature: sha256_with_rsa(),
            issuer: issuer.clone(),
            this_update: Time::GeneralTime(generalized(utc(2024, 1, 1))),
            next_update: None,
            revoked_certificates: if entries.is_empty() { None } else { Some(entries) },
            crl_extensions: None,
        },
        signature_algorithm: sha256_with_rsa(),
        signature: BitString::from_bytes(&SIGNATURE).unwrap(),
    }
}

pub fn nonce_extension(nonce: &[u8]) -> Extension {
    Extension {
        extn_id: ID_PKIX_OCSP_NONCE,
        critical: false,
        extn_value: OctetString::new(OctetString::new(nonce).unwrap().to_der().unwrap()).unwrap(),
    }
}

pub fn revoked(at: DateTime<Utc>, reason: Option<CrlReason>) -> CertStatus {
    revoked_with_code(at, reason.map(|r| r as u8))
}

/// Revoked status carrying an arbitrary ENUMERATED reason value.
pub fn revoked_with_code(at: DateTime<Utc>, code: Option<u8>) -> CertStatus {
    CertStatus::Revoked(RevokedInfo {
        revocation_time: OcspTime(at),
        revocation_reason: code.map(|c| Any::new(Tag::Enumerated, vec![c]).unwrap()),
    })
}

fn responder_key_id() -> Any {
    // byKey [2] EXPLICIT KeyHash
    let mut der = vec![0xa2, 0x16, 0x04, 0x14];
    der.extend_from_slice(&[7u8; 20]);
    Any::from_der(&der).unwrap()
}

pub fn basic_response(statuses: Vec<CertStatus>, nonce: Option<&[u8]>) -> BasicOcspResponse {
    let responses = statuses
        .into_iter()
        .map(|cert_status| SingleResponse {
            cert_id: CertId {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: ID_SHA256,
                    parameters: None,
                },
                issuer_name_hash: OctetString::new(vec![0u8; 32]).unwrap(),
                issuer_key_hash: OctetString::new(vec![0u8; 32]).unwrap(),
                serial_number: SerialNumber::new(&[0x12, 0x34]).unwrap(),
            },
            cert_status: Any::from_der(&cert_status.to_der().unwrap()).unwrap(),
            this_update: OcspTime(utc(2024, 1, 1)),
            next_update: None,
            single_extensions: None,
        })
        .collect();
    BasicOcspResponse {
        tbs_response_data: ResponseData {
            version: OcspVersion::V1,
            responder_id: responder_key_id(),
            produced_at: OcspTime(utc(2024, 1, 1)),
            responses,
            response_extensions: nonce.map(|n| vec![nonce_extension(n)]),
        },
        signature_algorithm: sha256_with_rsa(),
        signature: BitString::from_bytes(&SIGNATURE).unwrap(),
        certs: None,
    }
}

pub fn wrap_basic(basic: &BasicOcspResponse) -> Vec<u8> {
    OcspResponse {
        response_status: OcspResponseStatus::Successful,
        response_bytes: Some(ResponseBytes {
            response_type: ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic.to_der().unwrap()).unwrap(),
        }),
    }
    .to_der()
    .unwrap()
}

pub fn ocsp_response(status: CertStatus, nonce: Option<&[u8]>) -> Vec<u8> {
    wrap_basic(&basic_response(vec![status], nonce))
}

/// Nonce carried by a DER-encoded request.
pub fn request_nonce(request: &[u8]) -> Vec<u8> {
    let request = OcspRequest::from_der(request).unwrap();
    let ext = request
        .tbs_request
        .request_extensions
        .unwrap()
        .into_iter()
        .find(|ext| ext.extn_id == ID_PKIX_OCSP_NONCE)
        .unwrap();
    OctetString::from_der(ext.extn_value.as_bytes())
        .unwrap()
        .as_bytes()
        .to_vec()
}

pub enum StubReply {
    /// Answer with the given status, echoing the request nonce.
    Echo(CertStatus),
    /// Answer with the given status and a nonce that was never sent.
    WrongNonce(CertStatus),
    Fail,
}

/// In-process responder recording every request it receives.
pub struct StubTransport {
    reply: StubReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<u8>>>,
}

impl StubTransport {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }
}

impl OcspTransport for StubTransport {
    fn send(&self, _url: &str, request: &[u8]) -> Result<Vec<u8>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.to_vec());
        match &self.reply {
            StubReply::Echo(status) => {
                let nonce = request_nonce(request);
                Ok(ocsp_response(status.clone(), Some(&nonce)))
            }
            StubReply::WrongNonce(status) => {
                let mut nonce = request_nonce(request);
                nonce[0] ^= 0xff;
                Ok(ocsp_response(status.clone(), Some(&nonce)))
            }
            StubReply::Fail => Err(Error::OcspTransport("connection refused".to_string())),
        }
    }
}
