//! DER shapes of the basic OCSP response body
//! ([RFC 6960 section 4.2.1](https://datatracker.ietf.org/doc/html/rfc6960#section-4.2.1)).
//!
//! Requests and the outer `OCSPResponse` envelope come from `x509-ocsp`. The
//! response body is modelled here because real responders stray from strict
//! DER in places that do not matter for a status check: fractional seconds
//! in `GeneralizedTime`, reason codes outside the RFC 5280 table, responder
//! certificates that are never used.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use der::asn1::{Any, BitString, Null, ObjectIdentifier};
use der::{
    Choice, Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Sequence,
    Tag, Tagged, Writer,
};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::Extensions;
use x509_ocsp::{CertId, Version};

/// `id-pkix-ocsp-nonce`
pub const ID_PKIX_OCSP_NONCE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1.2");

/// `id-pkix-ocsp-basic`
pub const ID_PKIX_OCSP_BASIC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1.1");

/// `id-sha256`
pub const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

/// `GeneralizedTime` that also accepts a fractional-seconds part
/// (`YYYYMMDDHHMMSS[.f+]Z`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OcspTime(pub DateTime<Utc>);

impl OcspTime {
    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    fn render(&self) -> String {
        let mut text = self.0.format("%Y%m%d%H%M%S").to_string();
        let nanos = self.0.timestamp_subsec_nanos();
        if nanos != 0 {
            let fraction = format!("{:09}", nanos);
            text.push('.');
            text.push_str(fraction.trim_end_matches('0'));
        }
        text.push('Z');
        text
    }
}

fn digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_generalized(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let text = std::str::from_utf8(bytes).ok()?.strip_suffix('Z')?;
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    if whole.len() != 14 {
        return None;
    }

    let nanos = match fraction {
        Some(fraction) => {
            digits(fraction)?;
            // sub-nanosecond digits are dropped
            let padded = format!("{:0<9}", &fraction[..fraction.len().min(9)]);
            digits(&padded)?
        }
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(digits(&whole[0..4])?).ok()?,
        digits(&whole[4..6])?,
        digits(&whole[6..8])?,
    )?;
    let naive = date.and_hms_nano_opt(
        digits(&whole[8..10])?,
        digits(&whole[10..12])?,
        digits(&whole[12..14])?,
        nanos,
    )?;
    Some(Utc.from_utc_datetime(&naive))
}

impl<'a> DecodeValue<'a> for OcspTime {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let bytes = reader.read_vec(header.length)?;
        parse_generalized(&bytes)
            .map(Self)
            .ok_or_else(|| Self::TAG.value_error())
    }
}

impl EncodeValue for OcspTime {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(self.render().len())
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(self.render().as_bytes())
    }
}

impl FixedTag for OcspTime {
    const TAG: Tag = Tag::GeneralizedTime;
}

/// ```text
/// BasicOCSPResponse ::= SEQUENCE {
///   tbsResponseData          ResponseData,
///   signatureAlgorithm       AlgorithmIdentifier,
///   signature                BIT STRING,
///   certs                [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct BasicOcspResponse {
    pub tbs_response_data: ResponseData,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: BitString,

    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub certs: Option<Vec<Any>>,
}

/// ```text
/// ResponseData ::= SEQUENCE {
///    version              [0] EXPLICIT Version DEFAULT v1,
///    responderID             ResponderID,
///    producedAt              GeneralizedTime,
///    responses               SEQUENCE OF SingleResponse,
///    responseExtensions   [1] EXPLICIT Extensions OPTIONAL }
/// ```
///
/// `responderID` is kept undecoded.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ResponseData {
    #[asn1(
        context_specific = "0",
        default = "Default::default",
        tag_mode = "EXPLICIT"
    )]
    pub version: Version,
    pub responder_id: Any,
    pub produced_at: OcspTime,
    pub responses: Vec<SingleResponse>,

    #[asn1(context_specific = "1", optional = "true", tag_mode = "EXPLICIT")]
    pub response_extensions: Option<Extensions>,
}

/// ```text
/// SingleResponse ::= SEQUENCE {
///    certID                  CertID,
///    certStatus              CertStatus,
///    thisUpdate              GeneralizedTime,
///    nextUpdate              [0] EXPLICIT GeneralizedTime OPTIONAL,
///    singleExtensions        [1] EXPLICIT Extensions OPTIONAL }
/// ```
///
/// `certStatus` stays raw so that an unreadable status does not reject the
/// whole response; decode it with [`SingleResponse::status`].
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SingleResponse {
    pub cert_id: CertId,
    pub cert_status: Any,
    pub this_update: OcspTime,

    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub next_update: Option<OcspTime>,

    #[asn1(context_specific = "1", optional = "true", tag_mode = "EXPLICIT")]
    pub single_extensions: Option<Extensions>,
}

impl SingleResponse {
    pub fn status(&self) -> der::Result<CertStatus> {
        CertStatus::from_der(&self.cert_status.to_der()?)
    }
}

/// ```text
/// CertStatus ::= CHOICE {
///    good                [0] IMPLICIT NULL,
///    revoked             [1] IMPLICIT RevokedInfo,
///    unknown             [2] IMPLICIT UnknownInfo }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum CertStatus {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    Good(Null),

    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Revoked(RevokedInfo),

    #[asn1(context_specific = "2", tag_mode = "IMPLICIT")]
    Unknown(Null),
}

/// ```text
/// RevokedInfo ::= SEQUENCE {
///    revocationTime          GeneralizedTime,
///    revocationReason        [0] EXPLICIT CRLReason OPTIONAL }
/// ```
///
/// The reason is read as a raw value, see [`RevokedInfo::reason_value`].
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RevokedInfo {
    pub revocation_time: OcspTime,

    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub revocation_reason: Option<Any>,
}

impl RevokedInfo {
    /// Numeric value of an ENUMERATED reason, if one is present and fits in
    /// a `u32`.
    pub fn reason_value(&self) -> Option<u32> {
        let reason = self.revocation_reason.as_ref()?;
        if reason.tag() != Tag::Enumerated {
            return None;
        }
        match reason.value() {
            [b] if b & 0x80 == 0 => Some(u32::from(*b)),
            [0, rest @ ..] if !rest.is_empty() && rest.len() <= 4 && rest[0] & 0x80 != 0 => {
                Some(rest.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
            }
            bytes if !bytes.is_empty() && bytes.len() <= 4 && bytes[0] & 0x80 == 0 => {
                Some(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
            }
            _ => None,
        }
    }
}
