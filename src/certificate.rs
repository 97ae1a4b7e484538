//! Structured descriptor of an X.509 certificate: decoded names, key-usage
//! role, holder roles and encoded key material.

use std::time::Duration;

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::oid::AssociatedOid;
use der::{Decode, Encode, Tag, Tagged};
use tracing::warn;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::crypto::encode_base64;
use crate::dn;
use crate::error::Error;
use crate::national_id;
use crate::types::name::NameAttributes;
use crate::types::report::{CertificateInfo, KeyUsageRole, KeyUser};

const fn oid(s: &str) -> ObjectIdentifier {
    ObjectIdentifier::new_unwrap(s)
}

/// Short names used when rendering a [`Name`] as a string.
const NAME_TYPES: &[(ObjectIdentifier, &str)] = &[
    (oid("2.5.4.3"), "CN"),
    (oid("2.5.4.4"), "SURNAME"),
    (oid("2.5.4.5"), "SERIALNUMBER"),
    (oid("2.5.4.6"), "C"),
    (oid("2.5.4.7"), "L"),
    (oid("2.5.4.8"), "S"),
    (oid("2.5.4.9"), "STREET"),
    (oid("2.5.4.10"), "O"),
    (oid("2.5.4.11"), "OU"),
    (oid("2.5.4.12"), "T"),
    (oid("2.5.4.42"), "G"),
    (oid("1.2.840.113549.1.9.1"), "E"),
    (oid("0.9.2342.19200300.100.1.25"), "DC"),
    (oid("0.9.2342.19200300.100.1.1"), "UID"),
];

/// Holder roles assigned by the national CA through extended key usage.
const KEY_USERS: &[(ObjectIdentifier, KeyUser)] = &[
    (oid("1.2.398.3.3.4.1.1"), KeyUser::Individual),
    (oid("1.2.398.3.3.4.1.2"), KeyUser::Organization),
    (oid("1.2.398.3.3.4.1.2.1"), KeyUser::Ceo),
    (oid("1.2.398.3.3.4.1.2.2"), KeyUser::CanSign),
    (oid("1.2.398.3.3.4.1.2.3"), KeyUser::CanSignFinancial),
    (oid("1.2.398.3.3.4.1.2.4"), KeyUser::Hr),
    (oid("1.2.398.3.3.4.1.2.5"), KeyUser::Employee),
    (oid("1.2.398.3.3.4.2"), KeyUser::NcaPrivileges),
    (oid("1.2.398.3.3.4.2.1"), KeyUser::NcaAdmin),
    (oid("1.2.398.3.3.4.2.2"), KeyUser::NcaManager),
    (oid("1.2.398.3.3.4.2.3"), KeyUser::NcaOperator),
    (oid("1.2.398.3.3.4.3"), KeyUser::Identification),
    (oid("1.2.398.3.3.4.3.1"), KeyUser::IdentificationCon),
    (oid("1.2.398.3.3.4.3.2"), KeyUser::IdentificationRemote),
    (oid("1.2.398.3.3.4.3.2.1"), KeyUser::IdentificationRemoteDigitalId),
];

const SIGNATURE_ALGORITHMS: &[(ObjectIdentifier, &str)] = &[
    (oid("1.2.840.113549.1.1.5"), "SHA1withRSA"),
    (oid("1.2.840.113549.1.1.11"), "SHA256withRSA"),
    (oid("1.2.840.113549.1.1.12"), "SHA384withRSA"),
    (oid("1.2.840.113549.1.1.13"), "SHA512withRSA"),
    (oid("1.2.840.10045.4.3.2"), "SHA256withECDSA"),
    (oid("1.2.840.10045.4.3.3"), "SHA384withECDSA"),
    (oid("1.2.398.3.10.1.1.1.2"), "ECGOST34310"),
    (oid("1.2.398.3.10.1.1.2.3.2"), "GOST3410-2015-512"),
];

/// Build the full descriptor of `cert`.
pub fn extract(cert: &Certificate) -> Result<CertificateInfo, Error> {
    let tbs = &cert.tbs_certificate;
    let public_key = tbs
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::CertificateFormat(format!("subject public key info: {}", e)))?;

    Ok(CertificateInfo {
        subject: subject_info(cert),
        issuer: issuer_info(cert),
        key_user: key_users(cert)?,
        key_usage: key_usage(cert),
        sign_alg: signature_algorithm_name(&cert.signature_algorithm.oid),
        not_before: time_to_datetime(&tbs.validity.not_before)?,
        not_after: time_to_datetime(&tbs.validity.not_after)?,
        public_key: encode_base64(&public_key),
        sign: encode_base64(cert.signature.raw_bytes()),
        serial_number: serial_number_decimal(&tbs.serial_number),
    })
}

/// Subject attributes, with birth date and gender decoded from the IIN.
pub fn subject_info(cert: &Certificate) -> NameAttributes {
    let mut attrs = dn::parse_lossy(&render_name(&cert.tbs_certificate.subject));
    national_id::apply(&mut attrs);
    attrs
}

pub fn issuer_info(cert: &Certificate) -> NameAttributes {
    dn::parse_lossy(&render_name(&cert.tbs_certificate.issuer))
}

/// Render `name` as an RFC 2253 string, most specific RDN first.
pub fn render_name(name: &Name) -> String {
    name.0
        .iter()
        .rev()
        .map(|rdn| {
            rdn.0
                .iter()
                .map(render_attribute)
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn render_attribute(atv: &AttributeTypeAndValue) -> String {
    let kind = NAME_TYPES
        .iter()
        .find(|(oid, _)| *oid == atv.oid)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| atv.oid.to_string());

    let value = match decode_string(atv) {
        Some(s) => escape_value(&s),
        None => match atv.value.to_der() {
            Ok(der) => format!("#{}", hex::encode(der)),
            Err(_) => String::new(),
        },
    };
    format!("{}={}", kind, value)
}

fn decode_string(atv: &AttributeTypeAndValue) -> Option<String> {
    let bytes = atv.value.value();
    match atv.value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::VisibleString
        | Tag::TeletexString => std::str::from_utf8(bytes).ok().map(str::to_string),
        Tag::BmpString => {
            if bytes.len() % 2 != 0 {
                return None;
            }
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units).collect::<Result<String, _>>().ok()
        }
        _ => None,
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            '\0' => out.push_str("\\00"),
            _ => out.push(c),
        }
    }
    out
}

fn find_extension(cert: &Certificate, oid: ObjectIdentifier) -> Option<&Extension> {
    cert.tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == oid)
}

/// Classify the key-usage bits: digitalSignature with nonRepudiation is a
/// signing key, digitalSignature with keyEncipherment an authentication key.
pub fn key_usage(cert: &Certificate) -> KeyUsageRole {
    let Some(ext) = find_extension(cert, KeyUsage::OID) else {
        return KeyUsageRole::Unknown;
    };
    let usage = match KeyUsage::from_der(ext.extn_value.as_bytes()) {
        Ok(usage) => usage,
        Err(e) => {
            warn!(error = %e, "Undecodable key usage extension");
            return KeyUsageRole::Unknown;
        }
    };
    if usage.digital_signature() && usage.non_repudiation() {
        KeyUsageRole::Sign
    } else if usage.digital_signature() && usage.key_encipherment() {
        KeyUsageRole::Auth
    } else {
        KeyUsageRole::Unknown
    }
}

/// Map the extended-key-usage OIDs through the national role table.
pub fn key_users(cert: &Certificate) -> Result<Vec<KeyUser>, Error> {
    let Some(ext) = find_extension(cert, ExtendedKeyUsage::OID) else {
        return Ok(Vec::new());
    };
    let eku = ExtendedKeyUsage::from_der(ext.extn_value.as_bytes())
        .map_err(|e| Error::CertificateFormat(format!("extended key usage: {}", e)))?;

    let mut users = Vec::new();
    for oid in &eku.0 {
        if let Some((_, user)) = KEY_USERS.iter().find(|(known, _)| known == oid) {
            if !users.contains(user) {
                users.push(*user);
            }
        }
    }
    Ok(users)
}

/// Name of a signature algorithm, or its dotted OID when not recognized.
pub fn signature_algorithm_name(oid: &ObjectIdentifier) -> String {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| oid.to_string())
}

/// Decimal rendering of a serial number.
pub fn serial_number_decimal(serial: &SerialNumber) -> String {
    // little-endian base-10 digits
    let mut digits: Vec<u8> = vec![0];
    for &byte in serial.as_bytes() {
        let mut carry = u32::from(byte);
        for d in digits.iter_mut() {
            let v = u32::from(*d) * 256 + carry;
            *d = (v % 10) as u8;
            carry = v / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    digits.iter().rev().map(|d| char::from(b'0' + d)).collect()
}

pub(crate) fn unix_to_datetime(since_epoch: Duration) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(since_epoch.as_secs()).ok()?;
    DateTime::from_timestamp(secs, since_epoch.subsec_nanos())
}

fn time_to_datetime(time: &Time) -> Result<DateTime<Utc>, Error> {
    unix_to_datetime(time.to_unix_duration())
        .ok_or_else(|| Error::CertificateFormat(format!("validity time out of range: {:?}", time)))
}
