use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::name::NameAttributes;
use crate::types::revocation::{CrlResult, CrlStatus, OcspResult, OcspStatus};

/// Role derived from the key-usage bits of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyUsageRole {
    /// digitalSignature + nonRepudiation
    Sign,
    /// digitalSignature + keyEncipherment
    Auth,
    Unknown,
}

/// Holder role granted through an extended-key-usage OID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyUser {
    Individual,
    Organization,
    Ceo,
    CanSign,
    CanSignFinancial,
    Hr,
    Employee,
    NcaPrivileges,
    NcaAdmin,
    NcaManager,
    NcaOperator,
    Identification,
    IdentificationCon,
    IdentificationRemote,
    IdentificationRemoteDigitalId,
}

/// Identity and key descriptor of one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub subject: NameAttributes,
    pub issuer: NameAttributes,
    pub key_user: Vec<KeyUser>,
    pub key_usage: KeyUsageRole,
    pub sign_alg: String,
    #[serde(with = "report_time")]
    pub not_before: DateTime<Utc>,
    #[serde(with = "report_time")]
    pub not_after: DateTime<Utc>,
    /// Base64 DER SubjectPublicKeyInfo.
    pub public_key: String,
    /// Base64 signature bits.
    pub sign: String,
    /// Decimal serial number.
    pub serial_number: String,
}

/// OCSP part of a [`CertificateReport`]. Either the status fields or `error`
/// are set, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcspReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OcspResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revokation_reason: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "report_time::option"
    )]
    pub revokation_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OcspReport {
    pub fn from_status(status: &OcspStatus) -> Self {
        Self {
            status: Some(status.result()),
            revokation_reason: Some(status.revocation_reason()),
            revokation_time: status.revocation_time(),
            error: None,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self {
            status: None,
            revokation_reason: None,
            revokation_time: None,
            error: Some(error.to_string()),
        }
    }
}

/// CRL part of a [`CertificateReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrlReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CrlResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "report_time::option"
    )]
    pub revokation_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revokation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrlReport {
    pub fn from_status(status: &CrlStatus) -> Self {
        Self {
            status: Some(status.status),
            revoked_by: status.revoked_by.clone(),
            revokation_time: status.revocation_time,
            revokation_reason: status.revocation_reason.clone(),
            error: None,
        }
    }

    pub fn from_error(error: &Error) -> Self {
        Self {
            status: None,
            revoked_by: None,
            revokation_time: None,
            revokation_reason: None,
            error: Some(error.to_string()),
        }
    }
}

/// Full verdict on a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReport {
    #[serde(flatten)]
    pub info: CertificateInfo,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocsp: Option<OcspReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crl: Option<CrlReport>,
}

impl CertificateReport {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub(crate) mod report_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| {
                NaiveDateTime::parse_from_str(&s, FORMAT)
                    .map(|naive| naive.and_utc())
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_info() -> CertificateInfo {
        CertificateInfo {
            subject: NameAttributes {
                dn: "CN=TEST".to_string(),
                common_name: Some("TEST".to_string()),
                ..Default::default()
            },
            issuer: NameAttributes {
                dn: "CN=CA".to_string(),
                common_name: Some("CA".to_string()),
                ..Default::default()
            },
            key_user: vec![KeyUser::Individual],
            key_usage: KeyUsageRole::Sign,
            sign_alg: "SHA256withRSA".to_string(),
            not_before: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            not_after: Utc.with_ymd_and_hms(2030, 1, 1, 12, 30, 5).unwrap(),
            public_key: "AAAA".to_string(),
            sign: "BBBB".to_string(),
            serial_number: "12345".to_string(),
        }
    }

    #[test]
    fn test_report_shape_without_checks() {
        let report = CertificateReport {
            info: sample_info(),
            valid: true,
            ocsp: None,
            crl: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["keyUsage"], "SIGN");
        assert_eq!(json["keyUser"], serde_json::json!(["INDIVIDUAL"]));
        assert_eq!(json["signAlg"], "SHA256withRSA");
        assert_eq!(json["notBefore"], "2020-01-01 00:00:00");
        assert_eq!(json["notAfter"], "2030-01-01 12:30:05");
        assert_eq!(json["subject"]["commonName"], "TEST");
        assert_eq!(json["serialNumber"], "12345");
        assert!(json.get("ocsp").is_none());
        assert!(json.get("crl").is_none());
    }

    #[test]
    fn test_ocsp_report_revoked() {
        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let report = OcspReport::from_status(&OcspStatus::Revoked {
            revocation_time: at,
            reason: 1,
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "REVOKED",
                "revokationReason": 1,
                "revokationTime": "2023-01-01 00:00:00"
            })
        );
    }

    #[test]
    fn test_ocsp_report_error_only() {
        let report = OcspReport::from_error(&Error::OcspNonceMismatch);
        let json = serde_json::to_value(&report).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["error"].as_str().unwrap().contains("nonce"));
    }

    #[test]
    fn test_crl_report_from_status() {
        let status = CrlStatus {
            status: CrlResult::Revoked,
            revoked_by: Some("CN=CA".to_string()),
            revocation_time: Some(Utc.with_ymd_and_hms(2022, 5, 6, 7, 8, 9).unwrap()),
            revocation_reason: Some("keyCompromise".to_string()),
        };
        let json = serde_json::to_value(CrlReport::from_status(&status)).unwrap();
        assert_eq!(json["status"], "REVOKED");
        assert_eq!(json["revokedBy"], "CN=CA");
        assert_eq!(json["revokationTime"], "2022-05-06 07:08:09");
        assert_eq!(json["revokationReason"], "keyCompromise");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_report_deserializes() {
        let report = CertificateReport {
            info: sample_info(),
            valid: false,
            ocsp: Some(OcspReport::from_status(&OcspStatus::Active)),
            crl: Some(CrlReport::from_status(&CrlStatus::good())),
        };
        let json = report.to_json().unwrap();
        let parsed: CertificateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
