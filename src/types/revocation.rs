use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status tag reported for an OCSP check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcspResult {
    Active,
    Revoked,
    Unknown,
}

/// Resolved OCSP status of a single certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspStatus {
    Active,
    Revoked {
        revocation_time: DateTime<Utc>,
        /// RFC 5280 CRLReason code, 0 (unspecified) when the responder omits it.
        reason: u32,
    },
    Unknown,
}

impl OcspStatus {
    pub fn result(&self) -> OcspResult {
        match self {
            OcspStatus::Active => OcspResult::Active,
            OcspStatus::Revoked { .. } => OcspResult::Revoked,
            OcspStatus::Unknown => OcspResult::Unknown,
        }
    }

    pub fn revocation_time(&self) -> Option<DateTime<Utc>> {
        match self {
            OcspStatus::Revoked {
                revocation_time, ..
            } => Some(*revocation_time),
            _ => None,
        }
    }

    pub fn revocation_reason(&self) -> u32 {
        match self {
            OcspStatus::Revoked { reason, .. } => *reason,
            _ => 0,
        }
    }
}

/// Status tag reported by a CRL lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrlResult {
    Good,
    Revoked,
    Unknown,
}

/// Verdict returned by a [`crate::revocation::CrlSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlStatus {
    pub status: CrlResult,
    /// Identity of the CRL issuer that listed the certificate.
    pub revoked_by: Option<String>,
    pub revocation_time: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl CrlStatus {
    pub fn good() -> Self {
        Self {
            status: CrlResult::Good,
            revoked_by: None,
            revocation_time: None,
            revocation_reason: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            status: CrlResult::Unknown,
            ..Self::good()
        }
    }
}

/// Reason codes for certificate revocation (RFC 5280 section 5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "cACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
            Self::RemoveFromCrl => "removeFromCRL",
            Self::PrivilegeWithdrawn => "privilegeWithdrawn",
            Self::AaCompromise => "aACompromise",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ocsp_status_accessors() {
        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let revoked = OcspStatus::Revoked {
            revocation_time: at,
            reason: 1,
        };
        assert_eq!(revoked.result(), OcspResult::Revoked);
        assert_eq!(revoked.revocation_time(), Some(at));
        assert_eq!(revoked.revocation_reason(), 1);

        assert_eq!(OcspStatus::Active.result(), OcspResult::Active);
        assert_eq!(OcspStatus::Active.revocation_time(), None);
        assert_eq!(OcspStatus::Unknown.revocation_reason(), 0);
    }

    #[test]
    fn test_result_tags_serde() {
        assert_eq!(serde_json::to_string(&OcspResult::Active).unwrap(), "\"ACTIVE\"");
        assert_eq!(serde_json::to_string(&OcspResult::Revoked).unwrap(), "\"REVOKED\"");
        assert_eq!(serde_json::to_string(&CrlResult::Good).unwrap(), "\"GOOD\"");
        assert_eq!(serde_json::to_string(&CrlResult::Unknown).unwrap(), "\"UNKNOWN\"");
    }

    #[test]
    fn test_revocation_reason_codes() {
        assert_eq!(RevocationReason::from_code(1), Some(RevocationReason::KeyCompromise));
        assert_eq!(RevocationReason::from_code(8), Some(RevocationReason::RemoveFromCrl));
        assert_eq!(RevocationReason::from_code(7), None);
        assert_eq!(RevocationReason::Superseded.as_str(), "superseded");
        assert_eq!(RevocationReason::RemoveFromCrl.as_str(), "removeFromCRL");
    }

    #[test]
    fn test_crl_status_constructors() {
        assert_eq!(CrlStatus::good().status, CrlResult::Good);
        let unknown = CrlStatus::unknown();
        assert_eq!(unknown.status, CrlResult::Unknown);
        assert!(unknown.revocation_time.is_none());
    }
}
