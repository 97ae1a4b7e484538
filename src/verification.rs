use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use x509_cert::Certificate;

use crate::certificate;
use crate::error::Error;
use crate::ocsp::OcspClient;
use crate::revocation::CrlSource;
use crate::types::report::{CertificateReport, CrlReport, OcspReport};
use crate::types::revocation::{CrlResult, OcspStatus};

#[cfg(feature = "fetch")]
use crate::config::Config;
#[cfg(feature = "fetch")]
use crate::revocation::LocalCrlStore;

/// Revocation checks to run on top of the validity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    pub ocsp: bool,
    pub crl: bool,
}

impl CheckOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ocsp() -> Self {
        Self {
            ocsp: true,
            crl: false,
        }
    }

    pub fn crl() -> Self {
        Self {
            ocsp: false,
            crl: true,
        }
    }

    pub fn all() -> Self {
        Self {
            ocsp: true,
            crl: true,
        }
    }
}

/// Builds [`CertificateReport`]s by folding the validity window, the OCSP
/// answer and the CRL verdict into one `valid` flag.
///
/// A check that fails (responder unreachable, bad nonce, unreadable CRL) is
/// reported in its sub-report's `error` field and leaves `valid` as it was.
/// Callers that need fail-closed behaviour must inspect `ocsp.error` and
/// `crl.error` themselves.
pub struct CertificateVerifier {
    ocsp: OcspClient,
    crl: Option<Arc<dyn CrlSource>>,
}

impl CertificateVerifier {
    pub fn new(ocsp: OcspClient) -> Self {
        Self { ocsp, crl: None }
    }

    pub fn with_crl(mut self, crl: Arc<dyn CrlSource>) -> Self {
        self.crl = Some(crl);
        self
    }

    /// OCSP over HTTP plus the directory CRL store, both from `config`.
    #[cfg(feature = "fetch")]
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let ocsp = OcspClient::from_config(&config.pki)?;
        let crl = LocalCrlStore::from_config(&config.crl);
        Ok(Self::new(ocsp).with_crl(Arc::new(crl)))
    }

    pub fn build_report(
        &self,
        cert: &Certificate,
        issuer: Option<&Certificate>,
        options: CheckOptions,
    ) -> Result<CertificateReport, Error> {
        self.build_report_at(cert, issuer, options, Utc::now())
    }

    /// Same as [`build_report`](Self::build_report), judged at `now`.
    pub fn build_report_at(
        &self,
        cert: &Certificate,
        issuer: Option<&Certificate>,
        options: CheckOptions,
        now: DateTime<Utc>,
    ) -> Result<CertificateReport, Error> {
        let crl_source = if options.crl {
            match &self.crl {
                Some(source) if !source.is_disabled() => Some(source),
                _ => {
                    return Err(Error::FeatureDisabled(
                        "CRL verification is disabled; set crl.enabled = true".to_string(),
                    ))
                }
            }
        } else {
            None
        };
        let ocsp_issuer = if options.ocsp {
            Some(issuer.ok_or_else(|| {
                Error::InvalidArgument("OCSP check requires the issuer certificate".to_string())
            })?)
        } else {
            None
        };

        let info = certificate::extract(cert)?;
        let mut valid = info.not_before < now && now < info.not_after;

        let ocsp = ocsp_issuer.map(|issuer| match self.ocsp.check(cert, issuer) {
            Ok(status) => {
                if let OcspStatus::Revoked {
                    revocation_time, ..
                } = status
                {
                    valid = apply_revocation(valid, revocation_time, now);
                }
                OcspReport::from_status(&status)
            }
            Err(e) => {
                warn!(url = %self.ocsp.responder_url(), error = %e, "OCSP check failed");
                OcspReport::from_error(&e)
            }
        });

        let crl = crl_source.map(|source| {
            if let Err(e) = source.refresh_if_stale(false) {
                warn!(error = %e, "CRL refresh failed, using cached lists");
            }
            match source.lookup(cert) {
                Ok(status) => {
                    if status.status == CrlResult::Revoked {
                        if let Some(revocation_time) = status.revocation_time {
                            valid = apply_revocation(valid, revocation_time, now);
                        }
                    }
                    CrlReport::from_status(&status)
                }
                Err(e) => {
                    warn!(error = %e, "CRL lookup failed");
                    CrlReport::from_error(&e)
                }
            }
        });

        debug!(serial = %info.serial_number, valid, "Built certificate report");
        Ok(CertificateReport {
            info,
            valid,
            ocsp,
            crl,
        })
    }
}

/// A revocation only ever clears `valid`, and only once it has taken effect.
fn apply_revocation(valid: bool, revoked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    valid && revoked_at > now
}
