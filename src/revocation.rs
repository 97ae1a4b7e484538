//! Certificate revocation lists.
//!
//! [`CrlSource`] is the seam the report builder consults; [`LocalCrlStore`]
//! implements it over a directory of `.crl` files (DER or PEM) that some
//! external job keeps up to date.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use der::oid::AssociatedOid;
use der::Decode;
use tracing::{debug, info, warn};
use x509_cert::crl::{CertificateList, RevokedCert};
use x509_cert::ext::pkix::CrlReason;
use x509_cert::Certificate;

use crate::certificate::{render_name, unix_to_datetime};
use crate::config::CrlConfig;
use crate::error::Error;
use crate::types::revocation::{CrlResult, CrlStatus, RevocationReason};

/// Cached source of CRL verdicts.
pub trait CrlSource: Send + Sync {
    fn is_disabled(&self) -> bool;

    /// Reload the cached lists if they are older than the refresh interval,
    /// or unconditionally when `force` is set.
    fn refresh_if_stale(&self, force: bool) -> Result<(), Error>;

    fn lookup(&self, cert: &Certificate) -> Result<CrlStatus, Error>;
}

#[derive(Default)]
struct CrlCache {
    lists: Vec<CertificateList>,
    loaded_at: Option<Instant>,
}

/// CRLs loaded from the `.crl` files of one directory.
pub struct LocalCrlStore {
    dir: PathBuf,
    enabled: bool,
    refresh_interval: Duration,
    cache: RwLock<CrlCache>,
}

impl LocalCrlStore {
    pub fn new(dir: &Path, refresh_interval: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            enabled: true,
            refresh_interval,
            cache: RwLock::new(CrlCache::default()),
        }
    }

    /// A store that refuses every lookup.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
            refresh_interval: Duration::ZERO,
            cache: RwLock::new(CrlCache::default()),
        }
    }

    pub fn from_config(config: &CrlConfig) -> Self {
        match (&config.dir, config.enabled) {
            (Some(dir), true) => Self::new(dir, config.refresh_interval()),
            _ => Self::disabled(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of lists currently cached.
    pub fn len(&self) -> usize {
        self.read_cache().lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, CrlCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_enabled(&self) -> Result<(), Error> {
        if self.enabled {
            Ok(())
        } else {
            Err(Error::FeatureDisabled(
                "CRL verification is disabled".to_string(),
            ))
        }
    }
}

impl CrlSource for LocalCrlStore {
    fn is_disabled(&self) -> bool {
        !self.enabled
    }

    fn refresh_if_stale(&self, force: bool) -> Result<(), Error> {
        self.ensure_enabled()?;
        if !force {
            let cache = self.read_cache();
            if let Some(loaded_at) = cache.loaded_at {
                if loaded_at.elapsed() < self.refresh_interval {
                    return Ok(());
                }
            }
        }

        let lists = load_dir(&self.dir)?;
        info!(dir = %self.dir.display(), count = lists.len(), "Loaded CRLs");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.lists = lists;
        cache.loaded_at = Some(Instant::now());
        Ok(())
    }

    fn lookup(&self, cert: &Certificate) -> Result<CrlStatus, Error> {
        self.ensure_enabled()?;
        let tbs = &cert.tbs_certificate;
        let cache = self.read_cache();

        let mut covered = false;
        for crl in cache
            .lists
            .iter()
            .filter(|crl| crl.tbs_cert_list.issuer == tbs.issuer)
        {
            covered = true;
            let entry = crl
                .tbs_cert_list
                .revoked_certificates
                .iter()
                .flatten()
                .find(|entry| entry.serial_number == tbs.serial_number);
            if let Some(entry) = entry {
                return revoked_status(crl, entry);
            }
        }

        if !covered {
            debug!(issuer = %render_name(&tbs.issuer), "No CRL covers certificate issuer");
            return Ok(CrlStatus::unknown());
        }
        Ok(CrlStatus::good())
    }
}

fn revoked_status(crl: &CertificateList, entry: &RevokedCert) -> Result<CrlStatus, Error> {
    let revocation_time = unix_to_datetime(entry.revocation_date.to_unix_duration())
        .ok_or_else(|| Error::Crl("revocation date out of range".to_string()))?;
    Ok(CrlStatus {
        status: CrlResult::Revoked,
        revoked_by: Some(render_name(&crl.tbs_cert_list.issuer)),
        revocation_time: Some(revocation_time),
        revocation_reason: entry_reason(entry).map(|r| r.as_str().to_string()),
    })
}

fn entry_reason(entry: &RevokedCert) -> Option<RevocationReason> {
    let ext = entry
        .crl_entry_extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == CrlReason::OID)?;
    match CrlReason::from_der(ext.extn_value.as_bytes()) {
        Ok(reason) => RevocationReason::from_code(reason as u32),
        Err(e) => {
            warn!(error = %e, "Undecodable CRL entry reason");
            None
        }
    }
}

const CRL_PEM_LABEL: &str = "X509 CRL";

/// Decode one CRL, PEM (`X509 CRL`) or DER.
pub fn parse_crl(bytes: &[u8]) -> Result<CertificateList, Error> {
    let is_pem = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(false, |start| bytes[start..].starts_with(b"-----BEGIN"));
    if is_pem {
        let (label, der) =
            der::pem::decode_vec(bytes).map_err(|e| Error::Crl(format!("PEM CRL: {}", e)))?;
        if label != CRL_PEM_LABEL {
            return Err(Error::Crl(format!("unexpected PEM label {}", label)));
        }
        CertificateList::from_der(&der).map_err(|e| Error::Crl(format!("PEM CRL: {}", e)))
    } else {
        CertificateList::from_der(bytes).map_err(|e| Error::Crl(format!("DER CRL: {}", e)))
    }
}

/// Load every `*.crl` file of `dir`. Files that fail to decode are skipped.
pub fn load_dir(dir: &Path) -> Result<Vec<CertificateList>, Error> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Crl(format!("Cannot read {}: {}", dir.display(), e)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "crl"))
        .collect();
    paths.sort();

    let mut lists = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(&path)?;
        match parse_crl(&bytes) {
            Ok(crl) => lists.push(crl),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable CRL"),
        }
    }
    Ok(lists)
}
