//! # kzpki
//!
//! Trust and revocation checking for certificates of the Kazakhstan national
//! PKI (NCA).
//!
//! One call answers "is this certificate valid right now, and if not, why":
//! the validity window, a live OCSP check and a CRL lookup are folded into a
//! single verdict, alongside the identity attributes decoded from the
//! certificate (names, IIN/BIN, birth date, gender, key-usage role).
//!
//! ## Features
//!
//! - **OCSP**: nonce-protected single-certificate requests over HTTP
//!   (`fetch` feature, on by default) or any custom [`ocsp::OcspTransport`]
//! - **CRL**: cached lookups through [`revocation::CrlSource`], with a
//!   directory-backed [`revocation::LocalCrlStore`]
//! - **Key stores**: PEM/DER certificates and password-protected PKCS#12
//!   containers through [`keystore`]
//! - **Names**: RFC 2253 distinguished-name decomposition and IIN decoding
//! - **Reports**: serde-serializable [`types::report::CertificateReport`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use kzpki::config::Config;
//! use kzpki::keystore::{load_certificates_from_path, TrustStore};
//! use kzpki::verification::{CertificateVerifier, CheckOptions};
//!
//! # fn main() -> Result<(), kzpki::Error> {
//! let config = Config::load(Path::new("kzpki.toml"))?;
//! let verifier = CertificateVerifier::from_config(&config)?;
//!
//! let roots = TrustStore::from_path(Path::new("nca_rsa.pem"))?;
//! let cert = load_certificates_from_path(Path::new("user.cer"))?.remove(0);
//! let issuer = roots.find_issuer(&cert);
//!
//! let report = verifier.build_report(&cert, issuer, CheckOptions::ocsp())?;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure handling
//!
//! Configuration misuse (CRL requested while disabled, OCSP requested without
//! an issuer) is an error before any work is done. Once checking starts, OCSP
//! and CRL failures are recorded in the report's `error` fields and never
//! change `valid`. Responder signatures on OCSP answers are not verified.

pub mod certificate;
pub mod config;
pub mod crypto;
pub mod dn;
pub mod error;
pub mod keystore;
pub mod national_id;
pub mod ocsp;
pub mod revocation;
pub mod types;
pub mod verification;

#[cfg(test)]
mod testutil;

pub use error::Error;
