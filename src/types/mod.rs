pub mod name;
pub mod ocsp;
pub mod report;
pub mod revocation;
