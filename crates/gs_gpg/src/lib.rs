mod keyring;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use keyring::{Gpg, GpgError};
pub use status::{parse_status, StatusReport, Verification};
