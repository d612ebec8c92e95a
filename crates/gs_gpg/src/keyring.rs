use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

use crate::status::{parse_status, Verification};

#[derive(Debug, thiserror::Error)]
pub enum GpgError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("gpg scratch file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("gpg {action} failed ({status}): {stderr}")]
    Failed {
        action: &'static str,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Clone)]
pub struct Gpg {
    program: PathBuf,
    home: Option<PathBuf>,
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpg {
    pub fn new() -> Self {
        Self::with_program("gpg")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            home: None,
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--no-tty"]);
        if let Some(home) = &self.home {
            cmd.env("GNUPGHOME", home);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn run<I, S>(&self, args: I) -> Result<Output, GpgError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command()
            .args(args)
            .output()
            .map_err(|source| GpgError::Spawn {
                program: self.program.display().to_string(),
                source,
            })
    }

    /// Verifies `signature` as a detached signature over `payload`.
    pub fn verify_detached(
        &self,
        payload: &[u8],
        signature: &[u8],
    ) -> Result<Verification, GpgError> {
        let scratch = TempDir::new()?;
        let payload_path = scratch.path().join("payload");
        let signature_path = scratch.path().join("payload.sig");
        fs::write(&payload_path, payload)?;
        fs::write(&signature_path, signature)?;

        // Keys come from the configured keyring only, never a keyserver.
        let output = self.run([
            OsStr::new("--no-auto-key-retrieve"),
            OsStr::new("--status-fd"),
            OsStr::new("1"),
            OsStr::new("--verify"),
            signature_path.as_os_str(),
            payload_path.as_os_str(),
        ])?;

        let status = String::from_utf8_lossy(&output.stdout);
        let verification = Verification::from_status(parse_status(&status), output.status.success());
        tracing::debug!(?verification, "gpg verify");
        Ok(verification)
    }

    pub fn export_armored(&self, key_id: &str) -> Result<Option<String>, GpgError> {
        let output = self.run(["--armor", "--export", key_id])?;
        if !output.status.success() {
            return Err(GpgError::Failed {
                action: "export",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    pub fn import(&self, armored: &str) -> Result<(), GpgError> {
        let scratch = TempDir::new()?;
        let key_path = scratch.path().join("key.asc");
        fs::write(&key_path, armored)?;
        let output = self.run([OsStr::new("--import"), key_path.as_os_str()])?;
        if !output.status.success() {
            return Err(GpgError::Failed {
                action: "import",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestKeyring;

    const PAYLOAD: &[u8] = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author Test <test@example.com> 1700000000 +0000\n\
committer Test <test@example.com> 1700000000 +0000\n\
\n\
genesis\n";

    #[test]
    fn test_missing_program_is_spawn_error() {
        let gpg = Gpg::with_program("/nonexistent/gpg-binary");
        let err = gpg.verify_detached(b"payload", b"sig").unwrap_err();
        assert!(matches!(err, GpgError::Spawn { .. }));
        let err = gpg.export_armored("ABCDEF").unwrap_err();
        assert!(matches!(err, GpgError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_never_fetches_keys() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let args_file = dir.path().join("args");
        let program = dir.path().join("gpg");
        fs::write(
            &program,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", args_file.display()),
        )
        .unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let verification = Gpg::with_program(&program)
            .verify_detached(PAYLOAD, b"sig")
            .unwrap();
        assert!(!verification.is_good());
        let args = fs::read_to_string(&args_file).unwrap();
        let args: Vec<_> = args.lines().collect();
        assert!(args.contains(&"--no-auto-key-retrieve"), "{args:?}");
        assert!(args.contains(&"--batch"), "{args:?}");
        assert!(
            args.iter().position(|a| *a == "--no-auto-key-retrieve")
                < args.iter().position(|a| *a == "--verify")
        );
    }

    #[test]
    fn test_home_is_configurable() {
        let gpg = Gpg::new().with_home("/tmp/keyring");
        assert_eq!(gpg.home(), Some(Path::new("/tmp/keyring")));
        assert!(Gpg::default().home().is_none());
    }

    #[test]
    fn test_good_signature_reports_primary_fingerprint() {
        let Some((keyring, fingerprint)) = TestKeyring::with_key("Alice <alice@example.com>") else {
            return;
        };
        let signature = keyring.sign(&fingerprint, PAYLOAD);
        let verification = keyring
            .gpg()
            .verify_detached(PAYLOAD, signature.as_bytes())
            .unwrap();
        assert!(verification.is_good(), "{verification:?}");
        assert_eq!(verification.signer(), Some(fingerprint.as_str()));
    }

    #[test]
    fn test_tampered_payload_is_bad() {
        let Some((keyring, fingerprint)) = TestKeyring::with_key("Alice <alice@example.com>") else {
            return;
        };
        let signature = keyring.sign(&fingerprint, PAYLOAD);
        let mut tampered = PAYLOAD.to_vec();
        tampered.extend_from_slice(b"extra\n");
        let verification = keyring
            .gpg()
            .verify_detached(&tampered, signature.as_bytes())
            .unwrap();
        assert!(matches!(verification, Verification::Bad { .. }));
    }

    #[test]
    fn test_signature_from_unknown_key_is_bad() {
        let Some((signer, fingerprint)) = TestKeyring::with_key("Mallory <mallory@example.com>") else {
            return;
        };
        let Some(verifier) = TestKeyring::empty() else {
            return;
        };
        let signature = signer.sign(&fingerprint, PAYLOAD);
        let verification = verifier
            .gpg()
            .verify_detached(PAYLOAD, signature.as_bytes())
            .unwrap();
        assert!(!verification.is_good());
    }

    #[test]
    fn test_garbage_signature_is_bad() {
        let Some(keyring) = TestKeyring::empty() else {
            return;
        };
        let verification = keyring
            .gpg()
            .verify_detached(PAYLOAD, b"not a signature")
            .unwrap();
        assert!(!verification.is_good());
    }

    #[test]
    fn test_export_is_stable_and_reimportable() {
        let Some((keyring, fingerprint)) = TestKeyring::with_key("Alice <alice@example.com>") else {
            return;
        };
        let first = keyring.gpg().export_armored(&fingerprint).unwrap().unwrap();
        let second = keyring.gpg().export_armored(&fingerprint).unwrap().unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("-----BEGIN PGP PUBLIC KEY BLOCK-----"));

        let Some(other) = TestKeyring::empty() else {
            return;
        };
        let signature = keyring.sign(&fingerprint, PAYLOAD);
        assert!(!other
            .gpg()
            .verify_detached(PAYLOAD, signature.as_bytes())
            .unwrap()
            .is_good());
        other.gpg().import(&first).unwrap();
        assert!(other
            .gpg()
            .verify_detached(PAYLOAD, signature.as_bytes())
            .unwrap()
            .is_good());
    }

    #[test]
    fn test_export_unknown_key_is_none() {
        let Some(keyring) = TestKeyring::empty() else {
            return;
        };
        let exported = keyring
            .gpg()
            .export_armored("0123456789ABCDEF0123456789ABCDEF01234567")
            .unwrap();
        assert!(exported.is_none());
    }

    #[test]
    fn test_import_garbage_fails() {
        let Some(keyring) = TestKeyring::empty() else {
            return;
        };
        let gpg: &Gpg = keyring.gpg();
        assert!(gpg.import("not a key").is_err());
    }
}
