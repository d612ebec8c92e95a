//! Throw-away keyrings for tests. Every keyring lives in its own temporary
//! `GNUPGHOME`, so the user's keyring is never touched.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use crate::Gpg;

pub fn gpg_available() -> bool {
    Command::new("gpg")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub struct TestKeyring {
    dir: TempDir,
    gpg: Gpg,
}

impl TestKeyring {
    pub fn empty() -> Option<Self> {
        if !gpg_available() {
            return None;
        }
        // Keep the path short: gpg-agent sockets live under GNUPGHOME.
        let dir = tempfile::Builder::new()
            .prefix("gs")
            .tempdir_in(std::env::temp_dir())
            .unwrap();
        let gpg = Gpg::new().with_home(dir.path());
        Some(Self { dir, gpg })
    }

    pub fn with_key(uid: &str) -> Option<(Self, String)> {
        let keyring = Self::empty()?;
        let fingerprint = keyring.generate_key(uid);
        Some((keyring, fingerprint))
    }

    pub fn gpg(&self) -> &Gpg {
        &self.gpg
    }

    pub fn home(&self) -> &Path {
        self.dir.path()
    }

    fn gpg_command(&self, args: &[&str]) -> std::process::Output {
        let output = Command::new("gpg")
            .args(["--batch", "--no-tty", "--pinentry-mode", "loopback", "--passphrase", ""])
            .args(args)
            .env("GNUPGHOME", self.home())
            .output()
            .expect("failed to execute gpg");
        assert!(
            output.status.success(),
            "gpg {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    pub fn generate_key(&self, uid: &str) -> String {
        self.gpg_command(&["--quick-gen-key", uid, "ed25519", "sign", "never"]);
        let output = self.gpg_command(&["--with-colons", "--list-keys", uid]);
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find_map(|line| line.strip_prefix("fpr:"))
            .and_then(|rest| rest.split(':').find(|f| !f.is_empty()))
            .map(str::to_string)
            .expect("generated key has no fingerprint")
    }

    pub fn sign(&self, fingerprint: &str, payload: &[u8]) -> String {
        let scratch = TempDir::new().unwrap();
        let payload_path = scratch.path().join("payload");
        let signature_path = scratch.path().join("payload.asc");
        std::fs::write(&payload_path, payload).unwrap();
        self.gpg_command(&[
            "--local-user",
            fingerprint,
            "--armor",
            "--output",
            signature_path.to_str().unwrap(),
            "--detach-sign",
            payload_path.to_str().unwrap(),
        ]);
        std::fs::read_to_string(signature_path).unwrap()
    }

    pub fn git_env(&self) -> [(&'static str, &Path); 1] {
        [("GNUPGHOME", self.home())]
    }
}
