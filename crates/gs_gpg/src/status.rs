const PREFIX: &str = "[GNUPG:] ";

/// Status keywords that disqualify a signature even when another line
/// reports it as good.
const PROBLEMS: &[&str] = &[
    "BADSIG",
    "ERRSIG",
    "EXPSIG",
    "EXPKEYSIG",
    "REVKEYSIG",
    "NO_PUBKEY",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub good_key_id: Option<String>,
    pub fingerprint: Option<String>,
    pub primary_fingerprint: Option<String>,
    pub signatures: usize,
    pub problems: Vec<String>,
}

pub fn parse_status(output: &str) -> StatusReport {
    let mut report = StatusReport::default();
    for line in output.lines() {
        let Some(rest) = line.strip_prefix(PREFIX) else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let Some(keyword) = fields.next() else {
            continue;
        };
        match keyword {
            "NEWSIG" => report.signatures += 1,
            "GOODSIG" => report.good_key_id = fields.next().map(str::to_string),
            "VALIDSIG" => {
                let fields: Vec<&str> = fields.collect();
                report.fingerprint = fields.first().map(|s| s.to_string());
                report.primary_fingerprint = fields.get(9).map(|s| s.to_string());
            }
            k if PROBLEMS.contains(&k) => report.problems.push(rest.to_string()),
            _ => {}
        }
    }
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Good {
        fingerprint: String,
        primary_fingerprint: String,
        key_id: String,
    },
    Bad {
        reason: String,
    },
}

impl Verification {
    /// Combines the status stream with gpg's exit status. A signature is
    /// good only if gpg exited cleanly, reported exactly one signature as
    /// both `GOODSIG` and `VALIDSIG`, and raised no problem keyword.
    pub fn from_status(report: StatusReport, exit_ok: bool) -> Self {
        if let Some(problem) = report.problems.first() {
            return Self::Bad {
                reason: problem.clone(),
            };
        }
        if report.signatures > 1 {
            return Self::Bad {
                reason: format!("expected one signature, found {}", report.signatures),
            };
        }
        if !exit_ok {
            return Self::Bad {
                reason: "gpg exited with failure status".to_string(),
            };
        }
        match (report.good_key_id, report.fingerprint) {
            (Some(key_id), Some(fingerprint)) => Self::Good {
                primary_fingerprint: report
                    .primary_fingerprint
                    .unwrap_or_else(|| fingerprint.clone()),
                fingerprint,
                key_id,
            },
            _ => Self::Bad {
                reason: "no valid signature reported".to_string(),
            },
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, Self::Good { .. })
    }

    pub fn signer(&self) -> Option<&str> {
        match self {
            Self::Good {
                primary_fingerprint,
                ..
            } => Some(primary_fingerprint),
            Self::Bad { .. } => None,
        }
    }
}
