//! Environment configuration.
//!
//! | Variable                          | Default                  |
//! |-----------------------------------|--------------------------|
//! | `FIELDVAULT_SALARY_STORAGE_MODE`  | `transition`             |
//! | `FIELDVAULT_PII_STORAGE_MODE`     | `transition`             |
//! | `FIELDVAULT_WRITE_ALGORITHM`      | `AES`                    |
//! | `FIELDVAULT_AES_KEY`              | unset                    |
//! | `FIELDVAULT_MASTER_SECRET`        | unset                    |
//! | `FIELDVAULT_KEYSTORE_PATH`        | `./fieldvault-keys.db`   |
//! | `FIELDVAULT_AUDIT_LOG`            | unset (audit via tracing)|
//! | `FIELDVAULT_LOG_FORMAT`           | `pretty`                 |
//!
//! Loading takes a lookup function so callers (and tests) decide where values
//! come from; [`Settings::from_env`] reads the process environment.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use fieldvault_envelope::MasterSecret;

use crate::algorithm::Algorithm;
use crate::cipher::SymmetricCipher;
use crate::error::{FieldError, Result};
use crate::policy::{FieldPolicy, PolicyHandle};

pub const ENV_SALARY_STORAGE_MODE: &str = "FIELDVAULT_SALARY_STORAGE_MODE";
pub const ENV_PII_STORAGE_MODE: &str = "FIELDVAULT_PII_STORAGE_MODE";
pub const ENV_WRITE_ALGORITHM: &str = "FIELDVAULT_WRITE_ALGORITHM";
pub const ENV_AES_KEY: &str = "FIELDVAULT_AES_KEY";
pub const ENV_MASTER_SECRET: &str = "FIELDVAULT_MASTER_SECRET";
pub const ENV_KEYSTORE_PATH: &str = "FIELDVAULT_KEYSTORE_PATH";
pub const ENV_AUDIT_LOG: &str = "FIELDVAULT_AUDIT_LOG";
pub const ENV_LOG_FORMAT: &str = "FIELDVAULT_LOG_FORMAT";

pub const DEFAULT_KEYSTORE_PATH: &str = "./fieldvault-keys.db";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

pub struct Settings {
    pub policy: FieldPolicy,
    aes_key: Option<Zeroizing<String>>,
    master_secret: Option<Zeroizing<String>>,
    pub keystore_path: PathBuf,
    pub audit_log: Option<PathBuf>,
    pub log_format: LogFormat,
}

/// Treat unset and blank the same.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Read just the policy variables.
pub fn load_policy<F>(lookup: F) -> Result<FieldPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let mut policy = FieldPolicy::default();
    if let Some(v) = non_empty(lookup(ENV_SALARY_STORAGE_MODE)) {
        policy.salary_mode = v.parse()?;
    }
    if let Some(v) = non_empty(lookup(ENV_PII_STORAGE_MODE)) {
        policy.pii_mode = v.parse()?;
    }
    if let Some(v) = non_empty(lookup(ENV_WRITE_ALGORITHM)) {
        policy.write_algorithm = v
            .parse::<Algorithm>()
            .map_err(|_| FieldError::Config(format!("unknown write algorithm: {v}")))?;
    }
    Ok(policy)
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let policy = load_policy(&lookup)?;

        let log_format = match non_empty(lookup(ENV_LOG_FORMAT)).as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(FieldError::Config(format!("unknown log format: {other}")));
            }
        };

        Ok(Self {
            policy,
            aes_key: non_empty(lookup(ENV_AES_KEY)).map(Zeroizing::new),
            master_secret: non_empty(lookup(ENV_MASTER_SECRET)).map(Zeroizing::new),
            keystore_path: non_empty(lookup(ENV_KEYSTORE_PATH))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYSTORE_PATH)),
            audit_log: non_empty(lookup(ENV_AUDIT_LOG)).map(PathBuf::from),
            log_format,
        })
    }

    /// The configured symmetric cipher, if a key is set. A malformed key is an error.
    pub fn symmetric_cipher(&self) -> Result<Option<SymmetricCipher>> {
        self.aes_key
            .as_ref()
            .map(|key| SymmetricCipher::from_config(key))
            .transpose()
    }

    /// The configured master secret, if set.
    pub fn master_secret(&self) -> Result<Option<MasterSecret>> {
        self.master_secret
            .as_ref()
            .map(|secret| {
                MasterSecret::from_base64(secret).map_err(|_| {
                    FieldError::Config(format!("{ENV_MASTER_SECRET} must be base64 of 32 bytes"))
                })
            })
            .transpose()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("policy", &self.policy)
            .field("aes_key", &self.aes_key.as_ref().map(|_| "[REDACTED]"))
            .field("master_secret", &self.master_secret.as_ref().map(|_| "[REDACTED]"))
            .field("keystore_path", &self.keystore_path)
            .field("audit_log", &self.audit_log)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl PolicyHandle {
    /// Re-read the policy variables and swap them in. On error the current
    /// policy stays in place.
    pub fn reload<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.set(load_policy(lookup)?);
        Ok(())
    }
}
