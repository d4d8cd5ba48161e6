// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Identity providers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use ls3_core::{Error, Identity, Result, S3ErrorCode};

/// The error a provider returns when it has no identity for the
/// presented access key id.
#[must_use]
pub fn missing_access_key() -> Error {
    Error::new(
        S3ErrorCode::InvalidAccessKeyId,
        "The AWS access key ID that you provided does not exist in our records.",
    )
}

/// Resolves access key ids to identities.
pub trait Provider: Send + Sync {
    /// Returns the identity for the given access key id.
    ///
    /// Implementations return [`missing_access_key`] when the key does
    /// not exist; any other error means the provider itself failed.
    fn get(&self, access_key_id: &str) -> Result<Arc<Identity>>;
}

/// A static, in-memory set of identities keyed by access key id.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    identities: HashMap<String, Arc<Identity>>,
}

impl Keyring {
    /// Builds a keyring from identities.
    #[must_use]
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Self {
        let identities = identities
            .into_iter()
            .map(|identity| (identity.access_key_id.clone(), Arc::new(identity)))
            .collect();
        Keyring { identities }
    }

    /// Adds an identity unless one with the same access key id is
    /// already present.
    pub fn insert_if_absent(&mut self, identity: Identity) {
        self.identities.entry(identity.access_key_id.clone()).or_insert_with(|| Arc::new(identity));
    }

    /// Parses a keyring from the credentials file JSON (an array of
    /// identity records). Duplicate access key ids are a fatal error.
    pub fn from_json(data: &str) -> Result<Self> {
        let identities: Vec<Identity> = serde_json::from_str(data).map_err(|err| {
            Error::new(S3ErrorCode::InternalError, format!("invalid credentials file: {err}"))
        })?;

        let mut keyring = Keyring::default();
        for (i, identity) in identities.into_iter().enumerate() {
            if keyring.identities.contains_key(&identity.access_key_id) {
                return Err(Error::new(
                    S3ErrorCode::InternalError,
                    format!(
                        "identity {i} ({}): multiple identities with the same AccessKeyId",
                        identity.access_key_id
                    ),
                ));
            }
            keyring.identities.insert(identity.access_key_id.clone(), Arc::new(identity));
        }

        Ok(keyring)
    }
}

impl Provider for Keyring {
    fn get(&self, access_key_id: &str) -> Result<Arc<Identity>> {
        self.identities.get(access_key_id).cloned().ok_or_else(missing_access_key)
    }
}

struct CachedKeyring {
    keyring: Keyring,
    expires: Instant,
}

/// A provider backed by a JSON credentials file, cached for a
/// configurable duration.
///
/// Lookups take a read lock while the cache is fresh. The first lookup
/// past expiry upgrades to the write lock, re-tests expiry, and
/// re-reads the file. A reload that fails surfaces `AccountProblem` to
/// the caller rather than serving the stale keyring; a later
/// successful reload recovers.
pub struct FileProvider {
    path: PathBuf,
    cache_for: Duration,
    state: RwLock<CachedKeyring>,
}

impl FileProvider {
    /// Parses the credentials file and returns a provider caching it
    /// for `cache_for`.
    pub fn new(path: impl Into<PathBuf>, cache_for: Duration) -> Result<Self> {
        let path = path.into();
        let keyring = Self::load(&path)?;

        Ok(FileProvider {
            path,
            cache_for,
            state: RwLock::new(CachedKeyring { keyring, expires: Instant::now() + cache_for }),
        })
    }

    fn load(path: &std::path::Path) -> Result<Keyring> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            Error::new(
                S3ErrorCode::InternalError,
                format!("unable to read credentials file {}: {err}", path.display()),
            )
        })?;

        Keyring::from_json(&data)
    }

    fn account_problem() -> Error {
        Error::new(
            S3ErrorCode::AccountProblem,
            "There is a problem with the server credentials store that prevents the operation from completing successfully.",
        )
    }
}

impl Provider for FileProvider {
    fn get(&self, access_key_id: &str) -> Result<Arc<Identity>> {
        {
            let state = self.state.read().expect("credentials lock poisoned");
            if Instant::now() < state.expires {
                return state.keyring.get(access_key_id);
            }
        }

        let mut state = self.state.write().expect("credentials lock poisoned");

        // Another caller may have reloaded while we waited for the lock
        if Instant::now() < state.expires {
            return state.keyring.get(access_key_id);
        }

        match Self::load(&self.path) {
            Ok(keyring) => {
                state.keyring = keyring;
                state.expires = Instant::now() + self.cache_for;
                state.keyring.get(access_key_id)
            }
            Err(err) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to reload the credentials file"
                );
                Err(Self::account_problem())
            }
        }
    }
}

/// An ordered list of providers tried first to last.
///
/// Only a missing access key causes fallthrough to the next provider;
/// any other error is returned immediately.
pub struct MultiProvider {
    providers: Vec<Arc<dyn Provider>>,
}

impl MultiProvider {
    /// Builds a provider chain.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        MultiProvider { providers }
    }
}

impl Provider for MultiProvider {
    fn get(&self, access_key_id: &str) -> Result<Arc<Identity>> {
        for provider in &self.providers {
            match provider.get(access_key_id) {
                Ok(identity) => return Ok(identity),
                Err(err) if err.code == S3ErrorCode::InvalidAccessKeyId => continue,
                Err(err) => return Err(err),
            }
        }

        Err(missing_access_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn identity(key: &str) -> Identity {
        Identity {
            name: format!("identity-{key}"),
            access_key_id: key.to_string(),
            secret_access_key: "secret".to_string(),
            policy: Vec::new(),
        }
    }

    #[test]
    fn keyring_lookup() {
        let keyring = Keyring::new([identity("AKID")]);

        assert_eq!(keyring.get("AKID").unwrap().name, "identity-AKID");
        let err = keyring.get("OTHER").unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidAccessKeyId);
    }

    #[test]
    fn keyring_rejects_duplicate_key_ids() {
        let json = r#"[
            {"AccessKeyId": "SAME", "SecretAccessKey": "a"},
            {"AccessKeyId": "SAME", "SecretAccessKey": "b"}
        ]"#;

        let err = Keyring::from_json(json).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InternalError);
    }

    #[test]
    fn multi_provider_falls_through_on_missing_key_only() {
        let first = Arc::new(Keyring::new([identity("A")]));
        let second = Arc::new(Keyring::new([identity("B")]));
        let multi = MultiProvider::new(vec![first, second]);

        assert_eq!(multi.get("A").unwrap().access_key_id, "A");
        assert_eq!(multi.get("B").unwrap().access_key_id, "B");
        assert_eq!(multi.get("C").unwrap_err().code, S3ErrorCode::InvalidAccessKeyId);

        struct Failing;
        impl Provider for Failing {
            fn get(&self, _: &str) -> Result<Arc<Identity>> {
                Err(Error::new(S3ErrorCode::AccountProblem, "store offline"))
            }
        }

        let multi = MultiProvider::new(vec![Arc::new(Failing), Arc::new(Keyring::new([identity("B")]))]);
        assert_eq!(multi.get("B").unwrap_err().code, S3ErrorCode::AccountProblem);
    }

    fn write_credentials(path: &std::path::Path, key: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        write!(
            f,
            r#"[{{"Name": "file", "AccessKeyId": "{key}", "SecretAccessKey": "s"}}]"#
        )
        .unwrap();
    }

    #[test]
    fn file_provider_serves_cached_keyring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        write_credentials(&path, "AKID");

        let provider = FileProvider::new(&path, Duration::from_secs(600)).unwrap();
        assert_eq!(provider.get("AKID").unwrap().name, "file");

        // Within the cache window a rewrite is not observed
        write_credentials(&path, "NEWKID");
        assert!(provider.get("NEWKID").is_err());
        assert!(provider.get("AKID").is_ok());
    }

    #[test]
    fn file_provider_reloads_after_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        write_credentials(&path, "AKID");

        let provider = FileProvider::new(&path, Duration::from_secs(0)).unwrap();
        write_credentials(&path, "NEWKID");

        assert!(provider.get("NEWKID").is_ok());
        assert_eq!(provider.get("AKID").unwrap_err().code, S3ErrorCode::InvalidAccessKeyId);
    }

    #[test]
    fn file_provider_reload_failure_is_account_problem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        write_credentials(&path, "AKID");

        let provider = FileProvider::new(&path, Duration::from_secs(0)).unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = provider.get("AKID").unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccountProblem);

        // Restoring the file recovers on the next lookup
        write_credentials(&path, "AKID");
        assert!(provider.get("AKID").is_ok());
    }

    #[test]
    fn file_provider_initial_parse_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileProvider::new(&path, Duration::from_secs(60)).is_err());
    }
}
