//! `RegistryCredentials` (spec §3) and the shared credential-refresh gate
//! (spec §4.2, §9: lifted out of the container-registry variant so every
//! downloader variant shares one refresh-once contract).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    /// Monotonic instant, not wall-clock, so expiry checks are immune to
    /// clock skew/adjustment mid-process.
    pub expires_at: Instant,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, ttl: Duration, now: Instant) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            expires_at: now + ttl,
        }
    }

    /// Invariant from spec §3: never used when `expires_at <= now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Fetches credentials lazily and refreshes at most once per login attempt
/// if they turn out to be expired between fetch and use (spec §4.2: "If
/// credentials expired between fetch and use, performs one credential
/// refresh").
///
/// Generalized across downloader variants so none of them duplicate this
/// refresh-once logic (spec §9 open question, resolved here).
pub struct CredentialGate<F> {
    fetch: F,
    cached: Mutex<Option<RegistryCredentials>>,
}

/// Emitted when a refresh itself still produced expired/unusable
/// credentials, so a host can wire this to its own (out-of-scope)
/// provisioning/rotation service.
#[derive(Clone, Debug)]
pub struct CredentialRotationRequested {
    pub reason: Arc<str>,
}

impl<F, Fut> CredentialGate<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<RegistryCredentials, CredentialFetchError>> + Send,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            cached: Mutex::new(None),
        }
    }

    /// Returns credentials valid at `now`, fetching or refreshing at most
    /// once. Returns `Err(CredentialRotationRequested)` if a single refresh
    /// still yields expired credentials.
    pub async fn credentials(&self, now: Instant) -> Result<RegistryCredentials, CredentialRotationRequested> {
        let mut guard = self.cached.lock().await;
        if let Some(existing) = guard.as_ref() {
            if !existing.is_expired(now) {
                return Ok(existing.clone());
            }
        }

        let fetched = (self.fetch)().await.map_err(|err| CredentialRotationRequested {
            reason: Arc::from(err.0.as_str()),
        })?;
        if fetched.is_expired(now) {
            // One refresh attempt, per spec §4.2.
            let refreshed = (self.fetch)().await.map_err(|err| CredentialRotationRequested {
                reason: Arc::from(err.0.as_str()),
            })?;
            if refreshed.is_expired(now) {
                return Err(CredentialRotationRequested {
                    reason: Arc::from("credential provider returned an already-expired credential twice"),
                });
            }
            *guard = Some(refreshed.clone());
            return Ok(refreshed);
        }

        *guard = Some(fetched.clone());
        Ok(fetched)
    }
}

#[derive(Clone, Debug)]
pub struct CredentialFetchError(pub String);

impl std::fmt::Display for CredentialFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CredentialFetchError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn refreshes_once_when_fetched_credential_already_expired() {
        let now = Instant::now();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let gate = CredentialGate::new(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                let call_index = calls.fetch_add(1, Ordering::SeqCst);
                if call_index == 0 {
                    // Simulate a provider handing back a credential that is
                    // already expired relative to `now`.
                    Ok(RegistryCredentials::new("u", "p", Duration::ZERO, now))
                } else {
                    Ok(RegistryCredentials::new("u", "p", Duration::from_secs(60), now))
                }
            }
        });

        let creds = gate.credentials(now).await.expect("refresh should succeed");
        assert!(!creds.is_expired(now));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn surfaces_rotation_request_when_refresh_still_expired() {
        let now = Instant::now();
        let gate = CredentialGate::new(move || async move { Ok(RegistryCredentials::new("u", "p", Duration::ZERO, now)) });

        let err = gate.credentials(now).await.expect_err("should request rotation");
        assert!(err.reason.contains("expired"));
    }

    #[tokio::test]
    async fn caches_credentials_between_calls() {
        let now = Instant::now();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let gate = CredentialGate::new(move || {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(RegistryCredentials::new("u", "p", Duration::from_secs(60), now))
            }
        });

        gate.credentials(now).await.unwrap();
        gate.credentials(now).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
