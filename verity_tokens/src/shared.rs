use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use arc_swap::ArcSwapOption;
use verity_clock::{Clock, DurationSecs, System};

use crate::{InvalidToken, NotRevoked, Token, TokenRequestError};

/// A token shared between threads
///
/// Readers always see a complete token and never wait on a refresh.
/// Refreshes and revocations through the same holder are serialized, so at
/// most one request for a new token is in flight at a time.
#[derive(Clone)]
pub struct SharedToken {
    inner: Arc<Inner>,
}

struct Inner {
    current: ArcSwapOption<Token>,
    lifecycle: Mutex<()>,
}

impl SharedToken {
    /// Shares `token`
    pub fn new(token: Token) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: ArcSwapOption::from_pointee(token),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    /// The current token, or `None` once it has been revoked
    #[inline]
    pub fn current(&self) -> Option<Arc<Token>> {
        self.inner.current.load_full()
    }

    /// Installs a new token, returning the one it replaces
    pub fn replace(&self, token: Token) -> Option<Arc<Token>> {
        let _guard = self.lock();
        self.inner.current.swap(Some(Arc::new(token)))
    }

    /// Refreshes the held token unconditionally
    ///
    /// On failure the held token is left as it was.
    pub fn refresh(&self) -> Result<Arc<Token>, TokenRequestError> {
        let _guard = self.lock();
        let current = self.current().ok_or(InvalidToken::Revoked)?;
        self.refresh_locked(&current)
    }

    /// Refreshes the held token if it has expired or expires within
    /// `threshold`
    ///
    /// Callers that lose the race to refresh receive the token the winner
    /// obtained rather than issuing a second request.
    pub fn refresh_if_expiring(
        &self,
        threshold: DurationSecs,
    ) -> Result<Arc<Token>, TokenRequestError> {
        self.refresh_if_expiring_with_clock(threshold, &System)
    }

    /// Refreshes the held token if it has expired or expires within
    /// `threshold` according to `clock`
    pub fn refresh_if_expiring_with_clock<C: Clock>(
        &self,
        threshold: DurationSecs,
        clock: &C,
    ) -> Result<Arc<Token>, TokenRequestError> {
        let current = self.current().ok_or(InvalidToken::Revoked)?;
        if !needs_refresh(&current, threshold, clock) {
            return Ok(current);
        }

        let _guard = self.lock();
        let current = self.current().ok_or(InvalidToken::Revoked)?;
        if !needs_refresh(&current, threshold, clock) {
            tracing::debug!("token already refreshed by another caller");
            return Ok(current);
        }

        self.refresh_locked(&current)
    }

    /// Revokes the held token, clearing it if the authority accepted
    ///
    /// Returns `Ok(false)` and keeps the token when revocation failed.
    pub fn revoke(&self) -> Result<bool, InvalidToken> {
        let _guard = self.lock();
        let current = self.current().ok_or(InvalidToken::Revoked)?;

        match Token::clone(&current).revoke() {
            Ok(()) => {
                self.inner.current.store(None);
                Ok(true)
            }
            Err(NotRevoked::MissingClient(_)) => Err(InvalidToken::MissingClient),
            Err(NotRevoked::Refused(_)) => Ok(false),
        }
    }

    fn refresh_locked(&self, current: &Token) -> Result<Arc<Token>, TokenRequestError> {
        let fresh = Arc::new(current.refresh()?);
        self.inner.current.store(Some(Arc::clone(&fresh)));
        tracing::debug!(expires_at = fresh.expires_at().map(|t| t.0), "replaced shared token");
        Ok(fresh)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // the guarded value is `()`, so a panic elsewhere cannot leave it
        // inconsistent
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Token> for SharedToken {
    fn from(token: Token) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SharedToken")
            .field("current", &self.current())
            .finish()
    }
}

fn needs_refresh<C: Clock>(token: &Token, threshold: DurationSecs, clock: &C) -> bool {
    let now = clock.now();
    token.is_expired_at(now) || token.expires_soon_at(threshold, now)
}
