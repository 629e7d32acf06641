//! Device identity and pairing tokens
//!
//! A node identifies itself on every connect. The controller may respond with
//! a pairing token (ephemeral, held for the session) and later confirm the
//! pairing with a persistent token, which is written to the store and
//! presented on all future connects. Both tokens can be live at once while a
//! pairing session is open; a config mutation may authenticate with either.

use crate::config::TokenPolicy;
use crate::store::ProfileStore;
use thiserror::Error;
use tracing::{info, warn};
use wolhub_shared::wire;

pub const STORE_NAMESPACE: &str = "identity";
pub const STORE_KEY: &str = "token";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("token mismatch")]
    TokenMismatch,

    #[error("token required but not presented")]
    TokenRequired,
}

pub struct DeviceIdentity {
    device_id: String,
    /// Ephemeral token from `pairing_required`, session-only
    pairing_token: Option<String>,
    /// Durable token, backed by the store
    persistent_token: Option<String>,
    /// True when the persistent token survived to (or came from) the store
    durable: bool,
}

impl DeviceIdentity {
    /// Load the identity at startup, picking up a previously persisted token
    pub fn load(device_id: &str, store: &dyn ProfileStore) -> Self {
        let persistent_token = match store.get(STORE_NAMESPACE, STORE_KEY) {
            Ok(Some(token)) if !token.is_empty() => {
                info!("loaded persisted pairing token");
                Some(token)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("identity store unavailable, starting unpaired: {}", e);
                None
            }
        };
        let durable = persistent_token.is_some();
        Self {
            device_id: device_id.to_string(),
            pairing_token: None,
            persistent_token,
            durable,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The token presented on the wire: the open pairing session wins,
    /// otherwise the durable token.
    pub fn token(&self) -> Option<&str> {
        self.pairing_token
            .as_deref()
            .or(self.persistent_token.as_deref())
    }

    /// Whether the held token survives a restart
    pub fn is_paired(&self) -> bool {
        self.durable
    }

    /// The identify frame sent on every (re)connect
    pub fn identify_frame(&self) -> String {
        wire::identify(&self.device_id, self.token())
    }

    /// Adopt an ephemeral token from a `pairing_required` frame. It is held
    /// for this session only; a restart before `identify_success` loses it.
    /// The durable token, if any, stays valid alongside it.
    pub fn set_pairing_token(&mut self, token: String) {
        info!("pairing required, holding session token");
        self.pairing_token = Some(token);
    }

    /// Complete pairing from an `identify_success` frame. A provided
    /// persistent token replaces whatever we held; without one the session
    /// token is promoted. Either way the surviving token is written to the
    /// store so it comes back on restart.
    pub fn complete_pairing(&mut self, persistent: Option<String>, store: &dyn ProfileStore) {
        let token = match persistent.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => match self.pairing_token.take() {
                Some(held) => held,
                None => {
                    info!("identify acknowledged with no token to persist");
                    return;
                }
            },
        };

        if let Err(e) = store.put(STORE_NAMESPACE, STORE_KEY, &token) {
            warn!("failed to persist pairing token: {}", e);
            self.durable = false;
        } else {
            info!("pairing complete, token persisted");
            self.durable = true;
        }
        self.persistent_token = Some(token);
        self.pairing_token = None;
    }

    /// Check a token presented with a config mutation. A presented token is
    /// accepted when it equals either the durable token or the current
    /// pairing token.
    pub fn authorize(&self, presented: Option<&str>, policy: TokenPolicy) -> Result<(), AuthError> {
        let Some(presented) = presented else {
            return match policy {
                TokenPolicy::AllowMissing => {
                    warn!("config mutation without token accepted by policy");
                    Ok(())
                }
                TokenPolicy::Require => Err(AuthError::TokenRequired),
            };
        };

        if self.pairing_token.is_none() && self.persistent_token.is_none() {
            // nothing to check against; accept and let the controller
            // re-pair if it cares
            warn!("token presented but none held, accepting");
            return Ok(());
        }

        let matches = self.persistent_token.as_deref() == Some(presented)
            || self.pairing_token.as_deref() == Some(presented);
        if matches {
            Ok(())
        } else {
            Err(AuthError::TokenMismatch)
        }
    }
}
