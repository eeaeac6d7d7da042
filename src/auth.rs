use crate::database::Database;
use crate::error::{TrackerError, TrackerResult};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// app_meta key holding the encrypted principal.
const PRINCIPAL_META_KEY: &str = "tt_api_user";

/// The signed-in user the remote API acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    pub uid: String,
    pub token: String,
}

/// Holds the current principal. Without one, nothing is sent remotely.
#[derive(Clone)]
pub struct AuthManager {
    principal: Arc<RwLock<Option<ApiUser>>>,
    db: Option<Arc<Database>>,
    encryption: Arc<TokenEncryption>,
}

impl AuthManager {
    pub fn new(db: Option<Arc<Database>>) -> TrackerResult<Self> {
        Ok(Self {
            principal: Arc::new(RwLock::new(None)),
            db,
            encryption: Arc::new(TokenEncryption::new()?),
        })
    }

    /// Replaces the principal and stores it encrypted, if storage is on.
    pub fn set_principal(&self, user: Option<ApiUser>) {
        match &user {
            Some(u) => info!("[AUTH] Principal set for uid {}", u.uid),
            None => info!("[AUTH] Principal cleared"),
        }
        self.persist(user.as_ref());
        *self.principal.write().unwrap_or_else(|e| e.into_inner()) = user;
    }

    pub fn principal(&self) -> Option<ApiUser> {
        self.principal
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn persist(&self, user: Option<&ApiUser>) {
        let Some(db) = &self.db else {
            return;
        };
        let result = match user {
            None => db.delete_app_meta(PRINCIPAL_META_KEY).map_err(TrackerError::from),
            Some(u) => serde_json::to_string(u)
                .map_err(TrackerError::from)
                .and_then(|json| self.encryption.encrypt(&json))
                .and_then(|enc| {
                    db.set_app_meta(PRINCIPAL_META_KEY, &enc)
                        .map_err(TrackerError::from)
                }),
        };
        if let Err(e) = result {
            warn!("[AUTH] Failed to store principal: {}", e);
        }
    }

    /// Loads a previously stored principal. Unreadable data is discarded.
    pub fn restore(&self) -> bool {
        let Some(db) = &self.db else {
            return false;
        };
        let stored = match db.get_app_meta(PRINCIPAL_META_KEY) {
            Ok(Some(v)) if !v.is_empty() => v,
            Ok(_) => return false,
            Err(e) => {
                warn!("[AUTH] Failed to read stored principal: {}", e);
                return false;
            }
        };
        let user = self
            .encryption
            .decrypt(&stored)
            .and_then(|json| serde_json::from_str::<ApiUser>(&json).map_err(TrackerError::from));
        match user {
            Ok(user) => {
                info!("[AUTH] Restored principal for uid {}", user.uid);
                *self.principal.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
                true
            }
            Err(e) => {
                warn!("[AUTH] Stored principal unreadable, ignoring: {}", e);
                false
            }
        }
    }
}

const ENCRYPTION_KEY_ENV: &str = "TT_ENCRYPTION_KEY";
const DEFAULT_ENCRYPTION_KEY: &[u8; 32] = b"focuslog-local-key-32-bytes-long";

/// Decodes a 64-hex-char key. Anything else falls back to the built-in key
/// with a warning so a bad setting never prevents startup.
fn key_from_env_value(raw: Option<&str>) -> Vec<u8> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return DEFAULT_ENCRYPTION_KEY.to_vec();
    };
    match hex::decode(raw) {
        Ok(key) if key.len() == 32 => key,
        Ok(key) => {
            warn!(
                "[AUTH] {} must be 32 bytes, got {}; using the default key",
                ENCRYPTION_KEY_ENV,
                key.len()
            );
            DEFAULT_ENCRYPTION_KEY.to_vec()
        }
        Err(e) => {
            warn!(
                "[AUTH] {} is not valid hex ({}); using the default key",
                ENCRYPTION_KEY_ENV, e
            );
            DEFAULT_ENCRYPTION_KEY.to_vec()
        }
    }
}

/// AES-256-GCM encryption of secrets stored in SQLite. The key comes from
/// `TT_ENCRYPTION_KEY` (64 hex chars) or a built-in default.
pub struct TokenEncryption {
    cipher: Aes256Gcm,
}

impl TokenEncryption {
    pub fn new() -> TrackerResult<Self> {
        let key = key_from_env_value(std::env::var(ENCRYPTION_KEY_ENV).ok().as_deref());
        Self::from_key(&key)
    }

    pub fn from_key(key: &[u8]) -> TrackerResult<Self> {
        let key_array: [u8; 32] = key
            .try_into()
            .map_err(|_| TrackerError::Crypto("Encryption key must be 32 bytes".to_string()))?;
        Ok(Self {
            cipher: Aes256Gcm::new(&key_array.into()),
        })
    }

    /// Returns base64 of `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &str) -> TrackerResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| TrackerError::Crypto(format!("Encryption failed: {}", e)))?;
        let mut result = nonce.to_vec();
        result.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(&result))
    }

    pub fn decrypt(&self, encrypted: &str) -> TrackerResult<String> {
        let data = general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|e| TrackerError::Crypto(format!("Base64 decode failed: {}", e)))?;
        if data.len() < 12 {
            return Err(TrackerError::Crypto(
                "Invalid encrypted data length".to_string(),
            ));
        }
        let nonce = Nonce::from_slice(&data[..12]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &data[12..])
            .map_err(|e| TrackerError::Crypto(format!("Decryption failed: {}", e)))?;
        String::from_utf8(plaintext)
            .map_err(|e| TrackerError::Crypto(format!("UTF-8 decode failed: {}", e)))
    }
}
