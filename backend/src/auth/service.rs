//! Core business logic for the authentication system.
//!
//! This service owns password hashing, access-token issuance and validation,
//! the cached nonce/verify-code lifecycle, and signature recovery for wallet
//! binding and device binding.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, PublicKey, Secp256k1};
use sha2::{Digest, Sha256};

use crate::auth::errors::{AuthError, Result};
use crate::auth::models::{Claims, NonceKind};
use crate::cache::{nonce_key, Cache};
use crate::utils;

type HmacSha256 = Hmac<Sha256>;

const NONCE_TTL: Duration = Duration::from_secs(5 * 60);

/// Text a wallet is asked to sign; wrapping the digits makes the prompt
/// readable in wallet UIs.
const SIGN_NONCE_PREFIX: &str = "StoragePortal";

#[derive(Clone)]
pub struct AuthService {
    secret: Vec<u8>,
    token_ttl_secs: i64,
    cache: Arc<dyn Cache>,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl_hours: i64, cache: Arc<dyn Cache>) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            token_ttl_secs: token_ttl_hours * 3600,
            cache,
        }
    }

    // -- passwords ----------------------------------------------------------

    pub fn hash_password(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(AuthError::PasswordNotAllowed);
        }
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AuthError::Internal(format!("bcrypt: {e}")))
    }

    pub fn verify_password(&self, password: &str, pass_hash: &str) -> Result<()> {
        match bcrypt::verify(password, pass_hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::WrongPassword),
            Err(e) => Err(AuthError::Internal(format!("bcrypt: {e}"))),
        }
    }

    // -- access tokens ------------------------------------------------------

    /// Issues `<hex claims>.<hex hmac>` and returns it with its expiry.
    pub fn issue_token(&self, username: &str, role: i64) -> Result<(String, i64)> {
        let exp = chrono::Utc::now().timestamp() + self.token_ttl_secs;
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp,
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| AuthError::Internal(format!("encode claims: {e}")))?;
        let tag = self.sign(&payload)?;
        Ok((format!("{}.{}", hex::encode(payload), hex::encode(tag)), exp))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let (payload_hex, tag_hex) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = hex::decode(payload_hex).map_err(|_| AuthError::InvalidToken)?;
        let tag = hex::decode(tag_hex).map_err(|_| AuthError::InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("hmac: {e}")))?;
        mac.update(&payload);
        mac.verify_slice(&tag).map_err(|_| AuthError::InvalidToken)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp < chrono::Utc::now().timestamp() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("hmac: {e}")))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    // -- nonces and verify codes --------------------------------------------

    /// Issues a 6-digit code for the flow; refuses while an unexpired code
    /// exists so the sender cannot be used as a spam relay.
    pub async fn issue_verify_code(&self, kind: NonceKind, username: &str) -> Result<String> {
        let key = nonce_key(kind.key_part(), username);
        let existing = self
            .cache
            .get(&key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        if existing.is_some() {
            return Err(AuthError::VerifyCodeTooOften);
        }

        let code = utils::random_digits(6);
        self.cache
            .set_ex(&key, &code, NONCE_TTL)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(code)
    }

    /// Checks and consumes the cached code for the flow.
    pub async fn consume_verify_code(
        &self,
        kind: NonceKind,
        username: &str,
        code: &str,
    ) -> Result<()> {
        let key = nonce_key(kind.key_part(), username);
        let cached = self
            .cache
            .get(&key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let Some(cached) = cached else {
            return Err(AuthError::VerifyCodeExpired);
        };
        if code.is_empty() || cached != code {
            return Err(AuthError::InvalidVerifyCode);
        }

        self.cache
            .del(&key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Fresh nonce for wallet signing; replaces whatever was cached.
    pub async fn issue_signature_nonce(&self, username: &str) -> Result<String> {
        let nonce = format!("{SIGN_NONCE_PREFIX}({})", utils::random_digits(6));
        let key = nonce_key(NonceKind::Signature.key_part(), username);
        self.cache
            .set_ex(&key, &nonce, NONCE_TTL)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(nonce)
    }

    pub async fn signature_nonce(&self, username: &str) -> Result<Option<String>> {
        let key = nonce_key(NonceKind::Signature.key_part(), username);
        self.cache
            .get(&key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// signature recovery

/// Recovers the signer address from an EIP-191 personal-sign signature.
pub fn recover_wallet_address(message: &str, signature_hex: &str) -> Result<String> {
    let sig = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|_| AuthError::InvalidSignature("signature is not hex".into()))?;
    if sig.len() != 65 {
        return Err(AuthError::InvalidSignature(format!(
            "expected 65 byte signature, got {}",
            sig.len()
        )));
    }

    // Most wallets still emit the legacy 27/28 recovery values.
    let mut v = sig[64];
    if v >= 27 {
        v -= 27;
    }
    let rec_id = RecoveryId::from_i32(v as i32)
        .map_err(|_| AuthError::InvalidSignature("bad recovery id".into()))?;
    let rec_sig = RecoverableSignature::from_compact(&sig[..64], rec_id)
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

    let digest = personal_sign_digest(message);
    let secp = Secp256k1::new();
    let pubkey = secp
        .recover_ecdsa(&Message::from_digest(digest), &rec_sig)
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

    Ok(eth_address(&pubkey))
}

/// Verifies a device's compact ECDSA signature over `payload`, using the
/// compressed public key the scheduler hands out for the node.
pub fn verify_device_signature(
    pubkey_hex: &str,
    payload: &[u8],
    signature_hex: &str,
) -> Result<()> {
    let pubkey_bytes = hex::decode(pubkey_hex)
        .map_err(|_| AuthError::InvalidSignature("public key is not hex".into()))?;
    let pubkey = PublicKey::from_slice(&pubkey_bytes)
        .map_err(|e| AuthError::InvalidSignature(format!("bad public key: {e}")))?;

    let sig_bytes = hex::decode(signature_hex)
        .map_err(|_| AuthError::InvalidSignature("signature is not hex".into()))?;
    let sig = Signature::from_compact(&sig_bytes)
        .map_err(|e| AuthError::InvalidSignature(format!("bad signature: {e}")))?;

    let digest: [u8; 32] = Sha256::digest(payload).into();
    let secp = Secp256k1::new();
    secp.verify_ecdsa(&Message::from_digest(digest), &sig, &pubkey)
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))
}

fn personal_sign_digest(message: &str) -> [u8; 32] {
    let framed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(framed.as_bytes())
}

fn eth_address(pubkey: &PublicKey) -> String {
    let uncompressed = pubkey.serialize_uncompressed();
    let digest = keccak256(&uncompressed[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::Digest as _;
    sha3::Keccak256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use secp256k1::SecretKey;

    fn service() -> AuthService {
        AuthService::new("test-secret", 1, Arc::new(MemoryCache::new()))
    }

    #[test]
    fn password_round_trip() {
        let auth = service();
        let hash = auth.hash_password("hunter2!").unwrap();
        auth.verify_password("hunter2!", &hash).unwrap();
        assert!(matches!(
            auth.verify_password("wrong", &hash),
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            auth.hash_password(""),
            Err(AuthError::PasswordNotAllowed)
        ));
    }

    #[test]
    fn token_round_trip_and_tamper() {
        let auth = service();
        let (token, exp) = auth.issue_token("alice@x.io", 0).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "alice@x.io");
        assert_eq!(claims.exp, exp);

        let mut tampered = token.clone();
        tampered.replace_range(..2, "ff");
        assert!(auth.verify_token(&tampered).is_err());

        let other = AuthService::new("other-secret", 1, Arc::new(MemoryCache::new()));
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let auth = AuthService::new("test-secret", -1, Arc::new(MemoryCache::new()));
        let (token, _) = auth.issue_token("alice@x.io", 0).unwrap();
        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn verify_code_lifecycle() {
        let auth = service();
        let code = auth
            .issue_verify_code(NonceKind::Register, "a@x.io")
            .await
            .unwrap();

        // A second issue while the first is alive is a frequency error.
        assert!(matches!(
            auth.issue_verify_code(NonceKind::Register, "a@x.io").await,
            Err(AuthError::VerifyCodeTooOften)
        ));

        // Wrong flow, wrong code, then success, then it is gone.
        assert!(auth
            .consume_verify_code(NonceKind::Reset, "a@x.io", &code)
            .await
            .is_err());
        assert!(matches!(
            auth.consume_verify_code(NonceKind::Register, "a@x.io", "000000").await,
            Err(AuthError::InvalidVerifyCode)
        ));
        auth.consume_verify_code(NonceKind::Register, "a@x.io", &code)
            .await
            .unwrap();
        assert!(matches!(
            auth.consume_verify_code(NonceKind::Register, "a@x.io", &code).await,
            Err(AuthError::VerifyCodeExpired)
        ));
    }

    #[test]
    fn wallet_recovery_matches_signer() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x17; 32]).unwrap();
        let pubkey = sk.public_key(&secp);
        let expected = eth_address(&pubkey);

        let message = "StoragePortal(123456)";
        let digest = personal_sign_digest(message);
        let rec_sig = secp.sign_ecdsa_recoverable(&Message::from_digest(digest), &sk);
        let (rec_id, compact) = rec_sig.serialize_compact();

        let mut wire = [0u8; 65];
        wire[..64].copy_from_slice(&compact);
        wire[64] = rec_id.to_i32() as u8 + 27;

        let recovered = recover_wallet_address(message, &hex::encode(wire)).unwrap();
        assert_eq!(recovered, expected);

        let other = recover_wallet_address("different message", &hex::encode(wire)).unwrap();
        assert_ne!(other, expected);
    }

    #[test]
    fn device_signatures_verify() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x29; 32]).unwrap();
        let pubkey_hex = hex::encode(sk.public_key(&secp).serialize());

        let payload = b"bind-code-77";
        let digest: [u8; 32] = Sha256::digest(payload).into();
        let sig = secp.sign_ecdsa(&Message::from_digest(digest), &sk);
        let sig_hex = hex::encode(sig.serialize_compact());

        verify_device_signature(&pubkey_hex, payload, &sig_hex).unwrap();
        assert!(verify_device_signature(&pubkey_hex, b"other payload", &sig_hex).is_err());
    }
}
