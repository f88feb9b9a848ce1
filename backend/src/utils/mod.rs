//! Small helpers shared across handlers and services.

use axum::http::HeaderMap;
use rand::Rng;
use sha2::{Digest, Sha256};

const CODE_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random alphanumeric string, used for referral codes and nonces.
pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Random decimal string, used for emailed verify codes.
pub fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// Derives the cross-area storage key for a CID. Every table that tracks an
/// asset keys it by this value rather than the raw CID.
pub fn cid_storage_key(cid: &str) -> String {
    hex::encode(Sha256::digest(cid.as_bytes()))
}

/// Masks an email for the referral roster: `alexander@x.io` -> `ale****er@x.io`.
pub fn mask_email(email: &str) -> String {
    let Some((prefix, suffix)) = email.split_once('@') else {
        return email.to_string();
    };
    if prefix.len() > 5 {
        format!(
            "{}****{}@{}",
            &prefix[..3],
            &prefix[prefix.len() - 2..],
            suffix
        )
    } else if prefix.len() >= 3 {
        format!("{}****@{}", &prefix[..3], suffix)
    } else {
        format!("{prefix}****@{suffix}")
    }
}

/// Best-effort client address: proxy headers first, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<std::net::SocketAddr>) -> Option<String> {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }
    if let Some(fwd) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = fwd.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_stable() {
        let a = cid_storage_key("bafybeigdyrzt5example");
        let b = cid_storage_key("bafybeigdyrzt5example");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, cid_storage_key("bafybeigdyrzt5other"));
    }

    #[test]
    fn random_codes_have_requested_length() {
        assert_eq!(random_code(6).len(), 6);
        assert_eq!(random_digits(6).len(), 6);
        assert!(random_digits(6).chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn emails_are_masked() {
        assert_eq!(mask_email("alexander@x.io"), "ale****er@x.io");
        assert_eq!(mask_email("bob@x.io"), "bob****@x.io");
        assert_eq!(mask_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn client_ip_prefers_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, None).as_deref(), Some("203.0.113.7"));

        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers, None).as_deref(), Some("198.51.100.2"));
    }
}
