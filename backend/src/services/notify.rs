//! Upload notification delivery.
//!
//! Tenant integrations register a callback URL; when one of their users
//! finishes an upload, the portal POSTs the asset metadata there, signed so
//! the tenant can authenticate the call. Deliveries go through a bounded
//! queue and a single worker task so a slow tenant cannot stall handlers.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils;

type HmacSha256 = Hmac<Sha256>;

const QUEUE_DEPTH: usize = 256;
const DELIVERY_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct UploadNotification {
    /// Tenant-side identifier of the upload, echoed back verbatim.
    pub extra_id: String,
    pub user_id: String,
    pub asset_name: String,
    pub asset_cid: String,
    pub asset_type: String,
    pub asset_size: i64,
    pub group_id: i64,
    pub created_at: String,
    /// Where to POST; not serialized into the callback body.
    #[serde(skip_serializing)]
    pub notify_url: String,
}

#[derive(Clone)]
pub struct NotifyQueue {
    tx: mpsc::Sender<UploadNotification>,
}

impl NotifyQueue {
    /// Starts the delivery worker and returns the queue handle.
    pub fn spawn(callback_secret: String) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(delivery_loop(rx, callback_secret));
        (Self { tx }, handle)
    }

    /// Queues a notification. Deliveries are best effort; a full queue drops
    /// the notification and logs it rather than blocking the upload path.
    pub fn enqueue(&self, notification: UploadNotification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::error!("upload notification dropped: {e}");
        }
    }
}

async fn delivery_loop(mut rx: mpsc::Receiver<UploadNotification>, secret: String) {
    let http = reqwest::Client::new();

    while let Some(notification) = rx.recv().await {
        let mut delivered = false;
        for attempt in 1..=DELIVERY_ATTEMPTS {
            match deliver(&http, &secret, &notification).await {
                Ok(()) => {
                    tracing::info!(url = %notification.notify_url, cid = %notification.asset_cid, "upload notified");
                    delivered = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(url = %notification.notify_url, attempt, "notify failed: {e}");
                }
            }
        }
        if !delivered {
            tracing::error!(url = %notification.notify_url, cid = %notification.asset_cid, "upload notification abandoned");
        }
    }
}

async fn deliver(
    http: &reqwest::Client,
    secret: &str,
    notification: &UploadNotification,
) -> Result<(), String> {
    let body = serde_json::to_string(notification).map_err(|e| e.to_string())?;
    let timestamp = chrono::Utc::now().to_rfc3339();
    let nonce = utils::random_digits(16);
    let signature = sign_callback(
        secret,
        "POST",
        &notification.notify_url,
        &body,
        &timestamp,
        &nonce,
    );

    let resp = http
        .post(&notification.notify_url)
        .header("Content-Type", "application/json")
        .header("X-Timestamp", &timestamp)
        .header("X-Nonce", &nonce)
        .header("X-Signature", &signature)
        .body(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("callback returned http {status}"));
    }
    let text = resp.text().await.map_err(|e| e.to_string())?;
    if text != "success" {
        return Err(format!("unexpected callback response: {text}"));
    }
    Ok(())
}

/// HMAC-SHA256 over `method + url + body + timestamp + nonce`, hex encoded.
/// The tenant recomputes this to authenticate the callback.
pub fn sign_callback(
    secret: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: &str,
    nonce: &str,
) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(method.as_bytes());
    mac.update(url.as_bytes());
    mac.update(body.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_signature_is_deterministic() {
        let a = sign_callback("secret", "POST", "https://t.example/cb", "{}", "ts", "42");
        let b = sign_callback("secret", "POST", "https://t.example/cb", "{}", "ts", "42");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn callback_signature_covers_every_component() {
        let base = sign_callback("secret", "POST", "https://t.example/cb", "{}", "ts", "42");
        assert_ne!(
            base,
            sign_callback("other", "POST", "https://t.example/cb", "{}", "ts", "42")
        );
        assert_ne!(
            base,
            sign_callback("secret", "POST", "https://t.example/cb", "{\"a\":1}", "ts", "42")
        );
        assert_ne!(
            base,
            sign_callback("secret", "POST", "https://t.example/cb", "{}", "ts2", "42")
        );
        assert_ne!(
            base,
            sign_callback("secret", "POST", "https://t.example/cb", "{}", "ts", "43")
        );
    }

    #[test]
    fn notification_body_omits_the_url() {
        let n = UploadNotification {
            extra_id: "x1".into(),
            user_id: "u@x.io".into(),
            asset_name: "a.bin".into(),
            asset_cid: "cid-1".into(),
            asset_type: "file".into(),
            asset_size: 9,
            group_id: 0,
            created_at: "2026-01-01T00:00:00Z".into(),
            notify_url: "https://t.example/cb".into(),
        };
        let body = serde_json::to_string(&n).unwrap();
        assert!(!body.contains("notify_url"));
        assert!(body.contains("cid-1"));
    }
}
