use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use meetopia_types::api::IceServer;

type HmacSha1 = Hmac<Sha1>;

/// How long issued TURN credentials stay valid.
pub const TURN_CREDENTIAL_TTL: Duration = Duration::hours(24);

/// STUN/TURN servers handed to browsers before they build a peer connection.
#[derive(Debug, Clone, Default)]
pub struct IceConfig {
    pub stun_urls: Vec<String>,
    pub turn_urls: Vec<String>,
    /// Shared secret with the TURN server (`static-auth-secret` in coturn).
    pub turn_secret: Option<String>,
}

impl IceConfig {
    /// ICE server list for `user`. TURN is only included when both urls and a
    /// secret are configured.
    pub fn servers_for(&self, user: &str, now: DateTime<Utc>) -> anyhow::Result<Vec<IceServer>> {
        let mut servers = Vec::with_capacity(2);

        if !self.stun_urls.is_empty() {
            servers.push(IceServer {
                urls: self.stun_urls.clone(),
                username: None,
                credential: None,
            });
        }

        if let Some(secret) = self.turn_secret.as_deref().filter(|s| !s.is_empty()) {
            if !self.turn_urls.is_empty() {
                let expires_at = (now + TURN_CREDENTIAL_TTL).timestamp();
                let (username, credential) = turn_credentials(secret, user, expires_at)?;
                servers.push(IceServer {
                    urls: self.turn_urls.clone(),
                    username: Some(username),
                    credential: Some(credential),
                });
            }
        }

        Ok(servers)
    }
}

/// Time-limited TURN credentials: `username = "<expiry>:<user>"`,
/// `credential = base64(HMAC-SHA1(secret, username))`.
pub fn turn_credentials(secret: &str, user: &str, expires_at: i64) -> anyhow::Result<(String, String)> {
    let username = format!("{}:{}", expires_at, user);

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid TURN secret: {}", e))?;
    mac.update(username.as_bytes());
    let credential = B64.encode(mac.finalize().into_bytes());

    Ok((username, credential))
}
