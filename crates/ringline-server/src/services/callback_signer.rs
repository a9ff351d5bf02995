//! Callback URL signing
//!
//! Every callback URL handed to the gateway is bound to one call id. When a
//! secret is configured the URL also carries `token = hex(HMAC-SHA256(secret, call_id))`,
//! so forged callbacks for other calls are rejected before touching state.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Callback endpoint kinds, as they appear in the URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Connected,
    Gather,
    Status,
}

impl Endpoint {
    fn as_path(self) -> &'static str {
        match self {
            Endpoint::Connected => "connected",
            Endpoint::Gather => "gather",
            Endpoint::Status => "status",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallbackSigner {
    base_url: String,
    secret: Option<String>,
}

impl CallbackSigner {
    pub fn new(base_url: impl Into<String>, secret: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, secret }
    }

    pub fn connected_url(&self, call_id: Uuid) -> String {
        self.url(call_id, Endpoint::Connected)
    }

    pub fn gather_url(&self, call_id: Uuid) -> String {
        self.url(call_id, Endpoint::Gather)
    }

    pub fn status_url(&self, call_id: Uuid) -> String {
        self.url(call_id, Endpoint::Status)
    }

    fn url(&self, call_id: Uuid, endpoint: Endpoint) -> String {
        let url = format!(
            "{}/ringline/gateway/calls/{}/{}",
            self.base_url,
            call_id,
            endpoint.as_path()
        );
        match self.token(call_id) {
            Some(token) => format!("{url}?token={token}"),
            None => url,
        }
    }

    fn mac(&self, call_id: Uuid) -> Option<HmacSha256> {
        let secret = self.secret.as_deref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(call_id.as_bytes());
        Some(mac)
    }

    /// Token for a call, or `None` when signing is disabled
    pub fn token(&self, call_id: Uuid) -> Option<String> {
        self.mac(call_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time token check. Always passes when signing is disabled.
    pub fn verify(&self, call_id: Uuid, token: Option<&str>) -> bool {
        let Some(mac) = self.mac(call_id) else {
            return self.secret.is_none();
        };
        token
            .and_then(|t| hex::decode(t).ok())
            .is_some_and(|bytes| mac.verify_slice(&bytes).is_ok())
    }
}
