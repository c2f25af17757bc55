use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::fmt;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Bucket used when the edge did not forward a client address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit bucket for one submitter.
///
/// Taken verbatim from `x-forwarded-for`; the header is trusted as set by the
/// network edge and not split into hops. Requests without it all share the
/// `unknown` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(Self::new)
            .unwrap_or_else(|| Self::new(UNKNOWN_CLIENT))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    // Short digest so logs never carry raw addresses
    pub fn log_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_id())
    }
}
