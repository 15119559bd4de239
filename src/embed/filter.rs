//! Origin and payload gating for inbound embed messages
//!
//! This module decides which cross-context messages the session timer
//! acts on: only `show`/`hide` lifecycle messages sent from the trusted
//! embed origin.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use super::message::{EmbedAction, InboundMessage};

/// How an inbound origin is compared with the trusted origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginMatch {
    /// Scheme, host and port must all match.
    #[default]
    Exact,
    /// Same scheme, and the host equals the trusted host or is a subdomain of it.
    Domain,
}

/// Filter deciding whether an inbound message drives the timer.
#[derive(Debug, Clone)]
pub struct OriginFilter {
    trusted: Url,
    mode: OriginMatch,
}

impl OriginFilter {
    /// Create a filter trusting `trusted_origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not a URL with a host.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_timing::embed::{OriginFilter, OriginMatch};
    ///
    /// let filter = OriginFilter::new("https://labs.heygen.com", OriginMatch::Exact);
    /// assert!(filter.is_ok());
    /// assert!(OriginFilter::new("not a url", OriginMatch::Exact).is_err());
    /// ```
    pub fn new(trusted_origin: &str, mode: OriginMatch) -> Result<Self> {
        let trusted = Url::parse(trusted_origin)
            .map_err(|e| anyhow!("Invalid trusted origin {}: {}", trusted_origin, e))?;
        if trusted.host_str().is_none() {
            return Err(anyhow!("Trusted origin has no host: {}", trusted_origin));
        }
        Ok(Self { trusted, mode })
    }

    /// Check whether `origin` is the trusted embed origin.
    ///
    /// # Examples
    ///
    /// ```
    /// use session_timing::embed::{OriginFilter, OriginMatch};
    ///
    /// let filter = OriginFilter::new("https://heygen.com", OriginMatch::Domain).unwrap();
    /// assert!(filter.is_trusted("https://labs.heygen.com"));
    /// assert!(!filter.is_trusted("https://heygen.com.evil.example"));
    /// ```
    pub fn is_trusted(&self, origin: &str) -> bool {
        let Ok(candidate) = Url::parse(origin) else {
            return false;
        };

        match self.mode {
            OriginMatch::Exact => candidate.origin() == self.trusted.origin(),
            OriginMatch::Domain => {
                if candidate.scheme() != self.trusted.scheme() {
                    return false;
                }
                match (candidate.host_str(), self.trusted.host_str()) {
                    (Some(host), Some(trusted)) => {
                        host == trusted || host.ends_with(&format!(".{}", trusted))
                    }
                    _ => false,
                }
            }
        }
    }

    /// The session-boundary action carried by `message`, if it should be
    /// acted on.
    ///
    /// Returns `None` for untrusted origins, foreign payloads, `init` and
    /// unknown actions.
    pub fn accept(&self, message: &InboundMessage) -> Option<EmbedAction> {
        if !self.is_trusted(&message.origin) {
            return None;
        }
        match message.embed_action()? {
            EmbedAction::Init => None,
            action => Some(action),
        }
    }

    /// Get filter summary for logging.
    pub fn summary(&self) -> String {
        let origin = self.trusted.origin().ascii_serialization();
        match self.mode {
            OriginMatch::Exact => format!("origin={}", origin),
            OriginMatch::Domain => format!("origin~*.{}", origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOST: &str = "https://labs.heygen.com";

    fn exact() -> OriginFilter {
        OriginFilter::new(HOST, OriginMatch::Exact).unwrap()
    }

    #[test]
    fn test_exact_match_accepts_trusted_origin() {
        assert!(exact().is_trusted("https://labs.heygen.com"));
    }

    #[test]
    fn test_exact_match_rejects_other_scheme_and_port() {
        let filter = exact();
        assert!(!filter.is_trusted("http://labs.heygen.com"));
        assert!(!filter.is_trusted("https://labs.heygen.com:8443"));
        assert!(!filter.is_trusted("https://app.heygen.com"));
    }

    #[test]
    fn test_opaque_origin_is_rejected() {
        assert!(!exact().is_trusted("null"));
        assert!(!exact().is_trusted(""));
    }

    #[test]
    fn test_domain_match_accepts_subdomains_only() {
        let filter = OriginFilter::new("https://heygen.com", OriginMatch::Domain).unwrap();
        assert!(filter.is_trusted("https://heygen.com"));
        assert!(filter.is_trusted("https://labs.heygen.com"));
        assert!(!filter.is_trusted("https://notheygen.com"));
        assert!(!filter.is_trusted("http://labs.heygen.com"));
    }

    #[test]
    fn test_accept_show_and_hide() {
        let filter = exact();
        let show = InboundMessage::embed(HOST, EmbedAction::Show);
        let hide = InboundMessage::embed(HOST, EmbedAction::Hide);
        assert_eq!(filter.accept(&show), Some(EmbedAction::Show));
        assert_eq!(filter.accept(&hide), Some(EmbedAction::Hide));
    }

    #[test]
    fn test_accept_ignores_init() {
        let init = InboundMessage::embed(HOST, EmbedAction::Init);
        assert_eq!(exact().accept(&init), None);
    }

    #[test]
    fn test_accept_ignores_untrusted_origin() {
        let show = InboundMessage::embed("https://evil.example", EmbedAction::Show);
        assert_eq!(exact().accept(&show), None);
    }

    #[test]
    fn test_accept_ignores_foreign_payload() {
        let message = InboundMessage {
            origin: HOST.to_string(),
            data: json!({"type": "other-widget", "action": "show"}),
        };
        assert_eq!(exact().accept(&message), None);
    }

    #[test]
    fn test_summary() {
        assert_eq!(exact().summary(), "origin=https://labs.heygen.com");
    }
}
