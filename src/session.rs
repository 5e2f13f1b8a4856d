//! Signed session cookie carrying the active business id.
//!
//! Cookie value is `<business_id>.<hex HMAC-SHA256(business_id)>`. A cookie
//! that fails verification is treated as absent.

use anyhow::{anyhow, Context, Result};
use axum::http::{header, HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SESSION_COOKIE: &str = "bizdesk_session";

const CLEAR_COOKIE: &str = "bizdesk_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("invalid session secret key"))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, business_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(business_id.as_bytes());
        format!("{}.{}", business_id, hex::encode(mac.finalize().into_bytes()))
    }

    /// Business id inside a signed value, or `None` if the signature is wrong.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (business_id, signature) = value.rsplit_once('.')?;
        if business_id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(business_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(business_id.to_string())
    }

    /// Verified business id from the request's `Cookie` headers.
    pub fn business_id(&self, headers: &HeaderMap) -> Option<String> {
        let raw = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value)?;

        let verified = self.verify(raw);
        if verified.is_none() {
            tracing::warn!("ignoring session cookie with invalid signature");
        }
        verified
    }

    /// `Set-Cookie` value making `business_id` the active business.
    pub fn set_cookie(&self, business_id: &str) -> Result<HeaderValue> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            self.sign(business_id)
        );
        HeaderValue::from_str(&cookie).context("business id is not a valid cookie value")
    }
}

/// `Set-Cookie` value removing the session.
pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static(CLEAR_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = SessionSigner::new("secret").unwrap();
        let signed = signer.sign("abc123");
        assert!(signed.starts_with("abc123."));
        assert_eq!(signer.verify(&signed).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_tampered_values_rejected() {
        let signer = SessionSigner::new("secret").unwrap();
        let signed = signer.sign("abc123");
        let (_, sig) = signed.split_once('.').unwrap();

        assert!(signer.verify(&format!("abc124.{}", sig)).is_none());
        assert!(signer.verify("abc123").is_none());
        assert!(signer.verify("abc123.zz").is_none());
        assert!(signer.verify(&format!(".{}", sig)).is_none());

        let other = SessionSigner::new("other-secret").unwrap();
        assert!(other.verify(&signed).is_none());
    }

    #[test]
    fn test_reads_cookie_among_others() {
        let signer = SessionSigner::new("secret").unwrap();
        let cookie = format!("theme=dark; {}={}; lang=en", SESSION_COOKIE, signer.sign("biz9"));
        assert_eq!(
            signer.business_id(&headers_with_cookie(&cookie)).as_deref(),
            Some("biz9")
        );

        assert!(signer.business_id(&HeaderMap::new()).is_none());
        assert!(signer
            .business_id(&headers_with_cookie("bizdesk_session=biz9.00"))
            .is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let signer = SessionSigner::new("secret").unwrap();
        let set = signer.set_cookie("biz9").unwrap();
        let set = set.to_str().unwrap();
        assert!(set.starts_with("bizdesk_session=biz9."));
        assert!(set.ends_with("; Path=/; HttpOnly; SameSite=Lax"));

        assert!(clear_cookie().to_str().unwrap().contains("Max-Age=0"));
    }
}
