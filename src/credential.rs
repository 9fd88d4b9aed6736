//!
//! Session credential codec
//! ------------------------
//! A credential is a compact HS256 token: `header.claims.signature`, each segment
//! base64url without padding. The claims carry the screen id, the server-held
//! session secret and (when issued by the session manager) the window end.
//!
//! Encoding is deterministic: the header is a fixed string and `Claims` serializes
//! its fields in declaration order, so the same inputs always give the same bytes.
//! The verifier relies on this and compares a re-encoded credential against the
//! presented one instead of trusting decoded fields.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub authorized: bool,
    pub screen_id: String,
    pub session_token: String,
    /// Window end in unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("signing key must not be empty")]
    EmptyKey,
    #[error("credential must have three dot-separated segments")]
    Shape,
    #[error("credential {0} segment is not base64url")]
    Encoding(&'static str),
    #[error("credential signature does not verify")]
    Signature,
    #[error("credential header is not HS256")]
    Algorithm,
    #[error("credential claims are malformed")]
    Claims,
}

/// HMAC-SHA256 credential encoder/decoder bound to the process-wide signing key.
#[derive(Clone)]
pub struct CredentialCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCodec { key: <redacted> }")
    }
}

impl CredentialCodec {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        let key = key.as_ref();
        if key.is_empty() { return Err(CodecError::EmptyKey); }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| CodecError::EmptyKey)?;
        Ok(Self { mac })
    }

    /// Credential without an embedded expiry.
    pub fn encode(&self, screen_id: &str, session_secret: &str) -> String {
        self.encode_claims(&Claims {
            authorized: true,
            screen_id: screen_id.to_string(),
            session_token: session_secret.to_string(),
            exp: None,
        })
    }

    /// Credential carrying the session window end as `exp`.
    pub fn encode_until(&self, screen_id: &str, session_secret: &str, valid_to: DateTime<Utc>) -> String {
        self.encode_claims(&Claims {
            authorized: true,
            screen_id: screen_id.to_string(),
            session_token: session_secret.to_string(),
            exp: Some(valid_to.timestamp()),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> String {
        let header = URL_SAFE_NO_PAD.encode(HEADER_JSON);
        // Plain strings and an integer: serialization cannot fail.
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        let signing_input = format!("{}.{}", header, body);
        let sig = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));
        format!("{}.{}", signing_input, sig)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }

    /// Check shape and signature, then parse the claims.
    ///
    /// Expiry is not enforced here; liveness comes from the stored session window.
    pub fn decode(&self, credential: &str) -> Result<Claims, CodecError> {
        let mut parts = credential.split('.');
        let (Some(header_b64), Some(body_b64), Some(sig_b64), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(CodecError::Shape);
        };
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| CodecError::Encoding("signature"))?;
        let expected = self.sign(format!("{}.{}", header_b64, body_b64).as_bytes());
        if sig.len() != expected.len() || !bool::from(sig.ct_eq(&expected)) {
            return Err(CodecError::Signature);
        }

        let header = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| CodecError::Encoding("header"))?;
        let header: serde_json::Value = serde_json::from_slice(&header).map_err(|_| CodecError::Algorithm)?;
        if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(CodecError::Algorithm);
        }

        let body = URL_SAFE_NO_PAD.decode(body_b64).map_err(|_| CodecError::Encoding("claims"))?;
        let claims: Claims = serde_json::from_slice(&body).map_err(|_| CodecError::Claims)?;
        if claims.screen_id.is_empty() || claims.session_token.is_empty() {
            return Err(CodecError::Claims);
        }
        Ok(claims)
    }
}

/// Constant-time string equality for secrets and credentials.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn codec() -> CredentialCodec { CredentialCodec::new("unit-test-signing-key").unwrap() }

    // Swap one character of the signature segment for a different base64url character.
    fn tamper_signature(cred: &str) -> String {
        let idx = cred.rfind('.').unwrap() + 5;
        let mut bytes = cred.as_bytes().to_vec();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn encoding_is_deterministic() {
        let c = codec();
        assert_eq!(c.encode("s1", "secret"), c.encode("s1", "secret"));
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(c.encode_until("s1", "secret", t), c.encode_until("s1", "secret", t));
        assert_ne!(c.encode("s1", "secret"), c.encode("s1", "other"));
        assert_ne!(c.encode("s1", "secret"), c.encode_until("s1", "secret", t));
    }

    #[test]
    fn decode_returns_claims() {
        let c = codec();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let claims = c.decode(&c.encode_until("screen-7", "abc", t)).unwrap();
        assert!(claims.authorized);
        assert_eq!(claims.screen_id, "screen-7");
        assert_eq!(claims.session_token, "abc");
        assert_eq!(claims.expires_at(), Some(t));

        let claims = c.decode(&c.encode("screen-7", "abc")).unwrap();
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let c = codec();
        let cred = c.encode("s1", "secret");
        let bad = tamper_signature(&cred);
        assert_ne!(bad, cred);
        let err = c.decode(&bad).unwrap_err();
        assert!(matches!(err, CodecError::Signature | CodecError::Encoding("signature")), "got {err:?}");
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let c = codec();
        let cred = c.encode("s1", "secret");
        let forged_body = URL_SAFE_NO_PAD.encode(r#"{"authorized":true,"screen_id":"s2","session_token":"secret"}"#);
        let mut parts: Vec<&str> = cred.split('.').collect();
        parts[1] = &forged_body;
        assert_eq!(c.decode(&parts.join(".")), Err(CodecError::Signature));
    }

    #[test]
    fn other_key_does_not_verify() {
        let a = codec();
        let b = CredentialCodec::new("another-key").unwrap();
        assert_eq!(b.decode(&a.encode("s1", "secret")), Err(CodecError::Signature));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let c = codec();
        assert_eq!(c.decode(""), Err(CodecError::Shape));
        assert_eq!(c.decode("a.b"), Err(CodecError::Shape));
        assert_eq!(c.decode("a.b.c.d"), Err(CodecError::Shape));
        assert_eq!(c.decode("a.b.!!!"), Err(CodecError::Encoding("signature")));
        assert!(c.decode("a.b.c").is_err());
        let valid_sig = c.encode("s1", "x").rsplit('.').next().unwrap().to_string();
        assert_eq!(c.decode(&format!("a.b.{}", valid_sig)), Err(CodecError::Signature));
    }

    #[test]
    fn empty_key_is_refused() {
        assert_eq!(CredentialCodec::new("").unwrap_err(), CodecError::EmptyKey);
    }

    #[test]
    fn constant_time_eq_compares_content() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
