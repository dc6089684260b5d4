use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use time::OffsetDateTime;

/// The unverified subset of JWT claims the client cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TokenClaims {
    #[serde(default)]
    pub(crate) exp: Option<i64>,
}

impl TokenClaims {
    pub(crate) fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
    }

    pub(crate) fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }
}

/// Reads the payload segment without checking the signature; the server is
/// the only party that verifies tokens. Opaque tokens yield `None`.
pub(crate) fn peek_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn peek_reads_expiry() {
        let token = encode(r#"{"sub":"student@examportal.com","exp":1700000000}"#);
        let claims = peek_claims(&token).expect("claims");
        let expires_at = claims.expires_at().expect("expiry");
        assert_eq!(expires_at.unix_timestamp(), 1_700_000_000);
        assert!(claims.is_expired(OffsetDateTime::now_utc()));
    }

    #[test]
    fn opaque_tokens_are_ignored() {
        assert!(peek_claims("mock-student-token-1").is_none());
        assert!(peek_claims("a.b").is_none());
        assert!(peek_claims("a.!!!.c").is_none());
    }
}
