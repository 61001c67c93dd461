//! Authentication handling

use agentdesk_core::{AuthConfig, AuthMode, Error, Result};

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() { return false; }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Clone, Debug)]
pub struct ResolvedAuth {
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl ResolvedAuth {
    /// `config` already carries the environment and CLI overrides.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self { mode: config.mode.clone(), token: config.token.clone() }
    }

    pub fn disabled() -> Self {
        Self { mode: AuthMode::None, token: None }
    }

    pub fn is_required(&self) -> bool {
        self.mode == AuthMode::Token
    }

    pub fn verify_token(&self, provided: Option<&str>) -> Result<()> {
        match self.mode {
            AuthMode::None => Ok(()),
            AuthMode::Token => {
                let expected = self.token.as_deref().ok_or_else(|| Error::auth_failed("no token configured"))?;
                let provided = provided.ok_or_else(|| Error::auth_failed("token required"))?;
                if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
                    return Err(Error::auth_failed("invalid token"));
                }
                Ok(())
            }
        }
    }

    /// Check an `Authorization: Bearer <token>` header value.
    pub fn verify_bearer(&self, header: Option<&str>) -> Result<()> {
        let token = header.and_then(|h| h.strip_prefix("Bearer ")).map(str::trim);
        self.verify_token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_auth() {
        let auth = ResolvedAuth { mode: AuthMode::Token, token: Some("desk-token-123".into()) };
        assert!(auth.verify_token(Some("desk-token-123")).is_ok());
        assert!(auth.verify_token(Some("wrong-token")).is_err());
        assert!(auth.verify_token(None).is_err());
        assert!(auth.is_required());
    }

    #[test]
    fn test_no_auth() {
        let auth = ResolvedAuth::disabled();
        assert!(auth.verify_token(None).is_ok());
        assert!(auth.verify_token(Some("anything")).is_ok());
        assert!(!auth.is_required());
    }

    #[test]
    fn test_missing_configured_token_rejects() {
        let auth = ResolvedAuth::from_config(&AuthConfig::default());
        let err = auth.verify_token(Some("guess")).unwrap_err();
        assert!(err.to_string().contains("no token configured"));
    }

    #[test]
    fn test_from_config_takes_resolved_token() {
        let config = AuthConfig { mode: AuthMode::Token, token: Some("resolved".into()) };
        let auth = ResolvedAuth::from_config(&config);
        assert!(auth.is_required());
        assert!(auth.verify_token(Some("resolved")).is_ok());
    }

    #[test]
    fn test_bearer_header() {
        let auth = ResolvedAuth { mode: AuthMode::Token, token: Some("abc".into()) };
        assert!(auth.verify_bearer(Some("Bearer abc")).is_ok());
        assert!(auth.verify_bearer(Some("abc")).is_err());
        assert!(auth.verify_bearer(None).is_err());
    }
}
