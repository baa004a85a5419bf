//! Access credentials for Google Cloud APIs

use serde::{Deserialize, Serialize};

/// Environment variable holding an OAuth2 access token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// OAuth2 bearer credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Read credentials from `GOOGLE_OAUTH_ACCESS_TOKEN`
    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Self::from_access_token)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::from_access_token("ya29.secret");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("ya29.secret"));
        assert!(printed.contains("REDACTED"));
        assert_eq!(creds.access_token(), "ya29.secret");
    }
}
