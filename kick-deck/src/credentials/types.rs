//! Persisted credential record.
//!
//! The JSON layout (`serverMetadata`, `clientId`, `clientSecret`, `tokens`)
//! is shared with previously written records and must stay stable. Unknown
//! fields are carried through untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Safety margin before `expires_at` at which a token counts as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 7200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    pub server_metadata: ServerMetadata,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub tokens: TokenSet,
}

/// OAuth authorization server metadata as discovered at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenSet {
    /// Whether the token is inside the skew window (or past expiry) at `now`.
    ///
    /// A token without a known expiry is never considered due.
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - EXPIRY_SKEW_SECS <= now)
    }

    pub fn is_due(&self) -> bool {
        self.needs_refresh(Utc::now().timestamp())
    }

    /// Overlay a token endpoint response on this set.
    ///
    /// The previous refresh token survives when the server does not rotate it.
    pub fn merge(&self, response: TokenResponse, now: i64) -> TokenSet {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let mut extra = self.extra.clone();
        extra.extend(response.extra);

        TokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: Some(now + expires_in),
            expires_in: Some(expires_in),
            token_type: response.token_type.or_else(|| self.token_type.clone()),
            scope: response.scope.or_else(|| self.scope.clone()),
            extra,
        }
    }
}

/// Successful token endpoint response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn credential_set(expires_at: Option<i64>) -> CredentialSet {
        CredentialSet {
            server_metadata: ServerMetadata {
                issuer: Some("https://id.kick.com".to_string()),
                authorization_endpoint: Some("https://id.kick.com/oauth/authorize".to_string()),
                token_endpoint: "https://id.kick.com/oauth/token".to_string(),
                extra: Map::new(),
            },
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            tokens: TokenSet {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                expires_at,
                expires_in: Some(7200),
                token_type: Some("Bearer".to_string()),
                scope: Some("user:read channel:read".to_string()),
                extra: Map::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::credential_set;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_field_names() {
        let value = serde_json::to_value(credential_set(Some(1_700_000_000))).unwrap();
        assert!(value.get("serverMetadata").is_some());
        assert_eq!(value["clientId"], "client");
        assert_eq!(value["clientSecret"], "secret");
        assert_eq!(value["tokens"]["access_token"], "access-1");
        assert_eq!(value["tokens"]["refresh_token"], "refresh-1");
        assert_eq!(value["tokens"]["expires_at"], 1_700_000_000);
        assert_eq!(
            value["serverMetadata"]["token_endpoint"],
            "https://id.kick.com/oauth/token"
        );
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "serverMetadata": { "token_endpoint": "https://t", "code_challenge_methods_supported": ["S256"] },
            "clientId": "c",
            "clientSecret": "s",
            "tokens": { "access_token": "a", "id_token": "xyz" }
        });
        let parsed: CredentialSet = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.tokens.extra["id_token"], "xyz");
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn test_needs_refresh_applies_skew() {
        let tokens = credential_set(Some(1_000)).tokens;
        assert!(!tokens.needs_refresh(939));
        assert!(tokens.needs_refresh(940));
        assert!(tokens.needs_refresh(5_000));
        assert!(!credential_set(None).tokens.needs_refresh(i64::MAX));
    }

    #[test]
    fn test_is_due_against_wall_clock() {
        let now = Utc::now().timestamp();
        assert!(credential_set(Some(0)).tokens.is_due());
        assert!(credential_set(Some(now + 30)).tokens.is_due());
        assert!(!credential_set(Some(now + 3600)).tokens.is_due());
        assert!(!credential_set(None).tokens.is_due());
    }

    #[test]
    fn test_merge_keeps_refresh_token_and_defaults_expiry() {
        let old = credential_set(Some(0)).tokens;
        let response = TokenResponse {
            access_token: "access-2".to_string(),
            refresh_token: None,
            expires_in: None,
            token_type: None,
            scope: None,
            extra: Map::new(),
        };

        let merged = old.merge(response, 10_000);
        assert_eq!(merged.access_token, "access-2");
        assert_eq!(merged.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(merged.expires_at, Some(10_000 + DEFAULT_EXPIRES_IN_SECS));
        assert_eq!(merged.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_merge_takes_rotated_refresh_token() {
        let old = credential_set(Some(0)).tokens;
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 3600
        }))
        .unwrap();

        let merged = old.merge(response, 100);
        assert_eq!(merged.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(merged.expires_at, Some(3700));
    }
}
