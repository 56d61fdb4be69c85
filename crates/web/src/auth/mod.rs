//! Authentication and permissions
//!
//! Sessions are HS256 tokens issued at login. Each protected handler takes
//! a [`Principal`] and checks a `"<resource>.<action>"` permission against
//! the [`PolicyEngine`].

pub mod middleware;
pub mod rbac;
pub mod session;

pub use middleware::Principal;
pub use rbac::{Policy, PolicyEngine, Role};
pub use session::{SessionClaims, SessionKeys};

use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};

/// Shared authentication state
pub struct AuthService {
    enabled: bool,
    keys: SessionKeys,
    policy: PolicyEngine,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        let keys = match config.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                SessionKeys::new(secret.as_bytes(), config.session_ttl_secs)
            }
            _ => {
                if config.enabled {
                    warn!("No session_secret configured; sessions end when the server restarts");
                }
                SessionKeys::ephemeral(config.session_ttl_secs)
            }
        };
        Self {
            enabled: config.enabled,
            keys,
            policy: PolicyEngine::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Resolve the caller from an `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> ApiResult<Principal> {
        if !self.enabled {
            return Ok(Principal::local_admin());
        }
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthenticated)?;

        let claims = self.keys.verify(token).map_err(|e| {
            debug!("Rejected session token: {}", e);
            ApiError::Unauthenticated
        })?;
        Ok(Principal::from(claims))
    }

    pub fn authorize(&self, principal: &Principal, permission: &str) -> ApiResult<()> {
        if self.policy.has_permission(&principal.roles, permission) {
            Ok(())
        } else {
            debug!("{} lacks {}", principal.email, permission);
            Err(ApiError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testdeck_common::User;

    fn service(enabled: bool) -> AuthService {
        AuthService::new(&AuthConfig {
            enabled,
            session_secret: Some("test-secret".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_disabled_auth_is_local_admin() {
        let auth = service(false);
        let principal = auth.authenticate(None).unwrap();
        assert!(auth.authorize(&principal, "project.delete").is_ok());
    }

    #[test]
    fn test_missing_or_bad_token() {
        let auth = service(true);
        assert!(matches!(auth.authenticate(None), Err(ApiError::Unauthenticated)));
        assert!(matches!(
            auth.authenticate(Some("Basic abc")),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            auth.authenticate(Some("Bearer not-a-jwt")),
            Err(ApiError::Unauthenticated)
        ));
    }

    #[test]
    fn test_token_roles_drive_permissions() {
        let auth = service(true);
        let user = User {
            id: "u2".to_string(),
            email: "v@shop.test".to_string(),
            display_name: "V".to_string(),
            roles: vec!["viewer".to_string()],
            created_at: 0,
        };
        let (token, _) = auth.keys().issue(&user).unwrap();
        let principal = auth.authenticate(Some(&format!("Bearer {}", token))).unwrap();

        assert_eq!(principal.user_id, "u2");
        assert!(auth.authorize(&principal, "testCase.read").is_ok());
        assert!(matches!(
            auth.authorize(&principal, "testCase.update"),
            Err(ApiError::Forbidden)
        ));
    }
}
