//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level with the "audit" target and carries
//! the full event serialized as JSON, so audit records can be filtered and
//! routed separately from application logs:
//!
//! ```text
//! RUST_LOG=audit=info,paloma_api=warn
//! ```
//!
//! Passwords and tokens are never part of an event.
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use paloma_core::RoleType;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: RoleType,
    },

    RegistrationFailure {
        username: String,
        reason: String,
    },

    LoginSuccess {
        user_id: Uuid,
    },

    /// `identifier` is what the client sent; the response never says which check failed
    LoginFailure {
        identifier: String,
        reason: String,
    },

    Logout {
        user_id: Uuid,
        revoked_tokens: u64,
    },

    TokenRefresh {
        user_id: Uuid,
    },

    TokenRefreshFailure {
        reason: String,
    },

    PasswordChange {
        user_id: Uuid,
        success: bool,
    },

    ProfileChange {
        user_id: Uuid,
        field: String,
    },

    AccountDeleted {
        user_id: Uuid,
    },

    /// Bearer token missing, malformed, or failing verification
    InvalidToken {
        reason: String,
    },

    RoleChange {
        actor_id: Uuid,
        target_id: Uuid,
        role: RoleType,
        action: String,
    },

    AccessDenied {
        user_id: Uuid,
        resource: String,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::TokenRefresh { .. } => "Access token refreshed",
            AuditEvent::TokenRefreshFailure { .. } => "Token refresh rejected",
            AuditEvent::PasswordChange { .. } => "Password change",
            AuditEvent::ProfileChange { .. } => "Profile updated",
            AuditEvent::AccountDeleted { .. } => "Account deleted",
            AuditEvent::InvalidToken { .. } => "Invalid bearer token",
            AuditEvent::RoleChange { .. } => "Role changed",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }

    /// The user the event is about, when known
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::LoginSuccess { user_id }
            | AuditEvent::Logout { user_id, .. }
            | AuditEvent::TokenRefresh { user_id }
            | AuditEvent::PasswordChange { user_id, .. }
            | AuditEvent::ProfileChange { user_id, .. }
            | AuditEvent::AccountDeleted { user_id }
            | AuditEvent::AccessDenied { user_id, .. } => Some(*user_id),
            AuditEvent::RoleChange { target_id, .. } => Some(*target_id),
            AuditEvent::RegistrationFailure { .. }
            | AuditEvent::LoginFailure { .. }
            | AuditEvent::TokenRefreshFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }
}

/// Request metadata attached to every audit record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event
pub fn audit_log(event: &AuditEvent, context: &AuditContext) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        event = %event_json,
        user_id = ?event.user_id(),
        ip_address = ?context.ip_address,
        user_agent = ?context.user_agent,
        "{}",
        event.summary()
    );
}

/// Client IP from proxy headers (first X-Forwarded-For hop, then X-Real-IP)
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::RoleChange {
            actor_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            role: RoleType::TrustedContact,
            action: "add".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"role_change\""));
        assert!(json.contains("TRUSTED_CONTACT"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        let context = AuditContext {
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Test Agent".to_string()),
        };
        audit_log(
            &AuditEvent::LoginFailure {
                identifier: "alice".to_string(),
                reason: "wrong password".to_string(),
            },
            &context,
        );
        audit_log(&AuditEvent::LoginSuccess { user_id: Uuid::new_v4() }, &context);
    }

    #[test]
    fn test_user_id_accessor() {
        let id = Uuid::new_v4();
        assert_eq!(AuditEvent::Logout { user_id: id, revoked_tokens: 1 }.user_id(), Some(id));
        assert_eq!(
            AuditEvent::InvalidToken {
                reason: "expired".to_string()
            }
            .user_id(),
            None
        );
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::USER_AGENT, "curl/8.0".parse().unwrap());

        let context = AuditContext::from_headers(&headers);
        assert_eq!(context.user_agent.as_deref(), Some("curl/8.0"));
        assert!(context.ip_address.is_none());
    }
}
