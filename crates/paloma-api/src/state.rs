//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::AuthService;
use paloma_core::config::AppConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Accounts, sessions and roles
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthService) -> Self {
        Self {
            config,
            auth,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status; cleared during shutdown
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// State backed by the in-memory store with cheap password hashing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        use crate::auth::{PasswordConfig, TokenSigner};
        use paloma_core::MemoryAuthStore;
        use std::sync::Arc;

        const TEST_SECRET: &str = "paloma-test-secret-at-least-32-bytes-long";

        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some(TEST_SECRET.to_string());

        let signer = TokenSigner::from_config(&config.auth)
            .unwrap_or_else(|e| panic!("test signer: {e}"));
        let password_config = PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        };
        let auth = AuthService::new(
            Arc::new(MemoryAuthStore::new()),
            Arc::new(signer),
            password_config,
        )
        .unwrap_or_else(|e| panic!("test auth service: {e}"));

        Self::new(config, auth)
    }
}
