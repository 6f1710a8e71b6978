//! Shared HTTP Client Module
//!
//! Global, lazy-initialized HTTP clients so every Drive, Gemini and OAuth
//! request reuses pooled connections and TLS sessions.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for Drive API calls
///
/// Page fetches and metadata updates are small; downloads for content
/// analysis are range-limited, so 60s is plenty.
pub static DRIVE_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create Drive HTTP client")
});

/// Global HTTP client for Gemini API calls
///
/// Batch classification prompts can take a while to generate.
pub static GEMINI_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to create Gemini HTTP client")
});

/// Global HTTP client for OAuth token exchange and refresh
pub static AUTH_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create OAuth HTTP client")
});

#[inline]
pub fn drive_client() -> &'static Client {
    &DRIVE_CLIENT
}

#[inline]
pub fn gemini_client() -> &'static Client {
    &GEMINI_CLIENT
}

#[inline]
pub fn auth_client() -> &'static Client {
    &AUTH_CLIENT
}
