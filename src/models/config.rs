use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the REST API server
    pub port: u16,

    /// Maximum number of packets kept in the capture buffer
    pub packet_limit: usize,

    /// Debounce window for coalescing view refreshes, in milliseconds
    pub refresh_timeout_ms: u64,

    /// Whether the transport keeps a packet cache for late attachment
    pub packet_cache_enabled: bool,

    /// Whether packet details are rendered inline in the list
    pub show_inline_details: bool,
}

impl AppConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            show_inline_details: self.show_inline_details,
            packet_cache_enabled: self.packet_cache_enabled,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            packet_limit: 1000,
            refresh_timeout_ms: 200,
            packet_cache_enabled: false,
            show_inline_details: false,
        }
    }
}

/// Display toggles pushed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default)]
    pub show_inline_details: bool,

    #[serde(default)]
    pub packet_cache_enabled: bool,
}
