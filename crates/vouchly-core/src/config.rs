// ── Runtime sync configuration ──
//
// Describes how the sync service talks to the controller and how often
// it sweeps. Never touches disk: vouchly-config builds one of these
// from the layered config files and hands it in.

use std::time::Duration;

use vouchly_api::{GROUP_PAGE_SIZE, TransportConfig, VOUCHER_PAGE_SIZE};

/// Timer period when nothing else is configured (5 minutes).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Currency recorded on a sale when the voucher group carries none.
pub const DEFAULT_CURRENCY: &str = "BRL";

/// Fraction of the interval a sweep may take before an overrun warning.
pub const DEFAULT_OVERRUN_WARN_RATIO: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Period between scheduled sweeps.
    pub interval: Duration,
    pub group_page_size: u32,
    pub voucher_page_size: u32,
    pub default_currency: String,
    pub overrun_warn_ratio: f64,
    /// TLS and timeout settings for every controller request.
    pub transport: TransportConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            group_page_size: GROUP_PAGE_SIZE,
            voucher_page_size: VOUCHER_PAGE_SIZE,
            default_currency: DEFAULT_CURRENCY.to_owned(),
            overrun_warn_ratio: DEFAULT_OVERRUN_WARN_RATIO,
            transport: TransportConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Sweep duration at which an overrun warning is logged.
    pub fn overrun_threshold(&self) -> Duration {
        self.interval.mul_f64(self.overrun_warn_ratio.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_four_fifths_of_interval() {
        let config = SyncConfig::default();
        assert_eq!(config.overrun_threshold(), Duration::from_secs(240));
    }

    #[test]
    fn threshold_ratio_is_clamped() {
        let config = SyncConfig {
            overrun_warn_ratio: 3.0,
            ..SyncConfig::default()
        };
        assert_eq!(config.overrun_threshold(), config.interval);
    }
}
