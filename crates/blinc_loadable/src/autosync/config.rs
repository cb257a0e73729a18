//! Autosync interval configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::lifecycle::AppState;
use crate::error::{LoadableError, Result};

/// How often an [`AutosyncLoadable`](super::AutosyncLoadable) refreshes its
/// target.
///
/// An interval of zero or less disables autosync in the corresponding app
/// state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosyncConfig {
    /// Interval while the app is active (seconds).
    pub interval_secs: f64,
    /// Interval while the app is in background (seconds).
    pub background_interval_secs: f64,
}

impl Default for AutosyncConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl AutosyncConfig {
    /// Refresh every minute in foreground, every 15 minutes in background.
    pub fn standard() -> Self {
        Self {
            interval_secs: 60.0,
            background_interval_secs: 15.0 * 60.0,
        }
    }

    /// Refresh every minute in foreground only.
    pub fn foreground_only() -> Self {
        Self {
            interval_secs: 60.0,
            background_interval_secs: 0.0,
        }
    }

    /// Never refresh on a timer.
    pub fn disabled() -> Self {
        Self {
            interval_secs: 0.0,
            background_interval_secs: 0.0,
        }
    }

    pub fn with_interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_background_interval_secs(mut self, secs: f64) -> Self {
        self.background_interval_secs = secs;
        self
    }

    /// Parse a configuration from TOML; missing keys take their
    /// [`standard`](Self::standard) values.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| LoadableError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| LoadableError::Config(e.to_string()))
    }

    /// Reject intervals that cannot be turned into a timer period.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("interval_secs", self.interval_secs),
            ("background_interval_secs", self.background_interval_secs),
        ] {
            if secs.is_nan() || secs.is_infinite() {
                return Err(LoadableError::Config(format!(
                    "{name} must be a finite number of seconds, got {secs}"
                )));
            }
            if secs > 0.0 && Duration::try_from_secs_f64(secs).is_err() {
                return Err(LoadableError::Config(format!(
                    "{name} is too large for a timer period, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Foreground period, `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        period(self.interval_secs)
    }

    /// Background period, `None` when disabled.
    pub fn background_interval(&self) -> Option<Duration> {
        period(self.background_interval_secs)
    }

    /// Period to use in the given app state.
    pub fn interval_for(&self, state: AppState) -> Option<Duration> {
        match state {
            AppState::Active => self.interval(),
            AppState::Background => self.background_interval(),
        }
    }
}

fn period(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let standard = AutosyncConfig::standard();
        assert_eq!(standard.interval(), Some(Duration::from_secs(60)));
        assert_eq!(standard.background_interval(), Some(Duration::from_secs(900)));

        let foreground = AutosyncConfig::foreground_only();
        assert_eq!(foreground.background_interval(), None);
        assert_eq!(foreground.interval_for(AppState::Background), None);

        assert_eq!(AutosyncConfig::default(), AutosyncConfig::standard());
    }

    #[test]
    fn test_non_positive_disables() {
        let config = AutosyncConfig::standard()
            .with_interval_secs(0.0)
            .with_background_interval_secs(-5.0);
        assert_eq!(config.interval_for(AppState::Active), None);
        assert_eq!(config.interval_for(AppState::Background), None);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AutosyncConfig::from_toml("interval_secs = 2.5").unwrap();
        assert_eq!(config.interval(), Some(Duration::from_millis(2500)));
        assert_eq!(
            config.background_interval_secs,
            AutosyncConfig::standard().background_interval_secs
        );
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            AutosyncConfig::from_toml("interval_secs = \"soon\""),
            Err(LoadableError::Config(_))
        ));
        assert!(matches!(
            AutosyncConfig::from_toml("interval_secs = nan"),
            Err(LoadableError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unrepresentable_interval() {
        let huge = AutosyncConfig::standard().with_interval_secs(1e300);
        assert!(matches!(huge.validate(), Err(LoadableError::Config(_))));
        assert!(matches!(
            AutosyncConfig::from_toml("background_interval_secs = 1e300"),
            Err(LoadableError::Config(_))
        ));

        let week = AutosyncConfig::standard().with_interval_secs(7.0 * 24.0 * 3600.0);
        assert!(week.validate().is_ok());
        assert!(AutosyncConfig::disabled().with_interval_secs(-1e300).validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AutosyncConfig::foreground_only().with_interval_secs(30.0);
        let text = config.to_toml().unwrap();
        assert_eq!(AutosyncConfig::from_toml(&text).unwrap(), config);
    }
}
