use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a [History](crate::history::History) compacts itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompactingStrategy {
    /// Only explicit calls to [compact](crate::history::History::compact).
    #[default]
    None,
    /// After every [auto_compacting_min_size](Settings::auto_compacting_min_size) undo/redo steps.
    AfterXSize,
    /// Every [auto_compacting_delay](Settings::auto_compacting_delay).
    EveryXMinutes,
}

/// Compaction settings.
///
/// Deserializing fills missing fields with their defaults, so an editor can keep
/// only the values it overrides in its configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minimum length of a run eligible for compaction.
    pub min_entries_to_compact: usize,
    /// Number of undo/redo steps between two size-based compactions.
    pub auto_compacting_min_size: usize,
    /// Period of time-based compaction.
    pub auto_compacting_delay: Duration,
    /// Period of "compaction in D" notifications under time-based compaction.
    pub notify_interval: Duration,
    pub strategy: CompactingStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_entries_to_compact: 5,
            auto_compacting_min_size: 100,
            auto_compacting_delay: Duration::from_secs(5 * 60),
            notify_interval: Duration::from_secs(5),
            strategy: CompactingStrategy::None,
        }
    }
}

impl Settings {
    /// Checks that the values can drive compaction.
    ///
    /// A run of one entry gains nothing from compaction, so the minimum run length is 2.
    pub fn validate(&self) -> Result<()> {
        if self.min_entries_to_compact < 2 {
            return Err(Error::InvalidSettings {
                field: "min_entries_to_compact",
                reason: "must be at least 2",
            });
        }
        if self.auto_compacting_min_size == 0 {
            return Err(Error::InvalidSettings {
                field: "auto_compacting_min_size",
                reason: "must not be zero",
            });
        }
        if self.auto_compacting_delay.is_zero() {
            return Err(Error::InvalidSettings {
                field: "auto_compacting_delay",
                reason: "must not be zero",
            });
        }
        if self.notify_interval.is_zero() {
            return Err(Error::InvalidSettings {
                field: "notify_interval",
                reason: "must not be zero",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();

        assert_eq!(5, s.min_entries_to_compact);
        assert_eq!(100, s.auto_compacting_min_size);
        assert_eq!(Duration::from_secs(300), s.auto_compacting_delay);
        assert_eq!(CompactingStrategy::None, s.strategy);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn invalid() {
        let s = Settings {
            min_entries_to_compact: 1,
            ..Settings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(Error::InvalidSettings {
                field: "min_entries_to_compact",
                ..
            })
        ));

        let s = Settings {
            auto_compacting_min_size: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());

        let s = Settings {
            auto_compacting_delay: Duration::ZERO,
            ..Settings::default()
        };
        assert_eq!(
            "invalid setting `auto_compacting_delay`: must not be zero",
            s.validate().unwrap_err().to_string()
        );
    }

    #[test]
    fn deserialize_partial() {
        let s: Settings =
            serde_json::from_str(r#"{"min_entries_to_compact": 8, "strategy": "AfterXSize"}"#)
                .unwrap();

        assert_eq!(8, s.min_entries_to_compact);
        assert_eq!(CompactingStrategy::AfterXSize, s.strategy);
        assert_eq!(100, s.auto_compacting_min_size);
        assert_eq!(Duration::from_secs(5), s.notify_interval);
    }

    #[test]
    fn serialize_round_trip() {
        let s = Settings {
            auto_compacting_delay: Duration::from_millis(1500),
            strategy: CompactingStrategy::EveryXMinutes,
            ..Settings::default()
        };
        let json = serde_json::to_string(&s).unwrap();

        assert_eq!(s, serde_json::from_str::<Settings>(&json).unwrap());
    }
}
