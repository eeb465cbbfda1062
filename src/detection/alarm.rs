// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Alarm arbitration - OR of the alarm sources with edge-triggered output

use serde::{Deserialize, Serialize};
use tracing::info;

/// Independent causes feeding the aggregate alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSourceKind {
    DsUnlocked,
    MotionEmpty,
    GsgMove,
}

impl AlarmSourceKind {
    pub const ALL: [AlarmSourceKind; 3] = [
        AlarmSourceKind::DsUnlocked,
        AlarmSourceKind::MotionEmpty,
        AlarmSourceKind::GsgMove,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlarmSourceKind::DsUnlocked => "ds_unlocked",
            AlarmSourceKind::MotionEmpty => "motion_empty",
            AlarmSourceKind::GsgMove => "gsg_move",
        }
    }

    fn index(self) -> usize {
        match self {
            AlarmSourceKind::DsUnlocked => 0,
            AlarmSourceKind::MotionEmpty => 1,
            AlarmSourceKind::GsgMove => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmSource {
    pub active: bool,
    pub reason: String,
}

/// Transition of the aggregate alarm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEdge {
    On { reason: String },
    Off,
}

/// Combines the sources and reports only on/off transitions
#[derive(Debug, Clone, Default)]
pub struct AlarmArbiter {
    sources: [AlarmSource; 3],
    on: bool,
    reason: String,
}

impl AlarmArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&mut self, kind: AlarmSourceKind, active: bool, reason: impl Into<String>) {
        let source = &mut self.sources[kind.index()];
        source.active = active;
        source.reason = if active { reason.into() } else { String::new() };
    }

    pub fn source(&self, kind: AlarmSourceKind) -> &AlarmSource {
        &self.sources[kind.index()]
    }

    /// Recompute the aggregate; `Some` only when it flipped
    pub fn recompute(&mut self) -> Option<AlarmEdge> {
        let on = self.sources.iter().any(|s| s.active);
        self.reason = self.sources
            .iter()
            .filter(|s| s.active)
            .map(|s| s.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        if on == self.on {
            return None;
        }
        self.on = on;

        if on {
            info!("Alarm ON: {}", self.reason);
            Some(AlarmEdge::On { reason: self.reason.clone() })
        } else {
            info!("Alarm OFF");
            Some(AlarmEdge::Off)
        }
    }

    /// Operator override: everything off, no edge reported
    pub fn force_off(&mut self) {
        for source in self.sources.iter_mut() {
            *source = AlarmSource::default();
        }
        self.on = false;
        self.reason.clear();
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_source_edges() {
        let mut arbiter = AlarmArbiter::new();
        assert_eq!(arbiter.recompute(), None);

        arbiter.set_source(AlarmSourceKind::DsUnlocked, true, "DS1 open > 5.0s");
        assert_eq!(
            arbiter.recompute(),
            Some(AlarmEdge::On { reason: "DS1 open > 5.0s".to_string() })
        );
        assert_eq!(arbiter.recompute(), None);

        arbiter.set_source(AlarmSourceKind::DsUnlocked, false, "");
        assert_eq!(arbiter.recompute(), Some(AlarmEdge::Off));
        assert!(!arbiter.is_on());
    }

    #[test]
    fn test_toggling_under_other_active_source_is_silent() {
        let mut arbiter = AlarmArbiter::new();
        arbiter.set_source(AlarmSourceKind::GsgMove, true, "GSG moved");
        assert!(arbiter.recompute().is_some());

        for i in 0..5 {
            arbiter.set_source(AlarmSourceKind::MotionEmpty, i % 2 == 0, "DPIR3 motion while empty");
            assert_eq!(arbiter.recompute(), None);
        }
        assert!(arbiter.is_on());
    }

    #[test]
    fn test_reason_joins_active_sources() {
        let mut arbiter = AlarmArbiter::new();
        arbiter.set_source(AlarmSourceKind::DsUnlocked, true, "DS1 open > 5.0s");
        arbiter.set_source(AlarmSourceKind::GsgMove, true, "GSG moved");
        arbiter.recompute();
        assert_eq!(arbiter.reason(), "DS1 open > 5.0s; GSG moved");
    }

    #[test]
    fn test_force_off() {
        let mut arbiter = AlarmArbiter::new();
        for kind in AlarmSourceKind::ALL {
            arbiter.set_source(kind, true, kind.name());
        }
        arbiter.recompute();

        arbiter.force_off();
        assert!(!arbiter.is_on());
        assert!(AlarmSourceKind::ALL.iter().all(|k| !arbiter.source(*k).active));
        assert_eq!(arbiter.recompute(), None);
    }
}
