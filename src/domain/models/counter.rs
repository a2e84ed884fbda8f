//! Counter group models.
//!
//! A counter group attaches statistics collection to realized objects. Both
//! attachment and detachment materialize asynchronously after the group's
//! status is flipped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Statistics collection groups the harness knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterGroup {
    Eni,
    Meter,
}

impl CounterGroup {
    /// Key of the group in the counter control table.
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Eni => "ENI",
            Self::Meter => "DASH_METER",
        }
    }

    /// Name of the group in the id-list table.
    pub const fn group_name(&self) -> &'static str {
        match self {
            Self::Eni => "ENI_STAT_COUNTER",
            Self::Meter => "METER_STAT_COUNTER",
        }
    }

    /// Name-map table mapping monitored object names to realized keys.
    ///
    /// Meter statistics are collected per ENI, so both groups share the ENI map.
    pub const fn name_map(&self) -> &'static str {
        match self {
            Self::Eni | Self::Meter => "COUNTERS_ENI_NAME_MAP",
        }
    }

    /// Id-list table key for one monitored object.
    pub fn id_list_key(&self, object_key: &str) -> String {
        format!("FLEX_COUNTER_TABLE:{}:{}", self.group_name(), object_key)
    }

    /// Group for a control-table key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ENI" => Some(Self::Eni),
            "DASH_METER" => Some(Self::Meter),
            _ => None,
        }
    }
}

impl fmt::Display for CounterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

/// Requested status written to the counter control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStatus {
    Enable,
    Disable,
}

impl CounterStatus {
    /// Value written to the control table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

/// Lifecycle of one counter group as observed by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterState {
    #[default]
    Uninitialized,
    Enabled,
    Attached,
    Disabling,
    Detached,
}

impl CounterState {
    /// Lowercase label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Enabled => "enabled",
            Self::Attached => "attached",
            Self::Disabling => "disabling",
            Self::Detached => "detached",
        }
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Uninitialized => vec![Self::Enabled],
            // Disable may be issued before attachment was ever observed.
            Self::Enabled => vec![Self::Attached, Self::Disabling],
            Self::Attached => vec![Self::Disabling],
            Self::Disabling => vec![Self::Detached],
            // A repeated disable re-enters Disabling and must settle again.
            Self::Detached => vec![Self::Enabled, Self::Disabling],
        }
    }

    /// Whether `next` is reachable in one step.
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for CounterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attachment of a counter group to one realized object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterBinding {
    /// Group the binding belongs to.
    pub group: CounterGroup,
    /// Name map the object was found in.
    pub name_map_table: String,
    /// Name of the monitored object in the name map.
    pub object_name: String,
    /// Realized key the name map points at.
    pub object_key: String,
    /// Statistic ids attached to the object.
    pub id_list: Vec<String>,
}
