//! Table kinds for the intent and realized stores.
//!
//! Closed enums keep table names in one place; call sites never spell them out.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tables in the intent (front-end) store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTable {
    Appliance,
    Vnet,
    Eni,
    MeterPolicy,
    MeterRule,
}

impl IntentTable {
    /// Every intent table.
    pub const ALL: [Self; 5] = [
        Self::Appliance,
        Self::Vnet,
        Self::Eni,
        Self::MeterPolicy,
        Self::MeterRule,
    ];

    /// Store table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Appliance => "DASH_APPLIANCE_TABLE",
            Self::Vnet => "DASH_VNET_TABLE",
            Self::Eni => "DASH_ENI_TABLE",
            Self::MeterPolicy => "DASH_METER_POLICY_TABLE",
            Self::MeterRule => "DASH_METER_RULE_TABLE",
        }
    }

    /// Table called `name`, if known.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Realized tables an intent of this kind materializes into.
    pub const fn realized_tables(&self) -> &'static [RealizedTable] {
        match self {
            Self::Appliance => &[RealizedTable::DirectionLookup, RealizedTable::Vip],
            Self::Vnet => &[RealizedTable::Vnet],
            Self::Eni => &[RealizedTable::Eni],
            Self::MeterPolicy => &[RealizedTable::MeterPolicy],
            Self::MeterRule => &[RealizedTable::MeterRule],
        }
    }
}

impl fmt::Display for IntentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tables in the realized (back-end) store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealizedTable {
    DirectionLookup,
    Vip,
    Vnet,
    Eni,
    MeterPolicy,
    MeterRule,
}

impl RealizedTable {
    /// Every realized table.
    pub const ALL: [Self; 6] = [
        Self::DirectionLookup,
        Self::Vip,
        Self::Vnet,
        Self::Eni,
        Self::MeterPolicy,
        Self::MeterRule,
    ];

    /// Store table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DirectionLookup => "ASIC_STATE:SAI_OBJECT_TYPE_DIRECTION_LOOKUP_ENTRY",
            Self::Vip => "ASIC_STATE:SAI_OBJECT_TYPE_VIP_ENTRY",
            Self::Vnet => "ASIC_STATE:SAI_OBJECT_TYPE_VNET",
            Self::Eni => "ASIC_STATE:SAI_OBJECT_TYPE_ENI",
            Self::MeterPolicy => "ASIC_STATE:SAI_OBJECT_TYPE_METER_POLICY",
            Self::MeterRule => "ASIC_STATE:SAI_OBJECT_TYPE_METER_RULE",
        }
    }

    /// Table called `name`, if known.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Condition satisfied once the table holds at least `n` keys.
    pub const fn at_least(self, n: usize) -> KeyCountCondition {
        KeyCountCondition {
            table: self,
            count: KeyCount::AtLeast(n),
        }
    }

    /// Condition satisfied once the table holds exactly `n` keys.
    pub const fn exactly(self, n: usize) -> KeyCountCondition {
        KeyCountCondition {
            table: self,
            count: KeyCount::Exactly(n),
        }
    }
}

impl fmt::Display for RealizedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected size of a realized key set.
///
/// `AtLeast` is used right after creation (stale keys may coexist),
/// `Exactly` after removal to confirm the table settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCount {
    AtLeast(usize),
    Exactly(usize),
}

impl KeyCount {
    /// Whether `observed` keys meet the count.
    pub const fn is_satisfied_by(&self, observed: usize) -> bool {
        match *self {
            Self::AtLeast(n) => observed >= n,
            Self::Exactly(n) => observed == n,
        }
    }
}

impl fmt::Display for KeyCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(n) => write!(f, "at least {n} keys"),
            Self::Exactly(n) => write!(f, "exactly {n} keys"),
        }
    }
}

/// A key-count predicate bound to a realized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCountCondition {
    /// Table being counted.
    pub table: RealizedTable,
    /// Expected count.
    pub count: KeyCount,
}

impl KeyCountCondition {
    /// Whether `observed` keys meet the condition.
    pub const fn is_satisfied_by(&self, observed: usize) -> bool {
        self.count.is_satisfied_by(observed)
    }
}
