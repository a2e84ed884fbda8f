//! DASH intent payloads.
//!
//! Each payload is serialized into the single `pb` field of its intent
//! record. The realized store never sees these types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::record::FieldMap;
use super::table::IntentTable;
use crate::domain::ports::errors::{StoreError, StoreResult};

/// Field under which serialized payloads are stored.
pub const PAYLOAD_FIELD: &str = "pb";

/// A typed intent payload bound to its intent table.
pub trait IntentPayload: Serialize + DeserializeOwned {
    const TABLE: IntentTable;

    fn to_fields(&self) -> StoreResult<FieldMap> {
        let mut fields = FieldMap::new();
        fields.insert(PAYLOAD_FIELD.to_string(), serde_json::to_vec(self)?);
        Ok(fields)
    }

    fn from_fields(key: &str, fields: &FieldMap) -> StoreResult<Self> {
        let raw = fields.get(PAYLOAD_FIELD).ok_or_else(|| StoreError::Decode {
            table: Self::TABLE.name().to_string(),
            key: key.to_string(),
            reason: format!("missing {PAYLOAD_FIELD} field"),
        })?;
        serde_json::from_slice(raw).map_err(|e| StoreError::Decode {
            table: Self::TABLE.name().to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Address family of a meter policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpVersion {
    Ipv4,
    Ipv6,
}

impl IpVersion {
    /// Realized address-family attribute value.
    pub const fn sai_family(&self) -> &'static str {
        match self {
            Self::Ipv4 => "SAI_IP_ADDR_FAMILY_IPV4",
            Self::Ipv6 => "SAI_IP_ADDR_FAMILY_IPV6",
        }
    }
}

/// Administrative state of an ENI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Enabled,
    Disabled,
}

/// Appliance intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Appliance source address.
    pub sip: String,
    /// VNI used for outbound direction lookup.
    pub vm_vni: u32,
    /// Region the appliance serves, when set.
    #[serde(default)]
    pub local_region_id: Option<u32>,
}

impl IntentPayload for ApplianceConfig {
    const TABLE: IntentTable = IntentTable::Appliance;
}

/// VNET intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnetConfig {
    /// Virtual network identifier.
    pub vni: u32,
    /// GUID as 32 lowercase hex digits.
    pub guid: String,
}

impl IntentPayload for VnetConfig {
    const TABLE: IntentTable = IntentTable::Vnet;
}

/// Meter policy intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterPolicyConfig {
    /// Address family the policy matches.
    pub ip_version: IpVersion,
}

impl IntentPayload for MeterPolicyConfig {
    const TABLE: IntentTable = IntentTable::MeterPolicy;
}

/// Meter rule intent, keyed under its policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterRuleConfig {
    /// Match priority.
    pub priority: u32,
    /// Class counted on a match.
    pub metering_class: u32,
    /// Destination prefix in CIDR form.
    pub ip_prefix: String,
}

impl IntentPayload for MeterRuleConfig {
    const TABLE: IntentTable = IntentTable::MeterRule;
}

/// ENI intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EniConfig {
    /// ENI identifier.
    pub eni_id: String,
    /// MAC address as 12 hex digits.
    pub mac_address: String,
    /// Underlay address of the VM.
    pub underlay_ip: String,
    /// Administrative state.
    pub admin_state: AdminState,
    /// VNET intent key the ENI belongs to.
    pub vnet: String,
    /// IPv4 meter policy key bound to the ENI.
    #[serde(default)]
    pub v4_meter_policy_id: Option<String>,
    /// IPv6 meter policy key bound to the ENI.
    #[serde(default)]
    pub v6_meter_policy_id: Option<String>,
}

impl IntentPayload for EniConfig {
    const TABLE: IntentTable = IntentTable::Eni;
}

impl EniConfig {
    /// Meter policy intent keys this ENI references.
    pub fn meter_policies(&self) -> impl Iterator<Item = &str> {
        self.v4_meter_policy_id
            .iter()
            .chain(self.v6_meter_policy_id.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_decodes_from_fields() {
        let policy = MeterPolicyConfig {
            ip_version: IpVersion::Ipv6,
        };
        let fields = policy.to_fields().unwrap();
        assert!(fields.contains_key(PAYLOAD_FIELD));
        let decoded = MeterPolicyConfig::from_fields("p", &fields).unwrap();
        assert_eq!(decoded.ip_version.sai_family(), "SAI_IP_ADDR_FAMILY_IPV6");
    }

    #[test]
    fn test_missing_payload_field_is_decode_error() {
        let err = VnetConfig::from_fields("Vnet1", &FieldMap::new()).unwrap_err();
        match err {
            StoreError::Decode { table, key, .. } => {
                assert_eq!(table, "DASH_VNET_TABLE");
                assert_eq!(key, "Vnet1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_eni_meter_policies() {
        let eni = EniConfig {
            eni_id: "eni".to_string(),
            mac_address: "F4939FEFC47E".to_string(),
            underlay_ip: "25.1.1.1".to_string(),
            admin_state: AdminState::Enabled,
            vnet: "Vnet1".to_string(),
            v4_meter_policy_id: Some("v4".to_string()),
            v6_meter_policy_id: None,
        };
        assert_eq!(eni.meter_policies().collect::<Vec<_>>(), vec!["v4"]);
    }
}
