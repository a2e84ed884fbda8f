//! Realized attribute names and values.

pub const DIRECTION_LOOKUP_ACTION: &str = "SAI_DIRECTION_LOOKUP_ENTRY_ATTR_ACTION";
pub const DIRECTION_LOOKUP_SET_OUTBOUND: &str =
    "SAI_DIRECTION_LOOKUP_ENTRY_ACTION_SET_OUTBOUND_DIRECTION";
pub const DIRECTION_LOOKUP_VNI: &str = "SAI_DIRECTION_LOOKUP_ENTRY_ATTR_VNI";

pub const VIP_ACTION: &str = "SAI_VIP_ENTRY_ATTR_ACTION";
pub const VIP_ACCEPT: &str = "SAI_VIP_ENTRY_ACTION_ACCEPT";
pub const VIP_ADDRESS: &str = "SAI_VIP_ENTRY_ATTR_VIP";

pub const VNET_VNI: &str = "SAI_VNET_ATTR_VNI";

pub const METER_POLICY_IP_ADDR_FAMILY: &str = "SAI_METER_POLICY_ATTR_IP_ADDR_FAMILY";

pub const METER_RULE_PRIORITY: &str = "SAI_METER_RULE_ATTR_PRIORITY";
pub const METER_RULE_METER_CLASS: &str = "SAI_METER_RULE_ATTR_METER_CLASS";
pub const METER_RULE_POLICY_ID: &str = "SAI_METER_RULE_ATTR_METER_POLICY_ID";
pub const METER_RULE_DIP: &str = "SAI_METER_RULE_ATTR_DIP";
pub const METER_RULE_DIP_MASK: &str = "SAI_METER_RULE_ATTR_DIP_MASK";

pub const ENI_VNET_ID: &str = "SAI_ENI_ATTR_VNET_ID";
pub const ENI_ADMIN_STATE: &str = "SAI_ENI_ATTR_ADMIN_STATE";
pub const ENI_VM_UNDERLAY_DIP: &str = "SAI_ENI_ATTR_VM_UNDERLAY_DIP";
pub const ENI_V4_METER_POLICY_ID: &str = "SAI_ENI_ATTR_V4_METER_POLICY_ID";
pub const ENI_V6_METER_POLICY_ID: &str = "SAI_ENI_ATTR_V6_METER_POLICY_ID";

/// Value of an unset object-id attribute.
pub const NULL_OID: &str = "oid:0x0";
