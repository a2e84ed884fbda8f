//! State of the simulated dataplane and its materialization rules.
//!
//! Intent writes become pending operations. Each tick the materializer
//! applies the operations whose delay has passed; an operation whose
//! dependencies are not realized yet, or whose removal is blocked by a
//! reference, stays pending and is retried on the next tick.

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::domain::models::{
    sai, AdminState, ApplianceConfig, AttributeMap, CounterGroup, CounterStatus, EniConfig,
    FieldMap, IntentPayload, IntentTable, KeySet, MeterPolicyConfig, MeterRuleConfig,
    RealizedKey, RealizedTable, VnetConfig,
};
use crate::domain::ports::errors::StoreResult;
use crate::services::normalize;

/// Realized keys are handed out downwards so key order says nothing about
/// creation order.
const FIRST_OID: u64 = 0x5000_0000_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Upsert {
        table: IntentTable,
        key: String,
        fields: FieldMap,
    },
    Remove {
        table: IntentTable,
        key: String,
    },
    CounterStatus {
        group: CounterGroup,
        status: CounterStatus,
    },
}

impl Op {
    fn is_upsert_of(&self, t: IntentTable, k: &str) -> bool {
        matches!(self, Self::Upsert { table, key, .. } if *table == t && key == k)
    }

    fn targets(&self, t: IntentTable, k: &str) -> bool {
        match self {
            Self::Upsert { table, key, .. } | Self::Remove { table, key } => {
                *table == t && key == k
            }
            Self::CounterStatus { .. } => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PendingOp {
    pub op: Op,
    pub ready_at: Instant,
}

#[derive(Debug)]
enum Outcome {
    Applied,
    Deferred(String),
    Dropped(String),
}

/// Realized records owned by one intent.
#[derive(Debug, Clone)]
struct Materialized {
    fields: FieldMap,
    keys: Vec<(RealizedTable, RealizedKey)>,
}

#[derive(Debug)]
pub(crate) struct SimState {
    pending: Vec<PendingOp>,
    intents: BTreeMap<(IntentTable, String), FieldMap>,
    materialized: BTreeMap<(IntentTable, String), Materialized>,
    realized: BTreeMap<RealizedTable, BTreeMap<RealizedKey, AttributeMap>>,
    counter_status: HashMap<CounterGroup, CounterStatus>,
    name_maps: BTreeMap<String, BTreeMap<String, String>>,
    id_lists: BTreeMap<String, Vec<String>>,
    next_oid: u64,
    pub offline: bool,
    pub paused: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            intents: BTreeMap::new(),
            materialized: BTreeMap::new(),
            realized: BTreeMap::new(),
            counter_status: HashMap::new(),
            name_maps: BTreeMap::new(),
            id_lists: BTreeMap::new(),
            next_oid: FIRST_OID,
            offline: false,
            paused: false,
        }
    }
}

fn stat_ids(group: CounterGroup) -> Vec<String> {
    let ids: &[&str] = match group {
        CounterGroup::Eni => &[
            "SAI_ENI_STAT_FLOW_CREATED",
            "SAI_ENI_STAT_RX_BYTES",
            "SAI_ENI_STAT_TX_BYTES",
        ],
        CounterGroup::Meter => &[
            "SAI_METER_BUCKET_ENTRY_STAT_INBOUND_BYTES",
            "SAI_METER_BUCKET_ENTRY_STAT_OUTBOUND_BYTES",
        ],
    };
    ids.iter().map(|s| (*s).to_string()).collect()
}

impl SimState {
    pub fn enqueue(&mut self, op: Op, ready_at: Instant) {
        match &op {
            Op::Upsert { table, key, fields } => {
                self.intents.insert((*table, key.clone()), fields.clone());
            }
            Op::Remove { table, key } => {
                self.intents.remove(&(*table, key.clone()));
                // A removal already queued as the latest op on this intent covers this one.
                let queued = self
                    .pending
                    .iter()
                    .rev()
                    .find(|p| p.op.targets(*table, key))
                    .is_some_and(|p| p.op == op);
                if queued {
                    trace!(op = ?op, "removal already pending");
                    return;
                }
            }
            Op::CounterStatus { .. } => {}
        }
        self.pending.push(PendingOp { op, ready_at });
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn intent_keys(&self, table: IntentTable) -> Vec<String> {
        self.intents
            .keys()
            .filter(|(t, _)| *t == table)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn list_keys(&self, table: RealizedTable) -> KeySet {
        self.realized
            .get(&table)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_entry(&self, table: RealizedTable, key: &RealizedKey) -> Option<AttributeMap> {
        self.realized.get(&table).and_then(|m| m.get(key)).cloned()
    }

    pub fn name_map(&self, table: &str) -> BTreeMap<String, String> {
        self.name_maps.get(table).cloned().unwrap_or_default()
    }

    pub fn id_list(&self, group: CounterGroup, object_key: &str) -> Option<Vec<String>> {
        self.id_lists.get(&group.id_list_key(object_key)).cloned()
    }

    pub fn side_table_is_empty(&self, table: &str) -> bool {
        self.name_maps.get(table).is_none_or(BTreeMap::is_empty)
    }

    /// Apply every due operation, then reconcile counter attachments.
    pub fn process(&mut self, now: Instant) {
        let pending = std::mem::take(&mut self.pending);
        let mut kept: Vec<PendingOp> = Vec::with_capacity(pending.len());

        for entry in pending {
            if entry.ready_at > now {
                kept.push(entry);
                continue;
            }
            match self.apply(&entry.op) {
                Outcome::Applied => {
                    trace!(op = ?entry.op, "applied");
                    // A removal cancels creations of the same intent still waiting on deps.
                    if let Op::Remove { table, key } = &entry.op {
                        kept.retain(|p| !p.op.is_upsert_of(*table, key));
                    }
                }
                Outcome::Deferred(reason) => {
                    trace!(op = ?entry.op, reason = %reason, "deferred");
                    kept.push(entry);
                }
                Outcome::Dropped(reason) => {
                    warn!(op = ?entry.op, reason = %reason, "operation dropped");
                }
            }
        }

        self.pending = kept;
        self.reconcile_counters();
    }

    fn apply(&mut self, op: &Op) -> Outcome {
        match op {
            Op::Upsert { table, key, fields } => match self.materialize(*table, key, fields) {
                Ok(outcome) => outcome,
                Err(err) => Outcome::Dropped(err.to_string()),
            },
            Op::Remove { table, key } => self.dematerialize(*table, key),
            Op::CounterStatus { group, status } => {
                self.counter_status.insert(*group, *status);
                debug!(group = %group, status = status.as_str(), "counter group status applied");
                Outcome::Applied
            }
        }
    }

    fn alloc_oid(&mut self) -> RealizedKey {
        let oid = self.next_oid;
        self.next_oid -= 1;
        RealizedKey::new(format!("oid:0x{oid:x}"))
    }

    fn realized_key_of(
        &self,
        table: IntentTable,
        key: &str,
        realized: RealizedTable,
    ) -> Option<RealizedKey> {
        self.materialized
            .get(&(table, key.to_string()))
            .and_then(|m| m.keys.iter().find(|(t, _)| *t == realized))
            .map(|(_, k)| k.clone())
    }

    fn materialized_enis(&self) -> impl Iterator<Item = (&String, &Materialized)> {
        self.materialized
            .iter()
            .filter(|((t, _), _)| *t == IntentTable::Eni)
            .map(|((_, k), m)| (k, m))
    }

    fn materialize(
        &mut self,
        table: IntentTable,
        key: &str,
        fields: &FieldMap,
    ) -> StoreResult<Outcome> {
        let records = match table {
            IntentTable::Appliance => {
                let cfg = ApplianceConfig::from_fields(key, fields)?;
                let vni = cfg.vm_vni.to_string();
                vec![
                    (
                        RealizedTable::DirectionLookup,
                        AttributeMap::from([
                            (
                                sai::DIRECTION_LOOKUP_ACTION.to_string(),
                                sai::DIRECTION_LOOKUP_SET_OUTBOUND.to_string(),
                            ),
                            (sai::DIRECTION_LOOKUP_VNI.to_string(), vni),
                        ]),
                    ),
                    (
                        RealizedTable::Vip,
                        AttributeMap::from([
                            (sai::VIP_ACTION.to_string(), sai::VIP_ACCEPT.to_string()),
                            (sai::VIP_ADDRESS.to_string(), cfg.sip),
                        ]),
                    ),
                ]
            }
            IntentTable::Vnet => {
                let cfg = VnetConfig::from_fields(key, fields)?;
                vec![(
                    RealizedTable::Vnet,
                    AttributeMap::from([(sai::VNET_VNI.to_string(), cfg.vni.to_string())]),
                )]
            }
            IntentTable::MeterPolicy => {
                let cfg = MeterPolicyConfig::from_fields(key, fields)?;
                vec![(
                    RealizedTable::MeterPolicy,
                    AttributeMap::from([(
                        sai::METER_POLICY_IP_ADDR_FAMILY.to_string(),
                        cfg.ip_version.sai_family().to_string(),
                    )]),
                )]
            }
            IntentTable::MeterRule => {
                let cfg = MeterRuleConfig::from_fields(key, fields)?;
                let Some((policy, _)) = key.split_once(':') else {
                    return Ok(Outcome::Dropped(format!("rule key {key} has no policy")));
                };
                let policy_oid = self.realized_key_of(
                    IntentTable::MeterPolicy,
                    policy,
                    RealizedTable::MeterPolicy,
                );
                let Some(policy_oid) = policy_oid else {
                    return Ok(Outcome::Deferred(format!("policy {policy} not realized")));
                };
                let (dip, mask) = match normalize::prefix(&cfg.ip_prefix) {
                    Ok(parts) => parts,
                    Err(err) => return Ok(Outcome::Dropped(err.to_string())),
                };
                vec![(
                    RealizedTable::MeterRule,
                    AttributeMap::from([
                        (sai::METER_RULE_PRIORITY.to_string(), cfg.priority.to_string()),
                        (
                            sai::METER_RULE_METER_CLASS.to_string(),
                            cfg.metering_class.to_string(),
                        ),
                        (sai::METER_RULE_POLICY_ID.to_string(), policy_oid.to_string()),
                        (sai::METER_RULE_DIP.to_string(), dip),
                        (sai::METER_RULE_DIP_MASK.to_string(), mask),
                    ]),
                )]
            }
            IntentTable::Eni => {
                let cfg = EniConfig::from_fields(key, fields)?;
                let Some(vnet_oid) =
                    self.realized_key_of(IntentTable::Vnet, &cfg.vnet, RealizedTable::Vnet)
                else {
                    return Ok(Outcome::Deferred(format!("vnet {} not realized", cfg.vnet)));
                };
                let policy_oid = |policy: Option<&str>| match policy {
                    None => Ok(sai::NULL_OID.to_string()),
                    Some(p) => self
                        .realized_key_of(IntentTable::MeterPolicy, p, RealizedTable::MeterPolicy)
                        .map(|k| k.to_string())
                        .ok_or_else(|| format!("meter policy {p} not realized")),
                };
                let v4 = match policy_oid(cfg.v4_meter_policy_id.as_deref()) {
                    Ok(oid) => oid,
                    Err(reason) => return Ok(Outcome::Deferred(reason)),
                };
                let v6 = match policy_oid(cfg.v6_meter_policy_id.as_deref()) {
                    Ok(oid) => oid,
                    Err(reason) => return Ok(Outcome::Deferred(reason)),
                };
                let underlay = match normalize::ip(&cfg.underlay_ip) {
                    Ok(ip) => ip,
                    Err(err) => return Ok(Outcome::Dropped(err.to_string())),
                };
                let admin = matches!(cfg.admin_state, AdminState::Enabled);
                vec![(
                    RealizedTable::Eni,
                    AttributeMap::from([
                        (sai::ENI_VNET_ID.to_string(), vnet_oid.to_string()),
                        (sai::ENI_ADMIN_STATE.to_string(), admin.to_string()),
                        (sai::ENI_VM_UNDERLAY_DIP.to_string(), underlay),
                        (sai::ENI_V4_METER_POLICY_ID.to_string(), v4),
                        (sai::ENI_V6_METER_POLICY_ID.to_string(), v6),
                    ]),
                )]
            }
        };

        let id = (table, key.to_string());
        // Overwrite keeps the realized keys stable.
        let existing = self.materialized.get(&id).map(|m| m.keys.clone());
        let keys = match existing {
            Some(keys) => keys,
            None => {
                let mut keys = Vec::with_capacity(records.len());
                for (realized_table, _) in &records {
                    keys.push((*realized_table, self.alloc_oid()));
                }
                keys
            }
        };

        for ((realized_table, attrs), (_, realized_key)) in records.into_iter().zip(&keys) {
            debug!(table = %realized_table, key = %realized_key, intent = key, "materialized");
            self.realized
                .entry(realized_table)
                .or_default()
                .insert(realized_key.clone(), attrs);
        }
        self.materialized.insert(
            id,
            Materialized {
                fields: fields.clone(),
                keys,
            },
        );
        Ok(Outcome::Applied)
    }

    /// Name of a realized object still referencing the intent, if any.
    fn blocker(&self, table: IntentTable, key: &str) -> Option<String> {
        let eni_refs = |pred: &dyn Fn(&EniConfig) -> bool| {
            self.materialized_enis().find_map(|(eni, m)| {
                EniConfig::from_fields(eni, &m.fields)
                    .ok()
                    .filter(|cfg| pred(cfg))
                    .map(|_| format!("{}:{eni}", IntentTable::Eni.name()))
            })
        };

        match table {
            IntentTable::MeterPolicy => {
                let prefix = format!("{key}:");
                eni_refs(&|cfg: &EniConfig| cfg.meter_policies().any(|p| p == key)).or_else(|| {
                    self.materialized
                        .keys()
                        .find(|(t, k)| *t == IntentTable::MeterRule && k.starts_with(&prefix))
                        .map(|(t, k)| format!("{}:{k}", t.name()))
                })
            }
            IntentTable::MeterRule => {
                let policy = key.split_once(':').map_or(key, |(p, _)| p);
                eni_refs(&|cfg: &EniConfig| cfg.meter_policies().any(|p| p == policy))
            }
            IntentTable::Vnet => eni_refs(&|cfg: &EniConfig| cfg.vnet == key),
            IntentTable::Appliance | IntentTable::Eni => None,
        }
    }

    fn dematerialize(&mut self, table: IntentTable, key: &str) -> Outcome {
        let id = (table, key.to_string());
        if !self.materialized.contains_key(&id) {
            return Outcome::Applied;
        }
        if let Some(blocker) = self.blocker(table, key) {
            return Outcome::Deferred(format!("referenced by {blocker}"));
        }

        if let Some(m) = self.materialized.remove(&id) {
            for (realized_table, realized_key) in m.keys {
                debug!(table = %realized_table, key = %realized_key, "dematerialized");
                if let Some(rows) = self.realized.get_mut(&realized_table) {
                    rows.remove(&realized_key);
                }
            }
        }
        Outcome::Applied
    }

    /// Recompute name maps and id lists from group status and realized ENIs.
    fn reconcile_counters(&mut self) {
        let enis: Vec<(String, String)> = self
            .materialized_enis()
            .filter_map(|(name, m)| {
                m.keys
                    .iter()
                    .find(|(t, _)| *t == RealizedTable::Eni)
                    .map(|(_, k)| (name.clone(), k.to_string()))
            })
            .collect();

        let mut name_maps: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut id_lists = BTreeMap::new();

        for group in [CounterGroup::Eni, CounterGroup::Meter] {
            if self.counter_status.get(&group) != Some(&CounterStatus::Enable) || enis.is_empty() {
                continue;
            }
            name_maps
                .entry(group.name_map().to_string())
                .or_default()
                .extend(enis.iter().cloned());
            for (_, oid) in &enis {
                id_lists.insert(group.id_list_key(oid), stat_ids(group));
            }
        }

        self.name_maps = name_maps;
        self.id_lists = id_lists;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IpVersion;

    fn upsert<P: IntentPayload>(key: &str, payload: &P) -> Op {
        Op::Upsert {
            table: P::TABLE,
            key: key.to_string(),
            fields: payload.to_fields().unwrap(),
        }
    }

    fn policy(version: IpVersion) -> MeterPolicyConfig {
        MeterPolicyConfig {
            ip_version: version,
        }
    }

    fn eni(policy: &str) -> EniConfig {
        EniConfig {
            eni_id: "497f23d7-f0ac-4c99-a98f-59b470e8c7bd".to_string(),
            mac_address: "F4939FEFC47E".to_string(),
            underlay_ip: "25.1.1.1".to_string(),
            admin_state: AdminState::Enabled,
            vnet: "Vnet1".to_string(),
            v4_meter_policy_id: Some(policy.to_string()),
            v6_meter_policy_id: None,
        }
    }

    fn run(state: &mut SimState, op: Op) {
        let now = Instant::now();
        state.enqueue(op, now);
        state.process(now);
    }

    #[tokio::test]
    async fn test_rule_waits_for_policy() {
        let mut state = SimState::default();
        let rule = MeterRuleConfig {
            priority: 10,
            metering_class: 1,
            ip_prefix: "10.0.0.0/8".to_string(),
        };
        run(&mut state, upsert("p:1", &rule));
        assert!(state.list_keys(RealizedTable::MeterRule).is_empty());
        assert_eq!(state.pending_len(), 1);

        run(&mut state, upsert("p", &policy(IpVersion::Ipv4)));
        state.process(Instant::now());
        assert_eq!(state.list_keys(RealizedTable::MeterRule).len(), 1);
        assert_eq!(state.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_oids_are_unique_and_not_creation_ordered() {
        let mut state = SimState::default();
        run(&mut state, upsert("a", &policy(IpVersion::Ipv4)));
        run(&mut state, upsert("b", &policy(IpVersion::Ipv6)));
        let a = state
            .realized_key_of(IntentTable::MeterPolicy, "a", RealizedTable::MeterPolicy)
            .unwrap();
        let b = state
            .realized_key_of(IntentTable::MeterPolicy, "b", RealizedTable::MeterPolicy)
            .unwrap();
        assert_ne!(a, b);
        assert!(b < a);
    }

    #[tokio::test]
    async fn test_policy_removal_blocked_by_eni() {
        let mut state = SimState::default();
        run(&mut state, upsert("Vnet1", &VnetConfig { vni: 1, guid: "00".repeat(16) }));
        run(&mut state, upsert("p", &policy(IpVersion::Ipv4)));
        run(&mut state, upsert("F4939FEFC47E", &eni("p")));
        assert_eq!(state.list_keys(RealizedTable::Eni).len(), 1);

        run(
            &mut state,
            Op::Remove {
                table: IntentTable::MeterPolicy,
                key: "p".to_string(),
            },
        );
        assert_eq!(state.list_keys(RealizedTable::MeterPolicy).len(), 1);
        assert_eq!(state.pending_len(), 1);

        run(
            &mut state,
            Op::Remove {
                table: IntentTable::Eni,
                key: "F4939FEFC47E".to_string(),
            },
        );
        state.process(Instant::now());
        assert!(state.list_keys(RealizedTable::MeterPolicy).is_empty());
        assert!(state.list_keys(RealizedTable::Eni).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_blocked_removal_is_queued_once() {
        let mut state = SimState::default();
        run(&mut state, upsert("Vnet1", &VnetConfig { vni: 1, guid: "00".repeat(16) }));
        run(&mut state, upsert("p", &policy(IpVersion::Ipv4)));
        run(&mut state, upsert("F4939FEFC47E", &eni("p")));

        let remove = Op::Remove {
            table: IntentTable::MeterPolicy,
            key: "p".to_string(),
        };
        for _ in 0..3 {
            run(&mut state, remove.clone());
        }
        assert_eq!(state.pending_len(), 1);
        assert_eq!(state.list_keys(RealizedTable::MeterPolicy).len(), 1);

        // A re-create between removals keeps both removals in order.
        let now = Instant::now();
        state.enqueue(upsert("p", &policy(IpVersion::Ipv4)), now);
        state.enqueue(remove, now);
        assert_eq!(state.pending_len(), 3);
    }

    #[tokio::test]
    async fn test_counters_follow_group_status() {
        let mut state = SimState::default();
        run(&mut state, upsert("Vnet1", &VnetConfig { vni: 1, guid: "00".repeat(16) }));
        run(&mut state, upsert("p", &policy(IpVersion::Ipv4)));
        run(&mut state, upsert("F4939FEFC47E", &eni("p")));
        let eni_oid = state.list_keys(RealizedTable::Eni).into_iter().next().unwrap();

        run(
            &mut state,
            Op::CounterStatus {
                group: CounterGroup::Meter,
                status: CounterStatus::Enable,
            },
        );
        let map = state.name_map(CounterGroup::Meter.name_map());
        assert_eq!(map.get("F4939FEFC47E"), Some(&eni_oid.to_string()));
        assert!(state.id_list(CounterGroup::Meter, eni_oid.as_str()).is_some());
        assert!(state.id_list(CounterGroup::Eni, eni_oid.as_str()).is_none());

        run(
            &mut state,
            Op::CounterStatus {
                group: CounterGroup::Meter,
                status: CounterStatus::Disable,
            },
        );
        assert!(state.side_table_is_empty(CounterGroup::Meter.name_map()));
        assert!(state.id_list(CounterGroup::Meter, eni_oid.as_str()).is_none());
    }

    #[tokio::test]
    async fn test_bad_payload_is_dropped() {
        let mut state = SimState::default();
        let mut fields = FieldMap::new();
        fields.insert("pb".to_string(), b"not json".to_vec());
        run(
            &mut state,
            Op::Upsert {
                table: IntentTable::Vnet,
                key: "Vnet1".to_string(),
                fields,
            },
        );
        assert_eq!(state.pending_len(), 0);
        assert!(state.list_keys(RealizedTable::Vnet).is_empty());
    }
}
