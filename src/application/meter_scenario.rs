//! DASH meter scenario.
//!
//! Creates an appliance, a VNET, a v4 and a v6 meter policy with one rule
//! each, and an ENI bound to both policies whose meter counters are enabled
//! and released again. It then removes the v4 rule and policy while the ENI
//! still references them, expects the removal to be held back until the ENI
//! is gone, and finally tears everything down.
//!
//! Every step waits for the realized side and checks its attributes before the
//! next step writes. Sibling policies and rules are written one at a time so
//! the second of each pair can be resolved by elimination.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::harness::Harness;
use super::report::{Resolved, ScenarioReport};
use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::{
    sai, AdminState, ApplianceConfig, BaselineSnapshot, CounterGroup, EniConfig, IntentRef,
    IntentTable, IpVersion, KeySet, MeterPolicyConfig, MeterRuleConfig, RealizedKey,
    RealizedRecord, RealizedTable, ScenarioContext, VnetConfig,
};
use crate::domain::ports::child_key;
use crate::services::{assert_attribute, assert_attributes, normalize, Removal};

/// Name carried in the scenario report.
pub const SCENARIO_NAME: &str = "dash-meter";

/// Meter policies (and rules) realized side by side.
const SIBLINGS: usize = 2;

/// Scenario steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Appliance,
    Vnet,
    MeterV4,
    MeterV6,
    Eni,
    BlockedRemoval,
    Cleanup,
}

impl Step {
    /// Order in which [`MeterScenario::run`] executes steps.
    pub const SEQUENCE: [Self; 7] = [
        Self::Appliance,
        Self::Vnet,
        Self::MeterV4,
        Self::MeterV6,
        Self::Eni,
        Self::BlockedRemoval,
        Self::Cleanup,
    ];

    /// Step name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Appliance => "appliance",
            Self::Vnet => "vnet",
            Self::MeterV4 => "v4_meter",
            Self::MeterV6 => "v6_meter",
            Self::Eni => "eni",
            Self::BlockedRemoval => "blocked_removal",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Intent values written by the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterFixture {
    /// Appliance intent key.
    pub appliance_id: String,
    /// Appliance intent.
    pub appliance: ApplianceConfig,
    /// VNET intent key.
    pub vnet: String,
    /// VNI of the VNET.
    pub vni: u32,
    /// GUID in its dashed text form.
    pub vnet_guid: String,
    /// IPv4 meter policy key.
    pub policy_v4: String,
    /// IPv6 meter policy key.
    pub policy_v6: String,
    /// Rule number under the IPv4 policy.
    pub rule_v4_num: String,
    /// Rule under the IPv4 policy.
    pub rule_v4: MeterRuleConfig,
    /// Rule number under the IPv6 policy.
    pub rule_v6_num: String,
    /// Rule under the IPv6 policy.
    pub rule_v6: MeterRuleConfig,
    /// ENI intent key: its MAC address as 12 hex digits.
    pub eni_key: String,
    /// ENI identifier.
    pub eni_id: String,
    /// Underlay address of the VM.
    pub underlay_ip: String,
}

impl Default for MeterFixture {
    fn default() -> Self {
        Self {
            appliance_id: "100".to_string(),
            appliance: ApplianceConfig {
                sip: "10.1.0.32".to_string(),
                vm_vni: 4321,
                local_region_id: Some(10),
            },
            vnet: "Vnet1".to_string(),
            vni: 45654,
            vnet_guid: "559c6ce8-26ab-4193-b946-ccc6e8f930b2".to_string(),
            policy_v4: "245bdbfc-c327-4a2b-a513-21bd3b76d3b9".to_string(),
            policy_v6: "5b9a2bb2-9ee9-4d3a-9ba0-68b3ee9e1b1d".to_string(),
            rule_v4_num: "1".to_string(),
            rule_v4: MeterRuleConfig {
                priority: 10,
                metering_class: 1001,
                ip_prefix: "10.0.0.0/24".to_string(),
            },
            rule_v6_num: "2".to_string(),
            rule_v6: MeterRuleConfig {
                priority: 20,
                metering_class: 1002,
                ip_prefix: "2001:db8:1::/48".to_string(),
            },
            eni_key: "F4939FEFC47E".to_string(),
            eni_id: "497f23d7-f0ac-4c99-a98f-59b470e8c7bd".to_string(),
            underlay_ip: "25.1.1.1".to_string(),
        }
    }
}

impl MeterFixture {
    /// Policy key for `version`.
    pub fn policy_key(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::Ipv4 => &self.policy_v4,
            IpVersion::Ipv6 => &self.policy_v6,
        }
    }

    /// Rule number and intent for `version`.
    pub fn rule(&self, version: IpVersion) -> (&str, &MeterRuleConfig) {
        match version {
            IpVersion::Ipv4 => (&self.rule_v4_num, &self.rule_v4),
            IpVersion::Ipv6 => (&self.rule_v6_num, &self.rule_v6),
        }
    }

    /// Policy intent for `version`.
    pub fn policy_ref(&self, version: IpVersion) -> IntentRef {
        IntentRef::new(IntentTable::MeterPolicy, self.policy_key(version))
    }

    /// Rule intent for `version`.
    pub fn rule_ref(&self, version: IpVersion) -> IntentRef {
        let (num, _) = self.rule(version);
        IntentRef::new(IntentTable::MeterRule, child_key(self.policy_key(version), num))
    }

    /// ENI intent.
    pub fn eni_ref(&self) -> IntentRef {
        IntentRef::new(IntentTable::Eni, &self.eni_key)
    }

    /// ENI intent referencing both policies.
    pub fn eni_config(&self) -> EniConfig {
        EniConfig {
            eni_id: self.eni_id.clone(),
            mac_address: self.eni_key.clone(),
            underlay_ip: self.underlay_ip.clone(),
            admin_state: AdminState::Enabled,
            vnet: self.vnet.clone(),
            v4_meter_policy_id: Some(self.policy_v4.clone()),
            v6_meter_policy_id: Some(self.policy_v6.clone()),
        }
    }

    /// Every intent the scenario writes, in dependency-safe removal order.
    pub fn teardown_order(&self) -> Vec<IntentRef> {
        vec![
            self.eni_ref(),
            self.rule_ref(IpVersion::Ipv4),
            self.rule_ref(IpVersion::Ipv6),
            self.policy_ref(IpVersion::Ipv4),
            self.policy_ref(IpVersion::Ipv6),
            IntentRef::new(IntentTable::Vnet, &self.vnet),
            IntentRef::new(IntentTable::Appliance, &self.appliance_id),
        ]
    }
}

/// Wait for the key `intent` added to the baseline's table and read it back.
async fn resolve_record(
    harness: &Harness,
    ctx: &mut ScenarioContext,
    baseline: &BaselineSnapshot,
    intent: &IntentRef,
) -> HarnessResult<RealizedRecord> {
    let polling = harness.profiles.creation;
    let key = harness
        .resolver
        .resolve_new(ctx, &intent.intent_id(), baseline, &polling)
        .await?;
    harness
        .realized
        .wait_for_record(baseline.table(), &key, &polling)
        .await
}

/// Key an earlier step resolved for `intent` in `table`.
fn resolved_key(
    ctx: &ScenarioContext,
    table: RealizedTable,
    intent: &IntentRef,
) -> HarnessResult<RealizedKey> {
    ctx.resolved(table, &intent.intent_id())
        .cloned()
        .ok_or_else(|| HarnessError::InvalidValue(format!("{intent} not resolved in {table}")))
}

fn format_keys(keys: &KeySet) -> String {
    let keys: Vec<&str> = keys.iter().map(RealizedKey::as_str).collect();
    format!("[{}]", keys.join(", "))
}

fn check_rule(
    record: &RealizedRecord,
    rule: &MeterRuleConfig,
    policy: &RealizedKey,
) -> HarnessResult<()> {
    let (dip, mask) = normalize::prefix(&rule.ip_prefix)?;
    let priority = rule.priority.to_string();
    let class = rule.metering_class.to_string();
    assert_attributes(
        record,
        [
            (sai::METER_RULE_PRIORITY, priority.as_str()),
            (sai::METER_RULE_METER_CLASS, class.as_str()),
            (sai::METER_RULE_POLICY_ID, policy.as_str()),
            (sai::METER_RULE_DIP, dip.as_str()),
            (sai::METER_RULE_DIP_MASK, mask.as_str()),
        ],
    )
}

/// Runs the meter scenario step by step over a [`Harness`].
pub struct MeterScenario {
    harness: Harness,
    fixture: MeterFixture,
    ctx: ScenarioContext,
}

impl MeterScenario {
    /// Scenario over `harness` using `fixture`.
    pub fn new(harness: Harness, fixture: MeterFixture) -> Self {
        Self {
            harness,
            fixture,
            ctx: ScenarioContext::new(),
        }
    }

    /// Identities resolved so far.
    pub fn context(&self) -> &ScenarioContext {
        &self.ctx
    }

    /// The underlying harness.
    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    /// Run every step in order. After a failure the remaining steps are
    /// skipped, except cleanup which always runs.
    pub async fn run(&mut self) -> ScenarioReport {
        let mut report = ScenarioReport::new(SCENARIO_NAME);
        info!(scenario = SCENARIO_NAME, "scenario started");

        for step in Step::SEQUENCE {
            if !report.passed && step != Step::Cleanup {
                report.skip(step.name());
                continue;
            }

            let started = Instant::now();
            let result = self
                .run_step(step)
                .instrument(info_span!("step", name = step.name()))
                .await;
            if let Err(err) = &result {
                warn!(step = step.name(), error = %err, "step failed");
            }
            report.record(step.name(), result, started.elapsed());
        }

        info!(scenario = SCENARIO_NAME, passed = report.passed, "scenario finished");
        report
    }

    /// Run a single step.
    pub async fn run_step(&mut self, step: Step) -> HarnessResult<Resolved> {
        match step {
            Step::Appliance => self.appliance().await,
            Step::Vnet => self.vnet().await,
            Step::MeterV4 => self.meter_v4().await,
            Step::MeterV6 => self.meter_v6().await,
            Step::Eni => self.eni().await,
            Step::BlockedRemoval => self.blocked_removal().await,
            Step::Cleanup => self.cleanup().await,
        }
    }

    async fn appliance(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let intent = IntentRef::new(IntentTable::Appliance, &fixture.appliance_id);

        let direction = harness.resolver.baseline(RealizedTable::DirectionLookup).await?;
        let vip = harness.resolver.baseline(RealizedTable::Vip).await?;
        harness
            .intents
            .create_payload(&fixture.appliance_id, &fixture.appliance)
            .await?;

        let direction = resolve_record(harness, ctx, &direction, &intent).await?;
        let vni = fixture.appliance.vm_vni.to_string();
        assert_attributes(
            &direction,
            [
                (sai::DIRECTION_LOOKUP_ACTION, sai::DIRECTION_LOOKUP_SET_OUTBOUND),
                (sai::DIRECTION_LOOKUP_VNI, vni.as_str()),
            ],
        )?;

        let vip = resolve_record(harness, ctx, &vip, &intent).await?;
        let sip = normalize::ip(&fixture.appliance.sip)?;
        assert_attributes(
            &vip,
            [
                (sai::VIP_ACTION, sai::VIP_ACCEPT),
                (sai::VIP_ADDRESS, sip.as_str()),
            ],
        )?;

        Ok(Resolved::from([
            ("direction_lookup".to_string(), direction.key.to_string()),
            ("vip".to_string(), vip.key.to_string()),
        ]))
    }

    async fn vnet(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let intent = IntentRef::new(IntentTable::Vnet, &fixture.vnet);
        let payload = VnetConfig {
            vni: fixture.vni,
            guid: normalize::guid_hex(&fixture.vnet_guid)?,
        };

        let baseline = harness.resolver.baseline(RealizedTable::Vnet).await?;
        harness.intents.create_payload(&fixture.vnet, &payload).await?;

        let record = resolve_record(harness, ctx, &baseline, &intent).await?;
        assert_attribute(&record, sai::VNET_VNI, fixture.vni.to_string())?;

        Ok(Resolved::from([("vnet".to_string(), record.key.to_string())]))
    }

    async fn meter_v4(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let version = IpVersion::Ipv4;
        let policy_key = fixture.policy_key(version);

        let baseline = harness.resolver.baseline(RealizedTable::MeterPolicy).await?;
        harness
            .intents
            .create_payload(policy_key, &MeterPolicyConfig { ip_version: version })
            .await?;
        let policy = resolve_record(harness, ctx, &baseline, &fixture.policy_ref(version)).await?;
        assert_attribute(&policy, sai::METER_POLICY_IP_ADDR_FAMILY, version.sai_family())?;

        let (num, rule) = fixture.rule(version);
        let baseline = harness.resolver.baseline(RealizedTable::MeterRule).await?;
        harness.intents.set_payload(policy_key, num, rule).await?;
        let record = resolve_record(harness, ctx, &baseline, &fixture.rule_ref(version)).await?;
        check_rule(&record, rule, &policy.key)?;

        Ok(Resolved::from([
            ("policy_v4".to_string(), policy.key.to_string()),
            ("rule_v4".to_string(), record.key.to_string()),
        ]))
    }

    /// The v6 policy and rule carry nothing a baseline diff could not also
    /// give, but resolving them by elimination exercises sibling resolution.
    async fn meter_v6(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let version = IpVersion::Ipv6;
        let policy_key = fixture.policy_key(version);
        let polling = harness.profiles.creation;

        harness
            .intents
            .create_payload(policy_key, &MeterPolicyConfig { ip_version: version })
            .await?;
        let key = harness
            .resolver
            .resolve_by_elimination(
                ctx,
                RealizedTable::MeterPolicy,
                &fixture.policy_ref(version).intent_id(),
                SIBLINGS,
                &polling,
            )
            .await?;
        let policy = harness
            .realized
            .wait_for_record(RealizedTable::MeterPolicy, &key, &polling)
            .await?;
        assert_attribute(&policy, sai::METER_POLICY_IP_ADDR_FAMILY, version.sai_family())?;

        let (num, rule) = fixture.rule(version);
        harness.intents.set_payload(policy_key, num, rule).await?;
        let key = harness
            .resolver
            .resolve_by_elimination(
                ctx,
                RealizedTable::MeterRule,
                &fixture.rule_ref(version).intent_id(),
                SIBLINGS,
                &polling,
            )
            .await?;
        let record = harness
            .realized
            .wait_for_record(RealizedTable::MeterRule, &key, &polling)
            .await?;
        check_rule(&record, rule, &policy.key)?;

        Ok(Resolved::from([
            ("policy_v6".to_string(), policy.key.to_string()),
            ("rule_v6".to_string(), record.key.to_string()),
        ]))
    }

    async fn eni(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let intent = fixture.eni_ref();

        let baseline = harness.resolver.baseline(RealizedTable::Eni).await?;
        harness
            .intents
            .create_payload(&fixture.eni_key, &fixture.eni_config())
            .await?;
        let record = resolve_record(harness, ctx, &baseline, &intent).await?;

        let vnet = resolved_key(
            ctx,
            RealizedTable::Vnet,
            &IntentRef::new(IntentTable::Vnet, &fixture.vnet),
        )?;
        let v4 = resolved_key(
            ctx,
            RealizedTable::MeterPolicy,
            &fixture.policy_ref(IpVersion::Ipv4),
        )?;
        let v6 = resolved_key(
            ctx,
            RealizedTable::MeterPolicy,
            &fixture.policy_ref(IpVersion::Ipv6),
        )?;
        let underlay = normalize::ip(&fixture.underlay_ip)?;
        assert_attributes(
            &record,
            [
                (sai::ENI_VNET_ID, vnet.as_str()),
                (sai::ENI_V4_METER_POLICY_ID, v4.as_str()),
                (sai::ENI_V6_METER_POLICY_ID, v6.as_str()),
                (sai::ENI_VM_UNDERLAY_DIP, underlay.as_str()),
                (sai::ENI_ADMIN_STATE, "true"),
            ],
        )?;

        let group = CounterGroup::Meter;
        let eni_key = record.key.clone();
        let object_name = fixture.eni_key.clone();
        let attached = harness
            .counters
            .with_attached(group, |bindings| async move {
                let Some(binding) = bindings.iter().find(|b| b.object_name == object_name)
                else {
                    return Err(HarnessError::UnexpectedKeys {
                        table: group.name_map().to_string(),
                        expected: format!("entry for {object_name}"),
                        observed: format!("{} entries", bindings.len()),
                    });
                };
                if binding.object_key != eni_key.as_str() {
                    return Err(HarnessError::UnexpectedKeys {
                        table: group.name_map().to_string(),
                        expected: format!("{object_name} mapped to {eni_key}"),
                        observed: binding.object_key.clone(),
                    });
                }
                Ok(bindings.len())
            })
            .await?;

        Ok(Resolved::from([
            ("eni".to_string(), record.key.to_string()),
            ("eni_mac".to_string(), normalize::mac(&fixture.eni_key)?),
            ("meter_counters".to_string(), attached.to_string()),
        ]))
    }

    /// Removing the v4 rule and policy while the ENI references the policy is
    /// held back; once the ENI is removed only the v6 siblings remain.
    async fn blocked_removal(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;
        let policy_v4 = fixture.policy_ref(IpVersion::Ipv4);
        let rule_v4 = fixture.rule_ref(IpVersion::Ipv4);
        let blocker = fixture.eni_ref();

        let policy_key = resolved_key(ctx, RealizedTable::MeterPolicy, &policy_v4)?;
        let rule_key = resolved_key(ctx, RealizedTable::MeterRule, &rule_v4)?;
        let survivors = [
            (
                RealizedTable::MeterPolicy,
                resolved_key(
                    ctx,
                    RealizedTable::MeterPolicy,
                    &fixture.policy_ref(IpVersion::Ipv6),
                )?,
            ),
            (
                RealizedTable::MeterRule,
                resolved_key(ctx, RealizedTable::MeterRule, &fixture.rule_ref(IpVersion::Ipv6))?,
            ),
        ];

        let removal = Removal::new()
            .intent(rule_v4.clone())
            .intent(policy_v4.clone())
            .watch(RealizedTable::MeterRule, rule_key)
            .watch(RealizedTable::MeterPolicy, policy_key.clone());
        let report = harness.teardown.remove_with_blocker(&removal, &blocker).await?;

        if !report.blocked {
            return Err(HarnessError::UnexpectedKeys {
                table: RealizedTable::MeterPolicy.name().to_string(),
                expected: format!("{policy_key} held while referenced by {blocker}"),
                observed: "removed without clearing the reference".to_string(),
            });
        }

        let mut resolved = Resolved::new();
        for (table, survivor) in &survivors {
            let remaining = report.remaining.get(table).cloned().unwrap_or_default();
            if remaining.len() != 1 || !remaining.contains(survivor) {
                return Err(HarnessError::UnexpectedKeys {
                    table: table.name().to_string(),
                    expected: format!("only {survivor}"),
                    observed: format_keys(&remaining),
                });
            }
            resolved.insert(format!("remaining {}", table.name()), survivor.to_string());
        }

        for intent in [&blocker, &rule_v4, &policy_v4] {
            for table in intent.table.realized_tables() {
                ctx.release(*table, &intent.intent_id());
            }
        }
        Ok(resolved)
    }

    async fn cleanup(&mut self) -> HarnessResult<Resolved> {
        let Self {
            harness,
            fixture,
            ctx,
        } = self;

        let order = fixture.teardown_order();
        for intent in &order {
            harness.intents.remove_ref(intent).await?;
        }
        for table in RealizedTable::ALL {
            harness
                .realized
                .wait_for_keys(table.exactly(0), &harness.profiles.removal)
                .await?;
        }
        for intent in &order {
            for table in intent.table.realized_tables() {
                ctx.release(*table, &intent.intent_id());
            }
        }
        Ok(Resolved::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_refs() {
        let fixture = MeterFixture::default();
        assert_eq!(
            fixture.rule_ref(IpVersion::Ipv4).key,
            format!("{}:1", fixture.policy_v4)
        );
        assert_eq!(fixture.eni_ref().table, IntentTable::Eni);
        let eni = fixture.eni_config();
        assert_eq!(
            eni.meter_policies().collect::<Vec<_>>(),
            vec![fixture.policy_v4.as_str(), fixture.policy_v6.as_str()]
        );
    }

    #[test]
    fn test_teardown_order_removes_referrers_first() {
        let order = MeterFixture::default().teardown_order();
        let pos = |t: IntentTable| order.iter().position(|i| i.table == t).unwrap();
        assert!(pos(IntentTable::Eni) < pos(IntentTable::MeterPolicy));
        assert!(pos(IntentTable::MeterRule) < pos(IntentTable::MeterPolicy));
        assert!(pos(IntentTable::Eni) < pos(IntentTable::Vnet));
    }

    #[test]
    fn test_step_sequence_ends_with_cleanup() {
        assert_eq!(Step::SEQUENCE.last(), Some(&Step::Cleanup));
        assert_eq!(Step::MeterV6.name(), "v6_meter");
    }
}
