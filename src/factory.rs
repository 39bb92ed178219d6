//! Settings → running `World` construction (spec §6's "Settings/Factory"
//! component). Per Design Note §9 ("strategy pluggability"), every
//! pluggable algorithm resolves to a tagged-union match here rather than a
//! runtime plugin registry — there is nothing left to dispatch on at
//! runtime once construction has picked a `RouterKind`/strategy variant.

use std::collections::HashSet;

use rand::seq::SliceRandom;

use crate::connectivity_optimizer::ConnectivityOptimizer;
use crate::context::SimulationContext;
use crate::error::SettingsError;
use crate::host::DTNHost;
use crate::message::Ttl;
use crate::message_cache::{ForwardingOrderStrategy, MessageCacheManager, PrioritizationStrategy};
use crate::movement::StationaryMovement;
use crate::network_interface::NetworkInterface;
use crate::router::subscription::{DisseminationMode, SubscriptionPolicy};
use crate::router::{Router, RouterKind};
use crate::settings::Settings;
use crate::world::World;

/// `Interface.<name>.*` (spec §6).
#[derive(Debug, Clone)]
pub struct InterfaceTemplate {
    pub name: String,
    pub transmit_range: f64,
    pub transmit_speed: f64,
    pub scan_interval: f64,
}

/// `Group.<n>.*` (spec §6): one host template, instantiated `nrofHosts` times.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub id: String,
    pub nrof_hosts: u32,
    pub buffer_size: u64,
    pub msg_ttl: Ttl,
    pub delete_delivered: bool,
    pub router_kind: RouterKind,
    pub interfaces: Vec<String>,
    /// The global `subscriptions.subIDs` pool each host of this group
    /// samples its own subscription set from (spec §6).
    pub subscription_pool: HashSet<u32>,
    /// `subscriptions.maxSize`: how many ids from the pool each host keeps.
    pub subscription_max_size: usize,
    pub dissemination_mode: DisseminationMode,
    pub accept_probability: f64,
    pub send_probability: f64,
}

/// `Scenario.*` (spec §6).
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub simulate_connections: bool,
    pub update_interval: f64,
    pub end_time: f64,
}

/// `MessageCache.*` and `Optimization.*` (spec §6).
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub scenario: ScenarioConfig,
    pub prioritization: PrioritizationStrategy,
    pub forwarding_order: ForwardingOrderStrategy,
    pub cell_size_mult: f64,
    pub randomize_update_order: bool,
    pub randomize_update_order_seed: u64,
}

pub fn load_scenario(settings: &Settings) -> Result<ScenarioConfig, SettingsError> {
    Ok(ScenarioConfig {
        name: settings.get_string_or("Scenario.name", "unnamed"),
        simulate_connections: settings.get_bool_or("Scenario.simulateConnections", true),
        update_interval: settings.get_double("Scenario.updateInterval")?,
        end_time: settings.get_double("Scenario.endTime")?,
    })
}

pub fn load_global(settings: &Settings) -> Result<GlobalConfig, SettingsError> {
    let scenario = load_scenario(settings)?;
    let prioritization_code = settings.get_enum_code("MessageCache.cachingPrioritizationStrategy", 2)?;
    let forwarding_code = settings.get_enum_code("MessageCache.messageForwardingOrderStrategy", 1)?;
    Ok(GlobalConfig {
        scenario,
        prioritization: PrioritizationStrategy::from_code(prioritization_code).expect("validated by get_enum_code"),
        forwarding_order: ForwardingOrderStrategy::from_code(forwarding_code).expect("validated by get_enum_code"),
        cell_size_mult: settings.get_double_or("Optimization.cellSizeMult", 2.0),
        randomize_update_order: settings.get_bool_or("Optimization.randomizeUpdateOrder", false),
        randomize_update_order_seed: settings.get_int_or("Optimization.randomizeUpdateOrderSeed", 0) as u64,
    })
}

pub fn load_interfaces(settings: &Settings) -> Result<Vec<InterfaceTemplate>, SettingsError> {
    settings
        .child_table_names("Interface")
        .into_iter()
        .map(|name| {
            let prefix = format!("Interface.{name}");
            Ok(InterfaceTemplate {
                transmit_range: settings.get_double(&format!("{prefix}.transmitRange"))?,
                transmit_speed: settings.get_double(&format!("{prefix}.transmitSpeed"))?,
                scan_interval: settings.get_double_or(&format!("{prefix}.scanInterval"), 0.0),
                name,
            })
        })
        .collect()
}

fn parse_router_kind(settings: &Settings, prefix: &str) -> Result<RouterKind, SettingsError> {
    let name = settings.get_string(&format!("{prefix}.router"))?;
    match name.as_str() {
        "EpidemicBroadcastRouterWithSubscriptions" => Ok(RouterKind::EpidemicBroadcastWithSubscriptions),
        "SprayAndWaitRouterWithSubscriptions" => Ok(RouterKind::SprayAndWaitWithSubscriptions {
            binary_mode: settings.get_bool_or("SprayAndWaitRouterWithSubscriptions.binaryMode", true),
            initial_copies: settings.get_int_or("SprayAndWaitRouterWithSubscriptions.nrofCopies", 6) as u32,
        }),
        other => Err(SettingsError::Invalid {
            key: format!("{prefix}.router"),
            value: other.to_string(),
            reason: "unknown router kind".to_string(),
        }),
    }
}

pub fn load_groups(settings: &Settings) -> Result<Vec<GroupConfig>, SettingsError> {
    let dissemination_mode_code = settings.get_enum_code("subDisMode", 2).unwrap_or(2); // default FLEXIBLE
    let dissemination_mode = DisseminationMode::from_code(dissemination_mode_code).expect("validated by get_enum_code");
    let subscription_pool: HashSet<u32> = settings.get_int_list("subscriptions.subIDs").unwrap_or_default().into_iter().map(|v| v as u32).collect();
    let subscription_max_size = settings.get_int_or("subscriptions.maxSize", subscription_pool.len() as i64).max(0) as usize;
    let accept_probability = settings.get_double_or("msgAcceptProbability", 1.0);
    let send_probability = settings.get_double_or("msgDissProbability", 1.0);

    settings
        .child_table_names("Group")
        .into_iter()
        .map(|id| {
            let prefix = format!("Group.{id}");
            let nrof_interfaces = settings.get_int_or(&format!("{prefix}.nrofInterfaces"), 1).max(1) as u32;
            let interfaces = (1..=nrof_interfaces)
                .map(|i| settings.get_string(&format!("{prefix}.interface{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GroupConfig {
                nrof_hosts: settings.get_int(&format!("{prefix}.nrofHosts"))? as u32,
                buffer_size: settings.get_int(&format!("{prefix}.bufferSize"))? as u64,
                msg_ttl: Ttl::Minutes(settings.get_double(&format!("{prefix}.msgTtl"))?),
                delete_delivered: settings.get_bool_or(&format!("{prefix}.deleteDelivered"), false),
                router_kind: parse_router_kind(settings, &prefix)?,
                interfaces,
                subscription_pool: subscription_pool.clone(),
                subscription_max_size,
                dissemination_mode,
                accept_probability,
                send_probability,
                id,
            })
        })
        .collect()
}

/// Each host independently samples up to `max_size` ids from the shared
/// `subscriptions.subIDs` pool (spec §6), so hosts in the same group can
/// still end up with different subscription sets — the per-host
/// differentiation spec §8 Scenario 6 depends on.
fn sample_subscriptions(pool: &HashSet<u32>, max_size: usize, rng: &mut impl rand::Rng) -> HashSet<u32> {
    if max_size >= pool.len() {
        return pool.clone();
    }
    let mut ids: Vec<u32> = pool.iter().copied().collect();
    ids.shuffle(rng);
    ids.truncate(max_size);
    ids.into_iter().collect()
}

/// Build a fully wired `World` from settings: interfaces, per-group hosts
/// (with stationary movement as the out-of-scope collaborator's default —
/// see `crate::movement`), and the connectivity grids.
pub fn build_world(settings: &Settings, mut context: SimulationContext) -> Result<World, SettingsError> {
    let global = load_global(settings)?;
    let interfaces = load_interfaces(settings)?;
    let groups = load_groups(settings)?;

    let mut grids = std::collections::HashMap::new();
    for template in &interfaces {
        grids.insert(template.name.clone(), ConnectivityOptimizer::new(global.cell_size_mult, template.transmit_range));
    }

    let mut hosts = Vec::new();
    for group in &groups {
        for _ in 0..group.nrof_hosts {
            let address = context.allocate_host_address();
            let cache = MessageCacheManager::new(group.buffer_size, global.prioritization, global.forwarding_order.clone());
            let host_subscriptions = sample_subscriptions(&group.subscription_pool, group.subscription_max_size, &mut context.strategy_rng);
            let subscription = SubscriptionPolicy::new(group.dissemination_mode, host_subscriptions, group.accept_probability, group.send_probability);
            let router = Router::new(address, group.router_kind, cache, subscription, group.delete_delivered);

            let mut host_interfaces = Vec::new();
            for iface_name in &group.interfaces {
                let template = interfaces
                    .iter()
                    .find(|t| &t.name == iface_name)
                    .ok_or_else(|| SettingsError::Invalid { key: format!("Group.{}.interface", group.id), value: iface_name.clone(), reason: "no such Interface.<name> defined".to_string() })?;
                let iface_address = context.allocate_interface_address();
                host_interfaces.push(NetworkInterface::new(iface_address, template.name.clone(), address, template.transmit_range, template.transmit_speed, template.scan_interval));
            }

            hosts.push(DTNHost::new(address, group.id.clone(), router, host_interfaces, Box::new(StationaryMovement)));
        }
    }

    Ok(World::new(hosts, grids, context, global.scenario.update_interval, global.randomize_update_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_settings() -> Settings {
        Settings::from_str(
            r#"
            [Scenario]
            name = "demo"
            updateInterval = 0.1
            endTime = 10.0

            [Interface.lora]
            transmitRange = 100.0
            transmitSpeed = 1000.0
            scanInterval = 1.0

            [MessageCache]
            cachingPrioritizationStrategy = 1
            messageForwardingOrderStrategy = 0

            [Group.1]
            nrofHosts = 2
            bufferSize = 1000000
            msgTtl = 300
            router = "EpidemicBroadcastRouterWithSubscriptions"
            nrofInterfaces = 1
            interface1 = "lora"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn builds_a_world_with_the_configured_hosts_and_interfaces() {
        let settings = demo_settings();
        let world = build_world(&settings, SimulationContext::fresh(1, 0)).unwrap();
        assert_eq!(world.hosts().len(), 2);
        assert_eq!(world.hosts()[0].interfaces.len(), 1);
        assert_eq!(world.hosts()[0].interfaces[0].interface_type, "lora");
    }

    #[test]
    fn unknown_router_kind_is_a_settings_error() {
        let settings = Settings::from_str("[Group.1]\nnrofHosts = 1\nbufferSize = 100\nmsgTtl = 10\nrouter = \"NopeRouter\"\nnrofInterfaces = 0\n").unwrap();
        assert!(load_groups(&settings).is_err());
    }

    #[test]
    fn missing_interface_reference_is_a_settings_error() {
        let settings = Settings::from_str(
            r#"
            [Group.1]
            nrofHosts = 1
            bufferSize = 100
            msgTtl = 10
            router = "EpidemicBroadcastRouterWithSubscriptions"
            nrofInterfaces = 1
            interface1 = "missing"
            "#,
        )
        .unwrap();
        let result = build_world(&settings, SimulationContext::fresh(1, 0));
        assert!(result.is_err());
    }
}
