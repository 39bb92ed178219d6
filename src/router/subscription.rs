//! Publish/subscribe dissemination policy (spec §4.9): STRICT, SEMI_POROUS,
//! FLEXIBLE, with the memoized per-message accept/offer filters the
//! semi-porous mode needs so repeated draws don't re-roll every tick.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisseminationMode {
    Strict,
    SemiPorous,
    Flexible,
}

impl DisseminationMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Strict),
            1 => Some(Self::SemiPorous),
            2 => Some(Self::Flexible),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Strict => "strict dissemination mode",
            Self::SemiPorous => "semi-porous dissemination mode",
            Self::Flexible => "flexible dissemination mode",
        }
    }
}

/// Per-host subscription list plus the dissemination-mode accept/offer
/// decisions, memoized where the mode draws randomly.
pub struct SubscriptionPolicy {
    mode: DisseminationMode,
    subscriptions: HashSet<u32>,
    receive_probability: f64,
    send_probability: f64,
    receive_filter: HashMap<String, bool>,
    send_filter: HashMap<(String, u32), bool>,
}

impl SubscriptionPolicy {
    pub fn new(mode: DisseminationMode, subscriptions: HashSet<u32>, receive_probability: f64, send_probability: f64) -> Self {
        SubscriptionPolicy {
            mode,
            subscriptions,
            receive_probability,
            send_probability,
            receive_filter: HashMap::new(),
            send_filter: HashMap::new(),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }

    pub fn subscribes(&self, sub_id: Option<u32>) -> bool {
        sub_id.map(|id| self.subscriptions.contains(&id)).unwrap_or(false)
    }

    /// Accept-on-receive decision. A subscriber always accepts its own
    /// topic; `spray_active` (Spray-and-Wait copies still > 1) makes
    /// SEMI_POROUS accept regardless of the porosity draw, so copies are not
    /// lost during the spray phase.
    pub fn decide_receive(&mut self, msg: &Message, spray_active: bool, rng: &mut impl Rng) -> bool {
        if self.subscribes(msg.properties.sub_id) {
            return true;
        }
        match self.mode {
            DisseminationMode::Flexible => true,
            DisseminationMode::Strict => false,
            DisseminationMode::SemiPorous => {
                if spray_active {
                    return true;
                }
                let p = self.receive_probability;
                *self.receive_filter.entry(msg.id.clone()).or_insert_with(|| rng.gen_bool(p))
            }
        }
    }

    /// Offer-to-peer decision, memoized per `(message, peer)` for
    /// SEMI_POROUS so the same peer sees a stable decision until the
    /// neighbor set changes.
    pub fn decide_send(&mut self, msg: &Message, peer: u32, spray_active: bool, rng: &mut impl Rng) -> bool {
        if self.subscribes(msg.properties.sub_id) {
            return true;
        }
        match self.mode {
            DisseminationMode::Flexible => true,
            DisseminationMode::Strict => false,
            DisseminationMode::SemiPorous => {
                if spray_active {
                    return true;
                }
                let p = self.send_probability;
                *self.send_filter.entry((msg.id.clone(), peer)).or_insert_with(|| rng.gen_bool(p))
            }
        }
    }

    /// Flush the send filter when the neighbor set changes, so a
    /// newly-in-range peer draws a fresh decision.
    pub fn neighbor_set_changed(&mut self) {
        self.send_filter.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Priority, Ttl};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn msg_with_sub(id: &str, sub_id: Option<u32>) -> Message {
        let mut m = Message::new(id, 1, None, 100, Priority::Medium, 0.0, Ttl::Minutes(30.0));
        m.properties.sub_id = sub_id;
        m
    }

    #[test]
    fn strict_rejects_non_subscribers() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::Strict, HashSet::from([1, 2]), 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let msg = msg_with_sub("M1", Some(3));
        assert!(!policy.decide_receive(&msg, false, &mut rng));
    }

    #[test]
    fn strict_accepts_subscribers() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::Strict, HashSet::from([3, 5]), 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let msg = msg_with_sub("M1", Some(3));
        assert!(policy.decide_receive(&msg, false, &mut rng));
    }

    #[test]
    fn flexible_accepts_everything() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::Flexible, HashSet::new(), 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let msg = msg_with_sub("M1", Some(99));
        assert!(policy.decide_receive(&msg, false, &mut rng));
    }

    #[test]
    fn semi_porous_memoizes_the_receive_decision_per_message() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::SemiPorous, HashSet::new(), 0.5, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        let msg = msg_with_sub("M1", Some(9));
        let first = policy.decide_receive(&msg, false, &mut rng);
        for _ in 0..20 {
            assert_eq!(policy.decide_receive(&msg, false, &mut rng), first);
        }
    }

    #[test]
    fn semi_porous_spray_active_always_accepts() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::SemiPorous, HashSet::new(), 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let msg = msg_with_sub("M1", Some(9));
        assert!(policy.decide_receive(&msg, true, &mut rng));
    }

    #[test]
    fn neighbor_set_changed_clears_send_filter() {
        let mut policy = SubscriptionPolicy::new(DisseminationMode::SemiPorous, HashSet::new(), 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let msg = msg_with_sub("M1", Some(9));
        policy.decide_send(&msg, 5, false, &mut rng);
        assert!(!policy.send_filter.is_empty());
        policy.neighbor_set_changed();
        assert!(policy.send_filter.is_empty());
    }
}
