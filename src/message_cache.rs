//! Bounded message buffer with prioritized eviction and pluggable
//! forwarding-order strategies (spec §4.8).
//!
//! Strategies are closed tagged unions selected by integer code at
//! construction (Design Note §9: "strategy pluggability"), matching the
//! teacher's preference for enums-with-match over runtime dispatch tables.

use std::collections::HashMap;

use rand::Rng;

use crate::message::{Message, Priority};

/// `cachingPrioritizationStrategy` (spec §6), int code 0..3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrioritizationStrategy {
    /// By receive time ascending.
    Fifo,
    /// By priority descending, break ties by receive time ascending.
    PrioritizedFifo,
    /// By priority descending, then forward-count ascending, then receive
    /// time ascending.
    PrioritizedLeastForwardedFirstFifo,
}

impl PrioritizationStrategy {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Fifo),
            1 => Some(Self::PrioritizedFifo),
            2 => Some(Self::PrioritizedLeastForwardedFirstFifo),
            _ => None,
        }
    }

    /// Total ordering: `Less` means "should be forwarded/considered first".
    pub fn compare(&self, a: &Message, b: &Message) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let receive_time = |m: &Message| m.receive_time.unwrap_or(m.creation_time);
        match self {
            Self::Fifo => receive_time(a).partial_cmp(&receive_time(b)).unwrap_or(Ordering::Equal),
            Self::PrioritizedFifo => b
                .priority
                .cmp(&a.priority)
                .then_with(|| receive_time(a).partial_cmp(&receive_time(b)).unwrap_or(Ordering::Equal)),
            Self::PrioritizedLeastForwardedFirstFifo => b
                .priority
                .cmp(&a.priority)
                .then_with(|| a.forward_count().cmp(&b.forward_count()))
                .then_with(|| receive_time(a).partial_cmp(&receive_time(b)).unwrap_or(Ordering::Equal)),
        }
    }
}

/// `messageForwardingOrderStrategy` (spec §6), int code 0..1. This is the
/// last word applied after prioritization sorting.
#[derive(Debug, Clone)]
pub enum ForwardingOrderStrategy {
    Unchanged,
    ExponentiallyDecaying,
}

impl ForwardingOrderStrategy {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unchanged),
            1 => Some(Self::ExponentiallyDecaying),
            _ => None,
        }
    }

    /// Reorder `items` (already prioritization-sorted). `rng` must be seeded
    /// deterministically by the caller for reproducible runs.
    pub fn apply<T: Clone>(&self, items: &[T], rng: &mut impl Rng) -> Vec<T> {
        match self {
            Self::Unchanged => items.to_vec(),
            Self::ExponentiallyDecaying => decaying_reorder(items, rng),
        }
    }
}

/// Sample without replacement using a monotone cumulative-weight vector
/// `w_i = (1 - 1/n)^i`, normalized so the last entry is 1.0. On a collision
/// with an already-emitted item, scan outward from the drawn index for the
/// nearest free slot. Earlier input items remain more likely to be drawn
/// first; later ones retain non-zero probability (spec §4.8).
fn decaying_reorder<T: Clone>(items: &[T], rng: &mut impl Rng) -> Vec<T> {
    let n = items.len();
    if n <= 1 {
        return items.to_vec();
    }

    let decay = 1.0 - 1.0 / n as f64;
    let mut weights: Vec<f64> = (0..n).map(|i| decay.powi(i as i32)).collect();
    let last = *weights.last().unwrap();
    for w in &mut weights {
        *w /= last;
    }

    let mut emitted = vec![false; n];
    let mut order = Vec::with_capacity(n);

    for _ in 0..n {
        let draw: f64 = rng.gen_range(0.0..weights[n - 1].max(f64::MIN_POSITIVE));
        let mut idx = weights.partition_point(|&w| w < draw).min(n - 1);

        if emitted[idx] {
            // Scan outward from the drawn index for the nearest free slot.
            let mut offset = 1usize;
            loop {
                if idx >= offset && !emitted[idx - offset] {
                    idx -= offset;
                    break;
                }
                if idx + offset < n && !emitted[idx + offset] {
                    idx += offset;
                    break;
                }
                offset += 1;
                assert!(offset <= n, "decaying_reorder: ran out of slots");
            }
        }

        emitted[idx] = true;
        order.push(items[idx].clone());
    }

    order
}

/// Bounded message buffer keyed by id, with prioritized eviction.
pub struct MessageCacheManager {
    buffer_size: u64,
    prioritization: PrioritizationStrategy,
    forwarding_order: ForwardingOrderStrategy,
    messages: HashMap<String, Message>,
}

impl MessageCacheManager {
    pub fn new(buffer_size: u64, prioritization: PrioritizationStrategy, forwarding_order: ForwardingOrderStrategy) -> Self {
        MessageCacheManager {
            buffer_size,
            prioritization,
            forwarding_order,
            messages: HashMap::new(),
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn used_bytes(&self) -> u64 {
        self.messages.values().map(|m| m.size).sum()
    }

    pub fn has(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Minimum forward-count currently held, or 0 if the buffer is empty.
    fn min_forward_count(&self) -> u32 {
        self.messages.values().map(|m| m.forward_count()).min().unwrap_or(0)
    }

    /// Insert a message, raising its forward-count to the buffer's fairness
    /// floor (spec §3 invariant): a message that has already circulated a
    /// while should not let a late-arriving message act as if brand new.
    pub fn add(&mut self, mut msg: Message) {
        let floor = self.min_forward_count();
        while msg.forward_count() < floor {
            msg.increment_forward_times();
        }
        self.messages.insert(msg.id.clone(), msg);
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        self.messages.remove(id)
    }

    pub fn compare(&self, a: &Message, b: &Message) -> std::cmp::Ordering {
        self.prioritization.compare(a, b)
    }

    /// Two-stage sort: prioritization strategy first, forwarding-order
    /// strategy last (spec §4.8 — forwarding order is "the last word").
    pub fn sort_for_forwarding(&self, rng: &mut impl Rng) -> Vec<Message> {
        let mut items: Vec<Message> = self.messages.values().cloned().collect();
        items.sort_by(|a, b| self.prioritization.compare(a, b));
        self.forwarding_order.apply(&items, rng)
    }

    /// Evict the lowest-importance eligible messages (per the
    /// prioritization strategy, from the back of the sorted order) until
    /// at least `needed_bytes` are free, never evicting an id in
    /// `protected` (currently-sending messages) and never evicting one
    /// whose priority exceeds `max_priority`. Rolls back (evicts nothing)
    /// if not enough space can be freed. Returns the ids evicted, in
    /// eviction order, on success.
    pub fn make_room(&mut self, needed_bytes: u64, max_priority: Priority, protected: &std::collections::HashSet<String>) -> Option<Vec<String>> {
        let free = self.buffer_size.saturating_sub(self.used_bytes());
        if free >= needed_bytes {
            return Some(Vec::new());
        }
        let deficit = needed_bytes - free;

        let mut candidates: Vec<&Message> = self.messages.values().filter(|m| !protected.contains(&m.id) && m.priority <= max_priority).collect();
        // Least important first: reverse of the "forward first" ordering.
        candidates.sort_by(|a, b| self.prioritization.compare(b, a));

        let mut freed = 0u64;
        let mut to_evict = Vec::new();
        for m in candidates {
            if freed >= deficit {
                break;
            }
            freed += m.size;
            to_evict.push(m.id.clone());
        }

        if freed < deficit {
            return None;
        }

        for id in &to_evict {
            self.messages.remove(id);
        }
        Some(to_evict)
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Ttl;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn msg(id: &str, priority: Priority, receive_time: f64) -> Message {
        let mut m = Message::new(id, 1, Some(2), 100, priority, 0.0, Ttl::Minutes(60.0));
        m.set_receive_time(receive_time);
        m
    }

    #[test]
    fn fifo_orders_by_receive_time() {
        let strat = PrioritizationStrategy::Fifo;
        let a = msg("A", Priority::Low, 5.0);
        let b = msg("B", Priority::High, 1.0);
        assert_eq!(strat.compare(&a, &b), std::cmp::Ordering::Greater);
    }

    #[test]
    fn prioritized_fifo_orders_by_priority_then_time() {
        let strat = PrioritizationStrategy::PrioritizedFifo;
        let low_early = msg("A", Priority::Low, 1.0);
        let high_late = msg("B", Priority::High, 5.0);
        assert_eq!(strat.compare(&high_late, &low_early), std::cmp::Ordering::Less);
    }

    #[test]
    fn add_raises_forward_count_to_buffer_floor() {
        let mut cache = MessageCacheManager::new(10_000, PrioritizationStrategy::Fifo, ForwardingOrderStrategy::Unchanged);
        let mut circulated = msg("A", Priority::Medium, 0.0);
        circulated.increment_forward_times();
        circulated.increment_forward_times();
        cache.add(circulated);

        let fresh = msg("B", Priority::Medium, 1.0);
        cache.add(fresh);

        assert_eq!(cache.get("B").unwrap().forward_count(), 2);
    }

    #[test]
    fn unchanged_forwarding_order_preserves_input() {
        let items = vec![1, 2, 3, 4];
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = ForwardingOrderStrategy::Unchanged.apply(&items, &mut rng);
        assert_eq!(ordered, items);
    }

    #[test]
    fn decaying_forwarding_order_is_a_permutation() {
        let items: Vec<i32> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let ordered = decaying_reorder(&items, &mut rng);
        let mut sorted = ordered.clone();
        sorted.sort();
        assert_eq!(sorted, items);
    }

    #[test]
    fn decaying_forwarding_order_favors_early_items_in_position_zero() {
        let items: Vec<i32> = (0..8).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut first_slot_counts = vec![0u32; items.len()];
        for _ in 0..2000 {
            let ordered = decaying_reorder(&items, &mut rng);
            first_slot_counts[ordered[0] as usize] += 1;
        }
        // Marginal probability of appearing first should be (roughly)
        // monotone non-increasing in input index.
        assert!(first_slot_counts[0] > first_slot_counts[items.len() - 1]);
    }

    #[test]
    fn make_room_evicts_lowest_priority_first_and_spares_protected() {
        let mut cache = MessageCacheManager::new(1000, PrioritizationStrategy::PrioritizedFifo, ForwardingOrderStrategy::Unchanged);
        cache.add(msg("low", Priority::Low, 0.0));
        cache.add(msg("mid", Priority::Medium, 0.0));
        cache.add(msg("sending", Priority::Low, 0.0));

        let mut protected = std::collections::HashSet::new();
        protected.insert("sending".to_string());

        // Buffer has 300 used, 700 free; needing 750 leaves a 50-byte
        // deficit, covered by evicting "low" alone ("mid" outranks it and
        // "sending" is protected).
        let evicted = cache.make_room(750, Priority::High, &protected).unwrap();
        assert_eq!(evicted, vec!["low".to_string()]);
        assert!(!cache.has("low"));
        assert!(cache.has("mid"));
        assert!(cache.has("sending"));
    }

    #[test]
    fn make_room_rolls_back_when_insufficient_space_available() {
        let mut cache = MessageCacheManager::new(150, PrioritizationStrategy::Fifo, ForwardingOrderStrategy::Unchanged);
        cache.add(msg("only", Priority::Low, 0.0));
        let protected = std::collections::HashSet::new();
        // Need far more than exists in the whole buffer.
        let result = cache.make_room(10_000, Priority::High, &protected);
        assert!(result.is_none());
        assert!(cache.has("only"));
    }
}
