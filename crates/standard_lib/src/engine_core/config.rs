use serde::{Deserialize, Serialize};

/// What the reactor does when a subscriber queue is full.
///
/// The default propagates slowness upstream: the reactor blocks, which in
/// turn fills ingress and blocks publishers. Nothing is lost, but the
/// slowest subscriber paces the whole bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block the reactor until the subscriber drains (at-least-once, no drop).
    #[default]
    Block,
    /// Drop the incoming event for that subscriber and count it in stats.
    DropNewest,
}

/// Construction-time bus parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the publisher -> reactor queue.
    pub ingress_capacity: usize,
    /// Capacity of each subscriber queue.
    pub per_sub_capacity: usize,
    /// Per-subscriber behavior on a full queue.
    pub overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { ingress_capacity: 65_536, per_sub_capacity: 65_536, overflow: OverflowPolicy::Block }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.ingress_capacity, 65_536);
        assert_eq!(cfg.per_sub_capacity, 65_536);
        assert_eq!(cfg.overflow, OverflowPolicy::Block);
    }
}
