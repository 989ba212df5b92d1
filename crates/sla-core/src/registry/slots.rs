//! Per-account slot tables
//!
//! Line slots are indexed `1..max_shared_lines` (slot 0 exists but is never
//! filled), device slots `0..max_blf_devices`.

use serde::{Deserialize, Serialize};

use crate::types::{DialogId, SubscriptionId, SubscriptionKind};

/// A live subscription occupying a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSlot {
    pub subscription: SubscriptionId,
    pub dialog: DialogId,
}

/// Line and device slots of one account
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    lines: Vec<Option<ActiveSlot>>,
    devices: Vec<Option<ActiveSlot>>,
}

impl SlotTable {
    pub fn new(max_shared_lines: usize, max_blf_devices: usize) -> Self {
        Self {
            lines: vec![None; max_shared_lines],
            devices: vec![None; max_blf_devices],
        }
    }

    fn table(&self, kind: SubscriptionKind) -> &[Option<ActiveSlot>] {
        match kind {
            SubscriptionKind::LineAppearance => &self.lines,
            SubscriptionKind::DeviceMonitor => &self.devices,
        }
    }

    fn table_mut(&mut self, kind: SubscriptionKind) -> &mut [Option<ActiveSlot>] {
        match kind {
            SubscriptionKind::LineAppearance => &mut self.lines,
            SubscriptionKind::DeviceMonitor => &mut self.devices,
        }
    }

    pub fn get(&self, kind: SubscriptionKind, index: usize) -> Option<ActiveSlot> {
        self.table(kind).get(index).copied().flatten()
    }

    /// Fill a slot; out-of-range indexes are ignored
    pub fn set(&mut self, kind: SubscriptionKind, index: usize, slot: ActiveSlot) {
        if let Some(entry) = self.table_mut(kind).get_mut(index) {
            *entry = Some(slot);
        }
    }

    /// Empty the slot if it still holds `subscription`
    ///
    /// A slot already cleared or refilled by a newer subscription is left
    /// alone, which makes repeated cleanup a no-op.
    pub fn clear_if(&mut self, kind: SubscriptionKind, index: usize, subscription: SubscriptionId) -> bool {
        match self.table_mut(kind).get_mut(index) {
            Some(entry) if entry.map_or(false, |s| s.subscription == subscription) => {
                *entry = None;
                true
            }
            _ => false,
        }
    }

    pub fn active_count(&self, kind: SubscriptionKind) -> usize {
        self.table(kind).iter().filter(|s| s.is_some()).count()
    }
}
