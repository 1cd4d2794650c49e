//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable key identifying one listener registration on the command bus
    pub struct SubscriptionKey;
}

/// Handle-based map for bus listener registrations
pub type ListenerMap<T> = SlotMap<SubscriptionKey, T>;
