//! Command bus for renderer lifecycle events
//!
//! Key principles:
//! - Closed set of event kinds with stable numeric ids
//! - Key-value arguments (no order dependency)
//! - Listeners run synchronously in priority order, ties in registration order
//! - Nested publishing from inside a listener runs to completion first
//! - The first listener error aborts the dispatch and reaches the publisher

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::foundation::collections::ListenerMap;
use crate::resources::ResourceId;
use crate::scene::NodeId;
use crate::surface::{Surface, SurfaceId};
use crate::CoreResult;

pub use crate::foundation::collections::SubscriptionKey;

/// Lifecycle moments observable on the bus
///
/// Discriminants are part of the public contract. New kinds are appended,
/// existing ones are never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum EventKind {
    /// Runtime constructed and all core subscribers attached
    FrameworkInit = 0,
    /// Global teardown of every surface and cached resource
    FrameworkReset = 1,
    /// A surface became current; payload `surface`
    SurfaceActivated = 2,
    /// A full-tree compile pass is starting; payload `frame`
    CompileBegin = 3,
    /// A full-tree compile pass finished; payload `frame`
    CompileEnd = 4,
    /// A frame is about to be rendered; payload `frame`
    RenderBegin = 5,
    /// A frame finished rendering; payload `frame`
    RenderEnd = 6,
    /// Streamed resources became ready and the tree should be compiled again;
    /// payload `surface_id`, `count`
    RecompileRequested = 7,
}

impl EventKind {
    /// Stable numeric identifier of this kind
    pub const fn id(self) -> u16 {
        self as u16
    }
}

/// Variant for type-safe event arguments
#[derive(Debug, Clone)]
pub enum EventArg {
    /// Rendering surface handle
    Surface(Surface),
    /// Rendering surface identifier
    SurfaceId(SurfaceId),
    /// Scene node identifier
    Node(NodeId),
    /// Resource identifier
    Resource(ResourceId),
    /// Frame counter
    Frame(u64),
    /// Generic count
    Count(usize),
}

/// Event payload with key-value arguments
///
/// Listeners treat arguments as read-only except where a kind documents a
/// mutable field; those are updated through [`Event::set_arg`].
#[derive(Debug, Clone)]
pub struct Event {
    args: HashMap<&'static str, EventArg>,
}

impl Event {
    /// Create an empty payload
    pub fn new() -> Self {
        Self { args: HashMap::new() }
    }

    /// Add an argument to the event (builder pattern)
    pub fn with_arg(mut self, key: &'static str, value: EventArg) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Replace an argument on an in-flight event
    pub fn set_arg(&mut self, key: &'static str, value: EventArg) {
        self.args.insert(key, value);
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&EventArg> {
        self.args.get(key)
    }

    /// Whether the payload has no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Get `surface` argument if present
    pub fn get_surface(&self) -> Option<&Surface> {
        if let Some(EventArg::Surface(surface)) = self.get_arg("surface") {
            Some(surface)
        } else {
            None
        }
    }

    /// Get `surface_id` argument if present
    pub fn get_surface_id(&self) -> Option<&SurfaceId> {
        if let Some(EventArg::SurfaceId(id)) = self.get_arg("surface_id") {
            Some(id)
        } else {
            None
        }
    }

    /// Get `frame` argument if present
    pub fn get_frame(&self) -> Option<u64> {
        if let Some(EventArg::Frame(frame)) = self.get_arg("frame") {
            Some(*frame)
        } else {
            None
        }
    }

    /// Get `count` argument if present
    pub fn get_count(&self) -> Option<usize> {
        if let Some(EventArg::Count(count)) = self.get_arg("count") {
            Some(*count)
        } else {
            None
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener callback
///
/// Receives the bus so it can publish nested events.
pub type Listener = Rc<dyn Fn(&CommandBus, &mut Event) -> CoreResult<()>>;

struct Registration {
    kind: EventKind,
    priority: i32,
    sequence: u64,
    callback: Listener,
}

#[derive(Default)]
struct BusState {
    registrations: ListenerMap<Registration>,
    by_kind: HashMap<EventKind, Vec<SubscriptionKey>>,
    next_sequence: u64,
}

/// Synchronous, priority-ordered publish/subscribe registry
///
/// The bus uses interior mutability so listeners holding `&CommandBus` can
/// subscribe, unsubscribe and publish while a dispatch is running. Each
/// dispatch iterates a snapshot taken when it started, so those changes only
/// affect later dispatches.
#[derive(Default)]
pub struct CommandBus {
    state: RefCell<BusState>,
}

impl CommandBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener with the default priority
    ///
    /// The default priority is the number of listeners already registered for
    /// `kind`, which keeps plain registrations in insertion order.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionKey
    where
        F: Fn(&Self, &mut Event) -> CoreResult<()> + 'static,
    {
        let priority = i32::try_from(self.listener_count(kind)).unwrap_or(i32::MAX);
        self.subscribe_with_priority(kind, priority, callback)
    }

    /// Register a listener at an explicit priority (lower runs first)
    pub fn subscribe_with_priority<F>(&self, kind: EventKind, priority: i32, callback: F) -> SubscriptionKey
    where
        F: Fn(&Self, &mut Event) -> CoreResult<()> + 'static,
    {
        let mut state = self.state.borrow_mut();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let key = state.registrations.insert(Registration {
            kind,
            priority,
            sequence,
            callback: Rc::new(callback),
        });

        let BusState { registrations, by_kind, .. } = &mut *state;
        let keys = by_kind.entry(kind).or_default();
        // Stable position: after every registration with priority <= ours.
        let position = keys.partition_point(|existing| {
            registrations
                .get(*existing)
                .is_some_and(|r| (r.priority, r.sequence) <= (priority, sequence))
        });
        keys.insert(position, key);

        log::debug!("Subscribed listener to {:?} at priority {}", kind, priority);
        key
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, key: SubscriptionKey) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(registration) = state.registrations.remove(key) else {
            return false;
        };
        if let Some(keys) = state.by_kind.get_mut(&registration.kind) {
            keys.retain(|existing| *existing != key);
        }
        log::debug!("Unsubscribed listener from {:?}", registration.kind);
        true
    }

    /// Number of listeners currently registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.state
            .borrow()
            .by_kind
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Publish an event with an empty payload
    pub fn publish_empty(&self, kind: EventKind) -> CoreResult<()> {
        self.publish(kind, Event::new()).map(|_| ())
    }

    /// Invoke every listener registered for `kind`, in priority order
    ///
    /// Returns the payload after all listeners ran so publishers can read
    /// fields listeners were allowed to update. Stops at the first listener
    /// error and returns it.
    pub fn publish(&self, kind: EventKind, mut event: Event) -> CoreResult<Event> {
        let listeners = self.snapshot(kind);
        log::trace!("Publishing {:?} to {} listener(s)", kind, listeners.len());

        for listener in listeners {
            listener(self, &mut event)?;
        }
        Ok(event)
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        let state = self.state.borrow();
        state
            .by_kind
            .get(&kind)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| state.registrations.get(*key))
                    .map(|registration| Rc::clone(&registration.callback))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("CommandBus")
            .field("listeners", &state.registrations.len())
            .finish()
    }
}
