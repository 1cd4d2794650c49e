//! Surface registry
//!
//! Owns the state of every activated surface and tracks which one is
//! current. The registry reacts to lifecycle events once attached to a
//! [`CommandBus`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::events::{CommandBus, Event, EventArg, EventKind, SubscriptionKey};
use crate::resources::{LoadTicket, ResourceError, ResourceHandle};
use crate::surface::{Surface, SurfaceId, SurfaceState};
use crate::CoreError;

/// Per-surface state for every activated surface
#[derive(Debug)]
pub struct SurfaceRegistry {
    surfaces: HashMap<SurfaceId, SurfaceState>,
    current: Option<SurfaceId>,
    id_prefix: String,
    stack_capacity: usize,
}

impl SurfaceRegistry {
    /// Create an empty registry
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            surfaces: HashMap::new(),
            current: None,
            id_prefix: config.resource_id_prefix.clone(),
            stack_capacity: config.initial_stack_capacity,
        }
    }

    /// Make a surface current, creating its state on first activation
    ///
    /// Activating a known surface keeps its state, unless the stored context
    /// was lost and the new one is live; then the old state is dropped
    /// without GPU release and rebuilt.
    pub fn on_surface_activated(&mut self, surface: Surface) {
        let id = surface.id().clone();
        let rebuild = self
            .surfaces
            .get(&id)
            .is_some_and(|state| state.surface.is_lost() && !surface.is_lost());

        if rebuild {
            if let Some(mut stale) = self.surfaces.remove(&id) {
                let dropped = stale.resources.clear();
                log::warn!("Surface '{}' was lost; rebuilding state ({} resources dropped)", id, dropped);
            }
        }

        if !self.surfaces.contains_key(&id) {
            log::info!("Creating state for surface '{}'", id);
            let state = SurfaceState::new(surface, &self.id_prefix, self.stack_capacity);
            self.surfaces.insert(id.clone(), state);
        }
        self.current = Some(id);
    }

    /// Destroy every cached resource on every surface and forget all state
    ///
    /// Returns the number of resources destroyed.
    pub fn on_reset(&mut self) -> usize {
        let mut destroyed = 0;
        for (id, mut state) in self.surfaces.drain() {
            let count = state.resources.clear();
            log::debug!("Reset surface '{}': {} resource(s) destroyed", id, count);
            destroyed += count;
        }
        self.current = None;
        log::info!("Framework reset: {} resource(s) destroyed", destroyed);
        destroyed
    }

    /// State of the current surface
    pub fn current(&self) -> Option<&SurfaceState> {
        self.current.as_ref().and_then(|id| self.surfaces.get(id))
    }

    /// Mutable state of the current surface
    pub fn current_mut(&mut self) -> Option<&mut SurfaceState> {
        let id = self.current.as_ref()?;
        self.surfaces.get_mut(id)
    }

    /// Id of the current surface
    pub fn current_id(&self) -> Option<&SurfaceId> {
        self.current.as_ref()
    }

    /// State of a specific surface
    pub fn surface(&self, id: &SurfaceId) -> Option<&SurfaceState> {
        self.surfaces.get(id)
    }

    /// Mutable state of a specific surface
    pub fn surface_mut(&mut self, id: &SurfaceId) -> Option<&mut SurfaceState> {
        self.surfaces.get_mut(id)
    }

    /// Number of surfaces with state
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Start a compile pass on the current surface
    ///
    /// Returns the current surface id and how many streamed resources became
    /// ready, or `None` without a current surface.
    pub fn begin_compile_pass(&mut self) -> Option<(SurfaceId, usize)> {
        let state = self.current_mut()?;
        let loaded = state.begin_pass();
        Some((state.id().clone(), loaded))
    }

    /// Finish a compile pass on the current surface
    ///
    /// # Panics
    /// Panics if a traversal stack is unbalanced.
    pub fn end_compile_pass(&self) {
        if let Some(state) = self.current() {
            state.end_pass();
        }
    }

    /// Destroy a resource through its handle
    ///
    /// A handle whose surface was removed or lost refers to bookkeeping that
    /// is already gone, so this is a silent no-op for it.
    pub fn destroy_resource(&mut self, handle: &ResourceHandle) -> Result<(), ResourceError> {
        let Some(state) = self.surfaces.get_mut(&handle.surface) else {
            log::warn!("Ignoring destroy of '{}': surface '{}' is gone", handle.id, handle.surface);
            return Ok(());
        };
        if state.surface.is_lost() {
            log::warn!("Ignoring destroy of '{}': surface '{}' is lost", handle.id, handle.surface);
            if state.resources.contains(&handle.id) {
                state.resources.destroy(&handle.id)?;
            }
            return Ok(());
        }
        state.resources.destroy(&handle.id)
    }

    /// Drop one user of a resource; returns whether it was destroyed
    ///
    /// Removed and lost surfaces are treated like in
    /// [`Self::destroy_resource`]: a missing id there is not an error.
    pub fn release_resource(&mut self, handle: &ResourceHandle) -> Result<bool, ResourceError> {
        let Some(state) = self.surfaces.get_mut(&handle.surface) else {
            log::warn!("Ignoring release of '{}': surface '{}' is gone", handle.id, handle.surface);
            return Ok(false);
        };
        if state.surface.is_lost() && !state.resources.contains(&handle.id) {
            log::warn!("Ignoring release of '{}': surface '{}' is lost", handle.id, handle.surface);
            return Ok(false);
        }
        state.resources.release(&handle.id)
    }

    /// Abandon a streamed load on a surface
    pub fn cancel_load(&mut self, surface: &SurfaceId, ticket: LoadTicket) -> bool {
        self.surfaces
            .get_mut(surface)
            .is_some_and(|state| state.resources.cancel(ticket))
    }

    /// Subscribe a shared registry to the lifecycle events it handles
    pub fn attach(registry: &Rc<RefCell<Self>>, bus: &CommandBus) -> Vec<SubscriptionKey> {
        let on_activated = Rc::clone(registry);
        let on_reset = Rc::clone(registry);
        let on_compile_begin = Rc::clone(registry);
        let on_compile_end = Rc::clone(registry);

        vec![
            bus.subscribe(EventKind::SurfaceActivated, move |_, event| {
                let surface = event
                    .get_surface()
                    .cloned()
                    .ok_or_else(|| CoreError::Listener("surface activation without a surface".into()))?;
                on_activated.borrow_mut().on_surface_activated(surface);
                Ok(())
            }),
            bus.subscribe(EventKind::FrameworkReset, move |_, event| {
                let destroyed = on_reset.borrow_mut().on_reset();
                event.set_arg("count", EventArg::Count(destroyed));
                Ok(())
            }),
            bus.subscribe(EventKind::CompileBegin, move |bus, _| {
                let begun = on_compile_begin.borrow_mut().begin_compile_pass();
                match begun {
                    Some((surface, loaded)) if loaded > 0 => {
                        log::debug!("{} streamed resource(s) ready on '{}'", loaded, surface);
                        let event = Event::new()
                            .with_arg("surface_id", EventArg::SurfaceId(surface))
                            .with_arg("count", EventArg::Count(loaded));
                        bus.publish(EventKind::RecompileRequested, event).map(|_| ())
                    }
                    _ => Ok(()),
                }
            }),
            bus.subscribe(EventKind::CompileEnd, move |_, _| {
                on_compile_end.borrow().end_compile_pass();
                Ok(())
            }),
        ]
    }
}
