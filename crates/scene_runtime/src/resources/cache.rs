//! Resource cache for one surface
//!
//! Owns every morph resource allocated on a surface, keyed by [`ResourceId`].
//! Creation is transactional: a resource is either fully allocated and
//! registered, or nothing it allocated survives. Resources are shared by key,
//! so an entry lives until its last user releases it or it is destroyed
//! explicitly.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::gpu::{AttributeChannel, BufferDescriptor, GpuContext};
use crate::resources::loader::CompletedLoad;
use crate::resources::{
    GeometryLoader, GeometrySource, LoadCompletion, LoadTicket, MorphGeometryData, MorphTarget,
    ResourceError, ResourceHandle, ResourceId,
};
use crate::surface::SurfaceId;

// Tickets are unique process-wide so one from a reset surface can never
// resolve against its replacement.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(0);

/// A cached morph resource
#[derive(Debug)]
pub struct ResourceEntry {
    id: ResourceId,
    keys: Vec<f32>,
    targets: Vec<MorphTarget>,
    users: usize,
}

impl ResourceEntry {
    /// Resource id
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Keyframe positions, one per target
    pub fn keys(&self) -> &[f32] {
        &self.keys
    }

    /// GPU-side targets in key order
    pub fn targets(&self) -> &[MorphTarget] {
        &self.targets
    }

    /// Number of nodes currently sharing this resource
    pub fn users(&self) -> usize {
        self.users
    }
}

/// Result of [`ResourceCache::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The resource is allocated and usable
    Ready(ResourceHandle),
    /// A streamed load is in flight; resolve the ticket on a later pass
    Pending(LoadTicket),
}

#[derive(Debug)]
struct PendingLoad {
    id: ResourceId,
}

/// Resource cache and lifecycle manager for one surface
pub struct ResourceCache {
    surface: SurfaceId,
    context: Rc<dyn GpuContext>,
    entries: HashMap<ResourceId, ResourceEntry>,
    id_prefix: String,
    next_id: u64,
    pending: HashMap<LoadTicket, PendingLoad>,
    finished: HashMap<LoadTicket, Result<ResourceId, ResourceError>>,
    completions: Sender<CompletedLoad>,
    inbox: Receiver<CompletedLoad>,
}

impl ResourceCache {
    /// Create an empty cache for a surface
    pub fn new(surface: SurfaceId, context: Rc<dyn GpuContext>, id_prefix: impl Into<String>) -> Self {
        let (completions, inbox) = mpsc::channel();
        Self {
            surface,
            context,
            entries: HashMap::new(),
            id_prefix: id_prefix.into(),
            next_id: 0,
            pending: HashMap::new(),
            finished: HashMap::new(),
            completions,
            inbox,
        }
    }

    /// Surface this cache belongs to
    pub fn surface(&self) -> &SurfaceId {
        &self.surface
    }

    /// Number of cached resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no resources
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a resource with this id is cached
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Look up a cached resource
    pub fn get(&self, id: &ResourceId) -> Option<&ResourceEntry> {
        self.entries.get(id)
    }

    /// Number of streamed loads not yet delivered
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn handle(&self, id: ResourceId) -> ResourceHandle {
        ResourceHandle {
            surface: self.surface.clone(),
            id,
        }
    }

    fn not_found(surface: &SurfaceId, id: &ResourceId) -> ResourceError {
        ResourceError::NotFound {
            surface: surface.clone(),
            id: id.clone(),
        }
    }

    fn generate_id(&mut self) -> ResourceId {
        loop {
            let candidate = ResourceId::new(format!("{}{}", self.id_prefix, self.next_id));
            self.next_id += 1;
            let reserved = self.pending.values().any(|load| load.id == candidate);
            if !reserved && !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Create a resource, or join an existing one with the same id
    ///
    /// With no id a fresh one unique to this surface is generated. Inline
    /// sources are allocated before this returns; streamed sources return
    /// [`CreateOutcome::Pending`] and are allocated when a later
    /// [`ResourceCache::poll_loads`] picks up the loader's result.
    pub fn create(
        &mut self,
        id: Option<ResourceId>,
        source: GeometrySource,
        loader: Option<&dyn GeometryLoader>,
    ) -> Result<CreateOutcome, ResourceError> {
        if let Some(existing) = id.as_ref().and_then(|id| self.entries.get_mut(id)) {
            existing.users += 1;
            log::debug!(
                "Reusing resource '{}' on surface '{}' ({} users)",
                existing.id, self.surface, existing.users
            );
            let id = existing.id.clone();
            return Ok(CreateOutcome::Ready(self.handle(id)));
        }

        let id = match id {
            Some(id) => id,
            None => self.generate_id(),
        };

        match source {
            GeometrySource::Inline(data) => {
                data.validate()?;
                self.insert(id.clone(), &data)?;
                Ok(CreateOutcome::Ready(self.handle(id)))
            }
            GeometrySource::Stream(stream) => {
                let loader = loader.ok_or_else(|| ResourceError::NoLoader(id.clone()))?;
                let ticket = LoadTicket(NEXT_TICKET.fetch_add(1, Ordering::Relaxed));

                log::debug!("Streaming resource '{}' from '{}' as {}", id, stream.uri, ticket);
                self.pending.insert(ticket, PendingLoad { id });
                loader.load(&stream, LoadCompletion::new(ticket, self.completions.clone()));
                Ok(CreateOutcome::Pending(ticket))
            }
        }
    }

    fn insert(&mut self, id: ResourceId, data: &MorphGeometryData) -> Result<(), ResourceError> {
        let targets = self.allocate_targets(&id, data)?;
        log::debug!(
            "Created resource '{}' on surface '{}' with {} targets",
            id, self.surface, targets.len()
        );
        self.entries.insert(
            id.clone(),
            ResourceEntry {
                id,
                keys: data.keys.clone(),
                targets,
                users: 1,
            },
        );
        Ok(())
    }

    /// Allocate every channel of every target, all or nothing
    fn allocate_targets(&self, id: &ResourceId, data: &MorphGeometryData) -> Result<Vec<MorphTarget>, ResourceError> {
        let mut targets: Vec<MorphTarget> = Vec::with_capacity(data.targets.len());

        for (index, target_data) in data.targets.iter().enumerate() {
            let mut target = MorphTarget::default();

            for channel in AttributeChannel::ALL {
                let Some(values) = target_data.channel(channel) else {
                    continue;
                };
                match self.context.allocate(&BufferDescriptor::vertex(channel, values)) {
                    Ok(buffer) => target.set(channel, buffer),
                    Err(source) => {
                        log::warn!(
                            "Allocation failed for resource '{}' target {} {}: {}; rolling back",
                            id, index, channel.name(), source
                        );
                        target.release();
                        for allocated in targets.into_iter().rev() {
                            allocated.release();
                        }
                        return Err(ResourceError::AllocationFailed {
                            id: id.clone(),
                            target: index,
                            channel: channel.name(),
                            source,
                        });
                    }
                }
            }
            targets.push(target);
        }
        Ok(targets)
    }

    /// Destroy a resource regardless of how many users share it
    ///
    /// Fails with [`ResourceError::NotFound`] if the id is not cached. When
    /// the surface context is already lost the GPU side is gone with it, so
    /// only the bookkeeping is dropped.
    pub fn destroy(&mut self, id: &ResourceId) -> Result<(), ResourceError> {
        let entry = self.entries.remove(id).ok_or_else(|| Self::not_found(&self.surface, id))?;
        self.release_entry(entry);
        Ok(())
    }

    /// Drop one user; destroys the resource when nobody uses it anymore
    ///
    /// Returns whether the resource was destroyed.
    pub fn release(&mut self, id: &ResourceId) -> Result<bool, ResourceError> {
        let entry = self.entries.get_mut(id).ok_or_else(|| Self::not_found(&self.surface, id))?;
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            log::debug!("Released resource '{}' ({} users left)", id, entry.users);
            return Ok(false);
        }
        self.destroy(id)?;
        Ok(true)
    }

    fn release_entry(&self, entry: ResourceEntry) {
        if self.context.is_lost() {
            log::warn!(
                "Surface '{}' is lost; dropping resource '{}' without GPU release",
                self.surface, entry.id
            );
            return;
        }
        log::debug!("Destroying resource '{}' on surface '{}'", entry.id, self.surface);
        for target in entry.targets {
            target.release();
        }
    }

    /// Destroy every cached resource and forget in-flight loads
    ///
    /// Returns the number of resources destroyed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        let entries: Vec<ResourceEntry> = self.entries.drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            self.release_entry(entry);
        }
        self.pending.clear();
        self.finished.clear();
        count
    }

    /// Apply every load result delivered since the last poll
    ///
    /// Results for cancelled tickets are dropped. Returns the number of
    /// resources that became ready.
    pub fn poll_loads(&mut self) -> usize {
        let mut ready = 0;
        while let Ok(CompletedLoad { ticket, result }) = self.inbox.try_recv() {
            let Some(PendingLoad { id }) = self.pending.remove(&ticket) else {
                log::debug!("Dropping result of cancelled {}", ticket);
                continue;
            };

            let outcome = match result {
                Ok(data) => self.adopt_loaded(id, &data),
                Err(reason) => {
                    log::warn!("Loading resource '{}' failed: {}", id, reason);
                    Err(ResourceError::LoadFailed { id, reason })
                }
            };
            if outcome.is_ok() {
                ready += 1;
            }
            self.finished.insert(ticket, outcome);
        }
        ready
    }

    fn adopt_loaded(&mut self, id: ResourceId, data: &MorphGeometryData) -> Result<ResourceId, ResourceError> {
        if let Some(existing) = self.entries.get_mut(&id) {
            existing.users += 1;
            return Ok(id);
        }
        data.validate()?;
        self.insert(id.clone(), data)?;
        Ok(id)
    }

    /// Collect the outcome of a finished load
    ///
    /// `None` while the load is still in flight (or for unknown tickets).
    /// Each finished ticket resolves exactly once.
    pub fn resolve(&mut self, ticket: LoadTicket) -> Option<Result<ResourceHandle, ResourceError>> {
        let outcome = self.finished.remove(&ticket)?;
        Some(outcome.map(|id| self.handle(id)))
    }

    /// Whether this cache issued the ticket and has not resolved it yet
    pub fn is_tracking(&self, ticket: LoadTicket) -> bool {
        self.pending.contains_key(&ticket) || self.finished.contains_key(&ticket)
    }

    /// Abandon a load; a result arriving later is dropped
    ///
    /// If the result already arrived but was never resolved, the user it
    /// registered is released again.
    pub fn cancel(&mut self, ticket: LoadTicket) -> bool {
        if self.pending.remove(&ticket).is_some() {
            log::debug!("Cancelled in-flight {}", ticket);
            return true;
        }
        match self.finished.remove(&ticket) {
            Some(Ok(id)) => {
                if let Err(error) = self.release(&id) {
                    log::warn!("Cancelling {} could not release '{}': {}", ticket, id, error);
                }
                true
            }
            Some(Err(_)) => true,
            None => false,
        }
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("surface", &self.surface)
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
