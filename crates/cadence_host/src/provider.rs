// provider.rs - Snapshot providers and leases
//
// A provider turns point-in-time world state into an acquirable read view.
// The closed variant set mirrors the four strategies: the live world
// (Direct), a persistent dirty-synced replica, an on-demand pool, and a
// shared convoy mirror. Views are leased: every lease carries a hard expiry
// and an invalidation flag, and a view whose lease has ended refuses reads
// with `StaleView`.

use crate::error::HostError;
use cadence_core::{ComponentMask, SchemaSetup, SyncOptions, World};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

/// Pool and lease tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderTuning {
    /// Mirror worlds pre-created per on-demand pool.
    pub on_demand_initial_pool: u32,
    /// Mirror worlds pre-created in the shared pool convoys draw from.
    pub shared_pool_warmup: u32,
    /// Hard lease expiry applied to every acquired view.
    pub hard_lease_expiry_ms: u32,
}

impl Default for ProviderTuning {
    fn default() -> Self {
        Self {
            on_demand_initial_pool: 5,
            shared_pool_warmup: 10,
            hard_lease_expiry_ms: 2000,
        }
    }
}

/// Lease bookkeeping shared between the host and the view it handed out.
pub struct LeaseState {
    invalidated: AtomicBool,
    expires_at: Instant,
}

impl LeaseState {
    fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            invalidated: AtomicBool::new(false),
            expires_at: Instant::now() + ttl,
        })
    }

    /// Force-expire (timeout path); subsequent reads fail with StaleView.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn is_expired(&self) -> bool {
        self.invalidated.load(Ordering::Acquire) || Instant::now() >= self.expires_at
    }
}

/// A leased, read-only view of a mirror world.
pub struct SnapshotView {
    world: Arc<RwLock<World>>,
    lease: Arc<LeaseState>,
}

impl SnapshotView {
    /// Lock the view for reading. Fails once the lease has expired or was
    /// force-invalidated.
    pub fn read(&self) -> Result<WorldGuard<'_>, HostError> {
        if self.lease.is_expired() {
            return Err(HostError::StaleView);
        }
        Ok(WorldGuard(self.world.read().unwrap()))
    }

    pub fn lease(&self) -> &Arc<LeaseState> {
        &self.lease
    }

    pub(crate) fn world_handle(&self) -> Arc<RwLock<World>> {
        Arc::clone(&self.world)
    }
}

impl std::fmt::Debug for SnapshotView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotView")
            .field("expired", &self.lease.is_expired())
            .finish()
    }
}

/// Read guard dereferencing to the mirrored world.
pub struct WorldGuard<'a>(RwLockReadGuard<'a, World>);

impl std::ops::Deref for WorldGuard<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        &self.0
    }
}

impl std::fmt::Debug for WorldGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldGuard").finish_non_exhaustive()
    }
}

fn new_mirror(schema: &SchemaSetup) -> Arc<RwLock<World>> {
    let mut world = World::from_schema(schema);
    world.set_read_only(true);
    Arc::new(RwLock::new(world))
}

fn sync_mirror(mirror: &RwLock<World>, live: &World, mask: &ComponentMask) {
    let options = SyncOptions {
        mask: Some(*mask),
        ..Default::default()
    };
    mirror.write().unwrap().sync_from(live, &options);
}

/// Pool of spare mirror worlds shared by the convoy providers of one host.
pub struct SharedMirrorPool {
    schema: SchemaSetup,
    free: Vec<Arc<RwLock<World>>>,
}

impl SharedMirrorPool {
    pub fn new(schema: SchemaSetup, warmup: u32) -> Self {
        let free = (0..warmup).map(|_| new_mirror(&schema)).collect();
        Self { schema, free }
    }

    fn take(&mut self) -> Arc<RwLock<World>> {
        self.free.pop().unwrap_or_else(|| new_mirror(&self.schema))
    }

    fn put(&mut self, mirror: Arc<RwLock<World>>) {
        let pinned = match mirror.try_write() {
            Ok(mut world) => {
                world.soft_clear();
                false
            }
            Err(_) => true,
        };
        if pinned {
            // A zombie reader still pins this mirror; let the Arc drop once
            // the reader finishes instead of blocking the orchestrator.
            tracing::warn!("convoy mirror still pinned at release; dropping it");
        } else {
            self.free.push(mirror);
        }
    }
}

/// Persistent replica (GDB): one mirror kept across frames, refreshed at the
/// frame sync point by dirty-chunk copy.
pub struct PersistentReplica {
    mirror: Arc<RwLock<World>>,
    mask: ComponentMask,
}

impl PersistentReplica {
    pub fn new(schema: &SchemaSetup, mask: ComponentMask) -> Self {
        Self {
            mirror: new_mirror(schema),
            mask,
        }
    }

    fn update(&mut self, live: &World) {
        // A zombie reader can pin the mirror past its frame; skip the
        // refresh rather than stall the orchestrator.
        match self.mirror.try_write() {
            Ok(mut world) => {
                let options = SyncOptions {
                    mask: Some(self.mask),
                    ..Default::default()
                };
                world.sync_from(live, &options);
            }
            Err(_) => tracing::warn!("replica pinned by a reader; skipping this frame's sync"),
        }
    }
}

/// On-demand pool (SoD): a free stack of mirrors, synced at acquisition,
/// soft-cleared at release.
pub struct OnDemandPool {
    schema: SchemaSetup,
    mask: ComponentMask,
    free: Vec<Arc<RwLock<World>>>,
    outstanding: usize,
    /// None = grow without bound.
    capacity: Option<usize>,
}

impl OnDemandPool {
    pub fn new(schema: SchemaSetup, mask: ComponentMask, initial: u32) -> Self {
        let free = (0..initial).map(|_| new_mirror(&schema)).collect();
        Self {
            schema,
            mask,
            free,
            outstanding: 0,
            capacity: None,
        }
    }

    /// Cap the total number of mirrors; acquisition past the cap fails with
    /// `PoolExhausted`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    fn acquire(&mut self, live: &World) -> Result<Arc<RwLock<World>>, HostError> {
        let mirror = match self.free.pop() {
            Some(mirror) => mirror,
            None => {
                if let Some(capacity) = self.capacity {
                    if self.outstanding >= capacity {
                        return Err(HostError::PoolExhausted);
                    }
                }
                new_mirror(&self.schema)
            }
        };
        sync_mirror(&mirror, live, &self.mask);
        self.outstanding += 1;
        Ok(mirror)
    }

    fn release(&mut self, mirror: Arc<RwLock<World>>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let pinned = match mirror.try_write() {
            Ok(mut world) => {
                world.soft_clear();
                false
            }
            Err(_) => true,
        };
        if pinned {
            tracing::warn!("snapshot mirror still pinned at release; dropping it");
        } else {
            self.free.push(mirror);
        }
    }
}

/// Shared convoy: one pooled mirror serving every consumer in a policy
/// group. The first acquire of a frame syncs it; later acquires share it;
/// the last release returns it to the shared pool.
pub struct ConvoyProvider {
    pool: Arc<Mutex<SharedMirrorPool>>,
    mask: ComponentMask,
    current: Option<Arc<RwLock<World>>>,
    active_readers: usize,
    synced_version: u64,
}

impl ConvoyProvider {
    pub fn new(pool: Arc<Mutex<SharedMirrorPool>>, mask: ComponentMask) -> Self {
        Self {
            pool,
            mask,
            current: None,
            active_readers: 0,
            synced_version: 0,
        }
    }

    fn acquire(&mut self, live: &World) -> Arc<RwLock<World>> {
        let mirror = match &self.current {
            Some(mirror) => Arc::clone(mirror),
            None => {
                let mirror = self.pool.lock().unwrap().take();
                self.current = Some(Arc::clone(&mirror));
                self.synced_version = 0;
                mirror
            }
        };
        if self.synced_version < live.global_version() {
            sync_mirror(&mirror, live, &self.mask);
            self.synced_version = live.global_version();
        }
        self.active_readers += 1;
        mirror
    }

    fn release(&mut self) {
        self.active_readers = self.active_readers.saturating_sub(1);
        if self.active_readers == 0 {
            if let Some(mirror) = self.current.take() {
                self.pool.lock().unwrap().put(mirror);
            }
            self.synced_version = 0;
        }
    }
}

/// The closed provider family.
pub enum SnapshotProvider {
    /// The live world itself; synchronous consumers only, no lease.
    Direct,
    Persistent(PersistentReplica),
    OnDemand(OnDemandPool),
    SharedConvoy(ConvoyProvider),
}

impl SnapshotProvider {
    /// Frame sync point (orchestrator). Only the persistent replica
    /// refreshes here; pools sync at acquisition.
    pub fn update(&mut self, live: &World) {
        if let SnapshotProvider::Persistent(replica) = self {
            replica.update(live);
        }
    }

    /// Lease a view. `Direct` has no lease machinery; the host runs those
    /// modules inline against the live world.
    pub fn acquire(&mut self, live: &World, ttl: Duration) -> Result<SnapshotView, HostError> {
        let world = match self {
            SnapshotProvider::Direct => {
                unreachable!("Direct strategy modules run inline without a view")
            }
            SnapshotProvider::Persistent(replica) => Arc::clone(&replica.mirror),
            SnapshotProvider::OnDemand(pool) => pool.acquire(live)?,
            SnapshotProvider::SharedConvoy(convoy) => convoy.acquire(live),
        };
        Ok(SnapshotView {
            world,
            lease: LeaseState::new(ttl),
        })
    }

    /// Return a leased view's mirror.
    pub fn release(&mut self, world: Arc<RwLock<World>>) {
        match self {
            SnapshotProvider::Direct | SnapshotProvider::Persistent(_) => {}
            SnapshotProvider::OnDemand(pool) => pool.release(world),
            SnapshotProvider::SharedConvoy(convoy) => {
                drop(world);
                convoy.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};
    use cadence_core::define_component;

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Marker {
        v: u32,
    }
    define_component!(Marker, "Marker");

    fn live_world() -> World {
        let mut world = World::new();
        world.register_component::<Marker>().unwrap();
        let e = world.create_entity().unwrap();
        world.add_component(e, Marker { v: 7 }).unwrap();
        world
    }

    fn full_mask(world: &World) -> ComponentMask {
        world.registry().iter().map(|info| info.id).collect()
    }

    const TTL: Duration = Duration::from_secs(2);

    #[test]
    fn persistent_replica_tracks_live_changes() {
        let mut live = live_world();
        let mask = full_mask(&live);
        let mut provider =
            SnapshotProvider::Persistent(PersistentReplica::new(&live.schema(), mask));

        provider.update(&live);
        let view = provider.acquire(&live, TTL).unwrap();
        {
            let guard = view.read().unwrap();
            let found: Vec<_> = guard.query().with::<Marker>().iter().collect();
            assert_eq!(found.len(), 1);
            assert_eq!(guard.get_component::<Marker>(found[0]).unwrap().v, 7);
        }

        // Mutate live, refresh, and observe through a fresh view.
        live.tick();
        let e = live.query().with::<Marker>().iter().next().unwrap();
        live.set_component(e, Marker { v: 8 }).unwrap();
        provider.update(&live);
        let view = provider.acquire(&live, TTL).unwrap();
        assert_eq!(view.read().unwrap().get_component::<Marker>(e).unwrap().v, 8);
    }

    #[test]
    fn on_demand_pool_recycles_mirrors() {
        let live = live_world();
        let mask = full_mask(&live);
        let mut provider = SnapshotProvider::OnDemand(OnDemandPool::new(
            live.schema(),
            mask,
            1,
        ));

        let view = provider.acquire(&live, TTL).unwrap();
        let handle = view.world_handle();
        assert_eq!(
            view.read().unwrap().query().with::<Marker>().iter().count(),
            1
        );
        drop(view);
        provider.release(handle);

        // The recycled mirror resyncs fresh state at the next acquisition.
        let view = provider.acquire(&live, TTL).unwrap();
        assert_eq!(
            view.read().unwrap().query().with::<Marker>().iter().count(),
            1
        );
    }

    #[test]
    fn capped_pool_reports_exhaustion() {
        let live = live_world();
        let mask = full_mask(&live);
        let mut provider = SnapshotProvider::OnDemand(
            OnDemandPool::new(live.schema(), mask, 1).with_capacity(1),
        );

        let first = provider.acquire(&live, TTL).unwrap();
        assert_eq!(
            provider.acquire(&live, TTL).unwrap_err(),
            HostError::PoolExhausted
        );
        let handle = first.world_handle();
        drop(first);
        provider.release(handle);
        assert!(provider.acquire(&live, TTL).is_ok());
    }

    #[test]
    fn convoy_syncs_once_per_frame_and_shares() {
        let mut live = live_world();
        let mask = full_mask(&live);
        let pool = Arc::new(Mutex::new(SharedMirrorPool::new(live.schema(), 2)));
        let mut provider = SnapshotProvider::SharedConvoy(ConvoyProvider::new(pool, mask));

        let a = provider.acquire(&live, TTL).unwrap();
        let b = provider.acquire(&live, TTL).unwrap();
        // Same mirror world behind both views.
        assert!(Arc::ptr_eq(&a.world_handle(), &b.world_handle()));

        let (ha, hb) = (a.world_handle(), b.world_handle());
        drop((a, b));
        provider.release(ha);
        provider.release(hb);

        // Next frame acquires resync.
        live.tick();
        let e = live.query().with::<Marker>().iter().next().unwrap();
        live.set_component(e, Marker { v: 42 }).unwrap();
        let view = provider.acquire(&live, TTL).unwrap();
        assert_eq!(
            view.read().unwrap().get_component::<Marker>(e).unwrap().v,
            42
        );
    }

    #[test]
    fn expired_lease_refuses_reads() {
        let live = live_world();
        let mask = full_mask(&live);
        let mut provider =
            SnapshotProvider::Persistent(PersistentReplica::new(&live.schema(), mask));
        provider.update(&live);

        let view = provider.acquire(&live, TTL).unwrap();
        assert!(view.read().is_ok());
        view.lease().invalidate();
        assert_eq!(view.read().unwrap_err(), HostError::StaleView);

        // Zero-ttl lease expires on its own.
        let view = provider.acquire(&live, Duration::ZERO).unwrap();
        assert_eq!(view.read().unwrap_err(), HostError::StaleView);
    }
}
