//! Actor manager: owns every live actor and drives the fixed-step loop.
//!
//! One [`ActorManager::tick`] does the main-thread bookkeeping (sleep state,
//! input delivery, link toggles, command forwarding) and then hands a single
//! physics batch to a worker thread. The batch is joined at the start of the
//! next tick, or by any query that needs the actors. Inside the batch every
//! actor runs substep `k` before any actor starts substep `k + 1`; the
//! inter-actor passes (remote beams, foreign slidenodes, foreign contacts)
//! run between substeps.
//!
//! When the `parallel` feature is enabled, per-actor work fans out over a
//! bounded rayon pool of [`SimConfig::worker_threads`] threads; without it
//! the same passes run sequentially.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sim_core::{ActorManager, ActorSpawnRequest, Collaborators};
//! use sim_types::{FlatTerrain, SimConfig};
//!
//! let doc = Arc::new(sim_truck::load(&text)?.document);
//! let collab = Collaborators::default().with_terrain(Arc::new(FlatTerrain::new(0.0)));
//! let mut manager = ActorManager::new(SimConfig::default(), collab)?;
//! let id = manager.spawn(doc, ActorSpawnRequest::at(Vec3::new(0.0, 1.0, 0.0)))?;
//! manager.tick(1.0 / 60.0, Some(id));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use hashbrown::{HashMap, HashSet};
use sim_truck::Document;
use sim_types::{
    ActorId, Aabb, InputEvent, InputSource, LogSink, NullInput, NullSound, NullTerrain, Severity,
    SimConfig, SoundSink, TerrainQuery, TracingLog, Vec3,
};
use tracing::{debug, info, trace, warn};

use crate::actor::{Actor, ActorState, ResetKind, StepContext};
use crate::beam::Extension;
use crate::collision::{inter_actor_collisions, ForeignActor, ForeignHit, PointRef};
use crate::engine::EngineAttribute;
use crate::export::{export_actor, ExportOptions};
use crate::error::{Result, SimError, SpawnError};
use crate::links::{release_links_to, LinkTarget, LockWorld};
use crate::net::{light, ActorStreamUpdate};
use crate::node::Node;
use crate::slidenode::RailRef;
use crate::spawner::{spawn_actor, ActorSpawnRequest};

/// Light bits a hooked trailer keeps for itself.
pub const NO_IMPORT_LIGHTS: u32 = light::BEACONS
    | light::custom(1)
    | light::custom(2)
    | light::custom(3)
    | light::custom(4)
    | light::custom(5)
    | light::custom(6)
    | light::custom(7)
    | light::custom(8)
    | light::custom(9)
    | light::custom(10);

// ==================== Collaborators ====================

/// Services the simulation consumes from its host.
pub struct Collaborators {
    /// Ground and water heights.
    pub terrain: Arc<dyn TerrainQuery>,
    /// Sound triggers and modulation.
    pub sound: Arc<dyn SoundSink>,
    /// Per-actor input events, polled once per tick.
    pub input: Box<dyn InputSource>,
    /// User-visible console.
    pub log: Arc<dyn LogSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            terrain: Arc::new(NullTerrain),
            sound: Arc::new(NullSound),
            input: Box::new(NullInput),
            log: Arc::new(TracingLog),
        }
    }
}

impl Collaborators {
    /// Replace the terrain.
    #[must_use]
    pub fn with_terrain(mut self, terrain: Arc<dyn TerrainQuery>) -> Self {
        self.terrain = terrain;
        self
    }

    /// Replace the sound sink.
    #[must_use]
    pub fn with_sound(mut self, sound: Arc<dyn SoundSink>) -> Self {
        self.sound = sound;
        self
    }

    /// Replace the input source.
    #[must_use]
    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.input = input;
        self
    }

    /// Replace the console.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ==================== Public records ====================

/// Identity of an inter-actor beam: owning actor and index in its beam array.
pub type BeamKey = (ActorId, usize);

/// A beam joining nodes of two different actors.
///
/// The beam record itself lives in the owner's array; the manager keeps this
/// entry so both ends can be found and the last coupling force queried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterActorBeam {
    /// Actor whose beam array holds the record.
    pub owner: ActorId,
    /// Index in the owner's beam array.
    pub beam: usize,
    /// Owner-side node.
    pub node: usize,
    /// Node held in the other actor.
    pub target: LinkTarget,
    /// Force on the owner node during the last substep; the target node
    /// received its negation.
    pub force: Vec3,
}

/// Runtime tunables reachable through [`ActorManager::set_sim_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAttribute {
    /// An engine or gearbox tunable.
    Engine(EngineAttribute),
    /// Traction control slip ratio.
    TcRatio,
    /// Traction control pulse period (s).
    TcPulseTime,
    /// Anti-lock brake slip ratio.
    AlbRatio,
    /// Anti-lock brake pulse period (s).
    AlbPulseTime,
    /// Speed below which the anti-lock brake stays out (m/s).
    AlbMinSpeed,
    /// Service brake force.
    BrakeForce,
    /// Parking brake force.
    HandbrakeForce,
}

// ==================== Batch ====================

struct BatchJob {
    config: SimConfig,
    terrain: Arc<dyn TerrainQuery>,
    sound: Arc<dyn SoundSink>,
    player: Option<ActorId>,
    steps: usize,
    #[cfg(feature = "parallel")]
    pool: Arc<rayon::ThreadPool>,
}

struct BatchOutput {
    actors: Vec<Actor>,
    beam_forces: Vec<(BeamKey, Vec3)>,
    frame_dt: f64,
}

impl BatchJob {
    fn run(self, actors: Vec<Actor>) -> BatchOutput {
        #[cfg(feature = "parallel")]
        {
            let pool = Arc::clone(&self.pool);
            pool.install(|| self.run_steps(actors))
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.run_steps(actors)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn run_steps(&self, mut actors: Vec<Actor>) -> BatchOutput {
        let dt = self.config.physics_dt;
        let frame_dt = self.steps as f64 * dt;
        let mut beam_forces = HashMap::new();
        for step in 0..self.steps {
            let ctx = StepContext {
                config: &self.config,
                terrain: &*self.terrain,
                sound: &*self.sound,
                do_update: step + 1 == self.steps,
                frame_dt,
                player: self.player,
            };
            if actors.len() > 1 {
                follow_foreign_ropes(&mut actors);
            }
            for_each_actor(&mut actors, |a| a.substep(&ctx));
            if actors.len() > 1 {
                couple_remote_beams(&mut actors, &mut beam_forces);
                pull_foreign_slidenodes(&mut actors, dt);
                foreign_contacts(&mut actors, dt);
            }
        }
        BatchOutput {
            actors,
            beam_forces: beam_forces.into_iter().collect(),
            frame_dt,
        }
    }
}

/// Run `f` on every actor, in parallel when enabled.
fn for_each_actor<F>(actors: &mut [Actor], f: F)
where
    F: Fn(&mut Actor) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
        actors.par_iter_mut().for_each(f);
    }

    #[cfg(not(feature = "parallel"))]
    {
        actors.iter_mut().for_each(f);
    }
}

/// Map every actor to a value, in parallel when enabled.
fn map_actors<T, F>(actors: &mut [Actor], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&mut Actor) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
        actors.par_iter_mut().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        actors.iter_mut().map(f).collect()
    }
}

fn slot_map(actors: &[Actor]) -> HashMap<ActorId, usize> {
    actors.iter().enumerate().map(|(i, a)| (a.id, i)).collect()
}

/// Two distinct actors borrowed mutably at once.
fn pair_mut(actors: &mut [Actor], i: usize, j: usize) -> Option<(&mut Actor, &mut Actor)> {
    if i == j || i >= actors.len() || j >= actors.len() {
        return None;
    }
    if i < j {
        let (left, right) = actors.split_at_mut(j);
        Some((&mut left[i], &mut right[0]))
    } else {
        let (left, right) = actors.split_at_mut(i);
        Some((&mut right[0], &mut left[j]))
    }
}

/// Node positions and velocities of every actor.
fn kinematics(actors: &[Actor]) -> Vec<Vec<(Vec3, Vec3)>> {
    actors
        .iter()
        .map(|a| a.nodes.iter().map(|n| (n.position, n.velocity)).collect())
        .collect()
}

fn has_remote_beams(actor: &Actor) -> bool {
    actor.beams.iter().any(|b| b.remote.is_some() && !b.disabled)
}

// ---- inter-actor passes ----

/// Move rope ends locked onto another actor's ropable.
fn follow_foreign_ropes(actors: &mut [Actor]) {
    let foreign = |a: &Actor| {
        a.ropes
            .iter()
            .any(|r| r.target.is_some_and(|(t, _)| t.actor != a.id))
    };
    if !actors.iter().any(foreign) {
        return;
    }
    let slots = slot_map(actors);
    let kin = kinematics(actors);
    for actor in actors.iter_mut() {
        let own = actor.id;
        for rope in &actor.ropes {
            let Some((target, _)) = rope.target else {
                continue;
            };
            if target.actor == own {
                continue;
            }
            let Some(&(p, v)) = slots
                .get(&target.actor)
                .and_then(|&s| kin[s].get(target.node.index()))
            else {
                continue;
            };
            if let Some(end) = actor.nodes.get_mut(rope.end) {
                end.position = p;
                end.velocity = v;
            }
        }
    }
}

struct Owed {
    key: BeamKey,
    target: LinkTarget,
    force: Vec3,
}

/// Resolve every beam whose far end lives in another actor.
///
/// Each owner reads a snapshot of the other actors and pushes its own end;
/// the equal and opposite force on the far end is applied afterwards.
fn couple_remote_beams(actors: &mut [Actor], forces: &mut HashMap<BeamKey, Vec3>) {
    if !actors.iter().any(has_remote_beams) {
        return;
    }
    let slots = slot_map(actors);
    let kin = kinematics(actors);
    let owed: Vec<Vec<Owed>> = map_actors(actors, |a| {
        if !has_remote_beams(a) || a.state == ActorState::Disposed {
            return Vec::new();
        }
        resolve_remote_beams(a, &kin, &slots)
    });
    for o in owed.into_iter().flatten() {
        forces.insert(o.key, o.force);
        let Some(&s) = slots.get(&o.target.actor) else {
            continue;
        };
        if let Some(n) = actors[s].nodes.get_mut(o.target.node.index()) {
            n.forces -= o.force;
        }
    }
}

fn resolve_remote_beams(
    actor: &mut Actor,
    kin: &[Vec<(Vec3, Vec3)>],
    slots: &HashMap<ActorId, usize>,
) -> Vec<Owed> {
    let mut owed = Vec::new();
    for i in 0..actor.beams.len() {
        let beam = &actor.beams[i];
        let Some(other) = beam.remote else {
            continue;
        };
        if beam.disabled {
            continue;
        }
        let (a, b) = (beam.nodes[0].index(), beam.nodes[1]);
        let far = slots.get(&other).and_then(|&s| kin[s].get(b.index()));
        let (Some(near), Some(&(p2, v2))) = (actor.nodes.get(a), far) else {
            continue;
        };
        let ext = Extension::measure(beam.rest_length, near.position, near.velocity, p2, v2);
        let (k, d, support_broke) = beam.bounded_spring_damp(&ext);
        let (mut slen, breaks) = actor.beams[i].resolve_stress(k, d, &ext);
        if breaks || support_broke {
            debug!(actor = %actor.id, beam = i, %other, "inter-actor beam broke");
            actor.beams[i].break_apart();
            actor.links_changed = true;
        }
        if breaks {
            slen = 0.0;
        }
        let force = ext.force(slen);
        actor.nodes[a].forces += force;
        owed.push(Owed {
            key: (actor.id, i),
            target: LinkTarget { actor: other, node: b },
            force,
        });
    }
    owed
}

/// Slidenodes riding another actor's rail.
fn pull_foreign_slidenodes(actors: &mut [Actor], dt: f64) {
    if !actors
        .iter()
        .any(|a| a.slidenodes.iter().any(|s| s.foreign_actor().is_some()))
    {
        return;
    }
    let slots = slot_map(actors);
    for i in 0..actors.len() {
        for s in 0..actors[i].slidenodes.len() {
            let Some(RailRef {
                actor: Some(owner),
                rail,
            }) = actors[i].slidenodes[s].rail
            else {
                continue;
            };
            let Some(&j) = slots.get(&owner) else {
                continue;
            };
            let Some((me, other)) = pair_mut(actors, i, j) else {
                continue;
            };
            let Some(rail) = other.rails.get(rail) else {
                continue;
            };
            let sn = &mut me.slidenodes[s];
            let Some(slider) = me.nodes.get(sn.node).map(|n| n.position) else {
                continue;
            };
            sn.update_position(slider, rail, &other.nodes, &other.beams);
            if let Some(pull) = sn.pull(slider, rail, &other.beams, dt) {
                if let Some(n) = me.nodes.get_mut(sn.node) {
                    n.forces -= pull.force;
                }
                pull.apply_to_rail(&mut other.nodes);
            }
        }
    }
}

struct ContactView {
    id: ActorId,
    nodes: Vec<Node>,
    neighbours: Vec<Vec<usize>>,
    remote: bool,
    bounds: Aabb,
}

/// Foreign contacter nodes against each actor's cab triangles.
fn foreign_contacts(actors: &mut [Actor], dt: f64) {
    let hitters = |a: &Actor| a.is_simulated() && a.cabs.iter().any(|t| t.contact);
    if !actors.iter().any(hitters) {
        return;
    }
    let views: Vec<ContactView> = actors
        .iter()
        .filter(|a| a.state != ActorState::Disposed && a.state != ActorState::LocalSleeping)
        .map(|a| ContactView {
            id: a.id,
            nodes: a.nodes.clone(),
            neighbours: a.neighbours.clone(),
            remote: a.state == ActorState::NetworkedOk,
            bounds: a.bounds,
        })
        .collect();
    let hits: Vec<Vec<ForeignHit>> = map_actors(actors, |a| {
        if !hitters(&*a) {
            return Vec::new();
        }
        let reach = a.bounds.expanded(a.collision_range);
        let others: Vec<ForeignActor<'_>> = views
            .iter()
            .filter(|v| v.id != a.id && v.bounds.intersects(&reach))
            .map(|v| ForeignActor {
                id: v.id,
                nodes: &v.nodes,
                neighbours: &v.neighbours,
                remote: v.remote,
            })
            .collect();
        if others.is_empty() {
            return Vec::new();
        }
        a.grid.clear();
        for other in &others {
            for (i, node) in other.nodes.iter().enumerate() {
                if node.flags.contactable && reach.contains(&node.position) {
                    a.grid.insert(PointRef { actor: other.id, node: i }, node.position);
                }
            }
        }
        inter_actor_collisions(
            &mut a.nodes,
            &a.cabs,
            &mut a.inter_rates,
            &a.grid,
            &others,
            a.collision_range,
            dt,
            &a.ground_model,
        )
    });
    let slots = slot_map(actors);
    for hit in hits.into_iter().flatten() {
        let Some(&s) = slots.get(&hit.target.actor) else {
            continue;
        };
        if let Some(n) = actors[s].nodes.get_mut(hit.target.node) {
            n.forces += hit.force;
        }
    }
}

// ==================== Manager ====================

/// Owner of every live actor and the fixed-step scheduler.
pub struct ActorManager {
    config: SimConfig,
    collab: Collaborators,
    actors: Vec<Actor>,
    in_flight: Option<JoinHandle<BatchOutput>>,
    #[cfg(feature = "parallel")]
    pool: Arc<rayon::ThreadPool>,
    next_id: u32,
    documents: HashMap<ActorId, Arc<Document>>,
    inputs: VecDeque<(ActorId, InputEvent)>,
    deletions: Vec<ActorId>,
    inter_beams: HashMap<BeamKey, InterActorBeam>,
    linked: HashMap<ActorId, Vec<ActorId>>,
    links_dirty: bool,
    own_commands: HashMap<ActorId, Vec<f64>>,
    forwarded: HashSet<ActorId>,
    remainder: f64,
    sim_time: f64,
    last_substeps: usize,
    total_substeps: u64,
    broadcast: bool,
    outbox: Vec<ActorStreamUpdate>,
}

impl std::fmt::Debug for ActorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorManager")
            .field("actors", &self.documents.len())
            .field("in_flight", &self.in_flight.is_some())
            .field("sim_time", &self.sim_time)
            .finish_non_exhaustive()
    }
}

impl ActorManager {
    /// Manager with no actors.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] for an invalid configuration and
    /// [`SimError::InvalidArgument`] when the worker pool cannot be built.
    pub fn new(config: SimConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("actor-worker-{i}"))
            .build()
            .map_err(|e| SimError::InvalidArgument(format!("worker pool: {e}")))?;
        info!(
            dt = config.physics_dt,
            workers = config.worker_threads,
            async_physics = config.async_physics,
            "actor manager ready"
        );
        Ok(Self {
            config,
            collab: collaborators,
            actors: Vec::new(),
            in_flight: None,
            #[cfg(feature = "parallel")]
            pool: Arc::new(pool),
            next_id: 0,
            documents: HashMap::new(),
            inputs: VecDeque::new(),
            deletions: Vec::new(),
            inter_beams: HashMap::new(),
            linked: HashMap::new(),
            links_dirty: false,
            own_commands: HashMap::new(),
            forwarded: HashSet::new(),
            remainder: 0.0,
            sim_time: 0.0,
            last_substeps: 0,
            total_substeps: 0,
            broadcast: false,
            outbox: Vec::new(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Number of live actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True without any live actor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Ids of the live actors, ascending.
    #[must_use]
    pub fn actor_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.documents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Simulated time (s).
    #[must_use]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Substeps scheduled by the last tick.
    #[must_use]
    pub fn last_substeps(&self) -> usize {
        self.last_substeps
    }

    /// Substeps scheduled since creation.
    #[must_use]
    pub fn total_substeps(&self) -> u64 {
        self.total_substeps
    }

    // ==================== Lifecycle ====================

    /// Build an actor from `doc` and take ownership of it.
    ///
    /// # Errors
    ///
    /// Any [`SpawnError`]; the manager is left untouched.
    pub fn spawn(&mut self, doc: Arc<Document>, request: ActorSpawnRequest) -> std::result::Result<ActorId, SpawnError> {
        self.join();
        let id = ActorId(self.next_id);
        let actor = spawn_actor(&doc, id, &request, &self.config, &*self.collab.terrain)?;
        self.next_id += 1;
        info!(actor = %id, name = %actor.name, nodes = actor.nodes.len(), "actor added");
        self.actors.push(actor);
        self.documents.insert(id, doc);
        self.links_dirty = true;
        Ok(id)
    }

    /// Queue an actor for removal at the next batch boundary.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`] when `id` is not alive.
    pub fn delete(&mut self, id: ActorId) -> Result<()> {
        if !self.documents.contains_key(&id) {
            return Err(SimError::UnknownActor(id));
        }
        if !self.deletions.contains(&id) {
            self.deletions.push(id);
        }
        Ok(())
    }

    /// Queue an input event for delivery on the next tick.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`] when `id` is not alive.
    pub fn push_input(&mut self, id: ActorId, event: InputEvent) -> Result<()> {
        if !self.documents.contains_key(&id) {
            return Err(SimError::UnknownActor(id));
        }
        self.inputs.push_back((id, event));
        Ok(())
    }

    /// Advance by `wall_dt` seconds of wall-clock time.
    pub fn tick(&mut self, wall_dt: f64, player: Option<ActorId>) {
        self.join();
        self.batch_boundary();

        let frame_dt = wall_dt.clamp(0.0, self.config.max_frame_dt);
        self.update_sleep(frame_dt, player);
        self.deliver_inputs();
        self.process_link_requests();
        for actor in &mut self.actors {
            actor.update_blinker(frame_dt);
        }
        self.exchange_streams();
        if let Some(player) = player {
            self.forward_commands(player);
        }

        let steps = self.schedule(frame_dt);
        self.last_substeps = steps;
        self.total_substeps += steps as u64;
        #[allow(clippy::cast_precision_loss)]
        let simulated = steps as f64 * self.config.physics_dt;
        self.sim_time += simulated;
        if steps == 0 {
            return;
        }
        self.launch(steps, player);
    }

    /// Turn wall time into a whole number of substeps, carrying the rest.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn schedule(&mut self, frame_dt: f64) -> usize {
        let dt = self.config.physics_dt;
        let available = frame_dt * self.config.sim_speed + self.remainder;
        let steps = (available / dt).floor().max(0.0);
        self.remainder = (available - steps * dt).max(0.0);
        steps as usize
    }

    fn launch(&mut self, steps: usize, player: Option<ActorId>) {
        let job = BatchJob {
            config: self.config.clone(),
            terrain: Arc::clone(&self.collab.terrain),
            sound: Arc::clone(&self.collab.sound),
            player,
            steps,
            #[cfg(feature = "parallel")]
            pool: Arc::clone(&self.pool),
        };
        let actors = std::mem::take(&mut self.actors);
        trace!(steps, actors = actors.len(), "physics batch queued");
        if self.config.async_physics {
            self.in_flight = Some(std::thread::spawn(move || job.run(actors)));
        } else {
            let output = job.run(actors);
            self.absorb(output);
        }
    }

    /// Wait for an in-flight batch and take the actors back.
    fn join(&mut self) {
        let Some(handle) = self.in_flight.take() else {
            return;
        };
        match handle.join() {
            Ok(output) => self.absorb(output),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    fn absorb(&mut self, output: BatchOutput) {
        self.actors = output.actors;
        for (key, force) in output.beam_forces {
            if let Some(beam) = self.inter_beams.get_mut(&key) {
                beam.force = force;
            }
        }
        if output.frame_dt > 0.0 {
            for actor in self.actors.iter_mut().filter(|a| a.state != ActorState::Disposed) {
                actor.update_metrics(output.frame_dt);
            }
        }
        self.refresh_links();
    }

    /// Resets, deletions and link bookkeeping; never runs mid-batch.
    fn batch_boundary(&mut self) {
        let terrain = Arc::clone(&self.collab.terrain);
        for actor in &mut self.actors {
            if actor.apply_pending_reset(&*terrain) == Some(ResetKind::BlowUp) {
                self.collab.log.log(
                    Severity::Warning,
                    &format!("actor {} ({}) exploded and was reset", actor.id, actor.name),
                );
            }
        }
        let gone = std::mem::take(&mut self.deletions);
        for id in gone {
            self.remove_actor(id);
        }
        self.refresh_links();
    }

    fn remove_actor(&mut self, gone: ActorId) {
        let Some(pos) = self.actors.iter().position(|a| a.id == gone) else {
            return;
        };
        let removed = self.actors.remove(pos);
        for other in &mut self.actors {
            let mut changed = release_links_to(
                gone,
                &mut other.hooks,
                &mut other.ties,
                &mut other.ropes,
                &mut other.beams,
                &other.nodes,
            );
            for sn in other.slidenodes.iter_mut().filter(|s| s.foreign_actor() == Some(gone)) {
                sn.attach(None);
                changed = true;
            }
            for beam in other.beams.iter_mut().filter(|b| b.remote == Some(gone)) {
                beam.disabled = true;
                changed = true;
            }
            if changed {
                other.links_changed = true;
            }
        }
        self.documents.remove(&gone);
        self.own_commands.remove(&gone);
        self.forwarded.remove(&gone);
        self.inputs.retain(|(id, _)| *id != gone);
        self.links_dirty = true;
        info!(actor = %gone, name = %removed.name, "actor removed");
    }

    /// Rebuild the inter-actor beam map and linked groups after a
    /// structural change.
    fn refresh_links(&mut self) {
        if !self.links_dirty && !self.actors.iter().any(|a| a.links_changed) {
            return;
        }
        let mut beams = HashMap::new();
        for actor in &self.actors {
            for (i, beam) in actor.beams.iter().enumerate() {
                let Some(other) = beam.remote else {
                    continue;
                };
                if beam.disabled {
                    continue;
                }
                let key = (actor.id, i);
                let force = self.inter_beams.get(&key).map_or_else(Vec3::zeros, |b| b.force);
                beams.insert(
                    key,
                    InterActorBeam {
                        owner: actor.id,
                        beam: i,
                        node: beam.nodes[0].index(),
                        target: LinkTarget {
                            actor: other,
                            node: beam.nodes[1],
                        },
                        force,
                    },
                );
            }
        }

        let mut adjacency: HashMap<ActorId, HashSet<ActorId>> = HashMap::new();
        let mut connect = |a: ActorId, b: ActorId| {
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        };
        for beam in beams.values() {
            connect(beam.owner, beam.target.actor);
        }
        for actor in &self.actors {
            for other in actor.direct_links() {
                connect(actor.id, other);
            }
        }

        let mut linked = HashMap::new();
        for actor in &self.actors {
            let mut seen: HashSet<ActorId> = HashSet::new();
            seen.insert(actor.id);
            let mut queue = VecDeque::from([actor.id]);
            while let Some(current) = queue.pop_front() {
                for &next in adjacency.get(&current).into_iter().flatten() {
                    if self.documents.contains_key(&next) && seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            let mut group: Vec<ActorId> = seen.into_iter().filter(|id| *id != actor.id).collect();
            group.sort_unstable();
            linked.insert(actor.id, group);
        }

        debug!(beams = beams.len(), "inter-actor links rebuilt");
        self.inter_beams = beams;
        self.linked = linked;
        self.links_dirty = false;
        for actor in &mut self.actors {
            actor.links_changed = false;
        }
    }

    // ==================== Per-tick bookkeeping ====================

    fn update_sleep(&mut self, frame_dt: f64, player: Option<ActorId>) {
        for actor in self.actors.iter_mut().filter(|a| a.state == ActorState::LocalSimulated) {
            if actor.metrics.avg_velocity.norm_squared() > self.config.sleep_velocity_sq {
                actor.sleep_timer = 0.0;
            } else {
                actor.sleep_timer += frame_dt;
                if actor.sleep_timer >= self.config.sleep_timeout {
                    debug!(actor = %actor.id, "actor fell asleep");
                    actor.state = ActorState::LocalSleeping;
                }
            }
        }
        if let Some(actor) = player.and_then(|id| self.actors.iter_mut().find(|a| a.id == id)) {
            wake(actor);
        }

        let predicted: Vec<Aabb> = self.actors.iter().map(|a| predicted_bounds(a, frame_dt)).collect();
        let mut queue: Vec<usize> = (0..self.actors.len())
            .filter(|&i| self.actors[i].state == ActorState::LocalSimulated)
            .collect();
        while let Some(i) = queue.pop() {
            let source = self.actors[i].id;
            let partners = self.linked.get(&source);
            for j in 0..self.actors.len() {
                if self.actors[j].state != ActorState::LocalSleeping {
                    continue;
                }
                let other = self.actors[j].id;
                let touching = predicted[j].intersects(&predicted[i]);
                if touching || partners.is_some_and(|p| p.contains(&other)) {
                    trace!(actor = %other, by = %source, "actor woken");
                    wake(&mut self.actors[j]);
                    queue.push(j);
                }
            }
        }
    }

    fn deliver_inputs(&mut self) {
        let mut events: Vec<(ActorId, InputEvent)> = self.inputs.drain(..).collect();
        for actor in &self.actors {
            for event in self.collab.input.drain(actor.id) {
                events.push((actor.id, event));
            }
        }
        for (id, event) in events {
            let Some(actor) = self.actors.iter_mut().find(|a| a.id == id) else {
                continue;
            };
            if let InputEvent::Command { key, value } = event {
                let own = self.own_commands.entry(id).or_default();
                if own.len() <= key {
                    own.resize(key + 1, 0.0);
                }
                own[key] = value.clamp(0.0, 1.0);
            }
            if actor.state == ActorState::LocalSleeping {
                wake(actor);
            }
            actor.apply_input(event, &*self.collab.sound);
        }
    }

    fn process_link_requests(&mut self) {
        let requests: Vec<(usize, Vec<_>)> = self
            .actors
            .iter_mut()
            .enumerate()
            .map(|(i, a)| (i, a.take_link_requests()))
            .filter(|(_, r)| !r.is_empty())
            .collect();
        if requests.is_empty() {
            return;
        }
        let world = LockWorld {
            actors: self
                .actors
                .iter()
                .filter(|a| matches!(a.state, ActorState::LocalSimulated | ActorState::NetworkedOk))
                .map(Actor::lock_candidates)
                .collect(),
        };
        for (i, list) in requests {
            for request in list {
                if self.actors[i].toggle_links(request, &world) {
                    self.links_dirty = true;
                }
            }
        }
        self.refresh_links();
    }

    #[allow(clippy::cast_possible_truncation)]
    fn exchange_streams(&mut self) {
        let now_ms = (self.sim_time * 1000.0) as i32;
        for actor in &mut self.actors {
            match actor.state {
                ActorState::NetworkedOk => {
                    actor.apply_stream(now_ms);
                }
                ActorState::LocalSimulated if self.broadcast => {
                    self.outbox.push(actor.stream_update(now_ms));
                }
                _ => {}
            }
        }
    }

    /// Share the player's command keys with the actors it is coupled to.
    ///
    /// Recipients take the larger of their own input and the player's.
    /// Parking brake and lights travel only over the player's hooks.
    fn forward_commands(&mut self, player: ActorId) {
        let Some(source) = self.actors.iter().find(|a| a.id == player) else {
            return;
        };
        let mut recipients: HashSet<ActorId> = HashSet::new();
        if source.forward_commands {
            if self.config.realistic_commands {
                recipients.extend(source.direct_links());
                recipients.extend(
                    self.actors
                        .iter()
                        .filter(|a| a.direct_links().contains(&player))
                        .map(|a| a.id),
                );
            } else {
                recipients.extend(self.linked.get(&player).into_iter().flatten().copied());
                let reach = source.bounds.expanded(source.collision_range);
                recipients.extend(
                    self.actors
                        .iter()
                        .filter(|a| a.id != player && a.bounds.intersects(&reach))
                        .map(|a| a.id),
                );
            }
        }
        recipients.remove(&player);

        let inputs: Vec<f64> = source.command_keys.iter().map(|k| k.player_input).collect();
        let hooked: HashSet<ActorId> = source
            .hooks
            .iter()
            .filter(|h| h.is_engaged())
            .filter_map(|h| h.target.map(|t| t.actor))
            .collect();
        let parking_brake = source.controls.parking_brake;
        let lights = source.lights & !NO_IMPORT_LIGHTS;

        let mut now = HashSet::new();
        for actor in self.actors.iter_mut().filter(|a| recipients.contains(&a.id)) {
            if !actor.import_commands {
                continue;
            }
            let own = self.own_commands.get(&actor.id);
            for (k, key) in actor.command_keys.iter_mut().enumerate() {
                let mine = own.and_then(|o| o.get(k)).copied().unwrap_or(0.0);
                key.player_input = mine.max(inputs.get(k).copied().unwrap_or(0.0));
            }
            if hooked.contains(&actor.id) {
                actor.controls.parking_brake = parking_brake;
                actor.lights = (actor.lights & NO_IMPORT_LIGHTS) | lights;
            }
            now.insert(actor.id);
        }

        for actor in self.actors.iter_mut() {
            if !self.forwarded.contains(&actor.id) || now.contains(&actor.id) {
                continue;
            }
            let own = self.own_commands.get(&actor.id);
            for (k, key) in actor.command_keys.iter_mut().enumerate() {
                key.player_input = own.and_then(|o| o.get(k)).copied().unwrap_or(0.0);
            }
        }
        self.forwarded = now;
    }

    // ==================== Queries ====================

    /// Actor by id; joins an in-flight batch first.
    pub fn actor(&mut self, id: ActorId) -> Option<&Actor> {
        self.join();
        self.actors.iter().find(|a| a.id == id)
    }

    /// Mutable actor by id; joins an in-flight batch first.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.join();
        self.actors.iter_mut().find(|a| a.id == id)
    }

    /// Document an actor was spawned from.
    #[must_use]
    pub fn document(&self, id: ActorId) -> Option<&Arc<Document>> {
        self.documents.get(&id)
    }

    /// Write the actor's current soft body back into its document.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`] when `id` is not alive.
    pub fn export(&mut self, id: ActorId, options: &ExportOptions) -> Result<Document> {
        self.join();
        let source = self.documents.get(&id).ok_or(SimError::UnknownActor(id))?;
        let actor = self
            .actors
            .iter()
            .find(|a| a.id == id)
            .ok_or(SimError::UnknownActor(id))?;
        Ok(export_actor(actor, source, options))
    }

    /// Every actor reachable from `id` over hooks, ties, ropes and
    /// slidenodes, as of the last batch boundary.
    #[must_use]
    pub fn linked_actors(&self, id: ActorId) -> Vec<ActorId> {
        self.linked.get(&id).cloned().unwrap_or_default()
    }

    /// Beams currently joining two actors.
    pub fn inter_actor_beams(&self) -> impl Iterator<Item = &InterActorBeam> {
        self.inter_beams.values()
    }

    // ==================== Mutators ====================

    fn live(&mut self, id: ActorId) -> Result<&mut Actor> {
        self.join();
        self.actors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(SimError::UnknownActor(id))
    }

    /// Change an actor's dry mass.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`], or [`SimError::InvalidArgument`] for a
    /// negative or non-finite mass.
    pub fn set_mass(&mut self, id: ActorId, dry_mass: f64) -> Result<()> {
        if !dry_mass.is_finite() || dry_mass < 0.0 {
            return Err(SimError::InvalidArgument(format!("dry mass {dry_mass}")));
        }
        self.live(id)?.set_mass(dry_mass);
        Ok(())
    }

    /// Override a single node mass.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`], or [`SimError::InvalidArgument`] for a
    /// bad node index or a non-positive mass.
    pub fn set_node_mass(&mut self, id: ActorId, node: usize, mass: f64) -> Result<()> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(SimError::InvalidArgument(format!("node mass {mass}")));
        }
        if self.live(id)?.set_node_mass(node, mass) {
            Ok(())
        } else {
            Err(SimError::InvalidArgument(format!("node {node} out of range")))
        }
    }

    /// Change a runtime tunable.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`], or [`SimError::InvalidArgument`] for an
    /// engine attribute on an actor without engine.
    pub fn set_sim_attribute(&mut self, id: ActorId, attribute: SimAttribute, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(SimError::InvalidArgument(format!("{attribute:?} = {value}")));
        }
        let actor = self.live(id)?;
        match attribute {
            SimAttribute::Engine(attr) => match &mut actor.engine {
                Some(engine) => engine.set_attribute(attr, value),
                None => {
                    return Err(SimError::InvalidArgument(format!("actor {id} has no engine")));
                }
            },
            SimAttribute::TcRatio => actor.aids.tc.ratio = value,
            SimAttribute::TcPulseTime => actor.aids.tc.pulse_time = value,
            SimAttribute::AlbRatio => actor.aids.alb.ratio = value,
            SimAttribute::AlbPulseTime => actor.aids.alb.pulse_time = value,
            SimAttribute::AlbMinSpeed => actor.aids.alb_min_speed = value,
            SimAttribute::BrakeForce => actor.brakes.force = value,
            SimAttribute::HandbrakeForce => actor.brakes.handbrake_force = value,
        }
        debug!(actor = %id, ?attribute, value, "attribute changed");
        Ok(())
    }

    /// Queue an in-place repair for the next batch boundary.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`].
    pub fn request_repair(&mut self, id: ActorId) -> Result<()> {
        self.live(id)?.request_reset(ResetKind::Repair);
        Ok(())
    }

    /// Queue a soft respawn for the next batch boundary.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`].
    pub fn request_soft_respawn(&mut self, id: ActorId) -> Result<()> {
        self.live(id)?.request_reset(ResetKind::SoftRespawn);
        Ok(())
    }

    /// Restore the replay frame recorded `frames_ago` frames before the
    /// newest. Returns false when the actor records no replay or the frame
    /// is not in the ring.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`].
    pub fn replay_seek(&mut self, id: ActorId, frames_ago: usize) -> Result<bool> {
        let actor = self.live(id)?;
        let Some(replay) = &actor.replay else {
            return Ok(false);
        };
        let restored = replay.seek(frames_ago, &mut actor.nodes, &mut actor.beams);
        if restored {
            debug!(actor = %id, frames_ago, "replay frame restored");
        }
        Ok(restored)
    }

    /// Wake a sleeping actor.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`], or [`SimError::Busy`] for a networked or
    /// disposed actor.
    pub fn wake(&mut self, id: ActorId) -> Result<()> {
        let actor = self.live(id)?;
        match actor.state {
            ActorState::LocalSleeping | ActorState::LocalSimulated => {
                wake(actor);
                Ok(())
            }
            ActorState::NetworkedOk | ActorState::Disposed => Err(SimError::Busy(id)),
        }
    }

    // ==================== Network ====================

    /// Collect stream updates of locally simulated actors every tick.
    pub fn set_broadcast(&mut self, enabled: bool) {
        self.broadcast = enabled;
    }

    /// Take the stream updates collected since the last call.
    pub fn take_stream_updates(&mut self) -> Vec<ActorStreamUpdate> {
        std::mem::take(&mut self.outbox)
    }

    /// Queue a received update for a networked actor.
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownActor`], or [`SimError::Busy`] when the actor is
    /// simulated locally.
    pub fn receive_stream(&mut self, id: ActorId, update: ActorStreamUpdate) -> Result<()> {
        let actor = self.live(id)?;
        if actor.state != ActorState::NetworkedOk {
            warn!(actor = %id, "stream update for a local actor dropped");
            return Err(SimError::Busy(id));
        }
        actor.push_stream_update(update);
        Ok(())
    }
}

impl Drop for ActorManager {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if handle.join().is_err() {
                warn!("physics batch panicked during shutdown");
            }
        }
    }
}

fn wake(actor: &mut Actor) {
    if actor.state == ActorState::LocalSleeping {
        actor.state = ActorState::LocalSimulated;
    }
    actor.sleep_timer = 0.0;
}

/// Bounds swept over the next frame.
fn predicted_bounds(actor: &Actor, frame_dt: f64) -> Aabb {
    let mut bounds = actor.bounds.translated(&(actor.metrics.avg_velocity * frame_dt));
    bounds.merge(&actor.bounds);
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::HookState;
    use approx::assert_relative_eq;
    use sim_types::{FlatTerrain, ReplayConfig};

    const BOX: &str = "\
box
globals
100, 0
importcommands
nodes
0, 0, 0, 0
1, 1, 0, 0
2, 0, 1, 0
3, 0, 0, 1
beams
0, 1
0, 2
0, 3
1, 2
1, 3
2, 3
end
";

    const TOWER: &str = "\
tower
globals
100, 0
forwardcommands
nodes
0, 0, 0, 0
1, 1, 0, 0
2, 0, 0, 1
3, 0, 1, 0, h
beams
0, 1
0, 2
1, 2
0, 3
1, 3
2, 3
end
";

    fn doc(text: &str) -> Arc<Document> {
        match sim_truck::load(text) {
            Ok(out) => Arc::new(out.document),
            Err(err) => panic!("test document rejected: {err}"),
        }
    }

    fn config() -> SimConfig {
        SimConfig {
            async_physics: false,
            worker_threads: 2,
            turbulence_enabled: false,
            ..SimConfig::default()
        }
    }

    fn floating() -> SimConfig {
        SimConfig {
            gravity: 0.0,
            drag_enabled: false,
            ..config()
        }
    }

    fn manager(config: SimConfig) -> ActorManager {
        let collab = Collaborators::default().with_terrain(Arc::new(FlatTerrain::new(-100.0)));
        ActorManager::new(config, collab).expect("manager")
    }

    fn spawn_awake(m: &mut ActorManager, text: &str, at: Vec3) -> ActorId {
        let id = m.spawn(doc(text), ActorSpawnRequest::at(at)).expect("spawn");
        m.wake(id).expect("wake");
        id
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = SimConfig {
            worker_threads: 0,
            ..config()
        };
        assert!(matches!(
            ActorManager::new(bad, Collaborators::default()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn substeps_follow_wall_time() {
        let mut m = manager(floating());
        for _ in 0..10 {
            m.tick(0.01, None);
        }
        let expected = 0.1 / m.config().physics_dt;
        #[allow(clippy::cast_precision_loss)]
        let total = m.total_substeps() as f64;
        assert!((total - expected).abs() <= 1.0, "{total} vs {expected}");
    }

    #[test]
    fn frame_time_is_capped() {
        let mut m = manager(floating());
        m.tick(10.0, None);
        let cap = (m.config().max_frame_dt / m.config().physics_dt).round();
        #[allow(clippy::cast_precision_loss)]
        let steps = m.last_substeps() as f64;
        assert!((steps - cap).abs() <= 1.0);
    }

    #[test]
    fn remainder_is_carried() {
        let mut m = manager(floating());
        let half = m.config().physics_dt * 0.6;
        m.tick(half, None);
        assert_eq!(m.last_substeps(), 0);
        m.tick(half, None);
        assert_eq!(m.last_substeps(), 1);
    }

    #[test]
    fn falling_actor_gains_speed() {
        let mut m = manager(config());
        let id = spawn_awake(&mut m, BOX, Vec3::new(0.0, 10.0, 0.0));
        let start = m.actor(id).expect("actor").position().y;
        for _ in 0..10 {
            m.tick(0.02, Some(id));
        }
        let actor = m.actor(id).expect("actor");
        assert!(actor.position().y < start);
        assert!(actor.metrics.avg_velocity.y < 0.0);
    }

    #[test]
    fn replay_seek_rewinds_a_falling_actor() {
        let mut m = manager(SimConfig {
            replay: ReplayConfig::recording(16, 20),
            ..config()
        });
        let id = spawn_awake(&mut m, BOX, Vec3::new(0.0, 10.0, 0.0));
        for _ in 0..5 {
            m.tick(0.02, Some(id));
        }
        let now = m.actor(id).expect("actor").nodes[0].position.y;
        assert!(m.replay_seek(id, 5).expect("seek"));
        let then = m.actor(id).expect("actor").nodes[0].position.y;
        assert!(then > now, "{then} is not above {now}");
        assert!(!m.replay_seek(id, 100).expect("seek"));

        let mut plain = manager(config());
        let other = spawn_awake(&mut plain, BOX, Vec3::zeros());
        assert!(!plain.replay_seek(other, 0).expect("seek"));
    }

    #[test]
    fn resting_actor_sleeps_after_timeout() {
        let mut m = manager(floating());
        let id = spawn_awake(&mut m, BOX, Vec3::zeros());
        for _ in 0..195 {
            m.tick(0.05, None);
        }
        assert_eq!(m.actor(id).expect("actor").state, ActorState::LocalSimulated);
        for _ in 0..10 {
            m.tick(0.05, None);
        }
        assert_eq!(m.actor(id).expect("actor").state, ActorState::LocalSleeping);
    }

    #[test]
    fn player_is_always_awake() {
        let mut m = manager(floating());
        let id = m.spawn(doc(BOX), ActorSpawnRequest::default()).expect("spawn");
        assert_eq!(m.actor(id).expect("actor").state, ActorState::LocalSleeping);
        m.tick(0.02, Some(id));
        assert_eq!(m.actor(id).expect("actor").state, ActorState::LocalSimulated);
    }

    #[test]
    fn overlapping_sleeper_is_woken() {
        let mut m = manager(floating());
        let awake = spawn_awake(&mut m, BOX, Vec3::zeros());
        let sleeper = m
            .spawn(doc(BOX), ActorSpawnRequest::at(Vec3::new(0.25, 0.0, 0.0)))
            .expect("spawn");
        let far = m
            .spawn(doc(BOX), ActorSpawnRequest::at(Vec3::new(50.0, 0.0, 0.0)))
            .expect("spawn");
        m.tick(0.02, Some(awake));
        assert_eq!(m.actor(sleeper).expect("actor").state, ActorState::LocalSimulated);
        assert_eq!(m.actor(far).expect("actor").state, ActorState::LocalSleeping);
    }

    #[test]
    fn delete_is_honoured_at_the_next_tick() {
        let mut m = manager(floating());
        let id = spawn_awake(&mut m, BOX, Vec3::zeros());
        m.delete(id).expect("delete");
        assert!(m.actor(id).is_some());
        m.tick(0.01, None);
        assert!(m.actor(id).is_none());
        assert!(matches!(m.delete(id), Err(SimError::UnknownActor(_))));
    }

    fn hooked_pair() -> (ActorManager, ActorId, ActorId) {
        let mut m = manager(floating());
        let tower = spawn_awake(&mut m, TOWER, Vec3::zeros());
        // The hook node ends up at (-0.5, 1, -0.5); cargo node 0 lands 0.2 above it.
        let cargo = spawn_awake(&mut m, BOX, Vec3::new(-0.125, 1.2, -0.125));
        m.push_input(tower, InputEvent::ToggleHooks).expect("input");
        m.tick(0.01, Some(tower));
        (m, tower, cargo)
    }

    #[test]
    fn hook_links_two_actors() {
        let (mut m, tower, cargo) = hooked_pair();
        let hook = m.actor(tower).expect("actor").hooks[0].clone();
        assert_ne!(hook.state, HookState::Unlocked);
        assert_eq!(hook.target.map(|t| t.actor), Some(cargo));
        let beams: Vec<InterActorBeam> = m.inter_actor_beams().copied().collect();
        assert_eq!(beams.len(), 1);
        assert_eq!(beams[0].owner, tower);
        assert_eq!(beams[0].target.actor, cargo);
        assert_eq!(m.linked_actors(tower), vec![cargo]);
        assert_eq!(m.linked_actors(cargo), vec![tower]);
    }

    #[test]
    fn coupling_force_is_equal_and_opposite() {
        let mut actors = Vec::new();
        let mut m = manager(floating());
        let a = m.spawn(doc(BOX), ActorSpawnRequest::default()).expect("spawn");
        let b = m
            .spawn(doc(BOX), ActorSpawnRequest::at(Vec3::new(3.0, 0.0, 0.0)))
            .expect("spawn");
        for id in [a, b] {
            let mut actor = m.actor(id).expect("actor").clone();
            actor.state = ActorState::LocalSimulated;
            for n in &mut actor.nodes {
                n.forces = Vec3::zeros();
            }
            actors.push(actor);
        }
        let mut beam = crate::beam::Beam::new(sim_types::NodeIdx::at(1), sim_types::NodeIdx::at(0));
        beam.set_length(1.0);
        beam.k = 1000.0;
        beam.d = 0.0;
        beam.remote = Some(b);
        actors[0].beams.push(beam);

        let mut forces = HashMap::new();
        couple_remote_beams(&mut actors, &mut forces);
        let f = forces[&(a, actors[0].beams.len() - 1)];
        assert!(f.norm() > 0.0);
        assert_relative_eq!(actors[0].nodes[1].forces, f, epsilon = 1e-9);
        assert_relative_eq!(actors[1].nodes[0].forces, -f, epsilon = 1e-9);
    }

    #[test]
    fn deleting_a_linked_actor_releases_the_hook() {
        let (mut m, tower, cargo) = hooked_pair();
        m.delete(cargo).expect("delete");
        m.tick(0.01, Some(tower));
        let actor = m.actor(tower).expect("actor");
        assert_eq!(actor.hooks[0].state, HookState::Unlocked);
        assert!(actor.beams.iter().all(|b| b.remote.is_none()));
        assert_eq!(m.inter_actor_beams().count(), 0);
        assert!(m.linked_actors(tower).is_empty());
    }

    #[test]
    fn unlock_clears_the_link() {
        let (mut m, tower, _) = hooked_pair();
        m.push_input(tower, InputEvent::ToggleHooks).expect("input");
        m.tick(0.01, Some(tower));
        m.tick(0.01, Some(tower));
        assert_eq!(m.inter_actor_beams().count(), 0);
        assert_eq!(m.actor(tower).expect("actor").hooks[0].state, HookState::Unlocked);
    }

    #[test]
    fn commands_forward_by_maximum() {
        let (mut m, tower, cargo) = hooked_pair();
        m.push_input(tower, InputEvent::Command { key: 3, value: 0.7 })
            .expect("input");
        m.push_input(cargo, InputEvent::Command { key: 3, value: 0.2 })
            .expect("input");
        m.push_input(cargo, InputEvent::Command { key: 4, value: 0.9 })
            .expect("input");
        m.tick(0.01, Some(tower));
        let keys = &m.actor(cargo).expect("actor").command_keys;
        assert_relative_eq!(keys[3].player_input, 0.7);
        assert_relative_eq!(keys[4].player_input, 0.9);
    }

    #[test]
    fn parking_brake_crosses_hooks() {
        let (mut m, tower, cargo) = hooked_pair();
        m.push_input(tower, InputEvent::ToggleParkingBrake).expect("input");
        m.tick(0.01, Some(tower));
        assert!(m.actor(tower).expect("actor").controls.parking_brake);
        assert!(m.actor(cargo).expect("actor").controls.parking_brake);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let mut m = manager(config());
        let ghost = ActorId(42);
        assert!(matches!(m.set_mass(ghost, 10.0), Err(SimError::UnknownActor(_))));
        assert!(matches!(
            m.push_input(ghost, InputEvent::Horn(true)),
            Err(SimError::UnknownActor(_))
        ));
    }

    #[test]
    fn export_uses_the_spawn_document() {
        let mut m = manager(config());
        let id = m.spawn(doc(BOX), ActorSpawnRequest::default()).expect("spawn");
        let exported = m.export(id, &ExportOptions::default()).expect("export");
        assert_eq!(exported.name, m.document(id).expect("document").name);
        assert_eq!(exported.count(sim_truck::Keyword::Nodes), 4);
        assert!(matches!(
            m.export(ActorId(42), &ExportOptions::default()),
            Err(SimError::UnknownActor(_))
        ));
    }

    #[test]
    fn node_mass_override_is_validated() {
        let mut m = manager(config());
        let id = m.spawn(doc(BOX), ActorSpawnRequest::default()).expect("spawn");
        assert!(m.set_node_mass(id, 0, 5.0).is_ok());
        assert!(matches!(m.set_node_mass(id, 99, 5.0), Err(SimError::InvalidArgument(_))));
        assert!(matches!(m.set_node_mass(id, 0, -1.0), Err(SimError::InvalidArgument(_))));
    }

    #[test]
    fn engine_attribute_needs_an_engine() {
        let mut m = manager(config());
        let id = m.spawn(doc(BOX), ActorSpawnRequest::default()).expect("spawn");
        assert!(matches!(
            m.set_sim_attribute(id, SimAttribute::Engine(EngineAttribute::IdleRpm), 900.0),
            Err(SimError::InvalidArgument(_))
        ));
        m.set_sim_attribute(id, SimAttribute::BrakeForce, 1234.0).expect("brakes");
        assert_relative_eq!(m.actor(id).expect("actor").brakes.force, 1234.0);
    }

    #[test]
    fn async_batch_matches_inline() {
        let run = |async_physics| {
            let mut m = manager(SimConfig {
                async_physics,
                ..config()
            });
            let id = spawn_awake(&mut m, BOX, Vec3::new(0.0, 5.0, 0.0));
            for _ in 0..5 {
                m.tick(0.02, Some(id));
            }
            m.actor(id).expect("actor").position()
        };
        assert_relative_eq!(run(true), run(false), epsilon = 1e-12);
    }

    #[test]
    fn repair_waits_for_the_boundary() {
        let mut m = manager(config());
        let id = spawn_awake(&mut m, BOX, Vec3::new(0.0, 5.0, 0.0));
        for _ in 0..5 {
            m.tick(0.02, Some(id));
        }
        m.request_repair(id).expect("repair");
        assert_eq!(m.actor(id).expect("actor").pending_reset(), Some(ResetKind::Repair));
        m.tick(0.0, Some(id));
        let actor = m.actor(id).expect("actor");
        assert_eq!(actor.pending_reset(), None);
        assert_relative_eq!(actor.nodes[0].velocity.norm(), 0.0);
    }
}
