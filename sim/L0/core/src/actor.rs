//! A live actor and its per-substep force pipeline.
//!
//! # Architecture
//!
//! ```text
//!   prepare (hooks, rope ends)
//!      │
//!      ▼
//!   nodes: ground contact ─► Euler ─► gravity, drag, water ─► blow-up check
//!      │
//!      ▼
//!   cab buoyancy ─► drivetrain ─► wheels ─► stabiliser ─► hydros ─► commands
//!      │
//!      ▼
//!   ties ─► engine ─► mouse grab ─► beams (+ triggers) ─► cab self-collision
//!      │
//!      ▼
//!   slidenodes ─► force feedback
//! ```
//!
//! Every step reads and writes only this actor's arrays. Whatever spans two
//! actors (inter-actor beams, foreign rails, foreign cab contact, rope ends
//! held by another actor) is left to the manager, which runs it between
//! substeps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_truck::document::records::{DiffType, EngineTriggerFunction};
use sim_types::constants::{BLOWUP_SPEED, DEFAULT_DRAG, DEFAULT_WATERDRAG, RAD_PER_SEC_TO_RPM};
use sim_types::{
    Aabb, ActorId, Blinker, InputEvent, ModulationSource, SimConfig, SoundSink, SoundState,
    SoundTrigger, TerrainQuery, Vec3,
};
use tracing::{debug, trace, warn};

use crate::animator::{AnimatorFrame, AnimatorMemory, EngineFrame};
use crate::beam::{Beam, BoundedKind, Extension};
use crate::collision::{
    buoyancy, ground_collisions, intra_actor_collisions, CabTriangle, CollisionRate, GroundModel,
    PointGrid, PointRef,
};
use crate::command::{
    update_commands, update_hydros, CommandKey, HydraulicSupply, Hydro, HydroInputs, Rotator,
};
use crate::differential::Drivetrain;
use crate::engine::{Engine, EngineFeedback, GearboxMode};
use crate::links::{
    toggle_hooks, toggle_ropes, toggle_ties, update_hooks, update_ties, Hook, HookAction,
    LockCandidates, LockWorld, Ropable, RopableSlot, Rope, Tie,
};
use crate::mass::{recalculate_node_masses, MassSpec};
use crate::net::{self, ActorStreamUpdate, Dashboard, StreamBuffer, VehicleState};
use crate::node::Node;
use crate::replay::Replay;
use crate::shock::{Shock, ShockRole, Stabilizer};
use crate::slidenode::{toggle_slidenode_lock, update_local_slidenodes, Rail, SlideNode};
use crate::trigger::{self, Trigger, TriggerEffect};
use crate::wheel::{update_wheels, Brakes, DrivingAids, Wheel, WheelControls};

/// Blinker half-period in seconds.
const BLINK_PERIOD: f64 = 0.5;
/// Speedometer full scale when the document sets none (m/s).
const DEFAULT_SPEEDO_MAX: f64 = 140.0 / 3.6;
/// Standard gravity for g-force readouts.
const STANDARD_G: f64 = 9.81;

// ==================== State ====================

/// Simulation state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorState {
    /// Integrated every substep.
    LocalSimulated,
    /// Parked until something wakes it.
    #[default]
    LocalSleeping,
    /// Driven by a remote stream, never integrated.
    NetworkedOk,
    /// Deleted; waiting for removal at the next batch boundary.
    Disposed,
}

/// Kinds of reset queued for the next batch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Back to the spawn pose, every beam mended.
    Repair,
    /// Stop in place and lift clear of the ground, keeping damage.
    SoftRespawn,
    /// A node blew up; same as a repair.
    BlowUp,
}

/// Link toggles that need a snapshot of the other actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRequest {
    /// Hook toggle for a group.
    Hooks {
        /// Hook group, -1 for all.
        group: i32,
        /// What to do.
        action: HookAction,
    },
    /// Tie or untie.
    Ties {
        /// Tie group, -1 for all.
        group: i32,
    },
    /// Lock or release ropes.
    Ropes {
        /// Rope group, -1 for all.
        group: i32,
    },
    /// Attach or detach slidenodes.
    SlideNodes,
}

// ==================== Parts ====================

/// A `cameras` line resolved to node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Camera {
    /// Center node.
    pub center: usize,
    /// Back node.
    pub back: usize,
    /// Left node.
    pub left: usize,
    /// The left node sits on the right side.
    pub roll_inverted: bool,
}

impl Camera {
    fn pos(nodes: &[Node], i: usize) -> Vec3 {
        nodes.get(i).map_or_else(Vec3::zeros, |n| n.position)
    }

    /// Unit forward direction.
    #[must_use]
    pub fn direction(&self, nodes: &[Node]) -> Vec3 {
        (Self::pos(nodes, self.center) - Self::pos(nodes, self.back))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vec3::zeros)
    }

    /// Unit vector from the left node to the center node.
    #[must_use]
    pub fn roll_vector(&self, nodes: &[Node]) -> Vec3 {
        let v = Self::pos(nodes, self.center) - Self::pos(nodes, self.left);
        let v = v.try_normalize(f64::EPSILON).unwrap_or_else(Vec3::zeros);
        if self.roll_inverted {
            -v
        } else {
            v
        }
    }

    /// Roll angle of the chassis in radians.
    #[must_use]
    pub fn roll(&self, nodes: &[Node]) -> f64 {
        let v = Self::pos(nodes, self.center) - Self::pos(nodes, self.left);
        let v = v.try_normalize(f64::EPSILON).unwrap_or_else(Vec3::zeros);
        v.y.clamp(-1.0, 1.0).asin()
    }
}

/// Driver inputs that are not owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Controls {
    /// Accelerator pedal [0, 1].
    pub accelerator: f64,
    /// Brake pedal [0, 1].
    pub brake: f64,
    /// Steering [-1, 1].
    pub steering: f64,
    /// Parking brake engaged.
    pub parking_brake: bool,
    /// Horn held.
    pub horn: bool,
}

/// User grab of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseGrab {
    /// Grabbed node.
    pub node: usize,
    /// Point the node is pulled towards.
    pub target: Vec3,
    /// Force per metre of distance.
    pub force: f64,
}

/// Derived per-frame figures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActorMetrics {
    /// Mean node position.
    pub avg_position: Vec3,
    /// Smoothed mean node velocity.
    pub avg_velocity: Vec3,
    /// Highest speed seen (m/s).
    pub top_speed: f64,
    /// Distance covered by the driven wheels (m).
    pub odometer: f64,
    /// Acceleration in g: longitudinal, vertical, lateral.
    pub g_forces: Vec3,
    /// Cinecam node forces summed since the last read.
    pub ffb_force: Vec3,
    /// Hydro stress summed since the last read.
    pub ffb_hydro: f64,
    /// Substeps folded into the force-feedback sums.
    pub ffb_samples: u32,
}

/// Per-substep inputs shared by every actor of a batch.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Simulation settings.
    pub config: &'a SimConfig,
    /// Ground and water.
    pub terrain: &'a dyn TerrainQuery,
    /// Audio.
    pub sound: &'a dyn SoundSink,
    /// Last substep of a rendered frame.
    pub do_update: bool,
    /// Seconds covered by one rendered frame.
    pub frame_dt: f64,
    /// Actor driven by the local player.
    pub player: Option<ActorId>,
}

impl std::fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("do_update", &self.do_update)
            .field("frame_dt", &self.frame_dt)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

// ==================== Actor ====================

/// One simulated vehicle or machine.
///
/// Arrays are indexed by the typed indices of [`sim_types`]; every index
/// stays valid for the actor's lifetime.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Actor {
    /// Instance id.
    pub id: ActorId,
    /// Document name.
    pub name: String,
    /// Sectionconfig selected at spawn.
    pub sectionconfig: Option<String>,
    /// Simulation state.
    pub state: ActorState,
    /// Pause toggle.
    pub paused: bool,

    /// Point masses.
    pub nodes: Vec<Node>,
    /// Spring-dampers.
    pub beams: Vec<Beam>,
    /// Shock parameters, indexed by `Beam::aux`.
    pub shocks: Vec<Shock>,
    /// Hydros and animators.
    pub hydros: Vec<Hydro>,
    /// Command keys, index 0 unused.
    pub command_keys: Vec<CommandKey>,
    /// Rotators.
    pub rotators: Vec<Rotator>,
    /// Triggers, indexed by `Beam::aux`.
    pub triggers: Vec<Trigger>,
    /// Wheels.
    pub wheels: Vec<Wheel>,
    /// Hooks.
    pub hooks: Vec<Hook>,
    /// Ties.
    pub ties: Vec<Tie>,
    /// Ropes.
    pub ropes: Vec<Rope>,
    /// Ropables.
    pub ropables: Vec<Ropable>,
    /// Rails.
    pub rails: Vec<Rail>,
    /// Slidenodes.
    pub slidenodes: Vec<SlideNode>,
    /// Slidenodes are attached.
    pub slidenodes_locked: bool,
    /// Cab triangles.
    pub cabs: Vec<CabTriangle>,
    /// Cameras.
    pub cameras: Vec<Camera>,
    /// Cinecam nodes.
    pub cinecam_nodes: Vec<usize>,

    /// Engine and gearbox.
    pub engine: Option<Engine>,
    /// Differentials and transfer case.
    pub drivetrain: Drivetrain,
    /// Brake forces.
    pub brakes: Brakes,
    /// Traction control and anti-lock brakes.
    pub aids: DrivingAids,
    /// Speed limiter (m/s).
    pub speed_limit: Option<f64>,
    /// Active shock levelling.
    pub stabilizer: Stabilizer,
    /// Hydro input states.
    pub hydro_inputs: HydroInputs,
    /// Driver inputs.
    pub controls: Controls,
    /// Light mask, see [`net::light`].
    pub lights: u32,
    /// Blinker selection.
    pub blinker: Blinker,
    /// Player commands are passed on to linked actors.
    pub forward_commands: bool,
    /// Accepts commands forwarded by a linked actor.
    pub import_commands: bool,
    /// Speedometer full scale (m/s).
    pub speedo_max: f64,

    /// Mass distribution inputs.
    pub mass_spec: MassSpec,
    /// Current total mass.
    pub total_mass: f64,
    /// Total mass at spawn.
    pub initial_total_mass: f64,
    /// Node masses at spawn.
    pub initial_node_masses: Vec<f64>,
    /// Node bounding box.
    pub bounds: Aabb,
    /// Cab collision range.
    pub collision_range: f64,
    /// Ground friction model.
    pub ground_model: GroundModel,

    /// Average driven-wheel speed (m/s).
    pub wheel_speed: f64,
    /// Average driven-wheel spin (rad/s).
    pub wheel_spin: f64,
    /// Simulated seconds.
    pub sim_time: f64,
    /// Derived figures.
    pub metrics: ActorMetrics,
    /// Replay ring.
    pub replay: Option<Replay>,
    /// User grab.
    pub mouse_grab: Option<MouseGrab>,

    pub(crate) pending_reset: Option<ResetKind>,
    pub(crate) pending_links: Vec<LinkRequest>,
    pub(crate) links_changed: bool,
    pub(crate) sleep_timer: f64,
    pub(crate) node_beams: Vec<Vec<usize>>,
    pub(crate) neighbours: Vec<Vec<usize>>,
    pub(crate) cab_nodes: Vec<bool>,
    pub(crate) intra_rates: Vec<CollisionRate>,
    pub(crate) inter_rates: Vec<CollisionRate>,
    pub(crate) grid: PointGrid,
    pub(crate) animator_memory: AnimatorMemory,
    pub(crate) aid_sounds: (bool, bool),
    pub(crate) blink_timer: f64,
    pub(crate) blink_lit: bool,
    pub(crate) stream: StreamBuffer,
    pub(crate) net_compression: f64,
    pub(crate) rng: StdRng,
}

impl Actor {
    /// Actor without any part, in the sleeping state.
    #[must_use]
    pub(crate) fn empty(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sectionconfig: None,
            state: ActorState::LocalSleeping,
            paused: false,
            nodes: Vec::new(),
            beams: Vec::new(),
            shocks: Vec::new(),
            hydros: Vec::new(),
            command_keys: crate::command::key_table(),
            rotators: Vec::new(),
            triggers: Vec::new(),
            wheels: Vec::new(),
            hooks: Vec::new(),
            ties: Vec::new(),
            ropes: Vec::new(),
            ropables: Vec::new(),
            rails: Vec::new(),
            slidenodes: Vec::new(),
            slidenodes_locked: false,
            cabs: Vec::new(),
            cameras: Vec::new(),
            cinecam_nodes: Vec::new(),
            engine: None,
            drivetrain: Drivetrain::default(),
            brakes: Brakes::default(),
            aids: DrivingAids::default(),
            speed_limit: None,
            stabilizer: Stabilizer::default(),
            hydro_inputs: HydroInputs::default(),
            controls: Controls::default(),
            lights: 0,
            blinker: Blinker::Off,
            forward_commands: false,
            import_commands: false,
            speedo_max: DEFAULT_SPEEDO_MAX,
            mass_spec: MassSpec::default(),
            total_mass: 0.0,
            initial_total_mass: 0.0,
            initial_node_masses: Vec::new(),
            bounds: Aabb::empty(),
            collision_range: sim_types::constants::DEFAULT_COLLISION_RANGE,
            ground_model: GroundModel::default(),
            wheel_speed: 0.0,
            wheel_spin: 0.0,
            sim_time: 0.0,
            metrics: ActorMetrics::default(),
            replay: None,
            mouse_grab: None,
            pending_reset: None,
            pending_links: Vec::new(),
            links_changed: false,
            sleep_timer: 0.0,
            node_beams: Vec::new(),
            neighbours: Vec::new(),
            cab_nodes: Vec::new(),
            intra_rates: Vec::new(),
            inter_rates: Vec::new(),
            grid: PointGrid::default(),
            animator_memory: AnimatorMemory::default(),
            aid_sounds: (false, false),
            blink_timer: 0.0,
            blink_lit: false,
            stream: StreamBuffer::default(),
            net_compression: 1.0,
            rng: StdRng::seed_from_u64(u64::from(id.0)),
        }
    }

    /// Rebuild the node-to-beam graph, node neighbours and cab flags.
    pub(crate) fn rebuild_topology(&mut self) {
        let n = self.nodes.len();
        self.node_beams = vec![Vec::new(); n];
        self.neighbours = vec![Vec::new(); n];
        for (i, beam) in self.beams.iter().enumerate() {
            if beam.remote.is_some() {
                continue;
            }
            let [a, b] = [beam.nodes[0].index(), beam.nodes[1].index()];
            if a >= n || b >= n {
                continue;
            }
            self.node_beams[a].push(i);
            self.node_beams[b].push(i);
            if !self.neighbours[a].contains(&b) {
                self.neighbours[a].push(b);
            }
            if !self.neighbours[b].contains(&a) {
                self.neighbours[b].push(a);
            }
        }
        self.cab_nodes = vec![false; n];
        for tri in &self.cabs {
            for &c in &tri.nodes {
                if let Some(flag) = self.cab_nodes.get_mut(c) {
                    *flag = true;
                }
            }
        }
        let contact = self.cabs.iter().filter(|t| t.contact).count();
        self.intra_rates = vec![CollisionRate::default(); contact];
        self.inter_rates = vec![CollisionRate::default(); contact];
    }

    // ---- state ----

    /// Integrated this substep.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.state == ActorState::LocalSimulated && !self.paused && self.pending_reset.is_none()
    }

    /// Reset waiting for the next batch boundary.
    #[must_use]
    pub fn pending_reset(&self) -> Option<ResetKind> {
        self.pending_reset
    }

    /// Queue a reset; a blow-up is never downgraded.
    pub fn request_reset(&mut self, kind: ResetKind) {
        if self.pending_reset != Some(ResetKind::BlowUp) {
            self.pending_reset = Some(kind);
        }
    }

    pub(crate) fn take_link_requests(&mut self) -> Vec<LinkRequest> {
        std::mem::take(&mut self.pending_links)
    }

    // ==================== Substep ====================

    /// Run one integration substep.
    pub fn substep(&mut self, ctx: &StepContext<'_>) {
        if !self.is_simulated() {
            return;
        }
        let dt = ctx.config.physics_dt;
        self.prepare(dt);
        self.integrate_nodes(ctx, dt);
        if self.pending_reset.is_some() {
            return;
        }
        self.cab_buoyancy(ctx);
        self.drive_wheels(ctx, dt);
        self.stabilise(ctx, dt);
        self.drive_hydros(dt);
        self.drive_commands(ctx, dt);
        update_ties(&mut self.ties, &mut self.beams, dt);
        self.tick_engine(ctx, dt);
        self.apply_mouse_grab();
        self.beam_pass(ctx, dt);
        self.self_collisions(dt);
        update_local_slidenodes(&mut self.slidenodes, &self.rails, &mut self.nodes, &self.beams, dt);
        if ctx.player == Some(self.id) {
            self.sample_force_feedback();
        }
        self.sim_time += dt;
    }

    fn prepare(&mut self, dt: f64) {
        if update_hooks(&mut self.hooks, &mut self.beams, &self.nodes, self.id, dt) {
            self.links_changed = true;
        }
        for rope in &self.ropes {
            let Some((target, _)) = rope.target else {
                continue;
            };
            if target.actor != self.id {
                continue;
            }
            let Some((p, v)) = self
                .nodes
                .get(target.node.index())
                .map(|n| (n.position, n.velocity))
            else {
                continue;
            };
            if let Some(end) = self.nodes.get_mut(rope.end) {
                end.position = p;
                end.velocity = v;
            }
        }
    }

    fn integrate_nodes(&mut self, ctx: &StepContext<'_>, dt: f64) {
        let config = ctx.config;
        let gravity = config.gravity;
        let mut blown = None;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if node.mass > 0.0 {
                node.velocity += node.forces * (dt / node.mass);
                node.position += node.velocity * dt;
            }
            let finite = node.position.iter().chain(node.velocity.iter()).all(|c| c.is_finite());
            if blown.is_none() && (!finite || node.velocity.norm_squared() > BLOWUP_SPEED * BLOWUP_SPEED) {
                blown = Some(i);
            }

            node.forces = Vec3::new(0.0, node.mass * gravity, 0.0);
            let speed = node.velocity.norm();
            if config.drag_enabled {
                let drag = DEFAULT_DRAG * speed * node.surface_coef;
                node.forces -= node.velocity * drag;
                if config.turbulence_enabled {
                    let max_tur = drag * speed * 0.005;
                    node.forces += Vec3::new(
                        self.rng.gen_range(-1.0..=1.0),
                        self.rng.gen_range(-1.0..=1.0),
                        self.rng.gen_range(-1.0..=1.0),
                    ) * max_tur;
                }
            }
            if let Some(water) = ctx.terrain.water_height(node.position.x, node.position.z) {
                if node.position.y < water {
                    node.forces -= node.velocity * (DEFAULT_WATERDRAG * speed);
                    node.forces.y += node.buoyancy * node.volume_coef;
                }
            }
        }

        if let Some(node) = blown {
            warn!(actor = %self.id, node, "node velocity out of range, reset scheduled");
            self.request_reset(ResetKind::BlowUp);
            return;
        }

        ground_collisions(&mut self.nodes, ctx.terrain, &self.ground_model, dt);

        if let Some(replay) = &mut self.replay {
            replay.step(self.sim_time, &self.nodes, &self.beams);
        }
        self.bounds = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
    }

    fn cab_buoyancy(&mut self, ctx: &StepContext<'_>) {
        if !self.cabs.iter().any(|t| t.buoyant) {
            return;
        }
        buoyancy(
            &mut self.nodes,
            &self.cabs,
            ctx.terrain,
            ctx.config.gravity,
            DEFAULT_WATERDRAG,
        );
    }

    /// Forward unit vector of the first camera, zero without one.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.cameras
            .first()
            .map_or_else(Vec3::zeros, |c| c.direction(&self.nodes))
    }

    fn drive_wheels(&mut self, ctx: &StepContext<'_>, dt: f64) {
        if self.wheels.is_empty() {
            return;
        }
        let clutch = self.engine.as_ref().map(Engine::wheel_torque);
        self.drivetrain.distribute(&mut self.wheels, clutch, dt);

        let controls = WheelControls {
            direction: self.direction(),
            reference_velocity: self.nodes.first().map_or_else(Vec3::zeros, |n| n.velocity),
            brake: self.controls.brake,
            parking_brake: self.controls.parking_brake,
            steering: self.hydro_inputs.dir_state,
            num_propelled: self.wheels.iter().filter(|w| w.is_propelled()).count(),
        };
        let report = update_wheels(
            &mut self.wheels,
            &mut self.nodes,
            &mut self.aids,
            &self.brakes,
            &controls,
            dt,
        );
        self.wheel_speed = report.wheel_speed;
        self.wheel_spin = report.wheel_spin;
        self.metrics.odometer += report.wheel_speed.abs() * dt;
        if let Some(engine) = &mut self.engine {
            engine.set_wheel_revolutions(report.wheel_spin * RAD_PER_SEC_TO_RPM);
        }
        if ctx.do_update {
            let flags = (report.alb_active, report.tc_active);
            if flags != self.aid_sounds {
                report.emit_sounds(ctx.sound, self.id);
                self.aid_sounds = flags;
            }
        }
    }

    fn stabilise(&mut self, ctx: &StepContext<'_>, dt: f64) {
        if !self.shocks.iter().any(|s| s.role != ShockRole::Normal) {
            return;
        }
        if ctx.do_update {
            if let Some(camera) = self.cameras.first() {
                let roll = camera.roll(&self.nodes);
                if self.stabilizer.adjust(roll, ctx.frame_dt) {
                    trace!(actor = %self.id, roll, "stabiliser pumping");
                }
            }
        }
        self.stabilizer.apply(dt, &self.shocks, &mut self.beams);
    }

    /// Vehicle state for animators.
    #[must_use]
    pub fn animator_frame(&self) -> AnimatorFrame {
        let camera = self.cameras.first();
        AnimatorFrame {
            wheel_speed: self.wheel_speed,
            speedo_max: self.speedo_max,
            brake: self.controls.brake,
            parking_brake: if self.controls.parking_brake { 1.0 } else { 0.0 },
            engine: self.engine.as_ref().map(|e| EngineFrame {
                rpm: e.rpm(),
                max_rpm: e.max_rpm(),
                turbo_psi: e.turbo_psi(),
                accel: e.acc(),
                clutch: e.clutch(),
                gear: e.gear(),
                num_gears: e.num_gears(),
                crank_factor: e.crank_factor(),
            }),
            diff_lock: self
                .drivetrain
                .wheel_diffs
                .first()
                .and_then(|d| d.mode())
                .map(|m| match m {
                    DiffType::Open => 0.0,
                    DiffType::Locked => 1.0,
                    DiffType::Split | DiffType::Viscous => 0.5,
                }),
            camera_dir: camera.map_or_else(Vec3::zeros, |c| c.direction(&self.nodes)),
            camera_roll: camera.map_or_else(Vec3::zeros, |c| c.roll_vector(&self.nodes)),
            reference_position: self.nodes.first().map_or_else(Vec3::zeros, |n| n.position),
            reference_velocity: self.nodes.first().map_or_else(Vec3::zeros, |n| n.velocity),
        }
    }

    fn drive_hydros(&mut self, dt: f64) {
        if self.hydros.is_empty() {
            return;
        }
        let frame = self.animator_frame();
        update_hydros(
            &mut self.hydros,
            &mut self.hydro_inputs,
            &mut self.beams,
            &frame,
            &mut self.animator_memory,
            dt,
        );
    }

    fn drive_commands(&mut self, ctx: &StepContext<'_>, dt: f64) {
        let supply = self.engine.as_ref().map_or_else(HydraulicSupply::default, |e| HydraulicSupply {
            engine_running: Some(e.is_running()),
            hydraulics_ready: e.rpm() > e.idle_rpm() * 0.95,
            crank_factor: e.crank_factor(),
        });
        let load = update_commands(
            &mut self.command_keys,
            &mut self.beams,
            &mut self.rotators,
            supply,
            dt,
            ctx.sound,
            self.id,
        );
        if let Some(engine) = &mut self.engine {
            engine.set_hydro_pump(load.work, load.requested);
        }
        if ctx.do_update && load.active > 0 {
            ctx.sound.modulate(self.id, ModulationSource::Pump, load.work);
        }
        for rotator in &self.rotators {
            rotator.apply_forces(&mut self.nodes);
        }
    }

    fn tick_engine(&mut self, ctx: &StepContext<'_>, dt: f64) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        let mut acc = self.controls.accelerator;
        if let Some(limit) = self.speed_limit {
            let cap = ((limit - (self.wheel_speed / 1.02).abs()) * 2.0).clamp(0.0, 1.0);
            acc = acc.min(cap);
        }
        engine.set_acc(acc);
        let feedback = EngineFeedback {
            brake: self.controls.brake,
            lateral_g: self.metrics.g_forces.z,
        };
        engine.update(dt, ctx.do_update, &feedback);
        if ctx.do_update {
            engine.flush_sounds(ctx.sound, self.id);
        }
    }

    fn apply_mouse_grab(&mut self) {
        let Some(grab) = self.mouse_grab else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(grab.node) {
            node.forces += (grab.target - node.position) * grab.force;
        }
    }

    fn active_connected_beams(&self, node: usize) -> usize {
        self.node_beams
            .get(node)
            .map_or(0, |bs| bs.iter().filter(|&&b| self.beams.get(b).is_some_and(|b| !b.disabled)).count())
    }

    /// Breaking would leave a cab node held by fewer than three beams.
    fn cab_would_tear(&self, a: usize, b: usize) -> bool {
        [a, b].iter().any(|&n| {
            self.cab_nodes.get(n).copied().unwrap_or(false) && self.active_connected_beams(n) < 3
        })
    }

    /// Break a beam and release its detacher group.
    fn break_beam(&mut self, index: usize) {
        let Some(beam) = self.beams.get_mut(index) else {
            return;
        };
        beam.break_apart();
        let group = beam.detacher_group;
        trace!(actor = %self.id, beam = index, "beam broke");
        if group > 0 {
            for other in self.beams.iter_mut().filter(|b| b.detacher_group.abs() == group) {
                other.break_apart();
            }
            for wheel in self.wheels.iter_mut().filter(|w| w.detacher_group == group) {
                wheel.detached = true;
            }
            debug!(actor = %self.id, group, "detacher group released");
        }
    }

    fn beam_pass(&mut self, ctx: &StepContext<'_>, dt: f64) {
        let mut trigger_hits = Vec::new();
        for i in 0..self.beams.len() {
            let beam = &self.beams[i];
            if beam.disabled || beam.remote.is_some() {
                continue;
            }
            let (a, b) = (beam.nodes[0].index(), beam.nodes[1].index());
            let (Some(na), Some(nb)) = (self.nodes.get(a), self.nodes.get(b)) else {
                continue;
            };
            let ext = Extension::measure(
                beam.rest_length,
                na.position,
                na.velocity,
                nb.position,
                nb.velocity,
            );
            let shock = beam.aux.and_then(|s| self.shocks.get(s));
            let (k, d, support_broke) = match (beam.bounded, shock) {
                (BoundedKind::Trigger, _) => {
                    if let Some(t) = beam.aux {
                        trigger_hits.push((t, ext.diff));
                    }
                    continue;
                }
                (BoundedKind::Shock2, Some(s)) => {
                    let (k, d) = s.shock2_spring_damp(beam, ext.diff, ext.rate);
                    (k, d, false)
                }
                (BoundedKind::Shock3, Some(s)) => {
                    let (k, d) = s.shock3_spring_damp(beam, ext.diff, ext.rate);
                    (k, d, false)
                }
                _ => beam.bounded_spring_damp(&ext),
            };

            let (mut slen, breaks) = self.beams[i].resolve_stress(k, d, &ext);
            if support_broke {
                self.beams[i].break_apart();
                trace!(actor = %self.id, beam = i, "support beam overextended");
            }
            if breaks {
                // The break sound plays even when the cab keeps the beam.
                ctx.sound.modulate(self.id, ModulationSource::Break, ext.energy(k));
                ctx.sound.trigger(self.id, SoundTrigger::Break, SoundState::Once);
                if self.cab_would_tear(a, b) {
                    self.beams[i].reinforce();
                } else {
                    slen = 0.0;
                    self.break_beam(i);
                }
            }
            let f = ext.force(slen);
            self.nodes[a].forces += f;
            self.nodes[b].forces -= f;
        }

        if trigger_hits.is_empty() {
            return;
        }
        let mut effects = Vec::new();
        for (t, diff) in trigger_hits {
            trigger::evaluate(
                t,
                diff,
                dt,
                &mut self.triggers,
                &self.beams,
                &mut self.command_keys,
                ctx.do_update,
                &mut effects,
            );
        }
        for effect in effects {
            self.apply_trigger_effect(effect);
        }
    }

    fn apply_trigger_effect(&mut self, effect: TriggerEffect) {
        match effect {
            TriggerEffect::Engine {
                function: EngineTriggerFunction::Brake,
                value,
            } => self.controls.brake = value,
            TriggerEffect::Engine {
                function: EngineTriggerFunction::Accelerator,
                value,
            } => self.controls.accelerator = value.clamp(0.0, 1.0),
            TriggerEffect::Engine { function, value } => {
                if let Some(engine) = &mut self.engine {
                    engine.apply_trigger(function, value);
                }
            }
            TriggerEffect::Hooks { group, lock } => {
                let action = if lock { HookAction::Lock } else { HookAction::Unlock };
                self.pending_links.push(LinkRequest::Hooks {
                    group: i32::try_from(group).unwrap_or(-1),
                    action,
                });
            }
        }
    }

    fn self_collisions(&mut self, dt: f64) {
        if self.intra_rates.is_empty() {
            return;
        }
        self.grid.clear();
        for (i, node) in self.nodes.iter().enumerate().filter(|(_, n)| n.flags.contactable) {
            self.grid.insert(PointRef { actor: self.id, node: i }, node.position);
        }
        intra_actor_collisions(
            &mut self.nodes,
            &self.cabs,
            &mut self.intra_rates,
            &self.grid,
            self.collision_range,
            dt,
            &self.ground_model,
        );
    }

    fn sample_force_feedback(&mut self) {
        if let Some(n) = self.cinecam_nodes.first().and_then(|&c| self.nodes.get(c)) {
            self.metrics.ffb_force += n.forces;
        }
        self.metrics.ffb_hydro += self
            .hydros
            .iter()
            .filter_map(|h| self.beams.get(h.beam))
            .map(|b| b.stress)
            .sum::<f64>();
        self.metrics.ffb_samples += 1;
    }

    /// Take and clear the force-feedback sums: mean cinecam force and mean
    /// hydro stress.
    pub fn take_force_feedback(&mut self) -> (Vec3, f64) {
        let n = f64::from(self.metrics.ffb_samples.max(1));
        let out = (self.metrics.ffb_force / n, self.metrics.ffb_hydro / n);
        self.metrics.ffb_force = Vec3::zeros();
        self.metrics.ffb_hydro = 0.0;
        self.metrics.ffb_samples = 0;
        out
    }

    // ==================== Frame updates ====================

    /// Update the derived figures after a batch covering `frame_dt` seconds.
    pub(crate) fn update_metrics(&mut self, frame_dt: f64) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let position = self.nodes.iter().map(|n| n.position).sum::<Vec3>() / n;
        let velocity = self.nodes.iter().map(|n| n.velocity).sum::<Vec3>() / n;
        if frame_dt > 0.0 {
            let accel = (velocity - self.metrics.avg_velocity) / frame_dt / STANDARD_G;
            let forward = self.direction();
            let left = self
                .cameras
                .first()
                .map_or_else(Vec3::zeros, |c| c.roll_vector(&self.nodes));
            let up = forward.cross(&left);
            self.metrics.g_forces = Vec3::new(accel.dot(&forward), accel.dot(&up), accel.dot(&left));
        }
        self.metrics.avg_position = position;
        self.metrics.avg_velocity = velocity;
        self.metrics.top_speed = self.metrics.top_speed.max(velocity.norm());
        self.bounds = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
    }

    /// Advance the blinker lamp.
    pub fn update_blinker(&mut self, dt: f64) {
        if self.blinker == Blinker::Off {
            self.blink_timer = 0.0;
            self.blink_lit = false;
            return;
        }
        self.blink_timer += dt;
        if self.blink_timer >= BLINK_PERIOD {
            self.blink_timer -= BLINK_PERIOD;
            self.blink_lit = !self.blink_lit;
        }
    }

    /// Blinker lamp currently lit.
    #[must_use]
    pub fn blinker_lit(&self) -> bool {
        self.blink_lit
    }

    // ==================== Input ====================

    /// Apply one input event.
    ///
    /// Link toggles need the other actors and are queued for the manager.
    pub fn apply_input(&mut self, event: InputEvent, sound: &dyn SoundSink) {
        match event {
            InputEvent::Accelerator(v) => self.controls.accelerator = v.clamp(0.0, 1.0),
            InputEvent::Brake(v) => self.controls.brake = v.clamp(0.0, 1.0),
            InputEvent::Clutch(v) => {
                if let Some(engine) = &mut self.engine {
                    engine.set_clutch(1.0 - v.clamp(0.0, 1.0));
                }
            }
            InputEvent::Steering(v) => {
                let v = v.clamp(-1.0, 1.0);
                self.controls.steering = v;
                self.hydro_inputs.dir_command = v;
            }
            InputEvent::Command { key, value } => match self.command_keys.get_mut(key) {
                Some(k) if key > 0 => k.player_input = value.clamp(0.0, 1.0),
                _ => debug!(actor = %self.id, key, "command key out of range"),
            },
            InputEvent::ShiftUp => self.shift(1),
            InputEvent::ShiftDown => self.shift(-1),
            InputEvent::SelectGear(gear) => {
                if let Some(engine) = &mut self.engine {
                    engine.shift_to(gear);
                }
            }
            InputEvent::ToggleShiftMode => {
                if let Some(engine) = &mut self.engine {
                    engine.toggle_auto_mode();
                }
            }
            InputEvent::ToggleContact => {
                if let Some(engine) = &mut self.engine {
                    engine.toggle_contact();
                }
            }
            InputEvent::StartEngine => {
                if let Some(engine) = &mut self.engine {
                    engine.start();
                }
            }
            InputEvent::Starter(on) => {
                if let Some(engine) = &mut self.engine {
                    engine.set_starter(on);
                }
            }
            InputEvent::Horn(on) => {
                if on != self.controls.horn {
                    self.controls.horn = on;
                    let state = if on { SoundState::Start } else { SoundState::Stop };
                    sound.trigger(self.id, SoundTrigger::Horn, state);
                }
            }
            InputEvent::ToggleLights => self.lights ^= net::light::HEADLIGHT,
            InputEvent::Blinker(b) => self.set_blinker(b, sound),
            InputEvent::ToggleParkingBrake => {
                self.controls.parking_brake = !self.controls.parking_brake;
                sound.trigger(self.id, SoundTrigger::Parking, SoundState::Once);
            }
            InputEvent::ToggleHooks => self.pending_links.push(LinkRequest::Hooks {
                group: -1,
                action: HookAction::Toggle,
            }),
            InputEvent::ToggleTies => self.pending_links.push(LinkRequest::Ties { group: -1 }),
            InputEvent::ToggleRopes => self.pending_links.push(LinkRequest::Ropes { group: -1 }),
            InputEvent::ToggleSlideNodes => self.pending_links.push(LinkRequest::SlideNodes),
            InputEvent::Repair => self.request_reset(ResetKind::Repair),
            InputEvent::TogglePause => self.paused = !self.paused,
        }
    }

    fn shift(&mut self, dir: i32) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        match (engine.auto_mode(), dir > 0) {
            (GearboxMode::Automatic, true) => engine.auto_shift_up(),
            (GearboxMode::Automatic, false) => engine.auto_shift_down(),
            _ => engine.shift(dir),
        }
    }

    fn set_blinker(&mut self, blinker: Blinker, sound: &dyn SoundSink) {
        use net::light::{BLINK_LEFT, BLINK_RIGHT, BLINK_WARN};
        // Selecting the active side again switches it off.
        let blinker = if blinker == self.blinker { Blinker::Off } else { blinker };
        self.blinker = blinker;
        self.lights &= !(BLINK_LEFT | BLINK_RIGHT | BLINK_WARN);
        self.lights |= match blinker {
            Blinker::Off => 0,
            Blinker::Left => BLINK_LEFT,
            Blinker::Right => BLINK_RIGHT,
            Blinker::Warn => BLINK_WARN,
        };
        let state = if blinker == Blinker::Off { SoundState::Stop } else { SoundState::Start };
        sound.trigger(self.id, SoundTrigger::TurnSignal, state);
    }

    // ==================== Links ====================

    /// Snapshot of what other actors may lock onto.
    #[must_use]
    pub fn lock_candidates(&self) -> LockCandidates {
        LockCandidates {
            actor: self.id,
            positions: self.nodes.iter().map(|n| n.position).collect(),
            lockgroups: self.nodes.iter().map(|n| n.lockgroup).collect(),
            ropables: self
                .ropables
                .iter()
                .enumerate()
                .map(|(index, r)| RopableSlot {
                    index,
                    node: r.node,
                    position: self.nodes.get(r.node).map_or_else(Vec3::zeros, |n| n.position),
                    group: r.group,
                    multilock: r.multilock,
                    attached_ties: 0,
                    attached_ropes: 0,
                })
                .collect(),
            rails: self.rails.iter().map(|r| r.snapshot(&self.nodes)).collect(),
        }
    }

    /// Run a link toggle against a world snapshot. Returns true on change.
    pub fn toggle_links(&mut self, request: LinkRequest, world: &LockWorld) -> bool {
        let changed = match request {
            LinkRequest::Hooks { group, action } => toggle_hooks(
                &mut self.hooks,
                &mut self.beams,
                &self.nodes,
                self.id,
                group,
                action,
                world,
            ),
            LinkRequest::Ties { group } => {
                toggle_ties(&mut self.ties, &mut self.beams, &self.nodes, self.id, group, world)
            }
            LinkRequest::Ropes { group } => {
                toggle_ropes(&mut self.ropes, &self.beams, &self.nodes, group, world)
            }
            LinkRequest::SlideNodes => toggle_slidenode_lock(
                &mut self.slidenodes,
                &mut self.slidenodes_locked,
                self.id,
                &self.nodes,
                world,
            ),
        };
        if changed {
            debug!(actor = %self.id, ?request, "links changed");
            self.links_changed = true;
        }
        changed
    }

    /// Actors this one holds through hooks, ties, ropes or slidenodes.
    #[must_use]
    pub fn direct_links(&self) -> Vec<ActorId> {
        let mut out: Vec<ActorId> = self
            .beams
            .iter()
            .filter(|b| !b.disabled)
            .filter_map(|b| b.remote)
            .chain(self.ropes.iter().filter_map(|r| r.target.map(|(t, _)| t.actor)))
            .chain(self.slidenodes.iter().filter_map(SlideNode::foreign_actor))
            .filter(|a| *a != self.id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    // ==================== Reset ====================

    /// Back to the spawn pose with every structural beam mended.
    ///
    /// Hook, tie and rope links survive.
    pub fn reset_in_place(&mut self) {
        let link_beams: Vec<usize> = self
            .hooks
            .iter()
            .map(|h| h.beam)
            .chain(self.ties.iter().map(|t| t.beam))
            .collect();
        for node in &mut self.nodes {
            node.reset();
        }
        for (node, mass) in self.nodes.iter_mut().zip(&self.initial_node_masses) {
            node.mass = *mass;
        }
        self.total_mass = self.initial_total_mass;
        for (i, beam) in self.beams.iter_mut().enumerate() {
            if !link_beams.contains(&i) {
                beam.repair();
            }
        }
        for wheel in &mut self.wheels {
            wheel.reset();
        }
        for key in &mut self.command_keys {
            key.command_inertia.reset();
            key.rotator_inertia.reset();
        }
        for hydro in &mut self.hydros {
            hydro.inertia.reset();
        }
        for rotator in &mut self.rotators {
            rotator.angle = 0.0;
        }
        for sn in &mut self.slidenodes {
            if sn.foreign_actor().is_none() {
                sn.reset();
            }
        }
        self.drivetrain.reset();
        self.stabilizer = Stabilizer::default();
        self.hydro_inputs = HydroInputs::default();
        self.animator_memory = AnimatorMemory::default();
        if let Some(replay) = &mut self.replay {
            replay.clear();
        }
        self.wheel_speed = 0.0;
        self.wheel_spin = 0.0;
        self.bounds = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
    }

    /// Stop every node and lift the actor clear of the ground.
    pub fn soft_respawn(&mut self, terrain: &dyn TerrainQuery) {
        let mut lift: f64 = 0.0;
        for node in &mut self.nodes {
            node.velocity = Vec3::zeros();
            node.forces = Vec3::zeros();
            if let Some(h) = terrain.ground_height(node.position.x, node.position.z) {
                lift = lift.max(h - node.position.y);
            }
        }
        if lift > 0.0 {
            for node in &mut self.nodes {
                node.position.y += lift;
            }
        }
        for wheel in &mut self.wheels {
            wheel.reset();
        }
        self.bounds = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
    }

    /// Honour a queued reset. Returns what was done.
    pub(crate) fn apply_pending_reset(&mut self, terrain: &dyn TerrainQuery) -> Option<ResetKind> {
        let kind = self.pending_reset.take()?;
        match kind {
            ResetKind::Repair | ResetKind::BlowUp => self.reset_in_place(),
            ResetKind::SoftRespawn => self.soft_respawn(terrain),
        }
        debug!(actor = %self.id, ?kind, "actor reset");
        Some(kind)
    }

    // ==================== Mass ====================

    /// Recompute node masses from the mass inputs; returns the total.
    pub fn recalculate_masses(&mut self) -> f64 {
        self.total_mass = recalculate_node_masses(&mut self.nodes, &self.beams, &self.mass_spec);
        self.total_mass
    }

    /// Change the dry mass and redistribute.
    pub fn set_mass(&mut self, dry_mass: f64) {
        self.mass_spec.dry_mass = dry_mass;
        self.recalculate_masses();
    }

    /// Override one node's mass. Returns false for a bad index.
    pub fn set_node_mass(&mut self, node: usize, mass: f64) -> bool {
        let Some(n) = self.nodes.get_mut(node) else {
            return false;
        };
        n.mass = mass;
        self.total_mass = self.nodes.iter().map(|n| n.mass).sum();
        true
    }

    // ==================== Queries ====================

    /// Mean node position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.metrics.avg_position
    }

    /// Heading around the vertical axis in radians, 0 facing -Z.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        let dir = self.direction();
        dir.x.atan2(-dir.z)
    }

    /// Speed of the mean node velocity.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.metrics.avg_velocity.norm()
    }

    /// Node count.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// One node.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Current gear, 0 without an engine.
    #[must_use]
    pub fn gear(&self) -> i32 {
        self.engine.as_ref().map_or(0, Engine::gear)
    }

    /// Engine rpm, 0 without an engine.
    #[must_use]
    pub fn rpm(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, Engine::rpm)
    }

    // ==================== Network ====================

    /// Header of an outgoing stream update.
    #[must_use]
    pub fn vehicle_state(&self, time_ms: i32) -> VehicleState {
        use net::flag;
        let mut flags = 0;
        if self.controls.horn {
            flags |= flag::HORN;
        }
        if self.controls.parking_brake {
            flags |= flag::PARKING_BRAKE;
        }
        if self.aids.tc.active {
            flags |= flag::TC_ACTIVE;
        }
        if self.aids.alb.active {
            flags |= flag::ALB_ACTIVE;
        }
        let (mut rpm, mut acc, mut clutch, mut gear) = (0.0, 0.0, 0.0, 0);
        if let Some(e) = &self.engine {
            rpm = e.rpm();
            acc = e.acc();
            clutch = e.clutch();
            gear = e.gear();
            if e.has_contact() {
                flags |= flag::ENGINE_CONTACT;
            }
            if e.is_running() {
                flags |= flag::ENGINE_RUN;
            }
            flags |= match e.auto_mode() {
                GearboxMode::Automatic => flag::MODE_AUTOMATIC,
                GearboxMode::SemiAuto => flag::MODE_SEMIAUTO,
                GearboxMode::Manual => flag::MODE_MANUAL,
                GearboxMode::ManualStick => flag::MODE_MANUAL_STICK,
                GearboxMode::ManualRanges => flag::MODE_MANUAL_RANGES,
            };
        }
        let mut lights = self.lights;
        if self.controls.brake > 0.01 {
            lights |= net::light::BRAKES;
        }
        if gear < 0 {
            lights |= net::light::REVERSE;
        }
        VehicleState {
            time: time_ms,
            engine_rpm: rpm as f32,
            accelerator: acc as f32,
            clutch: clutch as f32,
            gear,
            steering: self.hydro_inputs.dir_state as f32,
            brake: self.controls.brake as f32,
            wheel_speed: self.wheel_speed as f32,
            flags,
            lights,
        }
    }

    /// Outgoing stream update of this actor.
    #[must_use]
    pub fn stream_update(&self, time_ms: i32) -> ActorStreamUpdate {
        ActorStreamUpdate::pack(
            self.vehicle_state(time_ms),
            self.nodes.iter().map(|n| n.position),
            self.bounds.center(),
            self.net_compression,
            self.wheels.iter().map(|w| w.net_rp),
        )
    }

    /// Queue an update received for this (remote) actor.
    pub fn push_stream_update(&mut self, update: ActorStreamUpdate) {
        self.stream.push(update);
    }

    /// Pose a networked actor from its stream at receiver time `now_ms`.
    ///
    /// Returns false when no bracketing updates are queued.
    pub fn apply_stream(&mut self, now_ms: i32) -> bool {
        let Some(pose) = self.stream.sample(now_ms, self.net_compression) else {
            return false;
        };
        if pose.positions.len() != self.nodes.len() {
            warn!(actor = %self.id, got = pose.positions.len(), "stream node count mismatch");
            return false;
        }
        for ((node, p), v) in self.nodes.iter_mut().zip(&pose.positions).zip(&pose.velocities) {
            node.position = *p;
            node.velocity = *v;
        }
        for (wheel, rot) in self.wheels.iter().zip(&pose.wheel_rotations) {
            net::place_wheel_nodes(wheel, &mut self.nodes, *rot);
        }
        self.controls.brake = f64::from(pose.state.brake);
        self.lights = pose.state.lights;
        self.wheel_speed = f64::from(pose.state.wheel_speed);
        self.bounds = Aabb::from_points(self.nodes.iter().map(|n| &n.position));
        true
    }

    /// Dashboard of this actor for telemetry.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        use net::light::{BLINK_LEFT, BLINK_RIGHT, BLINK_WARN, HEADLIGHT};
        let engine = self.engine.as_ref();
        let lit = |mask: u32| self.blink_lit && self.lights & mask != 0;
        Dashboard {
            name: self.name.clone(),
            has_engine: engine.is_some(),
            has_turbo: engine.is_some_and(|e| !matches!(e.turbo(), crate::engine::Turbo::None)),
            gear: self.gear(),
            wheel_speed: self.wheel_speed,
            rpm: self.rpm(),
            turbo_psi: engine.map_or(0.0, Engine::turbo_psi),
            throttle: engine.map_or(0.0, Engine::acc),
            brake: self.controls.brake,
            clutch: engine.map_or(0.0, Engine::clutch),
            parking_brake: self.controls.parking_brake,
            headlights: self.lights & HEADLIGHT != 0,
            contact: engine.is_some_and(Engine::has_contact),
            running: engine.is_some_and(Engine::is_running),
            blinkers: [lit(BLINK_LEFT), lit(BLINK_RIGHT), lit(BLINK_WARN)],
            tc: (!self.aids.tc.no_dashboard).then_some(self.aids.tc.enabled),
            alb: (!self.aids.alb.no_dashboard).then_some(self.aids.alb.enabled),
        }
    }
}
