//! Turning a parsed document into a live [`Actor`].
//!
//! Spawning runs in three passes:
//!
//! 1. **Numbering.** The document numbers generated nodes across every
//!    module, active or not. The spawn keeps only the selected modules, so a
//!    remap table translates document indices into live ones.
//! 2. **Build.** Records are processed keyword by keyword in a fixed order,
//!    each with the presets in force at its line, and appended to the arrays
//!    of a [`BuildContext`].
//! 3. **Finish.** Placement on the terrain, masses, connectivity, drivetrain
//!    and replay setup.
//!
//! Spawning is all-or-nothing: any [`SpawnError`] drops the partial actor.

use std::f64::consts::TAU;

use hashbrown::HashMap;
use nalgebra::{Unit, UnitQuaternion};
use sim_truck::document::records as rec;
use sim_truck::document::{BeamDefaults, NodeDefaults};
use sim_truck::{Document, Entry, Keyword, Module, NodeList, NodeRef, Record};
use sim_types::constants::{
    DEFAULT_DETACHER_GROUP, HOOK_RANGE_DEFAULT, HOOK_SPEED_DEFAULT, MAX_COMMANDS,
    NODE_DEFAULT_MASS, NODE_FRICTION_COEF_DEFAULT, NODE_LOCKGROUP_DEFAULT,
    NODE_SURFACE_COEF_DEFAULT, NODE_VOLUME_COEF_DEFAULT, ROTATOR_FORCE, ROTATOR_TOLERANCE,
    DEFAULT_MINIMASS, SUPPORT_BEAM_LIMIT,
};
use sim_types::{ActorId, Aabb, NodeIdx, SimConfig, TerrainQuery, Vec3};
use tracing::{debug, info, warn};

use crate::actor::{Actor, ActorState, Camera};
use crate::animator::Animator;
use crate::beam::{Beam, BeamType, BoundedKind};
use crate::collision::CabTriangle;
use crate::command::{CommandBeam, CommandBeamState, Hydro, HydroFlags, Rotator};
use crate::differential::{Differential, TransferCase};
use crate::engine::Engine;
use crate::error::SpawnError;
use crate::inertia::KeyInertia;
use crate::links::{Hook, Ropable, Rope, Tie, LOCKGROUP_DENY};
use crate::node::Node;
use crate::replay::Replay;
use crate::shock::{Shock, ShockRole};
use crate::slidenode::{Rail, SlideNode};
use crate::trigger::{self, TriggerSetup};
use crate::wheel::{Brakes, Wheel};

/// Friction of `wheels2` tyre nodes per metre of wheel width.
const WHEEL_FRICTION_COEF: f64 = 2.0;

/// Margin around the spawn box before an actor counts as sticking out.
const SPAWN_BOX_MARGIN: f64 = 0.2;

/// Keyword processing order.
///
/// Node generators come first and in registry order, so live node indices
/// grow in the order the remap table hands them out.
const BUILD_ORDER: &[Keyword] = &[
    Keyword::Forwardcommands,
    Keyword::Importcommands,
    Keyword::Minimass,
    Keyword::Globals,
    Keyword::Engine,
    Keyword::Engoption,
    Keyword::Engturbo,
    Keyword::Torquecurve,
    Keyword::Brakes,
    Keyword::Nodes,
    Keyword::Nodes2,
    Keyword::Cinecam,
    Keyword::Wheels,
    Keyword::Wheels2,
    Keyword::Meshwheels,
    Keyword::Meshwheels2,
    Keyword::Flexbodywheels,
    Keyword::Wheeldetachers,
    Keyword::Nodecollision,
    Keyword::Beams,
    Keyword::Shocks,
    Keyword::Shocks2,
    Keyword::Shocks3,
    Keyword::Commands,
    Keyword::Commands2,
    Keyword::Hydros,
    Keyword::Triggers,
    Keyword::Ropes,
    Keyword::AntiLockBrakes,
    Keyword::Axles,
    Keyword::TransferCase,
    Keyword::Interaxles,
    Keyword::Contacters,
    Keyword::Cameras,
    Keyword::Hooks,
    Keyword::Ties,
    Keyword::Ropables,
    Keyword::Animators,
    Keyword::TractionControl,
    Keyword::Rotators,
    Keyword::Rotators2,
    Keyword::Lockgroups,
    Keyword::Railgroups,
    Keyword::Slidenodes,
    Keyword::Speedlimiter,
    Keyword::Cab,
    Keyword::Fixes,
];

// ==================== Request ====================

/// Where and how to spawn an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSpawnRequest {
    /// Sectionconfig selecting optional modules; `None` spawns only the
    /// implicit ones.
    pub sectionconfig: Option<String>,
    /// Spawn position; node positions in the document are relative to it.
    pub position: Vec3,
    /// Rotation about `position`.
    pub rotation: UnitQuaternion<f64>,
    /// Area the actor must fit into; moved sideways when it sticks out.
    pub spawn_box: Option<Aabb>,
    /// Place node 0 exactly at `position` instead of settling on the ground.
    pub free_position: bool,
    /// Driven by a network stream instead of the local integrator.
    pub remote: bool,
    /// Visual skin name, carried for the frontend.
    pub skin: Option<String>,
}

impl Default for ActorSpawnRequest {
    fn default() -> Self {
        Self {
            sectionconfig: None,
            position: Vec3::zeros(),
            rotation: UnitQuaternion::identity(),
            spawn_box: None,
            free_position: false,
            remote: false,
            skin: None,
        }
    }
}

impl ActorSpawnRequest {
    /// Spawn at `position` with no rotation.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Rotate the actor about its spawn position.
    #[must_use]
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Select a sectionconfig.
    #[must_use]
    pub fn with_sectionconfig(mut self, name: impl Into<String>) -> Self {
        self.sectionconfig = Some(name.into());
        self
    }

    /// Keep the actor inside `area`.
    #[must_use]
    pub fn with_spawn_box(mut self, area: Aabb) -> Self {
        self.spawn_box = Some(area);
        self
    }

    /// Skip ground settling.
    #[must_use]
    pub fn free_position(mut self) -> Self {
        self.free_position = true;
        self
    }

    /// Spawn as a network-driven actor.
    #[must_use]
    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }
}

// ==================== Numbering ====================

/// Live index of every document node index; `None` for nodes of modules
/// that are not spawned.
#[derive(Debug, Clone, Default)]
struct NodeMap {
    live: Vec<Option<usize>>,
    count: usize,
}

fn generated_nodes(record: &Record) -> usize {
    match record {
        Record::Node(_) | Record::Cinecam(_) => 1,
        Record::Wheel(w) => 2 * w.base.rays as usize,
        Record::MeshWheel(w) => 2 * w.base.rays as usize,
        Record::Wheel2(w) => 4 * w.base.rays as usize,
        Record::FlexBodyWheel(w) => 4 * w.base.rays as usize,
        _ => 0,
    }
}

impl NodeMap {
    fn build(doc: &Document, config: Option<&str>) -> Self {
        let mut map = Self::default();
        for keyword in Keyword::NODE_GENERATORS {
            let mut generators: Vec<(usize, bool, usize)> = doc
                .modules
                .iter()
                .flat_map(|m| {
                    let active = m.is_active(config);
                    m.entries_of(keyword)
                        .map(move |e| (e.line, active, generated_nodes(&e.record)))
                })
                .collect();
            generators.sort_by_key(|g| g.0);
            for (_, active, count) in generators {
                for _ in 0..count {
                    if active {
                        map.live.push(Some(map.count));
                        map.count += 1;
                    } else {
                        map.live.push(None);
                    }
                }
            }
        }
        map
    }

    fn get(&self, doc_index: NodeIdx) -> Option<usize> {
        self.live.get(doc_index.index()).copied().flatten()
    }
}

/// Entries of `keyword` in the selected modules, in file order.
fn entries_in_order<'d>(modules: &[&'d Module], keyword: Keyword) -> Vec<(&'d Module, &'d Entry)> {
    let mut out: Vec<(&Module, &Entry)> = modules
        .iter()
        .flat_map(|&m| m.entries_of(keyword).map(move |e| (m, e)))
        .collect();
    out.sort_by_key(|(_, e)| e.line);
    out
}

// ==================== Spawning ====================

/// Build a live actor from `doc`.
///
/// # Errors
///
/// Any [`SpawnError`]; nothing is left behind on failure.
pub fn spawn_actor(
    doc: &Document,
    id: ActorId,
    request: &ActorSpawnRequest,
    config: &SimConfig,
    terrain: &dyn TerrainQuery,
) -> Result<Actor, SpawnError> {
    let selected = request.sectionconfig.as_deref();
    if let Some(name) = selected {
        if !doc.has_sectionconfig(name) {
            return Err(SpawnError::UnknownSectionconfig(name.to_owned()));
        }
    }
    let modules: Vec<&Module> = doc.active_modules(selected).collect();
    let mut ctx = BuildContext::new(doc, id, request);
    for &keyword in BUILD_ORDER {
        for (module, entry) in entries_in_order(&modules, keyword) {
            ctx.process(module, entry)?;
        }
    }
    ctx.finish(request, config, terrain)
}

/// Geometry shared by every wheel builder.
struct WheelFrame {
    axis: [usize; 2],
    hubs: [Vec3; 2],
    arm: usize,
    near_attach: usize,
    /// Rigidity node and whether it sits closer to `axis[0]`.
    rigidity: Option<(usize, bool)>,
    rays: usize,
}

impl WheelFrame {
    fn axis_dir(&self) -> Unit<Vec3> {
        Unit::new_normalize(self.hubs[1] - self.hubs[0])
    }

    fn turn(&self, steps: usize) -> UnitQuaternion<f64> {
        #[allow(clippy::cast_precision_loss)]
        let angle = -TAU / steps as f64;
        UnitQuaternion::from_axis_angle(&self.axis_dir(), angle)
    }
}

/// A unit vector perpendicular to `axis`.
fn perpendicular(axis: &Vec3) -> Vec3 {
    let p = axis.cross(&Vec3::x());
    let p = if p.norm_squared() < 1e-12 {
        axis.cross(&Vec3::y())
    } else {
        p
    };
    p.normalize()
}

/// Arrays of an actor under construction.
///
/// Owns the actor until [`finish`](Self::finish) hands it over; records
/// append to it through the `process` dispatch.
pub struct BuildContext<'d> {
    actor: Actor,
    map: NodeMap,
    origin: Vec3,
    global_minimass: f64,
    fixes: usize,
    engine: Option<&'d rec::Engine>,
    engoption: Option<&'d rec::Engoption>,
    engturbo: Option<&'d rec::Engturbo>,
    torque_curve: Option<&'d rec::TorqueCurve>,
    railgroups: HashMap<i32, usize>,
}

impl<'d> BuildContext<'d> {
    fn new(doc: &Document, id: ActorId, request: &ActorSpawnRequest) -> Self {
        let mut actor = Actor::empty(id, doc.name.clone());
        actor.sectionconfig.clone_from(&request.sectionconfig);
        Self {
            actor,
            map: NodeMap::build(doc, request.sectionconfig.as_deref()),
            origin: request.position,
            global_minimass: DEFAULT_MINIMASS,
            fixes: 0,
            engine: None,
            engoption: None,
            engturbo: None,
            torque_curve: None,
            railgroups: HashMap::new(),
        }
    }

    // ---- lookups ----

    fn node(&self, r: &NodeRef, line: usize) -> Result<usize, SpawnError> {
        self.map
            .get(r.idx())
            .filter(|&i| i < self.actor.nodes.len())
            .ok_or_else(|| SpawnError::UnresolvedNode {
                line,
                reference: r.text.clone(),
            })
    }

    fn nodes<const N: usize>(&self, refs: &[NodeRef; N], line: usize) -> Result<[usize; N], SpawnError> {
        let mut out = [0; N];
        for (slot, r) in out.iter_mut().zip(refs) {
            *slot = self.node(r, line)?;
        }
        Ok(out)
    }

    fn node_list(&self, list: &NodeList, line: usize) -> Result<Vec<usize>, SpawnError> {
        list.resolved
            .iter()
            .map(|&i| {
                self.map
                    .get(i)
                    .filter(|&n| n < self.actor.nodes.len())
                    .ok_or_else(|| SpawnError::UnresolvedNode {
                        line,
                        reference: i.to_string(),
                    })
            })
            .collect()
    }

    fn position(&self, node: usize) -> Vec3 {
        self.actor.nodes.get(node).map_or(self.origin, |n| n.position)
    }

    fn distance(&self, a: usize, b: usize) -> f64 {
        (self.position(a) - self.position(b)).norm()
    }

    // ---- beams ----

    /// A beam between two existing nodes with the preset defaults.
    fn make_beam(&self, a: usize, b: usize, defaults: &BeamDefaults, detacher_group: i32) -> Beam {
        let mut beam = Beam::new(NodeIdx::at(a), NodeIdx::at(b));
        beam.detacher_group = detacher_group;
        beam.set_deform(defaults.scaled_deform());
        beam.set_strength(defaults.break_force);
        beam.plastic_coef = defaults.plastic_coef.unwrap_or(0.0);
        beam.set_length(self.distance(a, b));
        beam
    }

    /// A beam written in the document; its endpoints must be distinct.
    fn authored_beam(&self, module: &Module, entry: &Entry, refs: &[NodeRef; 2]) -> Result<Beam, SpawnError> {
        let [a, b] = self.nodes(refs, entry.line)?;
        if self.distance(a, b) < f64::EPSILON {
            return Err(SpawnError::ZeroLengthBeam {
                line: entry.line,
                a: NodeIdx::at(a).0,
                b: NodeIdx::at(b).0,
            });
        }
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.make_beam(a, b, &defaults, module.presets.detacher_group(&entry.presets));
        beam.set_strength(defaults.scaled_break());
        beam.k = defaults.scaled_spring();
        beam.d = defaults.scaled_damp();
        Ok(beam)
    }

    fn push_beam(&mut self, beam: Beam) -> usize {
        self.actor.beams.push(beam);
        self.actor.beams.len() - 1
    }

    /// Tyre or rim beam; bounded as a shock when `bounds.0` is positive.
    fn wheel_beam(&mut self, defaults: &BeamDefaults, a: usize, b: usize, spring: f64, damp: f64, bounds: (f64, f64)) -> usize {
        let mut beam = self.make_beam(a, b, defaults, DEFAULT_DETACHER_GROUP);
        beam.k = spring;
        beam.d = damp;
        beam.beam_type = BeamType::Normal;
        if bounds.0 > 0.0 {
            beam.short_bound = bounds.0;
            beam.long_bound = bounds.1;
            beam.bounded = BoundedKind::Shock1;
        }
        self.push_beam(beam)
    }

    fn virtual_beam(&mut self, defaults: &BeamDefaults, a: usize, b: usize, spring: f64, damp: f64) {
        let i = self.wheel_beam(defaults, a, b, spring, damp, (-1.0, -1.0));
        if let Some(beam) = self.actor.beams.get_mut(i) {
            beam.beam_type = BeamType::Virtual;
        }
    }

    // ---- dispatch ----

    fn process(&mut self, module: &'d Module, entry: &'d Entry) -> Result<(), SpawnError> {
        let line = entry.line;
        match &entry.record {
            Record::Flag => match entry.keyword {
                Keyword::Forwardcommands => self.actor.forward_commands = true,
                Keyword::Importcommands => self.actor.import_commands = true,
                _ => {}
            },
            Record::Minimass(m) => {
                self.global_minimass = m.min_mass;
                self.actor.mass_spec.minimass_skip_loaded = m.skip_loaded;
            }
            Record::Globals(g) => {
                self.actor.mass_spec.dry_mass = g.dry_mass;
                self.actor.mass_spec.load_mass = g.cargo_mass;
            }
            Record::Engine(e) => self.engine = Some(e),
            Record::Engoption(e) => self.engoption = Some(e),
            Record::Engturbo(e) => self.engturbo = Some(e),
            Record::TorqueCurve(c) => self.torque_curve = Some(c),
            Record::Brakes(b) => self.actor.brakes = Brakes::new(b.force, b.parking_force),
            Record::Node(n) => self.add_node(module, entry, n),
            Record::Cinecam(c) => self.add_cinecam(module, entry, c)?,
            Record::Wheel(w) => {
                self.add_wheel(module, entry, &w.base, w.radius, (w.spring, w.damp), (w.spring, w.damp), 0.0)?;
            }
            Record::MeshWheel(w) => {
                let defaults = module.presets.beam_defaults(&entry.presets);
                let (rim, max_ext) = if entry.keyword == Keyword::Meshwheels2 {
                    ((defaults.spring, defaults.damp), 0.15)
                } else {
                    ((w.spring, w.damp), 0.0)
                };
                self.add_wheel(module, entry, &w.base, w.tyre_radius, (w.spring, w.damp), rim, max_ext)?;
            }
            Record::Wheel2(w) => self.add_wheel2(module, entry, w)?,
            Record::FlexBodyWheel(w) => self.add_flexbody_wheel(module, entry, w)?,
            Record::WheelDetacher(d) => {
                match usize::try_from(d.wheel).ok().and_then(|w| self.actor.wheels.get_mut(w)) {
                    Some(wheel) => wheel.detacher_group = d.group,
                    None => warn!(line, wheel = d.wheel, "wheel detacher names no wheel, skipped"),
                }
            }
            Record::NodeCollision { node, radius } => {
                let n = self.node(node, line)?;
                if let Some(node) = self.actor.nodes.get_mut(n) {
                    node.collision_range = *radius;
                }
            }
            Record::Beam(b) => self.add_beam(module, entry, b)?,
            Record::Shock(s) => self.add_shock(module, entry, s)?,
            Record::Shock2(s) => self.add_shock2(module, entry, s)?,
            Record::Shock3(s) => self.add_shock3(module, entry, s)?,
            Record::Command(c) => self.add_command(module, entry, c)?,
            Record::Hydro(h) => self.add_hydro(module, entry, h)?,
            Record::Trigger(t) => self.add_trigger(module, entry, t)?,
            Record::Rope(r) => self.add_rope(module, entry, r)?,
            Record::AntiLockBrakes(sc) => self.actor.aids.set_alb(sc),
            Record::TractionControl(sc) => self.actor.aids.set_tc(sc),
            Record::Axle(a) => self.add_axle(line, a)?,
            Record::TransferCase(tc) => self.add_transfer_case(line, tc),
            Record::InterAxle(ia) => self.add_interaxle(line, ia),
            Record::Contacter(r) => {
                let n = self.node(r, line)?;
                if let Some(node) = self.actor.nodes.get_mut(n) {
                    node.flags.contactable = true;
                }
            }
            Record::Camera(c) => self.add_camera(line, c)?,
            Record::Hook(h) => self.configure_hook(line, h)?,
            Record::Tie(t) => self.add_tie(module, entry, t)?,
            Record::Ropable(r) => {
                let node = self.node(&r.node, line)?;
                self.actor.ropables.push(Ropable {
                    node,
                    group: r.group,
                    multilock: r.multilock,
                });
            }
            Record::Animator(a) => self.add_animator(module, entry, a)?,
            Record::Rotator(r) => self.add_rotator(module, entry, r)?,
            Record::Lockgroup(g) => {
                for r in &g.nodes {
                    let n = self.node(r, line)?;
                    if let Some(node) = self.actor.nodes.get_mut(n) {
                        node.lockgroup = g.number;
                    }
                }
            }
            Record::Railgroup(g) => {
                let nodes = self.node_list(&g.nodes, line)?;
                match Rail::build(Some(g.id), &nodes, &self.actor.beams) {
                    Ok(rail) => {
                        self.actor.rails.push(rail);
                        self.railgroups.insert(g.id, self.actor.rails.len() - 1);
                    }
                    Err(err) => warn!(line, id = g.id, ?err, "railgroup skipped"),
                }
            }
            Record::SlideNode(s) => self.add_slidenode(line, s)?,
            Record::SpeedLimiter(max_speed) => self.actor.speed_limit = Some(*max_speed),
            Record::Cab(c) => {
                let nodes = self.nodes(&c.nodes, line)?;
                self.actor.cabs.push(CabTriangle {
                    nodes,
                    contact: c.is_contact(),
                    buoyant: c.is_buoyant(),
                });
            }
            Record::Fixes(r) => {
                self.node(r, line)?;
                self.fixes += 1;
            }
            _ => {}
        }
        Ok(())
    }

    // ==================== Nodes ====================

    fn minimass(&self, module: &Module, entry: &Entry) -> f64 {
        module
            .presets
            .minimass(&entry.presets)
            .unwrap_or(self.global_minimass)
    }

    /// A node with the defaults every generated node starts from.
    fn init_node(&self, position: Vec3, defaults: &NodeDefaults) -> Node {
        let mut node = Node::new(NodeIdx::at(self.actor.nodes.len()), position);
        node.friction_coef = defaults.friction;
        node.volume_coef = defaults.volume;
        node.surface_coef = defaults.surface;
        node.buoyancy = self.actor.mass_spec.dry_mass / 15.0;
        node.mass = NODE_DEFAULT_MASS;
        node.minimass = self.global_minimass;
        node
    }

    fn push_node(&mut self, node: Node) -> usize {
        self.actor.nodes.push(node);
        self.actor.nodes.len() - 1
    }

    fn add_node(&mut self, module: &Module, entry: &Entry, record: &rec::Node) {
        let defaults = module.presets.node_defaults(&entry.presets);
        let position = self.origin + Vec3::from(record.position);
        let mut node = self.init_node(position, &defaults);
        match &record.id {
            rec::NodeId::Name(name) => node.name = Some(name.clone()),
            rec::NodeId::Number(number) => node.number = Some(*number),
        }
        node.spawn_offset = Vec3::from(record.position);
        node.minimass = self.minimass(module, entry);
        node.collision_range = module.presets.collision_range(&entry.presets);
        self.actor.collision_range = node.collision_range;
        node.lockgroup = if defaults.lockgroup_nolock {
            LOCKGROUP_DENY
        } else {
            NODE_LOCKGROUP_DEFAULT
        };
        if defaults.load_weight >= 0.0 {
            node.mass = defaults.load_weight;
            node.load_weight = defaults.load_weight;
            node.flags.override_mass = true;
            node.flags.loaded = true;
        }

        let options = format!("{}{}", record.options, defaults.options);
        for c in options.chars() {
            match c {
                'l' => {
                    node.flags.loaded = true;
                    if let Some(weight) = record.load_weight {
                        node.flags.override_mass = true;
                        node.mass = weight;
                        node.load_weight = weight;
                    }
                }
                'b' => {
                    node.flags.extra_buoyancy = true;
                    node.buoyancy = 10_000.0;
                }
                'c' => node.flags.no_ground_contact = true,
                'h' => node.flags.hookable = true,
                'm' => node.flags.no_mouse_grab = true,
                'n' => node.flags.no_mouse_grab = false,
                'p' => node.flags.no_particles = true,
                'f' => node.flags.no_sparks = true,
                _ => {}
            }
        }
        let hookable = node.flags.hookable;
        let index = self.push_node(node);
        if hookable {
            self.add_hook_node(module, entry, index);
        }
    }

    /// Hook assistance beam for an `h` node, parked on node 0 (node 1 for
    /// node 0 itself).
    fn add_hook_node(&mut self, module: &Module, entry: &Entry, node: usize) {
        let home = if node == 0 { usize::from(self.map.count > 1) } else { 0 };
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.make_beam(node, home, &defaults, module.presets.detacher_group(&entry.presets));
        beam.set_strength(defaults.scaled_break() * 100.0);
        beam.beam_type = BeamType::Hydro;
        beam.k = defaults.scaled_spring();
        beam.d = defaults.scaled_damp() * 0.1;
        beam.bounded = BoundedKind::Rope;
        beam.disabled = true;
        beam.set_length(HOOK_RANGE_DEFAULT);
        let beam = self.push_beam(beam);
        self.actor.hooks.push(Hook::new(node, beam, home));
    }

    fn add_cinecam(&mut self, module: &Module, entry: &Entry, record: &rec::Cinecam) -> Result<(), SpawnError> {
        let defaults = module.presets.node_defaults(&entry.presets);
        let mut node = self.init_node(self.origin + Vec3::from(record.position), &defaults);
        node.flags.no_ground_contact = true;
        node.flags.cinecam = true;
        node.friction_coef = NODE_FRICTION_COEF_DEFAULT;
        node.volume_coef = NODE_VOLUME_COEF_DEFAULT;
        node.surface_coef = NODE_SURFACE_COEF_DEFAULT;
        node.minimass = self.minimass(module, entry);
        node.mass = record.node_mass;
        node.spawn_offset = Vec3::from(record.position);
        let camera = self.push_node(node);
        self.actor.cinecam_nodes.push(camera);
        self.actor.mass_spec.cinecams.push((camera, record.node_mass));

        let targets = self.nodes(&record.nodes, entry.line)?;
        let beam_defaults = module.presets.beam_defaults(&entry.presets);
        let group = module.presets.detacher_group(&entry.presets);
        for target in targets {
            let mut beam = self.make_beam(camera, target, &beam_defaults, group);
            beam.beam_type = BeamType::Normal;
            beam.k = record.spring;
            beam.d = record.damp;
            self.push_beam(beam);
        }
        Ok(())
    }

    // ==================== Wheels ====================

    fn wheel_frame(&self, line: usize, base: &rec::WheelBase) -> Result<WheelFrame, SpawnError> {
        if base.rays < 2 {
            return Err(SpawnError::DegenerateWheel {
                line,
                reason: format!("{} rays, at least 2 needed", base.rays),
            });
        }
        let [mut a, mut b] = self.nodes(&base.nodes, line)?;
        if self.position(a).z > self.position(b).z {
            std::mem::swap(&mut a, &mut b);
        }
        let hubs = [self.position(a), self.position(b)];
        if (hubs[1] - hubs[0]).norm() < f64::EPSILON {
            return Err(SpawnError::DegenerateWheel {
                line,
                reason: "axis nodes coincide".to_owned(),
            });
        }
        let arm = self.node(&base.arm_node, line)?;
        let arm_pos = self.position(arm);
        let near_attach = if (arm_pos - hubs[0]).norm() < (arm_pos - hubs[1]).norm() {
            a
        } else {
            b
        };
        let rigidity = match &base.rigidity_node {
            Some(r) => {
                let n = self.node(r, line)?;
                let p = self.position(n);
                Some((n, (p - hubs[0]).norm() < (p - hubs[1]).norm()))
            }
            None => None,
        };
        Ok(WheelFrame {
            axis: [a, b],
            hubs,
            arm,
            near_attach,
            rigidity,
            rays: base.rays as usize,
        })
    }

    fn finish_wheel(&mut self, mut wheel: Wheel, base: &rec::WheelBase) {
        wheel.braking = base.braking;
        wheel.propulsion = base.propulsion;
        wheel.mass = wheel
            .nodes
            .iter()
            .filter_map(|&n| self.actor.nodes.get(n))
            .map(|n| n.mass)
            .sum();
        self.actor.wheels.push(wheel);
    }

    /// `wheels`, `meshwheels` and `meshwheels2`: one ring of tyre nodes.
    #[allow(clippy::too_many_arguments)]
    fn add_wheel(
        &mut self,
        module: &Module,
        entry: &Entry,
        base: &rec::WheelBase,
        radius: f64,
        tyre: (f64, f64),
        rim: (f64, f64),
        max_extension: f64,
    ) -> Result<(), SpawnError> {
        let frame = self.wheel_frame(entry.line, base)?;
        let defaults = module.presets.node_defaults(&entry.presets);
        let beam_defaults = module.presets.beam_defaults(&entry.presets);
        let rays = frame.rays;
        let turn = frame.turn(2 * rays);
        #[allow(clippy::cast_precision_loss)]
        let node_mass = base.mass / (2 * rays) as f64;

        let first = self.actor.nodes.len();
        let mut wheel = Wheel::new(frame.axis, frame.arm, frame.near_attach, radius);
        wheel.width = (frame.hubs[1] - frame.hubs[0]).norm();
        let mut ray = perpendicular(&frame.axis_dir()) * radius;
        for _ in 0..rays {
            for hub in frame.hubs {
                let mut node = self.init_node(hub + ray, &defaults);
                node.mass = node_mass;
                node.flags.contactable = true;
                node.flags.tyre = true;
                wheel.nodes.push(self.push_node(node));
                ray = turn * ray;
            }
        }

        let [a0, a1] = frame.axis;
        for i in 0..rays {
            let outer = first + 2 * i;
            let inner = outer + 1;
            let next_outer = first + 2 * ((i + 1) % rays);
            let next_inner = next_outer + 1;
            self.wheel_beam(&beam_defaults, a0, outer, tyre.0, tyre.1, (0.66, max_extension));
            self.wheel_beam(&beam_defaults, a1, inner, tyre.0, tyre.1, (0.66, max_extension));
            self.wheel_beam(&beam_defaults, a1, outer, tyre.0, tyre.1, (-1.0, -1.0));
            self.wheel_beam(&beam_defaults, a0, inner, tyre.0, tyre.1, (-1.0, -1.0));
            self.wheel_beam(&beam_defaults, outer, inner, rim.0, rim.1, (-1.0, -1.0));
            self.wheel_beam(&beam_defaults, outer, next_outer, rim.0, rim.1, (-1.0, -1.0));
            self.wheel_beam(&beam_defaults, inner, next_inner, rim.0, rim.1, (-1.0, -1.0));
            self.wheel_beam(&beam_defaults, inner, next_outer, rim.0, rim.1, (-1.0, -1.0));
            if let Some((rigid, side_0)) = frame.rigidity {
                self.virtual_beam(&beam_defaults, rigid, if side_0 { outer } else { inner }, tyre.0, tyre.1);
            }
        }
        self.finish_wheel(wheel, base);
        Ok(())
    }

    /// `wheels2` rim and tyre beams share one preset-free setup.
    fn wheel2_beam(&mut self, a: usize, b: usize, spring: f64, damp: f64, defaults: &BeamDefaults) -> usize {
        let mut beam = Beam::new(NodeIdx::at(a), NodeIdx::at(b));
        beam.beam_type = BeamType::Normal;
        // Historical: the break strength is taken from the deform threshold.
        beam.set_strength(defaults.deform);
        beam.k = spring;
        beam.d = damp;
        beam.set_length(self.distance(a, b));
        self.push_beam(beam)
    }

    /// `wheels2`: a rim ring and a tyre ring joined by sidewalls.
    fn add_wheel2(&mut self, module: &Module, entry: &Entry, w: &rec::Wheel2) -> Result<(), SpawnError> {
        let frame = self.wheel_frame(entry.line, &w.base)?;
        let node_defaults = module.presets.node_defaults(&entry.presets);
        let beam_defaults = module.presets.beam_defaults(&entry.presets);
        let minimass = self.minimass(module, entry);
        let rays = frame.rays;
        #[allow(clippy::cast_precision_loss)]
        let r = rays as f64;
        let turn = frame.turn(rays);
        // Historical: measured on the normalised axis, so every `wheels2`
        // wheel is one metre wide whatever the document says.
        let width = frame.axis_dir().norm();

        let base = self.actor.nodes.len();
        let mut wheel = Wheel::new(frame.axis, frame.arm, frame.near_attach, w.tyre_radius);
        wheel.rim_radius = w.rim_radius;
        wheel.width = width;

        let mut ray = Vec3::new(0.0, w.rim_radius, 0.0);
        for _ in 0..rays {
            for hub in frame.hubs {
                let mut node = self.init_node(hub + ray, &node_defaults);
                node.mass = w.base.mass / (4.0 * r);
                node.flags.rim = true;
                node.minimass = minimass;
                wheel.rim_nodes.push(self.push_node(node));
            }
            ray = turn * ray;
        }

        let half_turn = UnitQuaternion::from_axis_angle(&frame.axis_dir(), -TAU / (2.0 * r));
        let mut ray = half_turn * Vec3::new(0.0, w.tyre_radius, 0.0);
        for _ in 0..rays {
            for (hub, share) in frame.hubs.into_iter().zip([0.67, 0.33]) {
                let mut node = self.init_node(hub + ray, &node_defaults);
                node.mass = share * w.base.mass / (2.0 * r);
                node.friction_coef = width * WHEEL_FRICTION_COEF;
                // Historical: the volume coefficient comes from the surface default.
                node.volume_coef = node_defaults.surface;
                node.surface_coef = node_defaults.surface;
                node.flags.contactable = true;
                node.flags.tyre = true;
                wheel.nodes.push(self.push_node(node));
            }
            ray = turn * ray;
        }

        let [a0, a1] = frame.axis;
        let rim = (w.rim_spring, w.rim_damp);
        let tyre = (w.tyre_spring, w.tyre_damp);
        let d = &beam_defaults;
        for i in 0..rays {
            let r_out = base + 2 * i;
            let r_in = r_out + 1;
            let nr_out = base + 2 * ((i + 1) % rays);
            let nr_in = nr_out + 1;
            let t_out = r_out + 2 * rays;
            let t_in = t_out + 1;
            let nt_out = nr_out + 2 * rays;
            let nt_in = nt_out + 1;

            for (a, b, short) in [(a0, r_out, 0.66), (a1, r_in, 0.66)] {
                let i = self.wheel2_beam(a, b, rim.0, rim.1, d);
                if let Some(beam) = self.actor.beams.get_mut(i) {
                    beam.short_bound = short;
                }
            }
            self.wheel2_beam(a1, r_out, rim.0, rim.1, d);
            self.wheel2_beam(a0, r_in, rim.0, rim.1, d);
            // Historical: the first bounded rim beam is doubled by an unbounded copy.
            self.wheel2_beam(a0, r_out, rim.0, rim.1, d);
            for (a, b) in [(r_out, r_in), (r_out, nr_out), (r_in, nr_in), (r_out, nr_in), (r_in, nr_out)] {
                self.wheel2_beam(a, b, rim.0, rim.1, d);
            }
            if let Some((rigid, side_0)) = frame.rigidity {
                let i = self.wheel2_beam(rigid, if side_0 { r_out } else { r_in }, rim.0, rim.1, d);
                if let Some(beam) = self.actor.beams.get_mut(i) {
                    beam.beam_type = BeamType::Virtual;
                }
            }
            for (a, b) in [
                (t_out, nt_out),
                (t_out, nt_in),
                (t_in, nt_out),
                (t_in, nt_in),
                (t_out, r_out),
                (t_out, nr_out),
                (t_in, r_in),
                (t_in, nr_in),
                (t_out, r_in),
                (t_out, nr_in),
                (t_in, r_out),
                (t_in, nr_out),
                (a0, t_out),
                (a1, t_in),
            ] {
                self.wheel2_beam(a, b, tyre.0, tyre.1, d);
            }
        }
        self.finish_wheel(wheel, &w.base);
        Ok(())
    }

    /// `flexbodywheels`: rim ring plus a tyre ring braced against it.
    fn add_flexbody_wheel(&mut self, module: &Module, entry: &Entry, w: &rec::FlexBodyWheel) -> Result<(), SpawnError> {
        let frame = self.wheel_frame(entry.line, &w.base)?;
        let node_defaults = module.presets.node_defaults(&entry.presets);
        let beam_defaults = module.presets.beam_defaults(&entry.presets);
        let minimass = self.minimass(module, entry);
        let rays = frame.rays;
        #[allow(clippy::cast_precision_loss)]
        let node_mass = w.base.mass / (4 * rays) as f64;
        let turn = frame.turn(2 * rays);
        let side = perpendicular(&frame.axis_dir());
        let extra_buoyancy = node_defaults.options.contains('b');

        let base = self.actor.nodes.len();
        let mut wheel = Wheel::new(frame.axis, frame.arm, frame.near_attach, w.tyre_radius);
        wheel.rim_radius = w.rim_radius;
        wheel.width = (frame.hubs[1] - frame.hubs[0]).norm();

        let mut ray = side * w.rim_radius;
        for _ in 0..rays {
            for hub in frame.hubs {
                let mut node = self.init_node(hub + ray, &node_defaults);
                node.mass = node_mass;
                node.flags.rim = true;
                node.minimass = minimass;
                if extra_buoyancy {
                    node.buoyancy = 10_000.0;
                }
                wheel.rim_nodes.push(self.push_node(node));
                ray = turn * ray;
            }
        }
        let mut ray = turn * (side * w.tyre_radius);
        for _ in 0..rays {
            for (k, hub) in frame.hubs.into_iter().enumerate() {
                let mut node = self.init_node(hub + ray, &node_defaults);
                node.mass = node_mass;
                if k == 1 {
                    // Historical: the inner tyre ring reads its volume from the surface default.
                    node.volume_coef = node_defaults.surface;
                }
                node.flags.contactable = true;
                node.flags.tyre = true;
                if extra_buoyancy {
                    node.buoyancy = 10_000.0;
                }
                wheel.nodes.push(self.push_node(node));
                ray = turn * ray;
            }
        }

        let [a0, a1] = frame.axis;
        let rim = (w.rim_spring, w.rim_damp);
        let none = (-1.0, -1.0);
        for i in 0..rays {
            let r_out = base + 2 * i;
            let r_in = r_out + 1;
            let nr_out = base + 2 * ((i + 1) % rays);
            let nr_in = nr_out + 1;
            for (a, b) in [
                (a0, r_out),
                (a1, r_in),
                (a1, r_out),
                (a0, r_in),
                (r_out, r_in),
                (r_out, nr_out),
                (r_in, nr_in),
                (r_in, nr_out),
            ] {
                self.wheel_beam(&beam_defaults, a, b, rim.0, rim.1, none);
            }
        }

        let brace = (w.tyre_spring / 2.0, w.tyre_damp);
        let tread = (beam_defaults.spring, beam_defaults.damp);
        // Historical: only the first ray honours the rigidity side; the
        // remaining rays always brace the inner tyre node.
        let mut rigid_outer = frame.rigidity.is_some_and(|(_, side_0)| side_0);
        for i in 0..rays {
            let r_out = base + 2 * i;
            let r_in = r_out + 1;
            let t = r_out + 2 * rays;
            let wrap = if i == 0 { t + 2 * rays } else { t };
            let t_next = base + 2 * ((i + 1) % rays) + 2 * rays;
            self.wheel_beam(&beam_defaults, r_out, t, brace.0, brace.1, none);
            self.wheel_beam(&beam_defaults, r_out, wrap - 1, brace.0, brace.1, none);
            self.wheel_beam(&beam_defaults, r_out, wrap - 2, brace.0, brace.1, none);
            self.wheel_beam(&beam_defaults, r_in, t, brace.0, brace.1, none);
            self.wheel_beam(&beam_defaults, r_in, t + 1, brace.0, brace.1, none);
            self.wheel_beam(&beam_defaults, r_in, wrap - 1, brace.0, brace.1, none);
            for (a, b) in [(t, t + 1), (t, t_next), (t + 1, t_next + 1), (t + 1, t_next)] {
                self.wheel_beam(&beam_defaults, a, b, tread.0, tread.1, none);
            }
            if let Some((rigid, _)) = frame.rigidity {
                self.virtual_beam(&beam_defaults, rigid, if rigid_outer { t } else { t + 1 }, w.tyre_spring, w.tyre_damp);
                rigid_outer = false;
            }
        }

        let support = 1.0 - (w.rim_radius / w.tyre_radius) * 0.95;
        for i in 0..rays {
            let t = base + 2 * i + 2 * rays;
            self.wheel_beam(&beam_defaults, a0, t, brace.0, brace.1, (support, 0.0));
            self.wheel_beam(&beam_defaults, a1, t + 1, brace.0, brace.1, (support, 0.0));
        }
        self.finish_wheel(wheel, &w.base);
        Ok(())
    }

    // ==================== Beams ====================

    fn add_beam(&mut self, module: &Module, entry: &Entry, b: &rec::Beam) -> Result<(), SpawnError> {
        let mut beam = self.authored_beam(module, entry, &b.nodes)?;
        beam.beam_type = BeamType::Normal;
        beam.invisible = b.options.invisible;
        if b.options.rope {
            beam.bounded = BoundedKind::Rope;
        } else if b.options.support {
            beam.bounded = BoundedKind::Support;
            beam.long_bound = b.extension_break_limit.unwrap_or(SUPPORT_BEAM_LIMIT);
        }
        self.push_beam(beam);
        Ok(())
    }

    fn push_shock(&mut self, mut beam: Beam, precompression: f64, mut shock: Shock) {
        beam.rest_length *= precompression;
        beam.ref_length *= precompression;
        beam.aux = Some(self.actor.shocks.len());
        shock.beam = self.push_beam(beam);
        self.actor.shocks.push(shock);
    }

    fn add_shock(&mut self, module: &Module, entry: &Entry, s: &rec::Shock) -> Result<(), SpawnError> {
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.authored_beam(module, entry, &s.nodes)?;
        let (mut short, mut long) = (s.short_bound, s.long_bound);
        if s.options.metric {
            short /= beam.rest_length;
            long /= beam.rest_length;
        }
        beam.short_bound = short;
        beam.long_bound = long;
        beam.bounded = BoundedKind::Shock1;
        beam.beam_type = BeamType::Hydro;
        beam.k = s.spring;
        beam.d = s.damp;
        beam.set_strength(defaults.break_force * 4.0);
        beam.invisible = s.options.invisible;

        let mut shock = Shock::new(0);
        shock.role = if s.options.active_right {
            ShockRole::ActiveRight
        } else if s.options.active_left {
            ShockRole::ActiveLeft
        } else {
            ShockRole::Normal
        };
        shock.sbd_spring = defaults.spring;
        shock.sbd_damp = defaults.damp;
        self.push_shock(beam, s.precompression, shock);
        Ok(())
    }

    /// Convert `shocks2`/`shocks3` bounds given in metres.
    fn shock_bounds(line: usize, length: f64, short: f64, long: f64, options: &rec::Shock2Options) -> (f64, f64) {
        let (mut short, mut long) = (short, long);
        if options.metric {
            short /= length;
            long /= length;
        }
        if options.absolute_metric {
            short = (length - short) / length;
            long = (long - length) / length;
            if long < 0.0 {
                warn!(line, "absolute long bound shorter than the spawn length, reset to 0");
                long = 0.0;
            }
            if short > 1.0 {
                warn!(line, "absolute short bound below zero metres, reset to 1");
                short = 1.0;
            }
        }
        (short, long)
    }

    fn add_shock2(&mut self, module: &Module, entry: &Entry, s: &rec::Shock2) -> Result<(), SpawnError> {
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.authored_beam(module, entry, &s.nodes)?;
        let (short, long) = Self::shock_bounds(entry.line, beam.rest_length, s.short_bound, s.long_bound, &s.options);
        beam.beam_type = BeamType::Hydro;
        beam.bounded = BoundedKind::Shock2;
        beam.k = s.spring_in;
        beam.d = s.damp_in;
        beam.short_bound = short;
        beam.long_bound = long;
        beam.invisible = s.options.invisible;

        let mut shock = Shock::new(0);
        shock.soft_bump = s.options.soft_bump_bounds;
        shock.sbd_spring = defaults.spring;
        shock.sbd_damp = defaults.damp;
        shock.spring_in = s.spring_in;
        shock.damp_in = s.damp_in;
        shock.spring_out = s.spring_out;
        shock.damp_out = s.damp_out;
        shock.sprog_in = s.progress_spring_in;
        shock.dprog_in = s.progress_damp_in;
        shock.sprog_out = s.progress_spring_out;
        shock.dprog_out = s.progress_damp_out;
        self.push_shock(beam, s.precompression, shock);
        Ok(())
    }

    fn add_shock3(&mut self, module: &Module, entry: &Entry, s: &rec::Shock3) -> Result<(), SpawnError> {
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.authored_beam(module, entry, &s.nodes)?;
        let (short, long) = Self::shock_bounds(entry.line, beam.rest_length, s.short_bound, s.long_bound, &s.options);
        beam.beam_type = BeamType::Hydro;
        beam.bounded = BoundedKind::Shock3;
        beam.k = s.spring_in;
        beam.d = s.damp_in;
        beam.short_bound = short;
        beam.long_bound = long;
        beam.invisible = s.options.invisible;

        let mut shock = Shock::new(0);
        shock.sbd_spring = defaults.spring;
        shock.sbd_damp = defaults.damp;
        shock.spring_in = s.spring_in;
        shock.damp_in = s.damp_in;
        shock.spring_out = s.spring_out;
        shock.damp_out = s.damp_out;
        shock.split_in = s.split_vel_in;
        shock.dslow_in = s.damp_in_slow;
        shock.dfast_in = s.damp_in_fast;
        shock.split_out = s.split_vel_out;
        shock.dslow_out = s.damp_out_slow;
        shock.dfast_out = s.damp_out_fast;
        self.push_shock(beam, s.precompression, shock);
        Ok(())
    }

    // ==================== Commands and hydros ====================

    fn add_command(&mut self, module: &Module, entry: &Entry, c: &rec::Command) -> Result<(), SpawnError> {
        let mut beam = self.authored_beam(module, entry, &c.nodes)?;
        beam.beam_type = BeamType::Hydro;
        beam.invisible = c.invisible;
        if c.rope {
            beam.bounded = BoundedKind::Rope;
        }
        let index = self.push_beam(beam);

        let inertia = KeyInertia::from_record(&c.inertia, &module.presets.inertia_defaults(&entry.presets));
        let contract = CommandBeam {
            beam: index,
            contraction: true,
            speed: c.shorten_rate,
            boundary: c.max_contraction,
            center: (c.max_contraction + c.max_extension) / 2.0,
            force_restricted: c.not_faster,
            autocenter: c.center_mode == rec::CommandCenterMode::AutoCenter,
            one_press: c.center_mode == rec::CommandCenterMode::OnePress,
            one_press_center: c.center_mode == rec::CommandCenterMode::OnePressCenter,
            needs_engine: c.needs_engine,
            plays_sound: c.plays_sound,
            engine_coupling: c.affect_engine,
            state: CommandBeamState::default(),
        };
        let extend = CommandBeam {
            contraction: false,
            speed: c.lengthen_rate,
            boundary: c.max_extension,
            ..contract.clone()
        };
        for (key, binding) in [(c.contract_key, contract), (c.extend_key, extend)] {
            let Some(slot) = self.actor.command_keys.get_mut(key as usize) else {
                warn!(line = entry.line, key, "command key out of range, binding dropped");
                continue;
            };
            slot.beams.push(binding);
            if slot.description.is_empty() {
                slot.description.clone_from(&c.description);
            }
            if inertia.is_active() {
                slot.command_inertia = inertia.clone();
            }
        }
        Ok(())
    }

    fn add_hydro(&mut self, module: &Module, entry: &Entry, h: &rec::Hydro) -> Result<(), SpawnError> {
        let (flags, invisible, unknown) = HydroFlags::parse(&h.options);
        for option in unknown {
            warn!(line = entry.line, %option, "ignoring invalid hydro option");
        }
        let mut beam = self.authored_beam(module, entry, &h.nodes)?;
        beam.beam_type = BeamType::Hydro;
        beam.invisible = invisible;
        let ref_length = beam.rest_length;
        let beam = self.push_beam(beam);
        self.actor.hydros.push(Hydro {
            beam,
            flags,
            speed: h.lengthening_factor,
            ref_length,
            inertia: KeyInertia::from_record(&h.inertia, &module.presets.inertia_defaults(&entry.presets)),
            animator: None,
        });
        Ok(())
    }

    fn add_animator(&mut self, module: &Module, entry: &Entry, a: &rec::Animator) -> Result<(), SpawnError> {
        let mut beam = self.authored_beam(module, entry, &a.nodes)?;
        beam.beam_type = BeamType::Hydro;
        beam.short_bound = a.short_limit.unwrap_or(0.99999);
        beam.long_bound = a.long_limit.unwrap_or(1_000_000.0);
        beam.invisible = a.invisible;
        let ref_length = beam.rest_length;
        let beam = self.push_beam(beam);
        self.actor.hydros.push(Hydro {
            beam,
            flags: HydroFlags::default(),
            speed: a.lengthening_factor,
            ref_length,
            inertia: KeyInertia::passthrough(),
            animator: Some(Animator {
                sources: a.sources.clone(),
                aero: a.aero,
            }),
        });
        Ok(())
    }

    fn add_rotator(&mut self, module: &Module, entry: &Entry, r: &rec::Rotator) -> Result<(), SpawnError> {
        let line = entry.line;
        let axis = self.nodes(&r.axis, line)?;
        let base = self.nodes(&r.base_plate, line)?;
        let rotating = self.nodes(&r.rotating_plate, line)?;
        let (force, tolerance) = if r.format_version >= 2 {
            (r.force, r.tolerance)
        } else {
            (ROTATOR_FORCE, ROTATOR_TOLERANCE)
        };
        self.actor.rotators.push(Rotator {
            axis,
            base,
            rotating,
            angle: 0.0,
            rate: r.rate,
            force,
            tolerance,
            engine_coupling: r.engine_coupling,
            needs_engine: r.needs_engine,
        });
        let number = i32::try_from(self.actor.rotators.len()).unwrap_or(i32::MAX);
        let inertia = KeyInertia::from_record(&r.inertia, &module.presets.inertia_defaults(&entry.presets));
        let description = if r.description.is_empty() {
            "Rotate_Left/Right"
        } else {
            r.description.as_str()
        };
        for (key, signed) in [(r.spin_left_key, -number), (r.spin_right_key, number)] {
            let Some(slot) = self.actor.command_keys.get_mut(key as usize) else {
                warn!(line, key, "rotator key out of range, binding dropped");
                continue;
            };
            slot.rotators.push(signed);
            if slot.description.is_empty() {
                slot.description = description.to_owned();
            }
            if inertia.is_active() {
                slot.rotator_inertia = inertia.clone();
            }
        }
        Ok(())
    }

    fn add_trigger(&mut self, module: &Module, entry: &Entry, t: &rec::Trigger) -> Result<(), SpawnError> {
        #[allow(clippy::cast_possible_wrap)]
        let max_key = MAX_COMMANDS as i64;
        let setup = match TriggerSetup::from_record(
            &t.options,
            t.contraction_limit,
            t.expansion_limit,
            t.boundary_timer,
            &t.action,
            max_key,
        ) {
            Ok(setup) => setup,
            Err(reason) => {
                warn!(line = entry.line, ?reason, "trigger deactivated");
                return Ok(());
            }
        };
        let mut beam = self.authored_beam(module, entry, &t.nodes)?;
        beam.beam_type = BeamType::Hydro;
        beam.k = 0.0;
        beam.d = 0.0;
        beam.short_bound = setup.short_bound;
        beam.long_bound = setup.long_bound;
        beam.bounded = BoundedKind::Trigger;
        beam.invisible = t.options.invisible;
        beam.aux = Some(self.actor.triggers.len());
        let mut trigger = setup.trigger;
        trigger.beam = self.push_beam(beam);
        self.actor.triggers.push(trigger);

        let mut set_blocked = |keys: &[i64], blocked: bool| {
            for &k in keys {
                if let Some(slot) = usize::try_from(k).ok().and_then(|k| self.actor.command_keys.get_mut(k)) {
                    slot.trigger_blocked = blocked;
                }
            }
        };
        set_blocked(&setup.unblock_keys, false);
        set_blocked(&setup.block_keys, true);
        Ok(())
    }

    // ==================== Links and rails ====================

    fn configure_hook(&mut self, line: usize, h: &rec::Hook) -> Result<(), SpawnError> {
        let node = self.node(&h.node, line)?;
        let Some(hook) = self.actor.hooks.iter_mut().find(|k| k.node == node) else {
            warn!(line, node = %h.node, "node is not a hook node (no 'h' option), ignored");
            return Ok(());
        };
        hook.lock_range = h.range;
        hook.lock_speed = h.speed_coef * HOOK_SPEED_DEFAULT;
        hook.max_force = h.max_force;
        hook.group = h.group;
        hook.lockgroup = h.lockgroup;
        hook.timer = 0.0;
        hook.timer_preset = h.timer;
        hook.min_length = h.min_range;
        hook.self_lock = h.self_lock;
        hook.no_disable = h.no_disable;
        if h.auto_lock {
            hook.auto_lock = true;
            if hook.group == -1 {
                hook.group = -2;
            }
        }
        let beam = hook.beam;
        if let Some(beam) = self.actor.beams.get_mut(beam) {
            if h.no_rope {
                beam.bounded = BoundedKind::Normal;
            }
            if !h.visible {
                beam.invisible = true;
            }
        }
        Ok(())
    }

    fn add_tie(&mut self, module: &Module, entry: &Entry, t: &rec::Tie) -> Result<(), SpawnError> {
        let root = self.node(&t.root, entry.line)?;
        let home = if root == 0 { usize::from(self.actor.nodes.len() > 1) } else { 0 };
        let defaults = module.presets.beam_defaults(&entry.presets);
        let mut beam = self.make_beam(root, home, &defaults, module.presets.detacher_group(&entry.presets));
        beam.set_strength(defaults.scaled_break());
        beam.k = defaults.scaled_spring();
        beam.d = defaults.scaled_damp();
        beam.beam_type = BeamType::Hydro;
        beam.set_length(t.max_reach);
        beam.bounded = BoundedKind::Rope;
        beam.disabled = true;
        beam.invisible = t.options.invisible;
        let beam = self.push_beam(beam);
        self.actor.ties.push(Tie {
            node: root,
            beam,
            home,
            group: t.group,
            rate: t.rate,
            min_length: t.min_length,
            max_stress: t.max_stress,
            no_self_lock: t.options.no_self_lock,
            tied: false,
            tying: false,
            target: None,
        });
        Ok(())
    }

    fn add_rope(&mut self, module: &Module, entry: &Entry, r: &rec::Rope) -> Result<(), SpawnError> {
        let mut beam = self.authored_beam(module, entry, &[r.root.clone(), r.end.clone()])?;
        beam.bounded = BoundedKind::Rope;
        beam.beam_type = BeamType::Hydro;
        beam.invisible = r.invisible;
        let [root, end] = [beam.nodes[0].index(), beam.nodes[1].index()];
        let beam = self.push_beam(beam);
        self.actor.mass_spec.rope_ends.push(end);
        self.actor.ropes.push(Rope {
            root,
            end,
            beam,
            group: 0,
            target: None,
        });
        Ok(())
    }

    fn add_slidenode(&mut self, line: usize, s: &rec::SlideNode) -> Result<(), SpawnError> {
        let node = self.node(&s.node, line)?;
        let rail = if let Some(id) = s.railgroup {
            let Some(&rail) = self.railgroups.get(&id) else {
                warn!(line, id, "slidenode names an unknown railgroup, skipped");
                return Ok(());
            };
            Some(rail)
        } else if !s.rail.is_empty() {
            let nodes = self.node_list(&s.rail, line)?;
            match Rail::build(None, &nodes, &self.actor.beams) {
                Ok(rail) => {
                    self.actor.rails.push(rail);
                    Some(self.actor.rails.len() - 1)
                }
                Err(err) => {
                    warn!(line, ?err, "slidenode rail rejected");
                    None
                }
            }
        } else {
            warn!(line, "slidenode without a rail");
            None
        };
        let mut slide = SlideNode::new(node, rail);
        if let Some(v) = s.spring_rate {
            slide.spring_rate = v;
        }
        if let Some(v) = s.break_force {
            slide.break_force = v;
        }
        if let Some(v) = s.tolerance {
            slide.set_tolerance(v);
        }
        if let Some(v) = s.attachment_rate {
            slide.attach_rate = v;
        }
        if let Some(v) = s.max_attach_dist {
            slide.attach_distance = v;
        }
        slide.apply_constraints(&s.constraints);
        self.actor.slidenodes.push(slide);
        Ok(())
    }

    // ==================== Drivetrain ====================

    fn add_axle(&mut self, line: usize, a: &rec::Axle) -> Result<(), SpawnError> {
        let mut pair = [None; 2];
        for (slot, wheel) in pair.iter_mut().zip(&a.wheels) {
            let Some(refs) = wheel else { continue };
            let [n1, n2] = self.nodes(refs, line)?;
            *slot = self
                .actor
                .wheels
                .iter()
                .position(|w| w.axis == [n1, n2] || w.axis == [n2, n1]);
        }
        let [Some(w1), Some(w2)] = pair else {
            warn!(line, "axle does not name two wheels by their axis nodes, skipped");
            return Ok(());
        };
        let modes = if a.modes.is_empty() {
            vec![rec::DiffType::Open, rec::DiffType::Locked]
        } else {
            a.modes.clone()
        };
        self.actor.drivetrain.wheel_diffs.push(Differential::new([w1, w2], modes));
        Ok(())
    }

    fn add_transfer_case(&mut self, line: usize, tc: &rec::TransferCase) {
        let axles = self.actor.drivetrain.wheel_diffs.len();
        let a1 = usize::try_from(tc.a1).ok().filter(|&a| a < axles);
        let a2 = usize::try_from(tc.a2).ok();
        let (Some(a1), true) = (a1, a2.map_or(true, |a2| a2 < axles && Some(a2) != a1)) else {
            warn!(line, a1 = tc.a1, a2 = tc.a2, "invalid transfer case axles, skipped");
            return;
        };
        if a2.is_none() && !tc.has_2wd {
            warn!(line, "transfer case needs an alternate axle or a 2wd mode, skipped");
            return;
        }
        let case = TransferCase::new(a1, a2, tc.has_2wd, tc.has_2wd_lo, tc.gear_ratios.clone());
        case.apply_propulsion(&self.actor.drivetrain.wheel_diffs, &mut self.actor.wheels);
        self.actor.drivetrain.transfer_case = Some(case);
    }

    fn add_interaxle(&mut self, line: usize, ia: &rec::InterAxle) {
        let axles = self.actor.drivetrain.wheel_diffs.len();
        let valid = |a: i32| usize::try_from(a).ok().filter(|&a| a < axles);
        let (Some(a1), Some(a2)) = (valid(ia.a1), valid(ia.a2)) else {
            warn!(line, a1 = ia.a1, a2 = ia.a2, "invalid interaxle axles, skipped");
            return;
        };
        if a1 == a2 {
            warn!(line, "interaxle joins an axle to itself, skipped");
            return;
        }
        if let Some(tc) = &self.actor.drivetrain.transfer_case {
            if tc.axle_2.is_some_and(|b| (tc.axle_1, b) == (a1, a2) || (tc.axle_1, b) == (a2, a1)) {
                warn!(line, "axles already coupled by the transfer case, interaxle skipped");
                return;
            }
        }
        let modes = if ia.modes.is_empty() {
            vec![rec::DiffType::Locked]
        } else {
            ia.modes.clone()
        };
        self.actor.drivetrain.axle_diffs.push(Differential::new([a1, a2], modes));
    }

    fn add_camera(&mut self, line: usize, c: &rec::Camera) -> Result<(), SpawnError> {
        let [center, back, left] = self.nodes(&[c.center.clone(), c.back.clone(), c.left.clone()], line)?;
        let dir = self.position(back) - self.position(center);
        let roll = self.position(left) - self.position(center);
        let roll_inverted = dir.cross(&roll).y > 0.0;
        if roll_inverted {
            warn!(line, "camera left node sits on the right, roll inverted");
        }
        self.actor.cameras.push(Camera {
            center,
            back,
            left,
            roll_inverted,
        });
        Ok(())
    }

    // ==================== Finish ====================

    fn finish(
        mut self,
        request: &ActorSpawnRequest,
        config: &SimConfig,
        terrain: &dyn TerrainQuery,
    ) -> Result<Actor, SpawnError> {
        if self.actor.nodes.is_empty() {
            return Err(SpawnError::NoNodes);
        }
        let actor = &mut self.actor;

        if let Some(record) = self.engine {
            let mut engine = Engine::from_records(record, self.engoption, self.engturbo, self.torque_curve);
            engine.reseed(u64::from(actor.id.0));
            if let Some(tc) = &actor.drivetrain.transfer_case {
                engine.set_tcase_ratio(tc.ratio());
            }
            actor.engine = Some(engine);
        }

        place(&mut actor.nodes, request, terrain, self.fixes > 0);
        for node in &mut actor.nodes {
            node.initial_position = node.position;
        }
        actor.initial_total_mass = actor.recalculate_masses();
        actor.initial_node_masses = actor.nodes.iter().map(|n| n.mass).collect();

        actor.drivetrain.finalize(&actor.wheels);
        trigger::clamp_blocker_ranges(&mut actor.triggers, actor.beams.len());
        actor.replay = Replay::new(&config.replay, actor.nodes.len(), actor.beams.len());
        actor.rebuild_topology();
        actor.update_metrics(0.0);
        actor.net_compression = crate::net::node_compression(&actor.bounds);
        actor.state = if request.remote {
            ActorState::NetworkedOk
        } else {
            ActorState::LocalSleeping
        };
        info!(
            actor = %actor.id,
            name = %actor.name,
            nodes = actor.nodes.len(),
            beams = actor.beams.len(),
            wheels = actor.wheels.len(),
            mass = actor.total_mass,
            "actor spawned"
        );
        Ok(self.actor)
    }
}

// ==================== Placement ====================

fn translate(nodes: &mut [Node], offset: Vec3) {
    for node in nodes {
        node.position += offset;
    }
}

/// Rotate about the spawn point, then put the actor down.
fn place(nodes: &mut [Node], request: &ActorSpawnRequest, terrain: &dyn TerrainQuery, fixed: bool) {
    let origin = request.position;
    for node in nodes.iter_mut() {
        node.position = origin + request.rotation * (node.position - origin);
    }
    let Some(first) = nodes.first().map(|n| n.position) else {
        return;
    };
    if fixed {
        translate(nodes, origin - first);
        return;
    }

    let center = Aabb::from_points(nodes.iter().map(|n| &n.position)).center();
    let target = Vec3::new(
        origin.x + (origin.x - center.x),
        origin.y,
        origin.z + (origin.z - center.z),
    );
    if request.free_position {
        translate(nodes, target - first);
        return;
    }
    let min_y = request.spawn_box.map_or(origin.y, |b| b.min.y);
    settle(nodes, target.x, target.z, min_y, terrain);

    if let Some(area) = &request.spawn_box {
        let inside = area.expanded(SPAWN_BOX_MARGIN);
        if nodes.iter().any(|n| !inside.contains(&n.position)) {
            let size = Aabb::from_points(nodes.iter().map(|n| &n.position)).size();
            let shift = request.rotation * Vec3::new((area.size().x + size.x) * 0.6, 0.0, 0.0);
            debug!(?shift, "actor sticks out of its spawn box, moved aside");
            settle(nodes, target.x - shift.x, target.z - shift.z, min_y, terrain);
        }
    }
}

/// Move node 0 to `(x, z)` and lift the actor onto the ground and water.
fn settle(nodes: &mut [Node], x: f64, z: f64, min_y: f64, terrain: &dyn TerrainQuery) {
    let Some(first) = nodes.first().map(|n| n.position) else {
        return;
    };
    translate(nodes, Vec3::new(x - first.x, 0.0, z - first.z));

    let lowest = |filter: &dyn Fn(&Node) -> bool| {
        nodes
            .iter()
            .filter(|n| filter(n))
            .map(|n| n.position.y)
            .fold(f64::INFINITY, f64::min)
    };
    let mut low = lowest(&|n| !n.flags.no_ground_contact);
    if !low.is_finite() {
        low = lowest(&|_| true);
    }
    let mut vertical = min_y - low;
    if let Some(water) = terrain.water_height(x, z) {
        vertical += (water - (low + vertical)).max(0.0);
    }
    // Historical: node 0 is never tested against the terrain.
    for node in nodes.iter().skip(1).filter(|n| !n.flags.no_ground_contact) {
        if let Some(ground) = terrain.ground_height(node.position.x, node.position.z) {
            vertical += (ground - (node.position.y + vertical)).max(0.0);
        }
    }
    translate(nodes, Vec3::new(0.0, vertical, 0.0));
}
