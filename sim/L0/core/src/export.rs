//! Reverse export of a live actor into a document.
//!
//! The soft body sections (`nodes`, `nodes2`, `beams`, `shocks`, `hydros`,
//! `commands`, `commands2` and `cinecam`) of the modules the actor was
//! spawned from are replaced by records rebuilt from the actor's arrays. Every
//! other entry of the source document is kept as it was, so wheels, engines
//! and the rest still refer to the same node ids.
//!
//! Preset state is rebuilt too: an entry gets a fresh `set_beam_defaults`,
//! `set_node_defaults`, `set_default_minimass` or `detacher_group` snapshot
//! whenever its values differ from the previous one, and
//! [`sim_truck::write`] turns those snapshots back into directive lines.
//!
//! Node references in the result are unresolved. Write the document and load
//! it again before spawning from it.
//!
//! ```ignore
//! let doc = export_actor(&actor, &source, &ExportOptions::default());
//! let text = sim_truck::write(&doc);
//! ```

use std::collections::BTreeMap;

use sim_truck::document::records as rec;
use sim_truck::document::{BeamDefaults, DetacherGroup, NodeDefaults, PresetRefs, PresetTables};
use sim_truck::{Document, Entry, Keyword, Module, NodeRef, Record};
use sim_types::constants::NODE_LOADWEIGHT_DEFAULT;
use tracing::debug;

use crate::actor::Actor;
use crate::beam::{Beam, BeamType, BoundedKind};
use crate::command::{CommandBeam, CommandKey};
use crate::links::LOCKGROUP_DENY;
use crate::mass::dry_mass_shares;
use crate::node::Node;
use crate::shock::ShockRole;

/// Sections rebuilt from the live actor.
const REBUILT: &[Keyword] = &[
    Keyword::Nodes,
    Keyword::Nodes2,
    Keyword::Beams,
    Keyword::Shocks,
    Keyword::Hydros,
    Keyword::Commands,
    Keyword::Commands2,
    Keyword::Cinecam,
];

/// Export switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Write every node with an explicit load weight so that it respawns with
    /// its current mass. The load weight is the mass less the node's share of
    /// the dry mass, which the respawn adds back.
    pub override_all_node_masses: bool,
}

// ==================== Presets ====================

/// Appends preset snapshots to a module, reusing the last one while the
/// values stay the same.
struct PresetWriter<'t> {
    tables: &'t mut PresetTables,
    current: PresetRefs,
}

impl<'t> PresetWriter<'t> {
    fn new(tables: &'t mut PresetTables) -> Self {
        Self {
            tables,
            current: PresetRefs::default(),
        }
    }

    fn beam(&mut self, defaults: BeamDefaults) {
        let same = self
            .current
            .beam_defaults
            .and_then(|i| self.tables.beam_defaults.get(i as usize))
            .is_some_and(|d| *d == defaults);
        if !same {
            self.current.beam_defaults = Some(push(&mut self.tables.beam_defaults, defaults));
        }
    }

    fn node(&mut self, defaults: NodeDefaults) {
        let same = self
            .current
            .node_defaults
            .and_then(|i| self.tables.node_defaults.get(i as usize))
            .is_some_and(|d| *d == defaults);
        if !same {
            self.current.node_defaults = Some(push(&mut self.tables.node_defaults, defaults));
        }
    }

    fn minimass(&mut self, minimass: f64) {
        let same = self
            .current
            .minimass
            .and_then(|i| self.tables.minimass.get(i as usize))
            .is_some_and(|m| *m == minimass);
        if !same {
            self.current.minimass = Some(push(&mut self.tables.minimass, minimass));
        }
    }

    fn detacher(&mut self, group: i32) {
        let current = self
            .current
            .detacher_group
            .and_then(|i| self.tables.detacher_group.get(i as usize))
            .copied()
            .unwrap_or_default();
        if current.group != group || current.end {
            let snapshot = DetacherGroup { group, end: false };
            self.current.detacher_group = Some(push(&mut self.tables.detacher_group, snapshot));
        }
    }

    fn entry(&self, keyword: Keyword, record: Record) -> Entry {
        Entry {
            line: 0,
            keyword,
            presets: self.current,
            editor_group: None,
            record,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn push<T>(table: &mut Vec<T>, value: T) -> u32 {
    table.push(value);
    (table.len() - 1) as u32
}

/// Beam preset that the spawner turns back into `beam`'s coefficients.
fn beam_defaults(beam: &Beam) -> BeamDefaults {
    BeamDefaults {
        spring: beam.k,
        damp: beam.d,
        deform: beam.default_deform,
        break_force: beam.initial_strength,
        plastic_coef: (beam.plastic_coef != 0.0).then_some(beam.plastic_coef),
        ..BeamDefaults::default()
    }
}

fn node_defaults(node: &Node) -> NodeDefaults {
    NodeDefaults {
        load_weight: NODE_LOADWEIGHT_DEFAULT,
        friction: node.friction_coef,
        volume: node.volume_coef,
        surface: node.surface_coef,
        options: String::new(),
        lockgroup_nolock: node.lockgroup == LOCKGROUP_DENY,
    }
}

// ==================== Export ====================

/// Node ids of the exported nodes, by actor node index.
struct NodeIds(Vec<Option<NodeRef>>);

impl NodeIds {
    fn new(nodes: &[Node]) -> Self {
        Self(
            nodes
                .iter()
                .map(|n| {
                    if n.flags.rim || n.flags.tyre || n.flags.cinecam {
                        return None;
                    }
                    match (&n.name, n.number) {
                        (Some(name), _) => Some(NodeRef::named(name.clone())),
                        (None, Some(number)) => Some(NodeRef::numbered(number)),
                        (None, None) => None,
                    }
                })
                .collect(),
        )
    }

    fn get(&self, node: usize) -> Option<NodeRef> {
        self.0.get(node).cloned().flatten()
    }

    fn pair(&self, beam: &Beam) -> Option<[NodeRef; 2]> {
        if beam.remote.is_some() {
            return None;
        }
        Some([self.get(beam.nodes[0].index())?, self.get(beam.nodes[1].index())?])
    }
}

/// True for beams that came from a `beams` line.
///
/// Historical: wheel anti-collapse beams are bounded like `shocks` but keep
/// the normal beam type, so a SHOCK1 beam of normal type counts as generated
/// and is neither a `beams` nor a `shocks` record. SHOCK1 beams of hydro type
/// are genuine shocks.
fn is_plain_beam(beam: &Beam) -> bool {
    beam.beam_type == BeamType::Normal
        && matches!(beam.bounded, BoundedKind::Normal | BoundedKind::Rope | BoundedKind::Support)
}

/// Rebuild `source` with the soft body of `actor`.
///
/// `source` must be the document `actor` was spawned from.
#[must_use]
pub fn export_actor(actor: &Actor, source: &Document, options: &ExportOptions) -> Document {
    let mut doc = source.clone();
    let selected = actor.sectionconfig.as_deref();

    // Purge the rebuilt sections of every module the actor used, remembering
    // where the first one sat in the root module.
    let root = match doc.modules.iter().position(|m| !m.defined_explicitly) {
        Some(i) => i,
        None => {
            doc.modules.insert(0, Module::default());
            0
        }
    };
    let mut insert_at = None;
    for (i, module) in doc.modules.iter_mut().enumerate() {
        if !module.is_active(selected) {
            continue;
        }
        if i == root {
            insert_at = module.entries.iter().position(|e| REBUILT.contains(&e.keyword));
        }
        module.entries.retain(|e| !REBUILT.contains(&e.keyword));
    }

    let ids = NodeIds::new(&actor.nodes);
    let module = &mut doc.modules[root];
    let mut presets = PresetWriter::new(&mut module.presets);
    let mut entries = Vec::new();
    export_nodes(actor, &ids, options, &mut presets, &mut entries);
    export_beams(actor, &ids, &mut presets, &mut entries);
    export_shocks(actor, &ids, &mut presets, &mut entries);
    export_hydros(actor, &ids, &mut presets, &mut entries);
    export_commands(actor, &ids, &mut presets, &mut entries);
    export_cinecams(actor, &ids, &mut presets, &mut entries);
    debug!(actor = %actor.id, entries = entries.len(), "actor exported");

    let at = insert_at.unwrap_or(module.entries.len());
    module.entries.splice(at..at, entries);

    for entry in doc.entries_mut() {
        if let Record::Globals(globals) = &mut entry.record {
            globals.dry_mass = actor.mass_spec.dry_mass;
            globals.cargo_mass = actor.mass_spec.load_mass;
        }
    }
    doc
}

/// Export and render in one go.
#[must_use]
pub fn export_text(actor: &Actor, source: &Document, options: &ExportOptions) -> String {
    sim_truck::write(&export_actor(actor, source, options))
}

// ---- sections ----

fn export_nodes(
    actor: &Actor,
    ids: &NodeIds,
    options: &ExportOptions,
    presets: &mut PresetWriter<'_>,
    out: &mut Vec<Entry>,
) {
    // Spawn lengths, as the respawn spreads the dry mass over those.
    let shares = if options.override_all_node_masses {
        dry_mass_shares(&actor.nodes, &actor.beams, actor.mass_spec.dry_mass, |b| b.ref_length)
    } else {
        Vec::new()
    };
    for (i, node) in actor.nodes.iter().enumerate() {
        let Some(id) = ids.get(i) else {
            continue;
        };
        presets.node(node_defaults(node));
        presets.minimass(node.minimass);

        let flags = &node.flags;
        let mut letters = String::new();
        for (on, letter) in [
            (flags.loaded, 'l'),
            (flags.extra_buoyancy, 'b'),
            (flags.no_ground_contact, 'c'),
            (flags.hookable, 'h'),
            (flags.no_mouse_grab, 'm'),
            (flags.no_particles, 'p'),
            (flags.no_sparks, 'f'),
        ] {
            if on {
                letters.push(letter);
            }
        }
        let mut load_weight = (flags.override_mass && node.load_weight >= 0.0).then_some(node.load_weight);
        if options.override_all_node_masses {
            let share = shares.get(i).copied().unwrap_or_default();
            load_weight = Some((node.mass - share).max(0.0));
            if !flags.loaded {
                letters.insert(0, 'l');
            }
        }

        let (keyword, id) = match (&node.name, id.number) {
            (Some(name), _) => (Keyword::Nodes2, rec::NodeId::Name(name.clone())),
            (None, Some(number)) => (Keyword::Nodes, rec::NodeId::Number(number)),
            (None, None) => continue,
        };
        let p = node.spawn_offset;
        let record = rec::Node {
            id,
            position: [p.x, p.y, p.z],
            options: letters,
            load_weight,
        };
        out.push(presets.entry(keyword, Record::Node(record)));
    }
}

fn export_beams(actor: &Actor, ids: &NodeIds, presets: &mut PresetWriter<'_>, out: &mut Vec<Entry>) {
    let skipped: Vec<usize> = actor
        .hooks
        .iter()
        .map(|h| h.beam)
        .chain(actor.ties.iter().map(|t| t.beam))
        .chain(actor.ropes.iter().map(|r| r.beam))
        .collect();
    for (i, beam) in actor.beams.iter().enumerate() {
        if !is_plain_beam(beam) || skipped.contains(&i) {
            continue;
        }
        let Some(nodes) = ids.pair(beam) else {
            continue;
        };
        presets.beam(beam_defaults(beam));
        presets.detacher(beam.detacher_group);
        let support = beam.bounded == BoundedKind::Support;
        let record = rec::Beam {
            nodes,
            options: rec::BeamOptions {
                invisible: beam.invisible,
                rope: beam.bounded == BoundedKind::Rope,
                support,
            },
            extension_break_limit: support.then_some(beam.long_bound),
        };
        out.push(presets.entry(Keyword::Beams, Record::Beam(record)));
    }
}

fn export_shocks(actor: &Actor, ids: &NodeIds, presets: &mut PresetWriter<'_>, out: &mut Vec<Entry>) {
    for beam in &actor.beams {
        if beam.bounded != BoundedKind::Shock1 || beam.beam_type != BeamType::Hydro {
            continue;
        }
        let Some(shock) = beam.aux.and_then(|i| actor.shocks.get(i)) else {
            continue;
        };
        let Some(nodes) = ids.pair(beam) else {
            continue;
        };
        // The spawner derives the shock strength as four times the preset's.
        presets.beam(BeamDefaults {
            spring: shock.sbd_spring,
            damp: shock.sbd_damp,
            break_force: beam.initial_strength / 4.0,
            ..beam_defaults(beam)
        });
        presets.detacher(beam.detacher_group);
        let length = spawn_length(actor, beam);
        let record = rec::Shock {
            nodes,
            spring: beam.k,
            damp: beam.d,
            short_bound: beam.short_bound,
            long_bound: beam.long_bound,
            precompression: if length > 0.0 { beam.ref_length / length } else { 1.0 },
            options: rec::ShockOptions {
                invisible: beam.invisible,
                metric: false,
                active_right: shock.role == ShockRole::ActiveRight,
                active_left: shock.role == ShockRole::ActiveLeft,
            },
        };
        out.push(presets.entry(Keyword::Shocks, Record::Shock(record)));
    }
}

fn export_hydros(actor: &Actor, ids: &NodeIds, presets: &mut PresetWriter<'_>, out: &mut Vec<Entry>) {
    for hydro in actor.hydros.iter().filter(|h| h.animator.is_none()) {
        let Some(beam) = actor.beams.get(hydro.beam) else {
            continue;
        };
        let Some(nodes) = ids.pair(beam) else {
            continue;
        };
        presets.beam(beam_defaults(beam));
        presets.detacher(beam.detacher_group);
        let record = rec::Hydro {
            nodes,
            lengthening_factor: hydro.speed,
            options: hydro.flags.letters(beam.invisible),
            inertia: hydro.inertia.to_record(),
        };
        out.push(presets.entry(Keyword::Hydros, Record::Hydro(record)));
    }
}

/// Both halves of one command beam.
#[derive(Default)]
struct CommandPair<'a> {
    contract: Option<(u32, &'a CommandKey, &'a CommandBeam)>,
    extend: Option<(u32, &'a CommandBeam)>,
}

fn export_commands(actor: &Actor, ids: &NodeIds, presets: &mut PresetWriter<'_>, out: &mut Vec<Entry>) {
    let mut pairs: BTreeMap<usize, CommandPair<'_>> = BTreeMap::new();
    for (key, slot) in actor.command_keys.iter().enumerate() {
        let Ok(key) = u32::try_from(key) else {
            continue;
        };
        for binding in &slot.beams {
            let pair = pairs.entry(binding.beam).or_default();
            if binding.contraction {
                pair.contract.get_or_insert((key, slot, binding));
            } else {
                pair.extend.get_or_insert((key, binding));
            }
        }
    }

    for (index, pair) in pairs {
        let (Some((contract_key, slot, contract)), Some((extend_key, extend))) = (pair.contract, pair.extend) else {
            continue;
        };
        let Some(beam) = actor.beams.get(index) else {
            continue;
        };
        let Some(nodes) = ids.pair(beam) else {
            continue;
        };
        let center_mode = if contract.autocenter {
            rec::CommandCenterMode::AutoCenter
        } else if contract.one_press {
            rec::CommandCenterMode::OnePress
        } else if contract.one_press_center {
            rec::CommandCenterMode::OnePressCenter
        } else {
            rec::CommandCenterMode::None
        };
        presets.beam(beam_defaults(beam));
        presets.detacher(beam.detacher_group);
        let record = rec::Command {
            format_version: 2,
            nodes,
            shorten_rate: contract.speed,
            lengthen_rate: extend.speed,
            max_contraction: contract.boundary,
            max_extension: extend.boundary,
            contract_key,
            extend_key,
            invisible: beam.invisible,
            rope: beam.bounded == BoundedKind::Rope,
            not_faster: contract.force_restricted,
            center_mode,
            description: slot.description.clone(),
            inertia: slot.command_inertia.to_record(),
            affect_engine: contract.engine_coupling,
            needs_engine: contract.needs_engine,
            plays_sound: contract.plays_sound,
        };
        out.push(presets.entry(Keyword::Commands2, Record::Command(record)));
    }
}

fn export_cinecams(actor: &Actor, ids: &NodeIds, presets: &mut PresetWriter<'_>, out: &mut Vec<Entry>) {
    for &camera in &actor.cinecam_nodes {
        let Some(node) = actor.nodes.get(camera) else {
            continue;
        };
        let anchors: Vec<(&Beam, NodeRef)> = actor
            .beams
            .iter()
            .filter(|b| b.remote.is_none())
            .filter_map(|b| {
                let [a, z] = [b.nodes[0].index(), b.nodes[1].index()];
                let other = if a == camera {
                    z
                } else if z == camera {
                    a
                } else {
                    return None;
                };
                Some((b, ids.get(other)?))
            })
            .collect();
        let Ok(nodes) = <[NodeRef; 8]>::try_from(anchors.iter().map(|(_, r)| r.clone()).collect::<Vec<_>>()) else {
            debug!(node = camera, anchors = anchors.len(), "cinecam without eight anchors, not exported");
            continue;
        };
        let Some((beam, _)) = anchors.last() else {
            continue;
        };
        presets.node(node_defaults(node));
        presets.beam(beam_defaults(beam));
        let p = node.spawn_offset;
        let record = rec::Cinecam {
            position: [p.x, p.y, p.z],
            nodes,
            spring: beam.k,
            damp: beam.d,
            node_mass: node.mass,
        };
        out.push(presets.entry(Keyword::Cinecam, Record::Cinecam(record)));
    }
}

/// Distance between the beam's ends in document space.
fn spawn_length(actor: &Actor, beam: &Beam) -> f64 {
    match (actor.nodes.get(beam.nodes[0].index()), actor.nodes.get(beam.nodes[1].index())) {
        (Some(a), Some(b)) => (a.spawn_offset - b.spawn_offset).norm(),
        _ => 0.0,
    }
}
