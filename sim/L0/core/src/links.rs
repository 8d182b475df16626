//! Hooks, ties, ropes and ropables.
//!
//! Each coupling owns one beam of its actor. While unlinked the beam is
//! disabled and parked on node 0 (node 1 for couplings rooted at node 0).
//! Linking points its second endpoint at the target node; when the target
//! lives in another actor the beam is marked inter-actor and the manager
//! evaluates it instead of the owner's beam pass.
//!
//! Lock searches need positions from every awake actor. The manager builds a
//! [`LockWorld`] snapshot on the main thread and hands it to the toggles, so
//! no actor ever reads another actor's arrays directly.

use sim_types::{ActorId, NodeIdx, Vec3};

use crate::beam::Beam;
use crate::node::Node;

/// Lockgroup value that refuses every hook.
pub const LOCKGROUP_DENY: i32 = 9999;

/// A node of some actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkTarget {
    /// Owning actor.
    pub actor: ActorId,
    /// Node index in that actor.
    pub node: NodeIdx,
}

// ==================== Lock search snapshot ====================

/// A ropable as seen by lock searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopableSlot {
    /// Index in the owner's ropable array.
    pub index: usize,
    /// Node.
    pub node: usize,
    /// Node position.
    pub position: Vec3,
    /// Group.
    pub group: i32,
    /// Accepts several couplings.
    pub multilock: bool,
    /// Ties currently attached.
    pub attached_ties: usize,
    /// Ropes currently attached.
    pub attached_ropes: usize,
}

/// Lockable state of one actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LockCandidates {
    /// Actor.
    pub actor: ActorId,
    /// Node positions.
    pub positions: Vec<Vec3>,
    /// Node lockgroups.
    pub lockgroups: Vec<i32>,
    /// Ropables.
    pub ropables: Vec<RopableSlot>,
    /// Rail groups as segment endpoint positions, for slidenode attachment.
    pub rails: Vec<Vec<[Vec3; 2]>>,
}

/// Lockable state of every actor that is not asleep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LockWorld {
    /// One entry per actor.
    pub actors: Vec<LockCandidates>,
}

fn park(beam: &mut Beam, home: usize, nodes: &[Node], root: usize) {
    beam.nodes[1] = NodeIdx::at(home);
    beam.remote = None;
    beam.disabled = true;
    if let (Some(a), Some(b)) = (nodes.get(root), nodes.get(home)) {
        beam.rest_length = (a.position - b.position).norm();
    }
}

fn attach(beam: &mut Beam, own: ActorId, target: LinkTarget) {
    beam.nodes[1] = target.node;
    beam.remote = (target.actor != own).then_some(target.actor);
}

// ==================== Hooks ====================

/// Hook lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookState {
    /// Free.
    #[default]
    Unlocked,
    /// Found a node; the beam is being shortened towards it.
    PreLock,
    /// Holding.
    Locked,
    /// Released this substep.
    PreUnlock,
}

/// What a hook toggle asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Lock free hooks, release held ones.
    Toggle,
    /// Lock attempt only.
    Lock,
    /// Release only.
    Unlock,
    /// Toggle the hook on one node.
    MouseToggle(usize),
}

/// A hook node.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Hook {
    /// Hook node.
    pub node: usize,
    /// Assistance beam.
    pub beam: usize,
    /// Node the beam parks on while unlocked.
    pub home: usize,
    /// Hook group; `-1` default, `<= -2` autolock and trigger groups.
    pub group: i32,
    /// Only lock to nodes of this lockgroup, `-1` for any.
    pub lockgroup: i32,
    /// Search radius.
    pub lock_range: f64,
    /// Shortening per substep while prelocked.
    pub lock_speed: f64,
    /// Stress above which locking gives up.
    pub max_force: f64,
    /// Beam length at which the lock completes.
    pub min_length: f64,
    /// Relock delay countdown.
    pub timer: f64,
    /// Relock delay after a release.
    pub timer_preset: f64,
    /// May lock to its own actor.
    pub self_lock: bool,
    /// Locks itself once per frame when something is in range.
    pub auto_lock: bool,
    /// Keeps the lock even when `max_force` is exceeded.
    pub no_disable: bool,
    /// Lock state.
    pub state: HookState,
    /// Node being held.
    pub target: Option<LinkTarget>,
    /// Distance to the target when it was found.
    pub lock_distance: f64,
}

impl Hook {
    /// Hook on `node` with the built-in defaults.
    #[must_use]
    pub fn new(node: usize, beam: usize, home: usize) -> Self {
        use sim_types::constants::{
            HOOK_FORCE_DEFAULT, HOOK_LOCK_TIMER_DEFAULT, HOOK_RANGE_DEFAULT, HOOK_SPEED_DEFAULT,
        };
        Self {
            node,
            beam,
            home,
            group: -1,
            lockgroup: -1,
            lock_range: HOOK_RANGE_DEFAULT,
            lock_speed: HOOK_SPEED_DEFAULT,
            max_force: HOOK_FORCE_DEFAULT,
            min_length: 0.0,
            timer: 0.0,
            timer_preset: HOOK_LOCK_TIMER_DEFAULT,
            self_lock: false,
            auto_lock: false,
            no_disable: false,
            state: HookState::Unlocked,
            target: None,
            lock_distance: 0.0,
        }
    }

    /// True while holding or pulling in a node.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        matches!(self.state, HookState::PreLock | HookState::Locked)
    }

    fn selected(&self, group: i32, action: HookAction) -> bool {
        match action {
            HookAction::MouseToggle(node) => self.node == node,
            HookAction::Toggle => group != -1 || self.group > -2,
            HookAction::Lock | HookAction::Unlock => {
                if group >= -1 {
                    return false;
                }
                if group == -2 && (self.group >= -1 || !self.auto_lock) {
                    return false;
                }
                if group <= -3 && self.group != group {
                    return false;
                }
                !(action == HookAction::Lock && self.timer > 0.0)
            }
        }
    }

    fn release(&mut self, beam: &mut Beam, nodes: &[Node]) {
        self.target = None;
        park(beam, self.home, nodes, self.node);
    }
}

/// Lock or release hooks.
///
/// `group` selects which hooks take part: `-1` with [`HookAction::Toggle`]
/// is the driver's lock key, `-2` addresses the autolock hooks, `<= -3` a
/// single trigger group. Returns true when any hook changed state.
pub fn toggle_hooks(
    hooks: &mut [Hook],
    beams: &mut [Beam],
    nodes: &[Node],
    own: ActorId,
    group: i32,
    action: HookAction,
    world: &LockWorld,
) -> bool {
    let mut changed = false;
    for hook in hooks.iter_mut() {
        if !hook.selected(group, action) {
            continue;
        }
        let Some(beam) = beams.get_mut(hook.beam) else {
            continue;
        };
        if action != HookAction::Unlock && hook.state == HookState::Unlocked {
            let Some(origin) = nodes.get(hook.node).map(|n| n.position) else {
                continue;
            };
            let mut best = f64::MAX;
            for candidates in &world.actors {
                let is_own = candidates.actor == own;
                if is_own && !hook.self_lock {
                    continue;
                }
                for (i, p) in candidates.positions.iter().enumerate() {
                    let lockgroup = candidates.lockgroups.get(i).copied().unwrap_or(-1);
                    if lockgroup == LOCKGROUP_DENY || (is_own && i == hook.node) {
                        continue;
                    }
                    if hook.lockgroup != -1 && hook.lockgroup != lockgroup {
                        continue;
                    }
                    let d = (origin - p).norm();
                    if d < hook.lock_range && best >= d {
                        best = d;
                        hook.target = Some(LinkTarget {
                            actor: candidates.actor,
                            node: NodeIdx::at(i),
                        });
                        hook.lock_distance = d;
                        hook.state = HookState::PreLock;
                        changed = true;
                    }
                }
            }
        } else if hook.is_engaged()
            // Historical: a lock attempt also releases hooks holding their own actor.
            && (action != HookAction::Lock || !beam.is_inter_actor())
        {
            hook.state = HookState::PreUnlock;
            if hook.group <= -2 {
                hook.timer = hook.timer_preset;
            }
            hook.release(beam, nodes);
            changed = true;
        }
    }
    changed
}

/// Advance hook locking by one substep.
///
/// Returns true when a link was created or removed.
pub fn update_hooks(
    hooks: &mut [Hook],
    beams: &mut [Beam],
    nodes: &[Node],
    own: ActorId,
    dt: f64,
) -> bool {
    let mut changed = false;
    for hook in hooks.iter_mut() {
        hook.timer = (hook.timer - dt).max(0.0);
        let Some(beam) = beams.get_mut(hook.beam) else {
            continue;
        };
        if let (Some(target), HookState::PreLock) = (hook.target, hook.state) {
            if beam.disabled {
                attach(beam, own, target);
                beam.rest_length = hook.lock_distance;
                beam.disabled = false;
                changed = true;
            } else if beam.rest_length < hook.min_length {
                hook.state = HookState::Locked;
            } else if beam.rest_length > hook.lock_speed && beam.stress.abs() < hook.max_force {
                beam.rest_length -= hook.lock_speed;
            } else if beam.stress.abs() < hook.max_force {
                beam.rest_length = 0.001;
                hook.state = HookState::Locked;
            } else if hook.no_disable {
                hook.state = HookState::Locked;
            } else {
                hook.state = HookState::Unlocked;
                hook.release(beam, nodes);
                changed = true;
            }
        }
        if hook.state == HookState::PreUnlock {
            hook.state = HookState::Unlocked;
            changed = true;
        }
    }
    changed
}

// ==================== Ties ====================

/// A tie: a rope beam that searches for a ropable and winds itself in.
#[derive(Debug, Clone, PartialEq)]
pub struct Tie {
    /// Root node.
    pub node: usize,
    /// Tie beam.
    pub beam: usize,
    /// Node the beam parks on while untied.
    pub home: usize,
    /// Ropable group filter, `-1` for any.
    pub group: i32,
    /// Shortening rate (m/s).
    pub rate: f64,
    /// Shortest length as a fraction of the reach.
    pub min_length: f64,
    /// Stress at which winding stops.
    pub max_stress: f64,
    /// Never ties to its own actor.
    pub no_self_lock: bool,
    /// Attached to a ropable.
    pub tied: bool,
    /// Still winding in.
    pub tying: bool,
    /// Ropable held: owning actor and index in its ropable array.
    pub target: Option<(ActorId, usize)>,
}

fn group_matches(filter: i32, own_group: i32) -> bool {
    filter == -1 || own_group == -1 || own_group == filter
}

/// Untie every tied tie of `group`; if none was tied, tie them instead.
pub fn toggle_ties(
    ties: &mut [Tie],
    beams: &mut [Beam],
    nodes: &[Node],
    own: ActorId,
    group: i32,
    world: &LockWorld,
) -> bool {
    let mut was_tied = false;
    let mut changed = false;
    for tie in ties.iter_mut() {
        if !group_matches(group, tie.group) || !tie.tied {
            continue;
        }
        let Some(beam) = beams.get_mut(tie.beam) else {
            continue;
        };
        was_tied = !beam.disabled;
        tie.tied = false;
        tie.tying = false;
        tie.target = None;
        park(beam, tie.home, nodes, tie.node);
        changed = true;
    }
    if was_tied {
        return changed;
    }

    // Ropables already taken, including by ties tied earlier in this pass.
    let mut taken: Vec<(ActorId, usize)> = Vec::new();
    for tie in ties.iter_mut() {
        if !group_matches(group, tie.group) || tie.tied {
            continue;
        }
        let Some(beam) = beams.get_mut(tie.beam) else {
            continue;
        };
        let Some(origin) = nodes.get(tie.node).map(|n| n.position) else {
            continue;
        };
        let mut best = beam.ref_length;
        let mut found: Option<(ActorId, RopableSlot)> = None;
        for candidates in &world.actors {
            let is_own = candidates.actor == own;
            if is_own && tie.no_self_lock {
                continue;
            }
            for slot in &candidates.ropables {
                let extra = taken.iter().filter(|t| **t == (candidates.actor, slot.index)).count();
                if !slot.multilock && slot.attached_ties + extra > 0 {
                    continue;
                }
                if is_own && slot.node == tie.node {
                    continue;
                }
                let d = (origin - slot.position).norm();
                if d < best {
                    best = d;
                    found = Some((candidates.actor, *slot));
                }
            }
        }
        if let Some((actor, slot)) = found {
            attach(
                beam,
                own,
                LinkTarget {
                    actor,
                    node: NodeIdx::at(slot.node),
                },
            );
            beam.disabled = false;
            beam.stress = 0.0;
            beam.rest_length = beam.ref_length;
            tie.tied = true;
            tie.tying = true;
            tie.target = Some((actor, slot.index));
            taken.push((actor, slot.index));
            changed = true;
        }
    }
    changed
}

/// Wind tying ties in by one substep.
pub fn update_ties(ties: &mut [Tie], beams: &mut [Beam], dt: f64) {
    for tie in ties.iter_mut().filter(|t| t.tying) {
        let Some(beam) = beams.get_mut(tie.beam) else {
            continue;
        };
        if beam.ref_length == 0.0 || beam.rest_length == 0.0 {
            continue;
        }
        if beam.rest_length / beam.ref_length > tie.min_length {
            beam.rest_length *= 1.0 - tie.rate * dt / beam.rest_length;
        } else {
            tie.tying = false;
        }
        if beam.stress.abs() > tie.max_stress {
            tie.tying = false;
        }
    }
}

// ==================== Ropes ====================

/// A rope whose free end snaps onto a ropable.
#[derive(Debug, Clone, PartialEq)]
pub struct Rope {
    /// Root node.
    pub root: usize,
    /// Free end node, moved onto the ropable while locked.
    pub end: usize,
    /// Rope beam.
    pub beam: usize,
    /// Group, always 0 for `ropes` lines.
    pub group: i32,
    /// Ropable held: node target and index in the owner's ropable array.
    pub target: Option<(LinkTarget, usize)>,
}

impl Rope {
    /// True while holding a ropable.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.target.is_some()
    }
}

/// Release locked ropes, lock free ones to the nearest ropable in reach.
pub fn toggle_ropes(
    ropes: &mut [Rope],
    beams: &[Beam],
    nodes: &[Node],
    group: i32,
    world: &LockWorld,
) -> bool {
    let mut changed = false;
    let mut taken: Vec<(ActorId, usize)> = Vec::new();
    for rope in ropes.iter_mut() {
        if !group_matches(group, rope.group) {
            continue;
        }
        if rope.target.take().is_some() {
            changed = true;
            continue;
        }
        let (Some(beam), Some(origin)) = (beams.get(rope.beam), nodes.get(rope.root)) else {
            continue;
        };
        let mut best = beam.rest_length;
        let mut found = None;
        for candidates in &world.actors {
            for slot in &candidates.ropables {
                let extra = taken.iter().filter(|t| **t == (candidates.actor, slot.index)).count();
                if !slot.multilock && slot.attached_ropes + extra > 0 {
                    continue;
                }
                let d = (origin.position - slot.position).norm();
                if d < best {
                    best = d;
                    found = Some((candidates.actor, *slot));
                }
            }
        }
        if let Some((actor, slot)) = found {
            rope.target = Some((
                LinkTarget {
                    actor,
                    node: NodeIdx::at(slot.node),
                },
                slot.index,
            ));
            taken.push((actor, slot.index));
            changed = true;
        }
    }
    changed
}

/// A node that ties and ropes can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ropable {
    /// Node.
    pub node: usize,
    /// Group.
    pub group: i32,
    /// Accepts several couplings at once.
    pub multilock: bool,
}

/// Release every hook, tie and rope that holds a node of `gone`.
///
/// Returns true when something was released.
pub fn release_links_to(
    gone: ActorId,
    hooks: &mut [Hook],
    ties: &mut [Tie],
    ropes: &mut [Rope],
    beams: &mut [Beam],
    nodes: &[Node],
) -> bool {
    let mut changed = false;
    for hook in hooks.iter_mut() {
        if hook.target.is_some_and(|t| t.actor == gone) {
            hook.state = HookState::Unlocked;
            if let Some(beam) = beams.get_mut(hook.beam) {
                hook.release(beam, nodes);
            }
            changed = true;
        }
    }
    for tie in ties.iter_mut() {
        if tie.target.is_some_and(|(a, _)| a == gone) {
            tie.tied = false;
            tie.tying = false;
            tie.target = None;
            if let Some(beam) = beams.get_mut(tie.beam) {
                park(beam, tie.home, nodes, tie.node);
            }
            changed = true;
        }
    }
    for rope in ropes.iter_mut() {
        if rope.target.is_some_and(|(t, _)| t.actor == gone) {
            rope.target = None;
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::constants::{HOOK_SPEED_DEFAULT, TIE_MAX_STRESS_DEFAULT};

    const DT: f64 = 0.0005;
    const A: ActorId = ActorId(1);
    const B: ActorId = ActorId(2);

    fn nodes(ps: &[[f64; 3]]) -> Vec<Node> {
        ps.iter()
            .enumerate()
            .map(|(i, p)| Node::new(NodeIdx::at(i), Vec3::new(p[0], p[1], p[2])))
            .collect()
    }

    fn parked_beam(root: usize, home: usize) -> Beam {
        let mut b = Beam::new(NodeIdx::at(root), NodeIdx::at(home));
        b.set_length(0.4);
        b.disabled = true;
        b
    }

    fn world_with(actor: ActorId, ps: &[[f64; 3]]) -> LockCandidates {
        LockCandidates {
            actor,
            positions: ps.iter().map(|p| Vec3::new(p[0], p[1], p[2])).collect(),
            lockgroups: vec![-1; ps.len()],
            ropables: Vec::new(),
            rails: Vec::new(),
        }
    }

    #[test]
    fn hook_locks_to_nearest_foreign_node() {
        let own = nodes(&[[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 1)];
        let mut hooks = vec![Hook::new(0, 0, 1)];
        let world = LockWorld {
            actors: vec![
                world_with(A, &[[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]]),
                world_with(B, &[[0.3, 0.0, 0.0], [0.2, 0.0, 0.0]]),
            ],
        };
        assert!(toggle_hooks(&mut hooks, &mut beams, &own, A, -1, HookAction::Toggle, &world));
        assert_eq!(hooks[0].state, HookState::PreLock);
        assert_eq!(hooks[0].target, Some(LinkTarget { actor: B, node: NodeIdx(1) }));

        // First substep enables the beam as an inter-actor beam.
        assert!(update_hooks(&mut hooks, &mut beams, &own, A, DT));
        assert!(!beams[0].disabled);
        assert_eq!(beams[0].remote, Some(B));
        assert_relative_eq!(beams[0].rest_length, 0.2);
        // Then it winds in.
        update_hooks(&mut hooks, &mut beams, &own, A, DT);
        assert_relative_eq!(beams[0].rest_length, 0.2 - HOOK_SPEED_DEFAULT);
    }

    #[test]
    fn hook_skips_own_actor_without_selflock() {
        let own = nodes(&[[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 1)];
        let mut hooks = vec![Hook::new(0, 0, 1)];
        let world = LockWorld {
            actors: vec![world_with(A, &[[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]])],
        };
        assert!(!toggle_hooks(&mut hooks, &mut beams, &own, A, -1, HookAction::Toggle, &world));
        hooks[0].self_lock = true;
        assert!(toggle_hooks(&mut hooks, &mut beams, &own, A, -1, HookAction::Toggle, &world));
        update_hooks(&mut hooks, &mut beams, &own, A, DT);
        assert_eq!(beams[0].remote, None);
        assert_eq!(beams[0].nodes[1], NodeIdx(1));
    }

    #[test]
    fn denied_lockgroup_is_never_hooked() {
        let own = nodes(&[[0.0, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 0)];
        let mut hooks = vec![Hook::new(0, 0, 0)];
        let mut other = world_with(B, &[[0.1, 0.0, 0.0]]);
        other.lockgroups[0] = LOCKGROUP_DENY;
        let world = LockWorld { actors: vec![other] };
        assert!(!toggle_hooks(&mut hooks, &mut beams, &own, A, -1, HookAction::Toggle, &world));
    }

    #[test]
    fn overloaded_prelock_gives_up() {
        let own = nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 1)];
        let mut hooks = vec![Hook::new(0, 0, 1)];
        hooks[0].state = HookState::PreLock;
        hooks[0].target = Some(LinkTarget { actor: B, node: NodeIdx(0) });
        beams[0].disabled = false;
        beams[0].stress = 2.0 * hooks[0].max_force;
        assert!(update_hooks(&mut hooks, &mut beams, &own, A, DT));
        assert_eq!(hooks[0].state, HookState::Unlocked);
        assert!(beams[0].disabled);
        assert_relative_eq!(beams[0].rest_length, 1.0);

        // With nodisable the hook keeps what it has.
        hooks[0].no_disable = true;
        hooks[0].state = HookState::PreLock;
        hooks[0].target = Some(LinkTarget { actor: B, node: NodeIdx(0) });
        beams[0].disabled = false;
        update_hooks(&mut hooks, &mut beams, &own, A, DT);
        assert_eq!(hooks[0].state, HookState::Locked);
    }

    #[test]
    fn toggle_releases_and_arms_relock_timer() {
        let own = nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 1)];
        let mut hooks = vec![Hook::new(0, 0, 1)];
        hooks[0].group = -2;
        hooks[0].auto_lock = true;
        hooks[0].state = HookState::Locked;
        hooks[0].target = Some(LinkTarget { actor: B, node: NodeIdx(0) });
        beams[0].remote = Some(B);
        beams[0].disabled = false;
        let world = LockWorld::default();
        // The driver's lock key leaves autolock groups alone.
        assert!(!toggle_hooks(&mut hooks, &mut beams, &own, A, -1, HookAction::Toggle, &world));
        assert!(toggle_hooks(&mut hooks, &mut beams, &own, A, -2, HookAction::Unlock, &world));
        assert_eq!(hooks[0].state, HookState::PreUnlock);
        assert_relative_eq!(hooks[0].timer, hooks[0].timer_preset);
        assert!(beams[0].disabled && beams[0].remote.is_none());
        update_hooks(&mut hooks, &mut beams, &own, A, DT);
        assert_eq!(hooks[0].state, HookState::Unlocked);
        // Autolock waits for the timer.
        assert!(!hooks[0].selected(-2, HookAction::Lock));
    }

    fn tie_rig() -> (Vec<Tie>, Vec<Beam>, Vec<Node>) {
        let mut beam = parked_beam(0, 1);
        beam.set_length(2.0);
        let tie = Tie {
            node: 0,
            beam: 0,
            home: 1,
            group: -1,
            rate: 1.0,
            min_length: 0.5,
            max_stress: TIE_MAX_STRESS_DEFAULT,
            no_self_lock: false,
            tied: false,
            tying: false,
            target: None,
        };
        (vec![tie], vec![beam], nodes(&[[0.0, 0.0, 0.0], [0.0, 3.0, 0.0]]))
    }

    fn ropable_world(multilock: bool, attached: usize) -> LockWorld {
        let mut other = world_with(B, &[[1.0, 0.0, 0.0]]);
        other.ropables.push(RopableSlot {
            index: 0,
            node: 0,
            position: Vec3::new(1.0, 0.0, 0.0),
            group: -1,
            multilock,
            attached_ties: attached,
            attached_ropes: attached,
        });
        LockWorld { actors: vec![other] }
    }

    #[test]
    fn tie_binds_winds_and_unties() {
        let (mut ties, mut beams, nodes) = tie_rig();
        assert!(toggle_ties(&mut ties, &mut beams, &nodes, A, -1, &ropable_world(false, 0)));
        assert!(ties[0].tied && ties[0].tying);
        assert_eq!(beams[0].remote, Some(B));
        assert_relative_eq!(beams[0].rest_length, 2.0);

        update_ties(&mut ties, &mut beams, DT);
        assert_relative_eq!(beams[0].rest_length, 2.0 - DT, epsilon = 1e-12);

        beams[0].stress = 2.0 * TIE_MAX_STRESS_DEFAULT;
        update_ties(&mut ties, &mut beams, DT);
        assert!(!ties[0].tying);

        assert!(toggle_ties(&mut ties, &mut beams, &nodes, A, -1, &LockWorld::default()));
        assert!(!ties[0].tied);
        assert!(beams[0].disabled);
    }

    #[test]
    fn tie_stops_at_min_length() {
        let (mut ties, mut beams, nodes) = tie_rig();
        toggle_ties(&mut ties, &mut beams, &nodes, A, -1, &ropable_world(false, 0));
        beams[0].rest_length = 0.9;
        update_ties(&mut ties, &mut beams, DT);
        assert!(!ties[0].tying);
        assert_relative_eq!(beams[0].rest_length, 0.9);
    }

    #[test]
    fn busy_ropable_needs_multilock() {
        let (mut ties, mut beams, nodes) = tie_rig();
        assert!(!toggle_ties(&mut ties, &mut beams, &nodes, A, -1, &ropable_world(false, 1)));
        assert!(toggle_ties(&mut ties, &mut beams, &nodes, A, -1, &ropable_world(true, 1)));
    }

    #[test]
    fn rope_locks_within_its_length() {
        let n = nodes(&[[0.0, 0.0, 0.0], [0.0, 0.5, 0.0]]);
        let mut beam = Beam::new(NodeIdx(0), NodeIdx(1));
        beam.set_length(1.5);
        let mut ropes = vec![Rope {
            root: 0,
            end: 1,
            beam: 0,
            group: 0,
            target: None,
        }];
        assert!(toggle_ropes(&mut ropes, &[beam.clone()], &n, -1, &ropable_world(false, 0)));
        assert!(ropes[0].is_locked());
        assert!(toggle_ropes(&mut ropes, &[beam.clone()], &n, -1, &ropable_world(false, 0)));
        assert!(!ropes[0].is_locked());
        beam.set_length(0.5);
        assert!(!toggle_ropes(&mut ropes, &[beam], &n, -1, &ropable_world(false, 0)));
    }

    #[test]
    fn deleting_an_actor_releases_its_links() {
        let own = nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let mut beams = vec![parked_beam(0, 1)];
        let mut hooks = vec![Hook::new(0, 0, 1)];
        hooks[0].state = HookState::Locked;
        hooks[0].target = Some(LinkTarget { actor: B, node: NodeIdx(3) });
        beams[0].remote = Some(B);
        beams[0].disabled = false;
        assert!(release_links_to(B, &mut hooks, &mut [], &mut [], &mut beams, &own));
        assert!(beams[0].disabled && !beams[0].is_inter_actor());
        assert!(!release_links_to(B, &mut hooks, &mut [], &mut [], &mut beams, &own));
    }
}
