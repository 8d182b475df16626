//! Slidenodes and the rails they ride on.
//!
//! A rail is a chain of existing beams. A slidenode is projected onto the
//! closest segment every substep and pulled towards the projection by a stiff
//! spring; the reaction is split between the segment's end nodes by the
//! projection ratio.

use sim_types::{ActorId, Vec3};
use sim_truck::document::records::SlideConstraints;
use thiserror::Error;

use crate::beam::Beam;
use crate::links::LockWorld;
use crate::node::Node;

/// Why a rail could not be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RailError {
    /// Two consecutive rail nodes are not joined by a beam.
    #[error("no beam between nodes {0} and {1}")]
    MissingBeam(usize, usize),
    /// Fewer than two nodes.
    #[error("a rail needs at least two nodes")]
    TooShort,
}

/// One rail segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailSegment {
    /// Beam carrying the segment.
    pub beam: usize,
    /// The beam's endpoints.
    pub ends: [usize; 2],
}

/// A chain of beams.
#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    /// `railgroups` id, or `None` for rails declared inline by a slidenode.
    pub id: Option<i32>,
    /// Segments in order.
    pub segments: Vec<RailSegment>,
    /// First and last node coincide.
    pub looped: bool,
}

impl Rail {
    /// Chain the beams joining consecutive `nodes`.
    ///
    /// # Errors
    ///
    /// [`RailError::MissingBeam`] when a pair has no beam between them.
    pub fn build(id: Option<i32>, nodes: &[usize], beams: &[Beam]) -> Result<Self, RailError> {
        if nodes.len() < 2 {
            return Err(RailError::TooShort);
        }
        let mut segments = Vec::with_capacity(nodes.len() - 1);
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let found = beams.iter().position(|beam| {
                let [p, q] = beam.nodes;
                beam.remote.is_none()
                    && ((p.index() == a && q.index() == b) || (p.index() == b && q.index() == a))
            });
            let Some(beam) = found else {
                return Err(RailError::MissingBeam(a, b));
            };
            let [p, q] = beams[beam].nodes;
            segments.push(RailSegment {
                beam,
                ends: [p.index(), q.index()],
            });
        }
        let looped = nodes.first() == nodes.last();
        Ok(Self {
            id,
            segments,
            looped,
        })
    }

    fn prev(&self, i: usize) -> Option<usize> {
        if self.segments.len() < 2 {
            None
        } else if i > 0 {
            Some(i - 1)
        } else {
            self.looped.then(|| self.segments.len() - 1)
        }
    }

    fn next(&self, i: usize) -> Option<usize> {
        if self.segments.len() < 2 {
            None
        } else if i + 1 < self.segments.len() {
            Some(i + 1)
        } else {
            self.looped.then_some(0)
        }
    }

    fn distance(&self, i: Option<usize>, nodes: &[Node], point: Vec3) -> f64 {
        i.and_then(|i| self.segments.get(i))
            .and_then(|s| segment_points(s, nodes))
            .map_or(f64::INFINITY, |[a, b]| distance_to_segment(a, b, point))
    }

    /// Segment closest to `point`, scanning the whole rail.
    #[must_use]
    pub fn closest_segment(&self, nodes: &[Node], point: Vec3) -> Option<(usize, f64)> {
        (0..self.segments.len())
            .map(|i| (i, self.distance(Some(i), nodes, point)))
            .filter(|(_, d)| d.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Step from segment `i` to a neighbour when one of them is closer.
    fn walk(&self, i: usize, nodes: &[Node], point: Vec3) -> usize {
        let here = self.distance(Some(i), nodes, point);
        let (prev, next) = (self.prev(i), self.next(i));
        let to_prev = self.distance(prev, nodes, point);
        let to_next = self.distance(next, nodes, point);
        if here > to_prev || here > to_next {
            if to_prev < to_next {
                return prev.unwrap_or(i);
            }
            return next.unwrap_or(i);
        }
        i
    }

    /// Endpoint positions of every segment.
    #[must_use]
    pub fn snapshot(&self, nodes: &[Node]) -> Vec<[Vec3; 2]> {
        self.segments
            .iter()
            .filter_map(|s| segment_points(s, nodes))
            .collect()
    }
}

fn segment_points(segment: &RailSegment, nodes: &[Node]) -> Option<[Vec3; 2]> {
    Some([
        nodes.get(segment.ends[0])?.position,
        nodes.get(segment.ends[1])?.position,
    ])
}

fn distance_to_segment(a: Vec3, b: Vec3, point: Vec3) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len <= 0.0 {
        return (point - a).norm();
    }
    let dir = ab / len;
    let t = (point - a).dot(&dir).clamp(0.0, len);
    (a + dir * t - point).norm()
}

/// Rail a slidenode currently rides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RailRef {
    /// Owner of the rail, `None` for the slidenode's own actor.
    pub actor: Option<ActorId>,
    /// Index in the owner's rail array.
    pub rail: usize,
}

/// Reaction of one slidenode substep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailPull {
    /// Force pulling the slidenode off the rail; the node receives its
    /// negation.
    pub force: Vec3,
    /// Segment endpoints in the rail owner's node array.
    pub ends: [usize; 2],
    /// Projection ratio along the segment.
    pub ratio: f64,
}

impl RailPull {
    /// Apply to the rail ends.
    pub fn apply_to_rail(&self, rail_nodes: &mut [Node]) {
        if let Some(n) = rail_nodes.get_mut(self.ends[0]) {
            n.forces += self.force * (1.0 - self.ratio);
        }
        if let Some(n) = rail_nodes.get_mut(self.ends[1]) {
            n.forces += self.force * self.ratio;
        }
    }
}

/// A node constrained to a rail.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SlideNode {
    /// Sliding node.
    pub node: usize,
    /// Rail assigned at spawn.
    pub default_rail: Option<usize>,
    /// Rail in use.
    pub rail: Option<RailRef>,
    /// Segment in use.
    pub segment: usize,
    /// Projection of the node onto the segment.
    pub ideal_position: Vec3,
    /// Projection ratio along the segment.
    pub ratio: f64,
    /// Slack the spring tolerates.
    pub init_threshold: f64,
    /// Current slack; shrinks towards `init_threshold` after attaching.
    pub cur_threshold: f64,
    /// Spring rate.
    pub spring_rate: f64,
    /// Force that tears the node off.
    pub break_force: f64,
    /// Slack reduction per second after attaching.
    pub attach_rate: f64,
    /// Search distance for the lock toggle.
    pub attach_distance: f64,
    /// May attach to its own actor's rails.
    pub attach_self: bool,
    /// May attach to other actors' rails.
    pub attach_foreign: bool,
    /// Torn off.
    pub broken: bool,
}

impl SlideNode {
    /// Slidenode on `node` riding `rail`, with the default tuning.
    #[must_use]
    pub fn new(node: usize, rail: Option<usize>) -> Self {
        Self {
            node,
            default_rail: rail,
            rail: rail.map(|rail| RailRef { actor: None, rail }),
            segment: 0,
            ideal_position: Vec3::zeros(),
            ratio: 0.0,
            init_threshold: 0.0,
            cur_threshold: 0.0,
            spring_rate: 9_000_000.0,
            break_force: f64::INFINITY,
            attach_rate: 1.0,
            attach_distance: 0.1,
            attach_self: false,
            attach_foreign: false,
            broken: false,
        }
    }

    /// Set both thresholds.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.init_threshold = tolerance;
        self.cur_threshold = tolerance;
    }

    /// Apply `Ca Cs Cf Cn` constraints; later letters win.
    pub fn apply_constraints(&mut self, c: &SlideConstraints) {
        if c.attach_all {
            self.attach_self = true;
            self.attach_foreign = true;
        }
        if c.attach_self {
            self.attach_self = true;
            self.attach_foreign = false;
        }
        if c.attach_foreign {
            self.attach_self = false;
            self.attach_foreign = true;
        }
        if c.attach_none {
            self.attach_self = false;
            self.attach_foreign = false;
        }
    }

    /// True when this slidenode rides another actor's rail.
    #[must_use]
    pub fn foreign_actor(&self) -> Option<ActorId> {
        self.rail.and_then(|r| r.actor)
    }

    /// Jump to the closest segment of the current rail.
    pub fn reset_position(&mut self, slider: Vec3, rail: &Rail, rail_nodes: &[Node], rail_beams: &[Beam]) {
        if let Some((i, _)) = rail.closest_segment(rail_nodes, slider) {
            self.segment = i;
        }
        self.update_position(slider, rail, rail_nodes, rail_beams);
    }

    /// Re-project onto the current or a neighbouring segment.
    pub fn update_position(&mut self, slider: Vec3, rail: &Rail, rail_nodes: &[Node], rail_beams: &[Beam]) {
        let Some(segment) = rail.segments.get(self.segment) else {
            self.ideal_position = slider;
            return;
        };
        if rail_beams.get(segment.beam).map_or(true, |b| b.broken) {
            self.ideal_position = slider;
            return;
        }
        self.segment = rail.walk(self.segment, rail_nodes, slider);
        let Some([a, b]) = rail
            .segments
            .get(self.segment)
            .and_then(|s| segment_points(s, rail_nodes))
        else {
            self.ideal_position = slider;
            return;
        };
        let ab = b - a;
        let len = ab.norm();
        let dir = if len > 0.0 { ab / len } else { Vec3::zeros() };
        let along = (slider - a).dot(&dir).clamp(0.0, len);
        self.ideal_position = a + dir * along;
        self.ratio = if len > 0.0 { along / len } else { 0.0 };
    }

    /// Spring force for this substep; `None` when detached or broken.
    pub fn pull(&mut self, slider: Vec3, rail: &Rail, rail_beams: &[Beam], dt: f64) -> Option<RailPull> {
        let segment = rail.segments.get(self.segment)?;
        if self.broken || rail_beams.get(segment.beam).map_or(true, |b| b.broken) {
            return None;
        }
        if self.cur_threshold > self.init_threshold {
            self.cur_threshold -= self.attach_rate * dt;
        }
        let offset = self.ideal_position - slider;
        let stretch = (offset.norm() - self.cur_threshold).max(0.0);
        let force = offset.try_normalize(0.0).unwrap_or_else(Vec3::zeros) * (-self.spring_rate * stretch);
        if force.norm() > self.break_force {
            self.broken = true;
        }
        Some(RailPull {
            force,
            ends: segment.ends,
            ratio: self.ratio,
        })
    }

    /// Switch rails; the slack starts at the current distance and shrinks.
    pub fn attach(&mut self, target: Option<(RailRef, usize, f64)>) {
        match target {
            Some((rail, segment, distance)) => {
                self.rail = Some(rail);
                self.segment = segment;
                self.cur_threshold = distance;
            }
            None => self.rail = None,
        }
    }

    /// Back to the spawn rail, unbroken.
    pub fn reset(&mut self) {
        self.rail = self.default_rail.map(|rail| RailRef { actor: None, rail });
        self.broken = false;
        self.cur_threshold = self.init_threshold;
    }
}

/// Project and pull every slidenode riding one of its own actor's rails.
pub fn update_local_slidenodes(
    slidenodes: &mut [SlideNode],
    rails: &[Rail],
    nodes: &mut [Node],
    beams: &[Beam],
    dt: f64,
) {
    for sn in slidenodes.iter_mut() {
        let Some(RailRef { actor: None, rail }) = sn.rail else {
            continue;
        };
        let (Some(rail), Some(slider)) = (rails.get(rail), nodes.get(sn.node).map(|n| n.position)) else {
            continue;
        };
        sn.update_position(slider, rail, nodes, beams);
        if let Some(pull) = sn.pull(slider, rail, beams, dt) {
            if let Some(n) = nodes.get_mut(sn.node) {
                n.forces -= pull.force;
            }
            pull.apply_to_rail(nodes);
        }
    }
}

/// Attach every free slidenode to the closest allowed rail, or detach all of
/// them when they are locked.
///
/// Flips `locked` and returns true when any slidenode took part.
pub fn toggle_slidenode_lock(
    slidenodes: &mut [SlideNode],
    locked: &mut bool,
    own: ActorId,
    nodes: &[Node],
    world: &LockWorld,
) -> bool {
    let mut any = false;
    for sn in slidenodes.iter_mut() {
        if !sn.attach_self && !sn.attach_foreign {
            continue;
        }
        any = true;
        if *locked {
            sn.attach(None);
            continue;
        }
        let Some(point) = nodes.get(sn.node).map(|n| n.position) else {
            continue;
        };
        let mut best: Option<(RailRef, usize, f64)> = None;
        for candidates in &world.actors {
            let is_own = candidates.actor == own;
            if !((is_own && sn.attach_self) || (!is_own && sn.attach_foreign)) {
                continue;
            }
            for (rail, segments) in candidates.rails.iter().enumerate() {
                let closest = segments
                    .iter()
                    .enumerate()
                    .map(|(i, [a, b])| (i, distance_to_segment(*a, *b, point)))
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                let Some((segment, d)) = closest else {
                    continue;
                };
                if d < sn.attach_distance && best.map_or(true, |(_, _, bd)| d < bd) {
                    let actor = (!is_own).then_some(candidates.actor);
                    best = Some((RailRef { actor, rail }, segment, d));
                }
            }
        }
        sn.attach(best);
    }
    *locked = !*locked;
    any
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::LockCandidates;
    use approx::assert_relative_eq;
    use sim_types::NodeIdx;

    const DT: f64 = 0.0005;

    fn rig(points: &[[f64; 3]], pairs: &[(usize, usize)]) -> (Vec<Node>, Vec<Beam>) {
        let nodes = points
            .iter()
            .enumerate()
            .map(|(i, p)| Node::new(NodeIdx::at(i), Vec3::new(p[0], p[1], p[2])))
            .collect();
        let beams = pairs
            .iter()
            .map(|&(a, b)| Beam::new(NodeIdx::at(a), NodeIdx::at(b)))
            .collect();
        (nodes, beams)
    }

    /// Two-segment rail along x, slider hovering above it.
    fn straight() -> (Vec<Node>, Vec<Beam>, Rail) {
        let (nodes, beams) = rig(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.5, 0.2, 0.0]],
            &[(0, 1), (2, 1)],
        );
        let rail = Rail::build(None, &[0, 1, 2], &beams).unwrap();
        (nodes, beams, rail)
    }

    #[test]
    fn rail_needs_beams_between_nodes() {
        let (_, beams, rail) = straight();
        assert_eq!(rail.segments.len(), 2);
        assert_eq!(rail.segments[1].ends, [2, 1]);
        assert!(!rail.looped);
        assert_eq!(Rail::build(None, &[0, 2], &beams), Err(RailError::MissingBeam(0, 2)));
        assert_eq!(Rail::build(None, &[0], &beams), Err(RailError::TooShort));
    }

    #[test]
    fn looped_rail_wraps_neighbours() {
        let (_, beams) = rig(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
            &[(0, 1), (1, 2), (2, 0)],
        );
        let rail = Rail::build(Some(3), &[0, 1, 2, 0], &beams).unwrap();
        assert!(rail.looped);
        assert_eq!(rail.prev(0), Some(2));
        assert_eq!(rail.next(2), Some(0));
    }

    #[test]
    fn projection_and_reaction_split() {
        let (mut nodes, beams, rail) = straight();
        let mut sn = SlideNode::new(3, Some(0));
        let slider = nodes[3].position;
        sn.reset_position(slider, &rail, &nodes, &beams);
        assert_eq!(sn.segment, 1);
        assert_relative_eq!(sn.ideal_position, Vec3::new(1.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(sn.ratio, 0.5, epsilon = 1e-12);

        let mut sns = vec![sn];
        update_local_slidenodes(&mut sns, &[rail], &mut nodes, &beams, DT);
        // The slider is pulled down, the rail ends up, in equal parts.
        let expected = 9_000_000.0 * 0.2;
        assert_relative_eq!(nodes[3].forces.y, -expected, epsilon = 1e-6);
        assert_relative_eq!(nodes[1].forces.y, expected * 0.5, epsilon = 1e-6);
        assert_relative_eq!(nodes[2].forces.y, expected * 0.5, epsilon = 1e-6);
        let total: Vec3 = nodes.iter().map(|n| n.forces).sum();
        assert_relative_eq!(total.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn tolerance_and_break_force() {
        let (nodes, beams, rail) = straight();
        let mut sn = SlideNode::new(3, Some(0));
        sn.set_tolerance(0.3);
        let slider = nodes[3].position;
        sn.reset_position(slider, &rail, &nodes, &beams);
        let pull = sn.pull(slider, &rail, &beams, DT).unwrap();
        assert_relative_eq!(pull.force.norm(), 0.0);

        sn.set_tolerance(0.0);
        sn.break_force = 1000.0;
        sn.pull(slider, &rail, &beams, DT);
        assert!(sn.broken);
        assert!(sn.pull(slider, &rail, &beams, DT).is_none());
        sn.reset();
        assert!(!sn.broken);
    }

    #[test]
    fn lock_toggle_finds_foreign_rail() {
        let (nodes, _, _) = straight();
        let mut sn = SlideNode::new(3, None);
        sn.apply_constraints(&SlideConstraints {
            attach_foreign: true,
            ..SlideConstraints::default()
        });
        sn.attach_distance = 0.5;
        let world = LockWorld {
            actors: vec![LockCandidates {
                actor: ActorId(9),
                rails: vec![vec![[Vec3::new(1.0, 0.1, 0.0), Vec3::new(2.0, 0.1, 0.0)]]],
                ..LockCandidates::default()
            }],
        };
        let mut locked = false;
        let mut sns = vec![sn];
        assert!(toggle_slidenode_lock(&mut sns, &mut locked, ActorId(1), &nodes, &world));
        assert!(locked);
        assert_eq!(sns[0].foreign_actor(), Some(ActorId(9)));
        assert_relative_eq!(sns[0].cur_threshold, 0.1, epsilon = 1e-12);

        toggle_slidenode_lock(&mut sns, &mut locked, ActorId(1), &nodes, &world);
        assert!(!locked);
        assert!(sns[0].rail.is_none());
    }

    #[test]
    fn slack_shrinks_at_attach_rate() {
        let (nodes, beams, rail) = straight();
        let mut sn = SlideNode::new(3, Some(0));
        sn.attach(Some((RailRef { actor: None, rail: 0 }, 1, 0.2)));
        let slider = nodes[3].position;
        sn.update_position(slider, &rail, &nodes, &beams);
        sn.pull(slider, &rail, &beams, DT);
        assert_relative_eq!(sn.cur_threshold, 0.2 - DT, epsilon = 1e-12);
    }
}
