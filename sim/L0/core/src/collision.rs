//! Ground contact, cab collisions and buoyancy.
//!
//! Contacts are resolved with a penalty-free reaction model: the normal
//! reaction cancels the inward force and the inward momentum within one
//! substep, and friction switches between a smoothed static regime and a
//! Stribeck curve:
//!
//! ```text
//! static:   |F_slip| ≤ μs·R        F_f = −μs·R·(1 − exp(−v/va))
//! kinetic:  g = μc + (μs − μc)·exp(−(v/vs)^α)   F_f = −(g + min(t2·v, 5))·R
//! ```
//!
//! Cab collisions test contacter nodes against cab triangles. Candidate
//! points come from a uniform [`PointGrid`]; each triangle carries a
//! [`CollisionRate`] that skips it for a while after a run of misses.

use hashbrown::HashMap;
use sim_types::{ActorId, TerrainQuery, Vec3};

use crate::node::Node;

// ==================== Ground model ====================

/// Friction parameters of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundModel {
    /// Slip speed below which static friction may hold (m/s).
    pub adhesion_velocity: f64,
    /// Static friction coefficient.
    pub static_friction: f64,
    /// Kinetic friction coefficient.
    pub dynamic_friction: f64,
    /// Speed-proportional friction term.
    pub hydrodynamic_friction: f64,
    /// Stribeck velocity (m/s).
    pub stribeck_velocity: f64,
    /// Stribeck exponent.
    pub alpha: f64,
    /// Overall grip multiplier.
    pub strength: f64,
}

impl Default for GroundModel {
    /// Dry concrete.
    fn default() -> Self {
        Self {
            adhesion_velocity: 1.0,
            static_friction: 0.8,
            dynamic_friction: 0.6,
            hydrodynamic_friction: 0.0,
            stribeck_velocity: 1.0,
            alpha: 2.0,
            strength: 1.0,
        }
    }
}

/// Result of one contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Force on the node after the contact.
    pub force: Vec3,
    /// Slip speed along the surface.
    pub slip: f64,
}

/// Resolve contact of a point of `mass` against a surface.
///
/// # Arguments
///
/// * `force` - Force already acting on the point this substep
/// * `velocity` - Velocity relative to the surface
/// * `normal` - Unit surface normal pointing out of the surface
/// * `friction_coef` - Per-node friction multiplier
///
/// # Returns
///
/// The total force to apply instead of `force`, and the slip speed.
#[must_use]
pub fn primitive_collision(
    mass: f64,
    friction_coef: f64,
    force: Vec3,
    velocity: Vec3,
    normal: Vec3,
    dt: f64,
    gm: &GroundModel,
) -> Contact {
    let v_normal = velocity.dot(&normal);
    let slip_vec = velocity - normal * v_normal;
    let slip = slip_vec.norm();
    let slip_dir = if slip > 0.0 { slip_vec / slip } else { Vec3::zeros() };

    let f_normal = force.dot(&normal);
    let mut reaction = -f_normal;
    if v_normal < 0.0 {
        reaction += -v_normal * mass / dt;
    }
    let reaction = reaction.max(0.0);

    let grip = reaction * gm.strength * friction_coef;
    let static_limit = gm.static_friction * grip;
    let tangential = force - normal * f_normal;
    let force = if slip < gm.adhesion_velocity
        && grip > 0.0
        && tangential.norm_squared() <= static_limit * static_limit
    {
        let ff = -static_limit * (1.0 - (-slip / gm.adhesion_velocity).exp());
        normal * (f_normal + reaction) + slip_dir * ff
    } else {
        let g = gm.dynamic_friction
            + (gm.static_friction - gm.dynamic_friction)
                * (-(slip / gm.stribeck_velocity).powf(gm.alpha)).exp();
        let ff = -(g + (gm.hydrodynamic_friction * slip).min(5.0)) * grip;
        force + normal * reaction + slip_dir * ff
    };
    Contact { force, slip }
}

/// Terrain normal at `(x, z)` from central differences of the height field.
#[must_use]
pub fn ground_normal(terrain: &dyn TerrainQuery, x: f64, z: f64) -> Vec3 {
    const E: f64 = 0.1;
    let h = |x, z| terrain.ground_height(x, z);
    match (h(x - E, z), h(x + E, z), h(x, z - E), h(x, z + E)) {
        (Some(xl), Some(xr), Some(zl), Some(zr)) => {
            Vec3::new(xl - xr, 2.0 * E, zl - zr).try_normalize(0.0).unwrap_or_else(Vec3::y)
        }
        _ => Vec3::y(),
    }
}

/// Collide every node with the terrain.
///
/// Runs on integrated positions: a node found below the ground is lifted
/// back onto it and its force replaced by the contact force. Sets each node's
/// `ground_contact` flag and last slip. Returns the number of nodes in
/// contact.
pub fn ground_collisions(nodes: &mut [Node], terrain: &dyn TerrainQuery, gm: &GroundModel, dt: f64) -> usize {
    let grip = terrain.ground_friction();
    let mut touching = 0;
    for node in nodes.iter_mut() {
        node.flags.ground_contact = false;
        if node.flags.no_ground_contact {
            continue;
        }
        let p = node.position;
        let Some(h) = terrain.ground_height(p.x, p.z) else {
            continue;
        };
        if h <= p.y {
            continue;
        }
        let normal = ground_normal(terrain, p.x, p.z);
        let model = GroundModel {
            strength: gm.strength * grip,
            ..*gm
        };
        let contact = primitive_collision(
            node.mass,
            node.friction_coef,
            node.forces,
            node.velocity,
            normal,
            dt,
            &model,
        );
        node.forces = contact.force;
        node.position.y = h;
        node.last_slip = contact.slip;
        node.flags.ground_contact = true;
        touching += 1;
    }
    touching
}

// ==================== Cab triangles ====================

/// One `cab` triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CabTriangle {
    /// Corners.
    pub nodes: [usize; 3],
    /// Collides with contacters.
    pub contact: bool,
    /// Floats.
    pub buoyant: bool,
}

/// Per-triangle skip counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionRate {
    /// Substeps left to skip; negative after a hit.
    pub rate: i32,
    /// Substeps skipped since the last test.
    pub distance: i32,
}

const MAX_SKIP: i32 = 12;
const INTRA_HIT_HOLD: i32 = -20_000;

/// A point in the collision grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointRef {
    /// Owner.
    pub actor: ActorId,
    /// Node.
    pub node: usize,
}

/// Uniform hash grid over contacter nodes.
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell: f64,
    cells: HashMap<[i64; 3], Vec<(PointRef, Vec3)>>,
}

impl Default for PointGrid {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PointGrid {
    /// Empty grid with cubic cells of side `cell`.
    #[must_use]
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(1e-3),
            cells: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: Vec3) -> [i64; 3] {
        [
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        ]
    }

    /// Drop all points.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Add one point.
    pub fn insert(&mut self, point: PointRef, position: Vec3) {
        let key = self.key(position);
        self.cells.entry(key).or_default().push((point, position));
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// True when no point was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Points inside the bounding box of a triangle grown by `margin`.
    #[must_use]
    pub fn query(&self, corners: [Vec3; 3], margin: f64) -> Vec<(PointRef, Vec3)> {
        let lo = corners[0].inf(&corners[1]).inf(&corners[2]).add_scalar(-margin);
        let hi = corners[0].sup(&corners[1]).sup(&corners[2]).add_scalar(margin);
        let (klo, khi) = (self.key(lo), self.key(hi));
        let mut hits = Vec::new();
        for x in klo[0]..=khi[0] {
            for y in klo[1]..=khi[1] {
                for z in klo[2]..=khi[2] {
                    let Some(points) = self.cells.get(&[x, y, z]) else {
                        continue;
                    };
                    hits.extend(points.iter().filter(|(_, p)| {
                        p.x >= lo.x && p.y >= lo.y && p.z >= lo.z && p.x <= hi.x && p.y <= hi.y && p.z <= hi.z
                    }));
                }
            }
        }
        hits
    }
}

/// A point expressed against a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleCoord {
    /// Barycentric weights of corners a, b, c.
    pub weights: [f64; 3],
    /// Signed distance from the plane along the normal.
    pub distance: f64,
}

/// Triangle `a, b, c` with unit normal `(b − a) × (c − a)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    a: Vec3,
    e1: Vec3,
    e2: Vec3,
    normal: Vec3,
}

impl Triangle {
    /// Triangle from its corners; `None` when degenerate.
    #[must_use]
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let (e1, e2) = (b - a, c - a);
        let normal = e1.cross(&e2).try_normalize(1e-12)?;
        Some(Self { a, e1, e2, normal })
    }

    /// Unit normal.
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Barycentric coordinates of `p` projected onto the plane, plus the
    /// plane distance.
    #[must_use]
    pub fn local(&self, p: Vec3) -> TriangleCoord {
        let rel = p - self.a;
        let distance = rel.dot(&self.normal);
        let q = rel - self.normal * distance;
        let (d00, d01, d11) = (self.e1.dot(&self.e1), self.e1.dot(&self.e2), self.e2.dot(&self.e2));
        let (d20, d21) = (q.dot(&self.e1), q.dot(&self.e2));
        let denom = d00 * d11 - d01 * d01;
        let beta = (d11 * d20 - d01 * d21) / denom;
        let gamma = (d00 * d21 - d01 * d20) / denom;
        TriangleCoord {
            weights: [1.0 - beta - gamma, beta, gamma],
            distance,
        }
    }
}

impl TriangleCoord {
    /// Inside the prism of the triangle within `margin` of its plane.
    #[must_use]
    pub fn inside(&self, margin: f64) -> bool {
        self.weights.iter().all(|w| *w >= 0.0) && self.distance.abs() <= margin
    }
}

/// Side of a triangle a hit comes from, voted by the hit node and its
/// neighbours; the hit node counts three times.
fn is_backface(distance: f64, normal: Vec3, surface: Vec3, neighbours: &[usize], nodes: &[Node]) -> bool {
    const WEIGHT: i32 = 3;
    let sign = |x: f64| if x >= 0.0 { 1 } else { -1 };
    let mut vote = WEIGHT * sign(distance);
    if neighbours.len() > WEIGHT as usize {
        for n in neighbours {
            if let Some(node) = nodes.get(*n) {
                vote += sign(normal.dot(&(node.position - surface)));
            }
        }
    }
    vote < 0
}

/// Force on a hit node from one triangle contact; the corners receive it
/// negated and weighted.
fn triangle_contact(
    hit: &Node,
    corners: [&Node; 3],
    coord: &TriangleCoord,
    normal: Vec3,
    remote: bool,
    dt: f64,
    gm: &GroundModel,
) -> Vec3 {
    let [w0, w1, w2] = coord.weights;
    let velocity = hit.velocity - (corners[0].velocity * w0 + corners[1].velocity * w1 + corners[2].velocity * w2);
    let tri_mass = corners[0].mass * w0 + corners[1].mass * w1 + corners[2].mass * w2;
    let mass = if remote || hit.mass + tri_mass <= 0.0 {
        hit.mass
    } else {
        hit.mass * tri_mass / (hit.mass + tri_mass)
    };
    primitive_collision(mass, hit.friction_coef, Vec3::zeros(), velocity, normal, dt, gm).force
}

fn corner_positions(nodes: &[Node], tri: &CabTriangle) -> Option<[Vec3; 3]> {
    Some([
        nodes.get(tri.nodes[0])?.position,
        nodes.get(tri.nodes[1])?.position,
        nodes.get(tri.nodes[2])?.position,
    ])
}

fn push_corners(nodes: &mut [Node], tri: &CabTriangle, force: Vec3, weights: [f64; 3]) {
    for (corner, w) in tri.nodes.iter().zip(weights) {
        if let Some(n) = nodes.get_mut(*corner) {
            n.forces -= force * w;
        }
    }
}

/// Contacter nodes against the actor's own cab triangles.
///
/// `rates` holds one entry per contact triangle. Tyre nodes and the triangle's own corners are ignored. Returns the
/// number of contacts.
pub fn intra_actor_collisions(
    nodes: &mut [Node],
    cabs: &[CabTriangle],
    rates: &mut [CollisionRate],
    grid: &PointGrid,
    collision_range: f64,
    dt: f64,
    gm: &GroundModel,
) -> usize {
    let mut contacts = 0;
    for (tri, rate) in cabs.iter().filter(|t| t.contact).zip(rates.iter_mut()) {
        if rate.rate > 0 {
            rate.distance += 1;
            rate.rate -= 1;
            continue;
        }
        if rate.distance > 0 {
            rate.rate = rate.distance.min(MAX_SKIP);
            rate.distance = 0;
        }
        let Some(corners) = corner_positions(nodes, tri) else {
            continue;
        };
        let Some(triangle) = Triangle::new(corners[0], corners[1], corners[2]) else {
            continue;
        };
        let mut hit_any = false;
        for (point, _) in grid.query(corners, collision_range) {
            let Some(hit) = nodes.get(point.node) else {
                continue;
            };
            if hit.flags.tyre || tri.nodes.contains(&point.node) {
                continue;
            }
            let coord = triangle.local(hit.position);
            if !coord.inside(collision_range) {
                continue;
            }
            hit_any = true;
            let normal = if coord.distance < 0.0 {
                -triangle.normal()
            } else {
                triangle.normal()
            };
            let c = [&nodes[tri.nodes[0]], &nodes[tri.nodes[1]], &nodes[tri.nodes[2]]];
            let force = triangle_contact(hit, c, &coord, normal, false, dt, gm);
            nodes[point.node].forces += force;
            push_corners(nodes, tri, force, coord.weights);
            contacts += 1;
        }
        if hit_any {
            rate.rate = INTRA_HIT_HOLD;
        } else {
            rate.rate += 1;
        }
    }
    contacts
}

/// A contact force owed to a node of another actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForeignHit {
    /// Node hit.
    pub target: PointRef,
    /// Force to add to it.
    pub force: Vec3,
}

/// Read-only view of another actor for inter-actor collision.
#[derive(Debug, Clone, Copy)]
pub struct ForeignActor<'a> {
    /// Actor id.
    pub id: ActorId,
    /// Its nodes.
    pub nodes: &'a [Node],
    /// Node neighbour lists, for the backface vote.
    pub neighbours: &'a [Vec<usize>],
    /// Networked actors take the full contact force.
    pub remote: bool,
}

/// Foreign contacter nodes against this actor's cab triangles.
///
/// Triangle-side forces are applied to `nodes`; the forces owed to the hit
/// nodes are returned for the caller to apply once every actor has been
/// processed.
#[allow(clippy::too_many_arguments)]
pub fn inter_actor_collisions(
    nodes: &mut [Node],
    cabs: &[CabTriangle],
    rates: &mut [CollisionRate],
    grid: &PointGrid,
    others: &[ForeignActor<'_>],
    collision_range: f64,
    dt: f64,
    gm: &GroundModel,
) -> Vec<ForeignHit> {
    let mut owed = Vec::new();
    for (tri, rate) in cabs.iter().filter(|t| t.contact).zip(rates.iter_mut()) {
        if rate.rate > 0 {
            rate.distance += 1;
            rate.rate -= 1;
            continue;
        }
        rate.rate = rate.distance.min(MAX_SKIP);
        rate.distance = 0;
        let Some(corners) = corner_positions(nodes, tri) else {
            continue;
        };
        let Some(triangle) = Triangle::new(corners[0], corners[1], corners[2]) else {
            continue;
        };
        let hits = grid.query(corners, collision_range);
        if hits.is_empty() {
            rate.rate += 1;
            continue;
        }
        for (point, position) in hits {
            let Some(other) = others.iter().find(|o| o.id == point.actor) else {
                continue;
            };
            let Some(hit) = other.nodes.get(point.node) else {
                continue;
            };
            let coord = triangle.local(position);
            if !coord.inside(collision_range) {
                continue;
            }
            rate.rate = 0;
            let mut normal = triangle.normal();
            let neighbours = other.neighbours.get(point.node).map_or(&[][..], Vec::as_slice);
            if is_backface(coord.distance, normal, corners[0], neighbours, other.nodes) {
                normal = -normal;
            }
            let c = [&nodes[tri.nodes[0]], &nodes[tri.nodes[1]], &nodes[tri.nodes[2]]];
            let force = triangle_contact(hit, c, &coord, normal, other.remote, dt, gm);
            push_corners(nodes, tri, force, coord.weights);
            owed.push(ForeignHit { target: point, force });
        }
    }
    owed
}

// ==================== Buoyancy ====================

/// Water density (kg/m³).
pub const WATER_DENSITY: f64 = 1000.0;

/// Buoyancy and water drag on buoyant cab triangles.
///
/// The submerged part of a triangle pushes along its normal with the
/// hydrostatic pressure at its centroid; the corners share the force
/// equally. Returns the number of wet triangles.
pub fn buoyancy(nodes: &mut [Node], cabs: &[CabTriangle], terrain: &dyn TerrainQuery, gravity: f64, water_drag: f64) -> usize {
    let mut wet = 0;
    for tri in cabs.iter().filter(|t| t.buoyant) {
        let Some(c) = corner_positions(nodes, tri) else {
            continue;
        };
        let centroid = (c[0] + c[1] + c[2]) / 3.0;
        let Some(level) = terrain.water_height(centroid.x, centroid.z) else {
            continue;
        };
        let depth = level - centroid.y;
        if depth <= 0.0 {
            continue;
        }
        let area_normal = (c[1] - c[0]).cross(&(c[2] - c[0])) * 0.5;
        let area = area_normal.norm();
        if area <= 0.0 {
            continue;
        }
        let pressure = WATER_DENSITY * gravity.abs() * depth;
        let lift = area_normal * (pressure / 3.0);
        let velocity = tri
            .nodes
            .iter()
            .filter_map(|i| nodes.get(*i).map(|n| n.velocity))
            .sum::<Vec3>()
            / 3.0;
        let drag = -velocity * (water_drag * area / 3.0);
        for corner in tri.nodes {
            if let Some(n) = nodes.get_mut(corner) {
                n.forces += lift + drag;
            }
        }
        wet += 1;
    }
    wet
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::{FlatTerrain, NodeIdx};

    const DT: f64 = 0.0005;

    fn node(p: [f64; 3]) -> Node {
        Node::new(NodeIdx(0), Vec3::new(p[0], p[1], p[2]))
    }

    #[test]
    fn resting_contact_cancels_weight() {
        let gm = GroundModel::default();
        let weight = Vec3::new(0.0, -98.0, 0.0);
        let c = primitive_collision(10.0, 1.0, weight, Vec3::zeros(), Vec3::y(), DT, &gm);
        assert_relative_eq!(c.force.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn impact_removes_inward_momentum() {
        let gm = GroundModel::default();
        let c = primitive_collision(10.0, 1.0, Vec3::zeros(), Vec3::new(0.0, -1.0, 0.0), Vec3::y(), DT, &gm);
        assert_relative_eq!(c.force.y, 10.0 / DT, epsilon = 1e-6);
    }

    #[test]
    fn sliding_node_feels_kinetic_friction() {
        let gm = GroundModel::default();
        let weight = Vec3::new(0.0, -98.0, 0.0);
        let c = primitive_collision(10.0, 1.0, weight, Vec3::new(5.0, 0.0, 0.0), Vec3::y(), DT, &gm);
        assert_relative_eq!(c.slip, 5.0);
        assert!(c.force.x < 0.0);
        let g = gm.dynamic_friction
            + (gm.static_friction - gm.dynamic_friction) * (-(5.0_f64).powf(gm.alpha)).exp();
        assert_relative_eq!(c.force.x, -g * 98.0, epsilon = 1e-9);
    }

    #[test]
    fn ground_contact_only_below_terrain() {
        let terrain = FlatTerrain::new(0.0);
        let mut nodes = vec![node([0.0, -0.01, 0.0]), node([0.0, 0.5, 0.0])];
        nodes[0].forces = Vec3::new(0.0, -98.0, 0.0);
        nodes[1].forces = Vec3::new(0.0, -98.0, 0.0);
        let touching = ground_collisions(&mut nodes, &terrain, &GroundModel::default(), DT);
        assert_eq!(touching, 1);
        assert!(nodes[0].flags.ground_contact && !nodes[1].flags.ground_contact);
        assert_relative_eq!(nodes[0].forces.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(nodes[1].forces.y, -98.0);
        assert_relative_eq!(nodes[0].position.y, 0.0);
        assert_relative_eq!(nodes[1].position.y, 0.5);
    }

    #[test]
    fn no_contact_flag_passes_through() {
        let terrain = FlatTerrain::new(0.0);
        let mut nodes = vec![node([0.0, -1.0, 0.0])];
        nodes[0].flags.no_ground_contact = true;
        assert_eq!(ground_collisions(&mut nodes, &terrain, &GroundModel::default(), DT), 0);
    }

    #[test]
    fn flat_ground_normal_points_up() {
        let n = ground_normal(&FlatTerrain::new(3.0), 1.0, 2.0);
        assert_relative_eq!(n, Vec3::y());
    }

    #[test]
    fn barycentric_coordinates() {
        let t = Triangle::new(Vec3::zeros(), Vec3::x(), Vec3::z()).unwrap();
        let local = t.local(Vec3::new(0.25, -0.01, 0.25));
        assert_relative_eq!(local.weights[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(local.weights[1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(local.weights[2], 0.25, epsilon = 1e-12);
        // x × z points down.
        assert_relative_eq!(local.distance, 0.01, epsilon = 1e-12);
        assert!(local.inside(0.02));
        assert!(!t.local(Vec3::new(1.0, 0.0, 1.0)).inside(0.02));
    }

    #[test]
    fn grid_query_filters_by_box() {
        let mut grid = PointGrid::new(0.5);
        let a = PointRef { actor: ActorId(1), node: 0 };
        let b = PointRef { actor: ActorId(1), node: 1 };
        grid.insert(a, Vec3::new(0.2, 0.0, 0.2));
        grid.insert(b, Vec3::new(3.0, 0.0, 3.0));
        assert_eq!(grid.len(), 2);
        let hits = grid.query([Vec3::zeros(), Vec3::x(), Vec3::z()], 0.05);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a);
    }

    fn cab_rig() -> (Vec<Node>, Vec<CabTriangle>, PointGrid) {
        let mut nodes = vec![
            node([0.0, 0.0, 0.0]),
            node([1.0, 0.0, 0.0]),
            node([0.0, 0.0, 1.0]),
            node([0.25, 0.01, 0.25]),
        ];
        nodes[3].velocity = Vec3::new(0.0, -1.0, 0.0);
        let cabs = vec![CabTriangle {
            nodes: [0, 1, 2],
            contact: true,
            buoyant: false,
        }];
        let mut grid = PointGrid::new(0.5);
        grid.insert(PointRef { actor: ActorId(1), node: 3 }, nodes[3].position);
        (nodes, cabs, grid)
    }

    #[test]
    fn self_collision_pushes_node_and_triangle_apart() {
        let (mut nodes, cabs, grid) = cab_rig();
        let mut rates = vec![CollisionRate::default()];
        let n = intra_actor_collisions(&mut nodes, &cabs, &mut rates, &grid, 0.02, DT, &GroundModel::default());
        assert_eq!(n, 1);
        assert!(nodes[3].forces.y > 0.0);
        let total: Vec3 = nodes.iter().map(|n| n.forces).sum();
        assert_relative_eq!(total.norm(), 0.0, epsilon = 1e-6);
        assert_eq!(rates[0].rate, INTRA_HIT_HOLD);
    }

    #[test]
    fn missed_triangles_back_off() {
        let (mut nodes, cabs, _) = cab_rig();
        let grid = PointGrid::new(0.5);
        let mut rates = vec![CollisionRate::default()];
        intra_actor_collisions(&mut nodes, &cabs, &mut rates, &grid, 0.02, DT, &GroundModel::default());
        assert_eq!(rates[0].rate, 1);
        intra_actor_collisions(&mut nodes, &cabs, &mut rates, &grid, 0.02, DT, &GroundModel::default());
        assert_eq!(rates[0], CollisionRate { rate: 0, distance: 1 });
    }

    #[test]
    fn foreign_hits_are_returned_not_applied() {
        let (mut own, cabs, _) = cab_rig();
        let mut foreign = vec![node([0.25, 0.01, 0.25])];
        foreign[0].velocity = Vec3::new(0.0, -1.0, 0.0);
        own.truncate(3);
        let mut grid = PointGrid::new(0.5);
        grid.insert(PointRef { actor: ActorId(2), node: 0 }, foreign[0].position);
        let others = [ForeignActor {
            id: ActorId(2),
            nodes: &foreign,
            neighbours: &[],
            remote: false,
        }];
        let mut rates = vec![CollisionRate::default()];
        let owed = inter_actor_collisions(&mut own, &cabs, &mut rates, &grid, &others, 0.02, DT, &GroundModel::default());
        assert_eq!(owed.len(), 1);
        assert!(owed[0].force.y > 0.0);
        let on_triangle: Vec3 = own.iter().map(|n| n.forces).sum();
        assert_relative_eq!(on_triangle + owed[0].force, Vec3::zeros(), epsilon = 1e-6);
        foreign[0].forces += owed[0].force;
    }

    #[test]
    fn submerged_triangle_floats() {
        let terrain = FlatTerrain::new(-10.0).with_water(1.0);
        let mut nodes = vec![node([0.0, 0.0, 0.0]), node([0.0, 0.0, 1.0]), node([1.0, 0.0, 0.0])];
        let cabs = vec![CabTriangle {
            nodes: [0, 1, 2],
            contact: false,
            buoyant: true,
        }];
        assert_eq!(buoyancy(&mut nodes, &cabs, &terrain, -9.8, 0.0), 1);
        let total: Vec3 = nodes.iter().map(|n| n.forces).sum();
        // z × x points up; half a square metre one metre down.
        assert_relative_eq!(total.y, WATER_DENSITY * 9.8 * 0.5, epsilon = 1e-6);
    }
}
