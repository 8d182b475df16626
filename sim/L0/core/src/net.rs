//! Network echo encoding.
//!
//! A locally simulated actor streams a compact update each frame: a fixed
//! [`VehicleState`] header, one reference position as three `f32`, every
//! non-wheel node as an `i16` triple relative to that reference, and one
//! `f32` rotation per wheel. Receivers interpolate between the two updates
//! that bracket their clock and rebuild the tyre rings from the wheel
//! rotations.
//!
//! All multi-byte fields are little endian.

use nalgebra::{Unit, UnitQuaternion};
use sim_types::{Aabb, Vec3};
use thiserror::Error;

use crate::node::Node;
use crate::wheel::Wheel;

/// Decoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    /// The buffer ended before the expected layout.
    #[error("stream update truncated: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes the layout needs.
        expected: usize,
        /// Bytes received.
        got: usize,
    },
}

/// Bits of [`VehicleState::flags`].
pub mod flag {
    /// Horn sounding.
    pub const HORN: u32 = 1 << 0;
    /// Police siren.
    pub const POLICE_AUDIO: u32 = 1 << 1;
    /// Particle emitters on.
    pub const PARTICLE: u32 = 1 << 2;
    /// Parking brake applied.
    pub const PARKING_BRAKE: u32 = 1 << 3;
    /// Traction control modulating.
    pub const TC_ACTIVE: u32 = 1 << 4;
    /// Anti-lock brakes modulating.
    pub const ALB_ACTIVE: u32 = 1 << 5;
    /// Ignition on.
    pub const ENGINE_CONTACT: u32 = 1 << 6;
    /// Engine running.
    pub const ENGINE_RUN: u32 = 1 << 7;
    /// Automatic gearbox.
    pub const MODE_AUTOMATIC: u32 = 1 << 8;
    /// Semi-automatic gearbox.
    pub const MODE_SEMIAUTO: u32 = 1 << 9;
    /// Sequential manual gearbox.
    pub const MODE_MANUAL: u32 = 1 << 10;
    /// Stick-shift gearbox.
    pub const MODE_MANUAL_STICK: u32 = 1 << 11;
    /// Stick-shift gearbox with ranges.
    pub const MODE_MANUAL_RANGES: u32 = 1 << 12;
}

/// Bits of [`VehicleState::lights`].
pub mod light {
    /// Custom light `n` (1-based, up to 10).
    #[must_use]
    pub const fn custom(n: u32) -> u32 {
        if n >= 1 && n <= 10 {
            1 << (n - 1)
        } else {
            0
        }
    }
    /// Headlights.
    pub const HEADLIGHT: u32 = 1 << 10;
    /// High beams.
    pub const HIGHBEAMS: u32 = 1 << 11;
    /// Fog lights.
    pub const FOGLIGHTS: u32 = 1 << 12;
    /// Side lights.
    pub const SIDELIGHTS: u32 = 1 << 13;
    /// Brake lights.
    pub const BRAKES: u32 = 1 << 14;
    /// Reverse lights.
    pub const REVERSE: u32 = 1 << 15;
    /// Beacons.
    pub const BEACONS: u32 = 1 << 16;
    /// Left blinker.
    pub const BLINK_LEFT: u32 = 1 << 17;
    /// Right blinker.
    pub const BLINK_RIGHT: u32 = 1 << 18;
    /// Hazard lights.
    pub const BLINK_WARN: u32 = 1 << 19;
}

/// Fixed header of a stream update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleState {
    /// Sender clock in milliseconds.
    pub time: i32,
    /// Engine rpm.
    pub engine_rpm: f32,
    /// Accelerator [0, 1].
    pub accelerator: f32,
    /// Clutch [0, 1].
    pub clutch: f32,
    /// Gear, -1 reverse, 0 neutral.
    pub gear: i32,
    /// Steering hydro state.
    pub steering: f32,
    /// Brake pedal [0, 1].
    pub brake: f32,
    /// Wheel speed (m/s).
    pub wheel_speed: f32,
    /// [`flag`] bits.
    pub flags: u32,
    /// [`light`] bits.
    pub lights: u32,
}

impl VehicleState {
    /// Encoded size.
    pub const SIZE: usize = 40;

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.time.to_le_bytes());
        for f in [self.engine_rpm, self.accelerator, self.clutch] {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(&self.gear.to_le_bytes());
        for f in [self.steering, self.brake, self.wheel_speed] {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.lights.to_le_bytes());
    }

    fn read(r: &mut Reader<'_>) -> Self {
        Self {
            time: r.i32(),
            engine_rpm: r.f32(),
            accelerator: r.f32(),
            clutch: r.f32(),
            gear: r.i32(),
            steering: r.f32(),
            brake: r.f32(),
            wheel_speed: r.f32(),
            flags: r.u32(),
            lights: r.u32(),
        }
    }
}

/// Cursor over a buffer whose length was checked up front.
struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(src) = self.buf.get(self.at..self.at + N) {
            out.copy_from_slice(src);
        }
        self.at += N;
        out
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }
}

/// Position quantisation factor for an actor of the given bounds.
///
/// Chosen so that every node within 1.5 times the largest extent of the
/// box fits an `i16`.
#[must_use]
pub fn node_compression(bounds: &Aabb) -> f64 {
    let size = bounds.size();
    let max_dimension = size.x.max(size.y).max(size.z).max(1.0);
    f64::from(i16::MAX) / (max_dimension * 1.5).ceil()
}

/// One frame of a streamed actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorStreamUpdate {
    /// Header.
    pub state: VehicleState,
    /// Reference position, the centre of the bounding box.
    pub reference: [f32; 3],
    /// Quantised node offsets from the reference.
    pub nodes: Vec<[i16; 3]>,
    /// Accumulated wheel rotations (rad).
    pub wheel_rotations: Vec<f32>,
}

#[allow(clippy::cast_possible_truncation)]
fn quantise(v: f64) -> i16 {
    v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

impl ActorStreamUpdate {
    /// Pack node positions about `reference`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn pack(
        state: VehicleState,
        positions: impl IntoIterator<Item = Vec3>,
        reference: Vec3,
        compression: f64,
        wheel_rotations: impl IntoIterator<Item = f64>,
    ) -> Self {
        Self {
            state,
            reference: [reference.x as f32, reference.y as f32, reference.z as f32],
            nodes: positions
                .into_iter()
                .map(|p| {
                    let rel = (p - reference) * compression;
                    [quantise(rel.x), quantise(rel.y), quantise(rel.z)]
                })
                .collect(),
            wheel_rotations: wheel_rotations.into_iter().map(|r| r as f32).collect(),
        }
    }

    /// Reference position as a vector.
    #[must_use]
    pub fn reference(&self) -> Vec3 {
        Vec3::new(
            f64::from(self.reference[0]),
            f64::from(self.reference[1]),
            f64::from(self.reference[2]),
        )
    }

    /// Node positions restored from the quantised offsets.
    #[must_use]
    pub fn positions(&self, compression: f64) -> Vec<Vec3> {
        let reference = self.reference();
        self.nodes
            .iter()
            .map(|q| {
                reference + Vec3::new(f64::from(q[0]), f64::from(q[1]), f64::from(q[2])) / compression
            })
            .collect()
    }

    /// Encoded size for a given layout.
    #[must_use]
    pub fn encoded_len(nodes: usize, wheels: usize) -> usize {
        VehicleState::SIZE + 12 + nodes * 6 + wheels * 4
    }

    /// Serialise.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::encoded_len(self.nodes.len(), self.wheel_rotations.len()));
        self.state.write(&mut out);
        for f in self.reference {
            out.extend_from_slice(&f.to_le_bytes());
        }
        for q in &self.nodes {
            for c in q {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        for r in &self.wheel_rotations {
            out.extend_from_slice(&r.to_le_bytes());
        }
        out
    }

    /// Deserialise an update of an actor with `nodes` streamed nodes and
    /// `wheels` wheels.
    pub fn decode(buf: &[u8], nodes: usize, wheels: usize) -> Result<Self, NetError> {
        let expected = Self::encoded_len(nodes, wheels);
        if buf.len() < expected {
            return Err(NetError::Truncated {
                expected,
                got: buf.len(),
            });
        }
        let mut r = Reader { buf, at: 0 };
        let state = VehicleState::read(&mut r);
        let reference = [r.f32(), r.f32(), r.f32()];
        let nodes = (0..nodes).map(|_| [r.i16(), r.i16(), r.i16()]).collect();
        let wheel_rotations = (0..wheels).map(|_| r.f32()).collect();
        Ok(Self {
            state,
            reference,
            nodes,
            wheel_rotations,
        })
    }
}

/// Interpolated pose of a remote actor.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePose {
    /// Header of the older bracketing update.
    pub state: VehicleState,
    /// Node positions.
    pub positions: Vec<Vec3>,
    /// Node velocities.
    pub velocities: Vec<Vec3>,
    /// Wheel rotations.
    pub wheel_rotations: Vec<f64>,
}

/// Received updates of one remote actor, oldest first.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    updates: Vec<ActorStreamUpdate>,
}

impl StreamBuffer {
    /// Queue an update; out-of-order updates are dropped.
    pub fn push(&mut self, update: ActorStreamUpdate) {
        if self.updates.last().map_or(true, |last| last.state.time < update.state.time) {
            self.updates.push(update);
        }
    }

    /// Updates queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Pose at receiver time `now` (ms).
    ///
    /// Updates older than the bracketing pair are discarded. When the
    /// newest update is more than four intervals behind, the buffer is
    /// flushed and `None` returned until new data arrives.
    pub fn sample(&mut self, now: i32, compression: f64) -> Option<RemotePose> {
        if self.updates.len() < 2 {
            return None;
        }
        let mut first = 0;
        for i in 0..self.updates.len() - 1 {
            if self.updates[i].state.time > now {
                break;
            }
            first = i;
        }
        self.updates.drain(..first);
        let (t0, t1) = (self.updates.first()?.state.time, self.updates.get(1)?.state.time);
        let span = f64::from(t1 - t0);
        if span <= 0.0 {
            return None;
        }
        let t = f64::from(now - t0) / span;
        if t > 4.0 {
            self.updates.clear();
            return None;
        }
        let (a, b) = (self.updates.first()?, self.updates.get(1)?);
        let (pa, pb) = (a.positions(compression), b.positions(compression));
        let positions = pa.iter().zip(&pb).map(|(p, q)| p + (q - p) * t).collect();
        let velocities = pa.iter().zip(&pb).map(|(p, q)| (q - p) * 1000.0 / span).collect();
        let wheel_rotations = a
            .wheel_rotations
            .iter()
            .zip(&b.wheel_rotations)
            .map(|(r, s)| f64::from(*r) + f64::from(s - r) * t)
            .collect();
        Some(RemotePose {
            state: a.state,
            positions,
            velocities,
            wheel_rotations,
        })
    }
}

/// Rebuild the tyre and rim rings of a remote wheel from its rotation.
pub fn place_wheel_nodes(wheel: &Wheel, nodes: &mut [Node], rotation: f64) {
    let pos = |i: usize| nodes.get(i).map_or_else(Vec3::zeros, |n| n.position);
    let (a0, a1) = (pos(wheel.axis[0]), pos(wheel.axis[1]));
    let Some(axis) = Unit::try_new(a1 - a0, 1e-9) else {
        return;
    };
    let attach = pos(wheel.near_attach) - a0;
    let dir = axis.into_inner();
    let ortho = -(attach - dir * dir.dot(&attach));
    let Some(ray) = ortho.cross(&dir).try_normalize(1e-9) else {
        return;
    };
    for (ring, radius) in [(&wheel.nodes, wheel.radius), (&wheel.rim_nodes, wheel.rim_radius)] {
        let rays = ring.len() / 2;
        if rays == 0 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let step = std::f64::consts::TAU / rays as f64;
        for j in 0..rays {
            #[allow(clippy::cast_precision_loss)]
            let turn = UnitQuaternion::from_axis_angle(&axis, rotation - step * j as f64);
            let offset = turn * (ray * radius);
            for (side, anchor) in [(0, a0), (1, a1)] {
                if let Some(n) = ring.get(j * 2 + side).and_then(|&i| nodes.get_mut(i)) {
                    n.position = anchor + offset;
                }
            }
        }
    }
}

// ==================== OutGauge ====================

/// Bits of [`OutGaugePacket::flags`].
pub mod og {
    /// Turbo gauge present.
    pub const TURBO: u16 = 8192;
    /// Prefer km/h.
    pub const KM: u16 = 16384;
    /// Prefer bar.
    pub const BAR: u16 = 32768;
}

/// Dashboard light bits of [`OutGaugePacket::dash_lights`] and
/// [`OutGaugePacket::show_lights`].
pub mod dash {
    /// Shift light.
    pub const SHIFT: u32 = 1 << 0;
    /// High beams.
    pub const FULLBEAM: u32 = 1 << 1;
    /// Parking brake.
    pub const HANDBRAKE: u32 = 1 << 2;
    /// Traction control.
    pub const TC: u32 = 1 << 4;
    /// Left blinker.
    pub const SIGNAL_L: u32 = 1 << 5;
    /// Right blinker.
    pub const SIGNAL_R: u32 = 1 << 6;
    /// Hazard lights.
    pub const SIGNAL_ANY: u32 = 1 << 7;
    /// Ignition on, engine off.
    pub const BATTERY: u32 = 1 << 9;
    /// Anti-lock brakes.
    pub const ABS: u32 = 1 << 10;
}

/// Dashboard state of the player actor, the input of [`OutGaugePacket::build`].
#[derive(Debug, Clone, PartialEq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Dashboard {
    /// Actor name.
    pub name: String,
    /// Engine present.
    pub has_engine: bool,
    /// Turbo present.
    pub has_turbo: bool,
    /// Gear, -1 reverse.
    pub gear: i32,
    /// Wheel speed (m/s).
    pub wheel_speed: f64,
    /// Engine rpm.
    pub rpm: f64,
    /// Turbo pressure (psi).
    pub turbo_psi: f64,
    /// Accelerator.
    pub throttle: f64,
    /// Brake.
    pub brake: f64,
    /// Clutch engagement.
    pub clutch: f64,
    /// Parking brake.
    pub parking_brake: bool,
    /// Headlights.
    pub headlights: bool,
    /// Ignition on.
    pub contact: bool,
    /// Engine running.
    pub running: bool,
    /// Blinker lamps: left, right, warn.
    pub blinkers: [bool; 3],
    /// Traction control shown and on.
    pub tc: Option<bool>,
    /// Anti-lock brakes shown and on.
    pub alb: Option<bool>,
}

/// Dashboard telemetry datagram in the OutGauge layout.
#[derive(Debug, Clone, PartialEq)]
pub struct OutGaugePacket {
    /// Milliseconds.
    pub time: u32,
    /// Car label.
    pub car: [u8; 4],
    /// [`og`] bits.
    pub flags: u16,
    /// 0 reverse, 1 neutral, 2 first.
    pub gear: u8,
    /// Speed (m/s).
    pub speed: f32,
    /// Rpm.
    pub rpm: f32,
    /// Turbo (bar).
    pub turbo: f32,
    /// Lights the dashboard has.
    pub dash_lights: u32,
    /// Lights currently on.
    pub show_lights: u32,
    /// Throttle [0, 1].
    pub throttle: f32,
    /// Brake [0, 1].
    pub brake: f32,
    /// Clutch pedal [0, 1].
    pub clutch: f32,
    /// First display line.
    pub display1: [u8; 16],
    /// Second display line.
    pub display2: [u8; 16],
    /// Receiver id.
    pub id: i32,
}

const PSI_TO_BAR: f64 = 0.068_947_572_9;

fn text16(s: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let n = s.len().min(15);
    out[..n].copy_from_slice(&s[..n]);
    out
}

impl OutGaugePacket {
    /// Encoded size.
    pub const SIZE: usize = 96;

    /// Packet for the player's actor, or a placeholder when there is none.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn build(time: u32, id: i32, dashboard: Option<&Dashboard>) -> Self {
        let mut p = Self {
            time,
            car: *b"RoR\0",
            flags: og::KM,
            gear: 0,
            speed: 0.0,
            rpm: 0.0,
            turbo: 0.0,
            dash_lights: 0,
            show_lights: 0,
            throttle: 0.0,
            brake: 0.0,
            clutch: 0.0,
            display1: [0; 16],
            display2: [0; 16],
            id,
        };
        let Some(d) = dashboard else {
            p.display2 = text16(b"not in vehicle");
            return p;
        };
        if !d.has_engine {
            p.display2 = text16(b"no engine");
            return p;
        }
        if d.has_turbo {
            p.flags |= og::TURBO;
        }
        p.gear = u8::try_from((d.gear + 1).max(0)).unwrap_or(u8::MAX);
        p.speed = d.wheel_speed.abs() as f32;
        p.rpm = d.rpm as f32;
        p.turbo = (d.turbo_psi * PSI_TO_BAR) as f32;
        p.dash_lights = dash::HANDBRAKE | dash::BATTERY | dash::SIGNAL_L | dash::SIGNAL_R | dash::SIGNAL_ANY;
        if d.tc.is_some() {
            p.dash_lights |= dash::TC;
        }
        if d.alb.is_some() {
            p.dash_lights |= dash::ABS;
        }
        for (on, bit) in [
            (d.parking_brake, dash::HANDBRAKE),
            (d.headlights, dash::FULLBEAM),
            (d.contact && !d.running, dash::BATTERY),
            (d.blinkers[0], dash::SIGNAL_L),
            (d.blinkers[1], dash::SIGNAL_R),
            (d.blinkers[2], dash::SIGNAL_ANY),
            (d.tc == Some(true), dash::TC),
            (d.alb == Some(true), dash::ABS),
        ] {
            if on {
                p.show_lights |= bit;
            }
        }
        p.throttle = d.throttle as f32;
        p.brake = d.brake as f32;
        p.clutch = (1.0 - d.clutch) as f32;
        let name = d.name.as_bytes();
        p.display1 = text16(name);
        if name.len() > 15 {
            p.display2 = text16(&name[15..]);
        }
        p
    }

    /// Serialise.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.car);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.push(self.gear);
        out.push(0);
        for f in [self.speed, self.rpm, self.turbo, 0.0, 0.0, 0.0, 0.0] {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(&self.dash_lights.to_le_bytes());
        out.extend_from_slice(&self.show_lights.to_le_bytes());
        for f in [self.throttle, self.brake, self.clutch] {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(&self.display1);
        out.extend_from_slice(&self.display2);
        out.extend_from_slice(&self.id.to_le_bytes());
        out
    }
}

/// Send-rate limiter for OutGauge packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutGaugeTimer {
    /// Seconds between packets.
    pub interval: f64,
    elapsed: f64,
}

impl OutGaugeTimer {
    /// Timer for a delay setting in tenths of a second.
    #[must_use]
    pub fn new(delay_tenths: f64) -> Self {
        Self {
            interval: 0.1 * delay_tenths,
            elapsed: 0.0,
        }
    }

    /// Advance by `dt`; true when a packet is due.
    pub fn tick(&mut self, dt: f64) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }
        self.elapsed = 0.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sim_types::NodeIdx;

    fn bounds() -> Aabb {
        Aabb::from_points(&[Vec3::new(-2.0, 0.0, -1.0), Vec3::new(2.0, 3.0, 1.0)])
    }

    #[test]
    fn compression_fits_the_box() {
        let c = node_compression(&bounds());
        assert_abs_diff_eq!(c, 32767.0 / 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(node_compression(&Aabb::empty()), 32767.0 / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn quantised_positions_come_back_within_a_step() {
        let b = bounds();
        let c = node_compression(&b);
        let points = [Vec3::new(-2.0, 0.0, -1.0), Vec3::new(1.234, 2.5, 0.75)];
        let state = VehicleState {
            time: 40,
            gear: 2,
            flags: flag::ENGINE_RUN | flag::MODE_AUTOMATIC,
            lights: light::HEADLIGHT | light::custom(3),
            ..VehicleState::default()
        };
        let update = ActorStreamUpdate::pack(state, points, b.center(), c, [1.5]);
        let bytes = update.encode();
        assert_eq!(bytes.len(), ActorStreamUpdate::encoded_len(2, 1));
        let back = ActorStreamUpdate::decode(&bytes, 2, 1).unwrap();
        assert_eq!(back, update);
        for (p, q) in points.iter().zip(back.positions(c)) {
            assert!((p - q).amax() <= 1.0 / c);
        }
        assert_eq!(back.state.lights & light::custom(3), 4);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = ActorStreamUpdate::decode(&[0; 10], 1, 0).unwrap_err();
        assert_eq!(
            err,
            NetError::Truncated {
                expected: 58,
                got: 10
            }
        );
    }

    fn update(time: i32, x: i16, rot: f32) -> ActorStreamUpdate {
        ActorStreamUpdate {
            state: VehicleState {
                time,
                ..VehicleState::default()
            },
            reference: [0.0; 3],
            nodes: vec![[x, 0, 0]],
            wheel_rotations: vec![rot],
        }
    }

    #[test]
    fn buffer_interpolates_between_bracketing_updates() {
        let mut buf = StreamBuffer::default();
        buf.push(update(0, 0, 0.0));
        buf.push(update(100, 100, 1.0));
        buf.push(update(50, 7, 0.0));
        assert_eq!(buf.len(), 2);
        let pose = buf.sample(25, 100.0).unwrap();
        assert_abs_diff_eq!(pose.positions[0].x, 0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.velocities[0].x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.wheel_rotations[0], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn stale_buffer_is_flushed() {
        let mut buf = StreamBuffer::default();
        buf.push(update(0, 0, 0.0));
        buf.push(update(10, 1, 0.0));
        assert!(buf.sample(100, 1.0).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn wheel_rings_follow_rotation() {
        let mut nodes: Vec<Node> = (0..7)
            .map(|i| Node::new(NodeIdx::at(i), Vec3::zeros()))
            .collect();
        nodes[1].position = Vec3::new(0.0, 0.0, 1.0);
        nodes[2].position = Vec3::new(0.0, 1.0, 0.0);
        let mut wheel = Wheel::new([0, 1], 2, 2, 0.5);
        wheel.nodes = vec![3, 4, 5, 6];
        place_wheel_nodes(&wheel, &mut nodes, 0.0);
        for i in 3..7 {
            let axis_node = if i % 2 == 1 { 0 } else { 1 };
            let r = nodes[i].position - nodes[axis_node].position;
            assert_abs_diff_eq!(r.norm(), 0.5, epsilon = 1e-9);
            assert_abs_diff_eq!(r.z, 0.0, epsilon = 1e-9);
        }
        // Opposite rays of a two-ray wheel.
        assert_abs_diff_eq!((nodes[3].position + nodes[5].position).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn outgauge_without_vehicle() {
        let p = OutGaugePacket::build(5, 1, None);
        assert_eq!(&p.display2[..14], b"not in vehicle");
        assert_eq!(p.flags, og::KM);
        assert_eq!(p.encode().len(), OutGaugePacket::SIZE);
    }

    #[test]
    fn outgauge_mirrors_dashboard() {
        let d = Dashboard {
            name: "A very long vehicle name".into(),
            has_engine: true,
            has_turbo: true,
            gear: -1,
            wheel_speed: -3.0,
            rpm: 900.0,
            turbo_psi: 10.0,
            clutch: 1.0,
            parking_brake: true,
            contact: true,
            tc: Some(true),
            alb: None,
            ..Dashboard::default()
        };
        let p = OutGaugePacket::build(0, 0, Some(&d));
        assert_eq!(p.gear, 0);
        assert_abs_diff_eq!(p.speed, 3.0);
        assert_abs_diff_eq!(f64::from(p.turbo), 0.689_475_729, epsilon = 1e-6);
        assert_eq!(p.flags, og::KM | og::TURBO);
        assert_ne!(p.show_lights & dash::HANDBRAKE, 0);
        assert_ne!(p.show_lights & dash::BATTERY, 0);
        assert_ne!(p.show_lights & dash::TC, 0);
        assert_eq!(p.dash_lights & dash::ABS, 0);
        assert_abs_diff_eq!(p.clutch, 0.0);
        assert_eq!(&p.display1[..15], b"A very long veh");
        assert_eq!(&p.display2[..9], b"icle name");
    }

    #[test]
    fn outgauge_timer_paces_packets() {
        let mut t = OutGaugeTimer::new(1.0);
        assert!(!t.tick(0.05));
        assert!(t.tick(0.06));
        assert!(!t.tick(0.01));
    }
}
