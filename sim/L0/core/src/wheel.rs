//! Wheels, brakes and the driving aids that modulate them.
//!
//! A wheel is a ring of `2·rays` tyre nodes around an axis node pair. Torque
//! is applied as tangential forces on the tyre nodes; the wheel speed is read
//! back from their relative velocity around the axis. Braking is modelled as
//! an opposing torque bounded by the brake force.

use sim_truck::document::records::{Braking, Propulsion, SlipControl};
use sim_types::{ActorId, SoundSink, SoundState, SoundTrigger, Vec3};

use crate::node::Node;

/// Default foot brake force.
pub const DEFAULT_BRAKE_FORCE: f64 = 30_000.0;

/// A wheel of an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Wheel {
    /// Axis nodes; `axis[0]` has the smaller Z at spawn.
    pub axis: [usize; 2],
    /// Tyre nodes, alternating between the `axis[0]` and `axis[1]` sides.
    pub nodes: Vec<usize>,
    /// Rim nodes of two-layer wheels.
    pub rim_nodes: Vec<usize>,
    /// Suspension arm node receiving the reaction torque.
    pub arm: usize,
    /// Axis node closest to the arm node.
    pub near_attach: usize,
    /// Tyre radius.
    pub radius: f64,
    /// Rim radius, 0 for single-layer wheels.
    pub rim_radius: f64,
    /// Distance between the axis nodes.
    pub width: f64,
    /// Sum of the tyre node masses.
    pub mass: f64,
    /// Braking policy.
    pub braking: Braking,
    /// Propulsion policy.
    pub propulsion: Propulsion,
    /// Detacher group.
    pub detacher_group: i32,
    /// Fell off when its detacher group broke.
    pub detached: bool,

    /// Tangential speed (m/s).
    pub speed: f64,
    /// Overestimated running average of `speed`, for the brake estimate.
    pub avg_speed: f64,
    /// Torque accumulated this substep.
    pub torque: f64,
    /// Torque applied in the previous substep.
    pub last_torque: f64,
    /// Torque implied by the unexpected part of the speed change.
    pub last_retorque: f64,
    /// Accumulated rotation (rad).
    pub net_rp: f64,
    /// Traction-control torque multiplier.
    pub tc_coef: f64,
    /// Anti-lock brake force multiplier.
    pub alb_coef: f64,
}

impl Wheel {
    /// Wheel around `axis` with no state.
    #[must_use]
    pub fn new(axis: [usize; 2], arm: usize, near_attach: usize, radius: f64) -> Self {
        Self {
            axis,
            nodes: Vec::new(),
            rim_nodes: Vec::new(),
            arm,
            near_attach,
            radius,
            rim_radius: 0.0,
            width: 0.0,
            mass: 0.0,
            braking: Braking::None,
            propulsion: Propulsion::None,
            detacher_group: 0,
            detached: false,
            speed: 0.0,
            avg_speed: 0.0,
            torque: 0.0,
            last_torque: 0.0,
            last_retorque: 0.0,
            net_rp: 0.0,
            tc_coef: 1.0,
            alb_coef: 1.0,
        }
    }

    /// True for driven wheels.
    #[must_use]
    pub fn is_propelled(&self) -> bool {
        self.propulsion != Propulsion::None
    }

    /// Forget spin and torque.
    pub fn reset(&mut self) {
        self.detached = false;
        self.speed = 0.0;
        self.avg_speed = 0.0;
        self.torque = 0.0;
        self.last_torque = 0.0;
        self.last_retorque = 0.0;
        self.net_rp = 0.0;
        self.tc_coef = 1.0;
        self.alb_coef = 1.0;
    }
}

/// Pulse-modulated driving aid: traction control or anti-lock brakes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlipAid {
    /// Switched on.
    pub enabled: bool,
    /// Exponent of the modulation coefficient.
    pub ratio: f64,
    /// Seconds between pulse flips.
    pub pulse_time: f64,
    /// Hidden from the dashboard.
    pub no_dashboard: bool,
    /// Locked in its current mode.
    pub no_toggle: bool,
    /// Modulated at least one wheel in the last substep.
    pub active: bool,
    timer: f64,
    pulse: bool,
}

impl Default for SlipAid {
    fn default() -> Self {
        Self {
            enabled: false,
            ratio: 1.0,
            pulse_time: 2000.0,
            no_dashboard: true,
            no_toggle: false,
            active: false,
            timer: 0.0,
            pulse: false,
        }
    }
}

impl SlipAid {
    /// Configure from a `TractionControl` or `AntiLockBrakes` line.
    #[must_use]
    pub fn from_record(sc: &SlipControl) -> Self {
        let ratio = sc.regulation_force.clamp(1.0, 20.0);
        if (ratio - sc.regulation_force).abs() > f64::EPSILON {
            tracing::info!(
                force = sc.regulation_force,
                "clamping regulating force to the allowed range 1..20"
            );
        }
        let pulse = if sc.pulse_per_sec <= 1.0 || sc.pulse_per_sec >= 2000.0 {
            2000.0
        } else {
            sc.pulse_per_sec
        };
        Self {
            enabled: sc.is_on,
            ratio,
            pulse_time: 1.0 / pulse,
            no_dashboard: sc.no_dashboard,
            no_toggle: sc.no_toggle,
            ..Self::default()
        }
    }

    /// Flip the mode unless it is locked.
    pub fn toggle(&mut self) {
        if !self.no_toggle {
            self.enabled = !self.enabled;
        }
    }

    fn tick(&mut self, dt: f64) {
        self.timer += dt;
        if self.timer >= self.pulse_time {
            self.timer = 0.0;
            self.pulse = !self.pulse;
        }
    }
}

/// Driving aids of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrivingAids {
    /// Traction control.
    pub tc: SlipAid,
    /// Anti-lock brakes.
    pub alb: SlipAid,
    /// Speed below which anti-lock brakes stay out (m/s).
    pub alb_min_speed: f64,
}

impl DrivingAids {
    /// Install an `AntiLockBrakes` line.
    pub fn set_alb(&mut self, sc: &SlipControl) {
        self.alb = SlipAid::from_record(sc);
        self.alb_min_speed = (sc.threshold / 3.6).max(0.5);
    }

    /// Install a `TractionControl` line.
    pub fn set_tc(&mut self, sc: &SlipControl) {
        self.tc = SlipAid::from_record(sc);
    }
}

/// Brake forces of an actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brakes {
    /// Foot brake force at full pedal.
    pub force: f64,
    /// Parking brake force.
    pub handbrake_force: f64,
}

impl Default for Brakes {
    fn default() -> Self {
        Self {
            force: DEFAULT_BRAKE_FORCE,
            handbrake_force: 2.0 * DEFAULT_BRAKE_FORCE,
        }
    }
}

impl Brakes {
    /// Forces of a `brakes` line.
    #[must_use]
    pub fn new(force: f64, parking: Option<f64>) -> Self {
        Self {
            force,
            handbrake_force: parking.unwrap_or(2.0 * force),
        }
    }
}

/// Driver state the wheel pass reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelControls {
    /// Forward direction of the actor.
    pub direction: Vec3,
    /// Velocity of node 0.
    pub reference_velocity: Vec3,
    /// Foot brake pedal [0, 1].
    pub brake: f64,
    /// Parking brake applied.
    pub parking_brake: bool,
    /// Steering hydro state, for skid braking.
    pub steering: f64,
    /// Number of driven wheels.
    pub num_propelled: usize,
}

/// Outputs of one wheel pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelReport {
    /// Average speed of the forward-driven wheels (m/s).
    pub wheel_speed: f64,
    /// Average spin of the forward-driven wheels (rad/s).
    pub wheel_spin: f64,
    /// Anti-lock brakes modulated a wheel.
    pub alb_active: bool,
    /// Traction control modulated a wheel.
    pub tc_active: bool,
}

impl WheelReport {
    /// Start or stop the aid sounds.
    pub fn emit_sounds(&self, sound: &dyn SoundSink, actor: ActorId) {
        let state = |on: bool| if on { SoundState::Start } else { SoundState::Stop };
        sound.trigger(actor, SoundTrigger::AlbActive, state(self.alb_active));
        sound.trigger(actor, SoundTrigger::TcActive, state(self.tc_active));
    }
}

fn pos(nodes: &[Node], i: usize) -> Vec3 {
    nodes.get(i).map_or_else(Vec3::zeros, |n| n.position)
}

fn vel(nodes: &[Node], i: usize) -> Vec3 {
    nodes.get(i).map_or_else(Vec3::zeros, |n| n.velocity)
}

fn push(nodes: &mut [Node], i: usize, force: Vec3) {
    if let Some(n) = nodes.get_mut(i) {
        n.forces += force;
    }
}

/// Apply the torques accumulated on every wheel and read back their speeds.
pub fn update_wheels(
    wheels: &mut [Wheel],
    nodes: &mut [Node],
    aids: &mut DrivingAids,
    brakes: &Brakes,
    controls: &WheelControls,
    dt: f64,
) -> WheelReport {
    aids.tc.tick(dt);
    aids.alb.tick(dt);
    aids.tc.active = false;
    aids.alb.active = false;

    let mut report = WheelReport::default();
    let relspeed = controls.reference_velocity.dot(&controls.direction);
    let curspeed = relspeed.abs();

    for wheel in wheels.iter_mut() {
        if wheel.detached {
            continue;
        }
        let slip = (wheel.speed - relspeed).abs() / curspeed.max(1.0);

        if aids.tc.enabled
            && wheel.torque.abs() > 0.0
            && wheel.speed.abs() > curspeed
            && slip > 0.25
        {
            if aids.tc.pulse {
                wheel.tc_coef = (curspeed / wheel.speed.abs()).powf(aids.tc.ratio);
            }
            wheel.torque *= wheel.tc_coef.powf((wheel.speed.abs() / 5.0).min(1.0));
            aids.tc.active = true;
        } else {
            wheel.tc_coef = 1.0;
        }

        if wheel.braking != Braking::None {
            apply_brakes(wheel, aids, brakes, controls, curspeed, slip, dt);
        }

        spin(wheel, nodes, dt);

        if wheel.propulsion == Propulsion::Forward && controls.num_propelled > 0 {
            let share = wheel.speed / controls.num_propelled as f64;
            report.wheel_speed += share;
            report.wheel_spin += share / wheel.radius;
        }
    }
    report.alb_active = aids.alb.active;
    report.tc_active = aids.tc.active;
    report
}

fn apply_brakes(
    wheel: &mut Wheel,
    aids: &mut DrivingAids,
    brakes: &Brakes,
    controls: &WheelControls,
    curspeed: f64,
    slip: f64,
    dt: f64,
) {
    let foot = brakes.force * controls.brake;
    let hand = if controls.parking_brake && wheel.braking != Braking::FootOnly {
        brakes.handbrake_force
    } else {
        0.0
    };
    let skid = wheel.speed < 20.0
        && ((wheel.braking == Braking::FootHandSkidLeft && controls.steering > 0.0)
            || (wheel.braking == Braking::FootHandSkidRight && controls.steering < 0.0));
    let directional = if skid {
        brakes.force * controls.steering.abs()
    } else {
        0.0
    };

    if foot == 0.0 && directional == 0.0 && hand == 0.0 {
        wheel.alb_coef = 1.0;
        return;
    }
    let mut service = foot + directional;
    if aids.alb.enabled
        && curspeed > aids.alb_min_speed
        && curspeed > wheel.speed.abs()
        && service > 0.0
        && slip > 0.25
    {
        if aids.alb.pulse {
            wheel.alb_coef = (wheel.speed.abs() / curspeed).powf(aids.alb.ratio);
        }
        service *= wheel.alb_coef;
        aids.alb.active = true;
    }
    let limit = service + hand;
    let force = -wheel.avg_speed * wheel.radius * wheel.mass / dt - wheel.last_retorque;
    wheel.torque += if wheel.speed > 0.0 {
        force.clamp(-limit, 0.0)
    } else {
        force.clamp(0.0, limit)
    };
}

fn spin(wheel: &mut Wheel, nodes: &mut [Node], dt: f64) {
    let axis0 = pos(nodes, wheel.axis[0]);
    let axis1 = pos(nodes, wheel.axis[1]);
    let axis = (axis1 - axis0).try_normalize(f64::EPSILON).unwrap_or_else(Vec3::zeros);
    let count = wheel.nodes.len().max(1) as f64;
    let per_node = wheel.torque / count;

    let expected = wheel.speed;
    let mut speed = 0.0;
    for (j, &outer) in wheel.nodes.iter().enumerate() {
        let inner = wheel.axis[j % 2];
        let mut radius = pos(nodes, outer) - pos(nodes, inner);
        let len = radius.norm();
        if len <= 0.0 {
            continue;
        }
        if wheel.propulsion == Propulsion::Backward {
            radius = -radius;
        }
        let dir = axis.cross(&radius) / len;
        push(nodes, outer, dir * per_node / len);
        speed += (vel(nodes, outer) - vel(nodes, inner)).dot(&dir);
    }
    wheel.speed = speed / count;
    if wheel.radius > 0.0 {
        wheel.net_rp += wheel.speed / wheel.radius * dt;
    }
    // Historical: the blend weights sum to 1.09; the brake estimate relies on
    // the overshoot.
    wheel.avg_speed = wheel.avg_speed * 0.99 + wheel.speed * 0.1;

    if wheel.radius > 0.0 && wheel.mass > 0.0 {
        let expected = expected + wheel.last_torque / wheel.radius / wheel.mass * dt;
        wheel.last_retorque = wheel.mass * (wheel.speed - expected) / dt;
    }

    reaction_torque(wheel, nodes, axis);
    wheel.last_torque = wheel.torque;
    wheel.torque = 0.0;
}

fn reaction_torque(wheel: &Wheel, nodes: &mut [Node], axis: Vec3) {
    let arm = pos(nodes, wheel.arm) - pos(nodes, wheel.near_attach);
    let projected = arm - axis * axis.dot(&arm);
    let offset = (arm - projected).norm();
    let rlen = projected.norm();
    if rlen > 0.01 && offset * 2.0 < rlen && wheel.torque.abs() > 0.01 {
        let radius = projected / rlen;
        let cforce =
            axis.cross(&radius) * (0.5 * wheel.torque / rlen) * (1.0 - offset * 2.0 / rlen);
        push(nodes, wheel.arm, -cforce);
        push(nodes, wheel.near_attach, cforce);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::{NodeIdx, RecordingSoundSink};

    const DT: f64 = 0.0005;

    /// Four-ray wheel of radius 0.5 around the Z axis, arm node above.
    fn rig() -> (Vec<Wheel>, Vec<Node>) {
        let mut nodes = vec![
            Node::new(NodeIdx(0), Vec3::new(0.0, 0.0, 0.0)),
            Node::new(NodeIdx(1), Vec3::new(0.0, 0.0, 0.2)),
            Node::new(NodeIdx(2), Vec3::new(0.0, 1.0, 0.0)),
        ];
        let mut wheel = Wheel::new([0, 1], 2, 0, 0.5);
        for i in 0..8 {
            let angle = std::f64::consts::TAU * f64::from(i) / 8.0;
            let z = if i % 2 == 0 { 0.0 } else { 0.2 };
            let p = Vec3::new(0.5 * angle.cos(), 0.5 * angle.sin(), z);
            nodes.push(Node::new(NodeIdx(3 + i), p));
            wheel.nodes.push(3 + i as usize);
        }
        wheel.mass = 80.0;
        wheel.propulsion = Propulsion::Forward;
        wheel.braking = Braking::FootHand;
        (vec![wheel], nodes)
    }

    fn controls() -> WheelControls {
        WheelControls {
            direction: Vec3::x(),
            reference_velocity: Vec3::zeros(),
            brake: 0.0,
            parking_brake: false,
            steering: 0.0,
            num_propelled: 1,
        }
    }

    #[test]
    fn torque_becomes_tangential_forces_and_reaction() {
        let (mut wheels, mut nodes) = rig();
        wheels[0].torque = 100.0;
        let mut aids = DrivingAids::default();
        update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &controls(), DT);

        // Each tyre node gets torque / (count · r²) · r tangentially.
        let f = nodes[3].forces;
        assert_relative_eq!(f.norm(), 100.0 / 8.0 / 0.5, epsilon = 1e-9);
        assert_relative_eq!(f.dot(&(nodes[3].position - nodes[0].position)), 0.0, epsilon = 1e-9);
        // The arm is pushed opposite to the near attach node.
        assert_relative_eq!(nodes[2].forces.norm(), nodes[0].forces.norm(), epsilon = 1e-9);
        assert!(nodes[2].forces.norm() > 0.0);
        assert_relative_eq!(wheels[0].last_torque, 100.0);
        assert_relative_eq!(wheels[0].torque, 0.0);
    }

    #[test]
    fn spinning_tyre_reports_speed() {
        let (mut wheels, mut nodes) = rig();
        let axis = Vec3::z();
        for &i in &wheels[0].nodes {
            let r = nodes[i].position - Vec3::new(0.0, 0.0, nodes[i].position.z);
            nodes[i].velocity = axis.cross(&r) * 10.0;
        }
        let mut aids = DrivingAids::default();
        let report =
            update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &controls(), DT);
        assert_relative_eq!(wheels[0].speed, 5.0, epsilon = 1e-9);
        assert_relative_eq!(report.wheel_speed, 5.0, epsilon = 1e-9);
        assert_relative_eq!(report.wheel_spin, 10.0, epsilon = 1e-9);
        assert_relative_eq!(wheels[0].net_rp, 10.0 * DT, epsilon = 1e-12);
    }

    #[test]
    fn brake_opposes_rolling_within_its_force() {
        let (mut wheels, mut nodes) = rig();
        wheels[0].speed = 5.0;
        wheels[0].avg_speed = 5.0;
        let mut aids = DrivingAids::default();
        let mut c = controls();
        c.brake = 0.5;
        update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &c, DT);
        assert_relative_eq!(wheels[0].last_torque, -15_000.0);
    }

    #[test]
    fn foot_only_wheels_ignore_the_parking_brake() {
        let (mut wheels, mut nodes) = rig();
        wheels[0].braking = Braking::FootOnly;
        wheels[0].speed = 5.0;
        wheels[0].avg_speed = 5.0;
        let mut aids = DrivingAids::default();
        let mut c = controls();
        c.parking_brake = true;
        update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &c, DT);
        assert_relative_eq!(wheels[0].last_torque, 0.0);
    }

    #[test]
    fn traction_control_cuts_torque_on_wheelspin() {
        let (mut wheels, mut nodes) = rig();
        wheels[0].speed = 10.0;
        wheels[0].torque = 1000.0;
        let mut aids = DrivingAids::default();
        aids.set_tc(&SlipControl {
            regulation_force: 2.0,
            threshold: 0.1,
            fade_speed: 0.0,
            pulse_per_sec: 0.0,
            is_on: true,
            no_dashboard: false,
            no_toggle: false,
        });
        // Pulse flips on the very first tick with a 1/2000 s period.
        let mut c = controls();
        c.reference_velocity = Vec3::new(2.0, 0.0, 0.0);
        let report = update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &c, DT);
        assert!(report.tc_active);
        let coef = (2.0_f64 / 10.0).powf(2.0);
        assert_relative_eq!(wheels[0].tc_coef, coef);
        assert_relative_eq!(wheels[0].last_torque, 1000.0 * coef, epsilon = 1e-9);
    }

    #[test]
    fn slip_aid_record_is_clamped() {
        let sc = SlipControl {
            regulation_force: 50.0,
            threshold: 1.0,
            fade_speed: 0.0,
            pulse_per_sec: 10.0,
            is_on: true,
            no_dashboard: false,
            no_toggle: true,
        };
        let mut aids = DrivingAids::default();
        aids.set_alb(&sc);
        assert_relative_eq!(aids.alb.ratio, 20.0);
        assert_relative_eq!(aids.alb.pulse_time, 0.1);
        assert_relative_eq!(aids.alb_min_speed, 0.5);
        aids.alb.toggle();
        assert!(aids.alb.enabled);
    }

    #[test]
    fn detached_wheels_are_skipped() {
        let (mut wheels, mut nodes) = rig();
        wheels[0].detached = true;
        wheels[0].torque = 100.0;
        let mut aids = DrivingAids::default();
        update_wheels(&mut wheels, &mut nodes, &mut aids, &Brakes::default(), &controls(), DT);
        assert!(nodes.iter().all(|n| n.forces == Vec3::zeros()));
    }

    #[test]
    fn report_drives_aid_sounds() {
        let rec = RecordingSoundSink::new();
        let report = WheelReport {
            alb_active: true,
            ..WheelReport::default()
        };
        report.emit_sounds(&rec, ActorId(0));
        assert_eq!(rec.count(SoundTrigger::AlbActive, SoundState::Start), 1);
        assert_eq!(rec.count(SoundTrigger::TcActive, SoundState::Stop), 1);
    }
}
