//! Engine, clutch and gearbox.
//!
//! # Architecture
//!
//! ```text
//!   accelerator ──► mixture floor (idle, prime) ──► torque sum ──► rpm
//!                                                     ▲     │
//!        turbo ─ air ─ pump drag ─ engine braking ────┘     ▼
//!                                          clutch torque ◄── wheel spin
//!                                                │
//!                         auto-clutch / shift envelope / predictive shifting
//! ```
//!
//! The engine is advanced every substep; the shift decision logic only runs on
//! `do_update` substeps (once per rendered frame). Sound events are queued and
//! flushed by the owning actor, so the engine can be driven from tests without
//! a sink.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_truck::document::records::{
    self, EngineTriggerFunction, EngineType, Engoption, Engturbo, ENGTURBO_UNSET,
};
use sim_types::{ActorId, ModulationSource, SoundSink, SoundState, SoundTrigger};

/// Starting rpm of [`Engine::start`].
// Historical: a fixed value, independent of the idle rpm.
const START_RPM: f64 = 750.0;
/// Inertia of the old single-turbo model.
const OLD_TURBO_INERTIA: f64 = 0.000_003;
/// Air tank pressure at which the purge valve blows.
const AIR_PURGE_PRESSURE: f64 = 50_000.0;
/// Maximum number of turbos of the new model.
const MAX_TURBOS: usize = 4;
/// Frames during which predictive upshifts are held after a forced upshift.
const KICKDOWN_DELAY_FRAMES: u32 = 100;

// ==================== Torque curve ====================

/// Torque fraction as a function of rpm.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerCurve {
    /// Full torque at every rpm.
    Flat,
    /// Piecewise-linear samples `(rpm, fraction)`, sorted by rpm.
    Samples(Vec<(f64, f64)>),
}

impl PowerCurve {
    /// Build from a `torquecurve` record.
    #[must_use]
    pub fn from_record(record: &records::TorqueCurve) -> Self {
        if !record.samples.is_empty() {
            let mut samples = record.samples.clone();
            samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            return Self::Samples(samples);
        }
        match record.predefined.as_deref() {
            None | Some("default") => Self::Flat,
            Some(name) => {
                tracing::warn!(curve = name, "unknown torque curve, using a flat curve");
                Self::Flat
            }
        }
    }

    /// Torque fraction at `rpm`, clamped to the end samples outside the table.
    #[must_use]
    pub fn at(&self, rpm: f64) -> f64 {
        let Self::Samples(samples) = self else {
            return 1.0;
        };
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return 1.0;
        };
        if rpm <= first.0 {
            return first.1;
        }
        if rpm >= last.0 {
            return last.1;
        }
        samples
            .windows(2)
            .find(|w| rpm >= w[0].0 && rpm <= w[1].0)
            .map_or(last.1, |w| {
                let span = w[1].0 - w[0].0;
                if span <= 0.0 {
                    w[1].1
                } else {
                    w[0].1 + (w[1].1 - w[0].1) * (rpm - w[0].0) / span
                }
            })
    }
}

// ==================== Gearbox modes ====================

/// How gears and clutch are operated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GearboxMode {
    /// Automatic clutch and automatic gear choice.
    #[default]
    Automatic,
    /// Automatic clutch, sequential manual gear choice.
    SemiAuto,
    /// Manual clutch, sequential shifting.
    Manual,
    /// Manual clutch, direct gear selection.
    ManualStick,
    /// Manual clutch, direct selection within a gear range.
    ManualRanges,
}

impl GearboxMode {
    /// The clutch is operated by the engine itself.
    #[must_use]
    pub fn auto_clutch(self) -> bool {
        matches!(self, Self::Automatic | Self::SemiAuto)
    }

    fn next(self) -> Self {
        match self {
            Self::Automatic => Self::SemiAuto,
            Self::SemiAuto => Self::Manual,
            Self::Manual => Self::ManualStick,
            Self::ManualStick => Self::ManualRanges,
            Self::ManualRanges => Self::Automatic,
        }
    }
}

/// Selector lever of the automatic gearbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AutoSelect {
    /// Reverse.
    Rear,
    /// Neutral.
    #[default]
    Neutral,
    /// All forward gears.
    Drive,
    /// First and second gear only.
    Two,
    /// First gear only.
    One,
    /// Lever unused (manual modes).
    ManualMode,
}

impl AutoSelect {
    fn up(self) -> Self {
        match self {
            Self::Neutral => Self::Rear,
            Self::Drive => Self::Neutral,
            Self::Two => Self::Drive,
            Self::One => Self::Two,
            other => other,
        }
    }

    fn down(self) -> Self {
        match self {
            Self::Rear => Self::Neutral,
            Self::Neutral => Self::Drive,
            Self::Drive => Self::Two,
            Self::Two => Self::One,
            other => other,
        }
    }
}

// ==================== Rolling windows ====================

/// Fixed-capacity ring of samples with a running sum.
#[derive(Debug, Clone, PartialEq)]
struct Window<const N: usize> {
    samples: [f64; N],
    head: usize,
    len: usize,
    sum: f64,
}

impl<const N: usize> Default for Window<N> {
    fn default() -> Self {
        Self {
            samples: [0.0; N],
            head: 0,
            len: 0,
            sum: 0.0,
        }
    }
}

impl<const N: usize> Window<N> {
    fn push(&mut self, value: f64) {
        if self.len == N {
            self.sum -= self.samples[self.head];
        } else {
            self.len += 1;
        }
        self.samples[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % N;
    }

    fn average(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.sum / self.len as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ShiftHistory {
    acc50: Window<50>,
    brake50: Window<50>,
    rpm200: Window<200>,
    acc200: Window<200>,
    brake200: Window<200>,
}

impl ShiftHistory {
    fn push(&mut self, rpm: f64, acc: f64, brake: f64) {
        self.acc50.push(acc);
        self.brake50.push(brake);
        self.rpm200.push(rpm);
        self.acc200.push(acc);
        self.brake200.push(brake);
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ==================== Turbo ====================

/// Parameters and state of the multi-turbo model.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiTurbo {
    rpm: Vec<f64>,
    inertia: f64,
    max_rpm: f64,
    addi_torque: f64,
    engine_rpm_operation: f64,
    has_bov: bool,
    bov_min_rpm: f64,
    bov_rpm: Vec<f64>,
    bov_open: bool,
    has_wastegate: bool,
    wastegate_rpm: f64,
    wg_threshold_n: f64,
    wg_threshold_p: f64,
    wastegate_open: Vec<bool>,
    has_antilag: bool,
    antilag_min_rpm: f64,
    antilag_rand_chance: f64,
    antilag_power_factor: f64,
}

impl MultiTurbo {
    fn from_record(record: &Engturbo, engine_torque: f64) -> Self {
        let p = &record.params;
        let given = |v: f64| (v != ENGTURBO_UNSET).then_some(v);
        let count = (record.count as usize).clamp(1, MAX_TURBOS);
        if record.count as usize > MAX_TURBOS {
            tracing::warn!(count = record.count, "at most 4 turbos, extra ones ignored");
        }
        let max_psi = given(p[0]).unwrap_or(20.0);
        let (wg_threshold_n, wg_threshold_p) =
            given(p[5]).map_or((0.95, 1.05), |t| (1.0 - t, 1.0 + t));
        Self {
            rpm: vec![0.0; count],
            inertia: OLD_TURBO_INERTIA * record.inertia_factor.max(f64::EPSILON),
            max_rpm: max_psi * 10_000.0,
            addi_torque: engine_torque * max_psi * 6.8 / 100.0 / count as f64,
            engine_rpm_operation: given(p[10]).unwrap_or(0.0),
            has_bov: p[1] == 1.0,
            bov_min_rpm: given(p[2]).unwrap_or(11.0) * 10_000.0,
            bov_rpm: vec![0.0; count],
            bov_open: false,
            has_wastegate: p[3] == 1.0,
            wastegate_rpm: given(p[4]).unwrap_or(20.0) * 10_000.0,
            wg_threshold_n,
            wg_threshold_p,
            wastegate_open: vec![false; count],
            has_antilag: p[6] == 1.0,
            antilag_min_rpm: given(p[7]).unwrap_or(3000.0),
            antilag_rand_chance: given(p[8]).unwrap_or(0.9975),
            antilag_power_factor: given(p[9]).unwrap_or(170.0),
        }
    }
}

/// Turbocharger model.
#[derive(Debug, Clone, PartialEq)]
pub enum Turbo {
    /// No turbo.
    None,
    /// Single turbo with fixed inertia, sound only.
    Single {
        /// Turbo rpm.
        rpm: f64,
        /// Inertia multiplier.
        inertia_factor: f64,
    },
    /// One to four turbos adding torque.
    Multi(MultiTurbo),
}

impl Turbo {
    /// Turbo rpm, averaged over turbos.
    #[must_use]
    pub fn rpm(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Single { rpm, .. } => *rpm,
            Self::Multi(m) => m.rpm.iter().sum::<f64>() / m.rpm.len().max(1) as f64,
        }
    }

    fn reset(&mut self) {
        match self {
            Self::None => {}
            Self::Single { rpm, .. } => *rpm = 0.0,
            Self::Multi(m) => {
                m.rpm.iter_mut().for_each(|r| *r = 0.0);
                m.bov_rpm.iter_mut().for_each(|r| *r = 0.0);
                m.wastegate_open.iter_mut().for_each(|o| *o = false);
                m.bov_open = false;
            }
        }
    }
}

// ==================== Engine ====================

/// Per-substep inputs the engine reads from the rest of the actor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineFeedback {
    /// Brake pedal [0, 1].
    pub brake: f64,
    /// Lateral acceleration in g.
    pub lateral_g: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineSound {
    Trigger(SoundTrigger, SoundState),
    Modulate(ModulationSource, f64),
}

/// Engine tunables reachable through the runtime attribute interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineAttribute {
    /// Downshift rpm.
    ShiftDownRpm,
    /// Upshift rpm.
    ShiftUpRpm,
    /// Peak torque.
    Torque,
    /// Engine inertia.
    Inertia,
    /// Clutch force.
    ClutchForce,
    /// Shift time.
    ShiftTime,
    /// Clutch time.
    ClutchTime,
    /// Post-shift time.
    PostShiftTime,
    /// Stall rpm.
    StallRpm,
    /// Idle rpm.
    IdleRpm,
    /// Max idle mixture.
    MaxIdleMixture,
    /// Min idle mixture.
    MinIdleMixture,
    /// Engine braking torque (positive value).
    BrakingTorque,
}

/// Live engine and transmission.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Engine {
    kind: EngineType,
    min_rpm: f64,
    max_rpm: f64,
    idle_rpm: f64,
    stall_rpm: f64,
    engine_torque: f64,
    braking_torque: f64,
    inertia: f64,
    clutch_force: f64,
    clutch_time: f64,
    shift_time: f64,
    post_shift_time: f64,
    max_idle_mixture: f64,
    min_idle_mixture: f64,
    has_air: bool,
    curve: PowerCurve,
    turbo: Turbo,
    /// `[reverse, neutral, first, ...]`, differential ratio applied.
    gear_ratios: Vec<f64>,
    num_gears: i32,
    tcase_ratio: f64,

    rpm: f64,
    acc: f64,
    clutch: f64,
    clutch_torque: f64,
    gear: i32,
    gear_range: i32,
    auto_mode: GearboxMode,
    auto_select: AutoSelect,
    running: bool,
    contact: bool,
    starter: bool,
    prime: bool,
    hydro_pump: f64,
    air_pressure: f64,
    wheel_revolutions: f64,

    shifting: bool,
    shift_val: i32,
    shift_clock: f64,
    post_shifting: bool,
    post_shift_clock: f64,
    shift_behaviour: f64,
    upshift_delay: u32,
    kickdown_delay: u32,
    history: ShiftHistory,

    rng: StdRng,
    sounds: Vec<EngineSound>,
}

impl Engine {
    /// Build an engine from its document records.
    #[must_use]
    pub fn from_records(
        engine: &records::Engine,
        option: Option<&Engoption>,
        turbo: Option<&Engturbo>,
        curve: Option<&records::TorqueCurve>,
    ) -> Self {
        let diff = engine.global_gear_ratio;
        let mut gear_ratios = Vec::with_capacity(engine.gear_ratios.len() + 2);
        gear_ratios.push(-engine.reverse_gear_ratio * diff);
        gear_ratios.push(engine.neutral_gear_ratio * diff);
        gear_ratios.extend(engine.gear_ratios.iter().map(|r| r * diff));
        let num_gears = i32::try_from(engine.gear_ratios.len()).unwrap_or(i32::MAX);

        let braking_torque = -engine.torque / 5.0;
        let mut e = Self {
            kind: EngineType::Truck,
            min_rpm: engine.shift_down_rpm,
            max_rpm: engine.shift_up_rpm,
            idle_rpm: engine.shift_down_rpm.min(800.0),
            stall_rpm: 300.0,
            engine_torque: engine.torque - braking_torque,
            braking_torque,
            inertia: 10.0,
            clutch_force: 10_000.0,
            clutch_time: 0.2,
            shift_time: 0.5,
            post_shift_time: 0.2,
            max_idle_mixture: 0.2,
            min_idle_mixture: 0.0,
            has_air: true,
            curve: curve.map_or(PowerCurve::Flat, PowerCurve::from_record),
            turbo: Turbo::Single {
                rpm: 0.0,
                inertia_factor: 1.0,
            },
            gear_ratios,
            num_gears,
            tcase_ratio: 1.0,
            rpm: 0.0,
            acc: 0.0,
            clutch: 0.0,
            clutch_torque: 0.0,
            gear: 0,
            gear_range: 0,
            auto_mode: GearboxMode::Automatic,
            auto_select: AutoSelect::Neutral,
            running: false,
            contact: false,
            starter: false,
            prime: false,
            hydro_pump: 0.0,
            air_pressure: 0.0,
            wheel_revolutions: 0.0,
            shifting: false,
            shift_val: 0,
            shift_clock: 0.0,
            post_shifting: false,
            post_shift_clock: 0.0,
            shift_behaviour: 0.0,
            upshift_delay: 0,
            kickdown_delay: 0,
            history: ShiftHistory::default(),
            rng: StdRng::seed_from_u64(0),
            sounds: Vec::new(),
        };
        if let Some(option) = option {
            e.apply_options(option);
        }
        if let Some(turbo) = turbo {
            e.turbo = if turbo.version >= 2 {
                Turbo::Multi(MultiTurbo::from_record(turbo, e.engine_torque))
            } else {
                Turbo::Single {
                    rpm: 0.0,
                    inertia_factor: turbo.inertia_factor.max(f64::EPSILON),
                }
            };
        }
        e
    }

    fn apply_options(&mut self, o: &Engoption) {
        self.kind = o.engine_type;
        if o.inertia > 0.0 {
            self.inertia = o.inertia;
        }
        let compact = matches!(o.engine_type, EngineType::Car | EngineType::Electric);
        if compact {
            self.has_air = false;
            self.turbo = Turbo::None;
        }
        self.clutch_force = if o.clutch_force > 0.0 {
            o.clutch_force
        } else if compact {
            5000.0
        } else {
            10_000.0
        };
        if o.shift_time > 0.0 {
            self.shift_time = o.shift_time;
        }
        if o.clutch_time > 0.0 {
            self.clutch_time = o.clutch_time;
        }
        if o.post_shift_time > 0.0 {
            self.post_shift_time = o.post_shift_time;
        }
        if o.stall_rpm > 0.0 {
            self.stall_rpm = o.stall_rpm;
        }
        if o.idle_rpm > 0.0 {
            self.idle_rpm = o.idle_rpm;
        }
        if o.max_idle_mixture > 0.0 {
            self.max_idle_mixture = o.max_idle_mixture;
        }
        if o.min_idle_mixture > 0.0 {
            self.min_idle_mixture = o.min_idle_mixture;
        }
        if o.braking_torque > 0.0 {
            let torque = self.engine_torque + self.braking_torque;
            self.braking_torque = -o.braking_torque;
            self.engine_torque = torque - self.braking_torque;
        }
        self.clutch_time = self.clutch_time.min(0.9 * self.shift_time);
    }

    /// Seed the generator used by antilag.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    // ---- queries ----

    /// Current rpm.
    #[must_use]
    pub fn rpm(&self) -> f64 {
        self.rpm
    }
    /// Min (downshift) rpm.
    #[must_use]
    pub fn min_rpm(&self) -> f64 {
        self.min_rpm
    }
    /// Max (upshift) rpm.
    #[must_use]
    pub fn max_rpm(&self) -> f64 {
        self.max_rpm
    }
    /// Idle rpm.
    #[must_use]
    pub fn idle_rpm(&self) -> f64 {
        self.idle_rpm
    }
    /// Stall rpm.
    #[must_use]
    pub fn stall_rpm(&self) -> f64 {
        self.stall_rpm
    }
    /// Current gear, -1 reverse, 0 neutral.
    #[must_use]
    pub fn gear(&self) -> i32 {
        self.gear
    }
    /// Forward gear count.
    #[must_use]
    pub fn num_gears(&self) -> i32 {
        self.num_gears
    }
    /// Gear range of the ranged manual box.
    #[must_use]
    pub fn gear_range(&self) -> i32 {
        self.gear_range
    }
    /// Accelerator as commanded.
    #[must_use]
    pub fn acc(&self) -> f64 {
        self.acc
    }
    /// Clutch engagement [0, 1].
    #[must_use]
    pub fn clutch(&self) -> f64 {
        self.clutch
    }
    /// Torque transmitted through the clutch.
    #[must_use]
    pub fn clutch_torque(&self) -> f64 {
        self.clutch_torque
    }
    /// Torque the clutch passes on to the drivetrain, zero in neutral.
    #[must_use]
    pub fn wheel_torque(&self) -> f64 {
        if self.gear == 0 {
            0.0
        } else {
            self.clutch_torque
        }
    }
    /// Engine kind.
    #[must_use]
    pub fn kind(&self) -> EngineType {
        self.kind
    }
    /// Running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
    /// Ignition on.
    #[must_use]
    pub fn has_contact(&self) -> bool {
        self.contact
    }
    /// Starter held.
    #[must_use]
    pub fn starter(&self) -> bool {
        self.starter
    }
    /// Gearbox mode.
    #[must_use]
    pub fn auto_mode(&self) -> GearboxMode {
        self.auto_mode
    }
    /// Selector lever.
    #[must_use]
    pub fn auto_select(&self) -> AutoSelect {
        self.auto_select
    }
    /// A gear change is in progress.
    #[must_use]
    pub fn is_shifting(&self) -> bool {
        self.shifting
    }
    /// Remaining frames of the kickdown delay.
    #[must_use]
    pub fn kickdown_delay(&self) -> u32 {
        self.kickdown_delay
    }
    /// Shift aggressiveness [0, 1].
    #[must_use]
    pub fn shift_behaviour(&self) -> f64 {
        self.shift_behaviour
    }
    /// Turbo model.
    #[must_use]
    pub fn turbo(&self) -> &Turbo {
        &self.turbo
    }
    /// Boost in psi.
    #[must_use]
    pub fn turbo_psi(&self) -> f64 {
        self.turbo.rpm() / 10_000.0
    }
    /// Wheel-side spin the clutch couples to.
    #[must_use]
    pub fn wheel_revolutions(&self) -> f64 {
        self.wheel_revolutions
    }
    /// Ratio of `gear`, differential included.
    #[must_use]
    pub fn ratio(&self, gear: i32) -> f64 {
        usize::try_from(gear + 1)
            .ok()
            .and_then(|i| self.gear_ratios.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Hydraulic-pump multiplier: 0 below `1.1·idle`, 5 at max rpm.
    #[must_use]
    pub fn crank_factor(&self) -> f64 {
        let min_working = self.idle_rpm * 1.1;
        let span = self.max_rpm - min_working;
        if span <= 0.0 {
            return 5.0;
        }
        5.0 * ((self.rpm - min_working) / span).clamp(0.0, 1.0)
    }

    /// Torque at `rpm` and full throttle.
    #[must_use]
    pub fn power(&self, rpm: f64) -> f64 {
        let limited = rpm.min(1.25 * self.max_rpm);
        let mut torque = self.engine_torque * self.curve.at(limited);
        if let Turbo::Multi(m) = &self.turbo {
            if m.max_rpm > 0.0 {
                torque += m
                    .rpm
                    .iter()
                    .map(|r| m.addi_torque * (r / m.max_rpm).min(1.0))
                    .sum::<f64>();
            }
        }
        torque
    }

    fn acc_to_hold(&self, rpm: f64) -> f64 {
        let power = self.power(self.rpm);
        if power <= 0.0 {
            return 0.0;
        }
        let ratio = (rpm / (1.25 * self.max_rpm)).min(1.0);
        -self.braking_torque * ratio / power
    }

    fn idle_mixture(&self) -> f64 {
        if self.rpm >= self.idle_rpm {
            return 0.0;
        }
        let hold = self.acc_to_hold(self.idle_rpm).max(0.06);
        let mixture = hold * (1.0 + (self.idle_rpm - self.rpm) / 100.0);
        mixture.clamp(self.min_idle_mixture, self.max_idle_mixture)
    }

    fn prime_mixture(&self) -> f64 {
        if !self.prime {
            return 0.0;
        }
        let crank = self.crank_factor();
        if crank < 0.9 {
            1.0
        } else if crank < 1.0 {
            10.0 * (1.0 - crank)
        } else {
            0.0
        }
    }

    // ---- inputs ----

    /// Set the accelerator [0, 1].
    pub fn set_acc(&mut self, acc: f64) {
        self.acc = acc.clamp(0.0, 1.0);
    }

    /// Set clutch engagement [0, 1]; ignored while the engine runs the clutch.
    pub fn set_clutch(&mut self, clutch: f64) {
        if !self.auto_mode.auto_clutch() {
            self.clutch = clutch.clamp(0.0, 1.0);
        }
    }

    /// Fold a transfer-case reduction into every gear ratio.
    ///
    /// Ratios below 1 are ignored.
    pub fn set_tcase_ratio(&mut self, ratio: f64) {
        if ratio < 1.0 {
            return;
        }
        let old = self.tcase_ratio;
        for r in &mut self.gear_ratios {
            *r = *r / old * ratio;
        }
        self.tcase_ratio = ratio;
    }

    /// Active transfer-case reduction.
    #[must_use]
    pub fn tcase_ratio(&self) -> f64 {
        self.tcase_ratio
    }

    /// Wheel-side spin, gearbox output rpm.
    pub fn set_wheel_revolutions(&mut self, revolutions: f64) {
        self.wheel_revolutions = revolutions;
    }

    /// Hydraulic pump work of this substep and whether it wants priming.
    pub fn set_hydro_pump(&mut self, work: f64, prime: bool) {
        self.hydro_pump = work;
        self.prime = prime;
    }

    /// Hold or release the starter.
    pub fn set_starter(&mut self, on: bool) {
        if on == self.starter {
            return;
        }
        self.starter = on;
        if on && self.rpm < START_RPM {
            self.acc = 1.0;
        }
        let state = if on { SoundState::Start } else { SoundState::Stop };
        self.emit(SoundTrigger::Starter, state);
    }

    /// Turn the ignition on or off.
    pub fn toggle_contact(&mut self) {
        self.contact = !self.contact;
        if self.contact {
            self.emit(SoundTrigger::Ignition, SoundState::Once);
        } else {
            self.stop();
        }
    }

    /// Start at once: ignition on, engine running, first gear in the
    /// automatic modes.
    pub fn start(&mut self) {
        match self.auto_mode {
            GearboxMode::Automatic => {
                self.auto_select = AutoSelect::Drive;
                self.gear = 1;
            }
            GearboxMode::SemiAuto => self.gear = 1,
            _ => self.gear = 0,
        }
        self.clutch = 0.0;
        self.rpm = START_RPM;
        self.clutch_torque = 0.0;
        self.air_pressure = 0.0;
        self.turbo.reset();
        self.shifting = false;
        self.post_shifting = false;
        self.shift_val = 0;
        self.contact = true;
        if !self.running {
            self.running = true;
            self.emit(SoundTrigger::Engine, SoundState::Start);
        }
    }

    /// Everything off, neutral, at rest.
    pub fn offstart(&mut self) {
        self.gear = 0;
        self.gear_range = 0;
        self.clutch = 0.0;
        self.clutch_torque = 0.0;
        if self.auto_mode != GearboxMode::Manual
            && self.auto_mode != GearboxMode::ManualStick
            && self.auto_mode != GearboxMode::ManualRanges
        {
            self.auto_select = AutoSelect::Neutral;
        }
        self.rpm = 0.0;
        self.acc = 0.0;
        self.air_pressure = 0.0;
        self.turbo.reset();
        self.shifting = false;
        self.post_shifting = false;
        self.shift_val = 0;
        self.kickdown_delay = 0;
        self.upshift_delay = 0;
        self.history.clear();
        self.running = false;
        self.contact = false;
        self.starter = false;
    }

    /// Stop the engine; the ignition stays as it is.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.emit(SoundTrigger::Engine, SoundState::Stop);
            tracing::debug!(rpm = self.rpm, "engine stopped");
        }
    }

    /// Sequential shift by `val` gears.
    pub fn shift(&mut self, val: i32) {
        let target = self.gear + val;
        if val == 0 || target < -1 || target > self.num_gears {
            return;
        }
        if self.auto_mode.auto_clutch() {
            self.begin_shift(val);
        } else if self.clutch > 0.25 {
            self.emit(SoundTrigger::GearSlide, SoundState::Once);
        } else {
            self.gear = target;
            self.emit(SoundTrigger::Shift, SoundState::Once);
        }
    }

    /// Select `gear` directly (stick and ranged boxes).
    pub fn shift_to(&mut self, gear: i32) {
        let target = if self.auto_mode == GearboxMode::ManualRanges && gear > 0 {
            gear + 6 * self.gear_range
        } else {
            gear
        };
        if target == self.gear || target < -1 || target > self.num_gears {
            return;
        }
        if self.auto_mode.auto_clutch() {
            self.begin_shift(target - self.gear);
        } else if self.clutch > 0.25 {
            self.emit(SoundTrigger::GearSlide, SoundState::Once);
        } else {
            self.gear = target;
            self.emit(SoundTrigger::Shift, SoundState::Once);
        }
    }

    /// Choose the gear range of the ranged box.
    pub fn set_gear_range(&mut self, range: i32) {
        let ranges = (self.num_gears + 5) / 6;
        self.gear_range = range.clamp(0, (ranges - 1).max(0));
    }

    /// Cycle through the gearbox modes.
    pub fn toggle_auto_mode(&mut self) {
        self.auto_mode = self.auto_mode.next();
        if self.auto_mode == GearboxMode::Automatic {
            self.auto_select = match self.gear {
                g if g > 0 => AutoSelect::Drive,
                g if g < 0 => AutoSelect::Rear,
                _ => AutoSelect::Neutral,
            };
        } else {
            self.auto_select = AutoSelect::ManualMode;
        }
        if self.auto_mode == GearboxMode::ManualRanges {
            self.gear_range = 0;
            self.gear = 0;
        }
    }

    /// Force a gearbox mode.
    pub fn set_auto_mode(&mut self, mode: GearboxMode) {
        while self.auto_mode != mode {
            self.toggle_auto_mode();
        }
    }

    /// Move the selector lever one notch towards reverse.
    pub fn auto_shift_up(&mut self) {
        if self.auto_select != AutoSelect::Rear {
            self.auto_select = self.auto_select.up();
            self.update_shifts();
        }
    }

    /// Move the selector lever one notch towards first.
    pub fn auto_shift_down(&mut self) {
        if self.auto_select != AutoSelect::One {
            self.auto_select = self.auto_select.down();
            self.update_shifts();
        }
    }

    /// Put the selector lever in `select`.
    pub fn auto_shift_set(&mut self, select: AutoSelect) {
        self.auto_select = select;
        self.update_shifts();
    }

    fn update_shifts(&mut self) {
        if self.auto_select == AutoSelect::ManualMode {
            return;
        }
        self.emit(SoundTrigger::Shift, SoundState::Once);
        self.gear = match self.auto_select {
            AutoSelect::Rear => -1,
            AutoSelect::Neutral | AutoSelect::ManualMode => 0,
            AutoSelect::One => 1,
            AutoSelect::Drive | AutoSelect::Two => {
                let mut gear = 1;
                while gear < self.num_gears
                    && self.wheel_revolutions > 0.0
                    && self.wheel_revolutions * self.ratio(gear) > self.max_rpm - 100.0
                {
                    gear += 1;
                }
                if self.auto_select == AutoSelect::Two {
                    gear.min(2)
                } else {
                    gear
                }
            }
        };
    }

    /// Apply an engine trigger. Brake triggers are handled by the actor.
    pub fn apply_trigger(&mut self, function: EngineTriggerFunction, value: f64) {
        match function {
            EngineTriggerFunction::Clutch => {
                if !self.auto_mode.auto_clutch() {
                    self.clutch = 1.0 - value.clamp(0.0, 1.0);
                }
            }
            EngineTriggerFunction::Accelerator => self.set_acc(value),
            EngineTriggerFunction::RpmToggle => {
                if value > 0.5 {
                    if !self.running {
                        self.start();
                    }
                } else {
                    self.stop();
                }
            }
            EngineTriggerFunction::ShiftUp => {
                if value > 0.5 {
                    self.shift(1);
                }
            }
            EngineTriggerFunction::ShiftDown => {
                if value > 0.5 {
                    self.shift(-1);
                }
            }
            EngineTriggerFunction::Brake => {}
        }
    }

    /// Change a tunable at runtime.
    pub fn set_attribute(&mut self, attribute: EngineAttribute, value: f64) {
        match attribute {
            EngineAttribute::ShiftDownRpm => self.min_rpm = value,
            EngineAttribute::ShiftUpRpm => self.max_rpm = value,
            EngineAttribute::Torque => {
                self.braking_torque = -value / 5.0;
                self.engine_torque = value - self.braking_torque;
            }
            EngineAttribute::Inertia => self.inertia = value.max(f64::EPSILON),
            EngineAttribute::ClutchForce => self.clutch_force = value,
            EngineAttribute::ShiftTime => self.shift_time = value,
            EngineAttribute::ClutchTime => self.clutch_time = value.min(0.9 * self.shift_time),
            EngineAttribute::PostShiftTime => self.post_shift_time = value,
            EngineAttribute::StallRpm => self.stall_rpm = value,
            EngineAttribute::IdleRpm => self.idle_rpm = value,
            EngineAttribute::MaxIdleMixture => self.max_idle_mixture = value,
            EngineAttribute::MinIdleMixture => self.min_idle_mixture = value,
            EngineAttribute::BrakingTorque => {
                let torque = self.engine_torque + self.braking_torque;
                self.braking_torque = -value.abs();
                self.engine_torque = torque - self.braking_torque;
            }
        }
    }

    // ---- simulation ----

    /// Advance one substep.
    pub fn update(&mut self, dt: f64, do_update: bool, feedback: &EngineFeedback) {
        let electric = self.kind == EngineType::Electric;
        let acc = self.acc.max(self.idle_mixture()).max(self.prime_mixture());

        if self.has_air {
            self.update_air(dt);
        }
        let mut total = self.update_turbo(dt, acc);

        if self.contact && self.running {
            total += self.braking_torque * self.rpm / self.max_rpm * (1.0 - acc);
        } else if !(self.contact && self.starter) {
            total += self.braking_torque;
        }
        if self.rpm > 100.0 && self.hydro_pump > 0.0 {
            total -= 8.0 * self.hydro_pump / (self.rpm * 0.105 * dt);
        }
        if self.running && self.contact && self.rpm < 1.25 * self.max_rpm {
            total += self.power(self.rpm) * acc;
        }

        if electric {
            if self.contact && self.starter && !self.running {
                self.running = true;
                self.emit(SoundTrigger::Engine, SoundState::Start);
            }
        } else {
            if self.running && self.rpm < self.stall_rpm {
                self.stop();
            }
            if self.contact && self.starter && !self.running {
                if self.rpm < self.idle_rpm {
                    total += self.engine_torque * (-2.7 * self.rpm / self.idle_rpm).exp()
                        - self.braking_torque;
                }
                if self.rpm > self.stall_rpm {
                    self.running = true;
                    self.emit(SoundTrigger::Engine, SoundState::Start);
                    tracing::debug!(rpm = self.rpm, "engine started");
                }
            }
        }

        let ratio = self.ratio(self.gear);
        if self.gear != 0 && ratio != 0.0 {
            total -= self.clutch_torque / ratio;
        }

        self.rpm = (self.rpm + dt * total / self.inertia).max(0.0);

        if self.gear != 0 && ratio != 0.0 {
            let slip = self.rpm / ratio - self.wheel_revolutions;
            let limit =
                1.5 * self.engine_torque.max(self.power(self.rpm)) * self.ratio(1).abs();
            let torque = (slip * self.clutch * self.clutch_force).clamp(-limit, limit);
            self.clutch_torque = torque * (1.0 - (-slip.abs()).exp());
        } else {
            self.clutch_torque = 0.0;
        }

        if self.auto_mode.auto_clutch() {
            self.update_auto_clutch(dt);
            if do_update && !self.shifting && !self.post_shifting {
                self.update_auto_shift(acc, feedback);
            }
        }

        if do_update {
            self.sounds
                .push(EngineSound::Modulate(ModulationSource::Engine, self.rpm));
            if !matches!(self.turbo, Turbo::None) {
                self.sounds
                    .push(EngineSound::Modulate(ModulationSource::Turbo, self.turbo.rpm()));
            }
        }
    }

    fn update_air(&mut self, dt: f64) {
        self.air_pressure += dt * self.rpm;
        if self.air_pressure > AIR_PURGE_PRESSURE {
            self.emit(SoundTrigger::AirPurge, SoundState::Once);
            self.air_pressure = 0.0;
        }
    }

    /// Spin the turbos; returns torque added to the crankshaft.
    fn update_turbo(&mut self, dt: f64, acc: f64) -> f64 {
        let rpm_ratio = self.rpm / self.max_rpm;
        let running = self.running;
        let engine_rpm = self.rpm;
        let mut extra = 0.0;
        let mut sounds = Vec::new();
        match &mut self.turbo {
            Turbo::None => {}
            Turbo::Single {
                rpm,
                inertia_factor,
            } => {
                let mut torque = -*rpm / 200_000.0;
                if *rpm < 200_000.0 && running && acc > 0.06 {
                    torque += 1.5 * acc * rpm_ratio;
                } else {
                    torque += 0.1 * rpm_ratio;
                }
                *rpm = (*rpm + dt * torque / (OLD_TURBO_INERTIA * *inertia_factor)).max(0.0);
            }
            Turbo::Multi(m) => {
                let mut any_bov = false;
                for i in 0..m.rpm.len() {
                    let mut torque = -m.rpm[i] / 200_000.0;
                    if m.rpm[i] < m.max_rpm
                        && running
                        && acc > 0.06
                        && engine_rpm >= m.engine_rpm_operation
                    {
                        torque += 1.5 * acc * rpm_ratio;
                    } else {
                        torque += 0.1 * rpm_ratio;
                    }

                    if m.has_wastegate {
                        if !m.wastegate_open[i] && m.rpm[i] > m.wastegate_rpm * m.wg_threshold_p {
                            m.wastegate_open[i] = true;
                            sounds.push((SoundTrigger::TurboWastegate, SoundState::Start));
                        } else if m.wastegate_open[i]
                            && m.rpm[i] < m.wastegate_rpm * m.wg_threshold_n
                        {
                            m.wastegate_open[i] = false;
                            sounds.push((SoundTrigger::TurboWastegate, SoundState::Stop));
                        }
                        if m.wastegate_open[i] {
                            torque -= (m.rpm[i] - m.wastegate_rpm).max(0.0) / 100_000.0;
                        }
                    }

                    if m.has_bov {
                        if acc < 0.06 && m.rpm[i] > m.bov_min_rpm {
                            m.bov_rpm[i] = m.bov_rpm[i].max(m.rpm[i]);
                            torque -= m.rpm[i] / 100_000.0;
                            any_bov = true;
                        } else {
                            m.bov_rpm[i] *= 1.0 - (dt * 2.0).min(1.0);
                        }
                    }

                    if m.has_antilag
                        && running
                        && acc < 0.5
                        && engine_rpm > m.antilag_min_rpm
                        && m.rpm[i] > 0.35 * m.max_rpm
                        && m.rpm[i] <= m.max_rpm
                    {
                        let roll: f64 = self.rng.gen();
                        if roll > m.antilag_rand_chance {
                            extra -= m.antilag_power_factor;
                            torque += m.antilag_power_factor / 1000.0;
                            sounds.push((SoundTrigger::TurboBackfire, SoundState::Once));
                        }
                    }

                    let inertia = m.inertia;
                    m.rpm[i] = (m.rpm[i] + dt * torque / inertia).max(0.0);
                }
                if any_bov != m.bov_open {
                    m.bov_open = any_bov;
                    let state = if any_bov {
                        SoundState::Start
                    } else {
                        SoundState::Stop
                    };
                    sounds.push((SoundTrigger::TurboBov, state));
                }
            }
        }
        for (trigger, state) in sounds {
            self.emit(trigger, state);
        }
        extra
    }

    fn begin_shift(&mut self, val: i32) {
        if val == 0 {
            return;
        }
        self.shift_val = val;
        self.shifting = true;
        self.shift_clock = 0.0;
        tracing::trace!(from = self.gear, by = val, "shift started");
    }

    fn update_auto_clutch(&mut self, dt: f64) {
        if self.shifting {
            self.shift_clock += dt;
            if self.shift_val != 0 && self.shift_clock > self.clutch_time / 2.0 {
                let target = (self.gear + self.shift_val).clamp(-1, self.num_gears);
                self.shift_val = 0;
                if target != self.gear {
                    self.gear = target;
                    self.emit(SoundTrigger::Shift, SoundState::Once);
                    tracing::debug!(gear = target, "shift executed");
                }
            }
            let ct = self.clutch_time.max(f64::EPSILON);
            self.clutch = if self.shift_clock < ct {
                (1.0 - self.shift_clock / ct).powi(2)
            } else if self.shift_clock > self.shift_time - ct {
                ((self.shift_clock - self.shift_time + ct) / ct).clamp(0.0, 1.0).sqrt()
            } else {
                0.0
            };
            if self.shift_clock > self.shift_time {
                self.shifting = false;
                self.post_shifting = true;
                self.post_shift_clock = 0.0;
            }
            return;
        }
        if self.post_shifting {
            self.post_shift_clock += dt;
            if self.post_shift_clock > self.post_shift_time {
                self.post_shifting = false;
            }
        }

        if self.kind == EngineType::Electric {
            self.clutch = 1.0;
        } else {
            let declutch = 0.75 * self.min_rpm + 0.25 * self.stall_rpm;
            self.clutch = if self.rpm < declutch {
                0.0
            } else if self.rpm >= self.min_rpm {
                1.0
            } else {
                let span = (self.min_rpm - declutch).max(f64::EPSILON);
                let launch = (self.rpm - declutch) / span;
                // Engage faster once the gearbox catches up with the wheels.
                let ratio = self.ratio(self.gear);
                let sync = if self.gear != 0 && ratio != 0.0 {
                    let spinner = self.rpm / ratio;
                    let gap = (spinner - self.wheel_revolutions).abs() / spinner.abs().max(1.0);
                    (1.0 - gap).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                launch.max(sync * launch.sqrt()).clamp(0.0, 1.0)
            };
        }

        if self.gear != 0 {
            self.clutch = self.clutch.min(over_rev_clutch(
                self.wheel_revolutions * self.ratio(self.gear),
                f64::from(self.gear) * self.wheel_revolutions,
                self.max_rpm,
            ));
        }
    }

    fn update_auto_shift(&mut self, acc: f64, feedback: &EngineFeedback) {
        self.history.push(self.rpm, acc, feedback.brake);
        if self.auto_mode != GearboxMode::Automatic
            || !matches!(self.auto_select, AutoSelect::Drive | AutoSelect::Two)
            || self.gear <= 0
        {
            return;
        }
        let electric = self.kind == EngineType::Electric;
        let max_gear = if self.auto_select == AutoSelect::Two {
            self.num_gears.min(2)
        } else {
            self.num_gears
        };
        let full = self.max_rpm - self.min_rpm;
        let third = full / 3.0;
        let half = full / 2.0;
        let wheel = self.wheel_revolutions;

        let forced = forced_upshift(
            self.rpm > self.max_rpm - 100.0,
            self.gear > 1,
            wheel * self.ratio(self.gear) > self.max_rpm - 100.0,
            self.gear < max_gear,
        );
        // Drive waits for the clutch to bite; Two shifts regardless.
        let engaged = self.auto_select == AutoSelect::Two || self.clutch > 0.99;
        if forced && self.gear < max_gear && engaged && !electric {
            self.kickdown_delay = KICKDOWN_DELAY_FRAMES;
            self.begin_shift(1);
        } else if self.gear > 1
            && wheel * self.ratio(self.gear - 1) < self.max_rpm
            && (self.rpm < self.min_rpm
                || (self.rpm < self.min_rpm + self.shift_behaviour * half / 2.0
                    && self.power(wheel * self.ratio(self.gear - 1))
                        > self.power(wheel * self.ratio(self.gear))))
            && !electric
        {
            self.begin_shift(-1);
        }

        let h = &self.history;
        let (avg_acc50, avg_brake50) = (h.acc50.average(), h.brake50.average());
        let (avg_rpm200, avg_acc200, avg_brake200) =
            (h.rpm200.average(), h.acc200.average(), h.brake200.average());

        if avg_acc50 > 0.8 || avg_acc200 > 0.8 || avg_brake50 > 0.8 || avg_brake200 > 0.8 {
            self.shift_behaviour = (self.shift_behaviour + 0.01).min(1.0);
        } else if acc < 0.5
            && avg_acc50 < 0.5
            && avg_acc200 < 0.5
            && feedback.brake < 0.5
            && avg_brake50 < 0.5
            && avg_brake200 < 0.5
        {
            self.shift_behaviour /= 1.01;
        }

        let gear = self.gear;
        let mut new_gear = gear;
        let wheel_power = |g: i32| self.power(wheel * self.ratio(g)) * self.ratio(g);
        if avg_acc50 > 0.8 && self.rpm < self.max_rpm - third {
            while new_gear > 1
                && wheel * self.ratio(new_gear - 1) < self.max_rpm - third / 2.0
                && wheel_power(new_gear - 1) > wheel_power(new_gear)
            {
                new_gear -= 1;
            }
        } else if avg_acc50 > 0.6
            && acc < 0.8
            && acc > avg_acc50 + 0.1
            && self.rpm < self.min_rpm + half
        {
            if new_gear > 1
                && wheel * self.ratio(new_gear - 1) < self.min_rpm + half
                && wheel_power(new_gear - 1) > wheel_power(new_gear)
            {
                new_gear -= 1;
            }
        } else if avg_acc50 > 0.4
            && acc < 0.8
            && acc > avg_acc50 + 0.1
            && self.rpm < self.min_rpm + half
        {
            if new_gear > 1
                && wheel * self.ratio(new_gear - 1) < self.min_rpm + third
                && wheel_power(new_gear - 1) > wheel_power(new_gear)
            {
                new_gear -= 1;
            }
        } else if gear < max_gear
            && avg_brake200 < 0.2
            && acc < (avg_acc200 + 0.1).min(1.0)
            && self.rpm > avg_rpm200 - full / 20.0
        {
            let next = wheel * self.ratio(gear + 1);
            if avg_acc200 < 0.6
                && avg_acc200 > 0.4
                && self.rpm > self.min_rpm + third
                && self.rpm < self.max_rpm - third
            {
                if next > self.min_rpm + third {
                    new_gear += 1;
                }
            } else if avg_acc200 < 0.4 && avg_acc200 > 0.2 && self.rpm > self.min_rpm + third {
                if next > self.min_rpm + third / 2.0 {
                    new_gear += 1;
                }
            } else if avg_acc200 < 0.2
                && self.rpm > self.min_rpm + third / 2.0
                && self.rpm < self.min_rpm + half
                && next > self.min_rpm + third / 2.0
            {
                new_gear += 1;
            }

            if new_gear > gear {
                self.upshift_delay += 1;
                if f64::from(self.upshift_delay) <= 100.0 * self.shift_behaviour {
                    new_gear = gear;
                }
            } else {
                self.upshift_delay = 0;
            }
        }

        if new_gear > gear && self.kickdown_delay > 0 {
            new_gear = gear;
        }
        self.kickdown_delay = self.kickdown_delay.saturating_sub(1);

        let jump = (wheel * (self.ratio(new_gear) - self.ratio(gear))).abs();
        let worth_it = (new_gear < gear && jump > third / 6.0) || (new_gear > gear && jump > third / 3.0);
        if worth_it && !self.shifting && feedback.lateral_g.abs() < 0.25 {
            self.begin_shift(new_gear - gear);
        }
    }

    // ---- sound ----

    fn emit(&mut self, trigger: SoundTrigger, state: SoundState) {
        self.sounds.push(EngineSound::Trigger(trigger, state));
    }

    /// Deliver queued sound events.
    pub fn flush_sounds(&mut self, sink: &dyn SoundSink, actor: ActorId) {
        for event in self.sounds.drain(..) {
            match event {
                EngineSound::Trigger(trigger, state) => sink.trigger(actor, trigger, state),
                EngineSound::Modulate(source, value) => sink.modulate(actor, source, value),
            }
        }
    }
}

/// Clutch ceiling that keeps the wheels from over-revving the engine.
///
/// `in_gear` is the engine rpm the wheels demand through the current ratio
/// and `reverse_spin` is gear times wheel rpm, negative when the wheels turn
/// against the selected direction. The ceiling falls as `1 / (1 + excess / 2)`
/// past `1.25·max_rpm` forward or past 10 rpm of reverse spin.
#[must_use]
pub fn over_rev_clutch(in_gear: f64, reverse_spin: f64, max_rpm: f64) -> f64 {
    let mut ceiling: f64 = 1.0;
    let limit = 1.25 * max_rpm;
    if in_gear.abs() > limit {
        ceiling = ceiling.min(1.0 / (1.0 + (in_gear - limit).abs() / 2.0));
    }
    if reverse_spin < -10.0 {
        ceiling = ceiling.min(1.0 / (1.0 + (-10.0 - reverse_spin).abs() / 2.0));
    }
    ceiling
}

/// Forced-upshift predicate: `(a && b) || (c && d)` with
/// `a` rpm near the limit, `b` above first gear, `c` wheels spinning the
/// engine near the limit, `d` a higher gear available.
#[must_use]
pub fn forced_upshift(a: bool, b: bool, c: bool, d: bool) -> bool {
    (a && b) || (c && d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::RecordingSoundSink;

    const DT: f64 = 0.0005;

    fn s4_engine() -> Engine {
        let record = records::Engine {
            shift_down_rpm: 400.0,
            shift_up_rpm: 2000.0,
            torque: 500.0,
            global_gear_ratio: 3.0,
            reverse_gear_ratio: -3.0,
            neutral_gear_ratio: 0.0,
            gear_ratios: vec![5.0, 4.0, 3.0],
        };
        let option = Engoption {
            inertia: 10.0,
            engine_type: EngineType::Truck,
            ..Engoption::default()
        };
        Engine::from_records(&record, Some(&option), None, None)
    }

    fn run(engine: &mut Engine, seconds: f64, feedback: &EngineFeedback) {
        let steps = (seconds / DT).round() as usize;
        for i in 0..steps {
            engine.update(DT, i % 40 == 0, feedback);
        }
    }

    #[test]
    fn construction_derives_ranges_and_ratios() {
        let e = s4_engine();
        assert_relative_eq!(e.idle_rpm(), 400.0);
        assert_relative_eq!(e.stall_rpm(), 300.0);
        assert_relative_eq!(e.braking_torque, -100.0);
        assert_relative_eq!(e.engine_torque, 600.0);
        assert_eq!(e.num_gears(), 3);
        assert_relative_eq!(e.ratio(-1), 9.0);
        assert_relative_eq!(e.ratio(0), 0.0);
        assert_relative_eq!(e.ratio(1), 15.0);
        assert_relative_eq!(e.ratio(3), 9.0);
        assert!(e.has_air);
        assert!(matches!(e.turbo(), Turbo::Single { .. }));
    }

    #[test]
    fn car_engines_have_no_air_nor_turbo() {
        let record = records::Engine {
            shift_down_rpm: 1000.0,
            shift_up_rpm: 6000.0,
            torque: 300.0,
            global_gear_ratio: 4.0,
            reverse_gear_ratio: 3.0,
            neutral_gear_ratio: 0.0,
            gear_ratios: vec![3.0, 2.0, 1.0],
        };
        let option = Engoption {
            engine_type: EngineType::Car,
            braking_torque: 50.0,
            ..Engoption::default()
        };
        let e = Engine::from_records(&record, Some(&option), None, None);
        assert!(!e.has_air);
        assert_eq!(e.turbo(), &Turbo::None);
        assert_relative_eq!(e.clutch_force, 5000.0);
        assert_relative_eq!(e.idle_rpm(), 800.0);
        assert_relative_eq!(e.braking_torque, -50.0);
        assert_relative_eq!(e.engine_torque, 350.0);
    }

    #[test]
    fn transfer_case_ratio_rescales_every_gear() {
        let mut e = s4_engine();
        e.set_tcase_ratio(2.0);
        assert_relative_eq!(e.ratio(1), 30.0);
        e.set_tcase_ratio(0.5);
        assert_relative_eq!(e.tcase_ratio(), 2.0);
        e.set_tcase_ratio(1.0);
        assert_relative_eq!(e.ratio(1), 15.0);
        assert_relative_eq!(e.ratio(-1), 9.0);
    }

    #[test]
    fn start_in_automatic_selects_drive() {
        let mut e = s4_engine();
        e.start();
        assert_eq!(e.gear(), 1);
        assert_eq!(e.auto_select(), AutoSelect::Drive);
        assert!(e.is_running() && e.has_contact());
        assert_relative_eq!(e.rpm(), START_RPM);
    }

    #[test]
    fn started_engine_stays_above_idle() {
        let mut e = s4_engine();
        e.start();
        run(&mut e, 2.0, &EngineFeedback::default());
        assert!(e.is_running());
        assert!(e.rpm() > e.idle_rpm(), "rpm {}", e.rpm());
        assert_eq!(e.gear(), 1);
    }

    #[test]
    fn near_redline_in_first_upshifts_with_kickdown_delay() {
        let mut e = s4_engine();
        e.start();
        e.set_acc(1.0);
        e.rpm = 1950.0;
        e.clutch = 1.0;
        e.set_wheel_revolutions(1950.0 / e.ratio(1));
        e.update(DT, true, &EngineFeedback::default());
        assert!(e.is_shifting());
        // Set to 100 by the upshift, then counted down in the same frame.
        assert_eq!(e.kickdown_delay(), KICKDOWN_DELAY_FRAMES - 1);
        for _ in 0..400 {
            e.update(DT, false, &EngineFeedback::default());
        }
        assert_eq!(e.gear(), 2);
    }

    #[test]
    fn forced_upshift_binds_as_two_conjunctions() {
        // rpm high and above first gear: shifts even without spinner evidence.
        assert!(forced_upshift(true, true, false, false));
        // Spinner high with a gear left: shifts from first.
        assert!(forced_upshift(false, false, true, true));
        // `a && (b || c) && d` would say no here.
        assert!(forced_upshift(true, true, true, false));
        assert!(!forced_upshift(true, false, false, true));
        assert!(!forced_upshift(false, true, true, false));
    }

    #[test]
    fn over_revving_wheels_hold_back_a_forced_upshift() {
        let mut e = s4_engine();
        e.start();
        e.set_acc(1.0);
        e.rpm = 1950.0;
        e.set_wheel_revolutions(2600.0 / e.ratio(1));
        e.update(DT, true, &EngineFeedback::default());
        // 100 rpm past 1.25·maxRPM leaves the clutch at 1/51.
        assert_relative_eq!(e.clutch(), 1.0 / 51.0, epsilon = 1e-9);
        assert!(!e.is_shifting());
        assert_eq!(e.gear(), 1);
    }

    #[test]
    fn over_rev_ceiling_falls_hyperbolically() {
        assert_relative_eq!(over_rev_clutch(2400.0, 10.0, 2000.0), 1.0);
        assert_relative_eq!(over_rev_clutch(2504.0, 10.0, 2000.0), 1.0 / 3.0);
        assert_relative_eq!(over_rev_clutch(-2504.0, 0.0, 2000.0), 1.0 / 2503.0);
        // Reverse spin: 14 rpm against the gear is 4 past the allowance.
        assert_relative_eq!(over_rev_clutch(0.0, -14.0, 2000.0), 1.0 / 3.0);
        assert_relative_eq!(over_rev_clutch(0.0, -9.0, 2000.0), 1.0);
    }

    #[test]
    fn long_braking_keeps_shifting_aggressive() {
        let mut e = s4_engine();
        e.start();
        e.shift_behaviour = 0.5;
        let braking = EngineFeedback {
            brake: 1.0,
            ..EngineFeedback::default()
        };
        for _ in 0..300 {
            e.update_auto_shift(0.0, &braking);
        }
        assert_relative_eq!(e.shift_behaviour(), 1.0);
        // The 50-sample average drops below 0.5 long before the 200-sample one.
        for _ in 0..30 {
            e.update_auto_shift(0.0, &EngineFeedback::default());
        }
        assert_relative_eq!(e.shift_behaviour(), 1.0);
        for _ in 0..200 {
            e.update_auto_shift(0.0, &EngineFeedback::default());
        }
        assert!(e.shift_behaviour() < 1.0);
    }

    #[test]
    fn manual_shift_grinds_with_engaged_clutch() {
        let mut e = s4_engine();
        e.set_auto_mode(GearboxMode::Manual);
        e.set_clutch(1.0);
        e.shift(1);
        assert_eq!(e.gear(), 0);
        e.set_clutch(0.0);
        e.shift(1);
        assert_eq!(e.gear(), 1);
        // Out of range requests are ignored.
        e.shift(5);
        assert_eq!(e.gear(), 1);

        let sink = RecordingSoundSink::new();
        e.flush_sounds(&sink, ActorId(0));
        assert_eq!(sink.count(SoundTrigger::GearSlide, SoundState::Once), 1);
        assert_eq!(sink.count(SoundTrigger::Shift, SoundState::Once), 1);
    }

    #[test]
    fn engine_stalls_below_stall_rpm() {
        let mut e = s4_engine();
        e.set_auto_mode(GearboxMode::Manual);
        e.start();
        e.rpm = 200.0;
        e.update(DT, false, &EngineFeedback::default());
        assert!(!e.is_running());
        let sink = RecordingSoundSink::new();
        e.flush_sounds(&sink, ActorId(3));
        assert_eq!(sink.count(SoundTrigger::Engine, SoundState::Stop), 1);
    }

    #[test]
    fn starter_cranks_into_running() {
        let mut e = s4_engine();
        e.set_auto_mode(GearboxMode::Manual);
        e.toggle_contact();
        e.set_starter(true);
        let mut started = false;
        for _ in 0..40_000 {
            e.update(DT, false, &EngineFeedback::default());
            if e.is_running() {
                started = true;
                break;
            }
        }
        assert!(started);
        assert!(e.rpm() > e.stall_rpm());
    }

    #[test]
    fn electric_engine_starts_on_the_starter() {
        let record = records::Engine {
            shift_down_rpm: 500.0,
            shift_up_rpm: 5000.0,
            torque: 200.0,
            global_gear_ratio: 8.0,
            reverse_gear_ratio: 1.0,
            neutral_gear_ratio: 0.0,
            gear_ratios: vec![1.0],
        };
        let option = Engoption {
            engine_type: EngineType::Electric,
            ..Engoption::default()
        };
        let mut e = Engine::from_records(&record, Some(&option), None, None);
        e.toggle_contact();
        e.set_starter(true);
        e.update(DT, false, &EngineFeedback::default());
        assert!(e.is_running());
    }

    #[test]
    fn air_tank_purges() {
        let mut e = s4_engine();
        e.rpm = 2000.0;
        e.air_pressure = AIR_PURGE_PRESSURE - 0.5;
        e.update_air(DT);
        assert_relative_eq!(e.air_pressure, 0.0);
        let sink = RecordingSoundSink::new();
        e.flush_sounds(&sink, ActorId(0));
        assert_eq!(sink.count(SoundTrigger::AirPurge, SoundState::Once), 1);
    }

    #[test]
    fn old_turbo_spools_under_throttle() {
        let mut e = s4_engine();
        e.set_auto_mode(GearboxMode::Manual);
        e.start();
        e.set_acc(1.0);
        run(&mut e, 0.5, &EngineFeedback::default());
        assert!(e.turbo_psi() > 1.0, "psi {}", e.turbo_psi());
    }

    #[test]
    fn antilag_backfires_when_chance_allows() {
        let mut params = [ENGTURBO_UNSET; 11];
        params[0] = 20.0;
        params[6] = 1.0;
        params[7] = 500.0;
        params[8] = 0.0;
        let turbo = Engturbo {
            version: 2,
            inertia_factor: 1.0,
            count: 2,
            params,
        };
        let record = records::Engine {
            shift_down_rpm: 400.0,
            shift_up_rpm: 2000.0,
            torque: 500.0,
            global_gear_ratio: 3.0,
            reverse_gear_ratio: 3.0,
            neutral_gear_ratio: 0.0,
            gear_ratios: vec![5.0],
        };
        let mut e = Engine::from_records(&record, None, Some(&turbo), None);
        e.set_auto_mode(GearboxMode::Manual);
        e.start();
        e.rpm = 1500.0;
        if let Turbo::Multi(m) = &mut e.turbo {
            m.rpm.iter_mut().for_each(|r| *r = 100_000.0);
        }
        let extra = e.update_turbo(DT, 0.1);
        assert_relative_eq!(extra, -340.0);
        let sink = RecordingSoundSink::new();
        e.flush_sounds(&sink, ActorId(0));
        assert_eq!(sink.count(SoundTrigger::TurboBackfire, SoundState::Once), 2);
    }

    #[test]
    fn torque_curve_interpolates_and_clamps() {
        let curve = PowerCurve::from_record(&records::TorqueCurve {
            predefined: None,
            samples: vec![(2000.0, 0.5), (0.0, 0.2), (1000.0, 1.0)],
        });
        assert_relative_eq!(curve.at(500.0), 0.6);
        assert_relative_eq!(curve.at(1500.0), 0.75);
        assert_relative_eq!(curve.at(-10.0), 0.2);
        assert_relative_eq!(curve.at(9000.0), 0.5);

        let unknown = PowerCurve::from_record(&records::TorqueCurve {
            predefined: Some("turbodiesel".into()),
            samples: Vec::new(),
        });
        assert_eq!(unknown, PowerCurve::Flat);
        assert_relative_eq!(unknown.at(1234.0), 1.0);
    }

    #[test]
    fn crank_factor_spans_zero_to_five() {
        let mut e = s4_engine();
        e.rpm = 0.0;
        assert_relative_eq!(e.crank_factor(), 0.0);
        e.rpm = 2000.0;
        assert_relative_eq!(e.crank_factor(), 5.0);
        e.rpm = 1220.0;
        assert_relative_eq!(e.crank_factor(), 2.5);
    }

    #[test]
    fn selector_two_caps_the_gear() {
        let mut e = s4_engine();
        e.start();
        e.set_wheel_revolutions(1000.0);
        e.auto_shift_down();
        assert_eq!(e.auto_select(), AutoSelect::Two);
        assert_eq!(e.gear(), 2);
        e.auto_shift_down();
        assert_eq!(e.gear(), 1);
        e.auto_shift_set(AutoSelect::Rear);
        assert_eq!(e.gear(), -1);
    }

    #[test]
    fn gearbox_modes_cycle() {
        let mut e = s4_engine();
        assert_eq!(e.auto_mode(), GearboxMode::Automatic);
        e.toggle_auto_mode();
        assert_eq!(e.auto_mode(), GearboxMode::SemiAuto);
        assert_eq!(e.auto_select(), AutoSelect::ManualMode);
        e.set_auto_mode(GearboxMode::Automatic);
        assert_eq!(e.auto_select(), AutoSelect::Neutral);
    }

    #[test]
    fn rolling_window_forgets_oldest() {
        let mut w = Window::<3>::default();
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_relative_eq!(w.average(), 3.0);
    }
}
