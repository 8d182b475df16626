//! Typed records, one per keyword line.
//!
//! Field names follow the argument grammar of each keyword. Optional
//! arguments the format gives a default for are stored already defaulted;
//! arguments whose absence changes behaviour are `Option`s.

use crate::node_ref::{NodeList, NodeRef};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Declares a set of single-letter option flags.
///
/// Each field is set by its first letter or any of its aliases; the first
/// letter is the canonical spelling used when writing the set back.
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $field:ident = $first:literal $(| $alias:literal)* ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: bool, )*
        }

        impl $name {
            /// Set the flag spelled `c`; `false` when `c` is not one of ours.
            pub fn set(&mut self, c: char) -> bool {
                match c {
                    $( $first $(| $alias)* => { self.$field = true; true } )*
                    _ => false,
                }
            }

            /// Canonical letters of every set flag.
            #[must_use]
            pub fn letters(&self) -> String {
                let mut out = String::new();
                $( if self.$field { out.push($first); } )*
                out
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Softbody
// ---------------------------------------------------------------------------

/// Identifier of an explicitly authored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeId {
    /// `nodes`: sequential number.
    Number(u32),
    /// `nodes2`: unique name.
    Name(String),
}

/// `nodes` / `nodes2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    /// Number or name.
    pub id: NodeId,
    /// Spawn-relative position.
    pub position: [f64; 3],
    /// Option letters as written (`l n m c h b p L f x y`).
    pub options: String,
    /// Per-node load weight, only meaningful with the `l` option.
    pub load_weight: Option<f64>,
}

flag_set! {
    /// `beams` options.
    BeamOptions {
        /// `i`
        invisible = 'i',
        /// `r`
        rope = 'r',
        /// `s`
        support = 's',
    }
}

/// `beams`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Beam {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Options.
    pub options: BeamOptions,
    /// Support beam extension break limit, as a multiple of rest length.
    pub extension_break_limit: Option<f64>,
}

flag_set! {
    /// `shocks` options.
    ShockOptions {
        /// `i`
        invisible = 'i',
        /// `m`: bounds in metres instead of fractions.
        metric = 'm',
        /// `R`
        active_right = 'R' | 'r',
        /// `L`
        active_left = 'L' | 'l',
    }
}

/// `shocks`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shock {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Spring rate.
    pub spring: f64,
    /// Damping.
    pub damp: f64,
    /// Allowed contraction.
    pub short_bound: f64,
    /// Allowed extension.
    pub long_bound: f64,
    /// Precompression factor.
    pub precompression: f64,
    /// Options.
    pub options: ShockOptions,
}

flag_set! {
    /// `shocks2` / `shocks3` options.
    Shock2Options {
        /// `i`
        invisible = 'i',
        /// `m`
        metric = 'm',
        /// `M`: bounds are absolute lengths.
        absolute_metric = 'M',
        /// `s`: soft bump bounds (`shocks2` only).
        soft_bump_bounds = 's',
    }
}

/// `shocks2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shock2 {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Compression spring.
    pub spring_in: f64,
    /// Compression damping.
    pub damp_in: f64,
    /// Compression spring progression.
    pub progress_spring_in: f64,
    /// Compression damping progression.
    pub progress_damp_in: f64,
    /// Extension spring.
    pub spring_out: f64,
    /// Extension damping.
    pub damp_out: f64,
    /// Extension spring progression.
    pub progress_spring_out: f64,
    /// Extension damping progression.
    pub progress_damp_out: f64,
    /// Allowed contraction.
    pub short_bound: f64,
    /// Allowed extension.
    pub long_bound: f64,
    /// Precompression factor.
    pub precompression: f64,
    /// Options.
    pub options: Shock2Options,
}

/// `shocks3`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shock3 {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Compression spring.
    pub spring_in: f64,
    /// Compression damping.
    pub damp_in: f64,
    /// Slow compression damping.
    pub damp_in_slow: f64,
    /// Compression slow/fast split velocity.
    pub split_vel_in: f64,
    /// Fast compression damping.
    pub damp_in_fast: f64,
    /// Extension spring.
    pub spring_out: f64,
    /// Extension damping.
    pub damp_out: f64,
    /// Slow extension damping.
    pub damp_out_slow: f64,
    /// Extension slow/fast split velocity.
    pub split_vel_out: f64,
    /// Fast extension damping.
    pub damp_out_fast: f64,
    /// Allowed contraction.
    pub short_bound: f64,
    /// Allowed extension.
    pub long_bound: f64,
    /// Precompression factor.
    pub precompression: f64,
    /// Options (`s` is not valid here).
    pub options: Shock2Options,
}

/// Key inertia given inline on `hydros`, `commands` and `rotators` lines.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Inertia {
    /// Start delay factor, 0 when unset.
    pub start_delay: f64,
    /// Stop delay factor, 0 when unset.
    pub stop_delay: f64,
    /// Start response function.
    pub start_function: String,
    /// Stop response function.
    pub stop_function: String,
}

impl Inertia {
    /// True when both delays were given.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.start_delay != 0.0 && self.stop_delay != 0.0
    }
}

/// `hydros`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hydro {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Lengthening factor per unit of input.
    pub lengthening_factor: f64,
    /// Option letters as written; interpreted by the spawner.
    pub options: String,
    /// Inline inertia.
    pub inertia: Inertia,
}

/// Self-centering behaviour of a command beam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CommandCenterMode {
    /// Hold position when released.
    #[default]
    None,
    /// `c`: return to center when released.
    AutoCenter,
    /// `p`: one press runs to the end.
    OnePress,
    /// `o`: one press runs to center.
    OnePressCenter,
}

/// `commands` / `commands2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    /// 1 for `commands`, 2 for `commands2`.
    pub format_version: u8,
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Contraction speed.
    pub shorten_rate: f64,
    /// Extension speed.
    pub lengthen_rate: f64,
    /// Minimum length as a fraction of rest length.
    pub max_contraction: f64,
    /// Maximum length as a fraction of rest length.
    pub max_extension: f64,
    /// Key that contracts.
    pub contract_key: u32,
    /// Key that extends.
    pub extend_key: u32,
    /// `i`
    pub invisible: bool,
    /// `r`
    pub rope: bool,
    /// `f`
    pub not_faster: bool,
    /// `c` / `p` / `o`.
    pub center_mode: CommandCenterMode,
    /// Text shown in the command list.
    pub description: String,
    /// Inline inertia.
    pub inertia: Inertia,
    /// Engine coupling factor.
    pub affect_engine: f64,
    /// Only works with the engine running.
    pub needs_engine: bool,
    /// Plays the linked command sound.
    pub plays_sound: bool,
}

impl Command {
    /// Option letters to write back.
    #[must_use]
    pub fn option_letters(&self) -> String {
        let mut out = String::new();
        if self.invisible {
            out.push('i');
        }
        if self.rope {
            out.push('r');
        }
        if self.not_faster {
            out.push('f');
        }
        match self.center_mode {
            CommandCenterMode::None => {}
            CommandCenterMode::AutoCenter => out.push('c'),
            CommandCenterMode::OnePress => out.push('p'),
            CommandCenterMode::OnePressCenter => out.push('o'),
        }
        if out.is_empty() {
            out.push('n');
        }
        out
    }
}

/// Input sources of an animator beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnimatorSource {
    /// `airspeed`
    Airspeed,
    /// `vvi`
    VerticalVelocity,
    /// `altimeter100k`
    Altimeter100k,
    /// `altimeter10k`
    Altimeter10k,
    /// `altimeter1k`
    Altimeter1k,
    /// `aoa`
    AngleOfAttack,
    /// `flap`
    Flap,
    /// `airbrake`
    AirBrake,
    /// `roll`
    Roll,
    /// `pitch`
    Pitch,
    /// `brakes`
    Brakes,
    /// `accel`
    Accel,
    /// `clutch`
    Clutch,
    /// `speedo`
    Speedo,
    /// `tacho`
    Tacho,
    /// `turbo`
    Turbo,
    /// `parking`
    Parking,
    /// `shifterman1`
    ShiftLeftRight,
    /// `shifterman2`
    ShiftBackForth,
    /// `sequential`
    SequentialShift,
    /// `shifterlin`
    GearSelect,
    /// `torque`
    Torque,
    /// `difflock`
    DiffLock,
    /// `rudderboat`
    BoatRudder,
    /// `throttleboat`
    BoatThrottle,
}

impl AnimatorSource {
    /// Every source with its keyword.
    pub const KEYWORDS: [(&'static str, AnimatorSource); 25] = [
        ("airspeed", Self::Airspeed),
        ("vvi", Self::VerticalVelocity),
        ("altimeter100k", Self::Altimeter100k),
        ("altimeter10k", Self::Altimeter10k),
        ("altimeter1k", Self::Altimeter1k),
        ("aoa", Self::AngleOfAttack),
        ("flap", Self::Flap),
        ("airbrake", Self::AirBrake),
        ("roll", Self::Roll),
        ("pitch", Self::Pitch),
        ("brakes", Self::Brakes),
        ("accel", Self::Accel),
        ("clutch", Self::Clutch),
        ("speedo", Self::Speedo),
        ("tacho", Self::Tacho),
        ("turbo", Self::Turbo),
        ("parking", Self::Parking),
        ("shifterman1", Self::ShiftLeftRight),
        ("shifterman2", Self::ShiftBackForth),
        ("sequential", Self::SequentialShift),
        ("shifterlin", Self::GearSelect),
        ("torque", Self::Torque),
        ("difflock", Self::DiffLock),
        ("rudderboat", Self::BoatRudder),
        ("throttleboat", Self::BoatThrottle),
    ];

    /// Keyword spelling.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        Self::KEYWORDS
            .iter()
            .find(|(_, s)| *s == self)
            .map_or("", |(k, _)| k)
    }
}

/// Aerial engine sources of an animator (`throttle1`, `rpm2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AeroSource {
    /// `throttleN`
    Throttle,
    /// `rpmN`
    Rpm,
    /// `aerotorqN`
    Torque,
    /// `aeropitN`
    Pitch,
    /// `aerostatusN`
    Status,
}

/// `animators`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Animator {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Lengthening factor.
    pub lengthening_factor: f64,
    /// Input sources.
    pub sources: Vec<AnimatorSource>,
    /// Aerial engine source and 0-based engine index.
    pub aero: Option<(AeroSource, u32)>,
    /// `vis`
    pub visible: bool,
    /// `inv`
    pub invisible: bool,
    /// `shortlimit:`
    pub short_limit: Option<f64>,
    /// `longlimit:`
    pub long_limit: Option<f64>,
}

flag_set! {
    /// `triggers` options.
    TriggerOptions {
        /// `i`
        invisible = 'i',
        /// `c`: behaves like a command key.
        command_style = 'c',
        /// `x`: starts disabled.
        start_off = 'x',
        /// `b`: blocks the listed keys.
        block_keys = 'b',
        /// `B`: blocks other triggers.
        block_triggers = 'B',
        /// `A`: inverted trigger blocker.
        inv_block_triggers = 'A',
        /// `s`: switches command key numbers.
        switch_cmd_num = 's',
        /// `h`: unlocks a hook group.
        unlock_hookgroups = 'h',
        /// `H`: locks a hook group.
        lock_hookgroups = 'H',
        /// `t`: continuous.
        continuous = 't',
        /// `E`: engine trigger.
        engine_trigger = 'E',
    }
}

/// Engine functions an `E` trigger can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineTriggerFunction {
    /// 0
    Clutch,
    /// 1
    Brake,
    /// 2
    Accelerator,
    /// 3
    RpmToggle,
    /// 4
    ShiftUp,
    /// 5
    ShiftDown,
}

impl EngineTriggerFunction {
    /// Decode the numeric form used in documents.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Clutch,
            1 => Self::Brake,
            2 => Self::Accelerator,
            3 => Self::RpmToggle,
            4 => Self::ShiftUp,
            5 => Self::ShiftDown,
            _ => return None,
        })
    }

    /// Numeric form.
    #[must_use]
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// What a trigger does when its bounds are crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TriggerAction {
    /// Drive command keys.
    CommandKeys {
        /// Key fired on contraction.
        contract_key: i64,
        /// Key fired on extension.
        extend_key: i64,
    },
    /// Lock or unlock hook groups.
    HookToggle {
        /// Group toggled on contraction.
        contract_group: i64,
        /// Group toggled on extension.
        extend_group: i64,
    },
    /// Drive an engine function.
    Engine {
        /// Function.
        function: EngineTriggerFunction,
        /// Engine index.
        motor: i64,
    },
}

/// `triggers`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trigger {
    /// Endpoints.
    pub nodes: [NodeRef; 2],
    /// Contraction limit as a fraction of rest length.
    pub contraction_limit: f64,
    /// Expansion limit as a fraction of rest length.
    pub expansion_limit: f64,
    /// Options.
    pub options: TriggerOptions,
    /// Debounce time in seconds.
    pub boundary_timer: f64,
    /// Action.
    pub action: TriggerAction,
}

/// `rotators` / `rotators2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rotator {
    /// 1 for `rotators`, 2 for `rotators2`.
    pub format_version: u8,
    /// Rotation axis.
    pub axis: [NodeRef; 2],
    /// Base plate.
    pub base_plate: [NodeRef; 4],
    /// Rotating plate.
    pub rotating_plate: [NodeRef; 4],
    /// Angular rate.
    pub rate: f64,
    /// Key spinning left.
    pub spin_left_key: u32,
    /// Key spinning right.
    pub spin_right_key: u32,
    /// Drive force.
    pub force: f64,
    /// Angular tolerance.
    pub tolerance: f64,
    /// Description (`rotators2`).
    pub description: String,
    /// Inline inertia.
    pub inertia: Inertia,
    /// Engine coupling factor.
    pub engine_coupling: f64,
    /// Only works with the engine running.
    pub needs_engine: bool,
}

// ---------------------------------------------------------------------------
// Couplings
// ---------------------------------------------------------------------------

/// `hooks`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hook {
    /// Hook node.
    pub node: NodeRef,
    /// `hookrange`
    pub range: f64,
    /// `speedcoef`
    pub speed_coef: f64,
    /// `maxforce`
    pub max_force: f64,
    /// `hookgroup`
    pub group: i32,
    /// `lockgroup`
    pub lockgroup: i32,
    /// `timer`
    pub timer: f64,
    /// `shortlimit`
    pub min_range: f64,
    /// `selflock`
    pub self_lock: bool,
    /// `autolock`
    pub auto_lock: bool,
    /// `nodisable`
    pub no_disable: bool,
    /// `norope`
    pub no_rope: bool,
    /// `visible`
    pub visible: bool,
}

flag_set! {
    /// `ties` options.
    TieOptions {
        /// `i`
        invisible = 'i',
        /// `s`
        no_self_lock = 's',
    }
}

/// `ties`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tie {
    /// Root node.
    pub root: NodeRef,
    /// Search radius.
    pub max_reach: f64,
    /// Shortening rate.
    pub rate: f64,
    /// Shortest allowed length.
    pub min_length: f64,
    /// Longest allowed length.
    pub max_length: f64,
    /// Options.
    pub options: TieOptions,
    /// Stress at which tying stops.
    pub max_stress: f64,
    /// Ropable group filter, -1 for any.
    pub group: i32,
}

/// `ropes`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rope {
    /// Root node.
    pub root: NodeRef,
    /// Free end node.
    pub end: NodeRef,
    /// `i`
    pub invisible: bool,
}

/// `ropables`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ropable {
    /// Node.
    pub node: NodeRef,
    /// Group, -1 when unset.
    pub group: i32,
    /// Accepts several ties at once.
    pub multilock: bool,
}

/// `railgroups`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Railgroup {
    /// Group id referenced by slidenodes.
    pub id: i32,
    /// Rail nodes.
    pub nodes: NodeList,
}

flag_set! {
    /// `slidenodes` attach constraints.
    SlideConstraints {
        /// `Ca`
        attach_all = 'a',
        /// `Cf`
        attach_foreign = 'f',
        /// `Cs`
        attach_self = 's',
        /// `Cn`
        attach_none = 'n',
    }
}

/// `slidenodes`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlideNode {
    /// Sliding node.
    pub node: NodeRef,
    /// Rail nodes.
    pub rail: NodeList,
    /// `S` spring rate.
    pub spring_rate: Option<f64>,
    /// `B` break force.
    pub break_force: Option<f64>,
    /// `T` tolerance.
    pub tolerance: Option<f64>,
    /// `R` attachment rate.
    pub attachment_rate: Option<f64>,
    /// `G` railgroup.
    pub railgroup: Option<i32>,
    /// `D` max attach distance.
    pub max_attach_dist: Option<f64>,
    /// `C` constraints.
    pub constraints: SlideConstraints,
}

/// `lockgroups`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lockgroup {
    /// Group number.
    pub number: i32,
    /// Member nodes.
    pub nodes: Vec<NodeRef>,
}

// ---------------------------------------------------------------------------
// Wheels
// ---------------------------------------------------------------------------

/// Wheel braking policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Braking {
    /// 0
    #[default]
    None,
    /// 1: foot and hand brake.
    FootHand,
    /// 2: foot, hand and left skid steer.
    FootHandSkidLeft,
    /// 3: foot, hand and right skid steer.
    FootHandSkidRight,
    /// 4: foot brake only.
    FootOnly,
}

impl Braking {
    /// Decode the numeric form.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::FootHand,
            2 => Self::FootHandSkidLeft,
            3 => Self::FootHandSkidRight,
            4 => Self::FootOnly,
            _ => return None,
        })
    }

    /// Numeric form.
    #[must_use]
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Wheel propulsion policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Propulsion {
    /// 0
    #[default]
    None,
    /// 1
    Forward,
    /// 2
    Backward,
}

impl Propulsion {
    /// Decode the numeric form.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Forward,
            2 => Self::Backward,
            _ => return None,
        })
    }

    /// Numeric form.
    #[must_use]
    pub fn code(self) -> i64 {
        self as i64
    }
}

/// Side a mesh wheel faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WheelSide {
    /// `l`
    #[default]
    Left,
    /// `r`
    Right,
}

/// Arguments shared by every wheel keyword.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelBase {
    /// Width.
    pub width: f64,
    /// Number of rays.
    pub rays: u32,
    /// Axis nodes.
    pub nodes: [NodeRef; 2],
    /// Rigidity node, `None` for `9999`.
    pub rigidity_node: Option<NodeRef>,
    /// Braking.
    pub braking: Braking,
    /// Propulsion.
    pub propulsion: Propulsion,
    /// Reference arm node.
    pub arm_node: NodeRef,
    /// Total mass.
    pub mass: f64,
}

/// `wheels`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wheel {
    /// Shared arguments.
    pub base: WheelBase,
    /// Radius.
    pub radius: f64,
    /// Tyre spring.
    pub spring: f64,
    /// Tyre damping.
    pub damp: f64,
    /// Face material.
    pub face_material: String,
    /// Band material.
    pub band_material: String,
}

/// `wheels2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wheel2 {
    /// Shared arguments.
    pub base: WheelBase,
    /// Rim radius.
    pub rim_radius: f64,
    /// Tyre radius.
    pub tyre_radius: f64,
    /// Rim spring.
    pub rim_spring: f64,
    /// Rim damping.
    pub rim_damp: f64,
    /// Tyre spring.
    pub tyre_spring: f64,
    /// Tyre damping.
    pub tyre_damp: f64,
    /// Face material.
    pub face_material: String,
    /// Band material.
    pub band_material: String,
}

/// `meshwheels` / `meshwheels2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshWheel {
    /// Shared arguments.
    pub base: WheelBase,
    /// Tyre radius.
    pub tyre_radius: f64,
    /// Rim radius.
    pub rim_radius: f64,
    /// Spring.
    pub spring: f64,
    /// Damping.
    pub damp: f64,
    /// Side.
    pub side: WheelSide,
    /// Mesh.
    pub mesh: String,
    /// Material.
    pub material: String,
}

/// `flexbodywheels`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlexBodyWheel {
    /// Shared arguments.
    pub base: WheelBase,
    /// Tyre radius.
    pub tyre_radius: f64,
    /// Rim radius.
    pub rim_radius: f64,
    /// Tyre spring.
    pub tyre_spring: f64,
    /// Tyre damping.
    pub tyre_damp: f64,
    /// Rim spring.
    pub rim_spring: f64,
    /// Rim damping.
    pub rim_damp: f64,
    /// Side.
    pub side: WheelSide,
    /// Rim mesh.
    pub rim_mesh: String,
    /// Tyre mesh.
    pub tyre_mesh: String,
}

/// `wheeldetachers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelDetacher {
    /// Wheel number, in wheel declaration order.
    pub wheel: i32,
    /// Detacher group.
    pub group: i32,
}

// ---------------------------------------------------------------------------
// Cameras
// ---------------------------------------------------------------------------

/// `cinecam`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cinecam {
    /// Camera node position.
    pub position: [f64; 3],
    /// Eight anchor nodes.
    pub nodes: [NodeRef; 8],
    /// Anchor beam spring.
    pub spring: f64,
    /// Anchor beam damping.
    pub damp: f64,
    /// Camera node mass.
    pub node_mass: f64,
}

/// `cameras`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Camera {
    /// Center node.
    pub center: NodeRef,
    /// Back node.
    pub back: NodeRef,
    /// Left node.
    pub left: NodeRef,
}

/// `extcamera` mode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExtCamera {
    /// `classic`
    Classic,
    /// `cinecam`
    Cinecam,
    /// `node <ref>`
    Node(NodeRef),
}

// ---------------------------------------------------------------------------
// Drivetrain
// ---------------------------------------------------------------------------

/// `engine`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Engine {
    /// Downshift rpm (min rpm).
    pub shift_down_rpm: f64,
    /// Upshift rpm (max rpm).
    pub shift_up_rpm: f64,
    /// Peak torque.
    pub torque: f64,
    /// Differential ratio.
    pub global_gear_ratio: f64,
    /// Reverse ratio.
    pub reverse_gear_ratio: f64,
    /// Neutral ratio.
    pub neutral_gear_ratio: f64,
    /// Forward ratios.
    pub gear_ratios: Vec<f64>,
}

/// Engine kind selected by `engoption`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineType {
    /// `t`
    #[default]
    Truck,
    /// `c`
    Car,
    /// `e`
    Electric,
}

impl EngineType {
    /// Letter used in documents.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::Truck => 't',
            Self::Car => 'c',
            Self::Electric => 'e',
        }
    }
}

/// `engoption`. Negative values mean "use the built-in default".
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Engoption {
    /// Engine inertia.
    pub inertia: f64,
    /// Engine type.
    pub engine_type: EngineType,
    /// Clutch force.
    pub clutch_force: f64,
    /// Shift time.
    pub shift_time: f64,
    /// Clutch time.
    pub clutch_time: f64,
    /// Post-shift time.
    pub post_shift_time: f64,
    /// Stall rpm.
    pub stall_rpm: f64,
    /// Idle rpm.
    pub idle_rpm: f64,
    /// Max idle mixture.
    pub max_idle_mixture: f64,
    /// Min idle mixture.
    pub min_idle_mixture: f64,
    /// Engine braking torque.
    pub braking_torque: f64,
}

impl Default for Engoption {
    fn default() -> Self {
        Self {
            inertia: 10.0,
            engine_type: EngineType::Truck,
            clutch_force: -1.0,
            shift_time: -1.0,
            clutch_time: -1.0,
            post_shift_time: -1.0,
            stall_rpm: -1.0,
            idle_rpm: -1.0,
            max_idle_mixture: -1.0,
            min_idle_mixture: -1.0,
            braking_torque: -1.0,
        }
    }
}

/// Value of an `engturbo` parameter that was not given.
pub const ENGTURBO_UNSET: f64 = 9999.0;

/// `engturbo`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Engturbo {
    /// 1 = old single-turbo model, 2 = new model.
    pub version: i32,
    /// Turbo inertia factor.
    pub inertia_factor: f64,
    /// Number of turbos, at most 4.
    pub count: u32,
    /// Eleven model parameters, [`ENGTURBO_UNSET`] where not given.
    pub params: [f64; 11],
}

/// `torquecurve`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TorqueCurve {
    /// Named built-in curve.
    pub predefined: Option<String>,
    /// `(rpm, torque fraction)` samples.
    pub samples: Vec<(f64, f64)>,
}

/// `brakes`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Brakes {
    /// Foot brake force.
    pub force: f64,
    /// Parking brake force, `None` for twice the foot force.
    pub parking_force: Option<f64>,
}

/// Differential behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DiffType {
    /// `o`
    Open,
    /// `l`
    Locked,
    /// `s`
    Split,
    /// `v`
    Viscous,
}

impl DiffType {
    /// Decode a mode letter.
    #[must_use]
    pub fn from_letter(c: char) -> Option<Self> {
        Some(match c {
            'o' => Self::Open,
            'l' => Self::Locked,
            's' => Self::Split,
            'v' => Self::Viscous,
            _ => return None,
        })
    }

    /// Mode letter.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            Self::Open => 'o',
            Self::Locked => 'l',
            Self::Split => 's',
            Self::Viscous => 'v',
        }
    }
}

/// `axles`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axle {
    /// Axis node pairs of the two wheels.
    pub wheels: [Option<[NodeRef; 2]>; 2],
    /// Selectable differential modes.
    pub modes: Vec<DiffType>,
}

/// `interaxles`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InterAxle {
    /// First axle, 0-based.
    pub a1: i32,
    /// Second axle, 0-based.
    pub a2: i32,
    /// Selectable differential modes.
    pub modes: Vec<DiffType>,
}

/// `transfer_case`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferCase {
    /// Always driven axle, 0-based.
    pub a1: i32,
    /// Switchable axle, 0-based, -1 for none.
    pub a2: i32,
    /// 2WD mode available.
    pub has_2wd: bool,
    /// 2WD low range available.
    pub has_2wd_lo: bool,
    /// Range ratios.
    pub gear_ratios: Vec<f64>,
}

/// Shared shape of `TractionControl` and `AntiLockBrakes`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlipControl {
    /// Regulation force.
    pub regulation_force: f64,
    /// Wheel slip threshold (TC) or min speed (ALB).
    pub threshold: f64,
    /// Fade speed (TC only).
    pub fade_speed: f64,
    /// Pulses per second.
    pub pulse_per_sec: f64,
    /// Starts enabled.
    pub is_on: bool,
    /// Hidden from the dashboard.
    pub no_dashboard: bool,
    /// Cannot be toggled.
    pub no_toggle: bool,
}

/// `cruisecontrol`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CruiseControl {
    /// Minimum speed.
    pub min_speed: f64,
    /// Autobrake mode.
    pub autobrake: i32,
}

/// `slopebrake`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlopeBrake {
    /// Regulating force.
    pub regulating_force: f64,
    /// Attach angle (degrees).
    pub attach_angle: f64,
    /// Release angle (degrees).
    pub release_angle: f64,
}

impl Default for SlopeBrake {
    fn default() -> Self {
        Self {
            regulating_force: 6.0,
            attach_angle: 5.0,
            release_angle: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

/// `minimass` section line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Minimass {
    /// Global minimum node mass.
    pub min_mass: f64,
    /// `l`: leave loaded nodes alone.
    pub skip_loaded: bool,
}

/// `cab`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cab {
    /// Triangle corners.
    pub nodes: [NodeRef; 3],
    /// Option letters (`c` contact, `b`/`p`/`u` buoyant, `D`/`F`/`S` combos).
    pub options: String,
}

impl Cab {
    /// Triangle takes part in contacter collisions.
    #[must_use]
    pub fn is_contact(&self) -> bool {
        self.options.contains(['c', 'D', 'F', 'S'])
    }

    /// Triangle takes part in buoyancy.
    #[must_use]
    pub fn is_buoyant(&self) -> bool {
        self.options.contains(['b', 'p', 'u', 'D', 'F', 'S'])
    }
}

/// `globals`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Globals {
    /// Dry mass distributed over normal nodes.
    pub dry_mass: f64,
    /// Cargo mass distributed over `l` nodes.
    pub cargo_mass: f64,
    /// Default material.
    pub material: Option<String>,
}

/// `fusedrag`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fusedrag {
    /// Front node.
    pub front: NodeRef,
    /// Rear node.
    pub rear: NodeRef,
    /// Width, `None` for `autocalc`.
    pub approximate_width: Option<f64>,
    /// Area coefficient (autocalc only).
    pub area_coefficient: f64,
    /// Airfoil profile.
    pub airfoil: String,
}

/// `exhausts`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Exhaust {
    /// Emitter node.
    pub reference: NodeRef,
    /// Direction node.
    pub direction: NodeRef,
    /// Particle system.
    pub particle: Option<String>,
}

/// `flexbodies` with its `forset`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Flexbody {
    /// Reference node.
    pub reference: NodeRef,
    /// X axis node.
    pub x_axis: NodeRef,
    /// Y axis node.
    pub y_axis: NodeRef,
    /// Offset.
    pub offset: [f64; 3],
    /// Rotation (degrees).
    pub rotation: [f64; 3],
    /// Mesh.
    pub mesh: String,
    /// Nodes the mesh deforms with.
    pub forset: NodeList,
}

/// `fileinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fileinfo {
    /// Unique id.
    pub unique_id: String,
    /// Category.
    pub category: Option<i64>,
    /// File version.
    pub version: Option<i64>,
}

/// `author`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Author {
    /// Role.
    pub kind: String,
    /// Forum id.
    pub forum_id: Option<i64>,
    /// Name.
    pub name: String,
    /// Email.
    pub email: String,
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum Record {
    Node(Node),
    Beam(Beam),
    Shock(Shock),
    Shock2(Shock2),
    Shock3(Shock3),
    Hydro(Hydro),
    Command(Command),
    Animator(Animator),
    Trigger(Trigger),
    Rotator(Rotator),
    Hook(Hook),
    Tie(Tie),
    Rope(Rope),
    Ropable(Ropable),
    Railgroup(Railgroup),
    SlideNode(SlideNode),
    Lockgroup(Lockgroup),
    Wheel(Wheel),
    Wheel2(Wheel2),
    MeshWheel(MeshWheel),
    FlexBodyWheel(FlexBodyWheel),
    WheelDetacher(WheelDetacher),
    Cinecam(Cinecam),
    Camera(Camera),
    CameraRail(Vec<NodeRef>),
    ExtCamera(ExtCamera),
    Engine(Engine),
    Engoption(Engoption),
    Engturbo(Engturbo),
    TorqueCurve(TorqueCurve),
    Brakes(Brakes),
    Axle(Axle),
    InterAxle(InterAxle),
    TransferCase(TransferCase),
    TractionControl(SlipControl),
    AntiLockBrakes(SlipControl),
    CruiseControl(CruiseControl),
    SpeedLimiter(f64),
    SlopeBrake(SlopeBrake),
    Contacter(NodeRef),
    Fixes(NodeRef),
    Minimass(Minimass),
    NodeCollision { node: NodeRef, radius: f64 },
    CollisionBox(Vec<NodeRef>),
    Cab(Cab),
    Globals(Globals),
    Fusedrag(Fusedrag),
    Exhaust(Exhaust),
    Flexbody(Flexbody),
    Fileinfo(Fileinfo),
    Author(Author),
    FileFormatVersion(i64),
    /// Argument-less directive; the entry keyword says which.
    Flag,
    /// Keyword whose subsystem lives outside the core; kept verbatim.
    Raw(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_sets_accept_aliases_and_write_canonical() {
        let mut o = ShockOptions::default();
        assert!(o.set('r'));
        assert!(o.set('L'));
        assert!(!o.set('q'));
        assert!(o.active_right && o.active_left);
        assert_eq!(o.letters(), "RL");
    }

    #[test]
    fn codes_roundtrip() {
        assert_eq!(Braking::from_code(4), Some(Braking::FootOnly));
        assert_eq!(Braking::from_code(5), None);
        assert_eq!(Propulsion::from_code(2).map(Propulsion::code), Some(2));
        assert_eq!(EngineTriggerFunction::from_code(3), Some(EngineTriggerFunction::RpmToggle));
        assert_eq!(DiffType::from_letter('v'), Some(DiffType::Viscous));
    }

    #[test]
    fn command_letters_default_to_filler() {
        let cmd = Command {
            format_version: 2,
            nodes: [NodeRef::numbered(0), NodeRef::numbered(1)],
            shorten_rate: 0.1,
            lengthen_rate: 0.1,
            max_contraction: 0.5,
            max_extension: 1.5,
            contract_key: 1,
            extend_key: 2,
            invisible: false,
            rope: false,
            not_faster: false,
            center_mode: CommandCenterMode::None,
            description: String::new(),
            inertia: Inertia::default(),
            affect_engine: 1.0,
            needs_engine: true,
            plays_sound: true,
        };
        assert_eq!(cmd.option_letters(), "n");
        let cmd = Command {
            center_mode: CommandCenterMode::OnePressCenter,
            invisible: true,
            ..cmd
        };
        assert_eq!(cmd.option_letters(), "io");
    }

    #[test]
    fn cab_option_classes() {
        let cab = Cab {
            nodes: [NodeRef::numbered(0), NodeRef::numbered(1), NodeRef::numbered(2)],
            options: "D".to_owned(),
        };
        assert!(cab.is_contact() && cab.is_buoyant());
        let cab = Cab {
            options: "n".to_owned(),
            ..cab
        };
        assert!(!cab.is_contact() && !cab.is_buoyant());
    }
}
