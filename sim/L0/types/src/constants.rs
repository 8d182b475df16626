//! Physics constants shared by the spawner and the integrator.

/// Fixed micro-timestep of the integrator (seconds).
pub const PHYSICS_DT: f64 = 0.0005;

/// Default beam spring constant (N/m).
pub const DEFAULT_SPRING: f64 = 9_000_000.0;
/// Default beam damping (N·s/m).
pub const DEFAULT_DAMP: f64 = 12_000.0;
/// Default gravity along +Y (m/s²).
pub const DEFAULT_GRAVITY: f64 = -9.8;
/// Default viscous drag coefficient.
pub const DEFAULT_DRAG: f64 = 0.05;
/// Default water drag coefficient.
pub const DEFAULT_WATERDRAG: f64 = 10.0;
/// Rest lengths are never deformed below this (m).
pub const MIN_BEAM_LENGTH: f64 = 0.1;
/// Default breaking threshold (N).
pub const BEAM_BREAK: f64 = 1_000_000.0;
/// Default plastic deformation threshold (N).
pub const BEAM_DEFORM: f64 = 400_000.0;
/// Creak sound threshold (N).
pub const BEAM_CREAK: f64 = 100_000.0;
/// Default visual beam diameter (m).
pub const DEFAULT_BEAM_DIAMETER: f64 = 0.05;
/// Stabiliser shock adjustment rate.
pub const STAB_RATE: f64 = 0.025;
/// Default support beam extension break limit, as a multiple of L.
pub const SUPPORT_BEAM_LIMIT: f64 = 4.0;
/// Default mass of a freshly created node (kg).
pub const NODE_DEFAULT_MASS: f64 = 10.0;
/// Default per-node minimum mass (kg).
pub const DEFAULT_MINIMASS: f64 = 50.0;
/// Default node friction, volume and surface coefficients.
pub const NODE_FRICTION_COEF_DEFAULT: f64 = 1.0;
/// See [`NODE_FRICTION_COEF_DEFAULT`].
pub const NODE_VOLUME_COEF_DEFAULT: f64 = 1.0;
/// See [`NODE_FRICTION_COEF_DEFAULT`].
pub const NODE_SURFACE_COEF_DEFAULT: f64 = 1.0;
/// `set_node_defaults` loadweight meaning "not set".
pub const NODE_LOADWEIGHT_DEFAULT: f64 = -1.0;
/// Default collision range around cab triangles (m).
pub const DEFAULT_COLLISION_RANGE: f64 = 0.02;
/// Rotator drive force (N).
pub const ROTATOR_FORCE: f64 = 10_000_000.0;
/// Rotator default angular tolerance (rad).
pub const ROTATOR_TOLERANCE: f64 = 0.0;
/// Number of command keys (1-based, inclusive).
pub const MAX_COMMANDS: usize = 84;
/// Conversion factor from rad/s to rpm.
pub const RAD_PER_SEC_TO_RPM: f64 = 9.549_296_585_513_7;
/// Speed above which a node is considered exploded (m/s, about Mach 20).
pub const BLOWUP_SPEED: f64 = 6860.0;

/// Hook assistance beam force limit (N).
pub const HOOK_FORCE_DEFAULT: f64 = 10_000_000.0;
/// Hook lock search range (m).
pub const HOOK_RANGE_DEFAULT: f64 = 0.4;
/// Hook shortening speed per substep (m).
pub const HOOK_SPEED_DEFAULT: f64 = 0.00025;
/// Relock delay for autolock hooks (s).
pub const HOOK_LOCK_TIMER_DEFAULT: f64 = 5.0;
/// Hook lockgroup meaning "scan every node".
pub const NODE_LOCKGROUP_DEFAULT: i32 = -1;
/// Stress at which a tie stops shortening.
pub const TIE_MAX_STRESS_DEFAULT: f64 = 100_000.0;

/// Default detacher group.
pub const DEFAULT_DETACHER_GROUP: i32 = 0;

/// Rigidity node placeholder meaning "none" in wheel records.
pub const RIGIDITY_NODE_NONE: u32 = 9999;
