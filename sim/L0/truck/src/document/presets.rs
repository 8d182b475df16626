//! Preset state carried by directives such as `set_beam_defaults`.
//!
//! Presets apply to the records that follow them in the same module. The
//! parser folds every preset directive into a complete snapshot and pushes
//! it onto the module's [`PresetTables`]; each entry remembers the snapshot
//! indices in force when it was read ([`PresetRefs`]). The spawner therefore
//! never replays directives, it simply looks the snapshot up.

use sim_types::constants::{
    BEAM_BREAK, BEAM_DEFORM, DEFAULT_BEAM_DIAMETER, DEFAULT_COLLISION_RANGE, DEFAULT_DAMP,
    DEFAULT_DETACHER_GROUP, DEFAULT_SPRING, NODE_FRICTION_COEF_DEFAULT, NODE_LOADWEIGHT_DEFAULT,
    NODE_SURFACE_COEF_DEFAULT, NODE_VOLUME_COEF_DEFAULT,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Multipliers from `set_beam_defaults_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamScale {
    /// Spring multiplier.
    pub spring: f64,
    /// Damping multiplier.
    pub damp: f64,
    /// Deformation threshold multiplier.
    pub deform: f64,
    /// Breaking threshold multiplier.
    pub break_force: f64,
}

impl Default for BeamScale {
    fn default() -> Self {
        Self {
            spring: 1.0,
            damp: 1.0,
            deform: 1.0,
            break_force: 1.0,
        }
    }
}

/// Folded `set_beam_defaults` state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamDefaults {
    /// Spring constant.
    pub spring: f64,
    /// Damping constant.
    pub damp: f64,
    /// Plastic deformation threshold.
    pub deform: f64,
    /// Breaking threshold.
    pub break_force: f64,
    /// Visual diameter.
    pub diameter: f64,
    /// Visual material.
    pub material: String,
    /// Plastic coefficient; `Some` also silences creak.
    pub plastic_coef: Option<f64>,
    /// Active scale.
    pub scale: BeamScale,
    /// `enable_advanced_deformation` was seen before this snapshot.
    pub advanced_deformation: bool,
}

impl Default for BeamDefaults {
    fn default() -> Self {
        Self {
            spring: DEFAULT_SPRING,
            damp: DEFAULT_DAMP,
            deform: BEAM_DEFORM,
            break_force: BEAM_BREAK,
            diameter: DEFAULT_BEAM_DIAMETER,
            material: "tracks/beam".to_owned(),
            plastic_coef: None,
            scale: BeamScale::default(),
            advanced_deformation: false,
        }
    }
}

impl BeamDefaults {
    /// Scaled spring constant.
    #[must_use]
    pub fn scaled_spring(&self) -> f64 {
        self.spring * self.scale.spring
    }

    /// Scaled damping.
    #[must_use]
    pub fn scaled_damp(&self) -> f64 {
        self.damp * self.scale.damp
    }

    /// Scaled deformation threshold.
    #[must_use]
    pub fn scaled_deform(&self) -> f64 {
        self.deform * self.scale.deform
    }

    /// Scaled breaking threshold.
    #[must_use]
    pub fn scaled_break(&self) -> f64 {
        self.break_force * self.scale.break_force
    }

    /// Fold the arguments of one `set_beam_defaults` line into `self`.
    ///
    /// Absent arguments keep their previous value, negative ones fall back to
    /// the built-in default. A negative plastic coefficient leaves the current
    /// one alone. Without advanced deformation the deformation threshold never
    /// drops below [`BEAM_DEFORM`].
    pub fn apply(&mut self, args: &BeamDefaultsArgs) {
        fn pick(value: Option<f64>, current: f64, fallback: f64) -> f64 {
            match value {
                Some(v) if v < 0.0 => fallback,
                Some(v) => v,
                None => current,
            }
        }
        self.spring = pick(args.spring, self.spring, DEFAULT_SPRING);
        self.damp = pick(args.damp, self.damp, DEFAULT_DAMP);
        self.deform = pick(args.deform, self.deform, BEAM_DEFORM);
        self.break_force = pick(args.break_force, self.break_force, BEAM_BREAK);
        self.diameter = pick(args.diameter, self.diameter, DEFAULT_BEAM_DIAMETER);
        if let Some(material) = &args.material {
            self.material.clone_from(material);
        }
        if let Some(coef) = args.plastic_coef.filter(|c| *c >= 0.0) {
            self.plastic_coef = Some(coef);
        }
        if !self.advanced_deformation && self.deform < BEAM_DEFORM {
            self.deform = BEAM_DEFORM;
        }
    }
}

/// Raw arguments of a `set_beam_defaults` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeamDefaultsArgs {
    /// Spring.
    pub spring: Option<f64>,
    /// Damping.
    pub damp: Option<f64>,
    /// Deformation threshold.
    pub deform: Option<f64>,
    /// Breaking threshold.
    pub break_force: Option<f64>,
    /// Diameter.
    pub diameter: Option<f64>,
    /// Material.
    pub material: Option<String>,
    /// Plastic coefficient.
    pub plastic_coef: Option<f64>,
}

/// Folded `set_node_defaults` state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeDefaults {
    /// Load weight; negative means "not set".
    pub load_weight: f64,
    /// Friction coefficient.
    pub friction: f64,
    /// Volume coefficient.
    pub volume: f64,
    /// Surface coefficient.
    pub surface: f64,
    /// Option letters appended to every node's own options.
    pub options: String,
    /// `lockgroup_default_nolock` was seen before this snapshot.
    pub lockgroup_nolock: bool,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            load_weight: NODE_LOADWEIGHT_DEFAULT,
            friction: NODE_FRICTION_COEF_DEFAULT,
            volume: NODE_VOLUME_COEF_DEFAULT,
            surface: NODE_SURFACE_COEF_DEFAULT,
            options: String::new(),
            lockgroup_nolock: false,
        }
    }
}

/// Folded `set_inertia_defaults` state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InertiaDefaults {
    /// Start delay factor; negative disables.
    pub start_delay: f64,
    /// Stop delay factor; negative disables.
    pub stop_delay: f64,
    /// Start response function name.
    pub start_function: String,
    /// Stop response function name.
    pub stop_function: String,
}

impl Default for InertiaDefaults {
    fn default() -> Self {
        Self {
            start_delay: -1.0,
            stop_delay: -1.0,
            start_function: String::new(),
            stop_function: String::new(),
        }
    }
}

impl InertiaDefaults {
    /// True when the defaults give a usable delay.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.start_delay > 0.0 || self.stop_delay > 0.0
    }
}

/// Folded `detacher_group` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetacherGroup {
    /// Group number.
    pub group: i32,
    /// Written as `detacher_group end`.
    pub end: bool,
}

impl Default for DetacherGroup {
    fn default() -> Self {
        Self {
            group: DEFAULT_DETACHER_GROUP,
            end: false,
        }
    }
}

/// `set_skeleton_settings` values.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkeletonSettings {
    /// Skeleton view range (m).
    pub visibility_range: f64,
    /// Skeleton beam thickness (m).
    pub beam_thickness: f64,
}

impl Default for SkeletonSettings {
    fn default() -> Self {
        Self {
            visibility_range: 150.0,
            beam_thickness: 0.01,
        }
    }
}

/// Per-module preset snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PresetTables {
    /// `set_beam_defaults` / `set_beam_defaults_scale` snapshots.
    pub beam_defaults: Vec<BeamDefaults>,
    /// `set_node_defaults` snapshots.
    pub node_defaults: Vec<NodeDefaults>,
    /// `set_inertia_defaults` snapshots.
    pub inertia_defaults: Vec<InertiaDefaults>,
    /// `set_default_minimass` values.
    pub minimass: Vec<f64>,
    /// `detacher_group` snapshots.
    pub detacher_group: Vec<DetacherGroup>,
    /// `set_managedmaterials_options` double-sided flags.
    pub managed_mat_double_sided: Vec<bool>,
    /// `set_collision_range` values.
    pub collision_range: Vec<f64>,
    /// `set_skeleton_settings` values.
    pub skeleton: Vec<SkeletonSettings>,
}

/// Snapshot indices an entry was read under; `None` means built-in default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PresetRefs {
    /// Into [`PresetTables::beam_defaults`].
    pub beam_defaults: Option<u32>,
    /// Into [`PresetTables::node_defaults`].
    pub node_defaults: Option<u32>,
    /// Into [`PresetTables::inertia_defaults`].
    pub inertia_defaults: Option<u32>,
    /// Into [`PresetTables::minimass`].
    pub minimass: Option<u32>,
    /// Into [`PresetTables::detacher_group`].
    pub detacher_group: Option<u32>,
    /// Into [`PresetTables::managed_mat_double_sided`].
    pub managed_mat: Option<u32>,
    /// Into [`PresetTables::collision_range`].
    pub collision_range: Option<u32>,
    /// Into [`PresetTables::skeleton`].
    pub skeleton: Option<u32>,
}

fn lookup<T: Clone>(table: &[T], idx: Option<u32>) -> Option<T> {
    idx.and_then(|i| table.get(i as usize)).cloned()
}

impl PresetTables {
    /// Beam defaults in force for `refs`.
    #[must_use]
    pub fn beam_defaults(&self, refs: &PresetRefs) -> BeamDefaults {
        lookup(&self.beam_defaults, refs.beam_defaults).unwrap_or_default()
    }

    /// Node defaults in force for `refs`.
    #[must_use]
    pub fn node_defaults(&self, refs: &PresetRefs) -> NodeDefaults {
        lookup(&self.node_defaults, refs.node_defaults).unwrap_or_default()
    }

    /// Inertia defaults in force for `refs`.
    #[must_use]
    pub fn inertia_defaults(&self, refs: &PresetRefs) -> InertiaDefaults {
        lookup(&self.inertia_defaults, refs.inertia_defaults).unwrap_or_default()
    }

    /// `set_default_minimass` in force, `None` when unset.
    #[must_use]
    pub fn minimass(&self, refs: &PresetRefs) -> Option<f64> {
        lookup(&self.minimass, refs.minimass)
    }

    /// Detacher group in force.
    #[must_use]
    pub fn detacher_group(&self, refs: &PresetRefs) -> i32 {
        lookup(&self.detacher_group, refs.detacher_group)
            .unwrap_or_default()
            .group
    }

    /// Collision range in force.
    #[must_use]
    pub fn collision_range(&self, refs: &PresetRefs) -> f64 {
        lookup(&self.collision_range, refs.collision_range).unwrap_or(DEFAULT_COLLISION_RANGE)
    }
}
