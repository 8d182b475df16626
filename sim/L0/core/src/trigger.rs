//! Trigger beams.
//!
//! A trigger is a forceless beam that watches its own extension. Past its
//! short or long bound it fires an action: press a command key, lock or
//! unlock a hook group, drive an engine function, or (for the blocker
//! kinds) enable and disable the triggers that follow it in beam order.
//!
//! Triggers are evaluated after the beam pass of a substep, in beam order,
//! so a blocker affects the triggers after it within the same substep.

use sim_truck::document::records::{EngineTriggerFunction, TriggerAction, TriggerOptions};

use crate::beam::{Beam, BoundedKind};
use crate::command::CommandKey;

/// Behaviour flags of a trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerFlags {
    /// Disables the next `cmd_short` triggers while tripped.
    pub blocker: bool,
    /// Inverted blocker: enables the next `cmd_long` triggers while tripped.
    pub inv_blocker: bool,
    /// Blocks command key `cmd_short` while relaxed.
    pub cmd_blocker: bool,
    /// Swaps the keys of triggers sharing its key pair.
    pub cmd_switch: bool,
    /// Unlocks hook groups.
    pub hook_unlock: bool,
    /// Locks hook groups.
    pub hook_lock: bool,
    /// Sends a proportional value while inside its bounds.
    pub continuous: bool,
    /// Drives an engine function.
    pub engine: bool,
}

/// Runtime state of one trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Beam index.
    pub beam: usize,
    /// Behaviour flags.
    pub flags: TriggerFlags,
    /// Disabled triggers are skipped.
    pub enabled: bool,
    /// Debounce countdown of a command switch; 0 when armed.
    pub switch_state: f64,
    /// Debounce time.
    pub boundary_time: f64,
    /// Key, group, engine number or trigger count for the short bound.
    pub cmd_short: i64,
    /// Key, group, engine function or trigger count for the long bound.
    pub cmd_long: i64,
}

/// Why a trigger definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerRejection {
    /// A plain trigger needs a key in `1..=max_key`.
    KeyOutOfRange(i64),
    /// Blockers need non-negative counts.
    NegativeBlockerCount,
    /// Engine triggers cannot also block, switch or toggle hooks.
    EngineConflict,
}

/// Settings derived from a `triggers` record.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSetup {
    /// Runtime trigger with `beam` still unset.
    pub trigger: Trigger,
    /// Short bound as a fraction of rest length.
    pub short_bound: f64,
    /// Long bound as a fraction of rest length.
    pub long_bound: f64,
    /// Keys to mark unblocked at spawn.
    pub unblock_keys: Vec<i64>,
    /// Keys to mark blocked at spawn (`b` without `B`).
    pub block_keys: Vec<i64>,
}

impl TriggerSetup {
    /// Interpret a `triggers` record.
    pub fn from_record(
        options: &TriggerOptions,
        contraction_limit: f64,
        expansion_limit: f64,
        boundary_timer: f64,
        action: &TriggerAction,
        max_key: i64,
    ) -> Result<Self, TriggerRejection> {
        let (short, long) = match *action {
            TriggerAction::CommandKeys {
                contract_key,
                extend_key,
            } => (contract_key, extend_key),
            TriggerAction::HookToggle {
                contract_group,
                extend_group,
            } => (contract_group, extend_group),
            TriggerAction::Engine { function, motor } => (motor, function.code()),
        };
        let any_blocker = options.block_triggers || options.inv_block_triggers;
        let hook_toggle = options.unlock_hookgroups || options.lock_hookgroups;
        let engine = options.engine_trigger;

        if !any_blocker && !hook_toggle && !engine {
            if short < 1 || short > max_key {
                return Err(TriggerRejection::KeyOutOfRange(short));
            }
        } else if !hook_toggle && !engine {
            if short < 0 || long < 0 {
                return Err(TriggerRejection::NegativeBlockerCount);
            }
        } else if engine && (any_blocker || hook_toggle || options.switch_cmd_num) {
            return Err(TriggerRejection::EngineConflict);
        }

        let (short_bound, long_bound) = if options.command_style {
            ((contraction_limit - 1.0).abs(), expansion_limit - 1.0)
        } else {
            (contraction_limit, expansion_limit)
        };

        let mut flags = TriggerFlags {
            blocker: options.block_triggers,
            inv_blocker: options.inv_block_triggers,
            cmd_switch: options.switch_cmd_num,
            hook_unlock: options.unlock_hookgroups,
            hook_lock: options.lock_hookgroups,
            continuous: options.continuous,
            engine,
            ..TriggerFlags::default()
        };
        let mut cmd_long = 0;
        if any_blocker {
            if options.inv_block_triggers {
                flags.inv_blocker = true;
            } else {
                flags.blocker = true;
            }
            cmd_long = long;
        } else if long != -1 || hook_toggle {
            cmd_long = long;
        } else {
            flags.cmd_blocker = true;
        }

        let mut unblock_keys = vec![short];
        if long != -1 {
            unblock_keys.push(long);
        }
        let block_keys = if options.block_keys && !options.block_triggers {
            unblock_keys.clone()
        } else {
            Vec::new()
        };

        Ok(Self {
            trigger: Trigger {
                beam: 0,
                flags,
                enabled: !options.start_off,
                switch_state: 0.0,
                boundary_time: boundary_timer,
                cmd_short: short,
                cmd_long,
            },
            short_bound,
            long_bound,
            unblock_keys,
            block_keys,
        })
    }
}

/// Side effects a trigger pass hands back to the actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerEffect {
    /// Lock or unlock every hook of a group.
    Hooks {
        /// Hook group.
        group: i64,
        /// Lock when true, unlock otherwise.
        lock: bool,
    },
    /// Drive an engine function.
    Engine {
        /// Function.
        function: EngineTriggerFunction,
        /// Value in `[0, 1]`.
        value: f64,
    },
}

/// Clamp blocker ranges so they stay inside the beam array.
pub fn clamp_blocker_ranges(triggers: &mut [Trigger], num_beams: usize) {
    for t in triggers.iter_mut() {
        if t.flags.blocker || t.flags.inv_blocker {
            let room = i64::try_from(num_beams.saturating_sub(t.beam + 1)).unwrap_or(i64::MAX);
            t.cmd_short = t.cmd_short.min(room);
            t.cmd_long = t.cmd_long.min(room);
        }
    }
}

fn key_mut(keys: &mut [CommandKey], index: i64) -> Option<&mut CommandKey> {
    usize::try_from(index).ok().and_then(|i| keys.get_mut(i))
}

fn key_blocked(keys: &[CommandKey], index: i64) -> bool {
    usize::try_from(index)
        .ok()
        .and_then(|i| keys.get(i))
        .is_some_and(|k| k.trigger_blocked)
}

fn set_range_enabled(
    triggers: &mut [Trigger],
    beams: &[Beam],
    from_beam: usize,
    count: i64,
    enabled: bool,
) {
    let count = usize::try_from(count).unwrap_or(0);
    for beam in beams.iter().skip(from_beam + 1).take(count) {
        if beam.bounded != BoundedKind::Trigger {
            continue;
        }
        if let Some(t) = beam.aux.and_then(|i| triggers.get_mut(i)) {
            t.enabled = enabled;
        }
    }
}

fn engine_effect(trigger: &Trigger, value: f64, effects: &mut Vec<TriggerEffect>) {
    if let Some(function) = EngineTriggerFunction::from_code(trigger.cmd_long) {
        effects.push(TriggerEffect::Engine { function, value });
    }
}

/// Evaluate one trigger against its beam's extension `diff`.
///
/// `hooks_allowed` gates hook toggles; they fire once per frame, not per
/// substep.
#[allow(clippy::too_many_arguments)] // One trigger touches most of the actor.
pub fn evaluate(
    index: usize,
    diff: f64,
    dt: f64,
    triggers: &mut [Trigger],
    beams: &[Beam],
    keys: &mut [CommandKey],
    hooks_allowed: bool,
    effects: &mut Vec<TriggerEffect>,
) {
    let Some(t) = triggers.get(index).cloned() else {
        return;
    };
    if !t.enabled {
        return;
    }
    let Some(beam) = beams.get(t.beam) else {
        return;
    };
    let l = beam.rest_length;
    let flags = t.flags;
    let past_long = diff > beam.long_bound * l;
    let past_short = diff < -beam.short_bound * l;

    if past_long || past_short {
        if let Some(tr) = triggers.get_mut(index) {
            tr.switch_state = (tr.switch_state - dt).max(0.0);
        }
        let switch_state = triggers.get(index).map_or(0.0, |tr| tr.switch_state);

        if flags.blocker {
            set_range_enabled(triggers, beams, t.beam, t.cmd_short, false);
        } else if flags.inv_blocker {
            set_range_enabled(triggers, beams, t.beam, t.cmd_long, true);
        } else if flags.cmd_blocker {
            if let Some(k) = key_mut(keys, t.cmd_short) {
                k.trigger_blocked = false;
            }
        } else if flags.cmd_switch {
            if switch_state == 0.0 {
                let mut switched = false;
                for (j, other) in triggers.iter_mut().enumerate() {
                    if j == index {
                        continue;
                    }
                    let same = other.cmd_short == t.cmd_short && other.cmd_long == t.cmd_long;
                    let swapped = other.cmd_short == t.cmd_long && other.cmd_long == t.cmd_short;
                    if same || swapped {
                        std::mem::swap(&mut other.cmd_short, &mut other.cmd_long);
                        switched = true;
                    }
                }
                if switched {
                    if let Some(tr) = triggers.get_mut(index) {
                        tr.switch_state = tr.boundary_time;
                    }
                }
            }
        } else if flags.hook_unlock || flags.hook_lock {
            if hooks_allowed {
                let group = if past_long { t.cmd_long } else { t.cmd_short };
                effects.push(TriggerEffect::Hooks {
                    group,
                    lock: flags.hook_lock && !flags.hook_unlock,
                });
            }
        } else if flags.engine {
            let value = if past_long || !flags.continuous {
                1.0
            } else {
                0.0
            };
            engine_effect(&t, value, effects);
        } else if past_long {
            if !key_blocked(keys, t.cmd_long) {
                let target = if flags.continuous {
                    t.cmd_short
                } else {
                    t.cmd_long
                };
                if let Some(k) = key_mut(keys, target) {
                    k.trigger_input = 1.0;
                }
            }
        } else if !key_blocked(keys, t.cmd_short) {
            if let Some(k) = key_mut(keys, t.cmd_short) {
                k.trigger_input = if flags.continuous { 0.0 } else { 1.0 };
            }
        }
        return;
    }

    if flags.continuous {
        let span = beam.long_bound - beam.short_bound;
        if span > 0.0 {
            let value = ((diff / l - beam.short_bound) / span).clamp(0.0, 1.0);
            if flags.engine {
                engine_effect(&t, value, effects);
            } else {
                for key in [t.cmd_short, t.cmd_long] {
                    if let Some(k) = key_mut(keys, key) {
                        k.trigger_input = value;
                    }
                }
            }
        }
    } else if flags.blocker {
        set_range_enabled(triggers, beams, t.beam, t.cmd_long, true);
    } else if flags.inv_blocker {
        set_range_enabled(triggers, beams, t.beam, t.cmd_short, false);
    } else if flags.cmd_switch && t.switch_state != 0.0 {
        if let Some(tr) = triggers.get_mut(index) {
            tr.switch_state = 0.0;
        }
    } else if flags.cmd_blocker && !key_blocked(keys, t.cmd_short) {
        if let Some(k) = key_mut(keys, t.cmd_short) {
            k.trigger_blocked = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::key_table;
    use approx::assert_relative_eq;
    use sim_types::NodeIdx;

    const DT: f64 = 0.0005;

    fn trigger_beam(index: usize, short: f64, long: f64) -> Beam {
        let mut b = Beam::new(NodeIdx(0), NodeIdx(1));
        b.set_length(1.0);
        b.k = 0.0;
        b.d = 0.0;
        b.bounded = BoundedKind::Trigger;
        b.short_bound = short;
        b.long_bound = long;
        b.aux = Some(index);
        b
    }

    fn plain(beam: usize, short: i64, long: i64) -> Trigger {
        Trigger {
            beam,
            flags: TriggerFlags::default(),
            enabled: true,
            switch_state: 0.0,
            boundary_time: 1.0,
            cmd_short: short,
            cmd_long: long,
        }
    }

    fn run(
        index: usize,
        diff: f64,
        triggers: &mut [Trigger],
        beams: &[Beam],
        keys: &mut [CommandKey],
    ) -> Vec<TriggerEffect> {
        let mut effects = Vec::new();
        evaluate(index, diff, DT, triggers, beams, keys, true, &mut effects);
        effects
    }

    #[test]
    fn past_long_presses_long_key() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 1, 2)];
        let mut keys = key_table();
        run(0, 0.2, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[2].trigger_input, 1.0);
        assert_relative_eq!(keys[1].trigger_input, 0.0);

        run(0, -0.2, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[1].trigger_input, 1.0);
    }

    #[test]
    fn inside_bounds_does_nothing() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 1, 2)];
        let mut keys = key_table();
        run(0, 0.05, &mut triggers, &beams, &mut keys);
        assert!(keys.iter().all(|k| k.trigger_input == 0.0));
    }

    #[test]
    fn blocked_key_is_not_pressed() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 1, 2)];
        let mut keys = key_table();
        keys[2].trigger_blocked = true;
        run(0, 0.2, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[2].trigger_input, 0.0);
    }

    #[test]
    fn continuous_trigger_scales_inside_bounds() {
        let beams = vec![trigger_beam(0, 0.0, 0.5)];
        let mut triggers = vec![plain(0, 3, 4)];
        triggers[0].flags.continuous = true;
        let mut keys = key_table();
        run(0, 0.25, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[3].trigger_input, 0.5);
        assert_relative_eq!(keys[4].trigger_input, 0.5);
    }

    #[test]
    fn blocker_disables_following_triggers() {
        let beams = vec![
            trigger_beam(0, 0.1, 0.1),
            trigger_beam(1, 0.1, 0.1),
            trigger_beam(2, 0.1, 0.1),
        ];
        let mut triggers = vec![plain(0, 1, 1), plain(1, 1, 2), plain(2, 3, 4)];
        triggers[0].flags.blocker = true;
        let mut keys = key_table();
        run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert!(!triggers[1].enabled);
        assert!(triggers[2].enabled);

        run(1, 0.5, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[2].trigger_input, 0.0);

        // Relaxed blocker re-enables `cmd_long` triggers.
        run(0, 0.0, &mut triggers, &beams, &mut keys);
        assert!(triggers[1].enabled);
    }

    #[test]
    fn command_switch_swaps_partner_keys_once() {
        let beams = vec![trigger_beam(0, 0.1, 0.1), trigger_beam(1, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 5, 6), plain(1, 5, 6)];
        triggers[0].flags.cmd_switch = true;
        let mut keys = key_table();
        run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert_eq!((triggers[1].cmd_short, triggers[1].cmd_long), (6, 5));
        assert_relative_eq!(triggers[0].switch_state, 1.0);

        // Still tripped: debounced.
        run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert_eq!((triggers[1].cmd_short, triggers[1].cmd_long), (6, 5));

        // Back inside re-arms.
        run(0, 0.0, &mut triggers, &beams, &mut keys);
        assert_eq!(triggers[0].switch_state, 0.0);
    }

    #[test]
    fn key_blocker_blocks_while_relaxed() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 7, 0)];
        triggers[0].flags.cmd_blocker = true;
        let mut keys = key_table();
        run(0, 0.0, &mut triggers, &beams, &mut keys);
        assert!(keys[7].trigger_blocked);
        run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert!(!keys[7].trigger_blocked);
    }

    #[test]
    fn hook_trigger_reports_group() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 2, 3)];
        triggers[0].flags.hook_lock = true;
        let mut keys = key_table();
        let effects = run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert_eq!(effects, vec![TriggerEffect::Hooks { group: 3, lock: true }]);

        let mut effects = Vec::new();
        evaluate(0, 0.5, DT, &mut triggers, &beams, &mut keys, false, &mut effects);
        assert!(effects.is_empty());
    }

    #[test]
    fn engine_trigger_decodes_function() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 0, EngineTriggerFunction::Brake.code())];
        triggers[0].flags.engine = true;
        let mut keys = key_table();
        let effects = run(0, -0.5, &mut triggers, &beams, &mut keys);
        assert_eq!(
            effects,
            vec![TriggerEffect::Engine {
                function: EngineTriggerFunction::Brake,
                value: 1.0
            }]
        );
    }

    #[test]
    fn disabled_trigger_is_ignored() {
        let beams = vec![trigger_beam(0, 0.1, 0.1)];
        let mut triggers = vec![plain(0, 1, 2)];
        triggers[0].enabled = false;
        let mut keys = key_table();
        run(0, 0.5, &mut triggers, &beams, &mut keys);
        assert_relative_eq!(keys[2].trigger_input, 0.0);
    }

    #[test]
    fn setup_rejects_out_of_range_key() {
        let err = TriggerSetup::from_record(
            &TriggerOptions::default(),
            0.9,
            1.1,
            1.0,
            &TriggerAction::CommandKeys {
                contract_key: 0,
                extend_key: 2,
            },
            84,
        );
        assert_eq!(err, Err(TriggerRejection::KeyOutOfRange(0)));
    }

    #[test]
    fn setup_command_style_bounds() {
        let options = TriggerOptions {
            command_style: true,
            ..TriggerOptions::default()
        };
        let setup = TriggerSetup::from_record(
            &options,
            0.8,
            1.25,
            1.0,
            &TriggerAction::CommandKeys {
                contract_key: 1,
                extend_key: 2,
            },
            84,
        );
        let Ok(setup) = setup else {
            panic!("rejected");
        };
        assert_relative_eq!(setup.short_bound, 0.2, epsilon = 1e-12);
        assert_relative_eq!(setup.long_bound, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn setup_single_key_becomes_key_blocker() {
        let setup = TriggerSetup::from_record(
            &TriggerOptions::default(),
            0.1,
            0.1,
            1.0,
            &TriggerAction::CommandKeys {
                contract_key: 4,
                extend_key: -1,
            },
            84,
        );
        assert!(matches!(setup, Ok(s) if s.trigger.flags.cmd_blocker));
    }

    #[test]
    fn blocker_range_is_clamped() {
        let mut triggers = vec![plain(1, 50, 50)];
        triggers[0].flags.blocker = true;
        clamp_blocker_ranges(&mut triggers, 4);
        assert_eq!(triggers[0].cmd_short, 2);
        assert_eq!(triggers[0].cmd_long, 2);
    }
}
