//! Document serializer.
//!
//! [`write`] renders a [`Document`] back into the line format accepted by
//! [`crate::parse`]. Section keywords are emitted whenever the keyword of
//! the next entry changes, preset directives whenever an entry was read under
//! different preset values than its predecessor. Node references are written as
//! they were read, so a parse of the output yields the same records.
//!
//! Free-text fields are single tokens in the format: spaces in command and
//! rotator descriptions are written as `_`, empty ones as `_` too.

use std::fmt::Display;

use crate::document::{
    AeroSource, Animator, BeamDefaults, Command, DetacherGroup, Document, Engoption,
    Entry, ExtCamera, Hook, Hydro, Inertia, InertiaDefaults, Module, Node, NodeDefaults, NodeId,
    PresetRefs, PresetTables, Record, Rotator, SkeletonSettings, SlideNode, SlipControl, Trigger,
    TriggerAction, WheelBase, WheelSide,
};
use crate::keyword::{Keyword, KeywordKind};
use crate::node_ref::NodeRef;

/// Render `doc` as actor document text.
#[must_use]
pub fn write(doc: &Document) -> String {
    let mut w = Writer::default();
    w.line(&doc.name);
    if let Some(guid) = &doc.guid {
        w.line(format!("guid {guid}"));
    }
    for (i, name) in doc.sectionconfigs.iter().enumerate() {
        w.line(format!("sectionconfig {i} {name}"));
    }
    for module in &doc.modules {
        w.module(module);
    }
    w.line("end");
    w.out
}

#[derive(Default)]
struct Writer {
    out: String,
    section: Option<Keyword>,
    current: Presets,
}

/// Preset values the parser of the output will have in force.
#[derive(Default)]
struct Presets {
    beam: BeamDefaults,
    node: NodeDefaults,
    inertia: InertiaDefaults,
    minimass: Option<f64>,
    detacher: DetacherGroup,
    collision_range: Option<f64>,
    managed_mat_double_sided: bool,
    skeleton: SkeletonSettings,
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn token(text: &str) -> String {
    if text.is_empty() {
        "_".to_owned()
    } else {
        text.replace(char::is_whitespace, "_")
    }
}

fn refs(nodes: &[NodeRef]) -> String {
    join(nodes)
}

fn flag(on: bool) -> u8 {
    u8::from(on)
}

fn function_name(f: &str) -> &str {
    if f.is_empty() {
        "constant"
    } else {
        f
    }
}

fn inertia(i: &Inertia) -> String {
    format!(
        "{}, {}, {}, {}",
        i.start_delay,
        i.stop_delay,
        function_name(&i.start_function),
        function_name(&i.stop_function)
    )
}

impl Writer {
    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn module(&mut self, module: &Module) {
        let saved_section = self.section;
        if module.defined_explicitly {
            self.line(format!("section -1 {}", module.sectionconfigs.join(" ")));
            self.section = None;
        }
        for entry in &module.entries {
            self.presets(&module.presets, &entry.presets);
            self.entry(entry);
        }
        if module.defined_explicitly {
            self.line("end_section");
            self.section = saved_section;
        }
    }

    /// Emit the directives that bring the preset state to what `want` resolves to.
    ///
    /// The advanced-deformation and lockgroup-nolock switches are flag
    /// entries of their own and are not compared here.
    fn presets(&mut self, tables: &PresetTables, want: &PresetRefs) {
        let mut beam = tables.beam_defaults(want);
        beam.advanced_deformation = self.current.beam.advanced_deformation;
        if beam != self.current.beam {
            let mut text = format!(
                "set_beam_defaults {}, {}, {}, {}, {}, {}",
                beam.spring, beam.damp, beam.deform, beam.break_force, beam.diameter, beam.material
            );
            if let Some(coef) = beam.plastic_coef {
                text.push_str(&format!(", {coef}"));
            }
            self.line(text);
            if beam.scale != self.current.beam.scale {
                let s = beam.scale;
                self.line(format!(
                    "set_beam_defaults_scale {}, {}, {}, {}",
                    s.spring, s.damp, s.deform, s.break_force
                ));
            }
            self.current.beam = beam;
        }
        let advanced = tables.beam_defaults(want).advanced_deformation;
        self.current.beam.advanced_deformation |= advanced;

        let mut node = tables.node_defaults(want);
        node.lockgroup_nolock = self.current.node.lockgroup_nolock;
        if node != self.current.node {
            self.line(format!(
                "set_node_defaults {}, {}, {}, {}, {}",
                node.load_weight,
                node.friction,
                node.volume,
                node.surface,
                if node.options.is_empty() { "n" } else { &node.options }
            ));
            self.current.node = node;
        }
        self.current.node.lockgroup_nolock |= tables.node_defaults(want).lockgroup_nolock;

        let inertia = tables.inertia_defaults(want);
        if inertia != self.current.inertia {
            if inertia.is_active() {
                self.line(format!(
                    "set_inertia_defaults {}, {}, {}, {}",
                    inertia.start_delay,
                    inertia.stop_delay,
                    function_name(&inertia.start_function),
                    function_name(&inertia.stop_function)
                ));
            } else {
                self.line("set_inertia_defaults -1");
            }
            self.current.inertia = inertia;
        }

        let minimass = tables.minimass(want);
        if minimass.is_some() && minimass != self.current.minimass {
            if let Some(m) = minimass {
                self.line(format!("set_default_minimass {m}"));
            }
            self.current.minimass = minimass;
        }

        let detacher = want
            .detacher_group
            .and_then(|i| tables.detacher_group.get(i as usize))
            .copied()
            .unwrap_or_default();
        if detacher != self.current.detacher {
            if detacher.end {
                self.line("detacher_group end");
            } else {
                self.line(format!("detacher_group {}", detacher.group));
            }
            self.current.detacher = detacher;
        }

        let range = want.collision_range.map(|_| tables.collision_range(want));
        if range.is_some() && range != self.current.collision_range {
            if let Some(r) = range {
                self.line(format!("set_collision_range {r}"));
            }
            self.current.collision_range = range;
        }

        let double_sided = want
            .managed_mat
            .and_then(|i| tables.managed_mat_double_sided.get(i as usize))
            .copied()
            .unwrap_or(false);
        if double_sided != self.current.managed_mat_double_sided {
            self.line(format!("set_managedmaterials_options {}", flag(double_sided)));
            self.current.managed_mat_double_sided = double_sided;
        }

        let skeleton = want
            .skeleton
            .and_then(|i| tables.skeleton.get(i as usize))
            .copied()
            .unwrap_or_default();
        if skeleton != self.current.skeleton {
            self.line(format!(
                "set_skeleton_settings {}, {}",
                skeleton.visibility_range, skeleton.beam_thickness
            ));
            self.current.skeleton = skeleton;
        }
    }

    fn entry(&mut self, entry: &Entry) {
        let keyword = entry.keyword;
        let is_section = keyword.kind() == KeywordKind::Section;
        if is_section && self.section != Some(keyword) {
            self.line(keyword.as_str());
            self.section = Some(keyword);
        }
        let body = match &entry.record {
            Record::Flag => {
                self.line(keyword.as_str());
                return;
            }
            Record::TorqueCurve(curve) => {
                if let Some(name) = &curve.predefined {
                    self.line(name);
                }
                for (rpm, torque) in &curve.samples {
                    self.line(format!("{rpm}, {torque}"));
                }
                return;
            }
            Record::CameraRail(nodes) => {
                for n in nodes {
                    self.line(n.to_string());
                }
                return;
            }
            record => record_line(record),
        };
        if is_section {
            self.line(body);
        } else {
            self.line(format!("{} {body}", keyword.as_str()));
        }
        if let Record::Flexbody(f) = &entry.record {
            self.line(format!("forset {}", f.forset));
        }
    }
}

fn node_line(n: &Node) -> String {
    let id = match &n.id {
        NodeId::Number(num) => num.to_string(),
        NodeId::Name(name) => name.clone(),
    };
    let [x, y, z] = n.position;
    let mut text = format!("{id}, {x}, {y}, {z}");
    if !n.options.is_empty() || n.load_weight.is_some() {
        let options = if n.options.is_empty() { "n" } else { &n.options };
        text.push_str(&format!(", {options}"));
    }
    if let Some(w) = n.load_weight {
        text.push_str(&format!(", {w}"));
    }
    text
}

fn or_filler(letters: String) -> String {
    if letters.is_empty() {
        "n".to_owned()
    } else {
        letters
    }
}

fn command_line(c: &Command) -> String {
    let rates = if c.format_version == 2 {
        format!("{}, {}", c.shorten_rate, c.lengthen_rate)
    } else {
        c.shorten_rate.to_string()
    };
    let mut text = format!(
        "{}, {rates}, {}, {}, {}, {}, {}",
        refs(&c.nodes),
        c.max_contraction,
        c.max_extension,
        c.contract_key,
        c.extend_key,
        c.option_letters()
    );
    let default_tail = c.inertia == Inertia::default()
        && c.affect_engine == 1.0
        && c.needs_engine
        && c.plays_sound;
    if !default_tail || !c.description.is_empty() {
        text.push_str(&format!(", {}", token(&c.description)));
    }
    if !default_tail {
        text.push_str(&format!(
            ", {}, {}, {}, {}",
            inertia(&c.inertia),
            c.affect_engine,
            flag(c.needs_engine),
            flag(c.plays_sound)
        ));
    }
    text
}

fn hydro_line(h: &Hydro) -> String {
    let options = if h.options.is_empty() { "n" } else { &h.options };
    let mut text = format!("{}, {}, {options}", refs(&h.nodes), h.lengthening_factor);
    if h.inertia != Inertia::default() {
        text.push_str(&format!(", {}", inertia(&h.inertia)));
    }
    text
}

fn animator_line(a: &Animator) -> String {
    let mut flags: Vec<String> = a.sources.iter().map(|s| s.keyword().to_owned()).collect();
    if let Some((source, engine)) = a.aero {
        let name = match source {
            AeroSource::Throttle => "throttle",
            AeroSource::Rpm => "rpm",
            AeroSource::Torque => "aerotorq",
            AeroSource::Pitch => "aeropit",
            AeroSource::Status => "aerostatus",
        };
        flags.push(format!("{name}{}", engine + 1));
    }
    if a.visible {
        flags.push("vis".to_owned());
    }
    if a.invisible {
        flags.push("inv".to_owned());
    }
    if let Some(v) = a.short_limit {
        flags.push(format!("shortlimit: {v}"));
    }
    if let Some(v) = a.long_limit {
        flags.push(format!("longlimit: {v}"));
    }
    format!(
        "{}, {}, {}",
        refs(&a.nodes),
        a.lengthening_factor,
        flags.join(" | ")
    )
}

fn trigger_line(t: &Trigger) -> String {
    let (short, long) = match t.action {
        TriggerAction::CommandKeys {
            contract_key,
            extend_key,
        } => (contract_key, extend_key),
        TriggerAction::HookToggle {
            contract_group,
            extend_group,
        } => (contract_group, extend_group),
        TriggerAction::Engine { function, motor } => (function.code(), motor),
    };
    format!(
        "{}, {}, {}, {short}, {long}, {}, {}",
        refs(&t.nodes),
        t.contraction_limit,
        t.expansion_limit,
        or_filler(t.options.letters()),
        t.boundary_timer
    )
}

fn rotator_line(r: &Rotator) -> String {
    let mut text = format!(
        "{}, {}, {}, {}, {}, {}",
        refs(&r.axis),
        refs(&r.base_plate),
        refs(&r.rotating_plate),
        r.rate,
        r.spin_left_key,
        r.spin_right_key
    );
    if r.format_version == 2 {
        text.push_str(&format!(
            ", {}, {}, {}",
            r.force,
            r.tolerance,
            token(&r.description)
        ));
    }
    if r.inertia != Inertia::default() || r.engine_coupling != 1.0 || r.needs_engine {
        text.push_str(&format!(
            ", {}, {}, {}",
            inertia(&r.inertia),
            r.engine_coupling,
            flag(r.needs_engine)
        ));
    }
    text
}

fn hook_line(h: &Hook) -> String {
    let mut text = format!(
        "{}, hookrange {}, speedcoef {}, maxforce {}, hookgroup {}, lockgroup {}, timer {}, shortlimit {}",
        h.node, h.range, h.speed_coef, h.max_force, h.group, h.lockgroup, h.timer, h.min_range
    );
    for (on, name) in [
        (h.self_lock, "selflock"),
        (h.auto_lock, "autolock"),
        (h.no_disable, "nodisable"),
        (h.no_rope, "norope"),
        (h.visible, "visible"),
    ] {
        if on {
            text.push_str(", ");
            text.push_str(name);
        }
    }
    text
}

fn slidenode_line(s: &SlideNode) -> String {
    let mut parts = vec![s.node.to_string(), s.rail.to_string()];
    for (letter, value) in [
        ('S', s.spring_rate),
        ('B', s.break_force),
        ('T', s.tolerance),
        ('R', s.attachment_rate),
        ('D', s.max_attach_dist),
    ] {
        if let Some(v) = value {
            parts.push(format!("{letter}{v}"));
        }
    }
    if let Some(g) = s.railgroup {
        parts.push(format!("G{g}"));
    }
    for c in s.constraints.letters().chars() {
        parts.push(format!("C{c}"));
    }
    parts.join(", ")
}

fn wheel_base(b: &WheelBase) -> String {
    let rigidity = b
        .rigidity_node
        .as_ref()
        .map_or_else(|| "9999".to_owned(), ToString::to_string);
    format!(
        "{}, {}, {rigidity}, {}, {}, {}, {}",
        b.rays,
        refs(&b.nodes),
        b.braking.code(),
        b.propulsion.code(),
        b.arm_node,
        b.mass
    )
}

fn side(s: WheelSide) -> char {
    match s {
        WheelSide::Left => 'l',
        WheelSide::Right => 'r',
    }
}

fn engoption_line(o: &Engoption) -> String {
    format!(
        "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
        o.inertia,
        o.engine_type.letter(),
        o.clutch_force,
        o.shift_time,
        o.clutch_time,
        o.post_shift_time,
        o.stall_rpm,
        o.idle_rpm,
        o.max_idle_mixture,
        o.min_idle_mixture,
        o.braking_torque
    )
}

fn slip_control_line(s: &SlipControl, is_tc: bool) -> String {
    let mut modes = vec![if s.is_on { "ON" } else { "OFF" }];
    if s.no_dashboard {
        modes.push("NODASH");
    }
    if s.no_toggle {
        modes.push("NOTOGGLE");
    }
    let mode = format!("mode: {}", modes.join("&"));
    if is_tc {
        format!(
            "{}, {}, {}, {}, {mode}",
            s.regulation_force, s.threshold, s.fade_speed, s.pulse_per_sec
        )
    } else {
        format!(
            "{}, {}, {}, {mode}",
            s.regulation_force, s.threshold, s.pulse_per_sec
        )
    }
}

/// One data line, without the leading keyword for directives.
fn record_line(record: &Record) -> String {
    match record {
        Record::Node(n) => node_line(n),
        Record::Beam(b) => {
            let mut text = format!("{}, {}", refs(&b.nodes), or_filler(b.options.letters()));
            if let Some(limit) = b.extension_break_limit {
                text.push_str(&format!(", {limit}"));
            }
            text
        }
        Record::Shock(s) => format!(
            "{}, {}, {}, {}, {}, {}, {}",
            refs(&s.nodes),
            s.spring,
            s.damp,
            s.short_bound,
            s.long_bound,
            s.precompression,
            or_filler(s.options.letters())
        ),
        Record::Shock2(s) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            refs(&s.nodes),
            s.spring_in,
            s.damp_in,
            s.progress_spring_in,
            s.progress_damp_in,
            s.spring_out,
            s.damp_out,
            s.progress_spring_out,
            s.progress_damp_out,
            s.short_bound,
            s.long_bound,
            s.precompression,
            or_filler(s.options.letters())
        ),
        Record::Shock3(s) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            refs(&s.nodes),
            s.spring_in,
            s.damp_in,
            s.damp_in_slow,
            s.split_vel_in,
            s.damp_in_fast,
            s.spring_out,
            s.damp_out,
            s.damp_out_slow,
            s.split_vel_out,
            s.damp_out_fast,
            s.short_bound,
            s.long_bound,
            s.precompression,
            or_filler(s.options.letters())
        ),
        Record::Hydro(h) => hydro_line(h),
        Record::Command(c) => command_line(c),
        Record::Animator(a) => animator_line(a),
        Record::Trigger(t) => trigger_line(t),
        Record::Rotator(r) => rotator_line(r),
        Record::Hook(h) => hook_line(h),
        Record::Tie(t) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}",
            t.root,
            t.max_reach,
            t.rate,
            t.min_length,
            t.max_length,
            or_filler(t.options.letters()),
            t.max_stress,
            t.group
        ),
        Record::Rope(r) => format!(
            "{}, {}, {}",
            r.root,
            r.end,
            if r.invisible { 'i' } else { 'v' }
        ),
        Record::Ropable(r) => format!("{}, {}, {}", r.node, r.group, flag(r.multilock)),
        Record::Railgroup(r) => format!("{}, {}", r.id, r.nodes),
        Record::SlideNode(s) => slidenode_line(s),
        Record::Lockgroup(l) => format!("{}, {}", l.number, refs(&l.nodes)),
        Record::Wheel(w) => format!(
            "{}, {}, {}, {}, {}, {}, {}",
            w.radius,
            w.base.width,
            wheel_base(&w.base),
            w.spring,
            w.damp,
            w.face_material,
            w.band_material
        ),
        Record::Wheel2(w) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            w.rim_radius,
            w.tyre_radius,
            w.base.width,
            wheel_base(&w.base),
            w.rim_spring,
            w.rim_damp,
            w.tyre_spring,
            w.tyre_damp,
            w.face_material,
            w.band_material
        ),
        Record::MeshWheel(w) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}",
            w.tyre_radius,
            w.rim_radius,
            w.base.width,
            wheel_base(&w.base),
            w.spring,
            w.damp,
            side(w.side),
            w.mesh,
            w.material
        ),
        Record::FlexBodyWheel(w) => format!(
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            w.tyre_radius,
            w.rim_radius,
            w.base.width,
            wheel_base(&w.base),
            w.tyre_spring,
            w.tyre_damp,
            w.rim_spring,
            w.rim_damp,
            side(w.side),
            w.rim_mesh,
            w.tyre_mesh
        ),
        Record::WheelDetacher(d) => format!("{}, {}", d.wheel, d.group),
        Record::Cinecam(c) => {
            let [x, y, z] = c.position;
            format!(
                "{x}, {y}, {z}, {}, {}, {}, {}",
                refs(&c.nodes),
                c.spring,
                c.damp,
                c.node_mass
            )
        }
        Record::Camera(c) => format!("{}, {}, {}", c.center, c.back, c.left),
        Record::ExtCamera(mode) => match mode {
            ExtCamera::Classic => "classic".to_owned(),
            ExtCamera::Cinecam => "cinecam".to_owned(),
            ExtCamera::Node(n) => format!("node {n}"),
        },
        Record::Engine(e) => format!(
            "{}, {}, {}, {}, {}, {}, {}, -1",
            e.shift_down_rpm,
            e.shift_up_rpm,
            e.torque,
            e.global_gear_ratio,
            e.reverse_gear_ratio,
            e.neutral_gear_ratio,
            join(&e.gear_ratios)
        ),
        Record::Engoption(o) => engoption_line(o),
        Record::Engturbo(t) => format!(
            "{}, {}, {}, {}",
            t.version,
            t.inertia_factor,
            t.count,
            join(&t.params)
        ),
        Record::Brakes(b) => match b.parking_force {
            Some(p) => format!("{}, {p}", b.force),
            None => b.force.to_string(),
        },
        Record::Axle(a) => {
            let mut parts = Vec::new();
            for (slot, wheel) in a.wheels.iter().enumerate() {
                if let Some([n1, n2]) = wheel {
                    parts.push(format!("w{}({n1} {n2})", slot + 1));
                }
            }
            let modes: String = a.modes.iter().map(|m| m.letter()).collect();
            parts.push(format!("d({modes})"));
            parts.join(", ")
        }
        Record::InterAxle(i) => format!(
            "{}, {}, d({})",
            i.a1 + 1,
            i.a2 + 1,
            i.modes.iter().map(|m| m.letter()).collect::<String>()
        ),
        Record::TransferCase(t) => {
            let mut text = format!(
                "{}, {}, {}, {}",
                t.a1 + 1,
                t.a2 + 1,
                flag(t.has_2wd),
                flag(t.has_2wd_lo)
            );
            if !t.gear_ratios.is_empty() {
                text.push_str(&format!(", {}", join(&t.gear_ratios)));
            }
            text
        }
        Record::TractionControl(s) => slip_control_line(s, true),
        Record::AntiLockBrakes(s) => slip_control_line(s, false),
        Record::CruiseControl(c) => format!("{}, {}", c.min_speed, c.autobrake),
        Record::SpeedLimiter(v) => v.to_string(),
        Record::SlopeBrake(s) => format!(
            "{}, {}, {}",
            s.regulating_force, s.attach_angle, s.release_angle
        ),
        Record::Contacter(n) | Record::Fixes(n) => n.to_string(),
        Record::Minimass(m) => format!("{}, {}", m.min_mass, if m.skip_loaded { 'l' } else { 'n' }),
        Record::NodeCollision { node, radius } => format!("{node}, {radius}"),
        Record::CollisionBox(nodes) => refs(nodes),
        Record::Cab(c) => format!(
            "{}, {}",
            refs(&c.nodes),
            if c.options.is_empty() { "n" } else { &c.options }
        ),
        Record::Globals(g) => match &g.material {
            Some(m) => format!("{}, {}, {m}", g.dry_mass, g.cargo_mass),
            None => format!("{}, {}", g.dry_mass, g.cargo_mass),
        },
        Record::Fusedrag(f) => match f.approximate_width {
            Some(width) => format!("{}, {}, {width}, {}", f.front, f.rear, f.airfoil),
            None => format!(
                "{}, {}, autocalc, {}, {}",
                f.front, f.rear, f.area_coefficient, f.airfoil
            ),
        },
        Record::Exhaust(e) => match &e.particle {
            Some(p) => format!("{}, {}, 0, {p}", e.reference, e.direction),
            None => format!("{}, {}", e.reference, e.direction),
        },
        Record::Flexbody(f) => {
            let [ox, oy, oz] = f.offset;
            let [rx, ry, rz] = f.rotation;
            format!(
                "{}, {}, {}, {ox}, {oy}, {oz}, {rx}, {ry}, {rz}, {}",
                f.reference, f.x_axis, f.y_axis, f.mesh
            )
        }
        Record::Fileinfo(info) => {
            let mut text = info.unique_id.clone();
            if let Some(c) = info.category {
                text.push_str(&format!(", {c}"));
                if let Some(v) = info.version {
                    text.push_str(&format!(", {v}"));
                }
            }
            text
        }
        Record::Author(a) => format!(
            "{} {} {} {}",
            token(&a.kind),
            a.forum_id.unwrap_or(-1),
            token(&a.name),
            token(&a.email)
        ),
        Record::FileFormatVersion(v) => v.to_string(),
        Record::Raw(args) => args.join(", "),
        Record::Flag | Record::TorqueCurve(_) | Record::CameraRail(_) => String::new(),
    }
}
