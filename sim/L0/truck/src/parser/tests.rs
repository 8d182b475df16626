use sim_types::constants::NODE_LOADWEIGHT_DEFAULT;
use sim_types::{NodeIdx, Severity};

use super::*;
use crate::document::{CommandCenterMode, DiffType};

const CUBE: &str = "\
cube
nodes
0, 0.0, 0.0, 0.0
1, 1.0, 0.0, 0.0
2, 1.0, 1.0, 0.0
3, 0.0, 1.0, 0.0
";

fn parse_default(text: &str) -> ParseOutput {
    parse(text, ParseOptions::default())
}

fn with_cube(tail: &str) -> ParseOutput {
    parse_default(&format!("{CUBE}{tail}"))
}

fn records(out: &ParseOutput, keyword: Keyword) -> Vec<&Record> {
    out.document
        .entries()
        .filter(|e| e.keyword == keyword)
        .map(|e| &e.record)
        .collect()
}

// ---------------------------------------------------------------------------
// Nodes and references
// ---------------------------------------------------------------------------

#[test]
fn minimal_document_resolves_beams() {
    let out = with_cube("beams\n0, 1\n1, 2, i\n");
    assert_eq!(out.document.name, "cube");
    assert_eq!(out.document.count(Keyword::Nodes), 4);
    let beams = records(&out, Keyword::Beams);
    assert_eq!(beams.len(), 2);
    let Record::Beam(b) = beams[1] else {
        panic!("expected a beam")
    };
    assert_eq!(b.nodes[0].resolved, Some(NodeIdx(1)));
    assert_eq!(b.nodes[1].resolved, Some(NodeIdx(2)));
    assert!(b.options.invisible);
    assert!(out.diagnostics.is_empty());
    assert!(out.into_strict().is_ok());
}

#[test]
fn negative_node_reference_is_read_as_absolute() {
    let out = with_cube("beams\n0, -2\n");
    let Record::Beam(b) = records(&out, Keyword::Beams)[0] else {
        panic!("expected a beam")
    };
    assert_eq!(b.nodes[1].resolved, Some(NodeIdx(2)));
    assert!(out.diagnostics.contains("Invalid negative node number -2"));
    assert_eq!(out.diagnostics.count(Severity::Warning), 1);
}

#[test]
fn unresolvable_reference_falls_back_to_node_zero() {
    let out = with_cube("beams\n1, 42\n");
    let Record::Beam(b) = records(&out, Keyword::Beams)[0] else {
        panic!("expected a beam")
    };
    assert_eq!(b.nodes[1].resolved, Some(NodeIdx(0)));
    assert!(out.diagnostics.contains("Cannot resolve 42"));
    assert!(out.diagnostics.contains("highest is: 3"));
    assert_eq!(out.diagnostics.count(Severity::Error), 1);
}

#[test]
fn out_of_sync_nodes_raise_one_fatal_per_gap() {
    let out = parse_default("t\nnodes\n0,0,0,0\n1,0,0,0\n3,0,0,0\n4,0,0,0\n5,0,0,0\n");
    assert_eq!(out.diagnostics.count(Severity::Fatal), 1);
    assert_eq!(out.diagnostics.count(Severity::Warning), 2);
    assert!(out
        .diagnostics
        .contains("Lost sync in node numbers, got numbered node [3], expected [2]"));
    assert!(matches!(
        out.fatal(),
        Some(ParseError::NodeOutOfSync {
            line: 5,
            got: 3,
            expected: 2
        })
    ));
    assert_eq!(out.document.count(Keyword::Nodes), 2);
    assert!(out.into_strict().is_err());
}

#[test]
fn separate_gaps_are_reported_separately() {
    let out = parse_default("t\nnodes\n0,0,0,0\n5,0,0,0\n1,0,0,0\n9,0,0,0\n");
    assert_eq!(out.diagnostics.count(Severity::Fatal), 2);
    assert_eq!(out.document.count(Keyword::Nodes), 2);
}

#[test]
fn duplicate_named_node_is_fatal() {
    let out = parse_default("t\nnodes2\nhub, 0,0,0\nhub, 1,0,0\n");
    assert!(out.diagnostics.contains("Duplicate node name [hub]. Ignoring node."));
    assert!(matches!(
        out.fatal(),
        Some(ParseError::DuplicateNodeName { line: 4, .. })
    ));
    assert_eq!(out.document.count(Keyword::Nodes2), 1);
}

#[test]
fn named_nodes_follow_numbered_ones_at_runtime() {
    let out = parse_default("t\nnodes2\ntip, 0,0,0\nnodes\n1, 1,0,0\nbeams\ntip, 1\n");
    let Record::Beam(b) = records(&out, Keyword::Beams)[0] else {
        panic!("expected a beam")
    };
    assert_eq!(b.nodes[1].resolved, Some(NodeIdx(0)));
    assert_eq!(b.nodes[0].resolved, Some(NodeIdx(1)));
}

#[test]
fn wheel_nodes_take_file_positions_and_runtime_tail() {
    let text = format!(
        "{CUBE}wheels\n0.5, 0.3, 2, 0, 1, 9999, 1, 1, 2, 10, 50000, 100, face, band\n\
         nodes\n8, 2.0, 0.0, 0.0\nbeams\n8, 4\n"
    );
    let out = parse_default(&text);
    assert_eq!(out.nodes.len(), 9);
    assert_eq!(out.nodes.count(Keyword::Wheels), 4);
    let Record::Beam(b) = records(&out, Keyword::Beams)[0] else {
        panic!("expected a beam")
    };
    // Node 8 follows the four authored nodes; the wheel's first node
    // (file position 4) comes after every authored node.
    assert_eq!(b.nodes[0].resolved, Some(NodeIdx(4)));
    assert_eq!(b.nodes[1].resolved, Some(NodeIdx(5)));
    let Record::Wheel(w) = records(&out, Keyword::Wheels)[0] else {
        panic!("expected a wheel")
    };
    assert!(w.base.rigidity_node.is_none());
    assert_eq!(w.base.rays, 2);
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[test]
fn empty_input_is_rejected_in_strict_mode() {
    let out = parse_default("\n   \n; just a comment\n");
    assert!(matches!(out.into_strict(), Err(ParseError::Empty)));
}

#[test]
fn double_slash_comments_but_single_slash_is_data() {
    let out = parse_default("// header note\n/trailer\n");
    assert_eq!(out.document.name, "/trailer");
    assert!(!out.diagnostics.contains("renaming actor"));

    let out = with_cube("beams\n// 0, 2\n0, 1\n");
    assert_eq!(out.document.count(Keyword::Beams), 1);
}

#[test]
fn second_name_line_renames_the_actor() {
    let out = parse_default("first\nsecond\n");
    assert_eq!(out.document.name, "second");
    assert!(out.diagnostics.contains("renaming actor"));
}

#[test]
fn segments_open_explicit_modules() {
    let text = format!(
        "{CUBE}set_beam_defaults 500\nsectionconfig 0 cargo\nsection 0 cargo\nbeams\n0, 1\nend_section\n4, 0.0, 1.0, 1.0\n"
    );
    let out = parse_default(&text);
    let doc = &out.document;
    assert_eq!(doc.modules.len(), 3);
    assert!(doc.has_sectionconfig("cargo"));
    let cargo = &doc.modules[1];
    assert!(cargo.defined_explicitly);
    assert_eq!(cargo.sectionconfigs, vec!["cargo".to_owned()]);
    assert_eq!(cargo.presets.beam_defaults.len(), 1);
    assert_eq!(cargo.presets.beam_defaults[0].spring, 500.0);
    assert_eq!(cargo.entries[0].presets.beam_defaults, Some(0));
    // The section in force before the segment is restored after it.
    assert_eq!(doc.modules[2].entries[0].keyword, Keyword::Nodes);
    assert_eq!(doc.active_modules(None).count(), 2);
    assert_eq!(doc.active_modules(Some("cargo")).count(), 3);
}

#[test]
fn misplaced_segment_keywords_are_errors() {
    let out = parse_default("t\nend_section\nsection 0 a\nsection 0 b\n");
    assert!(out.diagnostics.contains("Misplaced 'end_section'"));
    assert!(out.diagnostics.contains("segments are not allowed to overlap"));
    assert_eq!(out.diagnostics.count(Severity::Error), 2);
}

#[test]
fn editor_groups_bind_to_their_section() {
    let out = with_cube("beams\n;grp:chassis\n0, 1\n;plain comment\n1, 2\nshocks\n");
    let module = &out.document.modules[0];
    assert_eq!(module.editor_groups.len(), 1);
    assert_eq!(module.editor_groups[0].name, "chassis");
    let beams: Vec<_> = module.entries_of(Keyword::Beams).collect();
    assert_eq!(beams[0].editor_group, Some(0));
    assert_eq!(beams[1].editor_group, Some(0));
}

#[test]
fn loose_editor_groups_accept_any_comment() {
    let text = format!("{CUBE}beams\n;frame\n0, 1\n");
    let out = parse(&text, ParseOptions::default().with_loose_editor_groups(true));
    assert_eq!(out.document.modules[0].editor_groups[0].name, "frame");
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[test]
fn beam_presets_are_snapshotted() {
    let out = with_cube("beams\n0, 1\nset_beam_defaults 1000, 10\n1, 2\nset_beam_defaults -1, 20\n2, 3\n");
    let module = &out.document.modules[0];
    let beams: Vec<_> = module.entries_of(Keyword::Beams).collect();
    assert_eq!(beams[0].presets.beam_defaults, None);
    assert_eq!(beams[1].presets.beam_defaults, Some(0));
    assert_eq!(beams[2].presets.beam_defaults, Some(1));
    assert_eq!(module.presets.beam_defaults[0].spring, 1000.0);
    assert_eq!(module.presets.beam_defaults[0].damp, 10.0);
    assert_eq!(module.presets.beam_defaults[1].damp, 20.0);
}

#[test]
fn node_defaults_options_clear_without_surface_coef() {
    let out = parse_default(
        "t\nset_node_defaults -1, 0.5, 1, 1, l\nset_node_defaults 10, 0.5, 1, 1\nset_node_defaults 10, 0.5\n",
    );
    let table = &out.document.modules[0].presets.node_defaults;
    assert_eq!(table.len(), 3);
    assert_eq!(table[0].load_weight, NODE_LOADWEIGHT_DEFAULT);
    assert_eq!(table[0].options, "l");
    assert_eq!(table[1].options, "l");
    assert_eq!(table[2].options, "");
}

#[test]
fn detacher_group_end_restores_default() {
    let out = parse_default("t\ndetacher_group 3\ndetacher_group end\n");
    let table = &out.document.modules[0].presets.detacher_group;
    assert_eq!(table[0].group, 3);
    assert!(table[1].end);
    assert_eq!(table[1].group, sim_types::constants::DEFAULT_DETACHER_GROUP);
}

// ---------------------------------------------------------------------------
// Beam variants
// ---------------------------------------------------------------------------

#[test]
fn command_centering_conflicts_keep_first_letter() {
    let out = with_cube("commands\n0, 1, 0.1, 0.5, 1.5, 1, 2, co, Boom\n");
    let Record::Command(cmd) = records(&out, Keyword::Commands)[0] else {
        panic!("expected a command")
    };
    assert_eq!(cmd.center_mode, CommandCenterMode::AutoCenter);
    assert_eq!(cmd.description, "Boom");
    assert_eq!(cmd.shorten_rate, cmd.lengthen_rate);
    assert!(out.diagnostics.contains("ignoring flag 'o'"));
}

#[test]
fn commands2_reads_separate_rates_and_tail() {
    let out = with_cube("commands2\n0, 1, 0.1, 0.2, 0.5, 1.5, 3, 4, p, Arm, 0.1, 0.2\n");
    let Record::Command(cmd) = records(&out, Keyword::Commands2)[0] else {
        panic!("expected a command")
    };
    assert_eq!(cmd.format_version, 2);
    assert_eq!(cmd.lengthen_rate, 0.2);
    assert_eq!((cmd.contract_key, cmd.extend_key), (3, 4));
    assert_eq!(cmd.center_mode, CommandCenterMode::OnePress);
    assert_eq!(cmd.inertia.start_delay, 0.1);
}

#[test]
fn shocks3_rejects_the_s_option() {
    let out = with_cube("shocks3\n0, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0.8, 1.2, 1.0, s\n");
    assert_eq!(out.document.count(Keyword::Shocks3), 1);
    assert!(out.diagnostics.contains("Invalid option: 's'"));
}

#[test]
fn triggers_with_unknown_engine_function_are_skipped() {
    let out = with_cube("triggers\n0, 1, 0.1, 0.2, 9, 1, E\n");
    assert_eq!(out.document.count(Keyword::Triggers), 0);
    assert!(out.diagnostics.contains("Invalid engine trigger function: 9"));
}

// ---------------------------------------------------------------------------
// Drivetrain
// ---------------------------------------------------------------------------

#[test]
fn engine_requires_a_forward_gear() {
    let out = parse_default("t\nengine\n1000, 2000, 500, 4, 10, 3, -1\n");
    assert_eq!(out.document.count(Keyword::Engine), 0);
    assert!(out.diagnostics.contains("Engine has no forward gear"));

    let out = parse_default("t\nengine\n1000, 2000, 500, 4, 10, 3, 8, 5, 0, -1, 7\n");
    let Record::Engine(e) = records(&out, Keyword::Engine)[0] else {
        panic!("expected an engine")
    };
    assert_eq!(e.gear_ratios, vec![8.0, 5.0, 0.0]);
    assert!(out.diagnostics.contains("has a ratio of 0"));
}

#[test]
fn engturbo_count_is_capped() {
    let out = parse_default("t\nengturbo\n2, 1, 6, 0.5\n");
    let Record::Engturbo(t) = records(&out, Keyword::Engturbo)[0] else {
        panic!("expected a turbo")
    };
    assert_eq!(t.count, 4);
    assert_eq!(t.params[0], 0.5);
    assert_eq!(t.params[1], crate::document::ENGTURBO_UNSET);
    assert!(out.diagnostics.contains("more than 4 turbos"));
}

#[test]
fn torque_curve_lines_accumulate() {
    let out = parse_default("t\ntorquecurve\n0, 0.2\n1000, 0.8\n2000, 1\n");
    let curves = records(&out, Keyword::Torquecurve);
    assert_eq!(curves.len(), 1);
    let Record::TorqueCurve(c) = curves[0] else {
        panic!("expected a curve")
    };
    assert_eq!(c.samples.len(), 3);
    assert_eq!(c.samples[1], (1000.0, 0.8));

    let out = parse_default("t\ntorquecurve\ndiesel\n1, 2, 3\n");
    let Record::TorqueCurve(c) = records(&out, Keyword::Torquecurve)[0] else {
        panic!("expected a curve")
    };
    assert_eq!(c.predefined.as_deref(), Some("diesel"));
    assert!(out.diagnostics.contains("too many arguments"));
}

#[test]
fn axles_read_wheel_pairs_and_modes() {
    let out = with_cube("axles\nw1(0 1), w2(2 3), d(ol)\naxles\nw1(0 1), bogus\n");
    let axles = records(&out, Keyword::Axles);
    assert_eq!(axles.len(), 1);
    let Record::Axle(a) = axles[0] else {
        panic!("expected an axle")
    };
    assert_eq!(a.modes, vec![DiffType::Open, DiffType::Locked]);
    let second = a.wheels[1].as_ref().map(|p| p[1].resolved);
    assert_eq!(second, Some(Some(NodeIdx(3))));
    assert!(out.diagnostics.contains("ignoring whole line"));
}

#[test]
fn interaxles_and_transfer_case_are_zero_based() {
    let out = parse_default("t\ninteraxles\n1, 2, d(v)\ntransfer_case\n1, 2, 1, 0, 1.0, 2.5\n");
    let Record::InterAxle(ia) = records(&out, Keyword::Interaxles)[0] else {
        panic!("expected an interaxle")
    };
    assert_eq!((ia.a1, ia.a2), (0, 1));
    assert_eq!(ia.modes, vec![DiffType::Viscous]);
    let Record::TransferCase(tc) = records(&out, Keyword::TransferCase)[0] else {
        panic!("expected a transfer case")
    };
    assert!(tc.has_2wd && !tc.has_2wd_lo);
    assert_eq!(tc.gear_ratios, vec![1.0, 2.5]);
}

#[test]
fn slip_control_directives() {
    let out = parse_default(
        "t\nTractionControl 1000, 0.2, 3, 10, mode: on&nodash\nAntiLockBrakes 500, 10, 5\n",
    );
    let Record::TractionControl(tc) = records(&out, Keyword::TractionControl)[0] else {
        panic!("expected traction control")
    };
    assert!(tc.is_on && tc.no_dashboard && !tc.no_toggle);
    assert_eq!(tc.pulse_per_sec, 10.0);
    let Record::AntiLockBrakes(abs) = records(&out, Keyword::AntiLockBrakes)[0] else {
        panic!("expected anti-lock brakes")
    };
    assert!(abs.is_on);
    assert_eq!(abs.threshold, 10.0);
    // The pulse rate needs a following mode token.
    assert_eq!(abs.pulse_per_sec, 0.0);

    let out = parse_default("t\nTractionControl 1000\n");
    assert!(out.diagnostics.contains("Too few arguments"));
}

#[test]
fn speed_limiter_keeps_nonpositive_values() {
    let out = parse_default("t\nspeedlimiter 0\n");
    assert_eq!(records(&out, Keyword::Speedlimiter), vec![&Record::SpeedLimiter(0.0)]);
    assert!(out.diagnostics.contains("Using it anyway"));
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

#[test]
fn fusedrag_autocalc() {
    let out = with_cube("fusedrag\n0, 1, autocalc, 1.5\n");
    let Record::Fusedrag(f) = records(&out, Keyword::Fusedrag)[0] else {
        panic!("expected fusedrag")
    };
    assert_eq!(f.approximate_width, None);
    assert_eq!(f.area_coefficient, 1.5);
    assert_eq!(f.airfoil, "NACA0009.afl");
}

#[test]
fn forset_expands_ranges_onto_last_flexbody() {
    let out = with_cube("flexbodies\n0, 1, 2, 0, 0, 0, 0, 0, 0, body.mesh\nforset 0-2, 3, 9\n");
    let Record::Flexbody(f) = records(&out, Keyword::Flexbodies)[0] else {
        panic!("expected a flexbody")
    };
    assert_eq!(
        f.forset.resolved,
        vec![NodeIdx(0), NodeIdx(1), NodeIdx(2), NodeIdx(3)]
    );
    assert!(out.diagnostics.contains("removing from FORSET"));
}

#[test]
fn minimass_options() {
    let out = parse_default("t\nminimass\n50, lx\n");
    let Record::Minimass(m) = records(&out, Keyword::Minimass)[0] else {
        panic!("expected minimass")
    };
    assert!(m.skip_loaded);
    assert!(out.diagnostics.contains("Unknown option: x"));
}
