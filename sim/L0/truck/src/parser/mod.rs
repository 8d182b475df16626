//! Line-oriented document parser.
//!
//! The parser is a small state machine over the current section, the current
//! module and the folded preset state. Each line is trimmed, classified by
//! its leading keyword and either changes state (sections, segments), acts in
//! place (directives) or is handed to the record parser of the current
//! section. Node references stay textual; [`crate::importer::import`] runs
//! once the whole input has been read.

mod args;
mod body;
mod directives;
mod drivetrain;
mod links;
mod softbody;
mod wheels;

use sim_types::Severity;

use crate::diag::{Diagnostic, Diagnostics};
use crate::document::{
    BeamDefaults, DetacherGroup, Document, EditorGroup, Entry, InertiaDefaults, Module,
    NodeDefaults, PresetRefs, PresetTables, Record, SkeletonSettings,
};
use crate::error::{ParseError, Result};
use crate::importer::{self, ImportOptions, NodeRegistry};
use crate::keyword::{Keyword, KeywordKind};
use crate::tokenizer::split_args;

/// Parser switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Treat any `;NAME` comment as an editor group, not only `;grp:NAME`.
    pub loose_editor_groups: bool,
    /// Importer switches.
    pub import: ImportOptions,
}

impl ParseOptions {
    /// Enable loose editor groups.
    #[must_use]
    pub fn with_loose_editor_groups(mut self, on: bool) -> Self {
        self.loose_editor_groups = on;
        self
    }

    /// Report index remapping of node ranges as info diagnostics.
    #[must_use]
    pub fn with_remap_trace(mut self, on: bool) -> Self {
        self.import.trace_remapping = on;
        self
    }
}

/// Result of parsing one document.
#[derive(Debug)]
pub struct ParseOutput {
    /// The document, node references resolved.
    pub document: Document,
    /// Everything the parser and importer reported.
    pub diagnostics: Diagnostics,
    /// Node numbering used to resolve references.
    pub nodes: NodeRegistry,
    fatal: Option<ParseError>,
}

impl ParseOutput {
    /// Reject the output when a fatal diagnostic was raised.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or [`ParseError::Empty`] when the input
    /// named no actor and held no records.
    pub fn into_strict(self) -> Result<Self> {
        if let Some(err) = self.fatal {
            return Err(err);
        }
        if self.document.name.is_empty() && self.document.entries().next().is_none() {
            return Err(ParseError::Empty);
        }
        Ok(self)
    }

    /// First fatal error, if any.
    #[must_use]
    pub fn fatal(&self) -> Option<&ParseError> {
        self.fatal.as_ref()
    }
}

/// Preset values in force, with the snapshot each one was pushed as.
#[derive(Debug, Clone, Default)]
struct PresetState {
    beam: BeamDefaults,
    node: NodeDefaults,
    inertia: InertiaDefaults,
    minimass: f64,
    detacher: DetacherGroup,
    managed_mat_double_sided: bool,
    collision_range: f64,
    skeleton: SkeletonSettings,
    refs: PresetRefs,
}

fn snapshot<T: Clone>(table: &mut Vec<T>, value: &T) -> Option<u32> {
    table.push(value.clone());
    u32::try_from(table.len() - 1).ok()
}

impl PresetState {
    /// Tables for a fresh module, carrying every preset already in force.
    fn seed(&mut self) -> PresetTables {
        let mut tables = PresetTables::default();
        if self.refs.beam_defaults.is_some() {
            self.refs.beam_defaults = snapshot(&mut tables.beam_defaults, &self.beam);
        }
        if self.refs.node_defaults.is_some() {
            self.refs.node_defaults = snapshot(&mut tables.node_defaults, &self.node);
        }
        if self.refs.inertia_defaults.is_some() {
            self.refs.inertia_defaults = snapshot(&mut tables.inertia_defaults, &self.inertia);
        }
        if self.refs.minimass.is_some() {
            self.refs.minimass = snapshot(&mut tables.minimass, &self.minimass);
        }
        if self.refs.detacher_group.is_some() {
            self.refs.detacher_group = snapshot(&mut tables.detacher_group, &self.detacher);
        }
        if self.refs.managed_mat.is_some() {
            self.refs.managed_mat =
                snapshot(&mut tables.managed_mat_double_sided, &self.managed_mat_double_sided);
        }
        if self.refs.collision_range.is_some() {
            self.refs.collision_range = snapshot(&mut tables.collision_range, &self.collision_range);
        }
        if self.refs.skeleton.is_some() {
            self.refs.skeleton = snapshot(&mut tables.skeleton, &self.skeleton);
        }
        tables
    }
}

pub(crate) struct Parser {
    doc: Document,
    module: Module,
    diags: Diagnostics,
    registry: NodeRegistry,
    options: ParseOptions,
    presets: PresetState,
    line: usize,
    section: Option<Keyword>,
    keyword: Option<Keyword>,
    saved_section: Option<Keyword>,
    name_seen: bool,
    /// Number of the last numbered node dropped for being out of sequence.
    dropped_node: Option<u32>,
    fatal: Option<ParseError>,
}

impl Parser {
    fn new(options: ParseOptions) -> Self {
        Self {
            doc: Document::default(),
            module: Module::default(),
            diags: Diagnostics::new(),
            registry: NodeRegistry::new(),
            options,
            presets: PresetState::default(),
            line: 0,
            section: None,
            keyword: None,
            saved_section: None,
            name_seen: false,
            dropped_node: None,
            fatal: None,
        }
    }

    pub(super) fn report(&mut self, severity: Severity, message: String) {
        self.diags.push(Diagnostic {
            severity,
            line: self.line,
            section: self.section,
            keyword: self.keyword,
            message,
        });
    }

    /// Report a fatal anomaly and remember the first one as an error.
    fn report_fatal(&mut self, error: ParseError, message: String) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
        self.report(Severity::Fatal, message);
    }

    /// Append a record under the presets currently in force.
    pub(super) fn push(&mut self, keyword: Keyword, record: Record) {
        let editor_group = self
            .module
            .editor_groups
            .last()
            .filter(|g| g.section == self.section)
            .map(|_| self.module.editor_groups.len() - 1);
        self.module.entries.push(Entry {
            line: self.line,
            keyword,
            presets: self.presets.refs,
            editor_group,
            record,
        });
    }

    /// Records of the current module, most recent last.
    pub(super) fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.module.entries
    }

    fn tables(&mut self) -> (&mut PresetTables, &mut PresetState) {
        (&mut self.module.presets, &mut self.presets)
    }

    fn open_module(&mut self, explicit: bool, sectionconfigs: Vec<String>) {
        let tables = self.presets.seed();
        let next = Module {
            sectionconfigs,
            defined_explicitly: explicit,
            presets: tables,
            ..Module::default()
        };
        let done = std::mem::replace(&mut self.module, next);
        self.doc.modules.push(done);
    }

    fn process_line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        self.keyword = None;
        if line.starts_with(';') || line.starts_with("//") {
            self.process_comment(line);
            return;
        }

        let args = split_args(line);
        let Some(keyword) = Keyword::identify(line) else {
            self.process_data(line, &args);
            return;
        };
        match keyword.kind() {
            KeywordKind::Section => {
                self.section = Some(keyword);
                if keyword == Keyword::Camerarail {
                    self.push(Keyword::Camerarail, Record::CameraRail(Vec::new()));
                }
            }
            KeywordKind::Directive => {
                self.keyword = Some(keyword);
                self.process_directive(keyword, line, &args);
            }
            KeywordKind::Segment => {
                self.keyword = Some(keyword);
                if keyword == Keyword::Section {
                    self.begin_segment(&args);
                } else {
                    self.end_segment();
                }
            }
            KeywordKind::Ignored => {}
        }
    }

    fn process_comment(&mut self, line: &str) {
        let Some(rest) = line.strip_prefix(';') else {
            return;
        };
        let name = match rest.strip_prefix("grp:") {
            Some(name) => name,
            None if self.options.loose_editor_groups => rest,
            None => return,
        };
        self.module.editor_groups.push(EditorGroup {
            name: name.to_owned(),
            section: self.section,
        });
    }

    fn begin_segment(&mut self, args: &[&str]) {
        if self.module.defined_explicitly {
            self.report(
                Severity::Error,
                "Misplaced 'section'; segments are not allowed to overlap.".to_owned(),
            );
            return;
        }
        self.saved_section = self.section.take();
        let configs = args.iter().skip(2).map(|s| (*s).to_owned()).collect();
        self.open_module(true, configs);
    }

    fn end_segment(&mut self) {
        if !self.module.defined_explicitly {
            self.report(
                Severity::Error,
                "Misplaced 'end_section', no matching 'section'".to_owned(),
            );
            return;
        }
        self.section = self.saved_section.take();
        self.open_module(false, Vec::new());
    }

    fn process_data(&mut self, line: &str, args: &[&str]) {
        let Some(section) = self.section else {
            if self.name_seen {
                self.report(
                    Severity::Warning,
                    format!("Line outside any section, renaming actor to \"{line}\""),
                );
            }
            self.doc.name = line.to_owned();
            self.name_seen = true;
            return;
        };
        match section {
            Keyword::Nodes | Keyword::Nodes2 => self.parse_node(section, args),
            Keyword::Beams => self.parse_beam(args),
            Keyword::Shocks => self.parse_shock(args),
            Keyword::Shocks2 => self.parse_shock2(args),
            Keyword::Shocks3 => self.parse_shock3(args),
            Keyword::Hydros => self.parse_hydro(args),
            Keyword::Commands | Keyword::Commands2 => self.parse_command(section, args),
            Keyword::Animators => self.parse_animator(line),
            Keyword::Triggers => self.parse_trigger(args),
            Keyword::Rotators | Keyword::Rotators2 => self.parse_rotator(section, args),
            Keyword::Hooks => self.parse_hook(args),
            Keyword::Ties => self.parse_tie(args),
            Keyword::Ropes => self.parse_rope(args),
            Keyword::Ropables => self.parse_ropable(args),
            Keyword::Railgroups => self.parse_railgroup(line),
            Keyword::Slidenodes => self.parse_slidenode(line),
            Keyword::Lockgroups => self.parse_lockgroup(args),
            Keyword::Wheels => self.parse_wheel(args),
            Keyword::Wheels2 => self.parse_wheel2(args),
            Keyword::Meshwheels | Keyword::Meshwheels2 => self.parse_mesh_wheel(section, args),
            Keyword::Flexbodywheels => self.parse_flexbody_wheel(args),
            Keyword::Wheeldetachers => self.parse_wheel_detacher(args),
            Keyword::Cinecam => self.parse_cinecam(args),
            Keyword::Cameras => self.parse_camera(args),
            Keyword::Camerarail => self.parse_camera_rail(args),
            Keyword::Engine => self.parse_engine(args),
            Keyword::Engoption => self.parse_engoption(args),
            Keyword::Engturbo => self.parse_engturbo(args),
            Keyword::Torquecurve => self.parse_torque_curve(line),
            Keyword::Brakes => self.parse_brakes(args),
            Keyword::Axles => self.parse_axle(line),
            Keyword::Interaxles => self.parse_interaxle(line),
            Keyword::TransferCase => self.parse_transfer_case(args),
            Keyword::Contacters => self.parse_contacter(args),
            Keyword::Fixes => self.parse_fixes(args),
            Keyword::Minimass => self.parse_minimass(args),
            Keyword::Nodecollision => self.parse_node_collision(args),
            Keyword::Collisionboxes => self.parse_collision_box(line),
            Keyword::Cab => self.parse_cab(args),
            Keyword::Globals => self.parse_globals(args),
            Keyword::Fusedrag => self.parse_fusedrag(args),
            Keyword::Exhausts => self.parse_exhaust(args),
            Keyword::Flexbodies => self.parse_flexbody(args),
            Keyword::End => {}
            other => {
                let raw = args.iter().map(|s| (*s).to_owned()).collect();
                self.push(other, Record::Raw(raw));
            }
        }
    }

    fn finish(mut self) -> ParseOutput {
        let last = std::mem::take(&mut self.module);
        self.doc.modules.push(last);
        importer::import(
            &mut self.doc,
            &self.registry,
            self.options.import,
            &mut self.diags,
        );
        tracing::debug!(
            name = %self.doc.name,
            modules = self.doc.modules.len(),
            nodes = self.registry.len(),
            diagnostics = self.diags.len(),
            "actor document parsed"
        );
        ParseOutput {
            document: self.doc,
            diagnostics: self.diags,
            nodes: self.registry,
            fatal: self.fatal,
        }
    }
}

/// Parse a whole document and resolve its node references.
///
/// Never fails: anomalies, fatal ones included, are returned as
/// diagnostics. Use [`ParseOutput::into_strict`] to reject fatal input.
#[must_use]
pub fn parse(text: &str, options: ParseOptions) -> ParseOutput {
    let mut parser = Parser::new(options);
    for (i, raw) in text.lines().enumerate() {
        parser.line = i + 1;
        parser.process_line(raw);
    }
    parser.finish()
}

#[cfg(test)]
mod tests;
