//! Keyword table of the actor document format.
//!
//! A line is classified by its first token, matched case-insensitively
//! against the closed keyword set. Keywords fall into four kinds: sections
//! (change the current section), directives (act in place), the
//! `section`/`end_section` pair, and ignored legacy keywords.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a keyword affects the parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    /// Opens a section; following data lines belong to it.
    Section,
    /// Takes effect on its own line, current section unchanged.
    Directive,
    /// `section` / `end_section`.
    Segment,
    /// Consumed without effect.
    Ignored,
}

macro_rules! keywords {
    ($( $variant:ident => $text:literal, $kind:ident; )*) => {
        /// Every keyword of the format.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum Keyword {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )*
        }

        impl Keyword {
            /// All keywords in declaration order.
            pub const ALL: &'static [Keyword] = &[$(Keyword::$variant,)*];

            /// Canonical spelling.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text,)*
                }
            }

            /// Section, directive, segment or ignored.
            #[must_use]
            pub const fn kind(self) -> KeywordKind {
                match self {
                    $(Keyword::$variant => KeywordKind::$kind,)*
                }
            }
        }
    };
}

keywords! {
    // Sections
    Nodes => "nodes", Section;
    Nodes2 => "nodes2", Section;
    Beams => "beams", Section;
    Shocks => "shocks", Section;
    Shocks2 => "shocks2", Section;
    Shocks3 => "shocks3", Section;
    Hydros => "hydros", Section;
    Commands => "commands", Section;
    Commands2 => "commands2", Section;
    Animators => "animators", Section;
    Triggers => "triggers", Section;
    Rotators => "rotators", Section;
    Rotators2 => "rotators2", Section;
    Hooks => "hooks", Section;
    Ties => "ties", Section;
    Ropes => "ropes", Section;
    Ropables => "ropables", Section;
    Railgroups => "railgroups", Section;
    Slidenodes => "slidenodes", Section;
    Wheels => "wheels", Section;
    Wheels2 => "wheels2", Section;
    Meshwheels => "meshwheels", Section;
    Meshwheels2 => "meshwheels2", Section;
    Flexbodywheels => "flexbodywheels", Section;
    Wheeldetachers => "wheeldetachers", Section;
    Cinecam => "cinecam", Section;
    Cameras => "cameras", Section;
    Camerarail => "camerarail", Section;
    Engine => "engine", Section;
    Engoption => "engoption", Section;
    Engturbo => "engturbo", Section;
    Torquecurve => "torquecurve", Section;
    Airbrakes => "airbrakes", Section;
    Wings => "wings", Section;
    Turbojets => "turbojets", Section;
    Turboprops => "turboprops", Section;
    Turboprops2 => "turboprops2", Section;
    Pistonprops => "pistonprops", Section;
    Screwprops => "screwprops", Section;
    Fusedrag => "fusedrag", Section;
    Brakes => "brakes", Section;
    Axles => "axles", Section;
    Interaxles => "interaxles", Section;
    TransferCase => "transfer_case", Section;
    Collisionboxes => "collisionboxes", Section;
    Contacters => "contacters", Section;
    Fixes => "fixes", Section;
    Minimass => "minimass", Section;
    Nodecollision => "nodecollision", Section;
    Exhausts => "exhausts", Section;
    Particles => "particles", Section;
    Props => "props", Section;
    Flares => "flares", Section;
    Flares2 => "flares2", Section;
    Flexbodies => "flexbodies", Section;
    Cab => "cab", Section;
    Texcoords => "texcoords", Section;
    Submesh => "submesh", Section;
    Managedmaterials => "managedmaterials", Section;
    Materialflarebindings => "materialflarebindings", Section;
    Guisettings => "guisettings", Section;
    Help => "help", Section;
    Lockgroups => "lockgroups", Section;
    Soundsources => "soundsources", Section;
    Soundsources2 => "soundsources2", Section;
    Videocamera => "videocamera", Section;
    Globals => "globals", Section;
    End => "end", Section;
    // Directives
    AddAnimation => "add_animation", Directive;
    AntiLockBrakes => "AntiLockBrakes", Directive;
    Author => "author", Directive;
    Backmesh => "backmesh", Directive;
    Cruisecontrol => "cruisecontrol", Directive;
    DetacherGroup => "detacher_group", Directive;
    Disabledefaultsounds => "disabledefaultsounds", Directive;
    EnableAdvancedDeformation => "enable_advanced_deformation", Directive;
    Extcamera => "extcamera", Directive;
    Fileformatversion => "fileformatversion", Directive;
    Fileinfo => "fileinfo", Directive;
    Forset => "forset", Directive;
    FlexbodyCameraMode => "flexbody_camera_mode", Directive;
    Forwardcommands => "forwardcommands", Directive;
    Guid => "guid", Directive;
    HideInChooser => "hide_in_chooser", Directive;
    Importcommands => "importcommands", Directive;
    LockgroupDefaultNolock => "lockgroup_default_nolock", Directive;
    PropCameraMode => "prop_camera_mode", Directive;
    Rescuer => "rescuer", Directive;
    Rollon => "rollon", Directive;
    Sectionconfig => "sectionconfig", Directive;
    SetBeamDefaults => "set_beam_defaults", Directive;
    SetBeamDefaultsScale => "set_beam_defaults_scale", Directive;
    SetCollisionRange => "set_collision_range", Directive;
    SetDefaultMinimass => "set_default_minimass", Directive;
    SetInertiaDefaults => "set_inertia_defaults", Directive;
    SetManagedmaterialsOptions => "set_managedmaterials_options", Directive;
    SetNodeDefaults => "set_node_defaults", Directive;
    SetSkeletonSettings => "set_skeleton_settings", Directive;
    SlidenodeConnectInstant => "slidenode_connect_instant", Directive;
    Slopebrake => "slopebrake", Directive;
    Speedlimiter => "speedlimiter", Directive;
    SubmeshGroundmodel => "submesh_groundmodel", Directive;
    TractionControl => "TractionControl", Directive;
    // Segments
    Section => "section", Segment;
    EndSection => "end_section", Segment;
    // Ignored
    Envmap => "envmap", Ignored;
    Hookgroup => "hookgroup", Ignored;
    Rigidifiers => "rigidifiers", Ignored;
}

impl Keyword {
    /// Look up a keyword by its spelling, ignoring ASCII case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(token))
    }

    /// Identify the keyword a line starts with, if any.
    ///
    /// The leading word is the run of ASCII alphanumerics and underscores.
    /// `TractionControl` and `AntiLockBrakes` may be glued to their first
    /// argument without a separator, so they are also matched as prefixes.
    #[must_use]
    pub fn identify(line: &str) -> Option<Self> {
        let word_len = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(line.len());
        let word = &line[..word_len];
        if word.is_empty() || word.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        if let Some(k) = Self::from_token(word) {
            return Some(k);
        }
        [Keyword::TractionControl, Keyword::AntiLockBrakes]
            .into_iter()
            .find(|k| {
                let s = k.as_str();
                word.len() > s.len() && word[..s.len()].eq_ignore_ascii_case(s)
            })
    }

    /// Keywords whose records produce nodes, in runtime array order.
    pub const NODE_GENERATORS: [Keyword; 8] = [
        Keyword::Nodes,
        Keyword::Nodes2,
        Keyword::Cinecam,
        Keyword::Wheels,
        Keyword::Wheels2,
        Keyword::Meshwheels,
        Keyword::Meshwheels2,
        Keyword::Flexbodywheels,
    ];
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_is_case_insensitive() {
        assert_eq!(Keyword::identify("NODES"), Some(Keyword::Nodes));
        assert_eq!(Keyword::identify("Set_Beam_Defaults 1 2"), Some(Keyword::SetBeamDefaults));
        assert_eq!(Keyword::identify("tractioncontrol 1,2"), Some(Keyword::TractionControl));
    }

    #[test]
    fn whole_word_match_only() {
        assert_eq!(Keyword::identify("nodes2"), Some(Keyword::Nodes2));
        assert_eq!(Keyword::identify("nodesx"), None);
        assert_eq!(Keyword::identify("commands2"), Some(Keyword::Commands2));
    }

    #[test]
    fn data_lines_are_not_keywords() {
        assert_eq!(Keyword::identify("0, 1, 2"), None);
        assert_eq!(Keyword::identify("1 0.0 0.0 0.0"), None);
        assert_eq!(Keyword::identify(""), None);
    }

    #[test]
    fn glued_directive_arguments() {
        assert_eq!(Keyword::identify("TractionControl1000"), Some(Keyword::TractionControl));
        assert_eq!(Keyword::identify("AntiLockBrakes"), Some(Keyword::AntiLockBrakes));
    }

    #[test]
    fn kinds() {
        assert_eq!(Keyword::Beams.kind(), KeywordKind::Section);
        assert_eq!(Keyword::SetNodeDefaults.kind(), KeywordKind::Directive);
        assert_eq!(Keyword::Section.kind(), KeywordKind::Segment);
        assert_eq!(Keyword::Envmap.kind(), KeywordKind::Ignored);
    }
}
