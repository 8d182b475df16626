//! Parsed actor document.
//!
//! A [`Document`] is a list of [`Module`]s. Modules created outside any
//! `section`/`end_section` pair are implicit and always active; explicit
//! modules are active only when the spawn request selects one of their
//! sectionconfigs. Every module keeps its [`Entry`]s in file order together
//! with the preset snapshots they were read under.

pub mod presets;
pub mod records;

pub use presets::{
    BeamDefaults, BeamDefaultsArgs, BeamScale, DetacherGroup, InertiaDefaults, NodeDefaults,
    PresetRefs, PresetTables, SkeletonSettings,
};
pub use records::*;

use crate::keyword::Keyword;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `;grp:NAME` comment, tied to the section it was opened in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EditorGroup {
    /// Group name.
    pub name: String,
    /// Section that was current when the group was opened.
    pub section: Option<Keyword>,
}

/// One record with its provenance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// 1-based source line.
    pub line: usize,
    /// Section or directive the record belongs to.
    pub keyword: Keyword,
    /// Preset snapshots in force when the line was read.
    pub presets: PresetRefs,
    /// Index into [`Module::editor_groups`].
    pub editor_group: Option<usize>,
    /// The record itself.
    pub record: Record,
}

/// A contiguous run of records sharing one activation rule.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    /// Sectionconfigs that activate this module; empty for implicit modules.
    pub sectionconfigs: Vec<String>,
    /// Opened by `section`.
    pub defined_explicitly: bool,
    /// Editor groups opened inside this module.
    pub editor_groups: Vec<EditorGroup>,
    /// Preset snapshots referenced by [`Entry::presets`].
    pub presets: PresetTables,
    /// Records in file order.
    pub entries: Vec<Entry>,
}

impl Module {
    /// True when the module takes part in a spawn selecting `config`.
    #[must_use]
    pub fn is_active(&self, config: Option<&str>) -> bool {
        if !self.defined_explicitly {
            return true;
        }
        config.is_some_and(|c| self.sectionconfigs.iter().any(|s| s == c))
    }

    /// Entries of one keyword, in file order.
    pub fn entries_of(&self, keyword: Keyword) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(move |e| e.keyword == keyword)
    }
}

/// A whole parsed actor document.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Document {
    /// Actor name, the first data line.
    pub name: String,
    /// `guid`.
    pub guid: Option<String>,
    /// Names declared with `sectionconfig`.
    pub sectionconfigs: Vec<String>,
    /// Modules in file order.
    pub modules: Vec<Module>,
}

impl Document {
    /// Modules active for `config`.
    pub fn active_modules<'a>(&'a self, config: Option<&'a str>) -> impl Iterator<Item = &'a Module> {
        self.modules.iter().filter(move |m| m.is_active(config))
    }

    /// Every entry of every module, in file order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.modules.iter().flat_map(|m| m.entries.iter())
    }

    /// Every entry, mutably.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.modules.iter_mut().flat_map(|m| m.entries.iter_mut())
    }

    /// Number of entries of `keyword` across all modules.
    #[must_use]
    pub fn count(&self, keyword: Keyword) -> usize {
        self.entries().filter(|e| e.keyword == keyword).count()
    }

    /// True when a sectionconfig of that name was declared.
    #[must_use]
    pub fn has_sectionconfig(&self, name: &str) -> bool {
        self.sectionconfigs.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(explicit: bool, configs: &[&str]) -> Module {
        Module {
            sectionconfigs: configs.iter().map(|s| (*s).to_owned()).collect(),
            defined_explicitly: explicit,
            ..Module::default()
        }
    }

    #[test]
    fn implicit_modules_are_always_active() {
        let m = module(false, &[]);
        assert!(m.is_active(None));
        assert!(m.is_active(Some("cargo")));
    }

    #[test]
    fn explicit_modules_need_a_matching_config() {
        let m = module(true, &["cargo", "flatbed"]);
        assert!(!m.is_active(None));
        assert!(m.is_active(Some("flatbed")));
        assert!(!m.is_active(Some("tanker")));
    }

    #[test]
    fn active_modules_filter() {
        let doc = Document {
            modules: vec![module(false, &[]), module(true, &["a"]), module(false, &[])],
            ..Document::default()
        };
        assert_eq!(doc.active_modules(None).count(), 2);
        assert_eq!(doc.active_modules(Some("a")).count(), 3);
    }
}
