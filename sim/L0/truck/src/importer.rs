//! Sequential node importer.
//!
//! Documents number their nodes in the order they appear in the file, mixing
//! explicit nodes with nodes generated by wheels and cinecams. The runtime
//! node array instead groups nodes by origin:
//!
//! | order | origin |
//! |---|---|
//! | 1 | `nodes` |
//! | 2 | `nodes2` |
//! | 3 | `cinecam` |
//! | 4 | `wheels` |
//! | 5 | `wheels2` |
//! | 6 | `meshwheels` |
//! | 7 | `meshwheels2` |
//! | 8 | `flexbodywheels` |
//!
//! [`NodeRegistry`] records every node in file order while the parser runs;
//! [`import`] then rewrites every [`NodeRef`] in the document to its runtime
//! index.

use hashbrown::HashMap;
use sim_types::{NodeIdx, Severity};

use crate::diag::{Diagnostic, Diagnostics};
use crate::document::{Document, Record};
use crate::keyword::Keyword;
use crate::node_ref::{NodeList, NodeListItem, NodeRef};

/// Where a generated node sits on its wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDetail {
    /// Authored node or cinecam node.
    Plain,
    /// Rim node on the -Z axis side.
    RimA,
    /// Rim node on the +Z axis side.
    RimB,
    /// Tyre node on the -Z axis side.
    TyreA,
    /// Tyre node on the +Z axis side.
    TyreB,
}

/// One node in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMapEntry {
    /// Keyword that produced the node.
    pub origin: Keyword,
    /// Position within its origin group.
    pub sub_index: u32,
    /// Wheel side and layer, for generated wheel nodes.
    pub detail: NodeDetail,
}

/// File-order registry of all nodes of a document.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    all_nodes: Vec<NodeMapEntry>,
    named: HashMap<String, usize>,
    counts: [u32; 8],
}

fn group(keyword: Keyword) -> Option<usize> {
    Keyword::NODE_GENERATORS.iter().position(|k| *k == keyword)
}

impl NodeRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, origin: Keyword, detail: NodeDetail) {
        let Some(g) = group(origin) else { return };
        let sub_index = self.counts[g];
        self.counts[g] += 1;
        self.all_nodes.push(NodeMapEntry {
            origin,
            sub_index,
            detail,
        });
    }

    /// Register a `nodes` entry.
    ///
    /// # Errors
    ///
    /// Returns the expected number when `number` does not continue the
    /// sequence; the node is not registered.
    pub fn add_numbered(&mut self, number: u32) -> Result<(), usize> {
        if number as usize != self.all_nodes.len() {
            return Err(self.all_nodes.len());
        }
        self.push(Keyword::Nodes, NodeDetail::Plain);
        Ok(())
    }

    /// Register a `nodes2` entry. Returns `false` for a duplicate name.
    pub fn add_named(&mut self, name: &str) -> bool {
        if self.named.contains_key(name) {
            return false;
        }
        self.named.insert(name.to_owned(), self.all_nodes.len());
        self.push(Keyword::Nodes2, NodeDetail::Plain);
        true
    }

    /// Register one generated node.
    pub fn add_generated(&mut self, origin: Keyword, detail: NodeDetail) {
        self.push(origin, detail);
    }

    /// Register the nodes a wheel of `rays` rays generates.
    ///
    /// `wheels2` and `flexbodywheels` generate `2·rays` rim nodes first; every
    /// variant then generates `2·rays` tyre nodes. Sides alternate A, B.
    pub fn generate_wheel(&mut self, origin: Keyword, rays: u32) {
        if matches!(origin, Keyword::Wheels2 | Keyword::Flexbodywheels) {
            for i in 0..rays * 2 {
                let detail = if i % 2 == 0 { NodeDetail::RimA } else { NodeDetail::RimB };
                self.add_generated(origin, detail);
            }
        }
        for i in 0..rays * 2 {
            let detail = if i % 2 == 0 { NodeDetail::TyreA } else { NodeDetail::TyreB };
            self.add_generated(origin, detail);
        }
    }

    /// Total number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all_nodes.len()
    }

    /// True when no node was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all_nodes.is_empty()
    }

    /// Nodes in file order.
    #[must_use]
    pub fn entries(&self) -> &[NodeMapEntry] {
        &self.all_nodes
    }

    /// Number of nodes produced by `origin`.
    #[must_use]
    pub fn count(&self, origin: Keyword) -> u32 {
        group(origin).map_or(0, |g| self.counts[g])
    }

    /// First runtime index of the `origin` group.
    #[must_use]
    pub fn offset(&self, origin: Keyword) -> u32 {
        group(origin).map_or(0, |g| self.counts[..g].iter().sum())
    }

    /// Runtime index of the node at file position `pos`.
    #[must_use]
    pub fn by_position(&self, pos: usize) -> Option<NodeIdx> {
        self.all_nodes
            .get(pos)
            .map(|e| NodeIdx(self.offset(e.origin) + e.sub_index))
    }

    /// Runtime index of a named node.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<NodeIdx> {
        self.named.get(name).and_then(|&pos| self.by_position(pos))
    }

    fn highest(&self) -> i64 {
        self.all_nodes.len() as i64 - 1
    }
}

/// Importer switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Report an info line whenever a range member lands on a different index.
    pub trace_remapping: bool,
}

struct Importer<'a> {
    registry: &'a NodeRegistry,
    diags: &'a mut Diagnostics,
    options: ImportOptions,
    line: usize,
    keyword: Keyword,
}

impl Importer<'_> {
    fn report(&mut self, severity: Severity, message: String) {
        self.diags.push(Diagnostic {
            severity,
            line: self.line,
            section: Some(self.keyword),
            keyword: None,
            message,
        });
    }

    /// Name first, then number; anything else lands on node 0.
    fn resolve(&mut self, r: &mut NodeRef) {
        if let Some(idx) = self.registry.by_name(&r.text) {
            r.resolved = Some(idx);
            return;
        }
        let found = r.number.and_then(|n| self.registry.by_position(n as usize));
        match found {
            Some(idx) => r.resolved = Some(idx),
            None => {
                // Historical: unresolvable references are mapped to node 0
                // instead of rejecting the record.
                self.report(
                    Severity::Error,
                    format!(
                        "Cannot resolve {} - not a named node, and index is not defined (highest is: {}). For backwards compatibility, converting to: 0",
                        r.text,
                        self.registry.highest()
                    ),
                );
                r.resolved = Some(NodeIdx(0));
            }
        }
    }

    fn resolve_by_index(&mut self, index: u32) -> Option<NodeIdx> {
        let Some(idx) = self.registry.by_position(index as usize) else {
            self.report(
                Severity::Error,
                format!(
                    "Cannot resolve node by index [{index}], node is not defined, highest available number is: {}",
                    self.registry.highest()
                ),
            );
            return None;
        };
        if self.options.trace_remapping && idx.0 != index {
            self.report(
                Severity::Info,
                format!("Node resolved by index. Source: [{index}] Result: [{}]", idx.0),
            );
        }
        Some(idx)
    }

    /// Expand a list; `numbered_only` lists (forset) never look names up.
    fn resolve_list(&mut self, list: &mut NodeList, numbered_only: bool) {
        let mut out = Vec::new();
        for item in &mut list.items {
            match item {
                NodeListItem::Single(r) if numbered_only => {
                    let idx = r.number.and_then(|n| self.resolve_by_index(n));
                    match idx {
                        Some(idx) => {
                            r.resolved = Some(idx);
                            out.push(idx);
                        }
                        None => self.report(
                            Severity::Warning,
                            format!("Stand-alone node [{r}] resolved invalid, removing from FORSET"),
                        ),
                    }
                }
                NodeListItem::Single(r) => {
                    self.resolve(r);
                    out.push(r.idx());
                }
                NodeListItem::Range(a, b) => {
                    let (Some(start), Some(end)) = (a.number, b.number) else {
                        continue;
                    };
                    for i in start..=end {
                        if let Some(idx) = self.resolve_by_index(i) {
                            out.push(idx);
                        }
                    }
                    a.resolved = self.registry.by_position(start as usize);
                    b.resolved = self.registry.by_position(end as usize);
                }
            }
        }
        list.resolved = out;
    }
}

/// Visit every single node reference of a record.
pub fn visit_refs(record: &mut Record, f: &mut dyn FnMut(&mut NodeRef)) {
    match record {
        Record::Beam(r) => r.nodes.iter_mut().for_each(f),
        Record::Shock(r) => r.nodes.iter_mut().for_each(f),
        Record::Shock2(r) => r.nodes.iter_mut().for_each(f),
        Record::Shock3(r) => r.nodes.iter_mut().for_each(f),
        Record::Hydro(r) => r.nodes.iter_mut().for_each(f),
        Record::Command(r) => r.nodes.iter_mut().for_each(f),
        Record::Animator(r) => r.nodes.iter_mut().for_each(f),
        Record::Trigger(r) => r.nodes.iter_mut().for_each(f),
        Record::Rotator(r) => {
            r.axis.iter_mut().for_each(&mut *f);
            r.base_plate.iter_mut().for_each(&mut *f);
            r.rotating_plate.iter_mut().for_each(f);
        }
        Record::Hook(r) => f(&mut r.node),
        Record::Tie(r) => f(&mut r.root),
        Record::Rope(r) => {
            f(&mut r.root);
            f(&mut r.end);
        }
        Record::Ropable(r) => f(&mut r.node),
        Record::SlideNode(r) => f(&mut r.node),
        Record::Lockgroup(r) => r.nodes.iter_mut().for_each(f),
        Record::Wheel(r) => visit_wheel(&mut r.base, f),
        Record::Wheel2(r) => visit_wheel(&mut r.base, f),
        Record::MeshWheel(r) => visit_wheel(&mut r.base, f),
        Record::FlexBodyWheel(r) => visit_wheel(&mut r.base, f),
        Record::Cinecam(r) => r.nodes.iter_mut().for_each(f),
        Record::Camera(r) => {
            f(&mut r.center);
            f(&mut r.back);
            f(&mut r.left);
        }
        Record::CameraRail(nodes) | Record::CollisionBox(nodes) => nodes.iter_mut().for_each(f),
        Record::ExtCamera(crate::document::ExtCamera::Node(r))
        | Record::Contacter(r)
        | Record::Fixes(r)
        | Record::NodeCollision { node: r, .. } => f(r),
        Record::Axle(r) => {
            for pair in r.wheels.iter_mut().flatten() {
                pair.iter_mut().for_each(&mut *f);
            }
        }
        Record::Cab(r) => r.nodes.iter_mut().for_each(f),
        Record::Fusedrag(r) => {
            f(&mut r.front);
            f(&mut r.rear);
        }
        Record::Exhaust(r) => {
            f(&mut r.reference);
            f(&mut r.direction);
        }
        Record::Flexbody(r) => {
            f(&mut r.reference);
            f(&mut r.x_axis);
            f(&mut r.y_axis);
        }
        _ => {}
    }
}

fn visit_wheel(base: &mut crate::document::WheelBase, f: &mut dyn FnMut(&mut NodeRef)) {
    base.nodes.iter_mut().for_each(&mut *f);
    if let Some(r) = &mut base.rigidity_node {
        f(r);
    }
    f(&mut base.arm_node);
}

/// Resolve every node reference in `doc` against `registry`.
pub fn import(
    doc: &mut Document,
    registry: &NodeRegistry,
    options: ImportOptions,
    diags: &mut Diagnostics,
) {
    let mut importer = Importer {
        registry,
        diags,
        options,
        line: 0,
        keyword: Keyword::Nodes,
    };
    for entry in doc.entries_mut() {
        importer.line = entry.line;
        importer.keyword = entry.keyword;
        visit_refs(&mut entry.record, &mut |r| importer.resolve(r));
        match &mut entry.record {
            Record::Flexbody(fb) => importer.resolve_list(&mut fb.forset, true),
            Record::SlideNode(sn) => importer.resolve_list(&mut sn.rail, false),
            Record::Railgroup(rg) => importer.resolve_list(&mut rg.nodes, false),
            _ => {}
        }
    }
    tracing::debug!(nodes = registry.len(), "node references resolved");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_nodes_must_stay_in_sync() {
        let mut reg = NodeRegistry::new();
        assert!(reg.add_numbered(0).is_ok());
        assert_eq!(reg.add_numbered(2), Err(1));
        assert!(reg.add_numbered(1).is_ok());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = NodeRegistry::new();
        assert!(reg.add_named("hub"));
        assert!(!reg.add_named("hub"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn wheel_generation_order() {
        let mut reg = NodeRegistry::new();
        reg.generate_wheel(Keyword::Wheels2, 3);
        assert_eq!(reg.count(Keyword::Wheels2), 12);
        let details: Vec<_> = reg.entries().iter().map(|e| e.detail).collect();
        assert_eq!(&details[..2], &[NodeDetail::RimA, NodeDetail::RimB]);
        assert_eq!(&details[6..8], &[NodeDetail::TyreA, NodeDetail::TyreB]);

        let mut reg = NodeRegistry::new();
        reg.generate_wheel(Keyword::Meshwheels, 3);
        assert_eq!(reg.count(Keyword::Meshwheels), 6);
        assert!(reg.entries().iter().all(|e| matches!(e.detail, NodeDetail::TyreA | NodeDetail::TyreB)));
    }

    #[test]
    fn runtime_indices_group_by_origin() {
        // File order: node 0, wheel (2 nodes), node 3, named "tip".
        let mut reg = NodeRegistry::new();
        assert!(reg.add_numbered(0).is_ok());
        reg.generate_wheel(Keyword::Wheels, 1);
        assert!(reg.add_numbered(3).is_ok());
        assert!(reg.add_named("tip"));

        assert_eq!(reg.by_position(0), Some(NodeIdx(0)));
        assert_eq!(reg.by_position(3), Some(NodeIdx(1)));
        assert_eq!(reg.by_name("tip"), Some(NodeIdx(2)));
        assert_eq!(reg.by_position(1), Some(NodeIdx(3)));
        assert_eq!(reg.by_position(2), Some(NodeIdx(4)));
        assert_eq!(reg.offset(Keyword::Wheels), 3);
        assert_eq!(reg.by_position(5), None);
    }
}
