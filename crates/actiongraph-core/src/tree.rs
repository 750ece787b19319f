//! Component ownership arena. Components are stored by id; parent/child
//! links are ids, so walks are lookups and cycles show up as revisits.

use crate::types::Component;
use crate::view::DocumentView;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner<'a> {
    Page(&'a str),
    Component(&'a str),
}

impl Owner<'_> {
    fn describe(&self) -> String {
        match self {
            Owner::Page(id) => format!("page '{id}'"),
            Owner::Component(id) => format!("component '{id}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum TreeIssue {
    UnknownChild { parent: String, child: String },
    MultipleOwners { child: String, first: String, second: String },
    Cycle { id: String },
}

impl TreeIssue {
    pub fn message(&self) -> String {
        match self {
            TreeIssue::UnknownChild { parent, child } => {
                format!("{parent} references unknown component '{child}'")
            }
            TreeIssue::MultipleOwners {
                child,
                first,
                second,
            } => format!("component '{child}' is owned by both {first} and {second}"),
            TreeIssue::Cycle { id } => format!("component '{id}' is its own ancestor"),
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            TreeIssue::UnknownChild { child, .. } => child,
            TreeIssue::MultipleOwners { child, .. } => child,
            TreeIssue::Cycle { id } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentTree<'a> {
    nodes: BTreeMap<&'a str, &'a Component>,
    owners: BTreeMap<&'a str, Owner<'a>>,
    issues: Vec<TreeIssue>,
}

impl<'a> ComponentTree<'a> {
    pub fn build(view: &DocumentView<'a>) -> Self {
        let nodes: BTreeMap<&'a str, &'a Component> = view
            .components()
            .into_iter()
            .map(|c| (c.id.as_str(), c))
            .collect();
        let mut tree = Self {
            nodes,
            owners: BTreeMap::new(),
            issues: Vec::new(),
        };

        for page in view.pages() {
            for child in &page.components {
                tree.claim(Owner::Page(&page.id), child);
            }
        }
        let parents: Vec<&'a Component> = tree.nodes.values().copied().collect();
        for parent in parents {
            for child in parent.children.iter().filter_map(|c| c.as_id()) {
                tree.claim(Owner::Component(&parent.id), child);
            }
        }
        tree.detect_cycles();
        tree
    }

    fn claim(&mut self, owner: Owner<'a>, child: &'a str) {
        if !self.nodes.contains_key(child) {
            self.issues.push(TreeIssue::UnknownChild {
                parent: owner.describe(),
                child: child.to_string(),
            });
            return;
        }
        let existing = self.owners.get(child).copied();
        match existing {
            Some(first) if first != owner => self.issues.push(TreeIssue::MultipleOwners {
                child: child.to_string(),
                first: first.describe(),
                second: owner.describe(),
            }),
            Some(_) => {}
            None => {
                self.owners.insert(child, owner);
            }
        }
    }

    fn detect_cycles(&mut self) {
        let mut reported = HashSet::new();
        for &id in self.nodes.keys() {
            let mut seen = HashSet::new();
            let mut cur = id;
            while let Some(&Owner::Component(parent)) = self.owners.get(cur) {
                if !seen.insert(cur) {
                    if reported.insert(cur) {
                        self.issues.push(TreeIssue::Cycle { id: cur.to_string() });
                    }
                    break;
                }
                cur = parent;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Component> {
        self.nodes.get(id).copied()
    }

    pub fn owner(&self, id: &str) -> Option<Owner<'a>> {
        self.owners.get(id).copied()
    }

    pub fn issues(&self) -> &[TreeIssue] {
        &self.issues
    }

    /// The page a component ultimately belongs to: the owning page up the
    /// chain, else the component's own `pageId`.
    pub fn page_of(&self, id: &str) -> Option<&'a str> {
        let mut seen = HashSet::new();
        let mut cur = self.nodes.get_key_value(id).map(|(k, _)| *k)?;
        loop {
            if !seen.insert(cur) {
                break;
            }
            match self.owners.get(cur) {
                Some(&Owner::Page(page)) => return Some(page),
                Some(&Owner::Component(parent)) => cur = parent,
                None => break,
            }
        }
        self.nodes.get(cur).and_then(|c| c.page_id.as_deref())
    }
}
