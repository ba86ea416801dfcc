//! Location tree stored as a flat arena keyed by ID.
//!
//! Nested `LocationNode` responses are flattened into records with an explicit
//! `parent_id`; child lists are derived from an index instead of being kept
//! as back-referencing object graphs.

use std::collections::HashMap;

use crate::api::types::{LocationNode, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
  pub id: String,
  pub name: String,
  pub kind: NodeKind,
  pub parent_id: Option<String>,
  pub description: Option<String>,
  pub item_count: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationArena {
  records: HashMap<String, TreeRecord>,
  children: HashMap<String, Vec<String>>,
  roots: Vec<String>,
}

impl LocationArena {
  pub fn from_nodes(nodes: &[LocationNode]) -> Self {
    let mut arena = Self::default();
    for node in nodes {
      arena.insert(node, None);
    }
    arena
  }

  fn insert(&mut self, node: &LocationNode, parent_id: Option<&str>) {
    // Flat listings can repeat a node that also appears nested; keep the first.
    if self.records.contains_key(&node.id) {
      return;
    }

    self.records.insert(
      node.id.clone(),
      TreeRecord {
        id: node.id.clone(),
        name: node.name.clone(),
        kind: node.kind,
        parent_id: parent_id.map(String::from),
        description: node.description.clone(),
        item_count: node.item_count,
      },
    );

    match parent_id {
      Some(parent) => self
        .children
        .entry(parent.to_string())
        .or_default()
        .push(node.id.clone()),
      None => self.roots.push(node.id.clone()),
    }

    for child in &node.children {
      self.insert(child, Some(&node.id));
    }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn get(&self, id: &str) -> Option<&TreeRecord> {
    self.records.get(id)
  }

  pub fn roots(&self) -> impl Iterator<Item = &TreeRecord> {
    self.roots.iter().filter_map(|id| self.records.get(id))
  }

  pub fn children(&self, id: &str) -> impl Iterator<Item = &TreeRecord> {
    self
      .children
      .get(id)
      .into_iter()
      .flatten()
      .filter_map(|child| self.records.get(child))
  }

  /// Only location nodes can be selected or navigated to.
  pub fn is_selectable(&self, id: &str) -> bool {
    self
      .records
      .get(id)
      .is_some_and(|r| r.kind == NodeKind::Location)
  }

  /// Path from the root down to `id`, inclusive.
  pub fn ancestors(&self, id: &str) -> Vec<&TreeRecord> {
    let mut path = Vec::new();
    let mut current = self.records.get(id);
    while let Some(record) = current {
      // Guards against a malformed response that loops back on itself.
      if path.len() > self.records.len() {
        break;
      }
      path.push(record);
      current = record
        .parent_id
        .as_deref()
        .and_then(|parent| self.records.get(parent));
    }
    path.reverse();
    path
  }

  /// Depth-first walk yielding `(depth, record)`, roots first.
  pub fn walk(&self) -> Vec<(usize, &TreeRecord)> {
    let mut out = Vec::with_capacity(self.records.len());
    let mut stack: Vec<(usize, &TreeRecord)> = self.roots().map(|r| (0, r)).collect();
    stack.reverse();

    while let Some((depth, record)) = stack.pop() {
      out.push((depth, record));
      let mut kids: Vec<_> = self.children(&record.id).map(|c| (depth + 1, c)).collect();
      kids.reverse();
      stack.extend(kids);
    }
    out
  }
}
