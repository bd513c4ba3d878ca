//! Branchable message tree.
//!
//! Nodes are kept in insertion order and every parent must appear before its
//! children. That rule alone keeps the structure a forest: a node can never
//! become its own ancestor. The head names the tip of the branch currently
//! shown to the user; editing or regenerating a message adds a sibling and
//! moves the head, leaving the old branch in place.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::message::Message;
use crate::error::{Result, ThreadkeepError};

/// A message plus a link to its parent (`None` for a root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNode {
    pub message: Message,
    pub parent_id: Option<String>,
}

impl MessageNode {
    pub fn new(message: Message, parent_id: Option<String>) -> Self {
        Self { message, parent_id }
    }

    pub fn id(&self) -> &str {
        &self.message.id
    }
}

/// The whole history of one thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTree {
    pub nodes: Vec<MessageNode>,
    pub head_id: Option<String>,
}

/// A structural problem reported by [`MessageTree::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeViolation {
    /// Two nodes share an id.
    DuplicateId(String),
    /// A node points at a parent that only appears later.
    ForwardParent { id: String, parent_id: String },
    /// A node points at a parent that does not exist.
    MissingParent { id: String, parent_id: String },
    /// The head names a node that does not exist.
    DanglingHead(String),
}

impl fmt::Display for TreeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "duplicate message id '{id}'"),
            Self::ForwardParent { id, parent_id } => {
                write!(f, "message '{id}' references later parent '{parent_id}'")
            }
            Self::MissingParent { id, parent_id } => {
                write!(f, "message '{id}' references unknown parent '{parent_id}'")
            }
            Self::DanglingHead(id) => write!(f, "head '{id}' does not exist"),
        }
    }
}

/// Result of [`MessageTree::repair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeRepair {
    /// Ids of the nodes that were dropped.
    pub dropped: Vec<String>,
    /// True when the head had to move.
    pub head_reset: bool,
}

impl TreeRepair {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && !self.head_reset
    }
}

impl MessageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: &str) -> Option<&MessageNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Adds a node under `parent_id` and makes it the head.
    pub fn push(&mut self, message: Message, parent_id: Option<&str>) -> Result<()> {
        if self.contains(&message.id) {
            return Err(ThreadkeepError::invalid_operation(format!(
                "message '{}' already exists",
                message.id
            )));
        }
        if let Some(parent) = parent_id
            && !self.contains(parent)
        {
            return Err(ThreadkeepError::not_found("Message", parent));
        }

        self.head_id = Some(message.id.clone());
        self.nodes
            .push(MessageNode::new(message, parent_id.map(str::to_string)));
        Ok(())
    }

    /// Adds a node after the current head.
    pub fn append(&mut self, message: Message) -> Result<()> {
        let parent = self.head_id.clone();
        self.push(message, parent.as_deref())
    }

    /// Selects another branch by moving the head.
    pub fn set_head(&mut self, id: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(ThreadkeepError::not_found("Message", id));
        }
        self.head_id = Some(id.to_string());
        Ok(())
    }

    /// Path from the root down to `id`, inclusive.
    pub fn lineage(&self, id: &str) -> Result<Vec<&MessageNode>> {
        let index: HashMap<&str, &MessageNode> =
            self.nodes.iter().map(|node| (node.id(), node)).collect();

        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = index
                .get(node_id)
                .copied()
                .ok_or_else(|| ThreadkeepError::not_found("Message", node_id))?;
            if path.len() > self.nodes.len() {
                return Err(ThreadkeepError::internal(format!(
                    "cycle detected while resolving lineage of '{id}'"
                )));
            }
            path.push(node);
            current = node.parent_id.as_deref();
        }

        path.reverse();
        Ok(path)
    }

    /// Messages on the selected branch, root first. Empty without a head.
    pub fn current_branch(&self) -> Vec<&MessageNode> {
        self.head_id
            .as_deref()
            .and_then(|head| self.lineage(head).ok())
            .unwrap_or_default()
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: &str) -> Vec<&MessageNode> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// Nodes without children: the tip of every branch.
    pub fn branch_tips(&self) -> Vec<&MessageNode> {
        let parents: HashSet<&str> = self
            .nodes
            .iter()
            .filter_map(|node| node.parent_id.as_deref())
            .collect();
        self.nodes
            .iter()
            .filter(|node| !parents.contains(node.id()))
            .collect()
    }

    /// Checks ordering, uniqueness and head validity.
    pub fn validate(&self) -> Vec<TreeViolation> {
        let mut violations = Vec::new();
        let all: HashSet<&str> = self.nodes.iter().map(MessageNode::id).collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            if let Some(parent) = node.parent_id.as_deref()
                && !seen.contains(parent)
            {
                let violation = if all.contains(parent) {
                    TreeViolation::ForwardParent {
                        id: node.id().to_string(),
                        parent_id: parent.to_string(),
                    }
                } else {
                    TreeViolation::MissingParent {
                        id: node.id().to_string(),
                        parent_id: parent.to_string(),
                    }
                };
                violations.push(violation);
            }
            if !seen.insert(node.id()) {
                violations.push(TreeViolation::DuplicateId(node.id().to_string()));
            }
        }

        if let Some(head) = self.head_id.as_deref()
            && !all.contains(head)
        {
            violations.push(TreeViolation::DanglingHead(head.to_string()));
        }

        violations
    }

    /// Drops every node that breaks the ordering rule (and, transitively,
    /// its descendants), then moves a dangling head to the last kept node.
    pub fn repair(&mut self) -> TreeRepair {
        let mut report = TreeRepair::default();
        let mut kept: HashSet<String> = HashSet::new();

        self.nodes.retain(|node| {
            let parent_ok = node
                .parent_id
                .as_deref()
                .is_none_or(|parent| kept.contains(parent));
            if parent_ok && kept.insert(node.message.id.clone()) {
                true
            } else {
                report.dropped.push(node.message.id.clone());
                false
            }
        });

        let head_ok = self
            .head_id
            .as_deref()
            .is_none_or(|head| kept.contains(head));
        if !head_ok {
            self.head_id = self.nodes.last().map(|node| node.message.id.clone());
            report.head_reset = true;
        }

        report
    }
}
