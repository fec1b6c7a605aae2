//! Workflow graph engine: a DAG executor with conditional branches,
//! fork/join semantics via a hit-vs-completion split, and loop detection.

use agentkit_core::error::{AgentError, AgentResult};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// String-keyed state threaded through nodes. Engine does not defensively
/// copy; nodes receive and return it by value.
#[derive(Debug, Clone, Default)]
pub struct GraphState(pub Map<String, Value>);

impl GraphState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

pub type ExecuteFn =
    Arc<dyn Fn(GraphState) -> Pin<Box<dyn Future<Output = AgentResult<GraphState>> + Send>> + Send + Sync>;
pub type ConditionFn =
    Arc<dyn Fn(&GraphState) -> Pin<Box<dyn Future<Output = AgentResult<String>> + Send>> + Send + Sync>;

/// The execute/condition split modeled as a sum type rather than two
/// optional fields: a condition node cannot accidentally be missing its
/// condition function, and an action node cannot accidentally carry one.
#[derive(Clone)]
pub enum NodeKind {
    Start,
    End,
    Condition(ConditionFn),
    Action(ExecuteFn),
}

#[derive(Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<String>,
    pub branches: HashMap<String, String>,
    pub wait_all_parents: bool,
}

impl Node {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Start,
            children: Vec::new(),
            branches: HashMap::new(),
            wait_all_parents: false,
        }
    }

    pub fn end(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::End,
            children: Vec::new(),
            branches: HashMap::new(),
            wait_all_parents: false,
        }
    }

    pub fn action(name: impl Into<String>, execute: ExecuteFn) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Action(execute),
            children: Vec::new(),
            branches: HashMap::new(),
            wait_all_parents: false,
        }
    }

    pub fn condition(name: impl Into<String>, condition: ConditionFn) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Condition(condition),
            children: Vec::new(),
            branches: HashMap::new(),
            wait_all_parents: false,
        }
    }

    pub fn with_children(mut self, children: Vec<impl Into<String>>) -> Self {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_branch(mut self, key: impl Into<String>, child: impl Into<String>) -> Self {
        self.branches.insert(key.into(), child.into());
        self
    }

    pub fn wait_all_parents(mut self) -> Self {
        self.wait_all_parents = true;
        self
    }

    /// The static set of children this node may signal, as a deduplicated
    /// union of its ordered child list and condition branch-map values.
    fn static_children(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for child in self.children.iter().chain(self.branches.values()) {
            if seen.insert(child.clone()) {
                out.push(child.clone());
            }
        }
        out
    }
}

/// A named collection of nodes plus a start node, optional end node, and a
/// max-visits bound used for loop detection.
pub struct Graph {
    nodes: HashMap<String, Node>,
    start: Option<String>,
    end: Option<String>,
    max_visits: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            start: None,
            end: None,
            max_visits: 1000,
        }
    }

    pub fn with_max_visits(mut self, max_visits: u32) -> Self {
        self.max_visits = max_visits;
        self
    }

    /// Insert `node`, rejecting empty or duplicate names and enforcing
    /// per-kind preconditions. Start/end nodes are auto-bound by kind.
    pub fn add_node(&mut self, node: Node) -> AgentResult<()> {
        if node.name.is_empty() {
            return Err(AgentError::invalid_input("node name must not be empty"));
        }
        if self.nodes.contains_key(&node.name) {
            return Err(AgentError::already_exists(format!("node '{}'", node.name)));
        }
        match &node.kind {
            NodeKind::Start => self.start = Some(node.name.clone()),
            NodeKind::End => self.end = Some(node.name.clone()),
            _ => {}
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub fn set_start_node(&mut self, name: impl Into<String>) -> AgentResult<()> {
        let name = name.into();
        if !self.nodes.contains_key(&name) {
            return Err(AgentError::not_found(format!("node '{name}'")));
        }
        self.start = Some(name);
        Ok(())
    }

    pub fn set_end_node(&mut self, name: impl Into<String>) -> AgentResult<()> {
        let name = name.into();
        if !self.nodes.contains_key(&name) {
            return Err(AgentError::not_found(format!("node '{name}'")));
        }
        self.end = Some(name);
        Ok(())
    }

    /// Count, for every node, how many distinct static parents it has
    /// (union of ordered children and condition branch-map values across
    /// all nodes in the graph).
    fn expected_parent_counts(&self) -> HashMap<String, u32> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for node in self.nodes.values() {
            for child in node.static_children() {
                *counts.entry(child).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Breadth-first scheduling with fork-join semantics. Returns the
    /// accumulated state once the end node executes.
    pub async fn execute(&self, initial_state: GraphState) -> AgentResult<GraphState> {
        let start = self
            .start
            .as_ref()
            .ok_or_else(|| AgentError::graph_topology("graph has no start node"))?;

        let expected_parents = self.expected_parent_counts();
        let mut completion_count: HashMap<String, u32> = HashMap::new();
        let mut hit_count: HashMap<String, u32> = HashMap::new();
        let mut awaiting: HashSet<String> = HashSet::new();
        let mut visits: HashMap<String, u32> = HashMap::new();

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(start.clone());
        awaiting.insert(start.clone());

        let mut state = initial_state;

        while let Some(name) = queue.pop_front() {
            awaiting.remove(&name);
            let visit = visits.entry(name.clone()).or_insert(0);
            *visit += 1;
            if *visit > self.max_visits {
                return Err(AgentError::GraphLoopDetected {
                    node: name,
                    visits: *visit,
                    max_visits: self.max_visits,
                });
            }

            let node = self
                .nodes
                .get(&name)
                .ok_or_else(|| AgentError::graph_topology(format!("unknown node '{name}'")))?;

            if matches!(node.kind, NodeKind::End) {
                return Ok(state);
            }

            let outgoing: Vec<String> = match &node.kind {
                NodeKind::Condition(condition) => {
                    let key = condition(&state).await?;
                    let child = node
                        .branches
                        .get(&key)
                        .ok_or_else(|| {
                            AgentError::graph_topology(format!(
                                "condition node '{name}' produced unknown branch key '{key}'"
                            ))
                        })?
                        .clone();
                    vec![child]
                }
                NodeKind::Action(execute) => {
                    state = execute(state).await?;
                    let mut seen = HashSet::new();
                    let children: Vec<String> = node
                        .children
                        .iter()
                        .filter(|c| seen.insert((*c).clone()))
                        .cloned()
                        .collect();
                    if children.is_empty() {
                        return Err(AgentError::graph_topology(format!(
                            "node '{name}' produced no next node"
                        )));
                    }
                    children
                }
                NodeKind::Start => node.children.clone(),
                NodeKind::End => unreachable!("end node handled above"),
            };
            let outgoing_set: HashSet<&String> = outgoing.iter().collect();

            for child in node.static_children() {
                let participated = outgoing_set.contains(&child);
                let child_node = self
                    .nodes
                    .get(&child)
                    .ok_or_else(|| AgentError::graph_topology(format!("unknown node '{child}'")))?;

                if child_node.wait_all_parents {
                    *completion_count.entry(child.clone()).or_insert(0) += 1;
                    if participated {
                        *hit_count.entry(child.clone()).or_insert(0) += 1;
                    }
                    let completed = *completion_count.get(&child).unwrap_or(&0);
                    let hits = *hit_count.get(&child).unwrap_or(&0);
                    let expected = *expected_parents.get(&child).unwrap_or(&1);
                    if completed >= expected && hits > 0 && !awaiting.contains(&child) {
                        awaiting.insert(child.clone());
                        queue.push_back(child);
                    }
                } else if participated && !awaiting.contains(&child) {
                    awaiting.insert(child.clone());
                    queue.push_back(child);
                }
            }

            completion_count.remove(&name);
            hit_count.remove(&name);
        }

        Ok(state)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
