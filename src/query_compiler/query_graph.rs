//! Compilable unit composed of [`QueryNode`]s
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A forward
//! graph is a chain (node `i` has parent `i - 1`); a reverse graph is a tree
//! grown from one root with [`QueryGraph::add_child`]. Both compile through
//! the same depth-first walk, see [`traversal`](super::traversal).

use super::env::{CompileEnv, CompileMode, CompiledQuery};
use super::errors::CompileError;
use super::legacy;
use super::link::LinkTableConfig;
use super::param::Param;
use super::query_node::QueryNode;
use super::traversal;
use super::Query;
use crate::catalog::TableDescriptor;
use std::sync::Arc;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// Ordered chain; the link to node `i` is stored on node `i - 1`
    Forward,
    /// Tree rooted at one node; each child stores the link to its parent
    Reverse,
}

impl GraphMode {
    /// Node whose `link` describes how `node` joins `partner`
    pub(crate) fn link_holder(&self, node: NodeId, partner: NodeId) -> NodeId {
        match self {
            GraphMode::Forward => partner,
            GraphMode::Reverse => node,
        }
    }

    /// LEFT-joined nodes are wrapped in a derived table so that their own
    /// predicate cannot drop unmatched outer rows
    pub(crate) fn isolates_left_joins(&self) -> bool {
        matches!(self, GraphMode::Reverse)
    }
}

#[derive(Debug, Clone)]
pub struct QueryGraph {
    env: Arc<CompileEnv>,
    mode: GraphMode,
    nodes: Vec<QueryNode>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
    link_table: Option<LinkTableConfig>,
    link_statuses: Vec<String>,
    legacy_return_type: Option<i64>,
    last_mode: CompileMode,
}

impl QueryGraph {
    /// Empty chain; populate with [`add_item`](Self::add_item)
    pub fn forward(env: Arc<CompileEnv>) -> Self {
        Self {
            env,
            mode: GraphMode::Forward,
            nodes: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            link_table: None,
            link_statuses: Vec::new(),
            legacy_return_type: None,
            last_mode: CompileMode::default(),
        }
    }

    /// Tree rooted at `root` (id 0); grow it with [`add_child`](Self::add_child)
    pub fn reverse(env: Arc<CompileEnv>, root: QueryNode) -> Self {
        let mut graph = Self::forward(env);
        graph.mode = GraphMode::Reverse;
        graph.push(root, None);
        graph
    }

    pub fn with_link_table(mut self, link_table: LinkTableConfig) -> Self {
        self.link_table = Some(link_table);
        self
    }

    pub fn with_link_statuses(mut self, statuses: Vec<String>) -> Self {
        self.link_statuses = statuses;
        self
    }

    pub fn set_link_table(&mut self, link_table: Option<LinkTableConfig>) {
        self.link_table = link_table;
    }

    pub fn set_link_statuses(&mut self, statuses: Vec<String>) {
        self.link_statuses = statuses;
    }

    fn push(&mut self, mut node: QueryNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        node.seq = id;
        self.nodes.push(node);
        self.parents.push(parent);
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[parent].push(id);
        }
        id
    }

    /// Append to the chain. Rejected on a reverse graph.
    pub fn add_item(&mut self, node: QueryNode) -> Result<NodeId, CompileError> {
        if self.mode != GraphMode::Forward {
            return Err(CompileError::InvalidGraphMode(
                "add_item called on a reverse graph; use add_child".to_string(),
            ));
        }
        let parent = self.nodes.len().checked_sub(1);
        Ok(self.push(node, parent))
    }

    /// Attach `node` below `parent`. Rejected on a forward graph.
    pub fn add_child(&mut self, parent: NodeId, node: QueryNode) -> Result<NodeId, CompileError> {
        if self.mode != GraphMode::Reverse {
            return Err(CompileError::InvalidGraphMode(
                "add_child called on a forward graph; use add_item".to_string(),
            ));
        }
        if parent >= self.nodes.len() {
            return Err(CompileError::UnknownNode(parent));
        }
        Ok(self.push(node, Some(parent)))
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    pub fn env(&self) -> &Arc<CompileEnv> {
        &self.env
    }

    pub fn link_table(&self) -> Option<&LinkTableConfig> {
        self.link_table.as_ref()
    }

    pub fn link_statuses(&self) -> &[String] {
        &self.link_statuses
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&QueryNode, CompileError> {
        self.nodes.get(id).ok_or(CompileError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut QueryNode, CompileError> {
        self.nodes.get_mut(id).ok_or(CompileError::UnknownNode(id))
    }

    pub(crate) fn nodes(&self) -> &[QueryNode] {
        &self.nodes
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id).copied().flatten()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first pre-order from the root; chain order for forward graphs
    pub fn walk_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    // ---- legacy single-return-type API ----

    /// Pin projection to the first node of this object type unless a node
    /// is already flagged. Ignored by reverse graphs.
    pub fn set_legacy_return_type(&mut self, object_type_id: Option<i64>) {
        self.legacy_return_type = object_type_id;
    }

    pub fn legacy_return_type(&self) -> Option<i64> {
        self.legacy_return_type
    }

    /// Descriptors of the projected nodes in walk order
    pub fn return_types(&self) -> Vec<Arc<TableDescriptor>> {
        legacy::return_types(self)
    }

    /// First projected descriptor, the historical single-type view
    pub fn return_type(&self) -> Option<Arc<TableDescriptor>> {
        self.return_types().into_iter().next()
    }

    // ---- compilation ----

    /// Compile to SQL text and its bind values
    pub fn compile_query(&self, mode: CompileMode) -> Result<CompiledQuery, CompileError> {
        traversal::compile(self, mode)
    }
}

impl Query for QueryGraph {
    fn compile_ex(
        &mut self,
        force_physical: bool,
        include_geometry: bool,
    ) -> Result<String, CompileError> {
        self.last_mode = CompileMode::new(force_physical, include_geometry);
        Ok(self.compile_query(self.last_mode)?.sql)
    }

    fn param_values(&self) -> Result<Vec<Param>, CompileError> {
        Ok(self.compile_query(self.last_mode)?.params)
    }
}
