use crate::error::{FetchError, FetchErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Lifecycle of a URL inside one crawl. `Fetched` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Queued,
    Fetching,
    Fetched,
    Failed,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Fetched | NodeState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlNode {
    pub url: String,
    pub depth: usize,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub fetched: bool,
    pub state: NodeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchErrorKind>,
}

impl CrawlNode {
    fn queued(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            status_code: None,
            title: None,
            fetched: false,
            state: NodeState::Queued,
            error: None,
        }
    }

    pub fn is_visited(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlEdge {
    pub from_url: String,
    pub to_url: String,
}

/// Nodes keyed by normalized URL plus the directed link list.
///
/// A node exists from the moment its URL is first discovered. Nodes that were
/// referenced but never visited stay in `Queued` with `fetched = false`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlGraph {
    start_url: String,
    nodes: Vec<CrawlNode>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    edges: Vec<CrawlEdge>,
    visit_order: Vec<usize>,
}

impl CrawlGraph {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Default::default()
        }
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// Register `url` at `depth` unless it is already known.
    /// Returns `true` only for the first discovery.
    pub fn discover(&mut self, url: &str, depth: usize) -> bool {
        if self.index.contains_key(url) {
            return false;
        }
        self.index.insert(url.to_string(), self.nodes.len());
        self.nodes.push(CrawlNode::queued(url.to_string(), depth));
        true
    }

    pub fn mark_fetching(&mut self, url: &str) {
        if let Some(node) = self.node_mut(url)
            && node.state == NodeState::Queued
        {
            node.state = NodeState::Fetching;
        }
    }

    pub fn record_fetched(&mut self, url: &str, status_code: u16, title: Option<String>) {
        self.finish(url, |node| {
            node.status_code = Some(status_code);
            node.title = title;
            node.fetched = true;
            node.state = NodeState::Fetched;
        });
    }

    pub fn record_failed(&mut self, url: &str, error: &FetchError) {
        self.finish(url, |node| {
            node.status_code = error.status_code();
            node.fetched = false;
            node.state = NodeState::Failed;
            node.error = Some(error.kind());
        });
    }

    fn finish(&mut self, url: &str, apply: impl FnOnce(&mut CrawlNode)) {
        let Some(&idx) = self.index.get(url) else {
            return;
        };
        let node = &mut self.nodes[idx];
        if node.state.is_terminal() {
            return;
        }
        apply(node);
        self.visit_order.push(idx);
    }

    /// Edges may only leave fetched nodes.
    pub fn add_edge(&mut self, from_url: &str, to_url: &str) -> bool {
        if !self.node(from_url).is_some_and(|n| n.fetched) {
            return false;
        }
        self.edges.push(CrawlEdge {
            from_url: from_url.to_string(),
            to_url: to_url.to_string(),
        });
        true
    }

    pub fn node(&self, url: &str) -> Option<&CrawlNode> {
        self.index.get(url).map(|&idx| &self.nodes[idx])
    }

    fn node_mut(&mut self, url: &str) -> Option<&mut CrawlNode> {
        self.index.get(url).map(|&idx| &mut self.nodes[idx])
    }

    /// Every node, visited or not, in discovery order.
    pub fn nodes(&self) -> &[CrawlNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[CrawlEdge] {
        &self.edges
    }

    /// Visited nodes (fetched or failed) in the order they were visited.
    pub fn visited_nodes(&self) -> impl Iterator<Item = &CrawlNode> {
        self.visit_order.iter().map(|&idx| &self.nodes[idx])
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.node(url).is_some_and(CrawlNode::is_visited)
    }

    pub fn pages_visited(&self) -> usize {
        self.visit_order.len()
    }

    pub fn successful_pages(&self) -> usize {
        self.visited_nodes().filter(|n| n.fetched).count()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages_visited() - self.successful_pages()
    }

    /// Visited nodes grouped by depth; each group keeps visit order.
    pub fn nodes_by_depth(&self) -> BTreeMap<usize, Vec<&CrawlNode>> {
        let mut by_depth: BTreeMap<usize, Vec<&CrawlNode>> = BTreeMap::new();
        for node in self.visited_nodes() {
            by_depth.entry(node.depth).or_default().push(node);
        }
        by_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_only_first_time() {
        let mut graph = CrawlGraph::new("https://example.com/");
        assert!(graph.discover("https://example.com/", 0));
        assert!(!graph.discover("https://example.com/", 3));
        assert_eq!(graph.node("https://example.com/").unwrap().depth, 0);
        assert_eq!(graph.nodes().len(), 1);
    }

    #[test]
    fn test_node_lifecycle() {
        let mut graph = CrawlGraph::new("https://example.com/");
        graph.discover("https://example.com/", 0);
        assert_eq!(graph.node("https://example.com/").unwrap().state, NodeState::Queued);

        graph.mark_fetching("https://example.com/");
        assert_eq!(graph.node("https://example.com/").unwrap().state, NodeState::Fetching);

        graph.record_fetched("https://example.com/", 200, Some("Home".into()));
        let node = graph.node("https://example.com/").unwrap();
        assert_eq!(node.state, NodeState::Fetched);
        assert!(node.fetched);
        assert_eq!(node.status_code, Some(200));

        // Terminal states are final
        graph.record_failed("https://example.com/", &FetchError::Timeout);
        let node = graph.node("https://example.com/").unwrap();
        assert_eq!(node.state, NodeState::Fetched);
        assert_eq!(graph.pages_visited(), 1);
    }

    #[test]
    fn test_failed_node_keeps_http_status() {
        let mut graph = CrawlGraph::new("https://example.com/");
        graph.discover("https://example.com/gone", 1);
        graph.record_failed("https://example.com/gone", &FetchError::HttpStatus(410));

        let node = graph.node("https://example.com/gone").unwrap();
        assert_eq!(node.state, NodeState::Failed);
        assert_eq!(node.status_code, Some(410));
        assert_eq!(node.error, Some(FetchErrorKind::HttpError));
        assert!(!node.fetched);
        assert_eq!(graph.successful_pages(), 0);
        assert_eq!(graph.failed_pages(), 1);
    }

    #[test]
    fn test_edges_only_from_fetched_nodes() {
        let mut graph = CrawlGraph::new("https://example.com/");
        graph.discover("https://example.com/", 0);
        assert!(!graph.add_edge("https://example.com/", "https://example.com/a"));

        graph.record_fetched("https://example.com/", 200, None);
        assert!(graph.add_edge("https://example.com/", "https://example.com/a"));
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_nodes_by_depth_groups_in_visit_order() {
        let mut graph = CrawlGraph::new("https://example.com/");
        for (url, depth) in [
            ("https://example.com/", 0),
            ("https://example.com/b", 1),
            ("https://example.com/a", 1),
            ("https://example.com/unvisited", 2),
        ] {
            graph.discover(url, depth);
        }
        graph.record_fetched("https://example.com/", 200, None);
        graph.record_fetched("https://example.com/b", 200, None);
        graph.record_failed("https://example.com/a", &FetchError::Timeout);

        let by_depth = graph.nodes_by_depth();
        assert_eq!(by_depth.len(), 2);
        let depth_one: Vec<&str> = by_depth[&1].iter().map(|n| n.url.as_str()).collect();
        assert_eq!(depth_one, vec!["https://example.com/b", "https://example.com/a"]);
        assert!(!graph.is_visited("https://example.com/unvisited"));
    }
}
