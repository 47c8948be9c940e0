// Report generation for site mapper runs

use crate::site_mapper::SiteMapRun;
use serde::{Deserialize, Serialize};
use station_scanner::{CrawlGraph, CrawlNode, NodeState, SitemapRoute};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Unexposed routes listed in a text report before the rest are summarized.
pub const MAX_LISTED_ROUTES: usize = 200;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

fn banner(start_url: &str) -> String {
    let mut report = String::new();
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("SITE MAP SUMMARY\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");
    report.push_str(&format!("Start:             {}\n", start_url));
    report
}

/// Full text report for a run: crawl parameters followed by [`render`]'s body.
pub fn render_text(run: &SiteMapRun) -> String {
    let mut report = banner(run.graph.start_url());
    report.push_str(&format!("Max depth:         {}\n", run.params.max_depth));
    report.push_str(&format!("Same domain only:  {}\n", run.params.same_domain_only));
    if run.cancelled {
        report.push_str("[!] Crawl was cancelled; results are partial.\n");
    }
    report.push_str(&render_body(&run.graph, &run.unexposed_routes(), run.cap_reached));
    report
}

/// Depth-grouped page list, totals, unexposed routes and the Mermaid diagram.
///
/// Output depends only on its inputs, so rendering the same graph twice gives
/// the same text.
pub fn render(graph: &CrawlGraph, routes: &[&SitemapRoute], cap_reached: bool) -> String {
    let mut report = banner(graph.start_url());
    report.push_str(&render_body(graph, routes, cap_reached));
    report
}

fn render_body(graph: &CrawlGraph, routes: &[&SitemapRoute], cap_reached: bool) -> String {
    let mut report = String::new();

    report.push_str(&format!("Pages visited:     {}\n", graph.pages_visited()));
    report.push_str(&format!("Successful pages:  {}\n", graph.successful_pages()));
    report.push_str(&format!("Failed pages:      {}\n", graph.failed_pages()));
    report.push_str(&format!("Links recorded:    {}\n", graph.edges().len()));
    if cap_reached {
        report.push_str(&format!(
            "[!] Safety cap reached: crawl truncated after {} pages.\n",
            graph.pages_visited()
        ));
    }
    report.push('\n');

    for (depth, nodes) in graph.nodes_by_depth() {
        report.push_str(&format!("Depth {}:\n", depth));
        for node in nodes {
            report.push_str(&format!("  - {}\n", format_node_line(node)));
        }
        report.push_str(LIGHT_RULE);
        report.push('\n');
    }

    report.push_str("Potential unexposed routes (from sitemap):\n");
    if routes.is_empty() {
        report.push_str("  (none)\n");
    } else {
        for route in routes.iter().take(MAX_LISTED_ROUTES) {
            report.push_str(&format!("  - {}\n", route.url));
        }
        if routes.len() > MAX_LISTED_ROUTES {
            report.push_str(&format!(
                "  ... and {} more\n",
                routes.len() - MAX_LISTED_ROUTES
            ));
        }
    }
    report.push_str(LIGHT_RULE);
    report.push('\n');

    report.push_str("Mermaid diagram:\n");
    report.push_str("```mermaid\n");
    report.push_str(&render_mermaid(graph));
    report.push_str("```\n");

    report
}

fn format_node_line(node: &CrawlNode) -> String {
    let status = match (node.state, node.status_code, node.error) {
        (NodeState::Fetched, Some(code), _) => format!("[{}]", code),
        (NodeState::Failed, Some(code), Some(kind)) => format!("[{} {}]", code, kind),
        (NodeState::Failed, None, Some(kind)) => format!("[failed: {}]", kind),
        _ => "[?]".to_string(),
    };

    match node.title {
        Some(ref title) => format!("{} {} - {}", node.url, status, title),
        None => format!("{} {}", node.url, status),
    }
}

/// `graph TD` block: each node declared once on first appearance, then one
/// `a --> b` statement per edge.
pub fn render_mermaid(graph: &CrawlGraph) -> String {
    let mut ids = NodeIds::default();
    let mut out = String::from("graph TD\n");
    let mut declared: HashSet<&str> = HashSet::new();

    for edge in graph.edges() {
        for url in [edge.from_url.as_str(), edge.to_url.as_str()] {
            if declared.insert(url) {
                let id = ids.id_for(url);
                out.push_str(&format!("  {}[\"{}\"]\n", id, mermaid_label(url)));
            }
        }
        let from = ids.id_for(&edge.from_url);
        let to = ids.id_for(&edge.to_url);
        out.push_str(&format!("  {} --> {}\n", from, to));
    }

    if graph.edges().is_empty() {
        let start = graph.start_url();
        out.push_str(&format!(
            "  {}[\"{}\"]\n",
            ids.id_for(start),
            mermaid_label(start)
        ));
    }

    out
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_node_id(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn mermaid_label(url: &str) -> String {
    url.replace('"', "#quot;")
}

/// Hands out sanitized ids, suffixing `_2`, `_3`... when two URLs sanitize alike.
#[derive(Default)]
struct NodeIds {
    by_url: HashMap<String, String>,
    taken: HashSet<String>,
}

impl NodeIds {
    fn id_for(&mut self, url: &str) -> String {
        if let Some(id) = self.by_url.get(url) {
            return id.clone();
        }

        let base = sanitize_node_id(url);
        let mut id = base.clone();
        let mut n = 2;
        while self.taken.contains(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }

        self.taken.insert(id.clone());
        self.by_url.insert(url.to_string(), id.clone());
        id
    }
}

pub fn render_json(run: &SiteMapRun) -> Result<String, serde_json::Error> {
    let by_depth: Vec<serde_json::Value> = run
        .graph
        .nodes_by_depth()
        .into_iter()
        .map(|(depth, nodes)| serde_json::json!({ "depth": depth, "nodes": nodes }))
        .collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Station site_mapper",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "params": run.params,
            "summary": run.summary(),
            "max_pages": run.max_pages,
            "cancelled": run.cancelled,
            "pages_by_depth": by_depth,
            "edges": run.graph.edges(),
            "sitemap_routes": run.routes,
            "unexposed_routes": run.unexposed_routes(),
            "mermaid": render_mermaid(&run.graph)
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
