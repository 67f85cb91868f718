use std::collections::HashMap;
use std::f64::consts::TAU;
use std::path::Path;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use tracing::{debug, info};

use crate::config::{figure_pixels, ImageFormat, GRAPH_DPI, GRAPH_FIGURE_INCHES};
use crate::error::{Result, TriageError};
use crate::fonts::register_fonts;
use crate::models::MatchRecord;

const LAYOUT_ITERATIONS: usize = 200;

/// Submitters of one assignment, joined by an edge for every match at or
/// above the threshold. Edge weight is the best match percentage scaled to
/// `0.0..=1.0`; repeated pairs keep the weight of the last match seen.
pub fn build_cluster_graph(records: &[MatchRecord], threshold: f64) -> UnGraph<String, f64> {
    let mut graph = UnGraph::new_undirected();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for record in records {
        let a = *nodes
            .entry(record.submitter_a.clone())
            .or_insert_with(|| graph.add_node(record.submitter_a.clone()));
        let b = *nodes
            .entry(record.submitter_b.clone())
            .or_insert_with(|| graph.add_node(record.submitter_b.clone()));

        let percent = record.percent_same() as f64;
        if a != b && percent >= threshold {
            graph.update_edge(a, b, percent / 100.0);
        }
    }

    graph
}

pub fn clusters(graph: &UnGraph<String, f64>) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = kosaraju_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut names: Vec<String> = component.iter().map(|ix| graph[*ix].clone()).collect();
            names.sort();
            names
        })
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    groups
}

/// Force-directed placement (Fruchterman-Reingold) starting from a circle,
/// rescaled into `[-1, 1]` on both axes. Deterministic for a given graph.
pub fn spring_layout(graph: &UnGraph<String, f64>, iterations: usize) -> Vec<(f64, f64)> {
    let n = graph.node_count();
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.0, 0.0)],
        _ => {}
    }

    let k = (1.0 / n as f64).sqrt();
    let mut positions: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = TAU * i as f64 / n as f64;
            (angle.cos(), angle.sin())
        })
        .collect();
    let mut temperature = 0.1;
    let cooling = temperature / (iterations as f64 + 1.0);

    for _ in 0..iterations {
        let mut displacement = vec![(0.0f64, 0.0f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy, dist) = offset(positions[i], positions[j]);
                let force = k * k / dist;
                displacement[i].0 += dx / dist * force;
                displacement[i].1 += dy / dist * force;
                displacement[j].0 -= dx / dist * force;
                displacement[j].1 -= dy / dist * force;
            }
        }

        for edge in graph.edge_references() {
            let (i, j) = (edge.source().index(), edge.target().index());
            let (dx, dy, dist) = offset(positions[i], positions[j]);
            let force = dist * dist / k * edge.weight().max(0.1);
            displacement[i].0 -= dx / dist * force;
            displacement[i].1 -= dy / dist * force;
            displacement[j].0 += dx / dist * force;
            displacement[j].1 += dy / dist * force;
        }

        for (position, (mx, my)) in positions.iter_mut().zip(displacement) {
            let length = (mx * mx + my * my).sqrt();
            if length > f64::EPSILON {
                let step = length.min(temperature);
                position.0 += mx / length * step;
                position.1 += my / length * step;
            }
        }
        temperature -= cooling;
    }

    rescale(positions)
}

fn offset(a: (f64, f64), b: (f64, f64)) -> (f64, f64, f64) {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx, dy, (dx * dx + dy * dy).sqrt().max(0.01))
}

fn rescale(mut positions: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let count = positions.len() as f64;
    let cx = positions.iter().map(|p| p.0).sum::<f64>() / count;
    let cy = positions.iter().map(|p| p.1).sum::<f64>() / count;
    let extent = positions
        .iter()
        .map(|p| (p.0 - cx).abs().max((p.1 - cy).abs()))
        .fold(0.0f64, f64::max);
    let extent = if extent > f64::EPSILON { extent } else { 1.0 };
    for position in &mut positions {
        position.0 = (position.0 - cx) / extent;
        position.1 = (position.1 - cy) / extent;
    }
    positions
}

pub fn draw_cluster_graph<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    graph: &UnGraph<String, f64>,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    register_fonts();
    root.fill(&WHITE)?;
    let (width, height) = root.dim_in_pixel();
    let scale = (height.min(width) as f64 / 900.0).max(0.25);
    let body = root.titled(title, ("sans-serif", 28.0 * scale))?;

    let (body_w, body_h) = body.dim_in_pixel();
    let margin = 0.08 * body_w.min(body_h) as f64;
    let to_pixel = |(x, y): (f64, f64)| -> (i32, i32) {
        (
            (margin + (x + 1.0) / 2.0 * (body_w as f64 - 2.0 * margin)) as i32,
            (margin + (y + 1.0) / 2.0 * (body_h as f64 - 2.0 * margin)) as i32,
        )
    };

    let positions: Vec<(i32, i32)> = spring_layout(graph, LAYOUT_ITERATIONS)
        .into_iter()
        .map(to_pixel)
        .collect();

    for edge in graph.edge_references() {
        let from = positions[edge.source().index()];
        let to = positions[edge.target().index()];
        let width = (1.0 + edge.weight() * 3.0 * scale).round() as u32;
        body.draw(&PathElement::new(vec![from, to], RED.stroke_width(width)))?;
    }

    let radius = (6.0 * scale).max(2.0) as i32;
    for (index, position) in positions.iter().enumerate() {
        body.draw(&Circle::new(*position, radius, BLUE.mix(0.8).filled()))?;
        body.draw(&Text::new(
            graph[NodeIndex::new(index)].clone(),
            (position.0 + radius, position.1 - 2 * radius),
            ("sans-serif", 10.0 * scale),
        ))?;
    }

    root.present()
}

pub fn render_cluster_graph(
    path: &Path,
    assignment: &str,
    graph: &UnGraph<String, f64>,
    format: ImageFormat,
) -> Result<()> {
    let size = figure_pixels(GRAPH_FIGURE_INCHES, GRAPH_DPI);
    let target = path.display().to_string();
    match format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_cluster_graph(&root, assignment, graph).map_err(|e| TriageError::render(&target, e))?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_cluster_graph(&root, assignment, graph).map_err(|e| TriageError::render(&target, e))?;
        }
    }
    debug!(
        assignment,
        vertices = graph.node_count(),
        edges = graph.edge_count(),
        "laid out cluster graph"
    );
    info!(path = %target, "wrote cluster graph");
    Ok(())
}
