//! Force-directed placement of the referral network.
//!
//! A small, deterministic velocity-Verlet simulation with link, many-body,
//! collision and centering forces. Forces act on velocities; positions are
//! integrated once per tick after velocity decay.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::Graph;

/// Simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    pub link_distance: f64,
    /// Negative values repel.
    pub charge_strength: f64,
    pub collision_radius: f64,
    pub velocity_decay: f64,
    pub alpha_min: f64,
    pub ticks: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_distance: 180.0,
            charge_strength: -800.0,
            collision_radius: 90.0,
            velocity_decay: 0.4,
            alpha_min: 0.001,
            ticks: 300,
        }
    }
}

/// Drawing area in pixels; the simulation is centered on its midpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Final position of the node with the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Node positions in graph node order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub positions: Vec<NodePosition>,
}

impl Layout {
    pub fn position(&self, id: &str) -> Option<&NodePosition> {
        self.positions.iter().find(|p| p.id == id)
    }
}

/// Assigns a position to every node of a graph.
pub trait LayoutEngine {
    fn layout(&self, graph: &Graph, viewport: Viewport) -> Layout;
}

/// Deterministic force simulation with link, charge, collision and centering forces.
#[derive(Debug, Clone, Default)]
pub struct ForceLayout {
    config: LayoutConfig,
}

impl ForceLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

struct Link {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

impl LayoutEngine for ForceLayout {
    fn layout(&self, graph: &Graph, viewport: Viewport) -> Layout {
        if graph.nodes.is_empty() {
            return Layout::default();
        }

        let mut bodies = initial_bodies(graph.nodes.len());
        let links = resolve_links(graph);
        let cfg = &self.config;

        let ticks = cfg.ticks.max(1);
        let alpha_decay = 1.0 - cfg.alpha_min.powf(1.0 / f64::from(ticks));
        let mut alpha = 1.0;

        for _ in 0..ticks {
            alpha += -alpha * alpha_decay;

            apply_links(&mut bodies, &links, cfg.link_distance, alpha);
            apply_charge(&mut bodies, cfg.charge_strength, alpha);
            apply_collision(&mut bodies, cfg.collision_radius);

            for body in bodies.iter_mut() {
                body.vx *= 1.0 - cfg.velocity_decay;
                body.vy *= 1.0 - cfg.velocity_decay;
                body.x += body.vx;
                body.y += body.vy;
            }

            apply_center(&mut bodies, viewport.center());
        }

        tracing::debug!(nodes = bodies.len(), links = links.len(), ticks, "computed force layout");

        Layout {
            positions: graph
                .nodes
                .iter()
                .zip(bodies)
                .map(|(node, body)| NodePosition {
                    id: node.id.clone(),
                    x: body.x,
                    y: body.y,
                })
                .collect(),
        }
    }
}

/// Phyllotaxis arrangement around the origin.
fn initial_bodies(count: usize) -> Vec<Body> {
    let initial_angle = PI * (3.0 - 5f64.sqrt());
    (0..count)
        .map(|i| {
            let i = i as f64;
            let radius = 10.0 * (0.5 + i).sqrt();
            let angle = i * initial_angle;
            Body {
                x: radius * angle.cos(),
                y: radius * angle.sin(),
                ..Body::default()
            }
        })
        .collect()
}

fn resolve_links(graph: &Graph) -> Vec<Link> {
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let pairs: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .filter_map(|edge| {
            let source = *index.get(edge.source.as_str())?;
            let target = *index.get(edge.target.as_str())?;
            (source != target).then_some((source, target))
        })
        .collect();

    let mut degree = vec![0usize; graph.nodes.len()];
    for &(s, t) in &pairs {
        degree[s] += 1;
        degree[t] += 1;
    }

    pairs
        .into_iter()
        .map(|(source, target)| {
            let (ds, dt) = (degree[source] as f64, degree[target] as f64);
            Link {
                source,
                target,
                strength: 1.0 / ds.min(dt),
                bias: ds / (ds + dt),
            }
        })
        .collect()
}

/// Stand-in for a random nudge when two bodies coincide.
fn jiggle(seed: usize) -> f64 {
    (seed as f64 + 1.0) * 1e-6
}

fn apply_links(bodies: &mut [Body], links: &[Link], distance: f64, alpha: f64) {
    for (n, link) in links.iter().enumerate() {
        let (s, t) = (bodies[link.source], bodies[link.target]);
        let mut x = t.x + t.vx - s.x - s.vx;
        let mut y = t.y + t.vy - s.y - s.vy;
        if x == 0.0 {
            x = jiggle(n);
        }
        if y == 0.0 {
            y = jiggle(n);
        }
        let length = (x * x + y * y).sqrt();
        let scale = (length - distance) / length * alpha * link.strength;
        x *= scale;
        y *= scale;

        bodies[link.target].vx -= x * link.bias;
        bodies[link.target].vy -= y * link.bias;
        bodies[link.source].vx += x * (1.0 - link.bias);
        bodies[link.source].vy += y * (1.0 - link.bias);
    }
}

fn apply_charge(bodies: &mut [Body], strength: f64, alpha: f64) {
    let snapshot: Vec<Body> = bodies.to_vec();
    for (i, body) in bodies.iter_mut().enumerate() {
        for (j, other) in snapshot.iter().enumerate() {
            if i == j {
                continue;
            }
            let mut x = other.x - body.x;
            let mut y = other.y - body.y;
            if x == 0.0 {
                x = jiggle(i + j);
            }
            if y == 0.0 {
                y = jiggle(i + j);
            }
            let mut l = x * x + y * y;
            if l < 1.0 {
                l = l.sqrt();
            }
            body.vx += x * strength * alpha / l;
            body.vy += y * strength * alpha / l;
        }
    }
}

fn apply_collision(bodies: &mut [Body], radius: f64) {
    let reach = radius * 2.0;
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (a, b) = (bodies[i], bodies[j]);
            let mut x = (a.x + a.vx) - (b.x + b.vx);
            let mut y = (a.y + a.vy) - (b.y + b.vy);
            let mut l = x * x + y * y;
            if l >= reach * reach {
                continue;
            }
            if x == 0.0 {
                x = jiggle(i + j);
                l += x * x;
            }
            if y == 0.0 {
                y = jiggle(i + j);
                l += y * y;
            }
            let length = l.sqrt();
            let scale = (reach - length) / length;
            x *= scale;
            y *= scale;
            // Equal radii share the correction evenly.
            bodies[i].vx += x * 0.5;
            bodies[i].vy += y * 0.5;
            bodies[j].vx -= x * 0.5;
            bodies[j].vy -= y * 0.5;
        }
    }
}

fn apply_center(bodies: &mut [Body], (cx, cy): (f64, f64)) {
    let n = bodies.len() as f64;
    let (sx, sy) = bodies
        .iter()
        .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
    let (dx, dy) = (cx - sx / n, cy - sy / n);
    for body in bodies.iter_mut() {
        body.x += dx;
        body.y += dy;
    }
}
