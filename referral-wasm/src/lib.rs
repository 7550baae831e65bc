//! Framework-neutral WASM <-> JavaScript bridge for the referral network.

use referral_core::{
    bounds, derive_graph, markers, ForceLayout, GeoBounds, GraphConfig, GraphEdge, GraphNode,
    Layout, LayoutConfig, LayoutEngine, MapMarker, PatientRecord, Viewport,
};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct JsGraphConfig {
    #[serde(default)]
    location_color: Option<String>,
    #[serde(default)]
    referrer_color: Option<String>,
    #[serde(default)]
    patient_color: Option<String>,
}

impl From<JsGraphConfig> for GraphConfig {
    fn from(cfg: JsGraphConfig) -> Self {
        let mut base = GraphConfig::default();
        if let Some(color) = cfg.location_color {
            base.location_color = color;
        }
        if let Some(color) = cfg.referrer_color {
            base.referrer_color = color;
        }
        if let Some(color) = cfg.patient_color {
            base.patient_color = color;
        }
        base
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct JsLayoutConfig {
    #[serde(default)]
    link_distance: Option<f64>,
    #[serde(default)]
    charge_strength: Option<f64>,
    #[serde(default)]
    collision_radius: Option<f64>,
    #[serde(default)]
    ticks: Option<u32>,
    #[serde(flatten)]
    graph: JsGraphConfig,
}

impl JsLayoutConfig {
    fn split(self) -> (GraphConfig, LayoutConfig) {
        let mut layout = LayoutConfig::default();
        if let Some(distance) = self.link_distance {
            layout.link_distance = distance;
        }
        if let Some(strength) = self.charge_strength {
            layout.charge_strength = strength;
        }
        if let Some(radius) = self.collision_radius {
            layout.collision_radius = radius;
        }
        if let Some(ticks) = self.ticks {
            layout.ticks = ticks;
        }
        (GraphConfig::from(self.graph), layout)
    }
}

// Plain fields only: `serde-wasm-bindgen` turns anything serialized as a map
// (including `#[serde(flatten)]` structs) into a JS `Map`, not an object.
#[derive(Serialize)]
struct PositionedGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    layout: Layout,
}

impl PositionedGraph {
    fn build(records: &[PatientRecord], viewport: Viewport, cfg: JsLayoutConfig) -> Self {
        let (graph_cfg, layout_cfg) = cfg.split();
        let graph = derive_graph(records, &graph_cfg);
        let layout = ForceLayout::new(layout_cfg).layout(&graph, viewport);
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            layout,
        }
    }
}

#[derive(Serialize)]
struct MarkerSet {
    markers: Vec<MapMarker>,
    bounds: Option<GeoBounds>,
}

impl MarkerSet {
    fn build(records: &[PatientRecord]) -> Self {
        let markers = markers(records);
        let bounds = bounds(&markers);
        Self { markers, bounds }
    }
}

fn read_records(records: JsValue) -> Result<Vec<PatientRecord>, JsValue> {
    from_value(records).map_err(|err| JsValue::from_str(&format!("Could not read records: {err}")))
}

fn read_config<T: for<'de> Deserialize<'de> + Default>(config: Option<JsValue>) -> Result<T, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => from_value(js_cfg)
            .map_err(|err| JsValue::from_str(&format!("Could not read config: {err}"))),
        _ => Ok(T::default()),
    }
}

fn write<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|err| JsValue::from_str(&format!("Could not serialize result: {err}")))
}

/// `{ nodes, edges }` for a list of patient records.
#[wasm_bindgen(js_name = deriveGraph)]
pub fn derive_graph_js(records: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records = read_records(records)?;
    let cfg: JsGraphConfig = read_config(config)?;
    write(&derive_graph(&records, &GraphConfig::from(cfg)))
}

/// `{ nodes, edges, layout }` with positions inside a `width` x `height` view.
#[wasm_bindgen(js_name = layoutGraph)]
pub fn layout_graph_js(
    records: JsValue,
    width: f64,
    height: f64,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records = read_records(records)?;
    let cfg: JsLayoutConfig = read_config(config)?;
    write(&PositionedGraph::build(&records, Viewport { width, height }, cfg))
}

/// `{ markers, bounds }` for the geographic view.
#[wasm_bindgen(js_name = mapMarkers)]
pub fn map_markers_js(records: JsValue) -> Result<JsValue, JsValue> {
    let records = read_records(records)?;
    write(&MarkerSet::build(&records))
}
