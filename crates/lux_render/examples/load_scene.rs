//! Example: build a scene description and list what it contains.
//!
//! Run with: cargo run -p lux_render --example load_scene -- [scene.json]
//! Without an argument a small built-in scene is loaded.

use std::env;

use lux_core::{Ref, ScalarRgb, SceneLoader, SceneParameters, Variant};
use lux_render::Scene;

const DEMO: &str = r#"{
    "type": "scene",
    "children": [
        { "type": "path", "max_depth": 8 },
        {
            "type": "sphere",
            "id": "ball",
            "center": [0.0, 1.0, 0.0],
            "bsdf": {
                "type": "diffuse",
                "reflectance": { "type": "checkerboard", "scale": 4.0 }
            }
        },
        {
            "type": "rectangle",
            "id": "lamp",
            "to_world": { "type": "transform", "translate": [0.0, 4.0, 0.0] },
            "emitter": { "type": "area", "radiance": 10.0 }
        },
        { "type": "point_light", "id": "fill", "shape_ref": { "type": "ref", "id": "ball" } }
    ]
}"#;

fn main() {
    env_logger::init();

    let loader = SceneLoader::new(lux_render::initialize(), ScalarRgb::ID);
    let result = match env::args().nth(1) {
        Some(path) => {
            println!("Loading scene file: {path}");
            loader.load_file(&path)
        }
        None => {
            println!("Loading built-in demo scene");
            loader.load_string(DEMO)
        }
    };

    let graph = match result {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("Error loading scene: {err}");
            std::process::exit(1);
        }
    };

    println!("\n=== Construction order ===");
    for label in graph.construction_order() {
        println!("  {label}");
    }

    if let Some(scene) = Ref::cast::<dyn Scene<ScalarRgb>>(graph.root()) {
        println!("\n=== Scene ===");
        println!("Shapes: {}", scene.shapes().len());
        println!("Emitters: {}", scene.emitters().len());
        let bbox = scene.bbox();
        println!("Bounds: {:?} .. {:?}", bbox.min(), bbox.max());
        if let Some(integrator) = scene.integrator() {
            println!(
                "Integrator: {} (max depth {})",
                integrator.class_name(),
                integrator.max_depth()
            );
        }
    }

    println!("\n=== Parameters ===");
    let params = SceneParameters::collect(graph.root());
    for key in params.keys() {
        if let Some(value) = params.get(key) {
            println!("  {key} = {value}");
        }
    }

    if !graph.warnings().is_empty() {
        println!("\n=== Warnings ===");
        for warning in graph.warnings() {
            println!("  {warning}");
        }
    }
}
