use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use lux_core::{
    variant, LoaderConfig, PacketRgb, Ref, ScalarRgb, ScalarRgbDouble, SceneGraph, SceneLoader,
    SceneParameters, Variant,
};
use lux_render::Scene;

/// Build a scene description and report what it produced.
#[derive(Parser)]
#[command(name = "lux", version, about)]
struct Cli {
    /// Scene description (JSON)
    scene: Option<PathBuf>,

    /// Loader configuration file (JSON or TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Variant to build, overrides the configuration
    #[arg(long)]
    variant: Option<String>,

    /// Fail on properties a plugin did not use
    #[arg(long)]
    strict: bool,

    /// Extra directory to look up referenced files in
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Print every tunable parameter
    #[arg(long)]
    params: bool,

    /// List the available plugins and variants, then exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.list {
        list_plugins();
        return Ok(());
    }
    let Some(scene) = &cli.scene else {
        bail!("no scene file given, see --help");
    };

    let mut config = match &cli.config {
        Some(path) => LoaderConfig::load_from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(variant) = &cli.variant {
        config.variant = variant.clone();
    }
    config.strict |= cli.strict;
    config.search_paths.extend(cli.include.iter().cloned());

    let manager = lux_render::manager(config.strict);
    let loader = SceneLoader::from_config(manager, &config)?;
    log::info!("variant {}", loader.variant());

    let graph = loader
        .load_file(scene)
        .with_context(|| format!("loading {}", scene.display()))?;
    report(&graph, loader.variant().name(), cli.params);
    Ok(())
}

fn list_plugins() {
    println!("Variants:");
    for variant in variant::all() {
        println!("  {variant}");
    }
    println!("Plugins:");
    for module in lux_render::MODULES {
        println!("  {:<12} {}", module.name, module.provides.join(", "));
    }
}

fn report(graph: &SceneGraph, variant: &str, params: bool) {
    println!("Built {} objects:", graph.construction_order().len());
    for label in graph.construction_order() {
        println!("  {label}");
    }

    match variant {
        name if name == ScalarRgb::ID.name() => summarize::<ScalarRgb>(graph),
        name if name == ScalarRgbDouble::ID.name() => summarize::<ScalarRgbDouble>(graph),
        name if name == PacketRgb::ID.name() => summarize::<PacketRgb>(graph),
        _ => {}
    }

    if params {
        let params = SceneParameters::collect(graph.root());
        println!("Parameters:");
        for key in params.keys() {
            if let Some(value) = params.get(key) {
                println!("  {key} = {value}");
            }
        }
    }

    for warning in graph.warnings() {
        log::warn!("{warning}");
    }
}

fn summarize<V: Variant>(graph: &SceneGraph) {
    let Some(scene) = Ref::cast::<dyn Scene<V>>(graph.root()) else {
        println!("Root is a \"{}\", not a scene", graph.root().class_name());
        return;
    };
    let bbox = scene.bbox();
    println!(
        "Scene: {} shapes, {} emitters, bounds {:?} .. {:?}",
        scene.shapes().len(),
        scene.emitters().len(),
        bbox.min(),
        bbox.max()
    );
    if let Some(integrator) = scene.integrator() {
        println!("Integrator: {}", integrator.class_name());
    }
}
