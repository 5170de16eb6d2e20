//! helion CLI - scene description inspection and maintenance
//!
//! Loads scene files against a permissive validation plugin set, so any
//! scene can be checked and pretty-printed without the full renderer.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use helion_runtime::{
    Class, ClassRegistry, FileSystemResolver, PluginManager, Properties, SceneObject,
    SceneObjectRef, Value,
};
use helion_scene::SceneLoader;
use std::path::PathBuf;
use std::sync::Arc;

/// Object interfaces known to the validation registry.
const KNOWN_CLASSES: &[&str] = &[
    "scene",
    "integrator",
    "sensor",
    "sampler",
    "film",
    "rfilter",
    "shape",
    "bsdf",
    "emitter",
    "medium",
    "phase",
    "volume",
    "spectrum",
];

#[derive(Parser)]
#[command(name = "helion")]
#[command(about = "Scene description loader tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scene file and print the instantiated object tree
    Info {
        /// Path to the scene XML file
        file: PathBuf,
        /// Variant used to resolve per-variant classes
        #[arg(short, long, default_value = "scalar-rgb")]
        variant: String,
        /// Parameter substitutions as key=value pairs
        #[arg(short, long)]
        param: Vec<String>,
    },
    /// Upgrade a legacy scene file in place (keeps a .bak copy)
    Upgrade {
        /// Path to the scene XML file
        file: PathBuf,
        /// Variant used to resolve per-variant classes
        #[arg(short, long, default_value = "scalar-rgb")]
        variant: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info {
            file,
            variant,
            param,
        } => {
            let params = parse_params(&param)?;
            let scene = load_scene(&file, &variant, &params, false)?;
            println!("Scene \"{}\" loaded successfully.", file.display());
            print_tree(&scene, 0);
        }
        Commands::Upgrade { file, variant } => {
            let backup = file.with_extension("bak");
            let had_backup = backup.exists();
            load_scene(&file, &variant, &[], true)?;
            if !had_backup && backup.exists() {
                println!(
                    "Upgraded \"{}\" (original saved as \"{}\").",
                    file.display(),
                    backup.display()
                );
            } else {
                println!("\"{}\" is already up to date.", file.display());
            }
        }
    }

    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => Ok((key.to_owned(), value.to_owned())),
            None => bail!("parameter \"{entry}\" is not of the form key=value"),
        })
        .collect()
}

fn load_scene(
    file: &PathBuf,
    variant: &str,
    params: &[(String, String)],
    write_update: bool,
) -> Result<SceneObjectRef> {
    let mut registry = ClassRegistry::new();
    for class in KNOWN_CLASSES {
        registry.register(class, variant);
    }

    let mut plugins = PluginManager::new();
    plugins.set_catch_all(Box::new(|class, props| {
        Ok(Arc::new(ValidationObject::new(class, props)) as SceneObjectRef)
    }));

    // Resolve includes relative to the scene file's directory
    let mut resolver = FileSystemResolver::new();
    if let Some(parent) = file.parent() {
        resolver.append(parent);
    }

    let loader = SceneLoader::with_resolver(registry, plugins, Arc::new(resolver));
    loader
        .load_file(file, variant, params, write_update)
        .with_context(|| format!("failed to load \"{}\"", file.display()))
}

/// Stand-in object used for validation: accepts every property and keeps a
/// printable record of the bag it was built from.
struct ValidationObject {
    class: Class,
    object_id: String,
    plugin: String,
    entries: Vec<(String, String, Option<SceneObjectRef>)>,
}

impl ValidationObject {
    fn new(class: &Class, props: &mut Properties) -> Self {
        let names: Vec<String> = props.iter().map(|(n, _)| n.to_owned()).collect();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            match props.get(&name) {
                Some(Value::Object(child)) => {
                    entries.push((name.clone(), String::new(), Some(child.clone())));
                }
                Some(value) => entries.push((name.clone(), format!("{value:?}"), None)),
                None => {}
            }
            props.mark_queried(&name);
        }
        Self {
            class: class.clone(),
            object_id: props.id().to_owned(),
            plugin: props.plugin_name().to_owned(),
            entries,
        }
    }
}

impl SceneObject for ValidationObject {
    fn class(&self) -> &Class {
        &self.class
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn id(&self) -> &str {
        &self.object_id
    }
}

fn print_tree(object: &SceneObjectRef, depth: usize) {
    let indent = "    ".repeat(depth);
    let Some(validation) = object.as_any().downcast_ref::<ValidationObject>() else {
        println!("{indent}{}", object.summary());
        return;
    };
    let id = if validation.object_id.is_empty() || validation.object_id.starts_with("_unnamed_") {
        String::new()
    } else {
        format!(" id=\"{}\"", validation.object_id)
    };
    println!(
        "{indent}{} (type \"{}\"){id}",
        validation.class.name(),
        validation.plugin
    );
    for (name, scalar, child) in &validation.entries {
        match child {
            Some(child) => {
                println!("{indent}  .{name}:");
                print_tree(child, depth + 1);
            }
            None => println!("{indent}  .{name} = {scalar}"),
        }
    }
}
