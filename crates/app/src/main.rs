//! imageinfo: opens an image through an importer plugin and prints what was
//! imported.
//!
//! `imageinfo <input> [--importer=NAME] [--importer-options=k=v,...]
//! [--verbose] [--from-data] [--list-plugins]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use asset::{AnyImageImporter, Importer, PluginRegistry};
use corelib::{Configuration, ImporterFlags};

const DEFAULT_IMPORTER: &str = "AnyImageImporter";

#[derive(Debug)]
struct Args {
    input: Option<PathBuf>,
    importer: String,
    options: Configuration,
    verbose: bool,
    from_data: bool,
    list_plugins: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args {
        input: None,
        importer: DEFAULT_IMPORTER.to_string(),
        options: Configuration::new(),
        verbose: false,
        from_data: false,
        list_plugins: false,
    };

    for arg in args {
        if let Some(val) = arg.strip_prefix("--importer=") {
            parsed.importer = val.to_string();
        } else if let Some(val) = arg.strip_prefix("--importer-options=") {
            let options = Configuration::parse_pairs(val)
                .with_context(|| format!("Invalid --importer-options '{val}'"))?;
            for (key, value) in options.iter() {
                parsed.options.set_value(key, value);
            }
        } else if arg == "--verbose" {
            parsed.verbose = true;
        } else if arg == "--from-data" {
            parsed.from_data = true;
        } else if arg == "--list-plugins" {
            parsed.list_plugins = true;
        } else if arg.starts_with("--") {
            bail!("Unknown option '{arg}'");
        } else if parsed.input.replace(PathBuf::from(&arg)).is_some() {
            bail!("Only one input file is accepted, got another: '{arg}'");
        }
    }
    Ok(parsed)
}

/// The format-detecting facade or a concrete plugin picked with `--importer`.
enum Target {
    Any(AnyImageImporter),
    Plugin(Box<dyn Importer>),
}

impl Target {
    fn create(registry: Arc<PluginRegistry>, name: &str) -> Result<Self> {
        if name == DEFAULT_IMPORTER {
            return Ok(Target::Any(AnyImageImporter::new(registry)));
        }
        let plugin = registry
            .instantiate(name)
            .with_context(|| format!("Cannot create importer '{name}'"))?;
        Ok(Target::Plugin(plugin))
    }

    fn importer(&mut self) -> &mut dyn Importer {
        match self {
            Target::Any(importer) => importer,
            Target::Plugin(importer) => importer.as_mut(),
        }
    }

    /// Plugin that actually decoded the file.
    fn decoder_name(&self) -> Option<&str> {
        match self {
            Target::Any(importer) => importer.delegate_name(),
            Target::Plugin(importer) => Some(importer.name()),
        }
    }
}

/// Copy `options` into `importer`. A concrete plugin only takes keys it
/// recognizes; the rest are warned about, skipped and returned.
fn apply_options(
    importer: &mut dyn Importer,
    options: &Configuration,
    known_keys_only: bool,
) -> Vec<String> {
    let mut skipped = Vec::new();
    for (key, value) in options.iter() {
        if known_keys_only && !importer.configuration().has_value(key) {
            log::warn!("Option {key} not recognized by {}", importer.name());
            skipped.push(key.to_string());
            continue;
        }
        importer.configuration_mut().set_value(key, value);
    }
    skipped
}

fn print_summary(importer: &mut dyn Importer) -> Result<()> {
    for id in 0..importer.image1d_count() {
        let image = importer.image1d(id)?;
        println!("1D image {id}: {} px, {:?}", image.size, image.format);
    }
    for id in 0..importer.image2d_count() {
        let image = importer.image2d(id)?;
        println!(
            "2D image {id}: {}x{}, {:?}",
            image.size[0], image.size[1], image.format
        );
    }
    for id in 0..importer.image3d_count() {
        let image = importer.image3d(id)?;
        println!(
            "3D image {id}: {}x{}x{}, {:?}",
            image.size[0], image.size[1], image.size[2], image.format
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1))?;
    let registry = Arc::new(PluginRegistry::with_builtin_importers());

    if args.list_plugins {
        for name in registry.plugin_list() {
            println!("{name}");
        }
        if args.input.is_none() {
            return Ok(());
        }
    }

    let Some(input) = args.input.as_deref() else {
        bail!("Usage: imageinfo <input> [--importer=NAME] [--importer-options=k=v,...] [--verbose] [--from-data] [--list-plugins]");
    };

    let mut target = Target::create(registry, &args.importer)?;
    let importer = target.importer();
    if args.verbose {
        importer.set_flags(ImporterFlags::VERBOSE);
    }
    // The facade forwards options itself and warns about the ones its
    // delegate doesn't know.
    apply_options(importer, &args.options, args.importer != DEFAULT_IMPORTER);

    log::info!(
        "Opening {} with {} ({})",
        input.display(),
        args.importer,
        if args.from_data { "data" } else { "file" }
    );
    let opened = if args.from_data {
        let data =
            std::fs::read(input).with_context(|| format!("Cannot read {}", input.display()))?;
        importer.open_data(&data)
    } else {
        importer.open_file(input)
    };
    opened.with_context(|| format!("Cannot open {}", input.display()))?;

    if let Some(name) = target.decoder_name() {
        println!("Importer: {name}");
    }
    let importer = target.importer();
    print_summary(importer)?;

    importer.close();
    log::info!("Done");
    Ok(())
}
