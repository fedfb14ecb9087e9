mod app;

use anyhow::Context;
use clap::Parser;

use reslink::diagnostics::Diagnostics;
use reslink::link::{LinkCommand, LinkOptions, ManifestFixerOptions};
use reslink::resources::ConfigDescription;
use reslink::split::{parse_split_parameter, AxisConfigFilter};

use crate::app::Cli;

// Extensions that are already compressed and would only grow.
const DEFAULT_NO_COMPRESS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".wav", ".mp2", ".mp3", ".ogg", ".aac", ".mpg", ".mpeg",
    ".mid", ".midi", ".smf", ".jet", ".rtttl", ".imy", ".xmf", ".mp4", ".m4a", ".m4v", ".3gp",
    ".3gpp", ".3g2", ".3gpp2", ".amr", ".awb", ".wma", ".wmv", ".webm", ".mkv",
];

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // reslink info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("reslink", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let diag = Diagnostics::new();
    let exit_code = match build_options(&cli, &diag) {
        Some((options, inputs)) => {
            let mut command = LinkCommand::new(options);
            let code = command.run(&inputs);
            for entry in command.diagnostics().iter() {
                eprintln!("{entry}");
            }
            code
        }
        None => {
            for entry in diag.iter() {
                eprintln!("{entry}");
            }
            1
        }
    };
    std::process::exit(exit_code);
}

/// Turn parsed flags into [`LinkOptions`] plus the expanded input list.
fn build_options(cli: &Cli, diag: &Diagnostics) -> Option<(LinkOptions, Vec<String>)> {
    let mut options = LinkOptions {
        output_path: cli.output.clone(),
        manifest_path: cli.manifest.clone(),
        include_paths: cli.include.clone(),
        generate_java_class_path: cli.java.clone(),
        custom_java_package: cli.custom_package.clone(),
        generate_proguard_rules_path: cli.proguard.clone(),
        generate_main_dex_proguard_rules_path: cli.proguard_main_dex.clone(),
        private_symbols: cli.private_symbols.clone(),
        javadoc_annotations: cli.add_javadoc_annotation.clone(),
        generate_non_final_ids: cli.non_final_ids,
        no_auto_version: cli.no_auto_version,
        no_version_vectors: cli.no_version_vectors,
        static_lib: cli.static_lib,
        no_static_lib_packages: cli.no_static_lib_packages,
        output_to_directory: cli.output_to_dir,
        no_xml_namespaces: cli.no_xml_namespaces,
        auto_add_overlay: cli.auto_add_overlay,
        resource_id_map_path: cli.emit_ids.clone(),
        verbose: cli.verbose,
        manifest_fixer_options: ManifestFixerOptions {
            min_sdk_version_default: cli.min_sdk_version.clone(),
            target_sdk_version_default: cli.target_sdk_version.clone(),
            version_code_default: cli.version_code.clone(),
            version_name_default: cli.version_name.clone(),
            rename_manifest_package: cli.rename_manifest_package.clone(),
            rename_instrumentation_target_package: cli
                .rename_instrumentation_target_package
                .clone(),
        },
        ..LinkOptions::default()
    };

    // Expand '@' argument files for inputs and overlays.
    let inputs = expand_arg_files(&cli.inputs, diag)?;
    options.overlay_files = expand_arg_files(&cli.overlay, diag)?;

    // A given --extra-packages can be a colon separated list of packages.
    for extra in &cli.extra_packages {
        for package in extra.split(':').filter(|p| !p.is_empty()) {
            options.extra_java_packages.insert(package.to_string());
        }
    }

    if let Some(products) = &cli.product {
        for product in products.split(',') {
            if !product.is_empty() && product != "default" {
                options.products.insert(product.to_string());
            }
        }
    }

    if let Some(configs) = &cli.configs {
        let mut filter = AxisConfigFilter::new();
        for config_str in configs.split(',') {
            let Some(config) = ConfigDescription::parse(config_str) else {
                diag.error(
                    None,
                    format!("invalid config '{config_str}' for -c option"),
                );
                return None;
            };
            if config.density != 0 {
                diag.warn(None, format!("ignoring density '{config}' for -c option"));
            } else {
                filter.add_config(config);
            }
        }
        options.table_splitter_options.config_filter = Some(filter);
    }

    if let Some(density_str) = &cli.preferred_density {
        let Some(config) = ConfigDescription::parse(density_str) else {
            diag.error(
                None,
                format!("invalid density '{density_str}' for --preferred-density option"),
            );
            return None;
        };
        // Only the density axis may be set; clear the version that density
        // parsing can imply.
        let mut plain = config.clone();
        plain.sdk_version = 0;
        if plain.defined_axes() != reslink::resources::ConfigAxis::DENSITY {
            diag.error(
                None,
                format!(
                    "invalid preferred density '{density_str}'. Preferred density must only \
                     be a density value"
                ),
            );
            return None;
        }
        options.table_splitter_options.preferred_density = Some(plain.density);
    }

    if !cli.static_lib {
        if let Some(stable_ids_path) = &cli.stable_ids {
            options.stable_id_map =
                reslink::link::load_stable_id_file(diag, stable_ids_path)?;
        }
    }

    for suffix in DEFAULT_NO_COMPRESS {
        options
            .extensions_to_not_compress
            .insert((*suffix).to_string());
    }
    for suffix in &cli.no_compress {
        options.extensions_to_not_compress.insert(suffix.clone());
    }

    for split_arg in &cli.split {
        let (path, constraints) = parse_split_parameter(split_arg, diag)?;
        options.split_paths.push(path);
        options.split_constraints.push(constraints);
    }

    // Static libraries are merged into apps later; versioning happens there.
    if options.static_lib {
        options.no_auto_version = true;
        options.no_version_vectors = true;
    }

    Some((options, inputs))
}

fn expand_arg_files(args: &[String], diag: &Diagnostics) -> Option<Vec<String>> {
    let mut expanded = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(path) = arg.strip_prefix('@') {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read argument file '{path}'"))
                .map_err(|err| {
                    diag.error(
                        Some(reslink::diagnostics::Source::new(path)),
                        err.to_string(),
                    );
                })
                .ok()?;
            expanded.extend(content.split_whitespace().map(ToString::to_string));
        } else {
            expanded.push(arg.clone());
        }
    }
    Some(expanded)
}
