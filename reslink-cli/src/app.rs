use clap::Parser;

/// reslink - link pre-compiled Android resources into an APK or static library
#[derive(Debug, Parser)]
#[command(name = "reslink", version, about, long_about = None)]
pub struct Cli {
    /// Output path.
    #[arg(short = 'o', value_name = "PATH")]
    pub output: String,

    /// Path to the Android manifest to build.
    #[arg(long, value_name = "PATH")]
    pub manifest: String,

    /// Adds an archive to link against (repeatable).
    #[arg(short = 'I', value_name = "PATH")]
    pub include: Vec<String>,

    /// Compilation unit to link, using overlay semantics. The last
    /// conflicting resource given takes precedence. '@file' reads
    /// whitespace-separated units from a file.
    #[arg(short = 'R', value_name = "PATH")]
    pub overlay: Vec<String>,

    /// Directory in which to generate R.java.
    #[arg(long, value_name = "DIR")]
    pub java: Option<String>,

    /// Output file for generated Proguard rules.
    #[arg(long, value_name = "PATH")]
    pub proguard: Option<String>,

    /// Output file for generated Proguard rules for the main dex.
    #[arg(long = "proguard-main-dex", value_name = "PATH")]
    pub proguard_main_dex: Option<String>,

    /// Disables automatic style and layout SDK versioning.
    #[arg(long = "no-auto-version")]
    pub no_auto_version: bool,

    /// Disables automatic versioning of vector drawables. Use this only
    /// when building with vector drawable support library.
    #[arg(long = "no-version-vectors")]
    pub no_version_vectors: bool,

    /// Comma separated list of configurations to include. The default is
    /// all configurations.
    #[arg(short = 'c', value_name = "CONFIGS")]
    pub configs: Option<String>,

    /// Selects the closest matching density and strips out all others.
    #[arg(long = "preferred-density", value_name = "DENSITY")]
    pub preferred_density: Option<String>,

    /// Comma separated list of product names to keep.
    #[arg(long, value_name = "LIST")]
    pub product: Option<String>,

    /// Outputs the APK contents to a directory specified by -o.
    #[arg(long = "output-to-dir")]
    pub output_to_dir: bool,

    /// Removes XML namespace prefix and URI information from
    /// AndroidManifest.xml and XML binaries in res/*.
    #[arg(long = "no-xml-namespaces")]
    pub no_xml_namespaces: bool,

    /// Default minimum SDK version to use for AndroidManifest.xml.
    #[arg(long = "min-sdk-version", value_name = "VERSION")]
    pub min_sdk_version: Option<String>,

    /// Default target SDK version to use for AndroidManifest.xml.
    #[arg(long = "target-sdk-version", value_name = "VERSION")]
    pub target_sdk_version: Option<String>,

    /// Version code (integer) to inject into the AndroidManifest.xml if
    /// none is present.
    #[arg(long = "version-code", value_name = "CODE")]
    pub version_code: Option<String>,

    /// Version name to inject into the AndroidManifest.xml if none is
    /// present.
    #[arg(long = "version-name", value_name = "NAME")]
    pub version_name: Option<String>,

    /// Generate a static Android library.
    #[arg(long = "static-lib")]
    pub static_lib: bool,

    /// Merge all library resources under the app's package.
    #[arg(long = "no-static-lib-packages")]
    pub no_static_lib_packages: bool,

    /// Generates R.java without the final modifier. This is implied when
    /// --static-lib is specified.
    #[arg(long = "non-final-ids")]
    pub non_final_ids: bool,

    /// File containing a list of name to ID mapping.
    #[arg(long = "stable-ids", value_name = "FILE")]
    pub stable_ids: Option<String>,

    /// Emit a file at the given path with a list of name to ID mappings,
    /// suitable for use with --stable-ids.
    #[arg(long = "emit-ids", value_name = "FILE")]
    pub emit_ids: Option<String>,

    /// Package name to use when generating R.java for private symbols. If
    /// not specified, public and private symbols will use the application's
    /// package name.
    #[arg(long = "private-symbols", value_name = "PACKAGE")]
    pub private_symbols: Option<String>,

    /// Custom Java package under which to generate R.java.
    #[arg(long = "custom-package", value_name = "PACKAGE")]
    pub custom_package: Option<String>,

    /// Generate the same R.java but with different package names
    /// (colon-separated, repeatable).
    #[arg(long = "extra-packages", value_name = "PACKAGE[:PACKAGE...]")]
    pub extra_packages: Vec<String>,

    /// Adds a JavaDoc annotation to all generated Java classes.
    #[arg(long = "add-javadoc-annotation", value_name = "ANNOTATION")]
    pub add_javadoc_annotation: Vec<String>,

    /// Allows the addition of new resources in overlays without
    /// <add-resource> tags.
    #[arg(long = "auto-add-overlay")]
    pub auto_add_overlay: bool,

    /// Renames the package in AndroidManifest.xml.
    #[arg(long = "rename-manifest-package", value_name = "PACKAGE")]
    pub rename_manifest_package: Option<String>,

    /// Changes the name of the target package for instrumentation. Most
    /// useful when used in conjunction with --rename-manifest-package.
    #[arg(
        long = "rename-instrumentation-target-package",
        value_name = "PACKAGE"
    )]
    pub rename_instrumentation_target_package: Option<String>,

    /// File suffixes not to compress (repeatable).
    #[arg(short = '0', value_name = "EXT")]
    pub no_compress: Vec<String>,

    /// Split resources matching a set of configs out to a Split APK.
    /// Syntax: path/to/output.apk:<config>[,<config>[...]].
    #[arg(long = "split", value_name = "PATH:CONFIGS")]
    pub split: Vec<String>,

    /// Enables verbose logging.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Compilation units to link. '@file' reads whitespace-separated units
    /// from a file.
    #[arg(value_name = "FILE")]
    pub inputs: Vec<String>,
}
