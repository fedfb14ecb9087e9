//! Configuration-split partitioning and split manifest synthesis.
//!
//! A split is declared as `PATH:CFG[,CFG…]`. Before splitting, constraint
//! configurations at or below the build minimum platform level lose their
//! sdk qualifier (post-collapse resources could otherwise never match), and
//! all constraints are verified pairwise disjoint. The splitter then claims
//! every config value whose configuration dominates one of a split's
//! configurations; everything unclaimed stays in the base, subject to the
//! `-c` axis filter and preferred-density reduction.

use std::collections::BTreeSet;

use crate::diagnostics::Diagnostics;
use crate::link::context::LinkContext;
use crate::link::manifest_fixer::AppInfo;
use crate::resources::{
    ConfigAxis, ConfigDescription, Entry, ResourceTable,
};
use crate::xml::{Attribute, Element, NamespaceDecl, Node, XmlResource, SCHEMA_ANDROID};

/// The set of configurations one split claims.
#[derive(Debug, Clone, Default)]
pub struct SplitConstraints {
    /// Claimed configurations.
    pub configs: BTreeSet<ConfigDescription>,
}

impl SplitConstraints {
    /// The `config.<a>_<b>` name used in the split manifest.
    #[must_use]
    pub fn name(&self) -> String {
        let parts: Vec<String> = self.configs.iter().map(ToString::to_string).collect();
        format!("config.{}", parts.join("_"))
    }
}

/// Parse one `--split PATH:CFG[,CFG…]` argument.
///
/// Reports problems to `diag` and returns `None`.
#[must_use]
pub fn parse_split_parameter(
    arg: &str,
    diag: &Diagnostics,
) -> Option<(String, SplitConstraints)> {
    let Some((path, configs)) = arg.split_once(':') else {
        diag.error(None, format!("invalid split parameter '{arg}'"));
        diag.note(
            None,
            "should be --split path/to/output.apk:<config>[,<config>...]".to_string(),
        );
        return None;
    };
    if path.is_empty() {
        diag.error(None, format!("invalid split parameter '{arg}'"));
        return None;
    }

    let mut constraints = SplitConstraints::default();
    for config_str in configs.split(',') {
        match ConfigDescription::parse(config_str) {
            Some(config) if !config.is_default() => {
                constraints.configs.insert(config);
            }
            _ => {
                diag.error(
                    None,
                    format!("invalid config '{config_str}' in split parameter '{arg}'"),
                );
                return None;
            }
        }
    }
    Some((path.to_string(), constraints))
}

/// Strip the sdk qualifier from constraints it can never match after the
/// version collapser ran.
#[must_use]
pub fn adjust_constraints_for_min_sdk(
    constraints: &[SplitConstraints],
    min_sdk: u16,
) -> Vec<SplitConstraints> {
    constraints
        .iter()
        .map(|split| SplitConstraints {
            configs: split
                .configs
                .iter()
                .map(|config| {
                    if config.sdk_version != 0 && config.sdk_version <= min_sdk {
                        config.without_sdk_version()
                    } else {
                        config.clone()
                    }
                })
                .collect(),
        })
        .collect()
}

/// `-c` axis filter: keeps values that are unqualified on the filtered axes
/// or match one of the requested configurations.
#[derive(Debug, Clone)]
pub struct AxisConfigFilter {
    configs: Vec<ConfigDescription>,
    axis_mask: ConfigAxis,
}

impl Default for AxisConfigFilter {
    fn default() -> Self {
        AxisConfigFilter::new()
    }
}

impl AxisConfigFilter {
    /// An empty (keep-everything) filter.
    #[must_use]
    pub fn new() -> Self {
        AxisConfigFilter {
            configs: Vec::new(),
            axis_mask: ConfigAxis::empty(),
        }
    }

    /// Add a requested configuration.
    pub fn add_config(&mut self, config: ConfigDescription) {
        self.axis_mask |= config.defined_axes();
        self.configs.push(config);
    }

    /// True when `config` survives the filter.
    #[must_use]
    pub fn matches(&self, config: &ConfigDescription) -> bool {
        if self.configs.is_empty() {
            return true;
        }
        if config.defined_axes().intersection(self.axis_mask).is_empty() {
            return true;
        }
        self.configs.iter().any(|filter| config.matches(filter))
    }
}

/// Splitter behavior switches.
#[derive(Debug, Clone, Default)]
pub struct TableSplitterOptions {
    /// `-c` filter applied to the base table.
    pub config_filter: Option<AxisConfigFilter>,
    /// Keep only the closest density variant in the base table.
    pub preferred_density: Option<u16>,
}

/// Partitions a table into a base and one sub-table per constraint.
pub struct TableSplitter {
    constraints: Vec<SplitConstraints>,
    options: TableSplitterOptions,
    splits: Vec<ResourceTable>,
}

impl TableSplitter {
    /// Create a splitter for `constraints`.
    #[must_use]
    pub fn new(constraints: Vec<SplitConstraints>, options: TableSplitterOptions) -> Self {
        let splits = constraints.iter().map(|_| ResourceTable::new()).collect();
        TableSplitter {
            constraints,
            options,
            splits,
        }
    }

    /// Verify the constraints are pairwise disjoint.
    pub fn verify_split_constraints(&self, context: &LinkContext) -> bool {
        let mut error = false;
        for i in 0..self.constraints.len() {
            for j in (i + 1)..self.constraints.len() {
                let overlap: Vec<_> = self.constraints[i]
                    .configs
                    .intersection(&self.constraints[j].configs)
                    .collect();
                if !overlap.is_empty() {
                    let configs: Vec<String> =
                        overlap.iter().map(ToString::to_string).collect();
                    context.diagnostics.error(
                        None,
                        format!(
                            "split configurations overlap: '{}' is claimed by splits {} and {}",
                            configs.join(", "),
                            i + 1,
                            j + 1
                        ),
                    );
                    error = true;
                }
            }
        }
        !error
    }

    /// Partition `table`: claimed values move into the split sub-tables, the
    /// rest stays, filtered by `-c` and preferred density.
    pub fn split_table(&mut self, table: &mut ResourceTable) {
        for package in &mut table.packages {
            let package_name = package.name.clone();
            let package_id = package.id;
            for type_group in &mut package.types {
                let type_tag = type_group.tag;
                let type_id = type_group.id;
                for entry in &mut type_group.entries {
                    let entry_name = entry.name.clone();
                    let entry_id = entry.id;
                    let entry_visibility = entry.visibility;
                    let mut remaining = Vec::with_capacity(entry.values.len());
                    for config_value in entry.values.drain(..) {
                        let claimed = self
                            .constraints
                            .iter()
                            .position(|split| {
                                split
                                    .configs
                                    .iter()
                                    .any(|config| config_value.config.matches(config))
                            });
                        match claimed {
                            Some(split_ix) => {
                                let split_entry = find_or_create_split_entry(
                                    &mut self.splits[split_ix],
                                    &package_name,
                                    package_id,
                                    type_tag,
                                    type_id,
                                    &entry_name,
                                    entry_id,
                                    entry_visibility,
                                );
                                split_entry.values.push(config_value);
                            }
                            None => remaining.push(config_value),
                        }
                    }

                    if let Some(filter) = &self.options.config_filter {
                        remaining.retain(|cv| filter.matches(&cv.config));
                    }
                    if let Some(density) = self.options.preferred_density {
                        select_preferred_density(&mut remaining, density);
                    }
                    entry.values = remaining;
                }
            }
        }
    }

    /// Take the split sub-tables, in constraint order.
    #[must_use]
    pub fn into_splits(self) -> Vec<ResourceTable> {
        self.splits
    }
}

fn find_or_create_split_entry<'a>(
    split: &'a mut ResourceTable,
    package_name: &str,
    package_id: Option<u8>,
    type_tag: crate::resources::ResourceType,
    type_id: Option<u8>,
    entry_name: &str,
    entry_id: Option<u16>,
    entry_visibility: crate::resources::Visibility,
) -> &'a mut Entry {
    let split_package = split.find_or_create_package(package_name);
    split_package.id = package_id;
    let split_type = split_package.find_or_create_type(type_tag);
    split_type.id = type_id;
    let split_entry = split_type.find_or_create_entry(entry_name);
    split_entry.id = entry_id;
    split_entry.visibility = entry_visibility;
    split_entry
}

fn select_preferred_density(
    values: &mut Vec<crate::resources::ConfigValue>,
    preferred: u16,
) {
    use std::collections::BTreeMap;

    // Group density-qualified values by their other qualifiers; per group,
    // keep the smallest density at or above the preferred one (downscaling
    // beats upscaling), falling back to the largest available.
    let mut best: BTreeMap<ConfigDescription, (u16, usize)> = BTreeMap::new();
    for (ix, config_value) in values.iter().enumerate() {
        let density = config_value.config.density;
        if density == 0 {
            continue;
        }
        let mut key = config_value.config.clone();
        key.density = 0;
        let better = match best.get(&key) {
            None => true,
            Some(&(current, _)) => match (current >= preferred, density >= preferred) {
                (true, true) => density < current,
                (false, true) => true,
                (true, false) => false,
                (false, false) => density > current,
            },
        };
        if better {
            best.insert(key, (density, ix));
        }
    }

    let keep: Vec<usize> = best.values().map(|&(_, ix)| ix).collect();
    let mut ix = 0usize;
    values.retain(|cv| {
        let retained = cv.config.density == 0 || keep.contains(&ix);
        ix += 1;
        retained
    });
}

/// Synthesize the minimal manifest for one split.
#[must_use]
pub fn generate_split_manifest(
    app_info: &AppInfo,
    constraints: &SplitConstraints,
) -> XmlResource {
    let mut manifest = Element {
        name: "manifest".to_string(),
        namespace_decls: vec![NamespaceDecl {
            prefix: "android".to_string(),
            uri: SCHEMA_ANDROID.to_string(),
        }],
        ..Element::default()
    };
    manifest
        .attributes
        .push(Attribute::new("", "package", app_info.package.clone()));
    if let Some(version_code) = app_info.version_code {
        manifest.attributes.push(Attribute::new(
            SCHEMA_ANDROID,
            "versionCode",
            version_code.to_string(),
        ));
    }
    if let Some(revision_code) = app_info.revision_code {
        manifest.attributes.push(Attribute::new(
            SCHEMA_ANDROID,
            "revisionCode",
            revision_code.to_string(),
        ));
    }
    manifest
        .attributes
        .push(Attribute::new("", "split", constraints.name()));

    let mut application = Element {
        name: "application".to_string(),
        ..Element::default()
    };
    application
        .attributes
        .push(Attribute::new(SCHEMA_ANDROID, "hasCode", "false"));
    manifest.children.push(Node::Element(application));

    XmlResource::new(
        crate::diagnostics::Source::new("synthesized AndroidManifest.xml"),
        manifest,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Source;
    use crate::resources::{ConflictPolicy, Item, ResourceName, Value};

    fn drawable_table(configs: &[&str]) -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        for config in configs {
            table.add_resource(
                &ResourceName::parse("com.app:drawable/foo").unwrap(),
                &ConfigDescription::parse(config).unwrap(),
                "",
                Value::Item(Item::String((*config).to_string())),
                Source::new("t"),
                ConflictPolicy::Error,
                &diag,
            );
        }
        table
    }

    fn constraint(configs: &[&str]) -> SplitConstraints {
        SplitConstraints {
            configs: configs
                .iter()
                .map(|c| ConfigDescription::parse(c).unwrap())
                .collect(),
        }
    }

    #[test]
    fn parse_split_parameters() {
        let diag = Diagnostics::new();
        let (path, constraints) =
            parse_split_parameter("out/hdpi.apk:hdpi,en", &diag).unwrap();
        assert_eq!(path, "out/hdpi.apk");
        assert_eq!(constraints.configs.len(), 2);
        assert_eq!(constraints.name(), "config.en_hdpi");

        assert!(parse_split_parameter("no-colon", &diag).is_none());
        assert!(parse_split_parameter("p.apk:bogus", &diag).is_none());
    }

    #[test]
    fn overlapping_constraints_fail_verification() {
        let ctx = LinkContext::new();
        let splitter = TableSplitter::new(
            vec![constraint(&["hdpi", "en"]), constraint(&["en"])],
            TableSplitterOptions::default(),
        );
        assert!(!splitter.verify_split_constraints(&ctx));
        assert!(ctx.diagnostics.has_errors());

        let splitter = TableSplitter::new(
            vec![constraint(&["hdpi"]), constraint(&["en"])],
            TableSplitterOptions::default(),
        );
        let ctx = LinkContext::new();
        assert!(splitter.verify_split_constraints(&ctx));
    }

    #[test]
    fn values_move_to_first_matching_split() {
        let mut table = drawable_table(&["", "hdpi", "en-hdpi", "xhdpi"]);
        let mut splitter = TableSplitter::new(
            vec![constraint(&["hdpi"]), constraint(&["xhdpi"])],
            TableSplitterOptions::default(),
        );
        splitter.split_table(&mut table);
        let splits = splitter.into_splits();

        let base_entry = table
            .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
            .unwrap();
        assert_eq!(base_entry.values.len(), 1);
        assert!(base_entry.values[0].config.is_default());

        let hdpi_entry = splits[0]
            .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
            .unwrap();
        // hdpi and en-hdpi both dominate the hdpi constraint.
        assert_eq!(hdpi_entry.values.len(), 2);

        let xhdpi_entry = splits[1]
            .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
            .unwrap();
        assert_eq!(xhdpi_entry.values.len(), 1);
    }

    #[test]
    fn sdk_stripping_in_constraints() {
        let adjusted = adjust_constraints_for_min_sdk(&[constraint(&["hdpi-v4"])], 14);
        assert_eq!(
            adjusted[0].configs.iter().next().unwrap().to_string(),
            "hdpi"
        );
        let kept = adjust_constraints_for_min_sdk(&[constraint(&["hdpi-v21"])], 14);
        assert_eq!(
            kept[0].configs.iter().next().unwrap().to_string(),
            "hdpi-v21"
        );
    }

    #[test]
    fn preferred_density_keeps_closest() {
        let mut table = drawable_table(&["ldpi", "hdpi", "xxhdpi"]);
        let mut splitter = TableSplitter::new(
            Vec::new(),
            TableSplitterOptions {
                config_filter: None,
                preferred_density: Some(320),
            },
        );
        splitter.split_table(&mut table);

        let entry = table
            .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
            .unwrap();
        assert_eq!(entry.values.len(), 1);
        assert_eq!(entry.values[0].config.to_string(), "xxhdpi");
    }

    #[test]
    fn config_filter_prunes_locales() {
        let mut table = drawable_table(&["", "en", "fr"]);
        let mut filter = AxisConfigFilter::new();
        filter.add_config(ConfigDescription::parse("en").unwrap());
        let mut splitter = TableSplitter::new(
            Vec::new(),
            TableSplitterOptions {
                config_filter: Some(filter),
                preferred_density: None,
            },
        );
        splitter.split_table(&mut table);

        let entry = table
            .find_entry(&ResourceName::parse("com.app:drawable/foo").unwrap())
            .unwrap();
        let configs: Vec<String> = entry.values.iter().map(|v| v.config.to_string()).collect();
        assert_eq!(configs, vec!["".to_string(), "en".to_string()]);
    }

    #[test]
    fn split_manifest_shape() {
        let info = AppInfo {
            package: "com.app".to_string(),
            version_code: Some(7),
            revision_code: None,
            min_sdk_version: None,
        };
        let doc = generate_split_manifest(&info, &constraint(&["hdpi"]));
        assert_eq!(doc.root.name, "manifest");
        assert_eq!(doc.root.find_attribute("", "split").unwrap().value, "config.hdpi");
        assert_eq!(
            doc.root
                .find_attribute(SCHEMA_ANDROID, "versionCode")
                .unwrap()
                .value,
            "7"
        );
        let app = doc.root.find_child("", "application").unwrap();
        assert_eq!(
            app.find_attribute(SCHEMA_ANDROID, "hasCode").unwrap().value,
            "false"
        );
    }
}
