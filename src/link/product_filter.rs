//! Product-qualified value selection.
//!
//! A compilation unit may carry several values for the same configuration,
//! distinguished by product name. This pass picks exactly one per
//! configuration: a value whose product is in the requested set wins,
//! otherwise the default (empty or `default`) product is kept. Two matches
//! for the same configuration, or no match at all, are errors.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::link::context::LinkContext;
use crate::resources::{ConfigDescription, ResourceName, ResourceTable};

/// The product filtering pass.
pub struct ProductFilter {
    products: FxHashSet<String>,
}

impl ProductFilter {
    /// Create a filter keeping the given product names.
    #[must_use]
    pub fn new(products: FxHashSet<String>) -> Self {
        ProductFilter { products }
    }

    /// Reduce every entry to one value per configuration.
    pub fn consume(&self, context: &LinkContext, table: &mut ResourceTable) -> bool {
        let mut error = false;
        for package in &mut table.packages {
            for type_group in &mut package.types {
                for entry in &mut type_group.entries {
                    let res_name = ResourceName::new(
                        package.name.clone(),
                        type_group.tag,
                        entry.name.clone(),
                    );

                    let mut groups: BTreeMap<ConfigDescription, Vec<usize>> = BTreeMap::new();
                    for (ix, config_value) in entry.values.iter().enumerate() {
                        groups
                            .entry(config_value.config.clone())
                            .or_default()
                            .push(ix);
                    }

                    let mut keep: Vec<usize> = Vec::with_capacity(groups.len());
                    for (config, members) in &groups {
                        if members.len() == 1 {
                            keep.push(members[0]);
                            continue;
                        }
                        match self.select(entry, members) {
                            Ok(selected) => keep.push(selected),
                            Err(message) => {
                                context.diagnostics.error(
                                    entry.values[members[0]].source.clone(),
                                    format!(
                                        "{message} for resource '{res_name}' with config \
                                         '{config}'"
                                    ),
                                );
                                error = true;
                            }
                        }
                    }

                    keep.sort_unstable();
                    let mut ix = 0usize;
                    entry.values.retain(|_| {
                        let retained = keep.binary_search(&ix).is_ok();
                        ix += 1;
                        retained
                    });
                }
            }
        }
        !error
    }

    fn select(
        &self,
        entry: &crate::resources::Entry,
        members: &[usize],
    ) -> std::result::Result<usize, &'static str> {
        let mut requested: Option<usize> = None;
        let mut fallback: Option<usize> = None;
        for &ix in members {
            let product = entry.values[ix].product.as_str();
            if self.products.contains(product) {
                if requested.is_some() {
                    return Err("selection of product is ambiguous");
                }
                requested = Some(ix);
            } else if product.is_empty() || product == "default" {
                if fallback.is_some() {
                    return Err("default product defined more than once");
                }
                fallback = Some(ix);
            }
        }
        requested
            .or(fallback)
            .ok_or("no default product defined")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostics, Source};
    use crate::resources::{ConflictPolicy, Item, Value};

    fn table_with_products(products: &[(&str, &str)]) -> ResourceTable {
        let mut table = ResourceTable::new();
        let diag = Diagnostics::new();
        for (product, value) in products {
            table.add_resource(
                &ResourceName::parse("com.app:string/price").unwrap(),
                &ConfigDescription::default(),
                product,
                Value::Item(Item::String((*value).to_string())),
                Source::new("values.arsc"),
                ConflictPolicy::Error,
                &diag,
            );
        }
        table
    }

    fn remaining(table: &ResourceTable) -> Vec<String> {
        table
            .find_entry(&ResourceName::parse("com.app:string/price").unwrap())
            .unwrap()
            .values
            .iter()
            .map(|cv| match &cv.value {
                Value::Item(Item::String(s)) => s.clone(),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn requested_product_wins() {
        let ctx = LinkContext::new();
        let mut table = table_with_products(&[("", "$0.99"), ("pro", "$4.99")]);
        let filter = ProductFilter::new(["pro".to_string()].into_iter().collect());
        assert!(filter.consume(&ctx, &mut table));
        assert_eq!(remaining(&table), ["$4.99"]);
    }

    #[test]
    fn falls_back_to_default() {
        let ctx = LinkContext::new();
        let mut table = table_with_products(&[("default", "$0.99"), ("pro", "$4.99")]);
        let filter = ProductFilter::new(FxHashSet::default());
        assert!(filter.consume(&ctx, &mut table));
        assert_eq!(remaining(&table), ["$0.99"]);
    }

    #[test]
    fn missing_default_is_an_error() {
        let ctx = LinkContext::new();
        let mut table = table_with_products(&[("pro", "$4.99"), ("lite", "$1.99")]);
        let filter = ProductFilter::new(FxHashSet::default());
        assert!(!filter.consume(&ctx, &mut table));
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn ambiguous_selection_is_an_error() {
        let ctx = LinkContext::new();
        let mut table = table_with_products(&[("pro", "$4.99"), ("lite", "$1.99")]);
        let filter = ProductFilter::new(
            ["pro".to_string(), "lite".to_string()].into_iter().collect(),
        );
        assert!(!filter.consume(&ctx, &mut table));
    }
}
