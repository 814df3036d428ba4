use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9a-z_]+").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

/// Lowercases, trims, collapses non-identifier runs into `_` and strips
/// leading and trailing underscores.
pub fn slugify(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let replaced = NON_IDENT.replace_all(&lower, "_");
    let collapsed = UNDERSCORES.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Suffixes repeated names with `_2`, `_3`, ... in order of appearance. The
/// first occurrence keeps the bare name.
pub fn deduplicate(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name.clone();
            }
            let counter = next_suffix.entry(name.clone()).or_insert(2);
            loop {
                let candidate = format!("{}_{}", name, counter);
                *counter += 1;
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}

/// Follows an alias chain to its end. A cycle stops where it would repeat.
fn resolve_alias(aliases: &HashMap<String, String>, start: &str) -> String {
    let mut seen = HashSet::new();
    let mut current = start.to_string();
    while let Some(next) = aliases.get(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        current = next.clone();
    }
    current
}

/// Produces canonical column identifiers: slugify, deduplicate, then map
/// aliases onto canonical names.
#[derive(Debug, Clone, Default)]
pub struct ColumnNormalizer {
    aliases: HashMap<String, String>,
}

impl ColumnNormalizer {
    /// `semantic_map` is canonical name → aliases. Both sides are slugified,
    /// so `revenue_$` is matched as `revenue`.
    pub fn new(semantic_map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut aliases = HashMap::new();
        for (canonical, names) in semantic_map {
            let canonical = slugify(canonical);
            if canonical.is_empty() {
                continue;
            }
            for alias in names {
                let alias = slugify(alias);
                if alias.is_empty() || alias == canonical {
                    continue;
                }
                aliases.insert(alias, canonical.clone());
            }
        }
        // Chained aliases resolve to their final name so a second pass is a no-op.
        let resolved = aliases
            .keys()
            .map(|alias| (alias.clone(), resolve_alias(&aliases, alias)))
            .filter(|(alias, canonical)| alias != canonical)
            .collect();
        Self { aliases: resolved }
    }

    pub fn canonical_for(&self, slug: &str) -> Option<&str> {
        self.aliases.get(slug).map(|s| s.as_str())
    }

    pub fn normalize(&self, headers: &[String]) -> Vec<String> {
        let slugs: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let slug = slugify(h);
                if slug.is_empty() {
                    format!("column_{}", i + 1)
                } else {
                    slug
                }
            })
            .collect();
        let aliased: Vec<String> = deduplicate(&slugs)
            .into_iter()
            .map(|name| match self.aliases.get(&name) {
                Some(canonical) => canonical.clone(),
                None => name,
            })
            .collect();
        // An alias can land on a name already present.
        deduplicate(&aliased)
    }
}
