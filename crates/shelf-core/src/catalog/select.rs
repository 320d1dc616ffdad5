use indexmap::IndexSet;
use shelf_domain::{glob, CatalogError, PackageIndex};

/// Ids named by `patterns`, in request order without duplicates.
///
/// An explicit id missing from `index` is an error; a glob that matches
/// nothing contributes nothing.
pub(crate) fn resolve_ids(patterns: &[String], index: &PackageIndex) -> Result<Vec<String>, CatalogError> {
    let mut ids = IndexSet::new();
    for pattern in patterns {
        if glob::is_pattern(pattern) {
            ids.extend(glob::filter(pattern, index.keys()));
        } else if index.contains_key(pattern) {
            ids.insert(pattern.clone());
        } else {
            return Err(CatalogError::NoSuchPackage {
                id: pattern.clone(),
            });
        }
    }
    Ok(ids.into_iter().collect())
}

/// Ids for listings: never fails, and no pattern means everything.
pub(crate) fn match_ids(patterns: &[String], index: &PackageIndex) -> Vec<String> {
    if patterns.is_empty() {
        return index.keys().cloned().collect();
    }
    let mut ids = IndexSet::new();
    for pattern in patterns {
        ids.extend(glob::filter(pattern, index.keys()));
    }
    ids.into_iter().collect()
}
