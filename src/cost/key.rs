use crate::model::{FileCatalog, FileIdx, Mapping};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Cache key of one cost evaluation.
///
/// Volumes are taken in name order and files are identified by serial
/// number, so the key does not depend on volume or file index order.
/// `scope` separates evaluations that share file numbering but not
/// content, such as runs over different change files.
pub(crate) fn cost_cache_key(
    names: &[String],
    catalog: &FileCatalog,
    initial: &Mapping,
    target: &Mapping,
    added: Option<&Mapping>,
    removed: Option<&Mapping>,
    scope: &str,
) -> String {
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));

    let mut text = String::new();
    let _ = write!(text, "scope={scope};volumes=");
    join_into(&mut text, order.iter().map(|&v| names[v].as_str()));

    for (label, mapping) in [("initial", Some(initial)), ("final", Some(target)), ("added", added), ("removed", removed)] {
        let _ = write!(text, ";{label}=");
        if let Some(mapping) = mapping {
            let sets: Vec<String> = order.iter().map(|&v| sn_set_string(catalog, &mapping[v])).collect();
            join_into(&mut text, sets.iter().map(String::as_str));
        }
    }

    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn join_into<'a>(out: &mut String, parts: impl Iterator<Item = &'a str>) {
    for (i, part) in parts.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(part);
    }
}

/// `{sn1 sn2 ...}` with serial numbers ascending.
fn sn_set_string(catalog: &FileCatalog, files: &BTreeSet<FileIdx>) -> String {
    let sns: BTreeSet<u64> = files.iter().map(|&f| catalog.get(f).sn).collect();
    let body: Vec<String> = sns.iter().map(u64::to_string).collect();
    format!("{{{}}}", body.join(" "))
}
