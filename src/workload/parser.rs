use anyhow::{bail, Context, Result};

use super::identity::parse_snapshot_name;

/// Stand-in size for blocks recorded with a non-positive size.
const FALLBACK_BLOCK_SIZE: u64 = 4096;

const FILE_SN_INDEX: usize = 1;
const FILE_ID_INDEX: usize = 2;
const FILE_NUM_BLOCKS_INDEX: usize = 4;
const FILE_RECIPE_START: usize = 5;

/// One record of a workload file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WorkloadLine {
    /// `B, <sn>, <fingerprint>, <refCount>[, <fileSN>]*`
    Block { sn: u64, fingerprint: String },
    /// `F, <sn>, <volume>_<inputId>, <parent>, <numBlocks>, (<blockSN>, <size>)*`
    File { sn: u64, input_id: String, recipe: Vec<(u64, u64)> },
}

/// Parse a single workload line. Blank lines and record kinds other than
/// `B` and `F` yield `None`.
pub(crate) fn parse_line(line: &str) -> Result<Option<WorkloadLine>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    match fields[0] {
        "B" => parse_block(&fields).map(Some),
        "F" => parse_file(&fields).map(Some),
        _ => Ok(None),
    }
}

fn parse_block(fields: &[&str]) -> Result<WorkloadLine> {
    if fields.len() < 3 {
        bail!("block line has {} fields, expected at least 3", fields.len());
    }
    let sn = fields[1].parse().with_context(|| format!("invalid block sn {:?}", fields[1]))?;
    Ok(WorkloadLine::Block { sn, fingerprint: fields[2].to_string() })
}

fn parse_file(fields: &[&str]) -> Result<WorkloadLine> {
    if fields.len() <= FILE_NUM_BLOCKS_INDEX {
        bail!("file line has {} fields, expected at least {}", fields.len(), FILE_RECIPE_START);
    }
    let sn = fields[FILE_SN_INDEX]
        .parse()
        .with_context(|| format!("invalid file sn {:?}", fields[FILE_SN_INDEX]))?;
    let input_id = input_id_of(fields[FILE_ID_INDEX]);
    let num_blocks: usize = fields[FILE_NUM_BLOCKS_INDEX]
        .parse()
        .with_context(|| format!("invalid block count {:?}", fields[FILE_NUM_BLOCKS_INDEX]))?;

    let needed = FILE_RECIPE_START + 2 * num_blocks;
    if fields.len() < needed {
        bail!("file {} declares {} blocks but has {} fields", sn, num_blocks, fields.len());
    }

    let mut recipe = Vec::with_capacity(num_blocks);
    for pair in fields[FILE_RECIPE_START..needed].chunks_exact(2) {
        let block_sn: u64 =
            pair[0].parse().with_context(|| format!("invalid block sn {:?} in file {sn}", pair[0]))?;
        let size: f64 =
            pair[1].parse().with_context(|| format!("invalid block size {:?} in file {sn}", pair[1]))?;
        let size = if size > 0.0 { size as u64 } else { FALLBACK_BLOCK_SIZE };
        recipe.push((block_sn, size));
    }

    Ok(WorkloadLine::File { sn, input_id, recipe })
}

/// `<volume>_<inputId>[_...]` -> `<inputId>`. When the part after the volume
/// is a full snapshot name, its `IF` id is used so that change files can find
/// the file again. Identities without an underscore are returned whole.
fn input_id_of(identity: &str) -> String {
    let Some((_, rest)) = identity.split_once('_') else {
        return identity.to_string();
    };
    if let Some(snapshot) = parse_snapshot_name(rest) {
        return snapshot.input_id;
    }
    rest.split('_').next().unwrap_or(rest).to_string()
}
