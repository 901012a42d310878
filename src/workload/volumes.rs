use crate::model::VolumeSpec;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Role a volume plays in the list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VolumeRole {
    All,
    Source,
    Target,
}

impl VolumeRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "a",
            Self::Source => "s",
            Self::Target => "t",
        }
    }
}

impl fmt::Display for VolumeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for VolumeRole {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "a" => Ok(Self::All),
            "s" => Ok(Self::Source),
            "t" => Ok(Self::Target),
            _ => Err(format!("invalid volume role: {s}")),
        }
    }
}

/// Parse a volume list: one `<workload path>, <a|s|t>, <desired fraction>`
/// per line.
///
/// Every volume both sends and receives files, so source-only and
/// target-only roles are accepted but treated as `a`.
pub(crate) fn parse_volume_list(contents: &str) -> Result<Vec<VolumeSpec>> {
    let mut volumes = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            bail!("volume list line {}: expected 3 fields, got {}", line_no + 1, fields.len());
        }

        let role = VolumeRole::try_from(fields[1])
            .map_err(|e| anyhow::anyhow!("volume list line {}: {e}", line_no + 1))?;
        if role != VolumeRole::All {
            warn!("Volume {} has role '{}', treating it as 'a'", fields[0], role);
        }

        let desired: f64 = fields[2]
            .parse()
            .with_context(|| format!("volume list line {}: invalid fraction", line_no + 1))?;
        volumes.push(VolumeSpec { name: fields[0].to_string(), desired });
    }

    if volumes.is_empty() {
        bail!("volume list is empty");
    }

    let total: f64 = volumes.iter().map(|v| v.desired).sum();
    if (total - 1.0).abs() > 1e-6 {
        warn!("Desired fractions sum to {:.4}, not 1", total);
    }

    Ok(volumes)
}

pub(crate) fn load_volume_list(path: &Path) -> Result<Vec<VolumeSpec>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to open volume list: {}", path.display()))?;
    parse_volume_list(&contents)
}
