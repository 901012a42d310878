use crate::error::PlanError;
use crate::model::{MigrationState, VolumeId};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the destination volume of an added file is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum InsertPolicy {
    /// Uniformly random volume.
    Random,
    /// The volume holding the newest still-resident file of the same host.
    Backup,
}

impl InsertPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Backup => "backup",
        }
    }

    /// Pick the destination for a file of `host`.
    ///
    /// One random draw is taken for every addition regardless of policy, so
    /// both policies consume the seeded stream identically.
    pub(crate) fn choose(
        self,
        state: &MigrationState,
        rng: &mut StdRng,
        host: u32,
    ) -> Result<VolumeId, PlanError> {
        let random_volume = rng.gen_range(0..state.num_volumes());
        match self {
            Self::Random => Ok(random_volume),
            Self::Backup => newest_sibling_volume(state, host),
        }
    }
}

impl fmt::Display for InsertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for InsertPolicy {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "random" => Ok(Self::Random),
            "backup" => Ok(Self::Backup),
            _ => Err(format!("invalid insert type: {s}")),
        }
    }
}

/// Walk the host's history from newest to oldest and return the volume of
/// the first file that is still resident.
fn newest_sibling_volume(state: &MigrationState, host: u32) -> Result<VolumeId, PlanError> {
    state
        .host_history
        .get(&host)
        .into_iter()
        .flat_map(|history| history.iter().rev())
        .filter_map(|input_id| state.catalog.index_of_input(input_id))
        .find_map(|idx| state.catalog.volume_of(idx))
        .ok_or(PlanError::SiblingNotFound { host })
}
