mod clustering_tests;
mod config_tests;
mod cost_tests;
mod db_tests;
mod report_tests;
mod runner_tests;
mod workload_tests;

use crate::model::{FileSn, MigrationState, StateOptions, VolumeSpec};
use crate::workload::{ingest_file, ParsedFile};
use std::path::PathBuf;

/// `(volume, sn, recipe)` where the recipe lists `(fingerprint, size)`.
pub(crate) type FileSpec<'a> = (usize, FileSn, &'a [(&'a str, u64)]);

/// State with volumes `vol0..` at the given desired fractions. File `sn`
/// gets the input id `f<sn>`.
pub(crate) fn build_state(desired: &[f64], files: &[FileSpec<'_>]) -> MigrationState {
    let volumes = desired
        .iter()
        .enumerate()
        .map(|(i, &d)| VolumeSpec { name: format!("vol{i}"), desired: d })
        .collect();
    let mut state = MigrationState::new(volumes, StateOptions::default());
    for &(volume, sn, recipe) in files {
        let parsed = ParsedFile {
            sn,
            input_id: format!("f{sn}"),
            recipe: recipe.iter().map(|&(fp, size)| (fp.to_string(), size)).collect(),
        };
        ingest_file(&mut state, parsed, volume);
    }
    state
}

/// Fresh directory under the system temp dir.
pub(crate) fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dedup-planner-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
