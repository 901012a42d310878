mod history;
mod mover;
mod search;

pub(crate) use mover::{GreedyMover, GreedyOptions};
pub(crate) use search::Phase;

#[cfg(test)]
pub(crate) use history::LoopHistory;
#[cfg(test)]
pub(crate) use mover::{sub_step_cap, MarginSchedule};
#[cfg(test)]
pub(crate) use search::{is_legal_state, score_file, simulate};
