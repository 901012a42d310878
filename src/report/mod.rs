mod host;
mod plan_csv;
mod replay;
mod transfer_log;

pub(crate) use host::server_name;
pub(crate) use plan_csv::{PlanBlock, PlanReport, RunSummary};
pub(crate) use replay::{replay_plan, ReplayedBlock};
pub(crate) use transfer_log::TransferLog;

#[cfg(test)]
pub(crate) use plan_csv::VOLUME_HEADER;
#[cfg(test)]
pub(crate) use replay::parse_plan;
