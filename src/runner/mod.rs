mod driver;
mod planner;
mod schedule;

pub(crate) use driver::{replay, RunSettings, Runner};
pub(crate) use planner::{ClusterTag, PlanOutcome, PlanRequest, PlanStep, Planner};
pub(crate) use schedule::ChangePosition;

#[cfg(test)]
pub(crate) use schedule::{iteration_margin, TrafficBudget};
