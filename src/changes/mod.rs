mod applicator;
mod filter;
mod policy;
mod stream;

pub(crate) use applicator::{ChangeApplicator, ChangeBatch};
pub(crate) use policy::InsertPolicy;
pub(crate) use stream::{batch_sizes, ChangeStream};

#[cfg(test)]
pub(crate) use applicator::remove_file;
#[cfg(test)]
pub(crate) use filter::is_sampled;
#[cfg(test)]
pub(crate) use stream::{parse_change_line, ChangeLine};
