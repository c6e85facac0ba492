mod common;
mod effort;

pub use common::{Query, QueryCommon};
pub use effort::EffortQuery;
