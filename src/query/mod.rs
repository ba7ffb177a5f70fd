//! Query construction: the fluent document builder and the filter
//! expression tree it embeds.

mod builder;
mod filter;

pub use builder::{Query, QueryType, RESERVED_FIELD_NAMES};
pub use filter::{FilterBuilder, FilterNode, FilterOp, FilterOperand};
