//! View processing for issue-tracker tables: filter, sort and group records
//! according to a saved view, and round-trip view state through URL query
//! parameters.

pub mod codec;
pub mod condition;
pub mod config;
pub mod filter;
pub mod group;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod sort;
pub mod sql_compiler;

pub use codec::{search_params_to_state, state_to_search_params, view_to_search_params, SearchParams, TableState};
pub use condition::{FilterCondition, FilterOperator, GroupCondition, SortCondition, SortDirection, View, ViewConditions};
pub use filter::filter_records;
pub use group::{group_records, GroupContents, GroupData, Grouped, UNGROUPED_KEY};
pub use pipeline::{ViewCache, ViewContext, ViewPipeline};
pub use record::Record;
pub use schema::{FieldKind, FieldSpec, ViewSchema};
pub use sort::sort_records;
