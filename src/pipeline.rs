//! Filter → sort → group, plus memoization and the explicit current-view holder.

use crate::condition::{View, ViewConditions};
use crate::filter::filter_records;
use crate::group::{group_records, Grouped};
use crate::record::Record;
use crate::schema::ViewSchema;
use crate::sort::sort_records;
use tracing::debug;

pub struct ViewPipeline<'s> {
    schema: &'s ViewSchema,
}

impl<'s> ViewPipeline<'s> {
    pub fn new(schema: &'s ViewSchema) -> Self {
        Self { schema }
    }

    pub fn run<R, I>(&self, records: I, conditions: &ViewConditions) -> Grouped<R>
    where
        R: Record,
        I: IntoIterator<Item = R>,
    {
        let filtered = filter_records(records, conditions.filters(), self.schema);
        let sorted = sort_records(filtered, conditions.sorts(), self.schema);
        group_records(sorted, conditions.groups())
    }
}

/// Caches the last pipeline result. The caller bumps `revision` whenever the
/// record collection changes.
pub struct ViewCache<T> {
    schema: ViewSchema,
    last: Option<(u64, ViewConditions)>,
    output: Grouped<T>,
    recomputations: usize,
}

impl<T: Record + Clone> ViewCache<T> {
    pub fn new(schema: ViewSchema) -> Self {
        Self {
            schema,
            last: None,
            output: Grouped::Flat(Vec::new()),
            recomputations: 0,
        }
    }

    pub fn get(&mut self, records: &[T], revision: u64, conditions: &ViewConditions) -> &Grouped<T> {
        let fresh = matches!(&self.last, Some((rev, cond)) if *rev == revision && cond == conditions);
        if fresh {
            debug!(revision, "view cache hit");
        } else {
            debug!(revision, records = records.len(), "view cache miss, recomputing");
            self.output = ViewPipeline::new(&self.schema).run(records.iter().cloned(), conditions);
            self.last = Some((revision, conditions.clone()));
            self.recomputations += 1;
        }
        &self.output
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    pub fn schema(&self) -> &ViewSchema {
        &self.schema
    }
}

/// The currently selected view, passed explicitly to whatever renders or
/// edits the table.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    current: Option<View>,
}

impl ViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&View> {
        self.current.as_ref()
    }

    /// Conditions of the selected view, empty when nothing is selected.
    pub fn conditions(&self) -> ViewConditions {
        self.current.as_ref().map(View::conditions).unwrap_or_default()
    }

    /// Replaces the selection, returning the previous view.
    pub fn select(&mut self, view: View) -> Option<View> {
        self.current.replace(view)
    }

    pub fn clear(&mut self) -> Option<View> {
        self.current.take()
    }
}
