//! Recursive grouper: one grouping level per `GroupCondition`.

use crate::condition::{GroupCondition, SortDirection};
use crate::record::{coerce_to_string, is_blank, Record};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Bucket key for records with a blank group value ("Ungrouped").
/// A value equal to the key itself lands in the same bucket.
pub const UNGROUPED_KEY: &str = "未分组";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupData<T> {
    pub key: String,
    /// The field whose value produced this bucket.
    pub field: String,
    pub data: GroupContents<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupContents<T> {
    Records(Vec<T>),
    Groups(Vec<GroupData<T>>),
}

/// Output of the grouping stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Grouped<T> {
    Flat(Vec<T>),
    Groups(Vec<GroupData<T>>),
}

impl<T> GroupData<T> {
    /// Number of records anywhere under this bucket.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn header(&self) -> String {
        format!("{}: {} ({} records)", self.field, self.key, self.len())
    }

    pub fn is_ungrouped(&self) -> bool {
        self.key == UNGROUPED_KEY
    }
}

impl<T> GroupContents<T> {
    pub fn len(&self) -> usize {
        match self {
            GroupContents::Records(records) => records.len(),
            GroupContents::Groups(groups) => groups.iter().map(GroupData::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            GroupContents::Records(records) => out.extend(records.iter()),
            GroupContents::Groups(groups) => {
                for group in groups {
                    group.data.collect_into(out);
                }
            }
        }
    }
}

impl<T> Grouped<T> {
    pub fn len(&self) -> usize {
        match self {
            Grouped::Flat(records) => records.len(),
            Grouped::Groups(groups) => groups.iter().map(GroupData::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf records in bucket order.
    pub fn flatten(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len());
        match self {
            Grouped::Flat(records) => out.extend(records.iter()),
            Grouped::Groups(groups) => {
                for group in groups {
                    group.data.collect_into(&mut out);
                }
            }
        }
        out
    }

    pub fn groups(&self) -> Option<&[GroupData<T>]> {
        match self {
            Grouped::Flat(_) => None,
            Grouped::Groups(groups) => Some(groups),
        }
    }
}

/// Groups records by each condition in turn. No conditions yields a flat list.
pub fn group_records<R: Record>(records: Vec<R>, groups: &[GroupCondition]) -> Grouped<R> {
    match groups.split_first() {
        None => Grouped::Flat(records),
        Some((first, rest)) => Grouped::Groups(group_level(records, first, rest)),
    }
}

fn group_level<R: Record>(records: Vec<R>, group: &GroupCondition, rest: &[GroupCondition]) -> Vec<GroupData<R>> {
    let mut named: HashMap<String, Vec<R>> = HashMap::new();
    let mut ungrouped: Vec<R> = Vec::new();

    for record in records {
        let raw = record.field(&group.field);
        if is_blank(raw) {
            ungrouped.push(record);
            continue;
        }
        let key = coerce_to_string(raw);
        if key == UNGROUPED_KEY {
            ungrouped.push(record);
        } else {
            named.entry(key).or_default().push(record);
        }
    }

    let mut buckets: Vec<(String, Vec<R>)> = named.into_iter().collect();
    buckets.sort_by(|(a, _), (b, _)| {
        let ordering = locale_compare(a, b);
        match group.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    if !ungrouped.is_empty() {
        buckets.push((UNGROUPED_KEY.to_string(), ungrouped));
    }

    buckets
        .into_iter()
        .map(|(key, records)| GroupData {
            key,
            field: group.field.clone(),
            data: match rest.split_first() {
                None => GroupContents::Records(records),
                Some((next, deeper)) => GroupContents::Groups(group_level(records, next, deeper)),
            },
        })
        .collect()
}

/// Case-insensitive first, then code point order so distinct keys never tie.
fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn by(field: &str, direction: SortDirection) -> GroupCondition {
        GroupCondition::new(field, direction)
    }

    fn keys<T>(groups: &[GroupData<T>]) -> Vec<&str> {
        groups.iter().map(|g| g.key.as_str()).collect()
    }

    fn issues() -> Vec<Value> {
        vec![
            json!({"id": "1", "status": "todo", "sprint": "S2"}),
            json!({"id": "2", "status": "Done", "sprint": "S1"}),
            json!({"id": "3", "sprint": "S1"}),
            json!({"id": "4", "status": "backlog", "sprint": ""}),
            json!({"id": "5", "status": "todo", "sprint": "S1"}),
        ]
    }

    #[test]
    fn test_no_groups_is_flat() {
        let grouped = group_records(issues(), &[]);
        assert_eq!(grouped, Grouped::Flat(issues()));
        assert!(grouped.groups().is_none());
    }

    #[test]
    fn test_buckets_sorted_with_ungrouped_last() {
        let grouped = group_records(issues(), &[by("status", SortDirection::Asc)]);
        let groups = grouped.groups().unwrap();
        assert_eq!(keys(groups), vec!["backlog", "Done", "todo", UNGROUPED_KEY]);

        let grouped = group_records(issues(), &[by("status", SortDirection::Desc)]);
        let groups = grouped.groups().unwrap();
        assert_eq!(keys(groups), vec!["todo", "Done", "backlog", UNGROUPED_KEY]);
        assert!(groups.last().unwrap().is_ungrouped());
    }

    #[test]
    fn test_leaf_keeps_input_order() {
        let grouped = group_records(issues(), &[by("status", SortDirection::Asc)]);
        let todo = &grouped.groups().unwrap()[2];
        match &todo.data {
            GroupContents::Records(records) => {
                let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
                assert_eq!(ids, vec!["1", "5"]);
            }
            GroupContents::Groups(_) => panic!("expected leaf bucket"),
        }
        assert_eq!(todo.header(), "status: todo (2 records)");
    }

    #[test]
    fn test_nested_groups() {
        let grouped = group_records(
            issues(),
            &[by("sprint", SortDirection::Asc), by("status", SortDirection::Asc)],
        );
        let sprints = grouped.groups().unwrap();
        assert_eq!(keys(sprints), vec!["S1", "S2", UNGROUPED_KEY]);
        assert_eq!(sprints[0].field, "sprint");

        match &sprints[0].data {
            GroupContents::Groups(statuses) => {
                assert_eq!(keys(statuses), vec!["Done", "todo", UNGROUPED_KEY]);
                assert_eq!(statuses[0].field, "status");
            }
            GroupContents::Records(_) => panic!("expected nested buckets"),
        }
        assert_eq!(sprints[0].len(), 3);
        assert_eq!(grouped.len(), 5);
    }

    #[test]
    fn test_literal_ungrouped_value_shares_bucket() {
        let records = vec![
            json!({"id": "1", "status": UNGROUPED_KEY}),
            json!({"id": "2", "status": "todo"}),
            json!({"id": "3"}),
        ];
        let grouped = group_records(records, &[by("status", SortDirection::Asc)]);
        let groups = grouped.groups().unwrap();
        assert_eq!(keys(groups), vec!["todo", UNGROUPED_KEY]);
        assert_eq!(groups[1].len(), 2);
        assert_eq!(groups.iter().filter(|g| g.is_ungrouped()).count(), 1);
    }

    #[test]
    fn test_numeric_group_values_are_coerced() {
        let records = vec![json!({"points": 3}), json!({"points": 1}), json!({"points": 3})];
        let grouped = group_records(records, &[by("points", SortDirection::Asc)]);
        let groups = grouped.groups().unwrap();
        assert_eq!(keys(groups), vec!["1", "3"]);
        assert_eq!(groups[1].len(), 2);
    }

    proptest! {
        #[test]
        fn prop_grouping_partitions_records(
            rows in prop::collection::vec((prop::option::of("[ab]{0,1}"), prop::option::of("[cd]")), 0..30),
            desc in any::<bool>(),
        ) {
            let records: Vec<Value> = rows
                .iter()
                .enumerate()
                .map(|(i, (g, h))| json!({"id": i, "g": g, "h": h}))
                .collect();
            let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
            let grouped = group_records(records.iter().collect::<Vec<&Value>>(), &[by("g", direction), by("h", direction)]);

            let mut seen: Vec<u64> = grouped.flatten().iter().map(|r| r["id"].as_u64().unwrap()).collect();
            seen.sort_unstable();
            let expected: Vec<u64> = (0..records.len() as u64).collect();
            prop_assert_eq!(seen, expected);

            if let Some(groups) = grouped.groups() {
                if let Some(pos) = groups.iter().position(|g| g.is_ungrouped()) {
                    prop_assert_eq!(pos, groups.len() - 1);
                }
                let has_blank = records.iter().any(|r| is_blank(r.get("g")));
                prop_assert_eq!(has_blank, groups.iter().any(|g| g.is_ungrouped()));
            }
        }
    }
}
