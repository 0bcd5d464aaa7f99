use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::hint::black_box;
use view_dispatcher::codec::{search_params_to_state, view_to_search_params, SearchParams};
use view_dispatcher::condition::{
    FilterCondition, FilterOperator, GroupCondition, SortCondition, SortDirection, View, ViewConditions,
};
use view_dispatcher::config::ViewConfig;
use view_dispatcher::filter::filter_records;
use view_dispatcher::group::group_records;
use view_dispatcher::pipeline::ViewPipeline;
use view_dispatcher::schema::ViewSchema;
use view_dispatcher::sort::sort_records;

const STATUSES: [&str; 5] = ["backlog", "todo", "in_progress", "done", "canceled"];
const PRIORITIES: [&str; 3] = ["low", "medium", "high"];

// 生成模拟问题记录
fn synthetic_issues(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "title": format!("Issue {}", i),
                "status": STATUSES[i % STATUSES.len()],
                "priority": PRIORITIES[(i / 7) % PRIORITIES.len()],
                "assignee": if i % 4 == 0 { Value::Null } else { json!(format!("user{}", i % 13)) },
                "created_at": format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
            })
        })
        .collect()
}

fn board_conditions() -> ViewConditions {
    ViewConditions {
        filters: Some(vec![
            FilterCondition::new("status", FilterOperator::NotEquals, "canceled"),
            FilterCondition::new("title", FilterOperator::Contains, "1"),
        ]),
        sorts: Some(vec![
            SortCondition::new("priority", SortDirection::Desc),
            SortCondition::new("created_at", SortDirection::Asc),
        ]),
        groups: Some(vec![
            GroupCondition::new("status", SortDirection::Asc),
            GroupCondition::new("assignee", SortDirection::Asc),
        ]),
    }
}

fn default_schema() -> ViewSchema {
    ViewConfig::default().schema().expect("default config is valid")
}

// 基准测试：各阶段性能
fn benchmark_stages(c: &mut Criterion) {
    let schema = default_schema();
    let conditions = board_conditions();
    let mut group = c.benchmark_group("stage_performance");

    for size in [1_000usize, 5_000] {
        let records = synthetic_issues(size);

        group.bench_with_input(BenchmarkId::new("filter", size), &records, |b, records| {
            b.iter(|| black_box(filter_records(records.iter(), conditions.filters(), &schema)))
        });

        group.bench_with_input(BenchmarkId::new("sort", size), &records, |b, records| {
            b.iter(|| black_box(sort_records(records.iter().collect::<Vec<&Value>>(), conditions.sorts(), &schema)))
        });

        group.bench_with_input(BenchmarkId::new("group", size), &records, |b, records| {
            b.iter(|| black_box(group_records(records.iter().collect::<Vec<&Value>>(), conditions.groups())))
        });
    }

    group.finish();
}

// 基准测试：完整管线
fn benchmark_pipeline(c: &mut Criterion) {
    let schema = default_schema();
    let conditions = board_conditions();
    let pipeline = ViewPipeline::new(&schema);
    let mut group = c.benchmark_group("pipeline_performance");

    for size in [1_000usize, 5_000] {
        let records = synthetic_issues(size);
        group.bench_with_input(BenchmarkId::new("run", size), &records, |b, records| {
            b.iter(|| black_box(pipeline.run(records.iter(), black_box(&conditions))))
        });
    }

    group.finish();
}

// 基准测试：查询参数编解码
fn benchmark_codec(c: &mut Criterion) {
    let schema = default_schema();
    let view = View {
        id: 7,
        name: "Board".to_string(),
        conditions: Some(board_conditions()),
    };
    let query = view_to_search_params(&view, &schema).to_query_string();

    c.bench_function("codec_encode", |b| {
        b.iter(|| black_box(view_to_search_params(black_box(&view), &schema).to_query_string()))
    });
    c.bench_function("codec_decode", |b| {
        b.iter(|| black_box(search_params_to_state(&SearchParams::parse(black_box(&query)), &schema)))
    });
}

criterion_group!(benches, benchmark_stages, benchmark_pipeline, benchmark_codec);
criterion_main!(benches);
