use anyhow::{bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use view_dispatcher::codec::{search_params_to_state, state_to_search_params, SearchParams, TableState};
use view_dispatcher::config::ViewConfig;
use view_dispatcher::group::{GroupContents, GroupData, Grouped};
use view_dispatcher::pipeline::ViewCache;
use view_dispatcher::schema::ViewSchema;
use view_dispatcher::sql_compiler::SqlCompiler;

const DEFAULT_CONFIG: &str = "view_schema.json";

/// 加载视图配置，优先使用JSON配置，失败时使用默认配置
fn load_config(path: &str) -> ViewConfig {
    match ViewConfig::from_json_file(path) {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载视图配置: {}", path);
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            ViewConfig::default()
        }
    }
}

fn load_records(path: &str) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("无法读取记录文件 {}", path))?;
    let records: Vec<Value> =
        serde_json::from_str(&content).with_context(|| format!("记录文件 {} 必须是 JSON 对象数组", path))?;
    Ok(records)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(records_path) = args.first() else {
        bail!("用法: view_dispatcher <records.json> [{}]", DEFAULT_CONFIG);
    };
    let config_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG);

    println!("--- View Dispatcher: 视图过滤/排序/分组 ---");

    let config = load_config(config_path);
    let schema = config.schema().context("字段配置无效")?;
    let records = load_records(records_path)?;

    println!("\n[配置信息]:");
    println!("✅ 加载了 {} 条记录, {} 个字段定义", records.len(), schema.fields().len());
    for (entity, table) in config.get_tables() {
        println!("  {} -> {}", entity, table);
    }
    println!("\n输入查询字符串，例如: status=done~not_equals&sort=priority.desc&group=status.asc");
    println!("命令: :sql <Entity>  :state  :quit");

    let compiler = SqlCompiler::from_config(config, schema.clone());
    let mut cache = ViewCache::new(schema.clone());
    let mut state = TableState::default();
    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline("view> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            (":quit", _) | (":q", _) => break,
            (":state", _) => {
                println!("{}", state_to_search_params(&state, &schema).to_query_string());
            }
            (":sql", entity) => {
                let entity = if entity.is_empty() { "Issue" } else { entity };
                match compiler.compile(&state.to_conditions(), entity) {
                    Ok(result) => {
                        println!("{}", result.sql);
                        for opt in &result.optimizations {
                            println!("• {:?}", opt);
                        }
                        for filter in &result.skipped {
                            println!("⚠️ 未知运算符, 已忽略: {} {}", filter.field, filter.operator);
                        }
                    }
                    Err(e) => println!("✗ SQL 编译失败: {}", e),
                }
            }
            _ => {
                state = search_params_to_state(&SearchParams::parse(line), &schema);
                run_query(&mut cache, &records, &state, &schema);
            }
        }
    }

    Ok(())
}

fn run_query(cache: &mut ViewCache<Value>, records: &[Value], state: &TableState, schema: &ViewSchema) {
    let conditions = state.to_conditions();
    if let Err(e) = schema.validate(&conditions) {
        println!("⚠️ {}", e);
    }

    match cache.get(records, 0, &conditions) {
        Grouped::Flat(rows) => {
            let start = (state.page.saturating_sub(1) as usize).saturating_mul(state.per_page as usize);
            let page: Vec<&Value> = rows.iter().skip(start).take(state.per_page as usize).collect();
            println!("共 {} 条记录, 第 {} 页:", rows.len(), state.page);
            for row in page {
                println!("  {}", row);
            }
        }
        Grouped::Groups(groups) => {
            for group in groups {
                print_group(group, 0);
            }
        }
    }
}

fn print_group(group: &GroupData<Value>, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}▸ {}", indent, group.header());
    match &group.data {
        GroupContents::Records(rows) => {
            for row in rows {
                println!("{}  {}", indent, row);
            }
        }
        GroupContents::Groups(children) => {
            for child in children {
                print_group(child, depth + 1);
            }
        }
    }
}
