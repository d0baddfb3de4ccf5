//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use entity::config::RuntimeConfig;
use entity::core::PipelineStage;
use entity::pipeline::{PipelineExecutor, Registries};
use entity::plugins::Plugin;
use entity::testing::{CalculatorTool, EchoPrompt, ToolQueuePlugin};
use entity::tools::cache_key;
use serde_json::json;
use std::sync::Arc;

fn registries() -> Registries {
    let registries = Registries::new(RuntimeConfig::default());
    let echo: Arc<dyn Plugin> = Arc::new(EchoPrompt::new(
        "echo",
        vec![PipelineStage::Think, PipelineStage::Output],
    ));
    for stage in [PipelineStage::Think, PipelineStage::Output] {
        registries
            .plugins
            .register_for_stage(Arc::clone(&echo), stage, "echo");
    }
    registries
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let echo = registries();
    let executor = PipelineExecutor::new(&echo);
    c.bench_function("echo_pipeline", |b| {
        b.iter(|| runtime.block_on(executor.execute(black_box("hello"), "bench")));
    });

    let tools = registries();
    tools.tools.register(Arc::new(CalculatorTool::new()));
    tools.plugins.register_for_stage(
        Arc::new(ToolQueuePlugin::new(
            "queue",
            PipelineStage::Do,
            "calc",
            vec![json!({"expression": "2+2"}), json!({"expression": "6*7"})],
        )),
        PipelineStage::Do,
        "queue",
    );
    let executor = PipelineExecutor::new(&tools);
    c.bench_function("queued_tools", |b| {
        b.iter(|| runtime.block_on(executor.execute(black_box("compute"), "bench")));
    });

    let params = json!({"q": "rust", "filters": {"lang": "en", "limit": 10}});
    c.bench_function("tool_cache_key", |b| {
        b.iter(|| cache_key(black_box("search"), black_box(&params)));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
