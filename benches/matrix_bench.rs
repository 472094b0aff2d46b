use criterion::{Criterion, criterion_group, criterion_main};
use matrix_ci::core::condition;
use matrix_ci::core::config::Workflow;
use matrix_ci::core::execution::run_job;
use matrix_ci::core::matrix::expand_job;
use matrix_ci::core::planner::{PlanOptions, plan_execution};
use matrix_ci::infra::provisioner::LocalProvisioner;
use std::hint::black_box;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

fn workflow(entries: usize) -> Workflow {
    let include: Vec<String> = (0..entries)
        .map(|i| format!("{{ imgtag = \"3.{i}\", crypto_ver = \"{}.0\" }}", i % 5))
        .collect();
    let src = format!(
        r#"
[[jobs]]
name = "test"
image = "python:${{{{ matrix.imgtag }}}}"

[jobs.matrix]
keys = ["imgtag", "crypto_ver"]
include = [{}]

[[jobs.steps]]
if = "!contains(matrix.imgtag, '2.7') && !contains(matrix.crypto_ver, '0.0')"
run = "pip install cryptography==${{{{ matrix.crypto_ver }}}}"
"#,
        include.join(", ")
    );
    toml::from_str(&src).unwrap()
}

fn bench_expand(c: &mut Criterion) {
    let workflow = workflow(64);
    c.bench_function("expand_job_64", |b| {
        b.iter(|| expand_job(black_box(&workflow.jobs[0])).unwrap());
    });
    c.bench_function("plan_execution_64", |b| {
        b.iter(|| plan_execution(black_box(&workflow), &PlanOptions::default()).unwrap());
    });
}

fn bench_condition(c: &mut Criterion) {
    let workflow = workflow(1);
    let entry = expand_job(&workflow.jobs[0]).unwrap().remove(0);
    let expr = "!contains(matrix.imgtag, '2.7') || contains(matrix.crypto_ver, '3')";

    c.bench_function("condition_parse", |b| {
        b.iter(|| condition::parse(black_box(expr)).unwrap());
    });
    let cond = condition::parse(expr).unwrap();
    c.bench_function("condition_evaluate", |b| {
        b.iter(|| cond.evaluate(black_box(&entry.bindings)).unwrap());
    });
}

fn bench_run_job(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let job = plan_execution(&workflow(1), &PlanOptions::default())
        .unwrap()
        .jobs
        .remove(0);
    let job = matrix_ci::core::planner::PlannedJob {
        steps: job
            .steps
            .into_iter()
            .map(|mut step| {
                step.condition = None;
                step.script = "echo bench".to_string();
                step
            })
            .collect(),
        ..job
    };
    let provisioner = LocalProvisioner::new(".");

    c.bench_function("run_job", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = run_job(job.clone(), &provisioner, CancellationToken::new()).await;
        });
    });
}

criterion_group!(benches, bench_expand, bench_condition, bench_run_job);
criterion_main!(benches);
