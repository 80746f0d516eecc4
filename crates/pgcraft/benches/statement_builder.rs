use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgcraft::{
    ColumnSet, FilterOperator, FilterSet, FilterSpec, Pagination, QueryRequest, StatementBuilder,
};
use serde_json::{Map, Value, json};

/// `n` rows of `n` columns each.
fn rows(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|r| {
                let row: Map<String, Value> =
                    (0..n).map(|c| (format!("col{c}"), json!(r * c))).collect();
                Value::Object(row)
            })
            .collect(),
    )
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_builder/insert");
    let builder = StatementBuilder::default().table("t");

    for n in [1, 5, 10, 50] {
        let columns: ColumnSet = (0..n).map(|c| format!("col{c}")).collect();
        let req = QueryRequest::insert(rows(n)).columns(columns);
        group.bench_with_input(BenchmarkId::from_parameter(n), &req, |b, req| {
            b.iter(|| black_box(builder.build(req)));
        });
    }

    group.finish();
}

fn bench_filtered_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement_builder/select");
    let builder = StatementBuilder::default().table("t");

    for n in [1, 5, 10, 50] {
        let set = FilterSet::new(
            (0..n).map(|c| (format!("col{c}"), FilterSpec::from(FilterOperator::Equal))),
        );
        let values: Map<String, Value> = (0..n).map(|c| (format!("col{c}"), json!(c))).collect();
        let req = QueryRequest::select()
            .filter(set.filter(Value::Object(values)))
            .pagination(Pagination::new(3).page_size(20));
        group.bench_with_input(BenchmarkId::from_parameter(n), &req, |b, req| {
            b.iter(|| black_box(builder.build(req)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_filtered_select);
criterion_main!(benches);
