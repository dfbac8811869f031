// 쿼리 성능 벤치마크
//
// Section 1: 전체 스캔 vs 인덱스 탐색 (decimal 범위 조건)
// Section 2: 정렬 + 페이지네이션
// Section 3: put 처리량 (인덱스 유무)

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tabula_core::{Col, IndexType, Table};

const ROWS: usize = 10_000;

fn populated(indexed: bool) -> Table {
    let table = Table::open_in_memory().unwrap();
    if indexed {
        table.create_index("age", IndexType::Decimal).unwrap();
        table.create_index("tags", IndexType::Token).unwrap();
    }
    for i in 0..ROWS {
        let age = (i % 120).to_string();
        let tags = if i % 7 == 0 { "piano songs" } else { "organ" };
        table
            .put(format!("row:{i:06}"), [("age", age.as_str()), ("tags", tags)])
            .unwrap();
    }
    table
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 1: 스캔 vs 인덱스
// ═══════════════════════════════════════════════════════════════════════════

fn bench_range_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_query");
    let plain = populated(false);
    let indexed = populated(true);

    group.bench_function("full_scan", |b| {
        b.iter(|| {
            let hits = plain
                .count([Col::new("age").gt(black_box(68)), Col::new("age").lt(72)])
                .unwrap();
            black_box(hits)
        })
    });

    group.bench_function("decimal_index", |b| {
        b.iter(|| {
            let hits = indexed
                .count([Col::new("age").gt(black_box(68)), Col::new("age").lt(72)])
                .unwrap();
            black_box(hits)
        })
    });

    group.bench_function("token_index", |b| {
        b.iter(|| {
            let hits = indexed
                .count([Col::new("tags").has_all_tokens(["piano", "songs"])])
                .unwrap();
            black_box(hits)
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 2: 정렬 + 페이지네이션
// ═══════════════════════════════════════════════════════════════════════════

fn bench_ordered_page(c: &mut Criterion) {
    let table = populated(true);
    c.bench_function("order_desc_page_of_20", |b| {
        b.iter(|| {
            let page = table
                .query()
                .filter(Col::new("age").ge(100))
                .order_by("-age")
                .offset(black_box(40))
                .limit(20)
                .keys()
                .unwrap();
            black_box(page)
        })
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 3: put 처리량
// ═══════════════════════════════════════════════════════════════════════════

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    for indexed in [false, true] {
        let table = populated(indexed);
        let name = if indexed { "indexed" } else { "plain" };
        group.bench_function(name, |b| {
            let mut counter = 0usize;
            b.iter(|| {
                let key = format!("bench:{counter}");
                table
                    .put(black_box(key), [("age", "42"), ("tags", "piano")])
                    .unwrap();
                counter += 1;
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_range_query, bench_ordered_page, bench_put);
criterion_main!(benches);
