use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tagalyst_engine::{Document, EngineSettings, Highlighter, MemoryStore, Page, TextProjection};
mod common;

const IDENTITY: &str = "https://example.org/long-read";

/// A highlighter holding one annotation on every tenth paragraph.
fn annotated(markup: &str) -> Highlighter<MemoryStore> {
    let mut highlighter = Highlighter::new(MemoryStore::new(), EngineSettings::default());
    let mut doc = Document::parse(markup).unwrap();
    let page = Page::new(IDENTITY, doc.root());
    let starts = TextProjection::new(&doc, page.root).find_all("closes with plain words");
    for start in starts.into_iter().step_by(10) {
        // up to the paragraph number, so the selected text is unique
        let projection = TextProjection::new(&doc, page.root);
        let end = start + projection.text().chars().skip(start).take_while(|&c| c != '.').count();
        let selection = projection.span_for(start, end).unwrap();
        highlighter
            .create_annotation(&mut doc, &page, selection, "")
            .unwrap();
    }
    highlighter
}

fn bench_restore_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore_all");
    group.sample_size(10);

    let markup = common::generate_article(500);
    let mut highlighter = annotated(&markup);

    let unchanged = Document::parse(&markup).unwrap();
    group.bench_function("unchanged_page", |b| {
        b.iter_batched(
            || unchanged.clone(),
            |mut doc| {
                let page = Page::new(IDENTITY, doc.root());
                let report = highlighter.restore_all(&mut doc, &page).unwrap();
                black_box(report);
            },
            BatchSize::LargeInput,
        );
    });

    let shifted = Document::parse(&common::generate_shifted_article(500)).unwrap();
    group.bench_function("quote_fallback", |b| {
        b.iter_batched(
            || shifted.clone(),
            |mut doc| {
                let page = Page::new(IDENTITY, doc.root());
                let report = highlighter.restore_all(&mut doc, &page).unwrap();
                black_box(report);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_restore_all);
criterion_main!(benches);
