use criterion::{Criterion, criterion_group, criterion_main};
use docs_rag::chunking::CharacterTextSplitter;
use docs_rag::loader::Document;
use std::hint::black_box;

fn sample_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {} describes how ownership moves between bindings, how borrows are \
                 checked, and why lifetimes appear in signatures. ",
                i
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = sample_text(2_000);
    let splitter = CharacterTextSplitter::default();
    c.bench_function("split_default", |b| {
        b.iter(|| splitter.split(black_box(&text)))
    });

    let small = CharacterTextSplitter::new(200, 50).expect("valid splitter");
    c.bench_function("split_small_windows", |b| {
        b.iter(|| small.split(black_box(&text)))
    });

    let multibyte: String = text.replace('o', "ö");
    c.bench_function("split_multibyte", |b| {
        b.iter(|| splitter.split(black_box(&multibyte)))
    });

    let documents: Vec<Document> = (0..50)
        .map(|i| Document::new(sample_text(40), Some(format!("doc-{}.txt", i).into())))
        .collect();
    c.bench_function("split_documents", |b| {
        b.iter(|| splitter.split_documents(black_box(&documents)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
