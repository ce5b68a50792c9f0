//! Benchmarks for the context search bag.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use updateflow::cancellation::CancellationToken;
use updateflow::context::{Services, UpdateContext};
use updateflow::search::{ConcurrentSearchBag, UpdateContextSearchBag, UpdateContextSearchData};
use updateflow::testing::{text_update, RecordingBotClient};

fn search_benchmark(c: &mut Criterion) {
    let root = CancellationToken::new();
    let bot = RecordingBotClient::new().into_context(1);
    let bag = ConcurrentSearchBag::new();
    let contexts: Vec<_> = (0..1024)
        .map(|chat| {
            let ctx = Arc::new(UpdateContext::new(
                text_update(chat, chat, "hi"),
                bot.clone(),
                Services::new(),
                &root,
            ));
            if let Some(data) = UpdateContextSearchData::new(&ctx) {
                bag.add(data);
            }
            ctx
        })
        .collect();

    c.bench_function("try_find_hit", |b| {
        b.iter(|| black_box(bag.try_find(black_box(512), 1)));
    });

    c.bench_function("add_evict", |b| {
        b.iter(|| {
            let ctx = Arc::new(UpdateContext::new(
                text_update(0, 7, "hi"),
                bot.clone(),
                Services::new(),
                &root,
            ));
            if let Some(data) = UpdateContextSearchData::new(&ctx) {
                black_box(bag.add(data));
            }
            ctx
        });
    });

    drop(contexts);
}

criterion_group!(benches, search_benchmark);
criterion_main!(benches);
