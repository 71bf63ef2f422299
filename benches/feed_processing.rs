use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use market_sentinel::analysis::requester::build_transcript;
use market_sentinel::gateway::client::parse_messages;
use market_sentinel::gateway::url::normalize_relay_base;
use market_sentinel::ChatMessage;
use serde_json::json;

fn sample_payload(count: usize) -> String {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let messages: Vec<_> = (0..count)
        .rev()
        .map(|i| {
            json!({
                "id": i.to_string(),
                "author": { "username": format!("trader{}", i % 7), "bot": i % 11 == 0 },
                "content": "BTC holding the range, watching CPI print before adding risk",
                "timestamp": (base + Duration::seconds(i as i64)).to_rfc3339(),
            })
        })
        .collect();
    serde_json::Value::Array(messages).to_string()
}

fn parse_benchmark(c: &mut Criterion) {
    let payload = sample_payload(100);

    c.bench_function("parse_messages_newest_first", |b| {
        b.iter(|| {
            let messages = parse_messages(black_box(&payload)).unwrap();
            black_box(messages.len());
        });
    });
}

fn transcript_benchmark(c: &mut Criterion) {
    let messages: Vec<ChatMessage> = parse_messages(&sample_payload(100)).unwrap();

    c.bench_function("build_transcript_window_50", |b| {
        b.iter(|| {
            let transcript = build_transcript(black_box(&messages), 50);
            black_box(transcript.len());
        });
    });
}

fn url_benchmark(c: &mut Criterion) {
    let inputs = [
        "relay.example.workers.dev/",
        "localhost:3001",
        "https://relay.example.workers.dev/api/discord//",
        "",
    ];

    c.bench_function("normalize_relay_base", |b| {
        b.iter(|| {
            for input in &inputs {
                black_box(normalize_relay_base(black_box(input)));
            }
        });
    });
}

criterion_group!(benches, parse_benchmark, transcript_benchmark, url_benchmark);
criterion_main!(benches);
