// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use url::Url;

use scoop::blocklist::default_rules;
use scoop::{Blocklist, ParsedRequest, ParsedResponse, ProxyExchange};

fn blocklist_benchmark(c: &mut Criterion) {
    let mut rules = default_rules();
    rules.push("/^https?:\\/\\/(www\\.)?tracker\\.example\\//".to_string());
    rules.push("ads.example".to_string());
    let blocklist = Blocklist::new(&rules).unwrap();

    let urls: Vec<Url> = [
        "https://example.com/index.html",
        "https://cdn.example.com/assets/app.js?v=3",
        "https://www.tracker.example/pixel.gif",
        "http://10.1.2.3/admin",
        "http://[::1]:8080/",
    ]
    .iter()
    .map(|u| Url::parse(u).unwrap())
    .collect();

    c.bench_function("blocklist_check_url", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(blocklist.check_url(url));
            }
        })
    });
}

fn exchange_benchmark(c: &mut Criterion) {
    let request = ParsedRequest::new("GET", "https://example.com/page?id=1")
        .header("host", "example.com")
        .header("accept", "text/html");
    let response = ParsedResponse::new(200, "OK")
        .header("content-type", "text/html; charset=utf-8")
        .body("<html><body>".to_string() + &"x".repeat(4096) + "</body></html>");

    c.bench_function("exchange_views", |b| {
        b.iter(|| {
            let mut exchange = ProxyExchange::from_request(request.clone()).unwrap();
            exchange.set_response_parsed(response.clone());
            black_box(exchange.request().map(|r| r.start_line.len()));
            black_box(exchange.response().map(|r| r.body.len()));
        })
    });

    let raw_response = response.to_raw();
    c.bench_function("parse_raw_response", |b| {
        b.iter(|| black_box(ParsedResponse::from_raw(&raw_response).unwrap()))
    });
}

criterion_group!(benches, blocklist_benchmark, exchange_benchmark);
criterion_main!(benches);
