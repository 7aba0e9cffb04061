// src/tests/enricher_tests.rs
use crate::domain::listing::UNAVAILABLE;
use crate::scraping::enricher::enrich_listings;
use crate::tests::utils::{detail_page, fast_settings, listing, registered, FakeLauncher};
use std::time::Duration;

#[test]
fn linkless_listing_gets_sentinel_without_a_session() {
    let fake = FakeLauncher::new();
    let (_registry, registration) = registered("scenario-d");

    let out = enrich_listings(
        vec![listing("", "Apartamento")],
        4,
        fake.shared(),
        &registration.token(),
        &fast_settings(),
    )
    .unwrap();

    assert_eq!(out.len(), 1);
    assert!(out[0].details.is_all_unavailable());
    assert_eq!(fake.detail_launches(), 0);
    assert_eq!(fake.launched(), 0);
}

#[test]
fn details_merge_back_in_original_order() {
    let links: Vec<String> = (0..6).map(|i| format!("https://x.test/imovel/{i}/")).collect();
    let mut fake = FakeLauncher::new();
    for (i, link) in links.iter().enumerate() {
        fake = fake.with_page(link, detail_page(&format!("Imóvel {i}"), "Anunciante"));
    }
    let mut input: Vec<_> = links.iter().map(|l| listing(l, "Apartamento")).collect();
    input.insert(3, listing("N/A", "Apartamento"));
    let (_registry, registration) = registered("order");

    let out = enrich_listings(input, 3, fake.shared(), &registration.token(), &fast_settings())
        .unwrap();

    let titles: Vec<&str> = out.iter().map(|r| r.details.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Imóvel 0", "Imóvel 1", "Imóvel 2", UNAVAILABLE, "Imóvel 3", "Imóvel 4", "Imóvel 5"]
    );
    assert_eq!(fake.detail_launches(), 6);
    assert_eq!(fake.closed(), 6);
}

#[test]
fn failed_detail_pages_fall_back_to_sentinel() {
    let ok = "https://x.test/imovel/ok/";
    let broken = "https://x.test/imovel/broken/";
    let missing = "https://x.test/imovel/missing/";
    let fake = FakeLauncher::new()
        .with_page(ok, detail_page("Cobertura", "Anunciante"))
        .with_panic(broken);
    let input = vec![
        listing(ok, "Apartamento"),
        listing(broken, "Apartamento"),
        listing(missing, "Apartamento"),
    ];
    let (_registry, registration) = registered("failures");

    let out = enrich_listings(input, 4, fake.shared(), &registration.token(), &fast_settings())
        .unwrap();

    assert_eq!(out.len(), 3);
    assert_eq!(out[0].details.title, "Cobertura");
    assert!(out[1].details.is_all_unavailable());
    assert!(out[2].details.is_all_unavailable());
    assert_eq!(fake.closed(), fake.launched());
}

#[test]
fn non_http_links_are_not_fetched() {
    let fake = FakeLauncher::new();
    let (_registry, registration) = registered("bad-links");
    let input = vec![
        listing("/imovel/relative/", "Casa"),
        listing("javascript:void(0)", "Casa"),
    ];

    let out = enrich_listings(input, 2, fake.shared(), &registration.token(), &fast_settings())
        .unwrap();

    assert!(out.iter().all(|r| r.details.is_all_unavailable()));
    assert_eq!(fake.launched(), 0);
}

#[test]
fn cancelled_job_discards_completed_details() {
    let link = "https://x.test/imovel/late/";
    let (registry, registration) = registered("enrich-cancel");
    let job = registration.token().job().clone();
    let fake = FakeLauncher::new()
        .with_page(link, detail_page("Casa", "Anunciante"))
        .on_open(move |_| {
            registry.cancel(&job);
        });

    let out = enrich_listings(
        vec![listing(link, "Casa")],
        1,
        fake.shared(),
        &registration.token(),
        &fast_settings(),
    )
    .unwrap();

    assert!(out[0].details.is_all_unavailable());
}

#[test]
fn duplicate_links_are_fetched_once() {
    let link = "https://x.test/imovel/dup/";
    let fake = FakeLauncher::new().with_page(link, detail_page("Sala", "Anunciante"));
    let (_registry, registration) = registered("dup");

    let out = enrich_listings(
        vec![listing(link, "Sala"), listing(link, "Sala")],
        4,
        fake.shared(),
        &registration.token(),
        &fast_settings(),
    )
    .unwrap();

    assert_eq!(fake.detail_launches(), 1);
    assert!(out.iter().all(|r| r.details.title == "Sala"));
}

#[test]
fn slow_page_only_costs_its_own_details() {
    let slow = "https://x.test/imovel/slow/";
    let fast: Vec<String> = (1..=2).map(|i| format!("https://x.test/imovel/fast{i}/")).collect();
    let mut fake = FakeLauncher::new().with_slow_page(
        slow,
        Duration::from_millis(400),
        detail_page("Lento", "Anunciante"),
    );
    for (i, link) in fast.iter().enumerate() {
        fake = fake.with_page(link, detail_page(&format!("Fast{}", i + 1), "Anunciante"));
    }
    let mut input = vec![listing(slow, "Casa")];
    input.extend(fast.iter().map(|l| listing(l, "Casa")));
    let mut settings = fast_settings();
    settings.detail_result_timeout = Duration::from_millis(200);
    let (_registry, registration) = registered("slow-first");

    let out = enrich_listings(input, 1, fake.shared(), &registration.token(), &settings).unwrap();

    let titles: Vec<&str> = out.iter().map(|r| r.details.title.as_str()).collect();
    assert_eq!(titles, vec![UNAVAILABLE, "Fast1", "Fast2"]);
    assert_eq!(fake.detail_launches(), 3);
}

#[test]
fn queued_pages_are_not_opened_after_cancel() {
    let links: Vec<String> = (0..4).map(|i| format!("https://x.test/imovel/q{i}/")).collect();
    let (registry, registration) = registered("enrich-queue-cancel");
    let job = registration.token().job().clone();
    let mut fake = FakeLauncher::new().on_open(move |_| {
        registry.cancel(&job);
    });
    for link in &links {
        fake = fake.with_page(link, detail_page("Casa", "Anunciante"));
    }
    let input = links.iter().map(|l| listing(l, "Casa")).collect();

    let out = enrich_listings(input, 1, fake.shared(), &registration.token(), &fast_settings())
        .unwrap();

    assert_eq!(fake.detail_launches(), 1);
    assert!(out.iter().all(|r| r.details.is_all_unavailable()));
}

fn slow_site(count: usize) -> (FakeLauncher, Vec<String>) {
    let links: Vec<String> = (0..count).map(|i| format!("https://x.test/imovel/c{i}/")).collect();
    let mut fake = FakeLauncher::new();
    for link in &links {
        fake = fake.with_slow_page(link, Duration::from_millis(40), detail_page("Casa", "Anunciante"));
    }
    (fake, links)
}

#[test]
fn concurrent_sessions_stay_within_requested_workers() {
    let (fake, links) = slow_site(8);
    let (_registry, registration) = registered("peak-requested");
    let input = links.iter().map(|l| listing(l, "Casa")).collect();

    enrich_listings(input, 3, fake.shared(), &registration.token(), &fast_settings()).unwrap();

    assert!(fake.peak_open() <= 3, "peak was {}", fake.peak_open());
    assert_eq!(fake.detail_launches(), 8);
}

#[test]
fn concurrent_sessions_stay_within_the_hard_ceiling() {
    let (fake, links) = slow_site(10);
    let (_registry, registration) = registered("peak-ceiling");
    let input = links.iter().map(|l| listing(l, "Casa")).collect();
    let settings = fast_settings();

    enrich_listings(input, 16, fake.shared(), &registration.token(), &settings).unwrap();

    assert!(fake.peak_open() <= settings.max_detail_workers);
    assert_eq!(fake.closed(), 10);
}

#[test]
fn concurrent_sessions_stay_within_link_count() {
    let (fake, links) = slow_site(2);
    let (_registry, registration) = registered("peak-links");
    let input = links.iter().map(|l| listing(l, "Casa")).collect();

    enrich_listings(input, 8, fake.shared(), &registration.token(), &fast_settings()).unwrap();

    assert!(fake.peak_open() <= 2);
}
