// src/tests/listing_tests.rs
use crate::domain::listing::{
    is_fetchable_link, EnrichedFields, ListingRecord, Location, EXPORT_COLUMNS, UNAVAILABLE,
};

#[test]
fn location_splits_neighborhood_city_state() {
    let loc = Location::from_address("Barra da Tijuca, Rio de Janeiro - RJ");
    assert_eq!(loc.neighborhood, "Barra da Tijuca");
    assert_eq!(loc.city, "Rio de Janeiro");
    assert_eq!(loc.state, "RJ");
}

#[test]
fn location_without_state_defaults_to_rj() {
    let loc = Location::from_address("Icaraí, Niterói");
    assert_eq!(loc.neighborhood, "Icaraí");
    assert_eq!(loc.city, "Niterói");
    assert_eq!(loc.state, "RJ");
}

#[test]
fn location_without_comma_uses_capital_defaults() {
    let loc = Location::from_address("Leblon");
    assert_eq!(loc.neighborhood, "Leblon");
    assert_eq!(loc.city, "Rio de Janeiro");
    assert_eq!(loc.state, "RJ");
}

#[test]
fn sentinel_address_gives_sentinel_location() {
    let loc = Location::from_address(UNAVAILABLE);
    assert_eq!(loc.neighborhood, UNAVAILABLE);
    assert_eq!(loc.city, UNAVAILABLE);
    assert_eq!(loc.state, UNAVAILABLE);
}

#[test]
fn merge_prefers_real_values_over_sentinel() {
    let current = EnrichedFields {
        phone: "(21) 3333-0000".into(),
        ..EnrichedFields::unavailable()
    };
    let newer = EnrichedFields {
        title: "Casa".into(),
        phone: UNAVAILABLE.into(),
        ..EnrichedFields::unavailable()
    };

    let merged = current.merge(newer);

    assert_eq!(merged.title, "Casa");
    assert_eq!(merged.phone, "(21) 3333-0000");
    assert_eq!(merged.description, UNAVAILABLE);
}

#[test]
fn new_record_is_all_sentinel_except_labels() {
    let record = ListingRecord::new("Casa", "Aluguel");

    assert_eq!(record.site, "Viva Real");
    assert_eq!(record.property_type, "Casa");
    assert_eq!(record.transaction, "Aluguel");
    assert!(record.dedup_key().is_none());
    assert!(!record.has_fetchable_link());
    assert!(record.details.is_all_unavailable());
}

#[test]
fn export_row_matches_columns() {
    let mut record = ListingRecord::new("Casa", "Venda");
    record.link = "https://x.test/9".into();

    let row = record.export_row();

    assert_eq!(row.len(), EXPORT_COLUMNS.len());
    assert_eq!(row[0], ("Site", "Viva Real"));
    assert_eq!(row[24], ("Link", "https://x.test/9"));
}

#[test]
fn fetchable_links_need_an_http_scheme() {
    assert!(is_fetchable_link("https://www.vivareal.com.br/imovel/1/"));
    assert!(is_fetchable_link("http://x.test/a"));
    assert!(!is_fetchable_link(""));
    assert!(!is_fetchable_link(UNAVAILABLE));
    assert!(!is_fetchable_link("/imovel/1/"));
    assert!(!is_fetchable_link("httpfoo"));
}
