// src/domain/listing.rs

use serde::Serialize;
use url::Url;

/// Explicit "unavailable" marker. Missing data is always this value, never an
/// absent field, so consumers must treat it as null.
pub const UNAVAILABLE: &str = "N/A";

pub const SITE_NAME: &str = "Viva Real";

// Search results on the site default to the state capital.
const DEFAULT_CITY: &str = "Rio de Janeiro";
const DEFAULT_STATE: &str = "RJ";

pub fn is_unavailable(value: &str) -> bool {
    value.trim().is_empty() || value == UNAVAILABLE
}

fn unavailable() -> String {
    UNAVAILABLE.to_string()
}

/// Column order handed to the export layer.
pub const EXPORT_COLUMNS: [&str; 25] = [
    "Site",
    "Property Type",
    "Transaction",
    "Ad Title",
    "Ad Codes",
    "Price",
    "Condo Fee",
    "Property Tax",
    "Bedrooms",
    "Bathrooms",
    "Parking",
    "Area m²",
    "Street",
    "Neighborhood",
    "City",
    "State",
    "Full Address",
    "Advertiser",
    "License",
    "Advertiser Rating",
    "Advertiser Listings",
    "Description",
    "Phone",
    "Created",
    "Link",
];

/// Attributes only available on a listing's own detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedFields {
    pub advertiser: String,
    pub license: String,
    pub advertiser_rating: String,
    pub advertiser_listings: String,
    pub title: String,
    pub ad_codes: String,
    pub description: String,
    pub phone: String,
    pub created_at: String,
    pub full_address: String,
}

impl Default for EnrichedFields {
    fn default() -> Self {
        Self {
            advertiser: unavailable(),
            license: unavailable(),
            advertiser_rating: unavailable(),
            advertiser_listings: unavailable(),
            title: unavailable(),
            ad_codes: unavailable(),
            description: unavailable(),
            phone: unavailable(),
            created_at: unavailable(),
            full_address: unavailable(),
        }
    }
}

impl EnrichedFields {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_all_unavailable(&self) -> bool {
        self.values().iter().all(|v| is_unavailable(v))
    }

    /// Union of two field sets. A value from `newer` wins unless it is the
    /// sentinel, in which case the current value is kept.
    pub fn merge(self, newer: EnrichedFields) -> EnrichedFields {
        fn pick(current: String, newer: String) -> String {
            if is_unavailable(&newer) {
                current
            } else {
                newer
            }
        }

        EnrichedFields {
            advertiser: pick(self.advertiser, newer.advertiser),
            license: pick(self.license, newer.license),
            advertiser_rating: pick(self.advertiser_rating, newer.advertiser_rating),
            advertiser_listings: pick(self.advertiser_listings, newer.advertiser_listings),
            title: pick(self.title, newer.title),
            ad_codes: pick(self.ad_codes, newer.ad_codes),
            description: pick(self.description, newer.description),
            phone: pick(self.phone, newer.phone),
            created_at: pick(self.created_at, newer.created_at),
            full_address: pick(self.full_address, newer.full_address),
        }
    }

    fn values(&self) -> [&str; 10] {
        [
            &self.advertiser,
            &self.license,
            &self.advertiser_rating,
            &self.advertiser_listings,
            &self.title,
            &self.ad_codes,
            &self.description,
            &self.phone,
            &self.created_at,
            &self.full_address,
        ]
    }
}

/// Neighborhood / city / state derived from the card's address line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

impl Location {
    /// Splits the usual `"Bairro, Cidade - UF"` shape. Anything else falls
    /// back to the capital defaults.
    pub fn from_address(address: &str) -> Self {
        if is_unavailable(address) {
            return Self {
                neighborhood: unavailable(),
                city: unavailable(),
                state: unavailable(),
            };
        }

        let parts: Vec<&str> = address.split(',').collect();
        if parts.len() < 2 {
            return Self {
                neighborhood: address.trim().to_string(),
                city: DEFAULT_CITY.to_string(),
                state: DEFAULT_STATE.to_string(),
            };
        }

        let neighborhood = parts[0].trim().to_string();
        let city_state = parts[1].trim();

        match city_state.split_once(" - ") {
            Some((city, state)) => Self {
                neighborhood,
                city: city.trim().to_string(),
                state: state.trim().to_string(),
            },
            None => Self {
                neighborhood,
                city: city_state.to_string(),
                state: DEFAULT_STATE.to_string(),
            },
        }
    }
}

/// One advertisement as scraped from a results page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRecord {
    pub site: String,
    pub property_type: String,
    pub transaction: String,
    pub link: String,
    pub street: String,
    pub address: String,
    pub location: Location,
    pub price: String,
    pub condo_fee: String,
    pub property_tax: String,
    pub area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking_spaces: String,
    pub details: EnrichedFields,
}

impl ListingRecord {
    /// Blank record stamped with the labels the search was made with.
    pub fn new(property_type: &str, transaction: &str) -> Self {
        let label = |s: &str| {
            if s.trim().is_empty() {
                unavailable()
            } else {
                s.trim().to_string()
            }
        };

        Self {
            site: SITE_NAME.to_string(),
            property_type: label(property_type),
            transaction: label(transaction),
            link: unavailable(),
            street: unavailable(),
            address: unavailable(),
            location: Location::from_address(UNAVAILABLE),
            price: unavailable(),
            condo_fee: unavailable(),
            property_tax: unavailable(),
            area: unavailable(),
            bedrooms: unavailable(),
            bathrooms: unavailable(),
            parking_spaces: unavailable(),
            details: EnrichedFields::unavailable(),
        }
    }

    pub fn set_address(&mut self, address: String) {
        self.location = Location::from_address(&address);
        self.address = address;
    }

    /// Key used for deduplication. Records without a real link have none.
    pub fn dedup_key(&self) -> Option<&str> {
        if is_unavailable(&self.link) {
            None
        } else {
            Some(self.link.as_str())
        }
    }

    /// Whether the detail page can be visited at all.
    pub fn has_fetchable_link(&self) -> bool {
        is_fetchable_link(&self.link)
    }

    pub fn merge_details(&mut self, fields: EnrichedFields) {
        let current = std::mem::take(&mut self.details);
        self.details = current.merge(fields);
    }

    /// Values in `EXPORT_COLUMNS` order.
    pub fn export_values(&self) -> [&str; 25] {
        let d = &self.details;
        [
            &self.site,
            &self.property_type,
            &self.transaction,
            &d.title,
            &d.ad_codes,
            &self.price,
            &self.condo_fee,
            &self.property_tax,
            &self.bedrooms,
            &self.bathrooms,
            &self.parking_spaces,
            &self.area,
            &self.street,
            &self.location.neighborhood,
            &self.location.city,
            &self.location.state,
            &d.full_address,
            &d.advertiser,
            &d.license,
            &d.advertiser_rating,
            &d.advertiser_listings,
            &d.description,
            &d.phone,
            &d.created_at,
            &self.link,
        ]
    }

    /// Flat key -> text mapping for the export layer.
    pub fn export_row(&self) -> Vec<(&'static str, &str)> {
        EXPORT_COLUMNS
            .iter()
            .copied()
            .zip(self.export_values())
            .collect()
    }
}

pub fn is_fetchable_link(link: &str) -> bool {
    if is_unavailable(link) || !link.starts_with("http") {
        return false;
    }
    Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
