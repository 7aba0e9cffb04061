use crate::config::HarvestSettings;
use crate::domain::listing::{ListingRecord, UNAVAILABLE};
use crate::jobs::registry::CancelToken;
use crate::scraping::browser::{BrowserLauncher, Cooldown, SessionProfile};
use crate::scraping::html::{element_text, first_text, pattern, selector};
use crate::scraping::ScraperError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Present once the result list, or its "nothing found" notice, has rendered.
pub const RESULTS_READY_MARKER: &str =
    "li[data-cy='rp-property-cd'], div.results-list__container > p";

/// Requested labels stamped onto every record of a search.
#[derive(Debug, Clone, Default)]
pub struct SearchLabels {
    pub property_type: String,
    pub transaction: String,
}

/// Page 1 is the base URL itself; later pages add `pagina=N`.
pub fn page_url(base_url: &str, page: u32) -> String {
    if page <= 1 {
        base_url.to_string()
    } else if base_url.contains('?') {
        format!("{base_url}&pagina={page}")
    } else {
        format!("{base_url}?pagina={page}")
    }
}

/// Renders one results page in its own browser session and parses the cards.
/// Never fails: every problem ends up as an empty (or partial) page.
pub struct PageFetcher {
    launcher: Arc<dyn BrowserLauncher>,
    base_url: String,
    labels: SearchLabels,
    token: CancelToken,
    settings: HarvestSettings,
}

impl PageFetcher {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        base_url: &str,
        labels: SearchLabels,
        token: CancelToken,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            launcher,
            base_url: base_url.to_string(),
            labels,
            token,
            settings,
        }
    }

    pub fn fetch(&self, page: u32) -> Vec<ListingRecord> {
        let job = self.token.job();
        if self.token.is_cancelled() {
            info!(%job, page, "Cancelled before page fetch");
            return Vec::new();
        }

        let url = page_url(&self.base_url, page);
        let _cooldown = Cooldown::new(self.settings.page_cooldown);

        match self.render_and_parse(page, &url) {
            Ok(records) => records,
            Err(ScraperError::Timeout(msg)) => {
                warn!(%job, page, "Timeout on results page, skipping: {msg}");
                Vec::new()
            }
            Err(e) => {
                error!(%job, page, "Results page failed: {e}");
                Vec::new()
            }
        }
    }

    fn render_and_parse(&self, page: u32, url: &str) -> Result<Vec<ListingRecord>, ScraperError> {
        let job = self.token.job();
        let profile = SessionProfile::results_page(self.settings.results_page_load);
        let mut session = self.launcher.launch(&profile)?;

        info!(%job, page, url, "Scraping results page");
        session.open(url)?;
        session.wait_for(RESULTS_READY_MARKER, self.settings.results_wait)?;

        if self.token.is_cancelled() {
            info!(%job, page, "Cancelled after page render");
            return Ok(Vec::new());
        }

        let html = session.html()?;
        let records = parse_results_page(&html, &self.labels, Some(&self.token))?;
        info!(%job, page, found = records.len(), "Parsed results page");
        Ok(records)
    }
}

struct CardSelectors {
    card: Selector,
    link: Selector,
    street: Selector,
    location: Selector,
    price_block: Selector,
    paragraph: Selector,
    area: Selector,
    bedrooms: Selector,
    bathrooms: Selector,
    parking: Selector,
    condo_fee: Regex,
    property_tax: Regex,
    digits: Regex,
}

impl CardSelectors {
    fn compile() -> Result<Self, ScraperError> {
        Ok(Self {
            card: selector("li[data-cy='rp-property-cd']")?,
            link: selector("a.block")?,
            street: selector("p[data-cy='rp-cardProperty-street-txt']")?,
            location: selector("h2[data-cy='rp-cardProperty-location-txt']")?,
            price_block: selector("div[data-cy='rp-cardProperty-price-txt']")?,
            paragraph: selector("p")?,
            area: selector("[data-cy='rp-cardProperty-propertyArea-txt']")?,
            bedrooms: selector("[data-cy='rp-cardProperty-bedroomQuantity-txt']")?,
            bathrooms: selector("[data-cy='rp-cardProperty-bathroomQuantity-txt']")?,
            parking: selector("[data-cy='rp-cardProperty-parkingSpacesQuantity-txt']")?,
            condo_fee: pattern(r"Cond\.\s*R\$\s*([\d\.,]+)")?,
            property_tax: pattern(r"IPTU\s*R\$\s*([\d\.,]+)")?,
            digits: pattern(r"\d+")?,
        })
    }
}

/// Parses every listing card on a results page. A card that cannot be read
/// is skipped; a cancelled token stops the walk and returns what was read so
/// far.
pub fn parse_results_page(
    html: &str,
    labels: &SearchLabels,
    token: Option<&CancelToken>,
) -> Result<Vec<ListingRecord>, ScraperError> {
    let sel = CardSelectors::compile()?;
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for (index, card) in document.select(&sel.card).enumerate() {
        if let Some(token) = token.filter(|t| t.is_cancelled()) {
            info!(job = %token.job(), parsed = records.len(), "Cancelled while parsing page");
            return Ok(records);
        }

        match parse_card(card, &sel, labels) {
            Ok(record) => records.push(record),
            Err(e) => warn!(card = index, "Skipping listing card: {e}"),
        }
    }

    Ok(records)
}

fn parse_card(
    card: ElementRef<'_>,
    sel: &CardSelectors,
    labels: &SearchLabels,
) -> Result<ListingRecord, ScraperError> {
    let link = card
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    if link.is_none() && element_text(card).is_empty() {
        return Err(ScraperError::UnexpectedShape(
            "listing card has no link and no text".into(),
        ));
    }

    let mut record = ListingRecord::new(&labels.property_type, &labels.transaction);

    if let Some(link) = link {
        record.link = link.to_string();
    }
    if let Some(street) = first_text(card, &sel.street) {
        record.street = street;
    }
    if let Some(address) = first_text(card, &sel.location) {
        record.set_address(address);
    }

    if let Some(price_block) = card.select(&sel.price_block).next() {
        let paragraphs: Vec<String> = price_block
            .select(&sel.paragraph)
            .map(element_text)
            .collect();

        if let Some(price) = paragraphs.first().filter(|p| !p.is_empty()) {
            record.price = price.clone();
        }
        if let Some(fees) = paragraphs.get(1) {
            record.condo_fee = capture(&sel.condo_fee, fees);
            record.property_tax = capture(&sel.property_tax, fees);
        }
    }

    // Area stays raw ("1.200 m²"); the filter reads the number out of it.
    record.area = first_text(card, &sel.area).unwrap_or_else(|| UNAVAILABLE.to_string());
    record.bedrooms = feature(card, &sel.bedrooms, &sel.digits);
    record.bathrooms = feature(card, &sel.bathrooms, &sel.digits);
    record.parking_spaces = feature(card, &sel.parking, &sel.digits);

    Ok(record)
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

/// First run of digits in the fragment, else its text, else the sentinel.
fn feature(card: ElementRef<'_>, selector: &Selector, digits: &Regex) -> String {
    let Some(text) = first_text(card, selector) else {
        return UNAVAILABLE.to_string();
    };
    digits
        .find(&text)
        .map(|m| m.as_str().to_string())
        .unwrap_or(text)
}
