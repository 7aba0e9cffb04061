use crate::config::HarvestSettings;
use crate::domain::listing::EnrichedFields;
use crate::jobs::registry::CancelToken;
use crate::scraping::browser::{BrowserLauncher, Cooldown, SessionProfile};
use crate::scraping::html::{element_text, first_text, is_leaf, pattern, selector};
use crate::scraping::ScraperError;
use scraper::Html;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Opens one listing's detail page in a lightweight session and reads the
/// advertiser and ad attributes. Always returns a full field set.
pub struct DetailFetcher {
    launcher: Arc<dyn BrowserLauncher>,
    token: CancelToken,
    settings: HarvestSettings,
}

impl DetailFetcher {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        token: CancelToken,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            launcher,
            token,
            settings,
        }
    }

    pub fn fetch(&self, link: &str) -> EnrichedFields {
        let job = self.token.job();
        if self.token.is_cancelled() {
            info!(%job, link, "Cancelled before detail fetch");
            return EnrichedFields::unavailable();
        }

        let _cooldown = Cooldown::new(self.settings.detail_cooldown);
        debug!(%job, link, "Fetching detail page");

        match self.render(link) {
            Ok(html) => parse_detail_page(&html, link),
            Err(e) => {
                error!(%job, link, "Detail page failed: {e}");
                EnrichedFields::unavailable()
            }
        }
    }

    fn render(&self, link: &str) -> Result<String, ScraperError> {
        let profile = SessionProfile::detail_page(self.settings.detail_page_load);
        let mut session = self.launcher.launch(&profile)?;
        session.open(link)?;
        if !self.settings.detail_settle.is_zero() {
            thread::sleep(self.settings.detail_settle);
        }
        session.html()
    }
}

type Step = fn(&Html, &mut EnrichedFields) -> Result<(), ScraperError>;

/// Runs every extraction step against the document. A failing step leaves
/// its fields at the sentinel and does not stop the others.
pub fn parse_detail_page(html: &str, link: &str) -> EnrichedFields {
    let document = Html::parse_document(html);
    let mut fields = EnrichedFields::unavailable();

    let steps: [(&str, Step); 7] = [
        ("advertiser", extract_advertiser),
        ("title", extract_title),
        ("codes", extract_codes),
        ("description", extract_description),
        ("phone", extract_phone),
        ("address", extract_full_address),
        ("created", extract_created_date),
    ];

    for (name, step) in steps {
        if let Err(e) = step(&document, &mut fields) {
            warn!(link, step = name, "Detail extraction step failed: {e}");
        }
    }

    fields
}

fn extract_advertiser(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let section_sel = selector("section[data-testid='advertiser-info-container']")?;
    let Some(section) = document.select(&section_sel).next() else {
        return Ok(());
    };

    let name_sels = [
        selector("a[data-testid='official-store-redirect-link']")?,
        selector("h3")?,
        selector("span.advertiser-name")?,
    ];
    if let Some(name) = name_sels.iter().find_map(|s| first_text(section, s)) {
        fields.advertiser = name;
    }

    let paragraph = selector("p")?;
    if let Some(license) = section
        .select(&paragraph)
        .map(element_text)
        .find(|text| text.to_lowercase().contains("creci"))
    {
        fields.license = license;
    }

    let div = selector("div")?;
    let rating = pattern(r"\d+/\d+")?;
    if let Some(score) = section
        .select(&div)
        .filter(|el| is_leaf(*el))
        .map(element_text)
        .find(|text| rating.is_match(text))
    {
        fields.advertiser_rating = score;
    }

    let text_blocks = selector("p, span, div")?;
    let number = pattern(r"(\d+(?:\.\d+)?)")?;
    for block in section.select(&text_blocks) {
        let text = element_text(block);
        let lower = text.to_lowercase();
        if !(lower.contains("imóve") || lower.contains("propriedade")) {
            continue;
        }
        if let Some(count) = number.captures(&text).and_then(|c| c.get(1)) {
            fields.advertiser_listings = count.as_str().to_string();
            break;
        }
    }

    Ok(())
}

fn extract_title(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let candidates = [selector("h1.section-title")?, selector("h1")?, selector("title")?];
    let root = document.root_element();
    if let Some(title) = candidates.iter().find_map(|s| first_text(root, s)) {
        fields.title = title;
    }
    Ok(())
}

fn extract_codes(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let codes = selector("p[data-cy='ldp-propertyCodes-txt']")?;
    if let Some(text) = first_text(document.root_element(), &codes) {
        fields.ad_codes = text;
    }
    Ok(())
}

fn extract_description(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let description = selector(
        "section[data-testid='description-container'] p[data-testid='description-content']",
    )?;
    if let Some(text) = first_text(document.root_element(), &description) {
        fields.description = text;
    }
    Ok(())
}

fn extract_phone(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let phone = selector("div[data-testid='info-phone'] span")?;
    if let Some(text) = first_text(document.root_element(), &phone) {
        fields.phone = text;
    }
    Ok(())
}

fn extract_full_address(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let root = document.root_element();
    let exact = [
        selector("p[data-testid='address-info-value']")?,
        selector("p.address-info-value")?,
    ];
    if let Some(address) = exact
        .iter()
        .filter_map(|s| first_text(root, s))
        .find(|text| text.chars().count() > 10)
    {
        fields.full_address = address;
        return Ok(());
    }

    // Markup drifted: fall back to any short text block that reads like an
    // address in the state.
    let blocks = selector("p, div, span")?;
    let found = document
        .select(&blocks)
        .filter(|el| is_leaf(*el))
        .map(element_text)
        .find(|text| looks_like_address(text));
    if let Some(address) = found {
        fields.full_address = address;
    }
    Ok(())
}

fn looks_like_address(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.contains(',')
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().count() > 15
        && (lower.contains("rio de janeiro") || lower.contains("rj"))
}

fn extract_created_date(document: &Html, fields: &mut EnrichedFields) -> Result<(), ScraperError> {
    let created = selector("span[data-testid='listing-created-date']")?;
    let Some(text) = first_text(document.root_element(), &created) else {
        return Ok(());
    };
    let date = pattern(r"(\d{1,2}/\d{1,2}/\d{4})")?;
    fields.created_at = date
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or(text);
    Ok(())
}
