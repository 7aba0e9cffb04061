// src/tests/utils.rs
use crate::config::{CooldownRange, HarvestSettings};
use crate::domain::listing::ListingRecord;
use crate::jobs::registry::{CancellationRegistry, JobId, JobRegistration};
use crate::scraping::browser::{BrowserLauncher, BrowserSession, SessionKind, SessionProfile};
use crate::scraping::ScraperError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Settings with every pause removed so tests run at full speed.
pub fn fast_settings() -> HarvestSettings {
    HarvestSettings {
        results_wait: Duration::from_secs(1),
        detail_settle: Duration::ZERO,
        detail_result_timeout: Duration::from_secs(5),
        page_cooldown: CooldownRange::NONE,
        detail_cooldown: CooldownRange::NONE,
        ..HarvestSettings::default()
    }
}

/// A fresh registry with `job` registered on it.
pub fn registered(job: &str) -> (Arc<CancellationRegistry>, JobRegistration) {
    let registry = Arc::new(CancellationRegistry::new());
    let registration = JobRegistration::register(&registry, JobId::new(job));
    (registry, registration)
}

#[derive(Clone)]
enum FakePage {
    Html(String),
    Slow(Duration, String),
    Timeout,
    Panic,
}

type OpenHook = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    pages: Mutex<HashMap<String, FakePage>>,
    opened: Mutex<Vec<String>>,
    launched: AtomicUsize,
    detail_launches: AtomicUsize,
    closed: AtomicUsize,
    open_now: AtomicUsize,
    peak_open: AtomicUsize,
    hook: Mutex<Option<OpenHook>>,
}

/// In-memory browser. Serves canned HTML per URL and counts sessions.
/// Unknown URLs fail navigation.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: String) -> Self {
        self.insert(url, FakePage::Html(html));
        self
    }

    /// Opening the page blocks for `delay` before it renders.
    pub fn with_slow_page(self, url: &str, delay: Duration, html: String) -> Self {
        self.insert(url, FakePage::Slow(delay, html));
        self
    }

    /// The page never shows the element being waited for.
    pub fn with_timeout(self, url: &str) -> Self {
        self.insert(url, FakePage::Timeout);
        self
    }

    /// Opening the page panics inside the worker.
    pub fn with_panic(self, url: &str) -> Self {
        self.insert(url, FakePage::Panic);
        self
    }

    /// Called with the URL every time a session opens a page.
    pub fn on_open(self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        *self.state.hook.lock().unwrap() = Some(Box::new(hook));
        self
    }

    fn insert(&self, url: &str, page: FakePage) {
        self.state.pages.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn launched(&self) -> usize {
        self.state.launched.load(Ordering::SeqCst)
    }

    pub fn detail_launches(&self) -> usize {
        self.state.detail_launches.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Most sessions that were alive at the same time.
    pub fn peak_open(&self) -> usize {
        self.state.peak_open.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn shared(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(self.clone())
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>, ScraperError> {
        self.state.launched.fetch_add(1, Ordering::SeqCst);
        let open = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_open.fetch_max(open, Ordering::SeqCst);
        if profile.kind == SessionKind::DetailPage {
            self.state.detail_launches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            current: None,
        }))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
    current: Option<FakePage>,
}

impl BrowserSession for FakeSession {
    fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        self.state.opened.lock().unwrap().push(url.to_string());
        if let Some(hook) = self.state.hook.lock().unwrap().as_ref() {
            hook(url);
        }

        let page = self.state.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(FakePage::Panic) => panic!("fake browser crashed on {url}"),
            Some(FakePage::Slow(delay, html)) => {
                thread::sleep(delay);
                self.current = Some(FakePage::Html(html));
                Ok(())
            }
            Some(page) => {
                self.current = Some(page);
                Ok(())
            }
            None => Err(ScraperError::Navigation(format!("{url}: not found"))),
        }
    }

    fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<(), ScraperError> {
        match &self.current {
            Some(FakePage::Html(_)) => Ok(()),
            _ => Err(ScraperError::Timeout(format!("waiting for {selector}"))),
        }
    }

    fn html(&mut self) -> Result<String, ScraperError> {
        match &self.current {
            Some(FakePage::Html(html)) => Ok(html.clone()),
            _ => Err(ScraperError::Browser("no document".into())),
        }
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.open_now.fetch_sub(1, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// One listing card as the results page renders it.
#[derive(Debug, Clone)]
pub struct CardFixture {
    pub link: String,
    pub street: String,
    pub location: String,
    pub price: String,
    pub fees: String,
    pub area: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub parking: String,
}

pub fn card(link: &str) -> CardFixture {
    CardFixture {
        link: link.to_string(),
        street: "Rua Barata Ribeiro, 200".to_string(),
        location: "Copacabana, Rio de Janeiro - RJ".to_string(),
        price: "R$ 850.000".to_string(),
        fees: "Cond. R$ 1.200 • IPTU R$ 310".to_string(),
        area: "75 m²".to_string(),
        bedrooms: "2 quartos".to_string(),
        bathrooms: "2 banheiros".to_string(),
        parking: "1 vaga".to_string(),
    }
}

fn card_html(card: &CardFixture) -> String {
    format!(
        r#"<li data-cy="rp-property-cd">
  <a class="block" href="{link}">
    <h2 data-cy="rp-cardProperty-location-txt">{location}</h2>
    <p data-cy="rp-cardProperty-street-txt">{street}</p>
    <ul>
      <li data-cy="rp-cardProperty-propertyArea-txt">{area}</li>
      <li data-cy="rp-cardProperty-bedroomQuantity-txt">{bedrooms}</li>
      <li data-cy="rp-cardProperty-bathroomQuantity-txt">{bathrooms}</li>
      <li data-cy="rp-cardProperty-parkingSpacesQuantity-txt">{parking}</li>
    </ul>
    <div data-cy="rp-cardProperty-price-txt"><p>{price}</p><p>{fees}</p></div>
  </a>
</li>"#,
        link = card.link,
        location = card.location,
        street = card.street,
        area = card.area,
        bedrooms = card.bedrooms,
        bathrooms = card.bathrooms,
        parking = card.parking,
        price = card.price,
        fees = card.fees,
    )
}

pub fn results_page(cards: &[CardFixture]) -> String {
    let body: String = cards.iter().map(card_html).collect();
    format!(
        r#"<html><body><div class="results-list__container"><ul>{body}</ul></div></body></html>"#
    )
}

/// `count` cards with links unique to `page`.
pub fn numbered_cards(page: u32, count: usize) -> Vec<CardFixture> {
    (0..count)
        .map(|i| card(&format!("https://www.vivareal.com.br/imovel/p{page}-{i}/")))
        .collect()
}

pub fn detail_page(title: &str, advertiser: &str) -> String {
    format!(
        r#"<html><head><title>{title} | Viva Real</title></head><body>
<h1 class="section-title">{title}</h1>
<p data-cy="ldp-propertyCodes-txt">Código do anunciante: AP1234 | Código no Viva Real: 2712345678</p>
<p data-testid="address-info-value">Rua Barata Ribeiro, 200 - Copacabana, Rio de Janeiro - RJ</p>
<section data-testid="description-container">
  <p data-testid="description-content">Apartamento reformado, perto do metrô.</p>
</section>
<div data-testid="info-phone"><span>(21) 99999-0000</span></div>
<span data-testid="listing-created-date">Anúncio criado em 12/03/2024, atualizado há 2 dias</span>
<section data-testid="advertiser-info-container">
  <a data-testid="official-store-redirect-link" href="/imobiliaria/1">{advertiser}</a>
  <p>CRECI 12345-J</p>
  <div><div>4/5</div></div>
  <p>235 imóveis cadastrados</p>
</section>
</body></html>"#
    )
}

/// Plain record for filter and enricher tests.
pub fn listing(link: &str, property_type: &str) -> ListingRecord {
    let mut record = ListingRecord::new(property_type, "Venda");
    record.link = link.to_string();
    record
}
