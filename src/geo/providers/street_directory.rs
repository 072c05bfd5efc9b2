//! Street Directory, reached through a page that runs the query in a browser
//! context and embeds the JSON payload in the `#query_results` element.
//!
//! Payload keys are the service's own: `t` title, `a` address, `pc` postal
//! code, `x` longitude, `y` latitude, `no.` block number, `total` hit count.

use super::{coordinate, postal_field, text_field, GeoBackend};
use crate::config::GeoConfig;
use crate::geo::address;
use crate::geo::throttle::Throttle;
use crate::geo::types::{GeocodeResult, GeoError, Result};
use log::debug;
use scraper::{Html, Selector};
use serde_json::Value;

/// An automation session able to render a query page and hand back its payload.
pub trait PageDriver {
    fn query(&mut self, url: &str) -> Result<Value>;

    /// Release the session. Called once, when the owning backend is done.
    fn close(&mut self);
}

/// Page driver holding a single HTTP session for the whole batch.
pub struct HttpPageDriver {
    agent: Option<ureq::Agent>,
}

impl HttpPageDriver {
    pub fn new(config: &GeoConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout())
            .build();
        Self { agent: Some(agent) }
    }
}

impl PageDriver for HttpPageDriver {
    fn query(&mut self, url: &str) -> Result<Value> {
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| GeoError::Network("page session already closed".into()))?;
        debug!("Street Directory GET {}", url);
        let html = agent.get(url).call()?.into_string()?;
        extract_payload(&html)
    }

    fn close(&mut self) {
        if self.agent.take().is_some() {
            debug!("Street Directory session closed");
        }
    }
}

/// Pull the JSON payload out of the rendered page.
pub(crate) fn extract_payload(html: &str) -> Result<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#query_results")
        .map_err(|e| GeoError::Upstream(format!("bad selector: {}", e)))?;
    let element = document
        .select(&selector)
        .next()
        .ok_or_else(|| GeoError::Upstream("page has no #query_results element".into()))?;
    let text: String = element.text().collect();
    serde_json::from_str(text.trim())
        .map_err(|e| GeoError::Upstream(format!("Street Directory payload: {}", e)))
}

/// Street Directory backend. Owns its page session and closes it on drop.
pub struct StreetDirectory<D: PageDriver> {
    driver: D,
    loader_url: String,
    throttle: Throttle,
    closed: bool,
}

impl StreetDirectory<HttpPageDriver> {
    pub fn new(config: &GeoConfig, throttle: Throttle) -> Self {
        Self::with_driver(
            HttpPageDriver::new(config),
            config.street_directory.loader_url.clone(),
            throttle,
        )
    }
}

impl<D: PageDriver> StreetDirectory<D> {
    pub fn with_driver(driver: D, loader_url: impl Into<String>, throttle: Throttle) -> Self {
        Self {
            driver,
            loader_url: loader_url.into(),
            throttle,
            closed: false,
        }
    }

    /// Every page load goes through here.
    fn query(&mut self, url: &str) -> Result<Value> {
        self.throttle.wait();
        self.driver.query(url)
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.driver.close();
            self.closed = true;
        }
    }

    fn forward_url(&self, query: &str) -> String {
        format!("{}?g={}", self.loader_url, urlencoding::encode(query))
    }

    fn reverse_url(&self, lat: f64, lng: f64) -> String {
        format!("{}?r={},{}", self.loader_url, lat, lng)
    }
}

impl<D: PageDriver> Drop for StreetDirectory<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: PageDriver> GeoBackend for StreetDirectory<D> {
    fn name(&self) -> &str {
        "StreetDirectory"
    }

    fn geocode(&mut self, address: &str) -> Result<Option<GeocodeResult>> {
        let url = self.forward_url(address);
        let payload = self.query(&url)?;
        let block = address::block_token(address);
        let block = address::strip_suffix(block).unwrap_or(block);
        pick_forward(&payload, block)
    }

    fn geocode_reverse(&mut self, block: &str, street: &str) -> Result<Option<GeocodeResult>> {
        let url = self.forward_url(street);
        let street_payload = self.query(&url)?;
        let Some((lat, lng)) = street_position(&street_payload)? else {
            return Ok(None);
        };

        let url = self.reverse_url(lat, lng);
        let building = self.query(&url)?;
        if text_field(building.get("no.")).as_deref() != Some(block) {
            return Ok(None);
        }
        to_geocode(&building).map(Some)
    }
}

fn to_geocode(record: &Value) -> Result<GeocodeResult> {
    Ok(GeocodeResult {
        title: text_field(record.get("t")).unwrap_or_default(),
        lat: coordinate(record.get("y"), "y")?,
        long: coordinate(record.get("x"), "x")?,
        postal: postal_field(record.get("pc")),
    })
}

fn records(payload: &Value) -> Result<&[Value]> {
    payload
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| GeoError::Upstream("Street Directory payload is not a list".into()))
}

fn is_place(record: &Value) -> bool {
    record.get("a").is_some() && record.get("t").is_some()
}

/// Pick a record for `block` (suffix already stripped): one whose postal code
/// ends in the block number, else an HDB-titled place, else the first place.
fn pick_forward(payload: &Value, block: &str) -> Result<Option<GeocodeResult>> {
    let records = records(payload)?;

    let by_postal = records.iter().find(|r| {
        text_field(r.get("pc"))
            .and_then(|pc| pc.len().checked_sub(3).and_then(|i| pc.get(i..)).map(|tail| tail == block))
            .unwrap_or(false)
    });
    let hdb_titled = || {
        records.iter().find(|r| {
            is_place(r)
                && r.get("t")
                    .and_then(Value::as_str)
                    .map(|t| t.contains("HDB"))
                    .unwrap_or(false)
        })
    };
    let any_place = || records.iter().find(|r| is_place(r));

    by_postal
        .or_else(hdb_titled)
        .or_else(any_place)
        .map(to_geocode)
        .transpose()
}

/// Street coordinates from a street query: a header record with `total`,
/// followed by the hits.
fn street_position(payload: &Value) -> Result<Option<(f64, f64)>> {
    let records = records(payload)?;
    let total = records
        .first()
        .and_then(|header| super::number_field(header.get("total")))
        .unwrap_or(0.0);
    if total == 0.0 {
        return Ok(None);
    }
    let Some(street) = records.get(1) else {
        return Ok(None);
    };
    Ok(Some((coordinate(street.get("y"), "y")?, coordinate(street.get("x"), "x")?)))
}
