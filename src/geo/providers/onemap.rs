//! OneMap: public search API plus the token-protected reverse geocoder.

use super::auth::{OneMapAuth, Token};
use super::{coordinate, postal_field, text_field, GeoBackend};
use crate::config::GeoConfig;
use crate::geo::address;
use crate::geo::throttle::Throttle;
use crate::geo::types::{GeocodeResult, GeoError, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug)]
struct SearchResponse {
    found: u64,
    #[serde(default)]
    results: Vec<Building>,
}

#[derive(Deserialize, Debug)]
struct ReverseResponse {
    #[serde(rename = "GeocodeInfo", default)]
    geocode_info: Vec<Building>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "UPPERCASE")]
struct Building {
    /// Block number in search results.
    blk_no: Option<Value>,
    /// Block number in reverse results.
    block: Option<Value>,
    building: Option<String>,
    latitude: Option<Value>,
    longitude: Option<Value>,
    postal: Option<Value>,
}

impl Building {
    fn to_geocode(&self) -> Result<GeocodeResult> {
        Ok(GeocodeResult {
            title: self.building.clone().unwrap_or_default(),
            lat: coordinate(self.latitude.as_ref(), "LATITUDE")?,
            long: coordinate(self.longitude.as_ref(), "LONGITUDE")?,
            postal: postal_field(self.postal.as_ref()),
        })
    }
}

/// Client for the OneMap API.
pub struct OneMap {
    agent: ureq::Agent,
    search_url: String,
    reverse_url: String,
    buffer: u32,
    auth: OneMapAuth,
    throttle: Throttle,
    /// Kept only while it stays outside the refresh margin.
    token: Option<Token>,
}

impl OneMap {
    /// Every request this client makes, token login included, waits on
    /// `throttle` first.
    pub fn new(config: &GeoConfig, throttle: Throttle) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout())
            .build();
        Self {
            agent,
            search_url: config.onemap.search_url.clone(),
            reverse_url: config.onemap.reverse_url.clone(),
            buffer: config.reverse_buffer,
            auth: OneMapAuth::from_config(config),
            throttle,
            token: None,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.throttle.wait();
        debug!("OneMap GET {}", url);
        let body = self.agent.get(url).call()?.into_string()?;
        serde_json::from_str(&body).map_err(|e| GeoError::Upstream(format!("OneMap: {}", e)))
    }

    fn search(&self, query: &str) -> Result<SearchResponse> {
        let url = format!(
            "{}?searchVal={}&returnGeom=Y&getAddrDetails=Y&pageNum=1",
            self.search_url,
            urlencoding::encode(query),
        );
        self.get_json(&url)
    }

    fn token(&mut self) -> Result<String> {
        match &self.token {
            Some(token) if self.auth.is_fresh_now(token) => return Ok(token.access_token.clone()),
            Some(token) => debug!("In-memory OneMap token expiring at {}, refreshing", token.expiry),
            None => {}
        }
        let token = self.auth.get_token(&self.agent, &self.throttle)?;
        let access = token.access_token.clone();
        self.token = Some(token);
        Ok(access)
    }
}

impl GeoBackend for OneMap {
    fn name(&self) -> &str {
        "OneMap"
    }

    fn geocode(&mut self, address: &str) -> Result<Option<GeocodeResult>> {
        let response = self.search(address)?;
        pick_search_result(&response, address::block_token(address))
    }

    fn geocode_reverse(&mut self, block: &str, street: &str) -> Result<Option<GeocodeResult>> {
        let street_hit = self.search(street)?;
        let Some((lat, lng)) = street_position(&street_hit)? else {
            return Ok(None);
        };

        let token = self.token()?;
        let url = format!(
            "{}?location={},{}&token={}&buffer={}&addressType=HDB",
            self.reverse_url,
            lat,
            lng,
            urlencoding::encode(&token),
            self.buffer,
        );
        let nearby: ReverseResponse = self.get_json(&url)?;
        pick_reverse_result(&nearby, block)
    }
}

/// Prefer the building whose `BLK_NO` equals the block token, else the first.
fn pick_search_result(response: &SearchResponse, block: &str) -> Result<Option<GeocodeResult>> {
    if response.found == 0 {
        return Ok(None);
    }
    let target = response
        .results
        .iter()
        .find(|b| text_field(b.blk_no.as_ref()).as_deref() == Some(block))
        .or_else(|| response.results.first());
    target.map(Building::to_geocode).transpose()
}

fn street_position(response: &SearchResponse) -> Result<Option<(f64, f64)>> {
    if response.found == 0 {
        return Ok(None);
    }
    let Some(first) = response.results.first() else {
        return Ok(None);
    };
    let lat = coordinate(first.latitude.as_ref(), "LATITUDE")?;
    let lng = coordinate(first.longitude.as_ref(), "LONGITUDE")?;
    Ok(Some((lat, lng)))
}

/// Strict: only a building numbered exactly `block` counts.
fn pick_reverse_result(response: &ReverseResponse, block: &str) -> Result<Option<GeocodeResult>> {
    response
        .geocode_info
        .iter()
        .find(|b| text_field(b.block.as_ref()).as_deref() == Some(block))
        .map(Building::to_geocode)
        .transpose()
}
