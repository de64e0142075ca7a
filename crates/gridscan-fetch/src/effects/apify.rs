use std::fmt;
use std::time::Duration;

use gridscan_geo::{Bounds, TypeFilter};
use gridscan_record::Record;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::{Value, json};
use tracing::debug;

use crate::data::Page;
use crate::effects::source::ListingSource;
use crate::error::SourceError;

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";
pub const DEFAULT_ACTOR: &str = "compass~crawler-google-places";

const MAX_ERROR_BODY: usize = 512;

/// Google Places listings through the Apify crawler actor.
///
/// Each call runs the actor synchronously over the cell polygon and returns
/// the whole dataset as a single page.
#[derive(Clone)]
pub struct ApifySource {
    client: reqwest::Client,
    token: String,
    base_url: String,
    actor: String,
    max_places: usize,
    language: String,
}

impl fmt::Debug for ApifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApifySource")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("actor", &self.actor)
            .field("max_places", &self.max_places)
            .field("language", &self.language)
            .finish()
    }
}

impl ApifySource {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), token)
    }

    pub fn with_client(client: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            actor: DEFAULT_ACTOR.to_string(),
            max_places: 500,
            language: "en".to_string(),
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Results cap sent as `maxCrawledPlacesPerSearch`. Keep it equal to
    /// [`FetchOptions::per_cell_cap`](crate::FetchOptions::per_cell_cap) so
    /// saturation is detected.
    #[must_use]
    pub fn max_places(mut self, max_places: usize) -> Self {
        self.max_places = max_places;
        self
    }

    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.base_url.trim_end_matches('/'),
            self.actor
        )
    }

    fn request_url(&self) -> Result<reqwest::Url, SourceError> {
        reqwest::Url::parse_with_params(&self.endpoint(), [("token", self.token.as_str())]).map_err(|e| {
            SourceError::Rejected {
                status: 0,
                message: format!("invalid endpoint {}: {e}", self.endpoint()),
            }
        })
    }

    /// Actor input restricted to the cell polygon.
    pub fn payload(&self, bounds: &Bounds) -> Value {
        json!({
            "allPlacesNoSearchAction": "all_places_no_search_ocr",
            "customGeolocation": {
                "type": "Polygon",
                "coordinates": [bounds.polygon_ring()],
            },
            "includeWebResults": false,
            "language": self.language,
            "maxCrawledPlacesPerSearch": self.max_places,
            "maxImages": 0,
            "scrapeContacts": false,
            "scrapeDirectories": false,
            "scrapeImageAuthors": false,
            "scrapePlaceDetailPage": false,
            "scrapeReviewsPersonalData": false,
            "scrapeTableReservationProvider": false,
            "skipClosedPlaces": false,
        })
    }
}

impl ListingSource for ApifySource {
    async fn fetch_page(
        &self,
        bounds: &Bounds,
        filter: &TypeFilter,
        _cursor: Option<&str>,
    ) -> Result<Page, SourceError> {
        if !bounds.is_well_formed() {
            return Err(SourceError::InvalidGeometry(bounds.to_string()));
        }

        let response = self
            .client
            .post(self.request_url()?)
            .json(&self.payload(bounds))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let mut message = response.text().await.unwrap_or_default();
            truncate_utf8(&mut message, MAX_ERROR_BODY);
            return Err(SourceError::from_status(status.as_u16(), message, retry_after));
        }

        let places: Vec<Value> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else if e.is_decode() {
                SourceError::MalformedResponse(e.to_string())
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let returned = places.len();
        let records: Vec<Record> = places
            .iter()
            .filter(|place| filter.matches(&categories(place)))
            .filter_map(normalize_place)
            .collect();
        debug!(returned, kept = records.len(), "actor run finished");

        Ok(Page::last(records).returned(returned))
    }
}

fn map_transport_error(error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout
    } else if error.is_builder() {
        SourceError::Rejected {
            status: 0,
            message: error.to_string(),
        }
    } else {
        SourceError::Network(error.to_string())
    }
}

/// Seconds form only; HTTP dates are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate_utf8(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn categories(place: &Value) -> Vec<&str> {
    place
        .get("categories")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn text(place: &Value, key: &str) -> Value {
    place
        .get(key)
        .and_then(Value::as_str)
        .map_or_else(|| Value::String(String::new()), |s| Value::String(s.to_string()))
}

fn number(place: &Value, key: &str) -> Value {
    place.get(key).filter(|v| v.is_number()).cloned().unwrap_or(json!(0))
}

/// Flatten one crawler item into a [`Record`] keyed by its `placeId`.
///
/// Items without a place id are dropped. Missing coordinates become `null`.
pub fn normalize_place(place: &Value) -> Option<Record> {
    let place_id = place.get("placeId")?.as_str()?.trim();
    if place_id.is_empty() {
        return None;
    }

    let location = place.get("location");
    let coordinate = |key: &str| {
        location
            .and_then(|l| l.get(key))
            .filter(|v| v.is_number())
            .cloned()
            .unwrap_or(Value::Null)
    };

    Some(
        Record::new(place_id)
            .attribute("business_name", text(place, "title"))
            .attribute("address", text(place, "address"))
            .attribute("phone", text(place, "phoneUnformatted"))
            .attribute("website", text(place, "website"))
            .attribute("rating", number(place, "totalScore"))
            .attribute("total_reviews", number(place, "reviewsCount"))
            .attribute("categories", categories(place))
            .attribute("latitude", coordinate("lat"))
            .attribute("longitude", coordinate("lng"))
            .attribute("place_id", place_id)
            .attribute("google_maps_url", text(place, "url")),
    )
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn bounds() -> Bounds {
        Bounds {
            south: 51.0,
            west: -114.1,
            north: 51.02,
            east: -114.07,
        }
    }

    #[test]
    fn payload_carries_closed_polygon_and_cap() {
        let source = ApifySource::new("secret").max_places(250);
        let payload = source.payload(&bounds());

        let ring = payload["customGeolocation"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[0], json!([-114.07, 51.02]));
        assert_eq!(payload["maxCrawledPlacesPerSearch"], json!(250));
    }

    #[test]
    fn endpoint_and_debug_hide_token() {
        let source = ApifySource::new("secret").base_url("http://localhost:9000/v2/");
        assert_eq!(
            source.endpoint(),
            "http://localhost:9000/v2/acts/compass~crawler-google-places/run-sync-get-dataset-items"
        );
        assert!(!format!("{source:?}").contains("secret"));

        let url = ApifySource::new("a b&c").request_url().unwrap();
        assert_eq!(url.query(), Some("token=a+b%26c"));

        let err = ApifySource::new("t").base_url("not a url").request_url().unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn normalizes_place() {
        let place = json!({
            "placeId": "ChIJ42",
            "title": "Old Cafe",
            "address": "1 Main St",
            "phoneUnformatted": "+14035550100",
            "totalScore": 4.5,
            "reviewsCount": 120,
            "categories": ["Cafe", "Bakery"],
            "location": { "lat": 51.0447, "lng": -114.0719 },
            "url": "https://maps.google.com/?cid=42"
        });
        let record = normalize_place(&place).unwrap();

        assert_eq!(record.unique_id, "ChIJ42");
        assert_eq!(record.get("business_name"), Some(&json!("Old Cafe")));
        assert_eq!(record.get("website"), Some(&json!("")));
        assert_eq!(record.get("categories"), Some(&json!(["Cafe", "Bakery"])));
        assert_eq!(record.coordinates(), Some((51.0447, -114.0719)));
    }

    #[test]
    fn drops_place_without_id() {
        assert!(normalize_place(&json!({ "title": "Nameless" })).is_none());
        assert!(normalize_place(&json!({ "placeId": "  " })).is_none());

        let record = normalize_place(&json!({ "placeId": "p" })).unwrap();
        assert_eq!(record.get("latitude"), Some(&Value::Null));
        assert_eq!(record.coordinates(), None);
    }

    #[test]
    fn category_filter_is_case_insensitive() {
        let place = json!({ "placeId": "p", "categories": ["Coffee Shop"] });
        assert!(TypeFilter::only(["coffee shop"]).matches(&categories(&place)));
        assert!(!TypeFilter::only(["bar"]).matches(&categories(&place)));
        assert!(TypeFilter::All.matches(&categories(&json!({}))));
    }

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("45"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(45)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn error_body_truncated_on_char_boundary() {
        let mut text = "é".repeat(400);
        truncate_utf8(&mut text, MAX_ERROR_BODY);
        assert!(text.len() <= MAX_ERROR_BODY);
        assert!(text.chars().all(|c| c == 'é'));
    }
}
