//! City and event lookups: pure filtering over the loaded snapshots.

use crate::error::{Error, Result};
use crate::models::{City, StoreEvent};
use crate::store::{Document, FileStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[derive(Clone)]
pub struct CityService {
    store: Arc<FileStore>,
}

impl CityService {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    pub async fn list_cities(&self) -> Result<Vec<City>> {
        let cities: Vec<City> = self.store.read(Document::Cities).await?;
        Ok(cities.into_iter().filter(|c| c.active).collect())
    }

    /// Closest active city to the given coordinate.
    pub async fn nearest_city(&self, lat: f64, lng: f64) -> Result<City> {
        self.list_cities()
            .await?
            .into_iter()
            .min_by(|a, b| {
                let da = haversine_km(lat, lng, a.lat, a.lng);
                let db = haversine_km(lat, lng, b.lat, b.lng);
                da.total_cmp(&db)
            })
            .ok_or_else(|| Error::NotFound("serviceable city".into()))
    }

    /// Events whose window contains `now` and which run in the given city.
    pub async fn active_events(&self, city_id: &str, now: DateTime<Utc>) -> Result<Vec<StoreEvent>> {
        let events: Vec<StoreEvent> = self.store.read(Document::Events).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.is_active(city_id, now))
            .collect())
    }
}
