use crate::error::Result;
use crate::weather::location::GeoEntity;
use crate::weather::snapshot::WeatherSnapshot;
use std::future::Future;

/// Provider of current weather for a coordinate pair
pub trait WeatherSource: Send + Sync {
    fn current_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<WeatherSnapshot>> + Send;
}

/// Provider of the parcels whose weather we track
pub trait ParcelSource: Send + Sync {
    fn list_parcels(&self) -> impl Future<Output = Result<Vec<GeoEntity>>> + Send;
}
