pub mod coalescer;
pub mod location;
pub mod snapshot;
pub mod source;

pub use coalescer::{
    group_by_location, CachedWeather, GroupFailure, LocationGroup, RefreshPolicy, RefreshReport,
    RefreshState, WeatherCoalescer, WeatherEvent,
};
pub use location::{GeoEntity, LocationKey};
pub use snapshot::{WeatherAlert, WeatherSnapshot};
pub use source::{ParcelSource, WeatherSource};
