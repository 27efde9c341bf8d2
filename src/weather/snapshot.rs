use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current conditions at one location, with flags computed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub rainfall_rate: f64,
    #[serde(default)]
    pub has_extreme_conditions: bool,
    #[serde(default)]
    pub is_extreme_temperature: bool,
    #[serde(default)]
    pub is_heavy_rain: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn alerts(&self) -> Vec<WeatherAlert> {
        let mut alerts = Vec::new();
        if self.is_extreme_temperature {
            alerts.push(WeatherAlert::ExtremeTemperature {
                temperature: self.temperature,
            });
        }
        if self.is_heavy_rain {
            alerts.push(WeatherAlert::HeavyRain {
                rainfall_rate: self.rainfall_rate,
            });
        }
        // Only reported on its own when no specific flag explains it
        if self.has_extreme_conditions && alerts.is_empty() {
            alerts.push(WeatherAlert::ExtremeConditions {
                description: self.description.clone(),
            });
        }
        alerts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherAlert {
    ExtremeTemperature { temperature: f64 },
    HeavyRain { rainfall_rate: f64 },
    ExtremeConditions { description: String },
}

impl fmt::Display for WeatherAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherAlert::ExtremeTemperature { temperature } => {
                write!(f, "Extreme temperature: {:.1}°C", temperature)
            }
            WeatherAlert::HeavyRain { rainfall_rate } => {
                write!(f, "Heavy rain: {:.1} mm/h", rainfall_rate)
            }
            WeatherAlert::ExtremeConditions { description } => {
                write!(f, "Extreme conditions: {}", description)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: 18.0,
            humidity: 70.0,
            rainfall_rate: 0.0,
            has_extreme_conditions: false,
            is_extreme_temperature: false,
            is_heavy_rain: false,
            description: "nublado".to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_calm_weather_has_no_alerts() {
        assert!(calm().alerts().is_empty());
    }

    #[test]
    fn test_flags_map_to_alerts() {
        let snapshot = WeatherSnapshot {
            temperature: 39.5,
            rainfall_rate: 22.0,
            has_extreme_conditions: true,
            is_extreme_temperature: true,
            is_heavy_rain: true,
            ..calm()
        };
        let alerts = snapshot.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].to_string(), "Extreme temperature: 39.5°C");
        assert_eq!(alerts[1].to_string(), "Heavy rain: 22.0 mm/h");
    }

    #[test]
    fn test_generic_extreme_conditions() {
        let snapshot = WeatherSnapshot {
            has_extreme_conditions: true,
            description: "granizo".to_string(),
            ..calm()
        };
        assert_eq!(
            snapshot.alerts(),
            vec![WeatherAlert::ExtremeConditions {
                description: "granizo".to_string()
            }]
        );
    }

    #[test]
    fn test_deserialize_defaults_fetched_at() {
        let json = r#"{"temperature": 21.0, "humidity": 55}"#;
        let snapshot: WeatherSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.temperature, 21.0);
        assert!(!snapshot.is_heavy_rain);
        assert!(snapshot.fetched_at <= Utc::now());
    }
}
