//! US EPA style air quality index.
//!
//! Each pollutant's sub-index is a piecewise-linear interpolation over its
//! own breakpoint table:
//!
//! ```text
//! I = (Ihi - Ilo) / (Chi - Clo) * (C - Clo) + Ilo
//! ```
//!
//! rounded half away from zero. The overall index is the largest sub-index.
//! A concentration that falls outside every row of its table (including the
//! gaps between rows, e.g. pm2.5 between 9.0 and 9.1) yields no sub-index.
//!
//! All concentrations are μg/m³; the CO table is expressed in μg/m³ too.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::normalize;
use crate::types::WeatherError;

/// Pollutants with a breakpoint table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "pm2_5")]
    Pm25,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "o3")]
    O3,
    #[serde(rename = "so2")]
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Self::Pm25,
        Self::Pm10,
        Self::Co,
        Self::No2,
        Self::O3,
        Self::So2,
    ];

    /// Provider component key
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Pm25 => "pm2_5",
            Self::Pm10 => "pm10",
            Self::Co => "co",
            Self::No2 => "no2",
            Self::O3 => "o3",
            Self::So2 => "so2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pm25 => "PM2.5",
            Self::Pm10 => "PM10",
            Self::Co => "CO",
            Self::No2 => "NO₂",
            Self::O3 => "O₃",
            Self::So2 => "SO₂",
        }
    }

    fn breakpoints(&self) -> &'static [Breakpoint] {
        match self {
            Self::Pm25 => &PM25,
            Self::Pm10 => &PM10,
            Self::Co => &CO,
            Self::No2 => &NO2,
            Self::O3 => &O3,
            Self::So2 => &SO2,
        }
    }

    /// Sub-index for a concentration, or `None` when it falls outside the table.
    pub fn sub_index(&self, concentration: f64) -> Option<u16> {
        self.breakpoints()
            .iter()
            .find(|bp| bp.contains(concentration))
            .map(|bp| bp.interpolate(concentration))
    }
}

/// One row of a breakpoint table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub c_lo: f64,
    pub c_hi: f64,
    pub i_lo: u16,
    pub i_hi: u16,
}

impl Breakpoint {
    const fn new(c_lo: f64, c_hi: f64, i_lo: u16, i_hi: u16) -> Self {
        Self {
            c_lo,
            c_hi,
            i_lo,
            i_hi,
        }
    }

    fn contains(&self, concentration: f64) -> bool {
        self.c_lo <= concentration && concentration <= self.c_hi
    }

    fn interpolate(&self, concentration: f64) -> u16 {
        let span = f64::from(self.i_hi - self.i_lo) / (self.c_hi - self.c_lo);
        let index = span * (concentration - self.c_lo) + f64::from(self.i_lo);
        // Bounded by i_hi <= 500, so the cast cannot truncate.
        index.round() as u16
    }
}

const PM25: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 9.0, 0, 50),
    Breakpoint::new(9.1, 35.4, 51, 100),
    Breakpoint::new(35.5, 55.4, 101, 150),
    Breakpoint::new(55.5, 125.4, 151, 200),
    Breakpoint::new(125.5, 225.4, 201, 300),
    Breakpoint::new(225.5, 325.4, 301, 500),
];

const PM10: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 54.0, 0, 50),
    Breakpoint::new(55.0, 154.0, 51, 100),
    Breakpoint::new(155.0, 254.0, 101, 150),
    Breakpoint::new(255.0, 354.0, 151, 200),
    Breakpoint::new(355.0, 424.0, 201, 300),
    Breakpoint::new(425.0, 604.0, 301, 500),
];

const CO: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 4400.0, 0, 50),
    Breakpoint::new(4401.0, 9400.0, 51, 100),
    Breakpoint::new(9401.0, 12400.0, 101, 150),
    Breakpoint::new(12401.0, 15400.0, 151, 200),
    Breakpoint::new(15401.0, 30400.0, 201, 300),
    Breakpoint::new(30401.0, 50400.0, 301, 500),
];

const NO2: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 40.0, 0, 50),
    Breakpoint::new(41.0, 70.0, 51, 100),
    Breakpoint::new(71.0, 150.0, 101, 150),
    Breakpoint::new(151.0, 200.0, 151, 200),
    Breakpoint::new(201.0, 1200.0, 201, 300),
    Breakpoint::new(1201.0, 2049.0, 301, 500),
];

const O3: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 60.0, 0, 50),
    Breakpoint::new(61.0, 100.0, 51, 100),
    Breakpoint::new(101.0, 140.0, 101, 150),
    Breakpoint::new(141.0, 180.0, 151, 200),
    Breakpoint::new(181.0, 300.0, 201, 300),
    Breakpoint::new(301.0, 604.0, 301, 500),
];

const SO2: [Breakpoint; 6] = [
    Breakpoint::new(0.0, 20.0, 0, 50),
    Breakpoint::new(21.0, 80.0, 51, 100),
    Breakpoint::new(81.0, 250.0, 101, 150),
    Breakpoint::new(251.0, 350.0, 151, 200),
    Breakpoint::new(351.0, 500.0, 201, 300),
    Breakpoint::new(501.0, 1004.0, 301, 500),
];

/// Pollutant concentrations in μg/m³
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollutantReading(BTreeMap<Pollutant, f64>);

impl PollutantReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pollutant: Pollutant, concentration: f64) {
        self.0.insert(pollutant, concentration);
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.0.get(&pollutant).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        self.0.iter().map(|(p, c)| (*p, *c))
    }
}

impl FromIterator<(Pollutant, f64)> for PollutantReading {
    fn from_iter<I: IntoIterator<Item = (Pollutant, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// AQI band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitive,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    /// Human-readable band name for display, e.g. "Unhealthy for Sensitive
    /// Groups". The serialized form is the variant name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// Display color as a hex code
    pub fn color(&self) -> &'static str {
        match self {
            Self::Good => "#2ecc71",
            Self::Moderate => "#f1c40f",
            Self::UnhealthyForSensitive => "#e67e22",
            Self::Unhealthy => "#e74c3c",
            Self::VeryUnhealthy => "#8e44ad",
            Self::Hazardous => "#7f8c8d",
        }
    }
}

/// Computed index with its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiResult {
    pub aqi: u16,
    pub category: AqiCategory,
    pub sub_indices: BTreeMap<Pollutant, u16>,
    pub concentrations: PollutantReading,
}

impl AqiResult {
    /// Combine precomputed sub-indices. The overall index is their maximum.
    pub fn from_sub_indices(
        sub_indices: BTreeMap<Pollutant, u16>,
        concentrations: PollutantReading,
    ) -> Result<Self, WeatherError> {
        let aqi = sub_indices
            .values()
            .copied()
            .max()
            .ok_or(WeatherError::NoPollutantData)?;

        Ok(Self {
            aqi,
            category: AqiCategory::from_aqi(aqi),
            sub_indices,
            concentrations,
        })
    }

    pub fn label(&self) -> &'static str {
        self.category.label()
    }

    pub fn color(&self) -> &'static str {
        self.category.color()
    }

    /// Pollutant with the highest sub-index
    pub fn dominant(&self) -> Option<Pollutant> {
        self.sub_indices
            .iter()
            .max_by_key(|(_, index)| **index)
            .map(|(pollutant, _)| *pollutant)
    }
}

/// Compute the AQI for a set of concentrations.
pub fn compute(reading: &PollutantReading) -> Result<AqiResult, WeatherError> {
    let sub_indices: BTreeMap<Pollutant, u16> = reading
        .iter()
        .filter_map(|(pollutant, concentration)| {
            let index = pollutant.sub_index(concentration);
            if index.is_none() {
                tracing::debug!(
                    "{} concentration {} is outside its breakpoint table",
                    pollutant.symbol(),
                    concentration
                );
            }
            index.map(|i| (pollutant, i))
        })
        .collect();

    AqiResult::from_sub_indices(sub_indices, reading.clone())
}

/// Normalize an air-pollution document and compute its AQI.
pub fn from_air_pollution(data: &Value) -> Result<AqiResult, WeatherError> {
    compute(&normalize::pollutants(data)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pm25_boundary_continuity() {
        assert_eq!(Pollutant::Pm25.sub_index(9.0), Some(50));
        assert_eq!(Pollutant::Pm25.sub_index(9.1), Some(51));
        assert_eq!(Pollutant::Pm25.sub_index(35.4), Some(100));
        assert_eq!(Pollutant::Pm25.sub_index(35.5), Some(101));
        assert_eq!(Pollutant::Pm25.sub_index(0.0), Some(0));
    }

    #[test]
    fn test_interpolation_midpoints() {
        // (100-51)/(35.4-9.1) * (20.0-9.1) + 51 = 71.3...
        assert_eq!(Pollutant::Pm25.sub_index(20.0), Some(71));
        // 50/54 * 27 = 25
        assert_eq!(Pollutant::Pm10.sub_index(27.0), Some(25));
        // 50/4400 * 2200 = 25
        assert_eq!(Pollutant::Co.sub_index(2200.0), Some(25));
        assert_eq!(Pollutant::So2.sub_index(1004.0), Some(500));
    }

    #[test]
    fn test_out_of_table_has_no_sub_index() {
        assert_eq!(Pollutant::Pm25.sub_index(9.05), None);
        assert_eq!(Pollutant::Pm25.sub_index(400.0), None);
        assert_eq!(Pollutant::Pm10.sub_index(54.5), None);
        assert_eq!(Pollutant::O3.sub_index(-1.0), None);
        assert_eq!(Pollutant::No2.sub_index(f64::NAN), None);
    }

    #[test]
    fn test_tables_ascending_and_non_overlapping() {
        for pollutant in Pollutant::ALL {
            let table = pollutant.breakpoints();
            for row in table {
                assert!(row.c_lo < row.c_hi, "{:?}", pollutant);
                assert!(row.i_lo < row.i_hi, "{:?}", pollutant);
            }
            for pair in table.windows(2) {
                assert!(pair[0].c_hi < pair[1].c_lo, "{:?}", pollutant);
                assert_eq!(pair[0].i_hi + 1, pair[1].i_lo, "{:?}", pollutant);
            }
        }
    }

    #[test]
    fn test_overall_is_max_of_sub_indices() {
        let sub_indices = BTreeMap::from([
            (Pollutant::Pm25, 42),
            (Pollutant::Pm10, 88),
            (Pollutant::Co, 10),
        ]);
        let result = AqiResult::from_sub_indices(sub_indices, PollutantReading::new()).unwrap();

        assert_eq!(result.aqi, 88);
        assert_eq!(result.category, AqiCategory::Moderate);
        assert_eq!(result.label(), "Moderate");
        assert_eq!(result.color(), "#f1c40f");
        assert_eq!(result.dominant(), Some(Pollutant::Pm10));
    }

    #[test]
    fn test_category_bands() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(100), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::UnhealthyForSensitive);
        assert_eq!(AqiCategory::from_aqi(200), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::from_aqi(300), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(301), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::from_aqi(500), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::Hazardous.color(), "#7f8c8d");
    }

    #[test]
    fn test_category_label_is_display_text() {
        let band = AqiCategory::UnhealthyForSensitive;
        assert_eq!(band.label(), "Unhealthy for Sensitive Groups");
        assert_eq!(serde_json::to_value(band).unwrap(), json!("UnhealthyForSensitive"));
        assert_eq!(
            serde_json::to_value(AqiCategory::VeryUnhealthy).unwrap(),
            json!("VeryUnhealthy")
        );
        assert_eq!(AqiCategory::VeryUnhealthy.label(), "Very Unhealthy");
    }

    #[test]
    fn test_compute_skips_out_of_table_pollutants() {
        let reading: PollutantReading = [
            (Pollutant::Pm25, 9.05),
            (Pollutant::O3, 61.0),
        ]
        .into_iter()
        .collect();

        let result = compute(&reading).unwrap();
        assert_eq!(result.aqi, 51);
        assert!(!result.sub_indices.contains_key(&Pollutant::Pm25));
        assert_eq!(result.concentrations.get(Pollutant::Pm25), Some(9.05));
    }

    #[test]
    fn test_compute_without_usable_data() {
        assert!(matches!(
            compute(&PollutantReading::new()),
            Err(WeatherError::NoPollutantData)
        ));

        let reading: PollutantReading = [(Pollutant::Pm25, 1000.0)].into_iter().collect();
        assert!(matches!(compute(&reading), Err(WeatherError::NoPollutantData)));
    }

    #[test]
    fn test_from_air_pollution() {
        let doc = json!({
            "list": [{
                "main": {"aqi": 3},
                "components": {"pm2_5": 40.0, "pm10": 30.0, "co": 300.0, "nh3": 2.0}
            }]
        });
        let result = from_air_pollution(&doc).unwrap();
        // pm2.5: 49/19.9 * 4.5 + 101 = 112.08
        assert_eq!(result.aqi, 112);
        assert_eq!(result.category, AqiCategory::UnhealthyForSensitive);
        assert_eq!(result.dominant(), Some(Pollutant::Pm25));
    }

    #[test]
    fn test_result_serializes_symbols() {
        let reading: PollutantReading = [(Pollutant::Pm25, 9.0)].into_iter().collect();
        let value = serde_json::to_value(compute(&reading).unwrap()).unwrap();
        assert_eq!(value["sub_indices"]["pm2_5"], 50);
        assert_eq!(value["concentrations"]["pm2_5"], 9.0);
    }
}
