// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Last known vehicle position.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Map query for gas stations around this point.
    pub fn gas_station_query(&self) -> String {
        format!("geo:{},{}?q=gas+stations", self.latitude, self.longitude)
    }
}

/// Source of the last known location.
pub trait LocationPort: Send + Sync {
    fn last_known(&self) -> Option<GeoPoint>;
}

/// Location taken from configuration, or none at all.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation(Option<GeoPoint>);

impl FixedLocation {
    pub fn new(point: Option<GeoPoint>) -> Self {
        Self(point)
    }
}

impl LocationPort for FixedLocation {
    fn last_known(&self) -> Option<GeoPoint> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_station_query() {
        let point = GeoPoint {
            latitude: 52.52,
            longitude: 13.405,
        };
        assert_eq!(point.gas_station_query(), "geo:52.52,13.405?q=gas+stations");
    }
}
