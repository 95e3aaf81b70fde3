//! NMEA navigation sentence routing and resolution.
//!
//! NME0 datagrams carry one talker sentence each. Sentences are collected
//! verbatim into per-kind buckets during the decode pass; at finalization
//! the single highest-quality non-empty bucket is resolved into decimal
//! degree latitude/longitude sequences and the rest are discarded.

/// Per-file navigation sentence log.
///
/// Only the six sentence kinds this format is known to emit are kept; any
/// other sentence is dropped at routing time.
#[derive(Debug, Default)]
pub(crate) struct NavLog {
    gpgga: Vec<String>,
    gpgll: Vec<String>,
    gprmc: Vec<String>,
    ingga: Vec<String>,
    ingll: Vec<String>,
    inrmc: Vec<String>,
}

impl NavLog {
    /// Route `sentence` into the bucket of the first identifier it
    /// contains, testing in priority order.
    pub fn route(&mut self, sentence: String) {
        let bucket = if sentence.contains("GPGGA") {
            &mut self.gpgga
        } else if sentence.contains("GPGLL") {
            &mut self.gpgll
        } else if sentence.contains("GPRMC") {
            &mut self.gprmc
        } else if sentence.contains("INGGA") {
            &mut self.ingga
        } else if sentence.contains("INGLL") {
            &mut self.ingll
        } else if sentence.contains("INRMC") {
            &mut self.inrmc
        } else {
            return;
        };
        bucket.push(sentence);
    }

    /// Resolve the log into latitude/longitude sequences, in raw sentence
    /// append order.
    ///
    /// Exactly one bucket contributes: the first non-empty one in quality
    /// order (GGA fixes over GLL over RMC, GPS talkers over integrated
    /// navigation). Sentences that fail to parse are silently dropped and
    /// never produce a coordinate pair.
    pub fn resolve(&self) -> (Vec<f64>, Vec<f64>) {
        let buckets = [
            &self.gpgga,
            &self.gpgll,
            &self.ingga,
            &self.ingll,
            &self.gprmc,
            &self.inrmc,
        ];
        let Some(bucket) = buckets.into_iter().find(|b| !b.is_empty()) else {
            return (Vec::new(), Vec::new());
        };

        let mut latitudes = Vec::with_capacity(bucket.len());
        let mut longitudes = Vec::with_capacity(bucket.len());
        for sentence in bucket {
            if let Some((lat, lon)) = position(sentence) {
                latitudes.push(lat);
                longitudes.push(lon);
            }
        }
        (latitudes, longitudes)
    }
}

/// Extract the coordinate pair from one talker sentence, or `None` if the
/// sentence is missing a hemisphere marker or carries a malformed value.
fn position(sentence: &str) -> Option<(f64, f64)> {
    let fields: Vec<&str> = sentence.split(',').collect();
    let lat = hemisphere_value(&fields, "N", "S", 90)?;
    let lon = hemisphere_value(&fields, "E", "W", 180)?;
    Some((lat, lon))
}

/// Locate a hemisphere marker field and convert the field immediately
/// preceding it. The value is negated for the `negative` (S/W) marker.
fn hemisphere_value(fields: &[&str], positive: &str, negative: &str, max_degrees: u32) -> Option<f64> {
    let (index, sign) = match fields.iter().position(|f| *f == positive) {
        Some(index) => (index, 1.0),
        None => (fields.iter().position(|f| *f == negative)?, -1.0),
    };
    if index == 0 {
        return None;
    }
    Some(sign * decimal_degrees(fields[index - 1], max_degrees)?)
}

/// Convert a concatenated degrees+minutes token (e.g. `"4916.45"`) to
/// decimal degrees. The last two integer digits before the decimal point
/// are the whole minutes; the remainder is degrees.
fn decimal_degrees(token: &str, max_degrees: u32) -> Option<f64> {
    let (whole, fraction) = token.split_once('.')?;
    if whole.len() < 2 {
        return None;
    }
    let (degrees, whole_minutes) = whole.split_at(whole.len() - 2);
    let degrees: u32 = degrees.parse().ok()?;
    let minutes: f64 = format!("{whole_minutes}.{fraction}").parse().ok()?;
    if degrees > max_degrees || !(0.0..60.0).contains(&minutes) {
        return None;
    }
    Some(f64::from(degrees) + minutes / 60.0)
}
