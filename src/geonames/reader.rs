//! Streaming reader for the tab-separated GeoNames dump format.
//!
//! The dump has a fixed 19-column schema, UTF-8, LF line endings, no header.
//! Records with missing or out-of-range coordinates are discarded and
//! counted rather than aborting the scan.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use hashbrown::HashSet;
use tracing::warn;

use crate::models::Place;

/// Column order of the dump file.
mod col {
    pub const GEONAME_ID: usize = 0;
    pub const NAME: usize = 1;
    pub const ASCII_NAME: usize = 2;
    pub const ALTERNATE_NAMES: usize = 3;
    pub const LATITUDE: usize = 4;
    pub const LONGITUDE: usize = 5;
    pub const FEATURE_CLASS: usize = 6;
    pub const FEATURE_CODE: usize = 7;
    pub const COUNTRY_CODE: usize = 8;
    pub const ADMIN1: usize = 10;
    pub const ADMIN2: usize = 11;
    pub const ADMIN3: usize = 12;
    pub const ADMIN4: usize = 13;
    pub const POPULATION: usize = 14;
    pub const ELEVATION: usize = 15;
    pub const TIMEZONE: usize = 17;
    pub const MODIFICATION_DATE: usize = 18;
}

/// Country and feature-code filtering for a load.
///
/// Feature codes may be class letters (`P`, meaning every code in the
/// class) or qualified `class.code` entries (`S.CMTY`), mixed freely.
#[derive(Debug, Clone, Default)]
pub struct FeatureFilter {
    include_countries: Option<HashSet<String>>,
    exclude_countries: HashSet<String>,
    include_classes: Option<HashSet<String>>,
    include_codes: HashSet<String>,
}

impl FeatureFilter {
    pub fn new(
        include_countries: Option<&[String]>,
        exclude_countries: &[String],
        feature_codes: Option<&[String]>,
    ) -> Self {
        let mut include_classes = None;
        let mut include_codes = HashSet::new();
        if let Some(codes) = feature_codes {
            let mut classes = HashSet::new();
            for code in codes {
                let code = code.trim().to_uppercase();
                if code.is_empty() {
                    continue;
                }
                if code.contains('.') {
                    include_codes.insert(code);
                } else {
                    classes.insert(code);
                }
            }
            include_classes = Some(classes);
        }
        Self {
            include_countries: include_countries
                .map(|cs| cs.iter().map(|c| c.trim().to_uppercase()).collect()),
            exclude_countries: exclude_countries
                .iter()
                .map(|c| c.trim().to_uppercase())
                .collect(),
            include_classes,
            include_codes,
        }
    }

    /// A record passes iff its country is not excluded, is included (or no
    /// inclusion set is given), and its feature class OR qualified code is
    /// in the inclusion set (or no inclusion set is given).
    pub fn accepts(&self, country_code: &str, feature_class: &str, full_code: &str) -> bool {
        if self.exclude_countries.contains(country_code) {
            return false;
        }
        if let Some(include) = &self.include_countries {
            if !include.contains(country_code) {
                return false;
            }
        }
        if let Some(classes) = &self.include_classes {
            if !classes.contains(feature_class) && !self.include_codes.contains(full_code) {
                return false;
            }
        }
        true
    }
}

/// Per-file counters reported at the end of a scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderStats {
    pub parsed: u64,
    /// Missing or out-of-range coordinates, or an unparseable row.
    pub discarded: u64,
    /// Rejected by the country/feature-code filter.
    pub filtered: u64,
}

/// Lazy reader over a gazetteer dump, yielding places in source-file order.
pub struct GazetteerReader<R: Read> {
    reader: csv::Reader<R>,
    filter: FeatureFilter,
    stats: ReaderStats,
    record: StringRecord,
    offset_remaining: u64,
}

impl GazetteerReader<std::fs::File> {
    pub fn open(path: &Path, filter: FeatureFilter) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open gazetteer file {}", path.display()))?;
        Ok(Self::new(file, filter))
    }
}

impl<R: Read> GazetteerReader<R> {
    pub fn new(input: R, filter: FeatureFilter) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(input);
        Self {
            reader,
            filter,
            stats: ReaderStats::default(),
            record: StringRecord::new(),
            offset_remaining: 0,
        }
    }

    /// Skip the first `offset` records (resume of an interrupted load).
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset_remaining = offset;
        self
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
        record.get(idx).unwrap_or("")
    }

    fn parse_record(record: &StringRecord) -> Option<Place> {
        let geoname_id: i64 = Self::field(record, col::GEONAME_ID).parse().ok()?;

        let latitude: f64 = Self::field(record, col::LATITUDE).parse().ok()?;
        let longitude: f64 = Self::field(record, col::LONGITUDE).parse().ok()?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        let alternate_names = Self::field(record, col::ALTERNATE_NAMES)
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        let population = Self::field(record, col::POPULATION).parse().unwrap_or(0);
        let elevation = Self::field(record, col::ELEVATION).parse().ok();

        Some(Place {
            geoname_id,
            name: Self::field(record, col::NAME).to_string(),
            ascii_name: Self::field(record, col::ASCII_NAME).to_string(),
            alternate_names,
            latitude,
            longitude,
            feature_class: Self::field(record, col::FEATURE_CLASS).to_string(),
            feature_code: Self::field(record, col::FEATURE_CODE).to_string(),
            country_code: Self::field(record, col::COUNTRY_CODE).to_string(),
            admin1_code: Self::field(record, col::ADMIN1).to_string(),
            admin2_code: Self::field(record, col::ADMIN2).to_string(),
            admin3_code: Self::field(record, col::ADMIN3).to_string(),
            admin4_code: Self::field(record, col::ADMIN4).to_string(),
            population,
            elevation,
            timezone: Self::field(record, col::TIMEZONE).to_string(),
            modified_date: Self::field(record, col::MODIFICATION_DATE).to_string(),
        })
    }
}

impl<R: Read> Iterator for GazetteerReader<R> {
    type Item = Place;

    fn next(&mut self) -> Option<Place> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    warn!("Skipping unreadable gazetteer row: {}", e);
                    self.stats.discarded += 1;
                    continue;
                }
            }

            if self.offset_remaining > 0 {
                self.offset_remaining -= 1;
                continue;
            }

            let place = match Self::parse_record(&self.record) {
                Some(p) => p,
                None => {
                    self.stats.discarded += 1;
                    continue;
                }
            };

            if !self.filter.accepts(
                &place.country_code,
                &place.feature_class,
                &place.full_feature_code(),
            ) {
                self.stats.filtered += 1;
                continue;
            }

            self.stats.parsed += 1;
            return Some(place);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TORONTO: &str = "6167865\tToronto\tToronto\tYYZ,Torontu\t43.70011\t-79.4163\tP\tPPLA\tCA\t\t08\t\t\t\t2731571\t175\t166\tAmerica/Toronto\t2023-01-11";

    fn read_all(input: &str, filter: FeatureFilter) -> (Vec<Place>, ReaderStats) {
        let mut reader = GazetteerReader::new(input.as_bytes(), filter);
        let places: Vec<Place> = reader.by_ref().collect();
        (places, reader.stats())
    }

    #[test]
    fn parses_a_standard_row() {
        let (places, stats) = read_all(TORONTO, FeatureFilter::default());
        assert_eq!(places.len(), 1);
        let p = &places[0];
        assert_eq!(p.geoname_id, 6167865);
        assert_eq!(p.name, "Toronto");
        assert_eq!(p.alternate_names, vec!["YYZ", "Torontu"]);
        assert_eq!(p.feature_code, "PPLA");
        assert_eq!(p.admin1_code, "08");
        assert_eq!(p.admin2_code, "");
        assert_eq!(p.population, 2731571);
        assert_eq!(p.elevation, Some(175));
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.discarded, 0);
    }

    #[test]
    fn empty_numeric_fields_tolerated() {
        let row = "1\tSomewhere\tSomewhere\t\t10.0\t20.0\tP\tPPL\tXX\t\t\t\t\t\t\t\t\tUTC\t2020-01-01";
        let (places, _) = read_all(row, FeatureFilter::default());
        assert_eq!(places[0].population, 0);
        assert_eq!(places[0].elevation, None);
        assert!(places[0].alternate_names.is_empty());
    }

    #[test]
    fn discards_missing_or_out_of_range_coordinates() {
        let missing_lon = "2\tHalf\tHalf\t\t10.0\t\tP\tPPL\tXX\t\t\t\t\t\t0\t\t\tUTC\t2020-01-01";
        let bad_lat = "3\tBad\tBad\t\t95.0\t10.0\tP\tPPL\tXX\t\t\t\t\t\t0\t\t\tUTC\t2020-01-01";
        let input = format!("{}\n{}\n{}", TORONTO, missing_lon, bad_lat);
        let (places, stats) = read_all(&input, FeatureFilter::default());
        assert_eq!(places.len(), 1);
        assert_eq!(stats.discarded, 2);
    }

    #[test]
    fn country_filters() {
        let filter = FeatureFilter::new(Some(&["US".to_string()]), &[], None);
        let (places, stats) = read_all(TORONTO, filter);
        assert!(places.is_empty());
        assert_eq!(stats.filtered, 1);

        let filter = FeatureFilter::new(None, &["CA".to_string()], None);
        let (places, _) = read_all(TORONTO, filter);
        assert!(places.is_empty());
    }

    #[test]
    fn feature_code_filter_mixes_classes_and_qualified_codes() {
        let cemetery = "4\tOld Burying Ground\tOld Burying Ground\t\t44.64\t-63.57\tS\tCMTY\tCA\t\t07\t\t\t\t0\t\t\tAmerica/Halifax\t2020-01-01";
        let hotel = "5\tSome Hotel\tSome Hotel\t\t44.65\t-63.58\tS\tHTL\tCA\t\t07\t\t\t\t0\t\t\tAmerica/Halifax\t2020-01-01";
        let input = format!("{}\n{}\n{}", TORONTO, cemetery, hotel);

        let filter = FeatureFilter::new(None, &[], Some(&["P".to_string(), "S.CMTY".to_string()]));
        let (places, stats) = read_all(&input, filter);
        let codes: Vec<&str> = places.iter().map(|p| p.feature_code.as_str()).collect();
        assert_eq!(codes, vec!["PPLA", "CMTY"]);
        assert_eq!(stats.filtered, 1);
    }

    #[test]
    fn offset_skips_leading_records() {
        let second = "6\tSecond\tSecond\t\t1.0\t1.0\tP\tPPL\tXX\t\t\t\t\t\t0\t\t\tUTC\t2020-01-01";
        let input = format!("{}\n{}", TORONTO, second);
        let mut reader =
            GazetteerReader::new(input.as_bytes(), FeatureFilter::default()).with_offset(1);
        let places: Vec<Place> = reader.by_ref().collect();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].geoname_id, 6);
    }
}
