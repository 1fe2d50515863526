//! Snak-level extraction from Wikidata entity JSON.
//!
//! All helpers are total: a missing or unexpectedly-shaped nested key
//! yields `None`, never an error. Only `value` mainsnaks are read; claim
//! rank is ignored.

use serde_json::Value;

fn datavalue<'a>(claim: &'a Value, expected_type: &str) -> Option<&'a Value> {
    let mainsnak = claim.get("mainsnak")?;
    if mainsnak.get("snaktype")?.as_str()? != "value" {
        return None;
    }
    let datavalue = mainsnak.get("datavalue")?;
    if datavalue.get("type")?.as_str()? != expected_type {
        return None;
    }
    datavalue.get("value")
}

/// String value of a claim (`datavalue.type == "string"`).
pub fn string_value(claim: &Value) -> Option<String> {
    datavalue(claim, "string")?.as_str().map(str::to_string)
}

/// Item id of a `wikibase-entityid` claim.
pub fn item_id(claim: &Value) -> Option<String> {
    datavalue(claim, "wikibase-entityid")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

/// Calendar date of a time claim. Times are stored as
/// `+YYYY-MM-DDThh:mm:ssZ`; only the `YYYY-MM-DD` prefix is kept, with the
/// leading sign stripped.
pub fn time_value(claim: &Value) -> Option<String> {
    let time = datavalue(claim, "time")?.get("time")?.as_str()?;
    let date = time.trim_start_matches('+').split('T').next()?;
    if date.is_empty() {
        None
    } else {
        Some(date.to_string())
    }
}

/// Integer truncation of a quantity claim's signed decimal amount.
pub fn quantity_value(claim: &Value) -> Option<i64> {
    let amount = datavalue(claim, "quantity")?.get("amount")?.as_str()?;
    amount.parse::<f64>().ok().map(|v| v.trunc() as i64)
}

/// Latitude/longitude of a `globecoordinate` claim; both must be present.
pub fn coordinates(claim: &Value) -> Option<(f64, f64)> {
    let value = datavalue(claim, "globecoordinate")?;
    let lat = value.get("latitude")?.as_f64()?;
    let lon = value.get("longitude")?.as_f64()?;
    Some((lat, lon))
}

fn claims_for<'a>(entity: &'a Value, pid: &str) -> Option<&'a Vec<Value>> {
    entity.get("claims")?.get(pid)?.as_array()
}

pub fn has_property(entity: &Value, pid: &str) -> bool {
    claims_for(entity, pid).map_or(false, |c| !c.is_empty())
}

/// First-claim string value for a property.
pub fn first_string(entity: &Value, pid: &str) -> Option<String> {
    claims_for(entity, pid)?.first().and_then(string_value)
}

/// First-claim item id for a property.
pub fn first_item(entity: &Value, pid: &str) -> Option<String> {
    claims_for(entity, pid)?.first().and_then(item_id)
}

/// First-claim calendar date for a property.
pub fn first_time(entity: &Value, pid: &str) -> Option<String> {
    claims_for(entity, pid)?.first().and_then(time_value)
}

/// First-claim quantity for a property.
pub fn first_quantity(entity: &Value, pid: &str) -> Option<i64> {
    claims_for(entity, pid)?.first().and_then(quantity_value)
}

/// First coordinate-bearing claim for a property.
pub fn first_coordinates(entity: &Value, pid: &str) -> Option<(f64, f64)> {
    claims_for(entity, pid)?.iter().find_map(coordinates)
}

/// Item ids of every claim of a property, capped at `max`.
pub fn item_list(entity: &Value, pid: &str, max: usize) -> Vec<String> {
    claims_for(entity, pid)
        .map(|claims| claims.iter().take(max).filter_map(item_id).collect())
        .unwrap_or_default()
}

/// All item ids of a property, uncapped (used for P31 classification).
pub fn all_items(entity: &Value, pid: &str) -> Vec<String> {
    claims_for(entity, pid)
        .map(|claims| claims.iter().filter_map(item_id).collect())
        .unwrap_or_default()
}

/// String values of every claim of a property.
pub fn string_list(entity: &Value, pid: &str) -> Vec<String> {
    claims_for(entity, pid)
        .map(|claims| claims.iter().filter_map(string_value).collect())
        .unwrap_or_default()
}

/// English label if present, else the first label by iteration order, else
/// the entity id itself.
pub fn primary_label(entity: &Value, qid: &str) -> String {
    let labels = entity.get("labels").and_then(Value::as_object);
    if let Some(labels) = labels {
        if let Some(value) = labels.get("en").and_then(|l| l.get("value")).and_then(Value::as_str) {
            return value.to_string();
        }
        for label in labels.values() {
            if let Some(value) = label.get("value").and_then(Value::as_str) {
                return value.to_string();
            }
        }
    }
    qid.to_string()
}

/// English-only label (used by the person/organization streams, which drop
/// entities without one).
pub fn english_label(entity: &Value) -> Option<String> {
    entity
        .get("labels")?
        .get("en")?
        .get("value")?
        .as_str()
        .map(str::to_string)
}

pub fn english_description(entity: &Value) -> Option<String> {
    entity
        .get("descriptions")?
        .get("en")?
        .get("value")?
        .as_str()
        .map(str::to_string)
}

/// Union of every non-primary language label and every alias in every
/// language; deduplicated, first-seen order, primary name removed.
pub fn alternate_names(entity: &Value, primary: &str) -> Vec<String> {
    let mut seen = hashbrown::HashSet::new();
    let mut names = Vec::new();
    let mut push = |value: &str| {
        if value != primary && seen.insert(value.to_string()) {
            names.push(value.to_string());
        }
    };

    if let Some(labels) = entity.get("labels").and_then(Value::as_object) {
        for label in labels.values() {
            if let Some(value) = label.get("value").and_then(Value::as_str) {
                push(value);
            }
        }
    }
    if let Some(aliases) = entity.get("aliases").and_then(Value::as_object) {
        for alias_list in aliases.values() {
            if let Some(list) = alias_list.as_array() {
                for alias in list {
                    if let Some(value) = alias.get("value").and_then(Value::as_str) {
                        push(value);
                    }
                }
            }
        }
    }
    names
}

/// Wikipedia article URL derived from the English sitelink, spaces encoded
/// as underscores.
pub fn wikipedia_url(entity: &Value) -> Option<String> {
    let title = entity
        .get("sitelinks")?
        .get("enwiki")?
        .get("title")?
        .as_str()?;
    Some(format!(
        "https://en.wikipedia.org/wiki/{}",
        title.replace(' ', "_")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claim(datatype: &str, value: serde_json::Value) -> serde_json::Value {
        json!({
            "mainsnak": {
                "snaktype": "value",
                "datatype": "irrelevant",
                "datavalue": { "type": datatype, "value": value }
            }
        })
    }

    #[test]
    fn time_value_strips_sign_and_clock() {
        let c = claim("time", json!({ "time": "+1858-11-01T00:00:00Z" }));
        assert_eq!(time_value(&c), Some("1858-11-01".to_string()));
    }

    #[test]
    fn quantity_truncates_fraction() {
        let c = claim("quantity", json!({ "amount": "+2731571.8", "unit": "1" }));
        assert_eq!(quantity_value(&c), Some(2731571));
        let c = claim("quantity", json!({ "amount": "-12.9", "unit": "1" }));
        assert_eq!(quantity_value(&c), Some(-12));
    }

    #[test]
    fn coordinates_require_both_axes() {
        let full = claim("globecoordinate", json!({ "latitude": 43.65, "longitude": -79.38 }));
        assert_eq!(coordinates(&full), Some((43.65, -79.38)));
        let lat_only = claim("globecoordinate", json!({ "latitude": 43.65 }));
        assert_eq!(coordinates(&lat_only), None);
    }

    #[test]
    fn novalue_snaks_are_ignored() {
        let c = json!({ "mainsnak": { "snaktype": "novalue" } });
        assert_eq!(string_value(&c), None);
        assert_eq!(item_id(&c), None);
    }

    #[test]
    fn primary_label_prefers_english() {
        let entity = json!({
            "labels": {
                "fr": { "language": "fr", "value": "Toronto (fr)" },
                "en": { "language": "en", "value": "Toronto" }
            }
        });
        assert_eq!(primary_label(&entity, "Q172"), "Toronto");

        let no_en = json!({ "labels": { "de": { "value": "Berlin" } } });
        assert_eq!(primary_label(&no_en, "Q64"), "Berlin");

        let empty = json!({});
        assert_eq!(primary_label(&empty, "Q1"), "Q1");
    }

    #[test]
    fn alternate_names_dedup_and_drop_primary() {
        let entity = json!({
            "labels": {
                "en": { "value": "Toronto" },
                "fr": { "value": "Toronto" },
                "ja": { "value": "トロント" }
            },
            "aliases": {
                "en": [ { "value": "T.O." }, { "value": "トロント" } ]
            }
        });
        assert_eq!(alternate_names(&entity, "Toronto"), vec!["トロント", "T.O."]);
    }

    #[test]
    fn wikipedia_url_encodes_spaces() {
        let entity = json!({
            "sitelinks": { "enwiki": { "site": "enwiki", "title": "Fort York" } }
        });
        assert_eq!(
            wikipedia_url(&entity),
            Some("https://en.wikipedia.org/wiki/Fort_York".to_string())
        );
    }

    #[test]
    fn item_list_caps() {
        let entity = json!({
            "claims": {
                "P551": [
                    claim("wikibase-entityid", json!({ "id": "Q1" })),
                    claim("wikibase-entityid", json!({ "id": "Q2" })),
                    claim("wikibase-entityid", json!({ "id": "Q3" }))
                ]
            }
        });
        assert_eq!(item_list(&entity, "P551", 2), vec!["Q1", "Q2"]);
    }
}
