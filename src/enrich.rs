//! Adds geolocation to every block of the scraped JSON files.
//!
//! Each file holds `{"blocks": [{"block_code": {"block_num": ..}, "street": .., ..}, ..]}`.
//! A file is geocoded as one batch; the result fields `title`, `lat`, `long`
//! and `postal` are attached to each block in order.

use crate::cleanup_log;
use crate::geo::{GeocodeResult, GeoError, Result};
use log::info;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

pub const STEP_NAME: &str = "AddGeo";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub skipped_step: bool,
    pub files_seen: usize,
    pub files_updated: usize,
}

/// Run the step over `json_dir`, unless `log_path` says it already ran.
///
/// `geocode` maps a group of addresses to results in the same order.
pub fn run<F>(json_dir: &Path, log_path: &Path, mut geocode: F) -> Result<EnrichSummary>
where
    F: FnMut(&[String]) -> Result<Vec<GeocodeResult>>,
{
    let mut summary = EnrichSummary::default();
    if cleanup_log::has_done(log_path, STEP_NAME)? {
        info!("Skipping {}", STEP_NAME);
        summary.skipped_step = true;
        return Ok(summary);
    }

    info!("[{}] {}", STEP_NAME, json_dir.display());
    for entry in WalkDir::new(json_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        summary.files_seen += 1;

        let path = entry.path();
        let mut data: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        if add_geo(&mut data, &mut geocode).map_err(|e| in_file(e, path))? {
            fs::write(path, serde_json::to_string_pretty(&data)?)?;
            summary.files_updated += 1;
            info!("Geocoded {}", path.display());
        }
    }

    cleanup_log::log_done(log_path, STEP_NAME)?;
    Ok(summary)
}

fn in_file(err: GeoError, path: &Path) -> GeoError {
    match err {
        GeoError::InvalidRecord(msg) => GeoError::InvalidRecord(format!("{}: {}", path.display(), msg)),
        other => other,
    }
}

/// Geocode the blocks of one file. Returns whether anything changed.
fn add_geo<F>(data: &mut Value, geocode: &mut F) -> Result<bool>
where
    F: FnMut(&[String]) -> Result<Vec<GeocodeResult>>,
{
    let blocks = data
        .get_mut("blocks")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| GeoError::InvalidRecord("no blocks list".into()))?;

    // Already done, or nothing to do
    match blocks.first() {
        None => return Ok(false),
        Some(first) if first.get("lat").is_some() => return Ok(false),
        Some(_) => {}
    }

    let addresses = blocks
        .iter()
        .enumerate()
        .map(|(i, blk)| block_address(blk).ok_or_else(|| GeoError::InvalidRecord(format!("block {} has no address", i))))
        .collect::<Result<Vec<_>>>()?;

    let geocodes = geocode(&addresses)?;
    if geocodes.len() != blocks.len() {
        return Err(GeoError::Upstream(format!(
            "expected {} geocodes, got {}",
            blocks.len(),
            geocodes.len()
        )));
    }

    for (blk, geo) in blocks.iter_mut().zip(geocodes) {
        let Some(fields) = blk.as_object_mut() else {
            continue;
        };
        attach(fields, geo);
    }
    Ok(true)
}

fn block_address(blk: &Value) -> Option<String> {
    let num = blk.get("block_code")?.get("block_num")?.as_str()?;
    let street = blk.get("street")?.as_str()?;
    Some(format!("{} {}", num, street))
}

fn attach(fields: &mut Map<String, Value>, geo: GeocodeResult) {
    fields.insert("title".into(), Value::from(geo.title));
    fields.insert("lat".into(), Value::from(geo.lat));
    fields.insert("long".into(), Value::from(geo.long));
    fields.insert("postal".into(), Value::from(geo.postal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn listing() -> Value {
        json!({
            "town": "ANG MO KIO",
            "blocks": [
                {"block_code": {"block_num": "123A"}, "street": "EXAMPLE ST"},
                {"block_code": {"block_num": "370"}, "street": "ANG MO KIO AVE 1"}
            ]
        })
    }

    fn fake_geocode(addresses: &[String]) -> Result<Vec<GeocodeResult>> {
        Ok(addresses
            .iter()
            .enumerate()
            .map(|(i, a)| GeocodeResult::new(a.clone(), 1.0 + i as f64, 103.0, 560000 + i as u32))
            .collect())
    }

    #[test]
    fn test_attaches_results_in_order() {
        let mut data = listing();
        assert!(add_geo(&mut data, &mut fake_geocode).unwrap());

        let blocks = data["blocks"].as_array().unwrap();
        assert_eq!(blocks[0]["title"], json!("123A EXAMPLE ST"));
        assert_eq!(blocks[1]["title"], json!("370 ANG MO KIO AVE 1"));
        assert_eq!(blocks[1]["lat"], json!(2.0));
        assert_eq!(blocks[1]["postal"], json!(560001));
        assert_eq!(data["town"], json!("ANG MO KIO"));
    }

    #[test]
    fn test_already_geocoded_file_untouched() {
        let mut data = listing();
        data["blocks"][0]["lat"] = json!(1.3);
        let mut calls = 0;
        let changed = add_geo(&mut data, &mut |a: &[String]| {
            calls += 1;
            fake_geocode(a)
        })
        .unwrap();
        assert!(!changed);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_block_without_street_is_invalid() {
        let mut data = json!({"blocks": [{"block_code": {"block_num": "1"}}]});
        assert!(matches!(
            add_geo(&mut data, &mut fake_geocode),
            Err(GeoError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_run_over_directory() {
        let dir = TempDir::new().unwrap();
        let json_dir = dir.path().join("json");
        fs::create_dir_all(json_dir.join("ang-mo-kio")).unwrap();
        fs::write(json_dir.join("ang-mo-kio").join("a.json"), listing().to_string()).unwrap();
        fs::write(json_dir.join("b.json"), json!({"blocks": []}).to_string()).unwrap();
        let log_path = dir.path().join("cleanup.log");

        let mut batches = Vec::new();
        let summary = run(&json_dir, &log_path, |a| {
            batches.push(a.to_vec());
            fake_geocode(a)
        })
        .unwrap();

        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.files_updated, 1);
        assert_eq!(batches, vec![vec!["123A EXAMPLE ST".to_string(), "370 ANG MO KIO AVE 1".to_string()]]);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(json_dir.join("ang-mo-kio").join("a.json")).unwrap()).unwrap();
        assert_eq!(written["blocks"][0]["postal"], json!(560000));
        assert!(cleanup_log::has_done(&log_path, STEP_NAME).unwrap());

        // Second run is skipped entirely
        let again = run(&json_dir, &log_path, |_| panic!("must not geocode")).unwrap();
        assert!(again.skipped_step);
    }

    #[test]
    fn test_geocode_failure_leaves_step_unlogged() {
        let dir = TempDir::new().unwrap();
        let json_dir = dir.path().join("json");
        fs::create_dir_all(&json_dir).unwrap();
        fs::write(json_dir.join("a.json"), listing().to_string()).unwrap();
        let log_path = dir.path().join("cleanup.log");

        let err = run(&json_dir, &log_path, |_| {
            Err(GeoError::AddressNotFound("123A EXAMPLE ST".into()))
        })
        .unwrap_err();
        assert!(matches!(err, GeoError::AddressNotFound(_)));
        assert!(!cleanup_log::has_done(&log_path, STEP_NAME).unwrap());
    }
}
