use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use super::DosingError;
use super::starter::Catalog;

/// Minimum number of logged uses before a product can count as a favourite.
pub const FAVOURITE_MIN_USES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Thumbs {
    Up,
    Down,
}

/// A dose as the user reports it, before it is priced against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseLogRequest {
    pub user_id: u64,
    pub product_sku: String,
    pub capsules_taken: u32,
    pub taken_at: NaiveDateTime,
    #[serde(default)]
    pub with_food: bool,
    #[serde(default)]
    pub with_alcohol: bool,
    pub time_of_day: String,
    #[serde(default)]
    pub outcome_score: Option<u8>,
    #[serde(default)]
    pub desired_outcome: Option<String>,
    #[serde(default)]
    pub side_effect_score: Option<u8>,
    #[serde(default)]
    pub side_effect_notes: Option<String>,
    /// 1 to 5 stars.
    #[serde(default)]
    pub quick_rating: Option<u8>,
    #[serde(default)]
    pub thumbs: Option<Thumbs>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseOutcome {
    pub desired_outcome: Option<String>,
    pub outcome_score: u8,
    pub side_effect_score: Option<u8>,
    pub side_effect_notes: Option<String>,
}

/// One diary row: the logged dose, its product and the optional outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub dose_id: u64,
    pub user_id: u64,
    pub product_sku: String,
    pub product_name: String,
    pub capsules_taken: u32,
    pub total_dose_mg_thc: f64,
    pub taken_at: NaiveDateTime,
    pub with_food: bool,
    pub with_alcohol: bool,
    pub time_of_day: String,
    pub quick_rating: Option<u8>,
    pub thumbs: Option<Thumbs>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub outcome: Option<DoseOutcome>,
}

fn check_score(
    field: &str,
    value: Option<u8>,
    range: RangeInclusive<u8>,
) -> Result<(), DosingError> {
    match value {
        Some(v) if !range.contains(&v) => Err(DosingError::log(format!(
            "{field} must be between {} and {}, got {v}",
            range.start(),
            range.end()
        ))),
        _ => Ok(()),
    }
}

/// Prices a reported dose against the catalog and builds its diary row. An
/// outcome is attached only when the user gave an outcome score.
pub fn log_dose(
    catalog: &Catalog,
    dose_id: u64,
    request: &DoseLogRequest,
) -> Result<DiaryEntry, DosingError> {
    let product = catalog.by_sku(&request.product_sku)?;
    if request.capsules_taken == 0 {
        return Err(DosingError::log("capsulesTaken must be >= 1"));
    }
    check_score("quickRating", request.quick_rating, 1..=5)?;
    check_score("outcomeScore", request.outcome_score, 1..=10)?;
    check_score("sideEffectScore", request.side_effect_score, 0..=10)?;

    let outcome = request.outcome_score.map(|outcome_score| DoseOutcome {
        desired_outcome: request.desired_outcome.clone(),
        outcome_score,
        side_effect_score: request.side_effect_score,
        side_effect_notes: request.side_effect_notes.clone(),
    });

    Ok(DiaryEntry {
        dose_id,
        user_id: request.user_id,
        product_sku: product.sku.clone(),
        product_name: product.name.clone(),
        capsules_taken: request.capsules_taken,
        total_dose_mg_thc: product.thc_mg_per_capsule * f64::from(request.capsules_taken),
        taken_at: request.taken_at,
        with_food: request.with_food,
        with_alcohol: request.with_alcohol,
        time_of_day: request.time_of_day.clone(),
        quick_rating: request.quick_rating,
        thumbs: request.thumbs,
        tags: request.tags.clone(),
        outcome,
    })
}

/// Diary filter; `None` fields do not constrain. Rating and outcome filters
/// drop entries that carry no rating or outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryFilter {
    pub user_id: u64,
    pub product_sku: Option<String>,
    pub min_rating: Option<u8>,
    pub max_rating: Option<u8>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub desired_outcome: Option<String>,
}

impl HistoryFilter {
    fn matches(&self, entry: &DiaryEntry) -> bool {
        let day = entry.taken_at.date();
        let desired = entry
            .outcome
            .as_ref()
            .and_then(|o| o.desired_outcome.as_deref());

        entry.user_id == self.user_id
            && self
                .product_sku
                .as_deref()
                .is_none_or(|sku| sku == entry.product_sku)
            && self
                .min_rating
                .is_none_or(|min| entry.quick_rating.is_some_and(|r| r >= min))
            && self
                .max_rating
                .is_none_or(|max| entry.quick_rating.is_some_and(|r| r <= max))
            && self.start_date.is_none_or(|start| day >= start)
            && self.end_date.is_none_or(|end| day <= end)
            && self
                .desired_outcome
                .as_deref()
                .is_none_or(|wanted| desired == Some(wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub dose_id: u64,
    pub date: NaiveDate,
    pub product_name: String,
    pub product_sku: String,
    pub quick_rating: Option<u8>,
    pub thumbs: Option<Thumbs>,
    pub tags: Vec<String>,
    pub desired_outcome: Option<String>,
    pub outcome_score: Option<u8>,
    pub time_of_day: String,
}

impl From<&DiaryEntry> for HistoryEntry {
    fn from(entry: &DiaryEntry) -> Self {
        Self {
            dose_id: entry.dose_id,
            date: entry.taken_at.date(),
            product_name: entry.product_name.clone(),
            product_sku: entry.product_sku.clone(),
            quick_rating: entry.quick_rating,
            thumbs: entry.thumbs,
            tags: entry.tags.clone(),
            desired_outcome: entry
                .outcome
                .as_ref()
                .and_then(|o| o.desired_outcome.clone()),
            outcome_score: entry.outcome.as_ref().map(|o| o.outcome_score),
            time_of_day: entry.time_of_day.clone(),
        }
    }
}

/// Matching diary rows, newest first.
pub fn history(entries: &[DiaryEntry], filter: &HistoryFilter) -> Vec<HistoryEntry> {
    let mut matching: Vec<&DiaryEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
    matching.sort_by_key(|e| Reverse((e.taken_at, e.dose_id)));
    matching.into_iter().map(HistoryEntry::from).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRating {
    pub product_name: String,
    pub uses: usize,
    /// Mean quick rating over the rated uses; `None` when none were rated.
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalStats {
    pub total_doses: usize,
    /// Highest average first.
    pub rating_by_product: Vec<ProductRating>,
    pub favourites: Vec<ProductRating>,
    pub weekend_average: Option<f64>,
    pub weekday_average: Option<f64>,
}

#[derive(Default)]
struct RatingTally {
    uses: usize,
    rated: usize,
    sum: f64,
}

impl RatingTally {
    fn add(&mut self, rating: Option<u8>) {
        self.uses += 1;
        if let Some(r) = rating {
            self.rated += 1;
            self.sum += f64::from(r);
        }
    }

    fn average(&self) -> Option<f64> {
        (self.rated > 0).then(|| self.sum / self.rated as f64)
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Dashboard figures over a (possibly filtered) history.
pub fn personal_stats(entries: &[HistoryEntry]) -> PersonalStats {
    let mut by_product: BTreeMap<&str, RatingTally> = BTreeMap::new();
    let mut weekend = RatingTally::default();
    let mut weekday = RatingTally::default();
    for entry in entries {
        by_product
            .entry(entry.product_name.as_str())
            .or_default()
            .add(entry.quick_rating);
        if is_weekend(entry.date) {
            weekend.add(entry.quick_rating);
        } else {
            weekday.add(entry.quick_rating);
        }
    }

    let mut rating_by_product: Vec<ProductRating> = by_product
        .into_iter()
        .map(|(name, tally)| ProductRating {
            product_name: name.to_string(),
            uses: tally.uses,
            average_rating: tally.average(),
        })
        .collect();
    // Unrated products sort last; ties keep name order.
    rating_by_product.sort_by(|a, b| {
        let key = |r: &ProductRating| r.average_rating.unwrap_or(f64::NEG_INFINITY);
        key(b).total_cmp(&key(a))
    });

    let favourites = rating_by_product
        .iter()
        .filter(|r| r.uses >= FAVOURITE_MIN_USES && r.average_rating.is_some())
        .cloned()
        .collect();

    PersonalStats {
        total_doses: entries.len(),
        rating_by_product,
        favourites,
        weekend_average: weekend.average(),
        weekday_average: weekday.average(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosing::{SKU_CALM_CLARITY, SKU_DEEP_REST, SKU_DEEP_REST_MICRO};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    // 2026-01-03 is a Saturday.
    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn request(sku: &str, day: u32, rating: Option<u8>) -> DoseLogRequest {
        DoseLogRequest {
            user_id: 1,
            product_sku: sku.to_string(),
            capsules_taken: 1,
            taken_at: at(day, 22),
            with_food: false,
            with_alcohol: false,
            time_of_day: "night".to_string(),
            outcome_score: None,
            desired_outcome: None,
            side_effect_score: None,
            side_effect_notes: None,
            quick_rating: rating,
            thumbs: None,
            tags: Vec::new(),
        }
    }

    fn diary() -> Vec<DiaryEntry> {
        let catalog = Catalog::default();
        let rows = [
            (SKU_DEEP_REST_MICRO, 3, Some(5)),
            (SKU_DEEP_REST_MICRO, 5, Some(4)),
            (SKU_DEEP_REST_MICRO, 6, Some(3)),
            (SKU_DEEP_REST, 4, Some(2)),
            (SKU_CALM_CLARITY, 7, None),
        ];
        rows.iter()
            .enumerate()
            .map(|(i, &(sku, day, rating))| {
                let mut req = request(sku, day, rating);
                if sku != SKU_CALM_CLARITY {
                    req.outcome_score = Some(7);
                    req.desired_outcome = Some("sleep".to_string());
                }
                log_dose(&catalog, i as u64 + 1, &req).expect("valid log")
            })
            .collect()
    }

    #[test]
    fn total_dose_is_capsules_times_strength() {
        let mut req = request(SKU_DEEP_REST, 3, Some(4));
        req.capsules_taken = 3;
        let entry = log_dose(&Catalog::default(), 9, &req).expect("valid log");
        assert_approx(entry.total_dose_mg_thc, 15.0);
        assert_eq!(entry.product_name, "Deep Rest");
        assert!(entry.outcome.is_none());
    }

    #[test]
    fn outcome_is_attached_only_with_a_score() {
        let mut req = request(SKU_DEEP_REST, 3, None);
        req.desired_outcome = Some("sleep".to_string());
        let entry = log_dose(&Catalog::default(), 1, &req).expect("valid log");
        assert!(entry.outcome.is_none());

        req.outcome_score = Some(8);
        req.side_effect_score = Some(0);
        let entry = log_dose(&Catalog::default(), 1, &req).expect("valid log");
        let outcome = entry.outcome.expect("outcome");
        assert_eq!(outcome.outcome_score, 8);
        assert_eq!(outcome.desired_outcome.as_deref(), Some("sleep"));
    }

    #[test]
    fn unknown_sku_is_rejected() {
        let err = log_dose(&Catalog::default(), 1, &request("CRX-XX-1", 3, None))
            .expect_err("must reject");
        assert_eq!(err, DosingError::UnknownProduct("CRX-XX-1".to_string()));
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let catalog = Catalog::default();
        let mut zero_capsules = request(SKU_DEEP_REST, 3, None);
        zero_capsules.capsules_taken = 0;
        let six_stars = request(SKU_DEEP_REST, 3, Some(6));
        let mut outcome_eleven = request(SKU_DEEP_REST, 3, None);
        outcome_eleven.outcome_score = Some(11);
        for req in [zero_capsules, six_stars, outcome_eleven] {
            let err = log_dose(&catalog, 1, &req).expect_err("must reject");
            assert!(matches!(err, DosingError::InvalidLog(_)), "{req:?}");
        }
    }

    #[test]
    fn history_is_newest_first_for_the_user() {
        let mut entries = diary();
        let mut other = entries[0].clone();
        other.user_id = 2;
        other.dose_id = 99;
        entries.push(other);

        let rows = history(&entries, &HistoryFilter {
            user_id: 1,
            ..HistoryFilter::default()
        });
        let ids: Vec<u64> = rows.iter().map(|r| r.dose_id).collect();
        assert_eq!(ids, vec![5, 3, 2, 4, 1]);
    }

    #[test]
    fn history_filters_combine() {
        let entries = diary();
        let by_sku = history(&entries, &HistoryFilter {
            user_id: 1,
            product_sku: Some(SKU_DEEP_REST_MICRO.to_string()),
            min_rating: Some(4),
            ..HistoryFilter::default()
        });
        assert_eq!(by_sku.iter().map(|r| r.dose_id).collect::<Vec<_>>(), vec![2, 1]);

        let by_date = history(&entries, &HistoryFilter {
            user_id: 1,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 4),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 6),
            ..HistoryFilter::default()
        });
        assert_eq!(by_date.iter().map(|r| r.dose_id).collect::<Vec<_>>(), vec![3, 2, 4]);

        let unrated_excluded = history(&entries, &HistoryFilter {
            user_id: 1,
            max_rating: Some(5),
            ..HistoryFilter::default()
        });
        assert!(unrated_excluded.iter().all(|r| r.quick_rating.is_some()));

        let by_outcome = history(&entries, &HistoryFilter {
            user_id: 1,
            desired_outcome: Some("sleep".to_string()),
            ..HistoryFilter::default()
        });
        assert_eq!(by_outcome.len(), 4);
        assert!(by_outcome.iter().all(|r| r.outcome_score == Some(7)));
    }

    #[test]
    fn stats_rank_products_and_split_weekends() {
        let rows = history(&diary(), &HistoryFilter {
            user_id: 1,
            ..HistoryFilter::default()
        });
        let stats = personal_stats(&rows);
        assert_eq!(stats.total_doses, 5);

        let names: Vec<&str> = stats
            .rating_by_product
            .iter()
            .map(|r| r.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Deep Rest Micro", "Deep Rest", "Calm Clarity"]);
        assert_approx(stats.rating_by_product[0].average_rating.expect("rated"), 4.0);
        assert_eq!(stats.rating_by_product[2].average_rating, None);
        assert_eq!(stats.rating_by_product[2].uses, 1);

        assert_eq!(stats.favourites.len(), 1);
        assert_eq!(stats.favourites[0].product_name, "Deep Rest Micro");
        assert_eq!(stats.favourites[0].uses, FAVOURITE_MIN_USES);

        // The 3rd and 4th fall on a weekend.
        assert_approx(stats.weekend_average.expect("weekend"), 3.5);
        assert_approx(stats.weekday_average.expect("weekday"), 3.5);
    }

    #[test]
    fn empty_history_has_no_averages() {
        let stats = personal_stats(&[]);
        assert_eq!(stats.total_doses, 0);
        assert!(stats.rating_by_product.is_empty());
        assert_eq!(stats.weekend_average, None);
        assert_eq!(stats.weekday_average, None);
    }
}
