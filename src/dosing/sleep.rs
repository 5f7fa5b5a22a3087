use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use super::DosingError;
use super::rules::{Rule, evaluate_rules};

pub const SLEEP_QUALITY: &str = "sleep_quality";
/// Longest look-back window accepted for the dose history.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseEvent {
    pub dose_id: u64,
    pub user_id: u64,
    pub product_type: String,
    pub dose_mg_thc: f64,
    pub taken_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomLog {
    pub user_id: u64,
    pub related_dose_id: Option<u64>,
    pub symptom_type: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SleepDoseSettings {
    pub window_days: i64,
    pub n_doses: usize,
    pub min_data_points: usize,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub max_dose_mg: f64,
    pub step_mg: f64,
}

impl Default for SleepDoseSettings {
    fn default() -> Self {
        Self {
            window_days: 7,
            n_doses: 5,
            min_data_points: 3,
            low_threshold: 6.0,
            high_threshold: 8.0,
            max_dose_mg: 10.0,
            step_mg: 1.0,
        }
    }
}

impl SleepDoseSettings {
    pub fn validate(&self) -> Result<(), DosingError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(DosingError::settings(format!(
                "windowDays must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.n_doses == 0 {
            return Err(DosingError::settings("nDoses must be >= 1"));
        }
        if self.min_data_points == 0 {
            return Err(DosingError::settings("minDataPoints must be >= 1"));
        }
        if !self.low_threshold.is_finite()
            || !self.high_threshold.is_finite()
            || self.low_threshold > self.high_threshold
        {
            return Err(DosingError::settings(
                "thresholds must be finite with lowThreshold <= highThreshold",
            ));
        }
        for (field, value) in [("maxDoseMg", self.max_dose_mg), ("stepMg", self.step_mg)] {
            if !value.is_finite() || value < 0.0 {
                return Err(DosingError::settings(format!(
                    "{field} must be a finite value >= 0"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseAction {
    IncreaseDose,
    MaintainDose,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SleepRecommendation {
    NoData {
        reason: String,
    },
    InsufficientData {
        reason: String,
    },
    #[serde(rename = "ok", rename_all = "camelCase")]
    Recommended {
        avg_sleep_quality: f64,
        current_dose_mg: f64,
        recommended_dose_mg: f64,
        action: DoseAction,
    },
}

struct SleepSignal {
    avg_sleep: f64,
    low: f64,
    high: f64,
}

fn sleeping_poorly(s: &SleepSignal) -> bool {
    s.avg_sleep < s.low
}

fn sleeping_well(s: &SleepSignal) -> bool {
    s.avg_sleep > s.high
}

static ADJUSTMENT_RULES: [Rule<SleepSignal, DoseAction>; 2] = [
    Rule {
        name: "below_low_threshold",
        when: sleeping_poorly,
        outcome: DoseAction::IncreaseDose,
    },
    Rule {
        name: "above_high_threshold",
        when: sleeping_well,
        outcome: DoseAction::MaintainDose,
    },
];

/// Recommends the next sleep dose from the user's most recent doses and the
/// sleep-quality logs tied to them. The window ends at the latest event seen
/// across all users.
pub fn recommend_sleep_dose(
    user_id: u64,
    product_type: &str,
    events: &[DoseEvent],
    logs: &[SymptomLog],
    settings: &SleepDoseSettings,
) -> Result<SleepRecommendation, DosingError> {
    settings.validate()?;
    let Some(now) = events.iter().map(|e| e.taken_at).max() else {
        return Ok(SleepRecommendation::NoData {
            reason: "No dosing events.".to_string(),
        });
    };
    let window_start = TimeDelta::try_days(settings.window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(NaiveDateTime::MIN);

    let mut recent: Vec<&DoseEvent> = events
        .iter()
        .filter(|e| {
            e.user_id == user_id && e.product_type == product_type && e.taken_at >= window_start
        })
        .collect();
    recent.sort_by_key(|e| e.taken_at);
    let skip = recent.len().saturating_sub(settings.n_doses);
    let recent = &recent[skip..];

    let Some(latest) = recent.last() else {
        return Ok(SleepRecommendation::NoData {
            reason: "No recent doses in window.".to_string(),
        });
    };

    let values: Vec<f64> = logs
        .iter()
        .filter(|log| {
            log.user_id == user_id
                && log.symptom_type == SLEEP_QUALITY
                && log
                    .related_dose_id
                    .is_some_and(|id| recent.iter().any(|e| e.dose_id == id))
        })
        .map(|log| log.value)
        .collect();

    if values.len() < settings.min_data_points {
        return Ok(SleepRecommendation::InsufficientData {
            reason: format!(
                "Only {} logs, need {}.",
                values.len(),
                settings.min_data_points
            ),
        });
    }

    let avg_sleep_quality = values.iter().sum::<f64>() / values.len() as f64;
    let current_dose_mg = latest.dose_mg_thc;
    let signal = SleepSignal {
        avg_sleep: avg_sleep_quality,
        low: settings.low_threshold,
        high: settings.high_threshold,
    };
    let action = *evaluate_rules(&ADJUSTMENT_RULES, &signal, &DoseAction::MaintainDose).outcome;
    let recommended_dose_mg = match action {
        DoseAction::IncreaseDose => (current_dose_mg + settings.step_mg).min(settings.max_dose_mg),
        DoseAction::MaintainDose => current_dose_mg,
    };

    Ok(SleepRecommendation::Recommended {
        avg_sleep_quality,
        current_dose_mg,
        recommended_dose_mg,
        action,
    })
}
