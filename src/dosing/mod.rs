//! Rule-based personalization: starter product choice at onboarding, the
//! dose diary, and sleep dose adjustment from logged outcomes.

mod diary;
mod rules;
mod sleep;
mod starter;

use thiserror::Error;

pub use diary::{
    DiaryEntry, DoseLogRequest, DoseOutcome, FAVOURITE_MIN_USES, HistoryEntry, HistoryFilter,
    PersonalStats, ProductRating, Thumbs, history, log_dose, personal_stats,
};
pub use rules::{Decision, Rule, evaluate_rules};
pub use sleep::{
    DoseAction, DoseEvent, MAX_WINDOW_DAYS, SLEEP_QUALITY, SleepDoseSettings, SleepRecommendation,
    SymptomLog, recommend_sleep_dose,
};
pub use starter::{
    Catalog, OnboardingProfile, Product, SKU_CALM_CLARITY, SKU_DEEP_REST, SKU_DEEP_REST_MICRO,
    SKU_FOCUS_CRISP, StarterSelection, age_on, select_starter_product,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DosingError {
    #[error("product with SKU {0} not found")]
    UnknownProduct(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("invalid dose log: {0}")]
    InvalidLog(String),
}

impl DosingError {
    pub(crate) fn log(msg: impl Into<String>) -> Self {
        Self::InvalidLog(msg.into())
    }

    pub(crate) fn settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }
}
