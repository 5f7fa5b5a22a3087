use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::DosingError;
use super::rules::{Rule, evaluate_rules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub thc_mg_per_capsule: f64,
    pub intended_effect: String,
}

impl Product {
    fn new(sku: &str, name: &str, thc_mg_per_capsule: f64, intended_effect: &str) -> Self {
        Self {
            sku: sku.to_string(),
            name: name.to_string(),
            thc_mg_per_capsule,
            intended_effect: intended_effect.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog(pub Vec<Product>);

impl Default for Catalog {
    fn default() -> Self {
        Self(vec![
            Product::new(SKU_DEEP_REST_MICRO, "Deep Rest Micro", 2.5, "sleep"),
            Product::new(SKU_DEEP_REST, "Deep Rest", 5.0, "sleep"),
            Product::new(SKU_CALM_CLARITY, "Calm Clarity", 2.5, "calm"),
            Product::new(SKU_FOCUS_CRISP, "Focus Crisp", 2.5, "focus"),
        ])
    }
}

impl Catalog {
    pub fn by_sku(&self, sku: &str) -> Result<&Product, DosingError> {
        self.0
            .iter()
            .find(|p| p.sku == sku)
            .ok_or_else(|| DosingError::UnknownProduct(sku.to_string()))
    }
}

pub const SKU_DEEP_REST_MICRO: &str = "CRX-DR-2.5";
pub const SKU_DEEP_REST: &str = "CRX-DR-5";
pub const SKU_CALM_CLARITY: &str = "CRX-CL-2.5";
pub const SKU_FOCUS_CRISP: &str = "CRX-FC-2.5";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingProfile {
    pub date_of_birth: Option<NaiveDate>,
    /// One of naive, light, regular, heavy; missing means naive.
    pub cannabis_experience: Option<String>,
    pub primary_goals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarterSelection {
    pub product: Product,
    pub rule: Option<&'static str>,
    pub explanation: String,
}

struct StarterSignals {
    age: Option<u32>,
    experience: String,
    goals: Vec<String>,
}

impl StarterSignals {
    fn from_profile(profile: &OnboardingProfile, today: NaiveDate) -> Self {
        Self {
            age: profile.date_of_birth.and_then(|dob| age_on(dob, today)),
            experience: profile
                .cannabis_experience
                .as_deref()
                .unwrap_or("naive")
                .trim()
                .to_lowercase(),
            goals: profile
                .primary_goals
                .iter()
                .map(|g| g.trim().to_lowercase())
                .collect(),
        }
    }

    fn has_goal(&self, goal: &str) -> bool {
        self.goals.iter().any(|g| g == goal)
    }
}

fn older_naive_sleeper(s: &StarterSignals) -> bool {
    s.has_goal("sleep") && s.age.is_some_and(|age| age >= 60) && s.experience == "naive"
}

fn sleeper(s: &StarterSignals) -> bool {
    s.has_goal("sleep")
}

fn wants_calm(s: &StarterSignals) -> bool {
    s.has_goal("anxiety") || s.has_goal("calm")
}

fn wants_focus(s: &StarterSignals) -> bool {
    s.has_goal("focus")
}

static STARTER_RULES: [Rule<StarterSignals, &str>; 4] = [
    Rule {
        name: "sleep_60_plus_naive",
        when: older_naive_sleeper,
        outcome: SKU_DEEP_REST_MICRO,
    },
    Rule {
        name: "sleep",
        when: sleeper,
        outcome: SKU_DEEP_REST,
    },
    Rule {
        name: "calm",
        when: wants_calm,
        outcome: SKU_CALM_CLARITY,
    },
    Rule {
        name: "focus",
        when: wants_focus,
        outcome: SKU_FOCUS_CRISP,
    },
];

pub fn select_starter_product(
    catalog: &Catalog,
    profile: &OnboardingProfile,
    today: NaiveDate,
) -> Result<StarterSelection, DosingError> {
    let signals = StarterSignals::from_profile(profile, today);
    let decision = evaluate_rules(&STARTER_RULES, &signals, &SKU_CALM_CLARITY);
    let product = catalog.by_sku(decision.outcome)?.clone();
    let explanation = format!(
        "Based on your age, experience level, and goals, we're starting you with {} ({} mg THC).",
        product.name, product.thc_mg_per_capsule
    );
    Ok(StarterSelection {
        product,
        rule: decision.rule,
        explanation,
    })
}

/// Whole years between `dob` and `today`; `None` for a future birth date.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    let before_birthday = (today.month(), today.day()) < (dob.month(), dob.day());
    let age = today.year() - dob.year() - i32::from(before_birthday);
    u32::try_from(age).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn profile(dob: Option<NaiveDate>, experience: Option<&str>, goals: &[&str]) -> OnboardingProfile {
        OnboardingProfile {
            date_of_birth: dob,
            cannabis_experience: experience.map(str::to_string),
            primary_goals: goals.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn select(p: &OnboardingProfile) -> StarterSelection {
        select_starter_product(&Catalog::default(), p, date(2026, 6, 1)).expect("known sku")
    }

    #[test]
    fn age_counts_whole_years() {
        assert_eq!(age_on(date(1960, 6, 2), date(2026, 6, 1)), Some(65));
        assert_eq!(age_on(date(1960, 6, 1), date(2026, 6, 1)), Some(66));
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 6, 1)), None);
    }

    #[test]
    fn older_naive_sleeper_gets_micro_dose() {
        let selection = select(&profile(Some(date(1958, 3, 1)), Some("Naive"), &["sleep"]));
        assert_eq!(selection.product.sku, SKU_DEEP_REST_MICRO);
        assert_eq!(selection.rule, Some("sleep_60_plus_naive"));
        assert!(selection.explanation.contains("Deep Rest Micro (2.5 mg THC)"));
    }

    #[test]
    fn missing_experience_counts_as_naive() {
        let selection = select(&profile(Some(date(1950, 1, 1)), None, &["sleep"]));
        assert_eq!(selection.product.sku, SKU_DEEP_REST_MICRO);
    }

    #[test]
    fn sleeper_without_known_age_gets_standard_dose() {
        let selection = select(&profile(None, Some("naive"), &["sleep", "calm"]));
        assert_eq!(selection.product.sku, SKU_DEEP_REST);
    }

    #[test]
    fn experienced_sleeper_gets_standard_dose() {
        let selection = select(&profile(Some(date(1950, 1, 1)), Some("regular"), &["sleep"]));
        assert_eq!(selection.product.sku, SKU_DEEP_REST);
    }

    #[test]
    fn anxiety_maps_to_calm_before_focus() {
        let selection = select(&profile(None, None, &["focus", "anxiety"]));
        assert_eq!(selection.product.sku, SKU_CALM_CLARITY);
        assert_eq!(selection.rule, Some("calm"));
    }

    #[test]
    fn focus_goal_gets_focus_product() {
        let selection = select(&profile(None, None, &["focus"]));
        assert_eq!(selection.product.sku, SKU_FOCUS_CRISP);
    }

    #[test]
    fn no_goals_fall_back_to_calm() {
        let selection = select(&profile(None, None, &[]));
        assert_eq!(selection.product.sku, SKU_CALM_CLARITY);
        assert_eq!(selection.rule, None);
    }

    #[test]
    fn missing_catalog_entry_is_reported() {
        let catalog = Catalog(vec![]);
        let err = select_starter_product(&catalog, &profile(None, None, &[]), date(2026, 6, 1))
            .expect_err("must fail");
        assert_eq!(err, DosingError::UnknownProduct(SKU_CALM_CLARITY.to_string()));
    }
}
