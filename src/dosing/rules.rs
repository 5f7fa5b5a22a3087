/// A guarded outcome: `outcome` applies when `when` holds for the input.
#[derive(Debug, Clone, Copy)]
pub struct Rule<I, O> {
    pub name: &'static str,
    pub when: fn(&I) -> bool,
    pub outcome: O,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision<'a, O> {
    /// Name of the matching rule, or `None` when the fallback applied.
    pub rule: Option<&'static str>,
    pub outcome: &'a O,
}

/// Evaluates `rules` top to bottom; the first match wins.
pub fn evaluate_rules<'a, I, O>(
    rules: &'a [Rule<I, O>],
    input: &I,
    fallback: &'a O,
) -> Decision<'a, O> {
    rules
        .iter()
        .find(|rule| (rule.when)(input))
        .map(|rule| Decision {
            rule: Some(rule.name),
            outcome: &rule.outcome,
        })
        .unwrap_or(Decision {
            rule: None,
            outcome: fallback,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_negative(x: &i32) -> bool {
        *x < 0
    }

    fn is_small(x: &i32) -> bool {
        *x < 10
    }

    const RULES: [Rule<i32, &str>; 2] = [
        Rule {
            name: "negative",
            when: is_negative,
            outcome: "neg",
        },
        Rule {
            name: "small",
            when: is_small,
            outcome: "small",
        },
    ];

    #[test]
    fn first_matching_rule_wins() {
        let decision = evaluate_rules(&RULES, &-5, &"big");
        assert_eq!(decision.rule, Some("negative"));
        assert_eq!(*decision.outcome, "neg");
    }

    #[test]
    fn fallback_applies_when_nothing_matches() {
        let decision = evaluate_rules(&RULES, &50, &"big");
        assert_eq!(decision.rule, None);
        assert_eq!(*decision.outcome, "big");
    }
}
