use indexmap::IndexMap;
use log::warn;
use regex::Regex;

/// A single grouping rule: builds whose `"{pipeline}-{job}"` matches `pattern`
/// are reported under the incident named after `label`.
#[derive(Debug, Clone)]
pub struct GroupingRule {
    pattern: String,
    label: String,
    /// `None` when the pattern failed to compile; such a rule never matches.
    regex: Option<Regex>,
}

impl GroupingRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let label = label.into();

        let regex = match Regex::new(&pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Ignoring grouping pattern {pattern:?} for {label:?}: {e}");
                None
            }
        };

        Self {
            pattern,
            label,
            regex,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn matches(&self, probe: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(probe))
    }
}

/// Ordered grouping rules. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct GroupingStrategy {
    rules: Vec<GroupingRule>,
}

impl GroupingStrategy {
    pub fn new(rules: Vec<GroupingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[GroupingRule] {
        &self.rules
    }
}

/// Builds a strategy from the configured `label -> [patterns]` table.
///
/// Each group becomes one rule whose pattern is the alternation of all of its
/// patterns, e.g. `(.*-groupa)|(groupa-.*)`. Groups keep their configured order.
pub fn parse_grouping(groups: &IndexMap<String, Vec<String>>) -> GroupingStrategy {
    let rules = groups
        .iter()
        .filter(|(_, patterns)| !patterns.is_empty())
        .map(|(label, patterns)| {
            let alternation = patterns
                .iter()
                .map(|pattern| format!("({pattern})"))
                .collect::<Vec<_>>()
                .join("|");
            GroupingRule::new(alternation, label.as_str())
        })
        .collect();

    GroupingStrategy::new(rules)
}

/// Returns the incident key for a failing build.
///
/// Walks the rules in order against `"{pipeline}-{job}"` and returns
/// `"{label} has failed"` for the first match, or
/// `"{pipeline}/{job} has {status}"` when nothing matches.
pub fn classify(pipeline: &str, job: &str, status: &str, strategy: &GroupingStrategy) -> String {
    let probe = format!("{pipeline}-{job}");

    strategy
        .rules
        .iter()
        .find(|rule| rule.matches(&probe))
        .map_or_else(
            || format!("{pipeline}/{job} has {status}"),
            |rule| format!("{} has failed", rule.label),
        )
}
