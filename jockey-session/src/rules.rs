//! Automatic playlist rules
//!
//! A [`RuleSet`] is a declarative filter over the catalog. [`evaluate`] is
//! pure: the same rule set over the same catalog always yields the same
//! tracks in the same order.

use chrono::{DateTime, NaiveDate, Utc};
use jockey_common::{PlaylistId, Track, TrackRef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Track attribute a clause inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Title,
    Artist,
    Album,
    Genre,
    Year,
    DurationMs,
    DateAdded,
    PlayCount,
    SkipCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    LessThan,
    GreaterThan,
}

/// One clause: `field op value`
///
/// `value` is text; numeric fields parse it as an integer, `date_added`
/// as RFC 3339 or `YYYY-MM-DD`. A value that does not parse for its field
/// matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub field: RuleField,
    pub op: RuleOp,
    pub value: String,
}

impl Rule {
    pub fn new(field: RuleField, op: RuleOp, value: impl Into<String>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every clause must match
    #[default]
    All,
    /// At least one clause must match
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub key: RuleField,
    #[serde(default)]
    pub descending: bool,
}

/// Declarative playlist definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub sort: Option<SortOrder>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            rules: Vec::new(),
            match_mode,
            sort: None,
            limit: None,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn sorted_by(mut self, key: RuleField, descending: bool) -> Self {
        self.sort = Some(SortOrder { key, descending });
        self
    }

    pub fn limited_to(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `track` satisfies the clauses under the match mode
    pub fn matches(&self, track: &Track) -> bool {
        match self.match_mode {
            MatchMode::All => self.rules.iter().all(|rule| rule_matches(rule, track)),
            MatchMode::Any => {
                self.rules.is_empty() || self.rules.iter().any(|rule| rule_matches(rule, track))
            }
        }
    }
}

/// Filter, sort and limit `catalog` according to `rule_set`
pub fn evaluate(rule_set: &RuleSet, catalog: &[TrackRef]) -> Vec<TrackRef> {
    let mut matched: Vec<TrackRef> = catalog
        .iter()
        .filter(|track| rule_set.matches(track))
        .cloned()
        .collect();

    if let Some(order) = rule_set.sort {
        matched.sort_by(|a, b| {
            compare_field(order.key, order.descending, a, b).then_with(|| a.id.cmp(&b.id))
        });
    }

    if let Some(limit) = rule_set.limit {
        matched.truncate(limit);
    }

    debug!(
        "Rule set '{}' matched {} of {} tracks",
        rule_set.name,
        matched.len(),
        catalog.len()
    );
    matched
}

/// Field value in comparable form
#[derive(Debug, PartialEq, PartialOrd)]
enum Value {
    Text(String),
    Number(i64),
    Date(DateTime<Utc>),
    Missing,
}

fn field_value(field: RuleField, track: &Track) -> Value {
    match field {
        RuleField::Title => text_value(&track.title),
        RuleField::Artist => text_value(&track.artist),
        RuleField::Album => text_value(&track.album),
        RuleField::Genre => text_value(&track.genre),
        RuleField::Year => track
            .year
            .map_or(Value::Missing, |y| Value::Number(i64::from(y))),
        RuleField::DurationMs => Value::Number(i64::try_from(track.duration_ms).unwrap_or(i64::MAX)),
        RuleField::DateAdded => Value::Date(track.date_added),
        RuleField::PlayCount => Value::Number(i64::from(track.play_count)),
        RuleField::SkipCount => Value::Number(i64::from(track.skip_count)),
    }
}

fn text_value(text: &str) -> Value {
    if text.trim().is_empty() {
        Value::Missing
    } else {
        Value::Text(text.to_lowercase())
    }
}

/// Parse a clause value for the kind of `actual`
fn parse_operand(actual: &Value, raw: &str) -> Option<Value> {
    match actual {
        Value::Text(_) => Some(Value::Text(raw.to_lowercase())),
        Value::Number(_) => raw.trim().parse().ok().map(Value::Number),
        Value::Date(_) => parse_date(raw.trim()).map(Value::Date),
        Value::Missing => None,
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn rule_matches(rule: &Rule, track: &Track) -> bool {
    let actual = field_value(rule.field, track);

    // Substring tests work on the textual form of any field
    if matches!(rule.op, RuleOp::Contains | RuleOp::NotContains) {
        let haystack = match &actual {
            Value::Text(text) => text.clone(),
            Value::Number(n) => n.to_string(),
            Value::Date(d) => d.to_rfc3339(),
            Value::Missing => String::new(),
        };
        let found = haystack.contains(&rule.value.to_lowercase());
        return (rule.op == RuleOp::Contains) == found;
    }

    let Some(expected) = parse_operand(&actual, &rule.value) else {
        return rule.op == RuleOp::NotEquals && actual == Value::Missing;
    };
    let ordering = actual.partial_cmp(&expected);

    match rule.op {
        RuleOp::Equals => ordering == Some(Ordering::Equal),
        RuleOp::NotEquals => ordering != Some(Ordering::Equal),
        RuleOp::LessThan => ordering == Some(Ordering::Less),
        RuleOp::GreaterThan => ordering == Some(Ordering::Greater),
        RuleOp::Contains | RuleOp::NotContains => false,
    }
}

fn compare_field(field: RuleField, descending: bool, a: &Track, b: &Track) -> Ordering {
    let (a, b) = (field_value(field, a), field_value(field, b));
    match (&a, &b) {
        // Tracks without the value sort last in either direction
        (Value::Missing, Value::Missing) => Ordering::Equal,
        (Value::Missing, _) => Ordering::Greater,
        (_, Value::Missing) => Ordering::Less,
        _ => {
            let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}
