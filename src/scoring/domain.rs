//! Backend entities for activity scoring.
//!
//! The PHP backend is loose about JSON types: ids arrive as numbers or strings,
//! flags as `1`, `"1"` or `true`, and timestamps as MySQL `DATETIME` strings.
//! Decoding normalizes those here so the rest of the crate sees one shape.

use chrono::NaiveDateTime;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                lenient_string(deserializer).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a scorable activity.
    ActivityId
);
string_id!(PointRuleId);
string_id!(ScoreId);
string_id!(
    /// Identifier of a competing tribe.
    TribeId
);
string_id!(StudentId);
string_id!(
    /// The SBO officer (`sboId`) performing scoring or attendance updates.
    OfficerId
);

/// A scorable event item tied to a parent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub location: Option<String>,
    #[serde(
        default,
        alias = "start_time",
        alias = "startTime",
        deserialize_with = "lenient_datetime"
    )]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(
        default,
        alias = "end_time",
        alias = "endTime",
        deserialize_with = "lenient_datetime"
    )]
    pub ends_at: Option<NaiveDateTime>,
    #[serde(default, alias = "eventTitle", deserialize_with = "lenient_opt_string")]
    pub event_title: Option<String>,
}

impl Activity {
    pub fn new(id: impl Into<ActivityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            location: None,
            starts_at: None,
            ends_at: None,
            event_title: None,
        }
    }
}

/// A configured (place, points) pair for an activity.
///
/// `allows_all` marks the participation rule: the same points may be awarded
/// to many tribes instead of a single placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRule {
    pub id: PointRuleId,
    #[serde(deserialize_with = "lenient_string")]
    pub place: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub points: i64,
    #[serde(default, alias = "allowsAll", deserialize_with = "lenient_bool")]
    pub allows_all: bool,
}

impl PointRule {
    pub fn placement(id: impl Into<PointRuleId>, place: impl Into<String>, points: i64) -> Self {
        Self {
            id: id.into(),
            place: place.into(),
            points,
            allows_all: false,
        }
    }

    pub fn participation(
        id: impl Into<PointRuleId>,
        place: impl Into<String>,
        points: i64,
    ) -> Self {
        Self {
            allows_all: true,
            ..Self::placement(id, place, points)
        }
    }

    pub const fn is_participation(&self) -> bool {
        self.allows_all
    }
}

/// A persisted award of a point rule's points to a tribe for an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub id: ScoreId,
    #[serde(default, alias = "activityId")]
    pub activity_id: ActivityId,
    #[serde(alias = "tribeId")]
    pub tribe_id: TribeId,
    #[serde(alias = "pointRuleId", alias = "ruleId")]
    pub point_rule_id: PointRuleId,
    #[serde(
        default,
        alias = "awardedBy",
        alias = "officer_name",
        deserialize_with = "lenient_opt_string"
    )]
    pub awarded_by: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_datetime")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub place: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub points: Option<i64>,
    #[serde(default, alias = "tribeName", deserialize_with = "lenient_opt_string")]
    pub tribe_name: Option<String>,
    #[serde(default, alias = "allowsAll", deserialize_with = "lenient_opt_bool")]
    pub allows_all: Option<bool>,
}

impl Score {
    pub fn new(
        id: impl Into<ScoreId>,
        activity_id: impl Into<ActivityId>,
        tribe_id: impl Into<TribeId>,
        point_rule_id: impl Into<PointRuleId>,
    ) -> Self {
        Self {
            id: id.into(),
            activity_id: activity_id.into(),
            tribe_id: tribe_id.into(),
            point_rule_id: point_rule_id.into(),
            awarded_by: None,
            created_at: None,
            place: None,
            points: None,
            tribe_name: None,
            allows_all: None,
        }
    }
}

/// A competing team. Ranking fields are computed by the backend and are only
/// ever displayed, never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TribeRow")]
pub struct Tribe {
    pub id: TribeId,
    pub name: String,
    pub rank: Option<u32>,
    pub total_points: Option<i64>,
    pub display_points: Option<i64>,
    pub special_bonus: Option<i64>,
    pub total_scores: Option<i64>,
    pub tied_with: Vec<String>,
}

impl Tribe {
    pub fn new(id: impl Into<TribeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank: None,
            total_points: None,
            display_points: None,
            special_bonus: None,
            total_scores: None,
            tied_with: Vec::new(),
        }
    }
}

/// Wire shape of a tribe. Some routes send `name`, others `tribe_name`, and
/// a few send both; `name` wins when it is non-empty.
#[derive(Deserialize)]
struct TribeRow {
    id: TribeId,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    tribe_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    total_points: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    display_points: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    special_bonus: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    total_scores: Option<i64>,
    #[serde(default, deserialize_with = "lenient_name_list")]
    tied_with: Vec<String>,
}

impl TryFrom<TribeRow> for Tribe {
    type Error = String;

    fn try_from(row: TribeRow) -> Result<Self, Self::Error> {
        let name = row
            .name
            .or(row.tribe_name)
            .ok_or_else(|| format!("tribe {} has no name", row.id))?;
        Ok(Self {
            id: row.id,
            name,
            rank: row.rank,
            total_points: row.total_points,
            display_points: row.display_points,
            special_bonus: row.special_bonus,
            total_scores: row.total_scores,
            tied_with: row.tied_with,
        })
    }
}

/// A student's participation state for an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    #[default]
    Pending,
    Participated,
    Absent,
    Unknown,
}

impl ParticipationStatus {
    pub const fn ordered() -> [Self; 4] {
        [Self::Pending, Self::Participated, Self::Absent, Self::Unknown]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Participated => "participated",
            Self::Absent => "absent",
            Self::Unknown => "unknown",
        }
    }

    fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "pending" | "registered" => Self::Pending,
            "participated" | "present" | "joined" | "attended" => Self::Participated,
            "absent" | "not_participated" | "missed" => Self::Absent,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ParticipationStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match Self::from_label(raw) {
            Self::Unknown => Err(format!(
                "'{raw}' is not a participation status (pending, participated, absent)"
            )),
            status => Ok(status),
        }
    }
}

impl<'de> Deserialize<'de> for ParticipationStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let status = match Value::deserialize(deserializer)? {
            Value::Null => Self::Pending,
            Value::String(raw) => Self::from_label(&raw),
            _ => Self::Unknown,
        };
        Ok(status)
    }
}

/// A student registered against an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(alias = "studentId")]
    pub student_id: StudentId,
    #[serde(alias = "student_name", deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, alias = "tribeName", deserialize_with = "lenient_opt_string")]
    pub tribe_name: Option<String>,
    #[serde(default)]
    pub status: ParticipationStatus,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(raw.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => Some(raw.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    };
    Ok(value)
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "" | "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Value::Null => Some(false),
        _ => None,
    }
}

/// Lenient truthiness shared with response normalization.
pub(crate) fn is_truthy(value: &Value) -> bool {
    truthy(value).unwrap_or(false)
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    truthy(&value).ok_or_else(|| de::Error::custom(format!("expected a flag, found {value}")))
}

fn lenient_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(truthy(&value))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n.round() as i64)),
        Value::String(raw) => {
            let raw = raw.trim();
            raw.parse::<i64>()
                .ok()
                .or_else(|| raw.parse::<f64>().ok().map(|n| n.round() as i64))
        }
        _ => None,
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    integer(&value).ok_or_else(|| de::Error::custom(format!("expected an integer, found {value}")))
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(integer(&Value::deserialize(deserializer)?))
}

fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(integer(&Value::deserialize(deserializer)?).and_then(|n| u32::try_from(n).ok()))
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(parse_datetime(&raw)),
        _ => Ok(None),
    }
}

fn lenient_name_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(raw) => Some(raw.trim().to_string()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .collect(),
        Value::String(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Ok(names)
}
