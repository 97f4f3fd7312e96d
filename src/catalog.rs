//! Feed groups: which upstream endpoint serves which lines.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};
use crate::model::Agency;

pub const ALL_LINES: &str = "ALL";

const MTA_FEED_BASE_URL: &str = "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds";

/// A requested line, or every line the catalog knows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LineSelector {
    #[default]
    All,
    Line(String),
}

impl LineSelector {
    /// `"ALL"` in any case selects everything; other input, including an
    /// empty string, is a line id.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ALL_LINES) {
            LineSelector::All
        } else {
            LineSelector::Line(s.to_string())
        }
    }

    /// Whether a trip on `route_id` belongs to this selection.
    pub fn matches(&self, route_id: Option<&str>) -> bool {
        match self {
            LineSelector::All => true,
            LineSelector::Line(line) => route_id.is_some_and(|r| r.eq_ignore_ascii_case(line)),
        }
    }
}

impl FromStr for LineSelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LineSelector::parse(s))
    }
}

impl fmt::Display for LineSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSelector::All => f.write_str(ALL_LINES),
            LineSelector::Line(line) => f.write_str(line),
        }
    }
}

/// One upstream endpoint and the lines it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedGroup {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub agency: Agency,
    pub lines: Vec<String>,
}

impl FeedGroup {
    fn new(name: &str, url: String, agency: Agency, lines: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url,
            agency,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn serves(&self, line: &str) -> bool {
        let line = line.trim();
        self.lines.iter().any(|l| l.eq_ignore_ascii_case(line))
    }
}

/// A set of feed groups with disjoint line sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub groups: Vec<FeedGroup>,
}

impl Catalog {
    /// Validates that no line is served by two groups.
    pub fn new(groups: Vec<FeedGroup>) -> Result<Self> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        for group in &groups {
            for line in &group.lines {
                if let Some(other) = owners.insert(line.trim().to_ascii_uppercase(), &group.name) {
                    bail!(
                        "line {line:?} is served by both {other:?} and {:?}",
                        group.name
                    );
                }
            }
        }
        Ok(Self { groups })
    }

    /// The NYCT subway endpoints.
    pub fn nyct_subway() -> Self {
        let url = |suffix: &str| format!("{MTA_FEED_BASE_URL}/nyct%2Fgtfs{suffix}");
        Self {
            groups: vec![
                FeedGroup::new(
                    "1234567S",
                    url(""),
                    Agency::Nyct,
                    &["1", "2", "3", "4", "5", "6", "7", "S", "GS", "6X", "7X"],
                ),
                FeedGroup::new("ACE", url("-ace"), Agency::Nyct, &["A", "C", "E", "SR", "H"]),
                FeedGroup::new(
                    "BDFM",
                    url("-bdfm"),
                    Agency::Nyct,
                    &["B", "D", "F", "M", "SF", "FS", "FX"],
                ),
                FeedGroup::new("G", url("-g"), Agency::Nyct, &["G"]),
                FeedGroup::new("JZ", url("-jz"), Agency::Nyct, &["J", "Z"]),
                FeedGroup::new("L", url("-l"), Agency::Nyct, &["L"]),
                FeedGroup::new("NQRW", url("-nqrw"), Agency::Nyct, &["N", "Q", "R", "W"]),
                FeedGroup::new("SIR", url("-si"), Agency::Nyct, &["SIR", "SI"]),
            ],
        }
    }

    /// The Long Island Rail Road endpoint; lines are LIRR branch route ids.
    pub fn lirr() -> Self {
        Self {
            groups: vec![FeedGroup::new(
                "LIRR",
                format!("{MTA_FEED_BASE_URL}/lirr%2Fgtfs-lirr"),
                Agency::Railroad,
                &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"],
            )],
        }
    }

    /// Loads a catalog from a JSON file of the form
    /// `{"groups": [{"name": "...", "url": "...", "agency": "nyct", "lines": ["A"]}]}`.
    pub fn from_json_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let parsed: Catalog = serde_json::from_str(&content)?;
        Self::new(parsed.groups)
    }

    pub fn resolve_endpoint(&self, line: &str) -> FeedResult<&FeedGroup> {
        self.groups
            .iter()
            .find(|g| g.serves(line))
            .ok_or_else(|| FeedError::UnknownLine(line.trim().to_string()))
    }

    /// Groups needed to answer `selector`.
    pub fn groups_for(&self, selector: &LineSelector) -> FeedResult<Vec<&FeedGroup>> {
        match selector {
            LineSelector::All => Ok(self.groups.iter().collect()),
            LineSelector::Line(line) => Ok(vec![self.resolve_endpoint(line)?]),
        }
    }
}
