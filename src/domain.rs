use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const DEFAULT_PROJECT_ID: &str = "ga2xj";

static PROJECT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]{5,}$").unwrap());

/// OSF node identifier, the `<id>` in `https://osf.io/<id>/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self(DEFAULT_PROJECT_ID.to_string())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !PROJECT_ID_RE.is_match(&normalized) {
            return Err(FetchError::InvalidProjectId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Airline,
    Imdb,
    Ssb,
    TpcH,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [Dataset::Airline, Dataset::Imdb, Dataset::Ssb, Dataset::TpcH];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Airline => "airline",
            Dataset::Imdb => "imdb",
            Dataset::Ssb => "ssb",
            Dataset::TpcH => "tpc_h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Run {
    DeepdbAugmented,
    ParsedPlans,
    Raw,
}

impl Run {
    pub const ALL: [Run; 3] = [Run::DeepdbAugmented, Run::ParsedPlans, Run::Raw];

    pub fn name(&self) -> &'static str {
        match self {
            Run::DeepdbAugmented => "deepdb_augmented",
            Run::ParsedPlans => "parsed_plans",
            Run::Raw => "raw",
        }
    }
}

/// Anything shipped as `<name>.zip` in the OSF bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Dataset(Dataset),
    Run(Run),
}

impl Collection {
    /// Datasets first, then runs.
    pub fn all() -> impl Iterator<Item = Collection> {
        Dataset::ALL
            .into_iter()
            .map(Collection::Dataset)
            .chain(Run::ALL.into_iter().map(Collection::Run))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Dataset(dataset) => dataset.name(),
            Collection::Run(run) => run.name(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Dataset(_) => "dataset",
            Collection::Run(_) => "run",
        }
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.name())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where an archive's entries land relative to the collection's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractTarget {
    /// `<root>/<name>/...`
    #[default]
    Subdirectory,
    /// `<root>/...`, archives are expected to carry their own top-level folder.
    Root,
}

impl fmt::Display for ExtractTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractTarget::Subdirectory => write!(f, "subdirectory"),
            ExtractTarget::Root => write!(f, "root"),
        }
    }
}
