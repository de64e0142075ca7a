use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, GeoPoint, Result};

/// Listing categories to request. Passed through to the source untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl TypeFilter {
    pub fn only<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(types.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Case-insensitive match of any requested type against `categories`.
    pub fn matches<S: AsRef<str>>(&self, categories: &[S]) -> bool {
        match self {
            Self::All => true,
            Self::Only(types) => types.iter().any(|t| {
                categories
                    .iter()
                    .any(|c| c.as_ref().eq_ignore_ascii_case(t))
            }),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = Infallible;

    /// `"all"` (or an empty string) selects everything; anything else is a
    /// comma separated list.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(Self::only(
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        ))
    }
}

impl std::fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Only(types) => {
                let joined: Vec<&str> = types.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// A disk to cover, and how finely to cut it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub max_cell_km: f64,
    #[serde(default)]
    pub type_filter: TypeFilter,
}

impl RadiusQuery {
    pub fn new(center: GeoPoint, radius_km: f64, max_cell_km: f64) -> Self {
        Self {
            center,
            radius_km,
            max_cell_km,
            type_filter: TypeFilter::All,
        }
    }

    #[must_use]
    pub fn type_filter(mut self, type_filter: TypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    /// Input validation. `cell_cap_km` is the largest cell the source accepts.
    pub fn validate(&self, cell_cap_km: Option<f64>) -> Result<()> {
        self.center.validate()?;
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(Error::InvalidRadius(self.radius_km));
        }
        if !self.max_cell_km.is_finite() || self.max_cell_km <= 0.0 {
            return Err(Error::InvalidCellSize(self.max_cell_km));
        }
        if let Some(cap) = cell_cap_km
            && self.max_cell_km > cap
        {
            return Err(Error::CellSizeAboveCap {
                requested: self.max_cell_km,
                cap,
            });
        }
        if let TypeFilter::Only(types) = &self.type_filter
            && types.iter().any(|t| t.trim().is_empty())
        {
            return Err(Error::EmptyTypeFilterEntry);
        }
        Ok(())
    }

    /// Whether `point` lies inside the query disk.
    pub fn covers(&self, point: &GeoPoint) -> bool {
        self.center.distance_km(point) <= self.radius_km
    }
}
