//! Containment rules: which composites a leaf region feeds, and with what sign.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::delineation::Delineations;

/// Direction of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    #[serde(rename = "+")]
    Include,
    #[serde(rename = "-")]
    Exclude,
}

impl Sign {
    pub fn coefficient(self) -> f64 {
        match self {
            Sign::Include => 1.0,
            Sign::Exclude => -1.0,
        }
    }
}

/// A signed contribution of a leaf region to a composite region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub target: String,
    pub sign: Sign,
}

impl Contribution {
    pub fn include(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sign: Sign::Include,
        }
    }

    pub fn exclude(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sign: Sign::Exclude,
        }
    }
}

/// Derives the contributions of a leaf region from its identifier.
pub trait ContainmentRules {
    /// Composite regions this leaf feeds, with signs.
    fn contributions(&self, region: &str) -> Vec<Contribution>;

    /// Leaf regions kept only as inputs to composites and left out of the
    /// metric output.
    fn is_fragment(&self, _region: &str) -> bool {
        false
    }
}

/// Nested administrative rules for county-level sources.
///
/// Every county feeds the nation, its state (the identifier prefix), its
/// core-based statistical area `M<cbsa>` and, when there is one, its
/// combined statistical area `P<csa>`.
#[derive(Debug, Clone)]
pub struct NestedRules {
    nation: String,
    state_width: usize,
    county_width: usize,
    delineations: Delineations,
}

impl NestedRules {
    pub fn new(delineations: Delineations) -> Self {
        Self {
            nation: "0".to_string(),
            state_width: 2,
            county_width: 5,
            delineations,
        }
    }

    pub fn with_nation(mut self, nation: impl Into<String>) -> Self {
        self.nation = nation.into();
        self
    }

    pub fn with_widths(mut self, state_width: usize, county_width: usize) -> Self {
        self.state_width = state_width;
        self.county_width = county_width;
        self
    }
}

impl ContainmentRules for NestedRules {
    fn contributions(&self, region: &str) -> Vec<Contribution> {
        if region.len() != self.county_width {
            return Vec::new();
        }
        let Some(state) = region.get(..self.state_width) else {
            return Vec::new();
        };

        let mut out = vec![
            Contribution::include(self.nation.as_str()),
            Contribution::include(state),
        ];
        if let Some(area) = self.delineations.get(region) {
            out.push(Contribution::include(format!("M{}", area.cbsa)));
            if let Some(csa) = &area.csa {
                out.push(Contribution::include(format!("P{}", csa)));
            }
        }
        out
    }
}

/// "Rest of province" rules built by inclusion-exclusion.
///
/// Identifiers are read by length: a province (2 characters) is included in
/// its remainder; a metropolitan area (5 characters) is excluded from the
/// remainder of the province it mostly lies in; and a metropolitan part
/// lying in another province (7 characters, `<home>...<other>`) is added back
/// to the home remainder and excluded from the other one.
#[derive(Debug, Clone)]
pub struct RemainderRules {
    prefix: String,
    excluded: Vec<String>,
}

const PROVINCE_WIDTH: usize = 2;
const AREA_WIDTH: usize = 5;
const PART_WIDTH: usize = 7;

impl RemainderRules {
    pub fn new() -> Self {
        Self {
            prefix: "R".to_string(),
            excluded: vec!["01".to_string()],
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Province-length identifiers that get no remainder (the national total).
    pub fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    fn remainder(&self, province: &str) -> String {
        format!("{}{}", self.prefix, province)
    }
}

impl Default for RemainderRules {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainmentRules for RemainderRules {
    fn contributions(&self, region: &str) -> Vec<Contribution> {
        if !region.is_ascii() {
            return Vec::new();
        }
        match region.len() {
            PROVINCE_WIDTH if !self.excluded.iter().any(|e| e == region) => {
                vec![Contribution::include(self.remainder(region))]
            }
            AREA_WIDTH => vec![Contribution::exclude(self.remainder(&region[..PROVINCE_WIDTH]))],
            PART_WIDTH => {
                let home = &region[..PROVINCE_WIDTH];
                let other = &region[AREA_WIDTH..];
                if home == other {
                    Vec::new()
                } else {
                    vec![
                        Contribution::include(self.remainder(home)),
                        Contribution::exclude(self.remainder(other)),
                    ]
                }
            }
            _ => Vec::new(),
        }
    }

    fn is_fragment(&self, region: &str) -> bool {
        region.len() == PART_WIDTH
    }
}

/// Explicit contributions listed per leaf region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableRules {
    #[serde(default)]
    pub rules: IndexMap<String, Vec<Contribution>>,
    #[serde(default)]
    pub fragments: Vec<String>,
}

impl ContainmentRules for TableRules {
    fn contributions(&self, region: &str) -> Vec<Contribution> {
        self.rules.get(region).cloned().unwrap_or_default()
    }

    fn is_fragment(&self, region: &str) -> bool {
        self.fragments.iter().any(|f| f == region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(contributions: &[Contribution]) -> Vec<(String, Sign)> {
        contributions
            .iter()
            .map(|c| (c.target.clone(), c.sign))
            .collect()
    }

    #[test]
    fn test_remainder_province_included() {
        let rules = RemainderRules::new();
        assert_eq!(
            targets(&rules.contributions("35")),
            vec![("R35".to_string(), Sign::Include)]
        );
        assert!(rules.contributions("01").is_empty());
    }

    #[test]
    fn test_remainder_area_excluded_from_home() {
        let rules = RemainderRules::new();
        assert_eq!(
            targets(&rules.contributions("35535")),
            vec![("R35".to_string(), Sign::Exclude)]
        );
    }

    #[test]
    fn test_remainder_cross_border_part() {
        let rules = RemainderRules::new();
        assert_eq!(
            targets(&rules.contributions("3550524")),
            vec![
                ("R35".to_string(), Sign::Include),
                ("R24".to_string(), Sign::Exclude)
            ]
        );
        assert!(rules.contributions("3550535").is_empty());
        assert!(rules.is_fragment("3550524"));
        assert!(!rules.is_fragment("35"));
    }

    #[test]
    fn test_nested_rules_with_delineation() {
        let csv = "FIPS,CBSACode,CSACode,CBSATitle,CSATitle\n\
                   06037,31080,348,\"Los Angeles-Long Beach-Anaheim, CA\",\"Los Angeles-Long Beach, CA\"\n\
                   02013,,,,\n\
                   01001,33860,,\"Montgomery, AL\",\n";
        let rules = NestedRules::new(Delineations::from_reader(csv.as_bytes()).unwrap());

        assert_eq!(
            targets(&rules.contributions("06037")),
            vec![
                ("0".to_string(), Sign::Include),
                ("06".to_string(), Sign::Include),
                ("M31080".to_string(), Sign::Include),
                ("P348".to_string(), Sign::Include),
            ]
        );
        assert_eq!(rules.contributions("01001").len(), 3);
        assert_eq!(rules.contributions("02013").len(), 2);
        assert!(rules.contributions("06").is_empty());
    }

    #[test]
    fn test_table_rules_from_json() {
        let rules: TableRules = serde_json::from_str(
            r#"{"rules": {"A": [{"target": "R01", "sign": "+"}], "B": [{"target": "R01", "sign": "-"}]},
                "fragments": ["B"]}"#,
        )
        .unwrap();
        assert_eq!(rules.contributions("B"), vec![Contribution::exclude("R01")]);
        assert!(rules.contributions("C").is_empty());
        assert!(rules.is_fragment("B"));
    }
}
