//! Declarative source profiles: how the rows of a source file become
//! [`RawRecord`]s.
//!
//! Two layouts are supported. A *long* source has one observation per row,
//! with the category and the count in their own columns. A *wide* source has
//! one row per region and age bucket, and one column per category and sex
//! (`NHWA_FEMALE`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::{DataTable, RawRecord};
use crate::error::{HarmonizeError, Result};
use crate::schema::Sex;

/// A column contributing to the region identifier.
///
/// Region identifiers are the concatenation of their columns, each left
/// padded with zeros to `width` when given (`STATE` 2 + `COUNTY` 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionColumn {
    pub column: String,
    #[serde(default)]
    pub width: Option<usize>,
}

/// Year codes used in place of calendar years.
///
/// `year = code + offset`; codes outside `first..=last` are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCodes {
    pub offset: i32,
    pub first: i32,
    pub last: i32,
}

impl YearCodes {
    pub fn decode(&self, code: i32) -> Option<i32> {
        (self.first..=self.last)
            .contains(&code)
            .then_some(code + self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearColumn {
    pub column: String,
    #[serde(default)]
    pub codes: Option<YearCodes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layout {
    Long {
        category_column: String,
        value_column: String,
    },
    Wide {
        /// Column suffix -> sex, e.g. `"_FEMALE": "female"`.
        #[serde(default)]
        sex_suffixes: IndexMap<String, Sex>,
    },
}

/// Per-edition overrides, chosen once by year before any row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVariant {
    pub years: Vec<i32>,
    /// Additional `column == value` filters.
    #[serde(default)]
    pub conditions: IndexMap<String, String>,
    /// Replaces the layout's category column.
    #[serde(default)]
    pub category_column: Option<String>,
}

/// How to read one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub region: Vec<RegionColumn>,
    pub bucket_column: String,
    #[serde(default)]
    pub sex_column: Option<String>,
    /// Source sex tag -> sex. Rows with unmapped tags are skipped.
    #[serde(default)]
    pub sex_tags: IndexMap<String, Sex>,
    #[serde(default)]
    pub year: Option<YearColumn>,
    pub layout: Layout,
    /// Rows are kept only when every `column == value` holds.
    #[serde(default)]
    pub conditions: IndexMap<String, String>,
    /// Wide-layout columns that are never category counts.
    #[serde(default)]
    pub ignored_columns: Vec<String>,
    #[serde(default)]
    pub variants: Vec<SourceVariant>,
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl SourceProfile {
    /// The variant declared for `year`, if any.
    pub fn variant_for(&self, year: Option<i32>) -> Option<&SourceVariant> {
        let year = year?;
        self.variants.iter().find(|v| v.years.contains(&year))
    }

    /// Bind the profile to an edition year.
    ///
    /// `year` selects the variant and is stamped on every record when the
    /// source has no year column.
    pub fn reader(&self, year: Option<i32>) -> SourceReader<'_> {
        SourceReader {
            profile: self,
            variant: self.variant_for(year),
            year,
        }
    }
}

/// Counts from reading one source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    pub rows: usize,
    /// Rows failing a condition.
    pub filtered: usize,
    /// Rows whose sex tag has no mapping.
    pub unmapped_sex: usize,
    /// Rows whose year code is out of range.
    pub out_of_range_year: usize,
    /// Suppressed or empty cells read as zero.
    pub missing_values: usize,
}

impl ReadStats {
    /// Add the counts of another source.
    pub fn absorb(&mut self, other: ReadStats) {
        self.rows += other.rows;
        self.filtered += other.filtered;
        self.unmapped_sex += other.unmapped_sex;
        self.out_of_range_year += other.out_of_range_year;
        self.missing_values += other.missing_values;
    }
}

/// A profile bound to an edition.
#[derive(Debug, Clone)]
pub struct SourceReader<'a> {
    profile: &'a SourceProfile,
    variant: Option<&'a SourceVariant>,
    year: Option<i32>,
}

/// Resolved column positions.
struct Columns {
    region: Vec<(usize, Option<usize>)>,
    bucket: usize,
    sex: Option<usize>,
    year: Option<(usize, Option<YearCodes>)>,
    conditions: Vec<(usize, String)>,
    values: ValueColumns,
}

enum ValueColumns {
    Long { category: usize, value: usize },
    Wide(Vec<WideColumn>),
}

struct WideColumn {
    index: usize,
    category: String,
    sex: Option<Sex>,
}

impl<'a> SourceReader<'a> {
    pub fn variant(&self) -> Option<&'a SourceVariant> {
        self.variant
    }

    /// Convert every row of `table` into raw records.
    pub fn read(&self, table: &DataTable) -> Result<(Vec<RawRecord>, ReadStats)> {
        let columns = self.resolve(table)?;
        let mut stats = ReadStats::default();
        let mut records = Vec::new();

        'rows: for (i, row) in table.rows.iter().enumerate() {
            stats.rows += 1;
            let line = i + 2;

            for (col, expected) in &columns.conditions {
                if row[*col].trim() != expected {
                    stats.filtered += 1;
                    continue 'rows;
                }
            }

            let year = match columns.year {
                Some((col, codes)) => {
                    let raw = row[col].trim();
                    let parsed: i32 = raw.parse().map_err(|_| HarmonizeError::Parse {
                        row: line,
                        column: table.headers[col].clone(),
                        message: format!("'{}' is not a year", raw),
                    })?;
                    match codes {
                        Some(codes) => match codes.decode(parsed) {
                            Some(y) => Some(y),
                            None => {
                                stats.out_of_range_year += 1;
                                continue;
                            }
                        },
                        None => Some(parsed),
                    }
                }
                None => self.year,
            };

            let row_sex = match columns.sex {
                Some(col) => match self.profile.sex_tags.get(row[col].trim()) {
                    Some(sex) => Some(*sex),
                    None => {
                        stats.unmapped_sex += 1;
                        continue;
                    }
                },
                None => None,
            };

            let region = region_id(row, &columns.region);
            let bucket = row[columns.bucket].trim();

            match &columns.values {
                ValueColumns::Long { category, value } => {
                    let count = parse_count(&row[*value], line, &table.headers[*value], &mut stats)?;
                    records.push(RawRecord::new(
                        region,
                        year,
                        bucket,
                        row_sex.unwrap_or(Sex::Total),
                        row[*category].trim(),
                        count,
                    ));
                }
                ValueColumns::Wide(wide) => {
                    for column in wide {
                        let Some(sex) = column.sex.or(row_sex) else {
                            continue;
                        };
                        let count =
                            parse_count(&row[column.index], line, &table.headers[column.index], &mut stats)?;
                        records.push(RawRecord::new(
                            region.as_str(),
                            year,
                            bucket,
                            sex,
                            column.category.as_str(),
                            count,
                        ));
                    }
                }
            }
        }

        debug!(
            rows = stats.rows,
            records = records.len(),
            filtered = stats.filtered,
            unmapped_sex = stats.unmapped_sex,
            "read source rows"
        );
        Ok((records, stats))
    }

    fn resolve(&self, table: &DataTable) -> Result<Columns> {
        let profile = self.profile;
        let find = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                HarmonizeError::Config(format!("column '{}' not found in source", name))
            })
        };

        if profile.region.is_empty() {
            return Err(HarmonizeError::Config(
                "source profile has no region columns".to_string(),
            ));
        }
        let region = profile
            .region
            .iter()
            .map(|r| Ok((find(&r.column)?, r.width)))
            .collect::<Result<Vec<_>>>()?;
        let bucket = find(&profile.bucket_column)?;
        let sex = profile.sex_column.as_deref().map(find).transpose()?;
        let year = match &profile.year {
            Some(y) => Some((find(&y.column)?, y.codes)),
            None => None,
        };

        let mut conditions = Vec::new();
        let variant_conditions = self.variant.map(|v| &v.conditions).into_iter().flatten();
        for (column, value) in profile.conditions.iter().chain(variant_conditions) {
            conditions.push((find(column)?, value.clone()));
        }

        let values = match &profile.layout {
            Layout::Long {
                category_column,
                value_column,
            } => {
                let category_column = self
                    .variant
                    .and_then(|v| v.category_column.as_deref())
                    .unwrap_or(category_column);
                ValueColumns::Long {
                    category: find(category_column)?,
                    value: find(value_column)?,
                }
            }
            Layout::Wide { sex_suffixes } => {
                let mut key_columns: Vec<usize> = region.iter().map(|(c, _)| *c).collect();
                key_columns.push(bucket);
                key_columns.extend(sex);
                key_columns.extend(year.map(|(c, _)| c));
                key_columns.extend(conditions.iter().map(|(c, _)| *c));

                let wide = wide_columns(table, &key_columns, &profile.ignored_columns, sex_suffixes, sex.is_some());
                if wide.is_empty() {
                    return Err(HarmonizeError::Config(
                        "no category columns matched the sex suffixes".to_string(),
                    ));
                }
                ValueColumns::Wide(wide)
            }
        };

        Ok(Columns {
            region,
            bucket,
            sex,
            year,
            conditions,
            values,
        })
    }
}

/// Category columns of a wide table, with the sex their suffix names.
///
/// Columns without a matching suffix are kept only when the row carries a
/// sex column of its own.
fn wide_columns(
    table: &DataTable,
    key_columns: &[usize],
    ignored: &[String],
    suffixes: &IndexMap<String, Sex>,
    row_sex: bool,
) -> Vec<WideColumn> {
    let mut by_length: Vec<(&String, &Sex)> = suffixes.iter().collect();
    by_length.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));

    let mut out = Vec::new();
    for (index, header) in table.headers.iter().enumerate() {
        if key_columns.contains(&index) || ignored.contains(header) {
            continue;
        }
        let matched = by_length.iter().find_map(|(suffix, sex)| {
            header
                .strip_suffix(suffix.as_str())
                .filter(|category| !category.is_empty())
                .map(|category| (category.to_string(), **sex))
        });
        match matched {
            Some((category, sex)) => out.push(WideColumn {
                index,
                category,
                sex: Some(sex),
            }),
            None if row_sex => out.push(WideColumn {
                index,
                category: header.clone(),
                sex: None,
            }),
            None => debug!(column = %header, "column has no sex suffix, skipping"),
        }
    }
    out
}

fn region_id(row: &[String], columns: &[(usize, Option<usize>)]) -> String {
    let mut id = String::new();
    for (col, width) in columns {
        let part = row[*col].trim();
        match width {
            Some(w) => id.push_str(&format!("{:0>w$}", part, w = *w)),
            None => id.push_str(part),
        }
    }
    id
}

fn parse_count(raw: &str, row: usize, column: &str, stats: &mut ReadStats) -> Result<f64> {
    if DataTable::is_null_value(raw) {
        stats.missing_values += 1;
        return Ok(0.0);
    }
    let cleaned = raw.trim().replace(',', "");
    cleaned.parse::<f64>().map_err(|_| HarmonizeError::Parse {
        row,
        column: column.to_string(),
        message: format!("'{}' is not a count", raw.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Parser;

    fn parse(data: &str, delimiter: u8) -> DataTable {
        Parser::new().parse_bytes(data.as_bytes(), delimiter).unwrap()
    }

    fn county_profile() -> SourceProfile {
        serde_json::from_str(
            r#"{
                "region": [{"column": "STATE", "width": 2}, {"column": "COUNTY", "width": 3}],
                "bucket_column": "AGEGRP",
                "year": {"column": "YEAR", "codes": {"offset": 2007, "first": 3, "last": 12}},
                "layout": {"type": "wide", "sex_suffixes": {"_MALE": "male", "_FEMALE": "female"}},
                "ignored_columns": ["SUMLEV"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_wide_layout_splits_sex_suffixes() {
        let table = parse(
            "SUMLEV,STATE,COUNTY,CTYNAME,YEAR,AGEGRP,TOT_POP,TOT_MALE,TOT_FEMALE,NHWA_FEMALE\n\
             050,1,1,Autauga County,3,1,100,48,52,40\n\
             050,1,1,Autauga County,1,1,99,48,51,40\n",
            b',',
        );
        let (records, stats) = county_profile().reader(None).read(&table).unwrap();

        assert_eq!(stats.out_of_range_year, 1);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.region == "01001" && r.year == Some(2010)));
        let female_total = records
            .iter()
            .find(|r| r.category == "TOT" && r.sex == Sex::Female)
            .unwrap();
        assert_eq!(female_total.value, 52.0);
        assert!(records.iter().all(|r| r.category != "TOT_POP" && r.category != "CTYNAME"));
    }

    fn province_profile() -> SourceProfile {
        serde_json::from_str(
            r#"{
                "region": [{"column": "GEO"}],
                "bucket_column": "AGE",
                "sex_column": "SEX",
                "sex_tags": {"3": "female", "2": "male"},
                "layout": {"type": "long", "category_column": "DVISMIN", "value_column": "OBS"},
                "variants": [
                    {"years": [2016], "conditions": {"DIM2": "1"}},
                    {"years": [2001], "category_column": "B01"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_long_layout_with_variant_conditions() {
        let table = parse(
            "GEO\tAGE\tSEX\tDIM2\tDVISMIN\tB01\tOBS\n\
             35\t2\t3\t1\t15\tx\t1200\n\
             35\t2\t3\t2\t15\tx\t5\n\
             35\t2\t1\t1\t15\tx\t2400\n\
             35\t2\t2\t1\t5\tx\t..\n",
            b'\t',
        );
        let (records, stats) = province_profile().reader(Some(2016)).read(&table).unwrap();

        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.unmapped_sex, 1);
        assert_eq!(stats.missing_values, 1);
        assert_eq!(
            records[0],
            RawRecord::new("35", Some(2016), "2", Sex::Female, "15", 1200.0)
        );
        assert_eq!(records[1].value, 0.0);
    }

    #[test]
    fn test_variant_replaces_category_column() {
        let table = parse("GEO,AGE,SEX,DIM2,DVISMIN,B01,OBS\n35,2,3,1,15,A,7\n", b',');
        let profile = province_profile();
        let reader = profile.reader(Some(2001));
        assert_eq!(reader.variant().unwrap().years, vec![2001]);

        let (records, _) = reader.read(&table).unwrap();
        assert_eq!(records[0].category, "A");
    }

    #[test]
    fn test_missing_column_is_config_error() {
        let table = parse("GEO,AGE,OBS\n35,2,1\n", b',');
        let err = province_profile().reader(None).read(&table).unwrap_err();
        assert!(matches!(err, HarmonizeError::Config(_)));
    }

    #[test]
    fn test_bad_count_reports_position() {
        let table = parse("GEO,AGE,SEX,DVISMIN,OBS\n35,2,3,15,abc\n", b',');
        let mut profile = province_profile();
        profile.variants.clear();
        let err = profile.reader(None).read(&table).unwrap_err();
        match err {
            HarmonizeError::Parse { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "OBS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_year_codes() {
        let codes = YearCodes {
            offset: 2007,
            first: 3,
            last: 12,
        };
        assert_eq!(codes.decode(3), Some(2010));
        assert_eq!(codes.decode(12), Some(2019));
        assert_eq!(codes.decode(13), None);
    }
}
