//! Pipeline performance benchmarks.
//!
//! Measures source parsing, the full harmonization run and composite
//! region aggregation across region counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use harmonize::geo::{aggregate, RemainderRules};
use harmonize::input::Parser;
use harmonize::{Harmonizer, ObservationTable, PipelineConfig, RawRecord, RowKey, Sex};
use std::io::Write;
use tempfile::NamedTempFile;

const CATEGORIES: [(&str, f64); 4] = [("TOT", 1.0), ("WH", 0.6), ("BL", 0.3), ("NS", 0.1)];

/// Province and census-area identifiers, five areas per province.
fn region_ids(regions: usize) -> Vec<String> {
    (0..regions)
        .map(|i| {
            let province = 10 + (i / 6) % 50;
            if i % 6 == 0 {
                format!("{:02}", province)
            } else {
                format!("{:02}{:03}", province, i % 1000)
            }
        })
        .collect()
}

/// Long-format female counts for every region, cohort and category.
fn generate_tsv_data(regions: usize) -> String {
    let mut data = String::from("GEO\tAGE\tSEX\tDVISMIN\tOBS\n");
    for (i, region) in region_ids(regions).iter().enumerate() {
        for cohort in 0..=18u8 {
            for (code, share) in CATEGORIES {
                let value = (100 + i * 7 + cohort as usize * 13) as f64 * share;
                data.push_str(&format!("{}\t{}\t3\t{}\t{:.1}\n", region, cohort, code, value));
            }
        }
    }
    data
}

fn generate_records(regions: usize) -> Vec<RawRecord> {
    let mut records = Vec::new();
    for (i, region) in region_ids(regions).iter().enumerate() {
        for cohort in 0..=18u8 {
            for (code, share) in CATEGORIES {
                let value = (100 + i * 7 + cohort as usize * 13) as f64 * share;
                records.push(RawRecord::new(
                    region.as_str(),
                    Some(2016),
                    cohort.to_string(),
                    Sex::Female,
                    code,
                    value,
                ));
            }
        }
    }
    records
}

fn pipeline() -> Harmonizer {
    let config = PipelineConfig::from_json(
        r#"{
            "name": "bench",
            "year": 2016,
            "source": {
                "path": "vm.tsv",
                "profile": {
                    "region": [{"column": "GEO"}],
                    "bucket_column": "AGE",
                    "layout": {"type": "long", "category_column": "DVISMIN", "value_column": "OBS"}
                }
            },
            "cohorts": {"coverage": {"type": "canonical"}},
            "categories": {
                "canonical": {"codes": ["E", "W", "B"], "total": "E"},
                "mapping": {
                    "type": "ratio",
                    "total_key": "TOT",
                    "specified": ["WH", "BL"],
                    "groups": {"W": [{"key": "WH"}], "B": [{"key": "BL"}]}
                }
            },
            "geo": {"type": "remainder"}
        }"#,
    )
    .unwrap();
    Harmonizer::with_config(config).unwrap()
}

/// Benchmark parsing long-format sources of various sizes.
fn bench_parse_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_source");

    for regions in [10, 100, 1_000].iter() {
        let data = generate_tsv_data(*regions);
        let bytes = data.len();

        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::new("regions", regions), &data, |b, data| {
            b.iter_with_setup(
                || {
                    let mut temp = NamedTempFile::with_suffix(".tsv").unwrap();
                    temp.write_all(data.as_bytes()).unwrap();
                    temp
                },
                |temp| {
                    let parser = Parser::new();
                    black_box(parser.parse_file(temp.path()).unwrap())
                },
            )
        });
    }

    group.finish();
}

/// Benchmark the full harmonization run on in-memory records.
fn bench_harmonize(c: &mut Criterion) {
    let mut group = c.benchmark_group("harmonize");
    let harmonizer = pipeline();

    for regions in [10, 100, 1_000].iter() {
        let records = generate_records(*regions);

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("regions", regions), &records, |b, records| {
            b.iter_with_setup(
                || records.clone(),
                |records| black_box(harmonizer.run(records).unwrap()),
            )
        });
    }

    group.finish();
}

/// Benchmark remainder aggregation alone.
fn bench_geo_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("geo_aggregate");
    let rules = RemainderRules::new();

    for regions in [100, 1_000, 10_000].iter() {
        let mut table = ObservationTable::new();
        for (i, region) in region_ids(*regions).iter().enumerate() {
            for cohort in 0..=18u8 {
                let key = RowKey::new(region.as_str(), Some(2016), cohort, Sex::Female);
                table.insert(key, "E", (i + cohort as usize) as f64);
            }
        }

        group.throughput(Throughput::Elements(table.len() as u64));
        group.bench_with_input(BenchmarkId::new("regions", regions), &table, |b, table| {
            b.iter(|| black_box(aggregate(table, &rules)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_source,
    bench_harmonize,
    bench_geo_aggregate,
);
criterion_main!(benches);
