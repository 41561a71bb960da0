/// Batch comparison run: ingest → QC → align → bin / indicators.
///
/// One lidar export is compared against any number of met-mast
/// installations. Each mast is analysed independently against the same
/// lidar series, which is only ever borrowed. A structural failure on one
/// mast is logged and recorded in the report; the other masts still run.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::analysis::align::{AlignOptions, JoinMode, align};
use crate::analysis::availability::{MonthlyAvailability, monthly_availability};
use crate::analysis::binning::{BinRow, BinSpec, aggregate, samples_from_table};
use crate::analysis::correlation::{
    CompositePredicate, EventSource, IndicatorReport, ValueEventPoint, inspect, values_against_event,
};
use crate::channels::{ChannelDescriptor, ChannelKind, ChannelRegistry, SourceKind};
use crate::config::AnalysisConfig;
use crate::ingest::RawTable;
use crate::ingest::lidar::ingest_lidar_channels;
use crate::ingest::mast::ingest_mast_table;
use crate::logging::{self, Source};
use crate::model::{AnalysisError, ChannelId, MonthBucket, SensorSeries};
use crate::qc::{self, CodeTally, RejectCodeSet};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// QC exports of one met-mast installation at one comparison height.
#[derive(Debug, Clone)]
pub struct MastTables {
    /// Installation name, e.g. `"mmv1"`.
    pub mast: String,
    pub height_m: u32,
    pub temperature: RawTable,
    pub humidity: RawTable,
    /// Station barometer. Without it the icing proxy is skipped.
    pub pressure: Option<RawTable>,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Row accounting for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRecord {
    pub channel: ChannelId,
    pub kept: usize,
    pub malformed: usize,
    pub rejected: usize,
    /// Rows raising each reject code, before filtering. Empty for lidar.
    pub code_tally: Vec<CodeTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAvailability {
    pub channel: ChannelId,
    pub months: Vec<MonthlyAvailability>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MastReport {
    pub mast: String,
    pub height_m: u32,
    /// Lidar wind availability per mast temperature bin.
    pub temperature_bins: Vec<BinRow>,
    /// Lidar wind availability per mast humidity bin.
    pub humidity_bins: Vec<BinRow>,
    pub icing: Option<IndicatorReport>,
    pub low_availability: Option<IndicatorReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MastFailure {
    pub mast: String,
    pub height_m: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub lidar_availability: Vec<ChannelAvailability>,
    pub masts: Vec<MastReport>,
    pub failures: Vec<MastFailure>,
    pub ingest: Vec<IngestRecord>,
}

impl RunReport {
    /// Hand-off format for plotting and reporting consumers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Registry plus bookkeeping produced by the ingest / QC stage.
#[derive(Debug)]
pub struct PreparedRun {
    pub registry: ChannelRegistry,
    pub ingest: Vec<IngestRecord>,
    /// `(mast, height)` of every mast entry registered, in input order.
    pub masts: Vec<(String, u32)>,
    /// Mast entries whose tables could not be ingested or registered.
    pub failures: Vec<MastFailure>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    config: AnalysisConfig,
    reject_codes: RejectCodeSet,
}

impl Pipeline {
    /// Validates `config` and installs its `[logging]` settings as the
    /// global logger.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let reject_codes = config.reject_code_set()?;
        logging::init_logger(
            config.logging.level,
            config.logging.file.as_deref(),
            config.logging.console_timestamps,
        );
        Ok(Pipeline {
            config,
            reject_codes,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Ingests the lidar export and every mast, applying QC to mast
    /// channels. The lidar wind speed at each mast height is required; the
    /// configured `lidar_kinds` are taken when the export carries them. A
    /// mast entry whose channels are already registered is a failure.
    pub fn build_registry(
        &self,
        lidar: &RawTable,
        masts: &[MastTables],
    ) -> Result<PreparedRun, AnalysisError> {
        let mut registry = ChannelRegistry::new();
        let mut ingest = Vec::new();
        let mut failures = Vec::new();

        let descriptors = self.lidar_descriptors(lidar, masts);

        let outcomes = ingest_lidar_channels(
            lidar,
            &self.config.lidar_timestamp_column,
            &descriptors,
            &self.config.missing_sentinels,
        )
        .inspect_err(|e| logging::log_failure(Source::Lidar, None, "lidar ingest", e))?;

        for (descriptor, outcome) in descriptors.into_iter().zip(outcomes) {
            let record = IngestRecord {
                channel: descriptor.id.clone(),
                kept: outcome.series.len(),
                malformed: outcome.dropped_rows,
                rejected: 0,
                code_tally: Vec::new(),
            };
            logging::log_ingest_summary(
                Source::Lidar,
                record.channel.as_str(),
                record.kept,
                record.malformed,
                0,
            );
            ingest.push(record);
            registry.register(descriptor, outcome.series)?;
        }

        let mut registered = Vec::new();
        for tables in masts {
            let outcome = self
                .ingest_mast(tables)
                .and_then(|channels| Self::register_mast(&mut registry, channels));
            match outcome {
                Ok(records) => {
                    ingest.extend(records);
                    registered.push((tables.mast.clone(), tables.height_m));
                }
                Err(e) => {
                    logging::log_failure(Source::MetMast, Some(&tables.mast), "mast ingest", &e);
                    failures.push(MastFailure {
                        mast: tables.mast.clone(),
                        height_m: tables.height_m,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(PreparedRun {
            registry,
            ingest,
            masts: registered,
            failures,
        })
    }

    /// Lidar channels to ingest: wind speed at every mast height, plus each
    /// configured kind whose column the export carries.
    fn lidar_descriptors(&self, lidar: &RawTable, masts: &[MastTables]) -> Vec<ChannelDescriptor> {
        let heights: BTreeSet<u32> = masts.iter().map(|m| m.height_m).collect();
        let mut descriptors: Vec<ChannelDescriptor> = heights
            .iter()
            .map(|&h| ChannelDescriptor::lidar(ChannelKind::WindSpeed, Some(h)))
            .collect();

        let mut seen = vec![ChannelKind::WindSpeed];
        for &kind in &self.config.lidar_kinds {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);

            let candidates: Vec<ChannelDescriptor> = if kind.is_height_resolved() {
                heights
                    .iter()
                    .map(|&h| ChannelDescriptor::lidar(kind, Some(h)))
                    .collect()
            } else {
                vec![ChannelDescriptor::lidar(kind, None)]
            };
            for descriptor in candidates {
                let present = kind
                    .lidar_column(descriptor.height_m)
                    .is_some_and(|c| lidar.column_index(&c).is_some());
                if present {
                    descriptors.push(descriptor);
                } else {
                    logging::debug(
                        Source::Lidar,
                        Some(descriptor.id.as_str()),
                        "column not in export, skipped",
                    );
                }
            }
        }
        descriptors
    }

    /// Registers one mast's channels, all or nothing. A barometer already
    /// registered for the same mast (shared across heights) is kept.
    fn register_mast(
        registry: &mut ChannelRegistry,
        channels: Vec<(ChannelDescriptor, SensorSeries, IngestRecord)>,
    ) -> Result<Vec<IngestRecord>, AnalysisError> {
        let mut accepted = Vec::with_capacity(channels.len());
        for (descriptor, series, record) in channels {
            if registry.contains(&descriptor.id) {
                if descriptor.kind != ChannelKind::Pressure {
                    return Err(AnalysisError::Config(format!(
                        "channel '{}' registered twice",
                        descriptor.id
                    )));
                }
                logging::debug(
                    Source::MetMast,
                    Some(descriptor.id.as_str()),
                    "barometer already registered, keeping the first table",
                );
                continue;
            }
            accepted.push((descriptor, series, record));
        }

        let mut records = Vec::with_capacity(accepted.len());
        for (descriptor, series, record) in accepted {
            registry.register(descriptor, series)?;
            records.push(record);
        }
        Ok(records)
    }

    fn ingest_mast(
        &self,
        tables: &MastTables,
    ) -> Result<Vec<(ChannelDescriptor, SensorSeries, IngestRecord)>, AnalysisError> {
        let mut inputs = vec![
            (
                ChannelDescriptor::mast(&tables.mast, ChannelKind::Temperature, Some(tables.height_m)),
                &tables.temperature,
            ),
            (
                ChannelDescriptor::mast(&tables.mast, ChannelKind::Humidity, Some(tables.height_m)),
                &tables.humidity,
            ),
        ];
        if let Some(pressure) = &tables.pressure {
            inputs.push((
                ChannelDescriptor::mast(&tables.mast, ChannelKind::Pressure, None),
                pressure,
            ));
        }

        let indicators = self.config.indicator_columns();
        let mut channels = Vec::with_capacity(inputs.len());
        for (descriptor, table) in inputs {
            let outcome = ingest_mast_table(
                table,
                &descriptor.id,
                &self.config.mast_columns,
                &indicators,
                &self.config.missing_sentinels,
            )?;
            let cleaned = qc::apply(&outcome.series, &self.reject_codes);
            let record = IngestRecord {
                channel: descriptor.id.clone(),
                kept: cleaned.series.len(),
                malformed: outcome.dropped_rows,
                rejected: cleaned.rejected,
                code_tally: qc::tally_codes(&outcome.series, &self.reject_codes),
            };
            logging::log_ingest_summary(
                Source::MetMast,
                record.channel.as_str(),
                record.kept,
                record.malformed,
                record.rejected,
            );
            channels.push((descriptor, cleaned.series, record));
        }
        Ok(channels)
    }

    /// Bins and indicators for one mast against the lidar.
    ///
    /// Mast channels drive the alignment and the lidar is joined, so every
    /// output row is a timestamp the mast kept after QC.
    pub fn analyze_mast(
        &self,
        registry: &ChannelRegistry,
        mast: &str,
        height_m: u32,
    ) -> Result<MastReport, AnalysisError> {
        let source = SourceKind::MetMast(mast.to_string());
        let temperature = registry.require(ChannelKind::Temperature, &source, Some(height_m))?;
        let humidity = registry.require(ChannelKind::Humidity, &source, Some(height_m))?;
        let wind = registry.require(ChannelKind::WindSpeed, &SourceKind::Lidar, Some(height_m))?;

        let temperature_series = registry.series(&temperature.id)?;
        let humidity_series = registry.series(&humidity.id)?;
        let wind_series = registry.series(&wind.id)?;

        let temperature_bins = self.bin_against(
            temperature_series,
            wind_series,
            &self.config.temperature_bins,
        )?;
        let humidity_bins =
            self.bin_against(humidity_series, wind_series, &self.config.humidity_bins)?;

        let event = EventSource {
            channel: temperature.id.clone(),
            indicator: self.config.event_indicator.clone(),
        };

        let icing = match registry.find(ChannelKind::Pressure, &source, None) {
            Some(pressure) => {
                let pressure_series = registry.series(&pressure.id)?;
                let table = align(
                    temperature_series,
                    &[humidity_series, pressure_series],
                    self.config.align_options(),
                )?;
                let composite = CompositePredicate::icing_proxy(
                    &humidity.id,
                    &temperature.id,
                    &pressure.id,
                    &self.config.icing,
                );
                Some(inspect(&table, &composite, &event)?)
            }
            None => {
                logging::debug(Source::Analysis, Some(mast), "no barometer, icing proxy skipped");
                None
            }
        };

        let low_availability = match registry.find(
            ChannelKind::DataAvailability,
            &SourceKind::Lidar,
            Some(height_m),
        ) {
            Some(availability) => {
                let table = align(
                    temperature_series,
                    &[registry.series(&availability.id)?],
                    self.config.align_options(),
                )?;
                let composite = CompositePredicate::low_availability(
                    &availability.id,
                    self.config.low_availability_threshold_pct,
                );
                Some(inspect(&table, &composite, &event)?)
            }
            None => None,
        };

        Ok(MastReport {
            mast: mast.to_string(),
            height_m,
            temperature_bins,
            humidity_bins,
            icing,
            low_availability,
        })
    }

    /// Bins `binned` with the lidar series as availability target.
    fn bin_against(
        &self,
        binned: &SensorSeries,
        target: &SensorSeries,
        spec: &BinSpec,
    ) -> Result<Vec<BinRow>, AnalysisError> {
        if binned.is_empty() {
            let empty = AnalysisError::EmptyInput(binned.channel().to_string());
            logging::log_failure(Source::Analysis, Some(binned.channel().as_str()), "binning", &empty);
            return Ok(Vec::new());
        }
        let table = align(binned, &[target], self.config.align_options())?;
        let samples = samples_from_table(&table, binned.channel(), target.channel())?;
        aggregate(&samples, spec)
    }

    /// One lidar quantity against a mast's event flag, restricted to
    /// `months` (all months when empty).
    ///
    /// The lidar channel drives a left join, so every lidar record of the
    /// selected months is returned; the flag is read from the mast
    /// temperature channel at `height_m` and is `Missing` where the mast
    /// has no row. `height_m` also selects the lidar channel when `kind`
    /// is height resolved.
    pub fn lidar_against_event(
        &self,
        registry: &ChannelRegistry,
        mast: &str,
        height_m: u32,
        kind: ChannelKind,
        months: &[MonthBucket],
    ) -> Result<Vec<ValueEventPoint>, AnalysisError> {
        let carrier = registry.require(
            ChannelKind::Temperature,
            &SourceKind::MetMast(mast.to_string()),
            Some(height_m),
        )?;
        let lidar_height = kind.is_height_resolved().then_some(height_m);
        let quantity = registry.require(kind, &SourceKind::Lidar, lidar_height)?;

        let indicator = &self.config.event_indicator;
        let event_series = registry.series(&carrier.id)?;
        if !event_series.is_empty()
            && !event_series.iter().any(|r| r.indicator(indicator).is_some())
        {
            return Err(AnalysisError::MissingChannel {
                channel: carrier.id.to_string(),
                context: format!("event indicator '{indicator}'"),
            });
        }

        let quantity_series = restrict_months(registry.series(&quantity.id)?, months);
        let event_series = restrict_months(event_series, months);
        let table = align(
            &quantity_series,
            &[&*event_series],
            AlignOptions {
                join: JoinMode::Left,
                duplicates: self.config.duplicate_policy,
            },
        )?;
        values_against_event(
            &table,
            &quantity.id,
            &EventSource {
                channel: carrier.id.clone(),
                indicator: indicator.clone(),
            },
        )
    }

    /// Full run over one lidar export and a list of masts.
    pub fn run(&self, lidar: &RawTable, masts: &[MastTables]) -> Result<RunReport, AnalysisError> {
        let PreparedRun {
            registry,
            ingest,
            masts: registered,
            mut failures,
        } = self.build_registry(lidar, masts)?;

        let lidar_availability = registry
            .of_kind(ChannelKind::WindSpeed)
            .into_iter()
            .filter(|d| d.source == SourceKind::Lidar)
            .map(|d| -> Result<ChannelAvailability, AnalysisError> {
                Ok(ChannelAvailability {
                    channel: d.id.clone(),
                    months: monthly_availability(registry.series(&d.id)?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut reports = Vec::with_capacity(registered.len());
        for (mast, height_m) in registered {
            match self.analyze_mast(&registry, &mast, height_m) {
                Ok(report) => {
                    logging::info(
                        Source::Pipeline,
                        Some(&mast),
                        &format!(
                            "{} temperature bins, {} humidity bins",
                            report.temperature_bins.len(),
                            report.humidity_bins.len()
                        ),
                    );
                    reports.push(report);
                }
                Err(e) => {
                    logging::log_failure(Source::Pipeline, Some(&mast), "mast analysis", &e);
                    failures.push(MastFailure {
                        mast,
                        height_m,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(RunReport {
            lidar_availability,
            masts: reports,
            failures,
            ingest,
        })
    }
}

fn restrict_months<'a>(series: &'a SensorSeries, months: &[MonthBucket]) -> Cow<'a, SensorSeries> {
    if months.is_empty() {
        Cow::Borrowed(series)
    } else {
        Cow::Owned(series.for_months(months))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::correlation::EventState;

    fn lidar() -> RawTable {
        RawTable::from_rows(
            &[
                "TimeStamp",
                "80m Wind Speed (m/s)",
                "80m Data Availability (%)",
                "Wiper count",
            ],
            &[
                &["2015-11-20 03:10:00", "5.2", "100", "10"],
                &["2015-11-20 03:20:00", "NaN", "10", "11"],
                &["2015-11-20 03:30:00", "6.1", "95", "12"],
                &["2015-12-01 00:10:00", "7.0", "100", "13"],
            ],
        )
    }

    fn mast_table(values: &[(&str, &str, &str, &str)]) -> RawTable {
        let rows: Vec<Vec<String>> = values
            .iter()
            .map(|(ts, v, r101, info)| vec![ts.to_string(), v.to_string(), r101.to_string(), info.to_string()])
            .collect();
        RawTable::new(
            vec!["Timestamp".into(), "Moyenne".into(), "R101".into(), "INFO01".into()],
            rows,
        )
    }

    fn mmv1() -> MastTables {
        MastTables {
            mast: "mmv1".into(),
            height_m: 80,
            temperature: mast_table(&[
                ("20-Nov-2015 03:10:00", "-3.0", "0", "1"),
                ("20-Nov-2015 03:20:00", "-2.5", "0", "0"),
                ("20-Nov-2015 03:30:00", "4.9", "1", "0"),
            ]),
            humidity: mast_table(&[
                ("20-Nov-2015 03:10:00", "95", "0", "1"),
                ("20-Nov-2015 03:20:00", "97", "0", "0"),
                ("20-Nov-2015 03:30:00", "60", "0", "0"),
            ]),
            pressure: Some(mast_table(&[
                ("20-Nov-2015 03:10:00", "975", "0", "1"),
                ("20-Nov-2015 03:20:00", "990", "0", "0"),
                ("20-Nov-2015 03:30:00", "975", "0", "0"),
            ])),
        }
    }

    #[test]
    fn test_registry_holds_lidar_and_mast_channels() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let prepared = pipeline.build_registry(&lidar(), &[mmv1()]).unwrap();

        assert_eq!(
            prepared.registry.len(),
            6,
            "wind, availability, wiper, temp, humidity, pressure"
        );
        assert!(prepared.failures.is_empty());
        assert!(prepared.registry.contains(&ChannelId::new("lidar_WiperCount")));
        let temp = prepared
            .ingest
            .iter()
            .find(|r| r.channel.as_str() == "mmv1_80m_Temperature")
            .unwrap();
        assert_eq!((temp.kept, temp.rejected), (2, 1), "R101 row removed by QC");
        assert_eq!(
            temp.code_tally,
            vec![CodeTally {
                code: "R101".into(),
                raised: 1
            }]
        );
    }

    #[test]
    fn test_lidar_kinds_without_a_column_are_skipped() {
        let config = AnalysisConfig {
            lidar_kinds: vec![ChannelKind::Cnr, ChannelKind::WiperCount],
            ..AnalysisConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let prepared = pipeline.build_registry(&lidar(), &[mmv1()]).unwrap();

        let lidar_channels: Vec<&str> = prepared
            .ingest
            .iter()
            .map(|r| r.channel.as_str())
            .filter(|c| c.starts_with("lidar_"))
            .collect();
        assert_eq!(lidar_channels, vec!["lidar_80m_WindSpeed", "lidar_WiperCount"]);
    }

    #[test]
    fn test_lidar_quantity_against_event_per_month() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let prepared = pipeline.build_registry(&lidar(), &[mmv1()]).unwrap();
        let november = MonthBucket::from_code("11").unwrap();

        let points = pipeline
            .lidar_against_event(&prepared.registry, "mmv1", 80, ChannelKind::WiperCount, &[november])
            .unwrap();
        let pairs: Vec<(Option<f64>, EventState)> = points.iter().map(|p| (p.value, p.event)).collect();
        assert_eq!(
            pairs,
            vec![
                (Some(10.0), EventState::Detected),
                (Some(11.0), EventState::NotDetected),
                (Some(12.0), EventState::Missing),
            ],
            "03:30 was removed from the mast by QC"
        );
        assert!(points.iter().all(|p| p.month == november));

        let all = pipeline
            .lidar_against_event(&prepared.registry, "mmv1", 80, ChannelKind::WiperCount, &[])
            .unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].event, EventState::Missing, "no mast data in December");

        let wind = pipeline
            .lidar_against_event(&prepared.registry, "mmv1", 80, ChannelKind::WindSpeed, &[november])
            .unwrap();
        assert_eq!(wind[1].value, None, "NaN wind stays in the series as missing");
    }

    #[test]
    fn test_lidar_against_event_needs_the_mast_and_the_channel() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let prepared = pipeline.build_registry(&lidar(), &[mmv1()]).unwrap();

        let err = pipeline
            .lidar_against_event(&prepared.registry, "mmv9", 80, ChannelKind::WiperCount, &[])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingChannel { .. }));

        let err = pipeline
            .lidar_against_event(&prepared.registry, "mmv1", 80, ChannelKind::BatteryVoltage, &[])
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingChannel { .. }));
    }

    #[test]
    fn test_duplicate_mast_entry_is_recorded_as_failure() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let report = pipeline.run(&lidar(), &[mmv1(), mmv1()]).unwrap();

        assert_eq!(report.masts.len(), 1, "the first entry is still analysed");
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("registered twice"));
    }

    #[test]
    fn test_barometer_shared_across_heights_is_kept_once() {
        let lidar = RawTable::from_rows(
            &["TimeStamp", "80m Wind Speed (m/s)", "40m Wind Speed (m/s)"],
            &[&["2015-11-20 03:10:00", "5.2", "4.0"]],
        );
        let mut low = mmv1();
        low.height_m = 40;

        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let prepared = pipeline.build_registry(&lidar, &[mmv1(), low]).unwrap();
        assert!(prepared.failures.is_empty());
        assert_eq!(prepared.masts, vec![("mmv1".to_string(), 80), ("mmv1".to_string(), 40)]);
        let pressure_records = prepared
            .ingest
            .iter()
            .filter(|r| r.channel.as_str() == "mmv1_Pressure")
            .count();
        assert_eq!(pressure_records, 1);
    }

    #[test]
    fn test_mast_analysis_bins_and_indicators() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let prepared = pipeline.build_registry(&lidar(), &[mmv1()]).unwrap();
        let report = pipeline.analyze_mast(&prepared.registry, "mmv1", 80).unwrap();

        let lowers: Vec<f64> = report.temperature_bins.iter().map(|b| b.lower).collect();
        assert_eq!(lowers, vec![-4.0, -3.0], "-3.0 sits on an edge and falls in (-4, -3]");
        assert_eq!(report.temperature_bins[0].availability_pct, 100.0);
        assert_eq!(report.temperature_bins[1].availability_pct, 0.0, "lidar NaN at 03:20");

        let icing = report.icing.expect("barometer present");
        let composite: Vec<bool> = icing.points.iter().map(|p| p.composite).collect();
        assert_eq!(composite, vec![true, false], "pressure 990 fails the second record");
        assert_eq!(icing.summary.both, 1);
        assert_eq!(icing.summary.neither, 1);

        let low = report.low_availability.expect("availability column present");
        assert!(low.points[1].composite, "10% availability is low");
    }

    #[test]
    fn test_missing_mast_column_fails_only_that_mast() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let mut broken = mmv1();
        broken.mast = "mmv2".into();
        broken.humidity = RawTable::from_rows(&["Timestamp"], &[&["20-Nov-2015 03:10:00"]]);

        let report = pipeline.run(&lidar(), &[mmv1(), broken]).unwrap();
        assert_eq!(report.masts.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].mast, "mmv2");
    }

    #[test]
    fn test_run_report_serializes_to_json() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let report = pipeline.run(&lidar(), &[mmv1()]).unwrap();
        assert_eq!(report.lidar_availability.len(), 1);
        assert_eq!(report.lidar_availability[0].months[0].month.to_string(), "11");

        let json = report.to_json().unwrap();
        assert!(json.contains("\"mast\": \"mmv1\""));
        assert!(json.contains("\"lidar_availability\""));
    }

    #[test]
    fn test_missing_lidar_height_is_structural_failure() {
        let pipeline = Pipeline::new(AnalysisConfig::default()).unwrap();
        let mut high = mmv1();
        high.height_m = 120;
        let err = pipeline.build_registry(&lidar(), &[high]).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingChannel { .. }));
    }
}
