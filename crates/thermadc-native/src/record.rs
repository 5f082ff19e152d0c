//! Acquisition records and file metadata
//!
//! A [`Record`] is one completed sampling cycle. [`Metadata`] describes the
//! run and is written once, ahead of the records, as `key = value` lines.
//! Values are rendered the way the analysis scripts expect to read them back
//! (`True`/`False`, `None`, `[0, 1]`, floats always with a decimal point).

use std::fmt::Write as _;

use serde::Serialize;
use thermadc_core::math::RunningStats;
use thermadc_core::types::ChannelSpec;

use crate::config::{SamplerConfig, TextFormat};

// ============================================================================
// Record
// ============================================================================

/// One sampling cycle, averaged per channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Window midpoint, seconds since the run started
    pub t_samp: f64,
    /// Half the window length (s)
    pub t_err: f64,
    /// Mean scaled value per configured channel
    pub values: Vec<f64>,
    /// Population std-dev per channel, when error recording is on
    pub errors: Option<Vec<f64>>,
}

impl Record {
    /// Build a record from per-channel accumulators.
    pub fn from_stats(t_samp: f64, t_err: f64, stats: &[RunningStats], store_error: bool) -> Self {
        let values = stats
            .iter()
            .map(|s| s.mean().unwrap_or(f64::NAN))
            .collect();
        let errors = store_error.then(|| {
            stats
                .iter()
                .map(|s| s.std_dev().unwrap_or(f64::NAN))
                .collect()
        });
        Self { t_samp, t_err, values, errors }
    }

    /// Fields in column order: `t_samp, t_err, chan, [chan_err], ...`.
    pub fn fields(&self) -> Vec<f64> {
        let mut fields = Vec::with_capacity(2 + self.values.len() * 2);
        fields.push(self.t_samp);
        fields.push(self.t_err);
        match &self.errors {
            Some(errors) => {
                for (value, err) in self.values.iter().zip(errors) {
                    fields.push(*value);
                    fields.push(*err);
                }
            }
            None => fields.extend_from_slice(&self.values),
        }
        fields
    }

    /// One delimited line, without the terminator.
    pub fn to_line(&self, format: &TextFormat) -> String {
        let mut line = String::new();
        for (i, field) in self.fields().into_iter().enumerate() {
            if i > 0 {
                line.push_str(&format.delimiter);
            }
            push_float(&mut line, field);
        }
        line
    }
}

/// `{:?}` keeps the decimal point on whole numbers (`1.0`, not `1`).
fn push_float(out: &mut String, value: f64) {
    let _ = write!(out, "{value:?}");
}

// ============================================================================
// Metadata
// ============================================================================

/// Run description written ahead of the records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Unix time at which sampling began (s)
    pub start_timestamp: f64,
    /// ADC model name
    pub adc_model: String,
    /// ADC resolution (bits)
    pub adc_bit_res: u8,
    /// ADC reference voltage (V)
    pub adc_vref: f64,
    /// Sampled channels, in column order
    pub channels: Vec<ChannelSpec>,
    /// Sub-samples per record
    pub samp_size: u32,
    /// Requested record count
    pub samp_num: Option<u64>,
    /// Inter-cycle delay (s)
    pub delay: f64,
    /// Whether std-dev columns are present
    pub store_error: bool,
}

impl Metadata {
    /// Describe a run of `config` on an ADC.
    pub fn new(
        start_timestamp: f64,
        adc_model: &str,
        adc_bit_res: u8,
        adc_vref: f64,
        config: &SamplerConfig,
    ) -> Self {
        Self {
            start_timestamp,
            adc_model: adc_model.to_string(),
            adc_bit_res,
            adc_vref,
            channels: config.channels.clone(),
            samp_size: config.samp_size,
            samp_num: config.samp_num,
            delay: config.delay,
            store_error: config.store_error,
        }
    }

    /// `(key, value)` pairs in header order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let channels: Vec<String> = self.channels.iter().map(|c| c.channel.to_string()).collect();
        let modes: Vec<String> = self
            .channels
            .iter()
            .map(|c| format!("'{}'", c.mode.code()))
            .collect();

        vec![
            ("start_timestamp", format!("{:?}", self.start_timestamp)),
            ("adc_model", format!("'{}'", self.adc_model)),
            ("adc_bit_res", self.adc_bit_res.to_string()),
            ("adc_vref", format!("{:?}", self.adc_vref)),
            ("channels", format!("[{}]", channels.join(", "))),
            ("modes", format!("[{}]", modes.join(", "))),
            ("samp_size", self.samp_size.to_string()),
            ("samp_num", self.samp_num.map_or_else(|| "None".to_string(), |n| n.to_string())),
            ("delay", format!("{:?}", self.delay)),
            ("store_error", if self.store_error { "True" } else { "False" }.to_string()),
        ]
    }

    /// Column names: `#t_samp (s)`, `t_err(s)`, then `chanN[, chanN_err]`.
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = vec!["#t_samp (s)".to_string(), "t_err(s)".to_string()];
        for spec in &self.channels {
            columns.push(spec.label().to_string());
            if self.store_error {
                columns.push(format!("{}_err", spec.label()));
            }
        }
        columns
    }
}
