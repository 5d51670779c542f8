//! Unit scaling for raw sensor samples.
//!
//! The backend stores what the edge device counts: flow meter pulses and ADC
//! increments. Everything shown to an operator is in physical units, so every
//! sample passes through [`normalize`] between fetch and presentation.
//!
//! | Channel  | Raw unit            | Factor     | Unit |
//! |----------|---------------------|------------|------|
//! | Flow     | 388 pulses / litre  | 0.002577   | L/s  |
//! | Pressure | 398 increments/bar  | 0.002513   | bar  |
//! | Level    | 635 increments/m    | 0.00157356 | m    |

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::format::timestamp_to_utc;

pub const FLOW_SCALING: f64 = 0.002577;
pub const PRESSURE_SCALING: f64 = 0.002513;
pub const LEVEL_SCALING: f64 = 0.001_573_56;

/// A named sensor quantity or the shared time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Time,
    Flow,
    Pressure,
    Level,
}

impl Channel {
    /// Measured channels in display order.
    pub const MEASURED: [Self; 3] = [Self::Flow, Self::Pressure, Self::Level];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "Time",
            Self::Flow => "Flow",
            Self::Pressure => "Pressure",
            Self::Level => "Level",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Time" => Some(Self::Time),
            "Flow" => Some(Self::Flow),
            "Pressure" => Some(Self::Pressure),
            "Level" => Some(Self::Level),
            _ => None,
        }
    }

    /// Multiplier from raw counts to physical units. `None` for the time axis.
    #[must_use]
    pub fn scale(self) -> Option<f64> {
        match self {
            Self::Time => None,
            Self::Flow => Some(FLOW_SCALING),
            Self::Pressure => Some(PRESSURE_SCALING),
            Self::Level => Some(LEVEL_SCALING),
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Time => "ms",
            Self::Flow => "L/s",
            Self::Pressure => "bar",
            Self::Level => "m",
        }
    }

    /// Full-scale value of the gauge for this channel.
    #[must_use]
    pub fn gauge_max(self) -> f64 {
        match self {
            Self::Time => 0.0,
            Self::Flow => 100.0,
            Self::Pressure | Self::Level => 5.0,
        }
    }

    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Time => "#000000",
            Self::Flow => "#4472C4",
            Self::Pressure => "#ED7D31",
            Self::Level => "#A5A5A5",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with channels the normalizer has no scale factor for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownChannelPolicy {
    /// Copy the values through unscaled.
    #[default]
    PassThrough,
    /// Omit the channel from the output.
    Drop,
}

impl UnknownChannelPolicy {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pass_through" | "passthrough" | "pass-through" => Some(Self::PassThrough),
            "drop" => Some(Self::Drop),
            _ => None,
        }
    }
}

/// How an empty `{}` response from the data endpoint is surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyDataPolicy {
    /// Produce every known channel with no values.
    #[default]
    EmptyChannels,
    /// Fail with [`AppError::EmptyResult`].
    Reject,
}

impl EmptyDataPolicy {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "empty" | "empty_channels" => Some(Self::EmptyChannels),
            "reject" | "error" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Raw backend sample: channel name to index-aligned raw values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSample {
    channels: BTreeMap<String, Vec<f64>>,
}

impl RawSample {
    /// Every known channel, each with zero values.
    #[must_use]
    pub fn empty_channels() -> Self {
        let channels = [Channel::Time, Channel::Flow, Channel::Pressure, Channel::Level]
            .into_iter()
            .map(|c| (c.name().to_string(), Vec::new()))
            .collect();
        Self { channels }
    }

    /// Build a sample from in-memory columns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` if the columns differ in length.
    pub fn from_columns<I, S>(columns: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let sample = Self {
            channels: columns.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        sample.check_alignment()?;
        Ok(sample)
    }

    /// Decode the data endpoint's object-of-columns payload.
    ///
    /// Each column is either a JSON array or an object keyed by index string
    /// (`{"0": 12, "1": 15}`), which is ordered by numeric index. `null` cells
    /// become `NaN`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for non-object payloads, non-numeric cells,
    /// index keys other than exactly `0..n` and columns of different lengths.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| AppError::Parse("data payload is not a JSON object".to_string()))?;

        let mut channels = BTreeMap::new();
        for (name, column) in object {
            channels.insert(name.clone(), decode_column(name, column)?);
        }

        let sample = Self { channels };
        sample.check_alignment()?;
        Ok(sample)
    }

    fn check_alignment(&self) -> AppResult<()> {
        let mut lengths = self.channels.iter().map(|(name, values)| (name, values.len()));
        if let Some((first_name, expected)) = lengths.next() {
            for (name, len) in lengths {
                if len != expected {
                    return Err(AppError::Parse(format!(
                        "channel '{name}' has {len} values but '{first_name}' has {expected}"
                    )));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of samples per channel (0 when no channels are present).
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.values().next().map_or(0, Vec::len)
    }
}

fn decode_column(name: &str, column: &Value) -> AppResult<Vec<f64>> {
    match column {
        Value::Array(cells) => cells.iter().map(|cell| decode_cell(name, cell)).collect(),
        Value::Object(entries) => {
            let mut indexed = entries
                .iter()
                .map(|(key, cell)| {
                    let index: usize = key.parse().map_err(|_| {
                        AppError::Parse(format!("channel '{name}' has non-index key '{key}'"))
                    })?;
                    Ok((index, decode_cell(name, cell)?))
                })
                .collect::<AppResult<Vec<_>>>()?;
            indexed.sort_by_key(|(index, _)| *index);
            // Keys must be exactly 0..n so equal lengths imply equal key sets
            if let Some((position, (index, _))) = indexed
                .iter()
                .enumerate()
                .find(|(position, (index, _))| position != index)
            {
                return Err(AppError::Parse(format!(
                    "channel '{name}' has index key {index} where {position} was expected"
                )));
            }
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        other => Err(AppError::Parse(format!(
            "channel '{name}' is neither an array nor an object: {other}"
        ))),
    }
}

fn decode_cell(name: &str, cell: &Value) -> AppResult<f64> {
    match cell {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AppError::Parse(format!("channel '{name}' value {n} out of range"))),
        other => Err(AppError::Parse(format!(
            "channel '{name}' contains non-numeric value {other}"
        ))),
    }
}

/// Sample in physical units. `time` holds millisecond UNIX timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaledSample {
    pub time: Option<Vec<i64>>,
    pub channels: BTreeMap<String, Vec<f64>>,
}

impl ScaledSample {
    #[must_use]
    pub fn channel(&self, channel: Channel) -> Option<&[f64]> {
        self.channels.get(channel.name()).map(Vec::as_slice)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    /// Most recent value of a channel, if it has any.
    #[must_use]
    pub fn last_value(&self, channel: Channel) -> Option<f64> {
        self.channel(channel).and_then(|values| values.last().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.channels.values().next().map(Vec::len))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert raw counts into physical units.
///
/// Known channels present in `raw` are multiplied by their scale factor;
/// absent channels stay absent. The time axis is converted to integer
/// milliseconds. Channels without a scale factor follow `policy`.
///
/// # Errors
///
/// Returns `AppError::Parse` if a time value is not a finite number.
pub fn normalize(raw: &RawSample, policy: UnknownChannelPolicy) -> AppResult<ScaledSample> {
    let mut scaled = ScaledSample::default();

    for (name, values) in raw.channels() {
        match Channel::from_name(name) {
            Some(Channel::Time) => {
                scaled.time = Some(values.iter().map(|&t| to_millis(t)).collect::<AppResult<_>>()?);
            }
            Some(channel) => {
                let factor = channel.scale().unwrap_or(1.0);
                scaled
                    .channels
                    .insert(name.to_string(), values.iter().map(|v| v * factor).collect());
            }
            None => match policy {
                UnknownChannelPolicy::PassThrough => {
                    scaled.channels.insert(name.to_string(), values.to_vec());
                }
                UnknownChannelPolicy::Drop => {
                    tracing::debug!(channel = %name, "Dropping unknown channel");
                }
            },
        }
    }

    Ok(scaled)
}

/// Round to whole milliseconds and check the result is a representable
/// instant, so every normalized timestamp can later be formatted.
#[allow(clippy::cast_possible_truncation)]
fn to_millis(t: f64) -> AppResult<i64> {
    // Beyond ±2^63 the cast saturates; chrono rejects far earlier anyway
    if !t.is_finite() || t.abs() >= 9.2e18 {
        return Err(AppError::Parse(format!("invalid timestamp {t}")));
    }
    let millis = t.round() as i64;
    timestamp_to_utc(millis)?;
    Ok(millis)
}
