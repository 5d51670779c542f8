use crate::api::LogsPayload;
use crate::error::AppResult;
use crate::format::{DisplayZone, format_log_value, timestamp_to_utc, to_local_date_time};
use crate::normalize::{Channel, ScaledSample};

pub const NO_DATA_TITLE: &str = "No data received!";

/// Lifecycle of a registered widget. A widget that was never plotted is
/// simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Plotted,
    Updated,
    Destroyed,
}

/// One named line on a chart: `(timestamp_ms, value)` points in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    pub points: Vec<(i64, f64)>,
}

impl ChartSeries {
    #[must_use]
    pub fn for_channel(channel: Channel) -> Self {
        Self {
            name: channel.name().to_string(),
            color: channel.color().to_string(),
            points: Vec::new(),
        }
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = (i64, f64)>) {
        self.points.extend(points);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Single-channel gauge showing the latest reading against the channel's
/// full-scale value.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeWidget {
    pub channel: Channel,
    pub reading: Option<f64>,
}

impl GaugeWidget {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            reading: None,
        }
    }

    /// Filled and remaining arc: `[round1(v), max - v]`.
    #[must_use]
    pub fn segments(&self) -> Option<[f64; 2]> {
        self.reading
            .map(|v| [(v * 10.0).round() / 10.0, self.channel.gauge_max() - v])
    }

    /// Centre label, e.g. `"12.3 L/s"`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.reading {
            Some(v) => format!("{v:.1} {}", self.channel.unit()),
            None => format!("- {}", self.channel.unit()),
        }
    }
}

/// Flow, pressure and level over a shared time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub labels: Vec<i64>,
    pub series: Vec<ChartSeries>,
    pub title: String,
}

impl Default for LineChart {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            series: Channel::MEASURED
                .into_iter()
                .map(ChartSeries::for_channel)
                .collect(),
            title: String::new(),
        }
    }
}

impl LineChart {
    #[must_use]
    pub fn series(&self, channel: Channel) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.name == channel.name())
    }

    /// Replace or append the sample's points and rebuild the title.
    ///
    /// Channel values are paired with the sample's time axis by index; a
    /// sample without a time axis contributes no points. The chart is left
    /// unchanged when any incoming timestamp cannot be displayed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` if a timestamp cannot be formatted.
    pub fn apply(&mut self, sample: &ScaledSample, append: bool, zone: DisplayZone) -> AppResult<()> {
        let times = sample.time.as_deref().unwrap_or_default();
        if sample.time.is_none() && !sample.channels.is_empty() {
            tracing::warn!("Sample has no time axis; values not plotted");
        }
        for &t in times {
            timestamp_to_utc(t)?;
        }

        let retained = if append { self.labels.as_slice() } else { &[] };
        let first = retained.first().or(times.first());
        let last = times.last().or(retained.last());
        let title = match (first, last) {
            (Some(&first), Some(&last)) => format!(
                "{} - {}",
                to_local_date_time(first, zone)?,
                to_local_date_time(last, zone)?
            ),
            _ => NO_DATA_TITLE.to_string(),
        };

        if !append {
            self.labels.clear();
            for series in &mut self.series {
                series.points.clear();
            }
        }
        self.labels.extend_from_slice(times);
        for series in &mut self.series {
            if let Some(values) = sample.get(&series.name) {
                series.extend(times.iter().copied().zip(values.iter().copied()));
            }
        }
        self.title = title;
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Log table with formatted cells, newest row first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LogTable {
    /// Replace or prepend the payload's rows.
    ///
    /// Cells are formatted with [`format_log_value`]; every row has exactly
    /// one cell per column, padded with empty cells or cut to fit. Without
    /// any header, rows are kept whole. A payload without columns keeps the
    /// current header.
    pub fn apply(&mut self, logs: &LogsPayload, append: bool, zone: DisplayZone) {
        if !append {
            self.rows.clear();
        }
        if !logs.columns.is_empty() {
            self.columns.clone_from(&logs.columns);
        }

        let width = self.columns.len();
        let mut fresh: Vec<Vec<String>> = logs
            .data
            .iter()
            .rev()
            .map(|row| {
                let cells = if width == 0 { row.len() } else { width };
                (0..cells)
                    .map(|i| row.get(i).map(|v| format_log_value(v, zone)).unwrap_or_default())
                    .collect()
            })
            .collect();
        fresh.append(&mut self.rows);
        self.rows = fresh;
    }

    /// Export the table, header first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if the CSV writer fails.
    pub fn to_csv(&self) -> AppResult<String> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        let render_err = |e: csv::Error| crate::error::AppError::Render(format!("CSV export failed: {e}"));

        if !self.columns.is_empty() {
            writer.write_record(&self.columns).map_err(render_err)?;
        }
        for row in &self.rows {
            writer.write_record(row).map_err(render_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| crate::error::AppError::Render(format!("CSV export failed: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| crate::error::AppError::Render(format!("CSV export failed: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    Gauge(GaugeWidget),
    Line(LineChart),
    Table(LogTable),
}

/// A registered widget and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: String,
    pub kind: WidgetKind,
    pub state: WidgetState,
}

impl Widget {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: WidgetState::Plotted,
        }
    }

    #[must_use]
    pub fn as_gauge(&self) -> Option<&GaugeWidget> {
        match &self.kind {
            WidgetKind::Gauge(g) => Some(g),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_line(&self) -> Option<&LineChart> {
        match &self.kind {
            WidgetKind::Line(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&LogTable> {
        match &self.kind {
            WidgetKind::Table(t) => Some(t),
            _ => None,
        }
    }
}
