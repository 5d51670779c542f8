use std::collections::{BTreeMap, HashMap};

use crate::api::LogsPayload;
use crate::error::AppResult;
use crate::format::DisplayZone;
use crate::normalize::{Channel, ScaledSample};
use crate::presenter::render::Renderer;
use crate::presenter::widget::{GaugeWidget, LineChart, LogTable, Widget, WidgetKind, WidgetState};

/// Gauge element ids by channel.
pub type GaugeIds = BTreeMap<Channel, String>;

/// Widgets keyed by element id, plus the surface they are drawn on.
///
/// Updates addressed to an id that is not registered (or registered as a
/// different widget kind) are skipped with a warning.
pub struct WidgetRegistry<R: Renderer> {
    widgets: HashMap<String, Widget>,
    renderer: R,
    zone: DisplayZone,
}

impl<R: Renderer> WidgetRegistry<R> {
    pub fn new(renderer: R, zone: DisplayZone) -> Self {
        Self {
            widgets: HashMap::new(),
            renderer,
            zone,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Widget> {
        self.widgets.get(id)
    }

    #[must_use]
    pub fn state(&self, id: &str) -> Option<WidgetState> {
        self.widgets.get(id).map(|w| w.state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Remove a widget. The returned instance is marked destroyed.
    pub fn destroy(&mut self, id: &str) -> Option<Widget> {
        let mut widget = self.widgets.remove(id)?;
        widget.state = WidgetState::Destroyed;
        tracing::debug!(widget = %id, "Widget destroyed");
        Some(widget)
    }

    /// Create or re-create one gauge per channel. Readings held by outgoing
    /// gauges are carried over to their replacements.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if redrawing a gauge fails.
    pub fn plot_gauges(&mut self, gauges: &GaugeIds) -> AppResult<()> {
        let mut retained = BTreeMap::new();
        for (&channel, id) in gauges {
            let reading = self
                .destroy(id)
                .and_then(|w| w.as_gauge().and_then(|g| g.reading));
            if let Some(v) = reading {
                retained.insert(channel, v);
            }
            self.insert(Widget::new(id.clone(), WidgetKind::Gauge(GaugeWidget::new(channel))))?;
        }

        if retained.is_empty() {
            Ok(())
        } else {
            self.update_gauges(gauges, &retained)
        }
    }

    /// Set each gauge to the value for its channel.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if redrawing a gauge fails; gauges after the
    /// failing one are not updated.
    pub fn update_gauges(&mut self, gauges: &GaugeIds, values: &BTreeMap<Channel, f64>) -> AppResult<()> {
        for (channel, id) in gauges {
            let Some(&value) = values.get(channel) else {
                tracing::warn!(widget = %id, channel = %channel, "No value for gauge");
                continue;
            };
            let Some(widget) = self.widgets.get_mut(id) else {
                tracing::warn!(widget = %id, "Could not find gauge");
                continue;
            };
            let WidgetKind::Gauge(gauge) = &mut widget.kind else {
                tracing::warn!(widget = %id, "Widget is not a gauge");
                continue;
            };
            gauge.reading = Some(value);
            widget.state = WidgetState::Updated;
            self.renderer.redraw(widget)?;
        }
        Ok(())
    }

    /// Create or re-create a line chart. Series, time axis and title of the
    /// outgoing chart are moved onto the new one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if a redraw fails.
    pub fn plot_lines(&mut self, id: &str) -> AppResult<()> {
        let retained = self
            .destroy(id)
            .and_then(|w| match w.kind {
                WidgetKind::Line(chart) => Some(chart),
                _ => None,
            })
            .filter(|chart| !chart.is_empty());

        self.insert(Widget::new(id, WidgetKind::Line(LineChart::default())))?;

        let (Some(chart), Some(widget)) = (retained, self.widgets.get_mut(id)) else {
            return Ok(());
        };
        widget.kind = WidgetKind::Line(chart);
        widget.state = WidgetState::Updated;
        self.renderer.redraw(widget)
    }

    /// Replace or append a sample on a line chart and redraw it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if the redraw fails, or `AppError::Parse` if
    /// a timestamp cannot be formatted for the title.
    pub fn update_lines(&mut self, id: &str, sample: &ScaledSample, append: bool) -> AppResult<()> {
        let zone = self.zone;
        let Some(widget) = self.widgets.get_mut(id) else {
            tracing::warn!(widget = %id, "Could not find line chart");
            return Ok(());
        };
        let WidgetKind::Line(chart) = &mut widget.kind else {
            tracing::warn!(widget = %id, "Widget is not a line chart");
            return Ok(());
        };
        chart.apply(sample, append, zone)?;
        widget.state = WidgetState::Updated;
        self.renderer.redraw(widget)
    }

    /// Create or re-create a log table, carrying over its rows.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if the redraw fails.
    pub fn plot_table(&mut self, id: &str) -> AppResult<()> {
        let table = self
            .destroy(id)
            .and_then(|w| match w.kind {
                WidgetKind::Table(table) => Some(table),
                _ => None,
            })
            .unwrap_or_default();
        self.insert(Widget::new(id, WidgetKind::Table(table)))
    }

    /// Replace or prepend log rows on a table and redraw it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Render` if the redraw fails.
    pub fn update_table(&mut self, id: &str, logs: &LogsPayload, append: bool) -> AppResult<()> {
        let zone = self.zone;
        let Some(widget) = self.widgets.get_mut(id) else {
            tracing::warn!(widget = %id, "Could not find log table");
            return Ok(());
        };
        let WidgetKind::Table(table) = &mut widget.kind else {
            tracing::warn!(widget = %id, "Widget is not a log table");
            return Ok(());
        };
        table.apply(logs, append, zone);
        widget.state = WidgetState::Updated;
        self.renderer.redraw(widget)
    }

    /// The table registered under `id`, if any.
    #[must_use]
    pub fn table(&self, id: &str) -> Option<&LogTable> {
        self.get(id).and_then(Widget::as_table)
    }

    fn insert(&mut self, widget: Widget) -> AppResult<()> {
        tracing::debug!(widget = %widget.id, "Widget plotted");
        let id = widget.id.clone();
        let widget = self.widgets.entry(id).insert_entry(widget).into_mut();
        self.renderer.redraw(widget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::presenter::render::NullRenderer;
    use chrono::FixedOffset;

    #[derive(Default)]
    struct Recording {
        redraws: Vec<String>,
    }

    impl Renderer for Recording {
        fn redraw(&mut self, widget: &Widget) -> AppResult<()> {
            self.redraws.push(widget.id.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Renderer for Broken {
        fn redraw(&mut self, _widget: &Widget) -> AppResult<()> {
            Err(AppError::Render("canvas lost".to_string()))
        }
    }

    fn utc() -> DisplayZone {
        DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn sample(times: &[i64]) -> ScaledSample {
        let mut channels = BTreeMap::new();
        for channel in Channel::MEASURED {
            channels.insert(channel.name().to_string(), times.iter().map(|&t| t as f64).collect());
        }
        ScaledSample {
            time: Some(times.to_vec()),
            channels,
        }
    }

    fn gauge_ids() -> GaugeIds {
        [
            (Channel::Flow, "flow-gauge".to_string()),
            (Channel::Pressure, "pressure-gauge".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lifecycle_states() {
        let mut registry = WidgetRegistry::new(NullRenderer, utc());
        assert_eq!(registry.state("lines"), None);

        registry.plot_lines("lines").unwrap();
        assert_eq!(registry.state("lines"), Some(WidgetState::Plotted));

        registry.update_lines("lines", &sample(&[0]), true).unwrap();
        assert_eq!(registry.state("lines"), Some(WidgetState::Updated));

        let gone = registry.destroy("lines").unwrap();
        assert_eq!(gone.state, WidgetState::Destroyed);
        assert!(registry.is_empty());
    }

    #[test]
    fn update_of_unknown_widget_is_a_no_op() {
        let mut registry = WidgetRegistry::new(Recording::default(), utc());
        registry.update_lines("missing", &sample(&[0]), true).unwrap();
        registry.update_table("missing", &LogsPayload::default(), true).unwrap();
        registry
            .update_gauges(&gauge_ids(), &BTreeMap::from([(Channel::Flow, 1.0)]))
            .unwrap();
        assert!(registry.renderer().redraws.is_empty());
    }

    #[test]
    fn update_of_wrong_kind_is_a_no_op() {
        let mut registry = WidgetRegistry::new(NullRenderer, utc());
        registry.plot_table("logs").unwrap();
        registry.update_lines("logs", &sample(&[0]), true).unwrap();
        assert_eq!(registry.state("logs"), Some(WidgetState::Plotted));
    }

    #[test]
    fn replot_keeps_retained_series() {
        let mut registry = WidgetRegistry::new(Recording::default(), utc());
        registry.plot_lines("lines").unwrap();
        registry.update_lines("lines", &sample(&[0, 1000]), true).unwrap();
        let before = registry.get("lines").unwrap().as_line().unwrap().clone();

        registry.plot_lines("lines").unwrap();

        let after = registry.get("lines").unwrap().as_line().unwrap();
        assert_eq!(after.labels, before.labels);
        assert_eq!(after.series, before.series);
        assert_eq!(after.title, before.title);
    }

    #[test]
    fn replot_keeps_gauge_readings() {
        let mut registry = WidgetRegistry::new(NullRenderer, utc());
        let ids = gauge_ids();
        registry.plot_gauges(&ids).unwrap();
        registry
            .update_gauges(&ids, &BTreeMap::from([(Channel::Flow, 42.0)]))
            .unwrap();

        registry.plot_gauges(&ids).unwrap();

        let flow = registry.get("flow-gauge").unwrap().as_gauge().unwrap();
        assert_eq!(flow.reading, Some(42.0));
        let pressure = registry.get("pressure-gauge").unwrap().as_gauge().unwrap();
        assert_eq!(pressure.reading, None);
    }

    #[test]
    fn replot_keeps_table_rows() {
        let mut registry = WidgetRegistry::new(NullRenderer, utc());
        registry.plot_table("logs").unwrap();
        let logs = LogsPayload {
            columns: vec!["Message".into()],
            data: vec![vec![serde_json::json!("hello")]],
        };
        registry.update_table("logs", &logs, true).unwrap();
        registry.plot_table("logs").unwrap();
        assert_eq!(registry.table("logs").unwrap().rows, vec![vec!["hello".to_string()]]);
    }

    #[test]
    fn render_failure_is_reported_and_data_kept() {
        let mut registry = WidgetRegistry::new(NullRenderer, utc());
        registry.plot_lines("lines").unwrap();
        let mut registry = WidgetRegistry {
            widgets: std::mem::take(&mut registry.widgets),
            renderer: Broken,
            zone: utc(),
        };

        let err = registry.update_lines("lines", &sample(&[0, 1000, 2000]), true);
        assert!(matches!(err, Err(AppError::Render(_))));
        assert_eq!(registry.get("lines").unwrap().as_line().unwrap().labels.len(), 3);
    }

    #[test]
    fn rejected_timestamp_does_not_wedge_the_chart() {
        let mut registry = WidgetRegistry::new(Recording::default(), utc());
        registry.plot_lines("lines").unwrap();

        let err = registry.update_lines("lines", &sample(&[8_500_000_000_000_000]), true);
        assert!(matches!(err, Err(AppError::Parse(_))));
        assert!(registry.get("lines").unwrap().as_line().unwrap().is_empty());
        assert_eq!(registry.state("lines"), Some(WidgetState::Plotted));

        registry
            .update_lines("lines", &sample(&[1_725_184_800_000]), true)
            .unwrap();
        let chart = registry.get("lines").unwrap().as_line().unwrap();
        assert_eq!(chart.labels, vec![1_725_184_800_000]);
        assert_eq!(chart.title, "01.09.24, 10:00 - 01.09.24, 10:00");
        assert_eq!(registry.state("lines"), Some(WidgetState::Updated));
    }

    #[test]
    fn every_update_requests_a_redraw() {
        let mut registry = WidgetRegistry::new(Recording::default(), utc());
        registry.plot_lines("lines").unwrap();
        registry.update_lines("lines", &sample(&[0]), true).unwrap();
        registry.update_lines("lines", &sample(&[1]), true).unwrap();
        assert_eq!(registry.renderer().redraws, vec!["lines", "lines", "lines"]);
    }
}
