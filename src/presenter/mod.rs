//! Presenter binding: widgets fed by normalized samples.
//!
//! Widgets live in a [`WidgetRegistry`] keyed by element id. Each widget is
//! Plotted when created, Updated on every replace/append, and Destroyed when
//! removed or re-plotted. Re-plotting moves retained data onto the new
//! instance before the old one is dropped.

pub mod registry;
pub mod render;
pub mod widget;

pub use registry::{GaugeIds, WidgetRegistry};
pub use render::{NullRenderer, Renderer, TracingRenderer};
pub use widget::{ChartSeries, GaugeWidget, LineChart, LogTable, Widget, WidgetKind, WidgetState};
