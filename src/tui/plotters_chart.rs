//! Plotters-powered core inflation chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::MeasureKind;

/// One measure as a set of unbroken line segments.
pub struct MeasureLine {
    pub kind: MeasureKind,
    pub segments: Vec<Vec<(f64, f64)>>,
}

/// Render-only chart description. All series and bounds are computed outside
/// the render call.
pub struct CorePlottersChart<'a> {
    pub lines: &'a [MeasureLine],
    /// X bounds in fractional years.
    pub x_bounds: [f64; 2],
    /// Y bounds in percentage points.
    pub y_bounds: [f64; 2],
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

pub fn measure_color(kind: MeasureKind) -> RGBColor {
    match kind {
        MeasureKind::Trim => RGBColor(0, 255, 255),
        MeasureKind::Median => RGBColor(255, 200, 0),
        MeasureKind::Common => RGBColor(255, 0, 255),
    }
}

impl Widget for CorePlottersChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters fails to lay out tiny areas; show a hint instead of panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("month")
                .y_desc("YoY (pp)")
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            if y0 < 0.0 && y1 > 0.0 {
                chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &RGBColor(90, 90, 90)))?;
            }

            for line in self.lines {
                let color = measure_color(line.kind);
                for segment in &line.segments {
                    if segment.len() == 1 {
                        chart.draw_series(segment.iter().map(|&p| Pixel::new(p, color)))?;
                    } else {
                        chart.draw_series(LineSeries::new(segment.iter().copied(), &color))?;
                    }
                }
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
