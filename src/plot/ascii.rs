//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each measure is drawn as a line of its marker character (`t`, `m`, `c`).
//! Where lines cross, the measure drawn first keeps the cell. A missing value
//! breaks the line. A `.` row marks zero when it is in range.

use chrono::{Datelike, NaiveDate};

use crate::domain::{CoreSeries, MeasureKind};
use crate::io::export::month_label;

/// Render the three measures of a core table.
pub fn render_ascii_plot(series: &CoreSeries, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (Some(first), Some(last)) = (series.rows.first(), series.rows.last()) else {
        return "Plot: (no data)\n".to_string();
    };
    let x_min = month_ordinal(first.date);
    let x_max = month_ordinal(last.date).max(x_min + 1.0);

    let (y_min, y_max) = y_range(series).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    for kind in MeasureKind::ALL {
        let mut prev: Option<(usize, usize)> = None;
        for row in &series.rows {
            let Some(v) = row.get(kind) else {
                prev = None;
                continue;
            };
            let x = map_x(month_ordinal(row.date), x_min, x_max, width);
            let y = map_y(v, y_min, y_max, height);
            match prev {
                Some((x0, y0)) => draw_line(&mut grid, x0, y0, x, y, kind.marker()),
                None => put(&mut grid, x, y, kind.marker()),
            }
            prev = Some((x, y));
        }
    }

    if y_min < 0.0 && y_max > 0.0 {
        let zero = map_y(0.0, y_min, y_max, height);
        for cell in grid[zero].iter_mut().filter(|c| **c == ' ') {
            *cell = '.';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {}..{} | y=[{y_min:.2}, {y_max:.2}]pp |",
        month_label(first.date),
        month_label(last.date),
    ));
    for kind in MeasureKind::ALL {
        out.push_str(&format!(" {}={}", kind.marker(), kind.display_name()));
    }
    out.push('\n');

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn month_ordinal(date: NaiveDate) -> f64 {
    f64::from(date.year()) * 12.0 + f64::from(date.month0())
}

fn y_range(series: &CoreSeries) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for row in &series.rows {
        for v in MeasureKind::ALL.iter().filter_map(|k| row.get(*k)) {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() {
        Some((min_y - 0.5, min_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn put(grid: &mut [Vec<char>], x: usize, y: usize, ch: char) {
    if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
        if *cell == ' ' {
            *cell = ch;
        }
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x, mut y) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let dy = -(y1 - y).abs();
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 {
            put(grid, x as usize, y as usize, ch);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CoreRow;

    fn row(m: u32, trim: f64, median: f64, common: Option<f64>) -> CoreRow {
        CoreRow {
            date: NaiveDate::from_ymd_opt(2023, m, 1).unwrap(),
            trim: Some(trim),
            median: Some(median),
            common,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let series = CoreSeries {
            rows: vec![row(1, 2.0, 2.0, None), row(2, 3.0, 2.0, None), row(3, 4.0, 2.0, None)],
        };
        let txt = render_ascii_plot(&series, 10, 5);
        let expected = concat!(
            "Plot: 2023-01..2023-03 | y=[1.90, 4.10]pp | t=CPI-trim m=CPI-median c=CPI-common\n",
            "        tt\n",
            "      tt  \n",
            "    tt    \n",
            "  tt      \n",
            "ttmmmmmmmm\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn zero_line_and_empty_input() {
        let series = CoreSeries {
            rows: vec![row(1, -1.0, -1.0, Some(-1.0)), row(2, 1.0, 1.0, Some(1.0))],
        };
        let txt = render_ascii_plot(&series, 12, 7);
        assert!(txt.lines().any(|l| l.contains('.')));
        assert_eq!(render_ascii_plot(&CoreSeries::default(), 12, 7), "Plot: (no data)\n");
    }
}
