// src/render.rs
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::fiscal_calendar::FiscalMonth;
use crate::utilization::{UtilizationReport, UtilizationRow};

const UTIL_COLOR: &str = "#006040";
const LABEL_COLOR: &str = "dimgrey";
const SPINE_COLOR: &str = "silver";
const GRID_COLOR: &str = "#e6e6e6";

const WIDTH: f64 = 860.0;
const HEIGHT: f64 = 560.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 150.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 50.0;
const Y_MAX_PERCENT: f64 = 120.0;

const TABLE_HEADERS: [&str; 7] = [
    "Month",
    "Hours Worked",
    "FTE",
    "Utilization",
    "Util to Date",
    "Predicted Hours",
    "Expected Utilization",
];

fn percent(ratio: Decimal) -> Decimal {
    (ratio * dec!(100)).round_dp(1)
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn x_at(index: usize) -> f64 {
    let step = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / FiscalMonth::COUNT as f64;
    MARGIN_LEFT + step * (index as f64 + 0.5)
}

fn y_at(percent: f64) -> f64 {
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let clamped = percent.clamp(0.0, Y_MAX_PERCENT);
    MARGIN_TOP + plot_height * (1.0 - clamped / Y_MAX_PERCENT)
}

// --- Chart ---

/// Renders the utilization chart as a standalone SVG document.
///
/// The line is the cumulative expected utilization; crosses are actual monthly
/// utilization and dots the to-date estimate. Grid lines stop at the current month
/// so the forecast part of the chart reads as open space.
pub fn chart_svg(report: &UtilizationReport, target_percent: u32) -> String {
    let current = report.current_month.index();
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" \
         font-family=\"Tahoma, sans-serif\" font-size=\"13\">\n",
        w = WIDTH,
        h = HEIGHT
    ));
    svg.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"15\">\
         Are you on track to meet your utilization target?</text>\n",
        x_at(FiscalMonth::COUNT - 1),
        MARGIN_TOP - 25.0
    ));

    for i in 0..=current {
        svg.push_str(&format!(
            "<line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"{}\"/>\n",
            MARGIN_TOP,
            plot_bottom,
            GRID_COLOR,
            x = x_at(i)
        ));
    }

    for tick in (0..=120).step_by(20) {
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" dominant-baseline=\"middle\" fill=\"{}\">{}%</text>\n",
            MARGIN_LEFT - 10.0,
            y_at(tick as f64),
            LABEL_COLOR,
            tick
        ));
    }

    svg.push_str(&format!(
        "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"{}\"/>\n",
        MARGIN_LEFT,
        WIDTH - MARGIN_RIGHT,
        SPINE_COLOR,
        y = plot_bottom
    ));

    // Target
    svg.push_str(&format!(
        "<line x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"{}\" stroke-dasharray=\"2,4\"/>\n",
        x_at(0),
        x_at(FiscalMonth::COUNT - 1),
        UTIL_COLOR,
        y = y_at(target_percent as f64)
    ));

    let points: Vec<String> = report
        .rows
        .iter()
        .map(|row| {
            format!(
                "{:.1},{:.1}",
                x_at(row.month.index()),
                y_at(as_f64(row.expected_utilization * dec!(100)))
            )
        })
        .collect();
    svg.push_str(&format!(
        "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"3\" stroke-opacity=\"0.85\"/>\n",
        points.join(" "),
        UTIL_COLOR
    ));

    for row in &report.rows {
        push_markers(&mut svg, row);
    }

    for month in FiscalMonth::ALL {
        let (weight, color) = if month == report.current_month {
            ("bold", UTIL_COLOR)
        } else {
            ("normal", LABEL_COLOR)
        };
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-weight=\"{}\" fill=\"{}\">{}</text>\n",
            x_at(month.index()),
            plot_bottom + 22.0,
            weight,
            color,
            month
        ));
    }

    let predicted = report.predicted_utilization_percent();
    let label_x = x_at(FiscalMonth::COUNT - 1) + 8.0;
    let label_y = y_at(as_f64(predicted)) + 12.0;
    svg.push_str(&format!(
        "<text x=\"{x:.1}\" y=\"{:.1}\" fill=\"{}\"><tspan x=\"{x:.1}\">Predicted</tspan>\
         <tspan x=\"{x:.1}\" dy=\"16\">Utilization ({}%)</tspan></text>\n",
        label_y,
        UTIL_COLOR,
        predicted.trunc(),
        x = label_x
    ));

    svg.push_str("</svg>\n");
    svg
}

fn push_markers(svg: &mut String, row: &UtilizationRow) {
    let x = x_at(row.month.index());
    let actual = as_f64(row.utilization * dec!(100));
    let y = y_at(actual);

    svg.push_str(&format!(
        "<path d=\"M{:.1},{:.1} L{:.1},{:.1} M{:.1},{:.1} L{:.1},{:.1}\" stroke=\"{}\" stroke-width=\"2\"/>\n",
        x - 5.0,
        y - 5.0,
        x + 5.0,
        y + 5.0,
        x - 5.0,
        y + 5.0,
        x + 5.0,
        y - 5.0,
        UTIL_COLOR
    ));
    if actual > 0.0 {
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" dominant-baseline=\"middle\" fill=\"{}\">{:.0}%</text>\n",
            x + 10.0,
            y,
            LABEL_COLOR,
            actual
        ));
    }

    svg.push_str(&format!(
        "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/>\n",
        x,
        y_at(as_f64(row.util_to_date * dec!(100))),
        UTIL_COLOR
    ));
}

// --- Tables ---

fn row_cells(row: &UtilizationRow) -> [String; 7] {
    [
        row.month.to_string(),
        row.hours_worked.round_dp(1).to_string(),
        row.fte.round_dp(1).to_string(),
        format!("{}%", percent(row.utilization)),
        format!("{}%", percent(row.util_to_date)),
        row.predicted_hours.round_dp(1).to_string(),
        format!("{}%", percent(row.expected_utilization)),
    ]
}

/// Fixed-width text table for terminal output.
pub fn text_table(report: &UtilizationReport) -> String {
    let body: Vec<[String; 7]> = report.rows.iter().map(row_cells).collect();
    let widths: Vec<usize> = (0..TABLE_HEADERS.len())
        .map(|col| {
            body.iter()
                .map(|cells| cells[col].len())
                .chain(std::iter::once(TABLE_HEADERS[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(col, (cell, width))| {
                if col == 0 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = String::new();
    out.push_str(&format_line(TABLE_HEADERS.to_vec()));
    out.push('\n');
    for cells in &body {
        out.push_str(&format_line(cells.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn html_table(report: &UtilizationReport) -> String {
    let mut html = String::from("<table class=\"utilization\">\n<tr>");
    for header in TABLE_HEADERS {
        html.push_str(&format!("<th>{}</th>", header));
    }
    html.push_str("</tr>\n");
    for row in &report.rows {
        let class = if row.month == report.current_month {
            " class=\"current\""
        } else {
            ""
        };
        html.push_str(&format!("<tr{}>", class));
        for cell in row_cells(row) {
            html.push_str(&format!("<td>{}</td>", cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}
