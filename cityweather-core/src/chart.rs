//! SVG bar charts of one table column, tallest bar first.

use std::fmt::Write;

use crate::{
    model::{SortOrder, WeatherField},
    table::WeatherTable,
};

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 120.0;
const BAR_FILL: &str = "#1f77b4";

pub const CONTENT_TYPE: &str = "image/svg+xml";

/// Render `field` for every city that has a value, sorted descending.
pub fn render_bar_chart(table: &WeatherTable, field: WeatherField) -> String {
    let bars: Vec<(&str, f64)> = table
        .sorted_by(field, SortOrder::Desc)
        .into_iter()
        .filter_map(|r| field.value(r).map(|v| (r.city.as_str(), v)))
        .collect();

    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = write_chart(&mut svg, field, &bars);
    svg
}

fn write_chart(out: &mut String, field: WeatherField, bars: &[(&str, f64)]) -> std::fmt::Result {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    )?;
    writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        out,
        r#"<text x="{}" y="28" font-size="18" text-anchor="middle">{}</text>"#,
        WIDTH / 2.0,
        escape(field.title())
    )?;

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y_label_y = MARGIN_TOP + plot_h / 2.0;
    writeln!(
        out,
        r#"<text x="18" y="{y_label_y}" font-size="13" text-anchor="middle" transform="rotate(-90 18 {y_label_y})">{}</text>"#,
        escape(field.unit())
    )?;

    if bars.is_empty() {
        writeln!(
            out,
            r##"<text x="{}" y="{}" font-size="14" text-anchor="middle" fill="#666">No data</text>"##,
            WIDTH / 2.0,
            y_label_y
        )?;
        return writeln!(out, "</svg>");
    }

    // Axis range always includes zero so negative temperatures hang below it.
    let max = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let min = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::min);
    let span = if max - min > 0.0 { max - min } else { 1.0 };
    let scale = plot_h / span;
    let zero_y = MARGIN_TOP + max * scale;

    writeln!(
        out,
        r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{}" stroke="#333"/>"##,
        MARGIN_TOP + plot_h
    )?;
    writeln!(
        out,
        r##"<line x1="{MARGIN_LEFT}" y1="{zero_y:.2}" x2="{}" y2="{zero_y:.2}" stroke="#333"/>"##,
        MARGIN_LEFT + plot_w
    )?;

    for tick in [min, (min + max) / 2.0, max] {
        let y = zero_y - tick * scale;
        writeln!(
            out,
            r#"<text x="{}" y="{:.2}" font-size="11" text-anchor="end">{tick:.1}</text>"#,
            MARGIN_LEFT - 6.0,
            y + 4.0
        )?;
    }

    let slot = plot_w / bars.len() as f64;
    let bar_w = slot * 0.7;
    for (i, (city, value)) in bars.iter().enumerate() {
        let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_w) / 2.0;
        let top = if *value >= 0.0 { zero_y - value * scale } else { zero_y };
        let h = (value * scale).abs();
        let label_x = x + bar_w / 2.0;
        let label_y = MARGIN_TOP + plot_h + 14.0;

        writeln!(
            out,
            r#"<rect x="{x:.2}" y="{top:.2}" width="{bar_w:.2}" height="{h:.2}" fill="{BAR_FILL}"><title>{}: {value}</title></rect>"#,
            escape(city)
        )?;
        writeln!(
            out,
            r#"<text x="{label_x:.2}" y="{label_y:.2}" font-size="11" text-anchor="end" transform="rotate(-45 {label_x:.2} {label_y:.2})">{}</text>"#,
            escape(city)
        )?;
    }

    writeln!(out, "</svg>")
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
