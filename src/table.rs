use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// A titled block of rows rendered with padded columns.
#[derive(Debug, Clone)]
pub struct TextTable {
    headers: Vec<String>,
    aligns: Vec<Align>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers = headers.into_iter().map(Into::into).collect::<Vec<String>>();
        let aligns = vec![Align::Left; headers.len()];
        Self {
            headers,
            aligns,
            rows: Vec::new(),
        }
    }

    /// Right-aligns the given columns.
    pub fn align_right(mut self, columns: &[usize]) -> Self {
        for &idx in columns {
            if let Some(slot) = self.aligns.get_mut(idx) {
                *slot = Align::Right;
            }
        }
        self
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let column_count = self.headers.len();
        let mut widths = self
            .headers
            .iter()
            .map(|h| display_width(h))
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (idx, cell) in row.iter().enumerate().take(column_count) {
                widths[idx] = widths[idx].max(display_width(&sanitize_cell(cell)));
            }
        }
        for width in &mut widths {
            *width = (*width).max(3);
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.format_row(&self.headers, &widths));
        let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", self.format_row(&separator, &widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", self.format_row(row, &widths));
        }
        output
    }

    fn format_row(&self, values: &[String], widths: &[usize]) -> String {
        let mut cells = Vec::with_capacity(widths.len());
        for (idx, width) in widths.iter().enumerate() {
            let value = values.get(idx).map(String::as_str).unwrap_or("");
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            let cell = match self.aligns.get(idx).copied().unwrap_or(Align::Left) {
                Align::Left => format!("{sanitized}{padding}"),
                Align::Right => format!("{padding}{sanitized}"),
            };
            cells.push(cell);
        }
        cells.join("  ").trim_end().to_string()
    }
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

/// Tabs and line breaks would break the grid; show them as spaces.
fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
