use crate::config::MAX_MESSAGE_CHARS;

use super::table::DisplayTable;

/// Render as a markdown pipe table, or as padded columns when a cell would
/// break markdown (a `|` or a newline in the text).
pub fn render_table(table: &DisplayTable) -> String {
    render_lines(table).join("\n")
}

/// Caption, fenced table, disclaimer. Trailing rows are dropped, with a
/// count of what was cut, so the message fits the sink's size limit. The
/// header lines are always kept.
pub fn compose_message(caption: &str, table: &DisplayTable, disclaimer: &str) -> String {
    let frame = |body: &str| format!("{caption}\n```\n{body}\n```\n{disclaimer}");
    let lines = render_lines(table);
    let full = frame(&lines.join("\n"));
    if full.chars().count() <= MAX_MESSAGE_CHARS {
        return full;
    }

    let total = table.rows.len();
    let header_lines = lines.len() - total;
    let reserve = format!("\n… {total} more rows").chars().count();
    let mut budget = MAX_MESSAGE_CHARS.saturating_sub(frame("").chars().count() + reserve);

    let mut body: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let cost = line.chars().count() + usize::from(i > 0);
        if i >= header_lines && cost > budget {
            break;
        }
        budget = budget.saturating_sub(cost);
        body.push(line);
    }
    let kept = body.len() - header_lines;
    let mut shown = body.join("\n");
    shown.push_str(&format!("\n… {} more rows", total - kept));
    frame(&shown)
}

fn render_lines(table: &DisplayTable) -> Vec<String> {
    if markdown_safe(table) {
        render_markdown(table)
    } else {
        render_plain(table)
    }
}

fn markdown_safe(table: &DisplayTable) -> bool {
    table
        .headers
        .iter()
        .chain(table.rows.iter().flatten())
        .all(|c| !c.contains('|') && !c.contains('\n'))
}

fn widths(table: &DisplayTable) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            table
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| display_len(c))
                .chain(std::iter::once(display_len(h)))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn display_len(s: &str) -> usize {
    s.replace('\n', " ").chars().count()
}

fn pad(s: &str, width: usize) -> String {
    let flat = s.replace('\n', " ");
    let len = flat.chars().count();
    format!("{flat}{}", " ".repeat(width.saturating_sub(len)))
}

fn render_markdown(table: &DisplayTable) -> Vec<String> {
    let widths = widths(table);
    let line = |cells: &[String]| {
        let inner: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(cells.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        format!("| {} |", inner.join(" | "))
    };
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();

    let mut out = vec![line(table.headers.as_slice()), format!("|-{}-|", rule.join("-|-"))];
    out.extend(table.rows.iter().map(|r| line(r.as_slice())));
    out
}

fn render_plain(table: &DisplayTable) -> Vec<String> {
    let widths = widths(table);
    let line = |cells: &[String]| {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(cells.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![line(table.headers.as_slice())];
    out.extend(table.rows.iter().map(|r| line(r.as_slice())));
    out
}
