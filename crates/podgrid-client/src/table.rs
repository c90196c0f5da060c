//! Header-indexed parsing of the external tool's tabular output.
//!
//! The external CLI renders human-oriented tables whose column order,
//! widths and decorations change between versions. Columns are therefore
//! resolved by normalized header name, never by position: unknown or
//! reordered columns are harmless, missing required columns are a hard
//! [`ClientError::UnparseableOutput`], and a single row that fails to
//! parse is dropped with a warning while the rest of the listing proceeds.
//!
//! Two framings are understood: the Unicode box-drawing tables the tool
//! emits today (`┃`/`│` cells, `┡` header separator, `└` footer) and plain
//! `|`-delimited tables. Cells wrapped over several physical lines (a
//! continuation row has an empty first cell) are folded back into their
//! logical row, and truncation ellipses (`…`) are stripped.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use podgrid_proto::{GpuType, Pod, PodStatus, ResourceOffering};

use crate::error::{ClientError, ClientResult};

/// A parsed table: normalized headers plus raw string rows.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix(delimiter).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(delimiter).unwrap_or(trimmed);
    trimmed
        .split(delimiter)
        .map(|cell| cell.trim().trim_end_matches('…').trim().to_string())
        .collect()
}

fn is_pipe_separator(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| matches!(c, '|' | '-' | '+' | ':' | '=') || c.is_whitespace())
}

impl RawTable {
    /// Parse tabular text into headers and rows.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnparseableOutput`] when no table structure
    /// can be recognized at all.
    pub fn parse(text: &str) -> ClientResult<Self> {
        if text.contains('│') || text.contains('┃') {
            Self::parse_delimited(text, true)
        } else if text.lines().any(|l| l.trim_start().starts_with('|')) {
            Self::parse_delimited(text, false)
        } else {
            Err(ClientError::unparseable(
                "no tabular output recognized in response",
            ))
        }
    }

    fn parse_delimited(text: &str, boxed: bool) -> ClientResult<Self> {
        let mut header_lines: Vec<Vec<String>> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut in_data = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if boxed {
                if trimmed.starts_with('┡') {
                    in_data = true;
                    continue;
                }
                if trimmed.starts_with('└') {
                    break;
                }
                if trimmed.starts_with('┃') {
                    header_lines.push(split_cells(trimmed, '┃'));
                    continue;
                }
                if !trimmed.starts_with('│') {
                    continue;
                }
                let cells = split_cells(trimmed, '│');
                if header_lines.is_empty() && !in_data {
                    // Tables without a heavy header section use the first
                    // light row as the header.
                    header_lines.push(cells);
                    in_data = true;
                } else {
                    rows.push(cells);
                }
            } else {
                if !trimmed.starts_with('|') {
                    continue;
                }
                if is_pipe_separator(trimmed) {
                    continue;
                }
                let cells = split_cells(trimmed, '|');
                if header_lines.is_empty() {
                    header_lines.push(cells);
                } else {
                    rows.push(cells);
                }
            }
        }

        let Some(mut headers) = header_lines.first().cloned() else {
            return Err(ClientError::unparseable("table has no header row"));
        };
        // Wrapped header cells span extra physical lines; fold them in.
        for extra in header_lines.iter().skip(1) {
            for (i, cell) in extra.iter().enumerate() {
                if !cell.is_empty() {
                    if let Some(h) = headers.get_mut(i) {
                        h.push(' ');
                        h.push_str(cell);
                    }
                }
            }
        }
        let headers: Vec<String> = headers.iter().map(|h| normalize(h)).collect();

        let folded = fold_continuations(rows);
        let width = headers.len();
        let mut kept = Vec::with_capacity(folded.len());
        for row in folded {
            if row.len() == width {
                kept.push(row);
            } else {
                warn!(
                    cells = row.len(),
                    expected = width,
                    "skipping table row with mismatched cell count"
                );
            }
        }

        Ok(Self {
            headers,
            rows: kept,
        })
    }

    /// Index of a column by (normalized) header name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = normalize(name);
        self.headers.iter().position(|h| *h == wanted)
    }

    /// First matching index among several candidate header names.
    #[must_use]
    pub fn column_any(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| self.column(name))
    }

    /// Resolve a column that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnparseableOutput`] naming the missing column.
    pub fn require_any(&self, candidates: &[&str]) -> ClientResult<usize> {
        self.column_any(candidates).ok_or_else(|| {
            ClientError::unparseable(format!(
                "required column missing: expected one of {candidates:?}"
            ))
        })
    }

    /// Parsed data rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Merge continuation lines (empty first cell) into their logical row.
fn fold_continuations(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut folded: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let is_continuation = row.first().is_some_and(String::is_empty);
        if is_continuation {
            if let Some(prev) = folded.last_mut() {
                for (i, cell) in row.iter().enumerate() {
                    if !cell.is_empty() {
                        if let Some(target) = prev.get_mut(i) {
                            if target.is_empty() {
                                target.push_str(cell);
                            } else {
                                target.push(' ');
                                target.push_str(cell);
                            }
                        }
                    }
                }
                continue;
            }
        }
        folded.push(row);
    }
    folded
}

/// Expand truncated provider names to their known full spelling.
#[must_use]
pub fn normalize_provider(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let full = [
        ("dat", "Datacrunch"),
        ("mas", "MassedCompute"),
        ("hyp", "Hyperstack"),
        ("neb", "Nebula"),
        ("run", "RunPod"),
        ("lam", "Lambda Labs"),
    ]
    .iter()
    .find(|(prefix, _)| lower.starts_with(prefix));

    match full {
        Some((_, name)) => (*name).to_string(),
        None => raw.to_string(),
    }
}

/// Parse a price cell like `$3.20`, `3.20/hr` or `$ 2.9`.
fn parse_price(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().trim_start_matches('$').trim();
    let numeric: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}

/// Parse a count cell, taking the lower bound of ranges like `2-8`.
fn parse_count(cell: &str) -> Option<u32> {
    let first = cell.split('-').next().unwrap_or(cell).trim();
    first.parse().ok()
}

/// Parse a `2x H100_80GB` style GPU summary cell.
fn parse_gpu_info(cell: &str) -> (u32, GpuType) {
    if let Some((count, label)) = cell.split_once(['x', '×']) {
        if let Ok(n) = count.trim().parse::<u32>() {
            return (n.max(1), GpuType::from_label(label));
        }
    }
    (1, GpuType::from_label(cell))
}

fn parse_created(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(cell) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Extract resource offerings from an `availability list` table.
///
/// # Errors
///
/// Returns [`ClientError::UnparseableOutput`] when the output is not a
/// table or the id / GPU type / price columns are all missing. Individual
/// malformed rows are skipped with a warning.
pub fn parse_offerings(text: &str) -> ClientResult<Vec<ResourceOffering>> {
    let table = RawTable::parse(text)?;

    let id_col = table.require_any(&["id", "config id"])?;
    let gpu_col = table.require_any(&["gpu type", "gpu"])?;
    let price_col = table.require_any(&["price/hr", "price", "cost/hr", "cost"])?;
    let count_col = table.column_any(&["gpus", "gpu count", "count", "qty"]);
    let provider_col = table.column_any(&["provider", "vendor"]);
    let region_col = table.column_any(&["location", "region", "country"]);
    let status_col = table.column_any(&["availability", "status", "stock"]);
    let available_col = table.column_any(&["available"]);

    let mut offerings = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let id = row[id_col].clone();
        if id.is_empty() {
            warn!("skipping offering row without a configuration id");
            continue;
        }
        let Some(cost_per_hour) = parse_price(&row[price_col]) else {
            warn!(id = %id, price = %row[price_col], "skipping offering row with unparseable price");
            continue;
        };

        let gpu_count = count_col
            .and_then(|i| parse_count(&row[i]))
            .unwrap_or(1)
            .max(1);
        let status = status_col.map(|i| row[i].to_lowercase()).unwrap_or_default();
        let listed_available = !status.contains("unavail")
            && (status.contains("ava")
                || status.contains("med")
                || status.contains("high")
                || status.contains("low"));
        let available_count = match available_col.and_then(|i| parse_count(&row[i])) {
            Some(n) => n,
            None if status_col.is_none() || listed_available => gpu_count,
            None => 0,
        };

        offerings.push(ResourceOffering {
            id,
            gpu_type: GpuType::from_label(&row[gpu_col]),
            gpu_count,
            available_count,
            total_count: gpu_count,
            cost_per_hour,
            provider: provider_col
                .map(|i| normalize_provider(&row[i]))
                .unwrap_or_default(),
            region: region_col.map(|i| row[i].clone()).unwrap_or_default(),
        });
    }

    Ok(offerings)
}

/// Extract pods from a `pods list` table.
///
/// Rows carry only what the table shows; fields the table does not print
/// (SSH target, hourly cost) stay empty and callers treat the result as
/// lower-confidence data.
///
/// # Errors
///
/// Returns [`ClientError::UnparseableOutput`] when the output is not a
/// table or the id / name / status columns are missing.
pub fn parse_pods(text: &str) -> ClientResult<Vec<Pod>> {
    let table = RawTable::parse(text)?;

    let id_col = table.require_any(&["id", "pod id"])?;
    let name_col = table.require_any(&["name", "pod"])?;
    let status_col = table.require_any(&["status", "state"])?;
    let gpu_col = table.column_any(&["gpu", "gpus", "gpu info"]);
    let created_col = table.column_any(&["created", "created at", "age"]);

    let mut pods = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let id = row[id_col].clone();
        if id.is_empty() {
            warn!("skipping pod row without an id");
            continue;
        }
        let (gpu_count, gpu_type) = gpu_col
            .map(|i| parse_gpu_info(&row[i]))
            .unwrap_or((1, GpuType::Unknown));

        pods.push(Pod {
            id,
            name: row[name_col].clone(),
            gpu_type,
            gpu_count,
            status: PodStatus::from_label(&row[status_col]),
            cost_per_hour: 0.0,
            created_at: created_col
                .and_then(|i| parse_created(&row[i]))
                .unwrap_or_else(Utc::now),
            started_at: None,
            stopped_at: None,
            ssh_connection: None,
            provider: String::new(),
            region: String::new(),
            image: None,
            disk_gb: None,
            env: std::collections::BTreeMap::new(),
        });
    }

    Ok(pods)
}

/// Extract the GPU type column from an `availability gpu-types` table.
///
/// # Errors
///
/// Returns [`ClientError::UnparseableOutput`] when no table is present.
pub fn parse_gpu_types(text: &str) -> ClientResult<Vec<String>> {
    let table = RawTable::parse(text)?;
    let col = table.column_any(&["gpu type", "gpu", "type"]).unwrap_or(0);
    Ok(table
        .rows()
        .iter()
        .filter_map(|row| row.get(col))
        .filter(|cell| !cell.is_empty())
        .cloned()
        .collect())
}
