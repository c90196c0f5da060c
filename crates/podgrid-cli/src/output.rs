//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use podgrid_client::DataOrigin;
use podgrid_manager::{DryRunReport, GpuQuote};
use podgrid_proto::{GpuType, Pod, ResourceOffering};
use podgrid_registry::PodEntry;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Short label for a transport origin.
fn origin_label(origin: DataOrigin) -> &'static str {
    match origin {
        DataOrigin::Api => "api",
        DataOrigin::CliFallback => "cli-fallback",
    }
}

fn origin_footer<W: Write>(writer: &mut W, origin: DataOrigin) -> Result<(), CliError> {
    if origin == DataOrigin::CliFallback {
        writeln!(writer)?;
        writeln!(
            writer,
            "note: parsed from CLI output; identifiers may differ from API-assigned ids"
        )?;
    }
    Ok(())
}

/// Offering listing plus its transport source.
#[derive(Debug, Clone, Serialize)]
pub struct OfferingListView {
    /// Which transport produced the data.
    pub source: &'static str,
    /// The offerings.
    pub offerings: Vec<ResourceOffering>,
    #[serde(skip)]
    origin: DataOrigin,
}

impl OfferingListView {
    /// View over a sourced offering list.
    #[must_use]
    pub fn new(offerings: Vec<ResourceOffering>, origin: DataOrigin) -> Self {
        Self {
            source: origin_label(origin),
            offerings,
            origin,
        }
    }
}

impl TableDisplay for OfferingListView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.offerings.is_empty() {
            writeln!(writer, "No offerings match.")?;
            return Ok(());
        }
        writeln!(
            writer,
            "{:<22} {:<12} {:>5} {:>6} {:>9}  {:<16} {:<12}",
            "ID", "GPU TYPE", "GPUS", "AVAIL", "$/HR", "PROVIDER", "REGION"
        )?;
        for o in &self.offerings {
            writeln!(
                writer,
                "{:<22} {:<12} {:>5} {:>6} {:>9.2}  {:<16} {:<12}",
                o.id, o.gpu_type, o.gpu_count, o.available_count, o.cost_per_hour, o.provider,
                o.region
            )?;
        }
        origin_footer(writer, self.origin)
    }
}

/// GPU type names known to the external system.
#[derive(Debug, Clone, Serialize)]
pub struct GpuTypesView {
    /// The type names.
    pub gpu_types: Vec<String>,
}

impl TableDisplay for GpuTypesView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for name in &self.gpu_types {
            writeln!(writer, "{name}")?;
        }
        Ok(())
    }
}

/// Cheapest offering per GPU type.
#[derive(Debug, Clone, Serialize)]
pub struct CompareView {
    /// Quotes by GPU type; types with no matching offering are absent.
    pub quotes: BTreeMap<GpuType, GpuQuote>,
}

impl TableDisplay for CompareView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.quotes.is_empty() {
            writeln!(writer, "No offerings match for any requested type.")?;
            return Ok(());
        }
        writeln!(
            writer,
            "{:<12} {:>9} {:>10}  {:<16} {:<22}",
            "GPU TYPE", "$/HR", "$/DAY", "PROVIDER", "ID"
        )?;
        for (gpu_type, quote) in &self.quotes {
            writeln!(
                writer,
                "{:<12} {:>9.2} {:>10.2}  {:<16} {:<22}",
                gpu_type,
                quote.offering.cost_per_hour,
                quote.daily_cost,
                quote.offering.provider,
                quote.offering.id
            )?;
        }
        Ok(())
    }
}

/// Pod listing plus its transport source.
#[derive(Debug, Clone, Serialize)]
pub struct PodListView {
    /// Which transport produced the data.
    pub source: &'static str,
    /// The pods.
    pub pods: Vec<Pod>,
    #[serde(skip)]
    origin: DataOrigin,
}

impl PodListView {
    /// View over a sourced pod list.
    #[must_use]
    pub fn new(pods: Vec<Pod>, origin: DataOrigin) -> Self {
        Self {
            source: origin_label(origin),
            pods,
            origin,
        }
    }
}

impl TableDisplay for PodListView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.pods.is_empty() {
            writeln!(writer, "No pods.")?;
            return Ok(());
        }
        writeln!(
            writer,
            "{:<24} {:<16} {:<14} {:<11} {:<20}",
            "ID", "NAME", "GPU", "STATUS", "CREATED"
        )?;
        for pod in &self.pods {
            writeln!(
                writer,
                "{:<24} {:<16} {:<14} {:<11} {:<20}",
                pod.id,
                pod.name,
                format!("{}x {}", pod.gpu_count, pod.gpu_type),
                pod.status.to_string(),
                pod.created_at.format("%Y-%m-%d %H:%M UTC")
            )?;
        }
        origin_footer(writer, self.origin)
    }
}

/// One pod in detail.
#[derive(Debug, Clone, Serialize)]
pub struct PodView {
    /// Which transport produced the data.
    pub source: &'static str,
    /// The pod.
    pub pod: Pod,
    #[serde(skip)]
    origin: DataOrigin,
}

impl PodView {
    /// View over a sourced pod.
    #[must_use]
    pub fn new(pod: Pod, origin: DataOrigin) -> Self {
        Self {
            source: origin_label(origin),
            pod,
            origin,
        }
    }
}

impl TableDisplay for PodView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let pod = &self.pod;
        writeln!(writer, "Pod {}", pod.name)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "ID:          {}", pod.id)?;
        writeln!(writer, "Status:      {}", pod.status)?;
        writeln!(writer, "GPU:         {}x {}", pod.gpu_count, pod.gpu_type)?;
        writeln!(writer, "Provider:    {}", pod.provider)?;
        writeln!(writer, "Region:      {}", pod.region)?;
        writeln!(writer, "Cost:        ${:.2}/hr", pod.cost_per_hour)?;
        writeln!(writer, "Runtime:     {:.1} hours", pod.runtime_hours())?;
        writeln!(writer, "Total cost:  ${:.2}", pod.total_cost())?;
        if let Some(ssh) = &pod.ssh_connection {
            writeln!(writer, "SSH:         {ssh}")?;
        }
        origin_footer(writer, self.origin)
    }
}

/// Dry-run projection for a create request.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunView {
    /// The projection.
    pub dry_run: DryRunReport,
}

impl TableDisplay for DryRunView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let report = &self.dry_run;
        writeln!(writer, "Dry run - nothing was created")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Pod name:    {}", report.pod_name)?;
        writeln!(writer, "Offering:    {}", report.offering.id)?;
        writeln!(
            writer,
            "GPU:         {} via {}",
            report.offering.gpu_type, report.offering.provider
        )?;
        writeln!(writer, "Region:      {}", report.offering.region)?;
        writeln!(writer, "Hourly cost: ${:.2}", report.hourly_cost)?;
        writeln!(writer, "Daily cost:  ${:.2}", report.daily_cost)?;
        Ok(())
    }
}

/// Configured pods from the local registry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryListView {
    /// The active pod's name, if any.
    pub active_pod: Option<String>,
    /// All configured pods.
    pub pods: Vec<PodEntry>,
}

impl TableDisplay for EntryListView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.pods.is_empty() {
            writeln!(writer, "No pods configured. Run 'podgrid pod setup'.")?;
            return Ok(());
        }
        writeln!(
            writer,
            "  {:<16} {:<30} {:<12} {:<10}",
            "NAME", "SSH", "GPU", "STATUS"
        )?;
        for entry in &self.pods {
            let marker = if self.active_pod.as_deref() == Some(entry.name.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(
                writer,
                "{marker} {:<16} {:<30} {:<12} {:<10}",
                entry.name,
                entry.ssh_command,
                format!("{}x {}", entry.gpu_count, entry.gpu_type),
                entry.status
            )?;
        }
        Ok(())
    }
}

/// One registry entry in detail.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    /// The entry.
    pub entry: PodEntry,
    /// Whether this is the active pod.
    pub active: bool,
    /// Probe outcome, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

impl TableDisplay for EntryView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let entry = &self.entry;
        writeln!(writer, "Pod {}{}", entry.name, if self.active { " (active)" } else { "" })?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "SSH:         ssh {}", entry.ssh_command)?;
        writeln!(writer, "Provider:    {}", entry.provider)?;
        writeln!(writer, "Region:      {}", entry.region)?;
        writeln!(writer, "GPU:         {}x {}", entry.gpu_count, entry.gpu_type)?;
        writeln!(writer, "Cost:        ${:.2}/hr", entry.cost_per_hour)?;
        writeln!(writer, "Status:      {}", entry.status)?;
        if let Some(pod_id) = &entry.pod_id {
            writeln!(writer, "Pod id:      {pod_id}")?;
        }
        if let Some(reachable) = self.reachable {
            writeln!(
                writer,
                "Reachable:   {}",
                if reachable { "yes" } else { "no" }
            )?;
        }
        Ok(())
    }
}

/// A one-line outcome message.
#[derive(Debug, Clone, Serialize)]
pub struct StatusLine {
    /// The message.
    pub message: String,
}

impl StatusLine {
    /// Wrap a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TableDisplay for StatusLine {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.message)?;
        Ok(())
    }
}

/// Raw log text.
#[derive(Debug, Clone, Serialize)]
pub struct LogsView {
    /// The pod the logs belong to.
    pub pod_id: String,
    /// The log text.
    pub logs: String,
}

impl TableDisplay for LogsView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.logs.trim().is_empty() {
            writeln!(writer, "No logs available for pod {}.", self.pod_id)?;
        } else {
            writeln!(writer, "{}", self.logs.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offering() -> ResourceOffering {
        ResourceOffering {
            id: "cfg-1".into(),
            gpu_type: GpuType::H100_80GB,
            gpu_count: 8,
            available_count: 4,
            total_count: 8,
            cost_per_hour: 2.9,
            provider: "Datacrunch".into(),
            region: "FIN-01".into(),
        }
    }

    #[test]
    fn table_lists_offerings_with_header() {
        let view = OfferingListView::new(vec![offering()], DataOrigin::Api);
        let mut buf = Vec::new();
        OutputFormat::new(Format::Table).write(&mut buf, &view).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("ID"));
        assert!(text.contains("cfg-1"));
        assert!(text.contains("H100_80GB"));
        assert!(!text.contains("note:"));
    }

    #[test]
    fn fallback_origin_adds_confidence_note() {
        let view = OfferingListView::new(vec![offering()], DataOrigin::CliFallback);
        let mut buf = Vec::new();
        OutputFormat::new(Format::Table).write(&mut buf, &view).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("note: parsed from CLI output"));
    }

    #[test]
    fn json_output_is_valid_and_carries_source() {
        let view = OfferingListView::new(vec![offering()], DataOrigin::CliFallback);
        let mut buf = Vec::new();
        OutputFormat::new(Format::Json).write(&mut buf, &view).expect("write");
        let doc: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");
        assert_eq!(doc["source"], "cli-fallback");
        assert_eq!(doc["offerings"][0]["id"], "cfg-1");
    }

    #[test]
    fn empty_listing_prints_friendly_line() {
        let view = OfferingListView::new(vec![], DataOrigin::Api);
        let mut buf = Vec::new();
        OutputFormat::new(Format::Table).write(&mut buf, &view).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "No offerings match.\n");
    }
}
