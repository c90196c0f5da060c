//! `pod` command group: the local registry of configured pods.

use std::io::Write;

use podgrid_registry::{ActivePodRegistry, PodMetadata, SetupRequest, ssh};

use crate::cli::{RegistryCommands, SetupArgs};
use crate::error::CliError;
use crate::output::{EntryListView, EntryView, OutputFormat, StatusLine};

/// Executes `pod` subcommands.
#[derive(Debug)]
pub struct RegistryCommand<'a> {
    registry: &'a ActivePodRegistry,
}

impl<'a> RegistryCommand<'a> {
    /// Command over the given registry.
    #[must_use]
    pub fn new(registry: &'a ActivePodRegistry) -> Self {
        Self { registry }
    }

    /// Run one `pod` subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate or unknown names, malformed SSH
    /// targets, strict-mode unreachable targets, or registry IO failures.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &RegistryCommands,
    ) -> Result<(), CliError> {
        match command {
            RegistryCommands::Setup(args) => self.setup(writer, format, args).await,
            RegistryCommands::List => {
                let view = EntryListView {
                    active_pod: self.registry.active()?,
                    pods: self.registry.list()?,
                };
                format.write(writer, &view)
            }
            RegistryCommands::Switch { name } => {
                self.registry.switch(name)?;
                format.write(
                    writer,
                    &StatusLine::new(format!("'{name}' is now the active pod.")),
                )
            }
            RegistryCommands::Remove { name } => {
                self.registry.remove(name)?;
                format.write(writer, &StatusLine::new(format!("Removed pod '{name}'.")))
            }
            RegistryCommands::Status { name, probe } => {
                self.status(writer, format, name.as_deref(), *probe).await
            }
        }
    }

    async fn setup<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &SetupArgs,
    ) -> Result<(), CliError> {
        let request = SetupRequest {
            name: args.name.clone(),
            ssh_target: args.ssh.clone(),
            test_connection: args.test_connection,
            require_reachable: args.strict,
            metadata: PodMetadata {
                provider: args.provider.clone(),
                region: args.region.clone(),
                gpu_type: args.gpu_type.clone(),
                gpu_count: args.gpu_count,
                cost_per_hour: args.cost_per_hour,
                pod_id: args.pod_id.clone(),
                status: None,
            },
        };

        let report = self.registry.setup(request).await?;
        format.write(
            writer,
            &EntryView {
                entry: report.entry,
                active: report.became_active,
                reachable: report.reachable,
            },
        )
    }

    async fn status<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        name: Option<&str>,
        probe: bool,
    ) -> Result<(), CliError> {
        let entry = self.registry.resolve(name)?;
        let active = self.registry.active()?.as_deref() == Some(entry.name.as_str());
        let reachable = if probe {
            Some(ssh::probe(&entry.ssh_command).await)
        } else {
            None
        };
        format.write(
            writer,
            &EntryView {
                entry,
                active,
                reachable,
            },
        )
    }
}
