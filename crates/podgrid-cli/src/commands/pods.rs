//! `pods` command group: remote pod lifecycle.

use std::io::Write;

use podgrid_client::DefaultClient;
use podgrid_manager::{CreateOutcome, PodLifecycleManager, TerminateOutcome};
use podgrid_proto::PodSpec;
use podgrid_registry::ActivePodRegistry;

use crate::cli::{CreateArgs, PodsCommands};
use crate::commands::{parse_env_pairs, parse_gpu_type};
use crate::error::CliError;
use crate::output::{DryRunView, LogsView, OutputFormat, PodListView, PodView, StatusLine};

/// Executes `pods` subcommands.
#[derive(Debug)]
pub struct PodsCommand<'a> {
    client: &'a DefaultClient,
    registry: &'a ActivePodRegistry,
}

impl<'a> PodsCommand<'a> {
    /// Command over the given client and registry.
    #[must_use]
    pub fn new(client: &'a DefaultClient, registry: &'a ActivePodRegistry) -> Self {
        Self { client, registry }
    }

    /// Run one `pods` subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error when arguments are invalid, the target pod cannot
    /// be resolved, or the remote call fails on both transport paths.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &PodsCommands,
    ) -> Result<(), CliError> {
        let manager = PodLifecycleManager::new(self.client);

        match command {
            PodsCommands::Create(args) => self.create(writer, format, &manager, args).await,
            PodsCommands::List { all } => {
                let pods = manager.list(!all).await?;
                let origin = pods.origin;
                format.write(writer, &PodListView::new(pods.into_inner(), origin))
            }
            PodsCommands::Status { id } => {
                let id = self.resolve_id(id.as_deref())?;
                let pod = manager.status(&id).await?;
                let origin = pod.origin;
                format.write(writer, &PodView::new(pod.into_inner(), origin))
            }
            PodsCommands::Logs { id, lines } => {
                let id = self.resolve_id(id.as_deref())?;
                let logs = manager.logs(&id, *lines).await?;
                format.write(
                    writer,
                    &LogsView {
                        pod_id: id,
                        logs: logs.into_inner(),
                    },
                )
            }
            PodsCommands::Terminate { id } => {
                let id = self.resolve_id(id.as_deref())?;
                let message = match manager.terminate(&id).await? {
                    TerminateOutcome::Terminated => format!("Pod {id} terminated."),
                    TerminateOutcome::AlreadyTerminated => {
                        format!("Pod {id} was already terminated.")
                    }
                };
                format.write(writer, &StatusLine::new(message))
            }
            PodsCommands::Ssh { id } => {
                let id = self.resolve_id(id.as_deref())?;
                let command = manager.ssh_command(&id).await?;
                format.write(writer, &StatusLine::new(command))
            }
        }
    }

    /// Resolve an explicit pod id, or fall back to the active pod's
    /// recorded external id.
    fn resolve_id(&self, explicit: Option<&str>) -> Result<String, CliError> {
        if let Some(id) = explicit {
            return Ok(id.to_string());
        }
        let entry = self.registry.resolve(None)?;
        entry.pod_id.ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "active pod '{}' has no recorded external id; pass a pod id explicitly",
                entry.name
            ))
        })
    }

    async fn create<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        manager: &PodLifecycleManager<'_, podgrid_client::ApiClient, podgrid_client::PrimeCli>,
        args: &CreateArgs,
    ) -> Result<(), CliError> {
        let spec = PodSpec {
            gpu_type: parse_gpu_type(&args.gpu_type)?,
            gpu_count: args.count,
            name: args.name.clone(),
            region: args.region.clone(),
            provider: args.provider.clone(),
            image: Some(args.image.clone()),
            disk_gb: Some(args.disk_size),
            env: parse_env_pairs(&args.env)?,
            max_cost_per_hour: args.max_cost,
        };

        match manager.create(&spec, args.dry_run).await? {
            CreateOutcome::DryRun(report) => format.write(writer, &DryRunView { dry_run: report }),
            CreateOutcome::Created(pod) => {
                let origin = pod.origin;
                format.write(writer, &PodView::new(pod.into_inner(), origin))
            }
        }
    }
}
