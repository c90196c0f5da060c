//! `resources` command group: discovery and comparison.

use std::io::Write;

use podgrid_client::DefaultClient;
use podgrid_manager::{FindCriteria, ResourceFinder, SortKey};

use crate::cli::{CompareArgs, ListArgs, ResourceCommands, SortByArg};
use crate::commands::parse_gpu_type;
use crate::error::CliError;
use crate::output::{CompareView, GpuTypesView, OfferingListView, OutputFormat};

fn sort_key(arg: SortByArg) -> SortKey {
    match arg {
        SortByArg::Cost => SortKey::Cost,
        SortByArg::Availability => SortKey::Availability,
        SortByArg::Provider => SortKey::Provider,
        SortByArg::GpuType => SortKey::GpuType,
    }
}

/// Executes `resources` subcommands.
#[derive(Debug)]
pub struct ResourcesCommand<'a> {
    client: &'a DefaultClient,
}

impl<'a> ResourcesCommand<'a> {
    /// Command over the given client.
    #[must_use]
    pub fn new(client: &'a DefaultClient) -> Self {
        Self { client }
    }

    /// Run one `resources` subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error when arguments are invalid or the discovery call
    /// fails on both transport paths.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &ResourceCommands,
    ) -> Result<(), CliError> {
        match command {
            ResourceCommands::List(args) => self.list(writer, format, args).await,
            ResourceCommands::Compare(args) => self.compare(writer, format, args).await,
            ResourceCommands::GpuTypes => self.gpu_types(writer, format).await,
        }
    }

    async fn list<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &ListArgs,
    ) -> Result<(), CliError> {
        let criteria = FindCriteria {
            gpu_type: args.gpu_type.as_deref().map(parse_gpu_type).transpose()?,
            provider: args.provider.clone(),
            region: args.region.clone(),
            min_available: args.min_count,
            min_cost: args.min_cost,
            max_cost: args.max_cost,
            include_free: args.include_free,
            sort_by: sort_key(args.sort_by),
            descending: args.desc,
        };

        let found = ResourceFinder::new(self.client).find(&criteria).await?;
        let origin = found.origin;
        let mut offerings = found.into_inner();
        offerings.truncate(args.limit);

        format.write(writer, &OfferingListView::new(offerings, origin))
    }

    async fn compare<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &CompareArgs,
    ) -> Result<(), CliError> {
        let gpu_types = args
            .gpu_types
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_gpu_type)
            .collect::<Result<Vec<_>, _>>()?;
        if gpu_types.is_empty() {
            return Err(CliError::InvalidArgument(
                "--gpu-types needs at least one type".into(),
            ));
        }

        let template = FindCriteria {
            provider: args.provider.clone(),
            region: args.region.clone(),
            min_available: args.min_count,
            max_cost: args.max_cost,
            ..FindCriteria::default()
        };
        let quotes = ResourceFinder::new(self.client)
            .compare(&gpu_types, &template)
            .await?;

        format.write(writer, &CompareView { quotes })
    }

    async fn gpu_types<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let types = self.client.list_gpu_types().await?;
        format.write(
            writer,
            &GpuTypesView {
                gpu_types: types.into_inner(),
            },
        )
    }
}
