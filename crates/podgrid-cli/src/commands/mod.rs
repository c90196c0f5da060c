//! Command implementations, one module per command group.

mod pods;
mod registry;
mod resources;

pub use pods::PodsCommand;
pub use registry::RegistryCommand;
pub use resources::ResourcesCommand;

use std::collections::BTreeMap;

use podgrid_proto::GpuType;

use crate::error::CliError;

/// Parse a canonical GPU type argument.
pub(crate) fn parse_gpu_type(raw: &str) -> Result<GpuType, CliError> {
    raw.parse().map_err(|_| {
        CliError::InvalidArgument(format!(
            "unrecognized gpu type '{raw}' (expected one of: {})",
            GpuType::ALL
                .iter()
                .map(|g| g.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Parse repeated `KEY=value` environment arguments.
pub(crate) fn parse_env_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut env = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CliError::InvalidArgument(format!(
                "environment variable '{pair}' is not KEY=value"
            )));
        };
        if key.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "environment variable '{pair}' has an empty key"
            )));
        }
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
