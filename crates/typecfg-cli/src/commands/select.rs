//! Select command
//!
//! Usage: typecfg select <MODULE_ID> --rules <PATH>... [--global <FILE>]
//! [--modules <DIR>] [--user <U>] [--theme <T>] [--locale <L>]
//! [--application <A>] [--exclude-global]

use clap::Args;
use typecfg_core::config::SelectOptions;
use typecfg_core::errors::ExError;

use super::{build_service, EnvArgs, SourceArgs};

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Module id to select the configuration of
    pub module_id: String,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[command(flatten)]
    pub env: EnvArgs,

    /// Leave the global configuration out of the merge
    #[arg(long)]
    pub exclude_global: bool,
}

/// Execute select command
pub fn execute(args: SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&args.sources, args.env.environment())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let config = runtime.block_on(service.select_async(
        &args.module_id,
        SelectOptions {
            exclude_global: args.exclude_global,
        },
    ))
    .map_err(ExError::from)?;

    let rendered = match config {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => "null".to_string(),
    };
    println!("{}", rendered);

    Ok(())
}
