//! Job administration commands

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;

use saucejs_runner::{is_valid_job_id, ReqwestTransport, SauceApi};

use crate::config::{self, AccountArgs};
use crate::output::print_success;

#[derive(Subcommand, Debug, Clone)]
pub enum JobsCommands {
    /// Stop a running job
    Stop {
        /// Remote job ID
        id: String,
    },

    /// Delete a job
    Delete {
        /// Remote job ID
        id: String,
    },

    /// Overwrite a job's recorded pass/fail status
    SetPassed {
        /// Remote job ID
        id: String,

        /// Recorded status
        #[arg(action = clap::ArgAction::Set)]
        passed: bool,
    },
}

impl JobsCommands {
    fn id(&self) -> &str {
        match self {
            JobsCommands::Stop { id } | JobsCommands::Delete { id } | JobsCommands::SetPassed { id, .. } => id,
        }
    }
}

pub async fn execute(cmd: JobsCommands, account: &AccountArgs) -> Result<()> {
    if !is_valid_job_id(cmd.id()) {
        bail!("{:?} is not a Sauce Labs job id (32 lowercase alphanumerics)", cmd.id());
    }

    let config = config::resolve_account(account)?;
    let api = SauceApi::new(
        Arc::new(ReqwestTransport::new()?),
        config.credentials.clone(),
        config.api_base.as_str(),
    );

    match cmd {
        JobsCommands::Stop { id } => {
            api.stop_job(&id).await?;
            print_success(&format!("Stopped job {}", id));
        }
        JobsCommands::Delete { id } => {
            api.delete_job(&id).await?;
            print_success(&format!("Deleted job {}", id));
        }
        JobsCommands::SetPassed { id, passed } => {
            api.set_job_passed(&id, passed).await?;
            print_success(&format!("Job {} recorded as passed={}", id, passed));
        }
    }

    Ok(())
}
