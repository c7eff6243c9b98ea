//! `config` subcommands. None of these touch the network.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, config_path, store_token};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut cfg = config::load(global)?;
            if cfg.token.is_some() {
                cfg.token = Some("****".into());
            }
            let rendered = toml::to_string_pretty(&cfg)
                .map_err(|e| CliError::Internal(format!("cannot render config: {e}")))?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config_path);
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::SetToken { value } => {
            let token = match value {
                Some(value) => value,
                None => rpassword::prompt_password("Session token: ")?,
            };
            let token = token.trim();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "must not be empty".into(),
                });
            }
            store_token(token)?;
            output::print_output("Token stored in the system keyring", global.quiet);
            Ok(())
        }
    }
}
