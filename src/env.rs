use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Load `.env` values before clap parses arguments, so env-backed flags see
/// them. `--env-file` is extracted by hand here for the same reason.
pub fn bootstrap_from_args(args: &[OsString]) -> Result<()> {
    let explicit = extract_env_file_arg(args)
        .or_else(|| std::env::var("CAIRN_ENV_FILE").ok().map(PathBuf::from));
    load_env(explicit.as_deref())
}

pub fn load_env(explicit_env_file: Option<&Path>) -> Result<()> {
    let env_file = match explicit_env_file {
        Some(path) => path.to_path_buf(),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            let default = cwd.join(".env");
            if !default.exists() {
                return Ok(());
            }
            default
        }
    };

    let parsed = dotenvy::from_path_iter(&env_file)
        .with_context(|| format!("failed to read env file {}", env_file.display()))?;
    for item in parsed {
        let (key, value) =
            item.with_context(|| format!("failed to parse env file {}", env_file.display()))?;
        // Real environment always wins over file values.
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

fn extract_env_file_arg(args: &[OsString]) -> Option<PathBuf> {
    let mut explicit = None;
    let mut idx = 1usize;
    while idx < args.len() {
        let Some(arg) = args[idx].to_str() else {
            idx += 1;
            continue;
        };

        if arg == "--" {
            break;
        }

        if arg == "--env-file" {
            if let Some(next) = args.get(idx + 1) {
                explicit = Some(PathBuf::from(next));
            }
            idx += 2;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--env-file=") {
            explicit = Some(PathBuf::from(value));
        }

        idx += 1;
    }
    explicit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_env_file_flag() {
        let args: Vec<OsString> = ["cairn", "filter", "--env-file", "creds.env"]
            .iter()
            .map(OsString::from)
            .collect();
        assert_eq!(
            extract_env_file_arg(&args),
            Some(PathBuf::from("creds.env"))
        );
    }

    #[test]
    fn extracts_equals_form_and_stops_at_separator() {
        let args: Vec<OsString> = ["cairn", "--env-file=a.env", "--", "--env-file", "b.env"]
            .iter()
            .map(OsString::from)
            .collect();
        assert_eq!(extract_env_file_arg(&args), Some(PathBuf::from("a.env")));
    }
}
