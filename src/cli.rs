use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    UnusedPorts {
        site: Option<String>,
    },
    MacOnPorts {
        site: Option<String>,
    },
    Search {
        query: Option<String>,
        site: Option<String>,
        device: Option<String>,
        vlan: Option<u16>,
    },
    Unused {
        device: String,
    },
    Help,
    Version,
}

/// A parsed command line: the command plus global path overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub command: CliCommand,
    pub db_path: Option<PathBuf>,
    pub inventory_path: Option<PathBuf>,
}

impl CliArgs {
    fn bare(command: CliCommand) -> Self {
        Self {
            command,
            db_path: None,
            inventory_path: None,
        }
    }
}

pub fn version_text() -> String {
    format!("porthistory {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
Switch port history: unused ports and MACs seen on ports

Usage:
  porthistory unused-ports [--site <SLUG>]
  porthistory mac-on-ports [--site <SLUG>]
  porthistory search [<MAC>] [--site <SLUG>] [--device <NAME>] [--vlan <VID>]
  porthistory unused <DEVICE>
  porthistory --help
  porthistory --version

Options:
      --db <PATH>         Result store (default: platform data dir, env PORTHISTORY_DB)
      --inventory <PATH>  Inventory JSON document (env PORTHISTORY_INVENTORY)
  -s, --site <SLUG>       Restrict to one site
  -d, --device <NAME>     Search: restrict to one device
      --vlan <VID>        Search: restrict to one VLAN id
  -h, --help              Show this help text
  -V, --version           Show version",
        version = version_text()
    )
}

fn parse_vlan_arg(raw: &str) -> Result<u16> {
    raw.parse::<u16>()
        .ok()
        .filter(|v| (1..=4094).contains(v))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid value for --vlan: '{}'. Expected a VLAN id between 1 and 4094.\n\n{}",
                raw,
                usage_text()
            )
        })
}

/// Value of `--flag VALUE` or `--flag=VALUE`
fn flag_value<I, S>(flag: &str, inline: Option<&str>, iter: &mut I) -> Result<String>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let value = match inline {
        Some(value) => Some(value.to_string()),
        None => iter.next().map(|v| v.as_ref().to_string()),
    };
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing value for {}.\n\n{}", flag, usage_text()))
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut site: Option<String> = None;
    let mut device: Option<String> = None;
    let mut vlan: Option<u16> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut inventory_path: Option<PathBuf> = None;

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref().to_string();
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value)),
            _ => (arg.as_str(), None),
        };

        match flag {
            "-h" | "--help" => return Ok(CliArgs::bare(CliCommand::Help)),
            "-V" | "--version" => return Ok(CliArgs::bare(CliCommand::Version)),
            "-s" | "--site" => site = Some(flag_value("--site", inline, &mut iter)?),
            "-d" | "--device" => device = Some(flag_value("--device", inline, &mut iter)?),
            "--vlan" => vlan = Some(parse_vlan_arg(&flag_value("--vlan", inline, &mut iter)?)?),
            "--db" => db_path = Some(PathBuf::from(flag_value("--db", inline, &mut iter)?)),
            "--inventory" => {
                inventory_path = Some(PathBuf::from(flag_value("--inventory", inline, &mut iter)?))
            }
            "unused-ports" | "mac-on-ports" | "search" | "unused" if command.is_none() => {
                command = Some(arg.clone());
            }
            _ if flag.starts_with('-') => {
                return Err(anyhow::anyhow!("Unknown argument: {arg}\n\n{}", usage_text()));
            }
            _ if command.is_some() && positional.is_none() => positional = Some(arg.clone()),
            _ => {
                return Err(anyhow::anyhow!("Unexpected argument: {arg}\n\n{}", usage_text()));
            }
        }
    }

    let Some(name) = command else {
        return Err(anyhow::anyhow!("No command given.\n\n{}", usage_text()));
    };

    let command = match name.as_str() {
        "unused-ports" | "mac-on-ports" => {
            if positional.is_some() || device.is_some() || vlan.is_some() {
                return Err(anyhow::anyhow!(
                    "{} only accepts --site.\n\n{}",
                    name,
                    usage_text()
                ));
            }
            if name == "unused-ports" {
                CliCommand::UnusedPorts { site }
            } else {
                CliCommand::MacOnPorts { site }
            }
        }
        "search" => CliCommand::Search {
            query: positional,
            site,
            device,
            vlan,
        },
        "unused" => {
            if site.is_some() || vlan.is_some() {
                return Err(anyhow::anyhow!(
                    "--site/--vlan are not valid with unused.\n\n{}",
                    usage_text()
                ));
            }
            let device = positional.or(device).ok_or_else(|| {
                anyhow::anyhow!("unused needs a device name.\n\n{}", usage_text())
            })?;
            CliCommand::Unused { device }
        }
        other => {
            return Err(anyhow::anyhow!("Unknown command: {other}\n\n{}", usage_text()));
        }
    };

    Ok(CliArgs {
        command,
        db_path,
        inventory_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> CliCommand {
        parse_cli_args(args.iter().copied())
            .expect("args should parse")
            .command
    }

    #[test]
    fn parse_help_flag() {
        assert_eq!(command(&["porthistory", "--help"]), CliCommand::Help);
        assert_eq!(command(&["porthistory", "search", "-h"]), CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        assert_eq!(command(&["porthistory", "-V"]), CliCommand::Version);
    }

    #[test]
    fn parse_job_commands_with_site() {
        assert_eq!(
            command(&["porthistory", "unused-ports", "--site", "hq"]),
            CliCommand::UnusedPorts {
                site: Some("hq".to_string())
            }
        );
        assert_eq!(
            command(&["porthistory", "mac-on-ports", "--site=branch"]),
            CliCommand::MacOnPorts {
                site: Some("branch".to_string())
            }
        );
        assert_eq!(
            command(&["porthistory", "mac-on-ports"]),
            CliCommand::MacOnPorts { site: None }
        );
    }

    #[test]
    fn parse_search_with_filters() {
        assert_eq!(
            command(&["porthistory", "search", "00:16:3a", "--device", "sw1", "--vlan", "10"]),
            CliCommand::Search {
                query: Some("00:16:3a".to_string()),
                site: None,
                device: Some("sw1".to_string()),
                vlan: Some(10),
            }
        );
    }

    #[test]
    fn parse_unused_takes_device() {
        assert_eq!(
            command(&["porthistory", "unused", "sw1"]),
            CliCommand::Unused {
                device: "sw1".to_string()
            }
        );
        assert!(parse_cli_args(["porthistory", "unused"]).is_err());
    }

    #[test]
    fn parse_global_paths() {
        let parsed = parse_cli_args([
            "porthistory",
            "--db",
            "/tmp/ph.db",
            "unused-ports",
            "--inventory=/tmp/inv.json",
        ])
        .unwrap();
        assert_eq!(parsed.db_path, Some(PathBuf::from("/tmp/ph.db")));
        assert_eq!(parsed.inventory_path, Some(PathBuf::from("/tmp/inv.json")));
    }

    #[test]
    fn parse_rejects_bad_input() {
        let err = parse_cli_args(["porthistory", "--unknown"]).unwrap_err();
        assert!(err.to_string().contains("Unknown argument"));

        let err = parse_cli_args(["porthistory", "search", "--vlan", "5000"]).unwrap_err();
        assert!(err.to_string().contains("Invalid value for --vlan"));

        let err = parse_cli_args(["porthistory", "unused-ports", "--vlan", "10"]).unwrap_err();
        assert!(err.to_string().contains("only accepts --site"));

        let err = parse_cli_args(["porthistory"]).unwrap_err();
        assert!(err.to_string().contains("No command given"));

        let err = parse_cli_args(["porthistory", "search", "--site"]).unwrap_err();
        assert!(err.to_string().contains("Missing value for --site"));
    }
}
