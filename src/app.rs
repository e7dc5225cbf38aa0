use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{CliCommand, parse_cli_args, usage_text, version_text};
use crate::config::{self, Settings};
use crate::database::{Database, MacSearch, queries};
use crate::inventory::{Inventory, JsonInventory};
use crate::jobs::{RunContext, run_mac_on_ports, run_unused_ports};
use crate::models::Principal;
use crate::network::{HostnameResolver, SystemResolver};
use crate::report::{render_mac_on_ports, render_unused_ports};
use crate::snmp::{Snmp2Transport, SnmpTransport};

/// Sink for command output lines
pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Everything a command needs from its environment
#[derive(Clone)]
pub struct AppContext {
    pub db_path: PathBuf,
    pub inventory_path: PathBuf,
    pub settings: Settings,
    pub principal: Principal,
    transport: Option<Arc<dyn SnmpTransport>>,
    resolver: Option<Arc<dyn HostnameResolver>>,
    inventory: Option<Arc<dyn Inventory>>,
    output: OutputHook,
}

impl AppContext {
    pub fn from_env() -> Self {
        Self {
            db_path: config::db_path().unwrap_or_else(Database::default_path),
            inventory_path: config::inventory_path(),
            settings: Settings::from_env(),
            principal: Principal::from_env(),
            transport: None,
            resolver: None,
            inventory: None,
            output: Arc::new(|line| println!("{}", line)),
        }
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = path;
        self
    }

    pub fn with_inventory_path(mut self, path: PathBuf) -> Self {
        self.inventory_path = path;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Use this transport instead of SNMP over UDP
    pub fn with_transport(mut self, transport: Arc<dyn SnmpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use this resolver instead of the system resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn HostnameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use this inventory instead of loading `inventory_path`
    pub fn with_inventory(mut self, inventory: Arc<dyn Inventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_output_hook(mut self, output: OutputHook) -> Self {
        self.output = output;
        self
    }

    fn emit(&self, text: &str) {
        (self.output)(text);
    }

    fn open_db(&self) -> Result<Database> {
        Database::new(self.db_path.clone())
    }

    fn run_context(&self) -> Result<RunContext> {
        let inventory = match &self.inventory {
            Some(inventory) => Arc::clone(inventory),
            None => Arc::new(JsonInventory::load(&self.inventory_path)?) as Arc<dyn Inventory>,
        };
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| Arc::new(Snmp2Transport::new(self.settings.snmp_port)) as Arc<dyn SnmpTransport>);
        let resolver = self
            .resolver
            .clone()
            .unwrap_or_else(|| Arc::new(SystemResolver) as Arc<dyn HostnameResolver>);

        Ok(RunContext::new(
            self.settings.clone(),
            inventory,
            transport,
            resolver,
            self.open_db()?,
        ))
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parsed = parse_cli_args(args)?;
    let mut context = AppContext::from_env();
    if let Some(path) = parsed.db_path {
        context = context.with_db_path(path);
    }
    if let Some(path) = parsed.inventory_path {
        context = context.with_inventory_path(path);
    }
    execute_command_with_context(parsed.command, &context).await
}

/// Execute a pre-parsed command against an explicit context.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit(&version_text());
            Ok(())
        }
        CliCommand::UnusedPorts { site } => {
            let ctx = context.run_context()?;
            if let Some(report) = run_unused_ports(&ctx, &context.principal, site.as_deref()).await? {
                context.emit(&report.to_string());
            }
            Ok(())
        }
        CliCommand::MacOnPorts { site } => {
            let ctx = context.run_context()?;
            if let Some(report) = run_mac_on_ports(&ctx, &context.principal, site.as_deref()).await? {
                context.emit(&report.to_string());
            }
            Ok(())
        }
        CliCommand::Search {
            query,
            site,
            device,
            vlan,
        } => {
            let search = MacSearch {
                query,
                site,
                device,
                vid: vlan,
            };
            let db = context.open_db()?;
            let records = {
                let conn = db.lock()?;
                queries::search_mac_on_ports(&conn, &search).context("MAC search failed")?
            };
            context.emit(&render_mac_on_ports(&records));
            Ok(())
        }
        CliCommand::Unused { device } => {
            let db = context.open_db()?;
            let ports = {
                let conn = db.lock()?;
                queries::unused_ports_for_device(&conn, &device)
                    .with_context(|| format!("Failed to list unused ports of {}", device))?
            };
            context.emit(&render_unused_ports(&device, &ports));
            Ok(())
        }
    }
}
