//! `safetrack`: command-line front end for the SafeTrack backend.
//!
//! Signs in once and keeps the session in a JSON file between runs
//! (`SAFETRACK_SESSION_FILE`, default `./.safetrack/session.json`), then
//! offers the incident and workplace actions the signed-in role allows:
//!
//! - **`login`**, **`logout`**, **`whoami`**: manage the session.
//! - **`incidents`**: list, show, report, set-status, delete, summary.
//! - **`workplaces`**: list, add.
//!
//! Actions the role does not allow are refused before any request is sent.
//! Pass `--json` to print records as JSON instead of text.

use std::fmt;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use safetrack_api::{Incident, IncidentStatus, IncidentSummary, RiskLevel, Workplace};
use safetrack_client::{
    route_access, scope_incidents, Access, AuthSession, Capability, ClientConfig, Deleted,
    FileStore, RefreshOutcome, Services, TransportClient,
};
use serde::Serialize;

/// safetrack: workplace incident reporting
///
/// Report hazards and triage incidents from the command line.
#[derive(Parser)]
#[command(name = "safetrack", version, about, long_about = None)]
struct Cli {
    /// Print records as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(short = 'e', long, value_name = "EMAIL")]
        email: String,

        /// Prompting is not supported; pass it here or via the environment.
        #[arg(short = 'p', long, env = "SAFETRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Re-fetch your profile and show what your role may do.
    Whoami,

    /// Work with incident reports.
    #[command(subcommand)]
    Incidents(IncidentCommand),

    /// Work with workplaces.
    #[command(subcommand)]
    Workplaces(WorkplaceCommand),
}

#[derive(Subcommand)]
enum IncidentCommand {
    /// List the incidents you may see (all of them for a foreman).
    List {
        /// Only incidents at this workplace, newest first (foreman only).
        #[arg(short = 'w', long, value_name = "ID")]
        workplace: Option<String>,
    },

    /// Show one incident.
    Show { id: String },

    /// Report a new incident at your workplace.
    ///
    /// Example:
    ///   safetrack incidents report -t "Spill" -d "Oil by press 3" -r medium
    Report {
        #[arg(short = 't', long, value_name = "TEXT")]
        title: String,

        #[arg(short = 'd', long, value_name = "TEXT")]
        description: String,

        /// low | medium | high
        #[arg(short = 'r', long = "risk", value_name = "LEVEL", default_value = "low")]
        risk_level: RiskLevel,

        /// Path of an already uploaded photo.
        #[arg(long, value_name = "PATH")]
        photo: Option<String>,
    },

    /// Move an incident to a new status (foreman only).
    ///
    /// STATUS is one of: open | in-progress | resolved | closed
    SetStatus { id: String, status: IncidentStatus },

    /// Delete an incident (foreman only).
    Delete { id: String },

    /// Open/resolved counters over the incidents you may see.
    Summary,
}

#[derive(Subcommand)]
enum WorkplaceCommand {
    List,

    /// Add a workplace (foreman only).
    Add {
        #[arg(short = 'n', long, value_name = "TEXT")]
        name: String,

        #[arg(short = 'l', long, value_name = "TEXT")]
        location: String,
    },
}

/// Everything a command needs.
struct App {
    session: AuthSession,
    services: Services,
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safetrack_client=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    tracing::debug!(api_base = %config.api_base, session_file = %config.session_file.display(), "configured");

    let transport = TransportClient::new(&config).unwrap_or_else(|e| fatal(e));
    let store = Arc::new(FileStore::new(&config.session_file));
    let app = App {
        session: AuthSession::restore(transport.clone(), store),
        services: Services::new(&transport),
        json: cli.json,
    };

    match cli.command {
        Command::Login { email, password } => {
            let me = app
                .session
                .login(&email, &password)
                .await
                .unwrap_or_else(|e| fatal(format!("sign-in failed: {e}")));
            println!("signed in as {} ({})", me.name, me.role);
        }

        Command::Logout => {
            app.session.logout();
            println!("signed out");
        }

        Command::Whoami => app.whoami().await,
        Command::Incidents(cmd) => app.incidents(cmd).await,
        Command::Workplaces(cmd) => app.workplaces(cmd).await,
    }
}

impl App {
    async fn whoami(&self) {
        self.require(Capability::ViewProfile);
        let me = match self.session.refresh_user().await.unwrap_or_else(|e| fatal(e)) {
            RefreshOutcome::Refreshed(me) => me,
            RefreshOutcome::SignedOut => fatal("session expired; run `safetrack login`"),
            RefreshOutcome::NotAuthenticated => fatal("not signed in; run `safetrack login`"),
            RefreshOutcome::Superseded => fatal("session changed while refreshing; try again"),
        };
        let capabilities: Vec<&str> = self
            .session
            .capabilities()
            .granted()
            .into_iter()
            .map(Capability::name)
            .collect();

        if self.json {
            #[derive(Serialize)]
            struct Whoami<'a> {
                id: &'a str,
                name: &'a str,
                email: &'a str,
                role: String,
                workplace: &'a str,
                capabilities: &'a [&'a str],
            }
            self.print_json(&Whoami {
                id: &me.id,
                name: &me.name,
                email: &me.email,
                role: me.role.to_string(),
                workplace: me.workplace.id(),
                capabilities: &capabilities,
            });
        } else {
            println!("{} <{}>", me.name, me.email);
            println!("role:       {}", me.role);
            println!("workplace:  {}", me.workplace.id());
            println!("may:        {}", capabilities.join(", "));
        }
    }

    async fn incidents(&self, cmd: IncidentCommand) {
        let incidents = &self.services.incidents;
        match cmd {
            IncidentCommand::List { workplace } => {
                let list = match workplace {
                    Some(id) => {
                        self.require(Capability::ViewAllIncidents);
                        incidents.get_by_workplace(&id).await
                    }
                    None => {
                        self.require(Capability::ViewOwnIncidents);
                        incidents.get_all().await
                    }
                }
                .unwrap_or_else(|e| fatal(e));
                let visible = scope_incidents(self.session.identity().as_ref(), list);
                if self.json {
                    self.print_json(&visible);
                } else if visible.is_empty() {
                    println!("no incidents");
                } else {
                    visible.iter().for_each(print_incident_line);
                }
            }

            IncidentCommand::Show { id } => {
                self.require(Capability::ViewOwnIncidents);
                let incident = incidents.get_by_id(&id).await.unwrap_or_else(|e| fatal(e));
                if scope_incidents(self.session.identity().as_ref(), vec![incident.clone()])
                    .is_empty()
                {
                    fatal(format!("incident {id} was reported by someone else"));
                }
                if self.json {
                    self.print_json(&incident);
                } else {
                    print_incident(&incident);
                }
            }

            IncidentCommand::Report {
                title,
                description,
                risk_level,
                photo,
            } => {
                self.require(Capability::CreateIncident);
                let Some(me) = self.session.identity() else {
                    fatal("not signed in; run `safetrack login`");
                };
                let mut report =
                    Incident::new(title, description, risk_level, me.id.as_str(), me.workplace.id());
                report.photo_path = photo;
                let created = incidents.create(&report).await.unwrap_or_else(|e| fatal(e));
                if self.json {
                    self.print_json(&created);
                } else {
                    println!("reported {}", created.id);
                }
            }

            IncidentCommand::SetStatus { id, status } => {
                self.require(Capability::UpdateIncidentStatus);
                // Updates replace the whole record, so start from the stored one.
                let mut incident = incidents.get_by_id(&id).await.unwrap_or_else(|e| fatal(e));
                incident.status = status;
                let updated = incidents
                    .update(&id, &incident)
                    .await
                    .unwrap_or_else(|e| fatal(e));
                if self.json {
                    self.print_json(&updated);
                } else {
                    println!("{} is now {}", updated.id, updated.status);
                }
            }

            IncidentCommand::Delete { id } => {
                self.require(Capability::DeleteIncidents);
                match incidents.delete(&id).await.unwrap_or_else(|e| fatal(e)) {
                    Deleted::Record(removed) => println!("deleted {} ({})", removed.id, removed.title),
                    Deleted::Acknowledged(_) => println!("deleted {id}"),
                }
            }

            IncidentCommand::Summary => {
                self.require(Capability::ViewDashboard);
                let list = incidents.get_all().await.unwrap_or_else(|e| fatal(e));
                let visible = scope_incidents(self.session.identity().as_ref(), list);
                let summary = IncidentSummary::from_incidents(&visible);
                if self.json {
                    self.print_json(&summary);
                } else {
                    println!("open:     {}", summary.open);
                    println!("resolved: {}", summary.resolved);
                    println!("total:    {}", summary.total);
                }
            }
        }
    }

    async fn workplaces(&self, cmd: WorkplaceCommand) {
        let workplaces = &self.services.workplaces;
        match cmd {
            WorkplaceCommand::List => {
                self.require_signed_in();
                let list = workplaces.get_all().await.unwrap_or_else(|e| fatal(e));
                if self.json {
                    self.print_json(&list);
                } else {
                    for w in &list {
                        println!("{}  {}  ({})", w.id, w.name, w.location);
                    }
                }
            }

            WorkplaceCommand::Add { name, location } => {
                self.require(Capability::ManageWorkplaces);
                let created = workplaces
                    .create(&Workplace::new(name, location))
                    .await
                    .unwrap_or_else(|e| fatal(e));
                if self.json {
                    self.print_json(&created);
                } else {
                    println!("added {}", created.id);
                }
            }
        }
    }

    /// Exit unless the current identity holds `capability`.
    fn require(&self, capability: Capability) {
        self.require_signed_in();
        if !self.session.capabilities().allows(capability) {
            let role = self
                .session
                .identity()
                .map(|me| me.role.to_string())
                .unwrap_or_default();
            fatal(format!("a {role} may not {}", capability.name().replace('-', " ")));
        }
    }

    fn require_signed_in(&self) {
        if route_access(self.session.identity().as_ref(), None) == Access::LoginRequired {
            fatal("not signed in; run `safetrack login`");
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|e| fatal(e));
        println!("{text}");
    }
}

fn print_incident_line(incident: &Incident) {
    println!(
        "{}  {:<11}  {:<6}  {}",
        incident.id,
        incident.status.as_str(),
        incident.risk_level.to_string(),
        incident.title
    );
}

fn print_incident(incident: &Incident) {
    println!("{}", incident.title);
    println!("id:          {}", incident.id);
    println!("status:      {}", incident.status);
    println!("risk:        {}", incident.risk_level);
    match incident.reported_by.record() {
        Some(user) => println!("reported by: {} <{}>", user.name, user.email),
        None => println!("reported by: {}", incident.reported_by.id()),
    }
    match incident.workplace.record() {
        Some(site) => println!("workplace:   {} ({})", site.name, site.location),
        None => println!("workplace:   {}", incident.workplace.id()),
    }
    if let Some(at) = incident.created_at {
        println!("reported at: {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(photo) = &incident.photo_path {
        println!("photo:       {photo}");
    }
    println!();
    println!("{}", incident.description);
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: impl fmt::Display) -> ! {
    eprintln!("safetrack: {msg}");
    process::exit(2);
}
