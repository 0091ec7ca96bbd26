// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use scheduler_forms::{
    behavior::Clock,
    catalog,
    client::{CaptureAgents, HttpClient},
    settings::Settings,
    Collaborators, FormKind, Intent, Mode, Recurrence, SchedulerController, Submission,
};
use std::{path::Path, process::exit, sync::Arc};

mod preview;

#[derive(Parser, Debug)]
#[command(author, about = env!("CARGO_PKG_DESCRIPTION"), long_about = None)]
#[command(disable_version_flag = true)]
pub(crate) struct Args {
    /// Path of the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    version: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a page and print its metadata document
    Preview {
        /// Form of the page
        #[arg(value_enum)]
        form: FormVariant,
        /// TOML file with the controls of the page
        page: String,
        #[command(flatten)]
        mode: ModeArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputVariant::Xml)]
        format: OutputVariant,
    },
    /// List the fields of a form
    Fields {
        #[arg(value_enum)]
        form: FormVariant,
        #[command(flatten)]
        mode: ModeArgs,
    },
    /// List the capture agents known to the admin services
    Agents,
    /// Submit a scheduler page to the admin services
    Schedule {
        /// TOML file with the controls of the page
        page: String,
        /// Schedule a recurring recording
        #[arg(long)]
        recurring: bool,
        /// Capture agent to record with, replaces the resources of the page
        #[arg(long)]
        agent: Option<String>,
        /// Resource of the capture agent to record, can be repeated
        #[arg(long = "resource", requires = "agent")]
        resources: Vec<String>,
    },
}

#[derive(Debug, clap::Args)]
struct ModeArgs {
    /// Use the recurring variant of the scheduler form
    #[arg(long)]
    recurring: bool,
    /// Use the edit variant of the scheduler form
    #[arg(long)]
    edit: bool,
}

impl From<&ModeArgs> for Mode {
    fn from(val: &ModeArgs) -> Self {
        let recurrence = if val.recurring {
            Recurrence::Recurring
        } else {
            Recurrence::Single
        };
        let intent = if val.edit { Intent::Edit } else { Intent::Create };

        Mode::new(recurrence, intent)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormVariant {
    Scheduler,
    Upload,
}

impl FormVariant {
    fn kind(self, mode: &ModeArgs) -> FormKind {
        match self {
            FormVariant::Scheduler => FormKind::Scheduler(mode.into()),
            FormVariant::Upload => FormKind::Upload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputVariant {
    Xml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        print_version_info();
        exit(0);
    }

    env_logger::init();

    let settings = if Path::new(&args.config).exists() {
        Settings::load(&args.config)
            .with_context(|| format!("failed to load settings from {}", args.config))?
    } else {
        log::warn!("{} not found, using default settings", args.config);
        Settings::default()
    };

    match args.command {
        Some(Commands::Preview {
            form,
            page,
            mode,
            format,
        }) => {
            let mut page = preview::load_page(&page)?;
            let kind = form.kind(&mode);

            match preview::preview(&settings, kind, &mut page, format == OutputVariant::Json)? {
                Ok(document) => println!("{document}"),
                Err(failed) => {
                    for name in failed {
                        eprintln!("invalid field: {name}");
                    }
                    exit(1);
                }
            }
        }
        Some(Commands::Fields { form, mode }) => {
            let page = scheduler_forms::Page::new();
            let manager = preview::form_manager(&settings, form.kind(&mode), &page)?;

            for field in manager.registry().fields() {
                println!(
                    "{name}\t{key}{required}",
                    name = field.name(),
                    key = field.key(),
                    required = if field.is_required() { "\trequired" } else { "" }
                );
            }
        }
        Some(Commands::Agents) => {
            let client = HttpClient::new(&settings.api)?;

            for agent in client.agents().await? {
                println!("{}\t{}", agent.name, agent.state);
            }
        }
        Some(Commands::Schedule {
            page,
            recurring,
            agent,
            resources,
        }) => {
            let page = preview::load_page(&page)?;
            let client = Arc::new(HttpClient::new(&settings.api)?);
            let mode = Mode::new(
                if recurring {
                    Recurrence::Recurring
                } else {
                    Recurrence::Single
                },
                Intent::Create,
            );

            let mut controller = SchedulerController::new(
                page,
                mode,
                &settings,
                Clock::system(),
                Collaborators::http(client),
            )?;

            if let Some(agent) = agent {
                controller.select_agent(&agent).await?;
                for resource in &resources {
                    if !controller
                        .page_mut()
                        .set_checked(&catalog::resource_control(resource), true)
                    {
                        log::warn!("capture agent {agent} has no resource `{resource}`");
                    }
                }
            }

            match controller.submit().await? {
                Submission::Submitted { id, .. } => println!("scheduled event {id}"),
                Submission::Invalid(report) => {
                    for name in report.failed {
                        eprintln!("invalid field: {name}");
                    }
                    exit(1);
                }
                Submission::Conflicts(conflicts) => {
                    for conflict in conflicts {
                        eprintln!("conflicts with {} ({})", conflict.title, conflict.id);
                    }
                    exit(1);
                }
            }
        }
        None => {
            Args::command().print_help()?;
        }
    }

    Ok(())
}

const BUILD_INFO: [(&str, Option<&str>); 3] = [
    ("Build Version", option_env!("CARGO_PKG_VERSION")),
    ("Package", option_env!("CARGO_PKG_NAME")),
    ("Commit SHA", option_env!("SCHEDULER_FORMS_GIT_SHA")),
];

fn print_version_info() {
    for (label, value) in BUILD_INFO {
        println!("{label}: {value}", value = value.unwrap_or("N/A"));
    }
}
