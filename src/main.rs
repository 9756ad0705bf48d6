mod app;
mod availability;
mod cli;
mod completions;
mod config;
mod db;
mod doctor;
mod domain;
mod identity;
mod image_store;
mod link_id;
mod links;
#[cfg(test)]
mod main_tests;
mod profiles;
mod registry;
mod resolve;
#[cfg(test)]
mod test_support;
mod ui;

use serde::Serialize;

use crate::availability::Availability;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn log_filter_directive(verbose: bool) -> &'static str {
    if verbose {
        "linkpage=debug"
    } else {
        "warn"
    }
}

/// Logs go to stderr so stdout stays clean for `--json`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("LINKPAGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(log_filter_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct AvailabilityReport<'a> {
    handle: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

fn availability_report<'a>(
    candidate: &'a str,
    availability: &'a Availability,
) -> AvailabilityReport<'a> {
    AvailabilityReport {
        handle: candidate,
        status: availability.as_str(),
        reason: match availability {
            Availability::Invalid(reason) => Some(reason.as_str()),
            _ => None,
        },
    }
}

fn owner_hint(identity: &cli::IdentityArgs) -> Option<String> {
    identity
        .owner
        .as_deref()
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

#[allow(clippy::too_many_lines)]
fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::{AvatarSubcommands, Commands, LinkSubcommands};
    use links::{LinkPatch, NewLink};
    use profiles::{AttributePatch, NewProfileAttributes, RenameOutcome};
    use serde_json::json;

    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let config = config::Config::load(cli.config.as_deref())?;
    let app = app::App::open(&cli.db, config)?;
    let gateway = cli.identity.gateway();

    match cli.command {
        Commands::Login(args) => {
            let signed_in = app.sign_in(&gateway)?;
            if args.json {
                print_json(&signed_in);
            } else {
                println!("signed in as {}", signed_in.owner_id);
                match &signed_in.profile {
                    Some(profile) => ui::print_profile(profile),
                    None => println!("no handle claimed yet; run `linkpage claim <handle>`"),
                }
            }
        }
        Commands::Logout => {
            app.sign_out(&gateway)?;
            println!("signed out");
        }
        Commands::Claim(args) => {
            let session = app.session(&gateway)?;
            let profile = app.profiles().create_profile(
                &session,
                &args.handle,
                &NewProfileAttributes {
                    display_name: args.display_name,
                    avatar_url: args.avatar_url,
                    bio: args.bio,
                },
            )?;
            if args.json {
                print_json(&profile);
            } else {
                println!("claimed @{}", profile.handle);
                ui::print_profile(&profile);
            }
        }
        Commands::Rename(args) => {
            let session = app.session(&gateway)?;
            let outcome = app.profiles().rename_handle(&session, &args.handle)?;
            if args.json {
                print_json(&outcome);
            } else {
                match outcome {
                    RenameOutcome::Renamed { from, to } => println!("renamed @{from} -> @{to}"),
                    RenameOutcome::Unchanged { handle } => println!("already @{handle}"),
                }
            }
        }
        Commands::Edit(args) => {
            let session = app.session(&gateway)?;
            let update = app.profiles().update_attributes(
                &session,
                &AttributePatch {
                    display_name: args.display_name,
                    bio: args.bio,
                    avatar_url: args.avatar_url,
                },
            )?;
            if args.json {
                print_json(&update);
            } else if update.changed.is_empty() {
                println!("nothing changed");
            } else {
                println!("updated {}", update.changed.join(", "));
            }
        }
        Commands::Avatar(args) => {
            let session = app.session(&gateway)?;
            let (update, json_output) = match args.command {
                AvatarSubcommands::Reset(args) => {
                    (app.profiles().reset_avatar(&session)?, args.json)
                }
                AvatarSubcommands::Upload(args) => {
                    let bytes = std::fs::read(&args.file)?;
                    let store = image_store::DirectoryImageStore::new(&app.config().media_dir);
                    (
                        app.profiles().upload_avatar(&session, &store, &bytes)?,
                        args.json,
                    )
                }
            };
            if json_output {
                print_json(&update);
            } else {
                let avatar = update.profile.avatar_url.as_deref().unwrap_or("(placeholder)");
                println!("avatar: {avatar}");
            }
        }
        Commands::Check(args) => {
            let current_owner_id = owner_hint(&cli.identity);
            if args.follow {
                let settings = availability::FollowSettings {
                    db_path: cli.db.clone(),
                    busy_timeout: app.config().busy_timeout,
                    debounce: app.config().debounce,
                    current_owner_id,
                };
                let input = std::io::BufReader::new(std::io::stdin());
                availability::follow(settings, input, |candidate, availability| {
                    if args.json {
                        let report = availability_report(candidate, availability);
                        println!(
                            "{}",
                            serde_json::to_string(&report)
                                .expect("json serialization should work")
                        );
                    } else {
                        ui::print_availability(candidate, availability);
                    }
                })?;
            } else {
                let candidate = args.handle.unwrap_or_default();
                let availability = app
                    .availability()
                    .check(&candidate, current_owner_id.as_deref())?;
                if args.json {
                    print_json(&availability_report(&candidate, &availability));
                } else {
                    ui::print_availability(candidate.trim(), &availability);
                }
            }
        }
        Commands::Link(args) => {
            let session = app.session(&gateway)?;
            let links = app.links();
            match args.command {
                LinkSubcommands::Add(args) => {
                    let link = links.add(
                        &session,
                        &NewLink {
                            icon: args.icon,
                            title: args.title,
                            url: args.url,
                        },
                    )?;
                    if args.json {
                        print_json(&link);
                    } else {
                        println!("added {} at position {}", link.id, link.order);
                    }
                }
                LinkSubcommands::Edit(args) => {
                    let link = links.edit(
                        &session,
                        &args.id,
                        &LinkPatch {
                            icon: args.icon,
                            title: args.title,
                            url: args.url,
                        },
                    )?;
                    if args.json {
                        print_json(&link);
                    } else {
                        println!("updated {}", link.id);
                    }
                }
                LinkSubcommands::Rm(args) => {
                    let remaining = links.delete(&session, &args.id)?;
                    if args.json {
                        print_json(&remaining);
                    } else {
                        println!("deleted {}; {} link(s) left", args.id, remaining.len());
                    }
                }
                LinkSubcommands::Ls(args) => {
                    let listed = links.list_with_clicks(&session)?;
                    if args.json {
                        print_json(&listed);
                    } else {
                        ui::print_owner_links(&listed);
                    }
                }
                LinkSubcommands::Order(args) => {
                    let ordered = links.reorder(&session, &args.ids)?;
                    if args.json {
                        print_json(&ordered);
                    } else {
                        println!("reordered {} link(s)", ordered.len());
                    }
                }
            }
        }
        Commands::Show(args) => match app.resolver().resolve_public(&args.handle)? {
            Some(view) if args.json => print_json(&view),
            Some(view) => ui::print_public_view(&view),
            None if args.json => print_json(&json!({
                "status": "not_found",
                "handle": args.handle.trim(),
            })),
            None => ui::print_not_found(&args.handle),
        },
        Commands::Click(args) => {
            let clicks = app.record_click(&args.handle, &args.link_id)?;
            if args.json {
                print_json(&json!({
                    "handle": args.handle.trim().to_ascii_lowercase(),
                    "link_id": args.link_id,
                    "clicks": clicks,
                }));
            } else {
                println!("{} clicks: {}", args.link_id, clicks);
            }
        }
        Commands::Doctor(args) => {
            let report = doctor::run_doctor(app.connection(), args.fix)?;
            if args.json {
                print_json(&report);
            } else {
                ui::print_doctor_report(&report);
            }
            if report.failure_count() > 0 {
                return Err(app::AppError::Conflict(format!(
                    "doctor found {} failing check(s)",
                    report.failure_count()
                )));
            }
        }
        Commands::Completions(_) => unreachable!("completions return before the store opens"),
    }

    Ok(())
}
