use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::identity::LocalIdentity;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "linkpage")]
#[command(bin_name = "linkpage")]
#[command(version)]
#[command(about = "Claim a handle and publish an ordered page of links")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "LINKPAGE_DB_PATH",
        default_value = ".linkpage/linkpage.sqlite",
        help = "Path to the SQLite database."
    )]
    pub db: String,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "LINKPAGE_CONFIG",
        help = "TOML file overriding the built-in configuration."
    )]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Log debug detail to stderr (LINKPAGE_LOG overrides)."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct IdentityArgs {
    #[arg(
        long,
        global = true,
        env = "LINKPAGE_OWNER",
        help = "Stable owner id issued by the identity provider."
    )]
    pub owner: Option<String>,

    #[arg(
        long = "name",
        global = true,
        env = "LINKPAGE_NAME",
        help = "Provider display name."
    )]
    pub display_name: Option<String>,

    #[arg(
        long = "avatar",
        global = true,
        env = "LINKPAGE_AVATAR",
        help = "Provider avatar URL."
    )]
    pub avatar_url: Option<String>,

    #[arg(long, global = true, env = "LINKPAGE_EMAIL", help = "Provider email.")]
    pub email: Option<String>,
}

impl IdentityArgs {
    pub fn gateway(&self) -> LocalIdentity {
        LocalIdentity {
            owner_id: self.owner.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Sign in and report whether a handle is claimed.")]
    Login(JsonArgs),
    #[command(about = "End the identity provider session.")]
    Logout,
    #[command(about = "Claim a handle and create the profile.")]
    Claim(ClaimArgs),
    #[command(about = "Move the profile to a new handle.")]
    Rename(RenameArgs),
    #[command(about = "Edit display name, bio or avatar.")]
    Edit(EditArgs),
    #[command(about = "Reset or upload the avatar.")]
    Avatar(AvatarArgs),
    #[command(about = "Check whether a handle is free.")]
    Check(CheckArgs),
    #[command(about = "Manage the link list.")]
    Link(LinkArgs),
    #[command(about = "Render the public page for a handle.")]
    Show(ShowArgs),
    #[command(about = "Record a visit to one link on a public page.")]
    Click(ClickArgs),
    #[command(about = "Check handle, profile and link consistency.")]
    Doctor(DoctorArgs),
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Claim a handle.")]
pub struct ClaimArgs {
    #[arg(help = "Handle to claim (3-20 letters, digits or underscores).")]
    pub handle: String,

    #[arg(long = "display-name", help = "Display name; defaults to the provider name.")]
    pub display_name: Option<String>,

    #[arg(long, help = "Short bio.")]
    pub bio: Option<String>,

    #[arg(long = "avatar-url", help = "Avatar URL; defaults to the provider avatar.")]
    pub avatar_url: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Rename the handle.")]
pub struct RenameArgs {
    #[arg(help = "New handle.")]
    pub handle: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Edit profile attributes.")]
pub struct EditArgs {
    #[arg(long = "display-name", help = "New display name (1-40 characters).")]
    pub display_name: Option<String>,

    #[arg(long, help = "New bio; an empty value clears it.")]
    pub bio: Option<String>,

    #[arg(long = "avatar-url", help = "New avatar URL; an empty value clears it.")]
    pub avatar_url: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Avatar commands.")]
pub struct AvatarArgs {
    #[command(subcommand)]
    pub command: AvatarSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum AvatarSubcommands {
    #[command(about = "Revert to the identity provider avatar.")]
    Reset(JsonArgs),
    #[command(about = "Store an image file and use it as the avatar.")]
    Upload(AvatarUploadArgs),
}

#[derive(Debug, Args)]
pub struct AvatarUploadArgs {
    #[arg(help = "PNG, JPEG, GIF or WebP file.")]
    pub file: PathBuf,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Check handle availability.")]
pub struct CheckArgs {
    #[arg(
        help = "Candidate handle.",
        required_unless_present = "follow",
        conflicts_with = "follow"
    )]
    pub handle: Option<String>,

    #[arg(
        short = 'f',
        long,
        help = "Read candidates from stdin, one per line, and report settled results."
    )]
    pub follow: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Link commands.")]
pub struct LinkArgs {
    #[command(subcommand)]
    pub command: LinkSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum LinkSubcommands {
    #[command(about = "Append a link.")]
    Add(LinkAddArgs),
    #[command(about = "Change a link's icon, title or url.")]
    Edit(LinkEditArgs),
    #[command(about = "Delete a link.", alias = "delete")]
    Rm(LinkRmArgs),
    #[command(about = "List links with click counts.", alias = "list")]
    Ls(JsonArgs),
    #[command(about = "Apply a complete new order of link ids.")]
    Order(LinkOrderArgs),
}

#[derive(Debug, Args)]
pub struct LinkAddArgs {
    #[arg(help = "Link title.")]
    pub title: String,

    #[arg(help = "Absolute URL.")]
    pub url: String,

    #[arg(short = 'i', long, help = "Emoji or icon name (e.g. instagram).")]
    pub icon: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinkEditArgs {
    #[arg(help = "Link id.")]
    pub id: String,

    #[arg(short = 't', long, help = "New title.")]
    pub title: Option<String>,

    #[arg(short = 'u', long, help = "New URL.")]
    pub url: Option<String>,

    #[arg(short = 'i', long, help = "New emoji or icon name.")]
    pub icon: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinkRmArgs {
    #[arg(help = "Link id.")]
    pub id: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinkOrderArgs {
    #[arg(required = true, help = "Every link id, in the new order.")]
    pub ids: Vec<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Show a public page.")]
pub struct ShowArgs {
    #[arg(help = "Handle to look up.")]
    pub handle: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Record a link click.")]
pub struct ClickArgs {
    #[arg(help = "Handle of the public page.")]
    pub handle: String,

    #[arg(help = "Link id.")]
    pub link_id: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Run consistency diagnostics.")]
pub struct DoctorArgs {
    #[arg(long, help = "Release stale handles and resequence link orders.")]
    pub fix: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Generate or install shell completions.")]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}
