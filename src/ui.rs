use std::io::{self, IsTerminal};

use crate::availability::Availability;
use crate::doctor::{DoctorReport, DoctorStatus};
use crate::domain::icon::LinkIcon;
use crate::links::LinkStats;
use crate::profiles::Profile;
use crate::resolve::PublicView;

pub fn print_public_view(view: &PublicView) {
    print!("{}", render_public_view(view, &Palette::auto()));
}

pub fn print_not_found(raw_handle: &str) {
    print!("{}", render_not_found(raw_handle, &Palette::auto()));
}

pub fn print_profile(profile: &Profile) {
    print!("{}", render_profile(profile, &Palette::auto()));
}

pub fn print_owner_links(links: &[LinkStats]) {
    print!("{}", render_owner_links(links, &Palette::auto()));
}

pub fn print_availability(candidate: &str, availability: &Availability) {
    println!("{}", render_availability(candidate, availability, &Palette::auto()));
}

pub fn print_doctor_report(report: &DoctorReport) {
    print!("{}", render_doctor_report(report, &Palette::auto()));
}

fn render_public_view(view: &PublicView, palette: &Palette) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        palette.heading(&view.display_name),
        palette.handle(&format!("@{}", view.handle))
    ));
    if let Some(bio) = view.bio.as_deref() {
        out.push_str(&format!("{bio}\n"));
    }
    out.push_str(&format!("{}\n", palette.dim(&format!("avatar: {}", view.avatar_url))));
    if view.links.is_empty() {
        out.push_str(&format!("{}\n", palette.dim("no links yet")));
        return out;
    }
    for link in &view.links {
        out.push_str(&format!(
            "  {} {} {}\n",
            icon_label(&link.icon),
            link.title,
            palette.dim(&link.display_url)
        ));
    }
    out
}

fn render_not_found(raw_handle: &str, palette: &Palette) -> String {
    format!(
        "{}\n{}\n",
        palette.heading("Page not found"),
        palette.dim(&format!(
            "nobody has claimed @{} (or it moved)",
            raw_handle.trim()
        ))
    )
}

fn render_profile(profile: &Profile, palette: &Palette) -> String {
    let mut out = format!(
        "{} {}\n",
        palette.heading(&profile.display_name),
        palette.handle(&format!("@{}", profile.handle))
    );
    if !profile.bio.is_empty() {
        out.push_str(&format!("{}\n", profile.bio));
    }
    let avatar = profile.avatar_url.as_deref().unwrap_or("(placeholder)");
    out.push_str(&format!("{}\n", palette.dim(&format!("avatar: {avatar}"))));
    out.push_str(&format!(
        "{}\n",
        palette.dim(&format!("updated {}", profile.updated_at))
    ));
    out
}

fn render_owner_links(links: &[LinkStats], palette: &Palette) -> String {
    let mut out = format!("{}\n", palette.heading("Links"));
    if links.is_empty() {
        out.push_str(&format!("{}\n", palette.dim("no links yet")));
        return out;
    }
    for stats in links {
        let link = &stats.link;
        out.push_str(&format!(
            "{:>3}. {} {} {} {}\n",
            link.order,
            palette.id(&link.id),
            icon_label(&link.icon),
            link.title,
            palette.dim(&format!("{} ({} clicks)", link.url, stats.clicks))
        ));
    }
    out.push_str(&format!("{}\n", palette.dim(&format!("{} link(s)", links.len()))));
    out
}

fn render_availability(candidate: &str, availability: &Availability, palette: &Palette) -> String {
    let label = palette.status(availability.is_acceptable(), availability.as_str());
    match availability {
        Availability::Invalid(reason) => format!("{candidate} {label} {}", palette.dim(reason)),
        _ => format!("{candidate} {label}"),
    }
}

fn render_doctor_report(report: &DoctorReport, palette: &Palette) -> String {
    let mut out = String::new();
    for check in &report.checks {
        let status = match check.status {
            DoctorStatus::Pass => palette.status(true, check.status.as_str()),
            DoctorStatus::Warn => palette.paint("33", &format!("[{}]", check.status.as_str())),
            DoctorStatus::Fail => palette.status(false, check.status.as_str()),
        };
        out.push_str(&format!("{} {} {}\n", check.name, status, check.detail));
        for finding in &check.findings {
            out.push_str(&format!("  {}\n", palette.dim(finding)));
        }
    }
    out
}

fn icon_label(icon: &LinkIcon) -> String {
    match icon {
        LinkIcon::Symbolic(symbol) => format!("[{}]", symbol.as_str()),
        LinkIcon::Unrecognized(raw) => format!("[{}]", raw),
        other => other.as_stored().to_string(),
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn handle(&self, text: &str) -> String {
        self.paint("35", text)
    }

    fn status(&self, ok: bool, label: &str) -> String {
        let code = if ok { "32" } else { "31" };
        self.paint(code, &format!("[{label}]"))
    }
}

#[cfg(test)]
mod tests {
    use super::{render_availability, render_not_found, render_public_view, Palette};
    use crate::availability::Availability;
    use crate::domain::handle::Handle;
    use crate::domain::icon::{LinkIcon, SymbolicIcon};
    use crate::resolve::{PublicLink, PublicView};

    fn plain() -> Palette {
        Palette { enabled: false }
    }

    #[test]
    fn public_view_lists_links_with_short_urls() {
        let view = PublicView {
            handle: Handle::parse("alice").expect("valid handle"),
            display_name: "Ann".to_string(),
            avatar_url: "https://a.example/a.png".to_string(),
            bio: Some("Builder".to_string()),
            description: "Ann - Builder".to_string(),
            links: vec![PublicLink {
                id: "lnk-1".to_string(),
                icon: LinkIcon::Symbolic(SymbolicIcon::Spotify),
                icon_kind: "symbolic",
                title: "Playlist".to_string(),
                url: "https://open.spotify.com/x".to_string(),
                display_url: "open.spotify.com/x".to_string(),
            }],
        };

        let rendered = render_public_view(&view, &plain());
        assert_eq!(
            rendered,
            "Ann @alice\nBuilder\navatar: https://a.example/a.png\n  [spotify] Playlist open.spotify.com/x\n"
        );
    }

    #[test]
    fn not_found_and_availability_render_plainly() {
        assert_eq!(
            render_not_found(" ghost ", &plain()),
            "Page not found\nnobody has claimed @ghost (or it moved)\n"
        );
        assert_eq!(
            render_availability("alice", &Availability::Taken, &plain()),
            "alice [taken]"
        );
    }

    #[test]
    fn palette_wraps_text_in_ansi_codes_when_enabled() {
        let palette = Palette { enabled: true };
        assert_eq!(palette.dim("x"), "\x1b[2mx\x1b[0m");
    }
}
