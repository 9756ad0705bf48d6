use super::{availability_report, log_filter_directive, owner_hint, AvailabilityReport};
use crate::availability::Availability;
use crate::cli::IdentityArgs;

#[test]
fn verbose_flag_raises_log_level_for_this_crate_only() {
    assert_eq!(log_filter_directive(false), "warn");
    assert_eq!(log_filter_directive(true), "linkpage=debug");
}

#[test]
fn availability_report_carries_reason_only_for_invalid() {
    let taken = Availability::Taken;
    assert_eq!(
        availability_report("alice", &taken),
        AvailabilityReport {
            handle: "alice",
            status: "taken",
            reason: None,
        }
    );

    let invalid = Availability::Invalid("too short".to_string());
    let json = serde_json::to_value(availability_report("ab", &invalid)).expect("json");
    assert_eq!(json["status"], "invalid");
    assert_eq!(json["reason"], "too short");
}

#[test]
fn owner_hint_ignores_blank_values() {
    let mut identity = IdentityArgs {
        owner: Some("  ".to_string()),
        display_name: None,
        avatar_url: None,
        email: None,
    };
    assert_eq!(owner_hint(&identity), None);
    identity.owner = Some(" uid-1 ".to_string());
    assert_eq!(owner_hint(&identity).as_deref(), Some("uid-1"));
}
