//! Tests for `src/delivery/target.rs`: group lookup and contact normalisation.

use std::sync::atomic::Ordering;

use wasend::delivery::target::{
    resolve, resolve_contact, resolve_group, TargetDescriptor, TargetKind,
};
use wasend::delivery::Failure;

use super::mock_client::{contact, group, MockClient};

fn resolved(result: Result<wasend::whatsapp::ChannelId, Failure>) -> String {
    match result {
        Ok(id) => id.as_str().to_owned(),
        Err(err) => panic!("target should resolve: {err}"),
    }
}

#[test]
fn group_name_matches_case_insensitively() {
    let snapshot = vec![
        group("111@g.us", "Work"),
        group("222@g.us", "family"),
    ];
    assert_eq!(resolved(resolve_group("Family", &snapshot)), "222@g.us");
}

#[test]
fn name_match_outranks_earlier_id_match() {
    let snapshot = vec![
        group("Family@g.us", "Something else"),
        group("333@g.us", "family@g.us"),
    ];
    assert_eq!(
        resolved(resolve_group("Family@g.us", &snapshot)),
        "333@g.us"
    );
}

#[test]
fn exact_id_matches_before_suffixed_id() {
    let snapshot = vec![
        group("120363-42@g.us", "Ops"),
        group("120363-42", "Legacy"),
    ];
    assert_eq!(resolved(resolve_group("120363-42", &snapshot)), "120363-42");
}

#[test]
fn bare_group_id_gets_suffix() {
    let snapshot = vec![group("120363-42@g.us", "Ops")];
    assert_eq!(
        resolved(resolve_group("120363-42", &snapshot)),
        "120363-42@g.us"
    );
}

#[test]
fn first_group_in_snapshot_order_wins() {
    let snapshot = vec![group("1@g.us", "Family"), group("2@g.us", "FAMILY")];
    assert_eq!(resolved(resolve_group("family", &snapshot)), "1@g.us");
}

#[test]
fn contacts_are_never_group_matches() {
    let snapshot = vec![contact("5511@c.us", "Family"), group("9@g.us", "Family")];
    assert_eq!(resolved(resolve_group("Family", &snapshot)), "9@g.us");
}

#[test]
fn missing_group_lists_every_available_group() {
    let snapshot = vec![
        group("1@g.us", "Family"),
        contact("5511@c.us", "Mom"),
        group("2@g.us", "Work"),
    ];
    match resolve_group("Ghosts", &snapshot) {
        Err(Failure::TargetNotFound { target, available }) => {
            assert_eq!(target, "Ghosts");
            let names: Vec<&str> = available.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["Family", "Work"]);
        }
        other => panic!("expected TargetNotFound, got: {other:?}"),
    }
}

#[test]
fn any_number_with_digits_resolves() {
    let cases = [
        ("+1 (555) 123-4567", "15551234567@c.us"),
        ("55 11 99999-8888", "5511999998888@c.us"),
        ("0", "0@c.us"),
        ("tel:+44.20.7946.0958", "442079460958@c.us"),
    ];
    for (raw, expected) in cases {
        assert_eq!(resolved(resolve_contact(raw)), expected, "input {raw:?}");
    }
}

#[tokio::test]
async fn contact_resolution_does_not_query_chats() {
    let client = MockClient::new();
    let target = TargetDescriptor::new(TargetKind::Contact, "+1 (555) 123-4567");
    assert_eq!(resolved(resolve(&target, &client).await), "15551234567@c.us");
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn group_resolution_queries_chats_once() {
    let client = MockClient::new().with_channels(vec![group("42@g.us", "family")]);
    let target = TargetDescriptor::new(TargetKind::Group, "Family");
    assert_eq!(resolved(resolve(&target, &client).await), "42@g.us");
    assert_eq!(client.list_calls.load(Ordering::SeqCst), 1);
}
