//! Turn the configured destination into a WhatsApp channel id.
//!
//! Groups are looked up in the client's chat list; contacts are resolved
//! purely from the phone number text.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Failure;
use crate::whatsapp::{Channel, ChannelId, MessagingClient, CONTACT_SUFFIX, GROUP_SUFFIX};

/// How a target string is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A group, matched by name or id.
    Group,
    /// An individual, given as a phone number or a full JID.
    #[default]
    Contact,
}

/// The configured destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// How `raw` is interpreted.
    pub kind: TargetKind,
    /// The text from configuration.
    pub raw: String,
}

impl TargetDescriptor {
    /// Build a descriptor.
    pub fn new(kind: TargetKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }
}

/// Resolve a descriptor, querying the chat list once for groups.
///
/// # Errors
///
/// Returns [`Failure::TargetNotFound`] when no group matches,
/// [`Failure::InvalidContact`] for a contact without digits, or
/// [`Failure::Client`] if the chat list cannot be fetched.
pub async fn resolve(
    target: &TargetDescriptor,
    client: &dyn MessagingClient,
) -> Result<ChannelId, Failure> {
    let channel = match target.kind {
        TargetKind::Contact => resolve_contact(&target.raw)?,
        TargetKind::Group => {
            let channels = client
                .list_channels()
                .await
                .map_err(|e| Failure::Client(format!("failed to list chats: {e}")))?;
            debug!(count = channels.len(), "fetched chat snapshot");
            resolve_group(&target.raw, &channels)?
        }
    };
    info!(target = %target.raw, channel = %channel, "target resolved");
    Ok(channel)
}

/// Resolve a contact target.
///
/// Anything containing `@` is already a JID and is used verbatim. Otherwise
/// every non-digit is stripped and the contact suffix appended.
///
/// # Errors
///
/// Returns [`Failure::InvalidContact`] when no digits remain.
pub fn resolve_contact(raw: &str) -> Result<ChannelId, Failure> {
    if raw.contains('@') {
        return Ok(ChannelId::new(raw));
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(Failure::InvalidContact(raw.to_owned()));
    }
    Ok(ChannelId::new(format!("{digits}{CONTACT_SUFFIX}")))
}

/// Resolve a group target against a chat snapshot.
///
/// Criteria are tried in priority order across the whole snapshot: exact
/// case-insensitive name, exact id, then id with the group suffix appended.
/// Within one criterion the first group in snapshot order wins.
///
/// # Errors
///
/// Returns [`Failure::TargetNotFound`] carrying every group in the snapshot.
pub fn resolve_group(raw: &str, channels: &[Channel]) -> Result<ChannelId, Failure> {
    let groups: Vec<&Channel> = channels.iter().filter(|c| c.is_group).collect();
    let wanted_name = raw.to_lowercase();
    let suffixed = format!("{raw}{GROUP_SUFFIX}");

    let found = groups
        .iter()
        .find(|c| c.name.to_lowercase() == wanted_name)
        .or_else(|| groups.iter().find(|c| c.id.as_str() == raw))
        .or_else(|| groups.iter().find(|c| c.id.as_str() == suffixed));

    match found {
        Some(channel) => Ok(channel.id.clone()),
        None => Err(Failure::TargetNotFound {
            target: raw.to_owned(),
            available: groups.into_iter().cloned().collect(),
        }),
    }
}
