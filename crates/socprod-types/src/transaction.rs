use crate::error::TypesError;
use crate::hash::Hash;
use crate::peer::PeerId;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length in bytes of any identifier field.
pub const MAX_ID_LEN: usize = 64;
/// Maximum length in bytes of any free-text field.
pub const MAX_TEXT_LEN: usize = 4096;

/// Lifecycle of a registered member (users and organizations).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum MembershipAction {
    Registered,
    Edited,
    Unregistered,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum ProjectAction {
    Posted,
    Edited,
    StatusChanged,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum ProjectStatus {
    Open,
    InProgress,
    Completed,
    Archived,
}

/// Lifecycle of authored content (project updates and posts).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum ContentAction {
    Added,
    Edited,
    Deleted,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum FundingAction {
    Created,
    Funded,
    Distributed,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum EventAction {
    Added,
    Edited,
    Cancelled,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum RsvpStatus {
    Going,
    Maybe,
    NotGoing,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

/// Kind-specific payload of a platform change event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TransactionKind {
    User {
        action: MembershipAction,
        user_id: String,
        display_name: String,
    },
    Organization {
        action: MembershipAction,
        org_id: String,
        name: String,
    },
    Project {
        action: ProjectAction,
        project_id: String,
        title: String,
        status: ProjectStatus,
    },
    ProjectUpdate {
        action: ContentAction,
        project_id: String,
        update_id: String,
        body: String,
    },
    Funding {
        action: FundingAction,
        funding_id: String,
        project_id: String,
        amount: u64,
    },
    Post {
        action: ContentAction,
        post_id: String,
        author_id: String,
        body: String,
    },
    Comment {
        comment_id: String,
        target_id: String,
        author_id: String,
        body: String,
    },
    Event {
        action: EventAction,
        event_id: String,
        title: String,
        starts_at: u64,
        ends_at: u64,
    },
    Rsvp {
        event_id: String,
        user_id: String,
        status: RsvpStatus,
    },
    Vote {
        subject_id: String,
        voter_id: String,
        choice: VoteChoice,
    },
    NodeAdded {
        node_id: String,
    },
    NodeRemoved {
        node_id: String,
    },
}

impl TransactionKind {
    /// Short category name, used in logs and by host validators.
    pub fn category(&self) -> &'static str {
        match self {
            TransactionKind::User { .. } => "user",
            TransactionKind::Organization { .. } => "organization",
            TransactionKind::Project { .. } => "project",
            TransactionKind::ProjectUpdate { .. } => "update",
            TransactionKind::Funding { .. } => "funding",
            TransactionKind::Post { .. } => "post",
            TransactionKind::Comment { .. } => "comment",
            TransactionKind::Event { .. } => "event",
            TransactionKind::Rsvp { .. } => "rsvp",
            TransactionKind::Vote { .. } => "vote",
            TransactionKind::NodeAdded { .. } => "node-added",
            TransactionKind::NodeRemoved { .. } => "node-removed",
        }
    }

    /// Structural checks on the payload. Says nothing about whether the
    /// referenced entities exist.
    pub fn validate(&self) -> Result<(), TypesError> {
        match self {
            TransactionKind::User {
                action,
                user_id,
                display_name,
            } => {
                check_id("user_id", user_id)?;
                if *action != MembershipAction::Unregistered {
                    check_required_text("display_name", display_name)?;
                }
                check_text("display_name", display_name)
            }
            TransactionKind::Organization {
                action,
                org_id,
                name,
            } => {
                check_id("org_id", org_id)?;
                if *action != MembershipAction::Unregistered {
                    check_required_text("name", name)?;
                }
                check_text("name", name)
            }
            TransactionKind::Project {
                project_id, title, ..
            } => {
                check_id("project_id", project_id)?;
                check_required_text("title", title)?;
                check_text("title", title)
            }
            TransactionKind::ProjectUpdate {
                action,
                project_id,
                update_id,
                body,
            } => {
                check_id("project_id", project_id)?;
                check_id("update_id", update_id)?;
                if *action != ContentAction::Deleted {
                    check_required_text("body", body)?;
                }
                check_text("body", body)
            }
            TransactionKind::Funding {
                funding_id,
                project_id,
                amount,
                ..
            } => {
                check_id("funding_id", funding_id)?;
                check_id("project_id", project_id)?;
                if *amount == 0 {
                    return Err(TypesError::ZeroAmount);
                }
                Ok(())
            }
            TransactionKind::Post {
                action,
                post_id,
                author_id,
                body,
            } => {
                check_id("post_id", post_id)?;
                check_id("author_id", author_id)?;
                if *action != ContentAction::Deleted {
                    check_required_text("body", body)?;
                }
                check_text("body", body)
            }
            TransactionKind::Comment {
                comment_id,
                target_id,
                author_id,
                body,
            } => {
                check_id("comment_id", comment_id)?;
                check_id("target_id", target_id)?;
                check_id("author_id", author_id)?;
                check_required_text("body", body)?;
                check_text("body", body)
            }
            TransactionKind::Event {
                action,
                event_id,
                title,
                starts_at,
                ends_at,
            } => {
                check_id("event_id", event_id)?;
                if *action != EventAction::Cancelled {
                    check_required_text("title", title)?;
                }
                check_text("title", title)?;
                if ends_at < starts_at {
                    return Err(TypesError::InvalidTimeWindow {
                        starts_at: *starts_at,
                        ends_at: *ends_at,
                    });
                }
                Ok(())
            }
            TransactionKind::Rsvp {
                event_id, user_id, ..
            } => {
                check_id("event_id", event_id)?;
                check_id("user_id", user_id)
            }
            TransactionKind::Vote {
                subject_id,
                voter_id,
                ..
            } => {
                check_id("subject_id", subject_id)?;
                check_id("voter_id", voter_id)
            }
            TransactionKind::NodeAdded { node_id } | TransactionKind::NodeRemoved { node_id } => {
                check_id("node_id", node_id)
            }
        }
    }
}

fn check_id(field: &'static str, value: &str) -> Result<(), TypesError> {
    if value.is_empty() {
        return Err(TypesError::MissingField(field));
    }
    if value.len() > MAX_ID_LEN {
        return Err(TypesError::FieldTooLong {
            field,
            max: MAX_ID_LEN,
            actual: value.len(),
        });
    }
    Ok(())
}

fn check_required_text(field: &'static str, value: &str) -> Result<(), TypesError> {
    if value.trim().is_empty() {
        return Err(TypesError::MissingField(field));
    }
    Ok(())
}

fn check_text(field: &'static str, value: &str) -> Result<(), TypesError> {
    if value.len() > MAX_TEXT_LEN {
        return Err(TypesError::FieldTooLong {
            field,
            max: MAX_TEXT_LEN,
            actual: value.len(),
        });
    }
    Ok(())
}

/// An immutable record of one platform change event.
///
/// `content_hash` is derived from the canonical encoding of the other three
/// fields, so two transactions with the same payload share a hash and
/// deduplicate naturally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// Unix timestamp (seconds)
    pub created_at: u64,
    pub origin_peer: PeerId,
    pub content_hash: Hash,
}

impl Transaction {
    /// Create a transaction and compute its content hash.
    pub fn new(
        kind: TransactionKind,
        created_at: u64,
        origin_peer: PeerId,
    ) -> Result<Self, TypesError> {
        let mut tx = Self {
            kind,
            created_at,
            origin_peer,
            content_hash: Hash::ZERO,
        };
        tx.content_hash = tx.compute_hash()?;
        Ok(tx)
    }

    /// Canonical byte encoding: borsh of kind, created_at, origin_peer in
    /// that order. The content hash itself is not part of the encoding.
    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        let mut buf = Vec::with_capacity(128);
        BorshSerialize::serialize(&self.kind, &mut buf)?;
        BorshSerialize::serialize(&self.created_at, &mut buf)?;
        BorshSerialize::serialize(&self.origin_peer, &mut buf)?;
        Ok(buf)
    }

    /// Recompute the content hash from the payload.
    pub fn compute_hash(&self) -> Result<Hash, TypesError> {
        Ok(Hash::compute(&self.encode()?))
    }

    /// Structural validation: required fields present, payload well-formed
    /// and the stored content hash matching the encoding.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.origin_peer.is_empty() {
            return Err(TypesError::MissingField("origin_peer"));
        }
        if self.origin_peer.as_str().len() > MAX_ID_LEN {
            return Err(TypesError::FieldTooLong {
                field: "origin_peer",
                max: MAX_ID_LEN,
                actual: self.origin_peer.as_str().len(),
            });
        }
        self.kind.validate()?;

        let computed = self.compute_hash()?;
        if computed != self.content_hash {
            return Err(TypesError::ContentHashMismatch {
                stored: self.content_hash.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(())
    }

    /// Encoded size in bytes, used for sync budgeting.
    pub fn encoded_len(&self) -> usize {
        self.encode().map(|bytes| bytes.len()).unwrap_or(0) + Hash::LEN
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tx({} {} from {})",
            self.kind.category(),
            self.content_hash.short(),
            self.origin_peer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(body: &str) -> TransactionKind {
        TransactionKind::Post {
            action: ContentAction::Added,
            post_id: "post-1".into(),
            author_id: "alice".into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_identical_payload_identical_hash() {
        let a = Transaction::new(post("hello"), 10, PeerId::from("node-a")).unwrap();
        let b = Transaction::new(post("hello"), 10, PeerId::from("node-a")).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_any_field_changes_hash() {
        let base = Transaction::new(post("hello"), 10, PeerId::from("node-a")).unwrap();
        let other_body = Transaction::new(post("hullo"), 10, PeerId::from("node-a")).unwrap();
        let other_time = Transaction::new(post("hello"), 11, PeerId::from("node-a")).unwrap();
        let other_peer = Transaction::new(post("hello"), 10, PeerId::from("node-b")).unwrap();
        assert_ne!(base.content_hash, other_body.content_hash);
        assert_ne!(base.content_hash, other_time.content_hash);
        assert_ne!(base.content_hash, other_peer.content_hash);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let tx = Transaction::new(post("hello"), 10, PeerId::from("node-a")).unwrap();
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_tampering() {
        let mut tx = Transaction::new(post("hello"), 10, PeerId::from("node-a")).unwrap();
        tx.created_at = 11;
        assert!(matches!(
            tx.validate(),
            Err(TypesError::ContentHashMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_origin() {
        let tx = Transaction::new(post("hello"), 10, PeerId::default()).unwrap();
        assert_eq!(tx.validate(), Err(TypesError::MissingField("origin_peer")));
    }

    #[test]
    fn test_validate_payload_rules() {
        let funding = TransactionKind::Funding {
            action: FundingAction::Funded,
            funding_id: "f-1".into(),
            project_id: "p-1".into(),
            amount: 0,
        };
        assert_eq!(funding.validate(), Err(TypesError::ZeroAmount));

        let event = TransactionKind::Event {
            action: EventAction::Added,
            event_id: "e-1".into(),
            title: "Meetup".into(),
            starts_at: 100,
            ends_at: 50,
        };
        assert!(matches!(
            event.validate(),
            Err(TypesError::InvalidTimeWindow { .. })
        ));

        let long_id = TransactionKind::NodeAdded {
            node_id: "x".repeat(MAX_ID_LEN + 1),
        };
        assert!(matches!(
            long_id.validate(),
            Err(TypesError::FieldTooLong { field: "node_id", .. })
        ));

        assert_eq!(post("   ").validate(), Err(TypesError::MissingField("body")));
    }

    #[test]
    fn test_removal_actions_need_no_text() {
        let unregister = TransactionKind::User {
            action: MembershipAction::Unregistered,
            user_id: "alice".into(),
            display_name: String::new(),
        };
        assert!(unregister.validate().is_ok());

        let deleted = TransactionKind::Post {
            action: ContentAction::Deleted,
            post_id: "post-1".into(),
            author_id: "alice".into(),
            body: String::new(),
        };
        assert!(deleted.validate().is_ok());
    }

    #[test]
    fn test_categories() {
        assert_eq!(post("x").category(), "post");
        assert_eq!(
            TransactionKind::NodeRemoved {
                node_id: "n".into()
            }
            .category(),
            "node-removed"
        );
    }
}
