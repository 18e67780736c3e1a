//! Wire-visible shapes for users and groups.
//!
//! The durable record (password verifier, contact list, etc.) lives only on
//! the server side (`server::identity_store`); this module holds the public
//! projection of a user that is safe to put on the wire, plus group summaries.

use serde::{Deserialize, Serialize};

/// Public, client-visible view of a registered user.
///
/// Never carries the password verifier. Username is always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub avatar_token: String,
    pub profile_picture_id: Option<String>,
}

/// A group's wire-visible membership and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub members: Vec<String>,
}
