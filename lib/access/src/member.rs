//! Local user records and the profile data written into them.
//!
//! The surrounding application owns its user tables; this crate only reads
//! and reconciles them. [`MemberRecord`] is the in-memory view of one row,
//! [`MemberProfile`] is the field set a login writes into it, derived from
//! the identity claims under the active policy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::{Gender, IdentityClaims};
use crate::phone::normalize_phone;
use crate::policy::AuthorizationPolicy;
use crate::scope::Scope;

/// Longest username the platform accepts.
pub const MAX_USERNAME_LENGTH: usize = 4096;

/// One local user record, frontend member or backend user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Surrogate key of the row.
    pub id: i64,
    /// Stable local username, derived from the provider subject.
    pub username: String,
    /// The provider subject as delivered (leading zeros kept).
    pub subject: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub postal: String,
    pub city: String,
    /// Lowercased ISO country code.
    pub country: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub language: String,
    /// Sections the account belongs to, after policy intersection.
    pub section_ids: Vec<u32>,
    /// Membership flag per the configured strict/lenient rule.
    pub is_member: bool,
    /// Group ids the account is assigned to.
    pub group_ids: Vec<u32>,
    /// Whether the account's own login switch is on.
    pub login_enabled: bool,
    /// Explicit disable flag.
    pub disabled: bool,
    /// Activation window start, if any.
    pub active_from: Option<DateTime<Utc>>,
    /// Activation window stop, if any.
    pub active_until: Option<DateTime<Utc>>,
    /// PHC-encoded credential hash; empty until first assignment.
    pub credential_hash: String,
    /// Failed-login counter.
    pub login_attempts: u32,
    pub date_added: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberRecord {
    /// True iff the account may log in right now.
    ///
    /// An account is considered disabled when the disable flag is set, the
    /// activation window has not started, or it has already ended.
    #[must_use]
    pub fn is_enabled(&self, now: DateTime<Utc>) -> bool {
        if self.disabled {
            return false;
        }

        if let Some(from) = self.active_from
            && from > now
        {
            return false;
        }

        if let Some(until) = self.active_until
            && until <= now
        {
            return false;
        }

        true
    }
}

/// Validates a derived username.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    let username = username.trim();

    !username.is_empty() && username.len() <= MAX_USERNAME_LENGTH
}

/// The profile fields one login writes into a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub subject: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub postal: String,
    pub city: String,
    pub country: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub language: String,
    pub section_ids: Vec<u32>,
    pub is_member: bool,
}

impl MemberProfile {
    /// Derives the profile for one scope from the claims under the policy.
    ///
    /// `section_ids` is the policy intersection for the scope. The
    /// membership flag is strict (intersection non-empty) when the scope
    /// requires section membership, lenient (any membership) otherwise.
    #[must_use]
    pub fn derive(claims: &IdentityClaims, policy: &AuthorizationPolicy, scope: Scope) -> Self {
        let section_ids = policy.allowed_sections(claims, scope);

        let is_member = if policy.rules(scope).section_members_only {
            !section_ids.is_empty()
        } else {
            policy.is_member(claims)
        };

        Self {
            subject: claims.sub.clone(),
            first_name: claims.first_name.clone(),
            last_name: claims.last_name.clone(),
            email: claims.email.clone(),
            phone: normalize_phone(&claims.phone),
            street: claims.address.clone(),
            postal: claims.zip_code.clone(),
            city: claims.town.clone(),
            country: claims.country_code(),
            date_of_birth: NaiveDate::parse_from_str(&claims.birthday, "%Y-%m-%d").ok(),
            gender: claims.mapped_gender(),
            language: claims.language_code(),
            section_ids,
            is_member,
        }
    }

    /// Applies the profile to a record, merging the configured auto groups.
    ///
    /// Groups already present are not re-added; existing extra groups are
    /// preserved. The credential hash is untouched.
    pub fn apply(&self, record: &mut MemberRecord, auto_groups: &[u32]) {
        record.subject = self.subject.clone();
        record.first_name = self.first_name.clone();
        record.last_name = self.last_name.clone();
        record.email = self.email.clone();
        record.phone = self.phone.clone();
        record.street = self.street.clone();
        record.postal = self.postal.clone();
        record.city = self.city.clone();
        record.country = self.country.clone();
        record.date_of_birth = self.date_of_birth;
        record.gender = self.gender;
        record.language = self.language.clone();
        record.section_ids = self.section_ids.clone();
        record.is_member = self.is_member;

        for group_id in auto_groups {
            if !record.group_ids.contains(group_id) {
                record.group_ids.push(*group_id);
            }
        }
    }
}
