//! Authorization policy over identity claims.
//!
//! The policy is a pure decision component: given the parsed claims and a
//! target scope it answers whether the identity may log in and which
//! section ids apply. Rules are fixed at construction; the checks carry no
//! state and touch no storage.

use regex::Regex;
use std::sync::LazyLock;

use crate::claims::IdentityClaims;
use crate::scope::Scope;
use crate::section::SectionIdMap;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

/// Login rules for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRules {
    /// Section ids whose members may log in to this scope.
    pub allowed_section_ids: Vec<u32>,
    /// Require any section membership at all.
    pub members_only: bool,
    /// Require membership in one of `allowed_section_ids`.
    pub section_members_only: bool,
    /// Create a missing account on first login. Never honored for the
    /// backend scope.
    pub auto_create_account: bool,
    /// Let a disabled account log in; the account is reactivated in the
    /// process (frontend only).
    pub allow_login_if_disabled: bool,
    /// Group ids every logging-in account is added to (frontend only).
    pub add_to_groups: Vec<u32>,
}

/// Authorization policy for both scopes plus the section-id mapping.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    frontend: ScopeRules,
    backend: ScopeRules,
    section_map: SectionIdMap,
}

impl AuthorizationPolicy {
    /// Creates a policy from per-scope rules and the legacy section map.
    #[must_use]
    pub fn new(frontend: ScopeRules, backend: ScopeRules, section_map: SectionIdMap) -> Self {
        Self {
            frontend,
            backend,
            section_map,
        }
    }

    /// Returns the rules for the given scope.
    #[must_use]
    pub fn rules(&self, scope: Scope) -> &ScopeRules {
        match scope {
            Scope::Frontend => &self.frontend,
            Scope::Backend => &self.backend,
        }
    }

    /// Returns the section-id mapping table.
    #[must_use]
    pub fn section_map(&self) -> &SectionIdMap {
        &self.section_map
    }

    /// True iff the claims carry a subject identifier.
    #[must_use]
    pub fn has_identity(&self, claims: &IdentityClaims) -> bool {
        !claims.member_id().is_empty()
    }

    /// True iff the claims establish at least one section membership.
    #[must_use]
    pub fn is_member(&self, claims: &IdentityClaims) -> bool {
        !claims.section_memberships(&self.section_map).is_empty()
    }

    /// Returns the intersection of the claims' section memberships with the
    /// scope's allow-list, in allow-list order, deduped.
    #[must_use]
    pub fn allowed_sections(&self, claims: &IdentityClaims, scope: Scope) -> Vec<u32> {
        let memberships = claims.section_memberships(&self.section_map);
        let mut sections = Vec::new();

        for id in &self.rules(scope).allowed_section_ids {
            if memberships.contains(id) && !sections.contains(id) {
                sections.push(*id);
            }
        }

        sections
    }

    /// True iff the identity satisfies the scope's membership rules.
    ///
    /// With `section_members_only` set, the allow-list intersection must be
    /// non-empty; otherwise, with `members_only` set, any membership
    /// suffices; with neither, everyone with an identity is authorized.
    #[must_use]
    pub fn is_authorized(&self, claims: &IdentityClaims, scope: Scope) -> bool {
        let rules = self.rules(scope);

        if rules.section_members_only {
            return !self.allowed_sections(claims, scope).is_empty();
        }

        if rules.members_only {
            return self.is_member(claims);
        }

        true
    }

    /// True iff the claims carry a syntactically valid email address.
    #[must_use]
    pub fn has_valid_email(&self, claims: &IdentityClaims) -> bool {
        !claims.email.is_empty() && EMAIL_RE.is_match(&claims.email)
    }
}
