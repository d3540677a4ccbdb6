//! Login orchestration.
//!
//! [`LoginOrchestrator`] drives one login attempt end to end: the policy
//! checks in their fixed order, account resolution and creation, the
//! enablement checks, and finally provisioning. The first failing check
//! decides the rejection reason. Every rejection is written to the audit
//! log and bumps the account's failed-login counter when an account was
//! resolved.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;

use crate::claims::IdentityClaims;
use crate::error::StoreError;
use crate::member::{MemberProfile, MemberRecord, is_valid_username};
use crate::policy::AuthorizationPolicy;
use crate::scope::Scope;

/// Why a login attempt was turned away.
///
/// These are expected outcomes, not faults: they are surfaced to the
/// caller as structured failures and never abort the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    /// The claims carry no subject identifier.
    NoIdentity,
    /// The identity holds no section membership at all.
    NotMember,
    /// The identity's sections do not intersect the scope's allow-list.
    SectionNotAllowed,
    /// No local account exists and auto-creation is off for the scope.
    AccountMissing,
    /// The derived username is unusable for account creation.
    InvalidUsername { username: String },
    /// The account is disabled or outside its activation window.
    AccountDisabled,
    /// The account's own login switch is off.
    LoginNotPermitted,
}

impl LoginRejection {
    /// Machine-readable rejection key for callers and audit records.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::NoIdentity => "no_identity",
            Self::NotMember => "not_member",
            Self::SectionNotAllowed => "section_not_allowed",
            Self::AccountMissing => "account_missing",
            Self::InvalidUsername { .. } => "invalid_username",
            Self::AccountDisabled => "account_disabled",
            Self::LoginNotPermitted => "login_not_permitted",
        }
    }
}

impl fmt::Display for LoginRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIdentity => {
                write!(f, "the identity provider reported no member identifier")
            }
            Self::NotMember => {
                write!(f, "the identity holds no section membership")
            }
            Self::SectionNotAllowed => {
                write!(f, "none of the identity's sections are permitted here")
            }
            Self::AccountMissing => {
                write!(f, "no local account exists for this identity")
            }
            Self::InvalidUsername { username } => {
                write!(f, "cannot create an account for username '{username}'")
            }
            Self::AccountDisabled => {
                write!(f, "the account is disabled")
            }
            Self::LoginNotPermitted => {
                write!(f, "login is not permitted for this account")
            }
        }
    }
}

/// Outcome of one orchestrated login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// The identity passed every check; the account reflects the persisted
    /// state after provisioning.
    Succeeded {
        member: Box<MemberRecord>,
        /// Whether this login created the account.
        created: bool,
    },
    /// The attempt was turned away.
    Rejected(LoginRejection),
}

/// Persistence for local user records.
///
/// Implementations enforce a UNIQUE constraint on the derived username so
/// that two concurrent first logins cannot create the account twice; a
/// duplicate insert means "exists now" and resolves to the surviving row.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Looks up the account for a member id: frontend accounts by
    /// username, backend accounts by their external-member-id column.
    async fn find(&self, member_id: &str, scope: Scope)
    -> Result<Option<MemberRecord>, StoreError>;

    /// Inserts a minimal frontend account (username, subject, creation
    /// timestamp, login enabled) and returns the stored row.
    async fn create(&self, member_id: &str, subject: &str) -> Result<MemberRecord, StoreError>;

    /// Writes the record unconditionally, assigns a random one-way
    /// credential if none exists yet, touches the row timestamp in a
    /// second write, and returns the re-read row.
    async fn persist(
        &self,
        record: &MemberRecord,
        scope: Scope,
    ) -> Result<MemberRecord, StoreError>;

    /// Clears the disabled flag (frontend accounts only).
    async fn reactivate(&self, record: &MemberRecord) -> Result<(), StoreError>;

    /// Increments the account's failed-login counter.
    async fn record_failed_login(&self, record: &MemberRecord, scope: Scope)
    -> Result<(), StoreError>;
}

/// Coordinates one login attempt against the policy and the member store.
pub struct LoginOrchestrator<'a, S> {
    store: &'a S,
    policy: &'a AuthorizationPolicy,
}

impl<'a, S: MemberStore> LoginOrchestrator<'a, S> {
    /// Creates an orchestrator over the given store and policy.
    #[must_use]
    pub fn new(store: &'a S, policy: &'a AuthorizationPolicy) -> Self {
        Self { store, policy }
    }

    /// Runs the ordered checks for one login attempt.
    ///
    /// Rejections come back as `Ok(Rejected(..))`; only storage failures
    /// during resolution or provisioning propagate as errors, since a user
    /// record cannot reliably be created or updated without the store.
    pub async fn authenticate(
        &self,
        claims: &IdentityClaims,
        scope: Scope,
    ) -> Result<LoginOutcome, StoreError> {
        if !self.policy.has_identity(claims) {
            return self.reject(claims, scope, LoginRejection::NoIdentity, None).await;
        }

        let rules = self.policy.rules(scope);

        if rules.members_only && !self.policy.is_member(claims) {
            return self.reject(claims, scope, LoginRejection::NotMember, None).await;
        }

        if rules.section_members_only && self.policy.allowed_sections(claims, scope).is_empty() {
            return self
                .reject(claims, scope, LoginRejection::SectionNotAllowed, None)
                .await;
        }

        let member_id = claims.member_id();
        let mut created = false;

        let mut record = match self.store.find(member_id, scope).await? {
            Some(record) => record,
            None => {
                if scope == Scope::Backend || !rules.auto_create_account {
                    return self
                        .reject(claims, scope, LoginRejection::AccountMissing, None)
                        .await;
                }

                if !is_valid_username(member_id) {
                    let rejection = LoginRejection::InvalidUsername {
                        username: member_id.to_string(),
                    };
                    return self.reject(claims, scope, rejection, None).await;
                }

                created = true;
                self.store.create(member_id, &claims.sub).await?
            }
        };

        let now = Utc::now();

        if !record.is_enabled(now) {
            let may_reactivate =
                scope == Scope::Frontend && rules.allow_login_if_disabled && record.disabled;

            if may_reactivate {
                self.store.reactivate(&record).await?;
                record.disabled = false;
            }

            if !record.is_enabled(now) {
                return self
                    .reject(claims, scope, LoginRejection::AccountDisabled, Some(&record))
                    .await;
            }
        }

        if scope == Scope::Frontend && !record.login_enabled {
            return self
                .reject(claims, scope, LoginRejection::LoginNotPermitted, Some(&record))
                .await;
        }

        let profile = MemberProfile::derive(claims, self.policy, scope);
        let auto_groups = if scope == Scope::Frontend {
            rules.add_to_groups.as_slice()
        } else {
            &[]
        };
        profile.apply(&mut record, auto_groups);

        let member = self.store.persist(&record, scope).await?;

        tracing::info!(
            scope = %scope,
            member_id,
            name = %claims.full_name(),
            created,
            "login succeeded"
        );

        Ok(LoginOutcome::Succeeded {
            member: Box::new(member),
            created,
        })
    }

    /// Audits a rejection and bumps the failed-login counter when an
    /// account was resolved.
    async fn reject(
        &self,
        claims: &IdentityClaims,
        scope: Scope,
        rejection: LoginRejection,
        record: Option<&MemberRecord>,
    ) -> Result<LoginOutcome, StoreError> {
        // The raw claims payload goes to the audit log so a rejection can
        // be reconstructed; it never contains credentials.
        tracing::info!(
            scope = %scope,
            member_id = claims.member_id(),
            name = %claims.full_name(),
            cause = rejection.key(),
            payload = %serde_json::to_string(claims).unwrap_or_default(),
            "login rejected"
        );

        if let Some(record) = record {
            self.store.record_failed_login(record, scope).await?;
        }

        Ok(LoginOutcome::Rejected(rejection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RoleAssignment;
    use crate::policy::ScopeRules;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryMemberStore {
        frontend: Mutex<HashMap<String, MemberRecord>>,
        backend: Mutex<HashMap<String, MemberRecord>>,
    }

    impl MemoryMemberStore {
        fn table(&self, scope: Scope) -> &Mutex<HashMap<String, MemberRecord>> {
            match scope {
                Scope::Frontend => &self.frontend,
                Scope::Backend => &self.backend,
            }
        }

        fn insert(&self, scope: Scope, record: MemberRecord) {
            self.table(scope)
                .lock()
                .unwrap()
                .insert(record.username.clone(), record);
        }

        fn get(&self, scope: Scope, username: &str) -> Option<MemberRecord> {
            self.table(scope).lock().unwrap().get(username).cloned()
        }
    }

    #[async_trait]
    impl MemberStore for MemoryMemberStore {
        async fn find(
            &self,
            member_id: &str,
            scope: Scope,
        ) -> Result<Option<MemberRecord>, StoreError> {
            Ok(self.get(scope, member_id))
        }

        async fn create(
            &self,
            member_id: &str,
            subject: &str,
        ) -> Result<MemberRecord, StoreError> {
            let record = MemberRecord {
                username: member_id.to_string(),
                subject: subject.to_string(),
                login_enabled: true,
                date_added: Utc::now(),
                ..Default::default()
            };
            self.insert(Scope::Frontend, record.clone());
            Ok(record)
        }

        async fn persist(
            &self,
            record: &MemberRecord,
            scope: Scope,
        ) -> Result<MemberRecord, StoreError> {
            let mut stored = record.clone();
            if stored.credential_hash.is_empty() {
                stored.credential_hash = "$argon2id$test".to_string();
            }
            stored.updated_at = Utc::now();
            self.insert(scope, stored.clone());
            Ok(stored)
        }

        async fn reactivate(&self, record: &MemberRecord) -> Result<(), StoreError> {
            let mut table = self.frontend.lock().unwrap();
            if let Some(stored) = table.get_mut(&record.username) {
                stored.disabled = false;
            }
            Ok(())
        }

        async fn record_failed_login(
            &self,
            record: &MemberRecord,
            scope: Scope,
        ) -> Result<(), StoreError> {
            if let Some(stored) = self.table(scope).lock().unwrap().get_mut(&record.username) {
                stored.login_attempts += 1;
            }
            Ok(())
        }
    }

    fn policy() -> AuthorizationPolicy {
        AuthorizationPolicy::new(
            ScopeRules {
                allowed_section_ids: vec![4250],
                members_only: true,
                section_members_only: true,
                auto_create_account: true,
                add_to_groups: vec![9],
                ..Default::default()
            },
            ScopeRules {
                allowed_section_ids: vec![4250],
                members_only: true,
                section_members_only: true,
                ..Default::default()
            },
            [(1415, 4250)].into_iter().collect(),
        )
    }

    fn member_claims() -> IdentityClaims {
        IdentityClaims {
            sub: "123456".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Brunner".to_string(),
            email: "a.brunner@example.ch".to_string(),
            roles: vec![RoleAssignment {
                role: "Group::SektionsMitglieder::Mitglied".to_string(),
                layer_group_id: "1415".to_string(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_frontend_login_creates_and_provisions_the_account() {
        let store = MemoryMemberStore::default();
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Frontend)
            .await
            .unwrap();

        let LoginOutcome::Succeeded { member, created } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!(created);
        assert_eq!(member.username, "123456");
        assert_eq!(member.section_ids, vec![4250]);
        assert!(member.is_member);
        assert_eq!(member.group_ids, vec![9]);
        assert!(!member.credential_hash.is_empty());
    }

    #[tokio::test]
    async fn backend_login_without_account_is_rejected() {
        let store = MemoryMemberStore::default();
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Backend)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginRejection::AccountMissing)
        );
    }

    #[tokio::test]
    async fn empty_subject_is_rejected_first() {
        let store = MemoryMemberStore::default();
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let mut claims = member_claims();
        claims.sub = "000".to_string();
        // Even with no membership either, the identity check wins.
        claims.roles.clear();

        let outcome = orchestrator
            .authenticate(&claims, Scope::Frontend)
            .await
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Rejected(LoginRejection::NoIdentity));
    }

    #[tokio::test]
    async fn non_member_is_rejected_before_section_check() {
        let store = MemoryMemberStore::default();
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let mut claims = member_claims();
        claims.roles.clear();

        let outcome = orchestrator
            .authenticate(&claims, Scope::Frontend)
            .await
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Rejected(LoginRejection::NotMember));
    }

    #[tokio::test]
    async fn member_of_unlisted_section_is_rejected() {
        let store = MemoryMemberStore::default();
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let mut claims = member_claims();
        claims.roles[0].layer_group_id = "8999".to_string();

        let outcome = orchestrator
            .authenticate(&claims, Scope::Frontend)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginRejection::SectionNotAllowed)
        );
    }

    #[tokio::test]
    async fn disabled_account_is_rejected_and_counted() {
        let store = MemoryMemberStore::default();
        store.insert(
            Scope::Frontend,
            MemberRecord {
                username: "123456".to_string(),
                login_enabled: true,
                disabled: true,
                ..Default::default()
            },
        );
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Frontend)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginRejection::AccountDisabled)
        );
        assert_eq!(store.get(Scope::Frontend, "123456").unwrap().login_attempts, 1);
    }

    #[tokio::test]
    async fn disabled_override_reactivates_the_account() {
        let store = MemoryMemberStore::default();
        store.insert(
            Scope::Frontend,
            MemberRecord {
                username: "123456".to_string(),
                login_enabled: true,
                disabled: true,
                ..Default::default()
            },
        );

        let mut policy = policy();
        let mut rules = policy.rules(Scope::Frontend).clone();
        rules.allow_login_if_disabled = true;
        policy = AuthorizationPolicy::new(
            rules,
            policy.rules(Scope::Backend).clone(),
            policy.section_map().clone(),
        );

        let orchestrator = LoginOrchestrator::new(&store, &policy);
        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Frontend)
            .await
            .unwrap();

        assert!(matches!(outcome, LoginOutcome::Succeeded { created: false, .. }));
        assert!(!store.get(Scope::Frontend, "123456").unwrap().disabled);
    }

    #[tokio::test]
    async fn login_switch_off_is_rejected() {
        let store = MemoryMemberStore::default();
        store.insert(
            Scope::Frontend,
            MemberRecord {
                username: "123456".to_string(),
                login_enabled: false,
                ..Default::default()
            },
        );
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Frontend)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected(LoginRejection::LoginNotPermitted)
        );
    }

    #[tokio::test]
    async fn existing_account_is_updated_not_recreated() {
        let store = MemoryMemberStore::default();
        store.insert(
            Scope::Frontend,
            MemberRecord {
                username: "123456".to_string(),
                login_enabled: true,
                email: "old@example.ch".to_string(),
                credential_hash: "$argon2id$kept".to_string(),
                ..Default::default()
            },
        );
        let policy = policy();
        let orchestrator = LoginOrchestrator::new(&store, &policy);

        let outcome = orchestrator
            .authenticate(&member_claims(), Scope::Frontend)
            .await
            .unwrap();

        let LoginOutcome::Succeeded { member, created } = outcome else {
            panic!("expected success");
        };
        assert!(!created);
        assert_eq!(member.email, "a.brunner@example.ch");
        assert_eq!(member.credential_hash, "$argon2id$kept");
    }
}
