//! Identity, authorization, and session correlation for the Hitobito
//! login client.
//!
//! This crate provides:
//! - Parsed identity claims (`IdentityClaims`, `RoleAssignment`)
//! - Per-scope authorization rules (`AuthorizationPolicy`, `ScopeRules`)
//! - Account provisioning and the login state machine
//!   (`LoginOrchestrator`, `MemberStore`)
//! - Session-to-ID-token correlation (`CorrelationStore`)
//! - Provider-side logout decisions (`build_logout_outcome`)
//!
//! # Authorization Model
//!
//! Logins are evaluated per scope (frontend or backend) against the
//! configured rules: membership requirements, the section allow-list,
//! account auto-creation, and disabled-account overrides. The policy is
//! pure; persistence sits behind the `MemberStore` and `CorrelationStore`
//! traits implemented by the server binary.
//!
//! # Example
//!
//! ```
//! use hitobito_login_access::{
//!     AuthorizationPolicy, IdentityClaims, RoleAssignment, Scope, ScopeRules,
//! };
//!
//! let policy = AuthorizationPolicy::new(
//!     ScopeRules {
//!         allowed_section_ids: vec![4250],
//!         members_only: true,
//!         section_members_only: true,
//!         ..Default::default()
//!     },
//!     ScopeRules::default(),
//!     [(1415, 4250)].into_iter().collect(),
//! );
//!
//! let claims = IdentityClaims {
//!     sub: "00123456".to_string(),
//!     roles: vec![RoleAssignment {
//!         role: "Group::SektionsMitglieder::Mitglied".to_string(),
//!         layer_group_id: "1415".to_string(),
//!     }],
//!     ..Default::default()
//! };
//!
//! assert_eq!(claims.member_id(), "123456");
//! assert!(policy.is_authorized(&claims, Scope::Frontend));
//! ```

pub mod claims;
pub mod correlation;
pub mod error;
pub mod login;
pub mod logout;
pub mod member;
pub mod phone;
pub mod policy;
pub mod scope;
pub mod section;

// Re-export main types at crate root
pub use claims::{Gender, IdentityClaims, MEMBER_ROLES, RoleAssignment};
pub use correlation::{
    CORRELATION_TTL_SECS, CorrelationRecord, CorrelationStore, generate_correlation_token,
};
pub use error::{Result, StoreError};
pub use login::{LoginOrchestrator, LoginOutcome, LoginRejection, MemberStore};
pub use logout::{LogoutOutcome, LogoutStatus, build_logout_outcome, decode_redirect_param};
pub use member::{MAX_USERNAME_LENGTH, MemberProfile, MemberRecord, is_valid_username};
pub use phone::normalize_phone;
pub use policy::{AuthorizationPolicy, ScopeRules};
pub use scope::{ParseScopeError, Scope};
pub use section::SectionIdMap;
