//! Identity claims delivered by the Hitobito identity provider.
//!
//! After the token exchange, the provider's userinfo payload is parsed into
//! [`IdentityClaims`]. The payload shape is fixed by the provider; every
//! field is optional on the wire and defaults to empty, so a partial
//! payload never fails to parse. Section membership is not stored on the
//! claims but derived from the role assignments on demand.

use serde::{Deserialize, Serialize};

use crate::section::SectionIdMap;

/// Role names that count as a section membership.
///
/// The provider attaches many role kinds to a person; only the primary and
/// the secondary section-member roles establish membership. Everything else
/// (guests, functionaries, mailing-list roles) is ignored.
pub const MEMBER_ROLES: [&str; 2] = [
    "Group::SektionsMitglieder::Mitglied",
    "Group::SektionsMitglieder::MitgliedZusatzsektion",
];

/// Gender as recorded in local user records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    /// Returns the value as stored in the user record.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

/// One role assignment from the provider's `roles` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// The provider-side role class, e.g. `Group::SektionsMitglieder::Mitglied`.
    #[serde(default)]
    pub role: String,
    /// The legacy id of the section (layer group) the role belongs to.
    #[serde(default)]
    pub layer_group_id: String,
}

/// The parsed identity claims of one login attempt.
///
/// Immutable per login; field names follow the provider payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Provider-unique subject identifier.
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// `m`, `w` or empty/other.
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Street address line.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub language: String,
    /// Date of birth as `YYYY-MM-DD`.
    #[serde(default)]
    pub birthday: String,
    /// All role assignments the provider reports for the person.
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

impl IdentityClaims {
    /// Returns the local member identifier derived from the subject.
    ///
    /// The provider left-pads subjects with zeros; the local username space
    /// does not carry them.
    #[must_use]
    pub fn member_id(&self) -> &str {
        self.sub.trim_start_matches('0')
    }

    /// Returns the display name used in audit records (`last first`).
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }

    /// Returns the gender mapped to the local representation.
    #[must_use]
    pub fn mapped_gender(&self) -> Gender {
        match self.gender.as_str() {
            "m" => Gender::Male,
            "w" => Gender::Female,
            _ => Gender::Other,
        }
    }

    /// Returns the lowercased language code, defaulting to `de`.
    #[must_use]
    pub fn language_code(&self) -> String {
        if self.language.is_empty() {
            "de".to_string()
        } else {
            self.language.to_lowercase()
        }
    }

    /// Returns the lowercased ISO country code.
    #[must_use]
    pub fn country_code(&self) -> String {
        self.country.to_lowercase()
    }

    /// Derives the set of section ids the person is a member of.
    ///
    /// Only roles in [`MEMBER_ROLES`] count; their legacy layer-group ids
    /// are translated through the mapping table. Order follows the role
    /// sequence on the wire, duplicates are kept out.
    #[must_use]
    pub fn section_memberships(&self, map: &SectionIdMap) -> Vec<u32> {
        let mut ids = Vec::new();

        for assignment in &self.roles {
            if assignment.role.is_empty() || assignment.layer_group_id.is_empty() {
                continue;
            }

            if !MEMBER_ROLES.contains(&assignment.role.as_str()) {
                continue;
            }

            let Ok(legacy_id) = assignment.layer_group_id.parse::<u32>() else {
                continue;
            };

            let id = map.map(legacy_id);

            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_claims() -> IdentityClaims {
        IdentityClaims {
            sub: "00123456".to_string(),
            first_name: "Anna".to_string(),
            last_name: "Brunner".to_string(),
            gender: "w".to_string(),
            email: "a.brunner@example.ch".to_string(),
            phone: "+41799871234".to_string(),
            address: "Bergweg 7".to_string(),
            zip_code: "6003".to_string(),
            town: "Luzern".to_string(),
            country: "CH".to_string(),
            language: "DE".to_string(),
            birthday: "1987-05-12".to_string(),
            ..Default::default()
        }
        .with_roles(vec![
            RoleAssignment {
                role: "Group::SektionsMitglieder::Mitglied".to_string(),
                layer_group_id: "1415".to_string(),
            },
            RoleAssignment {
                role: "Group::SektionsMitglieder::MitgliedZusatzsektion".to_string(),
                layer_group_id: "1425".to_string(),
            },
            RoleAssignment {
                role: "Group::Geschaeftsstelle::Mitarbeiter".to_string(),
                layer_group_id: "1".to_string(),
            },
        ])
    }

    impl IdentityClaims {
        fn with_roles(mut self, roles: Vec<RoleAssignment>) -> Self {
            self.roles = roles;
            self
        }
    }

    fn legacy_map() -> SectionIdMap {
        [(1415, 4250), (1425, 4252)].into_iter().collect()
    }

    #[test]
    fn member_id_strips_leading_zeros() {
        assert_eq!(member_claims().member_id(), "123456");
    }

    #[test]
    fn member_id_of_empty_sub_is_empty() {
        assert_eq!(IdentityClaims::default().member_id(), "");
    }

    #[test]
    fn section_memberships_only_count_member_roles() {
        let ids = member_claims().section_memberships(&legacy_map());
        assert_eq!(ids, vec![4250, 4252]);
    }

    #[test]
    fn section_memberships_without_map_keep_legacy_ids() {
        let ids = member_claims().section_memberships(&SectionIdMap::empty());
        assert_eq!(ids, vec![1415, 1425]);
    }

    #[test]
    fn non_member_roles_yield_no_memberships() {
        let claims = IdentityClaims::default().with_roles(vec![RoleAssignment {
            role: "Group::Geschaeftsstelle::Mitarbeiter".to_string(),
            layer_group_id: "1415".to_string(),
        }]);
        assert!(claims.section_memberships(&legacy_map()).is_empty());
    }

    #[test]
    fn duplicate_sections_are_reported_once() {
        let claims = IdentityClaims::default().with_roles(vec![
            RoleAssignment {
                role: MEMBER_ROLES[0].to_string(),
                layer_group_id: "1415".to_string(),
            },
            RoleAssignment {
                role: MEMBER_ROLES[1].to_string(),
                layer_group_id: "1415".to_string(),
            },
        ]);
        assert_eq!(claims.section_memberships(&legacy_map()), vec![4250]);
    }

    #[test]
    fn incomplete_role_entries_are_skipped() {
        let claims = IdentityClaims::default().with_roles(vec![
            RoleAssignment {
                role: MEMBER_ROLES[0].to_string(),
                layer_group_id: String::new(),
            },
            RoleAssignment {
                role: String::new(),
                layer_group_id: "1415".to_string(),
            },
        ]);
        assert!(claims.section_memberships(&legacy_map()).is_empty());
    }

    #[test]
    fn gender_maps_to_local_values() {
        assert_eq!(member_claims().mapped_gender(), Gender::Female);
        assert_eq!(
            IdentityClaims {
                gender: "m".to_string(),
                ..Default::default()
            }
            .mapped_gender(),
            Gender::Male
        );
        assert_eq!(IdentityClaims::default().mapped_gender(), Gender::Other);
    }

    #[test]
    fn language_defaults_to_german() {
        assert_eq!(IdentityClaims::default().language_code(), "de");
        assert_eq!(member_claims().language_code(), "de");
    }

    #[test]
    fn partial_payload_parses_with_defaults() {
        let claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"42","email":"x@example.org"}"#).expect("deserialize");
        assert_eq!(claims.sub, "42");
        assert!(claims.roles.is_empty());
        assert!(claims.first_name.is_empty());
    }

    #[test]
    fn full_name_is_last_then_first() {
        assert_eq!(member_claims().full_name(), "Brunner Anna");
        assert_eq!(IdentityClaims::default().full_name(), "");
    }
}
