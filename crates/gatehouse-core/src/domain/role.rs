//! 역할 기반 접근 제어 (RBAC).
//!
//! 역할 이름 정규화 및 역할 집합 정의.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 역할 이름에 붙을 수 있는 접두사. 정규형에서는 항상 제거됩니다.
const ROLE_PREFIX: &str = "ROLE_";

/// 잘못된 역할 이름.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("잘못된 역할 이름: {0:?}")]
pub struct InvalidRole(pub String);

/// 사용자 역할.
///
/// 정규형은 공백 제거 + 대문자 + `ROLE_` 접두사 제거입니다.
/// `"role_admin"`, `"ROLE_ADMIN"`, `" admin "`은 모두 `ADMIN`이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// 일반 사용자
    pub const USER: &'static str = "USER";
    /// 관리자
    pub const ADMIN: &'static str = "ADMIN";
    /// 매니저
    pub const MANAGER: &'static str = "MANAGER";

    /// 문자열에서 역할 생성 (정규화 포함).
    pub fn new(name: &str) -> Result<Self, InvalidRole> {
        let upper = name.trim().to_uppercase();
        let canonical = upper.strip_prefix(ROLE_PREFIX).unwrap_or(&upper).trim();

        let valid = !canonical.is_empty()
            && canonical
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(InvalidRole(name.to_string()));
        }

        Ok(Self(canonical.to_string()))
    }

    /// 정규화를 통과한다고 알려진 상수 이름용.
    fn known(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn user() -> Self {
        Self::known(Self::USER)
    }

    pub fn admin() -> Self {
        Self::known(Self::ADMIN)
    }

    pub fn manager() -> Self {
        Self::known(Self::MANAGER)
    }

    /// 정규형 이름.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Role {
    type Error = InvalidRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

/// 정렬된 역할 집합.
///
/// 직렬화 시 항상 같은 순서를 보장하므로 토큰 왕복 후 비교가 안정적입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 문자열 목록에서 역할 집합 생성. 하나라도 잘못되면 실패합니다.
    pub fn parse<I, S>(names: I) -> Result<Self, InvalidRole>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| Role::new(name.as_ref()))
            .collect()
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// 하나라도 겹치는 역할이 있는지 확인.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        other.iter().any(|role| self.contains(role))
    }

    /// `other`의 모든 역할을 포함하는지 확인.
    pub fn is_superset(&self, other: &RoleSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    /// 정규형 이름 목록.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::collections::btree_set::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_normalization() {
        assert_eq!(Role::new("admin").unwrap(), Role::admin());
        assert_eq!(Role::new("ROLE_ADMIN").unwrap(), Role::admin());
        assert_eq!(Role::new("role_admin").unwrap(), Role::admin());
        assert_eq!(Role::new("  User ").unwrap(), Role::user());
        assert_eq!(Role::new("Role_Manager").unwrap().as_str(), "MANAGER");
    }

    #[test]
    fn test_invalid_roles() {
        assert!(Role::new("").is_err());
        assert!(Role::new("   ").is_err());
        assert!(Role::new("ROLE_").is_err());
        assert!(Role::new("has space").is_err());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::admin()).unwrap();
        assert_eq!(json, "\"ADMIN\"");

        // 역직렬화 시에도 정규화
        let parsed: Role = serde_json::from_str("\"role_admin\"").unwrap();
        assert_eq!(parsed, Role::admin());

        assert!(serde_json::from_str::<Role>("\"\"").is_err());
    }

    #[test]
    fn test_role_set_dedups_equivalent_names() {
        let set = RoleSet::parse(["USER", "role_user", "admin"]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["ADMIN".to_string(), "USER".to_string()]);
    }

    #[test]
    fn test_role_set_predicates() {
        let held = RoleSet::parse(["USER", "MANAGER"]).unwrap();

        assert!(held.intersects(&RoleSet::parse(["ADMIN", "USER"]).unwrap()));
        assert!(!held.intersects(&RoleSet::parse(["ADMIN"]).unwrap()));
        assert!(held.is_superset(&RoleSet::parse(["USER", "MANAGER"]).unwrap()));
        assert!(!held.is_superset(&RoleSet::parse(["USER", "ADMIN"]).unwrap()));
    }

    #[test]
    fn test_role_set_parse_rejects_any_invalid() {
        assert!(RoleSet::parse(["USER", ""]).is_err());
    }
}
