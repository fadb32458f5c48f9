//! Access policy types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::error::AccessPolicyError;
use super::principal::Principal;

/// Grant strength. Variants are declared in ascending order, so the derived
/// `Ord` (and the Postgres enum ordering) is None < User < Editor < Admin.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "permission_level")]
pub enum PermissionLevel {
    None,
    User,
    Editor,
    Admin,
}

impl PermissionLevel {
    /// Ordinal position, 0 for `None` through 3 for `Admin`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::User => 1,
            Self::Editor => 2,
            Self::Admin => 3,
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::None, Self::User, Self::Editor, Self::Admin]
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::User => write!(f, "User"),
            Self::Editor => write!(f, "Editor"),
            Self::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = AccessPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "User" => Ok(Self::User),
            "Editor" => Ok(Self::Editor),
            "Admin" => Ok(Self::Admin),
            _ => Err(AccessPolicyError::InvalidPermissionLevel(s.to_string())),
        }
    }
}

/// How a policy propagates to descendant scopes.
///
/// Stored and filterable. Scope resolution currently takes the single deepest
/// match and does not apply an ancestor's `Required` minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inheritance_level")]
pub enum InheritanceLevel {
    Disabled,
    Enabled,
    Required,
}

impl fmt::Display for InheritanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::Enabled => write!(f, "Enabled"),
            Self::Required => write!(f, "Required"),
        }
    }
}

impl FromStr for InheritanceLevel {
    type Err = AccessPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disabled" => Ok(Self::Disabled),
            "Enabled" => Ok(Self::Enabled),
            "Required" => Ok(Self::Required),
            _ => Err(AccessPolicyError::InvalidInheritanceLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "principal_type")]
pub enum PrincipalType {
    User,
    Group,
    Role,
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Group => write!(f, "Group"),
            Self::Role => write!(f, "Role"),
        }
    }
}

impl FromStr for PrincipalType {
    type Err = AccessPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Group" => Ok(Self::Group),
            "Role" => Ok(Self::Role),
            _ => Err(AccessPolicyError::InvalidPrincipalType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scoped_resource_type")]
pub enum ScopedResourceType {
    Instance,
    Workspace,
    Project,
    Item,
    Action,
    Role,
    Group,
    User,
    App,
    Milestone,
}

impl ScopedResourceType {
    /// Depth in the Instance > Workspace > Project > Item containment chain.
    ///
    /// `None` for scopes outside that chain.
    #[must_use]
    pub const fn containment_depth(self) -> Option<u8> {
        match self {
            Self::Instance => Some(0),
            Self::Workspace => Some(1),
            Self::Project => Some(2),
            Self::Item => Some(3),
            Self::Action
            | Self::Role
            | Self::Group
            | Self::User
            | Self::App
            | Self::Milestone => None,
        }
    }

    /// Filter key holding the scoped resource's ID. `None` for `Instance`.
    #[must_use]
    pub const fn id_key(self) -> Option<&'static str> {
        match self {
            Self::Instance => None,
            Self::Workspace => Some("scoped_workspace_id"),
            Self::Project => Some("scoped_project_id"),
            Self::Item => Some("scoped_item_id"),
            Self::Action => Some("scoped_action_id"),
            Self::Role => Some("scoped_role_id"),
            Self::Group => Some("scoped_group_id"),
            Self::User => Some("scoped_user_id"),
            Self::App => Some("scoped_app_id"),
            Self::Milestone => Some("scoped_milestone_id"),
        }
    }
}

impl fmt::Display for ScopedResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instance => "Instance",
            Self::Workspace => "Workspace",
            Self::Project => "Project",
            Self::Item => "Item",
            Self::Action => "Action",
            Self::Role => "Role",
            Self::Group => "Group",
            Self::User => "User",
            Self::App => "App",
            Self::Milestone => "Milestone",
        };
        f.write_str(name)
    }
}

impl FromStr for ScopedResourceType {
    type Err = AccessPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Instance" => Ok(Self::Instance),
            "Workspace" => Ok(Self::Workspace),
            "Project" => Ok(Self::Project),
            "Item" => Ok(Self::Item),
            "Action" => Ok(Self::Action),
            "Role" => Ok(Self::Role),
            "Group" => Ok(Self::Group),
            "User" => Ok(Self::User),
            "App" => Ok(Self::App),
            "Milestone" => Ok(Self::Milestone),
            _ => Err(AccessPolicyError::InvalidScopedResourceType(s.to_string())),
        }
    }
}

/// The resource a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyScope {
    Instance,
    Workspace(Uuid),
    Project(Uuid),
    Item(Uuid),
    Action(Uuid),
    Role(Uuid),
    Group(Uuid),
    User(Uuid),
    App(Uuid),
    Milestone(Uuid),
}

impl PolicyScope {
    #[must_use]
    pub const fn resource_type(self) -> ScopedResourceType {
        match self {
            Self::Instance => ScopedResourceType::Instance,
            Self::Workspace(_) => ScopedResourceType::Workspace,
            Self::Project(_) => ScopedResourceType::Project,
            Self::Item(_) => ScopedResourceType::Item,
            Self::Action(_) => ScopedResourceType::Action,
            Self::Role(_) => ScopedResourceType::Role,
            Self::Group(_) => ScopedResourceType::Group,
            Self::User(_) => ScopedResourceType::User,
            Self::App(_) => ScopedResourceType::App,
            Self::Milestone(_) => ScopedResourceType::Milestone,
        }
    }

    #[must_use]
    pub const fn resource_id(self) -> Option<Uuid> {
        match self {
            Self::Instance => None,
            Self::Workspace(id)
            | Self::Project(id)
            | Self::Item(id)
            | Self::Action(id)
            | Self::Role(id)
            | Self::Group(id)
            | Self::User(id)
            | Self::App(id)
            | Self::Milestone(id) => Some(id),
        }
    }
}

/// Position of the acted-upon resource in the containment hierarchy.
///
/// Callers supply every relevant ancestor; resolution does not look them up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceScope {
    pub item_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
}

impl ResourceScope {
    /// Scope with no resource: only Instance policies apply.
    #[must_use]
    pub const fn instance() -> Self {
        Self {
            item_id: None,
            project_id: None,
            workspace_id: None,
        }
    }

    #[must_use]
    pub const fn with_workspace(mut self, workspace_id: Uuid) -> Self {
        self.workspace_id = Some(workspace_id);
        self
    }

    #[must_use]
    pub const fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    #[must_use]
    pub const fn with_item(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }
}

/// Access policy row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AccessPolicy {
    pub id: Uuid,
    pub action_id: Uuid,
    pub permission_level: PermissionLevel,
    pub inheritance_level: InheritanceLevel,
    pub principal_type: PrincipalType,
    pub principal_user_id: Option<Uuid>,
    pub principal_group_id: Option<Uuid>,
    pub principal_role_id: Option<Uuid>,
    pub scoped_resource_type: ScopedResourceType,
    pub scoped_workspace_id: Option<Uuid>,
    pub scoped_project_id: Option<Uuid>,
    pub scoped_item_id: Option<Uuid>,
    pub scoped_action_id: Option<Uuid>,
    pub scoped_role_id: Option<Uuid>,
    pub scoped_group_id: Option<Uuid>,
    pub scoped_user_id: Option<Uuid>,
    pub scoped_app_id: Option<Uuid>,
    pub scoped_milestone_id: Option<Uuid>,
}

impl AccessPolicy {
    /// The principal this policy grants to.
    pub fn principal(&self) -> Result<Principal, AccessPolicyError> {
        let id = match self.principal_type {
            PrincipalType::User => self.principal_user_id,
            PrincipalType::Group => self.principal_group_id,
            PrincipalType::Role => self.principal_role_id,
        };

        id.map(|id| Principal::from_parts(self.principal_type, id))
            .ok_or(AccessPolicyError::PrincipalReferenceMismatch(
                self.principal_type,
            ))
    }

    /// The resource this policy is scoped to.
    pub fn scope(&self) -> Result<PolicyScope, AccessPolicyError> {
        let missing = || AccessPolicyError::ScopeReferenceMismatch(self.scoped_resource_type);

        Ok(match self.scoped_resource_type {
            ScopedResourceType::Instance => PolicyScope::Instance,
            ScopedResourceType::Workspace => {
                PolicyScope::Workspace(self.scoped_workspace_id.ok_or_else(missing)?)
            }
            ScopedResourceType::Project => {
                PolicyScope::Project(self.scoped_project_id.ok_or_else(missing)?)
            }
            ScopedResourceType::Item => PolicyScope::Item(self.scoped_item_id.ok_or_else(missing)?),
            ScopedResourceType::Action => {
                PolicyScope::Action(self.scoped_action_id.ok_or_else(missing)?)
            }
            ScopedResourceType::Role => PolicyScope::Role(self.scoped_role_id.ok_or_else(missing)?),
            ScopedResourceType::Group => {
                PolicyScope::Group(self.scoped_group_id.ok_or_else(missing)?)
            }
            ScopedResourceType::User => PolicyScope::User(self.scoped_user_id.ok_or_else(missing)?),
            ScopedResourceType::App => PolicyScope::App(self.scoped_app_id.ok_or_else(missing)?),
            ScopedResourceType::Milestone => {
                PolicyScope::Milestone(self.scoped_milestone_id.ok_or_else(missing)?)
            }
        })
    }
}

/// Access policy joined with its action's display fields.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct HydratedAccessPolicy {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub policy: AccessPolicy,
    pub action_name: String,
    pub action_display_name: String,
}

/// Fields for a new access policy.
///
/// Mirrors the table's columns. [`NewAccessPolicy::validate`] checks that
/// exactly one principal reference and at most one scope reference are set,
/// matching the declared types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewAccessPolicy {
    pub action_id: Uuid,
    pub permission_level: Option<PermissionLevel>,
    pub inheritance_level: Option<InheritanceLevel>,
    pub principal_type: Option<PrincipalType>,
    pub principal_user_id: Option<Uuid>,
    pub principal_group_id: Option<Uuid>,
    pub principal_role_id: Option<Uuid>,
    pub scoped_resource_type: Option<ScopedResourceType>,
    pub scoped_workspace_id: Option<Uuid>,
    pub scoped_project_id: Option<Uuid>,
    pub scoped_item_id: Option<Uuid>,
    pub scoped_action_id: Option<Uuid>,
    pub scoped_role_id: Option<Uuid>,
    pub scoped_group_id: Option<Uuid>,
    pub scoped_user_id: Option<Uuid>,
    pub scoped_app_id: Option<Uuid>,
    pub scoped_milestone_id: Option<Uuid>,
}

impl NewAccessPolicy {
    /// Build from typed parts. The result always passes [`Self::validate`].
    #[must_use]
    pub fn new(
        action_id: Uuid,
        principal: Principal,
        scope: PolicyScope,
        permission_level: PermissionLevel,
        inheritance_level: InheritanceLevel,
    ) -> Self {
        let mut policy = Self {
            action_id,
            permission_level: Some(permission_level),
            inheritance_level: Some(inheritance_level),
            principal_type: Some(principal.principal_type()),
            scoped_resource_type: Some(scope.resource_type()),
            ..Self::default()
        };

        match principal {
            Principal::User(id) => policy.principal_user_id = Some(id),
            Principal::Group(id) => policy.principal_group_id = Some(id),
            Principal::Role(id) => policy.principal_role_id = Some(id),
        }

        match scope {
            PolicyScope::Instance => {}
            PolicyScope::Workspace(id) => policy.scoped_workspace_id = Some(id),
            PolicyScope::Project(id) => policy.scoped_project_id = Some(id),
            PolicyScope::Item(id) => policy.scoped_item_id = Some(id),
            PolicyScope::Action(id) => policy.scoped_action_id = Some(id),
            PolicyScope::Role(id) => policy.scoped_role_id = Some(id),
            PolicyScope::Group(id) => policy.scoped_group_id = Some(id),
            PolicyScope::User(id) => policy.scoped_user_id = Some(id),
            PolicyScope::App(id) => policy.scoped_app_id = Some(id),
            PolicyScope::Milestone(id) => policy.scoped_milestone_id = Some(id),
        }

        policy
    }

    /// Check the exactly-one-reference rules for principal and scope.
    pub fn validate(&self) -> Result<ValidatedAccessPolicy, AccessPolicyError> {
        let permission_level = self
            .permission_level
            .ok_or(AccessPolicyError::MissingField("permission_level"))?;
        let inheritance_level = self
            .inheritance_level
            .ok_or(AccessPolicyError::MissingField("inheritance_level"))?;
        let principal_type = self
            .principal_type
            .ok_or(AccessPolicyError::MissingField("principal_type"))?;
        let scoped_resource_type = self
            .scoped_resource_type
            .ok_or(AccessPolicyError::MissingField("scoped_resource_type"))?;

        let principals = [
            (PrincipalType::User, self.principal_user_id),
            (PrincipalType::Group, self.principal_group_id),
            (PrincipalType::Role, self.principal_role_id),
        ];
        let mut principal = None;
        for (kind, id) in principals {
            match (kind == principal_type, id) {
                (true, Some(id)) => principal = Some(Principal::from_parts(kind, id)),
                (false, None) | (true, None) => {}
                (false, Some(_)) => {
                    return Err(AccessPolicyError::PrincipalReferenceMismatch(
                        principal_type,
                    ))
                }
            }
        }
        let principal =
            principal.ok_or(AccessPolicyError::PrincipalReferenceMismatch(principal_type))?;

        let scopes = [
            (ScopedResourceType::Workspace, self.scoped_workspace_id),
            (ScopedResourceType::Project, self.scoped_project_id),
            (ScopedResourceType::Item, self.scoped_item_id),
            (ScopedResourceType::Action, self.scoped_action_id),
            (ScopedResourceType::Role, self.scoped_role_id),
            (ScopedResourceType::Group, self.scoped_group_id),
            (ScopedResourceType::User, self.scoped_user_id),
            (ScopedResourceType::App, self.scoped_app_id),
            (ScopedResourceType::Milestone, self.scoped_milestone_id),
        ];
        let mut scoped_id = None;
        for (kind, id) in scopes {
            match (kind == scoped_resource_type, id) {
                (true, Some(id)) => scoped_id = Some(id),
                (false, None) | (true, None) => {}
                (false, Some(_)) => {
                    return Err(AccessPolicyError::ScopeReferenceMismatch(
                        scoped_resource_type,
                    ))
                }
            }
        }

        let scope = match (scoped_resource_type, scoped_id) {
            (ScopedResourceType::Instance, None) => PolicyScope::Instance,
            (ScopedResourceType::Workspace, Some(id)) => PolicyScope::Workspace(id),
            (ScopedResourceType::Project, Some(id)) => PolicyScope::Project(id),
            (ScopedResourceType::Item, Some(id)) => PolicyScope::Item(id),
            (ScopedResourceType::Action, Some(id)) => PolicyScope::Action(id),
            (ScopedResourceType::Role, Some(id)) => PolicyScope::Role(id),
            (ScopedResourceType::Group, Some(id)) => PolicyScope::Group(id),
            (ScopedResourceType::User, Some(id)) => PolicyScope::User(id),
            (ScopedResourceType::App, Some(id)) => PolicyScope::App(id),
            (ScopedResourceType::Milestone, Some(id)) => PolicyScope::Milestone(id),
            (kind, _) => return Err(AccessPolicyError::ScopeReferenceMismatch(kind)),
        };

        Ok(ValidatedAccessPolicy {
            action_id: self.action_id,
            permission_level,
            inheritance_level,
            principal,
            scope,
        })
    }
}

/// A [`NewAccessPolicy`] that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedAccessPolicy {
    pub action_id: Uuid,
    pub permission_level: PermissionLevel,
    pub inheritance_level: InheritanceLevel,
    pub principal: Principal,
    pub scope: PolicyScope,
}

/// Replaceable fields of an existing policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AccessPolicyUpdate {
    pub permission_level: Option<PermissionLevel>,
    pub inheritance_level: Option<InheritanceLevel>,
}
