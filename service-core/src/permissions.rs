//! Role → permission lookup.
//!
//! Permissions are `module:action` pairs (e.g. `facturacion:update`). The role
//! table is static; enforcement can be switched off for deployments where the
//! upstream backend already authorizes every call.

use crate::error::AppError;
use crate::middleware::Principal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ALL: &[Action] = &[Action::Create, Action::Read, Action::Update, Action::Delete];

/// `(role, module, actions)`; module `*` matches every module.
const ROLE_PERMISSIONS: &[(&str, &str, &[Action])] = &[
    ("admin", "*", ALL),
    ("facturacion", "facturacion", ALL),
    ("cobranza", "facturacion", &[Action::Read, Action::Update]),
    ("ventas", "facturacion", &[Action::Read]),
    ("ventas", "prospectos", ALL),
    ("soporte", "tickets", ALL),
    ("soporte", "clientes", &[Action::Read]),
];

/// Returns whether `role` may perform `action` on `module`.
pub fn has_permission(role: &str, module: &str, action: Action) -> bool {
    ROLE_PERMISSIONS
        .iter()
        .filter(|(r, m, _)| *r == role && (*m == "*" || *m == module))
        .any(|(_, _, actions)| actions.contains(&action))
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionChecker {
    enforced: bool,
}

impl PermissionChecker {
    pub fn new(enforced: bool) -> Self {
        if enforced {
            tracing::info!("Permission enforcement enabled");
        } else {
            tracing::info!("Permission enforcement disabled (upstream trust model)");
        }
        Self { enforced }
    }

    pub fn disabled() -> Self {
        Self { enforced: false }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Fails with `Forbidden` unless the principal holds `module:action`.
    pub fn require(
        &self,
        principal: &Principal,
        module: &str,
        action: Action,
    ) -> Result<(), AppError> {
        if !self.enforced || has_permission(&principal.role, module, action) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            permission = %format!("{}:{}", module, action),
            "Permission denied"
        );

        Err(AppError::Forbidden(anyhow::anyhow!(
            "El rol '{}' no tiene permiso {}:{}",
            principal.role,
            module,
            action
        )))
    }
}
