use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::Index;
use std::ops::IndexMut;

use serde::Deserialize;
use serde::Serialize;

use super::environment::PerEnv;

/// Which incarnation of a package is being bundled.
///
/// A package may take part in a bundle twice: its production sources under
/// `Use` and its test sources under `Test`. Dependencies reached from either
/// incarnation are always `Use`; tests import production code of other
/// packages, never their tests.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Use,
  Test,
}

impl Role {
  pub const ALL: [Role; 2] = [Role::Use, Role::Test];
}

impl Display for Role {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Role::Use => f.write_str("use"),
      Role::Test => f.write_str("test"),
    }
  }
}

/// Per-role storage indexed by the enum itself.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PerRole<T>([T; 2]);

impl<T> PerRole<T> {
  pub fn new(use_role: T, test_role: T) -> Self {
    Self([use_role, test_role])
  }

  pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
    Role::ALL.iter().map(move |role| (*role, &self[*role]))
  }
}

impl<T> Index<Role> for PerRole<T> {
  type Output = T;

  fn index(&self, role: Role) -> &T {
    &self.0[role as usize]
  }
}

impl<T> IndexMut<Role> for PerRole<T> {
  fn index_mut(&mut self, role: Role) -> &mut T {
    &mut self.0[role as usize]
  }
}

/// The (role, environment) plane most package data is stored on.
pub type PerRoleEnv<T> = PerRole<PerEnv<T>>;
