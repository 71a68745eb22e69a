use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::Index;
use std::ops::IndexMut;

use serde::Deserialize;
use serde::Serialize;

/// Where an emitted resource will execute.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  Client,
  Server,
}

impl Environment {
  pub const ALL: [Environment; 2] = [Environment::Client, Environment::Server];

  pub fn is_client(&self) -> bool {
    matches!(self, Environment::Client)
  }

  pub fn is_server(&self) -> bool {
    matches!(self, Environment::Server)
  }
}

impl Display for Environment {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Environment::Client => f.write_str("client"),
      Environment::Server => f.write_str("server"),
    }
  }
}

/// Per-environment storage indexed by the enum itself.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PerEnv<T>([T; 2]);

impl<T> PerEnv<T> {
  pub fn new(client: T, server: T) -> Self {
    Self([client, server])
  }

  pub fn iter(&self) -> impl Iterator<Item = (Environment, &T)> {
    Environment::ALL
      .iter()
      .map(move |environment| (*environment, &self[*environment]))
  }
}

impl<T> Index<Environment> for PerEnv<T> {
  type Output = T;

  fn index(&self, environment: Environment) -> &T {
    &self.0[environment as usize]
  }
}

impl<T> IndexMut<Environment> for PerEnv<T> {
  fn index_mut(&mut self, environment: Environment) -> &mut T {
    &mut self.0[environment as usize]
  }
}
