//! Timed exam conduct: question budgets, navigation, integrity monitoring and the
//! submission guard, all driven through [`session::ExamSession::apply`].

pub(crate) mod budget;
pub(crate) mod errors;
pub(crate) mod model;
pub(crate) mod monitor;
pub(crate) mod navigation;
pub(crate) mod session;
pub(crate) mod submission;

pub(crate) use errors::{DefinitionError, ExamError};
