//! Navigation guard module.
//!
//! Every page transition the host performs (push, replace, relaunch, tab
//! switch) is offered to [`NavigationGuard::intercept`] first. The decision
//! itself is the pure [`decide`] function; the guard only carries out the
//! side effects that follow from it.

pub mod guard;
pub mod pages;

pub use guard::{decide, Decision, Navigation, NavigationGuard, NavigationKind};
pub use pages::{PageClassification, PageTable};
