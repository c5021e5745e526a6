//! Feature-unit registry with dependency-ordered, lazy initialization.
//!
//! Optional capabilities (wrapped ranges, selection support, save/restore)
//! register themselves as named units with dependency lists. A unit is
//! initialized at most once, after its dependencies; a failed initializer
//! marks the unit unsupported and every dependent inherits the failure
//! instead of crashing.

use std::collections::HashMap;

use crate::error::{DomError, DomResult};

type InitFn = Box<dyn FnOnce() -> DomResult<()>>;

enum UnitState {
    Pending(InitFn),
    Initializing,
    Ready,
    Failed(String),
}

struct Unit {
    deps: Vec<String>,
    state: UnitState,
}

#[derive(Default)]
pub struct Registry {
    units: HashMap<String, Unit>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Registration alone runs nothing.
    pub fn register(
        &mut self,
        name: &str,
        deps: &[&str],
        init: impl FnOnce() -> DomResult<()> + 'static,
    ) -> DomResult<()> {
        if self.units.contains_key(name) {
            return Err(DomError::InvalidState("unit is already registered"));
        }
        self.units.insert(
            name.to_string(),
            Unit {
                deps: deps.iter().map(|d| d.to_string()).collect(),
                state: UnitState::Pending(Box::new(init)),
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        matches!(
            self.units.get(name).map(|unit| &unit.state),
            Some(UnitState::Ready)
        )
    }

    /// The recorded failure reason, if the unit failed to initialize.
    pub fn failure(&self, name: &str) -> Option<&str> {
        match self.units.get(name).map(|unit| &unit.state) {
            Some(UnitState::Failed(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Initialize `name`, running its dependencies first. Repeated calls
    /// are no-ops for ready units and re-report the recorded failure for
    /// failed ones.
    pub fn init(&mut self, name: &str) -> DomResult<()> {
        match self.units.get(name).map(|unit| &unit.state) {
            None => {
                return Err(DomError::NotFound(format!("unit '{name}' is not registered")));
            }
            Some(UnitState::Ready) => return Ok(()),
            Some(UnitState::Failed(reason)) => {
                return Err(DomError::Unsupported(reason.clone()));
            }
            Some(UnitState::Initializing) => {
                return Err(DomError::InvalidState("dependency cycle between units"));
            }
            Some(UnitState::Pending(_)) => {}
        }

        // Mark in-flight before touching dependencies so a cycle surfaces
        // as an error instead of unbounded recursion.
        let (deps, init) = match self.units.get_mut(name) {
            Some(unit) => match std::mem::replace(&mut unit.state, UnitState::Initializing) {
                UnitState::Pending(init) => (unit.deps.clone(), init),
                other => {
                    unit.state = other;
                    return Err(DomError::InvalidState("unit initializer already consumed"));
                }
            },
            None => unreachable!(),
        };
        for dep in &deps {
            if let Err(err) = self.init(dep) {
                let reason = format!("dependency '{dep}' unavailable: {err}");
                tracing::warn!(unit = name, %err, dependency = dep, "unit disabled");
                self.fail(name, reason.clone());
                return Err(DomError::Unsupported(reason));
            }
        }

        match init() {
            Ok(()) => {
                tracing::debug!(unit = name, "unit initialized");
                if let Some(unit) = self.units.get_mut(name) {
                    unit.state = UnitState::Ready;
                }
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(unit = name, %err, "unit initialization failed");
                self.fail(name, reason.clone());
                Err(DomError::Unsupported(reason))
            }
        }
    }

    /// Initialize every registered unit, collecting failures instead of
    /// stopping at the first.
    pub fn init_all(&mut self) -> Vec<(String, DomError)> {
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        let mut failures = Vec::new();
        for name in names {
            if let Err(err) = self.init(&name) {
                failures.push((name, err));
            }
        }
        failures
    }

    fn fail(&mut self, name: &str, reason: String) {
        if let Some(unit) = self.units.get_mut(name) {
            unit.state = UnitState::Failed(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn init_runs_dependencies_first_and_once() {
        let mut registry = Registry::new();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));

        let core_log = log.clone();
        registry
            .register("core", &[], move || {
                core_log.borrow_mut().push("core");
                Ok(())
            })
            .unwrap();
        let wrapped_log = log.clone();
        registry
            .register("wrapped", &["core"], move || {
                wrapped_log.borrow_mut().push("wrapped");
                Ok(())
            })
            .unwrap();

        registry.init("wrapped").unwrap();
        registry.init("wrapped").unwrap();
        registry.init("core").unwrap();
        assert_eq!(*log.borrow(), vec!["core", "wrapped"]);
    }

    #[test]
    fn failure_propagates_to_dependents_without_rerunning() {
        let mut registry = Registry::new();
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        registry
            .register("flaky", &[], move || {
                counter.set(counter.get() + 1);
                Err(DomError::Unsupported("backend missing".to_string()))
            })
            .unwrap();
        registry.register("dependent", &["flaky"], || Ok(())).unwrap();

        assert!(matches!(
            registry.init("dependent"),
            Err(DomError::Unsupported(_))
        ));
        assert!(registry.failure("flaky").is_some());
        assert!(registry.failure("dependent").is_some());

        // The failure is cached; the initializer never runs again.
        assert!(registry.init("flaky").is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn unknown_unit_and_cycle_are_errors() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.init("ghost"),
            Err(DomError::NotFound(_))
        ));

        registry.register("a", &["b"], || Ok(())).unwrap();
        registry.register("b", &["a"], || Ok(())).unwrap();
        assert!(registry.init("a").is_err());
    }

    #[test]
    fn init_all_reports_every_failure() {
        let mut registry = Registry::new();
        registry.register("good", &[], || Ok(())).unwrap();
        registry
            .register("bad", &[], || {
                Err(DomError::Unsupported("nope".to_string()))
            })
            .unwrap();

        let failures = registry.init_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
        assert!(registry.is_ready("good"));
    }
}
