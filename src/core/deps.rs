//! Dependency declarations for a recipe
//!
//! Requirements are declared once at recipe load and partitioned into
//! build, run and test-only classes. Declaration order is preserved because
//! the resolver treats earlier entries as higher priority.

use std::collections::HashSet;
use std::fmt;

use super::error::RecipeError;

/// When a requirement is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequirementClass {
    /// Tools and libraries needed only to compile
    Build,
    /// Needed by consumers at run time (shared libraries, data)
    Run,
    /// Needed only to build and run the test binary
    TestOnly,
}

impl RequirementClass {
    pub const ALL: [RequirementClass; 3] = [
        RequirementClass::Build,
        RequirementClass::Run,
        RequirementClass::TestOnly,
    ];
}

impl fmt::Display for RequirementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequirementClass::Build => "build",
            RequirementClass::Run => "run",
            RequirementClass::TestOnly => "test-only",
        })
    }
}

/// A declared external dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    /// Version constraint as written in the recipe (`*` when omitted)
    pub constraint: String,
    pub class: RequirementClass,
}

impl Requirement {
    pub fn new(name: impl Into<String>, constraint: impl Into<String>, class: RequirementClass) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            class,
        }
    }

    /// Parse a `name/constraint` reference such as `sdl/2.30.8`.
    pub fn parse(reference: &str, class: RequirementClass) -> Result<Self, RecipeError> {
        let reference = reference.trim();
        let (name, constraint) = match reference.split_once('/') {
            Some((name, constraint)) => (name.trim(), constraint.trim()),
            None => (reference, "*"),
        };

        if name.is_empty() {
            return Err(RecipeError::InvalidRecipe(format!(
                "requirement '{}' has no package name",
                reference
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '+')
        {
            return Err(RecipeError::InvalidRecipe(format!(
                "invalid package name '{}' in requirement '{}'",
                name, reference
            )));
        }

        if name.chars().all(|c| c == '.') {
            return Err(RecipeError::InvalidRecipe(format!(
                "invalid package name '{}' in requirement '{}'",
                name, reference
            )));
        }

        let constraint = if constraint.is_empty() { "*" } else { constraint };
        Ok(Self::new(name, constraint, class))
    }

    /// Display form used in logs and errors.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.constraint)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference(), self.class)
    }
}

/// Validated, ordered set of requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    requirements: Vec<Requirement>,
}

impl DependencySet {
    /// Build a set, rejecting two requirements of one class with the same name.
    pub fn declare(requirements: Vec<Requirement>) -> Result<Self, RecipeError> {
        let mut seen: HashSet<(RequirementClass, &str)> = HashSet::new();
        for req in &requirements {
            if !seen.insert((req.class, req.name.as_str())) {
                return Err(RecipeError::DuplicateRequirement {
                    name: req.name.clone(),
                    class: req.class.to_string(),
                });
            }
        }
        Ok(Self { requirements })
    }

    /// Requirements of one class, in declaration order.
    pub fn for_class(&self, class: RequirementClass) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(move |r| r.class == class)
    }

    /// All requirements grouped by class (build, run, test-only).
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        RequirementClass::ALL
            .into_iter()
            .flat_map(move |class| self.for_class(class))
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}
