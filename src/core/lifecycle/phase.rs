//! Lifecycle phases and their fixed order.

use std::fmt;

/// One step of a recipe run. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Export,
    Configure,
    Build,
    Test,
    Package,
    PublishInfo,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Export,
        Phase::Configure,
        Phase::Build,
        Phase::Test,
        Phase::Package,
        Phase::PublishInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Export => "export",
            Phase::Configure => "configure",
            Phase::Build => "build",
            Phase::Test => "test",
            Phase::Package => "package",
            Phase::PublishInfo => "publish-info",
        }
    }

    /// The phase that must have completed successfully before this one.
    ///
    /// Package depends on Build, not Test: a failing test binary does not
    /// stop the artifacts from being packaged.
    pub fn requires(self) -> Option<Phase> {
        match self {
            Phase::Export => None,
            Phase::Configure => Some(Phase::Export),
            Phase::Build => Some(Phase::Configure),
            Phase::Test => Some(Phase::Build),
            Phase::Package => Some(Phase::Build),
            Phase::PublishInfo => Some(Phase::Package),
        }
    }

    pub fn next(self) -> Option<Phase> {
        let idx = Phase::ALL.iter().position(|p| *p == self)?;
        Phase::ALL.get(idx + 1).copied()
    }

    /// Parse a phase name as used on the command line.
    pub fn parse(s: &str) -> Option<Phase> {
        Phase::ALL
            .into_iter()
            .find(|p| p.name() == s || (s == "publish_info" && *p == Phase::PublishInfo))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
        assert!(Phase::Configure < Phase::Build);
    }

    #[test]
    fn test_next_walks_the_chain() {
        let mut chain = vec![Phase::Export];
        while let Some(next) = chain.last().and_then(|p| p.next()) {
            chain.push(next);
        }
        assert_eq!(chain, Phase::ALL);
    }

    #[test]
    fn test_package_does_not_require_test() {
        assert_eq!(Phase::Package.requires(), Some(Phase::Build));
        assert_eq!(Phase::Test.requires(), Some(Phase::Build));
        assert_eq!(Phase::Export.requires(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Phase::parse("configure"), Some(Phase::Configure));
        assert_eq!(Phase::parse("publish-info"), Some(Phase::PublishInfo));
        assert_eq!(Phase::parse("publish_info"), Some(Phase::PublishInfo));
        assert_eq!(Phase::parse("deploy"), None);
    }
}
